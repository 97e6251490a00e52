//! In-memory stand-in for the handoff application's form.
//!
//! Models the three screens the sequencer walks through (template picker,
//! application name, endpoint and headers). Like the real form, typed values
//! only reach the form's state once an `input` event is dispatched, and a
//! switch only counts as enabled after its `change` event. Clicks can be made
//! to take effect a few queries late to exercise guard polling.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::errors::FlowError;
use crate::page::HostPage;
use crate::types::{Anchor, DomEvent, ElementHandle};

const TEMPLATE_BUTTON: u64 = 1;
const CUSTOM_BUTTON: u64 = 2;
const NAME_INPUT: u64 = 10;
const NEXT_BUTTON: u64 = 11;
const ENDPOINT_INPUT: u64 = 20;
const ADD_HEADER: u64 = 21;
const ROW_BASE: u64 = 1_000;

/// Attribute carrying each rendered element's handle.
const ID_ATTR: &str = "data-netclip-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStep {
    Template,
    Name,
    Details,
}

/// A header row as the form's own state sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledHeader {
    pub name: String,
    pub value: String,
    pub enabled: bool,
}

/// Committed form state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub step: FormStep,
    pub application_name: String,
    pub endpoint: String,
    pub headers: Vec<FilledHeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    TemplateButton,
    CustomButton,
    NameInput,
    NextButton,
    EndpointInput,
    AddHeader,
    HeaderKey(u64),
    HeaderValue(u64),
    HeaderSwitch(u64),
    DeleteHeader(u64),
    HeaderRow(u64),
}

impl Role {
    fn handle(self) -> ElementHandle {
        let raw = match self {
            Role::TemplateButton => TEMPLATE_BUTTON,
            Role::CustomButton => CUSTOM_BUTTON,
            Role::NameInput => NAME_INPUT,
            Role::NextButton => NEXT_BUTTON,
            Role::EndpointInput => ENDPOINT_INPUT,
            Role::AddHeader => ADD_HEADER,
            Role::HeaderKey(row) => ROW_BASE + row * 10,
            Role::HeaderValue(row) => ROW_BASE + row * 10 + 1,
            Role::HeaderSwitch(row) => ROW_BASE + row * 10 + 2,
            Role::DeleteHeader(row) => ROW_BASE + row * 10 + 3,
            Role::HeaderRow(row) => ROW_BASE + row * 10 + 4,
        };
        ElementHandle(raw)
    }
}

/// Markup of the current screen and the roles rendered in it.
struct Screen {
    html: String,
    roles: Vec<Role>,
}

impl Screen {
    fn new() -> Self {
        Self {
            html: String::from("<!DOCTYPE html><html><body>"),
            roles: Vec::new(),
        }
    }

    fn open(&mut self, role: Role, tag: &str, attrs: &[(&str, &str)]) {
        self.roles.push(role);
        self.html.push_str(&format!("<{tag} {ID_ATTR}=\"{}\"", role.handle().0));
        for (name, value) in attrs {
            self.html.push_str(&format!(" {name}=\"{}\"", escape(value)));
        }
        self.html.push('>');
    }

    fn close(&mut self, tag: &str) {
        self.html.push_str(&format!("</{tag}>"));
    }

    fn element(&mut self, role: Role, tag: &str, attrs: &[(&str, &str)], text: &str) {
        self.open(role, tag, attrs);
        self.html.push_str(&escape(text));
        self.close(tag);
    }

    fn input(&mut self, role: Role, attrs: &[(&str, &str)]) {
        self.open(role, "input", attrs);
    }

    fn finish(mut self) -> Self {
        self.html.push_str("</body></html>");
        self
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Narrowing applied on top of an anchor's CSS selector.
enum Refine<'a> {
    None,
    Text(&'a str),
    Attribute(&'a str, &'a str),
}

impl Refine<'_> {
    fn accepts(&self, element: &ElementRef<'_>) -> bool {
        match self {
            Refine::None => true,
            Refine::Text(text) => element.text().collect::<String>().contains(text),
            Refine::Attribute(name, value) => element.value().attr(name) == Some(*value),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, FlowError> {
    Selector::parse(selector)
        .map_err(|err| FlowError::Page(format!("invalid selector {selector:?}: {err}")))
}

fn compile(anchor: &Anchor) -> Result<(Selector, Refine<'_>), FlowError> {
    Ok(match anchor {
        Anchor::Css(selector) => (parse_selector(selector)?, Refine::None),
        Anchor::TextContains { tag, text } => (parse_selector(tag)?, Refine::Text(text)),
        Anchor::Attribute { tag, name, value } => {
            (parse_selector(tag)?, Refine::Attribute(name, value))
        }
    })
}

fn handle_of(element: ElementRef<'_>) -> Option<ElementHandle> {
    element
        .value()
        .attr(ID_ATTR)
        .and_then(|raw| raw.parse().ok())
        .map(ElementHandle)
}

#[derive(Default)]
struct Field {
    dom: String,
    committed: String,
}

impl Field {
    fn commit(&mut self) {
        self.committed = self.dom.clone();
    }
}

struct Row {
    id: u64,
    key: Field,
    value: Field,
    checked: bool,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    OpenTemplate,
    Advance,
    AddRow,
    DeleteRow(u64),
}

struct FormState {
    step: FormStep,
    name: Field,
    endpoint: Field,
    rows: Vec<Row>,
    next_row: u64,
    pending: VecDeque<(usize, Mutation)>,
    journal: Vec<String>,
}

impl FormState {
    fn add_row(&mut self) {
        let id = self.next_row;
        self.next_row += 1;
        self.rows.push(Row {
            id,
            key: Field::default(),
            value: Field::default(),
            checked: false,
            enabled: false,
        });
    }

    fn row_mut(&mut self, id: u64) -> Option<&mut Row> {
        self.rows.iter_mut().find(|row| row.id == id)
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::OpenTemplate => self.step = FormStep::Name,
            Mutation::Advance => self.step = FormStep::Details,
            Mutation::AddRow => self.add_row(),
            Mutation::DeleteRow(id) => self.rows.retain(|row| row.id != id),
        }
    }

    /// Let pending clicks age by one query.
    fn tick(&mut self) {
        let mut due = Vec::new();
        for (remaining, mutation) in self.pending.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                due.push(*mutation);
            }
        }
        self.pending.retain(|(remaining, _)| *remaining > 0);
        for mutation in due {
            self.apply(mutation);
        }
    }

    fn field_mut(&mut self, role: Role) -> Option<&mut Field> {
        match role {
            Role::NameInput => Some(&mut self.name),
            Role::EndpointInput => Some(&mut self.endpoint),
            Role::HeaderKey(id) => self.row_mut(id).map(|row| &mut row.key),
            Role::HeaderValue(id) => self.row_mut(id).map(|row| &mut row.value),
            _ => None,
        }
    }
}

/// Scripted host page; see the module docs.
pub struct ScriptedFormPage {
    state: Mutex<FormState>,
    render_lag: usize,
    has_template: bool,
    has_add_header: bool,
    add_header_inert: bool,
    switchless_rows: Vec<u64>,
}

impl Default for ScriptedFormPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFormPage {
    /// Form on its first screen, with one default header row waiting on the
    /// details screen.
    pub fn new() -> Self {
        let mut state = FormState {
            step: FormStep::Template,
            name: Field::default(),
            endpoint: Field::default(),
            rows: Vec::new(),
            next_row: 0,
            pending: VecDeque::new(),
            journal: Vec::new(),
        };
        state.add_row();
        Self {
            state: Mutex::new(state),
            render_lag: 0,
            has_template: true,
            has_add_header: true,
            add_header_inert: false,
            switchless_rows: Vec::new(),
        }
    }

    /// Clicks take effect only after `queries` further queries.
    pub fn with_render_lag(mut self, queries: usize) -> Self {
        self.render_lag = queries;
        self
    }

    pub fn without_template(mut self) -> Self {
        self.has_template = false;
        self
    }

    pub fn without_add_header(mut self) -> Self {
        self.has_add_header = false;
        self
    }

    /// The add-header button is there but clicking it does nothing.
    pub fn with_inert_add_header(mut self) -> Self {
        self.add_header_inert = true;
        self
    }

    /// Render the `row`-th header row without its enable switch. Rows are
    /// numbered in creation order, the default row being 0.
    pub fn with_switchless_row(mut self, row: u64) -> Self {
        self.switchless_rows.push(row);
        self
    }

    pub fn without_default_row(self) -> Self {
        self.state.lock().rows.clear();
        self
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let state = self.state.lock();
        FormSnapshot {
            step: state.step,
            application_name: state.name.committed.clone(),
            endpoint: state.endpoint.committed.clone(),
            headers: state
                .rows
                .iter()
                .map(|row| FilledHeader {
                    name: row.key.committed.clone(),
                    value: row.value.committed.clone(),
                    enabled: row.enabled,
                })
                .collect(),
        }
    }

    /// Interactions in the order the page saw them.
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    fn render(&self, state: &FormState) -> Screen {
        let mut screen = Screen::new();
        match state.step {
            FormStep::Template => {
                screen.element(Role::CustomButton, "button", &[], "Custom App");
                if self.has_template {
                    screen.element(Role::TemplateButton, "button", &[], "zkFetchApp Template");
                }
            }
            FormStep::Name => {
                screen.input(Role::NameInput, &[("placeholder", "Application Name")]);
                screen.element(
                    Role::NextButton,
                    "button",
                    &[("class", "chakra-button stepper-next-button"), ("type", "button")],
                    "Next",
                );
            }
            FormStep::Details => {
                screen.input(
                    Role::EndpointInput,
                    &[("placeholder", "https://api.reclaimprotocol/my-endpoint")],
                );
                for row in &state.rows {
                    screen.open(Role::HeaderRow(row.id), "div", &[("class", "header-row")]);
                    screen.input(Role::HeaderKey(row.id), &[("placeholder", "Header key")]);
                    screen.input(Role::HeaderValue(row.id), &[("placeholder", "Header value")]);
                    if !self.switchless_rows.contains(&row.id) {
                        screen.input(
                            Role::HeaderSwitch(row.id),
                            &[("class", "chakra-switch__input"), ("type", "checkbox")],
                        );
                    }
                    screen.element(
                        Role::DeleteHeader(row.id),
                        "button",
                        &[("aria-label", "Delete header")],
                        "",
                    );
                    screen.close("div");
                }
                if self.has_add_header {
                    screen.element(
                        Role::AddHeader,
                        "button",
                        &[("aria-label", "Add header")],
                        "+",
                    );
                }
            }
        }
        screen.finish()
    }

    fn role_of(&self, state: &FormState, element: ElementHandle) -> Result<Role, FlowError> {
        self.render(state)
            .roles
            .into_iter()
            .find(|role| role.handle() == element)
            .ok_or(FlowError::StaleElement(element.0))
    }

    /// Match `anchor` against the rendered screen, below `scope` if given.
    fn select(
        &self,
        scope: Option<ElementHandle>,
        anchor: &Anchor,
    ) -> Result<Vec<ElementHandle>, FlowError> {
        let mut state = self.state.lock();
        state.tick();
        let document = Html::parse_document(&self.render(&state).html);
        let (selector, refine) = compile(anchor)?;

        let root = match scope {
            None => document.root_element(),
            Some(scope) => {
                let by_id = parse_selector(&format!("[{ID_ATTR}=\"{}\"]", scope.0))?;
                document
                    .select(&by_id)
                    .next()
                    .ok_or(FlowError::StaleElement(scope.0))?
            }
        };
        Ok(root
            .select(&selector)
            .filter(|element| refine.accepts(element))
            .filter_map(handle_of)
            .collect())
    }

    fn schedule(&self, state: &mut FormState, mutation: Mutation) {
        if self.render_lag == 0 {
            state.apply(mutation);
        } else {
            state.pending.push_back((self.render_lag, mutation));
        }
    }
}

#[async_trait]
impl HostPage for ScriptedFormPage {
    async fn query_all(&self, anchor: &Anchor) -> Result<Vec<ElementHandle>, FlowError> {
        self.select(None, anchor)
    }

    async fn query_within(
        &self,
        scope: ElementHandle,
        anchor: &Anchor,
    ) -> Result<Vec<ElementHandle>, FlowError> {
        self.select(Some(scope), anchor)
    }

    async fn click(&self, element: ElementHandle) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        let role = self.role_of(&state, element)?;
        state.journal.push(format!("click:{role:?}"));
        match role {
            Role::TemplateButton => self.schedule(&mut state, Mutation::OpenTemplate),
            Role::NextButton if !state.name.committed.is_empty() => {
                self.schedule(&mut state, Mutation::Advance)
            }
            Role::AddHeader if !self.add_header_inert => {
                self.schedule(&mut state, Mutation::AddRow)
            }
            Role::DeleteHeader(id) => self.schedule(&mut state, Mutation::DeleteRow(id)),
            Role::HeaderSwitch(id) => {
                if let Some(row) = state.row_mut(id) {
                    row.checked = !row.checked;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn set_value(&self, element: ElementHandle, value: &str) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        let role = self.role_of(&state, element)?;
        let field = state
            .field_mut(role)
            .ok_or_else(|| FlowError::Page(format!("{role:?} does not take a value")))?;
        field.dom = value.to_string();
        Ok(())
    }

    async fn dispatch(&self, element: ElementHandle, event: DomEvent) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        let role = self.role_of(&state, element)?;
        state.journal.push(format!("{}:{role:?}", event.as_str()));
        match (event, role) {
            (DomEvent::Change, Role::HeaderSwitch(id)) => {
                if let Some(row) = state.row_mut(id) {
                    row.enabled = row.checked;
                }
            }
            (DomEvent::Input, role) => {
                if let Some(field) = state.field_mut(role) {
                    field.commit();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
