//! Core types for the handoff sequence

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the sequencer addresses an element on the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// CSS selector
    Css(String),

    /// Element of `tag` whose text content contains `text`
    TextContains { tag: String, text: String },

    /// Element of `tag` whose attribute `name` equals `value`
    Attribute {
        tag: String,
        name: String,
        value: String,
    },
}

impl Anchor {
    pub fn css(selector: impl Into<String>) -> Self {
        Anchor::Css(selector.into())
    }

    pub fn text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Anchor::TextContains {
            tag: tag.into(),
            text: text.into(),
        }
    }

    pub fn placeholder(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Anchor::Attribute {
            tag: tag.into(),
            name: "placeholder".to_string(),
            value: value.into(),
        }
    }

    pub fn aria_label(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Anchor::Attribute {
            tag: tag.into(),
            name: "aria-label".to_string(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Css(selector) => f.write_str(selector),
            Anchor::TextContains { tag, text } => write!(f, "{tag}:contains({text:?})"),
            Anchor::Attribute { tag, name, value } => write!(f, "{tag}[{name}={value:?}]"),
        }
    }
}

/// Opaque reference to an element of a host page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

/// Events the sequencer dispatches after mutating an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEvent {
    Input,
    Change,
}

impl DomEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
        }
    }
}

/// Stages of the handoff sequence, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    OpenTemplate,
    NameApplication,
    Advance,
    FillEndpoint,
    ClearDefaultHeader,
    AddHeaderRows,
    FillHeaders,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::OpenTemplate => "open_template",
            Stage::NameApplication => "name_application",
            Stage::Advance => "advance",
            Stage::FillEndpoint => "fill_endpoint",
            Stage::ClearDefaultHeader => "clear_default_header",
            Stage::AddHeaderRows => "add_header_rows",
            Stage::FillHeaders => "fill_headers",
        }
    }

    /// Stage that follows this one. The header stages only run when
    /// `fill_headers` is on.
    pub fn next(self, fill_headers: bool) -> Option<Stage> {
        match self {
            Stage::OpenTemplate => Some(Stage::NameApplication),
            Stage::NameApplication => Some(Stage::Advance),
            Stage::Advance => Some(Stage::FillEndpoint),
            Stage::FillEndpoint if fill_headers => Some(Stage::ClearDefaultHeader),
            Stage::FillEndpoint => None,
            Stage::ClearDefaultHeader => Some(Stage::AddHeaderRows),
            Stage::AddHeaderRows => Some(Stage::FillHeaders),
            Stage::FillHeaders => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SequenceStatus {
    Completed,
    Aborted { stage: Stage, reason: String },
}

/// What a sequence run did to the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// How the run ended
    pub status: SequenceStatus,

    /// Stages that ran to completion, in order
    pub completed: Vec<Stage>,

    /// Header rows filled in
    pub headers_filled: usize,

    /// Headers left out because the page offered no row for them
    pub headers_skipped: usize,
}

impl SequenceReport {
    pub(crate) fn new() -> Self {
        Self {
            status: SequenceStatus::Completed,
            completed: Vec::new(),
            headers_filled: 0,
            headers_skipped: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SequenceStatus::Completed
    }

    pub fn aborted_at(&self) -> Option<Stage> {
        match &self.status {
            SequenceStatus::Aborted { stage, .. } => Some(*stage),
            SequenceStatus::Completed => None,
        }
    }
}
