//! All netclip contexts wired together in one process: the bus, the
//! background context, simulated tabs and the observer hub that feeds them.

use std::sync::Arc;

use netclip_core_types::TabId;
use netclip_event_bus::{Delivery, Endpoint, Message, MessageBus, MessageSender, Reply};
use network_tap::{BodyFetcher, NetworkEvent, NetworkHub};
use selection_agent::{spawn_tab_context, PageSurface, SelectionAgent, TabContext};
use tracing::info;

use crate::background::{spawn_background, BackgroundDeps, BackgroundHandle};
use crate::config::Config;
use crate::errors::AppError;
use crate::tabs::SimTabHost;

/// Capacity of a tab context's page-event queue.
const PAGE_EVENT_CAPACITY: usize = 32;

pub struct Session {
    config: Config,
    bus: Arc<MessageBus>,
    hub: Arc<NetworkHub>,
    tabs: Arc<SimTabHost>,
    background: BackgroundHandle,
}

impl Session {
    pub fn start(
        config: Config,
        fetcher: Arc<dyn BodyFetcher>,
        tabs: SimTabHost,
    ) -> Result<Self, AppError> {
        let bus = MessageBus::new(config.bus.clone());
        let hub = Arc::new(NetworkHub::new());
        let tabs = Arc::new(tabs);
        let background = spawn_background(
            &config,
            BackgroundDeps {
                bus: bus.clone(),
                observer: hub.clone(),
                fetcher,
                tabs: tabs.clone(),
            },
        )?;
        info!("session started");
        Ok(Self {
            config,
            bus,
            hub,
            tabs,
            background,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn hub(&self) -> &NetworkHub {
        &self.hub
    }

    pub fn tabs(&self) -> &SimTabHost {
        &self.tabs
    }

    pub fn background(&mut self) -> &mut BackgroundHandle {
        &mut self.background
    }

    /// Inject a selection agent into a fresh observed tab.
    pub fn attach_tab(
        &self,
        surface: Arc<dyn PageSurface>,
    ) -> Result<(TabId, TabContext), AppError> {
        let tab = TabId::new();
        let mailbox = self.bus.register(Endpoint::Tab(tab))?;
        let agent = SelectionAgent::new(tab, self.config.agent.clone(), surface);
        let context = spawn_tab_context(agent, mailbox, self.bus.clone(), PAGE_EVENT_CAPACITY);
        Ok((tab, context))
    }

    /// What the popup sends: a request to the background and, when a tab is
    /// given, the same command to that tab.
    pub async fn popup(&self, message: Message, tab: Option<TabId>) -> Delivery<Reply> {
        if let Some(tab) = tab {
            let delivery = self
                .bus
                .request(Endpoint::Popup, Endpoint::Tab(tab), message.clone())
                .await;
            if !delivery.is_replied() {
                info!(%tab, outcome = delivery.label(), "tab did not acknowledge command");
            }
        }
        self.bus
            .request(Endpoint::Popup, Endpoint::Background, message)
            .await
    }

    pub async fn search(&self, text: &str) -> Delivery<Reply> {
        self.bus
            .request(
                Endpoint::Popup,
                Endpoint::Background,
                Message::SearchRequests {
                    text: text.to_string(),
                },
            )
            .await
    }

    /// Feed one observer event to every matching listener.
    pub fn observe(&self, event: &NetworkEvent) -> usize {
        self.hub.emit(event)
    }

    pub async fn shutdown(self) {
        let Session { background, .. } = self;
        background.shutdown().await;
        info!("session stopped");
    }
}
