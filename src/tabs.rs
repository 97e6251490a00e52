//! Tab management as seen by the background context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use handoff_flow::{HostPage, ScriptedFormPage};
use netclip_core_types::TabId;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::AppError;

#[async_trait]
pub trait TabHost: Send + Sync {
    /// Open a new tab at `url`; returns as soon as the tab exists.
    async fn open_tab(&self, url: &str) -> Result<TabId, AppError>;

    /// Resolve once the tab reports `complete`.
    async fn wait_complete(&self, tab: TabId, timeout: Duration) -> Result<(), AppError>;

    /// The loaded document of `tab`.
    fn host_page(&self, tab: TabId) -> Option<Arc<dyn HostPage>>;
}

type PageFactory = Box<dyn Fn(&str) -> ScriptedFormPage + Send + Sync>;

struct SimTab {
    url: String,
    opened_at: Instant,
    page: Arc<ScriptedFormPage>,
}

/// Tab host whose tabs load after a fixed delay and whose documents are
/// scripted form pages.
pub struct SimTabHost {
    tabs: DashMap<TabId, SimTab>,
    load_delay: Duration,
    factory: PageFactory,
}

impl Default for SimTabHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTabHost {
    pub fn new() -> Self {
        Self::with_factory(|_| ScriptedFormPage::new())
    }

    /// Build each tab's document from its URL.
    pub fn with_factory(
        factory: impl Fn(&str) -> ScriptedFormPage + Send + Sync + 'static,
    ) -> Self {
        Self {
            tabs: DashMap::new(),
            load_delay: Duration::ZERO,
            factory: Box::new(factory),
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Every open tab and its URL.
    pub fn opened(&self) -> Vec<(TabId, String)> {
        self.tabs
            .iter()
            .map(|entry| (*entry.key(), entry.value().url.clone()))
            .collect()
    }

    pub fn form(&self, tab: TabId) -> Option<Arc<ScriptedFormPage>> {
        self.tabs.get(&tab).map(|entry| entry.page.clone())
    }
}

#[async_trait]
impl TabHost for SimTabHost {
    async fn open_tab(&self, url: &str) -> Result<TabId, AppError> {
        let tab = TabId::new();
        let page = Arc::new((self.factory)(url));
        self.tabs.insert(
            tab,
            SimTab {
                url: url.to_string(),
                opened_at: Instant::now(),
                page,
            },
        );
        debug!(%tab, %url, "tab opened");
        Ok(tab)
    }

    async fn wait_complete(&self, tab: TabId, timeout: Duration) -> Result<(), AppError> {
        let opened_at = self
            .tabs
            .get(&tab)
            .map(|entry| entry.opened_at)
            .ok_or(AppError::UnknownTab(tab))?;
        let ready_at = opened_at + self.load_delay;
        let deadline = Instant::now() + timeout;
        if ready_at > deadline {
            tokio::time::sleep_until(deadline).await;
            return Err(AppError::TabLoadTimeout {
                tab,
                waited_ms: timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep_until(ready_at).await;
        debug!(%tab, "tab complete");
        Ok(())
    }

    fn host_page(&self, tab: TabId) -> Option<Arc<dyn HostPage>> {
        self.tabs
            .get(&tab)
            .map(|entry| entry.page.clone() as Arc<dyn HostPage>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tabs_complete_after_load_delay() {
        let host = SimTabHost::new().with_load_delay(Duration::from_millis(300));
        let tab = host.open_tab("https://handoff.test/new").await.unwrap();

        let started = Instant::now();
        host.wait_complete(tab, Duration::from_secs(1)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert!(host.host_page(tab).is_some());
        assert_eq!(host.opened(), vec![(tab, "https://handoff.test/new".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tab_times_out() {
        let host = SimTabHost::new().with_load_delay(Duration::from_secs(5));
        let tab = host.open_tab("https://handoff.test/new").await.unwrap();
        assert!(matches!(
            host.wait_complete(tab, Duration::from_secs(1)).await,
            Err(AppError::TabLoadTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_tab_is_an_error() {
        let host = SimTabHost::new();
        let tab = TabId::new();
        assert!(matches!(
            host.wait_complete(tab, Duration::from_secs(1)).await,
            Err(AppError::UnknownTab(t)) if t == tab
        ));
    }
}
