//! The externally owned page the sequencer drives

use async_trait::async_trait;

use crate::errors::FlowError;
use crate::types::{Anchor, DomEvent, ElementHandle};

/// DOM access inside the handoff tab.
#[async_trait]
pub trait HostPage: Send + Sync {
    /// Elements currently matching `anchor`, in document order.
    async fn query_all(&self, anchor: &Anchor) -> Result<Vec<ElementHandle>, FlowError>;

    /// Descendants of `scope` matching `anchor`, in document order.
    async fn query_within(
        &self,
        scope: ElementHandle,
        anchor: &Anchor,
    ) -> Result<Vec<ElementHandle>, FlowError>;

    async fn click(&self, element: ElementHandle) -> Result<(), FlowError>;

    /// Assign the element's value without notifying the page.
    async fn set_value(&self, element: ElementHandle, value: &str) -> Result<(), FlowError>;

    /// Dispatch a bubbling event at the element.
    async fn dispatch(&self, element: ElementHandle, event: DomEvent) -> Result<(), FlowError>;

    /// Set the value and raise `input` so the page's own state picks it up.
    async fn fill(&self, element: ElementHandle, value: &str) -> Result<(), FlowError> {
        self.set_value(element, value).await?;
        self.dispatch(element, DomEvent::Input).await
    }

    async fn count(&self, anchor: &Anchor) -> Result<usize, FlowError> {
        Ok(self.query_all(anchor).await?.len())
    }

    async fn first_within(
        &self,
        scope: ElementHandle,
        anchor: &Anchor,
    ) -> Result<Option<ElementHandle>, FlowError> {
        Ok(self.query_within(scope, anchor).await?.first().copied())
    }
}
