//! Message bus connecting the isolated netclip contexts.
//!
//! Contexts never share memory. Each one registers an [`Endpoint`] and drains
//! its [`Mailbox`]; callers address it through [`MessageBus::request`] (which
//! always resolves to a [`Delivery`]) or fire-and-forget [`MessageBus::post`].

pub mod config;
pub mod protocol;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use netclip_core_types::TabId;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

pub use config::BusConfig;
pub use protocol::{
    Ack, HandoffRequest, MatchKind, Message, Reply, ResponseMatch, ResponseRedaction, SearchReply,
};

/// Addressable execution context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Endpoint {
    /// Privileged context owning capture.
    Background,
    /// Content context injected into a tab.
    Tab(TabId),
    /// Extension UI. Sends only; never registers a mailbox.
    Popup,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Background => f.write_str("background"),
            Endpoint::Tab(tab) => write!(f, "{tab}"),
            Endpoint::Popup => f.write_str("popup"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("endpoint {0} is not registered")]
    Unreachable(Endpoint),
    #[error("endpoint {0} is already registered")]
    AlreadyRegistered(Endpoint),
}

/// Tagged outcome of a request. A responder that drops the envelope without
/// answering yields `NoReply`; it is never left hanging.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery<T> {
    Replied(T),
    NoReply,
    TimedOut,
    Unreachable,
}

impl<T> Delivery<T> {
    pub fn replied(self) -> Option<T> {
        match self {
            Delivery::Replied(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_replied(&self) -> bool {
        matches!(self, Delivery::Replied(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Delivery<U> {
        match self {
            Delivery::Replied(value) => Delivery::Replied(f(value)),
            Delivery::NoReply => Delivery::NoReply,
            Delivery::TimedOut => Delivery::TimedOut,
            Delivery::Unreachable => Delivery::Unreachable,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Delivery::Replied(_) => "replied",
            Delivery::NoReply => "no_reply",
            Delivery::TimedOut => "timed_out",
            Delivery::Unreachable => "unreachable",
        }
    }
}

/// A message in flight, plus the reply slot when the sender awaits one.
#[derive(Debug)]
pub struct Envelope {
    pub id: Uuid,
    pub from: Endpoint,
    pub message: Message,
    reply: Option<oneshot::Sender<Reply>>,
}

impl Envelope {
    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the sender. Returns `false` when nobody is waiting any more
    /// (posted message, timed out caller, or already answered).
    pub fn respond(&mut self, reply: Reply) -> bool {
        match self.reply.take() {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }
}

/// Receiving half owned by exactly one context.
pub struct Mailbox {
    endpoint: Endpoint,
    rx: mpsc::Receiver<Envelope>,
}

impl Mailbox {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Sending surface used by contexts; lets agents run against a stub bus.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn request(&self, from: Endpoint, to: Endpoint, message: Message) -> Delivery<Reply>;
    async fn post(&self, from: Endpoint, to: Endpoint, message: Message) -> Result<(), BusError>;
}

/// In-process router keyed by endpoint.
pub struct MessageBus {
    routes: DashMap<Endpoint, mpsc::Sender<Envelope>>,
    config: BusConfig,
}

impl MessageBus {
    pub fn new(config: BusConfig) -> Arc<Self> {
        Arc::new(Self {
            routes: DashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn register(&self, endpoint: Endpoint) -> Result<Mailbox, BusError> {
        if let Some(existing) = self.routes.get(&endpoint) {
            if !existing.is_closed() {
                return Err(BusError::AlreadyRegistered(endpoint));
            }
        }
        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity.max(1));
        self.routes.insert(endpoint, tx);
        debug!(%endpoint, "endpoint registered");
        Ok(Mailbox { endpoint, rx })
    }

    pub fn unregister(&self, endpoint: Endpoint) -> bool {
        self.routes.remove(&endpoint).is_some()
    }

    pub fn is_registered(&self, endpoint: Endpoint) -> bool {
        self.routes
            .get(&endpoint)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub async fn request_with_timeout(
        &self,
        from: Endpoint,
        to: Endpoint,
        message: Message,
        timeout: Duration,
    ) -> Delivery<Reply> {
        let Some(route) = self.route(to) else {
            debug!(%from, %to, kind = message.kind(), "request to unknown endpoint");
            return Delivery::Unreachable;
        };

        let kind = message.kind();
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope {
            id: Uuid::new_v4(),
            from,
            message,
            reply: Some(tx),
        };

        let outcome = tokio::time::timeout(timeout, async move {
            if route.send(envelope).await.is_err() {
                return Delivery::Unreachable;
            }
            match rx.await {
                Ok(reply) => Delivery::Replied(reply),
                Err(_) => Delivery::NoReply,
            }
        })
        .await
        .unwrap_or(Delivery::TimedOut);

        match &outcome {
            Delivery::Replied(_) => debug!(%from, %to, kind, "request answered"),
            Delivery::Unreachable => {
                self.prune(to);
                warn!(%from, %to, kind, "endpoint mailbox closed");
            }
            other => debug!(%from, %to, kind, outcome = other.label(), "request unanswered"),
        }
        outcome
    }

    fn route(&self, endpoint: Endpoint) -> Option<mpsc::Sender<Envelope>> {
        self.routes.get(&endpoint).map(|entry| entry.value().clone())
    }

    fn prune(&self, endpoint: Endpoint) {
        self.routes.remove_if(&endpoint, |_, tx| tx.is_closed());
    }
}

#[async_trait]
impl MessageSender for MessageBus {
    async fn request(&self, from: Endpoint, to: Endpoint, message: Message) -> Delivery<Reply> {
        let timeout = self.config.request_timeout();
        self.request_with_timeout(from, to, message, timeout).await
    }

    async fn post(&self, from: Endpoint, to: Endpoint, message: Message) -> Result<(), BusError> {
        let route = self.route(to).ok_or(BusError::Unreachable(to))?;
        let envelope = Envelope {
            id: Uuid::new_v4(),
            from,
            message,
            reply: None,
        };
        if route.send(envelope).await.is_err() {
            self.prune(to);
            return Err(BusError::Unreachable(to));
        }
        Ok(())
    }
}
