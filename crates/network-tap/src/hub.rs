//! In-process implementation of the network observer API.
//!
//! Feeds recorded or synthetic [`NetworkEvent`]s to registered listeners,
//! applying each listener's phase, URL filter and header visibility the way
//! the browser would.

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::observer::{
    EventSink, ListenerId, ListenerSpec, NetworkEvent, NetworkObserver, ObservedEvent, Phase,
};
use crate::TapError;

struct Listener {
    spec: ListenerSpec,
    sink: EventSink,
}

#[derive(Default)]
pub struct NetworkHub {
    listeners: DashMap<ListenerId, Listener>,
}

impl NetworkHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners_for(&self, phase: Phase) -> usize {
        self.listeners
            .iter()
            .filter(|entry| entry.value().spec.phase == phase)
            .count()
    }

    /// Deliver one observation; returns how many listeners received it.
    pub fn emit(&self, event: &NetworkEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.listeners.iter() {
            let listener = entry.value();
            if listener.spec.phase != event.phase || !listener.spec.filter.matches(&event.url) {
                continue;
            }
            let observed = ObservedEvent {
                listener: *entry.key(),
                details: event.visible_to(&listener.spec.extra),
            };
            if listener.sink.send(observed).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            debug!(listener = %id, "dropping listener with closed sink");
            self.listeners.remove(&id);
        }
        trace!(phase = %event.phase, url = %event.url, delivered, "network event emitted");
        delivered
    }
}

impl NetworkObserver for NetworkHub {
    fn add_listener(&self, spec: ListenerSpec, sink: EventSink) -> Result<ListenerId, TapError> {
        if spec.filter.patterns.is_empty() {
            return Err(TapError::ListenerRejected {
                phase: spec.phase,
                reason: "empty URL filter".to_string(),
            });
        }
        let id = ListenerId::new();
        debug!(listener = %id, phase = %spec.phase, "listener added");
        self.listeners.insert(id, Listener { spec, sink });
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) -> Result<(), TapError> {
        self.listeners
            .remove(&id)
            .map(|_| ())
            .ok_or(TapError::UnknownListener(id))
    }
}
