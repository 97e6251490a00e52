//! Capture lifecycle and ownership of the request log.

use std::sync::Arc;

use netclip_core_types::RequestRecord;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::TapConfig;
use crate::correlate;
use crate::log::RequestLog;
use crate::observer::{
    EventSink, ExtraInfo, ListenerId, ListenerSpec, NetworkEvent, NetworkObserver, ObservedEvent,
    Phase, UrlFilter,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRecording,
    /// Recording is on; `failed` lists phases whose listener could not be
    /// registered, which leaves capture partially blind.
    Started { registered: usize, failed: Vec<Phase> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    AlreadyIdle,
    Stopped { cleared: usize },
}

/// Body re-read the owner should perform off the event loop. `session` ties
/// the result to the recording session that asked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyRequest {
    pub url: String,
    pub session: u64,
}

/// Owns the capture state and the log. Drive it from a single task: feed it
/// the receiver returned by [`CaptureController::new`] and hand body
/// re-reads back through [`CaptureController::apply_body`].
pub struct CaptureController {
    observer: Arc<dyn NetworkObserver>,
    sink: EventSink,
    config: TapConfig,
    state: CaptureState,
    listeners: Vec<ListenerId>,
    log: RequestLog,
    session: u64,
}

impl CaptureController {
    pub fn new(
        observer: Arc<dyn NetworkObserver>,
        config: TapConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ObservedEvent>) {
        let (sink, events) = mpsc::unbounded_channel();
        (
            Self {
                observer,
                sink,
                config,
                state: CaptureState::Idle,
                listeners: Vec::new(),
                log: RequestLog::new(),
                session: 0,
            },
            events,
        )
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    pub fn start_recording(&mut self) -> StartOutcome {
        if self.is_recording() {
            debug!("already recording, ignoring start request");
            return StartOutcome::AlreadyRecording;
        }
        self.state = CaptureState::Recording;
        self.session += 1;
        info!(session = self.session, "starting network capture");

        let filter = UrlFilter::new(self.config.url_patterns.clone());
        let specs = [
            ListenerSpec {
                phase: Phase::BeforeSendHeaders,
                filter: filter.clone(),
                extra: ExtraInfo {
                    request_headers: true,
                    extra_headers: true,
                    ..ExtraInfo::default()
                },
            },
            ListenerSpec {
                phase: Phase::HeadersReceived,
                filter: filter.clone(),
                extra: ExtraInfo {
                    response_headers: true,
                    ..ExtraInfo::default()
                },
            },
            ListenerSpec {
                phase: Phase::Completed,
                filter,
                extra: ExtraInfo::default(),
            },
        ];

        let mut failed = Vec::new();
        for spec in specs {
            let phase = spec.phase;
            match self.observer.add_listener(spec, self.sink.clone()) {
                Ok(id) => {
                    debug!(%phase, listener = %id, "listener registered");
                    self.listeners.push(id);
                }
                Err(err) => {
                    warn!(%phase, error = %err, "failed to register capture listener");
                    failed.push(phase);
                }
            }
        }

        StartOutcome::Started {
            registered: self.listeners.len(),
            failed,
        }
    }

    pub fn stop_recording(&mut self) -> StopOutcome {
        if !self.is_recording() {
            return StopOutcome::AlreadyIdle;
        }
        self.state = CaptureState::Idle;
        for id in self.listeners.drain(..) {
            if let Err(err) = self.observer.remove_listener(id) {
                warn!(listener = %id, error = %err, "failed to remove capture listener");
            }
        }
        let cleared = self.log.clear();
        info!(session = self.session, cleared, "stopped network capture");
        StopOutcome::Stopped { cleared }
    }

    /// Apply one delivery. Deliveries from listeners that are no longer
    /// registered (late arrivals after a stop) are discarded.
    pub fn ingest(&mut self, event: ObservedEvent) -> Option<BodyRequest> {
        if !self.is_recording() || !self.listeners.contains(&event.listener) {
            debug!(url = %event.details.url, "discarding delivery from inactive listener");
            return None;
        }
        let details = event.details;
        match details.phase {
            Phase::BeforeSendHeaders => {
                self.on_before_send(details);
                None
            }
            Phase::HeadersReceived => {
                self.on_headers_received(details);
                None
            }
            Phase::Completed => self.on_completed(details),
        }
    }

    /// Store a re-fetched body on the first record with `url`. Bodies from an
    /// earlier recording session are dropped.
    pub fn apply_body(&mut self, request: &BodyRequest, body: String) -> bool {
        if !self.is_recording() || request.session != self.session {
            debug!(url = %request.url, "discarding body from a finished session");
            return false;
        }
        match self.log.first_by_url_mut(&request.url) {
            Some(record) => {
                record.response_body = Some(body);
                debug!(url = %request.url, "captured response body");
                true
            }
            None => false,
        }
    }

    pub fn find_match(&self, search_text: &str) -> Option<&RequestRecord> {
        match correlate::locate(&self.log, search_text) {
            Some(hit) => {
                debug!(
                    url = %hit.record.url,
                    index = hit.index,
                    source = ?hit.source,
                    "search text correlated"
                );
                Some(hit.record)
            }
            None => None,
        }
    }

    fn on_before_send(&mut self, details: NetworkEvent) {
        let mut record = RequestRecord::new(details.url, details.time_stamp, details.resource_type)
            .with_request_headers(details.request_headers.unwrap_or_default());
        record.method = details.method;
        record.status_code = details.status_code;
        if record.request_header("cookie").is_none() {
            debug!(url = %record.url, "no cookie header on captured request");
        }
        debug!(url = %record.url, "captured request");
        self.log.push(record);
        debug!(total = self.log.len(), "request log size");
    }

    fn on_headers_received(&mut self, details: NetworkEvent) {
        match self.log.first_by_url_mut(&details.url) {
            Some(record) => {
                record.response_headers = Some(details.response_headers.unwrap_or_default());
                if details.status_code.is_some() {
                    record.status_code = details.status_code;
                }
            }
            None => debug!(url = %details.url, "response headers for unknown request"),
        }
    }

    fn on_completed(&mut self, details: NetworkEvent) -> Option<BodyRequest> {
        if !self.config.fetch_bodies || !details.resource_type.is_xhr_like() {
            return None;
        }
        self.log.first_by_url_mut(&details.url)?;
        Some(BodyRequest {
            url: details.url,
            session: self.session,
        })
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        for id in self.listeners.drain(..) {
            let _ = self.observer.remove_listener(id);
        }
    }
}
