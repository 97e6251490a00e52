//! Contract with the privileged network-observer API.
//!
//! Listeners are registered per [`Phase`] with a URL filter and an
//! [`ExtraInfo`] visibility spec. Every delivery is pushed into the sink the
//! listener was registered with, tagged with the listener id so consumers can
//! drop deliveries from listeners they already removed.

use std::fmt;

use netclip_core_types::{HeaderPair, ResourceType};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::TapError;

/// Pattern matching every URL with a web scheme.
pub const ALL_URLS: &str = "<all_urls>";

const ALL_URLS_SCHEMES: &[&str] = &["http:", "https:", "ws:", "wss:", "ftp:", "file:", "urn:"];

/// Headers only visible to listeners that ask for `extra_headers`.
const EXTRA_HEADERS: &[&str] = &[
    "accept-encoding",
    "accept-language",
    "cookie",
    "referer",
    "set-cookie",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    BeforeSendHeaders,
    HeadersReceived,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::BeforeSendHeaders => "before_send_headers",
            Phase::HeadersReceived => "headers_received",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Which header lists a listener is allowed to see.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub request_headers: bool,
    pub response_headers: bool,
    pub extra_headers: bool,
}

/// URL patterns a listener is restricted to. `*` matches any run of characters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UrlFilter {
    pub patterns: Vec<String>,
}

impl UrlFilter {
    pub fn all_urls() -> Self {
        Self {
            patterns: vec![ALL_URLS.to_string()],
        }
    }

    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            if pattern == ALL_URLS {
                ALL_URLS_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
            } else {
                glob_match(pattern, url)
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListenerSpec {
    pub phase: Phase,
    pub filter: UrlFilter,
    pub extra: ExtraInfo,
}

/// Per-phase details as reported by the observer API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    pub phase: Phase,
    pub url: String,
    pub time_stamp: f64,
    #[serde(rename = "type", default)]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Vec<HeaderPair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderPair>>,
}

impl NetworkEvent {
    pub fn new(
        phase: Phase,
        url: impl Into<String>,
        time_stamp: f64,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            phase,
            url: url.into(),
            time_stamp,
            resource_type,
            method: None,
            status_code: None,
            request_headers: None,
            response_headers: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_request_headers(mut self, headers: Vec<HeaderPair>) -> Self {
        self.request_headers = Some(headers);
        self
    }

    pub fn with_response_headers(mut self, headers: Vec<HeaderPair>) -> Self {
        self.response_headers = Some(headers);
        self
    }

    /// Copy of the details restricted to what `extra` makes visible.
    pub fn visible_to(&self, extra: &ExtraInfo) -> NetworkEvent {
        let mut details = self.clone();
        details.request_headers = if extra.request_headers {
            details
                .request_headers
                .map(|headers| strip_extra(headers, extra.extra_headers))
        } else {
            None
        };
        details.response_headers = if extra.response_headers {
            details
                .response_headers
                .map(|headers| strip_extra(headers, extra.extra_headers))
        } else {
            None
        };
        details
    }
}

/// A delivery to one listener.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedEvent {
    pub listener: ListenerId,
    pub details: NetworkEvent,
}

pub type EventSink = mpsc::UnboundedSender<ObservedEvent>;

/// Registration surface of the observer API.
pub trait NetworkObserver: Send + Sync {
    fn add_listener(&self, spec: ListenerSpec, sink: EventSink) -> Result<ListenerId, TapError>;
    fn remove_listener(&self, id: ListenerId) -> Result<(), TapError>;
}

fn strip_extra(headers: Vec<HeaderPair>, keep_extra: bool) -> Vec<HeaderPair> {
    if keep_extra {
        return headers;
    }
    headers
        .into_iter()
        .filter(|header| {
            !EXTRA_HEADERS
                .iter()
                .any(|name| header.name.eq_ignore_ascii_case(name))
        })
        .collect()
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
