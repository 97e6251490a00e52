//! Shared primitives for the netclip execution contexts.
//!
//! The exchange data model lives here because it crosses every context
//! boundary: the capture controller produces it, the message bus carries it
//! and the selection agent turns it into a handoff.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Method assumed when the observer never reported one.
pub const DEFAULT_METHOD: &str = "GET";

/// Identifier of a browser tab hosting a page context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TabId(pub Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab:{}", self.0.simple())
    }
}

/// A single name/value header entry. Order is significant, duplicates allowed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

impl HeaderPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Classification reported by the network observer for an exchange.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    XmlHttpRequest,
    Ping,
    CspReport,
    Media,
    WebSocket,
    #[default]
    Other,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::MainFrame => "main_frame",
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Object => "object",
            ResourceType::XmlHttpRequest => "xmlhttprequest",
            ResourceType::Ping => "ping",
            ResourceType::CspReport => "csp_report",
            ResourceType::Media => "media",
            ResourceType::WebSocket => "websocket",
            ResourceType::Other => "other",
        }
    }

    /// Parses an observer type string; anything unrecognised is `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "main_frame" => ResourceType::MainFrame,
            "sub_frame" => ResourceType::SubFrame,
            "stylesheet" => ResourceType::Stylesheet,
            "script" => ResourceType::Script,
            "image" => ResourceType::Image,
            "font" => ResourceType::Font,
            "object" => ResourceType::Object,
            "xmlhttprequest" => ResourceType::XmlHttpRequest,
            "ping" => ResourceType::Ping,
            "csp_report" => ResourceType::CspReport,
            "media" => ResourceType::Media,
            "websocket" => ResourceType::WebSocket,
            _ => ResourceType::Other,
        }
    }

    /// Script-initiated data exchanges; the only ones whose bodies get re-read.
    pub fn is_xhr_like(self) -> bool {
        matches!(self, ResourceType::XmlHttpRequest)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ResourceType::parse(&raw))
    }
}

/// One observed network exchange, mutated in place as later phases arrive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub url: String,
    pub timestamp: f64,
    pub request_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub request_headers: Vec<HeaderPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<HeaderPair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
}

impl RequestRecord {
    pub fn new(url: impl Into<String>, timestamp: f64, request_type: ResourceType) -> Self {
        Self {
            url: url.into(),
            timestamp,
            request_type,
            method: None,
            status_code: None,
            request_headers: Vec::new(),
            response_headers: None,
            response_body: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_request_headers(mut self, headers: Vec<HeaderPair>) -> Self {
        self.request_headers = headers;
        self
    }

    pub fn with_response_headers(mut self, headers: Vec<HeaderPair>) -> Self {
        self.response_headers = Some(headers);
        self
    }

    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// The recorded method, or [`DEFAULT_METHOD`] when the observer omitted it.
    pub fn method_or_default(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_METHOD)
    }

    /// Case-insensitive lookup over the request headers.
    pub fn request_header(&self, name: &str) -> Option<&HeaderPair> {
        self.request_headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_wire_names() {
        let record = RequestRecord::new("https://x/a", 12.5, ResourceType::XmlHttpRequest)
            .with_request_headers(vec![HeaderPair::new("Accept", "*/*")]);
        let json = serde_json::to_value(&record).expect("serialize record");

        assert_eq!(json["requestType"], "xmlhttprequest");
        assert_eq!(json["requestHeaders"][0]["name"], "Accept");
        assert!(json.get("responseHeaders").is_none());
        assert!(json.get("statusCode").is_none());
    }

    #[test]
    fn unknown_resource_type_falls_back_to_other() {
        let parsed: ResourceType = serde_json::from_str("\"beacon\"").expect("parse type");
        assert_eq!(parsed, ResourceType::Other);
    }

    #[test]
    fn method_defaults_to_get() {
        let record = RequestRecord::new("https://x/a", 0.0, ResourceType::Script);
        assert_eq!(record.method_or_default(), "GET");
        assert_eq!(record.with_method("POST").method_or_default(), "POST");
    }

    #[test]
    fn request_header_lookup_ignores_case() {
        let record = RequestRecord::new("https://x/a", 0.0, ResourceType::Script)
            .with_request_headers(vec![HeaderPair::new("Cookie", "sid=1")]);
        assert!(record.request_header("cookie").is_some());
        assert!(record.request_header("authorization").is_none());
    }
}
