//! Wire contracts exchanged between contexts.
//!
//! Every message is an adjacently tagged `{ "type": ..., "payload": ... }`
//! envelope body; replies are plain JSON objects whose shape depends on the
//! request type.

use netclip_core_types::{HeaderPair, RequestRecord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    StartRecording,
    StopRecording,
    SearchRequests {
        #[serde(default)]
        text: String,
    },
    OpenHandoffPage { request: HandoffRequest },
}

impl Message {
    /// Wire name of the message type, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::StartRecording => "START_RECORDING",
            Message::StopRecording => "STOP_RECORDING",
            Message::SearchRequests { .. } => "SEARCH_REQUESTS",
            Message::OpenHandoffPage { .. } => "OPEN_HANDOFF_PAGE",
        }
    }
}

/// Reply body. `SearchReply` is tried first since it is the only shape with a
/// `found` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Search(SearchReply),
    Ack(Ack),
}

impl Reply {
    pub fn ack(success: bool) -> Self {
        Reply::Ack(Ack { success })
    }

    pub fn search(matching_request: Option<RequestRecord>) -> Self {
        Reply::Search(SearchReply {
            found: matching_request.is_some(),
            matching_request,
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            Reply::Ack(ack) => ack.success,
            Reply::Search(search) => search.found,
        }
    }

    pub fn into_search(self) -> Option<SearchReply> {
        match self {
            Reply::Search(search) => Some(search),
            Reply::Ack(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReply {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_request: Option<RequestRecord>,
}

/// Parameters replayed into the handoff page and later into the proof SDK.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<HeaderPair>,
    pub response_matches: Vec<ResponseMatch>,
    pub response_redactions: Vec<ResponseRedaction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Regex,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatch {
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseRedaction {
    pub regex: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use netclip_core_types::ResourceType;
    use serde_json::json;

    #[test]
    fn unit_messages_carry_only_a_type() {
        let value = serde_json::to_value(Message::StartRecording).unwrap();
        assert_eq!(value, json!({ "type": "START_RECORDING" }));
    }

    #[test]
    fn search_message_wraps_text_in_payload() {
        let value = serde_json::to_value(Message::SearchRequests {
            text: "token".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "type": "SEARCH_REQUESTS", "payload": { "text": "token" } })
        );
    }

    #[test]
    fn search_without_text_parses_as_blank() {
        let message: Message =
            serde_json::from_str(r#"{"type":"SEARCH_REQUESTS","payload":{}}"#).unwrap();
        assert_eq!(
            message,
            Message::SearchRequests {
                text: String::new()
            }
        );
    }

    #[test]
    fn not_found_reply_omits_matching_request() {
        let value = serde_json::to_value(Reply::search(None)).unwrap();
        assert_eq!(value, json!({ "found": false }));
    }

    #[test]
    fn replies_parse_back_into_the_right_shape() {
        let record = RequestRecord::new("https://x/a", 1.0, ResourceType::XmlHttpRequest);
        let raw = serde_json::to_string(&Reply::search(Some(record.clone()))).unwrap();
        let parsed: Reply = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.into_search().unwrap().matching_request, Some(record));

        let ack: Reply = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(ack, Reply::ack(true));
    }

    #[test]
    fn handoff_request_uses_camel_case_and_type_tag() {
        let request = HandoffRequest {
            url: "https://x/a".into(),
            method: "GET".into(),
            headers: vec![HeaderPair::new("Accept", "*/*")],
            response_matches: vec![ResponseMatch {
                kind: MatchKind::Regex,
                value: "42".into(),
            }],
            response_redactions: vec![ResponseRedaction { regex: "42".into() }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["responseMatches"][0]["type"], "regex");
        assert_eq!(value["responseRedactions"][0]["regex"], "42");
    }
}
