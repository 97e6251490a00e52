//! Turns a correlated record plus the user's selection into a handoff.

use netclip_core_types::RequestRecord;
use netclip_event_bus::{HandoffRequest, MatchKind, ResponseMatch, ResponseRedaction};
use regex::Regex;

use crate::AgentError;

/// Build the handoff for `record`. The selection is matched literally: regex
/// metacharacters in it are escaped before it becomes the match and redaction
/// pattern.
pub fn build_handoff(
    record: &RequestRecord,
    selected_text: &str,
) -> Result<HandoffRequest, AgentError> {
    let pattern = literal_pattern(selected_text)?;
    Ok(HandoffRequest {
        url: record.url.clone(),
        method: record.method_or_default().to_string(),
        headers: record.request_headers.clone(),
        response_matches: vec![ResponseMatch {
            kind: MatchKind::Regex,
            value: pattern.clone(),
        }],
        response_redactions: vec![ResponseRedaction { regex: pattern }],
    })
}

fn literal_pattern(selected_text: &str) -> Result<String, AgentError> {
    let trimmed = selected_text.trim();
    if trimmed.is_empty() {
        return Err(AgentError::EmptySelection);
    }
    let pattern = regex::escape(trimmed);
    Regex::new(&pattern).map_err(|err| AgentError::InvalidPattern(err.to_string()))?;
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netclip_core_types::{HeaderPair, ResourceType};

    fn record() -> RequestRecord {
        RequestRecord::new("https://api.x/balance", 1.0, ResourceType::XmlHttpRequest)
            .with_request_headers(vec![HeaderPair::new("Authorization", "Bearer t")])
    }

    #[test]
    fn handoff_carries_record_parameters() {
        let handoff = build_handoff(&record(), "  1,024 coins ").unwrap();
        assert_eq!(handoff.url, "https://api.x/balance");
        assert_eq!(handoff.method, "GET");
        assert_eq!(handoff.headers, vec![HeaderPair::new("Authorization", "Bearer t")]);
        assert_eq!(handoff.response_matches[0].kind, MatchKind::Regex);
        assert_eq!(handoff.response_matches[0].value, "1,024 coins");
        assert_eq!(handoff.response_redactions[0].regex, "1,024 coins");
    }

    #[test]
    fn metacharacters_are_matched_literally() {
        let handoff = build_handoff(&record(), "$4.20 (USD)").unwrap();
        let pattern = &handoff.response_matches[0].value;
        assert_eq!(pattern, r"\$4\.20 \(USD\)");

        let re = Regex::new(pattern).unwrap();
        assert!(re.is_match("price: $4.20 (USD)"));
        assert!(!re.is_match("price: $4x20 USD"));
    }

    #[test]
    fn recorded_method_is_kept() {
        let handoff = build_handoff(&record().with_method("POST"), "x").unwrap();
        assert_eq!(handoff.method, "POST");
    }

    #[test]
    fn blank_selection_is_rejected() {
        assert!(matches!(
            build_handoff(&record(), "  "),
            Err(AgentError::EmptySelection)
        ));
    }
}
