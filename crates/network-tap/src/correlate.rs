//! Maps a user-chosen text fragment back to a captured exchange.
//!
//! Recency is the only relevance signal: the log is scanned newest first and
//! the first record mentioning the text wins. Matching is a case-insensitive
//! substring test over the URL, each response header (as `value + " " + name`)
//! and the re-fetched body.

use netclip_core_types::RequestRecord;

use crate::log::RequestLog;

/// Field of the record that contained the search text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchSource {
    Url,
    ResponseHeader { name: String },
    ResponseBody,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Correlation<'a> {
    pub record: &'a RequestRecord,
    /// Position in capture order.
    pub index: usize,
    pub source: MatchSource,
}

pub fn find_match<'a>(log: &'a RequestLog, search_text: &str) -> Option<&'a RequestRecord> {
    locate(log, search_text).map(|hit| hit.record)
}

pub fn locate<'a>(log: &'a RequestLog, search_text: &str) -> Option<Correlation<'a>> {
    if search_text.trim().is_empty() {
        return None;
    }
    let needle = search_text.to_lowercase();
    let total = log.len();
    log.iter_recent()
        .enumerate()
        .find_map(|(offset, record)| {
            match_source(record, &needle).map(|source| Correlation {
                record,
                index: total - 1 - offset,
                source,
            })
        })
}

fn match_source(record: &RequestRecord, needle: &str) -> Option<MatchSource> {
    if record.url.to_lowercase().contains(needle) {
        return Some(MatchSource::Url);
    }
    if let Some(headers) = &record.response_headers {
        let hit = headers.iter().find(|header| {
            format!("{} {}", header.value, header.name)
                .to_lowercase()
                .contains(needle)
        });
        if let Some(header) = hit {
            return Some(MatchSource::ResponseHeader {
                name: header.name.clone(),
            });
        }
    }
    match &record.response_body {
        Some(body) if body.to_lowercase().contains(needle) => Some(MatchSource::ResponseBody),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netclip_core_types::{HeaderPair, ResourceType};

    fn record(url: &str, ts: f64) -> RequestRecord {
        RequestRecord::new(url, ts, ResourceType::XmlHttpRequest)
    }

    #[test]
    fn body_match_picks_the_only_candidate() {
        let log: RequestLog = vec![
            record("https://x/a", 1.0).with_response_body("token=42"),
            record("https://x/b", 2.0),
        ]
        .into_iter()
        .collect();

        let hit = locate(&log, "42").expect("match");
        assert_eq!(hit.record.url, "https://x/a");
        assert_eq!(hit.index, 0);
        assert_eq!(hit.source, MatchSource::ResponseBody);
    }

    #[test]
    fn most_recent_qualifying_record_wins() {
        let log: RequestLog = vec![
            record("https://x/1", 1.0).with_response_body("balance 900"),
            record("https://x/2", 2.0).with_response_body("nothing here"),
            record("https://x/3", 3.0).with_response_body("BALANCE 900"),
        ]
        .into_iter()
        .collect();

        let hit = find_match(&log, "balance").expect("match");
        assert_eq!(hit.timestamp, 3.0);
    }

    #[test]
    fn header_value_and_name_are_searched_together() {
        let log: RequestLog = vec![record("https://x/a", 1.0)
            .with_response_headers(vec![HeaderPair::new("X-Request-Id", "abc123")])]
        .into_iter()
        .collect();

        let hit = locate(&log, "ABC123 x-request").expect("match");
        assert_eq!(
            hit.source,
            MatchSource::ResponseHeader {
                name: "X-Request-Id".into()
            }
        );
    }

    #[test]
    fn url_is_checked_before_other_fields() {
        let log: RequestLog = vec![record("https://api.x/users/42", 1.0).with_response_body("42")]
            .into_iter()
            .collect();
        assert_eq!(locate(&log, "42").unwrap().source, MatchSource::Url);
    }

    #[test]
    fn blank_or_missing_text_is_not_found() {
        let empty = RequestLog::new();
        assert!(find_match(&empty, "anything").is_none());

        let log: RequestLog = vec![record("https://x/a", 1.0)].into_iter().collect();
        assert!(find_match(&log, "   ").is_none());
        assert!(find_match(&log, "absent").is_none());
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_needle() {
        let log: RequestLog = vec![record("https://x/foo", 1.0).with_response_body("a bar b")]
            .into_iter()
            .collect();
        assert!(find_match(&log, "foo ").is_none());
        assert!(find_match(&log, " bar ").is_some());
    }

    #[test]
    fn repeated_searches_agree() {
        let log: RequestLog = vec![
            record("https://x/a", 1.0).with_response_body("id=7"),
            record("https://x/b", 2.0).with_response_body("id=7"),
        ]
        .into_iter()
        .collect();
        assert_eq!(find_match(&log, "id=7"), find_match(&log, "id=7"));
    }
}
