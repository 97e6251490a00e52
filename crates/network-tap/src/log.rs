//! In-memory ordered store of captured exchanges.

use netclip_core_types::RequestRecord;

/// Records in capture order. Owned by the capture controller; everyone else
/// reads through `&RequestLog`.
#[derive(Clone, Debug, Default)]
pub struct RequestLog {
    records: Vec<RequestRecord>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    /// Most recent first.
    pub fn iter_recent(&self) -> impl Iterator<Item = &RequestRecord> {
        self.records.iter().rev()
    }

    pub(crate) fn push(&mut self, record: RequestRecord) {
        self.records.push(record);
    }

    /// Later phases address records by URL and always hit the first one in
    /// log order, even when several in-flight exchanges share it.
    pub(crate) fn first_by_url_mut(&mut self, url: &str) -> Option<&mut RequestRecord> {
        self.records.iter_mut().find(|record| record.url == url)
    }

    pub(crate) fn clear(&mut self) -> usize {
        let cleared = self.records.len();
        self.records.clear();
        cleared
    }
}

impl FromIterator<RequestRecord> for RequestLog {
    fn from_iter<I: IntoIterator<Item = RequestRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
