//! Pairing of header rows with the headers they receive

use netclip_core_types::HeaderPair;

use crate::types::ElementHandle;

/// Inputs found inside one header row container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowElements {
    pub key: Option<ElementHandle>,
    pub value: Option<ElementHandle>,
    pub switch: Option<ElementHandle>,
}

/// One header row: its inputs, its optional enable switch, and the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRow {
    pub key: ElementHandle,
    pub value: ElementHandle,
    pub switch: Option<ElementHandle>,
    pub header: HeaderPair,
}

/// Ordered row assignment, built once from the page's row containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRowPlan {
    rows: Vec<HeaderRow>,
    skipped: usize,
}

impl HeaderRowPlan {
    /// Give each header the next row that has both a key and a value input.
    /// A row's switch always stays with its own row. Headers left without a
    /// row are skipped.
    pub fn pair(containers: &[RowElements], headers: &[HeaderPair]) -> Self {
        let mut usable = containers
            .iter()
            .filter_map(|row| Some((row.key?, row.value?, row.switch)));
        let mut plan = Self::default();
        for header in headers {
            match usable.next() {
                Some((key, value, switch)) => plan.rows.push(HeaderRow {
                    key,
                    value,
                    switch,
                    header: header.clone(),
                }),
                None => plan.skipped += 1,
            }
        }
        plan
    }

    pub fn rows(&self) -> &[HeaderRow] {
        &self.rows
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: u64, value: u64, switch: Option<u64>) -> RowElements {
        RowElements {
            key: Some(ElementHandle(key)),
            value: Some(ElementHandle(value)),
            switch: switch.map(ElementHandle),
        }
    }

    #[test]
    fn switches_stay_with_their_row() {
        let headers = vec![HeaderPair::new("a", "1"), HeaderPair::new("b", "2")];
        let plan = HeaderRowPlan::pair(&[row(100, 101, None), row(110, 111, Some(112))], &headers);

        assert_eq!(plan.rows().len(), 2);
        assert_eq!(plan.rows()[0].key, ElementHandle(100));
        assert_eq!(plan.rows()[0].switch, None);
        assert_eq!(plan.rows()[1].value, ElementHandle(111));
        assert_eq!(plan.rows()[1].switch, Some(ElementHandle(112)));
        assert_eq!(plan.rows()[1].header.name, "b");
        assert_eq!(plan.skipped(), 0);
    }

    #[test]
    fn incomplete_rows_are_passed_over() {
        let headers = vec![
            HeaderPair::new("a", "1"),
            HeaderPair::new("b", "2"),
            HeaderPair::new("c", "3"),
        ];
        let broken = RowElements {
            key: Some(ElementHandle(1)),
            ..RowElements::default()
        };
        let plan = HeaderRowPlan::pair(&[broken, row(10, 11, Some(12))], &headers);

        assert_eq!(plan.rows().len(), 1);
        assert_eq!(plan.rows()[0].key, ElementHandle(10));
        assert_eq!(plan.rows()[0].header.name, "a");
        assert_eq!(plan.skipped(), 2);
    }
}
