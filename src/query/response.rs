//! Response Paging
//!
//! Splits a query result into paged batches sized so one page fits a
//! configured maximum message size. The page row count derives from the
//! first row's estimated byte width rounded up to a power of two, so page
//! boundaries stay stable across pages of the same result.

use crate::record::RecordSet;

/// One page of a streamed query response.
#[derive(Debug, Clone)]
pub struct ResponsePage {
    pub page_index: usize,
    pub page_size: usize,
    pub max_page: usize,
    pub total_hits: usize,
    pub rows: RecordSet,
}

/// Rows per page for a result schema under a message-size budget.
pub fn page_row_count(results: &RecordSet, max_message_size: usize) -> usize {
    let row_bytes: usize = results
        .columns()
        .iter()
        .map(|c| c.physical_size())
        .sum::<usize>()
        .max(1);
    (max_message_size / row_bytes.next_power_of_two()).max(1)
}

/// Split a result into response pages. An empty result still yields one
/// page so the client learns `total_hits = 0`.
pub fn paginate(results: &RecordSet, max_message_size: usize) -> Vec<ResponsePage> {
    let total_hits = results.len();
    let page_size = page_row_count(results, max_message_size);
    let max_page = total_hits.div_ceil(page_size).max(1) - 1;

    (0..=max_page)
        .map(|page_index| ResponsePage {
            page_index,
            page_size,
            max_page,
            total_hits,
            rows: results.limit(page_size, page_index * page_size),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ColumnDef;
    use crate::value::{ColumnType, Value};

    fn result_set(rows: usize) -> RecordSet {
        let mut rs = RecordSet::new(vec![ColumnDef::new("x", ColumnType::Long, false)]);
        for i in 0..rows {
            rs.append_unchecked(i as u64 + 1, vec![Value::Long(i as i64)]);
        }
        rs
    }

    #[test]
    fn test_page_row_count_uses_power_of_two_row_width() {
        // 8-byte rows round to 8; 64 / 8 = 8 rows per page
        assert_eq!(page_row_count(&result_set(1), 64), 8);
    }

    #[test]
    fn test_paginate_covers_all_rows_once() {
        let rs = result_set(20);
        let pages = paginate(&rs, 64);
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.total_hits == 20));
        assert!(pages.iter().all(|p| p.page_size == 8));
        assert_eq!(pages[0].rows.len(), 8);
        assert_eq!(pages[1].rows.len(), 8);
        assert_eq!(pages[2].rows.len(), 4);
        assert_eq!(pages[2].max_page, 2);

        let mut all = Vec::new();
        for page in &pages {
            all.extend(page.rows.iter().map(|(t, _)| t));
        }
        assert_eq!(all, (1..=20).collect::<Vec<u64>>());
    }

    #[test]
    fn test_empty_result_yields_one_empty_page() {
        let pages = paginate(&result_set(0), 1024);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].total_hits, 0);
        assert!(pages[0].rows.is_empty());
    }
}
