//! Page selection syntax shared by the delete and organize tools.
//!
//! Grammar: comma-separated tokens, each either a single 1-based page (`7`)
//! or an inclusive range (`5-8`, `8-5`). Tokens that do not parse are
//! collected in [`PageSelection::ignored`] instead of failing the whole
//! selection; callers decide whether that is acceptable.

use std::collections::BTreeSet;

/// Result of parsing a page selection against a document of known length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    /// 0-indexed pages in token order (ranges expanded ascending)
    pub ordered: Vec<u32>,
    /// Tokens that were not page numbers or ranges
    pub ignored: Vec<String>,
}

impl PageSelection {
    /// Distinct 0-indexed pages in descending order, ready for removal.
    pub fn removal_order(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self.ordered.iter().copied().collect();
        set.into_iter().rev().collect()
    }

    /// Number of distinct pages selected
    pub fn distinct_len(&self) -> usize {
        self.ordered.iter().collect::<BTreeSet<_>>().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Parse a forgiving page selection.
///
/// Pages outside `1..=num_pages` are dropped silently, a reversed range
/// behaves like its ascending form, and duplicates are kept in
/// [`PageSelection::ordered`] (use [`PageSelection::removal_order`] for a set).
pub fn parse_page_selection(range: &str, num_pages: u32) -> PageSelection {
    let mut selection = PageSelection::default();

    for token in range.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if token.contains('-') {
            let mut bounds = token.split('-');
            let start = bounds.next().and_then(parse_page_number);
            let end = bounds.next().and_then(parse_page_number);

            match (start, end) {
                (Some(start), Some(end)) => {
                    let low = start.min(end).max(1);
                    let high = start.max(end).min(num_pages);
                    selection.ordered.extend((low..=high).map(|p| p - 1));
                }
                _ => selection.ignored.push(token.to_string()),
            }
        } else {
            match parse_page_number(token) {
                Some(page) if page <= num_pages => selection.ordered.push(page - 1),
                Some(_) => {}
                None => selection.ignored.push(token.to_string()),
            }
        }
    }

    selection
}

/// A page number is a positive integer; zero counts as malformed.
fn parse_page_number(s: &str) -> Option<u32> {
    match s.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
