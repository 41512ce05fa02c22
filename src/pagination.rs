//! Page slicing for the listing handlers.
//!
//! All listing routes share one behavior: a 1-indexed `page` query
//! parameter selects a fixed-size slice of an ordered item list. A missing
//! or non-numeric parameter falls back to the first page; an out-of-range
//! number is clamped to the nearest valid page rather than erroring.

use serde::Deserialize;

/// One page of an ordered listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-indexed page number after clamping.
    pub number: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn next_number(&self) -> usize {
        self.number + 1
    }

    pub fn previous_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }
}

/// Query-string side of the contract, shared by every listing handler.
/// The parameter is kept as a raw string so `?page=abc` selects page 1
/// instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn requested(&self) -> Option<usize> {
        self.page.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

/// Slice `items` into the requested 1-indexed page.
///
/// `None` selects the first page. Requests past the last page clamp to the
/// last page; zero clamps to the first. An empty list yields a single
/// empty page.
pub fn paginate<T>(items: Vec<T>, page_size: usize, requested: Option<usize>) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let number = requested.unwrap_or(1).clamp(1, total_pages);

    let start = (number - 1) * page_size;
    let items: Vec<T> = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        number,
        total_pages,
        has_next: number < total_pages,
        has_previous: number > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Vec<usize> {
        (1..=n).collect()
    }

    #[test]
    fn full_pages_then_remainder() {
        // 14 items at page size 13: page 1 holds 13, page 2 holds the rest.
        let page = paginate(numbers(14), 13, Some(1));
        assert_eq!(page.items.len(), 13);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next);
        assert!(!page.has_previous);

        let page = paginate(numbers(14), 13, Some(2));
        assert_eq!(page.items, vec![14]);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn total_pages_is_ceiling_of_len_over_size() {
        for (n, size, expected) in [(0, 5, 1), (1, 5, 1), (5, 5, 1), (6, 5, 2), (26, 13, 2)] {
            let page = paginate(numbers(n), size, None);
            assert_eq!(page.total_pages, expected, "n={} size={}", n, size);
        }
    }

    #[test]
    fn missing_page_selects_first() {
        let page = paginate(numbers(5), 2, None);
        assert_eq!(page.number, 1);
        assert_eq!(page.items, vec![1, 2]);
    }

    #[test]
    fn page_past_the_end_clamps_to_last() {
        let page = paginate(numbers(5), 2, Some(99));
        assert_eq!(page.number, 3);
        assert_eq!(page.items, vec![5]);
    }

    #[test]
    fn page_zero_clamps_to_first() {
        let page = paginate(numbers(5), 2, Some(0));
        assert_eq!(page.number, 1);
        assert_eq!(page.items, vec![1, 2]);
    }

    #[test]
    fn empty_list_yields_one_empty_page() {
        let page = paginate(Vec::<usize>::new(), 13, Some(3));
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn items_preserve_input_order() {
        let page = paginate(vec!["c", "a", "b"], 2, Some(2));
        assert_eq!(page.items, vec!["b"]);
    }

    #[test]
    fn zero_page_size_is_treated_as_one() {
        let page = paginate(numbers(3), 0, Some(2));
        assert_eq!(page.items, vec![2]);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn neighbor_numbers_for_links() {
        let page = paginate(numbers(30), 10, Some(2));
        assert_eq!(page.previous_number(), 1);
        assert_eq!(page.next_number(), 3);
    }

    #[test]
    fn query_parses_numeric_page() {
        let q = PageQuery {
            page: Some("4".to_string()),
        };
        assert_eq!(q.requested(), Some(4));
    }

    #[test]
    fn query_ignores_garbage_page() {
        for raw in ["abc", "-1", "1.5", ""] {
            let q = PageQuery {
                page: Some(raw.to_string()),
            };
            assert_eq!(q.requested(), None, "raw={:?}", raw);
        }
        assert_eq!(PageQuery::default().requested(), None);
    }
}
