//! Page specifications.
//!
//! A specification is a comma-separated list of 1-based, inclusive segments:
//!
//! - `N` - a single page
//! - `A-B` - pages A through B
//! - `A-` - page A to the last page
//! - `-B` - the first page to page B
//!
//! Whitespace around segments is ignored, as are empty segments.

use docrelay_protocol::ValidationError;
use std::collections::BTreeSet;
use tracing::warn;

/// An inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Parses one segment against a document of `page_count` pages.
    pub fn parse(segment: &str, page_count: u32) -> Result<Self, ValidationError> {
        let segment = segment.trim();
        let invalid = |reason: String| ValidationError::InvalidPageSpec {
            spec: segment.to_string(),
            reason,
        };

        let (start, end) = match segment.split_once('-') {
            Some((start, end)) => (
                parse_bound(start, 1).map_err(&invalid)?,
                parse_bound(end, page_count).map_err(&invalid)?,
            ),
            None => {
                let page = parse_bound(segment, 0).map_err(&invalid)?;
                (page, page)
            }
        };

        if start < 1 || start > end || end > page_count {
            return Err(invalid(format!(
                "range {}-{} out of bounds (1-{})",
                start, end, page_count
            )));
        }

        Ok(Self { start, end })
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

fn parse_bound(raw: &str, default: u32) -> Result<u32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    raw.parse()
        .map_err(|_| format!("{:?} is not a page number", raw))
}

fn segments(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// One range per valid segment, in the order given.
///
/// Invalid segments are logged and skipped; an empty result is for the
/// caller to reject.
pub fn split_groups(spec: &str, page_count: u32) -> Vec<PageRange> {
    segments(spec)
        .filter_map(|segment| match PageRange::parse(segment, page_count) {
            Ok(range) => Some(range),
            Err(e) => {
                warn!(segment, error = %e, "skipping invalid split range");
                None
            }
        })
        .collect()
}

/// Pages selected for rotation.
///
/// `all` (any case) selects every page. Unlike splitting, one invalid
/// segment fails the whole selection.
pub fn rotation_selection(spec: &str, page_count: u32) -> Result<BTreeSet<u32>, ValidationError> {
    if spec.trim().eq_ignore_ascii_case("all") {
        return Ok((1..=page_count).collect());
    }

    let mut selected = BTreeSet::new();
    for segment in segments(spec) {
        selected.extend(PageRange::parse(segment, page_count)?.pages());
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn range(start: u32, end: u32) -> PageRange {
        PageRange { start, end }
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(PageRange::parse("4", 10).unwrap(), range(4, 4));
        assert_eq!(PageRange::parse("2-5", 10).unwrap(), range(2, 5));
        assert_eq!(PageRange::parse("7-", 10).unwrap(), range(7, 10));
        assert_eq!(PageRange::parse("-3", 10).unwrap(), range(1, 3));
        assert_eq!(PageRange::parse(" 2 - 3 ", 10).unwrap(), range(2, 3));
    }

    #[test]
    fn test_parse_rejects_out_of_bounds() {
        for bad in ["0", "11", "5-3", "9-12", "0-2", "x", "1-b", "1-2-3"] {
            assert!(
                matches!(
                    PageRange::parse(bad, 10),
                    Err(ValidationError::InvalidPageSpec { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_split_groups_example() {
        let groups = split_groups("1-3,5,7-", 10);
        assert_eq!(groups, vec![range(1, 3), range(5, 5), range(7, 10)]);

        let pages: Vec<Vec<u32>> = groups.iter().map(|g| g.pages().collect()).collect();
        assert_eq!(pages, vec![vec![1, 2, 3], vec![5], vec![7, 8, 9, 10]]);
    }

    #[test]
    fn test_split_groups_skips_invalid_segments() {
        let groups = split_groups("1-2, 40, banana,, 9-", 10);
        assert_eq!(groups, vec![range(1, 2), range(9, 10)]);
        assert!(split_groups("20-30,abc", 10).is_empty());
    }

    #[test]
    fn test_rotation_selection() {
        assert_eq!(
            rotation_selection("ALL", 3).unwrap(),
            BTreeSet::from([1, 2, 3])
        );
        assert_eq!(
            rotation_selection("1, 3-4, 3", 5).unwrap(),
            BTreeSet::from([1, 3, 4])
        );
        assert!(matches!(
            rotation_selection("1,9", 5),
            Err(ValidationError::InvalidPageSpec { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_valid_ranges_parse(count in 1u32..500, a in 1u32..500, b in 1u32..500) {
            let (start, end) = (a.min(b).min(count), a.max(b).min(count));
            let parsed = PageRange::parse(&format!("{}-{}", start, end), count).unwrap();
            prop_assert_eq!(parsed, range(start, end));
            prop_assert_eq!(parsed.pages().count() as u32, end - start + 1);
        }
    }
}
