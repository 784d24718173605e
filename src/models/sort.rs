//! Sort comparators and collect keys for the media list.
//!
//! Every comparator ends with an identity tie-break, so the resulting order is
//! total and re-sorting with the same key never moves anything.

use std::cmp::Ordering;
use std::fmt;

use xxhash_rust::xxh3::xxh3_64;

use super::media::{Media, MediaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// The field media are ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortBy {
    FileSize,
    Duration,
    ImportTime,
    Mime,
    /// Pixel count of the representative file.
    Resolution,
    /// Shuffled, but repeatable for a given seed.
    Random { seed: u64 },
    /// Namespaced tag values, compared in the listed namespace order.
    Namespaces(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub by: SortBy,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(by: SortBy, order: SortOrder) -> Self {
        Self { by, order }
    }

    pub fn ascending(by: SortBy) -> Self {
        Self::new(by, SortOrder::Ascending)
    }

    pub fn descending(by: SortBy) -> Self {
        Self::new(by, SortOrder::Descending)
    }

    /// Total order over media for this key.
    pub fn compare(&self, a: &Media, b: &Media) -> Ordering {
        let primary = self.compare_field(a, b);
        let primary = match self.order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id().cmp(&b.id()))
    }

    /// Same as [`compare`](Self::compare) but over bare file records, used
    /// to order members inside a collection.
    pub fn compare_results(&self, a: &MediaResult, b: &MediaResult) -> Ordering {
        let primary = match &self.by {
            SortBy::FileSize => a.size.cmp(&b.size),
            SortBy::Duration => a.duration_ms.cmp(&b.duration_ms),
            SortBy::ImportTime => a.import_time.cmp(&b.import_time),
            SortBy::Mime => a.mime.cmp(&b.mime),
            SortBy::Resolution => a.pixel_count().cmp(&b.pixel_count()),
            SortBy::Random { seed } => random_rank(a.id.0, *seed).cmp(&random_rank(b.id.0, *seed)),
            SortBy::Namespaces(namespaces) => compare_namespaces(namespaces, a, b),
        };
        let primary = match self.order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    fn compare_field(&self, a: &Media, b: &Media) -> Ordering {
        match &self.by {
            SortBy::FileSize => a.size().cmp(&b.size()),
            SortBy::Duration => a.duration_ms().cmp(&b.duration_ms()),
            SortBy::ImportTime => a.import_time().cmp(&b.import_time()),
            SortBy::Mime => a.representative().mime.cmp(&b.representative().mime),
            SortBy::Resolution => a
                .representative()
                .pixel_count()
                .cmp(&b.representative().pixel_count()),
            SortBy::Random { seed } => {
                random_rank(a.id().0, *seed).cmp(&random_rank(b.id().0, *seed))
            }
            SortBy::Namespaces(namespaces) => {
                compare_namespaces(namespaces, a.representative(), b.representative())
            }
        }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self::descending(SortBy::ImportTime)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match &self.by {
            SortBy::FileSize => "filesize".to_string(),
            SortBy::Duration => "duration".to_string(),
            SortBy::ImportTime => "import time".to_string(),
            SortBy::Mime => "mime".to_string(),
            SortBy::Resolution => "resolution".to_string(),
            SortBy::Random { .. } => "random".to_string(),
            SortBy::Namespaces(ns) => ns.join("-"),
        };
        let order = match self.order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        write!(f, "{} {}", field, order)
    }
}

/// Namespaces that group singletons into collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CollectKey {
    #[default]
    None,
    Namespaces(Vec<String>),
}

impl CollectKey {
    pub fn by(namespaces: &[&str]) -> Self {
        CollectKey::Namespaces(namespaces.iter().map(|s| s.to_string()).collect())
    }

    /// The grouping values for `result`, or `None` if it should stay a
    /// singleton (collecting disabled, or none of the namespaces present).
    pub fn group_values(&self, result: &MediaResult) -> Option<Vec<(String, String)>> {
        let CollectKey::Namespaces(namespaces) = self else {
            return None;
        };
        let values: Vec<(String, String)> = namespaces
            .iter()
            .filter_map(|ns| {
                let mut vals = result.namespace_values(ns).to_vec();
                vals.sort();
                if vals.is_empty() {
                    None
                } else {
                    Some((ns.clone(), vals.join(",")))
                }
            })
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }
}

impl fmt::Display for CollectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectKey::None => write!(f, "no collections"),
            CollectKey::Namespaces(ns) => write!(f, "collect by {}", ns.join("-")),
        }
    }
}

fn random_rank(id: u64, seed: u64) -> u64 {
    let mut data = [0u8; 16];
    data[..8].copy_from_slice(&id.to_le_bytes());
    data[8..].copy_from_slice(&seed.to_le_bytes());
    xxh3_64(&data)
}

/// Compares namespace values in order. Media missing a namespace sort after
/// media that have it.
fn compare_namespaces(namespaces: &[String], a: &MediaResult, b: &MediaResult) -> Ordering {
    for ns in namespaces {
        let a_val = a.namespace_values(ns).iter().min_by(|x, y| human_compare(x, y));
        let b_val = b.namespace_values(ns).iter().min_by(|x, y| human_compare(x, y));
        let ord = match (a_val, b_val) {
            (Some(x), Some(y)) => human_compare(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Compares strings with embedded digit runs by numeric value, so "2" < "10".
pub fn human_compare(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_num = take_digits(&mut a_chars);
                let b_num = take_digits(&mut b_chars);
                // compare by length after stripping zeros, then lexically
                let a_trim = a_num.trim_start_matches('0');
                let b_trim = b_num.trim_start_matches('0');
                let ord = a_trim
                    .len()
                    .cmp(&b_trim.len())
                    .then_with(|| a_trim.cmp(b_trim));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_digits<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::MediaId;

    #[test]
    fn test_human_compare() {
        assert_eq!(human_compare("2", "10"), Ordering::Less);
        assert_eq!(human_compare("page 9", "page 10"), Ordering::Less);
        assert_eq!(human_compare("007", "7"), Ordering::Equal);
        assert_eq!(human_compare("abc", "ABD"), Ordering::Less);
        assert_eq!(human_compare("a", "a1"), Ordering::Less);
    }

    #[test]
    fn test_namespace_sort_missing_last() {
        let key = SortKey::ascending(SortBy::Namespaces(vec!["page".into()]));
        let with = Media::from_result(MediaResult::new(MediaId(2), 0).with_tag("page", "3"));
        let without = Media::from_result(MediaResult::new(MediaId(1), 0));
        assert_eq!(key.compare(&with, &without), Ordering::Less);

        let desc = SortKey::descending(SortBy::Namespaces(vec!["page".into()]));
        // descending flips the field comparison but the id tie-break stays
        assert_eq!(desc.compare(&with, &without), Ordering::Greater);
    }

    #[test]
    fn test_ties_break_on_identity() {
        let key = SortKey::ascending(SortBy::FileSize);
        let a = Media::from_result(MediaResult::new(MediaId(1), 10));
        let b = Media::from_result(MediaResult::new(MediaId(2), 10));
        assert_eq!(key.compare(&a, &b), Ordering::Less);
        assert_eq!(key.compare(&b, &a), Ordering::Greater);
        assert_eq!(key.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_random_sort_is_repeatable() {
        let key = SortKey::ascending(SortBy::Random { seed: 42 });
        let a = Media::from_result(MediaResult::new(MediaId(1), 0));
        let b = Media::from_result(MediaResult::new(MediaId(2), 0));
        assert_eq!(key.compare(&a, &b), key.compare(&a, &b));
    }

    #[test]
    fn test_collect_values() {
        let key = CollectKey::by(&["series", "creator"]);
        let r = MediaResult::new(MediaId(1), 0).with_tag("series", "x");
        assert_eq!(
            key.group_values(&r),
            Some(vec![("series".to_string(), "x".to_string())])
        );
        let bare = MediaResult::new(MediaId(2), 0);
        assert_eq!(key.group_values(&bare), None);
        assert_eq!(CollectKey::None.group_values(&r), None);
    }
}
