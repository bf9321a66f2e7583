//! Station identifier reconciliation.
//!
//! Some organizations publish the same monitoring location twice: once as
//! `ORG-1234` and once as `ORG_WQX-1234`. The destination only ever stores
//! the stripped (canonical) form.

use crate::row::MappedRow;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `_WQX` directly followed by the dash-separated suffix.
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_WQX-").expect("marker pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationIdentifier {
    canonical: String,
    tagged: Option<String>,
}

impl StationIdentifier {
    pub fn parse(raw: &str) -> Self {
        if MARKER_RE.is_match(raw) {
            Self {
                canonical: MARKER_RE.replace_all(raw, "-").into_owned(),
                tagged: Some(raw.to_string()),
            }
        } else {
            Self {
                canonical: raw.to_string(),
                tagged: None,
            }
        }
    }

    /// The id with the marker removed. Ids without a marker are unchanged.
    pub fn strip(&self) -> &str {
        &self.canonical
    }

    pub fn is_tagged(&self) -> bool {
        self.tagged.is_some()
    }
}

pub fn is_tagged(raw: &str) -> bool {
    MARKER_RE.is_match(raw)
}

pub fn strip(raw: &str) -> String {
    StationIdentifier::parse(raw).strip().to_string()
}

/// Canonical ids of every tagged id in `ids`. A bare row whose id is in
/// this set has a tagged sibling and must not be inserted.
pub fn duplicate_ids<'a, I>(ids: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .map(StationIdentifier::parse)
        .filter(StationIdentifier::is_tagged)
        .map(|id| id.canonical)
        .collect()
}

/// [`duplicate_ids`] over already mapped station rows.
pub fn duplicate_ids_in_rows(rows: &[MappedRow]) -> HashSet<String> {
    duplicate_ids(rows.iter().filter_map(|row| row.get("StationId")))
}

/// Full-load rule: the bare form is skipped when a tagged sibling exists in
/// the same batch.
pub fn is_bare_duplicate(station_id: &str, duplicates: &HashSet<String>) -> bool {
    !is_tagged(station_id) && duplicates.contains(station_id)
}

/// Update rule: drop tagged ids whose canonical form is already stored.
///
/// `unseen_canonical` holds the canonical ids the destination does not have.
/// Bare ids are always kept; source order is preserved.
pub fn drop_stored_tagged(ids: Vec<String>, unseen_canonical: &HashSet<String>) -> Vec<String> {
    ids.into_iter()
        .filter(|id| {
            let parsed = StationIdentifier::parse(id);
            !parsed.is_tagged() || unseen_canonical.contains(parsed.strip())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_id() {
        let id = StationIdentifier::parse("UTAHDWQ_WQX-4904410");
        assert!(id.is_tagged());
        assert_eq!(id.strip(), "UTAHDWQ-4904410");
    }

    #[test]
    fn test_bare_id_is_never_rewritten() {
        let id = StationIdentifier::parse("UTAHDWQ-4904410");
        assert!(!id.is_tagged());
        assert_eq!(id.strip(), "UTAHDWQ-4904410");

        // marker without the trailing dash is not a marker
        let id = StationIdentifier::parse("ORG_WQX4904410");
        assert!(!id.is_tagged());
        assert_eq!(id.strip(), "ORG_WQX4904410");
    }

    #[test]
    fn test_duplicate_ids_from_rows() {
        let rows: Vec<MappedRow> = ["UTAHDWQ_WQX-4904410", "UTAHDWQ_WQX-4904610", "UTAHDWQ-111"]
            .iter()
            .map(|id| vec![("StationId", *id)].into_iter().collect())
            .collect();

        let actual = duplicate_ids_in_rows(&rows);

        let expected: HashSet<String> = ["UTAHDWQ-4904610", "UTAHDWQ-4904410"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_bare_duplicate_is_skipped_but_tagged_is_not() {
        let dups = duplicate_ids(["ORG_WQX-1"]);
        assert!(is_bare_duplicate("ORG-1", &dups));
        assert!(!is_bare_duplicate("ORG_WQX-1", &dups));
        assert!(!is_bare_duplicate("ORG-2", &dups));
    }

    #[test]
    fn test_drop_stored_tagged_keeps_unseen() {
        let ids = vec!["123_WQX-ABC".to_string(), "1234".to_string()];
        let unseen: HashSet<String> = ["123-ABC".to_string()].into_iter().collect();

        assert_eq!(drop_stored_tagged(ids, &unseen), vec!["123_WQX-ABC", "1234"]);
    }

    #[test]
    fn test_drop_stored_tagged_removes_stored() {
        let ids = vec!["123_WQX-ABC".to_string(), "456_WQX-DEF".to_string()];
        let unseen: HashSet<String> = ["456-DEF".to_string()].into_iter().collect();

        assert_eq!(drop_stored_tagged(ids, &unseen), vec!["456_WQX-DEF"]);
    }

    #[test]
    fn test_drop_stored_tagged_without_tagged_ids() {
        let ids = vec!["123".to_string(), "1234".to_string()];
        assert_eq!(drop_stored_tagged(ids, &HashSet::new()), vec!["123", "1234"]);
    }
}
