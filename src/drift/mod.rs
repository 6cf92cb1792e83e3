//! @acp:module "Drift Detector"
//! @acp:summary "Compare the committed allow-list with the supported set"
//! @acp:domain cli
//! @acp:layer service
//!
//! The allow-list must equal the supported set exactly: versions leaving
//! support are removed and newly supported versions are added.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::registry::ConstraintRecord;
use crate::version::{join_versions, SupportedVersionSet, VersionToken};

/// @acp:summary "Per-run difference between committed and supported versions"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Supported but not yet allowed
    pub added: BTreeSet<VersionToken>,
    /// Allowed but no longer supported
    pub removed: BTreeSet<VersionToken>,
}

impl DriftReport {
    /// True when the sets differ in any way
    pub fn has_drift(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_drift() {
            return f.write_str("no drift");
        }
        write!(
            f,
            "added [{}], removed [{}]",
            join_versions(&self.added),
            join_versions(&self.removed)
        )
    }
}

/// @acp:summary "Symmetric difference of the committed record and the latest set"
pub fn detect_drift(current: &ConstraintRecord, latest: &SupportedVersionSet) -> DriftReport {
    let latest = latest.as_set();
    DriftReport {
        added: latest.difference(&current.versions).cloned().collect(),
        removed: current.versions.difference(latest).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<VersionToken> {
        raw.iter().map(|s| VersionToken::parse(s).unwrap()).collect()
    }

    fn record(raw: &[&str]) -> ConstraintRecord {
        ConstraintRecord {
            versions: tokens(raw).into_iter().collect(),
            error_message: None,
        }
    }

    fn latest(raw: &[&str]) -> SupportedVersionSet {
        SupportedVersionSet::new(tokens(raw)).unwrap()
    }

    #[test]
    fn test_window_moves_forward() {
        let report = detect_drift(
            &record(&["1.31", "1.32", "1.33"]),
            &latest(&["1.32", "1.33", "1.34"]),
        );
        assert_eq!(report.added, tokens(&["1.34"]).into_iter().collect());
        assert_eq!(report.removed, tokens(&["1.31"]).into_iter().collect());
        assert!(report.has_drift());
        assert_eq!(report.to_string(), "added [1.34], removed [1.31]");
    }

    #[test]
    fn test_equal_sets_have_no_drift() {
        let report = detect_drift(&record(&["1.33", "1.32"]), &latest(&["1.32", "1.33"]));
        assert!(!report.has_drift());
        assert_eq!(report, DriftReport::default());
    }

    #[test]
    fn test_superset_only_adding_is_drift() {
        let report = detect_drift(&record(&["1.32", "1.33"]), &latest(&["1.32", "1.33", "1.34"]));
        assert!(report.has_drift());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let orders: [&[&str]; 3] = [
            &["1.31", "1.32", "1.33"],
            &["1.33", "1.31", "1.32"],
            &["1.32", "1.33", "1.31"],
        ];
        let supported: [&[&str]; 3] = [
            &["1.32", "1.33", "1.34"],
            &["1.34", "1.32", "1.33"],
            &["1.33", "1.34", "1.32"],
        ];
        let baseline = detect_drift(&record(orders[0]), &latest(supported[0]));
        for current in orders {
            for next in supported {
                assert_eq!(detect_drift(&record(current), &latest(next)), baseline);
            }
        }
    }

    #[test]
    fn test_placeholder_record_is_replaced() {
        let report = detect_drift(&record(&[]), &latest(&["1.33"]));
        assert_eq!(report.added.len(), 1);
        assert!(report.removed.is_empty());
    }
}
