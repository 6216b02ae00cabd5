//! Post-session anomaly detection for Rollcall.
//!
//! A pure pass over one ended session's accepted records, producing an
//! advisory [`AnomalyReport`]. The detector never mutates records and
//! never rejects anything — it runs after the session closed, when the
//! window for corrections is over. Two fixed heuristics:
//!
//! - **Duplicate roll numbers** — the same `external_id` behind more
//!   than one accepted identity (HIGH).
//! - **Rapid submission bursts** — an implausible share of submissions
//!   landing within a second of each other (MEDIUM).
//!
//! Output is deterministic: the same record set always yields the same
//! report, byte for byte, so regenerating a report is idempotent. An
//! empty findings list means "no anomalies", not "not yet analyzed".

use std::collections::BTreeMap;

use rollcall_protocol::AttendanceRecord;
use serde::Serialize;

/// Adjacent submissions closer than this are "rapid".
pub const RAPID_GAP_MS: u64 = 1_000;

/// A burst finding fires when rapid pairs exceed this share of records.
pub const RAPID_SHARE_THRESHOLD: f64 = 0.2;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// What kind of pattern a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingKind {
    /// One roll number appears behind multiple accepted identities.
    DuplicateExternalId,
    /// Too many submissions landed nearly simultaneously.
    RapidSubmissionBurst,
}

/// How seriously a finding should be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
    Medium,
}

/// One anomaly-detector observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    /// Human-readable specifics: which roll numbers, how many rapid
    /// pairs against what threshold.
    pub detail: String,
}

/// The report for one ended session. Derived on demand from the record
/// set; it has no stored lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    /// How many records the pass ran over.
    pub total_accepted: usize,
    /// Zero or more findings. Empty means no anomalies.
    pub findings: Vec<Finding>,
}

/// Aggregate statistics for a session, advisory like the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_accepted: usize,
    /// Distinct submitter identities (equals `total_accepted` unless
    /// the store's uniqueness guarantee was violated upstream).
    pub unique_submitters: usize,
    /// Accepted records per branch, in branch order.
    pub group_distribution: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Analysis passes
// ---------------------------------------------------------------------------

/// Runs the anomaly heuristics over one session's accepted records.
pub fn analyze(records: &[AttendanceRecord]) -> AnomalyReport {
    let mut findings = Vec::new();

    if let Some(finding) = duplicate_external_ids(records) {
        findings.push(finding);
    }
    if let Some(finding) = rapid_submission_burst(records) {
        findings.push(finding);
    }

    AnomalyReport {
        total_accepted: records.len(),
        findings,
    }
}

/// Groups records by roll number; any group larger than one is flagged.
fn duplicate_external_ids(records: &[AttendanceRecord]) -> Option<Finding> {
    // BTreeMap keeps the offender list sorted, which keeps the report
    // byte-identical across runs.
    let mut by_roll: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *by_roll.entry(record.external_id.as_str()).or_default() += 1;
    }

    let offenders: Vec<&str> = by_roll
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(roll, _)| *roll)
        .collect();
    if offenders.is_empty() {
        return None;
    }

    Some(Finding {
        kind: FindingKind::DuplicateExternalId,
        severity: Severity::High,
        detail: format!(
            "roll numbers {} appear multiple times",
            offenders.join(", ")
        ),
    })
}

/// Counts adjacent acceptance gaps under [`RAPID_GAP_MS`]; flags when
/// their share of the record count crosses [`RAPID_SHARE_THRESHOLD`].
fn rapid_submission_burst(records: &[AttendanceRecord]) -> Option<Finding> {
    let mut timestamps: Vec<u64> = records.iter().map(|r| r.accepted_at_ms).collect();
    timestamps.sort_unstable();

    let rapid_pairs = timestamps
        .windows(2)
        .filter(|pair| pair[1] - pair[0] < RAPID_GAP_MS)
        .count();

    let threshold = RAPID_SHARE_THRESHOLD * records.len() as f64;
    if rapid_pairs as f64 <= threshold {
        return None;
    }

    Some(Finding {
        kind: FindingKind::RapidSubmissionBurst,
        severity: Severity::Medium,
        detail: format!(
            "{rapid_pairs} submissions landed within {RAPID_GAP_MS} ms of the previous one \
             (threshold {threshold:.1})"
        ),
    })
}

/// Aggregates non-anomaly statistics over one session's records.
pub fn session_stats(records: &[AttendanceRecord]) -> SessionStats {
    let mut submitters: Vec<&str> = records.iter().map(|r| r.submitter_id.as_str()).collect();
    submitters.sort_unstable();
    submitters.dedup();

    let mut group_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        *group_distribution.entry(record.group.clone()).or_default() += 1;
    }

    SessionStats {
        total_accepted: records.len(),
        unique_submitters: submitters.len(),
        group_distribution,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use rollcall_protocol::SessionKey;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn record(submitter: &str, roll: &str, group: &str, accepted_at_ms: u64) -> AttendanceRecord {
        AttendanceRecord {
            session: SessionKey::new("CS101", "2024-01-10"),
            submitter_id: submitter.into(),
            name: submitter.into(),
            external_id: roll.into(),
            group: group.into(),
            accepted_at_ms,
            token_nonce: format!("nonce-{submitter}"),
        }
    }

    /// Five records spread far apart in time, all distinct roll numbers.
    fn clean_records() -> Vec<AttendanceRecord> {
        (0..5)
            .map(|i| {
                record(
                    &format!("student{i}"),
                    &format!("21CS00{i}"),
                    "CSE",
                    i * 10_000,
                )
            })
            .collect()
    }

    // =====================================================================
    // analyze(): duplicate roll numbers
    // =====================================================================

    #[test]
    fn test_analyze_clean_records_has_no_findings() {
        let report = analyze(&clean_records());

        assert_eq!(report.total_accepted, 5);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_analyze_duplicate_roll_yields_single_high_finding() {
        // Reference scenario: five records, two sharing 21CS001.
        let records = vec![
            record("a", "21CS001", "CSE", 0),
            record("b", "21CS001", "CSE", 20_000),
            record("c", "21CS002", "CSE", 40_000),
            record("d", "21CS003", "CSE", 60_000),
            record("e", "21CS004", "CSE", 80_000),
        ];

        let report = analyze(&records);

        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.kind, FindingKind::DuplicateExternalId);
        assert_eq!(finding.severity, Severity::High);
        assert!(finding.detail.contains("21CS001"));
        assert!(!finding.detail.contains("21CS002"));
    }

    #[test]
    fn test_analyze_multiple_duplicates_listed_sorted() {
        let records = vec![
            record("a", "21CS009", "CSE", 0),
            record("b", "21CS009", "CSE", 20_000),
            record("c", "21CS001", "CSE", 40_000),
            record("d", "21CS001", "CSE", 60_000),
        ];

        let report = analyze(&records);

        assert_eq!(report.findings.len(), 1);
        assert!(report.findings[0]
            .detail
            .contains("21CS001, 21CS009"));
    }

    // =====================================================================
    // analyze(): rapid bursts
    // =====================================================================

    #[test]
    fn test_analyze_burst_above_threshold_is_flagged() {
        // Four of five gaps under a second: 4 > 0.2 * 5.
        let records: Vec<_> = (0..5u64)
            .map(|i| {
                record(
                    &format!("student{i}"),
                    &format!("21CS00{i}"),
                    "CSE",
                    i * 500,
                )
            })
            .collect();

        let report = analyze(&records);

        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.kind, FindingKind::RapidSubmissionBurst);
        assert_eq!(finding.severity, Severity::Medium);
        assert!(finding.detail.contains('4'));
    }

    #[test]
    fn test_analyze_burst_at_threshold_is_not_flagged() {
        // Exactly one rapid gap among five records: 1 <= 0.2 * 5.
        let mut records = clean_records();
        records.push(record("late", "21CS009", "CSE", 40_500));

        // Six records now, one gap under a second: 1 <= 1.2.
        let report = analyze(&records);

        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_analyze_burst_ignores_record_order() {
        // Timestamps arrive unsorted; the pass sorts before pairing.
        let records = vec![
            record("c", "21CS003", "CSE", 400),
            record("a", "21CS001", "CSE", 0),
            record("b", "21CS002", "CSE", 200),
        ];

        let report = analyze(&records);

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::RapidSubmissionBurst);
    }

    // =====================================================================
    // analyze(): edge cases and determinism
    // =====================================================================

    #[test]
    fn test_analyze_empty_records_empty_report() {
        let report = analyze(&[]);

        assert_eq!(report.total_accepted, 0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_analyze_is_idempotent_over_same_records() {
        let records = vec![
            record("a", "21CS001", "CSE", 0),
            record("b", "21CS001", "ECE", 100),
            record("c", "21CS002", "CSE", 200),
        ];

        let first = analyze(&records);
        let second = analyze(&records);

        assert_eq!(first, second);
        // Byte-identical once serialized, too.
        let a = serde_json::to_string(&first).expect("should serialize");
        let b = serde_json::to_string(&second).expect("should serialize");
        assert_eq!(a, b);
    }

    // =====================================================================
    // session_stats()
    // =====================================================================

    #[test]
    fn test_session_stats_counts_and_distribution() {
        let records = vec![
            record("a", "21CS001", "CSE", 0),
            record("b", "21CS002", "CSE", 10_000),
            record("c", "21EC001", "ECE", 20_000),
        ];

        let stats = session_stats(&records);

        assert_eq!(stats.total_accepted, 3);
        assert_eq!(stats.unique_submitters, 3);
        assert_eq!(stats.group_distribution.get("CSE"), Some(&2));
        assert_eq!(stats.group_distribution.get("ECE"), Some(&1));
    }

    #[test]
    fn test_session_stats_empty() {
        let stats = session_stats(&[]);

        assert_eq!(stats.total_accepted, 0);
        assert_eq!(stats.unique_submitters, 0);
        assert!(stats.group_distribution.is_empty());
    }
}
