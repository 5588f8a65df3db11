#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Strict,
    Hardened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Allow,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Output row count of an alignment checked against the row cap.
    AlignmentCardinality,
    /// Duplicate labels on both sides expanded to a cross-product.
    DuplicateExpansion,
    /// A lookup expecting one row matched several.
    UniqueLookupViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionIssue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts_unix_ms: u64,
    pub mode: RuntimeMode,
    pub action: DecisionAction,
    pub issue: DecisionIssue,
}

/// Append-only list of decisions taken while running table operations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLedger {
    records: Vec<DecisionRecord>,
}

impl EvidenceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records about one kind of issue, oldest first.
    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &DecisionRecord> + '_ {
        self.records.iter().filter(move |r| r.issue.kind == kind)
    }

    #[must_use]
    pub fn rejections(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.action == DecisionAction::Reject)
            .count()
    }
}

/// Runtime configuration for operations that record decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePolicy {
    pub mode: RuntimeMode,
    /// Hardened mode rejects alignments producing more rows than this.
    pub alignment_row_cap: Option<usize>,
    pub fail_on_duplicate_expansion: bool,
}

impl RuntimePolicy {
    /// Allow everything, but record what happened.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            alignment_row_cap: None,
            fail_on_duplicate_expansion: false,
        }
    }

    #[must_use]
    pub fn hardened(alignment_row_cap: Option<usize>) -> Self {
        Self {
            mode: RuntimeMode::Hardened,
            alignment_row_cap,
            fail_on_duplicate_expansion: false,
        }
    }

    #[must_use]
    pub fn with_fail_on_duplicate_expansion(mut self, fail: bool) -> Self {
        self.fail_on_duplicate_expansion = fail;
        self
    }

    fn record(
        &self,
        kind: IssueKind,
        subject: String,
        detail: String,
        action: DecisionAction,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        ledger.push(DecisionRecord {
            ts_unix_ms: now_unix_ms().unwrap_or_default(),
            mode: self.mode,
            action,
            issue: DecisionIssue {
                kind,
                subject,
                detail,
            },
        });
        action
    }

    /// Admit or reject an alignment whose output has `output_rows` rows.
    pub fn decide_alignment_admission(
        &self,
        subject: impl Into<String>,
        output_rows: usize,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let subject = subject.into();
        let over_cap = self
            .alignment_row_cap
            .is_some_and(|cap| output_rows > cap);
        let action = if self.mode == RuntimeMode::Hardened && over_cap {
            log::warn!(
                "{subject}: alignment of {output_rows} rows exceeds cap {:?}; rejecting",
                self.alignment_row_cap
            );
            DecisionAction::Reject
        } else {
            log::debug!("{subject}: alignment admitted with {output_rows} rows");
            DecisionAction::Allow
        };
        self.record(
            IssueKind::AlignmentCardinality,
            subject,
            format!("output_rows={output_rows}"),
            action,
            ledger,
        )
    }

    /// Record a cross-product expansion over `labels`, which produced
    /// `output_rows` aligned rows.
    pub fn record_duplicate_expansion(
        &self,
        subject: impl Into<String>,
        labels: &[String],
        output_rows: usize,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let subject = subject.into();
        log::warn!(
            "{subject}: duplicate labels {labels:?} expanded to a cross-product of {output_rows} rows"
        );
        let action = if self.fail_on_duplicate_expansion {
            DecisionAction::Reject
        } else {
            DecisionAction::Allow
        };
        self.record(
            IssueKind::DuplicateExpansion,
            subject,
            format!("labels={labels:?} output_rows={output_rows}"),
            action,
            ledger,
        )
    }

    /// Record a lookup that expected one row and matched `matches`. Always
    /// rejected.
    pub fn record_unique_lookup_violation(
        &self,
        subject: impl Into<String>,
        label: &str,
        matches: usize,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let subject = subject.into();
        log::warn!("{subject}: unique lookup of {label} matched {matches} rows");
        self.record(
            IssueKind::UniqueLookupViolation,
            subject,
            format!("label={label} matches={matches}"),
            DecisionAction::Reject,
            ledger,
        )
    }
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("system clock is before UNIX_EPOCH")]
    ClockSkew,
}

fn now_unix_ms() -> Result<u64, RuntimeError> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| RuntimeError::ClockSkew)?
        .as_millis();
    Ok(ms as u64)
}
