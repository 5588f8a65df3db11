#![forbid(unsafe_code)]

mod dataframe;
mod rank;
mod reduce;
mod series;
mod view;

use serde::{Deserialize, Serialize};
use tb_columnar::ColumnError;
use tb_index::{AlignmentPlan, IndexError, IndexLabel, validate_alignment_plan};
use tb_runtime::{DecisionAction, EvidenceLedger, RuntimePolicy};
use tb_types::{DType, Scalar, TypeError};
use thiserror::Error;

pub use dataframe::{DataFrame, SetIndexOptions};
pub use rank::{NaOption, RankMethod, rank_values};
pub use reduce::{Reduction, pairwise_column_stat, reduce_column};
pub use series::Series;
pub use tb_columnar::{ArithmeticOp, ComparisonOp, FillDirection};
pub use tb_index::{AlignMode, Index, LevelSelector};
pub use tb_types::PairwiseStat;
pub use view::ColumnView;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("index length ({index_len}) does not match column length ({column_len})")]
    LengthMismatch { index_len: usize, column_len: usize },
    #[error("column {label} not found")]
    ColumnNotFound { label: String },
    #[error("column label {label} appears more than once")]
    DuplicateColumn { label: String },
    #[error("{reduction} is not defined for {dtype:?} values")]
    UnsupportedReduction {
        reduction: &'static str,
        dtype: DType,
    },
    #[error("cannot use a missing value as a label (column {column})")]
    MissingLabel { column: String },
    #[error("{keys} sort keys but {directions} directions")]
    SortSpecMismatch { keys: usize, directions: usize },
    #[error("runtime policy rejected operation: {0}")]
    PolicyRejected(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Row-drop rule for `dropna`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropNaHow {
    /// Drop when at least one considered cell is missing.
    #[default]
    Any,
    /// Drop only when every considered cell is missing.
    All,
}

/// Replacement for `fillna`.
#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Scalar(Scalar),
    /// Per-column replacement; unmapped columns are left alone.
    PerColumn(Vec<(IndexLabel, Scalar)>),
}

impl From<Scalar> for FillValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Rows,
    Columns,
}

/// Convert a cell into an index label. Floats and booleans become text.
pub(crate) fn scalar_to_label(value: &Scalar, column: &str) -> Result<IndexLabel, FrameError> {
    match value {
        Scalar::Int64(v) => Ok(IndexLabel::Int64(*v)),
        Scalar::Utf8(v) => Ok(IndexLabel::Utf8(v.clone())),
        Scalar::Bool(v) => Ok(IndexLabel::Utf8(v.to_string())),
        Scalar::Float64(v) if !v.is_nan() => Ok(IndexLabel::Utf8(v.to_string())),
        _ => Err(FrameError::MissingLabel {
            column: column.to_owned(),
        }),
    }
}

pub(crate) fn label_to_scalar(label: &IndexLabel) -> Scalar {
    match label {
        IndexLabel::Int64(v) => Scalar::Int64(*v),
        IndexLabel::Utf8(v) => Scalar::Utf8(v.clone()),
        composite @ IndexLabel::Composite(_) => Scalar::Utf8(composite.to_string()),
    }
}

pub(crate) fn op_symbol(op: ArithmeticOp) -> &'static str {
    match op {
        ArithmeticOp::Add => "+",
        ArithmeticOp::Sub => "-",
        ArithmeticOp::Mul => "*",
        ArithmeticOp::Div => "/",
    }
}

/// Validate an alignment plan and run it past the runtime policy: duplicate
/// cross-product expansion first, then the output row count.
pub(crate) fn admit_alignment(
    subject: &str,
    plan: &AlignmentPlan,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<(), FrameError> {
    validate_alignment_plan(plan)?;
    let rows = plan.union_index.len();

    if !plan.expanded_labels.is_empty() {
        let labels = plan
            .expanded_labels
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if policy.record_duplicate_expansion(subject, &labels, rows, ledger)
            == DecisionAction::Reject
        {
            return Err(FrameError::PolicyRejected(format!(
                "{subject}: duplicate labels {labels:?} would expand to a cross-product"
            )));
        }
    }

    if policy.decide_alignment_admission(subject, rows, ledger) == DecisionAction::Reject {
        return Err(FrameError::PolicyRejected(format!(
            "{subject}: {rows} aligned rows exceed the configured cap"
        )));
    }
    Ok(())
}
