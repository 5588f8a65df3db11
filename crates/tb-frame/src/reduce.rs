use serde::{Deserialize, Serialize};
use tb_columnar::Column;
use tb_types::{
    DType, PairwiseStat, Scalar, nan_pairwise, nancount, nanmax, nanmean, nanmedian, nanmin,
    nanstd, nansum, nanvar,
};

use crate::FrameError;

/// Column-wise reductions shared by series, tables and level-wise grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
    Median,
    Var,
    Std,
    Count,
}

impl Reduction {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
            Self::Var => "var",
            Self::Std => "std",
            Self::Count => "count",
        }
    }

    /// Reductions that only make sense for numbers (booleans count as 0/1).
    #[must_use]
    pub fn is_numeric_only(self) -> bool {
        matches!(self, Self::Mean | Self::Median | Self::Var | Self::Std)
    }

    /// Whether a column of `dtype` takes part in this reduction. Text
    /// joins `sum` by concatenation and `min`/`max` by lexicographic order.
    #[must_use]
    pub fn accepts(self, dtype: DType) -> bool {
        match self {
            Self::Count | Self::Sum | Self::Min | Self::Max => true,
            _ => dtype.is_numeric() || dtype == DType::Null,
        }
    }
}

/// Reduce one column. With `skipna == false` any missing cell poisons the
/// result to missing.
pub fn reduce_column(
    column: &Column,
    reduction: Reduction,
    skipna: bool,
) -> Result<Scalar, FrameError> {
    if !reduction.accepts(column.dtype()) {
        return Err(FrameError::UnsupportedReduction {
            reduction: reduction.name(),
            dtype: column.dtype(),
        });
    }

    let values = column.values();
    Ok(match reduction {
        Reduction::Sum => nansum(values, column.dtype(), skipna)?,
        Reduction::Mean => nanmean(values, skipna)?,
        Reduction::Min => nanmin(values, skipna),
        Reduction::Max => nanmax(values, skipna),
        Reduction::Median => nanmedian(values, skipna)?,
        Reduction::Var => nanvar(values, 1, skipna)?,
        Reduction::Std => nanstd(values, 1, skipna)?,
        Reduction::Count => nancount(values),
    })
}

/// Covariance or correlation between two equal-length columns.
pub fn pairwise_column_stat(
    left: &Column,
    right: &Column,
    stat: PairwiseStat,
    skipna: bool,
) -> Result<Scalar, FrameError> {
    let reduction = match stat {
        PairwiseStat::Cov => "cov",
        PairwiseStat::Corr => "corr",
    };
    for dtype in [left.dtype(), right.dtype()] {
        if !(dtype.is_numeric() || dtype == DType::Null) {
            return Err(FrameError::UnsupportedReduction { reduction, dtype });
        }
    }
    if left.len() != right.len() {
        return Err(FrameError::LengthMismatch {
            index_len: left.len(),
            column_len: right.len(),
        });
    }
    Ok(nan_pairwise(left.values(), right.values(), stat, skipna)?)
}
