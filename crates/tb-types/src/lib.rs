#![forbid(unsafe_code)]

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of element kinds a column can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
}

impl DType {
    /// Kinds that participate in numeric-only reductions (`mean`, `var`, `corr`, ...).
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Bool | Self::Int64 | Self::Float64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
}

/// A single cell value.
///
/// Missing cells never compare equal under `==`, not even to themselves.
/// Use [`Scalar::semantic_eq`] when two missing markers should match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl Scalar {
    /// The canonical missing marker for untyped data.
    #[must_use]
    pub fn missing() -> Self {
        Self::Null(NullKind::Null)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Null(NullKind::NaN)) || matches!(self, Self::Float64(v) if v.is_nan())
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Null | DType::Bool | DType::Int64 | DType::Utf8 => Self::Null(NullKind::Null),
        }
    }

    /// Equality that treats any two missing markers as equal.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self.is_missing(), other.is_missing()) {
            (true, true) => true,
            (false, false) => self == other,
            _ => false,
        }
    }

    #[must_use]
    pub fn coalesce(&self, other: &Self) -> Self {
        if self.is_missing() {
            other.clone()
        } else {
            self.clone()
        }
    }

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Null(kind) => Err(TypeError::ValueIsMissing { kind: *kind }),
            Self::Utf8(v) => Err(TypeError::NonNumericValue {
                value: v.clone(),
                dtype: DType::Utf8,
            }),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("dtype coercion from {left:?} to {right:?} has no compatible common type")]
    IncompatibleDtypes { left: DType, right: DType },
    #[error("cannot cast scalar of dtype {from:?} to {to:?}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot cast float {value} to int64 without loss")]
    LossyFloatToInt { value: f64 },
    #[error("expected 0/1 for bool cast from int64 but found {value}")]
    InvalidBoolInt { value: i64 },
    #[error("expected 0.0/1.0 for bool cast from float64 but found {value}")]
    InvalidBoolFloat { value: f64 },
    #[error("value {value:?} has non-numeric dtype {dtype:?}")]
    NonNumericValue { value: String, dtype: DType },
    #[error("value is missing ({kind:?})")]
    ValueIsMissing { kind: NullKind },
}

pub fn common_dtype(left: DType, right: DType) -> Result<DType, TypeError> {
    use DType::{Bool, Float64, Int64, Null};

    let out = match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Bool, Int64) | (Int64, Bool) => Int64,
        (Bool, Float64) | (Float64, Bool) => Float64,
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => return Err(TypeError::IncompatibleDtypes { left, right }),
    };

    Ok(out)
}

pub fn infer_dtype(values: &[Scalar]) -> Result<DType, TypeError> {
    let mut current = DType::Null;
    for value in values {
        current = common_dtype(current, value.dtype())?;
    }
    Ok(current)
}

/// Cast a scalar to a target dtype, taking ownership so identity casts are free.
pub fn cast_scalar_owned(value: Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if matches!(value, Scalar::Null(_)) {
        return Ok(Scalar::missing_for_dtype(target));
    }
    if from == target {
        return Ok(value);
    }

    match target {
        DType::Null => Ok(Scalar::Null(NullKind::Null)),
        DType::Bool => match &value {
            Scalar::Int64(v) => match *v {
                0 => Ok(Scalar::Bool(false)),
                1 => Ok(Scalar::Bool(true)),
                _ => Err(TypeError::InvalidBoolInt { value: *v }),
            },
            Scalar::Float64(v) => {
                if *v == 0.0 {
                    Ok(Scalar::Bool(false))
                } else if *v == 1.0 {
                    Ok(Scalar::Bool(true))
                } else {
                    Err(TypeError::InvalidBoolFloat { value: *v })
                }
            }
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Int64 => match &value {
            Scalar::Bool(v) => Ok(Scalar::Int64(i64::from(*v))),
            Scalar::Float64(v) => {
                if v.is_nan() {
                    return Ok(Scalar::missing_for_dtype(DType::Int64));
                }
                if !v.is_finite() || *v != v.trunc() {
                    return Err(TypeError::LossyFloatToInt { value: *v });
                }
                if *v < i64::MIN as f64 || *v > i64::MAX as f64 {
                    return Err(TypeError::LossyFloatToInt { value: *v });
                }
                Ok(Scalar::Int64(*v as i64))
            }
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Float64 => match &value {
            Scalar::Bool(v) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),
            Scalar::Int64(v) => Ok(Scalar::Float64(*v as f64)),
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Utf8 => Err(TypeError::InvalidCast { from, to: target }),
    }
}

/// Cast a scalar reference to a target dtype (clones only when conversion is needed).
pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    cast_scalar_owned(value.clone(), target)
}

/// Order two non-missing scalars. Numeric kinds compare by value across
/// kinds; mismatched non-numeric kinds fall back to dtype order.
#[must_use]
pub fn compare_values(left: &Scalar, right: &Scalar) -> Ordering {
    match (left, right) {
        (Scalar::Bool(lhs), Scalar::Bool(rhs)) => lhs.cmp(rhs),
        (Scalar::Int64(lhs), Scalar::Int64(rhs)) => lhs.cmp(rhs),
        (Scalar::Utf8(lhs), Scalar::Utf8(rhs)) => lhs.cmp(rhs),
        (lhs, rhs) if lhs.dtype().is_numeric() && rhs.dtype().is_numeric() => {
            match (lhs.to_f64(), rhs.to_f64()) {
                (Ok(a), Ok(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            }
        }
        _ => left.dtype().cmp(&right.dtype()),
    }
}

/// Order two scalars with missing values after every present value,
/// independent of `ascending`.
#[must_use]
pub fn compare_with_missing_last(left: &Scalar, right: &Scalar, ascending: bool) -> Ordering {
    match (left.is_missing(), right.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let order = compare_values(left, right);
            if ascending { order } else { order.reverse() }
        }
    }
}

// ── Nanops: null-aware reductions ──────────────────────────────────────
//
// Every kernel takes `skipna`. With `skipna == false` a single missing
// operand poisons the result to the missing marker.

fn poisoned() -> Scalar {
    Scalar::Null(NullKind::NaN)
}

/// Numeric payload of `values`, or `None` when a missing operand poisons
/// the reduction.
fn collect_numeric(values: &[Scalar], skipna: bool) -> Result<Option<Vec<f64>>, TypeError> {
    let mut nums = Vec::with_capacity(values.len());
    for value in values {
        if value.is_missing() {
            if skipna {
                continue;
            }
            return Ok(None);
        }
        nums.push(value.to_f64()?);
    }
    Ok(Some(nums))
}

/// Sum of present values in a column of kind `dtype`. Integer and boolean
/// inputs stay `Int64` unless the total overflows, which falls back to
/// `Float64`. Text inputs concatenate. An empty sum is the zero of the kind.
pub fn nansum(values: &[Scalar], dtype: DType, skipna: bool) -> Result<Scalar, TypeError> {
    if dtype == DType::Utf8 || values.iter().any(|v| matches!(v, Scalar::Utf8(_))) {
        return concat_text(values, skipna);
    }

    let mut int_total = Some(0_i64);
    let mut int_as_float = 0.0_f64;
    let mut float_total = 0.0_f64;
    let mut saw_float = false;
    for value in values {
        if value.is_missing() {
            if skipna {
                continue;
            }
            return Ok(poisoned());
        }
        let whole = match value {
            Scalar::Int64(v) => *v,
            Scalar::Bool(v) => i64::from(*v),
            other => {
                saw_float = true;
                float_total += other.to_f64()?;
                continue;
            }
        };
        int_total = int_total.and_then(|total| total.checked_add(whole));
        int_as_float += whole as f64;
    }

    match int_total {
        Some(total) if !saw_float && matches!(dtype, DType::Int64 | DType::Bool) => Ok(Scalar::Int64(total)),
        _ => Ok(Scalar::Float64(float_total + int_as_float)),
    }
}

fn concat_text(values: &[Scalar], skipna: bool) -> Result<Scalar, TypeError> {
    let mut out = String::new();
    for value in values {
        match value {
            Scalar::Utf8(text) => out.push_str(text),
            missing if missing.is_missing() => {
                if !skipna {
                    return Ok(Scalar::Null(NullKind::Null));
                }
            }
            other => {
                return Err(TypeError::IncompatibleDtypes {
                    left: DType::Utf8,
                    right: other.dtype(),
                });
            }
        }
    }
    Ok(Scalar::Utf8(out))
}

pub fn nanmean(values: &[Scalar], skipna: bool) -> Result<Scalar, TypeError> {
    let Some(nums) = collect_numeric(values, skipna)? else {
        return Ok(poisoned());
    };
    if nums.is_empty() {
        return Ok(poisoned());
    }
    let sum: f64 = nums.iter().sum();
    Ok(Scalar::Float64(sum / nums.len() as f64))
}

pub fn nancount(values: &[Scalar]) -> Scalar {
    let n = values.iter().filter(|v| !v.is_missing()).count();
    Scalar::Int64(n as i64)
}

fn extreme(values: &[Scalar], skipna: bool, wanted: Ordering) -> Scalar {
    let mut best: Option<&Scalar> = None;
    for value in values {
        if value.is_missing() {
            if skipna {
                continue;
            }
            return Scalar::missing_for_dtype(value.dtype());
        }
        best = match best {
            Some(current) if compare_values(value, current) != wanted => Some(current),
            _ => Some(value),
        };
    }
    best.cloned().unwrap_or_else(poisoned)
}

/// Smallest present value, keeping the input kind (text compares lexicographically).
#[must_use]
pub fn nanmin(values: &[Scalar], skipna: bool) -> Scalar {
    extreme(values, skipna, Ordering::Less)
}

/// Largest present value, keeping the input kind.
#[must_use]
pub fn nanmax(values: &[Scalar], skipna: bool) -> Scalar {
    extreme(values, skipna, Ordering::Greater)
}

pub fn nanmedian(values: &[Scalar], skipna: bool) -> Result<Scalar, TypeError> {
    let Some(mut nums) = collect_numeric(values, skipna)? else {
        return Ok(poisoned());
    };
    if nums.is_empty() {
        return Ok(poisoned());
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len().is_multiple_of(2) {
        Ok(Scalar::Float64((nums[mid - 1] + nums[mid]) / 2.0))
    } else {
        Ok(Scalar::Float64(nums[mid]))
    }
}

pub fn nanvar(values: &[Scalar], ddof: usize, skipna: bool) -> Result<Scalar, TypeError> {
    let Some(nums) = collect_numeric(values, skipna)? else {
        return Ok(poisoned());
    };
    if nums.len() <= ddof {
        return Ok(poisoned());
    }
    let mean: f64 = nums.iter().sum::<f64>() / nums.len() as f64;
    let sum_sq: f64 = nums.iter().map(|x| (x - mean).powi(2)).sum();
    Ok(Scalar::Float64(sum_sq / (nums.len() - ddof) as f64))
}

pub fn nanstd(values: &[Scalar], ddof: usize, skipna: bool) -> Result<Scalar, TypeError> {
    Ok(match nanvar(values, ddof, skipna)? {
        Scalar::Float64(v) => Scalar::Float64(v.sqrt()),
        other => other,
    })
}

/// Which pairwise statistic [`nan_pairwise`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairwiseStat {
    Cov,
    Corr,
}

/// Sample covariance or Pearson correlation over positions where both sides
/// are present. With `skipna == false` any missing pair poisons the result.
pub fn nan_pairwise(
    left: &[Scalar],
    right: &[Scalar],
    stat: PairwiseStat,
    skipna: bool,
) -> Result<Scalar, TypeError> {
    let mut xs = Vec::with_capacity(left.len());
    let mut ys = Vec::with_capacity(right.len());
    for (x, y) in left.iter().zip(right) {
        if x.is_missing() || y.is_missing() {
            if skipna {
                continue;
            }
            return Ok(poisoned());
        }
        xs.push(x.to_f64()?);
        ys.push(y.to_f64()?);
    }

    if xs.len() < 2 {
        return Ok(poisoned());
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0_f64;
    let mut var_x = 0.0_f64;
    let mut var_y = 0.0_f64;
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    cov /= n - 1.0;
    var_x /= n - 1.0;
    var_y /= n - 1.0;

    Ok(match stat {
        PairwiseStat::Cov => Scalar::Float64(cov),
        PairwiseStat::Corr => {
            let denom = (var_x * var_y).sqrt();
            if denom < f64::EPSILON {
                poisoned()
            } else {
                Scalar::Float64(cov / denom)
            }
        }
    })
}
