#![forbid(unsafe_code)]

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tb_types::{
    DType, NullKind, Scalar, TypeError, cast_scalar, cast_scalar_owned, common_dtype,
    compare_values, infer_dtype,
};
use thiserror::Error;

const WORD_BITS: usize = 64;

/// Packed presence bits: bit `i` is set when value `i` is not missing.
#[derive(Debug, Clone, Eq)]
pub struct ValidityMask {
    words: Vec<u64>,
    len: usize,
}

impl ValidityMask {
    fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    fn from_bools(bits: impl IntoIterator<Item = bool>) -> Self {
        let bits = bits.into_iter().collect::<Vec<_>>();
        let mut mask = Self::zeroed(bits.len());
        for (idx, valid) in bits.into_iter().enumerate() {
            if valid {
                mask.words[idx / WORD_BITS] |= 1 << (idx % WORD_BITS);
            }
        }
        mask
    }

    #[must_use]
    pub fn from_values(values: &[Scalar]) -> Self {
        Self::from_bools(values.iter().map(|v| !v.is_missing()))
    }

    #[must_use]
    pub fn all_valid(len: usize) -> Self {
        Self::from_bools(std::iter::repeat_n(true, len))
    }

    #[must_use]
    pub fn all_invalid(len: usize) -> Self {
        Self::zeroed(len)
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        idx < self.len && (self.words[idx / WORD_BITS] >> (idx % WORD_BITS)) & 1 == 1
    }

    pub fn set(&mut self, idx: usize, valid: bool) {
        if idx >= self.len {
            return;
        }
        let bit = 1_u64 << (idx % WORD_BITS);
        if valid {
            self.words[idx / WORD_BITS] |= bit;
        } else {
            self.words[idx / WORD_BITS] &= !bit;
        }
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        // Bits past `len` are never set.
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn and_mask(&self, other: &Self) -> Self {
        Self::from_bools(self.bits().zip(other.bits()).map(|(a, b)| a && b))
    }

    #[must_use]
    pub fn not_mask(&self) -> Self {
        Self::from_bools(self.bits().map(|b| !b))
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|idx| self.get(idx))
    }
}

impl PartialEq for ValidityMask {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bits().eq(other.bits())
    }
}

impl Serialize for ValidityMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let bits: Vec<bool> = self.bits().collect();
        let mut state = serializer.serialize_struct("ValidityMask", 1)?;
        state.serialize_field("bits", &bits)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ValidityMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            bits: Vec<bool>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self::from_bools(raw.bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Element-wise comparison operations that produce `Bool` columns.
///
/// A missing operand on either side yields a missing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("position {position} out of bounds for column of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error("operation {op:?} is not defined for {left:?} and {right:?}")]
    UnsupportedOperation {
        op: ArithmeticOp,
        left: DType,
        right: DType,
    },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Which direction a propagating fill walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillDirection {
    Forward,
    Backward,
}

/// A typed vector of cells with a presence mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

fn compare_present(left: &Scalar, right: &Scalar, op: ComparisonOp) -> Result<bool, ColumnError> {
    let comparable = left.dtype() == right.dtype()
        || (left.dtype().is_numeric() && right.dtype().is_numeric());
    if !comparable {
        return match op {
            ComparisonOp::Eq => Ok(false),
            ComparisonOp::Ne => Ok(true),
            _ => Err(TypeError::IncompatibleDtypes {
                left: left.dtype(),
                right: right.dtype(),
            }
            .into()),
        };
    }

    let order = compare_values(left, right);
    Ok(match op {
        ComparisonOp::Gt => order == Ordering::Greater,
        ComparisonOp::Lt => order == Ordering::Less,
        ComparisonOp::Eq => order == Ordering::Equal,
        ComparisonOp::Ne => order != Ordering::Equal,
        ComparisonOp::Ge => order != Ordering::Less,
        ComparisonOp::Le => order != Ordering::Greater,
    })
}

fn arithmetic_dtype(left: DType, right: DType, op: ArithmeticOp) -> Result<DType, ColumnError> {
    let unsupported = || ColumnError::UnsupportedOperation { op, left, right };
    match (left, right) {
        (DType::Utf8, DType::Utf8) | (DType::Utf8, DType::Null) | (DType::Null, DType::Utf8) => {
            if op == ArithmeticOp::Add {
                Ok(DType::Utf8)
            } else {
                Err(unsupported())
            }
        }
        (DType::Utf8, _) | (_, DType::Utf8) => Err(unsupported()),
        _ if op == ArithmeticOp::Div => Ok(DType::Float64),
        _ => match common_dtype(left, right)? {
            DType::Bool | DType::Null => Ok(DType::Int64),
            other => Ok(other),
        },
    }
}

fn apply_present(
    left: &Scalar,
    right: &Scalar,
    op: ArithmeticOp,
    out_dtype: DType,
) -> Result<Scalar, ColumnError> {
    match out_dtype {
        DType::Utf8 => match (left, right) {
            (Scalar::Utf8(a), Scalar::Utf8(b)) => Ok(Scalar::Utf8(format!("{a}{b}"))),
            _ => Err(ColumnError::UnsupportedOperation {
                op,
                left: left.dtype(),
                right: right.dtype(),
            }),
        },
        DType::Int64 => {
            let (Scalar::Int64(a), Scalar::Int64(b)) = (
                cast_scalar(left, DType::Int64)?,
                cast_scalar(right, DType::Int64)?,
            ) else {
                return Ok(Scalar::missing_for_dtype(DType::Int64));
            };
            // Fixed-width integer semantics: overflow wraps.
            Ok(Scalar::Int64(match op {
                ArithmeticOp::Add => a.wrapping_add(b),
                ArithmeticOp::Sub => a.wrapping_sub(b),
                ArithmeticOp::Mul => a.wrapping_mul(b),
                ArithmeticOp::Div => return Ok(Scalar::Float64(a as f64 / b as f64)),
            }))
        }
        _ => {
            let (a, b) = (left.to_f64()?, right.to_f64()?);
            Ok(Scalar::Float64(match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Sub => a - b,
                ArithmeticOp::Mul => a * b,
                ArithmeticOp::Div => a / b,
            }))
        }
    }
}

impl Column {
    /// Construct a column, coercing every value to `dtype`. Untyped missing
    /// markers become the kind-specific marker.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let values = values
            .into_iter()
            .map(|value| match value {
                Scalar::Null(_) => Ok(Scalar::missing_for_dtype(dtype)),
                v if v.dtype() == dtype => Ok(v),
                v => cast_scalar_owned(v, dtype),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let validity = ValidityMask::from_values(&values);

        Ok(Self {
            dtype,
            values,
            validity,
        })
    }

    /// Construct a column whose kind is inferred from the values.
    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn all_missing(dtype: DType, len: usize) -> Self {
        Self {
            dtype,
            values: vec![Scalar::missing_for_dtype(dtype); len],
            validity: ValidityMask::all_invalid(len),
        }
    }

    /// A column repeating one value.
    pub fn broadcast(value: &Scalar, len: usize) -> Result<Self, ColumnError> {
        Self::from_values(vec![value.clone(); len])
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    #[must_use]
    pub fn validity(&self) -> &ValidityMask {
        &self.validity
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.validity.count_valid()
    }

    #[must_use]
    pub fn has_missing(&self) -> bool {
        self.count_valid() < self.len()
    }

    /// Re-encode into `dtype`.
    pub fn astype(&self, dtype: DType) -> Result<Self, ColumnError> {
        Self::new(dtype, self.values.clone())
    }

    /// Overwrite one cell in place. When `value` does not fit the current
    /// kind the whole column is promoted to the common kind.
    pub fn set(&mut self, idx: usize, value: Scalar) -> Result<(), ColumnError> {
        if idx >= self.len() {
            return Err(ColumnError::PositionOutOfBounds {
                position: idx,
                len: self.len(),
            });
        }
        let target = self.dtype_accepting(&value)?;
        match cast_scalar(&value, target) {
            Ok(cast) if target == self.dtype => {
                self.validity.set(idx, !cast.is_missing());
                self.values[idx] = cast;
            }
            _ => {
                let mut values = std::mem::take(&mut self.values);
                values[idx] = value;
                *self = Self::new(target, values)?;
            }
        }
        Ok(())
    }

    /// Gather by position; `None` slots become missing.
    pub fn reindex_by_positions(&self, positions: &[Option<usize>]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|slot| {
                slot.and_then(|idx| self.values.get(idx).cloned())
                    .unwrap_or_else(|| Scalar::missing_for_dtype(self.dtype))
            })
            .collect::<Vec<_>>();

        Self::new(self.dtype, values)
    }

    /// Gather by position; `None` slots take `fill` instead of missing.
    /// The column is promoted when `fill` does not fit its kind.
    pub fn reindex_with_fill(
        &self,
        positions: &[Option<usize>],
        fill: &Scalar,
    ) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|slot| match slot.and_then(|idx| self.values.get(idx)) {
                Some(value) => value.clone(),
                None => fill.clone(),
            })
            .collect::<Vec<_>>();

        let target = self.dtype_accepting(fill)?;
        Self::new(target, values)
    }

    /// Gather by position.
    pub fn take(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|&idx| {
                self.values
                    .get(idx)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position: idx,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            dtype: self.dtype,
            validity: ValidityMask::from_values(&values),
            values,
        })
    }

    /// Kind able to hold both this column and `value`: the current kind
    /// when `value` casts to it, otherwise the common kind.
    fn dtype_accepting(&self, value: &Scalar) -> Result<DType, ColumnError> {
        if value.is_missing() {
            return Ok(self.dtype);
        }
        if self.dtype == DType::Null {
            return Ok(value.dtype());
        }
        if cast_scalar(value, self.dtype).is_ok() {
            return Ok(self.dtype);
        }
        Ok(common_dtype(self.dtype, value.dtype())?)
    }

    /// Element-wise arithmetic on equal-length columns.
    ///
    /// Integer and boolean operands stay `Int64` for `Add/Sub/Mul`; `Div`
    /// always yields `Float64` with IEEE division by zero. Text supports
    /// `Add` as concatenation. A missing operand yields a missing cell.
    pub fn binary_numeric(&self, right: &Self, op: ArithmeticOp) -> Result<Self, ColumnError> {
        if self.len() != right.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: right.len(),
            });
        }

        let out_dtype = arithmetic_dtype(self.dtype, right.dtype, op)?;
        let values = self
            .values
            .iter()
            .zip(&right.values)
            .map(|(l, r)| {
                if l.is_missing() || r.is_missing() {
                    Ok(Scalar::missing_for_dtype(out_dtype))
                } else {
                    apply_present(l, r, op, out_dtype)
                }
            })
            .collect::<Result<Vec<_>, ColumnError>>()?;

        Self::new(out_dtype, values)
    }

    /// Arithmetic against a broadcast scalar on the right.
    pub fn binary_scalar(&self, scalar: &Scalar, op: ArithmeticOp) -> Result<Self, ColumnError> {
        let right = if scalar.is_missing() {
            Self::all_missing(DType::Null, self.len())
        } else {
            Self::broadcast(scalar, self.len())?
        };
        self.binary_numeric(&right, op)
    }

    pub fn binary_comparison(&self, right: &Self, op: ComparisonOp) -> Result<Self, ColumnError> {
        if self.len() != right.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: right.len(),
            });
        }

        let values = self
            .values
            .iter()
            .zip(&right.values)
            .map(|(l, r)| {
                if l.is_missing() || r.is_missing() {
                    return Ok(Scalar::Null(NullKind::Null));
                }
                Ok(Scalar::Bool(compare_present(l, r, op)?))
            })
            .collect::<Result<Vec<_>, ColumnError>>()?;

        Self::new(DType::Bool, values)
    }

    pub fn compare_scalar(&self, scalar: &Scalar, op: ComparisonOp) -> Result<Self, ColumnError> {
        let values = self
            .values
            .iter()
            .map(|v| {
                if v.is_missing() || scalar.is_missing() {
                    return Ok(Scalar::Null(NullKind::Null));
                }
                Ok(Scalar::Bool(compare_present(v, scalar, op)?))
            })
            .collect::<Result<Vec<_>, ColumnError>>()?;

        Self::new(DType::Bool, values)
    }

    /// Select elements where `mask` holds `true`; missing mask cells drop.
    pub fn filter_by_mask(&self, mask: &Self) -> Result<Self, ColumnError> {
        if self.len() != mask.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: mask.len(),
            });
        }

        let positions = mask
            .values
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m, Scalar::Bool(true)))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        self.take(&positions)
    }

    /// Keep cells where `cond` is `true`, take `other` where it is `false`,
    /// and yield missing where `cond` is missing.
    pub fn where_cond(&self, cond: &Self, other: &Self) -> Result<Self, ColumnError> {
        for len in [cond.len(), other.len()] {
            if len != self.len() {
                return Err(ColumnError::LengthMismatch {
                    left: self.len(),
                    right: len,
                });
            }
        }

        let target = common_dtype(self.dtype, other.dtype)?;
        let values = self
            .values
            .iter()
            .zip(&cond.values)
            .zip(&other.values)
            .map(|((keep, c), replace)| match c {
                Scalar::Bool(true) => keep.clone(),
                Scalar::Bool(false) => replace.clone(),
                _ => Scalar::missing_for_dtype(target),
            })
            .collect();

        Self::new(target, values)
    }

    /// Boolean column: `true` where the cell is missing.
    #[must_use]
    pub fn isna(&self) -> Self {
        let values = self
            .values
            .iter()
            .map(|v| Scalar::Bool(v.is_missing()))
            .collect::<Vec<_>>();
        Self {
            dtype: DType::Bool,
            validity: ValidityMask::all_valid(values.len()),
            values,
        }
    }

    #[must_use]
    pub fn notna(&self) -> Self {
        let values = self
            .values
            .iter()
            .map(|v| Scalar::Bool(!v.is_missing()))
            .collect::<Vec<_>>();
        Self {
            dtype: DType::Bool,
            validity: ValidityMask::all_valid(values.len()),
            values,
        }
    }

    /// Replace every missing cell with `fill_value`.
    ///
    /// The fill value is cast to the column's kind when that cast is
    /// lossless; otherwise the column is promoted to the common kind.
    pub fn fillna(&self, fill_value: &Scalar) -> Result<Self, ColumnError> {
        if fill_value.is_missing() || !self.has_missing() {
            return Ok(self.clone());
        }
        let target = self.dtype_accepting(fill_value)?;
        let values = self
            .values
            .iter()
            .map(|v| {
                if v.is_missing() {
                    fill_value.clone()
                } else {
                    v.clone()
                }
            })
            .collect();

        Self::new(target, values)
    }

    /// Propagate the nearest present value over missing cells.
    ///
    /// `limit` caps how many consecutive missing cells one value fills.
    /// Missing cells with no present value behind them stay missing.
    pub fn fill_directional(
        &self,
        direction: FillDirection,
        limit: Option<usize>,
    ) -> Result<Self, ColumnError> {
        let mut values = self.values.clone();
        let order: Box<dyn Iterator<Item = usize>> = match direction {
            FillDirection::Forward => Box::new(0..values.len()),
            FillDirection::Backward => Box::new((0..values.len()).rev()),
        };

        let mut last: Option<Scalar> = None;
        let mut run = 0_usize;
        for idx in order {
            if values[idx].is_missing() {
                run += 1;
                if let Some(fill) = &last
                    && limit.is_none_or(|cap| run <= cap)
                {
                    values[idx] = fill.clone();
                }
            } else {
                last = Some(values[idx].clone());
                run = 0;
            }
        }

        Self::new(self.dtype, values)
    }

    pub fn fill_forward(&self, limit: Option<usize>) -> Result<Self, ColumnError> {
        self.fill_directional(FillDirection::Forward, limit)
    }

    pub fn fill_backward(&self, limit: Option<usize>) -> Result<Self, ColumnError> {
        self.fill_directional(FillDirection::Backward, limit)
    }

    /// Linear interpolation by position over numeric columns.
    ///
    /// Leading missing cells stay missing; trailing ones repeat the last
    /// present value. Non-numeric columns are returned unchanged.
    pub fn interpolate_linear(&self) -> Result<Self, ColumnError> {
        if !self.dtype.is_numeric() || !self.has_missing() {
            return Ok(self.clone());
        }

        let present = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_missing())
            .map(|(idx, v)| v.to_f64().map(|f| (idx, f)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = vec![Scalar::missing_for_dtype(DType::Float64); self.len()];
        for (idx, value) in &present {
            out[*idx] = Scalar::Float64(*value);
        }
        for pair in present.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            let span = (x1 - x0) as f64;
            for (x, slot) in out.iter_mut().enumerate().take(x1).skip(x0 + 1) {
                *slot = Scalar::Float64(y0 + (y1 - y0) * (x - x0) as f64 / span);
            }
        }
        if let Some(&(last_idx, last_value)) = present.last() {
            for slot in out.iter_mut().skip(last_idx + 1) {
                *slot = Scalar::Float64(last_value);
            }
        }

        Self::new(DType::Float64, out)
    }

    /// Drop missing cells, returning a shorter column.
    pub fn dropna(&self) -> Result<Self, ColumnError> {
        let positions = self
            .validity
            .bits()
            .enumerate()
            .filter(|(_, valid)| *valid)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        self.take(&positions)
    }

    /// Equality that treats missing markers as equal.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(left, right)| left.semantic_eq(right))
    }
}

#[cfg(test)]
mod tests {
    use tb_types::{DType, NullKind, Scalar};

    use super::{ArithmeticOp, Column, ColumnError, ComparisonOp, ValidityMask};

    fn ints(values: &[Option<i64>]) -> Column {
        Column::new(
            DType::Int64,
            values
                .iter()
                .map(|v| v.map_or(Scalar::missing(), Scalar::Int64))
                .collect(),
        )
        .expect("int column")
    }

    fn floats(values: &[Option<f64>]) -> Column {
        Column::new(
            DType::Float64,
            values
                .iter()
                .map(|v| v.map_or(Scalar::missing(), Scalar::Float64))
                .collect(),
        )
        .expect("float column")
    }

    #[test]
    fn reindex_injects_missing_values() {
        let column = ints(&[Some(10), Some(20)]);
        let out = column
            .reindex_by_positions(&[Some(1), None, Some(0)])
            .expect("reindex should work");

        assert!(out.semantic_eq(&ints(&[Some(20), None, Some(10)])));
        assert_eq!(out.count_valid(), 2);
    }

    #[test]
    fn reindex_with_fill_promotes_when_needed() {
        let column = ints(&[Some(1), Some(2)]);
        let filled = column
            .reindex_with_fill(&[Some(0), None], &Scalar::Int64(0))
            .expect("fill");
        assert_eq!(filled.values(), &[Scalar::Int64(1), Scalar::Int64(0)]);

        let promoted = column
            .reindex_with_fill(&[None, Some(1)], &Scalar::Float64(0.5))
            .expect("promote");
        assert_eq!(promoted.dtype(), DType::Float64);
        assert_eq!(promoted.values(), &[Scalar::Float64(0.5), Scalar::Float64(2.0)]);
    }

    #[test]
    fn integer_arithmetic_stays_integer_and_division_is_float() {
        let left = ints(&[Some(6), Some(1), None]);
        let right = ints(&[Some(3), Some(0), Some(2)]);

        let sum = left.binary_numeric(&right, ArithmeticOp::Add).expect("add");
        assert_eq!(sum.dtype(), DType::Int64);
        assert_eq!(sum.values()[0], Scalar::Int64(9));
        assert!(sum.values()[2].is_missing());

        let quotient = left.binary_numeric(&right, ArithmeticOp::Div).expect("div");
        assert_eq!(quotient.dtype(), DType::Float64);
        assert_eq!(quotient.values()[0], Scalar::Float64(2.0));
        assert_eq!(quotient.values()[1], Scalar::Float64(f64::INFINITY));
        assert!(quotient.values()[2].is_missing());
    }

    #[test]
    fn mixed_numeric_arithmetic_promotes_to_float() {
        let left = ints(&[Some(1), Some(2)]);
        let right = floats(&[Some(0.5), None]);
        let out = left.binary_numeric(&right, ArithmeticOp::Mul).expect("mul");
        assert_eq!(out.dtype(), DType::Float64);
        assert_eq!(out.values()[0], Scalar::Float64(0.5));
        assert!(out.values()[1].is_nan());
    }

    #[test]
    fn text_add_concatenates_and_other_ops_fail() {
        let left = Column::from_values(vec!["a".into(), "b".into()]).expect("text");
        let right = Column::from_values(vec!["x".into(), Scalar::missing()]).expect("text");
        let out = left.binary_numeric(&right, ArithmeticOp::Add).expect("concat");
        assert_eq!(out.values()[0], Scalar::Utf8("ax".into()));
        assert!(out.values()[1].is_missing());

        let err = left
            .binary_numeric(&right, ArithmeticOp::Sub)
            .expect_err("sub on text");
        assert!(matches!(err, ColumnError::UnsupportedOperation { .. }));
    }

    #[test]
    fn length_mismatch_is_reported() {
        let err = ints(&[Some(1)])
            .binary_numeric(&ints(&[Some(1), Some(2)]), ArithmeticOp::Add)
            .expect_err("mismatch");
        assert_eq!(err, ColumnError::LengthMismatch { left: 1, right: 2 });
    }

    #[test]
    fn comparisons_propagate_missing() {
        let column = floats(&[Some(1.0), None, Some(3.0)]);
        let out = column
            .compare_scalar(&Scalar::Int64(2), ComparisonOp::Gt)
            .expect("compare");
        assert_eq!(out.values()[0], Scalar::Bool(false));
        assert!(out.values()[1].is_missing());
        assert_eq!(out.values()[2], Scalar::Bool(true));

        let text = Column::from_values(vec!["a".into()]).expect("text");
        let eq = text
            .compare_scalar(&Scalar::Int64(1), ComparisonOp::Eq)
            .expect("eq across kinds");
        assert_eq!(eq.values(), &[Scalar::Bool(false)]);
        assert!(text.compare_scalar(&Scalar::Int64(1), ComparisonOp::Lt).is_err());
    }

    #[test]
    fn fillna_casts_or_promotes() {
        let column = ints(&[Some(1), None]);
        let same = column.fillna(&Scalar::Float64(7.0)).expect("lossless");
        assert_eq!(same.dtype(), DType::Int64);
        assert_eq!(same.values(), &[Scalar::Int64(1), Scalar::Int64(7)]);

        let promoted = column.fillna(&Scalar::Float64(0.5)).expect("promote");
        assert_eq!(promoted.dtype(), DType::Float64);
        assert_eq!(promoted.values()[1], Scalar::Float64(0.5));

        assert!(column.has_missing(), "source must stay untouched");
    }

    #[test]
    fn forward_fill_keeps_leading_missing() {
        let column = ints(&[None, Some(1), None, None, Some(4), None]);
        let out = column.fill_forward(None).expect("ffill");
        assert!(out.semantic_eq(&ints(&[None, Some(1), Some(1), Some(1), Some(4), Some(4)])));

        let limited = column.fill_forward(Some(1)).expect("ffill limit");
        assert!(limited.semantic_eq(&ints(&[None, Some(1), Some(1), None, Some(4), Some(4)])));
    }

    #[test]
    fn backward_fill_mirrors_forward() {
        let column = ints(&[None, Some(1), None, Some(4), None]);
        let out = column.fill_backward(None).expect("bfill");
        assert!(out.semantic_eq(&ints(&[Some(1), Some(1), Some(4), Some(4), None])));
    }

    #[test]
    fn interpolate_fills_gaps_linearly() {
        let column = floats(&[None, Some(1.0), None, None, Some(4.0), None]);
        let out = column.interpolate_linear().expect("interpolate");
        assert!(out.values()[0].is_missing());
        assert_eq!(out.values()[2], Scalar::Float64(2.0));
        assert_eq!(out.values()[3], Scalar::Float64(3.0));
        assert_eq!(out.values()[5], Scalar::Float64(4.0));

        let text = Column::from_values(vec![Scalar::missing(), "a".into()]).expect("text");
        assert!(text.interpolate_linear().expect("noop").semantic_eq(&text));
    }

    #[test]
    fn where_cond_missing_condition_yields_missing() {
        let column = ints(&[Some(1), Some(2), Some(3)]);
        let cond = Column::from_values(vec![
            Scalar::Bool(true),
            Scalar::Bool(false),
            Scalar::Null(NullKind::Null),
        ])
        .expect("cond");
        let other = ints(&[Some(-1), Some(-2), Some(-3)]);
        let out = column.where_cond(&cond, &other).expect("where");
        assert_eq!(out.values()[0], Scalar::Int64(1));
        assert_eq!(out.values()[1], Scalar::Int64(-2));
        assert!(out.values()[2].is_missing());
    }

    #[test]
    fn set_promotes_when_value_does_not_fit() {
        let mut column = ints(&[Some(1), Some(2)]);
        column.set(0, Scalar::Int64(5)).expect("set");
        assert_eq!(column.values()[0], Scalar::Int64(5));

        column.set(1, Scalar::Float64(2.5)).expect("promote");
        assert_eq!(column.dtype(), DType::Float64);
        assert_eq!(column.values(), &[Scalar::Float64(5.0), Scalar::Float64(2.5)]);

        column.set(0, Scalar::missing()).expect("set missing");
        assert_eq!(column.count_valid(), 1);
        assert!(matches!(
            column.set(9, Scalar::Int64(1)),
            Err(ColumnError::PositionOutOfBounds { position: 9, len: 2 })
        ));
    }

    #[test]
    fn dropna_filter_and_masks() {
        let column = floats(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(
            column.dropna().expect("dropna").values(),
            &[Scalar::Float64(1.0), Scalar::Float64(3.0)]
        );
        assert_eq!(
            column.isna().values(),
            &[Scalar::Bool(false), Scalar::Bool(true), Scalar::Bool(false)]
        );
        assert_eq!(column.notna().count_valid(), 3);

        let mask = Column::from_values(vec![
            Scalar::Bool(true),
            Scalar::Bool(true),
            Scalar::Null(NullKind::Null),
        ])
        .expect("mask");
        let filtered = column.filter_by_mask(&mask).expect("filter");
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn missing_never_equals_itself_but_columns_compare_semantically() {
        let a = floats(&[None]);
        let b = floats(&[None]);
        assert_ne!(a.values()[0], b.values()[0]);
        assert!(a.semantic_eq(&b));
    }

    #[test]
    fn validity_mask_spans_word_boundaries() {
        let mut mask = ValidityMask::all_invalid(130);
        mask.set(0, true);
        mask.set(63, true);
        mask.set(64, true);
        mask.set(129, true);
        mask.set(500, true);
        assert_eq!(mask.count_valid(), 4);
        assert!(mask.get(64));
        assert!(!mask.get(65));

        let all = ValidityMask::all_valid(70);
        assert_eq!(all.count_valid(), 70);
        assert_eq!(all.not_mask().count_valid(), 0);
        assert_eq!(all.and_mask(&mask).count_valid(), 3);
    }

    #[test]
    fn validity_mask_serializes_as_bits() {
        let mask = ValidityMask::from_values(&[Scalar::Int64(1), Scalar::missing()]);
        let json = serde_json::to_string(&mask).expect("serialize");
        assert_eq!(json, r#"{"bits":[true,false]}"#);
        let back: ValidityMask = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, mask);
    }
}
