use serde::{Deserialize, Serialize};
use tb_columnar::{ArithmeticOp, Column, ComparisonOp, FillDirection};
use tb_index::{AlignMode, Index, IndexError, IndexLabel, LevelSelector, align, align_sorted_union};
use tb_runtime::{EvidenceLedger, RuntimePolicy};
use tb_types::{DType, PairwiseStat, Scalar, common_dtype, compare_with_missing_last};

use crate::{
    DataFrame, FrameError, NaOption, RankMethod, Reduction, admit_alignment, op_symbol,
    pairwise_column_stat, rank_values, reduce_column,
};

/// A labeled vector: one typed column paired 1:1 with an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    index: Index,
    column: Column,
}

/// Positions of `true` cells in a boolean column.
pub(crate) fn true_positions(mask: &Column) -> Vec<usize> {
    mask.values()
        .iter()
        .enumerate()
        .filter(|(_, v)| matches!(v, Scalar::Bool(true)))
        .map(|(i, _)| i)
        .collect()
}

/// Flip a boolean column, keeping missing cells missing.
pub(crate) fn invert_mask(mask: &Column) -> Result<Column, FrameError> {
    let values = mask
        .values()
        .iter()
        .map(|v| match v {
            Scalar::Bool(b) => Scalar::Bool(!b),
            _ => Scalar::missing(),
        })
        .collect();
    Ok(Column::new(DType::Bool, values)?)
}

impl Series {
    pub fn new(name: impl Into<String>, index: Index, column: Column) -> Result<Self, FrameError> {
        if index.len() != column.len() {
            return Err(FrameError::LengthMismatch {
                index_len: index.len(),
                column_len: column.len(),
            });
        }
        index.validate()?;

        Ok(Self {
            name: name.into(),
            index,
            column,
        })
    }

    pub fn from_values(
        name: impl Into<String>,
        index_labels: Vec<IndexLabel>,
        values: Vec<Scalar>,
    ) -> Result<Self, FrameError> {
        let index = Index::new(index_labels);
        let column = Column::from_values(values)?;
        Self::new(name, index, column)
    }

    /// Build from `(label, value)` pairs.
    pub fn from_pairs(
        name: impl Into<String>,
        pairs: Vec<(IndexLabel, Scalar)>,
    ) -> Result<Self, FrameError> {
        let (labels, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self::from_values(name, labels, values)
    }

    /// Repeat one value over the given labels.
    pub fn broadcast(
        name: impl Into<String>,
        value: Scalar,
        index_labels: Vec<IndexLabel>,
    ) -> Result<Self, FrameError> {
        let values = vec![value; index_labels.len()];
        Self::from_values(name, index_labels, values)
    }

    /// Values labeled `0..len`.
    pub fn with_default_index(
        name: impl Into<String>,
        values: Vec<Scalar>,
    ) -> Result<Self, FrameError> {
        let index = Index::range(values.len());
        Self::new(name, index, Column::from_values(values)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: self.index.clone(),
            column: self.column.clone(),
        }
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn column(&self) -> &Column {
        &self.column
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        self.column.values()
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.column.dtype()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Same values under a different index of equal length.
    pub fn with_index(&self, index: Index) -> Result<Self, FrameError> {
        Self::new(self.name.clone(), index, self.column.clone())
    }

    fn with_column(&self, column: Column) -> Result<Self, FrameError> {
        Self::new(self.name.clone(), self.index.clone(), column)
    }

    /// Rows at `positions`, in that order.
    pub fn take(&self, positions: &[usize]) -> Result<Self, FrameError> {
        let column = self.column.take(positions)?;
        Self::new(self.name.clone(), self.index.take(positions), column)
    }

    pub fn iloc(&self, positions: &[usize]) -> Result<Self, FrameError> {
        self.take(positions)
    }

    // ── Alignment arithmetic ──────────────────────────────────────────

    /// Align on the sorted label union and combine element-wise.
    ///
    /// With `fill`, a label absent from one side takes `fill` for that side;
    /// missing values already present still propagate.
    fn binary_op_with_policy(
        &self,
        other: &Self,
        op: ArithmeticOp,
        fill: Option<&Scalar>,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        let plan = align_sorted_union(&self.index, &other.index)?;
        admit_alignment("series_arithmetic", &plan, policy, ledger)?;

        let (left, right) = match fill {
            Some(fill) => (
                self.column.reindex_with_fill(&plan.left_positions, fill)?,
                other.column.reindex_with_fill(&plan.right_positions, fill)?,
            ),
            None => (
                self.column.reindex_by_positions(&plan.left_positions)?,
                other.column.reindex_by_positions(&plan.right_positions)?,
            ),
        };
        let column = left.binary_numeric(&right, op)?;

        let out_name = if self.name == other.name {
            self.name.clone()
        } else {
            format!("{}{}{}", self.name, op_symbol(op), other.name)
        };

        Self::new(out_name, plan.union_index, column)
    }

    pub fn add_with_policy(
        &self,
        other: &Self,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        self.binary_op_with_policy(other, ArithmeticOp::Add, None, policy, ledger)
    }

    pub fn sub_with_policy(
        &self,
        other: &Self,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        self.binary_op_with_policy(other, ArithmeticOp::Sub, None, policy, ledger)
    }

    pub fn mul_with_policy(
        &self,
        other: &Self,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        self.binary_op_with_policy(other, ArithmeticOp::Mul, None, policy, ledger)
    }

    pub fn div_with_policy(
        &self,
        other: &Self,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        self.binary_op_with_policy(other, ArithmeticOp::Div, None, policy, ledger)
    }

    /// Arithmetic with an explicit policy and an optional fill value.
    pub fn arithmetic_with_policy(
        &self,
        other: &Self,
        op: ArithmeticOp,
        fill: Option<&Scalar>,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        self.binary_op_with_policy(other, op, fill, policy, ledger)
    }

    fn strict_op(
        &self,
        other: &Self,
        op: ArithmeticOp,
        fill: Option<&Scalar>,
    ) -> Result<Self, FrameError> {
        let mut ledger = EvidenceLedger::new();
        self.binary_op_with_policy(other, op, fill, &RuntimePolicy::strict(), &mut ledger)
    }

    pub fn add(&self, other: &Self) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Add, None)
    }

    pub fn sub(&self, other: &Self) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Sub, None)
    }

    pub fn mul(&self, other: &Self) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Mul, None)
    }

    pub fn div(&self, other: &Self) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Div, None)
    }

    pub fn add_fill(&self, other: &Self, fill_value: &Scalar) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Add, Some(fill_value))
    }

    pub fn sub_fill(&self, other: &Self, fill_value: &Scalar) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Sub, Some(fill_value))
    }

    pub fn mul_fill(&self, other: &Self, fill_value: &Scalar) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Mul, Some(fill_value))
    }

    pub fn div_fill(&self, other: &Self, fill_value: &Scalar) -> Result<Self, FrameError> {
        self.strict_op(other, ArithmeticOp::Div, Some(fill_value))
    }

    fn scalar_op(&self, scalar: &Scalar, op: ArithmeticOp) -> Result<Self, FrameError> {
        self.with_column(self.column.binary_scalar(scalar, op)?)
    }

    pub fn add_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.scalar_op(scalar, ArithmeticOp::Add)
    }

    pub fn sub_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.scalar_op(scalar, ArithmeticOp::Sub)
    }

    pub fn mul_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.scalar_op(scalar, ArithmeticOp::Mul)
    }

    pub fn div_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.scalar_op(scalar, ArithmeticOp::Div)
    }

    /// Align two series to a common index under `mode`.
    ///
    /// `Inner`, `Left` and `Right` pair each label with its first match on
    /// the other side; `Outer` uses the sorted union.
    pub fn align(&self, other: &Self, mode: AlignMode) -> Result<(Self, Self), FrameError> {
        let plan = align(&self.index, &other.index, mode)?;

        let left_col = self.column.reindex_by_positions(&plan.left_positions)?;
        let right_col = other.column.reindex_by_positions(&plan.right_positions)?;

        let left = Self::new(self.name.clone(), plan.union_index.clone(), left_col)?;
        let right = Self::new(other.name.clone(), plan.union_index, right_col)?;
        Ok((left, right))
    }

    /// Conform to `labels`; unknown labels get missing values.
    pub fn reindex(&self, labels: Vec<IndexLabel>) -> Result<Self, FrameError> {
        let target = Index::try_new(labels)?;
        let target = if target.nlevels() == self.index.nlevels() {
            target.with_names(self.index.names().to_vec())?
        } else {
            target
        };
        let positions = self.index.get_indexer(&target);
        let column = self.column.reindex_by_positions(&positions)?;
        Self::new(self.name.clone(), target, column)
    }

    /// Union of both series, preferring this series' present values.
    pub fn combine_first(&self, other: &Self) -> Result<Self, FrameError> {
        let plan = align_sorted_union(&self.index, &other.index)?;
        let left = self.column.reindex_by_positions(&plan.left_positions)?;
        let right = other.column.reindex_by_positions(&plan.right_positions)?;

        let dtype = common_dtype(left.dtype(), right.dtype())?;
        let values = left
            .values()
            .iter()
            .zip(right.values())
            .map(|(l, r)| l.coalesce(r))
            .collect();

        Self::new(self.name.clone(), plan.union_index, Column::new(dtype, values)?)
    }

    // ── Comparisons ───────────────────────────────────────────────────

    fn compare_aligned(&self, other: &Self, op: ComparisonOp) -> Result<Self, FrameError> {
        let plan = align_sorted_union(&self.index, &other.index)?;
        let left = self.column.reindex_by_positions(&plan.left_positions)?;
        let right = other.column.reindex_by_positions(&plan.right_positions)?;
        Self::new(
            self.name.clone(),
            plan.union_index,
            left.binary_comparison(&right, op)?,
        )
    }

    pub fn gt(&self, other: &Self) -> Result<Self, FrameError> {
        self.compare_aligned(other, ComparisonOp::Gt)
    }

    pub fn lt(&self, other: &Self) -> Result<Self, FrameError> {
        self.compare_aligned(other, ComparisonOp::Lt)
    }

    pub fn ge(&self, other: &Self) -> Result<Self, FrameError> {
        self.compare_aligned(other, ComparisonOp::Ge)
    }

    pub fn le(&self, other: &Self) -> Result<Self, FrameError> {
        self.compare_aligned(other, ComparisonOp::Le)
    }

    pub fn eq_series(&self, other: &Self) -> Result<Self, FrameError> {
        self.compare_aligned(other, ComparisonOp::Eq)
    }

    pub fn ne_series(&self, other: &Self) -> Result<Self, FrameError> {
        self.compare_aligned(other, ComparisonOp::Ne)
    }

    pub fn compare_scalar(&self, scalar: &Scalar, op: ComparisonOp) -> Result<Self, FrameError> {
        self.with_column(self.column.compare_scalar(scalar, op)?)
    }

    // ── Label lookup ──────────────────────────────────────────────────

    /// This series' column conformed to `target` by label (first match).
    /// Labels this series lacks read as missing.
    pub(crate) fn conform_to(&self, target: &Index) -> Result<Column, FrameError> {
        if &self.index == target {
            return Ok(self.column.clone());
        }
        let positions = self.index.get_indexer(target);
        Ok(self.column.reindex_by_positions(&positions)?)
    }

    /// Keep rows where the aligned `mask` is `true`.
    pub fn filter(&self, mask: &Self) -> Result<Self, FrameError> {
        let mask = mask.conform_to(&self.index)?;
        self.take(&true_positions(&mask))
    }

    /// First value stored under `label`.
    #[must_use]
    pub fn get(&self, label: &IndexLabel) -> Option<&Scalar> {
        self.index
            .position(label)
            .and_then(|position| self.column.value(position))
    }

    /// All rows under a full key, in input order.
    pub fn loc_key(&self, label: &IndexLabel) -> Result<Self, FrameError> {
        let positions = self.index.lookup(label)?;
        self.take(&positions)
    }

    /// The single value under `label`.
    pub fn loc_unique(&self, label: &IndexLabel) -> Result<Scalar, FrameError> {
        let mut ledger = EvidenceLedger::new();
        self.loc_unique_with_policy(label, &RuntimePolicy::strict(), &mut ledger)
    }

    /// Like [`Series::loc_unique`], recording an ambiguous match in `ledger`.
    pub fn loc_unique_with_policy(
        &self,
        label: &IndexLabel,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Scalar, FrameError> {
        match self.index.lookup_unique(label) {
            Ok(position) => Ok(self.column.values()[position].clone()),
            Err(IndexError::AmbiguousUniqueLookup { label, matches }) => {
                policy.record_unique_lookup_violation("series_loc_unique", &label, matches, ledger);
                Err(IndexError::AmbiguousUniqueLookup { label, matches }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Rows whose composite key starts with `prefix`, indexed by the
    /// remaining levels.
    pub fn loc_prefix(&self, prefix: &[IndexLabel]) -> Result<Self, FrameError> {
        let (positions, remaining) = self.index.lookup_prefix(prefix)?;
        let column = self.column.take(&positions)?;
        Self::new(self.name.clone(), remaining, column)
    }

    /// Rows matching every per-level selector; the full index is kept.
    pub fn select_levels(&self, selectors: &[LevelSelector]) -> Result<Self, FrameError> {
        let positions = self.index.select_levels(selectors)?;
        self.take(&positions)
    }

    /// Cross-section: rows whose `level` equals `label`, with that level
    /// removed.
    pub fn xs_level(&self, level: usize, label: &IndexLabel) -> Result<Self, FrameError> {
        let positions = xs_positions(&self.index, level, label)?;
        let selected = self.take(&positions)?;
        if self.index.nlevels() == 1 {
            return Ok(selected);
        }
        selected.with_index(selected.index.droplevel(level)?)
    }

    pub fn swap_levels(&self, a: usize, b: usize) -> Result<Self, FrameError> {
        self.with_index(self.index.swap_levels(a, b)?)
    }

    pub fn droplevel(&self, level: usize) -> Result<Self, FrameError> {
        self.with_index(self.index.droplevel(level)?)
    }

    /// Overwrite the value under a unique label in place.
    pub fn set_value(&mut self, label: &IndexLabel, value: Scalar) -> Result<(), FrameError> {
        let position = self.index.lookup_unique(label)?;
        self.column.set(position, value)?;
        Ok(())
    }

    // ── Missing values ────────────────────────────────────────────────

    pub fn isna(&self) -> Result<Self, FrameError> {
        self.with_column(self.column.isna())
    }

    pub fn notna(&self) -> Result<Self, FrameError> {
        self.with_column(self.column.notna())
    }

    /// Number of present values.
    #[must_use]
    pub fn count(&self) -> usize {
        self.column.count_valid()
    }

    pub fn dropna(&self) -> Result<Self, FrameError> {
        let positions = self
            .column
            .validity()
            .bits()
            .enumerate()
            .filter(|(_, valid)| *valid)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        self.take(&positions)
    }

    pub fn fillna(&self, fill_value: &Scalar) -> Result<Self, FrameError> {
        self.with_column(self.column.fillna(fill_value)?)
    }

    pub fn fill_method(
        &self,
        direction: FillDirection,
        limit: Option<usize>,
    ) -> Result<Self, FrameError> {
        self.with_column(self.column.fill_directional(direction, limit)?)
    }

    pub fn ffill(&self) -> Result<Self, FrameError> {
        self.fill_method(FillDirection::Forward, None)
    }

    pub fn bfill(&self) -> Result<Self, FrameError> {
        self.fill_method(FillDirection::Backward, None)
    }

    pub fn interpolate(&self) -> Result<Self, FrameError> {
        self.with_column(self.column.interpolate_linear()?)
    }

    /// Keep values where `cond` holds, replace the rest with `other`.
    pub fn where_cond(&self, cond: &Self, other: &Scalar) -> Result<Self, FrameError> {
        let cond = cond.conform_to(&self.index)?;
        self.where_column(&cond, other)
    }

    /// Replace values where `cond` holds with `other`.
    pub fn mask(&self, cond: &Self, other: &Scalar) -> Result<Self, FrameError> {
        let cond = invert_mask(&cond.conform_to(&self.index)?)?;
        self.where_column(&cond, other)
    }

    fn where_column(&self, cond: &Column, other: &Scalar) -> Result<Self, FrameError> {
        let replacement = if other.is_missing() {
            Column::all_missing(self.dtype(), self.len())
        } else {
            Column::broadcast(other, self.len())?
        };
        self.with_column(self.column.where_cond(cond, &replacement)?)
    }

    // ── Reductions ────────────────────────────────────────────────────

    pub fn reduce(&self, reduction: Reduction, skipna: bool) -> Result<Scalar, FrameError> {
        reduce_column(&self.column, reduction, skipna)
    }

    pub fn sum(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Sum, true)
    }

    pub fn mean(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Mean, true)
    }

    pub fn min(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Min, true)
    }

    pub fn max(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Max, true)
    }

    pub fn median(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Median, true)
    }

    pub fn var(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Var, true)
    }

    pub fn std(&self) -> Result<Scalar, FrameError> {
        self.reduce(Reduction::Std, true)
    }

    fn pairwise(&self, other: &Self, stat: PairwiseStat, skipna: bool) -> Result<Scalar, FrameError> {
        let plan = align_sorted_union(&self.index, &other.index)?;
        let left = self.column.reindex_by_positions(&plan.left_positions)?;
        let right = other.column.reindex_by_positions(&plan.right_positions)?;
        pairwise_column_stat(&left, &right, stat, skipna)
    }

    /// Sample covariance over labels present on both sides.
    pub fn cov(&self, other: &Self, skipna: bool) -> Result<Scalar, FrameError> {
        self.pairwise(other, PairwiseStat::Cov, skipna)
    }

    /// Pearson correlation over labels present on both sides.
    pub fn corr(&self, other: &Self, skipna: bool) -> Result<Scalar, FrameError> {
        self.pairwise(other, PairwiseStat::Corr, skipna)
    }

    // ── Ordering ──────────────────────────────────────────────────────

    /// Stable sort by label.
    pub fn sort_index(&self, ascending: bool) -> Result<Self, FrameError> {
        self.take(&self.index.argsort_directed(ascending))
    }

    /// Stable sort by value; missing values go last in both directions.
    pub fn sort_values(&self, ascending: bool) -> Result<Self, FrameError> {
        let values = self.values();
        let mut order = (0..values.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| compare_with_missing_last(&values[a], &values[b], ascending));
        self.take(&order)
    }

    /// Ranks on the original labels; data is not reordered.
    pub fn rank(
        &self,
        method: RankMethod,
        ascending: bool,
        na_option: NaOption,
    ) -> Result<Self, FrameError> {
        let ranks = rank_values(self.values(), method, ascending, na_option);
        self.with_column(Column::new(DType::Float64, ranks)?)
    }

    pub fn head(&self, n: usize) -> Result<Self, FrameError> {
        self.take(&(0..n.min(self.len())).collect::<Vec<_>>())
    }

    pub fn tail(&self, n: usize) -> Result<Self, FrameError> {
        let start = self.len().saturating_sub(n);
        self.take(&(start..self.len()).collect::<Vec<_>>())
    }

    /// `n` largest present values, largest first; ties keep input order.
    pub fn nlargest(&self, n: usize) -> Result<Self, FrameError> {
        self.dropna()?.sort_values(false)?.head(n)
    }

    pub fn nsmallest(&self, n: usize) -> Result<Self, FrameError> {
        self.dropna()?.sort_values(true)?.head(n)
    }

    /// One-column table named after this series.
    pub fn to_frame(&self) -> Result<DataFrame, FrameError> {
        DataFrame::from_columns(
            self.index.clone(),
            vec![(IndexLabel::from(self.name.as_str()), self.column.clone())],
        )
    }
}

/// Positions whose `level` holds `label`; `LookupMiss` when there are none.
pub(crate) fn xs_positions(
    index: &Index,
    level: usize,
    label: &IndexLabel,
) -> Result<Vec<usize>, FrameError> {
    if level >= index.nlevels() {
        return Err(IndexError::LevelOutOfRange {
            level,
            nlevels: index.nlevels(),
        }
        .into());
    }
    let mut selectors = vec![LevelSelector::All; level + 1];
    selectors[level] = LevelSelector::Exact(label.clone());
    let positions = index.select_levels(&selectors)?;
    if positions.is_empty() {
        return Err(IndexError::LookupMiss {
            label: label.to_string(),
        }
        .into());
    }
    Ok(positions)
}
