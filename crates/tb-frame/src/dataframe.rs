use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tb_columnar::{ArithmeticOp, Column, FillDirection};
use tb_index::{Index, IndexError, IndexLabel, LevelSelector, align_sorted_union};
use tb_runtime::{EvidenceLedger, RuntimePolicy};
use tb_types::{DType, PairwiseStat, Scalar, compare_with_missing_last};

use crate::series::{invert_mask, true_positions, xs_positions};
use crate::{
    Axis, ColumnView, DropNaHow, FillValue, FrameError, NaOption, RankMethod, Reduction, Series,
    admit_alignment, label_to_scalar, pairwise_column_stat, rank_values, reduce_column,
    scalar_to_label,
};

/// Options for [`DataFrame::set_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetIndexOptions {
    /// Remove the key columns from the table.
    pub drop: bool,
    /// Stable-sort rows by the new composite label.
    pub sort: bool,
    /// Declare the new index unique, failing when it is not.
    pub verify_unique: bool,
}

impl Default for SetIndexOptions {
    fn default() -> Self {
        Self {
            drop: true,
            sort: false,
            verify_unique: false,
        }
    }
}

/// A labeled table: named columns sharing one row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    index: Index,
    column_labels: Index,
    columns: Vec<Column>,
}

/// Column header for an unnamed index level.
fn default_level_name(level: usize, nlevels: usize) -> String {
    if nlevels == 1 {
        "index".to_owned()
    } else {
        format!("level_{level}")
    }
}

/// Scalars for one index level. A level mixing integer and text labels is
/// stored as text.
fn level_scalars(labels: &[IndexLabel]) -> Vec<Scalar> {
    let has_int = labels.iter().any(|l| matches!(l, IndexLabel::Int64(_)));
    let has_text = labels.iter().any(|l| !matches!(l, IndexLabel::Int64(_)));
    if has_int && has_text {
        labels
            .iter()
            .map(|l| Scalar::Utf8(l.to_string()))
            .collect()
    } else {
        labels.iter().map(label_to_scalar).collect()
    }
}

impl DataFrame {
    pub fn new(index: Index, column_labels: Index, columns: Vec<Column>) -> Result<Self, FrameError> {
        if column_labels.len() != columns.len() {
            return Err(FrameError::LengthMismatch {
                index_len: column_labels.len(),
                column_len: columns.len(),
            });
        }
        if let Some(label) = column_labels.first_duplicate() {
            return Err(FrameError::DuplicateColumn {
                label: label.to_string(),
            });
        }
        for column in &columns {
            if column.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: column.len(),
                });
            }
        }
        index.validate()?;
        column_labels.validate()?;

        Ok(Self {
            index,
            column_labels,
            columns,
        })
    }

    /// Build from `(label, column)` pairs in order.
    pub fn from_columns(
        index: Index,
        columns: Vec<(IndexLabel, Column)>,
    ) -> Result<Self, FrameError> {
        let (labels, columns): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
        Self::new(index, Index::new(labels), columns)
    }

    /// Combine series into columns named after them. Rows are the sorted
    /// union of every series' labels unless all indexes are equal; a label
    /// repeated within one series takes its first value.
    pub fn from_series(series: Vec<Series>) -> Result<Self, FrameError> {
        let Some(first) = series.first() else {
            return Self::new(Index::new(Vec::new()), Index::new(Vec::new()), Vec::new());
        };

        let index = if series.iter().all(|s| s.index() == first.index()) {
            first.index().clone()
        } else {
            series
                .iter()
                .skip(1)
                .fold(first.index().unique(), |acc, s| acc.union_sorted(s.index()))
        };

        let mut labels = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for s in &series {
            labels.push(IndexLabel::from(s.name()));
            columns.push(s.conform_to(&index)?);
        }
        Self::new(index, Index::new(labels), columns)
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn column_labels(&self) -> &Index {
        &self.column_labels
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.num_columns())
    }

    fn column_position(&self, label: &IndexLabel) -> Result<usize, FrameError> {
        self.column_labels
            .position(label)
            .ok_or_else(|| FrameError::ColumnNotFound {
                label: label.to_string(),
            })
    }

    fn column_positions(&self, labels: &[IndexLabel]) -> Result<Vec<usize>, FrameError> {
        labels.iter().map(|l| self.column_position(l)).collect()
    }

    #[must_use]
    pub fn column(&self, label: &IndexLabel) -> Option<&Column> {
        self.column_labels
            .position(label)
            .map(|position| &self.columns[position])
    }

    /// Owned copy of one column as a series.
    pub fn get_column(&self, label: &IndexLabel) -> Result<Series, FrameError> {
        let position = self.column_position(label)?;
        Series::new(
            label.to_string(),
            self.index.clone(),
            self.columns[position].clone(),
        )
    }

    /// Borrowed, read-only view of one column.
    pub fn column_view(&self, label: &IndexLabel) -> Result<ColumnView<'_>, FrameError> {
        let position = self.column_position(label)?;
        Ok(ColumnView::new(
            &self.column_labels.labels()[position],
            &self.index,
            &self.columns[position],
        ))
    }

    fn with_columns(&self, columns: Vec<Column>) -> Result<Self, FrameError> {
        Self::new(self.index.clone(), self.column_labels.clone(), columns)
    }

    fn map_columns<F>(&self, f: F) -> Result<Self, FrameError>
    where
        F: Fn(&Column) -> Result<Column, FrameError>,
    {
        let columns = self.columns.iter().map(f).collect::<Result<Vec<_>, _>>()?;
        self.with_columns(columns)
    }

    fn put_column(&self, label: IndexLabel, column: Column) -> Result<Self, FrameError> {
        let mut columns = self.columns.clone();
        match self.column_labels.position(&label) {
            Some(position) => {
                columns[position] = column;
                Self::new(self.index.clone(), self.column_labels.clone(), columns)
            }
            None => {
                columns.push(column);
                let labels = self.column_labels.append(&Index::new(vec![label]));
                Self::new(self.index.clone(), labels, columns)
            }
        }
    }

    /// Add or replace a column, aligning the series to the row labels.
    pub fn with_column(&self, label: IndexLabel, series: &Series) -> Result<Self, FrameError> {
        let column = series.conform_to(&self.index)?;
        self.put_column(label, column)
    }

    /// Add or replace a column from unlabeled values, matched by position.
    pub fn insert_values(&self, label: IndexLabel, values: Vec<Scalar>) -> Result<Self, FrameError> {
        if values.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                index_len: self.len(),
                column_len: values.len(),
            });
        }
        self.put_column(label, Column::from_values(values)?)
    }

    pub fn drop_column(&self, label: &IndexLabel) -> Result<Self, FrameError> {
        let drop = self.column_position(label)?;
        let keep = (0..self.num_columns())
            .filter(|&p| p != drop)
            .collect::<Vec<_>>();
        self.take_columns(&keep)
    }

    pub fn select_columns(&self, labels: &[IndexLabel]) -> Result<Self, FrameError> {
        let positions = self.column_positions(labels)?;
        self.take_columns(&positions)
    }

    fn take_columns(&self, positions: &[usize]) -> Result<Self, FrameError> {
        let columns = positions.iter().map(|&p| self.columns[p].clone()).collect();
        Self::new(
            self.index.clone(),
            self.column_labels.take(positions),
            columns,
        )
    }

    /// Overwrite one cell in place; the row label must be unique.
    pub fn set_value(
        &mut self,
        row: &IndexLabel,
        column: &IndexLabel,
        value: Scalar,
    ) -> Result<(), FrameError> {
        let col = self.column_position(column)?;
        let position = self.index.lookup_unique(row)?;
        self.columns[col].set(position, value)?;
        Ok(())
    }

    // ── Alignment arithmetic ──────────────────────────────────────────

    /// Align rows and columns on their sorted unions, then combine cell-wise.
    ///
    /// Without `fill` a column held by one side only comes out entirely
    /// missing. With `fill`, an absent cell takes `fill` for its side; a cell
    /// absent from both sides stays missing.
    fn binary_op_with_policy(
        &self,
        other: &Self,
        op: ArithmeticOp,
        fill: Option<&Scalar>,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        let rows = align_sorted_union(&self.index, &other.index)?;
        admit_alignment("frame_arithmetic", &rows, policy, ledger)?;
        let cols = align_sorted_union(&self.column_labels, &other.column_labels)?;
        let nrows = rows.union_index.len();

        log::debug!(
            "frame arithmetic {op:?}: {nrows} rows x {} columns",
            cols.union_index.len()
        );

        let side = |frame: &Self, slot: Option<usize>, positions: &[Option<usize>]| {
            match (slot, fill) {
                (Some(c), Some(fill)) => frame.columns[c].reindex_with_fill(positions, fill),
                (Some(c), None) => frame.columns[c].reindex_by_positions(positions),
                (None, Some(fill)) => Column::broadcast(fill, nrows),
                (None, None) => Ok(Column::all_missing(DType::Float64, nrows)),
            }
        };

        let mut columns = Vec::with_capacity(cols.union_index.len());
        for (&lc, &rc) in cols.left_positions.iter().zip(&cols.right_positions) {
            if fill.is_none() && (lc.is_none() || rc.is_none()) {
                columns.push(Column::all_missing(DType::Float64, nrows));
                continue;
            }

            let left = side(self, lc, &rows.left_positions)?;
            let right = side(other, rc, &rows.right_positions)?;
            let mut out = left.binary_numeric(&right, op)?;

            for row in 0..nrows {
                let left_absent = lc.is_none() || rows.left_positions[row].is_none();
                let right_absent = rc.is_none() || rows.right_positions[row].is_none();
                if left_absent && right_absent {
                    out.set(row, Scalar::missing())?;
                }
            }
            columns.push(out);
        }

        Self::new(rows.union_index, cols.union_index, columns)
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

    pub fn add_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.binary_scalar(scalar, ArithmeticOp::Add)?))
    }

    pub fn sub_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.binary_scalar(scalar, ArithmeticOp::Sub)?))
    }

    pub fn mul_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.binary_scalar(scalar, ArithmeticOp::Mul)?))
    }

    pub fn div_scalar(&self, scalar: &Scalar) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.binary_scalar(scalar, ArithmeticOp::Div)?))
    }

    // ── Missing values ────────────────────────────────────────────────

    pub fn isna(&self) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.isna()))
    }

    pub fn notna(&self) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.notna()))
    }

    /// Present values per column, indexed by column label.
    pub fn count(&self) -> Result<Series, FrameError> {
        let counts = self
            .columns
            .iter()
            .map(|c| Scalar::Int64(c.count_valid() as i64))
            .collect();
        Series::new(
            "count",
            self.column_labels.clone(),
            Column::new(DType::Int64, counts)?,
        )
    }

    /// Drop rows by missing-value rule.
    ///
    /// Only `subset` columns are considered when given. `thresh` keeps rows
    /// with at least that many present cells and overrides `how`.
    pub fn dropna_rows(
        &self,
        how: DropNaHow,
        thresh: Option<usize>,
        subset: Option<&[IndexLabel]>,
    ) -> Result<Self, FrameError> {
        let considered = match subset {
            Some(labels) => self.column_positions(labels)?,
            None => (0..self.num_columns()).collect(),
        };

        let keep = (0..self.len())
            .filter(|&row| {
                let present = considered
                    .iter()
                    .filter(|&&c| self.columns[c].validity().get(row))
                    .count();
                match (thresh, how) {
                    (Some(k), _) => present >= k,
                    (None, DropNaHow::Any) => present == considered.len(),
                    (None, DropNaHow::All) => present > 0,
                }
            })
            .collect::<Vec<_>>();

        log::debug!("dropna kept {} of {} rows", keep.len(), self.len());
        self.take_rows(&keep)
    }

    /// Drop every row holding a missing cell.
    pub fn dropna(&self) -> Result<Self, FrameError> {
        self.dropna_rows(DropNaHow::Any, None, None)
    }

    /// Drop columns by missing-value rule.
    pub fn dropna_columns(&self, how: DropNaHow) -> Result<Self, FrameError> {
        let keep = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| match how {
                DropNaHow::Any => !column.has_missing(),
                DropNaHow::All => column.count_valid() > 0,
            })
            .map(|(position, _)| position)
            .collect::<Vec<_>>();
        self.take_columns(&keep)
    }

    pub fn fillna(&self, fill: &FillValue) -> Result<Self, FrameError> {
        match fill {
            FillValue::Scalar(value) => self.map_columns(|c| Ok(c.fillna(value)?)),
            FillValue::PerColumn(mapping) => {
                let mapping = mapping.iter().cloned().collect::<HashMap<_, _>>();
                let columns = self
                    .column_labels
                    .labels()
                    .iter()
                    .zip(&self.columns)
                    .map(|(label, column)| match mapping.get(label) {
                        Some(value) => column.fillna(value),
                        None => Ok(column.clone()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.with_columns(columns)
            }
        }
    }

    pub fn fill_method(
        &self,
        direction: FillDirection,
        limit: Option<usize>,
    ) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.fill_directional(direction, limit)?))
    }

    pub fn ffill(&self) -> Result<Self, FrameError> {
        self.fill_method(FillDirection::Forward, None)
    }

    pub fn bfill(&self) -> Result<Self, FrameError> {
        self.fill_method(FillDirection::Backward, None)
    }

    /// Linear interpolation of numeric columns; other columns are untouched.
    pub fn interpolate(&self) -> Result<Self, FrameError> {
        self.map_columns(|c| Ok(c.interpolate_linear()?))
    }

    /// Condition table conformed to this table's rows and columns. Cells the
    /// condition lacks are missing.
    fn conform_condition(&self, cond: &Self) -> Result<Vec<Column>, FrameError> {
        let rows = cond.index.get_indexer(&self.index);
        self.column_labels
            .labels()
            .iter()
            .map(|label| match cond.column(label) {
                Some(column) if cond.index == self.index => Ok(column.clone()),
                Some(column) => Ok(column.reindex_by_positions(&rows)?),
                None => Ok(Column::all_missing(DType::Bool, self.len())),
            })
            .collect()
    }

    fn where_columns(&self, conds: &[Column], other: &Scalar) -> Result<Self, FrameError> {
        let columns = self
            .columns
            .iter()
            .zip(conds)
            .map(|(column, cond)| {
                let replacement = if other.is_missing() {
                    Column::all_missing(column.dtype(), self.len())
                } else {
                    Column::broadcast(other, self.len())?
                };
                Ok(column.where_cond(cond, &replacement)?)
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        self.with_columns(columns)
    }

    /// Keep cells where `cond` holds, replace the rest with `other`.
    pub fn where_cond(&self, cond: &Self, other: &Scalar) -> Result<Self, FrameError> {
        let conds = self.conform_condition(cond)?;
        self.where_columns(&conds, other)
    }

    /// Replace cells where `cond` holds with `other`.
    pub fn mask(&self, cond: &Self, other: &Scalar) -> Result<Self, FrameError> {
        let conds = self
            .conform_condition(cond)?
            .iter()
            .map(invert_mask)
            .collect::<Result<Vec<_>, _>>()?;
        self.where_columns(&conds, other)
    }

    // ── Reductions ────────────────────────────────────────────────────

    /// Reduce every column taking part in `reduction`; the others are
    /// skipped. Results keep column order.
    pub fn reduce(
        &self,
        reduction: Reduction,
        skipna: bool,
    ) -> Result<Vec<(IndexLabel, Scalar)>, FrameError> {
        self.column_labels
            .labels()
            .iter()
            .zip(&self.columns)
            .filter(|(_, column)| reduction.accepts(column.dtype()))
            .map(|(label, column)| {
                reduce_column(column, reduction, skipna).map(|value| (label.clone(), value))
            })
            .collect()
    }

    pub fn sum(&self) -> Result<Vec<(IndexLabel, Scalar)>, FrameError> {
        self.reduce(Reduction::Sum, true)
    }

    pub fn mean(&self) -> Result<Vec<(IndexLabel, Scalar)>, FrameError> {
        self.reduce(Reduction::Mean, true)
    }

    pub fn min(&self) -> Result<Vec<(IndexLabel, Scalar)>, FrameError> {
        self.reduce(Reduction::Min, true)
    }

    pub fn max(&self) -> Result<Vec<(IndexLabel, Scalar)>, FrameError> {
        self.reduce(Reduction::Max, true)
    }

    fn pairwise_matrix(&self, stat: PairwiseStat, skipna: bool) -> Result<Self, FrameError> {
        let numeric = (0..self.num_columns())
            .filter(|&c| self.columns[c].dtype().is_numeric())
            .collect::<Vec<_>>();
        let labels = self.column_labels.take(&numeric);

        let mut columns = Vec::with_capacity(numeric.len());
        for &j in &numeric {
            let values = numeric
                .iter()
                .map(|&i| pairwise_column_stat(&self.columns[i], &self.columns[j], stat, skipna))
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(Column::new(DType::Float64, values)?);
        }
        Self::new(labels.clone(), labels, columns)
    }

    /// Sample covariance between every pair of numeric columns.
    pub fn cov(&self, skipna: bool) -> Result<Self, FrameError> {
        self.pairwise_matrix(PairwiseStat::Cov, skipna)
    }

    /// Pearson correlation between every pair of numeric columns.
    pub fn corr(&self, skipna: bool) -> Result<Self, FrameError> {
        self.pairwise_matrix(PairwiseStat::Corr, skipna)
    }

    // ── Hierarchical index ────────────────────────────────────────────

    /// Turn `keys` columns into the row index, one level per column in
    /// order. Level names are the column labels.
    ///
    /// Integer and text cells keep their kind. Float and boolean cells
    /// become text labels (`1.5` becomes `"1.5"`, `true` becomes `"true"`),
    /// so look them up with `IndexLabel::Utf8`.
    pub fn set_index(
        &self,
        keys: &[IndexLabel],
        options: SetIndexOptions,
    ) -> Result<Self, FrameError> {
        if keys.is_empty() {
            return Err(IndexError::LevelCountMismatch {
                expected: 1,
                found: 0,
            }
            .into());
        }
        let key_positions = self.column_positions(keys)?;

        let labels = (0..self.len())
            .map(|row| {
                let parts = keys
                    .iter()
                    .zip(&key_positions)
                    .map(|(key, &c)| scalar_to_label(&self.columns[c].values()[row], &key.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(IndexLabel::composite(parts))
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        let names = keys.iter().map(|k| Some(k.to_string())).collect();
        let index = Index::try_new(labels)?.with_names(names)?;

        let kept = if options.drop {
            (0..self.num_columns())
                .filter(|c| !key_positions.contains(c))
                .collect::<Vec<_>>()
        } else {
            (0..self.num_columns()).collect()
        };
        let mut frame = self.take_columns(&kept)?.with_index(index)?;

        if options.sort {
            let order = frame.index.argsort();
            frame = frame.take_rows(&order)?;
        }
        if options.verify_unique {
            frame.index = frame.index.declare_unique()?;
        }

        log::debug!(
            "set_index over {} levels, {} rows",
            frame.index.nlevels(),
            frame.len()
        );
        Ok(frame)
    }

    /// Move index levels back into leading columns and restore a default
    /// positional index. With `drop` the levels are discarded.
    pub fn reset_index(&self, drop: bool) -> Result<Self, FrameError> {
        let range = Index::range(self.len());
        if drop {
            return self.with_index(range);
        }

        let nlevels = self.index.nlevels();
        let mut labels = Vec::with_capacity(nlevels + self.num_columns());
        let mut columns = Vec::with_capacity(nlevels + self.num_columns());
        for level in 0..nlevels {
            let values = self.index.get_level_values(level)?;
            let name = self.index.names()[level]
                .clone()
                .unwrap_or_else(|| default_level_name(level, nlevels));
            labels.push(IndexLabel::from(name));
            columns.push(Column::from_values(level_scalars(values.labels()))?);
        }
        labels.extend(self.column_labels.labels().iter().cloned());
        columns.extend(self.columns.iter().cloned());

        Self::new(range, Index::new(labels), columns)
    }

    /// Same columns under a different row index of equal length.
    pub fn with_index(&self, index: Index) -> Result<Self, FrameError> {
        Self::new(index, self.column_labels.clone(), self.columns.clone())
    }

    pub fn set_index_names(&self, names: Vec<Option<String>>) -> Result<Self, FrameError> {
        self.with_index(self.index.with_names(names)?)
    }

    /// All rows under a full key, in input order.
    pub fn loc_key(&self, label: &IndexLabel) -> Result<Self, FrameError> {
        let positions = self.index.lookup(label)?;
        self.take_rows(&positions)
    }

    /// The single row under `label`, as a one-row table.
    pub fn loc_unique(&self, label: &IndexLabel) -> Result<Self, FrameError> {
        let mut ledger = EvidenceLedger::new();
        self.loc_unique_with_policy(label, &RuntimePolicy::strict(), &mut ledger)
    }

    pub fn loc_unique_with_policy(
        &self,
        label: &IndexLabel,
        policy: &RuntimePolicy,
        ledger: &mut EvidenceLedger,
    ) -> Result<Self, FrameError> {
        match self.index.lookup_unique(label) {
            Ok(position) => self.take_rows(&[position]),
            Err(IndexError::AmbiguousUniqueLookup { label, matches }) => {
                policy.record_unique_lookup_violation("frame_loc_unique", &label, matches, ledger);
                Err(IndexError::AmbiguousUniqueLookup { label, matches }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Rows whose key starts with `prefix`, indexed by the remaining levels.
    pub fn loc_prefix(&self, prefix: &[IndexLabel]) -> Result<Self, FrameError> {
        let (positions, remaining) = self.index.lookup_prefix(prefix)?;
        self.take_rows(&positions)?.with_index(remaining)
    }

    /// Rows matching every per-level selector; the full index is kept.
    pub fn select_levels(&self, selectors: &[LevelSelector]) -> Result<Self, FrameError> {
        let positions = self.index.select_levels(selectors)?;
        self.take_rows(&positions)
    }

    /// Cross-section: rows whose `level` equals `label`, with that level
    /// removed.
    pub fn xs_level(&self, level: usize, label: &IndexLabel) -> Result<Self, FrameError> {
        let positions = xs_positions(&self.index, level, label)?;
        let selected = self.take_rows(&positions)?;
        if self.index.nlevels() == 1 {
            return Ok(selected);
        }
        let index = selected.index.droplevel(level)?;
        selected.with_index(index)
    }

    pub fn swap_levels(&self, a: usize, b: usize) -> Result<Self, FrameError> {
        self.with_index(self.index.swap_levels(a, b)?)
    }

    pub fn droplevel(&self, level: usize) -> Result<Self, FrameError> {
        self.with_index(self.index.droplevel(level)?)
    }

    // ── Selection and ordering ────────────────────────────────────────

    /// Rows at `positions`, in that order.
    pub fn take_rows(&self, positions: &[usize]) -> Result<Self, FrameError> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.take(positions))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(
            self.index.take(positions),
            self.column_labels.clone(),
            columns,
        )
    }

    pub fn iloc(&self, positions: &[usize]) -> Result<Self, FrameError> {
        self.take_rows(positions)
    }

    /// Keep rows where the label-aligned `mask` is `true`.
    pub fn filter_rows(&self, mask: &Series) -> Result<Self, FrameError> {
        let mask = mask.conform_to(&self.index)?;
        self.take_rows(&true_positions(&mask))
    }

    /// Stable sort by row or column labels.
    pub fn sort_index(&self, axis: Axis, ascending: bool) -> Result<Self, FrameError> {
        match axis {
            Axis::Rows => self.take_rows(&self.index.argsort_directed(ascending)),
            Axis::Columns => self.take_columns(&self.column_labels.argsort_directed(ascending)),
        }
    }

    /// Stable multi-key sort, one direction per key. Missing values sort
    /// last whatever the direction.
    pub fn sort_values(&self, keys: &[IndexLabel], ascending: &[bool]) -> Result<Self, FrameError> {
        if keys.len() != ascending.len() {
            return Err(FrameError::SortSpecMismatch {
                keys: keys.len(),
                directions: ascending.len(),
            });
        }
        let key_columns = self
            .column_positions(keys)?
            .into_iter()
            .map(|c| &self.columns[c])
            .zip(ascending.iter().copied())
            .collect::<Vec<_>>();

        let mut order = (0..self.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            key_columns
                .iter()
                .map(|(column, asc)| {
                    compare_with_missing_last(&column.values()[a], &column.values()[b], *asc)
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        self.take_rows(&order)
    }

    /// Rank every column; each result column is `Float64` on the original
    /// rows.
    pub fn rank(
        &self,
        method: RankMethod,
        ascending: bool,
        na_option: NaOption,
    ) -> Result<Self, FrameError> {
        self.map_columns(|c| {
            let ranks = rank_values(c.values(), method, ascending, na_option);
            Ok(Column::new(DType::Float64, ranks)?)
        })
    }

    pub fn head(&self, n: usize) -> Result<Self, FrameError> {
        self.take_rows(&(0..n.min(self.len())).collect::<Vec<_>>())
    }

    pub fn tail(&self, n: usize) -> Result<Self, FrameError> {
        let start = self.len().saturating_sub(n);
        self.take_rows(&(start..self.len()).collect::<Vec<_>>())
    }

    /// `n` rows with the largest present values in `column`, largest first.
    pub fn nlargest(&self, n: usize, column: &IndexLabel) -> Result<Self, FrameError> {
        self.dropna_rows(DropNaHow::Any, None, Some(std::slice::from_ref(column)))?
            .sort_values(std::slice::from_ref(column), &[false])?
            .head(n)
    }

    pub fn nsmallest(&self, n: usize, column: &IndexLabel) -> Result<Self, FrameError> {
        self.dropna_rows(DropNaHow::Any, None, Some(std::slice::from_ref(column)))?
            .sort_values(std::slice::from_ref(column), &[true])?
            .head(n)
    }
}

#[cfg(test)]
mod tests {
    use tb_columnar::Column;
    use tb_index::{Index, IndexError, IndexLabel, LevelSelector};
    use tb_runtime::{EvidenceLedger, IssueKind, RuntimePolicy};
    use tb_types::{DType, Scalar};

    use super::{DataFrame, SetIndexOptions};
    use crate::{Axis, DropNaHow, FillValue, FrameError, NaOption, RankMethod, Reduction, Series};

    fn f(v: f64) -> Scalar {
        Scalar::Float64(v)
    }

    fn na() -> Scalar {
        Scalar::missing()
    }

    fn frame(labels: &[&str], columns: Vec<(&str, Vec<Scalar>)>) -> DataFrame {
        let index = Index::new(labels.iter().map(|l| IndexLabel::from(*l)).collect());
        let columns = columns
            .into_iter()
            .map(|(name, values)| {
                (
                    IndexLabel::from(name),
                    Column::from_values(values).expect("column"),
                )
            })
            .collect();
        DataFrame::from_columns(index, columns).expect("frame")
    }

    fn col<'a>(df: &'a DataFrame, name: &str) -> &'a [Scalar] {
        df.column(&name.into()).expect("column").values()
    }

    fn sales() -> DataFrame {
        frame(
            &["0", "1", "2", "3"],
            vec![
                (
                    "state",
                    vec!["ohio".into(), "ohio".into(), "nevada".into(), "nevada".into()],
                ),
                (
                    "year",
                    vec![2000_i64.into(), 2001_i64.into(), 2000_i64.into(), 2001_i64.into()],
                ),
                ("pop", vec![f(1.5), f(1.7), f(2.4), f(2.9)]),
            ],
        )
    }

    #[test]
    fn construction_rejects_bad_shapes() {
        let err = DataFrame::from_columns(
            Index::range(2),
            vec![("a".into(), Column::from_values(vec![f(1.0)]).expect("col"))],
        )
        .expect_err("length");
        assert!(matches!(err, FrameError::LengthMismatch { .. }));

        let dup = DataFrame::from_columns(
            Index::range(1),
            vec![
                ("a".into(), Column::from_values(vec![f(1.0)]).expect("col")),
                ("a".into(), Column::from_values(vec![f(2.0)]).expect("col")),
            ],
        )
        .expect_err("duplicate");
        assert!(matches!(dup, FrameError::DuplicateColumn { .. }));

        let df = sales();
        assert!(matches!(
            df.insert_values("x".into(), vec![f(1.0)]),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn arithmetic_aligns_rows_and_columns() {
        let left = frame(
            &["a", "b"],
            vec![("x", vec![f(1.0), f(2.0)]), ("y", vec![f(3.0), f(4.0)])],
        );
        let right = frame(
            &["b", "c"],
            vec![("y", vec![f(10.0), f(20.0)]), ("z", vec![f(5.0), f(6.0)])],
        );

        let out = left.add(&right).expect("add");
        assert_eq!(out.shape(), (3, 3));
        assert_eq!(
            out.column_labels().labels(),
            &["x".into(), "y".into(), "z".into()]
        );
        assert!(col(&out, "x").iter().all(Scalar::is_missing));
        assert!(col(&out, "z").iter().all(Scalar::is_missing));
        let y = col(&out, "y");
        assert!(y[0].is_missing());
        assert_eq!(y[1], f(14.0));
        assert!(y[2].is_missing());
    }

    #[test]
    fn fill_value_covers_one_sided_cells_only() {
        let left = frame(&["a", "b"], vec![("x", vec![f(1.0), f(2.0)])]);
        let right = frame(&["b", "c"], vec![("y", vec![f(10.0), f(20.0)])]);

        let out = left.add_fill(&right, &f(0.0)).expect("add_fill");
        let x = col(&out, "x");
        assert_eq!(x[0], f(1.0));
        assert_eq!(x[1], f(2.0));
        assert!(x[2].is_missing(), "absent from both sides");
        let y = col(&out, "y");
        assert!(y[0].is_missing());
        assert_eq!(y[1], f(10.0));
        assert_eq!(y[2], f(20.0));
    }

    #[test]
    fn dropna_policies() {
        // Rows with 0, 1, 2, 3 and 4 missing cells out of four columns.
        let df = frame(
            &["r0", "r1", "r2", "r3", "r4"],
            vec![
                ("a", vec![f(1.0), na(), na(), na(), na()]),
                ("b", vec![f(1.0), f(1.0), na(), na(), na()]),
                ("c", vec![f(1.0), f(1.0), f(1.0), na(), na()]),
                ("d", vec![f(1.0), f(1.0), f(1.0), f(1.0), na()]),
            ],
        );

        let any = df.dropna().expect("any");
        assert_eq!(any.index().labels(), &["r0".into()]);

        let all = df.dropna_rows(DropNaHow::All, None, None).expect("all");
        assert_eq!(all.len(), 4);

        let thresh = df.dropna_rows(DropNaHow::Any, Some(3), None).expect("thresh");
        assert_eq!(thresh.index().labels(), &["r0".into(), "r1".into()]);

        let subset = df
            .dropna_rows(DropNaHow::Any, None, Some(&[IndexLabel::from("d")][..]))
            .expect("subset");
        assert_eq!(subset.len(), 4);

        let cols = df.dropna_columns(DropNaHow::Any).expect("columns");
        assert_eq!(cols.num_columns(), 0);
        assert_eq!(df.num_columns(), 4, "source untouched");
    }

    #[test]
    fn fillna_scalar_and_per_column() {
        let df = frame(
            &["a", "b"],
            vec![
                ("x", vec![na(), 1_i64.into()]),
                ("y", vec![na(), f(2.0)]),
            ],
        );

        let all = df.fillna(&FillValue::Scalar(0_i64.into())).expect("scalar");
        assert_eq!(col(&all, "x"), &[Scalar::Int64(0), Scalar::Int64(1)]);
        assert_eq!(col(&all, "y"), &[f(0.0), f(2.0)]);

        let per = df
            .fillna(&FillValue::PerColumn(vec![("y".into(), f(9.0))]))
            .expect("per column");
        assert!(col(&per, "x")[0].is_missing());
        assert_eq!(col(&per, "y")[0], f(9.0));

        let promoted = df.fillna(&FillValue::Scalar(f(0.5))).expect("promote");
        assert_eq!(promoted.column(&"x".into()).expect("x").dtype(), DType::Float64);
        assert!(df.column(&"x".into()).expect("x").values()[0].is_missing());
    }

    #[test]
    fn forward_fill_keeps_leading_missing() {
        let df = frame(
            &["a", "b", "c", "d"],
            vec![("x", vec![na(), f(1.0), na(), na()])],
        );
        let filled = df.ffill().expect("ffill");
        let x = col(&filled, "x");
        assert!(x[0].is_missing());
        assert_eq!(&x[1..], &[f(1.0), f(1.0), f(1.0)]);

        let limited = df
            .fill_method(tb_columnar::FillDirection::Forward, Some(1))
            .expect("limit");
        assert!(col(&limited, "x")[3].is_missing());
    }

    #[test]
    fn where_and_mask_use_aligned_condition() {
        let df = frame(&["a", "b"], vec![("x", vec![f(1.0), f(-1.0)])]);
        let cond = df.notna().expect("notna");
        let positive = df
            .where_cond(&cond, &f(0.0))
            .expect("where all true");
        assert_eq!(col(&positive, "x"), &[f(1.0), f(-1.0)]);

        let partial = frame(&["a"], vec![("x", vec![true.into()])]);
        let kept = df.where_cond(&partial, &f(0.0)).expect("where");
        assert_eq!(col(&kept, "x")[0], f(1.0));
        assert!(col(&kept, "x")[1].is_missing());

        let masked = df.mask(&partial, &f(0.0)).expect("mask");
        assert_eq!(col(&masked, "x")[0], f(0.0));
    }

    #[test]
    fn reductions_exclude_non_numeric_columns() {
        let df = sales();
        let means = df.reduce(Reduction::Mean, true).expect("mean");
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].0, IndexLabel::from("year"));

        let sums = df.sum().expect("sum");
        assert_eq!(sums.len(), 3);
        assert_eq!(sums[0].1, Scalar::Utf8("ohioohionevadanevada".into()));

        let with_missing = frame(&["a", "b"], vec![("x", vec![f(1.0), na()])]);
        let poisoned = with_missing.reduce(Reduction::Sum, false).expect("sum");
        assert!(poisoned[0].1.is_missing());

        let counts = with_missing.count().expect("count");
        assert_eq!(counts.values(), &[Scalar::Int64(1)]);
    }

    #[test]
    fn reductions_exclude_text_then_poison() {
        let df = frame(
            &["a", "b"],
            vec![("t", vec!["p".into(), na()]), ("x", vec![f(1.0), f(3.0)])],
        );

        let means = df.reduce(Reduction::Mean, false).expect("mean");
        assert_eq!(means.len(), 1);
        assert_eq!(means[0].0, IndexLabel::from("x"));
        assert_eq!(means[0].1, f(2.0));

        let sums = df.reduce(Reduction::Sum, false).expect("sum");
        assert_eq!(sums.len(), 2);
        assert_eq!(sums[0].0, IndexLabel::from("t"));
        assert!(sums[0].1.is_missing());
        assert_eq!(sums[1].0, IndexLabel::from("x"));
        assert_eq!(sums[1].1, f(4.0));
    }

    #[test]
    fn correlation_matrix_over_numeric_columns() {
        let df = frame(
            &["a", "b", "c"],
            vec![
                ("x", vec![f(1.0), f(2.0), f(3.0)]),
                ("t", vec!["p".into(), "q".into(), "r".into()]),
                ("y", vec![f(3.0), f(2.0), f(1.0)]),
            ],
        );
        let corr = df.corr(true).expect("corr");
        assert_eq!(corr.shape(), (2, 2));
        let y = col(&corr, "y");
        assert!(matches!(y[0], Scalar::Float64(v) if (v + 1.0).abs() < 1e-12));
        assert!(matches!(y[1], Scalar::Float64(v) if (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn set_index_builds_named_composite_levels() {
        let df = sales();
        let indexed = df
            .set_index(
                &["state".into(), "year".into()],
                SetIndexOptions {
                    sort: true,
                    verify_unique: true,
                    ..SetIndexOptions::default()
                },
            )
            .expect("set_index");
        assert_eq!(indexed.num_columns(), 1);
        assert_eq!(indexed.index().nlevels(), 2);
        assert_eq!(
            indexed.index().names(),
            &[Some("state".to_owned()), Some("year".to_owned())]
        );
        assert_eq!(
            indexed.index().labels()[0],
            IndexLabel::composite(vec!["nevada".into(), 2000_i64.into()])
        );

        let row = indexed
            .loc_unique(&IndexLabel::composite(vec!["ohio".into(), 2001_i64.into()]))
            .expect("full key");
        assert_eq!(row.len(), 1);
        assert_eq!(col(&row, "pop"), &[f(1.7)]);

        let ohio = indexed.loc_prefix(&["ohio".into()]).expect("prefix");
        assert_eq!(ohio.index().labels(), &[2000_i64.into(), 2001_i64.into()]);
        assert_eq!(ohio.index().name(), Some("year"));

        let swapped = indexed.swap_levels(0, 1).expect("swap");
        let key = IndexLabel::composite(vec![2001_i64.into(), "ohio".into()]);
        assert_eq!(col(&swapped.loc_unique(&key).expect("swapped"), "pop"), &[f(1.7)]);
    }

    #[test]
    fn verify_unique_rejects_duplicates() {
        let df = sales();
        let err = df
            .set_index(
                &["state".into()],
                SetIndexOptions {
                    verify_unique: true,
                    ..SetIndexOptions::default()
                },
            )
            .expect_err("duplicates");
        assert!(matches!(
            err,
            FrameError::Index(IndexError::AmbiguousUniqueLookup { .. })
        ));

        let by_state = df
            .set_index(&["state".into()], SetIndexOptions::default())
            .expect("flat");
        assert_eq!(by_state.loc_key(&"ohio".into()).expect("key").len(), 2);

        let mut ledger = EvidenceLedger::new();
        assert!(
            by_state
                .loc_unique_with_policy(&"ohio".into(), &RuntimePolicy::strict(), &mut ledger)
                .is_err()
        );
        assert_eq!(ledger.of_kind(IssueKind::UniqueLookupViolation).count(), 1);
        assert!(matches!(
            by_state.loc_key(&"utah".into()),
            Err(FrameError::Index(IndexError::LookupMiss { .. }))
        ));
    }

    #[test]
    fn float_and_bool_keys_become_text_labels() {
        let df = frame(
            &["a", "b"],
            vec![
                ("k", vec![f(1.5), f(2.5)]),
                ("flag", vec![true.into(), false.into()]),
                ("v", vec![f(10.0), f(20.0)]),
            ],
        );
        let by_k = df
            .set_index(&["k".into()], SetIndexOptions::default())
            .expect("float key");
        assert_eq!(
            by_k.index().labels(),
            &[IndexLabel::from("1.5"), IndexLabel::from("2.5")]
        );
        assert_eq!(col(&by_k.loc_unique(&"2.5".into()).expect("text"), "v"), &[f(20.0)]);

        let by_flag = df
            .set_index(&["flag".into()], SetIndexOptions::default())
            .expect("bool key");
        assert_eq!(by_flag.index().labels()[0], IndexLabel::from("true"));
    }

    #[test]
    fn missing_key_cell_cannot_become_a_label() {
        let df = frame(&["a"], vec![("k", vec![na()]), ("v", vec![f(1.0)])]);
        assert!(matches!(
            df.set_index(&["k".into()], SetIndexOptions::default()),
            Err(FrameError::MissingLabel { .. })
        ));
    }

    #[test]
    fn reset_index_restores_level_columns() {
        let df = sales();
        let indexed = df
            .set_index(&["state".into(), "year".into()], SetIndexOptions::default())
            .expect("set_index");
        let reset = indexed.reset_index(false).expect("reset");
        assert_eq!(
            reset.column_labels().labels(),
            &["state".into(), "year".into(), "pop".into()]
        );
        assert_eq!(reset.index(), &Index::range(4));
        assert_eq!(col(&reset, "year")[1], Scalar::Int64(2001));

        let unnamed = frame(&["a"], vec![("v", vec![f(1.0)])])
            .reset_index(false)
            .expect("unnamed");
        assert_eq!(unnamed.column_labels().labels()[0], IndexLabel::from("index"));
    }

    #[test]
    fn select_levels_and_cross_section() {
        let indexed = sales()
            .set_index(&["state".into(), "year".into()], SetIndexOptions::default())
            .expect("set_index");
        let picked = indexed
            .select_levels(&[
                LevelSelector::All,
                LevelSelector::between(2001_i64, 2005_i64),
            ])
            .expect("select");
        assert_eq!(col(&picked, "pop"), &[f(1.7), f(2.9)]);

        let xs = indexed.xs_level(1, &2000_i64.into()).expect("xs");
        assert_eq!(xs.index().labels(), &["ohio".into(), "nevada".into()]);
    }

    #[test]
    fn sort_values_multi_key_missing_last() {
        let df = frame(
            &["a", "b", "c", "d"],
            vec![
                ("g", vec![1_i64.into(), 2_i64.into(), 1_i64.into(), 2_i64.into()]),
                ("v", vec![f(1.0), na(), f(3.0), f(0.5)]),
            ],
        );
        let sorted = df
            .sort_values(&["g".into(), "v".into()], &[true, false])
            .expect("sort");
        assert_eq!(
            sorted.index().labels(),
            &["c".into(), "a".into(), "d".into(), "b".into()]
        );
        assert!(matches!(
            df.sort_values(&["g".into()], &[]),
            Err(FrameError::SortSpecMismatch { keys: 1, directions: 0 })
        ));

        let by_label = df.sort_index(Axis::Columns, false).expect("columns");
        assert_eq!(by_label.column_labels().labels(), &["v".into(), "g".into()]);

        let top = df.nlargest(1, &"v".into()).expect("nlargest");
        assert_eq!(top.index().labels(), &["c".into()]);
    }

    #[test]
    fn rank_every_column() {
        let df = frame(
            &["a", "b", "c"],
            vec![
                ("n", vec![100_i64.into(), 100_i64.into(), 100_i64.into()]),
                ("t", vec!["b".into(), "a".into(), "c".into()]),
            ],
        );
        let ranked = df
            .rank(RankMethod::Average, true, NaOption::Keep)
            .expect("rank");
        assert_eq!(col(&ranked, "n"), &[f(2.0), f(2.0), f(2.0)]);
        assert_eq!(col(&ranked, "t"), &[f(2.0), f(1.0), f(3.0)]);
        assert_eq!(ranked.index(), df.index());
    }

    #[test]
    fn selection_is_a_copy_and_views_borrow() {
        let mut df = sales();
        let copy = df.get_column(&"pop".into()).expect("copy");
        df.set_value(&"1".into(), &"pop".into(), f(9.9)).expect("set");
        assert_eq!(copy.values()[1], f(1.7));
        assert_eq!(col(&df, "pop")[1], f(9.9));

        let view = df.column_view(&"pop".into()).expect("view");
        assert_eq!(view.get(&"1".into()), Some(&f(9.9)));
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn frame_serde_round_trip_and_logged_expansion() {
        let _ = env_logger::builder().is_test(true).try_init();

        let df = sales();
        let json = serde_json::to_string(&df).expect("serialize");
        let back: DataFrame = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.shape(), df.shape());
        assert_eq!(back.index(), df.index());
        assert_eq!(back.column_labels(), df.column_labels());
        assert_eq!(col(&back, "pop"), col(&df, "pop"));

        let dup = frame(&["k", "k"], vec![("x", vec![f(1.0), f(2.0)])]);
        let other = frame(&["k", "k", "m"], vec![("x", vec![f(10.0), f(20.0), f(0.0)])]);
        let mut ledger = EvidenceLedger::new();
        let out = dup
            .add_with_policy(&other, &RuntimePolicy::strict(), &mut ledger)
            .expect("cross product");
        assert_eq!(out.len(), 5);
        assert_eq!(ledger.of_kind(IssueKind::DuplicateExpansion).count(), 1);
    }

    #[test]
    fn from_series_unions_rows() {
        let a = Series::from_values("a", vec!["x".into(), "y".into()], vec![f(1.0), f(2.0)])
            .expect("a");
        let b = Series::from_values("b", vec!["z".into(), "x".into()], vec![f(3.0), f(4.0)])
            .expect("b");
        let df = DataFrame::from_series(vec![a, b]).expect("frame");
        assert_eq!(
            df.index().labels(),
            &["x".into(), "y".into(), "z".into()]
        );
        assert_eq!(col(&df, "b")[0], f(4.0));
        assert!(col(&df, "b")[1].is_missing());
    }
}
