#![forbid(unsafe_code)]

use std::{collections::HashMap, mem::size_of};

use bumpalo::{Bump, collections::Vec as BumpVec};
use tb_columnar::{Column, ColumnError};
use tb_frame::{DataFrame, FrameError, Reduction, Series, reduce_column};
use tb_index::{Index, IndexError, IndexLabel};
use tb_types::Scalar;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupByError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupByExecutionOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
}

impl Default for GroupByExecutionOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupByExecutionTrace {
    used_arena: bool,
    used_dense_path: bool,
    input_rows: usize,
    estimated_bytes: usize,
}

/// Rows sharing one level value, ordered by that value.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGroups {
    keys: Index,
    positions: Vec<Vec<usize>>,
}

impl LevelGroups {
    /// Flat, sorted index of group keys, named after the grouped level.
    #[must_use]
    pub fn keys(&self) -> &Index {
        &self.keys
    }

    /// Source row positions per group, in input order.
    #[must_use]
    pub fn positions(&self) -> &[Vec<usize>] {
        &self.positions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Estimate grouping intermediates: one position slot and one key reference
/// per row plus hash-map overhead.
fn estimate_grouping_bytes(input_rows: usize) -> usize {
    input_rows.saturating_mul(
        size_of::<usize>()
            .saturating_add(size_of::<&IndexLabel>())
            .saturating_add(64),
    )
}

const DENSE_INT_KEY_RANGE_LIMIT: i128 = 65_536;

/// Bucket fast path for integer level values within a bounded span. Buckets
/// come out already sorted.
fn try_dense_int64_groups(labels: &[IndexLabel]) -> Option<Vec<(IndexLabel, Vec<usize>)>> {
    let mut min_key = i64::MAX;
    let mut max_key = i64::MIN;
    for label in labels {
        let IndexLabel::Int64(v) = label else {
            return None;
        };
        min_key = min_key.min(*v);
        max_key = max_key.max(*v);
    }
    if labels.is_empty() {
        return Some(Vec::new());
    }
    let span = i128::from(max_key) - i128::from(min_key) + 1;
    if span > DENSE_INT_KEY_RANGE_LIMIT {
        return None;
    }

    let mut buckets = vec![Vec::new(); span as usize];
    for (position, label) in labels.iter().enumerate() {
        if let IndexLabel::Int64(v) = label {
            let slot = (i128::from(*v) - i128::from(min_key)) as usize;
            buckets[slot].push(position);
        }
    }

    Some(
        buckets
            .into_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(offset, bucket)| (IndexLabel::Int64(min_key + offset as i64), bucket))
            .collect(),
    )
}

fn group_with_global_allocator(labels: &[IndexLabel]) -> Vec<(IndexLabel, Vec<usize>)> {
    let mut slots = HashMap::<&IndexLabel, usize>::new();
    let mut groups = Vec::<(IndexLabel, Vec<usize>)>::new();

    for (position, label) in labels.iter().enumerate() {
        let slot = *slots.entry(label).or_insert_with(|| {
            groups.push((label.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(position);
    }

    groups.sort_by(|a, b| a.0.cmp(&b.0));
    groups
}

fn group_with_arena(labels: &[IndexLabel]) -> Vec<(IndexLabel, Vec<usize>)> {
    let arena = Bump::new();
    let mut slots = HashMap::<&IndexLabel, usize>::new();
    let mut first_seen = BumpVec::<&IndexLabel>::new_in(&arena);
    let mut buckets = BumpVec::<BumpVec<'_, usize>>::new_in(&arena);

    for (position, label) in labels.iter().enumerate() {
        let slot = *slots.entry(label).or_insert_with(|| {
            first_seen.push(label);
            buckets.push(BumpVec::new_in(&arena));
            buckets.len() - 1
        });
        buckets[slot].push(position);
    }

    let mut order = (0..first_seen.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| first_seen[a].cmp(first_seen[b]));
    order
        .into_iter()
        .map(|slot| (first_seen[slot].clone(), buckets[slot].to_vec()))
        .collect()
}

fn group_by_level_with_trace(
    index: &Index,
    level: usize,
    exec_options: GroupByExecutionOptions,
) -> Result<(LevelGroups, GroupByExecutionTrace), GroupByError> {
    let level_values = index.get_level_values(level)?;
    let labels = level_values.labels();

    let input_rows = labels.len();
    let estimated_bytes = estimate_grouping_bytes(input_rows);
    let use_arena = exec_options.use_arena && estimated_bytes <= exec_options.arena_budget_bytes;

    let (groups, used_dense_path) = match try_dense_int64_groups(labels) {
        Some(groups) => (groups, true),
        None if use_arena => (group_with_arena(labels), false),
        None => (group_with_global_allocator(labels), false),
    };

    log::debug!(
        "grouped {input_rows} rows on level {level} into {} groups (arena={use_arena}, dense={used_dense_path})",
        groups.len()
    );

    let (keys, positions): (Vec<_>, Vec<_>) = groups.into_iter().unzip();
    let keys = Index::new(keys).with_name(level_values.name());
    Ok((
        LevelGroups { keys, positions },
        GroupByExecutionTrace {
            used_arena: use_arena && !used_dense_path,
            used_dense_path,
            input_rows,
            estimated_bytes,
        },
    ))
}

/// Group row positions by the values of one index level.
pub fn group_by_level(index: &Index, level: usize) -> Result<LevelGroups, GroupByError> {
    group_by_level_with_options(index, level, GroupByExecutionOptions::default())
}

pub fn group_by_level_with_options(
    index: &Index,
    level: usize,
    exec_options: GroupByExecutionOptions,
) -> Result<LevelGroups, GroupByError> {
    let (groups, _trace) = group_by_level_with_trace(index, level, exec_options)?;
    Ok(groups)
}

fn reduce_groups(
    column: &Column,
    groups: &LevelGroups,
    reduction: Reduction,
    skipna: bool,
) -> Result<Column, GroupByError> {
    let values = groups
        .positions()
        .iter()
        .map(|positions| {
            let members = column.take(positions)?;
            Ok(reduce_column(&members, reduction, skipna)?)
        })
        .collect::<Result<Vec<Scalar>, GroupByError>>()?;
    Ok(Column::from_values(values)?)
}

/// Aggregate values sharing one level's value, discarding the other levels.
/// The result is indexed by the sorted level values.
pub fn reduce_series_by_level(
    series: &Series,
    level: usize,
    reduction: Reduction,
    skipna: bool,
) -> Result<Series, GroupByError> {
    let groups = group_by_level(series.index(), level)?;
    let column = reduce_groups(series.column(), &groups, reduction, skipna)?;
    Ok(Series::new(series.name(), groups.keys, column)?)
}

/// [`reduce_series_by_level`] addressing the level by name.
pub fn reduce_series_by_level_name(
    series: &Series,
    level_name: &str,
    reduction: Reduction,
    skipna: bool,
) -> Result<Series, GroupByError> {
    let level = series.index().level_by_name(level_name)?;
    reduce_series_by_level(series, level, reduction, skipna)
}

/// Level-wise reduction of every column taking part in `reduction`; other
/// columns are dropped from the result.
pub fn reduce_frame_by_level(
    frame: &DataFrame,
    level: usize,
    reduction: Reduction,
    skipna: bool,
) -> Result<DataFrame, GroupByError> {
    let groups = group_by_level(frame.index(), level)?;

    let mut columns = Vec::with_capacity(frame.num_columns());
    for (label, column) in frame.column_labels().labels().iter().zip(frame.columns()) {
        if !reduction.accepts(column.dtype()) {
            log::debug!(
                "{} skips column {label} of kind {:?}",
                reduction.name(),
                column.dtype()
            );
            continue;
        }
        columns.push((label.clone(), reduce_groups(column, &groups, reduction, skipna)?));
    }

    Ok(DataFrame::from_columns(groups.keys, columns)?)
}

pub fn reduce_frame_by_level_name(
    frame: &DataFrame,
    level_name: &str,
    reduction: Reduction,
    skipna: bool,
) -> Result<DataFrame, GroupByError> {
    let level = frame.index().level_by_name(level_name)?;
    reduce_frame_by_level(frame, level, reduction, skipna)
}
