#![forbid(unsafe_code)]

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An immutable row or column key.
///
/// `Composite` holds one sub-key per level of a hierarchical index. Labels
/// order as `Int64 < Utf8 < Composite`; composite labels compare level by
/// level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexLabel {
    Int64(i64),
    Utf8(String),
    Composite(Vec<IndexLabel>),
}

impl From<i64> for IndexLabel {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl From<Vec<IndexLabel>> for IndexLabel {
    fn from(parts: Vec<IndexLabel>) -> Self {
        Self::composite(parts)
    }
}

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Composite(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl IndexLabel {
    /// Build a composite label. A single part collapses to that part.
    #[must_use]
    pub fn composite(mut parts: Vec<IndexLabel>) -> Self {
        if parts.len() == 1 {
            return parts.remove(0);
        }
        Self::Composite(parts)
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Composite(parts) => parts.len(),
            _ => 1,
        }
    }

    /// Sub-keys of this label; a flat label is its own single part.
    #[must_use]
    pub fn parts(&self) -> &[IndexLabel] {
        match self {
            Self::Composite(parts) => parts,
            flat => std::slice::from_ref(flat),
        }
    }

    #[must_use]
    pub fn level(&self, level: usize) -> Option<&IndexLabel> {
        self.parts().get(level)
    }

    fn starts_with(&self, prefix: &[IndexLabel]) -> bool {
        let parts = self.parts();
        parts.len() >= prefix.len() && parts[..prefix.len()] == *prefix
    }
}

/// Per-level criterion for [`Index::select_levels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelSelector {
    All,
    Exact(IndexLabel),
    OneOf(Vec<IndexLabel>),
    Range {
        start: Bound<IndexLabel>,
        end: Bound<IndexLabel>,
    },
}

impl LevelSelector {
    /// Inclusive range on both ends, the usual label-slice semantics.
    #[must_use]
    pub fn between(start: impl Into<IndexLabel>, end: impl Into<IndexLabel>) -> Self {
        Self::Range {
            start: Bound::Included(start.into()),
            end: Bound::Included(end.into()),
        }
    }

    fn matches(&self, label: &IndexLabel) -> bool {
        match self {
            Self::All => true,
            Self::Exact(wanted) => label == wanted,
            Self::OneOf(wanted) => wanted.contains(label),
            Self::Range { start, end } => {
                let above = match start {
                    Bound::Included(lo) => label >= lo,
                    Bound::Excluded(lo) => label > lo,
                    Bound::Unbounded => true,
                };
                let below = match end {
                    Bound::Included(hi) => label <= hi,
                    Bound::Excluded(hi) => label < hi,
                    Bound::Unbounded => true,
                };
                above && below
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("alignment vectors must have equal lengths")]
    InvalidAlignmentVectors,
    #[error("label {label} not found in index")]
    LookupMiss { label: String },
    #[error("lookup of {label} expected a unique match but found {matches} rows")]
    AmbiguousUniqueLookup { label: String, matches: usize },
    #[error("index labels are immutable; build a new index instead")]
    ImmutableLabels,
    #[error("composite label at position {position} has {found} levels, expected {expected}")]
    ArityMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },
    #[error("level {level} out of range for index with {nlevels} levels")]
    LevelOutOfRange { level: usize, nlevels: usize },
    #[error("level name {name:?} not found")]
    LevelNameNotFound { name: String },
    #[error("expected {expected} level entries but got {found}")]
    LevelCountMismatch { expected: usize, found: usize },
    #[error("cannot drop the only level of an index")]
    CannotDropOnlyLevel,
    #[error("position {position} out of bounds for index of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
}

/// An immutable, ordered label sequence.
///
/// Labels live behind an `Arc`, so clones share storage. Every structural
/// change (reordering, renaming, swapping levels) builds a new `Index`; the
/// lazily computed caches belong to one instance and never outlive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    labels: Arc<[IndexLabel]>,
    names: Vec<Option<String>>,
    #[serde(default)]
    unique_declared: bool,
    #[serde(skip)]
    duplicate_cache: OnceCell<bool>,
    #[serde(skip)]
    positions_cache: OnceCell<HashMap<IndexLabel, Vec<usize>>>,
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for Index {}

fn detect_duplicates(labels: &[IndexLabel]) -> bool {
    let mut seen = HashSet::<&IndexLabel>::with_capacity(labels.len());
    labels.iter().any(|label| !seen.insert(label))
}

impl Index {
    /// Build an index without checking composite arity. Containers validate
    /// arity on construction via [`Index::validate`].
    #[must_use]
    pub fn new(labels: Vec<IndexLabel>) -> Self {
        let nlevels = labels.first().map_or(1, IndexLabel::arity);
        Self::from_parts(labels.into(), vec![None; nlevels], false)
    }

    /// Build an index, rejecting composite labels of unequal arity.
    pub fn try_new(labels: Vec<IndexLabel>) -> Result<Self, IndexError> {
        let index = Self::new(labels);
        index.validate()?;
        Ok(index)
    }

    /// Build a composite index from per-row tuples.
    pub fn from_tuples(tuples: Vec<Vec<IndexLabel>>) -> Result<Self, IndexError> {
        Self::try_new(tuples.into_iter().map(IndexLabel::composite).collect())
    }

    /// Build a composite index from equal-length level arrays, outermost first.
    pub fn from_arrays(levels: Vec<Vec<IndexLabel>>) -> Result<Self, IndexError> {
        let len = levels.first().map_or(0, Vec::len);
        for level in &levels {
            if level.len() != len {
                return Err(IndexError::LevelCountMismatch {
                    expected: len,
                    found: level.len(),
                });
            }
        }
        let mut tuples = vec![Vec::with_capacity(levels.len()); len];
        for level in levels {
            for (row, label) in level.into_iter().enumerate() {
                tuples[row].push(label);
            }
        }
        Self::from_tuples(tuples)
    }

    #[must_use]
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(values.into_iter().map(IndexLabel::from).collect())
    }

    #[must_use]
    pub fn from_utf8(values: Vec<String>) -> Self {
        Self::new(values.into_iter().map(IndexLabel::from).collect())
    }

    /// Default positional index `0..len`.
    #[must_use]
    pub fn range(len: usize) -> Self {
        Self::new((0..len as i64).map(IndexLabel::from).collect())
    }

    fn from_parts(labels: Arc<[IndexLabel]>, names: Vec<Option<String>>, unique: bool) -> Self {
        Self {
            labels,
            names,
            unique_declared: unique,
            duplicate_cache: OnceCell::new(),
            positions_cache: OnceCell::new(),
        }
    }

    /// New index over `labels` that keeps this index's level names.
    fn derive(&self, labels: Vec<IndexLabel>) -> Self {
        let nlevels = labels.first().map_or(self.nlevels(), IndexLabel::arity);
        let names = if nlevels == self.nlevels() {
            self.names.clone()
        } else {
            vec![None; nlevels]
        };
        Self::from_parts(labels.into(), names, false)
    }

    /// Check that every label has the same number of levels.
    pub fn validate(&self) -> Result<(), IndexError> {
        let expected = self.nlevels();
        for (position, label) in self.labels.iter().enumerate() {
            if label.arity() != expected {
                return Err(IndexError::ArityMismatch {
                    position,
                    expected,
                    found: label.arity(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[IndexLabel] {
        &self.labels
    }

    #[must_use]
    pub fn label(&self, position: usize) -> Option<&IndexLabel> {
        self.labels.get(position)
    }

    /// Whether two indexes share the same label storage.
    #[must_use]
    pub fn shares_labels_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.labels, &other.labels)
    }

    // ── Level metadata ────────────────────────────────────────────────

    #[must_use]
    pub fn nlevels(&self) -> usize {
        self.names.len().max(1)
    }

    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.nlevels() > 1
    }

    #[must_use]
    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    /// Name of the outermost level (the axis name of a flat index).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.names.first().and_then(Option::as_deref)
    }

    pub fn with_names(&self, names: Vec<Option<String>>) -> Result<Self, IndexError> {
        if names.len() != self.nlevels() {
            return Err(IndexError::LevelCountMismatch {
                expected: self.nlevels(),
                found: names.len(),
            });
        }
        Ok(Self::from_parts(
            Arc::clone(&self.labels),
            names,
            self.unique_declared,
        ))
    }

    #[must_use]
    pub fn with_name(&self, name: Option<&str>) -> Self {
        let mut names = self.names.clone();
        if let Some(first) = names.first_mut() {
            *first = name.map(str::to_owned);
        }
        Self::from_parts(Arc::clone(&self.labels), names, self.unique_declared)
    }

    pub fn level_by_name(&self, name: &str) -> Result<usize, IndexError> {
        self.names
            .iter()
            .position(|candidate| candidate.as_deref() == Some(name))
            .ok_or_else(|| IndexError::LevelNameNotFound {
                name: name.to_owned(),
            })
    }

    fn check_level(&self, level: usize) -> Result<(), IndexError> {
        if level >= self.nlevels() {
            return Err(IndexError::LevelOutOfRange {
                level,
                nlevels: self.nlevels(),
            });
        }
        Ok(())
    }

    /// Values of one level as a flat index carrying that level's name.
    pub fn get_level_values(&self, level: usize) -> Result<Self, IndexError> {
        self.check_level(level)?;
        let labels = self
            .labels
            .iter()
            .map(|label| label.parts()[level].clone())
            .collect::<Vec<_>>();
        Ok(Self::from_parts(
            labels.into(),
            vec![self.names.get(level).cloned().flatten()],
            false,
        ))
    }

    /// Reorder levels; `order[k]` names the source level placed at `k`.
    pub fn reorder_levels(&self, order: &[usize]) -> Result<Self, IndexError> {
        if order.len() != self.nlevels() {
            return Err(IndexError::LevelCountMismatch {
                expected: self.nlevels(),
                found: order.len(),
            });
        }
        for &level in order {
            self.check_level(level)?;
        }
        let labels = self
            .labels
            .iter()
            .map(|label| {
                let parts = label.parts();
                IndexLabel::composite(order.iter().map(|&l| parts[l].clone()).collect())
            })
            .collect::<Vec<_>>();
        let names = order.iter().map(|&l| self.names[l].clone()).collect();
        Ok(Self::from_parts(labels.into(), names, self.unique_declared))
    }

    /// Exchange two levels. Row order and row-to-data mapping are unchanged.
    pub fn swap_levels(&self, a: usize, b: usize) -> Result<Self, IndexError> {
        self.check_level(a)?;
        self.check_level(b)?;
        let mut order = (0..self.nlevels()).collect::<Vec<_>>();
        order.swap(a, b);
        self.reorder_levels(&order)
    }

    pub fn droplevel(&self, level: usize) -> Result<Self, IndexError> {
        self.check_level(level)?;
        if self.nlevels() == 1 {
            return Err(IndexError::CannotDropOnlyLevel);
        }
        let order = (0..self.nlevels())
            .filter(|&l| l != level)
            .collect::<Vec<_>>();
        self.drop_to_levels(&order)
    }

    /// Keep only `levels` (in the given order); names follow their levels.
    fn drop_to_levels(&self, levels: &[usize]) -> Result<Self, IndexError> {
        let labels = self
            .labels
            .iter()
            .map(|label| {
                let parts = label.parts();
                IndexLabel::composite(levels.iter().map(|&l| parts[l].clone()).collect())
            })
            .collect::<Vec<_>>();
        let names = levels.iter().map(|&l| self.names[l].clone()).collect();
        Ok(Self::from_parts(labels.into(), names, false))
    }

    // ── Uniqueness ────────────────────────────────────────────────────

    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        *self
            .duplicate_cache
            .get_or_init(|| detect_duplicates(&self.labels))
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        !self.has_duplicates()
    }

    #[must_use]
    pub fn unique_declared(&self) -> bool {
        self.unique_declared
    }

    /// Declare that labels are unique; lookups then refuse multiple matches.
    pub fn declare_unique(&self) -> Result<Self, IndexError> {
        if let Some(label) = self.first_duplicate() {
            let matches = self.positions_of(label).len();
            return Err(IndexError::AmbiguousUniqueLookup {
                label: label.to_string(),
                matches,
            });
        }
        Ok(Self::from_parts(
            Arc::clone(&self.labels),
            self.names.clone(),
            true,
        ))
    }

    /// The first label that repeats an earlier one.
    #[must_use]
    pub fn first_duplicate(&self) -> Option<&IndexLabel> {
        let mut seen = HashSet::<&IndexLabel>::new();
        self.labels.iter().find(|label| !seen.insert(label))
    }

    // ── Lookup ────────────────────────────────────────────────────────

    fn positions_map(&self) -> &HashMap<IndexLabel, Vec<usize>> {
        self.positions_cache.get_or_init(|| {
            let mut map = HashMap::<IndexLabel, Vec<usize>>::with_capacity(self.labels.len());
            for (position, label) in self.labels.iter().enumerate() {
                map.entry(label.clone()).or_default().push(position);
            }
            map
        })
    }

    /// Every position holding `label`, in index order.
    #[must_use]
    pub fn positions_of(&self, label: &IndexLabel) -> &[usize] {
        self.positions_map()
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First position holding `label`.
    #[must_use]
    pub fn position(&self, label: &IndexLabel) -> Option<usize> {
        self.positions_of(label).first().copied()
    }

    #[must_use]
    pub fn contains(&self, label: &IndexLabel) -> bool {
        !self.positions_of(label).is_empty()
    }

    /// Full-key lookup: all matching positions. Fails with `LookupMiss` when
    /// nothing matches, and with `AmbiguousUniqueLookup` when the index is
    /// declared unique but several rows match.
    pub fn lookup(&self, label: &IndexLabel) -> Result<Vec<usize>, IndexError> {
        let positions = self.positions_of(label);
        if positions.is_empty() {
            return Err(IndexError::LookupMiss {
                label: label.to_string(),
            });
        }
        if self.unique_declared && positions.len() > 1 {
            return Err(IndexError::AmbiguousUniqueLookup {
                label: label.to_string(),
                matches: positions.len(),
            });
        }
        Ok(positions.to_vec())
    }

    /// Lookup that expects exactly one match.
    pub fn lookup_unique(&self, label: &IndexLabel) -> Result<usize, IndexError> {
        match self.positions_of(label) {
            [] => Err(IndexError::LookupMiss {
                label: label.to_string(),
            }),
            [single] => Ok(*single),
            many => Err(IndexError::AmbiguousUniqueLookup {
                label: label.to_string(),
                matches: many.len(),
            }),
        }
    }

    /// Partial-key lookup from the outermost level inward.
    ///
    /// Returns the matching positions and the index of the remaining levels.
    /// A prefix covering every level behaves like a full-key lookup and the
    /// remaining index keeps the matched labels.
    pub fn lookup_prefix(&self, prefix: &[IndexLabel]) -> Result<(Vec<usize>, Self), IndexError> {
        if prefix.len() > self.nlevels() {
            return Err(IndexError::LevelOutOfRange {
                level: prefix.len() - 1,
                nlevels: self.nlevels(),
            });
        }
        if prefix.is_empty() {
            return Ok(((0..self.len()).collect(), self.clone()));
        }
        if prefix.len() == self.nlevels() {
            let positions = self.lookup(&IndexLabel::composite(prefix.to_vec()))?;
            let remaining = self.take(&positions);
            return Ok((positions, remaining));
        }

        let positions = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.starts_with(prefix))
            .map(|(position, _)| position)
            .collect::<Vec<_>>();
        if positions.is_empty() {
            return Err(IndexError::LookupMiss {
                label: IndexLabel::composite(prefix.to_vec()).to_string(),
            });
        }

        let kept = (prefix.len()..self.nlevels()).collect::<Vec<_>>();
        let remaining = self.take(&positions).drop_to_levels(&kept)?;
        Ok((positions, remaining))
    }

    /// Positions satisfying every per-level selector (logical AND). Levels
    /// beyond `selectors.len()` are unconstrained.
    pub fn select_levels(&self, selectors: &[LevelSelector]) -> Result<Vec<usize>, IndexError> {
        if selectors.len() > self.nlevels() {
            return Err(IndexError::LevelCountMismatch {
                expected: self.nlevels(),
                found: selectors.len(),
            });
        }
        Ok(self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| {
                let parts = label.parts();
                selectors
                    .iter()
                    .zip(parts)
                    .all(|(selector, part)| selector.matches(part))
            })
            .map(|(position, _)| position)
            .collect())
    }

    #[must_use]
    pub fn get_indexer(&self, target: &Index) -> Vec<Option<usize>> {
        target
            .labels
            .iter()
            .map(|label| self.position(label))
            .collect()
    }

    #[must_use]
    pub fn isin(&self, values: &[IndexLabel]) -> Vec<bool> {
        let set: HashSet<&IndexLabel> = values.iter().collect();
        self.labels.iter().map(|l| set.contains(l)).collect()
    }

    // ── Immutability ──────────────────────────────────────────────────

    /// In-place label assignment is not supported; the index is left untouched.
    pub fn assign_label(&mut self, position: usize, _label: IndexLabel) -> Result<(), IndexError> {
        if position >= self.len() {
            return Err(IndexError::PositionOutOfBounds {
                position,
                len: self.len(),
            });
        }
        Err(IndexError::ImmutableLabels)
    }

    /// Copy of this index with the label at `position` replaced.
    pub fn with_label_at(&self, position: usize, label: IndexLabel) -> Result<Self, IndexError> {
        if position >= self.len() {
            return Err(IndexError::PositionOutOfBounds {
                position,
                len: self.len(),
            });
        }
        let mut labels = self.labels.to_vec();
        labels[position] = label;
        let out = self.derive(labels);
        out.validate()?;
        Ok(out)
    }

    // ── Set operations ────────────────────────────────────────────────

    #[must_use]
    pub fn unique(&self) -> Self {
        let mut seen = HashSet::<&IndexLabel>::new();
        let labels: Vec<IndexLabel> = self
            .labels
            .iter()
            .filter(|l| seen.insert(l))
            .cloned()
            .collect();
        self.derive(labels)
    }

    /// Labels present in both, in `self` order, deduplicated.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut seen = HashSet::<&IndexLabel>::new();
        let labels: Vec<IndexLabel> = self
            .labels
            .iter()
            .filter(|l| other.contains(l) && seen.insert(l))
            .cloned()
            .collect();
        self.derive(labels)
    }

    /// Sorted, deduplicated union of both label sets.
    #[must_use]
    pub fn union_sorted(&self, other: &Self) -> Self {
        let mut labels = self
            .labels
            .iter()
            .chain(other.labels.iter())
            .cloned()
            .collect::<Vec<_>>();
        labels.sort();
        labels.dedup();
        let mut out = self.derive(labels);
        if self.names != other.names {
            out.names = vec![None; out.nlevels()];
        }
        out
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut seen = HashSet::<&IndexLabel>::new();
        let labels: Vec<IndexLabel> = self
            .labels
            .iter()
            .filter(|l| !other.contains(l) && seen.insert(l))
            .cloned()
            .collect();
        self.derive(labels)
    }

    // ── Ordering and slicing ──────────────────────────────────────────

    /// Stable ascending order of positions; equal labels keep input order.
    #[must_use]
    pub fn argsort(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.labels.len()).collect();
        indices.sort_by(|&a, &b| self.labels[a].cmp(&self.labels[b]));
        indices
    }

    /// Stable order of positions by label, ascending or descending. Ties
    /// keep input order in both directions.
    #[must_use]
    pub fn argsort_directed(&self, ascending: bool) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.labels.len()).collect();
        indices.sort_by(|&a, &b| {
            let order = self.labels[a].cmp(&self.labels[b]);
            if ascending { order } else { order.reverse() }
        });
        indices
    }

    #[must_use]
    pub fn is_monotonic_increasing(&self) -> bool {
        self.labels.windows(2).all(|w| w[0] <= w[1])
    }

    #[must_use]
    pub fn take(&self, positions: &[usize]) -> Self {
        let labels = positions
            .iter()
            .map(|&i| self.labels[i].clone())
            .collect::<Vec<_>>();
        let mut seen = HashSet::with_capacity(positions.len());
        let still_unique = self.unique_declared && positions.iter().all(|p| seen.insert(*p));
        Self::from_parts(labels.into(), self.names.clone(), still_unique)
    }

    #[must_use]
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let end = (start + len).min(self.labels.len());
        let start = start.min(self.labels.len());
        self.take(&(start..end).collect::<Vec<_>>())
    }

    /// Concatenate label sequences. Uniqueness is not carried over.
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        let labels = self
            .labels
            .iter()
            .chain(other.labels.iter())
            .cloned()
            .collect::<Vec<_>>();
        self.derive(labels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPlan {
    pub union_index: Index,
    pub left_positions: Vec<Option<usize>>,
    pub right_positions: Vec<Option<usize>>,
    /// Labels present more than once on some side and on both sides, which
    /// were expanded to the cross-product of their occurrences.
    pub expanded_labels: Vec<IndexLabel>,
}

/// Alignment mode for index-level join semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMode {
    /// Only labels present in both indexes.
    Inner,
    /// All left labels; right fills with None for missing.
    Left,
    /// All right labels; left fills with None for missing.
    Right,
    /// Sorted union of both indexes. Default for arithmetic.
    Outer,
}

/// Align two indexes using the specified join mode.
pub fn align(left: &Index, right: &Index, mode: AlignMode) -> Result<AlignmentPlan, IndexError> {
    match mode {
        AlignMode::Inner => Ok(align_inner(left, right)),
        AlignMode::Left => Ok(align_left(left, right)),
        AlignMode::Right => {
            let plan = align_left(right, left);
            Ok(AlignmentPlan {
                union_index: plan.union_index,
                left_positions: plan.right_positions,
                right_positions: plan.left_positions,
                expanded_labels: plan.expanded_labels,
            })
        }
        AlignMode::Outer => align_sorted_union(left, right),
    }
}

/// Inner alignment: labels present in both indexes, in left order
/// (first-match semantics on the right).
#[must_use]
pub fn align_inner(left: &Index, right: &Index) -> AlignmentPlan {
    let mut output_labels = Vec::new();
    let mut left_positions = Vec::new();
    let mut right_positions = Vec::new();

    for (left_pos, label) in left.labels.iter().enumerate() {
        if let Some(right_pos) = right.position(label) {
            output_labels.push(label.clone());
            left_positions.push(Some(left_pos));
            right_positions.push(Some(right_pos));
        }
    }

    AlignmentPlan {
        union_index: left.derive(output_labels),
        left_positions,
        right_positions,
        expanded_labels: Vec::new(),
    }
}

/// Left alignment: all left labels preserved, right fills with None for missing.
#[must_use]
pub fn align_left(left: &Index, right: &Index) -> AlignmentPlan {
    let left_positions = (0..left.len()).map(Some).collect();
    let right_positions = left.labels.iter().map(|label| right.position(label)).collect();

    AlignmentPlan {
        union_index: left.clone(),
        left_positions,
        right_positions,
        expanded_labels: Vec::new(),
    }
}

/// Outer alignment on the sorted union of labels.
///
/// - equal indexes pair positionally and keep their order
/// - otherwise labels are emitted in sorted order
/// - a label held by both sides emits every (left, right) occurrence pair,
///   left-major; a one-sided label keeps its multiplicity
pub fn align_sorted_union(left: &Index, right: &Index) -> Result<AlignmentPlan, IndexError> {
    if !left.is_empty() && !right.is_empty() && left.nlevels() != right.nlevels() {
        return Err(IndexError::LevelCountMismatch {
            expected: left.nlevels(),
            found: right.nlevels(),
        });
    }

    if left == right {
        let positions = (0..left.len()).map(Some).collect::<Vec<_>>();
        return Ok(AlignmentPlan {
            union_index: Index::from_parts(Arc::clone(&left.labels), left.names.clone(), false),
            left_positions: positions.clone(),
            right_positions: positions,
            expanded_labels: Vec::new(),
        });
    }

    let distinct = left.union_sorted(right);

    let mut out_labels = Vec::with_capacity(left.len().max(right.len()));
    let mut left_positions = Vec::with_capacity(out_labels.capacity());
    let mut right_positions = Vec::with_capacity(out_labels.capacity());
    let mut expanded_labels = Vec::new();

    for label in distinct.labels() {
        let left_hits = left.positions_of(label);
        let right_hits = right.positions_of(label);

        match (left_hits, right_hits) {
            ([], hits) => {
                for &rp in hits {
                    out_labels.push(label.clone());
                    left_positions.push(None);
                    right_positions.push(Some(rp));
                }
            }
            (hits, []) => {
                for &lp in hits {
                    out_labels.push(label.clone());
                    left_positions.push(Some(lp));
                    right_positions.push(None);
                }
            }
            (lhs, rhs) => {
                if lhs.len() > 1 || rhs.len() > 1 {
                    expanded_labels.push(label.clone());
                }
                for &lp in lhs {
                    for &rp in rhs {
                        out_labels.push(label.clone());
                        left_positions.push(Some(lp));
                        right_positions.push(Some(rp));
                    }
                }
            }
        }
    }

    let union_index = Index::from_parts(out_labels.into(), distinct.names.clone(), false);
    Ok(AlignmentPlan {
        union_index,
        left_positions,
        right_positions,
        expanded_labels,
    })
}

pub fn validate_alignment_plan(plan: &AlignmentPlan) -> Result<(), IndexError> {
    if plan.left_positions.len() != plan.right_positions.len()
        || plan.left_positions.len() != plan.union_index.len()
    {
        return Err(IndexError::InvalidAlignmentVectors);
    }

    Ok(())
}
