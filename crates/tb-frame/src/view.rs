use tb_columnar::Column;
use tb_index::{Index, IndexLabel};
use tb_types::{DType, Scalar};

use crate::{FrameError, Series};

/// Read-only view of one table column. Borrows the table, so the table
/// cannot be modified while the view is alive.
#[derive(Debug, Clone, Copy)]
pub struct ColumnView<'a> {
    label: &'a IndexLabel,
    index: &'a Index,
    column: &'a Column,
}

impl<'a> ColumnView<'a> {
    pub(crate) fn new(label: &'a IndexLabel, index: &'a Index, column: &'a Column) -> Self {
        Self {
            label,
            index,
            column,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'a IndexLabel {
        self.label
    }

    #[must_use]
    pub fn index(&self) -> &'a Index {
        self.index
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.column.dtype()
    }

    #[must_use]
    pub fn values(&self) -> &'a [Scalar] {
        self.column.values()
    }

    /// First value under `label`.
    #[must_use]
    pub fn get(&self, label: &IndexLabel) -> Option<&'a Scalar> {
        self.index
            .position(label)
            .and_then(|position| self.column.value(position))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.column.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    /// Detach into an owned series.
    pub fn to_series(&self) -> Result<Series, FrameError> {
        Series::new(self.label.to_string(), self.index.clone(), self.column.clone())
    }
}
