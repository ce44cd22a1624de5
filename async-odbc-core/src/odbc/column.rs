//! Result set column description.

use crate::odbc::{DataType, Error, Row, TypeInfo};

/// A column from a result set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Column {
    pub(crate) ordinal: usize,
    pub(crate) name: String,
    pub(crate) type_info: TypeInfo,
}

impl Column {
    /// Create a new column
    pub fn new(ordinal: usize, name: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            ordinal,
            name: name.into(),
            type_info,
        }
    }

    /// Zero-based position in the result set.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn data_type(&self) -> DataType {
        self.type_info.data_type
    }
}

/// A way of addressing a value in a [`Row`].
pub trait ColumnIndex: std::fmt::Debug {
    /// Resolve to a zero-based position, or fail if the row has no such column.
    fn index(&self, row: &Row) -> Result<usize, Error>;
}

impl ColumnIndex for usize {
    fn index(&self, row: &Row) -> Result<usize, Error> {
        if *self < row.len() {
            Ok(*self)
        } else {
            Err(Error::ColumnIndexOutOfBounds {
                index: *self,
                len: row.len(),
            })
        }
    }
}

// Exact match first, then ASCII case-insensitive.
impl ColumnIndex for &str {
    fn index(&self, row: &Row) -> Result<usize, Error> {
        let columns = row.columns();
        columns
            .iter()
            .position(|col| col.name == *self)
            .or_else(|| {
                columns
                    .iter()
                    .position(|col| col.name.eq_ignore_ascii_case(self))
            })
            .ok_or_else(|| Error::ColumnNotFound((*self).to_string()))
    }
}

impl ColumnIndex for String {
    fn index(&self, row: &Row) -> Result<usize, Error> {
        self.as_str().index(row)
    }
}
