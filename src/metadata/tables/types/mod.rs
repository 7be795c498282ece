//! Generic infrastructure shared by all metadata tables.
//!
//! - [`TableId`] names the tables and carries their column layout
//! - [`TableInfo`] holds row counts and computes index widths and row sizes
//! - [`CodedIndex`] decodes the tagged references between tables
//! - [`MetadataTable`] gives typed, 1-based row access to a table's bytes through
//!   [`RowReadable`]

mod codedindex;
mod tableid;
mod tableinfo;

use std::marker::PhantomData;

use crate::Result;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use tableid::TableId;
pub use tableinfo::{Column, TableInfo, TableRowInfo};

/// A table row type that can be decoded from the tables stream
pub trait RowReadable: Sized {
    /// The table this row type belongs to
    const TABLE: TableId;

    /// Size of one row, given the index widths in `sizes`
    fn row_size(sizes: &TableInfo) -> u32 {
        sizes.row_size(Self::TABLE)
    }

    /// Decode the row `rid` starting at `offset`, advancing `offset` past it
    ///
    /// # Errors
    /// Returns an error if the row data is truncated or contains invalid coded indexes.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;
}

/// Typed view over the rows of one metadata table
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: &'a TableInfo,
    _phantom: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a view over `row_count` rows at the start of `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the table.
    pub fn new(data: &'a [u8], row_count: u32, sizes: &'a TableInfo) -> Result<Self> {
        let row_size = T::row_size(sizes);
        let size = row_count as usize * row_size as usize;
        let Some(data) = data.get(..size) else {
            return Err(out_of_bounds_error!());
        };

        Ok(MetadataTable {
            data,
            row_count,
            row_size,
            sizes,
            _phantom: PhantomData,
        })
    }

    /// Size of the table in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.row_size)
    }

    /// Size of one row in bytes
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Decode the row with the 1-based index `rid`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for `rid` 0 or past the last row, or the decode
    /// error of the row.
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(out_of_bounds_error!());
        }

        let mut offset = (rid as usize - 1) * self.row_size as usize;
        T::row_read(self.data, &mut offset, rid, self.sizes)
    }

    /// Iterate over all rows in order, yielding decode results
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count).map(move |rid| self.get(rid))
    }
}
