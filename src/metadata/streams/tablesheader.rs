use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo},
    Result,
};

/// `HeapSizes` bit announcing 4 extra bytes after the row counts
const EXTRA_DATA: u8 = 0x40;

/// The header of the `#~` (or `#-`) stream, with the location of every present table.
///
/// Tables are stored back to back in [`TableId`] order directly after the row counts; the
/// offset of each table therefore depends on the row sizes of all tables in front of it.
///
/// # Examples
///
/// ```rust,ignore
/// let header = TablesHeader::from(tables_stream)?;
/// if let Some(methods) = header.table::<MethodDefRaw>() {
///     for method in methods.iter() {
///         println!("{:?}", method?.token);
///     }
/// }
/// ```
pub struct TablesHeader<'a> {
    /// Major version of the table schema, 2 for all current runtimes
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// The `HeapSizes` flags
    pub heap_sizes: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths
    pub info: TableInfo,
    data: &'a [u8],
    table_offsets: [Option<usize>; TableId::COUNT],
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables stream header and locate every table
    ///
    /// # Errors
    /// - [`crate::Error::OutOfBounds`] if the stream is shorter than its declared tables
    /// - [`crate::Error::Malformed`] if no table is present or unknown tables are flagged
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let mut offset = 4;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = read_le_at::<u8>(data, &mut offset)?;
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        if valid >> (TableId::MAX + 1) != 0 {
            return Err(malformed_error!(
                "Unsupported tables present - valid: 0x{:016X}",
                valid
            ));
        }

        let info = TableInfo::new(data, valid, heap_sizes)?;

        let mut current_offset = 24 + valid.count_ones() as usize * 4;
        if heap_sizes & EXTRA_DATA != 0 {
            current_offset += 4;
        }

        let mut table_offsets = [None; TableId::COUNT];
        for table_id in TableId::iter() {
            if valid & table_id.mask() == 0 {
                continue;
            }

            table_offsets[table_id as usize] = Some(current_offset);

            let size = u64::from(info.rows(table_id)) * u64::from(info.row_size(table_id));
            current_offset = usize::try_from(size)
                .ok()
                .and_then(|size| current_offset.checked_add(size))
                .filter(|end| *end <= data.len())
                .ok_or_else(|| out_of_bounds_error!())?;
        }

        Ok(TablesHeader {
            major_version,
            minor_version,
            heap_sizes,
            valid,
            sorted,
            info,
            data,
            table_offsets,
        })
    }

    /// Number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// True if `id` is present in the stream
    #[must_use]
    pub fn has_table(&self, id: TableId) -> bool {
        self.valid & id.mask() != 0
    }

    /// Number of rows of `id`, 0 if absent
    #[must_use]
    pub fn rows(&self, id: TableId) -> u32 {
        self.info.rows(id)
    }

    /// Offset of the first row of `id`, relative to the start of the stream
    #[must_use]
    pub fn table_offset(&self, id: TableId) -> Option<usize> {
        self.table_offsets[id as usize]
    }

    /// Typed access to the table of row type `T`, `None` if the table is absent
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'_, T>> {
        let offset = self.table_offset(T::TABLE)?;
        MetadataTable::new(&self.data[offset..], self.rows(T::TABLE), &self.info).ok()
    }
}
