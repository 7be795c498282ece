use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `PropertyMap` table
#[derive(Clone, Debug)]
pub struct PropertyMapRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// The owning `TypeDef` row
    pub parent: u32,
    /// First property owned by `parent`
    pub property_list: u32,
}

impl RowReadable for PropertyMapRaw {
    const TABLE: TableId = TableId::PropertyMap;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(PropertyMapRaw {
            rid,
            token: Token::from_parts(TableId::PropertyMap, rid),
            offset: *offset,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            property_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Property))?,
        })
    }
}
