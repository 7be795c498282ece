use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `PropertyPtr` table
#[derive(Clone, Debug)]
pub struct PropertyPtrRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// The referenced `Property` row
    pub property: u32,
}

impl RowReadable for PropertyPtrRaw {
    const TABLE: TableId = TableId::PropertyPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(PropertyPtrRaw {
            rid,
            token: Token::from_parts(TableId::PropertyPtr, rid),
            offset: *offset,
            property: read_le_at_dyn(data, offset, sizes.is_large(TableId::Property))?,
        })
    }
}
