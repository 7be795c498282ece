use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `Property` table
#[derive(Clone, Debug)]
pub struct PropertyRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// `PropertyAttributes`
    pub flags: u32,
    /// `#Strings` index of the property name
    pub name: u32,
    /// `#Blob` index of the property signature
    pub signature: u32,
}

impl RowReadable for PropertyRaw {
    const TABLE: TableId = TableId::Property;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(PropertyRaw {
            rid,
            token: Token::from_parts(TableId::Property, rid),
            offset: *offset,
            flags: u32::from(read_le_at::<u16>(data, offset)?),
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}
