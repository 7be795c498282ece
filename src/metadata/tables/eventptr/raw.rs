use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `EventPtr` table
#[derive(Clone, Debug)]
pub struct EventPtrRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// The referenced `Event` row
    pub event: u32,
}

impl RowReadable for EventPtrRaw {
    const TABLE: TableId = TableId::EventPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(EventPtrRaw {
            rid,
            token: Token::from_parts(TableId::EventPtr, rid),
            offset: *offset,
            event: read_le_at_dyn(data, offset, sizes.is_large(TableId::Event))?,
        })
    }
}
