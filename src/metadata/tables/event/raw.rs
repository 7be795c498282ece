use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `Event` table
#[derive(Clone, Debug)]
pub struct EventRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// `EventAttributes`
    pub flags: u32,
    /// `#Strings` index of the event name
    pub name: u32,
    /// Delegate type of the event
    pub event_type: CodedIndex,
}

impl RowReadable for EventRaw {
    const TABLE: TableId = TableId::Event;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(EventRaw {
            rid,
            token: Token::from_parts(TableId::Event, rid),
            offset: *offset,
            flags: u32::from(read_le_at::<u16>(data, offset)?),
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            event_type: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}
