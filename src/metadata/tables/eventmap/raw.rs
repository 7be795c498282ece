use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `EventMap` table
#[derive(Clone, Debug)]
pub struct EventMapRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// The owning `TypeDef` row
    pub parent: u32,
    /// First event owned by `parent`
    pub event_list: u32,
}

impl RowReadable for EventMapRaw {
    const TABLE: TableId = TableId::EventMap;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(EventMapRaw {
            rid,
            token: Token::from_parts(TableId::EventMap, rid),
            offset: *offset,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            event_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Event))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::MetadataTable;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = vec![
            0x02, 0x00, 0x01, 0x00,
            0x05, 0x00, 0x03, 0x00,
        ];

        let sizes = TableInfo::new_test(&[(TableId::EventMap, 2), (TableId::Event, 4)], false, false, false);
        let table = MetadataTable::<EventMapRaw>::new(&data, 2, &sizes).unwrap();

        let second = table.get(2).unwrap();
        assert_eq!(second.token, Token(0x1200_0002));
        assert_eq!(second.parent, 5);
        assert_eq!(second.event_list, 3);
    }
}
