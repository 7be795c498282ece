use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `MethodPtr` table
#[derive(Clone, Debug)]
pub struct MethodPtrRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// The referenced `MethodDef` row
    pub method: u32,
}

impl RowReadable for MethodPtrRaw {
    const TABLE: TableId = TableId::MethodPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodPtrRaw {
            rid,
            token: Token::from_parts(TableId::MethodPtr, rid),
            offset: *offset,
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::MetadataTable;

    #[test]
    fn crafted() {
        let data = vec![0x03, 0x00, 0x01, 0x00];

        let sizes = TableInfo::new_test(&[(TableId::MethodPtr, 2), (TableId::MethodDef, 3)], false, false, false);
        let table = MetadataTable::<MethodPtrRaw>::new(&data, 2, &sizes).unwrap();

        assert_eq!(table.get(1).unwrap().method, 3);
        assert_eq!(table.get(2).unwrap().method, 1);
        assert_eq!(table.get(2).unwrap().token, Token(0x0500_0002));
    }
}
