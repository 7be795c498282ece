use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `MethodSemantics` table
#[derive(Clone, Debug)]
pub struct MethodSemanticsRaw {
    /// Row id
    pub rid: u32,
    /// Token of the row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// `MethodSemanticsAttributes`
    pub semantics: u32,
    /// The accessor's `MethodDef` row
    pub method: u32,
    /// The `Event` or `Property` the accessor belongs to
    pub association: CodedIndex,
}

impl RowReadable for MethodSemanticsRaw {
    const TABLE: TableId = TableId::MethodSemantics;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodSemanticsRaw {
            rid,
            token: Token::from_parts(TableId::MethodSemantics, rid),
            offset: *offset,
            semantics: u32::from(read_le_at::<u16>(data, offset)?),
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
            association: CodedIndex::read(data, offset, sizes, CodedIndexType::HasSemantics)?,
        })
    }
}
