use crate::{file::parser::Parser, Result};

/// The `#Blob` heap: length-prefixed byte sequences (signatures, constants, ...)
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Wrap the raw bytes of a `#Blob` heap
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap does not start with the empty blob.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Provided #Blob heap is empty"));
        }

        Ok(Blob { data })
    }

    /// Read the blob starting at `index`, without its compressed length prefix
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index or the encoded length lies outside the
    /// heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        let mut parser = Parser::new(self.data);
        parser.seek(index)?;

        let len = parser.read_compressed_uint()? as usize;
        parser.read_bytes(len)
    }
}
