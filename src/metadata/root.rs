//! The metadata root (ECMA-335 II.24.2.1) and its stream directory.

use crate::{file::parser::Parser, metadata::streams::StreamHeader, Result};

/// Signature of the metadata root, `BSJB`
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root header
pub struct Root {
    /// Always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Length of the padded version string
    pub length: u32,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// Stream headers in file order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root at the start of `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong signature, no streams or streams that
    /// reach past the metadata, and [`crate::Error::OutOfBounds`] for truncated input.
    pub fn read(data: &[u8]) -> Result<Root> {
        let mut parser = Parser::new(data);

        let signature = parser.read_le::<u32>()?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08X}",
                signature
            ));
        }

        let major_version = parser.read_le::<u16>()?;
        let minor_version = parser.read_le::<u16>()?;
        let _reserved = parser.read_le::<u32>()?;
        let length = parser.read_le::<u32>()?;
        if length > 255 {
            return Err(malformed_error!("Version string too long - {}", length));
        }

        let raw_version = parser.read_bytes(length as usize)?;
        let version_len = raw_version
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(raw_version.len());
        let version = String::from_utf8_lossy(&raw_version[..version_len]).into_owned();

        let flags = parser.read_le::<u16>()?;
        let stream_count = parser.read_le::<u16>()?;
        if stream_count == 0 {
            return Err(malformed_error!("No valid streams have been found"));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            let header = StreamHeader::from(&data[parser.pos()..])?;

            let end = u64::from(header.offset) + u64::from(header.size);
            if end > data.len() as u64 {
                return Err(malformed_error!(
                    "Stream {} exceeds the metadata - {} + {}",
                    header.name,
                    header.offset,
                    header.size
                ));
            }

            parser.advance_by(header.header_size())?;
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            length,
            version,
            flags,
            stream_headers,
        })
    }

    /// The header of the stream named `name`
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const ROOT: [u8; 48] = [
        0x42, 0x53, 0x4A, 0x42,
        0x01, 0x00,
        0x01, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x0C, 0x00, 0x00, 0x00,
        b'v', b'4', b'.', b'0', b'.', b'3', b'0', b'3', b'1', b'9', 0x00, 0x00,
        0x00, 0x00,
        0x02, 0x00,

        0x2C, 0x00, 0x00, 0x00, // #~
        0x04, 0x00, 0x00, 0x00,
        0x23, 0x7E, 0x00, 0x00,

        0x30, 0x00, 0x00, 0x00, // #Blob, truncated name area
    ];

    #[test]
    fn crafted() {
        let mut data = ROOT[..44].to_vec();
        data.extend_from_slice(&[0x00; 4]);
        // only one stream
        data[30] = 0x01;

        let root = Root::read(&data).unwrap();

        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.length, 12);
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.stream_headers.len(), 1);
        assert_eq!(root.stream("#~").unwrap().offset, 0x2C);
        assert!(root.stream("#Strings").is_none());
    }

    #[test]
    fn invalid() {
        let mut bad_magic = ROOT;
        bad_magic[0] = 0x43;
        assert!(Root::read(&bad_magic).is_err());

        // second stream header is truncated
        assert!(Root::read(&ROOT).is_err());

        let mut no_streams = ROOT;
        no_streams[30] = 0x00;
        assert!(Root::read(&no_streams).is_err());

        let mut oversized = ROOT[..44].to_vec();
        oversized.extend_from_slice(&[0x00; 4]);
        oversized[30] = 0x01;
        oversized[36] = 0x40;
        assert!(Root::read(&oversized).is_err());
    }
}
