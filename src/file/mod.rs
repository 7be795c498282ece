//! PE container access for .NET assemblies.
//!
//! [`File`] owns the raw bytes of an image together with the `goblin` view of its PE headers.
//! The bytes are always loaded into memory: the shredder rewrites images in place, so no
//! mapping of the input may outlive the load.
//!
//! Besides header access the type provides address translation between relative virtual
//! addresses (RVAs, used throughout the CLI header, metadata and the `MethodDef` table) and file
//! offsets, which is what every later parsing stage needs to locate method bodies and streams.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilshred::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Library.dll"))?;
//! let (clr_rva, clr_size) = file.clr()?;
//! let clr_offset = file.rva_to_offset(clr_rva)?;
//! println!("CLI header: {clr_size} bytes at file offset 0x{clr_offset:X}");
//! # Ok::<(), cilshred::Error>(())
//! ```

pub mod io;
pub mod parser;

use std::path::Path;

use goblin::pe::{section_table::SectionTable, PE};
use ouroboros::self_referencing;

use crate::{
    Error::{Empty, GoblinErr, NotSupported},
    Result,
};

/// An in-memory PE image carrying a CLR runtime header.
#[self_referencing]
pub struct File {
    data: Vec<u8>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Read the image at `file` into memory and parse its PE headers
    ///
    /// # Arguments
    /// * `file` - Path to the assembly on disk
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if reading fails, otherwise the errors of
    /// [`File::from_mem`].
    pub fn from_file(file: &Path) -> Result<File> {
        let data = std::fs::read(file)?;
        Self::from_mem(data)
    }

    /// Parse an image that is already in memory
    ///
    /// # Errors
    /// - [`crate::Error::Empty`] for empty input
    /// - [`crate::Error::GoblinErr`] if the PE headers cannot be parsed
    /// - [`crate::Error::NotSupported`] if the image has no CLR runtime header
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        if data.is_empty() {
            return Err(Empty);
        }

        File::try_new(data, |data| match PE::parse(data) {
            Ok(pe) => {
                if clr_directory(&pe).is_some() {
                    Ok(pe)
                } else {
                    Err(NotSupported)
                }
            }
            Err(error) => Err(GoblinErr(error)),
        })
    }

    /// The size of the image in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns true if the image holds no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw image bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.borrow_data()
    }

    /// Give up the parsed headers and return the image bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.into_heads().data
    }

    /// A bounds-checked view into the image
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range leaves the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| out_of_bounds_error!())?;
        self.data()
            .get(offset..end)
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// RVA and size of the CLI header
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the CLR runtime header directory is missing.
    pub fn clr(&self) -> Result<(usize, usize)> {
        self.with_pe(|pe| {
            let (rva, size) = clr_directory(pe).ok_or(NotSupported)?;
            Ok((rva as usize, size as usize))
        })
    }

    /// The section table of the image
    #[must_use]
    pub fn sections(&self) -> Vec<SectionTable> {
        self.with_pe(|pe| pe.sections.clone())
    }

    /// Translate a relative virtual address into a file offset
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains the address.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 =
            u32::try_from(rva).map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let mapped_size = section.virtual_size.max(section.size_of_raw_data);
                let Some(section_max) = section.virtual_address.checked_add(mapped_size) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        mapped_size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }

    /// Translate a file offset into a relative virtual address
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the offset lies outside every section's raw data.
    pub fn offset_to_rva(&self, offset: usize) -> Result<usize> {
        let offset_u32 = u32::try_from(offset)
            .map_err(|_| malformed_error!("Offset too large to fit in u32: {}", offset))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let Some(section_max) = section
                    .pointer_to_raw_data
                    .checked_add(section.size_of_raw_data)
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.pointer_to_raw_data,
                        section.size_of_raw_data
                    ));
                };

                if section.pointer_to_raw_data <= offset_u32 && section_max > offset_u32 {
                    return Ok((offset - section.pointer_to_raw_data as usize)
                        + section.virtual_address as usize);
                }
            }

            Err(malformed_error!(
                "Offset could not be converted to RVA - {}",
                offset
            ))
        })
    }

    /// The section holding the CLI header, with the header locations needed to grow it
    ///
    /// # Errors
    /// - [`crate::Error::NotSupported`] if the CLR runtime header directory is missing
    /// - [`crate::Error::Malformed`] if no section contains the CLI header
    pub(crate) fn code_section(&self) -> Result<CodeSection> {
        let (clr_rva, _) = self.clr()?;
        let sections = self.sections();

        let Some(index) = sections.iter().position(|section| {
            let start = section.virtual_address as usize;
            let size = section.virtual_size.max(section.size_of_raw_data) as usize;
            start <= clr_rva && clr_rva < start + size
        }) else {
            return Err(malformed_error!("No section contains the CLI header - 0x{:X}", clr_rva));
        };
        let section = &sections[index];

        let next_rva = sections
            .iter()
            .map(|other| other.virtual_address as usize)
            .filter(|&rva| rva > section.virtual_address as usize)
            .min();
        let raw_end = section.pointer_to_raw_data as usize + section.size_of_raw_data as usize;
        let ends_file = raw_end >= self.len()
            && sections.iter().all(|other| {
                other.pointer_to_raw_data as usize + other.size_of_raw_data as usize <= raw_end
            });

        self.with_pe(|pe| {
            let Some(optional) = pe.header.optional_header.as_ref() else {
                return Err(malformed_error!("PE image without optional header"));
            };
            let windows = &optional.windows_fields;

            // PE signature and COFF file header precede the optional header
            let optional_offset = pe.header.dos_header.pe_pointer as usize + 24;
            let table_offset =
                optional_offset + usize::from(pe.header.coff_header.size_of_optional_header);

            Ok(CodeSection {
                header_offset: table_offset + index * SECTION_HEADER_SIZE,
                size_of_image_offset: optional_offset + SIZE_OF_IMAGE_FIELD,
                virtual_address: section.virtual_address as usize,
                virtual_size: section.virtual_size as usize,
                raw_offset: section.pointer_to_raw_data as usize,
                raw_size: section.size_of_raw_data as usize,
                next_rva,
                ends_file,
                file_alignment: windows.file_alignment as usize,
                section_alignment: windows.section_alignment as usize,
                size_of_image: windows.size_of_image as usize,
            })
        })
    }
}

/// Size of one entry of the section table
const SECTION_HEADER_SIZE: usize = 40;
/// Offset of `SizeOfImage` inside the optional header, equal for PE32 and PE32+
const SIZE_OF_IMAGE_FIELD: usize = 56;

/// Location and extent of the section carrying the CLI header and the method bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CodeSection {
    /// File offset of the section header
    pub header_offset: usize,
    /// File offset of the `SizeOfImage` field
    pub size_of_image_offset: usize,
    pub virtual_address: usize,
    pub virtual_size: usize,
    pub raw_offset: usize,
    pub raw_size: usize,
    /// RVA of the section mapped after this one
    pub next_rva: Option<usize>,
    /// The raw data is the last thing in the file and can be extended
    pub ends_file: bool,
    pub file_alignment: usize,
    pub section_alignment: usize,
    pub size_of_image: usize,
}

/// RVA and size of the CLR runtime header directory, if present and non-empty
fn clr_directory(pe: &PE) -> Option<(u32, u32)> {
    let optional = pe.header.optional_header.as_ref()?;
    if let Some(directory) = optional.data_directories.get_clr_runtime_header() {
        if directory.virtual_address != 0 && directory.size != 0 {
            return Some((directory.virtual_address, directory.size));
        }
    }

    None
}
