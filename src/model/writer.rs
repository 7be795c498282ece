//! Writing a module with re-encoded method bodies.
//!
//! Only bodies marked as modified are touched; every other byte of the image is copied
//! verbatim. Placement runs in two passes over the modified bodies:
//!
//! 1. A body whose new encoding fits into the span it was read from is written in place. Fat
//!    encodings additionally need a 4-byte aligned start. The rest of the span is zeroed and
//!    becomes free space. Bodies that do not fit are zeroed completely and freed.
//! 2. Bodies left over are pointed at an identical encoding placed earlier, or allocated
//!    first-fit from the freed space, with touching free regions joined. Failing that, they go
//!    behind the end of the section holding the CLI header: first into the file alignment
//!    padding after its `VirtualSize`, then, if the section ends the file, into raw data
//!    appended to it. The section header and `SizeOfImage` are updated accordingly. The
//!    `MethodDef.RVA` column is patched for every body that moves.
//!
//! Spans shared with a method whose body stays untouched are never freed.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use log::{debug, info};

use crate::{
    file::{CodeSection, File},
    metadata::{method::align4, token::Token},
    model::{MethodDef, Module},
    Error, Result,
};

/// Sink for modified modules
pub trait Persister {
    /// Write `module` to `path`
    ///
    /// # Errors
    /// Returns an error if the module cannot be encoded or the file cannot be written.
    fn write(&self, module: &Module, path: &Path) -> Result<()>;
}

/// [`Persister`] producing PE images
#[derive(Debug, Default, Clone, Copy)]
pub struct CilWriter;

/// A modified body waiting for placement
struct Pending<'a> {
    method: &'a MethodDef,
    offset: usize,
    span: usize,
    encoded: Vec<u8>,
    fat: bool,
}

/// Unused bytes inside the image
struct FreeRegion {
    offset: usize,
    len: usize,
}

/// Growth of the code section behind its current virtual end
struct SectionTail {
    section: CodeSection,
    virtual_size: usize,
    raw_size: usize,
}

impl SectionTail {
    fn new(section: CodeSection) -> Self {
        // a zero VirtualSize means the raw size applies
        let virtual_size = if section.virtual_size == 0 {
            section.raw_size
        } else {
            section.virtual_size
        };

        SectionTail {
            section,
            virtual_size,
            raw_size: section.raw_size,
        }
    }

    /// Claim `len` bytes at the virtual end of the section, returning the file offset
    fn allocate(&mut self, len: usize, aligned: bool) -> Option<usize> {
        let section = &self.section;
        let rva = section.virtual_address + self.virtual_size;
        let padding = if aligned { align4(rva) - rva } else { 0 };
        let end = self.virtual_size + padding + len;

        if section
            .next_rva
            .is_some_and(|next| section.virtual_address + end > next)
        {
            return None;
        }

        if end > self.raw_size {
            if !section.ends_file {
                return None;
            }
            self.raw_size = align_to(end, section.file_alignment);
        }

        let offset = section.raw_offset + self.virtual_size + padding;
        self.virtual_size = end;
        Some(offset)
    }

    fn grown(&self) -> bool {
        self.virtual_size > self.section.virtual_size || self.raw_size > self.section.raw_size
    }

    /// Header patches describing the grown section
    fn header_patches(&self) -> Result<Vec<(usize, Vec<u8>)>> {
        let section = &self.section;
        let mut patches = vec![
            (section.header_offset + 8, field(self.virtual_size)?),
            (section.header_offset + 16, field(self.raw_size)?),
        ];

        let image_end = align_to(
            section.virtual_address + self.virtual_size,
            section.section_alignment,
        );
        if image_end > section.size_of_image {
            patches.push((section.size_of_image_offset, field(image_end)?));
        }

        Ok(patches)
    }
}

fn field(value: usize) -> Result<Vec<u8>> {
    let Ok(value) = u32::try_from(value) else {
        return Err(malformed_error!("Section grew too large - {}", value));
    };
    Ok(value.to_le_bytes().to_vec())
}

fn align_to(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

#[derive(Default)]
struct Layout {
    patches: Vec<(usize, Vec<u8>)>,
    free: Vec<FreeRegion>,
    tail: Option<SectionTail>,
    placed: HashMap<Vec<u8>, u32>,
    in_place: usize,
    shared: usize,
    relocated: usize,
    appended: usize,
}

impl Layout {
    fn zero(&mut self, offset: usize, len: usize) {
        if len > 0 {
            self.patches.push((offset, vec![0; len]));
            self.free.push(FreeRegion { offset, len });
        }
    }

    /// Join free regions that touch each other
    fn coalesce(&mut self) {
        self.free.sort_by_key(|region| region.offset);

        let mut joined: Vec<FreeRegion> = Vec::with_capacity(self.free.len());
        for region in self.free.drain(..) {
            match joined.last_mut() {
                Some(last) if last.offset + last.len == region.offset => last.len += region.len,
                _ => joined.push(region),
            }
        }
        self.free = joined;
    }

    /// Space behind the code section, set up on first use
    fn allocate_tail(&mut self, file: &File, len: usize, aligned: bool) -> Result<Option<usize>> {
        if self.tail.is_none() {
            self.tail = Some(SectionTail::new(file.code_section()?));
        }
        Ok(self.tail.as_mut().and_then(|tail| tail.allocate(len, aligned)))
    }

    /// First free region that holds `len` bytes, returning the file offset
    fn allocate(&mut self, file: &File, len: usize, aligned: bool) -> Result<Option<usize>> {
        for region in &mut self.free {
            let padding = if aligned {
                let rva = file.offset_to_rva(region.offset)?;
                align4(rva) - rva
            } else {
                0
            };

            if padding + len <= region.len {
                let offset = region.offset + padding;
                region.offset += padding + len;
                region.len -= padding + len;
                return Ok(Some(offset));
            }
        }

        Ok(None)
    }
}

impl CilWriter {
    /// Create a new writer
    #[must_use]
    pub fn new() -> Self {
        CilWriter
    }

    /// Produce the image of `module` with all modified bodies re-encoded
    ///
    /// # Errors
    /// - [`crate::Error::NoSpace`] if a body fits neither in place, nor into freed space, nor
    ///   behind the code section
    /// - [`crate::Error::Malformed`] if a body cannot be encoded or the image is invalid
    pub fn render(&self, module: &Module) -> Result<Vec<u8>> {
        let file = File::from_mem(module.image.clone())?;

        let pinned: HashSet<u32> = module
            .methods()
            .filter(|method| method.rva != 0)
            .filter(|method| method.body.as_ref().map_or(true, |body| !body.is_modified()))
            .map(|method| method.rva)
            .collect();

        let mut pending = Vec::new();
        for method in module.methods() {
            let Some(body) = method.body.as_ref().filter(|body| body.is_modified()) else {
                continue;
            };

            pending.push(Pending {
                method,
                offset: file.rva_to_offset(body.rva as usize)?,
                span: body.span(),
                encoded: body.encode()?,
                fat: body.needs_fat_header(),
            });
        }

        let mut layout = Layout::default();
        let mut claimed = HashSet::new();
        let mut deferred = Vec::new();

        for body in pending {
            let rva = body.method.rva;
            let fits = body.encoded.len() <= body.span && (!body.fat || rva % 4 == 0);

            if pinned.contains(&rva) || !claimed.insert(rva) {
                deferred.push(body);
                continue;
            }

            if fits {
                debug!(
                    "Method {} - {} bytes in place at 0x{:08X}",
                    body.method.token,
                    body.encoded.len(),
                    rva
                );
                layout.zero(body.offset + body.encoded.len(), body.span - body.encoded.len());
                layout.patches.push((body.offset, body.encoded.clone()));
                layout.placed.entry(body.encoded).or_insert(rva);
                layout.in_place += 1;
            } else {
                layout.zero(body.offset, body.span);
                deferred.push(body);
            }
        }

        layout.coalesce();

        let mut rva_patches = Vec::new();
        for body in deferred {
            let token = body.method.token;

            let new_rva = if let Some(&rva) = layout.placed.get(&body.encoded) {
                debug!("Method {} - sharing body at 0x{:08X}", token, rva);
                layout.shared += 1;
                rva
            } else {
                let len = body.encoded.len();
                let offset = match layout.allocate(&file, len, body.fat)? {
                    Some(offset) => {
                        layout.relocated += 1;
                        offset
                    }
                    None => match layout.allocate_tail(&file, len, body.fat)? {
                        Some(offset) => {
                            layout.appended += 1;
                            offset
                        }
                        None => return Err(Error::NoSpace(token)),
                    },
                };
                let rva = rva_u32(section_rva(&file, layout.tail.as_ref(), offset)?, token)?;

                debug!(
                    "Method {} - {} bytes relocated to 0x{:08X}",
                    token,
                    body.encoded.len(),
                    rva
                );
                layout.patches.push((offset, body.encoded.clone()));
                layout.placed.insert(body.encoded, rva);
                rva
            };

            if new_rva != body.method.rva {
                let Some(row_offset) = module.method_rva_offset(token.row()) else {
                    return Err(malformed_error!("No MethodDef row for {}", token));
                };
                rva_patches.push((row_offset, new_rva.to_le_bytes().to_vec()));
            }
        }

        if let Some(tail) = layout.tail.as_ref().filter(|tail| tail.grown()) {
            debug!(
                "Section at 0x{:08X} grown to 0x{:X} bytes, 0x{:X} raw",
                tail.section.virtual_address, tail.virtual_size, tail.raw_size
            );
            rva_patches.extend(tail.header_patches()?);
        }

        info!(
            "Rendered module '{}' - {} bodies in place, {} shared, {} relocated, {} behind the section end",
            module.name, layout.in_place, layout.shared, layout.relocated, layout.appended
        );

        let image_len = layout
            .tail
            .as_ref()
            .map_or(0, |tail| tail.section.raw_offset + tail.raw_size);
        let mut image = file.into_data();
        if image_len > image.len() {
            image.resize(image_len, 0);
        }

        for (offset, bytes) in layout.patches.iter().chain(&rva_patches) {
            let Some(target) = image.get_mut(*offset..*offset + bytes.len()) else {
                return Err(out_of_bounds_error!());
            };
            target.copy_from_slice(bytes);
        }

        Ok(image)
    }
}

/// RVA of `offset`, which may lie in raw data appended behind the code section
fn section_rva(file: &File, tail: Option<&SectionTail>, offset: usize) -> Result<usize> {
    if let Some(tail) = tail {
        let section = &tail.section;
        if offset >= section.raw_offset && offset < section.raw_offset + tail.raw_size {
            return Ok(offset - section.raw_offset + section.virtual_address);
        }
    }
    file.offset_to_rva(offset)
}

fn rva_u32(rva: usize, token: Token) -> Result<u32> {
    u32::try_from(rva).map_err(|_| malformed_error!("RVA of method {} too large - {}", token, rva))
}

impl Persister for CilWriter {
    fn write(&self, module: &Module, path: &Path) -> Result<()> {
        let image = self.render(module)?;
        std::fs::write(path, &image)?;

        info!("Wrote {} bytes to {}", image.len(), path.display());
        Ok(())
    }
}
