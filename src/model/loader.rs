//! Building the object model from a PE image.
//!
//! Loading follows the layout of a .NET image from the outside in: PE headers, CLI header,
//! metadata root, streams, tables. The member tables are then folded into the owned
//! [`Assembly`] tree:
//!
//! - `TypeDef.MethodList`, `PropertyMap.PropertyList` and `EventMap.EventList` define
//!   contiguous member ranges that end where the next owner's range starts. Unoptimized
//!   metadata (`#-`) can route these ranges through the `MethodPtr`, `PropertyPtr` and
//!   `EventPtr` indirection tables.
//! - `MethodSemantics` attaches accessors to properties and events. Accessors are stored as
//!   indexes into the owning type's methods; an accessor that lives outside that range is
//!   logged and dropped.
//! - Bodies are decoded for every method that has an RVA and is implemented in CIL.

use std::{collections::HashMap, ops::Range, path::Path};

use log::{debug, info, warn};

use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        method::MethodBody,
        root::Root,
        streams::{Blob, StreamHeader, Strings, TablesHeader},
        tables::{
            AssemblyRaw, EventMapRaw, EventPtrRaw, EventRaw, MethodDefRaw, MethodPtrRaw,
            MethodSemanticsAttributes, MethodSemanticsRaw, ModuleRaw, PropertyMapRaw,
            PropertyPtrRaw, PropertyRaw, TableId, TypeDefRaw,
        },
        token::Token,
    },
    model::{Assembly, Event, MethodDef, Module, Property, TypeDef},
    Result,
};

/// Source of the object model
pub trait Loader {
    /// Load the assembly stored at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid .NET image.
    fn load(&self, path: &Path) -> Result<Assembly>;
}

/// [`Loader`] for ECMA-335 PE images
#[derive(Debug, Default, Clone, Copy)]
pub struct CilLoader;

impl CilLoader {
    /// Create a new loader
    #[must_use]
    pub fn new() -> Self {
        CilLoader
    }

    /// Load an assembly from an image that is already in memory
    ///
    /// # Errors
    /// - [`crate::Error::Empty`], [`crate::Error::GoblinErr`] or [`crate::Error::NotSupported`]
    ///   if the input is not a PE image with a CLR runtime header
    /// - [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] for broken metadata or
    ///   method bodies
    pub fn load_bytes(&self, data: Vec<u8>) -> Result<Assembly> {
        Self::load_file(File::from_mem(data)?)
    }

    fn load_file(file: File) -> Result<Assembly> {
        let parts = ModuleParts::read(&file)?;
        let image = file.into_data();

        let module = Module {
            name: parts.name,
            types: parts.types,
            image,
            method_table_offset: parts.method_table_offset,
            method_row_size: parts.method_row_size,
        };

        info!(
            "Loaded module '{}' - {} types, {} method bodies",
            module.name,
            module.types.as_ref().map_or(0, Vec::len),
            module.methods().filter(|method| method.body.is_some()).count()
        );

        Ok(Assembly {
            name: parts.assembly_name,
            modules: Some(vec![module]),
        })
    }
}

impl Loader for CilLoader {
    fn load(&self, path: &Path) -> Result<Assembly> {
        debug!("Loading {}", path.display());
        Self::load_file(File::from_file(path)?)
    }
}

/// Everything of a module except the image, which can only be taken once parsing is done
struct ModuleParts {
    assembly_name: Option<String>,
    name: String,
    types: Option<Vec<TypeDef>>,
    method_table_offset: usize,
    method_row_size: usize,
}

impl ModuleParts {
    fn read(file: &File) -> Result<ModuleParts> {
        let (clr_rva, clr_size) = file.clr()?;
        let header = Cor20Header::read(file.data_slice(file.rva_to_offset(clr_rva)?, clr_size)?)?;

        let metadata_offset = file.rva_to_offset(header.meta_data_rva as usize)?;
        let metadata = file.data_slice(metadata_offset, header.meta_data_size as usize)?;
        let root = Root::read(metadata)?;

        let Some(tables_header) = root.stream("#~").or_else(|| root.stream("#-")) else {
            return Err(malformed_error!("No tables stream present"));
        };
        let Some(strings_header) = root.stream("#Strings") else {
            return Err(malformed_error!("No #Strings stream present"));
        };

        let blob = match root.stream("#Blob") {
            Some(blob_header) => Some(Blob::from(stream_data(metadata, blob_header)?)?),
            None => None,
        };

        let context = LoadContext {
            file,
            tables: TablesHeader::from(stream_data(metadata, tables_header)?)?,
            strings: Strings::from(stream_data(metadata, strings_header)?)?,
            blob,
        };

        let Some(module) = context.tables.table::<ModuleRaw>() else {
            return Err(malformed_error!("No Module table present"));
        };
        let name = context.string(module.get(1)?.name)?;

        let assembly_name = match context.tables.table::<AssemblyRaw>() {
            Some(assembly) => Some(context.string(assembly.get(1)?.name)?),
            None => None,
        };

        let (method_table_offset, method_row_size) =
            match context.tables.table_offset(TableId::MethodDef) {
                Some(offset) => (
                    metadata_offset + tables_header.offset as usize + offset,
                    context.tables.info.row_size(TableId::MethodDef) as usize,
                ),
                None => (0, 0),
            };

        Ok(ModuleParts {
            assembly_name,
            name,
            types: context.types()?,
            method_table_offset,
            method_row_size,
        })
    }
}

fn stream_data<'a>(metadata: &'a [u8], header: &StreamHeader) -> Result<&'a [u8]> {
    let start = header.offset as usize;
    start
        .checked_add(header.size as usize)
        .and_then(|end| metadata.get(start..end))
        .ok_or_else(|| out_of_bounds_error!())
}

/// The range `list..next` of 1-based rows, clamped to the `count` rows of the target table.
///
/// `next` is the list column of the following owner, `None` for the last owner.
fn member_range(list: u32, next: Option<u32>, count: u32) -> Range<u32> {
    let end = next.unwrap_or(count + 1).min(count + 1);
    let start = list.max(1).min(end);
    start..end
}

/// Accessors per association, `(semantics, MethodDef rid)`
type SemanticsMap = HashMap<Token, Vec<(u32, u32)>>;

struct LoadContext<'a> {
    file: &'a File,
    tables: TablesHeader<'a>,
    strings: Strings<'a>,
    blob: Option<Blob<'a>>,
}

impl LoadContext<'_> {
    fn string(&self, index: u32) -> Result<String> {
        Ok(self.strings.get(index as usize)?.to_string())
    }

    fn blob(&self, index: u32) -> Result<Vec<u8>> {
        match &self.blob {
            Some(blob) => Ok(blob.get(index as usize)?.to_vec()),
            None if index == 0 => Ok(Vec::new()),
            None => Err(malformed_error!("Blob index {} without #Blob stream", index)),
        }
    }

    /// Row count of `table`, or of its pointer table if present
    fn list_count(&self, table: TableId, ptr: TableId) -> u32 {
        if self.tables.has_table(ptr) {
            self.tables.rows(ptr)
        } else {
            self.tables.rows(table)
        }
    }

    fn method_rid(&self, index: u32) -> Result<u32> {
        match self.tables.table::<MethodPtrRaw>() {
            Some(ptr) => Ok(ptr.get(index)?.method),
            None => Ok(index),
        }
    }

    fn property_rid(&self, index: u32) -> Result<u32> {
        match self.tables.table::<PropertyPtrRaw>() {
            Some(ptr) => Ok(ptr.get(index)?.property),
            None => Ok(index),
        }
    }

    fn event_rid(&self, index: u32) -> Result<u32> {
        match self.tables.table::<EventPtrRaw>() {
            Some(ptr) => Ok(ptr.get(index)?.event),
            None => Ok(index),
        }
    }

    fn types(&self) -> Result<Option<Vec<TypeDef>>> {
        let Some(typedefs) = self.tables.table::<TypeDefRaw>() else {
            return Ok(None);
        };

        let property_ranges = self.property_ranges()?;
        let event_ranges = self.event_ranges()?;
        let semantics = self.semantics()?;
        let method_count = self.list_count(TableId::MethodDef, TableId::MethodPtr);

        let mut types = Vec::with_capacity(typedefs.row_count() as usize);
        for rid in 1..=typedefs.row_count() {
            let row = typedefs.get(rid)?;
            let next = if rid < typedefs.row_count() {
                Some(typedefs.get(rid + 1)?.method_list)
            } else {
                None
            };

            let mut method_rids = Vec::new();
            for index in member_range(row.method_list, next, method_count) {
                method_rids.push(self.method_rid(index)?);
            }

            let mut ty = TypeDef {
                token: row.token,
                namespace: self.string(row.type_namespace)?,
                name: self.string(row.type_name)?,
                flags: row.flags,
                methods: None,
                properties: None,
                events: None,
            };

            if !method_rids.is_empty() {
                let mut methods = Vec::with_capacity(method_rids.len());
                for method_rid in &method_rids {
                    methods.push(self.method(*method_rid)?);
                }
                ty.methods = Some(methods);
            }

            if let Some(range) = property_ranges.get(&rid) {
                ty.properties = Some(self.properties(range.clone(), &method_rids, &semantics)?);
            }

            if let Some(range) = event_ranges.get(&rid) {
                ty.events = Some(self.events(range.clone(), &method_rids, &semantics)?);
            }

            debug!(
                "Type {} - {} methods, {} properties, {} events",
                ty.full_name(),
                method_rids.len(),
                ty.properties.as_ref().map_or(0, Vec::len),
                ty.events.as_ref().map_or(0, Vec::len)
            );

            types.push(ty);
        }

        Ok(Some(types))
    }

    fn method(&self, rid: u32) -> Result<MethodDef> {
        let Some(table) = self.tables.table::<MethodDefRaw>() else {
            return Err(malformed_error!("Method {} without MethodDef table", rid));
        };
        let row = table.get(rid)?;

        let mut method = MethodDef {
            token: row.token,
            name: self.string(row.name)?,
            flags: row.flags,
            impl_flags: row.impl_flags,
            signature: self.blob(row.signature)?,
            rva: row.rva,
            body: None,
        };

        if method.has_il_body() {
            method.body = Some(self.body(row.rva, row.token)?);
        }

        Ok(method)
    }

    fn body(&self, rva: u32, token: Token) -> Result<MethodBody> {
        let offset = self.file.rva_to_offset(rva as usize)?;
        let Some(data) = self.file.data().get(offset..) else {
            return Err(malformed_error!("Body of method {} is outside the image", token));
        };

        MethodBody::from(data, rva)
            .map_err(|error| malformed_error!("Invalid body of method {} - {}", token, error))
    }

    /// Map of `TypeDef` rid to its range in the property list
    fn property_ranges(&self) -> Result<HashMap<u32, Range<u32>>> {
        let mut ranges = HashMap::new();
        let Some(map) = self.tables.table::<PropertyMapRaw>() else {
            return Ok(ranges);
        };

        let count = self.list_count(TableId::Property, TableId::PropertyPtr);
        for rid in 1..=map.row_count() {
            let row = map.get(rid)?;
            let next = if rid < map.row_count() {
                Some(map.get(rid + 1)?.property_list)
            } else {
                None
            };
            ranges.insert(row.parent, member_range(row.property_list, next, count));
        }

        Ok(ranges)
    }

    /// Map of `TypeDef` rid to its range in the event list
    fn event_ranges(&self) -> Result<HashMap<u32, Range<u32>>> {
        let mut ranges = HashMap::new();
        let Some(map) = self.tables.table::<EventMapRaw>() else {
            return Ok(ranges);
        };

        let count = self.list_count(TableId::Event, TableId::EventPtr);
        for rid in 1..=map.row_count() {
            let row = map.get(rid)?;
            let next = if rid < map.row_count() {
                Some(map.get(rid + 1)?.event_list)
            } else {
                None
            };
            ranges.insert(row.parent, member_range(row.event_list, next, count));
        }

        Ok(ranges)
    }

    fn semantics(&self) -> Result<SemanticsMap> {
        let mut semantics = SemanticsMap::new();
        if let Some(table) = self.tables.table::<MethodSemanticsRaw>() {
            for row in table.iter() {
                let row = row?;
                semantics
                    .entry(row.association.token)
                    .or_default()
                    .push((row.semantics, row.method));
            }
        }

        Ok(semantics)
    }

    fn properties(
        &self,
        range: Range<u32>,
        method_rids: &[u32],
        semantics: &SemanticsMap,
    ) -> Result<Vec<Property>> {
        let Some(table) = self.tables.table::<PropertyRaw>() else {
            return Err(malformed_error!("PropertyMap without Property table"));
        };

        let mut properties = Vec::with_capacity(range.len());
        for index in range {
            let row = table.get(self.property_rid(index)?)?;
            let accessors = semantics.get(&row.token).map_or(&[][..], Vec::as_slice);

            properties.push(Property {
                token: row.token,
                name: self.string(row.name)?,
                flags: row.flags,
                signature: self.blob(row.signature)?,
                getter: accessor(
                    row.token,
                    accessors,
                    MethodSemanticsAttributes::GETTER,
                    method_rids,
                ),
                setter: accessor(
                    row.token,
                    accessors,
                    MethodSemanticsAttributes::SETTER,
                    method_rids,
                ),
            });
        }

        Ok(properties)
    }

    fn events(
        &self,
        range: Range<u32>,
        method_rids: &[u32],
        semantics: &SemanticsMap,
    ) -> Result<Vec<Event>> {
        let Some(table) = self.tables.table::<EventRaw>() else {
            return Err(malformed_error!("EventMap without Event table"));
        };

        let mut events = Vec::with_capacity(range.len());
        for index in range {
            let row = table.get(self.event_rid(index)?)?;
            let accessors = semantics.get(&row.token).map_or(&[][..], Vec::as_slice);

            events.push(Event {
                token: row.token,
                name: self.string(row.name)?,
                flags: row.flags,
                add_on: accessor(
                    row.token,
                    accessors,
                    MethodSemanticsAttributes::ADD_ON,
                    method_rids,
                ),
                remove_on: accessor(
                    row.token,
                    accessors,
                    MethodSemanticsAttributes::REMOVE_ON,
                    method_rids,
                ),
            });
        }

        Ok(events)
    }
}

/// Index in `method_rids` of the accessor with `semantic`, if declared and owned by the type
fn accessor(
    owner: Token,
    accessors: &[(u32, u32)],
    semantic: u32,
    method_rids: &[u32],
) -> Option<usize> {
    let (_, method) = accessors.iter().find(|(flags, _)| flags & semantic != 0)?;

    let index = method_rids.iter().position(|rid| rid == method);
    if index.is_none() {
        warn!(
            "Ignoring accessor {} of {} - not a method of the owning type",
            Token::from_parts(TableId::MethodDef, *method),
            owner
        );
    }

    index
}
