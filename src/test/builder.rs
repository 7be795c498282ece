//! Synthetic .NET assembly builder used by unit tests, integration tests and benchmarks.
//!
//! Emits a minimal but valid PE32 image with one `.text` section holding the CLI header,
//! the method bodies and a metadata root with `#~`, `#Strings` and `#Blob` streams. The
//! tables stream carries `Module`, `TypeDef`, `MethodDef`, `EventMap`, `Event`, `PropertyMap`,
//! `Property`, `MethodSemantics` and (optionally) `Assembly`. All heaps and tables are small, so
//! every index is 2 bytes wide.
//!
//! This file only depends on `std`, which allows the integration tests and benchmarks to
//! include it through `#[path]`.

const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: usize = 0x2000;
const TEXT_RVA: usize = 0x2000;
const TEXT_OFFSET: usize = 0x200;
const CLI_HEADER_SIZE: usize = 72;

/// Method attribute `Static`
pub const MD_STATIC: u16 = 0x0010;
/// Method attribute `Virtual`
pub const MD_VIRTUAL: u16 = 0x0040;
/// Method attribute `Abstract`
pub const MD_ABSTRACT: u16 = 0x0400;
/// Method attribute `SpecialName`
pub const MD_SPECIAL_NAME: u16 = 0x0800;
/// Method attribute `RTSpecialName`
pub const MD_RT_SPECIAL_NAME: u16 = 0x1000;
/// Method attribute `PinvokeImpl`
pub const MD_PINVOKE_IMPL: u16 = 0x2000;
/// Method attribute `Public`
pub const MD_PUBLIC: u16 = 0x0006;
/// Method attribute `HideBySig`
pub const MD_HIDE_BY_SIG: u16 = 0x0080;

/// Signature of `void ()` instance method
pub const SIG_VOID_INSTANCE: [u8; 3] = [0x20, 0x00, 0x01];
/// Signature of `string (int32)` instance method
pub const SIG_STRING_INT_INSTANCE: [u8; 4] = [0x20, 0x01, 0x0E, 0x08];
/// Signature of `string ()` instance method
pub const SIG_STRING_INSTANCE: [u8; 3] = [0x20, 0x00, 0x0E];
/// Signature of `void (string)` instance method
pub const SIG_VOID_STRING_INSTANCE: [u8; 4] = [0x20, 0x01, 0x01, 0x0E];
/// Signature of an instance property of type `string`
pub const SIG_PROPERTY_STRING: [u8; 3] = [0x28, 0x00, 0x0E];

/// One exception handling clause of a fat body
#[derive(Clone, Debug)]
pub struct HandlerSpec {
    /// Clause flags (0 = catch, 2 = finally, ...)
    pub flags: u32,
    /// Start of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Catch type token or filter offset
    pub class_token_or_filter: u32,
}

/// A method body to embed into the image
#[derive(Clone, Debug)]
pub enum BodySpec {
    /// A tiny-format body; `code` must be shorter than 64 bytes
    Tiny(Vec<u8>),
    /// A fat-format body
    Fat {
        /// Maximum evaluation stack depth
        max_stack: u16,
        /// `StandAloneSig` token of the locals, 0 for none
        local_var_sig_token: u32,
        /// Zero-initialize locals
        init_locals: bool,
        /// The IL bytes
        code: Vec<u8>,
        /// Exception handling clauses, written as an extra data section
        handlers: Vec<HandlerSpec>,
        /// Encode the exception section in the fat layout
        fat_section: bool,
    },
    /// Raw bytes copied verbatim, used to produce malformed bodies
    Raw(Vec<u8>),
}

impl BodySpec {
    fn encode(&self) -> Vec<u8> {
        match self {
            BodySpec::Tiny(code) => {
                assert!(code.len() < 64, "tiny bodies hold at most 63 bytes");
                let mut out = vec![((code.len() as u8) << 2) | 0x02];
                out.extend_from_slice(code);
                out
            }
            BodySpec::Fat {
                max_stack,
                local_var_sig_token,
                init_locals,
                code,
                handlers,
                fat_section,
            } => {
                let mut flags: u16 = 0x0003 | (3 << 12);
                if *init_locals {
                    flags |= 0x0010;
                }
                if !handlers.is_empty() {
                    flags |= 0x0008;
                }

                let mut out = Vec::new();
                out.extend_from_slice(&flags.to_le_bytes());
                out.extend_from_slice(&max_stack.to_le_bytes());
                out.extend_from_slice(&(code.len() as u32).to_le_bytes());
                out.extend_from_slice(&local_var_sig_token.to_le_bytes());
                out.extend_from_slice(code);

                if !handlers.is_empty() {
                    while out.len() % 4 != 0 {
                        out.push(0);
                    }

                    if *fat_section {
                        let size = 4 + handlers.len() * 24;
                        out.push(0x41);
                        out.extend_from_slice(&(size as u32).to_le_bytes()[..3]);
                        for handler in handlers {
                            out.extend_from_slice(&handler.flags.to_le_bytes());
                            out.extend_from_slice(&handler.try_offset.to_le_bytes());
                            out.extend_from_slice(&handler.try_length.to_le_bytes());
                            out.extend_from_slice(&handler.handler_offset.to_le_bytes());
                            out.extend_from_slice(&handler.handler_length.to_le_bytes());
                            out.extend_from_slice(&handler.class_token_or_filter.to_le_bytes());
                        }
                    } else {
                        let size = 4 + handlers.len() * 12;
                        out.push(0x01);
                        out.push(size as u8);
                        out.extend_from_slice(&[0, 0]);
                        for handler in handlers {
                            out.extend_from_slice(&(handler.flags as u16).to_le_bytes());
                            out.extend_from_slice(&(handler.try_offset as u16).to_le_bytes());
                            out.push(handler.try_length as u8);
                            out.extend_from_slice(&(handler.handler_offset as u16).to_le_bytes());
                            out.push(handler.handler_length as u8);
                            out.extend_from_slice(&handler.class_token_or_filter.to_le_bytes());
                        }
                    }
                }

                out
            }
            BodySpec::Raw(bytes) => bytes.clone(),
        }
    }

    fn is_fat(&self) -> bool {
        matches!(self, BodySpec::Fat { .. })
    }
}

/// A method definition
#[derive(Clone, Debug)]
pub struct MethodSpec {
    name: String,
    flags: u16,
    impl_flags: u16,
    signature: Vec<u8>,
    body: Option<BodySpec>,
    rva_override: Option<u32>,
}

impl MethodSpec {
    /// A public instance method with the given signature blob and body
    pub fn new(name: &str, signature: &[u8], body: Option<BodySpec>) -> Self {
        MethodSpec {
            name: name.to_string(),
            flags: MD_PUBLIC | MD_HIDE_BY_SIG,
            impl_flags: 0,
            signature: signature.to_vec(),
            body,
            rva_override: None,
        }
    }

    /// An instance constructor `.ctor` with the given body
    pub fn ctor(body: BodySpec) -> Self {
        MethodSpec::new(".ctor", &SIG_VOID_INSTANCE, Some(body))
            .with_flags(MD_PUBLIC | MD_HIDE_BY_SIG | MD_SPECIAL_NAME | MD_RT_SPECIAL_NAME)
    }

    /// An abstract virtual method without a body
    pub fn abstract_method(name: &str, signature: &[u8]) -> Self {
        MethodSpec::new(name, signature, None)
            .with_flags(MD_PUBLIC | MD_HIDE_BY_SIG | MD_VIRTUAL | MD_ABSTRACT)
    }

    /// Replace the method attribute flags
    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Replace the implementation flags
    pub fn with_impl_flags(mut self, impl_flags: u16) -> Self {
        self.impl_flags = impl_flags;
        self
    }

    /// Reuse the body location of the method with this RVA instead of emitting a body
    pub fn with_rva(mut self, rva: u32) -> Self {
        self.rva_override = Some(rva);
        self
    }
}

/// A property definition, accessors given as indexes into the owning type's methods
#[derive(Clone, Debug)]
pub struct PropertySpec {
    name: String,
    signature: Vec<u8>,
    getter: Option<usize>,
    setter: Option<usize>,
}

impl PropertySpec {
    /// A property with optional getter and setter
    pub fn new(name: &str, getter: Option<usize>, setter: Option<usize>) -> Self {
        PropertySpec {
            name: name.to_string(),
            signature: SIG_PROPERTY_STRING.to_vec(),
            getter,
            setter,
        }
    }
}

/// An event definition, accessors given as indexes into the owning type's methods
#[derive(Clone, Debug)]
pub struct EventSpec {
    name: String,
    add_on: Option<usize>,
    remove_on: Option<usize>,
}

impl EventSpec {
    /// An event with optional add and remove accessors
    pub fn new(name: &str, add_on: Option<usize>, remove_on: Option<usize>) -> Self {
        EventSpec {
            name: name.to_string(),
            add_on,
            remove_on,
        }
    }
}

/// A type definition
#[derive(Clone, Debug)]
pub struct TypeSpec {
    namespace: String,
    name: String,
    flags: u32,
    methods: Vec<MethodSpec>,
    properties: Vec<PropertySpec>,
    events: Vec<EventSpec>,
}

impl TypeSpec {
    /// A public class
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeSpec {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: 0x0010_0001,
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Replace the type attribute flags
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Append a method
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// Append a property
    pub fn property(mut self, property: PropertySpec) -> Self {
        self.properties.push(property);
        self
    }

    /// Append an event
    pub fn event(mut self, event: EventSpec) -> Self {
        self.events.push(event);
        self
    }
}

/// Builder producing the bytes of a synthetic assembly
#[derive(Clone, Debug)]
pub struct AssemblyBuilder {
    name: String,
    with_assembly_row: bool,
    with_clr_header: bool,
    types: Vec<TypeSpec>,
}

struct Heap {
    data: Vec<u8>,
}

impl Heap {
    fn new() -> Self {
        Heap { data: vec![0] }
    }

    fn string(&mut self, value: &str) -> u16 {
        if value.is_empty() {
            return 0;
        }
        let index = self.data.len() as u16;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        index
    }

    fn blob(&mut self, value: &[u8]) -> u16 {
        assert!(value.len() < 0x80, "synthetic blobs use a 1 byte length");
        let index = self.data.len() as u16;
        self.data.push(value.len() as u8);
        self.data.extend_from_slice(value);
        index
    }

    fn padded(mut self) -> Vec<u8> {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        self.data
    }
}

fn put16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn align(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

impl AssemblyBuilder {
    /// Start an assembly whose module is named `<name>.dll`
    pub fn new(name: &str) -> Self {
        AssemblyBuilder {
            name: name.to_string(),
            with_assembly_row: true,
            with_clr_header: true,
            types: Vec::new(),
        }
    }

    /// Append a type definition after `<Module>`
    pub fn add_type(mut self, ty: TypeSpec) -> Self {
        self.types.push(ty);
        self
    }

    /// Leave out the `Assembly` table, producing a netmodule
    pub fn without_assembly_row(mut self) -> Self {
        self.with_assembly_row = false;
        self
    }

    /// Leave the CLR runtime header directory empty, producing a native image
    pub fn without_clr_header(mut self) -> Self {
        self.with_clr_header = false;
        self
    }

    /// Emit the image bytes
    pub fn build(&self) -> Vec<u8> {
        let mut types = vec![TypeSpec::new("", "<Module>").with_flags(0)];
        types.extend(self.types.iter().cloned());

        // .text content: CLI header, then method bodies, then metadata
        let mut text = vec![0u8; CLI_HEADER_SIZE];
        let mut method_rvas = Vec::new();
        for ty in &types {
            for method in &ty.methods {
                let rva = match (&method.body, method.rva_override) {
                    (_, Some(rva)) => rva,
                    (Some(body), None) => {
                        if body.is_fat() {
                            while text.len() % 4 != 0 {
                                text.push(0);
                            }
                        }
                        let rva = (TEXT_RVA + text.len()) as u32;
                        text.extend_from_slice(&body.encode());
                        rva
                    }
                    (None, None) => 0,
                };
                method_rvas.push(rva);
            }
        }
        while text.len() % 4 != 0 {
            text.push(0);
        }

        let metadata_rva = TEXT_RVA + text.len();
        let metadata = self.metadata(&types, &method_rvas);
        text.extend_from_slice(&metadata);

        let mut cli = Vec::with_capacity(CLI_HEADER_SIZE);
        put32(&mut cli, CLI_HEADER_SIZE as u32);
        put16(&mut cli, 2);
        put16(&mut cli, 5);
        put32(&mut cli, metadata_rva as u32);
        put32(&mut cli, metadata.len() as u32);
        put32(&mut cli, 1);
        put32(&mut cli, 0);
        cli.resize(CLI_HEADER_SIZE, 0);
        text[..CLI_HEADER_SIZE].copy_from_slice(&cli);

        self.pe(&text)
    }

    fn metadata(&self, types: &[TypeSpec], method_rvas: &[u32]) -> Vec<u8> {
        let mut strings = Heap::new();
        let mut blobs = Heap::new();
        let tables = self.tables(types, method_rvas, &mut strings, &mut blobs);
        let strings = strings.padded();
        let blobs = blobs.padded();

        let version = b"v4.0.30319\0\0";
        let header_size = 16 + version.len() + 4 + 12 + 20 + 16;

        let mut root = Vec::new();
        put32(&mut root, 0x424A_5342);
        put16(&mut root, 1);
        put16(&mut root, 1);
        put32(&mut root, 0);
        put32(&mut root, version.len() as u32);
        root.extend_from_slice(version);
        put16(&mut root, 0);
        put16(&mut root, 3);

        let mut offset = header_size;
        for (name, size) in [
            (&b"#~\0\0"[..], tables.len()),
            (&b"#Strings\0\0\0\0"[..], strings.len()),
            (&b"#Blob\0\0\0"[..], blobs.len()),
        ] {
            put32(&mut root, offset as u32);
            put32(&mut root, size as u32);
            root.extend_from_slice(name);
            offset += size;
        }
        assert_eq!(root.len(), header_size);

        root.extend_from_slice(&tables);
        root.extend_from_slice(&strings);
        root.extend_from_slice(&blobs);
        root
    }

    #[allow(clippy::too_many_lines)]
    fn tables(
        &self,
        types: &[TypeSpec],
        method_rvas: &[u32],
        strings: &mut Heap,
        blobs: &mut Heap,
    ) -> Vec<u8> {
        let mut module = Vec::new();
        put16(&mut module, 0);
        put16(&mut module, strings.string(&format!("{}.dll", self.name)));
        put16(&mut module, 0);
        put16(&mut module, 0);
        put16(&mut module, 0);

        let mut typedef = Vec::new();
        let mut methoddef = Vec::new();
        let mut eventmap = Vec::new();
        let mut event = Vec::new();
        let mut propertymap = Vec::new();
        let mut property = Vec::new();
        let mut semantics = Vec::new();

        let mut method_rid = 1_u16;
        let mut event_rid = 1_u16;
        let mut property_rid = 1_u16;
        let mut counts = [0_u32; 7];

        for (type_index, ty) in types.iter().enumerate() {
            let type_rid = (type_index + 1) as u16;
            let first_method = method_rid;

            put32(&mut typedef, ty.flags);
            put16(&mut typedef, strings.string(&ty.name));
            put16(&mut typedef, strings.string(&ty.namespace));
            put16(&mut typedef, 0);
            put16(&mut typedef, 1);
            put16(&mut typedef, first_method);
            counts[0] += 1;

            for method in &ty.methods {
                put32(&mut methoddef, method_rvas[(method_rid - 1) as usize]);
                put16(&mut methoddef, method.impl_flags);
                put16(&mut methoddef, method.flags);
                put16(&mut methoddef, strings.string(&method.name));
                put16(&mut methoddef, blobs.blob(&method.signature));
                put16(&mut methoddef, 1);
                method_rid += 1;
                counts[1] += 1;
            }

            if !ty.events.is_empty() {
                put16(&mut eventmap, type_rid);
                put16(&mut eventmap, event_rid);
                counts[2] += 1;
                for spec in &ty.events {
                    put16(&mut event, 0);
                    put16(&mut event, strings.string(&spec.name));
                    put16(&mut event, 0);
                    counts[3] += 1;
                    for (accessor, flag) in [(spec.add_on, 0x0008_u16), (spec.remove_on, 0x0010)] {
                        if let Some(index) = accessor {
                            put16(&mut semantics, flag);
                            put16(&mut semantics, first_method + index as u16);
                            put16(&mut semantics, event_rid << 1);
                            counts[6] += 1;
                        }
                    }
                    event_rid += 1;
                }
            }

            if !ty.properties.is_empty() {
                put16(&mut propertymap, type_rid);
                put16(&mut propertymap, property_rid);
                counts[4] += 1;
                for spec in &ty.properties {
                    put16(&mut property, 0);
                    put16(&mut property, strings.string(&spec.name));
                    put16(&mut property, blobs.blob(&spec.signature));
                    counts[5] += 1;
                    for (accessor, flag) in [(spec.setter, 0x0001_u16), (spec.getter, 0x0002)] {
                        if let Some(index) = accessor {
                            put16(&mut semantics, flag);
                            put16(&mut semantics, first_method + index as u16);
                            put16(&mut semantics, (property_rid << 1) | 1);
                            counts[6] += 1;
                        }
                    }
                    property_rid += 1;
                }
            }
        }

        let mut assembly = Vec::new();
        if self.with_assembly_row {
            put32(&mut assembly, 0x8004);
            put16(&mut assembly, 1);
            put16(&mut assembly, 0);
            put16(&mut assembly, 0);
            put16(&mut assembly, 0);
            put32(&mut assembly, 0);
            put16(&mut assembly, 0);
            put16(&mut assembly, strings.string(&self.name));
            put16(&mut assembly, 0);
        }

        // (table id, row count, rows)
        let present: Vec<(u8, u32, &[u8])> = [
            (0x00_u8, 1_u32, &module[..]),
            (0x02, counts[0], &typedef[..]),
            (0x06, counts[1], &methoddef[..]),
            (0x12, counts[2], &eventmap[..]),
            (0x14, counts[3], &event[..]),
            (0x15, counts[4], &propertymap[..]),
            (0x17, counts[5], &property[..]),
            (0x18, counts[6], &semantics[..]),
            (0x20, u32::from(self.with_assembly_row), &assembly[..]),
        ]
        .into_iter()
        .filter(|(_, rows, _)| *rows > 0)
        .collect();

        let valid = present.iter().fold(0_u64, |acc, (id, _, _)| acc | (1 << id));

        let mut out = Vec::new();
        put32(&mut out, 0);
        out.push(2);
        out.push(0);
        out.push(0);
        out.push(1);
        out.extend_from_slice(&valid.to_le_bytes());
        out.extend_from_slice(&0x0000_1600_0000_0000_u64.to_le_bytes());
        for (_, rows, _) in &present {
            put32(&mut out, *rows);
        }
        for (_, _, data) in &present {
            out.extend_from_slice(data);
        }
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    fn pe(&self, text: &[u8]) -> Vec<u8> {
        let raw_size = align(text.len(), FILE_ALIGNMENT);
        let image_size = align(TEXT_RVA + text.len(), SECTION_ALIGNMENT);

        let mut out = vec![0u8; TEXT_OFFSET];
        out[0] = b'M';
        out[1] = b'Z';
        out[0x3C..0x40].copy_from_slice(&0x80_u32.to_le_bytes());

        let mut headers = Vec::new();
        headers.extend_from_slice(b"PE\0\0");

        // COFF file header
        put16(&mut headers, 0x014C);
        put16(&mut headers, 1);
        put32(&mut headers, 0);
        put32(&mut headers, 0);
        put32(&mut headers, 0);
        put16(&mut headers, 0xE0);
        put16(&mut headers, 0x2102);

        // Optional header, standard fields
        put16(&mut headers, 0x010B);
        headers.push(8);
        headers.push(0);
        put32(&mut headers, raw_size as u32);
        put32(&mut headers, 0);
        put32(&mut headers, 0);
        put32(&mut headers, 0);
        put32(&mut headers, TEXT_RVA as u32);
        put32(&mut headers, 0);

        // Optional header, windows fields
        put32(&mut headers, 0x1000_0000);
        put32(&mut headers, SECTION_ALIGNMENT as u32);
        put32(&mut headers, FILE_ALIGNMENT as u32);
        put16(&mut headers, 4);
        put16(&mut headers, 0);
        put16(&mut headers, 0);
        put16(&mut headers, 0);
        put16(&mut headers, 4);
        put16(&mut headers, 0);
        put32(&mut headers, 0);
        put32(&mut headers, image_size as u32);
        put32(&mut headers, TEXT_OFFSET as u32);
        put32(&mut headers, 0);
        put16(&mut headers, 3);
        put16(&mut headers, 0x8540);
        put32(&mut headers, 0x0010_0000);
        put32(&mut headers, 0x1000);
        put32(&mut headers, 0x0010_0000);
        put32(&mut headers, 0x1000);
        put32(&mut headers, 0);
        put32(&mut headers, 16);

        // Data directories, only the CLR runtime header (index 14) is set
        for index in 0..16 {
            if index == 14 && self.with_clr_header {
                put32(&mut headers, TEXT_RVA as u32);
                put32(&mut headers, CLI_HEADER_SIZE as u32);
            } else {
                put32(&mut headers, 0);
                put32(&mut headers, 0);
            }
        }

        // Section table
        headers.extend_from_slice(b".text\0\0\0");
        put32(&mut headers, text.len() as u32);
        put32(&mut headers, TEXT_RVA as u32);
        put32(&mut headers, raw_size as u32);
        put32(&mut headers, TEXT_OFFSET as u32);
        put32(&mut headers, 0);
        put32(&mut headers, 0);
        put16(&mut headers, 0);
        put16(&mut headers, 0);
        put32(&mut headers, 0x6000_0020);

        out[0x80..0x80 + headers.len()].copy_from_slice(&headers);

        out.extend_from_slice(text);
        out.resize(TEXT_OFFSET + raw_size, 0);
        out
    }
}

/// Offset of `rva` inside images produced by [`AssemblyBuilder`]
pub fn rva_to_offset(rva: u32) -> usize {
    rva as usize - TEXT_RVA + TEXT_OFFSET
}
