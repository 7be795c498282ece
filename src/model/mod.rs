//! Owned object model of a loaded assembly.
//!
//! The model is a plain tree built by a [`Loader`] and consumed by a [`Persister`]:
//!
//! ```text
//! Assembly
//!  └─ Module (owns the image bytes)
//!      └─ TypeDef
//!          ├─ MethodDef ── Option<MethodBody>
//!          ├─ Property ── getter / setter: indexes into the type's methods
//!          └─ Event ───── add / remove:    indexes into the type's methods
//! ```
//!
//! Every level is optional: a type without methods has `methods: None`, an accessor that
//! was never declared is `None`, and abstract or native methods have no body. Code walking
//! the tree visits what is present and skips the rest.
//!
//! Bodies are reached through [`TypeDef::body_mut`] with a [`Member`], which names a method,
//! a property or event accessor, or a constructor of the type.

mod loader;
mod writer;

pub use loader::{CilLoader, Loader};
pub use writer::{CilWriter, Persister};

use crate::metadata::{
    method::{MethodBody, MethodImplCodeType, MethodModifiers},
    token::Token,
};

/// Name of instance constructors
pub const CTOR_NAME: &str = ".ctor";
/// Name of type initializers
pub const CCTOR_NAME: &str = ".cctor";

/// A loaded assembly
pub struct Assembly {
    /// Name from the `Assembly` table, `None` for plain modules
    pub name: Option<String>,
    /// The modules of the assembly
    pub modules: Option<Vec<Module>>,
}

/// One module, the unit that is read from and written to a PE file
pub struct Module {
    /// Name from the `Module` table, e.g. `Library.dll`
    pub name: String,
    /// All `TypeDef` rows in table order, `<Module>` first
    pub types: Option<Vec<TypeDef>>,
    /// The image the module was loaded from
    pub image: Vec<u8>,
    /// File offset of the `MethodDef` table in `image`
    pub method_table_offset: usize,
    /// Size of one `MethodDef` row
    pub method_row_size: usize,
}

impl Module {
    /// Iterate over all methods of all types
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.types
            .iter()
            .flatten()
            .flat_map(|ty| ty.methods.iter().flatten())
    }

    /// Find a type by namespace and name
    #[must_use]
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<&TypeDef> {
        self.types
            .iter()
            .flatten()
            .find(|ty| ty.namespace == namespace && ty.name == name)
    }

    /// Mutable variant of [`Module::find_type`]
    pub fn find_type_mut(&mut self, namespace: &str, name: &str) -> Option<&mut TypeDef> {
        self.types
            .iter_mut()
            .flatten()
            .find(|ty| ty.namespace == namespace && ty.name == name)
    }

    /// File offset of the RVA column of `MethodDef` row `rid`
    #[must_use]
    pub fn method_rva_offset(&self, rid: u32) -> Option<usize> {
        let index = (rid as usize).checked_sub(1)?;
        index
            .checked_mul(self.method_row_size)?
            .checked_add(self.method_table_offset)
    }
}

/// A type definition
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace, empty for the global namespace and nested types
    pub namespace: String,
    /// Name of the type
    pub name: String,
    /// Type attributes, ECMA-335 II.23.1.15
    pub flags: u32,
    /// Methods in declaration order, constructors included
    pub methods: Option<Vec<MethodDef>>,
    /// Properties in declaration order
    pub properties: Option<Vec<Property>>,
    /// Events in declaration order
    pub events: Option<Vec<Event>>,
}

/// An accessor of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccessor {
    /// The `get` method
    Getter,
    /// The `set` method
    Setter,
}

/// An accessor of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAccessor {
    /// The `add` method
    Add,
    /// The `remove` method
    Remove,
}

/// A member of a type that may own a method body.
///
/// Indexes refer to the collections of the owning [`TypeDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    /// A method, by index into `methods`
    Method(usize),
    /// An accessor of a property, by index into `properties`
    Property(usize, PropertyAccessor),
    /// An accessor of an event, by index into `events`
    Event(usize, EventAccessor),
    /// A constructor, by index into `methods`
    Constructor(usize),
}

impl TypeDef {
    /// Full name, `Namespace.Name` or just `Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Indexes of the instance and static constructors in `methods`
    #[must_use]
    pub fn constructors(&self) -> Vec<usize> {
        self.methods
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, method)| method.is_constructor())
            .map(|(index, _)| index)
            .collect()
    }

    /// Find a method by name
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().flatten().find(|method| method.name == name)
    }

    /// Find a property by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .flatten()
            .find(|property| property.name == name)
    }

    /// Find an event by name
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().flatten().find(|event| event.name == name)
    }

    /// All members that may carry a body, in visiting order: methods, property accessors
    /// (getter, setter), event accessors (add, remove), constructors
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = (0..self.methods.as_ref().map_or(0, Vec::len))
            .map(Member::Method)
            .collect();

        for index in 0..self.properties.as_ref().map_or(0, Vec::len) {
            members.push(Member::Property(index, PropertyAccessor::Getter));
            members.push(Member::Property(index, PropertyAccessor::Setter));
        }

        for index in 0..self.events.as_ref().map_or(0, Vec::len) {
            members.push(Member::Event(index, EventAccessor::Add));
            members.push(Member::Event(index, EventAccessor::Remove));
        }

        members.extend(self.constructors().into_iter().map(Member::Constructor));
        members
    }

    /// Index into `methods` of the method behind `member`, `None` if absent
    #[must_use]
    pub fn method_index(&self, member: Member) -> Option<usize> {
        match member {
            Member::Method(index) | Member::Constructor(index) => Some(index),
            Member::Property(index, accessor) => {
                let property = self.properties.as_ref()?.get(index)?;
                match accessor {
                    PropertyAccessor::Getter => property.getter,
                    PropertyAccessor::Setter => property.setter,
                }
            }
            Member::Event(index, accessor) => {
                let event = self.events.as_ref()?.get(index)?;
                match accessor {
                    EventAccessor::Add => event.add_on,
                    EventAccessor::Remove => event.remove_on,
                }
            }
        }
    }

    /// The body behind `member`, `None` if the member, its accessor or its body is absent
    pub fn body_mut(&mut self, member: Member) -> Option<&mut MethodBody> {
        let index = self.method_index(member)?;
        self.methods.as_mut()?.get_mut(index)?.body.as_mut()
    }
}

/// A method definition
pub struct MethodDef {
    /// `MethodDef` token
    pub token: Token,
    /// Name of the method
    pub name: String,
    /// `MethodAttributes`
    pub flags: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u32,
    /// Raw signature blob
    pub signature: Vec<u8>,
    /// RVA of the body in the loaded image, 0 if there is none
    pub rva: u32,
    /// The decoded body
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Modifier flags of the method
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.flags)
    }

    /// Code type of the implementation
    #[must_use]
    pub fn code_type(&self) -> MethodImplCodeType {
        MethodImplCodeType::from_impl_flags(self.impl_flags)
    }

    /// True for `.ctor` and `.cctor` methods flagged `RTSpecialName`
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        (self.name == CTOR_NAME || self.name == CCTOR_NAME)
            && self.modifiers().contains(MethodModifiers::RTSPECIAL_NAME)
    }

    /// True if the method points at a CIL body
    #[must_use]
    pub fn has_il_body(&self) -> bool {
        self.rva != 0 && self.code_type().is_il()
    }
}

/// A property definition
pub struct Property {
    /// `Property` token
    pub token: Token,
    /// Name of the property
    pub name: String,
    /// `PropertyAttributes`
    pub flags: u32,
    /// Raw signature blob
    pub signature: Vec<u8>,
    /// Index of the getter in the owning type's `methods`
    pub getter: Option<usize>,
    /// Index of the setter in the owning type's `methods`
    pub setter: Option<usize>,
}

/// An event definition
pub struct Event {
    /// `Event` token
    pub token: Token,
    /// Name of the event
    pub name: String,
    /// `EventAttributes`
    pub flags: u32,
    /// Index of the add accessor in the owning type's `methods`
    pub add_on: Option<usize>,
    /// Index of the remove accessor in the owning type's `methods`
    pub remove_on: Option<usize>,
}
