//! Metadata tables of the `#~` stream.
//!
//! Only the tables needed to enumerate types, their methods, properties and events, and the
//! assembly identity are decoded into rows. Every other table is still sized through
//! [`TableInfo`] so that the tables that follow it can be located.
//!
//! Each table lives in its own module with a `*Raw` row type implementing [`RowReadable`]:
//!
//! | Table             | Row type              |
//! |-------------------|-----------------------|
//! | `Module`          | [`ModuleRaw`]         |
//! | `TypeDef`         | [`TypeDefRaw`]        |
//! | `MethodPtr`       | [`MethodPtrRaw`]      |
//! | `MethodDef`       | [`MethodDefRaw`]      |
//! | `EventMap`        | [`EventMapRaw`]       |
//! | `EventPtr`        | [`EventPtrRaw`]       |
//! | `Event`           | [`EventRaw`]          |
//! | `PropertyMap`     | [`PropertyMapRaw`]    |
//! | `PropertyPtr`     | [`PropertyPtrRaw`]    |
//! | `Property`        | [`PropertyRaw`]       |
//! | `MethodSemantics` | [`MethodSemanticsRaw`]|
//! | `Assembly`        | [`AssemblyRaw`]       |

mod assembly;
mod event;
mod eventmap;
mod eventptr;
mod methoddef;
mod methodptr;
mod methodsemantics;
mod module;
mod property;
mod propertymap;
mod propertyptr;
mod typedef;
mod types;

pub use assembly::*;
pub use event::*;
pub use eventmap::*;
pub use eventptr::*;
pub use methoddef::*;
pub use methodptr::*;
pub use methodsemantics::*;
pub use module::*;
pub use property::*;
pub use propertymap::*;
pub use propertyptr::*;
pub use typedef::*;
pub use types::*;
