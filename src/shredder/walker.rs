//! Visiting every body-carrying member of a module.

use std::ops::AddAssign;

use log::debug;

use crate::{
    model::Module,
    shredder::{body::shred_body, ShredOptions},
    Result,
};

/// Counters collected while walking modules
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Types visited, `<Module>` included
    pub types_visited: usize,
    /// Members visited; accessors and constructors count once per visit
    pub member_visits: usize,
    /// Visits that replaced a body
    pub bodies_shredded: usize,
    /// Visits that found no body (abstract methods, missing accessors, ...)
    pub visits_without_body: usize,
}

impl AddAssign for WalkStats {
    fn add_assign(&mut self, other: WalkStats) {
        self.types_visited += other.types_visited;
        self.member_visits += other.member_visits;
        self.bodies_shredded += other.bodies_shredded;
        self.visits_without_body += other.visits_without_body;
    }
}

/// Shred every body reachable from the types of `module`.
///
/// Members are visited in [`crate::model::TypeDef::members`] order. Constructors are part of
/// the methods as well and are therefore visited twice; the second visit finds the body
/// already shredded and leaves it as it is.
///
/// # Errors
/// Returns the first error of [`shred_body`].
pub fn walk_module(module: &mut Module, options: &ShredOptions) -> Result<WalkStats> {
    let mut stats = WalkStats::default();
    let Some(types) = module.types.as_mut() else {
        debug!("Module '{}' has no types", module.name);
        return Ok(stats);
    };

    for ty in types.iter_mut() {
        stats.types_visited += 1;

        let mut shredded = 0;
        for member in ty.members() {
            stats.member_visits += 1;
            if shred_body(ty.body_mut(member), options)? {
                shredded += 1;
            } else {
                stats.visits_without_body += 1;
            }
        }

        if shredded > 0 {
            debug!("Shredded {} bodies of {}", shredded, ty.full_name());
        }
        stats.bodies_shredded += shredded;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{CilLoader, Member, PropertyAccessor},
        test::builder::{
            AssemblyBuilder, BodySpec, EventSpec, MethodSpec, PropertySpec, TypeSpec,
            SIG_STRING_INSTANCE, SIG_VOID_INSTANCE, SIG_VOID_STRING_INSTANCE,
        },
    };

    fn module(builder: &AssemblyBuilder) -> Module {
        CilLoader::new()
            .load_bytes(builder.build())
            .unwrap()
            .modules
            .unwrap()
            .remove(0)
    }

    fn tiny(code: &[u8]) -> Option<BodySpec> {
        Some(BodySpec::Tiny(code.to_vec()))
    }

    #[test]
    fn visits_every_member_kind() {
        let mut module = module(
            &AssemblyBuilder::new("Library").add_type(
                TypeSpec::new("Demo", "Widget")
                    .method(MethodSpec::new("get_Name", &SIG_STRING_INSTANCE, tiny(&[0x14, 0x2A])))
                    .method(MethodSpec::new("set_Name", &SIG_VOID_STRING_INSTANCE, tiny(&[0x00, 0x2A])))
                    .method(MethodSpec::new("add_Click", &SIG_VOID_INSTANCE, tiny(&[0x00, 0x00, 0x2A])))
                    .method(MethodSpec::new("remove_Click", &SIG_VOID_INSTANCE, tiny(&[0x00, 0x00, 0x00, 0x2A])))
                    .method(MethodSpec::abstract_method("Draw", &SIG_VOID_INSTANCE))
                    .method(MethodSpec::ctor(BodySpec::Tiny(vec![0x02, 0x28, 0x01, 0x00, 0x00, 0x0A, 0x2A])))
                    .property(PropertySpec::new("Name", Some(0), Some(1)))
                    .event(EventSpec::new("Click", Some(2), Some(3))),
            ),
        );

        let stats = walk_module(&mut module, &ShredOptions::default()).unwrap();

        // 6 methods + 2 property accessors + 2 event accessors + 1 constructor
        assert_eq!(stats.types_visited, 2);
        assert_eq!(stats.member_visits, 11);
        assert_eq!(stats.bodies_shredded, 10);
        assert_eq!(stats.visits_without_body, 1);

        for method in module.methods() {
            match method.body.as_ref() {
                Some(body) => {
                    let mnemonics: Vec<&str> = body.instructions.iter().map(|i| i.mnemonic).collect();
                    assert_eq!(mnemonics, vec!["nop", "ret"], "{}", method.name);
                }
                None => assert_eq!(method.name, "Draw"),
            }
        }
    }

    #[test]
    fn missing_accessors_and_collections() {
        let mut module = module(
            &AssemblyBuilder::new("Library")
                .add_type(
                    TypeSpec::new("Demo", "ReadOnly")
                        .method(MethodSpec::new("get_Value", &SIG_STRING_INSTANCE, tiny(&[0x14, 0x2A])))
                        .property(PropertySpec::new("Value", Some(0), None)),
                )
                .add_type(TypeSpec::new("Demo", "Empty")),
        );

        let stats = walk_module(&mut module, &ShredOptions::default()).unwrap();

        assert_eq!(stats.types_visited, 3);
        assert_eq!(stats.member_visits, 3);
        assert_eq!(stats.bodies_shredded, 2);
        assert_eq!(stats.visits_without_body, 1);

        let ty = module.find_type_mut("Demo", "ReadOnly").unwrap();
        assert!(ty.body_mut(Member::Property(0, PropertyAccessor::Setter)).is_none());
    }

    #[test]
    fn module_without_types() {
        let mut module = module(&AssemblyBuilder::new("Library"));
        module.types = None;

        let stats = walk_module(&mut module, &ShredOptions::default()).unwrap();
        assert_eq!(stats, WalkStats::default());
    }

    #[test]
    fn stats_add_up() {
        let mut total = WalkStats::default();
        total += WalkStats {
            types_visited: 1,
            member_visits: 2,
            bodies_shredded: 1,
            visits_without_body: 1,
        };
        total += WalkStats {
            types_visited: 3,
            member_visits: 4,
            bodies_shredded: 4,
            visits_without_body: 0,
        };

        assert_eq!(total.types_visited, 4);
        assert_eq!(total.member_visits, 6);
        assert_eq!(total.bodies_shredded, 5);
        assert_eq!(total.visits_without_body, 1);
    }
}
