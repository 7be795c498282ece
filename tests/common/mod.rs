#![allow(dead_code)]

#[path = "../../src/test/builder.rs"]
mod builder;

use std::path::{Path, PathBuf};

use cilshred::{Assembly, CilLoader, Loader, MethodDef, Module};

pub use builder::*;

/// `string Bar(int)` of `Foo.Foo`: ten instructions with one local
#[rustfmt::skip]
pub fn bar_body() -> BodySpec {
    BodySpec::Fat {
        max_stack: 1,
        local_var_sig_token: 0x1100_0001,
        init_locals: true,
        code: vec![
            0x00,                         // nop
            0x03,                         // ldarg.1
            0x0A,                         // stloc.0
            0x12, 0x00,                   // ldloca.s 0
            0x28, 0x01, 0x00, 0x00, 0x0A, // call
            0x0B,                         // stloc.1
            0x2B, 0x00,                   // br.s 0
            0x07,                         // ldloc.1
            0x00,                         // nop
            0x2A,                         // ret
        ],
        handlers: Vec::new(),
        fat_section: false,
    }
}

/// A class with a constructor, an auto-property, an event and an abstract method next to `Foo`
pub fn sample() -> AssemblyBuilder {
    AssemblyBuilder::new("Library")
        .add_type(
            TypeSpec::new("Foo", "Foo")
                .method(MethodSpec::new("Bar", &SIG_STRING_INT_INSTANCE, Some(bar_body())))
                .method(MethodSpec::ctor(BodySpec::Tiny(vec![0x02, 0x28, 0x02, 0x00, 0x00, 0x0A, 0x2A]))),
        )
        .add_type(
            TypeSpec::new("Demo", "Person")
                .method(MethodSpec::new("get_Name", &SIG_STRING_INSTANCE, Some(BodySpec::Tiny(vec![0x02, 0x7B, 0x01, 0x00, 0x00, 0x04, 0x2A])))
                    .with_flags(MD_PUBLIC | MD_HIDE_BY_SIG | MD_SPECIAL_NAME))
                .method(MethodSpec::new("set_Name", &SIG_VOID_STRING_INSTANCE, Some(BodySpec::Tiny(vec![0x02, 0x03, 0x7D, 0x01, 0x00, 0x00, 0x04, 0x2A])))
                    .with_flags(MD_PUBLIC | MD_HIDE_BY_SIG | MD_SPECIAL_NAME))
                .method(MethodSpec::new("add_Changed", &SIG_VOID_INSTANCE, Some(BodySpec::Tiny(vec![0x00, 0x00, 0x00, 0x2A]))))
                .method(MethodSpec::new("remove_Changed", &SIG_VOID_INSTANCE, Some(BodySpec::Tiny(vec![0x00, 0x00, 0x2A]))))
                .method(MethodSpec::ctor(BodySpec::Tiny(vec![0x02, 0x28, 0x02, 0x00, 0x00, 0x0A, 0x2A])))
                .property(PropertySpec::new("Name", Some(0), Some(1)))
                .event(EventSpec::new("Changed", Some(2), Some(3))),
        )
        .add_type(
            TypeSpec::new("Demo", "Shape")
                .with_flags(0x0010_0081)
                .method(MethodSpec::abstract_method("Area", &SIG_STRING_INSTANCE)),
        )
}

/// Write `data` to `name` inside `dir`
pub fn write_sample(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

pub fn load(path: &Path) -> Assembly {
    CilLoader::new().load(path).unwrap()
}

pub fn module(assembly: &Assembly) -> &Module {
    &assembly.modules.as_ref().unwrap()[0]
}

pub fn method<'a>(module: &'a Module, namespace: &str, ty: &str, name: &str) -> &'a MethodDef {
    module.find_type(namespace, ty).unwrap().method(name).unwrap()
}

pub fn mnemonics(method: &MethodDef) -> Vec<&'static str> {
    method
        .body
        .as_ref()
        .unwrap()
        .instructions
        .iter()
        .map(|instruction| instruction.mnemonic)
        .collect()
}
