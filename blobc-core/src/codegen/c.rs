// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! C header generator.
//!
//! Emits an include-guarded header with one typedef per primitive, enum
//! definitions, `#define`s for integer constants, forward struct tags,
//! and finally the struct bodies in C declarator syntax.

use super::Generator;
use crate::ast::{NamedOption, OptionValue};
use crate::error::ParseError;
use crate::typesys::{TypeDef, TypeId, TypeSystem};
use std::io::Write;

pub struct CGenerator {
    guard: String,
    emit_primitives: bool,
    structs: Vec<TypeId>,
}

impl CGenerator {
    pub fn new(input_name: &str) -> Self {
        let mut guard = String::from("BLOBC_");
        for c in input_name.chars() {
            guard.push(if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            });
        }
        Self {
            guard,
            emit_primitives: true,
            structs: Vec::new(),
        }
    }

    fn bad_option(option: &NamedOption, message: &str) -> ParseError {
        ParseError::new(
            option.location.clone(),
            format!("\"{}\": {message}", option.name),
        )
    }

    /// C spelling of a primitive.
    fn primitive_name(def: &TypeDef) -> &'static str {
        match def {
            TypeDef::Integer(d) => match (d.signed, d.size) {
                (true, 1) => "int8_t",
                (true, 2) => "int16_t",
                (true, 4) => "int32_t",
                (true, _) => "int64_t",
                (false, 1) => "uint8_t",
                (false, 2) => "uint16_t",
                (false, 4) => "uint32_t",
                (false, _) => "uint64_t",
            },
            TypeDef::Float(d) => {
                if d.size == 4 {
                    "float"
                } else {
                    "double"
                }
            }
            TypeDef::Character(d) => match d.size {
                1 => "char",
                2 => "uint16_t",
                _ => "uint32_t",
            },
            _ => unreachable!("visit_primitive only sees primitives"),
        }
    }

    /// Compose a C declaration for a variable of a resolved type.
    fn declarator(&self, types: &TypeSystem, ty: TypeId, var: &str) -> String {
        match &types[ty] {
            TypeDef::Void => join("void", var),
            TypeDef::Integer(d) => join(&d.name, var),
            TypeDef::Float(d) => join(&d.name, var),
            TypeDef::Character(d) => join(&d.name, var),
            TypeDef::Enum(d) => join(&d.name, var),
            TypeDef::Struct(d) => join(&format!("struct {}_TAG", d.name), var),
            TypeDef::Pointer(p) => {
                let inner = self.declarator(types, p.target, "");
                format!("{inner}*{var}")
            }
            TypeDef::Array(a) => {
                format!("{}[{}]", self.declarator(types, a.elem, var), a.dim)
            }
        }
    }
}

fn join(ty: &str, var: &str) -> String {
    if var.is_empty() {
        ty.to_owned()
    } else {
        format!("{ty} {var}")
    }
}

impl Generator for CGenerator {
    fn mnemonic(&self) -> &'static str {
        "c"
    }

    fn configure(&mut self, option: &NamedOption) -> Result<(), ParseError> {
        match option.name.as_str() {
            "guard" => {
                let positional: Vec<_> = option.positional().collect();
                match positional.as_slice() {
                    [v] if option.params.len() == 1 => match v.as_str() {
                        Some(name) => {
                            self.guard = name.to_owned();
                            Ok(())
                        }
                        None => Err(Self::bad_option(option, "guard name must be a string")),
                    },
                    _ => Err(Self::bad_option(option, "expects a single guard name")),
                }
            }
            "emit_primitives" => {
                let positional: Vec<_> = option.positional().collect();
                match positional.as_slice() {
                    [OptionValue::Ident(v)] if option.params.len() == 1 => match v.as_str() {
                        "yes" => {
                            self.emit_primitives = true;
                            Ok(())
                        }
                        "no" => {
                            self.emit_primitives = false;
                            Ok(())
                        }
                        _ => Err(Self::bad_option(option, "expects yes or no")),
                    },
                    _ => Err(Self::bad_option(option, "expects yes or no")),
                }
            }
            _ => Err(Self::bad_option(option, "no such generator option")),
        }
    }

    fn start(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "#ifndef {}", self.guard)?;
        writeln!(out, "#define {}", self.guard)?;
        writeln!(out)?;
        writeln!(out, "#include <inttypes.h>")?;
        writeln!(out)
    }

    fn visit_import(&mut self, out: &mut dyn Write, file: &str) -> std::io::Result<()> {
        writeln!(out, "/* imported: {file} */")
    }

    fn visit_primitive(
        &mut self,
        out: &mut dyn Write,
        types: &TypeSystem,
        id: TypeId,
    ) -> std::io::Result<()> {
        if !self.emit_primitives {
            return Ok(());
        }
        let def = &types[id];
        let name = match def {
            TypeDef::Integer(d) => &d.name,
            TypeDef::Float(d) => &d.name,
            TypeDef::Character(d) => &d.name,
            _ => return Ok(()),
        };
        writeln!(out, "typedef {} {};", Self::primitive_name(def), name)
    }

    fn visit_enum(
        &mut self,
        out: &mut dyn Write,
        types: &TypeSystem,
        id: TypeId,
    ) -> std::io::Result<()> {
        let TypeDef::Enum(def) = &types[id] else {
            return Ok(());
        };
        writeln!(out, "\ntypedef enum {}_TAG {{", def.name)?;
        for (i, member) in def.members.iter().enumerate() {
            let sep = if i + 1 == def.members.len() { "" } else { "," };
            writeln!(out, "\t{}_{} = {}{}", def.name, member.name, member.value, sep)?;
        }
        writeln!(out, "}} {};", def.name)
    }

    fn visit_struct(
        &mut self,
        out: &mut dyn Write,
        types: &TypeSystem,
        id: TypeId,
    ) -> std::io::Result<()> {
        let TypeDef::Struct(def) = &types[id] else {
            return Ok(());
        };
        writeln!(out, "struct {}_TAG;", def.name)?;
        self.structs.push(id);
        Ok(())
    }

    fn visit_constant(
        &mut self,
        out: &mut dyn Write,
        name: &str,
        value: i64,
    ) -> std::io::Result<()> {
        writeln!(out, "#define {name} {value}")
    }

    fn finish(&mut self, out: &mut dyn Write, types: &TypeSystem) -> std::io::Result<()> {
        for &id in &self.structs {
            let TypeDef::Struct(def) = &types[id] else {
                continue;
            };
            writeln!(out, "\ntypedef struct {}_TAG {{", def.name)?;
            for member in &def.members {
                writeln!(out, "\t{};", self.declarator(types, member.ty, &member.name))?;
            }
            writeln!(out, "}} {};", def.name)?;
        }
        writeln!(out, "\n#endif")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use crate::parser::{parse_file, parse_string, ImportProvider};
    use crate::typesys::TypeSystem;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn emit(src: &str) -> String {
        let items = parse_string(src).unwrap();
        let types = TypeSystem::compile(&items).unwrap();
        let mut gen = CGenerator::new("test.blob");
        let mut out = Vec::new();
        generate(&items, &types, &mut gen, &mut out, false).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn header_has_guard_and_include() {
        let text = emit("defprimitive u32 uint 4;");
        assert!(text.starts_with("#ifndef BLOBC_TEST_BLOB\n#define BLOBC_TEST_BLOB\n"));
        assert!(text.contains("#include <inttypes.h>"));
        assert!(text.ends_with("\n#endif\n"));
    }

    #[test]
    fn primitives_become_typedefs() {
        let text = emit(
            "defprimitive u32 uint 4;
             defprimitive s16 sint 2;
             defprimitive f64 float 8;
             defprimitive char8 character 1;",
        );
        assert!(text.contains("typedef uint32_t u32;"));
        assert!(text.contains("typedef int16_t s16;"));
        assert!(text.contains("typedef double f64;"));
        assert!(text.contains("typedef char char8;"));
    }

    #[test]
    fn struct_bodies_follow_forward_tags() {
        let text = emit(
            "defprimitive u32 uint 4;
             struct foo { u32 a; u32* b; u32[3] c; foo* next; }",
        );
        let tag = text.find("struct foo_TAG;").unwrap();
        let body = text.find("typedef struct foo_TAG {").unwrap();
        assert!(tag < body);
        assert!(text.contains("\tu32 a;"));
        assert!(text.contains("\tu32*b;"));
        assert!(text.contains("\tu32 c[3];"));
        assert!(text.contains("\tstruct foo_TAG*next;"));
        assert!(text.contains("} foo;"));
    }

    #[test]
    fn enums_and_constants() {
        let text = emit(
            "enum Foo { Bar = 10, Baz }
             iconst Qux = Foo.Bar + 1;",
        );
        assert!(text.contains("typedef enum Foo_TAG {"));
        assert!(text.contains("\tFoo_Bar = 10,"));
        assert!(text.contains("\tFoo_Baz = 11"));
        assert!(text.contains("} Foo;"));
        assert!(text.contains("#define Qux 11"));
    }

    #[test]
    fn cstring_members_are_char_pointers() {
        let text = emit(
            "defprimitive char8 character 1;
             struct foo { __cstring<char8> name; }",
        );
        assert!(text.contains("\tchar8*name;"));
    }

    #[test]
    fn void_pointer_members() {
        let text = emit("struct foo { void* p; }");
        assert!(text.contains("\tvoid*p;"));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let items = parse_string("generator c : frobnicate;").unwrap();
        let types = TypeSystem::compile(&items).unwrap();
        let mut gen = CGenerator::new("test.blob");
        let mut out = Vec::new();
        let err = generate(&items, &types, &mut gen, &mut out, false).unwrap_err();
        assert!(err
            .to_string()
            .contains("\"frobnicate\": no such generator option"));
    }

    #[test]
    fn guard_and_primitive_options_apply() {
        let text = emit(
            "generator c : guard(MY_GUARD), emit_primitives(no);
             defprimitive u32 uint 4;",
        );
        assert!(text.starts_with("#ifndef MY_GUARD\n"));
        assert!(!text.contains("typedef uint32_t"));
    }

    #[test]
    fn options_for_other_generators_are_ignored() {
        let text = emit(
            "generator m68k : equ_label_suffix;
             defprimitive u32 uint 4;",
        );
        assert!(text.contains("typedef uint32_t u32;"));
    }

    struct MemoryImports(HashMap<&'static str, &'static str>);

    impl ImportProvider for MemoryImports {
        fn find(&self, name: &str) -> Option<PathBuf> {
            self.0.contains_key(name).then(|| PathBuf::from(name))
        }

        fn read(&self, path: &Path) -> std::io::Result<String> {
            self.0
                .get(path.to_str().unwrap_or_default())
                .map(|s| (*s).to_owned())
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn emit_with_imports(merge: bool) -> String {
        let provider = MemoryImports(HashMap::from([
            ("main", "import \"dep\"\nstruct local { remote* r; }"),
            ("dep", "struct remote {}"),
        ]));
        let items = parse_file("main", &provider).unwrap();
        let types = TypeSystem::compile(&items).unwrap();
        let mut gen = CGenerator::new("main");
        let mut out = Vec::new();
        generate(&items, &types, &mut gen, &mut out, merge).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn imported_types_are_announced_not_redeclared() {
        let text = emit_with_imports(false);
        assert!(text.contains("/* imported: dep */"));
        assert!(!text.contains("typedef struct remote_TAG"));
        assert!(text.contains("typedef struct local_TAG"));
    }

    #[test]
    fn merge_imports_declares_everything_locally() {
        let text = emit_with_imports(true);
        assert!(!text.contains("/* imported"));
        assert!(text.contains("typedef struct remote_TAG"));
        assert!(text.contains("typedef struct local_TAG"));
    }
}
