// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Code generator framework.
//!
//! Generators consume the type system read-only and write text. The
//! driver applies matching `generator <name> : ...` statements from the
//! parse tree, then visits named types in declaration order and constants
//! in definition order. Imported definitions are announced through
//! `visit_import` and skipped, unless merge mode pretends everything is
//! local.

use crate::ast::{Item, NamedOption};
use crate::error::{ParseError, Result};
use crate::typesys::{TypeDef, TypeId, TypeSystem};
use std::io::Write;

mod c;

pub use c::CGenerator;

/// Visitor over a compiled schema.
pub trait Generator {
    /// The name this generator answers to in `generator <name> : ...`
    /// statements and on the command line.
    fn mnemonic(&self) -> &'static str;

    /// Apply one generator option. Unknown options and malformed
    /// parameters are [ParseError]s at the option's location.
    fn configure(&mut self, option: &NamedOption) -> Result<(), ParseError>;

    fn start(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Called once per distinct file that contributed imported items.
    fn visit_import(&mut self, _out: &mut dyn Write, _file: &str) -> std::io::Result<()> {
        Ok(())
    }

    fn visit_primitive(
        &mut self,
        _out: &mut dyn Write,
        _types: &TypeSystem,
        _id: TypeId,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn visit_enum(
        &mut self,
        _out: &mut dyn Write,
        _types: &TypeSystem,
        _id: TypeId,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn visit_struct(
        &mut self,
        _out: &mut dyn Write,
        _types: &TypeSystem,
        _id: TypeId,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn visit_constant(
        &mut self,
        _out: &mut dyn Write,
        _name: &str,
        _value: i64,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _out: &mut dyn Write, _types: &TypeSystem) -> std::io::Result<()> {
        Ok(())
    }
}

/// Instantiate a generator by its command-line name.
pub fn create(language: &str, input_name: &str) -> Option<Box<dyn Generator>> {
    match language {
        "c" => Some(Box::new(CGenerator::new(input_name))),
        _ => None,
    }
}

/// Drive a generator over a parse tree and its compiled type system.
///
/// With `merge_imports` set, imported items are emitted as if declared
/// locally and no import announcements happen.
pub fn generate(
    items: &[Item],
    types: &TypeSystem,
    generator: &mut dyn Generator,
    out: &mut dyn Write,
    merge_imports: bool,
) -> Result<()> {
    for item in items {
        if let Item::GeneratorConfig(config) = item {
            if config.generator == generator.mnemonic() {
                for option in &config.options {
                    generator.configure(option)?;
                }
            }
        }
    }

    generator.start(out)?;

    if !merge_imports {
        let mut announced: Vec<&str> = Vec::new();
        for id in types.named_types() {
            if let Some(loc) = types[id].location() {
                if loc.is_import && !announced.contains(&&*loc.file) {
                    generator.visit_import(out, &loc.file)?;
                    announced.push(&loc.file);
                }
            }
        }
    }

    for id in types.named_types() {
        let imported = types[id].location().is_some_and(|l| l.is_import);
        if imported && !merge_imports {
            continue;
        }
        match &types[id] {
            TypeDef::Integer(_) | TypeDef::Float(_) | TypeDef::Character(_) => {
                generator.visit_primitive(out, types, id)?;
            }
            TypeDef::Enum(_) => generator.visit_enum(out, types, id)?,
            TypeDef::Struct(_) => generator.visit_struct(out, types, id)?,
            _ => {}
        }
    }

    for constant in types.constants() {
        if constant.location.is_import && !merge_imports {
            continue;
        }
        generator.visit_constant(out, &constant.name, constant.value)?;
    }

    generator.finish(out, types)?;
    Ok(())
}
