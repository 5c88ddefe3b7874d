// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Schema compiler and binary blob layout engine.
//!
//! This crate compiles a textual schema language describing primitive
//! types, enumerations, integer constants, and records into a resolved
//! type system, and lays out in-memory value trees as self-contained
//! binary blobs for a target machine of chosen endianness and pointer
//! width. It also drives code generators that emit host-language
//! declarations matching the binary layout.
//!
//! # Pipeline
//!
//! 1. [parse_string] / [parse_file] tokenize and parse schema text into
//!    the raw tree of [ast]; `import` statements are inlined depth-first
//!    through an [ImportProvider], with inlined items flagged
//!    `is_import`.
//! 2. [TypeSystem::compile] resolves the tree: named types are
//!    registered once, pointer/array/cstring types are interned per base
//!    type, enum members and `iconst`s evaluate in a scope tree, struct
//!    `base(...)` inheritance is flattened, and by-value recursion is
//!    rejected.
//! 3. [layout] serializes a root struct [Value] for a [TargetMachine],
//!    returning the blob bytes and a relocation table.
//! 4. [codegen::generate] walks the type system with a language
//!    generator such as [codegen::CGenerator].
//!
//! # Blob format
//!
//! The blob is a flat byte sequence with `0xFD` alignment padding.
//! Pointer cells occupy the machine's pointer size at their natural
//! position and hold absolute offsets from the start of the blob. The
//! relocation table is a packed sequence of unsigned 32-bit offsets in
//! the target endianness, one per pointer cell; a consumer maps the blob
//! at some base address and adds the base to each listed cell. There is
//! no framing header, checksum, or magic.
//!
//! # Errors
//!
//! The schema front end raises [ParseError]; the type system and layout
//! engine raise [TypeError]. Both are terminal for the operation that
//! produced them and render as one `file(line): message` diagnostic
//! where a source position exists.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod expr;
pub mod layout;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod scope;
pub mod target;
pub mod typesys;
pub mod value;

pub use error::{Error, ParseError, Result, TypeError};
pub use layout::{layout, Serializer};
pub use location::SourceLocation;
pub use parser::{parse_file, parse_string, DirectoryImports, ImportProvider};
pub use target::{Endian, TargetMachine};
pub use typesys::{TypeId, TypeSystem};
pub use value::{ArrayValue, StructValue, Value};
