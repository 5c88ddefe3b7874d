// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared across the compiler pipeline.
//!
//! Two taxa exist: [ParseError] for anything the schema front end rejects
//! (lexing, syntax, constant-expression evaluation, imports, generator
//! options) and [TypeError] for everything the type system and the layout
//! engine reject. Both render as a single `file(line): message` line where
//! a source location is known.

use crate::location::SourceLocation;
use thiserror::Error;

/// Error raised by the tokenizer, parser, expression evaluator, and
/// generator option dispatch.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{location}: {message}")]
pub struct ParseError {
    pub location: SourceLocation,
    pub message: String,
}

impl ParseError {
    pub fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

/// Error raised while building the type system or laying out a value tree.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TypeError {
    #[error("{0}: duplicate type name {1}")]
    DuplicateType(SourceLocation, String),
    #[error("{0}: duplicate struct member {1}")]
    DuplicateMember(SourceLocation, String),
    #[error("{0}: duplicate enum member {1}")]
    DuplicateEnumMember(SourceLocation, String),
    #[error("{0}: redefinition of constant '{1}'")]
    DuplicateConstant(SourceLocation, String),
    #[error("{0}: undefined type '{1}'")]
    UndefinedType(SourceLocation, String),
    #[error("{0}: undefined constant '{1}'")]
    UndefinedConstant(SourceLocation, String),
    #[error("{0}: unknown namespace '{1}'")]
    UnknownNamespace(SourceLocation, String),
    #[error("{0}: unknown identifier '{1}'")]
    UnknownIdentifier(SourceLocation, String),
    #[error("{0}: void type is not instantiatable")]
    VoidInstantiated(SourceLocation),
    #[error("{0}: struct {1} has multiple base options")]
    MultipleBase(SourceLocation, String),
    #[error("{0}: {1}")]
    BadBase(SourceLocation, String),
    #[error("{0}: recursive structure not allowed")]
    RecursiveStruct(SourceLocation),
    #[error("{0}: recursive base chain through struct {1}")]
    RecursiveBase(SourceLocation, String),
    #[error("{0}: array dimension {1} is out of range")]
    BadArrayDim(SourceLocation, i64),
    #[error("{0}: unresolved import reached the type system")]
    ImportNotInlined(SourceLocation),

    #[error("value {value} is out of range for datatype {name} (min: {min}, max: {max})")]
    ValueOutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{pointer} cannot point to {value}")]
    IncompatiblePointer { pointer: String, value: String },
    #[error("{value} cannot be assigned to {expected}")]
    IncompatibleValue { expected: String, value: String },
    #[error("expected array of length {expected}; got {actual} items")]
    WrongArrayLength { expected: usize, actual: usize },
    #[error("character value must be a single-byte string")]
    BadCharacterValue,
    #[error("cannot serialize {0}: character sizes wider than one byte are unsupported")]
    WideCharacter(String),
    #[error("enum {name} has no member {member}")]
    UnknownEnumMember { name: String, member: String },
    #[error("enum {name} member {member} value {value} does not fit in 32 bits")]
    EnumValueOutOfRange {
        name: String,
        member: String,
        value: i64,
    },
    #[error("{name} serialized to {actual} bytes; expected {expected}")]
    SizeMismatch {
        name: String,
        actual: u64,
        expected: u64,
    },
    #[error("type {0} has no machine size or alignment")]
    Unsized(String),
    #[error("blob offset {0} does not fit in 32 bits")]
    OffsetOverflow(u64),
}

/// Unified error for the whole pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
