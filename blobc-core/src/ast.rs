// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parse tree emitted by the schema parser.
//!
//! Everything here is "raw": names are unresolved strings and sizes are
//! whatever the source said. The type system builder in [crate::typesys]
//! turns these into resolved, interned types.

use crate::location::SourceLocation;

/// A top-level schema item.
#[derive(Clone, Debug)]
pub enum Item {
    Primitive(RawPrimitive),
    Struct(RawStruct),
    Enum(RawEnum),
    Constant(RawConstant),
    Import(RawImport),
    GeneratorConfig(RawGeneratorConfig),
}

impl Item {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Primitive(p) => &p.location,
            Self::Struct(s) => &s.location,
            Self::Enum(e) => &e.location,
            Self::Constant(c) => &c.location,
            Self::Import(i) => &i.location,
            Self::GeneratorConfig(g) => &g.location,
        }
    }
}

/// Primitive class accepted by `defprimitive`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveClass {
    Uint,
    Sint,
    Float,
    Character,
}

#[derive(Clone, Debug)]
pub struct RawPrimitive {
    pub name: String,
    pub class: PrimitiveClass,
    pub size: u32,
    pub options: Vec<NamedOption>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct RawStruct {
    pub name: String,
    pub members: Vec<RawStructMember>,
    pub options: Vec<NamedOption>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct RawStructMember {
    pub ty: RawType,
    pub name: String,
    pub options: Vec<NamedOption>,
    pub location: SourceLocation,
}

/// An unresolved member type.
#[derive(Clone, Debug)]
pub enum RawType {
    Void {
        location: SourceLocation,
    },
    Named {
        name: String,
        location: SourceLocation,
    },
    Pointer {
        base: Box<RawType>,
        cstring: bool,
        location: SourceLocation,
    },
    Array {
        base: Box<RawType>,
        dims: Vec<Expr>,
        location: SourceLocation,
    },
}

impl RawType {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Void { location }
            | Self::Named { location, .. }
            | Self::Pointer { location, .. }
            | Self::Array { location, .. } => location,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RawEnum {
    pub name: String,
    pub members: Vec<RawEnumMember>,
    pub location: SourceLocation,
}

/// Enum member; a `None` value means "previous member plus one" (zero for
/// the first member), assigned by the type builder.
#[derive(Clone, Debug)]
pub struct RawEnumMember {
    pub name: String,
    pub value: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct RawConstant {
    pub name: String,
    pub value: Expr,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct RawImport {
    pub file: String,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct RawGeneratorConfig {
    pub generator: String,
    pub options: Vec<NamedOption>,
    pub location: SourceLocation,
}

/// `name` or `name(param, ...)` attached to a declaration.
#[derive(Clone, Debug)]
pub struct NamedOption {
    pub name: String,
    pub params: Vec<OptionParam>,
    pub location: SourceLocation,
}

impl NamedOption {
    /// Positional (un-keyed) parameter values, in order.
    pub fn positional(&self) -> impl Iterator<Item = &OptionValue> {
        self.params
            .iter()
            .filter(|p| p.key.is_none())
            .map(|p| &p.value)
    }

    /// Value of a `key=value` parameter, if present.
    pub fn keyed(&self, key: &str) -> Option<&OptionValue> {
        self.params
            .iter()
            .find(|p| p.key.as_deref() == Some(key))
            .map(|p| &p.value)
    }
}

/// Select all options with a given name from an option list.
pub fn options_named<'a>(
    options: &'a [NamedOption],
    name: &'a str,
) -> impl Iterator<Item = &'a NamedOption> {
    options.iter().filter(move |o| o.name == name)
}

#[derive(Clone, Debug)]
pub struct OptionParam {
    pub key: Option<String>,
    pub value: OptionValue,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Int(i64),
    Ident(String),
    Str(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ident(s) | Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

/// Binary operators, C-like precedence (mul over add over shift).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
}

/// Integer constant expression.
#[derive(Clone, Debug)]
pub enum Expr {
    IntLit {
        value: i64,
        location: SourceLocation,
    },
    /// A possibly dotted reference such as `Enum.Member`.
    NamedRef {
        name: String,
        location: SourceLocation,
    },
    Neg {
        expr: Box<Expr>,
        location: SourceLocation,
    },
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        location: SourceLocation,
    },
}

impl Expr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::IntLit { location, .. }
            | Self::NamedRef { location, .. }
            | Self::Neg { location, .. }
            | Self::BinOp { location, .. } => location,
        }
    }
}
