// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolved type system.
//!
//! Types live in an id-indexed registry. Pointer, cstring, and array
//! types are interned there, keyed on their base type (and dimension), so
//! two uses of `T*` resolve to the same [TypeId]. Building runs four
//! passes over the parse tree:
//!
//! 1. declare named types;
//! 2. evaluate enum members and integer constants in source order;
//! 3. resolve struct members, flattening `base(...)` inheritance;
//! 4. reject structs that contain themselves by value.

use crate::ast::{options_named, Item, OptionValue, PrimitiveClass, RawEnum, RawStruct, RawType};
use crate::error::{Result, TypeError};
use crate::expr::evaluate;
use crate::location::SourceLocation;
use crate::scope::{ScopeId, ScopeTree};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::ops::Index;

/// Index of a resolved type in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

#[derive(Clone, Debug)]
pub struct IntegerDef {
    pub name: String,
    pub size: u32,
    pub signed: bool,
    pub location: SourceLocation,
}

impl IntegerDef {
    pub fn min_value(&self) -> i64 {
        if self.signed {
            i64::MIN >> (64 - self.size * 8)
        } else {
            0
        }
    }

    /// Largest representable value. Unsigned 8-byte integers are capped
    /// at `i64::MAX` since values are carried as `i64`.
    pub fn max_value(&self) -> i64 {
        if self.signed {
            i64::MAX >> (64 - self.size * 8)
        } else if self.size == 8 {
            i64::MAX
        } else {
            (1i64 << (self.size * 8)) - 1
        }
    }
}

#[derive(Clone, Debug)]
pub struct FloatDef {
    pub name: String,
    pub size: u32,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct CharacterDef {
    pub name: String,
    pub size: u32,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub scope: ScopeId,
    pub location: SourceLocation,
}

impl EnumDef {
    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    /// Inherited members first, in base declaration order.
    pub members: Vec<StructMember>,
    pub base: Option<TypeId>,
    pub location: SourceLocation,
}

#[derive(Clone, Debug)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeId,
    pub options: Vec<crate::ast::NamedOption>,
    pub location: SourceLocation,
}

#[derive(Clone, Copy, Debug)]
pub struct PointerDef {
    pub target: TypeId,
    pub cstring: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ArrayDef {
    pub elem: TypeId,
    pub dim: usize,
}

#[derive(Clone, Debug)]
pub enum TypeDef {
    Void,
    Integer(IntegerDef),
    Float(FloatDef),
    Character(CharacterDef),
    Enum(EnumDef),
    Struct(StructDef),
    Pointer(PointerDef),
    Array(ArrayDef),
}

impl TypeDef {
    /// Location of the declaration, for named types.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Integer(d) => Some(&d.location),
            Self::Float(d) => Some(&d.location),
            Self::Character(d) => Some(&d.location),
            Self::Enum(d) => Some(&d.location),
            Self::Struct(d) => Some(&d.location),
            Self::Void | Self::Pointer(_) | Self::Array(_) => None,
        }
    }
}

/// A named `iconst` definition.
#[derive(Clone, Debug)]
pub struct Constant {
    pub name: String,
    pub value: i64,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct TypeSystem {
    types: Vec<TypeDef>,
    names: HashMap<String, TypeId>,
    /// Named types in declaration order, imports first where imported.
    decl_order: Vec<TypeId>,
    pointers: HashMap<TypeId, TypeId>,
    cstrings: HashMap<TypeId, TypeId>,
    arrays: HashMap<(TypeId, usize), TypeId>,
    scopes: ScopeTree,
    constants: Vec<Constant>,
    void: TypeId,
}

impl Index<TypeId> for TypeSystem {
    type Output = TypeDef;

    fn index(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0 as usize]
    }
}

impl TypeSystem {
    /// Build a type system from a parse tree with imports already inlined.
    pub fn compile(items: &[Item]) -> Result<Self> {
        let mut ts = Self {
            types: vec![TypeDef::Void],
            names: HashMap::new(),
            decl_order: Vec::new(),
            pointers: HashMap::new(),
            cstrings: HashMap::new(),
            arrays: HashMap::new(),
            scopes: ScopeTree::new(),
            constants: Vec::new(),
            void: TypeId(0),
        };

        // Pass 1: declare names so member resolution can see forward
        // references.
        for item in items {
            match item {
                Item::Primitive(p) => {
                    let def = match p.class {
                        PrimitiveClass::Uint => TypeDef::Integer(IntegerDef {
                            name: p.name.clone(),
                            size: p.size,
                            signed: false,
                            location: p.location.clone(),
                        }),
                        PrimitiveClass::Sint => TypeDef::Integer(IntegerDef {
                            name: p.name.clone(),
                            size: p.size,
                            signed: true,
                            location: p.location.clone(),
                        }),
                        PrimitiveClass::Float => TypeDef::Float(FloatDef {
                            name: p.name.clone(),
                            size: p.size,
                            location: p.location.clone(),
                        }),
                        PrimitiveClass::Character => TypeDef::Character(CharacterDef {
                            name: p.name.clone(),
                            size: p.size,
                            location: p.location.clone(),
                        }),
                    };
                    ts.declare(&p.name, &p.location, def)?;
                }
                Item::Struct(s) => {
                    ts.declare(
                        &s.name,
                        &s.location,
                        TypeDef::Struct(StructDef {
                            name: s.name.clone(),
                            members: Vec::new(),
                            base: None,
                            location: s.location.clone(),
                        }),
                    )?;
                }
                Item::Enum(e) => {
                    let scope = ts.scopes.new_child(ts.scopes.root(), &e.name);
                    ts.declare(
                        &e.name,
                        &e.location,
                        TypeDef::Enum(EnumDef {
                            name: e.name.clone(),
                            members: Vec::new(),
                            scope,
                            location: e.location.clone(),
                        }),
                    )?;
                }
                Item::Import(i) => {
                    return Err(TypeError::ImportNotInlined(i.location.clone()).into());
                }
                Item::Constant(_) | Item::GeneratorConfig(_) => {}
            }
        }
        debug!("declared {} named types", ts.decl_order.len());

        // Pass 2: one source-order walk over enums and constants, so
        // later definitions may reference earlier ones.
        for item in items {
            match item {
                Item::Enum(e) => ts.build_enum(e)?,
                Item::Constant(c) => {
                    let root = ts.scopes.root();
                    let value = evaluate(&c.value, &ts.scopes, root)?;
                    if !ts.scopes.define(root, &c.name, value) {
                        return Err(
                            TypeError::DuplicateConstant(c.location.clone(), c.name.clone()).into(),
                        );
                    }
                    ts.constants.push(Constant {
                        name: c.name.clone(),
                        value,
                        location: c.location.clone(),
                    });
                }
                _ => {}
            }
        }

        // Pass 3: resolve struct members; bases resolve on demand so a
        // base may be declared after its derived struct.
        let raw_structs: HashMap<&str, &RawStruct> = items
            .iter()
            .filter_map(|i| match i {
                Item::Struct(s) => Some((s.name.as_str(), s)),
                _ => None,
            })
            .collect();
        let mut done = HashSet::new();
        let mut in_progress = Vec::new();
        for item in items {
            if let Item::Struct(s) = item {
                ts.resolve_struct(s, &raw_structs, &mut done, &mut in_progress)?;
            }
        }

        // Pass 4: by-value recursion check.
        ts.check_recursion()?;

        Ok(ts)
    }

    fn declare(&mut self, name: &str, loc: &SourceLocation, def: TypeDef) -> Result<TypeId> {
        if self.names.contains_key(name) {
            return Err(TypeError::DuplicateType(loc.clone(), name.to_owned()).into());
        }
        let id = self.push(def);
        self.names.insert(name.to_owned(), id);
        self.decl_order.push(id);
        Ok(id)
    }

    fn push(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(def);
        id
    }

    fn build_enum(&mut self, e: &RawEnum) -> Result<()> {
        let id = self.expect_named(&e.name);
        let scope = match &self[id] {
            TypeDef::Enum(d) => d.scope,
            _ => unreachable!("pass 1 registered {} as an enum", e.name),
        };

        let mut members = Vec::with_capacity(e.members.len());
        let mut prev = None;
        for m in &e.members {
            let value = match &m.value {
                Some(expr) => evaluate(expr, &self.scopes, scope)?,
                None => prev.map_or(0, |p: i64| p.wrapping_add(1)),
            };
            if !self.scopes.define(scope, &m.name, value) {
                return Err(
                    TypeError::DuplicateEnumMember(m.location.clone(), m.name.clone()).into(),
                );
            }
            members.push(EnumMember {
                name: m.name.clone(),
                value,
            });
            prev = Some(value);
        }

        if let TypeDef::Enum(d) = &mut self.types[id.0 as usize] {
            d.members = members;
        }
        Ok(())
    }

    fn resolve_struct(
        &mut self,
        raw: &RawStruct,
        raw_structs: &HashMap<&str, &RawStruct>,
        done: &mut HashSet<TypeId>,
        in_progress: &mut Vec<TypeId>,
    ) -> Result<()> {
        let id = self.expect_named(&raw.name);
        if done.contains(&id) {
            return Ok(());
        }
        if in_progress.contains(&id) {
            return Err(TypeError::RecursiveBase(raw.location.clone(), raw.name.clone()).into());
        }
        in_progress.push(id);

        let mut members: Vec<StructMember> = Vec::new();
        let mut base = None;

        let mut base_opts = options_named(&raw.options, "base");
        if let Some(opt) = base_opts.next() {
            if base_opts.next().is_some() {
                return Err(TypeError::MultipleBase(opt.location.clone(), raw.name.clone()).into());
            }
            let positional: Vec<_> = opt.positional().collect();
            let base_name = match positional.as_slice() {
                [OptionValue::Ident(n)] if opt.params.len() == 1 => n.as_str(),
                _ => {
                    return Err(TypeError::BadBase(
                        opt.location.clone(),
                        "option base takes a single struct name".to_owned(),
                    )
                    .into());
                }
            };

            if self.names.get(base_name).is_none() {
                return Err(
                    TypeError::UndefinedType(opt.location.clone(), base_name.to_owned()).into(),
                );
            }
            let base_raw = match raw_structs.get(base_name) {
                Some(b) => *b,
                None => {
                    return Err(TypeError::BadBase(
                        opt.location.clone(),
                        format!("base '{base_name}' is not a struct"),
                    )
                    .into());
                }
            };
            self.resolve_struct(base_raw, raw_structs, done, in_progress)?;

            let base_id = self.expect_named(base_name);
            if let TypeDef::Struct(d) = &self[base_id] {
                members.extend(d.members.iter().cloned());
            }
            base = Some(base_id);
        }

        for m in &raw.members {
            let ty = self.resolve_raw_type(&m.ty)?;
            if members.iter().any(|existing| existing.name == m.name) {
                return Err(TypeError::DuplicateMember(m.location.clone(), m.name.clone()).into());
            }
            members.push(StructMember {
                name: m.name.clone(),
                ty,
                options: m.options.clone(),
                location: m.location.clone(),
            });
        }

        in_progress.pop();
        done.insert(id);
        if let TypeDef::Struct(d) = &mut self.types[id.0 as usize] {
            d.members = members;
            d.base = base;
        }
        Ok(())
    }

    fn resolve_raw_type(&mut self, raw: &RawType) -> Result<TypeId> {
        match raw {
            RawType::Void { .. } => Ok(self.void),
            RawType::Named { name, location } => {
                self.names.get(name).copied().ok_or_else(|| {
                    TypeError::UndefinedType(location.clone(), name.clone()).into()
                })
            }
            RawType::Pointer { base, cstring, .. } => {
                let b = self.resolve_raw_type(base)?;
                Ok(if *cstring {
                    self.cstring_type(b)
                } else {
                    self.pointer_type(b)
                })
            }
            RawType::Array {
                base,
                dims,
                location,
            } => {
                let mut ty = self.resolve_raw_type(base)?;
                if ty == self.void {
                    return Err(TypeError::VoidInstantiated(location.clone()).into());
                }
                for dim in dims {
                    let value = evaluate(dim, &self.scopes, self.scopes.root())?;
                    if value < 0 || value > u32::MAX as i64 {
                        return Err(TypeError::BadArrayDim(location.clone(), value).into());
                    }
                    ty = self.array_type(ty, value as usize);
                }
                Ok(ty)
            }
        }
    }

    fn check_recursion(&self) -> Result<()> {
        let mut stack = Vec::new();
        for &id in &self.decl_order {
            if matches!(self[id], TypeDef::Struct(_)) {
                self.check_struct_recursion(id, &mut stack)?;
            }
        }
        Ok(())
    }

    fn check_struct_recursion(&self, id: TypeId, stack: &mut Vec<TypeId>) -> Result<()> {
        stack.push(id);
        if let TypeDef::Struct(def) = &self[id] {
            for m in &def.members {
                // Arrays contain by value; pointers do not.
                let mut ty = m.ty;
                while let TypeDef::Array(a) = &self[ty] {
                    ty = a.elem;
                }
                if matches!(self[ty], TypeDef::Struct(_)) {
                    if stack.contains(&ty) {
                        return Err(TypeError::RecursiveStruct(m.location.clone()).into());
                    }
                    self.check_struct_recursion(ty, stack)?;
                }
            }
        }
        stack.pop();
        Ok(())
    }

    fn expect_named(&self, name: &str) -> TypeId {
        *self
            .names
            .get(name)
            .unwrap_or_else(|| unreachable!("{name} was declared in pass 1"))
    }

    /// The unique `T*` for a base type.
    pub fn pointer_type(&mut self, base: TypeId) -> TypeId {
        if let Some(&id) = self.pointers.get(&base) {
            return id;
        }
        let id = self.push(TypeDef::Pointer(PointerDef {
            target: base,
            cstring: false,
        }));
        self.pointers.insert(base, id);
        id
    }

    /// The unique `__cstring<T>` for a character type; distinct from `T*`.
    pub fn cstring_type(&mut self, base: TypeId) -> TypeId {
        if let Some(&id) = self.cstrings.get(&base) {
            return id;
        }
        let id = self.push(TypeDef::Pointer(PointerDef {
            target: base,
            cstring: true,
        }));
        self.cstrings.insert(base, id);
        id
    }

    /// The unique `T[dim]` for a base type and dimension.
    pub fn array_type(&mut self, elem: TypeId, dim: usize) -> TypeId {
        if let Some(&id) = self.arrays.get(&(elem, dim)) {
            return id;
        }
        let id = self.push(TypeDef::Array(ArrayDef { elem, dim }));
        self.arrays.insert((elem, dim), id);
        id
    }

    pub fn void(&self) -> TypeId {
        self.void
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Named types in declaration order.
    pub fn named_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.decl_order.iter().copied()
    }

    /// `iconst` definitions in source order.
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    /// True when `sub` has `sup` somewhere along its base chain
    /// (reflexively).
    pub fn is_superset_of(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut cursor = Some(sub);
        while let Some(id) = cursor {
            if id == sup {
                return true;
            }
            cursor = match &self[id] {
                TypeDef::Struct(d) => d.base,
                _ => None,
            };
        }
        false
    }

    /// Whether a `target*` pointer may aim at a value of type `value_ty`.
    pub fn can_point_to(&self, target: TypeId, value_ty: TypeId) -> bool {
        if matches!(self[target], TypeDef::Void) || target == value_ty {
            return true;
        }
        matches!(
            (&self[target], &self[value_ty]),
            (TypeDef::Struct(_), TypeDef::Struct(_))
        ) && self.is_superset_of(value_ty, target)
    }

    /// Human-readable spelling of a type for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        match &self[id] {
            TypeDef::Void => "void".to_owned(),
            TypeDef::Integer(d) => d.name.clone(),
            TypeDef::Float(d) => d.name.clone(),
            TypeDef::Character(d) => d.name.clone(),
            TypeDef::Enum(d) => format!("enum {}", d.name),
            TypeDef::Struct(d) => format!("struct {}", d.name),
            TypeDef::Pointer(p) if p.cstring => {
                format!("__cstring<{}>", self.display(p.target))
            }
            TypeDef::Pointer(p) => format!("{}*", self.display(p.target)),
            TypeDef::Array(a) => format!("{}[{}]", self.display(a.elem), a.dim),
        }
    }
}
