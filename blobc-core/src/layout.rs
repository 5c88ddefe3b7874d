// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary layout engine.
//!
//! The serializer walks a value tree under the direction of its static
//! types and emits a flat byte blob plus a relocation table. Writes go to
//! an ordered list of blocks: block 0 is the primary; a pointer target
//! serializes into an overflow block via `divert`/`resume` so the current
//! write is not interrupted. `freeze` concatenates the blocks, patches
//! every pointer cell with its target's absolute offset, and emits one
//! 32-bit source offset per patched cell.
//!
//! Alignment padding uses `0xFD`, a noisy sentinel that surfaces
//! misaligned reads in consumers.

use crate::error::{Error, Result, TypeError};
use crate::target::{align_up, Endian, TargetMachine};
use crate::typesys::{TypeDef, TypeId, TypeSystem};
use crate::value::{ArrayValue, StructValue, Value};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use log::debug;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const PAD_BYTE: u8 = 0xfd;

/// Identity handle for a serialized (or pending) value.
///
/// Equality and hashing follow the underlying allocation, not the value
/// contents; the handle keeps its datum alive for the serializer's
/// lifetime.
#[derive(Clone)]
enum Datum {
    Struct(Rc<StructValue>),
    Array(Rc<ArrayValue>),
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Struct(a), Self::Struct(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Struct(rc) => (0u8, Rc::as_ptr(rc) as usize).hash(state),
            Self::Array(rc) => (1u8, Rc::as_ptr(rc) as usize).hash(state),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Position {
    block: usize,
    offset: usize,
}

/// Where a relocation aims. Only array values can be pending: struct
/// targets serialize eagerly at first use, after which later pointers
/// find them placed.
enum RelocTarget {
    Placed(Position),
    Pending(Rc<ArrayValue>),
}

struct Reloc {
    src: Position,
    target: RelocTarget,
    /// Byte offset added to the target position (element pointers).
    extra: u64,
}

pub struct Serializer<'a> {
    types: &'a TypeSystem,
    machine: &'a TargetMachine,
    blocks: Vec<BytesMut>,
    block_index: usize,
    locations: HashMap<Datum, Position>,
    relocs: Vec<Reloc>,
    unresolved: bool,
}

impl<'a> Serializer<'a> {
    pub fn new(types: &'a TypeSystem, machine: &'a TargetMachine) -> Self {
        Self {
            types,
            machine,
            blocks: vec![BytesMut::new()],
            block_index: 0,
            locations: HashMap::new(),
            relocs: Vec::new(),
            unresolved: false,
        }
    }

    fn block(&mut self) -> &mut BytesMut {
        &mut self.blocks[self.block_index]
    }

    fn here(&self) -> Position {
        Position {
            block: self.block_index,
            offset: self.blocks[self.block_index].len(),
        }
    }

    /// Switch writes to the next block, appending one if needed.
    fn divert(&mut self) -> Position {
        self.block_index += 1;
        if self.blocks.len() <= self.block_index {
            self.blocks.push(BytesMut::new());
        }
        self.here()
    }

    fn resume(&mut self) {
        debug_assert!(self.block_index > 0, "resume without a matching divert");
        self.block_index -= 1;
    }

    fn align(&mut self, alignment: u64) {
        let len = self.blocks[self.block_index].len() as u64;
        let pad = align_up(len, alignment) - len;
        if pad > 0 {
            self.block().put_bytes(PAD_BYTE, pad as usize);
        }
    }

    fn write(&mut self, data: &[u8]) {
        self.block().put_slice(data);
    }

    fn write_null_ptr(&mut self) {
        let n = self.machine.pointer_size() as usize;
        self.block().put_bytes(0, n);
    }

    fn write_ptr(&mut self, target: RelocTarget, extra: u64) {
        self.relocs.push(Reloc {
            src: self.here(),
            target,
            extra,
        });
        self.write_null_ptr();
    }

    /// Record the current position as a datum's canonical address. The
    /// first placement wins; offset pointers aim at the first copy.
    fn update_location(&mut self, datum: Datum) {
        let here = self.here();
        self.locations.entry(datum).or_insert(here);
    }

    fn put_uint(&mut self, value: u64, size: usize) {
        let masked = if size == 8 {
            value
        } else {
            value & ((1u64 << (size * 8)) - 1)
        };
        let mut buf = [0u8; 8];
        match self.machine.endian() {
            Endian::Big => BigEndian::write_uint(&mut buf[..size], masked, size),
            Endian::Little => LittleEndian::write_uint(&mut buf[..size], masked, size),
        }
        self.write(&buf[..size]);
    }

    fn put_f32(&mut self, value: f32) {
        let mut buf = [0u8; 4];
        match self.machine.endian() {
            Endian::Big => BigEndian::write_f32(&mut buf, value),
            Endian::Little => LittleEndian::write_f32(&mut buf, value),
        }
        self.write(&buf);
    }

    fn put_f64(&mut self, value: f64) {
        let mut buf = [0u8; 8];
        match self.machine.endian() {
            Endian::Big => BigEndian::write_f64(&mut buf, value),
            Endian::Little => LittleEndian::write_f64(&mut buf, value),
        }
        self.write(&buf);
    }

    fn mismatch(&self, expected: TypeId, value: &Value) -> Error {
        TypeError::IncompatibleValue {
            expected: self.types.display(expected),
            value: value.describe().to_owned(),
        }
        .into()
    }

    /// Serialize one value as a given static type.
    pub fn serialize_value(&mut self, ty: TypeId, value: &Value) -> Result<()> {
        let types = self.types;
        match &types[ty] {
            TypeDef::Void => Err(self.mismatch(ty, value)),
            TypeDef::Integer(d) => {
                let v = match value {
                    Value::Int(v) => *v,
                    other => return Err(self.mismatch(ty, other)),
                };
                if v < d.min_value() || v > d.max_value() {
                    return Err(TypeError::ValueOutOfRange {
                        name: d.name.clone(),
                        value: v,
                        min: d.min_value(),
                        max: d.max_value(),
                    }
                    .into());
                }
                self.align(u64::from(d.size));
                self.put_uint(v as u64, d.size as usize);
                Ok(())
            }
            TypeDef::Float(d) => {
                let v = match value {
                    Value::Float(v) => *v,
                    Value::Int(v) => *v as f64,
                    other => return Err(self.mismatch(ty, other)),
                };
                self.align(u64::from(d.size));
                if d.size == 4 {
                    self.put_f32(v as f32);
                } else {
                    self.put_f64(v);
                }
                Ok(())
            }
            TypeDef::Character(d) => {
                if d.size != 1 {
                    return Err(TypeError::WideCharacter(d.name.clone()).into());
                }
                let byte = match value {
                    Value::Char(b) => *b,
                    Value::Str(s) if s.len() == 1 => s.as_bytes()[0],
                    Value::Str(_) => return Err(TypeError::BadCharacterValue.into()),
                    other => return Err(self.mismatch(ty, other)),
                };
                // Characters are written in place, no alignment.
                self.write(&[byte]);
                Ok(())
            }
            TypeDef::Enum(d) => {
                let member = match value {
                    Value::Enum(member) => member,
                    other => return Err(self.mismatch(ty, other)),
                };
                let v = match d.member(member) {
                    Some(m) => m.value,
                    None => {
                        return Err(TypeError::UnknownEnumMember {
                            name: d.name.clone(),
                            member: member.clone(),
                        }
                        .into());
                    }
                };
                if v < 0 || v > i64::from(u32::MAX) {
                    return Err(TypeError::EnumValueOutOfRange {
                        name: d.name.clone(),
                        member: member.clone(),
                        value: v,
                    }
                    .into());
                }
                // Enum cells flow naturally; padding comes from the
                // surrounding layout.
                self.put_uint(v as u64, 4);
                Ok(())
            }
            TypeDef::Struct(_) => match value {
                Value::Struct(rc) => self.serialize_struct(ty, rc.clone()),
                other => Err(self.mismatch(ty, other)),
            },
            TypeDef::Array(a) => match value {
                Value::Array(rc) => {
                    if rc.items.len() != a.dim {
                        return Err(TypeError::WrongArrayLength {
                            expected: a.dim,
                            actual: rc.items.len(),
                        }
                        .into());
                    }
                    if rc.item_type != a.elem {
                        return Err(self.mismatch(ty, value));
                    }
                    self.serialize_array(&rc.clone())
                }
                other => Err(self.mismatch(ty, other)),
            },
            TypeDef::Pointer(_) => self.serialize_pointer(ty, value),
        }
    }

    /// Serialize a struct value as a given (possibly ancestor) struct
    /// type.
    pub fn serialize_struct(&mut self, ty: TypeId, value: Rc<StructValue>) -> Result<()> {
        let types = self.types;
        let def = match &types[ty] {
            TypeDef::Struct(d) => d,
            _ => {
                return Err(TypeError::Unsized(types.display(ty)).into());
            }
        };
        if value.ty() != ty && !types.is_superset_of(value.ty(), ty) {
            return Err(TypeError::IncompatibleValue {
                expected: types.display(ty),
                value: types.display(value.ty()),
            }
            .into());
        }

        let layout = self.machine.struct_layout(types, ty)?;
        self.align(layout.align);
        let start = self.here();
        self.update_location(Datum::Struct(value.clone()));

        for member in &def.members {
            match value.field(&member.name) {
                Some(v) => self.serialize_value(member.ty, v)?,
                None => self.serialize_default(member.ty)?,
            }
        }

        let end = self.here();
        let actual = (end.offset - start.offset) as u64;
        if actual != layout.size {
            return Err(TypeError::SizeMismatch {
                name: def.name.clone(),
                actual,
                expected: layout.size,
            }
            .into());
        }
        Ok(())
    }

    fn serialize_array(&mut self, value: &Rc<ArrayValue>) -> Result<()> {
        let align = self.machine.align_of(self.types, value.item_type)?;
        self.align(align);
        self.update_location(Datum::Array(value.clone()));
        for item in &value.items {
            self.serialize_value(value.item_type, item)?;
        }
        Ok(())
    }

    /// All-zero value for a member that was not assigned: integers,
    /// floats, and characters are 0, pointers null, enums their first
    /// member, aggregates element-wise defaults.
    fn serialize_default(&mut self, ty: TypeId) -> Result<()> {
        let types = self.types;
        match &types[ty] {
            TypeDef::Void => Err(TypeError::Unsized(types.display(ty)).into()),
            TypeDef::Integer(d) => {
                self.align(u64::from(d.size));
                self.put_uint(0, d.size as usize);
                Ok(())
            }
            TypeDef::Float(d) => {
                self.align(u64::from(d.size));
                if d.size == 4 {
                    self.put_f32(0.0);
                } else {
                    self.put_f64(0.0);
                }
                Ok(())
            }
            TypeDef::Character(d) => {
                if d.size != 1 {
                    return Err(TypeError::WideCharacter(d.name.clone()).into());
                }
                self.write(&[0]);
                Ok(())
            }
            TypeDef::Enum(d) => {
                let v = d.members.first().map_or(0, |m| m.value);
                self.put_uint(v as u64, 4);
                Ok(())
            }
            TypeDef::Pointer(_) => {
                self.write_null_ptr();
                Ok(())
            }
            TypeDef::Array(a) => {
                let (elem, dim) = (a.elem, a.dim);
                let align = self.machine.align_of(types, elem)?;
                self.align(align);
                for _ in 0..dim {
                    self.serialize_default(elem)?;
                }
                Ok(())
            }
            TypeDef::Struct(def) => {
                let layout = self.machine.struct_layout(types, ty)?;
                self.align(layout.align);
                let start = self.here();
                for member in &def.members {
                    self.serialize_default(member.ty)?;
                }
                let actual = (self.here().offset - start.offset) as u64;
                if actual != layout.size {
                    return Err(TypeError::SizeMismatch {
                        name: def.name.clone(),
                        actual,
                        expected: layout.size,
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    fn serialize_pointer(&mut self, ptr_ty: TypeId, value: &Value) -> Result<()> {
        let types = self.types;
        let ptr = match &types[ptr_ty] {
            TypeDef::Pointer(p) => *p,
            _ => return Err(self.mismatch(ptr_ty, value)),
        };

        let incompatible = |value_desc: String| -> Error {
            TypeError::IncompatiblePointer {
                pointer: types.display(ptr_ty),
                value: value_desc,
            }
            .into()
        };

        match value {
            Value::Null => {
                self.write_null_ptr();
                Ok(())
            }
            Value::Array(rc) => {
                if !types.can_point_to(ptr.target, rc.item_type) {
                    return Err(incompatible(format!(
                        "array of {}",
                        types.display(rc.item_type)
                    )));
                }
                let datum = Datum::Array(rc.clone());
                let pos = match self.locations.get(&datum) {
                    Some(&pos) => pos,
                    None if rc.items.is_empty() => {
                        self.divert();
                        let pos = self.here();
                        self.resume();
                        pos
                    }
                    None => {
                        self.divert();
                        self.serialize_array(rc)?;
                        self.resume();
                        self.placed(&datum)
                    }
                };
                self.write_ptr(RelocTarget::Placed(pos), 0);
                Ok(())
            }
            Value::Struct(rc) => {
                if !types.can_point_to(ptr.target, rc.ty()) {
                    return Err(incompatible(types.display(rc.ty())));
                }
                let datum = Datum::Struct(rc.clone());
                let pos = match self.locations.get(&datum) {
                    Some(&pos) => pos,
                    None => {
                        self.divert();
                        // Serialize as the value's own type; a base-typed
                        // pointer still sees its prefix.
                        self.serialize_struct(rc.ty(), rc.clone())?;
                        self.resume();
                        self.placed(&datum)
                    }
                };
                self.write_ptr(RelocTarget::Placed(pos), 0);
                Ok(())
            }
            Value::Element(rc, index) => {
                if !types.can_point_to(ptr.target, rc.item_type) {
                    return Err(incompatible(format!(
                        "element of {} array",
                        types.display(rc.item_type)
                    )));
                }
                let stride = self.machine.size_of(types, rc.item_type)?;
                let extra = *index as u64 * stride;
                let datum = Datum::Array(rc.clone());
                match self.locations.get(&datum) {
                    Some(&pos) => self.write_ptr(RelocTarget::Placed(pos), extra),
                    None => {
                        self.unresolved = true;
                        self.write_ptr(RelocTarget::Pending(rc.clone()), extra);
                    }
                }
                Ok(())
            }
            Value::Str(text) => {
                if !ptr.cstring {
                    return Err(incompatible("string literal".to_owned()));
                }
                let wrapped = Rc::new(ArrayValue {
                    item_type: ptr.target,
                    items: text
                        .bytes()
                        .chain(std::iter::once(0))
                        .map(Value::Char)
                        .collect(),
                });
                self.divert();
                self.serialize_array(&wrapped)?;
                self.resume();
                let pos = self.placed(&Datum::Array(wrapped));
                self.write_ptr(RelocTarget::Placed(pos), 0);
                Ok(())
            }
            other => Err(incompatible(other.describe().to_owned())),
        }
    }

    fn placed(&self, datum: &Datum) -> Position {
        *self
            .locations
            .get(datum)
            .unwrap_or_else(|| unreachable!("datum was serialized just above"))
    }

    /// Commit pending pointer targets, concatenate the blocks, patch
    /// every pointer cell, and emit the relocation stream.
    pub fn freeze(mut self) -> Result<(Bytes, Bytes)> {
        // Serializing one pending datum can introduce more pending
        // relocations; indexed iteration tolerates the list growing.
        while self.unresolved {
            self.unresolved = false;
            let mut i = 0;
            while i < self.relocs.len() {
                if let RelocTarget::Pending(rc) = &self.relocs[i].target {
                    let rc = rc.clone();
                    let datum = Datum::Array(rc.clone());
                    let pos = match self.locations.get(&datum) {
                        Some(&pos) => pos,
                        None => {
                            self.serialize_array(&rc)?;
                            self.placed(&datum)
                        }
                    };
                    self.relocs[i].target = RelocTarget::Placed(pos);
                }
                i += 1;
            }
        }

        let mut bases = Vec::with_capacity(self.blocks.len());
        let mut total = 0usize;
        for block in &self.blocks {
            bases.push(total as u64);
            total += block.len();
        }
        let mut blob = BytesMut::with_capacity(total);
        for block in &self.blocks {
            blob.put_slice(block);
        }

        let pointer_size = self.machine.pointer_size() as usize;
        let mut reloc_stream = BytesMut::with_capacity(self.relocs.len() * 4);
        for reloc in &self.relocs {
            let dst = match &reloc.target {
                RelocTarget::Placed(pos) => pos,
                RelocTarget::Pending(_) => unreachable!("pending relocations were committed"),
            };
            let abs_dst = bases[dst.block] + dst.offset as u64 + reloc.extra;
            let abs_src = bases[reloc.src.block] + reloc.src.offset as u64;

            let cell = &mut blob[abs_src as usize..abs_src as usize + pointer_size];
            match self.machine.endian() {
                Endian::Big => BigEndian::write_uint(cell, abs_dst, pointer_size),
                Endian::Little => LittleEndian::write_uint(cell, abs_dst, pointer_size),
            }

            let src32 =
                u32::try_from(abs_src).map_err(|_| TypeError::OffsetOverflow(abs_src))?;
            let mut buf = [0u8; 4];
            match self.machine.endian() {
                Endian::Big => BigEndian::write_u32(&mut buf, src32),
                Endian::Little => LittleEndian::write_u32(&mut buf, src32),
            }
            reloc_stream.put_slice(&buf);
        }

        debug!(
            "froze {} blocks into {} bytes with {} relocations",
            self.blocks.len(),
            total,
            self.relocs.len()
        );
        Ok((blob.freeze(), reloc_stream.freeze()))
    }
}

/// Lay out a root struct value for a target machine, returning the blob
/// and its relocation table.
pub fn layout(
    types: &TypeSystem,
    machine: &TargetMachine,
    root: &Value,
) -> Result<(Bytes, Bytes)> {
    let rc = match root {
        Value::Struct(rc) => rc.clone(),
        other => {
            return Err(TypeError::IncompatibleValue {
                expected: "struct".to_owned(),
                value: other.describe().to_owned(),
            }
            .into());
        }
    };
    let mut serializer = Serializer::new(types, machine);
    serializer.serialize_struct(rc.ty(), rc)?;
    serializer.freeze()
}
