// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory value trees fed to the layout engine.
//!
//! Struct and array values are held behind [Rc] handles so the
//! serializer can track them by identity: a pointer into an array
//! ([Value::Element]) references the same allocation as the array value
//! it indexes, and two pointers at one struct resolve to one serialized
//! copy.

use crate::typesys::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Char(u8),
    /// Reference to an enum member by name; resolved against the field's
    /// static enum type at serialization time.
    Enum(String),
    /// String literal for a `__cstring<T>` field; wrapped as a
    /// NUL-terminated character array during layout.
    Str(String),
    Null,
    Struct(Rc<StructValue>),
    Array(Rc<ArrayValue>),
    /// Pointer at element `index` of an array value.
    Element(Rc<ArrayValue>, usize),
}

impl Value {
    pub fn struct_value(value: StructValue) -> Self {
        Self::Struct(Rc::new(value))
    }

    /// An array value carrying its element type, so it can serve as a
    /// pointer target even behind a `void*`.
    pub fn array(item_type: TypeId, items: Vec<Value>) -> Self {
        Self::Array(Rc::new(ArrayValue { item_type, items }))
    }

    /// A shared NUL-terminated character array built from a string.
    ///
    /// The result can be assigned to a cstring field and indexed with
    /// [Value::element] for substring pointers.
    pub fn cstring(char_type: TypeId, text: &str) -> Self {
        let items = text
            .bytes()
            .chain(std::iter::once(0))
            .map(Value::Char)
            .collect();
        Self::Array(Rc::new(ArrayValue {
            item_type: char_type,
            items,
        }))
    }

    /// Pointer into this array value, or `None` when the value is not an
    /// array.
    pub fn element(&self, index: usize) -> Option<Self> {
        match self {
            Self::Array(rc) => Some(Self::Element(rc.clone(), index)),
            _ => None,
        }
    }

    /// Short description of the value's kind for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Char(_) => "character",
            Self::Enum(_) => "enum member",
            Self::Str(_) => "string literal",
            Self::Null => "null",
            Self::Struct(_) => "struct value",
            Self::Array(_) => "array value",
            Self::Element(_, _) => "array element pointer",
        }
    }
}

/// A record value; fields missing from the map serialize as defaults.
#[derive(Debug)]
pub struct StructValue {
    ty: TypeId,
    fields: HashMap<String, Value>,
}

impl StructValue {
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            fields: HashMap::new(),
        }
    }

    pub fn ty(&self) -> TypeId {
        self.ty
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Chainable form of [StructValue::set] for building literals.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug)]
pub struct ArrayValue {
    pub item_type: TypeId,
    pub items: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_string;
    use crate::typesys::TypeSystem;

    #[test]
    fn cstring_appends_a_nul() {
        let ts = TypeSystem::compile(
            &parse_string("defprimitive char8 character 1;").unwrap(),
        )
        .unwrap();
        let v = Value::cstring(ts.lookup("char8").unwrap(), "hi");
        match v {
            Value::Array(arr) => {
                assert_eq!(arr.items.len(), 3);
                assert!(matches!(arr.items[2], Value::Char(0)));
            }
            other => panic!("expected an array, got {other:?}"),
        }
    }

    #[test]
    fn element_shares_identity_with_its_array() {
        let ts = TypeSystem::compile(&parse_string("defprimitive u32 uint 4;").unwrap()).unwrap();
        let arr = Value::array(ts.lookup("u32").unwrap(), vec![Value::Int(1)]);
        let elem = arr.element(0).unwrap();
        match (&arr, &elem) {
            (Value::Array(a), Value::Element(b, 0)) => assert!(Rc::ptr_eq(a, b)),
            other => panic!("unexpected value shapes: {other:?}"),
        }
    }

    #[test]
    fn element_of_non_array_is_none() {
        assert!(Value::Int(3).element(0).is_none());
    }
}
