// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scope tree for named integer constants.
//!
//! The tree has one root holding global `iconst` definitions; each enum
//! owns a child scope named after the enum. Bare name lookups walk parent
//! links upward; dotted names navigate named children from the root.

use crate::error::TypeError;
use crate::location::SourceLocation;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    /// Definition order matters for code generation.
    values: Vec<(String, i64)>,
    index: HashMap<String, usize>,
    children: HashMap<String, ScopeId>,
}

#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Create a named child scope. A second child with the same name
    /// shadows the first in dotted lookups; the type builder rejects
    /// duplicate enum names before that can matter.
    pub fn new_child(&mut self, parent: ScopeId, name: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        self.scopes[parent.0 as usize]
            .children
            .insert(name.to_owned(), id);
        id
    }

    /// Define a constant in a scope. Returns false if the name already
    /// exists there.
    #[must_use]
    pub fn define(&mut self, id: ScopeId, name: &str, value: i64) -> bool {
        let scope = &mut self.scopes[id.0 as usize];
        if scope.index.contains_key(name) {
            return false;
        }
        scope.index.insert(name.to_owned(), scope.values.len());
        scope.values.push((name.to_owned(), value));
        true
    }

    /// Look a bare name up, walking enclosing scopes toward the root.
    pub fn lookup_upward(&self, id: ScopeId, name: &str) -> Option<i64> {
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if let Some(&slot) = scope.index.get(name) {
                return Some(scope.values[slot].1);
            }
            cursor = scope.parent;
        }
        None
    }

    /// Resolve a dotted path, descending named children from the root.
    pub fn lookup_dotted(&self, path: &str, loc: &SourceLocation) -> Result<i64, TypeError> {
        let mut parts = path.split('.').collect::<Vec<_>>();
        let leaf = parts.pop().expect("split always yields one element");

        let mut scope = self.scope(self.root());
        for part in parts {
            match scope.children.get(part) {
                Some(&child) => scope = self.scope(child),
                None => {
                    return Err(TypeError::UnknownNamespace(loc.clone(), part.to_owned()));
                }
            }
        }
        match scope.index.get(leaf) {
            Some(&slot) => Ok(scope.values[slot].1),
            None => Err(TypeError::UnknownIdentifier(loc.clone(), leaf.to_owned())),
        }
    }

    /// Constants of a scope in definition order.
    pub fn values(&self, id: ScopeId) -> impl Iterator<Item = (&str, i64)> {
        self.scope(id).values.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
