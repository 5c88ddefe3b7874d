// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Source locations for diagnostics.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Where a token, parse-tree node, or resolved type came from.
///
/// Locations are threaded through every parse-tree and type-system node.
/// The `is_import` flag marks items that entered through an `import`
/// statement; code generators use it to decide what to redeclare.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
    pub is_import: bool,
}

impl SourceLocation {
    pub fn new(file: Arc<str>, line: u32, is_import: bool) -> Self {
        Self {
            file,
            line,
            is_import,
        }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.file, self.line)
    }
}
