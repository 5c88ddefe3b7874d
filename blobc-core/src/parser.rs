// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recursive-descent schema parser and import resolution.
//!
//! The parser consumes a [Lexer] token stream and emits the raw parse
//! tree of [crate::ast]. Imports are resolved depth-first through an
//! [ImportProvider]; each file is loaded at most once, keyed by the path
//! the provider resolved it to.

use crate::ast::{
    BinOp, Expr, Item, NamedOption, OptionParam, OptionValue, PrimitiveClass, RawConstant, RawEnum,
    RawEnumMember, RawGeneratorConfig, RawImport, RawPrimitive, RawStruct, RawStructMember, RawType,
};
use crate::error::{ParseError, Result};
use crate::lexer::{Lexer, Punct, Token};
use crate::location::SourceLocation;
use log::debug;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self { lexer }
    }

    fn loc(&mut self) -> Result<SourceLocation, ParseError> {
        self.lexer.peek()?;
        Ok(self.lexer.location())
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(self.lexer.error(message))
    }

    fn accept_punct(&mut self, p: Punct) -> Result<bool, ParseError> {
        if *self.lexer.peek()? == Token::Punct(p) {
            self.lexer.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn accept_word(&mut self, word: &str) -> Result<bool, ParseError> {
        if matches!(self.lexer.peek()?, Token::Word(w) if w == word) {
            self.lexer.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn accept_any_word(&mut self) -> Result<Option<String>, ParseError> {
        if matches!(self.lexer.peek()?, Token::Word(_)) {
            match self.lexer.next_token()? {
                Token::Word(w) => Ok(Some(w)),
                _ => unreachable!("peeked a word"),
            }
        } else {
            Ok(None)
        }
    }

    fn accept_int(&mut self) -> Result<Option<i64>, ParseError> {
        if let Token::Int(v) = *self.lexer.peek()? {
            self.lexer.next_token()?;
            Ok(Some(v))
        } else {
            Ok(None)
        }
    }

    fn accept_string(&mut self) -> Result<Option<String>, ParseError> {
        if matches!(self.lexer.peek()?, Token::Str(_)) {
            match self.lexer.next_token()? {
                Token::Str(s) => Ok(Some(s)),
                _ => unreachable!("peeked a string"),
            }
        } else {
            Ok(None)
        }
    }

    fn expect_word(&mut self) -> Result<String, ParseError> {
        match self.lexer.next_token()? {
            Token::Word(w) => Ok(w),
            other => self.error(format!("expected identifier but got {}", other.describe())),
        }
    }

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        match self.lexer.next_token()? {
            Token::Int(v) => Ok(v),
            other => self.error(format!("expected integer but got {}", other.describe())),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match self.lexer.next_token()? {
            Token::Str(s) => Ok(s),
            other => self.error(format!(
                "expected string literal but got {}",
                other.describe()
            )),
        }
    }

    fn expect_punct(&mut self, p: Punct) -> Result<(), ParseError> {
        match self.lexer.next_token()? {
            Token::Punct(q) if q == p => Ok(()),
            other => self.error(format!("expected '{p}' but got {}", other.describe())),
        }
    }

    /// Parse a whole translation unit.
    pub fn parse_unit(&mut self) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        while *self.lexer.peek()? != Token::Eof {
            items.push(self.parse_toplevel()?);
        }
        Ok(items)
    }

    fn parse_toplevel(&mut self) -> Result<Item, ParseError> {
        if let Some(s) = self.parse_struct()? {
            return Ok(Item::Struct(s));
        }
        if let Some(p) = self.parse_defprimitive()? {
            return Ok(Item::Primitive(p));
        }
        if let Some(e) = self.parse_enum()? {
            return Ok(Item::Enum(e));
        }
        if let Some(c) = self.parse_iconst()? {
            return Ok(Item::Constant(c));
        }
        if let Some(i) = self.parse_import()? {
            return Ok(Item::Import(i));
        }
        if let Some(g) = self.parse_generator_config()? {
            return Ok(Item::GeneratorConfig(g));
        }
        let desc = self.lexer.peek()?.describe();
        self.error(format!(
            "expected struct, defprimitive, enum, iconst, import or generator; have {desc}"
        ))
    }

    fn parse_type(&mut self) -> Result<RawType, ParseError> {
        let loc = self.loc()?;
        let name = self.expect_word()?;
        let mut ty = if name == "void" {
            RawType::Void { location: loc }
        } else if name == "__cstring" {
            self.expect_punct(Punct::Lt)?;
            let base = self.parse_type()?;
            self.expect_punct(Punct::Gt)?;
            RawType::Pointer {
                base: Box::new(base),
                cstring: true,
                location: loc,
            }
        } else {
            RawType::Named {
                name,
                location: loc,
            }
        };

        loop {
            let loc = self.loc()?;
            if self.accept_punct(Punct::Star)? {
                ty = RawType::Pointer {
                    base: Box::new(ty),
                    cstring: false,
                    location: loc,
                };
            } else if self.accept_punct(Punct::LBracket)? {
                let mut dims = vec![self.parse_expr()?];
                while self.accept_punct(Punct::Comma)? {
                    dims.push(self.parse_expr()?);
                }
                self.expect_punct(Punct::RBracket)?;
                ty = RawType::Array {
                    base: Box::new(ty),
                    dims,
                    location: loc,
                };
            } else {
                break;
            }
        }

        if matches!(ty, RawType::Void { .. }) {
            return self.error("void type is not instantiatable");
        }
        Ok(ty)
    }

    fn parse_struct_member(&mut self) -> Result<RawStructMember, ParseError> {
        let loc = self.loc()?;
        let ty = self.parse_type()?;
        let name = self.expect_word()?;
        let options = if self.accept_punct(Punct::Colon)? {
            self.parse_option_list()?
        } else {
            Vec::new()
        };
        self.expect_punct(Punct::Semi)?;
        Ok(RawStructMember {
            ty,
            name,
            options,
            location: loc,
        })
    }

    fn parse_option_param(&mut self) -> Result<Option<OptionParam>, ParseError> {
        let loc = self.loc()?;

        if let Some(key) = self.accept_any_word()? {
            if self.accept_punct(Punct::Assign)? {
                let value = match self.lexer.next_token()? {
                    Token::Int(v) => OptionValue::Int(v),
                    Token::Word(w) => OptionValue::Ident(w),
                    Token::Str(s) => OptionValue::Str(s),
                    other => {
                        return self.error(format!(
                            "expected integer, identifier or string literal but got {}",
                            other.describe()
                        ));
                    }
                };
                return Ok(Some(OptionParam {
                    key: Some(key),
                    value,
                    location: loc,
                }));
            }
            return Ok(Some(OptionParam {
                key: None,
                value: OptionValue::Ident(key),
                location: loc,
            }));
        }
        if let Some(s) = self.accept_string()? {
            return Ok(Some(OptionParam {
                key: None,
                value: OptionValue::Str(s),
                location: loc,
            }));
        }
        if let Some(v) = self.accept_int()? {
            return Ok(Some(OptionParam {
                key: None,
                value: OptionValue::Int(v),
                location: loc,
            }));
        }
        Ok(None)
    }

    fn parse_named_option(&mut self) -> Result<Option<NamedOption>, ParseError> {
        let loc = self.loc()?;
        let name = match self.accept_any_word()? {
            Some(name) => name,
            None => return Ok(None),
        };

        let mut params = Vec::new();
        if self.accept_punct(Punct::LParen)? {
            match self.parse_option_param()? {
                Some(p) => params.push(p),
                None => return self.error("expected option parameter at this point"),
            }
            while self.accept_punct(Punct::Comma)? {
                match self.parse_option_param()? {
                    Some(p) => params.push(p),
                    None => return self.error("expected option parameter at this point"),
                }
            }
            self.expect_punct(Punct::RParen)?;
        }

        Ok(Some(NamedOption {
            name,
            params,
            location: loc,
        }))
    }

    fn parse_option_list(&mut self) -> Result<Vec<NamedOption>, ParseError> {
        let mut options = match self.parse_named_option()? {
            Some(o) => vec![o],
            None => return self.error("expected option at this point"),
        };
        while self.accept_punct(Punct::Comma)? {
            match self.parse_named_option()? {
                Some(o) => options.push(o),
                None => return self.error("expected option at this point"),
            }
        }
        Ok(options)
    }

    fn parse_struct(&mut self) -> Result<Option<RawStruct>, ParseError> {
        if !self.accept_word("struct")? {
            return Ok(None);
        }
        let loc = self.loc()?;
        let name = self.expect_word()?;

        let options = if self.accept_punct(Punct::Colon)? {
            self.parse_option_list()?
        } else {
            Vec::new()
        };

        self.expect_punct(Punct::LBrace)?;
        let mut members = Vec::new();
        while !self.accept_punct(Punct::RBrace)? {
            members.push(self.parse_struct_member()?);
        }
        self.accept_punct(Punct::Semi)?;

        Ok(Some(RawStruct {
            name,
            members,
            options,
            location: loc,
        }))
    }

    fn parse_defprimitive(&mut self) -> Result<Option<RawPrimitive>, ParseError> {
        let loc = self.loc()?;
        if !self.accept_word("defprimitive")? {
            return Ok(None);
        }
        let name = self.expect_word()?;
        let class_name = self.expect_word()?;
        let size = self.expect_int()?;

        let options = if self.accept_punct(Punct::Colon)? {
            self.parse_option_list()?
        } else {
            Vec::new()
        };

        let class = match class_name.as_str() {
            "uint" => PrimitiveClass::Uint,
            "sint" => PrimitiveClass::Sint,
            "float" => PrimitiveClass::Float,
            "character" => PrimitiveClass::Character,
            other => {
                return self.error(format!(
                    "unsupported primitive class {other}; sint, uint, character and float supported"
                ));
            }
        };
        match class {
            PrimitiveClass::Uint | PrimitiveClass::Sint => {
                if !matches!(size, 1 | 2 | 4 | 8) {
                    return self
                        .error(format!("unsupported integer size {size}; 1, 2, 4 and 8 supported"));
                }
            }
            PrimitiveClass::Character => {
                if !matches!(size, 1 | 2 | 4) {
                    return self
                        .error(format!("unsupported character size {size}; 1, 2 and 4 supported"));
                }
            }
            PrimitiveClass::Float => {
                if !matches!(size, 4 | 8) {
                    return self.error(format!(
                        "unsupported floating-point primitive size {size}; 4 and 8 supported"
                    ));
                }
            }
        }

        self.accept_punct(Punct::Semi)?;

        Ok(Some(RawPrimitive {
            name,
            class,
            size: size as u32,
            options,
            location: loc,
        }))
    }

    fn parse_enum_member(&mut self) -> Result<Option<RawEnumMember>, ParseError> {
        let loc = self.loc()?;
        let name = match self.accept_any_word()? {
            Some(name) => name,
            None => return Ok(None),
        };
        let value = if self.accept_punct(Punct::Assign)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Some(RawEnumMember {
            name,
            value,
            location: loc,
        }))
    }

    fn parse_enum(&mut self) -> Result<Option<RawEnum>, ParseError> {
        let loc = self.loc()?;
        if !self.accept_word("enum")? {
            return Ok(None);
        }
        let name = self.expect_word()?;
        self.expect_punct(Punct::LBrace)?;

        // At least one member is required; a trailing comma is allowed.
        let mut members = match self.parse_enum_member()? {
            Some(m) => vec![m],
            None => return self.error("expected enum member at this point"),
        };
        while self.accept_punct(Punct::Comma)? {
            match self.parse_enum_member()? {
                Some(m) => members.push(m),
                None => break,
            }
        }

        self.expect_punct(Punct::RBrace)?;
        self.accept_punct(Punct::Semi)?;

        Ok(Some(RawEnum {
            name,
            members,
            location: loc,
        }))
    }

    fn parse_import(&mut self) -> Result<Option<RawImport>, ParseError> {
        let loc = self.loc()?;
        if !self.accept_word("import")? {
            return Ok(None);
        }
        let file = self.expect_string()?;
        self.accept_punct(Punct::Semi)?;
        Ok(Some(RawImport {
            file,
            location: loc,
        }))
    }

    fn parse_generator_config(&mut self) -> Result<Option<RawGeneratorConfig>, ParseError> {
        let loc = self.loc()?;
        if !self.accept_word("generator")? {
            return Ok(None);
        }
        let generator = self.expect_word()?;
        self.expect_punct(Punct::Colon)?;
        let options = self.parse_option_list()?;
        self.accept_punct(Punct::Semi)?;
        Ok(Some(RawGeneratorConfig {
            generator,
            options,
            location: loc,
        }))
    }

    fn parse_iconst(&mut self) -> Result<Option<RawConstant>, ParseError> {
        let loc = self.loc()?;
        if !self.accept_word("iconst")? {
            return Ok(None);
        }
        let name = self.expect_word()?;
        self.expect_punct(Punct::Assign)?;
        let value = self.parse_expr()?;
        self.accept_punct(Punct::Semi)?;
        Ok(Some(RawConstant {
            name,
            value,
            location: loc,
        }))
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_shift_expr()
    }

    fn parse_shift_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_add_expr()?;
        loop {
            let location = self.loc()?;
            let op = if self.accept_punct(Punct::Shl)? {
                BinOp::Shl
            } else if self.accept_punct(Punct::Shr)? {
                BinOp::Shr
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_add_expr()?;
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location,
            };
        }
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul_expr()?;
        loop {
            let location = self.loc()?;
            let op = if self.accept_punct(Punct::Plus)? {
                BinOp::Add
            } else if self.accept_punct(Punct::Minus)? {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_mul_expr()?;
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location,
            };
        }
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_primary_expr()?;
        loop {
            let location = self.loc()?;
            let op = if self.accept_punct(Punct::Star)? {
                BinOp::Mul
            } else if self.accept_punct(Punct::Slash)? {
                BinOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_primary_expr()?;
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location,
            };
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let location = self.loc()?;

        if let Some(value) = self.accept_int()? {
            return Ok(Expr::IntLit { value, location });
        }
        if self.accept_punct(Punct::LParen)? {
            let expr = self.parse_expr()?;
            self.expect_punct(Punct::RParen)?;
            return Ok(expr);
        }
        if let Some(mut name) = self.accept_any_word()? {
            while self.accept_punct(Punct::Dot)? {
                name.push('.');
                name.push_str(&self.expect_word()?);
            }
            return Ok(Expr::NamedRef { name, location });
        }
        if self.accept_punct(Punct::Minus)? {
            let expr = self.parse_primary_expr()?;
            return Ok(Expr::Neg {
                expr: Box::new(expr),
                location,
            });
        }

        let desc = self.lexer.peek()?.describe();
        self.error(format!(
            "expected int, (expr), name or -expr at this point, have: {desc}"
        ))
    }
}

/// Locates and reads imported schema files.
///
/// Implementations decide what an import name means; the default
/// [DirectoryImports] walks an ordered directory list. Tests can supply
/// an in-memory provider instead of touching the filesystem.
pub trait ImportProvider {
    /// Resolve an import name to a loadable path, or `None` if it does
    /// not exist anywhere the provider looks.
    fn find(&self, name: &str) -> Option<PathBuf>;

    /// Read a previously resolved path.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Describe the search space for "couldn't find" diagnostics.
    fn describe(&self) -> String {
        String::new()
    }
}

/// Import lookup over an ordered list of directories; first match wins.
pub struct DirectoryImports {
    dirs: Vec<PathBuf>,
}

impl DirectoryImports {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// The default search path, just the current directory.
    pub fn current_dir() -> Self {
        Self::new(["."])
    }
}

impl ImportProvider for DirectoryImports {
    fn find(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|d| d.join(name))
            .find(|p| p.exists())
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn describe(&self) -> String {
        let dirs: Vec<_> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        dirs.join(", ")
    }
}

/// Parse driver holding the per-compile import memo.
pub struct ParseContext<'p> {
    provider: &'p dyn ImportProvider,
    resolve_imports: bool,
    // Keyed by the path the provider resolved, not a canonical path: two
    // spellings of one file load twice.
    loaded: HashSet<PathBuf>,
}

impl<'p> ParseContext<'p> {
    pub fn new(provider: &'p dyn ImportProvider, resolve_imports: bool) -> Self {
        Self {
            provider,
            resolve_imports,
            loaded: HashSet::new(),
        }
    }

    pub fn parse_path(&mut self, path: &Path, is_import: bool) -> Result<Vec<Item>> {
        debug!("parsing {}", path.display());
        self.loaded.insert(path.to_owned());
        let text = self.provider.read(path)?;
        self.parse_source(&path.display().to_string(), &text, is_import)
    }

    pub fn parse_source(&mut self, name: &str, text: &str, is_import: bool) -> Result<Vec<Item>> {
        let lexer = Lexer::new(name, text, is_import);
        let items = Parser::new(lexer).parse_unit()?;
        if !self.resolve_imports {
            return Ok(items);
        }

        let mut out = Vec::new();
        for item in items {
            match item {
                Item::Import(import) => {
                    let path = match self.provider.find(&import.file) {
                        Some(path) => path,
                        None => {
                            return Err(ParseError::new(
                                import.location,
                                format!(
                                    "couldn't find '{}' in any of [{}]",
                                    import.file,
                                    self.provider.describe()
                                ),
                            )
                            .into());
                        }
                    };
                    if !self.loaded.contains(&path) {
                        out.extend(self.parse_path(&path, true)?);
                    }
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }
}

/// Parse schema text without import resolution. Items are located in a
/// file called `<string>`.
pub fn parse_string(text: &str) -> Result<Vec<Item>> {
    let no_imports = DirectoryImports::new(Vec::<PathBuf>::new());
    let mut ctx = ParseContext::new(&no_imports, false);
    ctx.parse_source("<string>", text, false)
}

/// Parse a schema file, inlining imports through the given provider.
pub fn parse_file(path: impl AsRef<Path>, provider: &dyn ImportProvider) -> Result<Vec<Item>> {
    let mut ctx = ParseContext::new(provider, true);
    ctx.parse_path(path.as_ref(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;

    fn parse(src: &str) -> Vec<Item> {
        parse_string(src).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        match parse_string(src).unwrap_err() {
            Error::Parse(p) => p,
            other => panic!("expected a parse error, got {other}"),
        }
    }

    fn prim(src: &str) -> RawPrimitive {
        let items = parse(src);
        assert_eq!(items.len(), 1);
        match items.into_iter().next().unwrap() {
            Item::Primitive(p) => p,
            other => panic!("expected a primitive, parsed {other:?}"),
        }
    }

    fn one_struct(src: &str) -> RawStruct {
        let items = parse(src);
        assert_eq!(items.len(), 1);
        match items.into_iter().next().unwrap() {
            Item::Struct(s) => s,
            other => panic!("expected a struct, parsed {other:?}"),
        }
    }

    fn one_const(src: &str) -> RawConstant {
        match parse(src).into_iter().next().unwrap() {
            Item::Constant(c) => c,
            other => panic!("expected a constant, parsed {other:?}"),
        }
    }

    #[test]
    fn primitive_classes_and_sizes() {
        for size in [1u32, 2, 4, 8] {
            let p = prim(&format!("defprimitive foo sint {size}\n"));
            assert_eq!(p.name, "foo");
            assert_eq!(p.class, PrimitiveClass::Sint);
            assert_eq!(p.size, size);

            let p = prim(&format!("defprimitive bar uint {size}\n"));
            assert_eq!(p.class, PrimitiveClass::Uint);
        }
        for size in [1u32, 2, 4] {
            assert_eq!(
                prim(&format!("defprimitive c character {size}")).class,
                PrimitiveClass::Character
            );
        }
        for size in [4u32, 8] {
            assert_eq!(
                prim(&format!("defprimitive f float {size}")).class,
                PrimitiveClass::Float
            );
        }
    }

    #[test]
    fn illegal_primitive_sizes() {
        assert!(parse_string("defprimitive foo sint 3").is_err());
        assert!(parse_string("defprimitive foo uint 9").is_err());
        assert!(parse_string("defprimitive foo float 1").is_err());
        assert!(parse_string("defprimitive foo character 8").is_err());
        assert!(parse_string("defprimitive foo sint -1").is_err());
    }

    #[test]
    fn unknown_primitive_class() {
        let err = parse_err("defprimitive foo complex 8");
        assert!(err.message.contains("unsupported primitive class"));
    }

    #[test]
    fn empty_struct() {
        let s = one_struct("struct foo {}");
        assert_eq!(s.name, "foo");
        assert!(s.members.is_empty());
    }

    #[test]
    fn self_referencing_pointer_member_parses() {
        let s = one_struct("struct foo { foo* field; }");
        assert_eq!(s.members[0].name, "field");
        assert!(matches!(s.members[0].ty, RawType::Pointer { .. }));
    }

    #[test]
    fn member_type_forms() {
        let items = parse(
            "defprimitive u32 uint 4;
             struct foo {
                 u32 a;          // simple field
                 u32* b;         // pointer
                 u32[1] c;       // one-dimensional array
                 u32[1,2,3] d;   // multi-dimensional array
             }",
        );
        assert_eq!(items.len(), 2);
        let s = match &items[1] {
            Item::Struct(s) => s,
            other => panic!("expected a struct, parsed {other:?}"),
        };
        assert!(matches!(s.members[0].ty, RawType::Named { .. }));
        assert!(matches!(s.members[1].ty, RawType::Pointer { .. }));
        assert!(matches!(s.members[2].ty, RawType::Array { .. }));
        match &s.members[3].ty {
            RawType::Array { dims, .. } => assert_eq!(dims.len(), 3),
            other => panic!("expected an array, parsed {other:?}"),
        }
    }

    #[test]
    fn empty_enum_is_rejected() {
        assert!(parse_string("enum foo { }").is_err());
    }

    #[test]
    fn enum_member_values_are_optional() {
        let items = parse("enum foo { bar }");
        let e = match &items[0] {
            Item::Enum(e) => e,
            other => panic!("expected an enum, parsed {other:?}"),
        };
        assert_eq!(e.members.len(), 1);
        assert_eq!(e.members[0].name, "bar");
        assert!(e.members[0].value.is_none());
    }

    #[test]
    fn enum_trailing_comma() {
        let items = parse("enum foo { bar, }");
        let e = match &items[0] {
            Item::Enum(e) => e,
            other => panic!("expected an enum, parsed {other:?}"),
        };
        assert_eq!(e.members.len(), 1);
    }

    #[test]
    fn enum_multiple_members() {
        let items = parse("enum foo { bar, baz }");
        let e = match &items[0] {
            Item::Enum(e) => e,
            other => panic!("expected an enum, parsed {other:?}"),
        };
        assert_eq!(e.members[0].name, "bar");
        assert_eq!(e.members[1].name, "baz");
    }

    #[test]
    fn enum_assigned_values() {
        let items = parse("enum foo { bar = 7, baz = 7 }");
        let e = match &items[0] {
            Item::Enum(e) => e,
            other => panic!("expected an enum, parsed {other:?}"),
        };
        assert!(matches!(
            e.members[0].value,
            Some(Expr::IntLit { value: 7, .. })
        ));
        assert!(matches!(e.members[1].value, Some(_)));
    }

    #[test]
    fn bare_option() {
        let s = one_struct("struct foo : fiskrens { }");
        let opts: Vec<_> = crate::ast::options_named(&s.options, "fiskrens").collect();
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].positional().count(), 0);
    }

    #[test]
    fn option_with_positional_param() {
        let s = one_struct(r#"struct foo : fiskrens("bar") { }"#);
        let opts: Vec<_> = crate::ast::options_named(&s.options, "fiskrens").collect();
        let params: Vec<_> = opts[0].positional().collect();
        assert_eq!(params, vec![&OptionValue::Str("bar".to_owned())]);
    }

    #[test]
    fn option_with_keyed_param() {
        let s = one_struct("struct foo : fiskrens(bar=yep) { }");
        let opts: Vec<_> = crate::ast::options_named(&s.options, "fiskrens").collect();
        assert_eq!(opts[0].positional().count(), 0);
        assert_eq!(
            opts[0].keyed("bar"),
            Some(&OptionValue::Ident("yep".to_owned()))
        );
    }

    #[test]
    fn option_with_mixed_params() {
        let s = one_struct(
            r#"struct foo :
                   a("foo", bar=89, baz=tjoho),
                   qux,
                   qux(visst="serru")
               { }"#,
        );
        let a: Vec<_> = crate::ast::options_named(&s.options, "a").collect();
        assert_eq!(a.len(), 1);
        assert_eq!(
            a[0].positional().collect::<Vec<_>>(),
            vec![&OptionValue::Str("foo".to_owned())]
        );
        assert_eq!(a[0].keyed("bar"), Some(&OptionValue::Int(89)));
        assert_eq!(a[0].keyed("baz"), Some(&OptionValue::Ident("tjoho".to_owned())));

        let qux: Vec<_> = crate::ast::options_named(&s.options, "qux").collect();
        assert_eq!(qux.len(), 2);
        assert_eq!(qux[0].positional().count(), 0);
        assert_eq!(
            qux[1].keyed("visst"),
            Some(&OptionValue::Str("serru".to_owned()))
        );
    }

    #[test]
    fn member_options() {
        let s = one_struct(
            r#"struct foo {
                   void *foo : foo, bar("foo", a="another string");
               }"#,
        );
        let m = &s.members[0];
        let foo: Vec<_> = crate::ast::options_named(&m.options, "foo").collect();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].positional().count(), 0);

        let bar: Vec<_> = crate::ast::options_named(&m.options, "bar").collect();
        assert_eq!(
            bar[0].positional().collect::<Vec<_>>(),
            vec![&OptionValue::Str("foo".to_owned())]
        );
        assert_eq!(
            bar[0].keyed("a"),
            Some(&OptionValue::Str("another string".to_owned()))
        );
    }

    #[test]
    fn import_statement() {
        let items = parse(r#"import "foo/bar""#);
        match &items[0] {
            Item::Import(i) => assert_eq!(i.file, "foo/bar"),
            other => panic!("expected an import, parsed {other:?}"),
        }
    }

    #[test]
    fn generator_config() {
        let items = parse(
            r#"generator foo : pretty_print(flavor="fiskrens", tabsize=4);
               generator bar : other_setting, foo(1, 2, a, b, c);"#,
        );
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Item::GeneratorConfig(_)));
        assert!(matches!(items[1], Item::GeneratorConfig(_)));
    }

    #[test]
    fn standalone_void_is_rejected() {
        let err = parse_err("struct foo { void foo; }");
        assert_eq!(err.message, "void type is not instantiatable");
    }

    #[test]
    fn void_pointer_is_fine() {
        let s = one_struct("struct foo { void *foo; }");
        match &s.members[0].ty {
            RawType::Pointer { base, cstring, .. } => {
                assert!(!cstring);
                assert!(matches!(**base, RawType::Void { .. }));
            }
            other => panic!("expected a pointer, parsed {other:?}"),
        }
    }

    #[test]
    fn cstring_member() {
        let s = one_struct("struct foo { __cstring<char> a; }");
        match &s.members[0].ty {
            RawType::Pointer { base, cstring, .. } => {
                assert!(cstring);
                assert!(matches!(**base, RawType::Named { ref name, .. } if name == "char"));
            }
            other => panic!("expected a pointer, parsed {other:?}"),
        }
    }

    #[test]
    fn cstring_array() {
        let s = one_struct("struct foo { __cstring<char>[4] a; }");
        match &s.members[0].ty {
            RawType::Array { base, .. } => {
                assert!(matches!(**base, RawType::Pointer { cstring: true, .. }));
            }
            other => panic!("expected an array, parsed {other:?}"),
        }
    }

    #[test]
    fn iconst_literal() {
        let c = one_const("iconst a = 7;");
        assert_eq!(c.name, "a");
        assert!(matches!(c.value, Expr::IntLit { value: 7, .. }));
    }

    #[test]
    fn unary_negation() {
        let c = one_const("iconst a = -7");
        match &c.value {
            Expr::Neg { expr, .. } => {
                assert!(matches!(**expr, Expr::IntLit { value: 7, .. }));
            }
            other => panic!("expected a negation, parsed {other:?}"),
        }
    }

    #[test]
    fn binary_operators() {
        for (src, op) in [
            ("iconst a = b + 1;", BinOp::Add),
            ("iconst a = b - 1;", BinOp::Sub),
            ("iconst a = b * 1;", BinOp::Mul),
            ("iconst a = b / 1;", BinOp::Div),
            ("iconst a = b << 1;", BinOp::Shl),
            ("iconst a = b >> 1;", BinOp::Shr),
        ] {
            let c = one_const(src);
            match &c.value {
                Expr::BinOp {
                    op: parsed,
                    lhs,
                    rhs,
                    ..
                } => {
                    assert_eq!(*parsed, op);
                    assert!(matches!(**lhs, Expr::NamedRef { .. }));
                    assert!(matches!(**rhs, Expr::IntLit { .. }));
                }
                other => panic!("expected a binop, parsed {other:?}"),
            }
        }
    }

    #[test]
    fn precedence_mul_before_add() {
        let c = one_const("iconst a = 7 * 2 + 5;");
        match &c.value {
            Expr::BinOp { op, lhs, rhs, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(**lhs, Expr::BinOp { op: BinOp::Mul, .. }));
                assert!(matches!(**rhs, Expr::IntLit { .. }));
            }
            other => panic!("expected a binop, parsed {other:?}"),
        }

        let c = one_const("iconst a = 7 + 2 * 5;");
        match &c.value {
            Expr::BinOp { op, lhs, rhs, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(**lhs, Expr::IntLit { .. }));
                assert!(matches!(**rhs, Expr::BinOp { op: BinOp::Mul, .. }));
            }
            other => panic!("expected a binop, parsed {other:?}"),
        }
    }

    #[test]
    fn parens_override_precedence() {
        let c = one_const("iconst a = (7 + 2) * 5;");
        match &c.value {
            Expr::BinOp { op, lhs, rhs, .. } => {
                assert_eq!(*op, BinOp::Mul);
                assert!(matches!(**lhs, Expr::BinOp { op: BinOp::Add, .. }));
                assert!(matches!(**rhs, Expr::IntLit { .. }));
            }
            other => panic!("expected a binop, parsed {other:?}"),
        }
    }

    #[test]
    fn complex_expression_shape() {
        let c = one_const("iconst a = foo << -x + (y << a * b)");
        let Expr::BinOp { op, lhs, rhs, .. } = &c.value else {
            panic!("expected a binop");
        };
        assert_eq!(*op, BinOp::Shl);
        assert!(matches!(**lhs, Expr::NamedRef { ref name, .. } if name == "foo"));

        let Expr::BinOp { op, lhs, rhs, .. } = &**rhs else {
            panic!("expected a binop rhs");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(**lhs, Expr::Neg { .. }));
        assert!(matches!(**rhs, Expr::BinOp { op: BinOp::Shl, .. }));
    }

    #[test]
    fn dotted_names_collapse_into_one_reference() {
        let c = one_const("iconst a = Foo.Bar + 1;");
        match &c.value {
            Expr::BinOp { lhs, .. } => {
                assert!(matches!(**lhs, Expr::NamedRef { ref name, .. } if name == "Foo.Bar"));
            }
            other => panic!("expected a binop, parsed {other:?}"),
        }
    }

    struct MemoryImports(HashMap<&'static str, &'static str>);

    impl ImportProvider for MemoryImports {
        fn find(&self, name: &str) -> Option<PathBuf> {
            self.0.contains_key(name).then(|| PathBuf::from(name))
        }

        fn read(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(path.to_str().unwrap_or_default())
                .map(|s| (*s).to_owned())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn describe(&self) -> String {
            "<memory>".to_owned()
        }
    }

    #[test]
    fn imports_are_inlined_and_flagged() {
        let provider = MemoryImports(HashMap::from([
            ("main", "import \"dep\"\nstruct foo { bar* b; }"),
            ("dep", "struct bar {}"),
        ]));
        let items = parse_file("main", &provider).unwrap();
        assert_eq!(items.len(), 2);
        match &items[0] {
            Item::Struct(s) => {
                assert_eq!(s.name, "bar");
                assert!(s.location.is_import);
            }
            other => panic!("expected a struct, parsed {other:?}"),
        }
        match &items[1] {
            Item::Struct(s) => {
                assert_eq!(s.name, "foo");
                assert!(!s.location.is_import);
            }
            other => panic!("expected a struct, parsed {other:?}"),
        }
    }

    #[test]
    fn repeated_imports_load_once() {
        let provider = MemoryImports(HashMap::from([
            ("main", "import \"a\"\nimport \"b\""),
            ("a", "import \"b\"\nstruct in_a {}"),
            ("b", "struct in_b {}"),
        ]));
        let items = parse_file("main", &provider).unwrap();
        let names: Vec<_> = items
            .iter()
            .map(|i| match i {
                Item::Struct(s) => s.name.as_str(),
                other => panic!("expected a struct, parsed {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["in_b", "in_a"]);
    }

    #[test]
    fn missing_import_is_diagnosed() {
        let provider = MemoryImports(HashMap::from([("main", "import \"gone\"")]));
        let err = match parse_file("main", &provider).unwrap_err() {
            Error::Parse(p) => p,
            other => panic!("expected a parse error, got {other}"),
        };
        assert_eq!(err.message, "couldn't find 'gone' in any of [<memory>]");
    }

    #[test]
    fn directory_imports_walk_the_search_path() {
        use std::fs;
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("schemas");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("types.blob"), "defprimitive u32 uint 4;").unwrap();
        let main = dir.path().join("main.blob");
        fs::write(&main, "import \"types.blob\"\nstruct foo { u32 a; }").unwrap();

        let provider = DirectoryImports::new([dir.path().to_owned(), sub]);
        let items = parse_file(&main, &provider).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].location().is_import);
        assert!(!items[1].location().is_import);
    }
}
