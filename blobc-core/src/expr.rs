// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integer constant expression evaluation.
//!
//! Expressions use two's-complement `i64` semantics throughout; shifts
//! wrap their count modulo 64. Division by zero is a [ParseError] at the
//! operator's location, undefined names are [TypeError]s.

use crate::ast::{BinOp, Expr};
use crate::error::{Error, ParseError, TypeError};
use crate::scope::{ScopeId, ScopeTree};

pub fn evaluate(expr: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Result<i64, Error> {
    match expr {
        Expr::IntLit { value, .. } => Ok(*value),
        Expr::NamedRef { name, location } => {
            if name.contains('.') {
                Ok(scopes.lookup_dotted(name, location)?)
            } else {
                scopes.lookup_upward(scope, name).ok_or_else(|| {
                    TypeError::UndefinedConstant(location.clone(), name.clone()).into()
                })
            }
        }
        Expr::Neg { expr, .. } => Ok(evaluate(expr, scopes, scope)?.wrapping_neg()),
        Expr::BinOp {
            op,
            lhs,
            rhs,
            location,
        } => {
            let l = evaluate(lhs, scopes, scope)?;
            let r = evaluate(rhs, scopes, scope)?;
            match op {
                BinOp::Add => Ok(l.wrapping_add(r)),
                BinOp::Sub => Ok(l.wrapping_sub(r)),
                BinOp::Mul => Ok(l.wrapping_mul(r)),
                BinOp::Div => {
                    if r == 0 {
                        Err(ParseError::new(location.clone(), "division by zero").into())
                    } else {
                        Ok(l.wrapping_div(r))
                    }
                }
                BinOp::Shl => Ok(l.wrapping_shl(r as u32)),
                BinOp::Shr => Ok(l.wrapping_shr(r as u32)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_string;

    fn eval_const(src: &str) -> Result<i64, Error> {
        let items = parse_string(src)?;
        let scopes = ScopeTree::new();
        match &items[0] {
            crate::ast::Item::Constant(c) => evaluate(&c.value, &scopes, scopes.root()),
            other => panic!("expected a constant, parsed {other:?}"),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval_const("iconst v = 17 + 3;").unwrap(), 20);
        assert_eq!(eval_const("iconst v = 17 + -17;").unwrap(), 0);
        assert_eq!(eval_const("iconst v = 17 - 3;").unwrap(), 14);
        assert_eq!(eval_const("iconst v = -17 - 17;").unwrap(), -34);
        assert_eq!(eval_const("iconst v = 6 * 7;").unwrap(), 42);
        assert_eq!(eval_const("iconst v = 7 / 2;").unwrap(), 3);
    }

    #[test]
    fn shifts() {
        assert_eq!(eval_const("iconst v = 1 << 4;").unwrap(), 16);
        assert_eq!(eval_const("iconst v = 256 >> 4;").unwrap(), 16);
    }

    #[test]
    fn precedence_binds_mul_tighter() {
        assert_eq!(eval_const("iconst v = 7 * 2 + 5;").unwrap(), 19);
        assert_eq!(eval_const("iconst v = 7 + 2 * 5;").unwrap(), 17);
        assert_eq!(eval_const("iconst v = (7 + 2) * 5;").unwrap(), 45);
        assert_eq!(eval_const("iconst v = 1 << 1 + 1;").unwrap(), 4);
    }

    #[test]
    fn division_by_zero_is_a_parse_error() {
        let err = eval_const("iconst v = 1 / 0;").unwrap_err();
        match err {
            Error::Parse(p) => assert_eq!(p.message, "division by zero"),
            other => panic!("expected a parse error, got {other}"),
        }
    }

    #[test]
    fn undefined_constant() {
        let err = eval_const("iconst v = nope;").unwrap_err();
        assert!(matches!(
            err,
            Error::Type(TypeError::UndefinedConstant(_, ref n)) if n == "nope"
        ));
    }

    #[test]
    fn dotted_reference_resolves_from_root() {
        let mut scopes = ScopeTree::new();
        let child = scopes.new_child(scopes.root(), "Foo");
        assert!(scopes.define(child, "Bar", 10));

        let items = parse_string("iconst v = Foo.Bar + 1;").unwrap();
        let expr = match &items[0] {
            crate::ast::Item::Constant(c) => &c.value,
            other => panic!("expected a constant, parsed {other:?}"),
        };
        assert_eq!(evaluate(expr, &scopes, scopes.root()).unwrap(), 11);
    }
}
