//! # **Host Backend** - *Scalar reference interpreter*
//!
//! Walks the expression tree once per element, applying the shared scalar
//! kernels from [`crate::vm::value`]. Slow by design; it is the reference
//! the vectorized native backend is checked against, and the fallback for
//! operand types the native backend refuses (64-bit unsigned).
//!
//! Unresolved names are left alone at resolution time and surface here as
//! `UnknownName` the moment they are read.

use vec64::Vec64;

use crate::enums::error::ColzipError;
use crate::vm::parser::Expr;
use crate::vm::value::{infer_kind, sc_binary, sc_call, sc_unary, Block, BlockEnv, Kind, ScV};

/// Evaluates `expr` at element `i` of the block environment.
pub(crate) fn eval_scalar(
    expr: &Expr,
    env: &BlockEnv<'_>,
    i: usize,
) -> Result<ScV, ColzipError> {
    Ok(match expr {
        Expr::Int(v) => ScV::I(*v),
        Expr::Float(v) => ScV::F(*v),
        Expr::Bool(v) => ScV::B(*v),
        Expr::Var(name) => env
            .get(name)
            .ok_or_else(|| ColzipError::UnknownName(name.clone()))?
            .at(i),
        Expr::Unary(op, inner) => sc_unary(*op, eval_scalar(inner, env, i)?)?,
        Expr::Binary(op, l, r) => {
            sc_binary(*op, eval_scalar(l, env, i)?, eval_scalar(r, env, i)?)?
        }
        Expr::Call(func, args) => {
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                vals.push(eval_scalar(a, env, i)?);
            }
            sc_call(*func, &vals)?
        }
    })
}

/// Evaluates `expr` over one aligned block of length `n`, element by
/// element. The result kind is type-driven, so every element lands in the
/// same variant; empty blocks are typed by static inference.
pub(crate) fn evaluate(expr: &Expr, env: &BlockEnv<'_>, n: usize) -> Result<Block, ColzipError> {
    if n == 0 {
        return Ok(Block::empty(infer_kind(expr, env)?));
    }
    let first = eval_scalar(expr, env, 0)?;
    Ok(match first.kind() {
        Kind::I => {
            let mut out: Vec64<i64> = Vec64::with_capacity(n);
            out.push(first.as_i());
            for i in 1..n {
                out.push(eval_scalar(expr, env, i)?.as_i());
            }
            Block::I64(out)
        }
        Kind::U => {
            let mut out: Vec64<u64> = Vec64::with_capacity(n);
            out.push(first.as_u());
            for i in 1..n {
                out.push(eval_scalar(expr, env, i)?.as_u());
            }
            Block::U64(out)
        }
        Kind::F => {
            let mut out: Vec64<f64> = Vec64::with_capacity(n);
            out.push(first.as_f());
            for i in 1..n {
                out.push(eval_scalar(expr, env, i)?.as_f());
            }
            Block::F64(out)
        }
        Kind::B => {
            let mut out: Vec64<bool> = Vec64::with_capacity(n);
            out.push(first.as_b()?);
            for i in 1..n {
                out.push(eval_scalar(expr, env, i)?.as_b()?);
            }
            Block::Bool(out)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::parser::parse;
    use crate::vm::value::BVal;

    #[test]
    fn test_matches_native_on_mixed_expression() {
        let x = [1i64, -2, 3, -4, 5];
        let y = [0.5f64, 1.5, -2.5, 3.5, -4.5];
        let env = BlockEnv {
            vars: vec![("x", BVal::VI(&x)), ("y", BVal::VF(&y))],
        };
        for src in [
            "x * 2 - y",
            "x / 2 + y ** 2",
            "(x > 0) & (y < 3.0)",
            "where(x > 0, x, -x) + abs(y)",
            "x % 3",
            "~(x > 0) | (y == 0.5)",
        ] {
            let ast = parse(src).unwrap();
            let host = evaluate(&ast, &env, 5).unwrap();
            let native = crate::vm::native::evaluate(&ast, &env, 5).unwrap();
            assert_eq!(host, native, "{}", src);
        }
    }

    #[test]
    fn test_u64_supported_here() {
        let big = [u64::MAX, u64::MAX - 1];
        let ones = [1u64, 3];
        let env = BlockEnv {
            vars: vec![("u", BVal::VU(&big)), ("v", BVal::VU(&ones))],
        };
        // Same-kind unsigned arithmetic stays u64 and exact.
        let ast = parse("u - v").unwrap();
        let out = evaluate(&ast, &env, 2).unwrap();
        match out {
            Block::U64(v) => assert_eq!(&v[..], &[u64::MAX - 1, u64::MAX - 4]),
            other => panic!("expected u64 block, got {:?}", other),
        }
        // Mixing u64 with a signed literal falls over to f64, NumPy-style.
        let ast = parse("v + 1").unwrap();
        assert_eq!(
            evaluate(&ast, &env, 2).unwrap(),
            Block::F64({
                let mut out = Vec64::new();
                out.extend_from_slice(&[2.0, 4.0]);
                out
            })
        );
    }

    #[test]
    fn test_empty_block_typed_by_inference() {
        let x: [i64; 0] = [];
        let env = BlockEnv {
            vars: vec![("x", BVal::VI(&x))],
        };
        let ast = parse("x * 2.0").unwrap();
        assert_eq!(evaluate(&ast, &env, 0).unwrap(), Block::F64(Vec64::new()));
        let ast = parse("x > 1").unwrap();
        assert_eq!(evaluate(&ast, &env, 0).unwrap(), Block::Bool(Vec64::new()));
    }

    #[test]
    fn test_unknown_name_surfaces_at_eval() {
        let ast = parse("ghost + 1").unwrap();
        let env = BlockEnv { vars: vec![] };
        assert!(matches!(
            evaluate(&ast, &env, 1),
            Err(ColzipError::UnknownName(_))
        ));
    }
}
