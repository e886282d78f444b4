//! # **Native Backend** - *Vectorized block kernels*
//!
//! Evaluates a parsed expression over one aligned block per call. Values
//! flow as whole slices: every operator dispatches its promotion once per
//! block, then runs a tight monomorphic loop over the lanes, handing large
//! blocks to rayon. Scalars stay scalar until an operator pairs them with a
//! block, so constant subtrees fold for free.
//!
//! The per-element semantics are exactly the scalar kernels in
//! [`crate::vm::value`]; the host backend applies the same kernels one
//! element at a time, which is what keeps the two backends in agreement.

use rayon::prelude::*;
use vec64::Vec64;

use crate::enums::error::ColzipError;
use crate::settings;
use crate::vm::parser::{BinOp, Expr, Func, UnOp};
use crate::vm::value::{
    arith_kind, cmp_pair, fbin, fun1, ibin, is_arith, is_cmp, logic_kind, sc_binary, sc_call,
    sc_unary, unify, BVal, Block, BlockEnv, Kind, ScV,
};

/// Lane count below which kernels stay single-threaded.
const PAR_MIN: usize = 1 << 16;

/// Names the native backend recognizes as functions; exposed so name
/// resolution can prune them from the free-variable set.
pub use crate::vm::parser::FUNCTIONS;

/// A block-or-scalar value during tree evaluation.
enum Val<'a> {
    S(ScV),
    I(Arr<'a, i64>),
    U(Arr<'a, u64>),
    F(Arr<'a, f64>),
    B(Arr<'a, bool>),
}

enum Arr<'a, T: Copy> {
    Borrowed(&'a [T]),
    Owned(Vec64<T>),
}

impl<T: Copy> Arr<'_, T> {
    #[inline]
    fn as_slice(&self) -> &[T] {
        match self {
            Arr::Borrowed(s) => s,
            Arr::Owned(v) => v,
        }
    }
}

impl Val<'_> {
    fn kind(&self) -> Kind {
        match self {
            Val::S(s) => s.kind(),
            Val::I(_) => Kind::I,
            Val::U(_) => Kind::U,
            Val::F(_) => Kind::F,
            Val::B(_) => Kind::B,
        }
    }
}

/// A value converted to one computation kind: scalar, borrowed lanes, or
/// freshly widened lanes.
enum SoV<'a, T: Copy> {
    S(T),
    V(&'a [T]),
    O(Vec64<T>),
}

#[derive(Clone, Copy)]
enum View<'a, T: Copy> {
    S(T),
    V(&'a [T]),
}

impl<T: Copy> SoV<'_, T> {
    #[inline]
    fn view(&self) -> View<'_, T> {
        match self {
            SoV::S(v) => View::S(*v),
            SoV::V(s) => View::V(s),
            SoV::O(v) => View::V(v),
        }
    }
}

fn widen_into<A: Copy + Sync, T: Copy + Send + Sync + Default>(
    src: &[A],
    f: impl Fn(A) -> T + Sync,
) -> Vec64<T> {
    let mut out: Vec64<T> = Vec64::new();
    out.resize(src.len(), T::default());
    fill_from(&mut out, src, &f);
    out
}

#[inline]
fn fill_from<A: Copy + Sync, T: Copy + Send + Sync>(
    out: &mut [T],
    src: &[A],
    f: &(impl Fn(A) -> T + Sync),
) {
    if src.len() >= PAR_MIN && settings::nthreads() > 1 {
        out.par_iter_mut()
            .zip(src.par_iter())
            .for_each(|(o, &x)| *o = f(x));
    } else {
        for (o, &x) in out.iter_mut().zip(src) {
            *o = f(x);
        }
    }
}

fn conv_i<'v>(v: &'v Val<'_>) -> SoV<'v, i64> {
    match v {
        Val::S(s) => SoV::S(s.as_i()),
        Val::I(a) => SoV::V(a.as_slice()),
        Val::B(a) => SoV::O(widen_into(a.as_slice(), |x| x as i64)),
        Val::U(a) => SoV::O(widen_into(a.as_slice(), |x| x as i64)),
        Val::F(a) => SoV::O(widen_into(a.as_slice(), |x| x as i64)),
    }
}

fn conv_u<'v>(v: &'v Val<'_>) -> SoV<'v, u64> {
    match v {
        Val::S(s) => SoV::S(s.as_u()),
        Val::U(a) => SoV::V(a.as_slice()),
        Val::B(a) => SoV::O(widen_into(a.as_slice(), |x| x as u64)),
        Val::I(a) => SoV::O(widen_into(a.as_slice(), |x| x as u64)),
        Val::F(a) => SoV::O(widen_into(a.as_slice(), |x| x as u64)),
    }
}

fn conv_f<'v>(v: &'v Val<'_>) -> SoV<'v, f64> {
    match v {
        Val::S(s) => SoV::S(s.as_f()),
        Val::F(a) => SoV::V(a.as_slice()),
        Val::I(a) => SoV::O(widen_into(a.as_slice(), |x| x as f64)),
        Val::U(a) => SoV::O(widen_into(a.as_slice(), |x| x as f64)),
        Val::B(a) => SoV::O(widen_into(a.as_slice(), |x| x as u8 as f64)),
    }
}

fn conv_b<'v>(v: &'v Val<'_>) -> Result<SoV<'v, bool>, ColzipError> {
    match v {
        Val::S(s) => Ok(SoV::S(s.as_b()?)),
        Val::B(a) => Ok(SoV::V(a.as_slice())),
        other => Err(ColzipError::InvalidExpression(format!(
            "expected a boolean operand, found kind {:?}",
            other.kind()
        ))),
    }
}

/// Scalar-or-lanes kernel output.
enum Out<T: Copy> {
    S(T),
    V(Vec64<T>),
}

fn apply1<A, R>(x: &SoV<'_, A>, f: impl Fn(A) -> R + Sync) -> Out<R>
where
    A: Copy + Sync,
    R: Copy + Send + Sync + Default,
{
    match x.view() {
        View::S(a) => Out::S(f(a)),
        View::V(a) => {
            let mut out: Vec64<R> = Vec64::new();
            out.resize(a.len(), R::default());
            fill_from(&mut out, a, &f);
            Out::V(out)
        }
    }
}

fn apply2<A, R>(l: &SoV<'_, A>, r: &SoV<'_, A>, f: impl Fn(A, A) -> R + Sync) -> Out<R>
where
    A: Copy + Sync,
    R: Copy + Send + Sync + Default,
{
    match (l.view(), r.view()) {
        (View::S(a), View::S(b)) => Out::S(f(a, b)),
        (View::S(a), View::V(b)) => {
            let mut out: Vec64<R> = Vec64::new();
            out.resize(b.len(), R::default());
            fill_from(&mut out, b, &|y| f(a, y));
            Out::V(out)
        }
        (View::V(a), View::S(b)) => {
            let mut out: Vec64<R> = Vec64::new();
            out.resize(a.len(), R::default());
            fill_from(&mut out, a, &|x| f(x, b));
            Out::V(out)
        }
        (View::V(a), View::V(b)) => {
            debug_assert_eq!(a.len(), b.len());
            let mut out: Vec64<R> = Vec64::new();
            out.resize(a.len(), R::default());
            if a.len() >= PAR_MIN && settings::nthreads() > 1 {
                out.par_iter_mut()
                    .zip(a.par_iter().zip(b.par_iter()))
                    .for_each(|(o, (&x, &y))| *o = f(x, y));
            } else {
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = f(x, y);
                }
            }
            Out::V(out)
        }
    }
}

fn apply_where<A>(c: &SoV<'_, bool>, a: &SoV<'_, A>, b: &SoV<'_, A>) -> Out<A>
where
    A: Copy + Send + Sync + Default,
{
    let n = [len_of(c), len_of(a), len_of(b)]
        .into_iter()
        .flatten()
        .next();
    match n {
        None => {
            let (View::S(cv), View::S(av), View::S(bv)) = (c.view(), a.view(), b.view()) else {
                unreachable!()
            };
            Out::S(if cv { av } else { bv })
        }
        Some(n) => {
            let mut out: Vec64<A> = Vec64::new();
            out.resize(n, A::default());
            let cv = c.view();
            let av = a.view();
            let bv = b.view();
            let pick = |i: usize| {
                let cond = match cv {
                    View::S(v) => v,
                    View::V(s) => s[i],
                };
                if cond {
                    match av {
                        View::S(v) => v,
                        View::V(s) => s[i],
                    }
                } else {
                    match bv {
                        View::S(v) => v,
                        View::V(s) => s[i],
                    }
                }
            };
            if n >= PAR_MIN && settings::nthreads() > 1 {
                out.par_iter_mut()
                    .enumerate()
                    .for_each(|(i, o)| *o = pick(i));
            } else {
                for (i, o) in out.iter_mut().enumerate() {
                    *o = pick(i);
                }
            }
            Out::V(out)
        }
    }
}

fn len_of<T: Copy>(v: &SoV<'_, T>) -> Option<usize> {
    match v.view() {
        View::S(_) => None,
        View::V(s) => Some(s.len()),
    }
}

fn wrap_i(out: Out<i64>) -> Val<'static> {
    match out {
        Out::S(v) => Val::S(ScV::I(v)),
        Out::V(v) => Val::I(Arr::Owned(v)),
    }
}

fn wrap_u(out: Out<u64>) -> Val<'static> {
    match out {
        Out::S(v) => Val::S(ScV::U(v)),
        Out::V(v) => Val::U(Arr::Owned(v)),
    }
}

fn wrap_f(out: Out<f64>) -> Val<'static> {
    match out {
        Out::S(v) => Val::S(ScV::F(v)),
        Out::V(v) => Val::F(Arr::Owned(v)),
    }
}

fn wrap_b(out: Out<bool>) -> Val<'static> {
    match out {
        Out::S(v) => Val::S(ScV::B(v)),
        Out::V(v) => Val::B(Arr::Owned(v)),
    }
}

fn eval_node<'e>(expr: &Expr, env: &BlockEnv<'e>) -> Result<Val<'e>, ColzipError> {
    Ok(match expr {
        Expr::Int(v) => Val::S(ScV::I(*v)),
        Expr::Float(v) => Val::S(ScV::F(*v)),
        Expr::Bool(v) => Val::S(ScV::B(*v)),
        Expr::Var(name) => match env.get(name).copied() {
            Some(BVal::S(s)) => Val::S(s),
            Some(BVal::VI(s)) => Val::I(Arr::Borrowed(s)),
            Some(BVal::VU(s)) => Val::U(Arr::Borrowed(s)),
            Some(BVal::VF(s)) => Val::F(Arr::Borrowed(s)),
            Some(BVal::VB(s)) => Val::B(Arr::Borrowed(s)),
            None => return Err(ColzipError::UnknownName(name.clone())),
        },
        Expr::Unary(op, inner) => {
            let v = eval_node(inner, env)?;
            if let Val::S(s) = v {
                return Ok(Val::S(sc_unary(*op, s)?));
            }
            match (op, v.kind()) {
                (UnOp::Neg, Kind::F) => wrap_f(apply1(&conv_f(&v), |x| -x)),
                (UnOp::Neg, Kind::U) => wrap_u(apply1(&conv_u(&v), |x: u64| x.wrapping_neg())),
                (UnOp::Neg, _) => wrap_i(apply1(&conv_i(&v), |x: i64| x.wrapping_neg())),
                (UnOp::Not, Kind::B) => wrap_b(apply1(&conv_b(&v)?, |x: bool| !x)),
                (UnOp::Not, Kind::I) => wrap_i(apply1(&conv_i(&v), |x: i64| !x)),
                (UnOp::Not, Kind::U) => wrap_u(apply1(&conv_u(&v), |x: u64| !x)),
                (UnOp::Not, Kind::F) => {
                    return Err(ColzipError::InvalidExpression(
                        "'~' requires a boolean or integer operand".into(),
                    ));
                }
            }
        }
        Expr::Binary(op, le, re) => {
            let l = eval_node(le, env)?;
            let r = eval_node(re, env)?;
            if let (Val::S(a), Val::S(b)) = (&l, &r) {
                return Ok(Val::S(sc_binary(*op, *a, *b)?));
            }
            let op = *op;
            if is_arith(op) {
                match arith_kind(op, l.kind(), r.kind()) {
                    Kind::I => wrap_i(apply2(&conv_i(&l), &conv_i(&r), move |a, b| ibin(op, a, b))),
                    Kind::U => wrap_u(apply2(&conv_u(&l), &conv_u(&r), move |a, b| ubin2(op, a, b))),
                    _ => wrap_f(apply2(&conv_f(&l), &conv_f(&r), move |a, b| fbin(op, a, b))),
                }
            } else if is_cmp(op) {
                match unify(l.kind(), r.kind()) {
                    Kind::I => wrap_b(apply2(&conv_i(&l), &conv_i(&r), move |a, b| {
                        cmp_pair(op, a, b)
                    })),
                    Kind::U => wrap_b(apply2(&conv_u(&l), &conv_u(&r), move |a, b| {
                        cmp_pair(op, a, b)
                    })),
                    Kind::F => wrap_b(apply2(&conv_f(&l), &conv_f(&r), move |a, b| {
                        cmp_pair(op, a, b)
                    })),
                    Kind::B => wrap_b(apply2(&conv_b(&l)?, &conv_b(&r)?, move |a, b| {
                        cmp_pair(op, a, b)
                    })),
                }
            } else {
                match logic_kind(l.kind(), r.kind())? {
                    Kind::B => {
                        let and = matches!(op, BinOp::And);
                        wrap_b(apply2(&conv_b(&l)?, &conv_b(&r)?, move |a, b| {
                            if and { a && b } else { a || b }
                        }))
                    }
                    Kind::U => wrap_u(apply2(&conv_u(&l), &conv_u(&r), move |a, b| ubin2(op, a, b))),
                    _ => wrap_i(apply2(&conv_i(&l), &conv_i(&r), move |a, b| ibin(op, a, b))),
                }
            }
        }
        Expr::Call(func, args) => {
            let vals: Vec<Val<'e>> = args
                .iter()
                .map(|a| eval_node(a, env))
                .collect::<Result<_, _>>()?;
            if vals.iter().all(|v| matches!(v, Val::S(_))) {
                let scalars: Vec<ScV> = vals
                    .iter()
                    .map(|v| match v {
                        Val::S(s) => *s,
                        _ => unreachable!(),
                    })
                    .collect();
                return Ok(Val::S(sc_call(*func, &scalars)?));
            }
            match func {
                Func::Abs => {
                    let v = &vals[0];
                    match v.kind() {
                        Kind::F => wrap_f(apply1(&conv_f(v), |x: f64| x.abs())),
                        Kind::U => wrap_u(apply1(&conv_u(v), |x| x)),
                        _ => wrap_i(apply1(&conv_i(v), |x: i64| x.wrapping_abs())),
                    }
                }
                Func::Where => {
                    let cond = conv_b(&vals[0])?;
                    match unify(vals[1].kind(), vals[2].kind()) {
                        Kind::I => wrap_i(apply_where(&cond, &conv_i(&vals[1]), &conv_i(&vals[2]))),
                        Kind::U => wrap_u(apply_where(&cond, &conv_u(&vals[1]), &conv_u(&vals[2]))),
                        Kind::F => wrap_f(apply_where(&cond, &conv_f(&vals[1]), &conv_f(&vals[2]))),
                        Kind::B => wrap_b(apply_where(
                            &cond,
                            &conv_b(&vals[1])?,
                            &conv_b(&vals[2])?,
                        )),
                    }
                }
                f => {
                    let f = *f;
                    wrap_f(apply1(&conv_f(&vals[0]), move |x| fun1(f, x)))
                }
            }
        }
    })
}

// `ubin` shares a name with the value-module kernel; the local alias keeps
// the match arms shaped like the i64 path.
#[inline]
fn ubin2(op: BinOp, a: u64, b: u64) -> u64 {
    crate::vm::value::ubin(op, a, b)
}

fn broadcast(s: ScV, n: usize) -> Block {
    match s {
        ScV::I(v) => {
            let mut out = Vec64::new();
            out.resize(n, v);
            Block::I64(out)
        }
        ScV::U(v) => {
            let mut out = Vec64::new();
            out.resize(n, v);
            Block::U64(out)
        }
        ScV::F(v) => {
            let mut out = Vec64::new();
            out.resize(n, v);
            Block::F64(out)
        }
        ScV::B(v) => {
            let mut out = Vec64::new();
            out.resize(n, v);
            Block::Bool(out)
        }
    }
}

fn owned<T: Copy + Default>(arr: Arr<'_, T>) -> Vec64<T> {
    match arr {
        Arr::Owned(v) => v,
        Arr::Borrowed(s) => {
            let mut out = Vec64::with_capacity(s.len());
            out.extend_from_slice(s);
            out
        }
    }
}

/// Evaluates `expr` over one aligned block of length `n`.
pub(crate) fn evaluate(expr: &Expr, env: &BlockEnv<'_>, n: usize) -> Result<Block, ColzipError> {
    Ok(match eval_node(expr, env)? {
        Val::S(s) => broadcast(s, n),
        Val::I(a) => Block::I64(owned(a)),
        Val::U(a) => Block::U64(owned(a)),
        Val::F(a) => Block::F64(owned(a)),
        Val::B(a) => Block::Bool(owned(a)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::parser::parse;

    fn env<'a>(vars: Vec<(&'a str, BVal<'a>)>) -> BlockEnv<'a> {
        BlockEnv { vars }
    }

    fn eval_i64(src: &str, vars: Vec<(&str, BVal<'_>)>, n: usize) -> Block {
        let ast = parse(src).unwrap();
        evaluate(&ast, &env(vars), n).unwrap()
    }

    #[test]
    fn test_arithmetic_block() {
        let x = [1i64, 2, 3, 4];
        let out = eval_i64("x * 2 + 1", vec![("x", BVal::VI(&x))], 4);
        assert_eq!(out, Block::I64(vec64_from(&[3, 5, 7, 9])));
    }

    #[test]
    fn test_division_promotes() {
        let x = [1i64, 2, 3];
        let out = eval_i64("x / 2", vec![("x", BVal::VI(&x))], 3);
        assert_eq!(out, Block::F64(vec64_from(&[0.5, 1.0, 1.5])));
    }

    #[test]
    fn test_comparison_and_logic() {
        let x = [1i64, 5, 9];
        let y = [2.0f64, 4.0, 10.0];
        let ast = parse("(x > 2) & (y < 9.5)").unwrap();
        let out = evaluate(
            &ast,
            &env(vec![("x", BVal::VI(&x)), ("y", BVal::VF(&y))]),
            3,
        )
        .unwrap();
        assert_eq!(out, Block::Bool(vec64_from(&[false, true, false])));
    }

    #[test]
    fn test_scalar_broadcast() {
        let out = eval_i64("1 + 2", vec![], 3);
        assert_eq!(out, Block::I64(vec64_from(&[3, 3, 3])));
    }

    #[test]
    fn test_functions() {
        let x = [0.0f64, 4.0];
        let out = eval_i64("sqrt(x)", vec![("x", BVal::VF(&x))], 2);
        assert_eq!(out, Block::F64(vec64_from(&[0.0, 2.0])));

        let c = [true, false];
        let a = [1i64, 1];
        let out = eval_i64(
            "where(c, a, 9)",
            vec![("c", BVal::VB(&c)), ("a", BVal::VI(&a))],
            2,
        );
        assert_eq!(out, Block::I64(vec64_from(&[1, 9])));
    }

    #[test]
    fn test_unknown_name() {
        let ast = parse("missing + 1").unwrap();
        assert!(matches!(
            evaluate(&ast, &env(vec![]), 1),
            Err(ColzipError::UnknownName(_))
        ));
    }

    fn vec64_from<T: Copy>(s: &[T]) -> Vec64<T> {
        let mut v = Vec64::with_capacity(s.len());
        v.extend_from_slice(s);
        v
    }
}
