//! # **VM Values** - *Shared value domain of the expression backends*
//!
//! Both backends evaluate over the same four computation kinds — `i64`,
//! `u64`, `f64`, `bool` — with narrower operand dtypes widened at the
//! block boundary. The promotion rules and the scalar arithmetic live here
//! so the vectorized native backend and the scalar host backend cannot
//! drift apart.
//!
//! Promotion follows NumPy: floats dominate, mixing `u64` with signed
//! integers falls over to `f64`, booleans behave as 0/1 in arithmetic.
//! True division and power always produce floats; integer add/sub/mul wrap;
//! `%` is floored, with a zero divisor yielding zero.

use vec64::Vec64;

use crate::enums::error::ColzipError;
use crate::enums::scalar::Scalar;
use crate::vm::parser::{BinOp, Func, UnOp};
use crate::DenseArray;

/// Computation kind of a VM value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    I,
    U,
    F,
    B,
}

/// A single widened value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ScV {
    I(i64),
    U(u64),
    F(f64),
    B(bool),
}

impl ScV {
    #[inline]
    pub(crate) fn kind(&self) -> Kind {
        match self {
            ScV::I(_) => Kind::I,
            ScV::U(_) => Kind::U,
            ScV::F(_) => Kind::F,
            ScV::B(_) => Kind::B,
        }
    }

    /// Widens a dtype-erased scalar into the VM domain.
    pub(crate) fn from_scalar(s: Scalar) -> ScV {
        match s {
            Scalar::Int8(v) => ScV::I(v as i64),
            Scalar::Int16(v) => ScV::I(v as i64),
            Scalar::Int32(v) => ScV::I(v as i64),
            Scalar::Int64(v) => ScV::I(v),
            Scalar::UInt8(v) => ScV::I(v as i64),
            Scalar::UInt16(v) => ScV::I(v as i64),
            Scalar::UInt32(v) => ScV::I(v as i64),
            Scalar::UInt64(v) => ScV::U(v),
            Scalar::Float32(v) => ScV::F(v as f64),
            Scalar::Float64(v) => ScV::F(v),
            Scalar::Bool(v) => ScV::B(v),
        }
    }

    pub(crate) fn to_scalar(self) -> Scalar {
        match self {
            ScV::I(v) => Scalar::Int64(v),
            ScV::U(v) => Scalar::UInt64(v),
            ScV::F(v) => Scalar::Float64(v),
            ScV::B(v) => Scalar::Bool(v),
        }
    }

    // Kind coercions. The promotion rules guarantee the source kind is
    // representable in the target, so these never consult runtime values.

    #[inline]
    pub(crate) fn as_i(self) -> i64 {
        match self {
            ScV::I(v) => v,
            ScV::B(v) => v as i64,
            ScV::U(v) => v as i64,
            ScV::F(v) => v as i64,
        }
    }

    #[inline]
    pub(crate) fn as_u(self) -> u64 {
        match self {
            ScV::U(v) => v,
            ScV::B(v) => v as u64,
            ScV::I(v) => v as u64,
            ScV::F(v) => v as u64,
        }
    }

    #[inline]
    pub(crate) fn as_f(self) -> f64 {
        match self {
            ScV::F(v) => v,
            ScV::I(v) => v as f64,
            ScV::U(v) => v as f64,
            ScV::B(v) => v as u8 as f64,
        }
    }

    #[inline]
    pub(crate) fn as_b(self) -> Result<bool, ColzipError> {
        match self {
            ScV::B(v) => Ok(v),
            other => Err(ColzipError::InvalidExpression(format!(
                "expected a boolean value, found kind {:?}",
                other.kind()
            ))),
        }
    }
}

/// One backend result block.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Block {
    I64(Vec64<i64>),
    U64(Vec64<u64>),
    F64(Vec64<f64>),
    Bool(Vec64<bool>),
}

impl Block {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        match self {
            Block::I64(v) => v.len(),
            Block::U64(v) => v.len(),
            Block::F64(v) => v.len(),
            Block::Bool(v) => v.len(),
        }
    }

    pub(crate) fn empty(kind: Kind) -> Block {
        match kind {
            Kind::I => Block::I64(Vec64::new()),
            Kind::U => Block::U64(Vec64::new()),
            Kind::F => Block::F64(Vec64::new()),
            Kind::B => Block::Bool(Vec64::new()),
        }
    }

    pub(crate) fn into_dense(self) -> DenseArray {
        match self {
            Block::I64(v) => DenseArray::Int64(v),
            Block::U64(v) => DenseArray::UInt64(v),
            Block::F64(v) => DenseArray::Float64(v),
            Block::Bool(v) => DenseArray::Bool(v),
        }
    }
}

/// One operand window as the backends see it: a scalar or a widened slice.
#[derive(Clone, Copy, Debug)]
pub(crate) enum BVal<'a> {
    S(ScV),
    VI(&'a [i64]),
    VU(&'a [u64]),
    VF(&'a [f64]),
    VB(&'a [bool]),
}

impl BVal<'_> {
    #[inline]
    pub(crate) fn kind(&self) -> Kind {
        match self {
            BVal::S(s) => s.kind(),
            BVal::VI(_) => Kind::I,
            BVal::VU(_) => Kind::U,
            BVal::VF(_) => Kind::F,
            BVal::VB(_) => Kind::B,
        }
    }

    /// Element view for the scalar host backend; scalars broadcast.
    #[inline]
    pub(crate) fn at(&self, i: usize) -> ScV {
        match self {
            BVal::S(s) => *s,
            BVal::VI(v) => ScV::I(v[i]),
            BVal::VU(v) => ScV::U(v[i]),
            BVal::VF(v) => ScV::F(v[i]),
            BVal::VB(v) => ScV::B(v[i]),
        }
    }
}

/// Name environment handed to a backend for one block.
pub(crate) struct BlockEnv<'a> {
    pub(crate) vars: Vec<(&'a str, BVal<'a>)>,
}

impl<'a> BlockEnv<'a> {
    pub(crate) fn get(&self, name: &str) -> Option<&BVal<'a>> {
        self.vars.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// Reusable widening buffer for one operand.
#[derive(Default)]
pub(crate) enum WideBuf {
    #[default]
    Empty,
    I(Vec64<i64>),
    F(Vec64<f64>),
}

/// Produces the backend view of `src[start..stop]`: wide dtypes are handed
/// out as borrows, narrow dtypes are widened into `buf`.
pub(crate) fn widen_window<'a>(
    src: &'a DenseArray,
    start: usize,
    stop: usize,
    buf: &'a mut WideBuf,
) -> BVal<'a> {
    fn widen_i<'b, T: Copy + Into<i64>>(vals: &[T], buf: &'b mut WideBuf) -> &'b [i64] {
        let mut out = Vec64::with_capacity(vals.len());
        for &v in vals {
            out.push(v.into());
        }
        *buf = WideBuf::I(out);
        match buf {
            WideBuf::I(v) => v,
            _ => unreachable!(),
        }
    }
    match src {
        DenseArray::Int64(v) => BVal::VI(&v[start..stop]),
        DenseArray::UInt64(v) => BVal::VU(&v[start..stop]),
        DenseArray::Float64(v) => BVal::VF(&v[start..stop]),
        DenseArray::Bool(v) => BVal::VB(&v[start..stop]),
        DenseArray::Int8(v) => BVal::VI(widen_i(&v[start..stop], buf)),
        DenseArray::Int16(v) => BVal::VI(widen_i(&v[start..stop], buf)),
        DenseArray::Int32(v) => BVal::VI(widen_i(&v[start..stop], buf)),
        DenseArray::UInt8(v) => BVal::VI(widen_i(&v[start..stop], buf)),
        DenseArray::UInt16(v) => BVal::VI(widen_i(&v[start..stop], buf)),
        DenseArray::UInt32(v) => BVal::VI(widen_i(&v[start..stop], buf)),
        DenseArray::Float32(v) => {
            let vals = &v[start..stop];
            let mut out = Vec64::with_capacity(vals.len());
            for &x in vals {
                out.push(x as f64);
            }
            *buf = WideBuf::F(out);
            match buf {
                WideBuf::F(b) => BVal::VF(b),
                _ => unreachable!(),
            }
        }
    }
}

// Promotion rules

/// Common kind of two operands, NumPy-style.
pub(crate) fn unify(a: Kind, b: Kind) -> Kind {
    use Kind::*;
    match (a, b) {
        (F, _) | (_, F) => F,
        (U, I) | (I, U) => F,
        (U, _) | (_, U) => U,
        (I, _) | (_, I) => I,
        (B, B) => B,
    }
}

/// Result kind of an arithmetic operator.
pub(crate) fn arith_kind(op: BinOp, a: Kind, b: Kind) -> Kind {
    match op {
        BinOp::Div | BinOp::Pow => Kind::F,
        _ => match unify(a, b) {
            Kind::B => Kind::I,
            k => k,
        },
    }
}

// Scalar arithmetic, the single source of truth for both backends.

#[inline]
pub(crate) fn imod(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

#[inline]
pub(crate) fn umod(a: u64, b: u64) -> u64 {
    if b == 0 { 0 } else { a % b }
}

#[inline]
pub(crate) fn fmod_floored(a: f64, b: f64) -> f64 {
    a - b * (a / b).floor()
}

#[inline]
pub(crate) fn ibin(op: BinOp, a: i64, b: i64) -> i64 {
    match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Mod => imod(a, b),
        BinOp::And => a & b,
        BinOp::Or => a | b,
        _ => unreachable!("integer path only handles wrapping arithmetic"),
    }
}

#[inline]
pub(crate) fn ubin(op: BinOp, a: u64, b: u64) -> u64 {
    match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Mod => umod(a, b),
        BinOp::And => a & b,
        BinOp::Or => a | b,
        _ => unreachable!("unsigned path only handles wrapping arithmetic"),
    }
}

#[inline]
pub(crate) fn fbin(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Pow => a.powf(b),
        BinOp::Mod => fmod_floored(a, b),
        _ => unreachable!("float path only handles arithmetic"),
    }
}

#[inline]
pub(crate) fn fun1(func: Func, x: f64) -> f64 {
    match func {
        Func::Sin => x.sin(),
        Func::Cos => x.cos(),
        Func::Tan => x.tan(),
        Func::Sqrt => x.sqrt(),
        Func::Exp => x.exp(),
        Func::Log => x.ln(),
        Func::Log10 => x.log10(),
        Func::Floor => x.floor(),
        Func::Ceil => x.ceil(),
        _ => unreachable!("abs and where are kind-preserving"),
    }
}

pub(crate) fn is_arith(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow
    )
}

pub(crate) fn is_cmp(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne
    )
}

#[inline]
pub(crate) fn cmp_pair<T: PartialOrd + PartialEq>(op: BinOp, a: T, b: T) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        BinOp::Eq => a == b,
        BinOp::Ne => a != b,
        _ => unreachable!("comparison path"),
    }
}

/// Result kind of a bitwise/logical operator, or an error for floats.
pub(crate) fn logic_kind(a: Kind, b: Kind) -> Result<Kind, ColzipError> {
    use Kind::*;
    match (a, b) {
        (B, B) => Ok(B),
        (F, _) | (_, F) => Err(ColzipError::InvalidExpression(
            "bitwise operators require boolean or integer operands".into(),
        )),
        (U, I) | (I, U) => Err(ColzipError::InvalidExpression(
            "bitwise operators cannot mix signed and unsigned 64-bit operands".into(),
        )),
        (U, _) | (_, U) => Ok(U),
        _ => Ok(I),
    }
}

/// Applies a binary operator to two widened scalars; the reference
/// semantics for both backends.
pub(crate) fn sc_binary(op: BinOp, l: ScV, r: ScV) -> Result<ScV, ColzipError> {
    if is_arith(op) {
        return Ok(match arith_kind(op, l.kind(), r.kind()) {
            Kind::I => ScV::I(ibin(op, l.as_i(), r.as_i())),
            Kind::U => ScV::U(ubin(op, l.as_u(), r.as_u())),
            _ => ScV::F(fbin(op, l.as_f(), r.as_f())),
            // B is folded into I by arith_kind
        });
    }
    if is_cmp(op) {
        let v = match unify(l.kind(), r.kind()) {
            Kind::I => cmp_pair(op, l.as_i(), r.as_i()),
            Kind::U => cmp_pair(op, l.as_u(), r.as_u()),
            Kind::F => cmp_pair(op, l.as_f(), r.as_f()),
            Kind::B => cmp_pair(op, l.as_b()?, r.as_b()?),
        };
        return Ok(ScV::B(v));
    }
    // & |
    Ok(match logic_kind(l.kind(), r.kind())? {
        Kind::B => {
            let (a, b) = (l.as_b()?, r.as_b()?);
            ScV::B(match op {
                BinOp::And => a && b,
                _ => a || b,
            })
        }
        Kind::U => ScV::U(ubin(op, l.as_u(), r.as_u())),
        _ => ScV::I(ibin(op, l.as_i(), r.as_i())),
    })
}

/// Applies a unary operator to a widened scalar.
pub(crate) fn sc_unary(op: UnOp, v: ScV) -> Result<ScV, ColzipError> {
    Ok(match (op, v) {
        (UnOp::Neg, ScV::I(x)) => ScV::I(x.wrapping_neg()),
        (UnOp::Neg, ScV::U(x)) => ScV::U(x.wrapping_neg()),
        (UnOp::Neg, ScV::F(x)) => ScV::F(-x),
        (UnOp::Neg, ScV::B(x)) => ScV::I(-(x as i64)),
        (UnOp::Not, ScV::B(x)) => ScV::B(!x),
        (UnOp::Not, ScV::I(x)) => ScV::I(!x),
        (UnOp::Not, ScV::U(x)) => ScV::U(!x),
        (UnOp::Not, ScV::F(_)) => {
            return Err(ColzipError::InvalidExpression(
                "'~' requires a boolean or integer operand".into(),
            ));
        }
    })
}

/// Applies a built-in function to widened scalar arguments.
pub(crate) fn sc_call(func: Func, args: &[ScV]) -> Result<ScV, ColzipError> {
    Ok(match func {
        Func::Abs => match args[0] {
            ScV::I(x) => ScV::I(x.wrapping_abs()),
            ScV::U(x) => ScV::U(x),
            ScV::F(x) => ScV::F(x.abs()),
            ScV::B(x) => ScV::I(x as i64),
        },
        Func::Where => {
            let cond = args[0].as_b()?;
            let kind = unify(args[1].kind(), args[2].kind());
            let picked = if cond { args[1] } else { args[2] };
            match kind {
                Kind::I => ScV::I(picked.as_i()),
                Kind::U => ScV::U(picked.as_u()),
                Kind::F => ScV::F(picked.as_f()),
                Kind::B => ScV::B(picked.as_b()?),
            }
        }
        _ => ScV::F(fun1(func, args[0].as_f())),
    })
}

/// Static result kind of `expr` over `env`, used to type empty outputs.
pub(crate) fn infer_kind(
    expr: &crate::vm::parser::Expr,
    env: &BlockEnv<'_>,
) -> Result<Kind, ColzipError> {
    use crate::vm::parser::Expr;
    Ok(match expr {
        Expr::Int(_) => Kind::I,
        Expr::Float(_) => Kind::F,
        Expr::Bool(_) => Kind::B,
        Expr::Var(name) => env
            .get(name)
            .ok_or_else(|| ColzipError::UnknownName(name.clone()))?
            .kind(),
        Expr::Unary(UnOp::Neg, inner) => match infer_kind(inner, env)? {
            Kind::B => Kind::I,
            k => k,
        },
        Expr::Unary(UnOp::Not, inner) => infer_kind(inner, env)?,
        Expr::Binary(op, l, r) => {
            let (a, b) = (infer_kind(l, env)?, infer_kind(r, env)?);
            if is_arith(*op) {
                arith_kind(*op, a, b)
            } else if is_cmp(*op) {
                Kind::B
            } else {
                logic_kind(a, b)?
            }
        }
        Expr::Call(Func::Abs, args) => infer_kind(&args[0], env)?,
        Expr::Call(Func::Where, args) => {
            unify(infer_kind(&args[1], env)?, infer_kind(&args[2], env)?)
        }
        Expr::Call(_, _) => Kind::F,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unify_matrix() {
        use Kind::*;
        assert_eq!(unify(I, I), I);
        assert_eq!(unify(I, U), F);
        assert_eq!(unify(U, U), U);
        assert_eq!(unify(B, I), I);
        assert_eq!(unify(B, B), B);
        assert_eq!(unify(F, U), F);
    }

    #[test]
    fn test_floored_mod() {
        assert_eq!(imod(-7, 3), 2);
        assert_eq!(imod(7, -3), -2);
        assert_eq!(imod(7, 3), 1);
        assert_eq!(imod(5, 0), 0);
        assert_eq!(fmod_floored(-7.0, 3.0), 2.0);
    }

    #[test]
    fn test_sc_binary_promotion() {
        // int / int is true division
        let v = sc_binary(BinOp::Div, ScV::I(7), ScV::I(2)).unwrap();
        assert_eq!(v, ScV::F(3.5));
        // bool arithmetic promotes to int
        let v = sc_binary(BinOp::Add, ScV::B(true), ScV::B(true)).unwrap();
        assert_eq!(v, ScV::I(2));
        // u64 + i64 falls over to f64
        let v = sc_binary(BinOp::Add, ScV::U(1), ScV::I(1)).unwrap();
        assert_eq!(v, ScV::F(2.0));
        // comparison yields bool
        let v = sc_binary(BinOp::Lt, ScV::I(1), ScV::F(1.5)).unwrap();
        assert_eq!(v, ScV::B(true));
        // float bitwise is refused
        assert!(sc_binary(BinOp::And, ScV::F(1.0), ScV::B(true)).is_err());
    }

    #[test]
    fn test_sc_unary_and_call() {
        assert_eq!(sc_unary(UnOp::Neg, ScV::B(true)).unwrap(), ScV::I(-1));
        assert_eq!(sc_unary(UnOp::Not, ScV::B(false)).unwrap(), ScV::B(true));
        assert!(sc_unary(UnOp::Not, ScV::F(0.5)).is_err());
        assert_eq!(sc_call(Func::Abs, &[ScV::I(-3)]).unwrap(), ScV::I(3));
        assert_eq!(
            sc_call(Func::Sqrt, &[ScV::I(9)]).unwrap(),
            ScV::F(3.0)
        );
        assert_eq!(
            sc_call(Func::Where, &[ScV::B(false), ScV::I(1), ScV::I(2)]).unwrap(),
            ScV::I(2)
        );
        assert!(sc_call(Func::Where, &[ScV::I(1), ScV::I(1), ScV::I(2)]).is_err());
    }
}
