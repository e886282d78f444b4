//! # **Block Evaluator** - *Planning and streaming expression evaluation*
//!
//! The public evaluation surface: resolves an expression's free names
//! against an explicit environment, classifies operands, plans a block size
//! from cache targets, then streams aligned windows from every operand
//! through the selected backend — compressed columns are decompressed one
//! window at a time into reusable buffers, so a full uncompressed copy of
//! an operand never exists.
//!
//! Environments are explicit by design: callers (and [`crate::CTable`])
//! pass a name → operand mapping rather than relying on any ambient scope.

use crate::codec::CParams;
use crate::enums::error::ColzipError;
use crate::enums::scalar::Scalar;
use crate::settings::{self, OutFlavor, Vm};
use crate::utils::prev_power_of_two;
use crate::vm::parser::{free_vars, parse};
use crate::vm::value::{widen_window, BVal, BlockEnv, ScV, WideBuf};
use crate::vm::{host, native};
use crate::{Column, DType, DenseArray};

/// One named operand of an expression.
#[derive(Clone, Copy, Debug)]
pub enum Operand<'a> {
    /// A single value; contributes no length.
    Scalar(Scalar),
    /// A compressed column, windowed via its range-fetch primitive.
    Column(&'a Column),
    /// A dense buffer, windowed by slicing.
    Dense(&'a DenseArray),
}

impl Operand<'_> {
    fn length(&self) -> Option<usize> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Column(c) => Some(c.len()),
            Operand::Dense(d) => Some(d.len()),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            Operand::Scalar(s) => s.dtype(),
            Operand::Column(c) => c.dtype(),
            Operand::Dense(d) => d.dtype(),
        }
    }
}

/// Name → operand environment for one evaluation. Lookup returns the first
/// insertion for a name, so earlier bindings shadow later ones.
#[derive(Default)]
pub struct Env<'a> {
    vars: Vec<(String, Operand<'a>)>,
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, operand: Operand<'a>) {
        self.vars.push((name.into(), operand));
    }

    pub fn get(&self, name: &str) -> Option<&Operand<'a>> {
        self.vars.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub(crate) fn entries(&self) -> &[(String, Operand<'a>)] {
        &self.vars
    }
}

/// Per-call evaluation options; `None` fields fall back to the
/// process-wide defaults in [`crate::settings`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EvalOpts {
    /// Backend override.
    pub vm: Option<Vm>,
    /// Output flavor override.
    pub out_flavor: Option<OutFlavor>,
    /// Compression parameters for column output.
    pub cparams: Option<CParams>,
    /// Expected length hint for column output chunk sizing.
    pub expectedlen: Option<usize>,
    /// Forces the block size; a test hook — results must not depend on it.
    pub blocksize: Option<usize>,
}

/// An evaluation result.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluated {
    /// Compressed column output.
    Column(Column),
    /// Dense uncompressed output.
    Dense(DenseArray),
    /// All-scalar expressions produce a scalar.
    Scalar(Scalar),
}

impl Evaluated {
    /// Unwraps a column result.
    pub fn into_column(self) -> Result<Column, ColzipError> {
        match self {
            Evaluated::Column(c) => Ok(c),
            Evaluated::Dense(d) => Err(ColzipError::InvalidConfig(format!(
                "expected column output, got a dense {} buffer",
                d.dtype()
            ))),
            Evaluated::Scalar(s) => Err(ColzipError::InvalidConfig(format!(
                "expected column output, got the scalar {}",
                s
            ))),
        }
    }

    /// Unwraps a dense result.
    pub fn into_dense(self) -> Result<DenseArray, ColzipError> {
        match self {
            Evaluated::Dense(d) => Ok(d),
            Evaluated::Column(c) => Ok(c.to_dense()),
            Evaluated::Scalar(s) => Err(ColzipError::InvalidConfig(format!(
                "expected dense output, got the scalar {}",
                s
            ))),
        }
    }
}

/// Cache-target block size: 1 MiB of operand bytes for the native backend,
/// 128 KiB (2^17 bytes) for the host backend, floored to a power of two,
/// then divided down for short arrays so they do not pay full cache-block
/// overhead.
fn compute_blocksize(vm: Vm, typesize: usize, vlen: usize) -> usize {
    let target = match vm {
        Vm::Native => 1usize << 20,
        Vm::Host => 1usize << 17,
    };
    let mut bsize = prev_power_of_two(target / typesize.max(1)).max(1);
    if vlen < 100_000 {
        bsize /= 8;
    } else if vlen < 1_000_000 {
        bsize /= 4;
    } else if vlen < 10_000_000 {
        bsize /= 2;
    }
    bsize.max(1)
}

enum SlotSrc<'a> {
    Scalar(ScV),
    Dense(&'a DenseArray),
    Column(&'a Column),
}

/// One resolved operand plus its reusable window buffers.
struct Slot<'a> {
    name: String,
    src: SlotSrc<'a>,
    window: DenseArray,
    wide: WideBuf,
}

impl Slot<'_> {
    /// Materializes the `[start, stop)` window and hands back the backend
    /// view. Column windows decompress into `self.window`; narrow dtypes
    /// widen into `self.wide`. Both allocations persist across blocks.
    fn fill(&mut self, start: usize, stop: usize) -> Result<(&str, BVal<'_>), ColzipError> {
        let bval = match &self.src {
            SlotSrc::Scalar(s) => BVal::S(*s),
            SlotSrc::Dense(d) => widen_window(d, start, stop, &mut self.wide),
            SlotSrc::Column(c) => {
                c.read_range(start, stop - start, &mut self.window)?;
                widen_window(&self.window, 0, stop - start, &mut self.wide)
            }
        };
        Ok((&self.name, bval))
    }
}

/// Evaluates `expression` against `env`, returning a compressed column, a
/// dense buffer, or a scalar per the selected output flavor.
pub fn eval(
    expression: &str,
    env: &Env<'_>,
    opts: &EvalOpts,
) -> Result<Evaluated, ColzipError> {
    let vm = opts.vm.unwrap_or_else(settings::eval_vm);
    let flavor = opts.out_flavor.unwrap_or_else(settings::eval_out_flavor);
    let ast = parse(expression)?;
    let names = free_vars(&ast);

    // Resolve names against the explicit environment. The native backend
    // insists on full resolution; the host backend reports a missing name
    // itself when the evaluation first reads it.
    let mut resolved: Vec<(&str, Operand<'_>)> = Vec::with_capacity(names.len());
    for name in &names {
        match env.get(name) {
            Some(op) => resolved.push((name, *op)),
            None if vm == Vm::Native => return Err(ColzipError::UnknownName(name.clone())),
            None => {}
        }
    }

    // Operand classification: accumulate the per-row byte footprint and
    // check that every length-bearing operand agrees on length.
    let mut typesize = 0usize;
    let mut vlen: Option<usize> = None;
    for (name, op) in &resolved {
        if let Some(len) = op.length() {
            if vm == Vm::Native && op.dtype() == DType::UInt64 {
                return Err(ColzipError::UnsupportedType {
                    name: name.to_string(),
                    dtype: DType::UInt64,
                });
            }
            typesize += op.dtype().item_size();
            match vlen {
                None => vlen = Some(len),
                Some(expected) if expected != len => {
                    return Err(ColzipError::LengthMismatch {
                        expected,
                        found: len,
                    });
                }
                Some(_) => {}
            }
        }
    }

    // All-scalar fast path: one backend invocation, scalar in, scalar out.
    let Some(n) = vlen else {
        let scalars: Vec<(&str, BVal<'_>)> = resolved
            .iter()
            .map(|(name, op)| {
                let s = match op {
                    Operand::Scalar(s) => ScV::from_scalar(*s),
                    _ => unreachable!("length-bearing operands imply vlen"),
                };
                (*name, BVal::S(s))
            })
            .collect();
        let benv = BlockEnv { vars: scalars };
        let result = host::eval_scalar(&ast, &benv, 0)?;
        return Ok(Evaluated::Scalar(result.to_scalar()));
    };

    let bsize = opts
        .blocksize
        .filter(|&b| b > 0)
        .unwrap_or_else(|| compute_blocksize(vm, typesize, n));
    let cparams = opts.cparams.unwrap_or_default();
    let expectedlen = opts.expectedlen.unwrap_or(n);

    let mut slots: Vec<Slot<'_>> = resolved
        .into_iter()
        .map(|(name, op)| Slot {
            name: name.to_string(),
            window: match op {
                Operand::Column(c) => DenseArray::empty(c.dtype()),
                _ => DenseArray::empty(DType::Int64),
            },
            src: match op {
                Operand::Scalar(s) => SlotSrc::Scalar(ScV::from_scalar(s)),
                Operand::Dense(d) => SlotSrc::Dense(d),
                Operand::Column(c) => SlotSrc::Column(c),
            },
            wide: WideBuf::default(),
        })
        .collect();

    enum OutAcc {
        Column(Column),
        Dense(DenseArray),
    }

    let mut output: Option<OutAcc> = None;
    let mut offset = 0usize;
    loop {
        let stop = (offset + bsize).min(n);
        let mut vars = Vec::with_capacity(slots.len());
        for slot in slots.iter_mut() {
            vars.push(slot.fill(offset, stop)?);
        }
        let benv = BlockEnv { vars };
        let block = match vm {
            Vm::Native => native::evaluate(&ast, &benv, stop - offset)?,
            Vm::Host => host::evaluate(&ast, &benv, stop - offset)?,
        };
        if block.len() != stop - offset {
            return Err(ColzipError::ReductionNotSupported(format!(
                "backend returned {} elements for a {}-element block",
                block.len(),
                stop - offset
            )));
        }
        let dense = block.into_dense();
        match output.as_mut() {
            None => {
                output = Some(match flavor {
                    OutFlavor::Column => OutAcc::Column(Column::from_dense(
                        &dense,
                        cparams,
                        Some(expectedlen),
                    )?),
                    OutFlavor::Dense => {
                        let mut full = DenseArray::with_len(dense.dtype(), n);
                        full.write_at(0, &dense)?;
                        OutAcc::Dense(full)
                    }
                });
            }
            Some(OutAcc::Column(col)) => col.append_dense(&dense)?,
            Some(OutAcc::Dense(full)) => full.write_at(offset, &dense)?,
        }
        offset = stop;
        if offset >= n {
            break;
        }
    }

    Ok(match output {
        Some(OutAcc::Column(col)) => Evaluated::Column(col),
        Some(OutAcc::Dense(d)) => Evaluated::Dense(d),
        None => unreachable!("the block loop always runs at least once"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::carray::{CArray, CArrayOptions};

    fn col(data: &[i64], chunklen: usize) -> Column {
        Column::from(
            CArray::from_slice_with(
                data,
                CArrayOptions {
                    chunklen: Some(chunklen),
                    ..CArrayOptions::default()
                },
            )
            .unwrap(),
        )
    }

    fn opts_vm(vm: Vm) -> EvalOpts {
        EvalOpts {
            vm: Some(vm),
            ..EvalOpts::default()
        }
    }

    #[test]
    fn test_compute_blocksize_ladder() {
        // 1 MiB over 16 bytes/row = 65536, halved for vlen in [1e6, 1e7).
        assert_eq!(compute_blocksize(Vm::Native, 16, 2_000_000), 32_768);
        // Short arrays divide by 8.
        assert_eq!(compute_blocksize(Vm::Native, 16, 10_000), 8_192);
        // Host targets 128 KiB: 131072/16 = 8192, halved for this vlen tier.
        assert_eq!(compute_blocksize(Vm::Host, 16, 2_000_000), 4_096);
        // Huge per-row footprints clamp to one element.
        assert_eq!(compute_blocksize(Vm::Host, 1 << 30, 10), 1);
    }

    #[test]
    fn test_eval_column_result() {
        let data: Vec<i64> = (0..10_000).collect();
        let x = col(&data, 256);
        let mut env = Env::new();
        env.insert("x", Operand::Column(&x));
        let out = eval("x * 2 + 1", &env, &EvalOpts::default())
            .unwrap()
            .into_column()
            .unwrap();
        assert_eq!(out.len(), 10_000);
        assert_eq!(out.get(0).unwrap(), Scalar::Int64(1));
        assert_eq!(out.get(9_999).unwrap(), Scalar::Int64(19_999));
    }

    #[test]
    fn test_eval_dense_result_and_mixed_operands() {
        let data: Vec<i64> = (0..1000).collect();
        let x = col(&data, 64);
        let y = DenseArray::from_slice(&(0..1000).map(|i| i as f64).collect::<Vec<_>>());
        let mut env = Env::new();
        env.insert("x", Operand::Column(&x));
        env.insert("y", Operand::Dense(&y));
        env.insert("k", Operand::Scalar(Scalar::Int64(3)));
        let out = eval(
            "x * k - y",
            &env,
            &EvalOpts {
                out_flavor: Some(OutFlavor::Dense),
                ..EvalOpts::default()
            },
        )
        .unwrap()
        .into_dense()
        .unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(out.get(10).unwrap(), Scalar::Float64(20.0));
    }

    #[test]
    fn test_backends_agree_and_blocksize_invariance() {
        let data: Vec<i64> = (0..5000).map(|i| i - 2500).collect();
        let x = col(&data, 128);
        let mut env = Env::new();
        env.insert("x", Operand::Column(&x));
        let expr = "(((.25*x + .75)*x - 1.5)*x - 2) < 0";

        let reference = eval(expr, &env, &opts_vm(Vm::Host))
            .unwrap()
            .into_dense()
            .unwrap();
        for vm in [Vm::Native, Vm::Host] {
            for blocksize in [1usize, 7, 64, 4096, 100_000] {
                let out = eval(
                    expr,
                    &env,
                    &EvalOpts {
                        vm: Some(vm),
                        blocksize: Some(blocksize),
                        ..EvalOpts::default()
                    },
                )
                .unwrap()
                .into_dense()
                .unwrap();
                assert_eq!(out, reference, "vm={vm:?} blocksize={blocksize}");
            }
        }
    }

    #[test]
    fn test_all_scalar_fast_path() {
        let mut env = Env::new();
        env.insert("a", Operand::Scalar(Scalar::Int64(4)));
        let out = eval("a * a + 1", &env, &EvalOpts::default()).unwrap();
        assert_eq!(out, Evaluated::Scalar(Scalar::Int64(17)));
        let out = eval("2 ** 10", &env, &EvalOpts::default()).unwrap();
        assert_eq!(out, Evaluated::Scalar(Scalar::Float64(1024.0)));
    }

    #[test]
    fn test_unknown_name_per_backend() {
        let env = Env::new();
        assert!(matches!(
            eval("ghost + 1", &env, &opts_vm(Vm::Native)),
            Err(ColzipError::UnknownName(_))
        ));
        // The host backend also fails, but from inside the evaluation.
        assert!(matches!(
            eval("ghost + 1", &env, &opts_vm(Vm::Host)),
            Err(ColzipError::UnknownName(_))
        ));
    }

    #[test]
    fn test_native_rejects_u64_operands() {
        let arr = CArray::from_slice(&[1u64, 2, 3]).unwrap();
        let u = Column::from(arr);
        let mut env = Env::new();
        env.insert("u", Operand::Column(&u));
        assert!(matches!(
            eval("u + 1", &env, &opts_vm(Vm::Native)),
            Err(ColzipError::UnsupportedType { .. })
        ));
        // The host backend accepts the same operand (promoting the mixed
        // signed/unsigned arithmetic to f64).
        let out = eval("u + 1", &env, &opts_vm(Vm::Host)).unwrap();
        assert_eq!(out.into_dense().unwrap().get(2), Some(Scalar::Float64(4.0)));
    }

    #[test]
    fn test_length_mismatch() {
        let a = col(&[1, 2, 3], 2);
        let b = col(&[1, 2], 2);
        let mut env = Env::new();
        env.insert("a", Operand::Column(&a));
        env.insert("b", Operand::Column(&b));
        assert!(matches!(
            eval("a + b", &env, &EvalOpts::default()),
            Err(ColzipError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_operands() {
        let x = col(&[], 16);
        let mut env = Env::new();
        env.insert("x", Operand::Column(&x));
        for vm in [Vm::Native, Vm::Host] {
            let out = eval("x * 2.5", &env, &opts_vm(vm)).unwrap().into_column().unwrap();
            assert_eq!(out.len(), 0);
            assert_eq!(out.dtype(), DType::Float64);
        }
    }

    #[test]
    fn test_narrow_dtypes_widen() {
        let small = CArray::from_slice(&[1i16, 2, 3]).unwrap();
        let s = Column::from(small);
        let f = CArray::from_slice(&[0.5f32, 1.5, 2.5]).unwrap();
        let fc = Column::from(f);
        let mut env = Env::new();
        env.insert("s", Operand::Column(&s));
        env.insert("f", Operand::Column(&fc));
        let out = eval("s + f", &env, &EvalOpts::default())
            .unwrap()
            .into_dense()
            .unwrap();
        assert_eq!(out.dtype(), DType::Float64);
        assert_eq!(out.get(2), Some(Scalar::Float64(5.5)));
    }

    #[test]
    fn test_reduction_rejected() {
        let x = col(&[1, 2, 3], 2);
        let mut env = Env::new();
        env.insert("x", Operand::Column(&x));
        assert!(matches!(
            eval("sum(x)", &env, &EvalOpts::default()),
            Err(ColzipError::ReductionNotSupported(_))
        ));
    }
}
