//! # **Settings Module** - *Process-Wide Defaults*
//!
//! Initialized-once global knobs: the default expression backend, the
//! default evaluator output flavor, and the worker-thread count shared by
//! the compression codec and the native backend.

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::enums::error::ColzipError;

/// Expression backend selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vm {
    /// Vectorized, multithreaded block kernels.
    Native,
    /// Scalar tree-walking reference interpreter.
    Host,
}

impl FromStr for Vm {
    type Err = ColzipError;

    fn from_str(s: &str) -> Result<Self, ColzipError> {
        match s {
            "native" => Ok(Vm::Native),
            "host" => Ok(Vm::Host),
            other => Err(ColzipError::InvalidConfig(format!(
                "vm must be 'native' or 'host', got '{}'",
                other
            ))),
        }
    }
}

/// Evaluator output flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutFlavor {
    /// Compressed column output.
    Column,
    /// Dense uncompressed output.
    Dense,
}

impl FromStr for OutFlavor {
    type Err = ColzipError;

    fn from_str(s: &str) -> Result<Self, ColzipError> {
        match s {
            "column" | "carray" => Ok(OutFlavor::Column),
            "dense" => Ok(OutFlavor::Dense),
            other => Err(ColzipError::InvalidConfig(format!(
                "out_flavor must be 'column' or 'dense', got '{}'",
                other
            ))),
        }
    }
}

static EVAL_VM: AtomicU8 = AtomicU8::new(0); // 0 = native, 1 = host
static OUT_FLAVOR: AtomicU8 = AtomicU8::new(0); // 0 = column, 1 = dense
static NTHREADS: AtomicUsize = AtomicUsize::new(0); // 0 = not set, use core count

/// Number of cores in this system.
pub fn detect_number_of_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Sets the worker-thread count used by compression and the native
/// backend, returning the previous setting.
///
/// The rayon global pool is sized from the first value observed when it
/// spins up; later calls still bound how many parallel slices the native
/// backend hands it.
pub fn set_nthreads(n: usize) -> usize {
    let n = n.max(1);
    let prev = NTHREADS.swap(n, Ordering::SeqCst);
    let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    if prev == 0 { detect_number_of_cores() } else { prev }
}

/// The current worker-thread count.
pub fn nthreads() -> usize {
    match NTHREADS.load(Ordering::SeqCst) {
        0 => detect_number_of_cores(),
        n => n,
    }
}

/// Sets the default expression backend, returning the previous one.
pub fn set_eval_vm(vm: Vm) -> Vm {
    let prev = EVAL_VM.swap(vm as u8, Ordering::SeqCst);
    if prev == 0 { Vm::Native } else { Vm::Host }
}

/// The default expression backend.
pub fn eval_vm() -> Vm {
    if EVAL_VM.load(Ordering::SeqCst) == 0 {
        Vm::Native
    } else {
        Vm::Host
    }
}

/// Sets the default evaluator output flavor, returning the previous one.
pub fn set_eval_out_flavor(flavor: OutFlavor) -> OutFlavor {
    let prev = OUT_FLAVOR.swap(flavor as u8, Ordering::SeqCst);
    if prev == 0 { OutFlavor::Column } else { OutFlavor::Dense }
}

/// The default evaluator output flavor.
pub fn eval_out_flavor() -> OutFlavor {
    if OUT_FLAVOR.load(Ordering::SeqCst) == 0 {
        OutFlavor::Column
    } else {
        OutFlavor::Dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_and_flavor() {
        assert_eq!("native".parse::<Vm>().unwrap(), Vm::Native);
        assert_eq!("host".parse::<Vm>().unwrap(), Vm::Host);
        assert!("python".parse::<Vm>().is_err());
        assert_eq!("carray".parse::<OutFlavor>().unwrap(), OutFlavor::Column);
        assert_eq!("dense".parse::<OutFlavor>().unwrap(), OutFlavor::Dense);
        assert!("numpy2".parse::<OutFlavor>().is_err());
    }

    #[test]
    fn test_nthreads_roundtrip() {
        let first = set_nthreads(3);
        assert!(first >= 1);
        assert_eq!(nthreads(), 3);
        assert_eq!(set_nthreads(2), 3);
        assert_eq!(nthreads(), 2);
    }

    #[test]
    fn test_detect_cores_positive() {
        assert!(detect_number_of_cores() >= 1);
    }
}
