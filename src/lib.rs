//! # **Colzip** – Chunked, Compressed, Column-Oriented Numeric Containers
//!
//! In-memory compressed arrays and tables for data that is large, numeric,
//! and mostly appended: elements live in fixed-size zstd-compressed chunks
//! with an uncompressed *hot* tail, and every read path — random access,
//! slicing, iteration, expression evaluation — decompresses one chunk at a
//! time, so the working set stays bounded no matter how long the array is.
//!
//! ## Key pieces
//! - [`CArray<T>`] – chunked compressed sequence: append-only growth,
//!   `trim`/`resize`, random and strided reads, in-place updates grouped by
//!   chunk, and lazy iteration (including the `skip = -1` "last match only"
//!   shortcut).
//! - [`CTable`] – equal-length named columns with row views, dense record
//!   buffers, boolean-filtered iteration, and expression selection.
//! - [`eval`] – a block-streaming expression evaluator with two backends:
//!   *native* (vectorized kernels, rayon-parallel) and *host* (scalar
//!   reference interpreter), which agree element-wise.
//!
//! ## Example
//! ```rust
//! use colzip::{CArray, CTable, Column, EvalOpts};
//!
//! let x = CArray::from_slice(&(0..1000i64).collect::<Vec<_>>()).unwrap();
//! let table = CTable::new(vec![Column::from(x)], Some(vec!["x".into()])).unwrap();
//!
//! // Stream `x*2 + 1` through the block evaluator into a compressed column.
//! let doubled = table.eval("x * 2 + 1", &EvalOpts::default()).unwrap();
//! assert_eq!(doubled.into_column().unwrap().len(), 1000);
//!
//! // Filtered row iteration without materializing the table.
//! for row in table.rows_where("x > 995", None, 0, None).unwrap() {
//!     println!("{}", row);
//! }
//! ```
//!
//! ## Memory layout
//! All buffers are 64-byte aligned [`vec64::Vec64`]s, so decompressed
//! blocks land SIMD-ready for the native backend's kernels.

/// **DType**, **Scalar**, **Column**, **DenseArray**, **ColzipError** - *the dtype-erased surfaces*.
pub mod enums {
    pub mod column;
    pub mod dense;
    pub mod dtype;
    pub mod error;
    pub mod scalar;
}

/// **CArray**, **CTable**, **Chunk**, iterators, rows - *the storage containers*.
pub mod structs {
    pub mod carray;
    pub mod chunk;
    pub mod ctable;
    pub mod iters;
    pub mod row;
}

/// **Element**, **Numeric**, **Print** - *trait vocabulary*.
pub mod traits {
    pub mod print;
    pub mod type_unions;
}

/// The expression engine: parser, backends, and the block evaluator.
pub mod vm {
    pub mod eval;
    pub mod parser;
    pub(crate) mod host;
    pub(crate) mod native;
    pub(crate) mod value;
}

pub mod codec;
pub mod settings;

pub(crate) mod macros;
pub(crate) mod utils;

pub use codec::CParams;
pub use enums::column::Column;
pub use enums::dense::DenseArray;
pub use enums::dtype::{DType, RecordType};
pub use enums::error::ColzipError;
pub use enums::scalar::Scalar;
pub use settings::{
    detect_number_of_cores, eval_out_flavor, eval_vm, nthreads, set_eval_out_flavor, set_eval_vm,
    set_nthreads, OutFlavor, Vm,
};
pub use structs::carray::{CArray, CArrayOptions};
pub use structs::chunk::Chunk;
pub use structs::ctable::{CTable, RowIter, NROW};
pub use structs::iters::{CArrayIter, WhereTrue, WhereValues};
pub use structs::row::{Row, RowBatch};
pub use traits::print::Print;
pub use traits::type_unions::{Element, Float, Integer, Numeric};
pub use vm::eval::{eval, Env, EvalOpts, Evaluated, Operand};
