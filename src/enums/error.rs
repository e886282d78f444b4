//! # **Error Module** - Custom *Colzip* Error Type
//!
//! Defines the unified error type for the crate.
//!
//! ## Covers
//! - Index and trim bounds, dtype and shape disagreements, unequal operand
//!   lengths, table column management, expression name resolution, evaluator
//!   backend limits, configuration validation, and codec failures.
//! - Implements `Display` for readable output and `Error` for integration
//!   with standard Rust error handling.

use std::error::Error;
use std::fmt;

use crate::enums::dtype::DType;

/// Catch all error type for `colzip`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColzipError {
    /// Index or trim count beyond bounds.
    OutOfRange {
        index: usize,
        len: usize,
    },
    /// Operand dtype disagrees with the target.
    TypeMismatch {
        expected: DType,
        found: DType,
    },
    /// Item size or field count disagrees with the target.
    ShapeMismatch {
        expected: usize,
        found: usize,
    },
    /// Operands of unequal length in an expression or table operation.
    LengthMismatch {
        expected: usize,
        found: usize,
    },
    /// Key neither a column name nor a boolean-producing expression,
    /// or otherwise unusable for the requested access.
    InvalidKey {
        key: String,
        reason: String,
    },
    /// Column name collision on insert.
    DuplicateColumn(String),
    /// Column lookup miss.
    UnknownColumn(String),
    /// Expression references an unresolvable identifier.
    UnknownName(String),
    /// Dtype the selected backend cannot evaluate (e.g. 64-bit unsigned
    /// operands on the native backend).
    UnsupportedType {
        name: String,
        dtype: DType,
    },
    /// Operand has a length but no element dtype.
    UnsupportedOperand(String),
    /// The block backend produced a lower-rank result than its inputs.
    ReductionNotSupported(String),
    /// `clevel` out of range, bad vm / output flavor, or similar.
    InvalidConfig(String),
    /// The expression does not parse or compile in the supported dialect.
    InvalidExpression(String),
    /// The compression backend failed.
    Codec(String),
}

impl fmt::Display for ColzipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColzipError::OutOfRange { index, len } => {
                write!(f, "Out of range: index {} beyond length {}.", index, len)
            }
            ColzipError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}.", expected, found)
            }
            ColzipError::ShapeMismatch { expected, found } => {
                write!(f, "Shape mismatch: expected {}, found {}.", expected, found)
            }
            ColzipError::LengthMismatch { expected, found } => {
                write!(
                    f,
                    "Length mismatch: expected {}, found {}.",
                    expected, found
                )
            }
            ColzipError::InvalidKey { key, reason } => {
                write!(f, "Invalid key '{}': {}.", key, reason)
            }
            ColzipError::DuplicateColumn(name) => {
                write!(f, "Column '{}' already exists.", name)
            }
            ColzipError::UnknownColumn(name) => {
                write!(f, "Column '{}' not found.", name)
            }
            ColzipError::UnknownName(name) => {
                write!(f, "Variable name '{}' not found.", name)
            }
            ColzipError::UnsupportedType { name, dtype } => {
                write!(
                    f,
                    "Unsupported type: operand '{}' has dtype {}, which the selected backend cannot evaluate.",
                    name, dtype
                )
            }
            ColzipError::UnsupportedOperand(name) => {
                write!(
                    f,
                    "Unsupported operand: '{}' has a length but no element dtype.",
                    name
                )
            }
            ColzipError::ReductionNotSupported(what) => {
                write!(f, "Reduction operations are not supported: {}.", what)
            }
            ColzipError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}.", msg),
            ColzipError::InvalidExpression(msg) => write!(f, "Invalid expression: {}.", msg),
            ColzipError::Codec(msg) => write!(f, "Codec error: {}.", msg),
        }
    }
}

impl Error for ColzipError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_contains_context() {
        let e = ColzipError::OutOfRange { index: 12, len: 10 };
        assert!(e.to_string().contains("12"));
        assert!(e.to_string().contains("10"));

        let e = ColzipError::TypeMismatch {
            expected: DType::Int64,
            found: DType::Float32,
        };
        assert!(e.to_string().contains("int64"));
        assert!(e.to_string().contains("float32"));
    }

    #[test]
    fn test_is_std_error() {
        fn takes_err(_: &dyn Error) {}
        takes_err(&ColzipError::DuplicateColumn("x".into()));
    }
}
