//! # **Scalar Module** - *Dtype-Erased Single Values*
//!
//! A unified scalar type for single elements crossing the dtype-erased
//! surfaces: row views, evaluator environments, and element lookups on
//! [`crate::Column`].
//!
//! When working with a concrete `CArray<T>` prefer the typed `T` directly;
//! `Scalar` exists for the enum-dispatch layer.

use std::fmt;

use crate::enums::dtype::DType;

/// A single dtype-tagged value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
}

impl Scalar {
    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Int8(_) => DType::Int8,
            Scalar::Int16(_) => DType::Int16,
            Scalar::Int32(_) => DType::Int32,
            Scalar::Int64(_) => DType::Int64,
            Scalar::UInt8(_) => DType::UInt8,
            Scalar::UInt16(_) => DType::UInt16,
            Scalar::UInt32(_) => DType::UInt32,
            Scalar::UInt64(_) => DType::UInt64,
            Scalar::Float32(_) => DType::Float32,
            Scalar::Float64(_) => DType::Float64,
            Scalar::Bool(_) => DType::Bool,
        }
    }

    /// Widens to `f64`. Lossless except for `u64`/`i64` magnitudes beyond
    /// 2^53, matching the usual float widening rules.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        match *self {
            Scalar::Int8(v) => v as f64,
            Scalar::Int16(v) => v as f64,
            Scalar::Int32(v) => v as f64,
            Scalar::Int64(v) => v as f64,
            Scalar::UInt8(v) => v as f64,
            Scalar::UInt16(v) => v as f64,
            Scalar::UInt32(v) => v as f64,
            Scalar::UInt64(v) => v as f64,
            Scalar::Float32(v) => v as f64,
            Scalar::Float64(v) => v,
            Scalar::Bool(v) => v as u8 as f64,
        }
    }

    /// Widens signed and small unsigned integers to `i64`.
    /// `None` for floats, bools and out-of-range `u64`.
    #[inline]
    pub fn to_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Int8(v) => Some(v as i64),
            Scalar::Int16(v) => Some(v as i64),
            Scalar::Int32(v) => Some(v as i64),
            Scalar::Int64(v) => Some(v),
            Scalar::UInt8(v) => Some(v as i64),
            Scalar::UInt16(v) => Some(v as i64),
            Scalar::UInt32(v) => Some(v as i64),
            Scalar::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Scalar::Bool(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_scalar_from {
    ($($prim:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$prim> for Scalar {
                #[inline]
                fn from(v: $prim) -> Self {
                    Scalar::$variant(v)
                }
            }
        )+
    };
}

impl_scalar_from!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    bool => Bool,
);

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int8(v) => write!(f, "{}", v),
            Scalar::Int16(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::Int64(v) => write!(f, "{}", v),
            Scalar::UInt8(v) => write!(f, "{}", v),
            Scalar::UInt16(v) => write!(f, "{}", v),
            Scalar::UInt32(v) => write!(f, "{}", v),
            Scalar::UInt64(v) => write!(f, "{}", v),
            Scalar::Float32(v) => write!(f, "{}", v),
            Scalar::Float64(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_and_from() {
        assert_eq!(Scalar::from(3i32).dtype(), DType::Int32);
        assert_eq!(Scalar::from(3u64).dtype(), DType::UInt64);
        assert_eq!(Scalar::from(true).dtype(), DType::Bool);
    }

    #[test]
    fn test_widening() {
        assert_eq!(Scalar::Int16(-7).to_f64(), -7.0);
        assert_eq!(Scalar::UInt32(9).to_i64(), Some(9));
        assert_eq!(Scalar::UInt64(u64::MAX).to_i64(), None);
        assert_eq!(Scalar::Float64(1.5).to_i64(), None);
        assert_eq!(Scalar::Bool(true).as_bool(), Some(true));
        assert_eq!(Scalar::Int8(1).as_bool(), None);
    }
}
