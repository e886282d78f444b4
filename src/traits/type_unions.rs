//! # **Type Unions** - *Trait vocabulary for the crate's element universe*
//!
//! Constrains the *num-traits* hierarchy to the fixed-width types this crate
//! stores, and binds every storable primitive to its [`DType`] descriptor and
//! [`Scalar`] conversion through the [`Element`] trait.

use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, Num, NumCast, PrimInt, ToPrimitive};

use crate::enums::dtype::DType;
use crate::enums::scalar::Scalar;

/// Trait for types valid as float elements in compressed columns.
///
/// Extends and constrains the *num-traits* `Float` implementation to fit the
/// crate's type universe.
pub trait Float: NumFloat + Copy + Default + ToPrimitive + PartialEq + 'static {}
impl Float for f32 {}
impl Float for f64 {}

/// Trait for types valid as integer elements in compressed columns.
pub trait Integer: PrimInt + Default + Debug + ToPrimitive + 'static {}
impl Integer for i8 {}
impl Integer for i16 {}
impl Integer for i32 {}
impl Integer for i64 {}
impl Integer for u8 {}
impl Integer for u16 {}
impl Integer for u32 {}
impl Integer for u64 {}

/// Trait for types valid as numerical.
///
/// Useful when specifying `my_fn::<T: Numeric>() {}`, e.g. for `arange`.
pub trait Numeric: Num + NumCast + Copy + Default + ToPrimitive + PartialEq + 'static {}
impl Numeric for f32 {}
impl Numeric for f64 {}
impl Numeric for i8 {}
impl Numeric for i16 {}
impl Numeric for i32 {}
impl Numeric for i64 {}
impl Numeric for u8 {}
impl Numeric for u16 {}
impl Numeric for u32 {}
impl Numeric for u64 {}

/// Trait for every primitive a [`crate::CArray`] can store: fixed-width
/// plain-old-data with a known [`DType`] and a [`Scalar`] embedding.
pub trait Element:
    Copy + Default + PartialEq + Debug + Display + Send + Sync + 'static
{
    const DTYPE: DType;

    fn into_scalar(self) -> Scalar;

    /// Exact-dtype extraction; `None` when the scalar carries another dtype.
    fn from_scalar(s: Scalar) -> Option<Self>;
}

macro_rules! impl_element {
    ($($prim:ty => $variant:ident),+ $(,)?) => {
        $(
            impl Element for $prim {
                const DTYPE: DType = DType::$variant;

                #[inline]
                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                #[inline]
                fn from_scalar(s: Scalar) -> Option<Self> {
                    match s {
                        Scalar::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_element!(
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtype() {
        assert_eq!(<i64 as Element>::DTYPE, DType::Int64);
        assert_eq!(<bool as Element>::DTYPE, DType::Bool);
        assert_eq!(<f32 as Element>::DTYPE, DType::Float32);
    }

    #[test]
    fn test_scalar_roundtrip() {
        let s = 42u16.into_scalar();
        assert_eq!(u16::from_scalar(s), Some(42));
        assert_eq!(u32::from_scalar(s), None);
    }
}
