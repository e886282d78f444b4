//! # **DenseArray Module** - *Dtype-Erased Uncompressed Buffers*
//!
//! The uncompressed counterpart of [`crate::Column`]: a contiguous,
//! 64-byte aligned typed buffer behind a dtype tag. Slice materialization,
//! evaluator blocks and dense evaluator outputs, record-batch fields and
//! expression operands all travel as `DenseArray`.

use std::fmt;

use vec64::Vec64;

use crate::enums::dtype::DType;
use crate::enums::error::ColzipError;
use crate::enums::scalar::Scalar;
use crate::macros::with_dense;
use crate::traits::print::MAX_PREVIEW;
use crate::traits::type_unions::Element;

/// A dense, contiguous, dtype-tagged buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum DenseArray {
    Int8(Vec64<i8>),
    Int16(Vec64<i16>),
    Int32(Vec64<i32>),
    Int64(Vec64<i64>),
    UInt8(Vec64<u8>),
    UInt16(Vec64<u16>),
    UInt32(Vec64<u32>),
    UInt64(Vec64<u64>),
    Float32(Vec64<f32>),
    Float64(Vec64<f64>),
    Bool(Vec64<bool>),
}

impl DenseArray {
    /// Constructs an empty buffer of the given dtype.
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Int8 => DenseArray::Int8(Vec64::new()),
            DType::Int16 => DenseArray::Int16(Vec64::new()),
            DType::Int32 => DenseArray::Int32(Vec64::new()),
            DType::Int64 => DenseArray::Int64(Vec64::new()),
            DType::UInt8 => DenseArray::UInt8(Vec64::new()),
            DType::UInt16 => DenseArray::UInt16(Vec64::new()),
            DType::UInt32 => DenseArray::UInt32(Vec64::new()),
            DType::UInt64 => DenseArray::UInt64(Vec64::new()),
            DType::Float32 => DenseArray::Float32(Vec64::new()),
            DType::Float64 => DenseArray::Float64(Vec64::new()),
            DType::Bool => DenseArray::Bool(Vec64::new()),
        }
    }

    /// Constructs a buffer of `n` default-valued elements.
    pub fn with_len(dtype: DType, n: usize) -> Self {
        let mut out = Self::empty(dtype);
        with_dense!(&mut out, buf => buf.resize(n, Default::default()));
        out
    }

    /// Builds from a typed slice, copying into an aligned buffer.
    pub fn from_slice<T: Element>(slice: &[T]) -> Self
    where
        Vec64<T>: Into<DenseArray>,
    {
        let mut v = Vec64::with_capacity(slice.len());
        v.extend_from_slice(slice);
        v.into()
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            DenseArray::Int8(_) => DType::Int8,
            DenseArray::Int16(_) => DType::Int16,
            DenseArray::Int32(_) => DType::Int32,
            DenseArray::Int64(_) => DType::Int64,
            DenseArray::UInt8(_) => DType::UInt8,
            DenseArray::UInt16(_) => DType::UInt16,
            DenseArray::UInt32(_) => DType::UInt32,
            DenseArray::UInt64(_) => DType::UInt64,
            DenseArray::Float32(_) => DType::Float32,
            DenseArray::Float64(_) => DType::Float64,
            DenseArray::Bool(_) => DType::Bool,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        with_dense!(self, buf => buf.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.dtype().item_size()
    }

    /// Uncompressed size in bytes.
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.len() * self.item_size()
    }

    /// Element lookup as a dtype-erased scalar.
    pub fn get(&self, i: usize) -> Option<Scalar> {
        with_dense!(self, buf => buf.get(i).map(|v| v.into_scalar()))
    }

    /// Appends one scalar; the dtype must match exactly.
    pub fn push(&mut self, s: Scalar) -> Result<(), ColzipError> {
        let expected = self.dtype();
        with_dense!(self, buf => match Element::from_scalar(s) {
            Some(v) => {
                buf.push(v);
                Ok(())
            }
            None => Err(ColzipError::TypeMismatch {
                expected,
                found: s.dtype(),
            }),
        })
    }

    /// Appends all elements of `other`; the dtypes must match exactly.
    pub fn extend(&mut self, other: &DenseArray) -> Result<(), ColzipError> {
        use DenseArray::*;
        match (self, other) {
            (Int8(a), Int8(b)) => a.extend_from_slice(b),
            (Int16(a), Int16(b)) => a.extend_from_slice(b),
            (Int32(a), Int32(b)) => a.extend_from_slice(b),
            (Int64(a), Int64(b)) => a.extend_from_slice(b),
            (UInt8(a), UInt8(b)) => a.extend_from_slice(b),
            (UInt16(a), UInt16(b)) => a.extend_from_slice(b),
            (UInt32(a), UInt32(b)) => a.extend_from_slice(b),
            (UInt64(a), UInt64(b)) => a.extend_from_slice(b),
            (Float32(a), Float32(b)) => a.extend_from_slice(b),
            (Float64(a), Float64(b)) => a.extend_from_slice(b),
            (Bool(a), Bool(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(ColzipError::TypeMismatch {
                    expected: a.dtype(),
                    found: b.dtype(),
                });
            }
        }
        Ok(())
    }

    /// Copies `other` into `self` starting at `offset`; dtypes and bounds
    /// must line up.
    pub fn write_at(&mut self, offset: usize, other: &DenseArray) -> Result<(), ColzipError> {
        if offset + other.len() > self.len() {
            return Err(ColzipError::OutOfRange {
                index: offset + other.len(),
                len: self.len(),
            });
        }
        use DenseArray::*;
        match (self, other) {
            (Int8(a), Int8(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (Int16(a), Int16(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (Int32(a), Int32(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (Int64(a), Int64(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (UInt8(a), UInt8(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (UInt16(a), UInt16(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (UInt32(a), UInt32(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (UInt64(a), UInt64(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (Float32(a), Float32(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (Float64(a), Float64(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (Bool(a), Bool(b)) => a[offset..offset + b.len()].copy_from_slice(b),
            (a, b) => {
                return Err(ColzipError::TypeMismatch {
                    expected: a.dtype(),
                    found: b.dtype(),
                });
            }
        }
        Ok(())
    }

    /// Clones the `[start, stop)` window into a new buffer.
    pub fn slice_range(&self, start: usize, stop: usize) -> DenseArray {
        let stop = stop.min(self.len());
        let start = start.min(stop);
        crate::macros::dense_map!(self, buf => {
            let mut v = Vec64::with_capacity(stop - start);
            v.extend_from_slice(&buf[start..stop]);
            v
        })
    }

    pub fn truncate(&mut self, n: usize) {
        with_dense!(self, buf => buf.truncate(n));
    }
}

macro_rules! impl_dense_from {
    ($($prim:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<Vec64<$prim>> for DenseArray {
                #[inline]
                fn from(v: Vec64<$prim>) -> Self {
                    DenseArray::$variant(v)
                }
            }
        )+
    };
}

impl_dense_from!(
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

impl fmt::Display for DenseArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.len();
        writeln!(f, "DenseArray [{} values] (dtype: {})", len, self.dtype())?;
        write!(f, "[")?;
        for i in 0..len.min(MAX_PREVIEW) {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.get(i) {
                Some(v) => write!(f, "{}", v)?,
                None => break,
            }
        }
        if len > MAX_PREVIEW {
            write!(f, ", … ({} total)", len)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_and_get() {
        let d = DenseArray::from_slice(&[1i64, 2, 3]);
        assert_eq!(d.dtype(), DType::Int64);
        assert_eq!(d.len(), 3);
        assert_eq!(d.get(2), Some(Scalar::Int64(3)));
        assert_eq!(d.get(3), None);
    }

    #[test]
    fn test_push_type_checked() {
        let mut d = DenseArray::empty(DType::Float32);
        d.push(Scalar::Float32(1.5)).unwrap();
        assert!(d.push(Scalar::Int64(1)).is_err());
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_extend_and_write_at() {
        let mut d = DenseArray::with_len(DType::Int32, 4);
        let src = DenseArray::from_slice(&[7i32, 8]);
        d.write_at(1, &src).unwrap();
        assert_eq!(d.get(1), Some(Scalar::Int32(7)));
        assert_eq!(d.get(2), Some(Scalar::Int32(8)));
        assert!(d.write_at(3, &src).is_err());

        let mut e = DenseArray::from_slice(&[1i32]);
        e.extend(&src).unwrap();
        assert_eq!(e.len(), 3);
        assert!(e.extend(&DenseArray::from_slice(&[true])).is_err());
    }

    #[test]
    fn test_slice_range() {
        let d = DenseArray::from_slice(&[0u16, 1, 2, 3, 4]);
        let s = d.slice_range(1, 4);
        assert_eq!(s, DenseArray::from_slice(&[1u16, 2, 3]));
        let clamped = d.slice_range(3, 99);
        assert_eq!(clamped.len(), 2);
    }
}
