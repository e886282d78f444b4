//! # **Column Module** - *Dtype-Erased Compressed Columns*
//!
//! `Column` wraps a typed [`CArray`] behind a dtype tag so tables and the
//! expression evaluator can hold mixed-type collections. The typed arrays
//! stay the workhorse; this enum is the dispatch layer, with the dtype
//! macros expanding each operation once per variant.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use vec64::Vec64;

use crate::codec::CParams;
use crate::enums::dtype::DType;
use crate::enums::error::ColzipError;
use crate::enums::scalar::Scalar;
use crate::macros::{column_to_dense, dense_to_column, with_column, zip_column_dense};
use crate::structs::carray::{CArray, CArrayOptions};
use crate::structs::iters::ChunkCache;
use crate::traits::type_unions::Element;
use crate::DenseArray;

/// A compressed column of any supported dtype.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Int8(CArray<i8>),
    Int16(CArray<i16>),
    Int32(CArray<i32>),
    Int64(CArray<i64>),
    UInt8(CArray<u8>),
    UInt16(CArray<u16>),
    UInt32(CArray<u32>),
    UInt64(CArray<u64>),
    Float32(CArray<f32>),
    Float64(CArray<f64>),
    Bool(CArray<bool>),
}

impl Column {
    /// Compresses a dense buffer into a fresh column.
    pub fn from_dense(
        dense: &DenseArray,
        cparams: CParams,
        expectedlen: Option<usize>,
    ) -> Result<Self, ColzipError> {
        Ok(dense_to_column!(dense, buf => {
            CArray::from_slice_with(
                buf,
                CArrayOptions {
                    cparams,
                    dflt: Default::default(),
                    expectedlen,
                    chunklen: None,
                },
            )?
        }))
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            Column::Int8(_) => DType::Int8,
            Column::Int16(_) => DType::Int16,
            Column::Int32(_) => DType::Int32,
            Column::Int64(_) => DType::Int64,
            Column::UInt8(_) => DType::UInt8,
            Column::UInt16(_) => DType::UInt16,
            Column::UInt32(_) => DType::UInt32,
            Column::UInt64(_) => DType::UInt64,
            Column::Float32(_) => DType::Float32,
            Column::Float64(_) => DType::Float64,
            Column::Bool(_) => DType::Bool,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        with_column!(self, arr => arr.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        with_column!(self, arr => arr.is_empty())
    }

    #[inline]
    pub fn chunklen(&self) -> usize {
        with_column!(self, arr => arr.chunklen())
    }

    /// Uncompressed size in bytes.
    pub fn nbytes(&self) -> usize {
        with_column!(self, arr => arr.nbytes())
    }

    /// Compressed size in bytes.
    pub fn cbytes(&self) -> usize {
        with_column!(self, arr => arr.cbytes())
    }

    /// Element lookup as a dtype-erased scalar.
    pub fn get(&self, i: usize) -> Result<Scalar, ColzipError> {
        with_column!(self, arr => arr.get(i).map(Element::into_scalar))
    }

    /// In-place single-element write; the scalar dtype must match exactly.
    pub fn set_scalar(&mut self, i: usize, value: Scalar) -> Result<(), ColzipError> {
        let expected = self.dtype();
        with_column!(self, arr => match Element::from_scalar(value) {
            Some(v) => arr.set(i, v),
            None => Err(ColzipError::TypeMismatch {
                expected,
                found: value.dtype(),
            }),
        })
    }

    /// Scatter-writes one broadcast scalar at `indices`.
    pub fn set_rows_scalar(
        &mut self,
        indices: &[usize],
        value: Scalar,
    ) -> Result<(), ColzipError> {
        let expected = self.dtype();
        with_column!(self, arr => match Element::from_scalar(value) {
            Some(v) => arr.set_indices(indices, &[v]),
            None => Err(ColzipError::TypeMismatch {
                expected,
                found: value.dtype(),
            }),
        })
    }

    /// Scatter-writes a dense buffer (one value per index) at `indices`.
    pub fn set_rows_dense(
        &mut self,
        indices: &[usize],
        values: &DenseArray,
    ) -> Result<(), ColzipError> {
        let (expected, found) = (self.dtype(), values.dtype());
        zip_column_dense!(self, values, arr, buf => arr.set_indices(indices, buf),
            _ => Err(ColzipError::TypeMismatch { expected, found }))
    }

    /// Scatter-writes a dense buffer over the strided range `[start, stop)`.
    pub fn set_range_dense(
        &mut self,
        start: usize,
        stop: Option<usize>,
        step: usize,
        values: &DenseArray,
    ) -> Result<(), ColzipError> {
        let (expected, found) = (self.dtype(), values.dtype());
        zip_column_dense!(self, values, arr, buf => arr.set_range(start, stop, step, buf),
            _ => Err(ColzipError::TypeMismatch { expected, found }))
    }

    /// Appends a dense buffer of the same dtype.
    pub fn append_dense(&mut self, values: &DenseArray) -> Result<(), ColzipError> {
        let (expected, found) = (self.dtype(), values.dtype());
        zip_column_dense!(self, values, arr, buf => arr.append(buf),
            _ => Err(ColzipError::TypeMismatch { expected, found }))
    }

    /// Appends one scalar of the same dtype.
    pub fn append_scalar(&mut self, value: Scalar) -> Result<(), ColzipError> {
        let expected = self.dtype();
        with_column!(self, arr => match Element::from_scalar(value) {
            Some(v) => arr.append_one(v),
            None => Err(ColzipError::TypeMismatch {
                expected,
                found: value.dtype(),
            }),
        })
    }

    pub fn trim(&mut self, n: usize) -> Result<(), ColzipError> {
        with_column!(self, arr => arr.trim(n))
    }

    pub fn resize(&mut self, n: usize) -> Result<(), ColzipError> {
        with_column!(self, arr => arr.resize(n))
    }

    /// Strided slice materialized as a dense buffer.
    pub fn slice(
        &self,
        start: usize,
        stop: Option<usize>,
        step: usize,
    ) -> Result<DenseArray, ColzipError> {
        Ok(column_to_dense!(self, arr => arr.slice(start, stop, step)?))
    }

    /// Full materialization.
    pub fn to_dense(&self) -> DenseArray {
        column_to_dense!(self, arr => arr.to_vec())
    }

    /// Copies the window `[start, min(start + n, len))` into `out`, which
    /// must carry the same dtype; its allocation is reused across calls.
    pub fn read_range(
        &self,
        start: usize,
        n: usize,
        out: &mut DenseArray,
    ) -> Result<(), ColzipError> {
        let (expected, found) = (self.dtype(), out.dtype());
        zip_column_dense!(self, out, arr, buf => {
            arr.read_range(start, n, buf);
            Ok(())
        }, _ => Err(ColzipError::TypeMismatch { expected, found }))
    }

    /// Row-wise gather at arbitrary indices.
    pub fn take(&self, indices: &[usize]) -> Result<DenseArray, ColzipError> {
        let len = self.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(ColzipError::OutOfRange { index: bad, len });
        }
        Ok(column_to_dense!(self, arr => {
            let mut cache = ChunkCache::new();
            let mut out = Vec64::with_capacity(indices.len());
            for &i in indices {
                out.push(cache.value_at(arr, i));
            }
            out
        }))
    }

    /// Dense buffer of the elements where `mask` is true.
    pub fn filter_mask(&self, mask: &CArray<bool>) -> Result<DenseArray, ColzipError> {
        Ok(column_to_dense!(self, arr => {
            let mut out = Vec64::new();
            for v in arr.where_values(mask, 0, None)? {
                out.push(v);
            }
            out
        }))
    }

    /// Lazy strided iteration yielding dtype-erased scalars.
    pub fn iter_scalars(
        &self,
        start: usize,
        stop: Option<usize>,
        step: usize,
        limit: Option<usize>,
        skip: isize,
    ) -> Result<Box<dyn Iterator<Item = Scalar> + '_>, ColzipError> {
        with_column!(self, arr => {
            let iter = arr.iter_opts(start, stop, step, limit, skip)?;
            Ok(Box::new(iter.map(Element::into_scalar)) as Box<dyn Iterator<Item = Scalar> + '_>)
        })
    }

    /// Appends every element of a column of the same dtype, streamed chunk
    /// by chunk.
    pub fn append_column(&mut self, other: &Column) -> Result<(), ColzipError> {
        let (expected, found) = (self.dtype(), other.dtype());
        crate::macros::zip_columns!(self, other, a, b => a.append_from(b),
            _ => Err(ColzipError::TypeMismatch { expected, found }))
    }

    /// Lazy value-at-mask iteration yielding dtype-erased scalars.
    pub fn where_scalars<'a>(
        &'a self,
        mask: &'a CArray<bool>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<Box<dyn Iterator<Item = Scalar> + 'a>, ColzipError> {
        with_column!(self, arr => {
            let iter = arr.where_values(mask, skip, limit)?;
            Ok(Box::new(iter.map(Element::into_scalar)) as Box<dyn Iterator<Item = Scalar> + 'a>)
        })
    }

    /// Lazy value-at-mask iteration over a shared boolean mask, yielding
    /// dtype-erased scalars.
    pub(crate) fn where_scalars_shared(
        &self,
        mask: Arc<CArray<bool>>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<Box<dyn Iterator<Item = Scalar> + '_>, ColzipError> {
        with_column!(self, arr => {
            let iter = crate::structs::iters::WhereValues::new_shared(arr, mask, skip, limit)?;
            Ok(Box::new(iter.map(Element::into_scalar)) as Box<dyn Iterator<Item = Scalar> + '_>)
        })
    }

    /// Streams into a fresh column recompressed with `cparams`.
    pub fn copy_with(&self, cparams: CParams) -> Result<Column, ColzipError> {
        Ok(crate::macros::column_map!(self, arr => arr.copy_with(CArrayOptions {
            cparams,
            dflt: arr.dflt(),
            expectedlen: Some(arr.len()),
            chunklen: None,
        })?))
    }

    /// Borrow as a boolean array, when this column is boolean.
    pub fn as_bool(&self) -> Option<&CArray<bool>> {
        match self {
            Column::Bool(arr) => Some(arr),
            _ => None,
        }
    }

    /// Unwraps into a boolean array, failing with `TypeMismatch` otherwise.
    pub fn into_bool(self) -> Result<CArray<bool>, ColzipError> {
        match self {
            Column::Bool(arr) => Ok(arr),
            other => Err(ColzipError::TypeMismatch {
                expected: DType::Bool,
                found: other.dtype(),
            }),
        }
    }
}

macro_rules! impl_column_from {
    ($($prim:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<CArray<$prim>> for Column {
                #[inline]
                fn from(arr: CArray<$prim>) -> Self {
                    Column::$variant(arr)
                }
            }
        )+
    };
}

impl_column_from!(
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

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        with_column!(self, arr => arr.fmt(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col_i64(data: &[i64]) -> Column {
        Column::from(CArray::from_slice(data).unwrap())
    }

    #[test]
    fn test_from_dense_roundtrip() {
        let dense = DenseArray::from_slice(&[1i64, 2, 3, 4]);
        let col = Column::from_dense(&dense, CParams::default(), None).unwrap();
        assert_eq!(col.dtype(), DType::Int64);
        assert_eq!(col.len(), 4);
        assert_eq!(col.to_dense(), dense);
    }

    #[test]
    fn test_scalar_access_and_write() {
        let mut col = col_i64(&[10, 20, 30]);
        assert_eq!(col.get(1).unwrap(), Scalar::Int64(20));
        col.set_scalar(1, Scalar::Int64(-1)).unwrap();
        assert_eq!(col.get(1).unwrap(), Scalar::Int64(-1));
        assert!(col.set_scalar(1, Scalar::Int32(5)).is_err());
        assert!(col.get(3).is_err());
    }

    #[test]
    fn test_append_dense_type_checked() {
        let mut col = col_i64(&[1, 2]);
        col.append_dense(&DenseArray::from_slice(&[3i64, 4])).unwrap();
        assert_eq!(col.len(), 4);
        let err = col.append_dense(&DenseArray::from_slice(&[1.0f64]));
        assert!(matches!(err, Err(ColzipError::TypeMismatch { .. })));
    }

    #[test]
    fn test_take_and_filter() {
        let col = col_i64(&[0, 10, 20, 30, 40]);
        let got = col.take(&[4, 0, 2]).unwrap();
        assert_eq!(got, DenseArray::from_slice(&[40i64, 0, 20]));
        assert!(col.take(&[5]).is_err());

        let mask = CArray::from_slice(&[false, true, false, true, false]).unwrap();
        let picked = col.filter_mask(&mask).unwrap();
        assert_eq!(picked, DenseArray::from_slice(&[10i64, 30]));
    }

    #[test]
    fn test_iter_scalars() {
        let col = col_i64(&[5, 6, 7, 8]);
        let got: Vec<Scalar> = col.iter_scalars(1, None, 2, None, 0).unwrap().collect();
        assert_eq!(got, vec![Scalar::Int64(6), Scalar::Int64(8)]);
    }

    #[test]
    fn test_into_bool() {
        let col = Column::from(CArray::from_slice(&[true, false]).unwrap());
        assert!(col.as_bool().is_some());
        assert!(col.into_bool().is_ok());
        let not_bool = col_i64(&[1]);
        assert!(matches!(
            not_bool.into_bool(),
            Err(ColzipError::TypeMismatch { .. })
        ));
    }
}
