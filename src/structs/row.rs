//! # **Row Module** - *Row Views and Dense Record Buffers*
//!
//! A [`Row`] is one table row addressable by position or by field name; a
//! [`RowBatch`] is the dense record buffer — one uncompressed
//! [`DenseArray`] per field — that slicing, gathering and filtering a
//! [`crate::CTable`] hand back.

use std::fmt::{Display, Formatter};
use std::ops::Index;
use std::sync::Arc;

use crate::enums::dtype::RecordType;
use crate::enums::error::ColzipError;
use crate::enums::scalar::Scalar;
use crate::DenseArray;

/// One record: field names shared with the producing iterator/table, plus
/// one scalar per field.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<Scalar>,
}

impl Row {
    pub fn new(names: Arc<[String]>, values: Vec<Scalar>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    /// Field lookup by name.
    pub fn get(&self, name: &str) -> Option<Scalar> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn record_type(&self) -> RecordType {
        RecordType::new(
            self.names
                .iter()
                .zip(&self.values)
                .map(|(n, v)| (n.clone(), v.dtype()))
                .collect(),
        )
    }
}

impl Index<usize> for Row {
    type Output = Scalar;

    fn index(&self, i: usize) -> &Scalar {
        &self.values[i]
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", self.names[i], v)?;
        }
        write!(f, ")")
    }
}

/// Dense record buffer: equal-length uncompressed fields in column order.
#[derive(Clone, Debug, PartialEq)]
pub struct RowBatch {
    names: Arc<[String]>,
    cols: Vec<DenseArray>,
}

impl RowBatch {
    /// Builds from parallel name/field lists; fields must have equal length.
    pub fn new(names: Vec<String>, cols: Vec<DenseArray>) -> Result<Self, ColzipError> {
        if names.len() != cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: names.len(),
                found: cols.len(),
            });
        }
        if let Some(first) = cols.first() {
            let expected = first.len();
            for col in &cols[1..] {
                if col.len() != expected {
                    return Err(ColzipError::LengthMismatch {
                        expected,
                        found: col.len(),
                    });
                }
            }
        }
        Ok(Self {
            names: names.into(),
            cols,
        })
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.cols.first().map(DenseArray::len).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn cols(&self) -> &[DenseArray] {
        &self.cols
    }

    /// Field lookup by name.
    pub fn col(&self, name: &str) -> Result<&DenseArray, ColzipError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.cols[i])
            .ok_or_else(|| ColzipError::UnknownColumn(name.to_string()))
    }

    pub fn record_type(&self) -> RecordType {
        RecordType::new(
            self.names
                .iter()
                .zip(&self.cols)
                .map(|(n, c)| (n.clone(), c.dtype()))
                .collect(),
        )
    }

    /// Row view at `i`.
    pub fn row(&self, i: usize) -> Result<Row, ColzipError> {
        if i >= self.len() {
            return Err(ColzipError::OutOfRange {
                index: i,
                len: self.len(),
            });
        }
        let values = self
            .cols
            .iter()
            .map(|c| c.get(i).expect("row index checked against batch length"))
            .collect();
        Ok(Row::new(self.names.clone(), values))
    }

    /// Iterates over row views.
    pub fn iter_rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.len()).map(|i| {
            self.row(i)
                .expect("row index bounded by batch length")
        })
    }
}

impl Display for RowBatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "RowBatch [{} rows] {}",
            self.len(),
            self.record_type()
        )?;
        for (i, row) in self.iter_rows().take(crate::traits::print::MAX_PREVIEW).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}", row)?;
        }
        if self.len() > crate::traits::print::MAX_PREVIEW {
            write!(f, "\n  … ({} total)", self.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::dtype::DType;

    fn batch() -> RowBatch {
        RowBatch::new(
            vec!["x".into(), "flag".into()],
            vec![
                DenseArray::from_slice(&[1i64, 2, 3]),
                DenseArray::from_slice(&[true, false, true]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_batch_shape_checks() {
        assert!(RowBatch::new(vec!["a".into()], vec![]).is_err());
        let uneven = RowBatch::new(
            vec!["a".into(), "b".into()],
            vec![
                DenseArray::from_slice(&[1i64]),
                DenseArray::from_slice(&[1i64, 2]),
            ],
        );
        assert!(matches!(uneven, Err(ColzipError::LengthMismatch { .. })));
    }

    #[test]
    fn test_row_access() {
        let b = batch();
        assert_eq!(b.len(), 3);
        let row = b.row(1).unwrap();
        assert_eq!(row.get("x"), Some(Scalar::Int64(2)));
        assert_eq!(row.get("flag"), Some(Scalar::Bool(false)));
        assert_eq!(row[0], Scalar::Int64(2));
        assert_eq!(row.get("missing"), None);
        assert!(b.row(3).is_err());
    }

    #[test]
    fn test_record_type() {
        let b = batch();
        let rt = b.record_type();
        assert_eq!(rt.dtype_of("x"), Some(DType::Int64));
        assert_eq!(rt.dtype_of("flag"), Some(DType::Bool));
    }

    #[test]
    fn test_iter_rows() {
        let b = batch();
        let xs: Vec<Scalar> = b.iter_rows().map(|r| r[0]).collect();
        assert_eq!(
            xs,
            vec![Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(3)]
        );
    }
}
