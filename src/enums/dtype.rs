//! # **DType Module** - *Element Type Descriptors*
//!
//! Fixed-width numeric element descriptors for columns and dense buffers,
//! plus the record descriptor used by table row views.
//!
//! Record types exist only as the schema of a [`crate::Row`] /
//! [`crate::RowBatch`]; a `CArray` element is always one of the scalar
//! variants below.

use std::fmt;

/// Fixed-width element type of a column, dense buffer or scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
}

impl DType {
    /// Width of one element in bytes.
    #[inline]
    pub fn item_size(&self) -> usize {
        match self {
            DType::Int8 | DType::UInt8 | DType::Bool => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::Int16
                | DType::Int32
                | DType::Int64
                | DType::UInt8
                | DType::UInt16
                | DType::UInt32
                | DType::UInt64
        )
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, DType::Bool)
    }

    /// Canonical lowercase name, NumPy-style.
    pub fn name(&self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered `(name, dtype)` schema of a table row view.
///
/// This is the only place a composite element type appears: tables hand rows
/// out as records, while every stored column stays a flat scalar sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordType {
    fields: Vec<(String, DType)>,
}

impl RecordType {
    pub fn new(fields: Vec<(String, DType)>) -> Self {
        Self { fields }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total bytes of one packed record.
    pub fn item_size(&self) -> usize {
        self.fields.iter().map(|(_, dt)| dt.item_size()).sum()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn dtype_of(&self, name: &str) -> Option<DType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, dt)| *dt)
    }

    pub fn fields(&self) -> &[(String, DType)] {
        &self.fields
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, dt)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, dt)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_sizes() {
        assert_eq!(DType::Int8.item_size(), 1);
        assert_eq!(DType::Bool.item_size(), 1);
        assert_eq!(DType::UInt16.item_size(), 2);
        assert_eq!(DType::Float32.item_size(), 4);
        assert_eq!(DType::Int64.item_size(), 8);
        assert_eq!(DType::UInt64.item_size(), 8);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(DType::UInt64.is_integer());
        assert!(!DType::UInt64.is_float());
        assert!(DType::Float64.is_float());
        assert!(DType::Bool.is_bool());
        assert!(!DType::Bool.is_integer());
    }

    #[test]
    fn test_record_type() {
        let rt = RecordType::new(vec![
            ("x".to_string(), DType::Int64),
            ("flag".to_string(), DType::Bool),
        ]);
        assert_eq!(rt.len(), 2);
        assert_eq!(rt.item_size(), 9);
        assert_eq!(rt.dtype_of("flag"), Some(DType::Bool));
        assert_eq!(rt.dtype_of("missing"), None);
        assert_eq!(rt.to_string(), "{x: int64, flag: bool}");
    }
}
