//! # **Macros** - *Dtype dispatch over the enum surfaces*
//!
//! The dtype-erased enums ([`crate::Column`], [`crate::DenseArray`]) carry
//! one variant per supported primitive. These macros expand a generic body
//! once per variant so the typed inner code stays monomorphic.

/// Runs `$body` with `$arr` bound to the typed `CArray` inside a [`crate::Column`].
macro_rules! with_column {
    ($col:expr, $arr:ident => $body:expr) => {
        match $col {
            $crate::Column::Int8($arr) => $body,
            $crate::Column::Int16($arr) => $body,
            $crate::Column::Int32($arr) => $body,
            $crate::Column::Int64($arr) => $body,
            $crate::Column::UInt8($arr) => $body,
            $crate::Column::UInt16($arr) => $body,
            $crate::Column::UInt32($arr) => $body,
            $crate::Column::UInt64($arr) => $body,
            $crate::Column::Float32($arr) => $body,
            $crate::Column::Float64($arr) => $body,
            $crate::Column::Bool($arr) => $body,
        }
    };
}

/// Runs `$body` per variant and rewraps the result in the matching
/// [`crate::DenseArray`] variant.
macro_rules! column_to_dense {
    ($col:expr, $arr:ident => $body:expr) => {
        match $col {
            $crate::Column::Int8($arr) => $crate::DenseArray::Int8($body),
            $crate::Column::Int16($arr) => $crate::DenseArray::Int16($body),
            $crate::Column::Int32($arr) => $crate::DenseArray::Int32($body),
            $crate::Column::Int64($arr) => $crate::DenseArray::Int64($body),
            $crate::Column::UInt8($arr) => $crate::DenseArray::UInt8($body),
            $crate::Column::UInt16($arr) => $crate::DenseArray::UInt16($body),
            $crate::Column::UInt32($arr) => $crate::DenseArray::UInt32($body),
            $crate::Column::UInt64($arr) => $crate::DenseArray::UInt64($body),
            $crate::Column::Float32($arr) => $crate::DenseArray::Float32($body),
            $crate::Column::Float64($arr) => $crate::DenseArray::Float64($body),
            $crate::Column::Bool($arr) => $crate::DenseArray::Bool($body),
        }
    };
}

/// Runs `$body` per variant and rewraps the result in a fresh
/// [`crate::Column`] of the same dtype.
macro_rules! column_map {
    ($col:expr, $arr:ident => $body:expr) => {
        match $col {
            $crate::Column::Int8($arr) => $crate::Column::Int8($body),
            $crate::Column::Int16($arr) => $crate::Column::Int16($body),
            $crate::Column::Int32($arr) => $crate::Column::Int32($body),
            $crate::Column::Int64($arr) => $crate::Column::Int64($body),
            $crate::Column::UInt8($arr) => $crate::Column::UInt8($body),
            $crate::Column::UInt16($arr) => $crate::Column::UInt16($body),
            $crate::Column::UInt32($arr) => $crate::Column::UInt32($body),
            $crate::Column::UInt64($arr) => $crate::Column::UInt64($body),
            $crate::Column::Float32($arr) => $crate::Column::Float32($body),
            $crate::Column::Float64($arr) => $crate::Column::Float64($body),
            $crate::Column::Bool($arr) => $crate::Column::Bool($body),
        }
    };
}

/// Runs `$body` with `$buf` bound to the typed `Vec64` inside a [`crate::DenseArray`].
macro_rules! with_dense {
    ($dense:expr, $buf:ident => $body:expr) => {
        match $dense {
            $crate::DenseArray::Int8($buf) => $body,
            $crate::DenseArray::Int16($buf) => $body,
            $crate::DenseArray::Int32($buf) => $body,
            $crate::DenseArray::Int64($buf) => $body,
            $crate::DenseArray::UInt8($buf) => $body,
            $crate::DenseArray::UInt16($buf) => $body,
            $crate::DenseArray::UInt32($buf) => $body,
            $crate::DenseArray::UInt64($buf) => $body,
            $crate::DenseArray::Float32($buf) => $body,
            $crate::DenseArray::Float64($buf) => $body,
            $crate::DenseArray::Bool($buf) => $body,
        }
    };
}

/// Runs `$body` per variant and rewraps the result in a fresh
/// [`crate::DenseArray`] of the same dtype.
macro_rules! dense_map {
    ($dense:expr, $buf:ident => $body:expr) => {
        match $dense {
            $crate::DenseArray::Int8($buf) => $crate::DenseArray::Int8($body),
            $crate::DenseArray::Int16($buf) => $crate::DenseArray::Int16($body),
            $crate::DenseArray::Int32($buf) => $crate::DenseArray::Int32($body),
            $crate::DenseArray::Int64($buf) => $crate::DenseArray::Int64($body),
            $crate::DenseArray::UInt8($buf) => $crate::DenseArray::UInt8($body),
            $crate::DenseArray::UInt16($buf) => $crate::DenseArray::UInt16($body),
            $crate::DenseArray::UInt32($buf) => $crate::DenseArray::UInt32($body),
            $crate::DenseArray::UInt64($buf) => $crate::DenseArray::UInt64($body),
            $crate::DenseArray::Float32($buf) => $crate::DenseArray::Float32($body),
            $crate::DenseArray::Float64($buf) => $crate::DenseArray::Float64($body),
            $crate::DenseArray::Bool($buf) => $crate::DenseArray::Bool($body),
        }
    };
}

/// Runs `$body` per variant and rewraps the result in the matching
/// [`crate::Column`] variant.
macro_rules! dense_to_column {
    ($dense:expr, $buf:ident => $body:expr) => {
        match $dense {
            $crate::DenseArray::Int8($buf) => $crate::Column::Int8($body),
            $crate::DenseArray::Int16($buf) => $crate::Column::Int16($body),
            $crate::DenseArray::Int32($buf) => $crate::Column::Int32($body),
            $crate::DenseArray::Int64($buf) => $crate::Column::Int64($body),
            $crate::DenseArray::UInt8($buf) => $crate::Column::UInt8($body),
            $crate::DenseArray::UInt16($buf) => $crate::Column::UInt16($body),
            $crate::DenseArray::UInt32($buf) => $crate::Column::UInt32($body),
            $crate::DenseArray::UInt64($buf) => $crate::Column::UInt64($body),
            $crate::DenseArray::Float32($buf) => $crate::Column::Float32($body),
            $crate::DenseArray::Float64($buf) => $crate::Column::Float64($body),
            $crate::DenseArray::Bool($buf) => $crate::Column::Bool($body),
        }
    };
}

/// Destructures a `(Column, DenseArray)` pair of the *same* dtype, running
/// `$body` with both typed halves bound; `$mismatch` handles the rest.
macro_rules! zip_column_dense {
    ($col:expr, $dense:expr, $arr:ident, $buf:ident => $body:expr, _ => $mismatch:expr) => {
        match ($col, $dense) {
            ($crate::Column::Int8($arr), $crate::DenseArray::Int8($buf)) => $body,
            ($crate::Column::Int16($arr), $crate::DenseArray::Int16($buf)) => $body,
            ($crate::Column::Int32($arr), $crate::DenseArray::Int32($buf)) => $body,
            ($crate::Column::Int64($arr), $crate::DenseArray::Int64($buf)) => $body,
            ($crate::Column::UInt8($arr), $crate::DenseArray::UInt8($buf)) => $body,
            ($crate::Column::UInt16($arr), $crate::DenseArray::UInt16($buf)) => $body,
            ($crate::Column::UInt32($arr), $crate::DenseArray::UInt32($buf)) => $body,
            ($crate::Column::UInt64($arr), $crate::DenseArray::UInt64($buf)) => $body,
            ($crate::Column::Float32($arr), $crate::DenseArray::Float32($buf)) => $body,
            ($crate::Column::Float64($arr), $crate::DenseArray::Float64($buf)) => $body,
            ($crate::Column::Bool($arr), $crate::DenseArray::Bool($buf)) => $body,
            _ => $mismatch,
        }
    };
}

/// Destructures a pair of [`crate::Column`]s of the *same* dtype, running
/// `$body` with both typed arrays bound; `$mismatch` handles the rest.
macro_rules! zip_columns {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr, _ => $mismatch:expr) => {
        match ($a, $b) {
            ($crate::Column::Int8($x), $crate::Column::Int8($y)) => $body,
            ($crate::Column::Int16($x), $crate::Column::Int16($y)) => $body,
            ($crate::Column::Int32($x), $crate::Column::Int32($y)) => $body,
            ($crate::Column::Int64($x), $crate::Column::Int64($y)) => $body,
            ($crate::Column::UInt8($x), $crate::Column::UInt8($y)) => $body,
            ($crate::Column::UInt16($x), $crate::Column::UInt16($y)) => $body,
            ($crate::Column::UInt32($x), $crate::Column::UInt32($y)) => $body,
            ($crate::Column::UInt64($x), $crate::Column::UInt64($y)) => $body,
            ($crate::Column::Float32($x), $crate::Column::Float32($y)) => $body,
            ($crate::Column::Float64($x), $crate::Column::Float64($y)) => $body,
            ($crate::Column::Bool($x), $crate::Column::Bool($y)) => $body,
            _ => $mismatch,
        }
    };
}

pub(crate) use {
    column_map, column_to_dense, dense_map, dense_to_column, with_column, with_dense,
    zip_column_dense, zip_columns,
};
