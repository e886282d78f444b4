//! # **CTable Module** - *Compressed Column Tables*
//!
//! An ordered, name-addressed collection of equal-length compressed
//! columns. Rows come back as [`Row`] views or dense [`RowBatch`] record
//! buffers; boolean-filtered iteration and expression selection run through
//! the block evaluator, so a filter like `"(x > 1) & (y < 0)"` never
//! materializes an uncompressed copy of the table.
//!
//! ## Invariants
//! - Every column has the table's length.
//! - Column names are unique, non-empty identifiers; insertion order is
//!   observable.
//! - Batched mutations (`append_*`, `resize`) are all-or-nothing: on a
//!   partial failure every already-grown column is rolled back.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::codec::CParams;
use crate::enums::dtype::RecordType;
use crate::enums::error::ColzipError;
use crate::enums::scalar::Scalar;
use crate::structs::carray::CArray;
use crate::structs::iters::{StridedRange, WhereTrue};
use crate::structs::row::{Row, RowBatch};
use crate::traits::print::MAX_PREVIEW;
use crate::utils::{human_readable_size, normalize_bounds, validate_column_name};
use crate::settings::OutFlavor;
use crate::vm::eval::{eval, Env, EvalOpts, Evaluated, Operand};
use crate::{Column, DenseArray};

/// Reserved pseudo-column name that yields the row index during iteration.
pub const NROW: &str = "nrow__";

/// A compressed, column-wise, in-memory table.
#[derive(Clone, Debug, PartialEq)]
pub struct CTable {
    names: Vec<String>,
    cols: Vec<Column>,
    cparams: CParams,
}

impl CTable {
    /// Builds a table from existing columns, which are adopted without
    /// re-compression. Omitted names synthesize as `f0, f1, …`.
    pub fn new(cols: Vec<Column>, names: Option<Vec<String>>) -> Result<Self, ColzipError> {
        Self::with_cparams(cols, names, CParams::default())
    }

    /// Like [`Self::new`], with explicit compression parameters for columns
    /// the table builds later (dense appends, `add_col_dense`).
    pub fn with_cparams(
        cols: Vec<Column>,
        names: Option<Vec<String>>,
        cparams: CParams,
    ) -> Result<Self, ColzipError> {
        let names = match names {
            Some(names) => {
                if names.len() != cols.len() {
                    return Err(ColzipError::ShapeMismatch {
                        expected: cols.len(),
                        found: names.len(),
                    });
                }
                names
            }
            None => (0..cols.len()).map(|i| format!("f{}", i)).collect(),
        };
        for (i, name) in names.iter().enumerate() {
            validate_column_name(name)?;
            if names[..i].contains(name) {
                return Err(ColzipError::DuplicateColumn(name.clone()));
            }
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
            names,
            cols,
            cparams,
        })
    }

    /// Compresses a dense record buffer into a fresh table.
    pub fn from_batch(batch: &RowBatch, cparams: CParams) -> Result<Self, ColzipError> {
        let cols = batch
            .cols()
            .iter()
            .map(|d| Column::from_dense(d, cparams, Some(d.len())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_cparams(cols, Some(batch.names().to_vec()), cparams)
    }

    // Geometry and stats

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.cols.first().map(Column::len).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    /// Column names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn cparams(&self) -> CParams {
        self.cparams
    }

    /// The row schema.
    pub fn record_type(&self) -> RecordType {
        RecordType::new(
            self.names
                .iter()
                .zip(&self.cols)
                .map(|(n, c)| (n.clone(), c.dtype()))
                .collect(),
        )
    }

    /// Uncompressed size in bytes, summed over columns.
    pub fn nbytes(&self) -> usize {
        self.cols.iter().map(Column::nbytes).sum()
    }

    /// Compressed size in bytes, summed over columns.
    pub fn cbytes(&self) -> usize {
        self.cols.iter().map(Column::cbytes).sum()
    }

    pub fn compression_ratio(&self) -> f64 {
        let cbytes = self.cbytes();
        if cbytes == 0 {
            0.0
        } else {
            self.nbytes() as f64 / cbytes as f64
        }
    }

    // Column management

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn has_col(&self, name: &str) -> bool {
        self.col_index(name).is_some()
    }

    /// Column lookup by name, shared reference (no copy).
    pub fn col(&self, name: &str) -> Result<&Column, ColzipError> {
        self.col_index(name)
            .map(|i| &self.cols[i])
            .ok_or_else(|| ColzipError::UnknownColumn(name.to_string()))
    }

    pub fn col_at(&self, pos: usize) -> Result<&Column, ColzipError> {
        self.cols.get(pos).ok_or(ColzipError::OutOfRange {
            index: pos,
            len: self.cols.len(),
        })
    }

    /// Inserts `col` at `pos` (default: end) under `name` (default:
    /// `f<pos>`). The column must match the table length.
    pub fn add_col(
        &mut self,
        col: Column,
        name: Option<&str>,
        pos: Option<usize>,
    ) -> Result<(), ColzipError> {
        let pos = pos.unwrap_or(self.cols.len());
        if pos > self.cols.len() {
            return Err(ColzipError::OutOfRange {
                index: pos,
                len: self.cols.len(),
            });
        }
        let name = match name {
            Some(n) => n.to_string(),
            None => format!("f{}", pos),
        };
        validate_column_name(&name)?;
        if self.has_col(&name) {
            return Err(ColzipError::DuplicateColumn(name));
        }
        if !self.cols.is_empty() && col.len() != self.len() {
            return Err(ColzipError::LengthMismatch {
                expected: self.len(),
                found: col.len(),
            });
        }
        self.names.insert(pos, name);
        self.cols.insert(pos, col);
        Ok(())
    }

    /// Compresses a dense buffer with the table's cparams and inserts it.
    pub fn add_col_dense(
        &mut self,
        dense: &DenseArray,
        name: Option<&str>,
        pos: Option<usize>,
    ) -> Result<(), ColzipError> {
        let col = Column::from_dense(dense, self.cparams, Some(dense.len()))?;
        self.add_col(col, name, pos)
    }

    /// Removes and returns the column named `name`.
    pub fn del_col(&mut self, name: &str) -> Result<Column, ColzipError> {
        let pos = self
            .col_index(name)
            .ok_or_else(|| ColzipError::UnknownColumn(name.to_string()))?;
        self.names.remove(pos);
        Ok(self.cols.remove(pos))
    }

    /// Removes and returns the column at `pos`.
    pub fn del_col_at(&mut self, pos: usize) -> Result<Column, ColzipError> {
        if pos >= self.cols.len() {
            return Err(ColzipError::OutOfRange {
                index: pos,
                len: self.cols.len(),
            });
        }
        self.names.remove(pos);
        Ok(self.cols.remove(pos))
    }

    // Appends. All-or-nothing: on failure, grown columns are trimmed back.

    fn rollback(cols: &mut [Column], len0: usize) {
        for col in cols {
            let extra = col.len().saturating_sub(len0);
            if extra > 0 {
                // Shrinking within bounds cannot fail.
                let _ = col.trim(extra);
            }
        }
    }

    /// Appends one row; values are matched to columns positionally.
    pub fn append_row(&mut self, row: &Row) -> Result<(), ColzipError> {
        if row.len() != self.cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: self.cols.len(),
                found: row.len(),
            });
        }
        let len0 = self.len();
        for (i, value) in row.values().iter().enumerate() {
            if let Err(e) = self.cols[i].append_scalar(*value) {
                Self::rollback(&mut self.cols, len0);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Appends a dense record buffer; fields are matched to columns by name.
    pub fn append_batch(&mut self, batch: &RowBatch) -> Result<(), ColzipError> {
        if batch.n_cols() != self.cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: self.cols.len(),
                found: batch.n_cols(),
            });
        }
        let len0 = self.len();
        for (i, name) in self.names.iter().enumerate() {
            let field = match batch.col(name) {
                Ok(f) => f,
                Err(e) => {
                    Self::rollback(&mut self.cols, len0);
                    return Err(e);
                }
            };
            if let Err(e) = self.cols[i].append_dense(field) {
                Self::rollback(&mut self.cols, len0);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Appends per-column dense buffers positionally; all buffers must have
    /// the same length.
    pub fn append_columns(&mut self, columns: &[DenseArray]) -> Result<(), ColzipError> {
        if columns.len() != self.cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: self.cols.len(),
                found: columns.len(),
            });
        }
        if let Some(first) = columns.first() {
            for c in &columns[1..] {
                if c.len() != first.len() {
                    return Err(ColzipError::LengthMismatch {
                        expected: first.len(),
                        found: c.len(),
                    });
                }
            }
        }
        let len0 = self.len();
        for (i, values) in columns.iter().enumerate() {
            if let Err(e) = self.cols[i].append_dense(values) {
                Self::rollback(&mut self.cols, len0);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Appends another table's rows; columns are matched by name and
    /// streamed chunk by chunk.
    pub fn append_table(&mut self, other: &CTable) -> Result<(), ColzipError> {
        if other.n_cols() != self.cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: self.cols.len(),
                found: other.n_cols(),
            });
        }
        let len0 = self.len();
        for (i, name) in self.names.iter().enumerate() {
            let src = match other.col(name) {
                Ok(c) => c,
                Err(e) => {
                    Self::rollback(&mut self.cols, len0);
                    return Err(e);
                }
            };
            if let Err(e) = self.cols[i].append_column(src) {
                Self::rollback(&mut self.cols, len0);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Removes the trailing `n` rows from every column.
    pub fn trim(&mut self, n: usize) -> Result<(), ColzipError> {
        if n > self.len() {
            return Err(ColzipError::OutOfRange {
                index: n,
                len: self.len(),
            });
        }
        for col in &mut self.cols {
            col.trim(n)?;
        }
        Ok(())
    }

    /// Resizes every column to `n` rows, filling growth with each column's
    /// default value.
    pub fn resize(&mut self, n: usize) -> Result<(), ColzipError> {
        let len0 = self.len();
        for i in 0..self.cols.len() {
            if let Err(e) = self.cols[i].resize(n) {
                Self::rollback(&mut self.cols, len0);
                return Err(e);
            }
        }
        Ok(())
    }

    // Row access

    fn names_arc(&self) -> Arc<[String]> {
        Arc::from(self.names.clone())
    }

    /// One row as a named record.
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
            .map(|c| c.get(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Row::new(self.names_arc(), values))
    }

    /// A strided row window as a dense record buffer.
    pub fn slice_rows(
        &self,
        start: usize,
        stop: Option<usize>,
        step: usize,
    ) -> Result<RowBatch, ColzipError> {
        let cols = self
            .cols
            .iter()
            .map(|c| c.slice(start, stop, step))
            .collect::<Result<Vec<_>, _>>()?;
        RowBatch::new(self.names.to_vec(), cols)
    }

    /// A new table sharing the named columns (cloned column data, same
    /// compression).
    pub fn select(&self, names: &[&str]) -> Result<CTable, ColzipError> {
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            cols.push(self.col(name)?.clone());
        }
        CTable::with_cparams(
            cols,
            Some(names.iter().map(|s| s.to_string()).collect()),
            self.cparams,
        )
    }

    /// Gathers rows at arbitrary indices into a dense record buffer.
    pub fn take(&self, indices: &[usize]) -> Result<RowBatch, ColzipError> {
        let cols = self
            .cols
            .iter()
            .map(|c| c.take(indices))
            .collect::<Result<Vec<_>, _>>()?;
        RowBatch::new(self.names.to_vec(), cols)
    }

    /// The rows where `mask` is true, as a dense record buffer.
    pub fn filter_mask(&self, mask: &CArray<bool>) -> Result<RowBatch, ColzipError> {
        if mask.len() != self.len() {
            return Err(ColzipError::LengthMismatch {
                expected: self.len(),
                found: mask.len(),
            });
        }
        let cols = self
            .cols
            .iter()
            .map(|c| c.filter_mask(mask))
            .collect::<Result<Vec<_>, _>>()?;
        RowBatch::new(self.names.to_vec(), cols)
    }

    /// Evaluates `key` as a boolean expression over the columns and returns
    /// the selected rows. Fails with `InvalidKey` when the expression does
    /// not produce a boolean column.
    pub fn query(&self, key: &str) -> Result<RowBatch, ColzipError> {
        let mask = self.eval_mask(key)?;
        self.filter_mask(&mask)
    }

    // Expression evaluation

    /// Evaluates an expression with the table's columns as the name
    /// environment.
    pub fn eval(&self, expression: &str, opts: &EvalOpts) -> Result<Evaluated, ColzipError> {
        self.eval_with(expression, &Env::new(), opts)
    }

    /// Evaluates with additional user-provided operands; column names take
    /// priority over user names.
    pub fn eval_with(
        &self,
        expression: &str,
        user: &Env<'_>,
        opts: &EvalOpts,
    ) -> Result<Evaluated, ColzipError> {
        let mut env = Env::new();
        for (name, col) in self.names.iter().zip(&self.cols) {
            env.insert(name.clone(), Operand::Column(col));
        }
        for (name, op) in user.entries() {
            env.insert(name.clone(), *op);
        }
        eval(expression, &env, opts)
    }

    /// Evaluates `expression` into a boolean mask column.
    fn eval_mask(&self, expression: &str) -> Result<CArray<bool>, ColzipError> {
        let opts = EvalOpts {
            out_flavor: Some(OutFlavor::Column),
            ..EvalOpts::default()
        };
        match self.eval(expression, &opts)? {
            Evaluated::Column(col) => match col {
                Column::Bool(mask) => Ok(mask),
                other => Err(ColzipError::InvalidKey {
                    key: expression.to_string(),
                    reason: format!(
                        "expression produces {}, not a boolean mask",
                        other.dtype()
                    ),
                }),
            },
            _ => Err(ColzipError::InvalidKey {
                key: expression.to_string(),
                reason: "expression does not produce a boolean mask".to_string(),
            }),
        }
    }

    // Row mutation

    /// Overwrites row `i`; values are matched to columns positionally and
    /// type-checked up front so the row writes entirely or not at all.
    pub fn set_row(&mut self, i: usize, row: &Row) -> Result<(), ColzipError> {
        if i >= self.len() {
            return Err(ColzipError::OutOfRange {
                index: i,
                len: self.len(),
            });
        }
        if row.len() != self.cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: self.cols.len(),
                found: row.len(),
            });
        }
        for (col, value) in self.cols.iter().zip(row.values()) {
            if col.dtype() != value.dtype() {
                return Err(ColzipError::TypeMismatch {
                    expected: col.dtype(),
                    found: value.dtype(),
                });
            }
        }
        for (col, value) in self.cols.iter_mut().zip(row.values()) {
            col.set_scalar(i, *value)?;
        }
        Ok(())
    }

    /// Overwrites a strided row range across all columns from a record
    /// batch, fields matched by name and type-checked up front.
    pub fn set_rows(
        &mut self,
        start: usize,
        stop: Option<usize>,
        step: usize,
        batch: &RowBatch,
    ) -> Result<(), ColzipError> {
        for (i, name) in self.names.iter().enumerate() {
            let values = batch.col(name)?;
            if values.dtype() != self.cols[i].dtype() {
                return Err(ColzipError::TypeMismatch {
                    expected: self.cols[i].dtype(),
                    found: values.dtype(),
                });
            }
        }
        for (i, name) in self.names.iter().enumerate() {
            let values = batch.col(name)?;
            self.cols[i].set_range_dense(start, stop, step, values)?;
        }
        Ok(())
    }

    /// Assigns `row` to every row where `expression` is true. The boolean
    /// mask is fully evaluated before any write, so the expression never
    /// observes its own effects.
    pub fn set_where(&mut self, expression: &str, row: &Row) -> Result<(), ColzipError> {
        if row.len() != self.cols.len() {
            return Err(ColzipError::ShapeMismatch {
                expected: self.cols.len(),
                found: row.len(),
            });
        }
        let indices = self.true_indices(expression)?;
        for (col, value) in self.cols.iter().zip(row.values()) {
            if col.dtype() != value.dtype() {
                return Err(ColzipError::TypeMismatch {
                    expected: col.dtype(),
                    found: value.dtype(),
                });
            }
        }
        for (col, value) in self.cols.iter_mut().zip(row.values()) {
            col.set_rows_scalar(&indices, *value)?;
        }
        Ok(())
    }

    /// Assigns one `batch` row per true row of `expression`, matched by
    /// column name. The mask is snapshot before mutation.
    pub fn set_where_batch(
        &mut self,
        expression: &str,
        batch: &RowBatch,
    ) -> Result<(), ColzipError> {
        let indices = self.true_indices(expression)?;
        if batch.len() != indices.len() {
            return Err(ColzipError::LengthMismatch {
                expected: indices.len(),
                found: batch.len(),
            });
        }
        for (i, name) in self.names.iter().enumerate() {
            let values = batch.col(name)?;
            if values.dtype() != self.cols[i].dtype() {
                return Err(ColzipError::TypeMismatch {
                    expected: self.cols[i].dtype(),
                    found: values.dtype(),
                });
            }
        }
        for (i, name) in self.names.iter().enumerate() {
            let values = batch.col(name)?;
            self.cols[i].set_rows_dense(&indices, values)?;
        }
        Ok(())
    }

    /// True row indices of a boolean expression, streamed via `wheretrue`.
    fn true_indices(&self, expression: &str) -> Result<Vec<usize>, ColzipError> {
        let mask = self.eval_mask(expression)?;
        Ok(mask.wheretrue(0, None)?.collect())
    }

    // Row iteration

    /// Lazily iterates rows where `expression` is true, yielding the
    /// selected `outcols` (default: all). The pseudo-column
    /// [`NROW`] yields the row index.
    pub fn rows_where(
        &self,
        expression: &str,
        outcols: Option<&[&str]>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<RowIter<'_>, ColzipError> {
        let mask = Arc::new(self.eval_mask(expression)?);
        self.rows_where_shared(mask, outcols, skip, limit)
    }

    /// Lazily iterates rows where `mask` is true; the mask must match the
    /// table length.
    pub fn rows_where_mask<'a>(
        &'a self,
        mask: &CArray<bool>,
        outcols: Option<&[&str]>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<RowIter<'a>, ColzipError> {
        self.rows_where_shared(Arc::new(mask.clone()), outcols, skip, limit)
    }

    fn rows_where_shared<'a>(
        &'a self,
        mask: Arc<CArray<bool>>,
        outcols: Option<&[&str]>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<RowIter<'a>, ColzipError> {
        if mask.len() != self.len() {
            return Err(ColzipError::LengthMismatch {
                expected: self.len(),
                found: mask.len(),
            });
        }
        let outcols = self.check_outcols(outcols)?;
        let mut iters: Vec<Box<dyn Iterator<Item = Scalar> + 'a>> =
            Vec::with_capacity(outcols.len());
        for name in &outcols {
            if name == NROW {
                let wt = WhereTrue::new_shared(mask.clone(), skip, limit)?;
                iters.push(Box::new(wt.map(|i| Scalar::Int64(i as i64))));
            } else {
                let col = self.col(name)?;
                iters.push(col.where_scalars_shared(mask.clone(), skip, limit)?);
            }
        }
        Ok(RowIter {
            names: Arc::from(outcols),
            iters,
        })
    }

    /// Lazily iterates a strided row range over the selected `outcols`
    /// (default: all), with `skip`/`limit` applied per column in lockstep.
    pub fn iter_rows(
        &self,
        start: usize,
        stop: Option<usize>,
        step: usize,
        outcols: Option<&[&str]>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<RowIter<'_>, ColzipError> {
        let (start, stop) = normalize_bounds(start, stop, self.len());
        let outcols = self.check_outcols(outcols)?;
        let mut iters: Vec<Box<dyn Iterator<Item = Scalar> + '_>> =
            Vec::with_capacity(outcols.len());
        for name in &outcols {
            if name == NROW {
                let range = StridedRange::with_opts(start, stop, step, limit, skip)?;
                iters.push(Box::new(range.map(|i| Scalar::Int64(i as i64))));
            } else {
                let col = self.col(name)?;
                iters.push(col.iter_scalars(start, Some(stop), step, limit, skip)?);
            }
        }
        Ok(RowIter {
            names: Arc::from(outcols),
            iters,
        })
    }

    fn check_outcols(&self, outcols: Option<&[&str]>) -> Result<Vec<String>, ColzipError> {
        match outcols {
            None => Ok(self.names.clone()),
            Some(names) => {
                for name in names {
                    if *name != NROW && !self.has_col(name) {
                        return Err(ColzipError::UnknownColumn(name.to_string()));
                    }
                }
                Ok(names.iter().map(|s| s.to_string()).collect())
            }
        }
    }

    /// Streams every column into a fresh table recompressed with `cparams`.
    pub fn copy_with(&self, cparams: CParams) -> Result<CTable, ColzipError> {
        let cols = self
            .cols
            .iter()
            .map(|c| c.copy_with(cparams))
            .collect::<Result<Vec<_>, _>>()?;
        CTable::with_cparams(cols, Some(self.names.clone()), cparams)
    }
}

/// Lazy row iterator: one per-column iterator per output column, advanced
/// in lockstep.
pub struct RowIter<'a> {
    names: Arc<[String]>,
    iters: Vec<Box<dyn Iterator<Item = Scalar> + 'a>>,
}

impl Iterator for RowIter<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let mut values = Vec::with_capacity(self.iters.len());
        for it in &mut self.iters {
            values.push(it.next()?);
        }
        Some(Row::new(self.names.clone(), values))
    }
}

impl Display for CTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "ctable({} rows, {} cols) {} nbytes: {}; cbytes: {}; ratio: {:.2}",
            self.len(),
            self.n_cols(),
            self.record_type(),
            human_readable_size(self.nbytes()),
            human_readable_size(self.cbytes()),
            self.compression_ratio()
        )?;
        writeln!(f, "  {}", self.cparams)?;
        let preview = self.len().min(MAX_PREVIEW / 5);
        for i in 0..preview {
            match self.row(i) {
                Ok(row) => writeln!(f, "  {}", row)?,
                Err(_) => break,
            }
        }
        if self.len() > preview {
            write!(f, "  … ({} rows total)", self.len())?;
        }
        Ok(())
    }
}
