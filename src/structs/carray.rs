//! # **CArray Module** - *Chunked Compressed Arrays*
//!
//! The crate's core container: an append-only sequence of fixed-width
//! elements stored as sealed compressed [`Chunk`]s plus an uncompressed
//! *hot buffer* holding the unsealed tail.
//!
//! ## Overview
//! - Logical length = sealed elements + hot-buffer elements; every sealed
//!   chunk holds exactly `chunklen` elements, so readers never observe a
//!   partially filled chunk.
//! - Reads decompress one chunk at a time, bounding the working set to a
//!   single chunk regardless of total length.
//! - In-place writes regroup by owning chunk so each touched chunk is
//!   decompressed and recompressed at most once per call.
//!
//! ## Construction
//! [`CArray::from_slice`] for dense data, [`CArray::from_iter_count`] for
//! streamed fills, plus `fill` / `zeros` / `ones` / `arange` convenience
//! constructors. All accept [`CArrayOptions`] for compression parameters,
//! the default fill value, and chunk sizing.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};

use vec64::Vec64;

use crate::codec::CParams;
use crate::enums::error::ColzipError;
use crate::structs::chunk::Chunk;
use crate::structs::iters::{CArrayIter, StridedRange, WhereTrue, WhereValues};
use crate::traits::print::MAX_PREVIEW;
use crate::traits::type_unions::{Element, Numeric};
use crate::utils::{human_readable_size, normalize_bounds, prev_power_of_two, strided_len};

/// Target uncompressed chunk payload in bytes before the expected-length
/// refinement kicks in.
const CHUNK_TARGET_BYTES: usize = 1 << 16;

thread_local! {
    /// Scratch space for single-chunk decompression during reads.
    /// 64-byte aligned, so it can be viewed as any element type.
    static SCRATCH: RefCell<Vec64<u8>> = RefCell::new(Vec64::new());
}

/// Construction parameters for a [`CArray`].
#[derive(Clone, Debug, PartialEq)]
pub struct CArrayOptions<T> {
    /// Compression parameters used when sealing chunks.
    pub cparams: CParams,
    /// Fill value used by `resize` growth; also the `fill` constructor value.
    pub dflt: T,
    /// Expected final length; refines the chunk-length heuristic.
    pub expectedlen: Option<usize>,
    /// Explicit elements-per-chunk override (mainly for tests).
    pub chunklen: Option<usize>,
}

impl<T: Element> Default for CArrayOptions<T> {
    fn default() -> Self {
        Self {
            cparams: CParams::default(),
            dflt: T::default(),
            expectedlen: None,
            chunklen: None,
        }
    }
}

/// Chunked compressed array of `T` with a logical length, append-only
/// growth and in-place update.
#[derive(Clone, Debug, PartialEq)]
pub struct CArray<T: Element> {
    chunks: Vec<Chunk>,
    hot: Vec64<T>,
    chunklen: usize,
    dflt: T,
    cparams: CParams,
}

/// Elements per chunk from the item size and the expected length: a
/// `CHUNK_TARGET_BYTES` payload floored to a power of two, shrunk to the
/// expected length's power-of-two floor when that is smaller so short
/// arrays get proportionate chunks.
fn compute_chunklen(item_size: usize, expectedlen: Option<usize>) -> usize {
    let mut chunklen = prev_power_of_two(CHUNK_TARGET_BYTES / item_size.max(1)).max(1);
    if let Some(expected) = expectedlen {
        if expected > 0 && expected < chunklen {
            chunklen = prev_power_of_two(expected);
        }
    }
    chunklen
}

impl<T: Element> Default for CArray<T> {
    fn default() -> Self {
        Self::with_options(CArrayOptions::default())
    }
}

impl<T: Element> CArray<T> {
    /// Constructs an empty array with the given options.
    pub fn with_options(opts: CArrayOptions<T>) -> Self {
        let chunklen = opts
            .chunklen
            .filter(|&n| n > 0)
            .unwrap_or_else(|| compute_chunklen(size_of::<T>(), opts.expectedlen));
        Self {
            chunks: Vec::new(),
            hot: Vec64::with_capacity(chunklen.min(CHUNK_TARGET_BYTES)),
            chunklen,
            dflt: opts.dflt,
            cparams: opts.cparams,
        }
    }

    /// Constructs an empty array with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds from a dense slice with default options (the expected length
    /// defaults to the slice length).
    pub fn from_slice(data: &[T]) -> Result<Self, ColzipError> {
        Self::from_slice_with(data, CArrayOptions::default())
    }

    /// Builds from a dense slice with explicit options.
    pub fn from_slice_with(data: &[T], mut opts: CArrayOptions<T>) -> Result<Self, ColzipError> {
        opts.expectedlen = opts.expectedlen.or(Some(data.len()));
        let mut arr = Self::with_options(opts);
        arr.append(data)?;
        Ok(arr)
    }

    /// Builds from an iterator, streamed chunk by chunk. `count` caps the
    /// number of elements read; `None` drains the iterator.
    pub fn from_iter_count<I: IntoIterator<Item = T>>(
        iter: I,
        count: Option<usize>,
        mut opts: CArrayOptions<T>,
    ) -> Result<Self, ColzipError> {
        opts.expectedlen = opts.expectedlen.or(count);
        let mut arr = Self::with_options(opts);
        let mut pending: Vec64<T> = Vec64::with_capacity(arr.chunklen);
        let mut remaining = count;
        for v in iter {
            if remaining == Some(0) {
                break;
            }
            pending.push(v);
            if let Some(r) = remaining.as_mut() {
                *r -= 1;
            }
            if pending.len() == arr.chunklen {
                arr.append(&pending)?;
                pending.clear();
            }
        }
        arr.append(&pending)?;
        Ok(arr)
    }

    /// Builds a length-`n` array filled with `value`, which also becomes
    /// the array's default fill value.
    pub fn fill(value: T, n: usize, mut opts: CArrayOptions<T>) -> Result<Self, ColzipError> {
        opts.dflt = value;
        opts.expectedlen = opts.expectedlen.or(Some(n));
        let mut arr = Self::with_options(opts);
        arr.append_fill(value, n)?;
        Ok(arr)
    }

    // Core geometry

    /// Logical number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.sealed_len() + self.hot.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.hot.is_empty()
    }

    /// Elements per sealed chunk; fixed for the array's lifetime.
    #[inline]
    pub fn chunklen(&self) -> usize {
        self.chunklen
    }

    /// Number of sealed chunks.
    #[inline]
    pub fn nchunks(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn dtype(&self) -> crate::DType {
        T::DTYPE
    }

    /// The fill value used when growing via [`Self::resize`].
    #[inline]
    pub fn dflt(&self) -> T {
        self.dflt
    }

    #[inline]
    pub fn cparams(&self) -> CParams {
        self.cparams
    }

    /// Uncompressed size in bytes.
    pub fn nbytes(&self) -> usize {
        self.len() * size_of::<T>()
    }

    /// Compressed size in bytes (sealed payloads plus the live hot tail).
    pub fn cbytes(&self) -> usize {
        self.chunks.iter().map(Chunk::cbytes).sum::<usize>() + self.hot.len() * size_of::<T>()
    }

    /// Uncompressed-to-compressed size ratio.
    pub fn compression_ratio(&self) -> f64 {
        let cbytes = self.cbytes();
        if cbytes == 0 {
            0.0
        } else {
            self.nbytes() as f64 / cbytes as f64
        }
    }

    #[inline]
    fn sealed_len(&self) -> usize {
        self.chunks.len() * self.chunklen
    }

    // Mutation

    /// Appends a dense slice, sealing full chunks as the hot buffer fills.
    pub fn append(&mut self, data: &[T]) -> Result<(), ColzipError> {
        let mut rest = data;
        while !rest.is_empty() {
            let room = self.chunklen - self.hot.len();
            let take = room.min(rest.len());
            self.hot.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.hot.len() == self.chunklen {
                self.seal_hot()?;
            }
        }
        Ok(())
    }

    /// Appends a single element.
    pub fn append_one(&mut self, value: T) -> Result<(), ColzipError> {
        self.append(&[value])
    }

    fn append_fill(&mut self, value: T, n: usize) -> Result<(), ColzipError> {
        let mut block: Vec64<T> = Vec64::new();
        block.resize(self.chunklen.min(n).max(1), value);
        let mut remaining = n;
        while remaining > 0 {
            let take = block.len().min(remaining);
            self.append(&block[..take])?;
            remaining -= take;
        }
        Ok(())
    }

    fn seal_hot(&mut self) -> Result<(), ColzipError> {
        let chunk = Chunk::seal(&self.hot[..], self.cparams)?;
        // The chunk list and logical length move together here, so a reader
        // can never observe a partially appended chunk.
        self.chunks.push(chunk);
        self.hot.clear();
        Ok(())
    }

    /// Removes the trailing `n` elements.
    pub fn trim(&mut self, n: usize) -> Result<(), ColzipError> {
        let len = self.len();
        if n > len {
            return Err(ColzipError::OutOfRange { index: n, len });
        }
        let mut n = n;
        while n > 0 && n >= self.hot.len() {
            n -= self.hot.len();
            self.hot.clear();
            match self.chunks.pop() {
                Some(chunk) => {
                    self.hot.resize(chunk.nitems(), T::default());
                    chunk.decompress_into(&mut self.hot[..]);
                }
                None => break,
            }
        }
        let keep = self.hot.len() - n;
        self.hot.truncate(keep);
        Ok(())
    }

    /// Resizes to `n` elements, trimming or growing with the default value.
    pub fn resize(&mut self, n: usize) -> Result<(), ColzipError> {
        let len = self.len();
        if n < len {
            self.trim(len - n)
        } else if n > len {
            self.append_fill(self.dflt, n - len)
        } else {
            Ok(())
        }
    }

    // Reads

    /// Random element read.
    pub fn get(&self, i: usize) -> Result<T, ColzipError> {
        let len = self.len();
        if i >= len {
            return Err(ColzipError::OutOfRange { index: i, len });
        }
        let sealed = self.sealed_len();
        if i >= sealed {
            return Ok(self.hot[i - sealed]);
        }
        Ok(self.with_chunk(i / self.chunklen, |block| block[i % self.chunklen]))
    }

    /// Copies the contiguous window `[start, min(start + n, len))` into
    /// `out`, reusing its allocation. Each touched chunk is decompressed
    /// exactly once.
    pub fn read_range(&self, start: usize, n: usize, out: &mut Vec64<T>) {
        out.clear();
        let len = self.len();
        let stop = start.saturating_add(n).min(len);
        if start >= stop {
            return;
        }
        out.reserve(stop - start);
        let sealed = self.sealed_len();
        let mut pos = start;
        while pos < stop.min(sealed) {
            let k = pos / self.chunklen;
            let lo = k * self.chunklen;
            let hi = (lo + self.chunklen).min(stop);
            self.with_chunk(k, |block| {
                out.extend_from_slice(&block[pos - lo..hi - lo]);
            });
            pos = hi;
        }
        if stop > sealed {
            let from = pos.max(sealed) - sealed;
            out.extend_from_slice(&self.hot[from..stop - sealed]);
        }
    }

    /// Materializes the strided half-open range `[start, stop)` as a dense
    /// buffer. `step` must be positive; each touched chunk is decompressed
    /// at most once.
    pub fn slice(
        &self,
        start: usize,
        stop: Option<usize>,
        step: usize,
    ) -> Result<Vec64<T>, ColzipError> {
        if step == 0 {
            return Err(ColzipError::InvalidConfig("slice step must be positive".into()));
        }
        let (start, stop) = normalize_bounds(start, stop, self.len());
        let mut out = Vec64::with_capacity(strided_len(start, stop, step));
        let sealed = self.sealed_len();
        let mut pos = start;
        while pos < stop.min(sealed) {
            let k = pos / self.chunklen;
            let lo = k * self.chunklen;
            let hi = (lo + self.chunklen).min(stop);
            self.with_chunk(k, |block| {
                let mut i = pos;
                while i < hi {
                    out.push(block[i - lo]);
                    i += step;
                }
                pos = i;
            });
        }
        while pos < stop {
            out.push(self.hot[pos - sealed]);
            pos += step;
        }
        Ok(out)
    }

    /// Materializes the whole array.
    pub fn to_vec(&self) -> Vec64<T> {
        let mut out = Vec64::with_capacity(self.len());
        self.read_range(0, self.len(), &mut out);
        out
    }

    // Writes

    /// Overwrites one element in place.
    pub fn set(&mut self, i: usize, value: T) -> Result<(), ColzipError> {
        let len = self.len();
        if i >= len {
            return Err(ColzipError::OutOfRange { index: i, len });
        }
        let sealed = self.sealed_len();
        if i >= sealed {
            self.hot[i - sealed] = value;
            return Ok(());
        }
        let chunklen = self.chunklen;
        let k = i / chunklen;
        self.rewrite_chunk(k, |block| block[i % chunklen] = value)
    }

    /// Scatter-writes `values` at the strided range `[start, stop)` with
    /// positive `step`. A single value broadcasts; otherwise `values` must
    /// match the range length. Each touched chunk is rewritten at most once.
    pub fn set_range(
        &mut self,
        start: usize,
        stop: Option<usize>,
        step: usize,
        values: &[T],
    ) -> Result<(), ColzipError> {
        if step == 0 {
            return Err(ColzipError::InvalidConfig("set step must be positive".into()));
        }
        let (start, stop) = normalize_bounds(start, stop, self.len());
        let n = strided_len(start, stop, step);
        if values.len() != n && values.len() != 1 {
            return Err(ColzipError::LengthMismatch {
                expected: n,
                found: values.len(),
            });
        }
        let value_at = |ordinal: usize| {
            if values.len() == 1 {
                values[0]
            } else {
                values[ordinal]
            }
        };
        let sealed = self.sealed_len();
        let chunklen = self.chunklen;
        let mut pos = start;
        while pos < stop.min(sealed) {
            let k = pos / chunklen;
            let lo = k * chunklen;
            let hi = (lo + chunklen).min(stop);
            let mut next = pos;
            self.rewrite_chunk(k, |block| {
                let mut i = next;
                while i < hi {
                    block[i - lo] = value_at((i - start) / step);
                    i += step;
                }
                next = i;
            })?;
            pos = next;
        }
        while pos < stop {
            self.hot[pos - sealed] = value_at((pos - start) / step);
            pos += step;
        }
        Ok(())
    }

    /// Scatter-writes `values` at arbitrary `indices`. A single value
    /// broadcasts. Writes are grouped by owning chunk, so each chunk is
    /// rewritten at most once however the indices are ordered.
    pub fn set_indices(&mut self, indices: &[usize], values: &[T]) -> Result<(), ColzipError> {
        let len = self.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(ColzipError::OutOfRange { index: bad, len });
        }
        if values.len() != indices.len() && values.len() != 1 {
            return Err(ColzipError::LengthMismatch {
                expected: indices.len(),
                found: values.len(),
            });
        }
        let mut order: Vec<usize> = (0..indices.len()).collect();
        // Stable sort keeps duplicate indices in call order, so the last
        // write for an index wins.
        order.sort_by_key(|&o| indices[o]);

        let sealed = self.sealed_len();
        let chunklen = self.chunklen;
        let value_at =
            |ordinal: usize| if values.len() == 1 { values[0] } else { values[ordinal] };

        let mut at = 0;
        while at < order.len() {
            let idx = indices[order[at]];
            if idx >= sealed {
                // Tail of the sorted order lands in the hot buffer.
                for &o in &order[at..] {
                    self.hot[indices[o] - sealed] = value_at(o);
                }
                break;
            }
            let k = idx / chunklen;
            let hi = (k + 1) * chunklen;
            let mut group_end = at;
            while group_end < order.len() && indices[order[group_end]] < hi {
                group_end += 1;
            }
            let group = &order[at..group_end];
            self.rewrite_chunk(k, |block| {
                for &o in group {
                    block[indices[o] % chunklen] = value_at(o);
                }
            })?;
            at = group_end;
        }
        Ok(())
    }

    /// Scatter-writes `values` wherever `mask` is true. Equivalent to
    /// [`Self::set_indices`] on the mask's true positions.
    pub fn set_mask(&mut self, mask: &CArray<bool>, values: &[T]) -> Result<(), ColzipError> {
        if mask.len() != self.len() {
            return Err(ColzipError::LengthMismatch {
                expected: self.len(),
                found: mask.len(),
            });
        }
        let indices: Vec<usize> = mask.wheretrue(0, None)?.collect();
        self.set_indices(&indices, values)
    }

    fn rewrite_chunk(
        &mut self,
        k: usize,
        edit: impl FnOnce(&mut [T]),
    ) -> Result<(), ColzipError> {
        let mut block: Vec64<T> = Vec64::new();
        block.resize(self.chunks[k].nitems(), T::default());
        self.chunks[k].decompress_into(&mut block[..]);
        edit(&mut block[..]);
        self.chunks[k] = Chunk::seal(&block[..], self.cparams)?;
        Ok(())
    }

    // Iteration

    /// Lazy iterator over every element.
    pub fn iter(&self) -> CArrayIter<'_, T> {
        CArrayIter::new(self, StridedRange::full(0, self.len(), 1))
    }

    /// Lazy iterator over the strided range with `skip`/`limit` applied.
    /// `skip = -1` yields only the last matching element.
    pub fn iter_opts(
        &self,
        start: usize,
        stop: Option<usize>,
        step: usize,
        limit: Option<usize>,
        skip: isize,
    ) -> Result<CArrayIter<'_, T>, ColzipError> {
        let (start, stop) = normalize_bounds(start, stop, self.len());
        let range = StridedRange::with_opts(start, stop, step, limit, skip)?;
        Ok(CArrayIter::new(self, range))
    }

    /// Lazy iterator over the values of `self` at the true positions of
    /// `mask`; the two arrays must have equal length.
    pub fn where_values<'a>(
        &'a self,
        mask: &'a CArray<bool>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<WhereValues<'a, T>, ColzipError> {
        WhereValues::new(self, mask, skip, limit)
    }

    /// Streams the array into a fresh `CArray` built with `opts`.
    pub fn copy_with(&self, opts: CArrayOptions<T>) -> Result<CArray<T>, ColzipError> {
        let mut opts = opts;
        opts.expectedlen = opts.expectedlen.or(Some(self.len()));
        let mut out = CArray::with_options(opts);
        for k in 0..self.chunks.len() {
            self.with_chunk(k, |block| out.append(block))?;
        }
        out.append(&self.hot)?;
        Ok(out)
    }

    /// Appends every element of `other`, streamed chunk by chunk.
    pub fn append_from(&mut self, other: &CArray<T>) -> Result<(), ColzipError> {
        for k in 0..other.nchunks() {
            other.with_chunk(k, |block| self.append(block))?;
        }
        self.append(other.hot_slice())
    }

    // Internal chunk access

    /// Decompresses chunk `k` into the thread-local scratch and hands the
    /// typed block to `f`. The scratch never escapes the call.
    pub(crate) fn with_chunk<R>(&self, k: usize, f: impl FnOnce(&[T]) -> R) -> R {
        SCRATCH.with(|scratch| {
            let mut buf = scratch.borrow_mut();
            let chunk = &self.chunks[k];
            let nbytes = chunk.nbytes();
            if buf.len() < nbytes {
                buf.resize(nbytes, 0);
            }
            chunk.decompress_bytes_into(&mut buf[..nbytes]);
            // SAFETY: the scratch is 64-byte aligned and holds bytes that
            // round-trip a valid `&[T]` block of `chunk.nitems()` elements.
            let block = unsafe {
                std::slice::from_raw_parts(buf.as_ptr() as *const T, chunk.nitems())
            };
            f(block)
        })
    }

    /// Decompresses chunk `k` into `buf`, reusing its allocation.
    pub(crate) fn load_chunk_into(&self, k: usize, buf: &mut Vec64<T>) {
        let chunk = &self.chunks[k];
        buf.clear();
        buf.resize(chunk.nitems(), T::default());
        chunk.decompress_into(&mut buf[..]);
    }

    #[inline]
    pub(crate) fn hot_slice(&self) -> &[T] {
        &self.hot
    }
}

impl CArray<bool> {
    /// Lazy iterator over the indices where this boolean array is true.
    /// `skip = -1` scans back to front and yields only the last true index.
    pub fn wheretrue(
        &self,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<WhereTrue<'_>, ColzipError> {
        WhereTrue::new(self, skip, limit)
    }
}

impl<T: Element + Numeric> CArray<T> {
    /// Length-`n` array of zeros.
    pub fn zeros(n: usize, opts: CArrayOptions<T>) -> Result<Self, ColzipError> {
        Self::fill(T::zero(), n, opts)
    }

    /// Length-`n` array of ones.
    pub fn ones(n: usize, opts: CArrayOptions<T>) -> Result<Self, ColzipError> {
        Self::fill(T::one(), n, opts)
    }
}

impl<T: Element + Numeric + PartialOrd> CArray<T> {
    /// Evenly spaced values in `[start, stop)`, appended chunk by chunk.
    pub fn arange(
        start: T,
        stop: T,
        step: T,
        opts: CArrayOptions<T>,
    ) -> Result<Self, ColzipError> {
        if step <= T::zero() {
            return Err(ColzipError::InvalidConfig("arange step must be positive".into()));
        }
        let mut arr = Self::with_options(opts);
        let mut block: Vec64<T> = Vec64::with_capacity(arr.chunklen);
        let mut v = start;
        while v < stop {
            block.push(v);
            if block.len() == arr.chunklen {
                arr.append(&block)?;
                block.clear();
            }
            v = v + step;
        }
        arr.append(&block)?;
        Ok(arr)
    }
}

impl<T: Element> Display for CArray<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let len = self.len();
        writeln!(
            f,
            "carray(len={}, dtype={}) nbytes: {}; cbytes: {}; ratio: {:.2}",
            len,
            self.dtype(),
            human_readable_size(self.nbytes()),
            human_readable_size(self.cbytes()),
            self.compression_ratio()
        )?;
        writeln!(f, "  {}", self.cparams)?;
        write!(f, "[")?;
        for (i, v) in self.iter().take(MAX_PREVIEW).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
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

    fn small_opts<T: Element>(chunklen: usize) -> CArrayOptions<T> {
        CArrayOptions {
            chunklen: Some(chunklen),
            ..CArrayOptions::default()
        }
    }

    #[test]
    fn test_compute_chunklen() {
        // 64 KiB target over 8-byte items.
        assert_eq!(compute_chunklen(8, None), 8192);
        // Small expected lengths shrink the chunk.
        assert_eq!(compute_chunklen(8, Some(100)), 64);
        assert_eq!(compute_chunklen(8, Some(1)), 1);
        // Large expected lengths leave the target alone.
        assert_eq!(compute_chunklen(8, Some(10_000_000)), 8192);
        assert_eq!(compute_chunklen(1, None), 65536);
    }

    #[test]
    fn test_roundtrip_exact() {
        let data: Vec<i64> = (0..10_000).collect();
        let arr = CArray::from_slice(&data).unwrap();
        assert_eq!(arr.len(), 10_000);
        assert_eq!(&arr.to_vec()[..], &data[..]);
    }

    #[test]
    fn test_append_length_additivity_and_sealing() {
        let mut arr: CArray<i32> = CArray::with_options(small_opts(16));
        let mut expected = 0;
        for n in [1usize, 15, 16, 33, 7] {
            let block: Vec<i32> = (0..n as i32).collect();
            arr.append(&block).unwrap();
            expected += n;
            assert_eq!(arr.len(), expected);
        }
        // Well-formedness: hot buffer holds len mod chunklen, sealed chunks full.
        assert_eq!(arr.nchunks(), expected / 16);
        assert_eq!(arr.hot_slice().len(), expected % 16);
    }

    #[test]
    fn test_get_and_bounds() {
        let data: Vec<u16> = (0..1000).collect();
        let arr = CArray::from_slice_with(&data, small_opts(32)).unwrap();
        assert_eq!(arr.get(0).unwrap(), 0);
        assert_eq!(arr.get(999).unwrap(), 999);
        assert_eq!(arr.get(31).unwrap(), 31);
        assert_eq!(arr.get(32).unwrap(), 32);
        assert!(matches!(
            arr.get(1000),
            Err(ColzipError::OutOfRange { index: 1000, len: 1000 })
        ));
    }

    #[test]
    fn test_slice_equivalence() {
        let data: Vec<i64> = (0..500).collect();
        let arr = CArray::from_slice_with(&data, small_opts(64)).unwrap();
        for (start, stop, step) in [
            (0usize, Some(10usize), 1usize),
            (0, None, 7),
            (13, Some(499), 3),
            (490, None, 1),
            (100, Some(100), 1),
            (250, Some(40), 2),
        ] {
            let got = arr.slice(start, stop, step).unwrap();
            let stop_n = stop.unwrap_or(500).min(500);
            let want: Vec<i64> = (start..stop_n.max(start))
                .step_by(step)
                .map(|i| arr.get(i).unwrap())
                .collect();
            assert_eq!(&got[..], &want[..], "slice({start}, {stop:?}, {step})");
        }
        assert!(arr.slice(0, None, 0).is_err());
    }

    #[test]
    fn test_trim_unseals_chunks() {
        let data: Vec<i64> = (0..100).collect();
        let mut arr = CArray::from_slice_with(&data, small_opts(16)).unwrap();
        arr.trim(30).unwrap();
        assert_eq!(arr.len(), 70);
        assert_eq!(arr.nchunks(), 4);
        assert_eq!(arr.hot_slice().len(), 6);
        assert_eq!(arr.get(69).unwrap(), 69);
        assert!(arr.trim(71).is_err());
        arr.trim(70).unwrap();
        assert!(arr.is_empty());
    }

    #[test]
    fn test_resize_grows_with_dflt() {
        let opts = CArrayOptions {
            dflt: -1i64,
            chunklen: Some(16),
            ..CArrayOptions::default()
        };
        let data: Vec<i64> = (0..100).collect();
        let mut arr = CArray::from_slice_with(&data, opts).unwrap();
        arr.trim(30).unwrap();
        assert_eq!(arr.len(), 70);
        arr.resize(200).unwrap();
        assert_eq!(arr.len(), 200);
        assert_eq!(arr.get(69).unwrap(), 69);
        assert_eq!(arr.get(70).unwrap(), -1);
        assert_eq!(arr.get(199).unwrap(), -1);
        arr.resize(5).unwrap();
        assert_eq!(&arr.to_vec()[..], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_set_paths_group_by_chunk() {
        let data: Vec<i64> = (0..200).collect();
        let mut arr = CArray::from_slice_with(&data, small_opts(32)).unwrap();

        arr.set(0, 100).unwrap();
        arr.set(199, -5).unwrap();
        assert_eq!(arr.get(0).unwrap(), 100);
        assert_eq!(arr.get(199).unwrap(), -5);

        arr.set_range(10, Some(20), 2, &[7]).unwrap();
        for i in (10..20).step_by(2) {
            assert_eq!(arr.get(i).unwrap(), 7);
        }
        assert_eq!(arr.get(11).unwrap(), 11);

        arr.set_indices(&[150, 3, 150, 42], &[1, 2, 3, 4]).unwrap();
        assert_eq!(arr.get(3).unwrap(), 2);
        // Later write to the same index wins.
        assert_eq!(arr.get(150).unwrap(), 3);
        assert_eq!(arr.get(42).unwrap(), 4);

        assert!(arr.set_indices(&[500], &[1]).is_err());
        assert!(arr.set_range(0, Some(10), 1, &[1, 2]).is_err());
    }

    #[test]
    fn test_set_mask() {
        let mut arr = CArray::from_slice_with(&[10i32, 20, 30, 40], small_opts(2)).unwrap();
        let mask = CArray::from_slice_with(&[true, false, true, false], small_opts(2)).unwrap();
        arr.set_mask(&mask, &[0]).unwrap();
        assert_eq!(&arr.to_vec()[..], &[0, 20, 0, 40]);

        let short = CArray::from_slice(&[true]).unwrap();
        assert!(arr.set_mask(&short, &[0]).is_err());
    }

    #[test]
    fn test_read_range_reuses_buffer() {
        let data: Vec<f64> = (0..300).map(|i| i as f64 / 2.0).collect();
        let arr = CArray::from_slice_with(&data, small_opts(64)).unwrap();
        let mut buf = Vec64::new();
        arr.read_range(60, 100, &mut buf);
        assert_eq!(&buf[..], &data[60..160]);
        arr.read_range(280, 100, &mut buf);
        assert_eq!(&buf[..], &data[280..300]);
        arr.read_range(300, 10, &mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_from_iter_count() {
        let arr: CArray<i64> =
            CArray::from_iter_count(0.., Some(1000), small_opts(64)).unwrap();
        assert_eq!(arr.len(), 1000);
        assert_eq!(arr.get(999).unwrap(), 999);

        let drained: CArray<i64> =
            CArray::from_iter_count(0..10, None, CArrayOptions::default()).unwrap();
        assert_eq!(drained.len(), 10);
    }

    #[test]
    fn test_fill_zeros_ones_arange() {
        let filled = CArray::fill(9u8, 300, small_opts(128)).unwrap();
        assert_eq!(filled.len(), 300);
        assert_eq!(filled.get(299).unwrap(), 9);
        assert_eq!(filled.dflt(), 9);

        let z: CArray<f64> = CArray::zeros(10, CArrayOptions::default()).unwrap();
        assert_eq!(z.get(5).unwrap(), 0.0);
        let o: CArray<i32> = CArray::ones(10, CArrayOptions::default()).unwrap();
        assert_eq!(o.get(5).unwrap(), 1);

        let r = CArray::arange(0i64, 100, 3, small_opts(8)).unwrap();
        let want: Vec<i64> = (0..100).step_by(3).collect();
        assert_eq!(&r.to_vec()[..], &want[..]);
    }

    #[test]
    fn test_copy_with_recompresses() {
        let data: Vec<i64> = (0..500).collect();
        let arr = CArray::from_slice_with(&data, small_opts(64)).unwrap();
        let copy = arr
            .copy_with(CArrayOptions {
                cparams: CParams::new(9, true).unwrap(),
                chunklen: Some(128),
                ..CArrayOptions::default()
            })
            .unwrap();
        assert_eq!(copy.chunklen(), 128);
        assert_eq!(&copy.to_vec()[..], &data[..]);
    }

    #[test]
    fn test_stats_and_display() {
        let arr = CArray::from_slice(&(0..10_000).collect::<Vec<i64>>()).unwrap();
        assert_eq!(arr.nbytes(), 80_000);
        assert!(arr.cbytes() < arr.nbytes());
        assert!(arr.compression_ratio() > 1.0);
        let text = format!("{}", arr);
        assert!(text.contains("dtype=int64"));
        assert!(text.contains("ratio"));
    }
}
