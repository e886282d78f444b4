//! # **Iterator Module** - *Streaming Access Over Compressed Storage*
//!
//! Single-pass, chunk-granular iterators: strided element iteration,
//! boolean-position iteration (`wheretrue`), and value-at-mask iteration
//! (`where_values`). All decompress one chunk at a time into a private
//! cache, so the working set stays bounded by a single chunk.
//!
//! `skip = -1` is the "last match only" shortcut: position arithmetic for
//! plain ranges, a back-to-front chunk scan for boolean masks, which finds
//! the last set index without decompressing the whole array.

use std::sync::Arc;

use vec64::Vec64;

use crate::enums::error::ColzipError;
use crate::structs::carray::CArray;
use crate::traits::type_unions::Element;
use crate::utils::strided_len;

/// Lazy positions of a strided half-open range with `skip`/`limit` applied.
#[derive(Clone, Debug)]
pub(crate) struct StridedRange {
    next: usize,
    stop: usize,
    step: usize,
    remaining: Option<usize>,
}

impl StridedRange {
    pub(crate) fn full(start: usize, stop: usize, step: usize) -> Self {
        Self {
            next: start,
            stop,
            step,
            remaining: None,
        }
    }

    /// Builds the range with `skip`/`limit` semantics: `skip >= 0` discards
    /// that many leading positions, `skip = -1` keeps only the last one.
    pub(crate) fn with_opts(
        start: usize,
        stop: usize,
        step: usize,
        limit: Option<usize>,
        skip: isize,
    ) -> Result<Self, ColzipError> {
        if step == 0 {
            return Err(ColzipError::InvalidConfig("step must be positive".into()));
        }
        if skip < -1 {
            return Err(ColzipError::InvalidConfig(
                "skip must be non-negative, or -1 for last-match-only".into(),
            ));
        }
        if skip == -1 {
            let n = strided_len(start, stop, step);
            if n == 0 || limit == Some(0) {
                return Ok(Self::full(0, 0, 1));
            }
            return Ok(Self {
                next: start + (n - 1) * step,
                stop,
                step,
                remaining: Some(1),
            });
        }
        Ok(Self {
            next: start.saturating_add(skip as usize * step),
            stop,
            step,
            remaining: limit,
        })
    }
}

impl Iterator for StridedRange {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == Some(0) || self.next >= self.stop {
            return None;
        }
        let i = self.next;
        self.next = self.next.saturating_add(self.step);
        if let Some(r) = self.remaining.as_mut() {
            *r -= 1;
        }
        Some(i)
    }
}

/// One-chunk decompression cache for monotone index access.
#[derive(Debug)]
pub(crate) struct ChunkCache<T: Element> {
    idx: Option<usize>,
    buf: Vec64<T>,
}

impl<T: Element> ChunkCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            idx: None,
            buf: Vec64::new(),
        }
    }

    /// Element at logical index `i`, decompressing the owning chunk only
    /// when it differs from the cached one.
    pub(crate) fn value_at(&mut self, arr: &CArray<T>, i: usize) -> T {
        let sealed = arr.nchunks() * arr.chunklen();
        if i >= sealed {
            return arr.hot_slice()[i - sealed];
        }
        let k = i / arr.chunklen();
        if self.idx != Some(k) {
            arr.load_chunk_into(k, &mut self.buf);
            self.idx = Some(k);
        }
        self.buf[i % arr.chunklen()]
    }
}

/// Lazy strided iterator over a [`CArray`]. Single-pass; call the array's
/// `iter`/`iter_opts` again to restart.
pub struct CArrayIter<'a, T: Element> {
    arr: &'a CArray<T>,
    range: StridedRange,
    cache: ChunkCache<T>,
}

impl<'a, T: Element> CArrayIter<'a, T> {
    pub(crate) fn new(arr: &'a CArray<T>, range: StridedRange) -> Self {
        Self {
            arr,
            range,
            cache: ChunkCache::new(),
        }
    }
}

impl<T: Element> Iterator for CArrayIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let i = self.range.next()?;
        Some(self.cache.value_at(self.arr, i))
    }
}

/// A boolean mask held either by borrow or by shared ownership, so
/// evaluator-produced masks can back iterators without outliving anything.
#[derive(Clone)]
pub(crate) enum BoolRef<'a> {
    Borrowed(&'a CArray<bool>),
    Shared(Arc<CArray<bool>>),
}

impl BoolRef<'_> {
    #[inline]
    pub(crate) fn arr(&self) -> &CArray<bool> {
        match self {
            BoolRef::Borrowed(a) => a,
            BoolRef::Shared(a) => a,
        }
    }
}

enum WtMode {
    Forward {
        pos: usize,
        skip: usize,
        remaining: Option<usize>,
        cache: ChunkCache<bool>,
    },
    LastOnly {
        done: bool,
    },
}

/// Lazy iterator over the indices where a boolean [`CArray`] is true.
pub struct WhereTrue<'a> {
    mask: BoolRef<'a>,
    mode: WtMode,
}

impl<'a> WhereTrue<'a> {
    pub(crate) fn new(
        mask: &'a CArray<bool>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<Self, ColzipError> {
        Self::build(BoolRef::Borrowed(mask), skip, limit)
    }

    pub(crate) fn new_shared(
        mask: Arc<CArray<bool>>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<WhereTrue<'static>, ColzipError> {
        WhereTrue::build(BoolRef::Shared(mask), skip, limit)
    }

    fn build(mask: BoolRef<'a>, skip: isize, limit: Option<usize>) -> Result<Self, ColzipError> {
        let mode = match skip {
            -1 => WtMode::LastOnly {
                done: limit == Some(0),
            },
            s if s >= 0 => WtMode::Forward {
                pos: 0,
                skip: s as usize,
                remaining: limit,
                cache: ChunkCache::new(),
            },
            _ => {
                return Err(ColzipError::InvalidConfig(
                    "skip must be non-negative, or -1 for last-match-only".into(),
                ));
            }
        };
        Ok(Self { mask, mode })
    }

    /// Back-to-front scan for the last true index; touches chunks only
    /// until it finds one.
    fn last_true(&self) -> Option<usize> {
        let arr = self.mask.arr();
        let sealed = arr.nchunks() * arr.chunklen();
        let hot = arr.hot_slice();
        for j in (0..hot.len()).rev() {
            if hot[j] {
                return Some(sealed + j);
            }
        }
        let mut buf = Vec64::new();
        for k in (0..arr.nchunks()).rev() {
            arr.load_chunk_into(k, &mut buf);
            for j in (0..buf.len()).rev() {
                if buf[j] {
                    return Some(k * arr.chunklen() + j);
                }
            }
        }
        None
    }
}

impl Iterator for WhereTrue<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match &mut self.mode {
            WtMode::LastOnly { done } => {
                if *done {
                    return None;
                }
                *done = true;
                self.last_true()
            }
            WtMode::Forward {
                pos,
                skip,
                remaining,
                cache,
            } => {
                let arr = self.mask.arr();
                let len = arr.len();
                while *pos < len {
                    let i = *pos;
                    *pos += 1;
                    if !cache.value_at(arr, i) {
                        continue;
                    }
                    if *skip > 0 {
                        *skip -= 1;
                        continue;
                    }
                    if *remaining == Some(0) {
                        return None;
                    }
                    if let Some(r) = remaining.as_mut() {
                        *r -= 1;
                    }
                    return Some(i);
                }
                None
            }
        }
    }
}

/// Lazy iterator over the values of one array at the true positions of an
/// equal-length boolean array.
pub struct WhereValues<'a, T: Element> {
    values: &'a CArray<T>,
    mask_iter: WhereTrue<'a>,
    cache: ChunkCache<T>,
}

impl<'a, T: Element> WhereValues<'a, T> {
    pub(crate) fn new(
        values: &'a CArray<T>,
        mask: &'a CArray<bool>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<Self, ColzipError> {
        if mask.len() != values.len() {
            return Err(ColzipError::LengthMismatch {
                expected: values.len(),
                found: mask.len(),
            });
        }
        Ok(Self {
            values,
            mask_iter: WhereTrue::new(mask, skip, limit)?,
            cache: ChunkCache::new(),
        })
    }

    pub(crate) fn new_shared(
        values: &'a CArray<T>,
        mask: Arc<CArray<bool>>,
        skip: isize,
        limit: Option<usize>,
    ) -> Result<Self, ColzipError> {
        if mask.len() != values.len() {
            return Err(ColzipError::LengthMismatch {
                expected: values.len(),
                found: mask.len(),
            });
        }
        Ok(Self {
            values,
            mask_iter: WhereTrue::new_shared(mask, skip, limit)?,
            cache: ChunkCache::new(),
        })
    }
}

impl<T: Element> Iterator for WhereValues<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let i = self.mask_iter.next()?;
        Some(self.cache.value_at(self.values, i))
    }
}
