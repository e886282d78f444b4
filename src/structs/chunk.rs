//! # **Chunk Module** - *Sealed Compressed Blocks*
//!
//! A `Chunk` is the immutable unit of compressed storage inside a
//! [`crate::CArray`]: one block of elements compressed at seal time with the
//! array's [`CParams`], plus the metadata needed to size decompression
//! buffers without touching the payload.

use crate::codec::{self, CParams};
use crate::enums::error::ColzipError;
use crate::traits::type_unions::Element;
use crate::utils::{bytes_of, bytes_of_mut};

/// One sealed, compressed block of elements. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Compressed payload.
    bytes: Vec<u8>,
    /// Element count in the uncompressed block.
    nitems: usize,
    /// Width of one element in bytes.
    item_size: usize,
    /// Parameters the payload was sealed with.
    cparams: CParams,
}

impl Chunk {
    /// Seals `items` into a compressed chunk.
    pub(crate) fn seal<T: Element>(items: &[T], cparams: CParams) -> Result<Self, ColzipError> {
        let item_size = size_of::<T>();
        let bytes = codec::compress(bytes_of(items), item_size, &cparams)?;
        Ok(Self {
            bytes,
            nitems: items.len(),
            item_size,
            cparams,
        })
    }

    /// Element count of the sealed block.
    #[inline]
    pub fn nitems(&self) -> usize {
        self.nitems
    }

    /// Uncompressed size in bytes.
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.nitems * self.item_size
    }

    /// Compressed size in bytes.
    #[inline]
    pub fn cbytes(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Decompresses the full block into `out`, which must hold exactly
    /// [`Self::nitems`] elements.
    ///
    /// A sealed chunk always decompresses: the payload was produced by this
    /// process from a valid element slice, so a codec failure here means the
    /// chunk was corrupted in memory and there is nothing sane to return.
    pub(crate) fn decompress_into<T: Element>(&self, out: &mut [T]) {
        assert_eq!(size_of::<T>(), self.item_size, "chunk element width mismatch");
        assert_eq!(out.len(), self.nitems, "chunk output length mismatch");
        // SAFETY: the payload round-trips bytes captured from a valid `&[T]`.
        let raw = unsafe { bytes_of_mut(out) };
        if let Err(e) = codec::decompress(&self.bytes, self.item_size, &self.cparams, raw) {
            panic!("corrupted chunk: {}", e);
        }
    }

    /// Byte-level variant of [`Self::decompress_into`] for dtype-agnostic
    /// scratch buffers; `out` must hold exactly [`Self::nbytes`] bytes.
    pub(crate) fn decompress_bytes_into(&self, out: &mut [u8]) {
        assert_eq!(out.len(), self.nbytes(), "chunk output length mismatch");
        if let Err(e) = codec::decompress(&self.bytes, self.item_size, &self.cparams, out) {
            panic!("corrupted chunk: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_decompress() {
        let data: Vec<i32> = (0..1024).map(|i| i * 3).collect();
        let chunk = Chunk::seal(&data, CParams::default()).unwrap();
        assert_eq!(chunk.nitems(), 1024);
        assert_eq!(chunk.nbytes(), 4096);
        assert!(chunk.cbytes() < chunk.nbytes());

        let mut out = vec![0i32; 1024];
        chunk.decompress_into(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn test_seal_bool_block() {
        let data: Vec<bool> = (0..256).map(|i| i % 3 == 0).collect();
        let chunk = Chunk::seal(&data, CParams::default()).unwrap();
        let mut out = vec![false; 256];
        chunk.decompress_into(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    #[should_panic(expected = "chunk output length mismatch")]
    fn test_wrong_output_length_panics() {
        let chunk = Chunk::seal(&[1i64, 2, 3], CParams::default()).unwrap();
        let mut out = vec![0i64; 2];
        chunk.decompress_into(&mut out);
    }
}
