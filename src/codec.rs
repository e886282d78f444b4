//! # **Codec Module** - *Block compression behind the chunk store*
//!
//! Thin wrapper over *zstd* block (bulk) compression with the crate's
//! compression-parameter surface: integer levels `0..=9` (0 stores raw) and
//! an optional byte-shuffle pre-filter that transposes item bytes so same
//! significance bytes become adjacent, which compresses markedly better for
//! slowly varying numeric data.
//!
//! The shuffle filter is skipped automatically when the item size is 1.

use crate::enums::error::ColzipError;

/// Compression parameters for chunk sealing.
///
/// `clevel` 0 disables compression entirely; 1-9 map onto zstd levels.
/// `shuffle` enables the byte-shuffle pre-filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CParams {
    clevel: u8,
    shuffle: bool,
}

impl CParams {
    /// Builds a parameter set, validating `clevel <= 9`.
    pub fn new(clevel: u8, shuffle: bool) -> Result<Self, ColzipError> {
        if clevel > 9 {
            return Err(ColzipError::InvalidConfig(format!(
                "clevel must be in 0..=9, got {}",
                clevel
            )));
        }
        Ok(Self { clevel, shuffle })
    }

    #[inline]
    pub fn clevel(&self) -> u8 {
        self.clevel
    }

    #[inline]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Whether the shuffle pre-filter actually runs for `item_size`.
    #[inline]
    pub(crate) fn shuffle_active(&self, item_size: usize) -> bool {
        self.clevel > 0 && self.shuffle && item_size > 1
    }
}

impl Default for CParams {
    fn default() -> Self {
        Self {
            clevel: 5,
            shuffle: true,
        }
    }
}

impl std::fmt::Display for CParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cparams(clevel={}, shuffle={})", self.clevel, self.shuffle)
    }
}

/// Byte-transposes `src` so that byte `j` of every item lands in plane `j`.
fn shuffle_bytes(src: &[u8], item_size: usize, out: &mut Vec<u8>) {
    let n = src.len() / item_size;
    out.clear();
    out.resize(src.len(), 0);
    for j in 0..item_size {
        let plane = &mut out[j * n..(j + 1) * n];
        for (i, slot) in plane.iter_mut().enumerate() {
            *slot = src[i * item_size + j];
        }
    }
}

/// Inverse of [`shuffle_bytes`].
fn unshuffle_bytes(src: &[u8], item_size: usize, out: &mut [u8]) {
    let n = src.len() / item_size;
    for j in 0..item_size {
        let plane = &src[j * n..(j + 1) * n];
        for (i, byte) in plane.iter().enumerate() {
            out[i * item_size + j] = *byte;
        }
    }
}

/// Compresses one chunk's worth of raw element bytes.
///
/// `bytes.len()` must be a multiple of `item_size`.
pub(crate) fn compress(
    bytes: &[u8],
    item_size: usize,
    cparams: &CParams,
) -> Result<Vec<u8>, ColzipError> {
    debug_assert_eq!(bytes.len() % item_size, 0);
    if cparams.clevel() == 0 {
        return Ok(bytes.to_vec());
    }
    let level = cparams.clevel() as i32;
    if cparams.shuffle_active(item_size) {
        let mut shuffled = Vec::new();
        shuffle_bytes(bytes, item_size, &mut shuffled);
        zstd::bulk::compress(&shuffled, level).map_err(|e| ColzipError::Codec(e.to_string()))
    } else {
        zstd::bulk::compress(bytes, level).map_err(|e| ColzipError::Codec(e.to_string()))
    }
}

/// Decompresses a blob produced by [`compress`] with the same parameters
/// into `out`, which the caller sizes from the chunk's recorded element
/// count and item size.
pub(crate) fn decompress(
    src: &[u8],
    item_size: usize,
    cparams: &CParams,
    out: &mut [u8],
) -> Result<(), ColzipError> {
    if cparams.clevel() == 0 {
        if src.len() != out.len() {
            return Err(ColzipError::Codec(format!(
                "raw chunk size {} does not match expected {}",
                src.len(),
                out.len()
            )));
        }
        out.copy_from_slice(src);
        return Ok(());
    }
    let raw = zstd::bulk::decompress(src, out.len())
        .map_err(|e| ColzipError::Codec(e.to_string()))?;
    if raw.len() != out.len() {
        return Err(ColzipError::Codec(format!(
            "decompressed {} bytes, expected {}",
            raw.len(),
            out.len()
        )));
    }
    if cparams.shuffle_active(item_size) {
        unshuffle_bytes(&raw, item_size, out);
    } else {
        out.copy_from_slice(&raw);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bytes_of;

    #[test]
    fn test_clevel_validation() {
        assert!(CParams::new(0, true).is_ok());
        assert!(CParams::new(9, false).is_ok());
        assert!(CParams::new(10, true).is_err());
    }

    #[test]
    fn test_shuffle_roundtrip() {
        let src: Vec<u8> = (0..40).collect();
        let mut shuffled = Vec::new();
        shuffle_bytes(&src, 4, &mut shuffled);
        assert_eq!(shuffled[0], 0);
        assert_eq!(shuffled[1], 4);
        let mut back = vec![0u8; 40];
        unshuffle_bytes(&shuffled, 4, &mut back);
        assert_eq!(back, src);
    }

    #[test]
    fn test_compress_roundtrip_all_levels() {
        let data: Vec<i64> = (0..4096).collect();
        let bytes = bytes_of(&data);
        for clevel in 0..=9 {
            for shuffle in [false, true] {
                let cp = CParams::new(clevel, shuffle).unwrap();
                let packed = compress(bytes, 8, &cp).unwrap();
                let mut out = vec![0u8; bytes.len()];
                decompress(&packed, 8, &cp, &mut out).unwrap();
                assert_eq!(&out, bytes, "clevel={} shuffle={}", clevel, shuffle);
            }
        }
    }

    #[test]
    fn test_shuffle_helps_monotone_data() {
        let data: Vec<i64> = (0..8192).collect();
        let bytes = bytes_of(&data);
        let plain = compress(bytes, 8, &CParams::new(5, false).unwrap()).unwrap();
        let shuffled = compress(bytes, 8, &CParams::new(5, true).unwrap()).unwrap();
        assert!(shuffled.len() < plain.len());
    }

    #[test]
    fn test_level_zero_stores_raw() {
        let data = [7u8, 8, 9];
        let cp = CParams::new(0, true).unwrap();
        let packed = compress(&data, 1, &cp).unwrap();
        assert_eq!(packed, data);
    }
}
