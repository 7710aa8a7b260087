//! Zlib compression for patch payloads.
//!
//! Encoding uses a one-shot deflate of the whole patch body; decoding
//! uses a streaming [`Inflater`] because the remote side compresses the
//! body as a single zlib stream and then splits it across up to 255
//! sequence messages. The inflater must therefore survive from the first
//! message of a sequence to the last, feeding each chunk into the same
//! stream.

use std::fmt;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use thiserror::Error;

/// Decompression failed; the containing patch sequence is unusable.
#[derive(Debug, Error)]
#[error("corrupt compressed patch data: {0}")]
pub struct InflateError(#[from] flate2::DecompressError);

/// Compress `data` as a single zlib stream.
///
/// Returns `None` if the encoder fails, letting callers fall back to an
/// uncompressed encoding instead of propagating an error.
pub fn deflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).ok()?;
    encoder.finish().ok()
}

/// Streaming zlib decompressor for one patch sequence.
pub struct Inflater {
    inner: Decompress,
}

impl Inflater {
    pub fn new() -> Self {
        Inflater {
            inner: Decompress::new(true),
        }
    }

    /// Feed one compressed chunk into the stream, returning the bytes it
    /// produced.
    ///
    /// A chunk may end mid-symbol; whatever state is pending stays inside
    /// the decompressor until the next call. Input past the end of the
    /// zlib stream is ignored.
    pub fn inflate(&mut self, chunk: &[u8]) -> Result<Vec<u8>, InflateError> {
        let mut out = Vec::with_capacity(chunk.len().saturating_mul(4).max(64));
        let mut consumed = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(64));
            }
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status =
                self.inner
                    .decompress_vec(&chunk[consumed..], &mut out, FlushDecompress::Sync)?;
            consumed += (self.inner.total_in() - before_in) as usize;
            let produced = self.inner.total_out() - before_out;
            if status == Status::StreamEnd {
                break;
            }
            if produced == 0 && self.inner.total_in() == before_in {
                // No forward progress with spare output available, so the
                // stream needs input we do not have yet.
                break;
            }
        }
        Ok(out)
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Inflater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Inflater {{ in: {}, out: {} }}",
            self.inner.total_in(),
            self.inner.total_out()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_inflate_round_trip() {
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let packed = deflate(&data).unwrap();
        assert!(packed.len() < data.len());

        let mut inflater = Inflater::new();
        let restored = inflater.inflate(&packed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_inflate_across_split_chunks() {
        // One stream cut at an arbitrary byte boundary must reassemble.
        let data = vec![7u8; 10_000];
        let packed = deflate(&data).unwrap();
        let cut = packed.len() / 3;

        let mut inflater = Inflater::new();
        let mut restored = inflater.inflate(&packed[..cut]).unwrap();
        restored.extend(inflater.inflate(&packed[cut..]).unwrap());
        assert_eq!(restored, data);
    }

    #[test]
    fn test_inflate_many_tiny_chunks() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i / 7) as u8).collect();
        let packed = deflate(&data).unwrap();

        let mut inflater = Inflater::new();
        let mut restored = Vec::new();
        for chunk in packed.chunks(3) {
            restored.extend(inflater.inflate(chunk).unwrap());
        }
        assert_eq!(restored, data);
    }

    #[test]
    fn test_inflate_rejects_garbage() {
        let mut inflater = Inflater::new();
        assert!(inflater.inflate(&[0xAB, 0xCD, 0xEF, 0x01]).is_err());
    }

    #[test]
    fn test_inflate_empty_chunk_is_noop() {
        let mut inflater = Inflater::new();
        assert_eq!(inflater.inflate(&[]).unwrap(), Vec::<u8>::new());
    }
}
