//! Wire encoding of route table messages.
//!
//! Two message variants travel between neighbors, distinguished by the
//! first byte:
//!
//! ```text
//! Reset:  [ 0x00 | size: u32 LE | infinity: u8 ]
//! Patch:  [ 0x01 | seq_num: u8 | seq_size: u8 | compressor: u8 |
//!           entry_bits: u8 | data ... ]
//! ```
//!
//! Reset announces a new empty table of `size` slots. Patch carries one
//! chunk of a patch sequence: `seq_num` counts 1..=`seq_size`, all
//! messages of a sequence must agree on `seq_size` and `compressor`, and
//! `data` holds `entry_bits`-wide deltas (4 or 8), deflated when
//! `compressor` says so. Outer overlay framing (TTL, hop counts,
//! addressing) is the transport's business, not ours.

use thiserror::Error;

// ===== Wire constants =====

/// First byte of a reset message.
pub const VARIANT_RESET: u8 = 0x00;
/// First byte of a patch message.
pub const VARIANT_PATCH: u8 = 0x01;

/// Patch data is raw.
pub const COMPRESSOR_NONE: u8 = 0x00;
/// Patch data is a zlib stream spanning the whole sequence.
pub const COMPRESSOR_DEFLATE: u8 = 0x01;

/// Patch entries packed two per byte.
pub const ENTRY_BITS_NIBBLE: u8 = 4;
/// One patch entry per byte.
pub const ENTRY_BITS_BYTE: u8 = 8;

/// Reset frame length including the variant byte.
const RESET_LEN: usize = 6;
/// Patch header length including the variant byte.
const PATCH_HEADER_LEN: usize = 5;

// ===== Messages =====

/// Compression applied to a patch sequence's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    None,
    Deflate,
}

impl Compressor {
    pub fn to_byte(self) -> u8 {
        match self {
            Compressor::None => COMPRESSOR_NONE,
            Compressor::Deflate => COMPRESSOR_DEFLATE,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Compressor> {
        match byte {
            COMPRESSOR_NONE => Some(Compressor::None),
            COMPRESSOR_DEFLATE => Some(Compressor::Deflate),
            _ => None,
        }
    }
}

impl std::fmt::Display for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compressor::None => write!(f, "none"),
            Compressor::Deflate => write!(f, "deflate"),
        }
    }
}

/// One chunk of a patch sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchMessage {
    /// Position in the sequence, 1-based.
    pub sequence_number: u8,
    /// Total messages in the sequence.
    pub sequence_size: u8,
    pub compressor: Compressor,
    /// Bits per delta entry, 4 or 8.
    pub entry_bits: u8,
    pub data: Vec<u8>,
}

/// A route table update message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTableMessage {
    Reset { size: u32, infinity: u8 },
    Patch(PatchMessage),
}

/// Why a received frame could not be decoded.
///
/// Any of these indicates a broken or hostile neighbor; callers should
/// drop the connection rather than try to resynchronize.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message too short")]
    Truncated,
    #[error("reset frame is {got} bytes, expected {expected}")]
    BadLength { expected: usize, got: usize },
    #[error("unknown message variant {0:#04x}")]
    UnknownVariant(u8),
    #[error("unknown compressor {0:#04x}")]
    UnknownCompressor(u8),
    #[error("entry width {0} is not 4 or 8")]
    BadEntryBits(u8),
    #[error("sequence number {number} outside 1..={size}")]
    BadSequence { number: u8, size: u8 },
    #[error("reset announces a zero-slot table")]
    ZeroSize,
    #[error("reset announces zero infinity")]
    ZeroInfinity,
    #[error("patch message carries no data")]
    EmptyPatch,
}

impl RouteTableMessage {
    /// Length of [`encode`](RouteTableMessage::encode)'s output without
    /// producing it.
    pub fn encoded_len(&self) -> usize {
        match self {
            RouteTableMessage::Reset { .. } => RESET_LEN,
            RouteTableMessage::Patch(patch) => PATCH_HEADER_LEN + patch.data.len(),
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            RouteTableMessage::Reset { size, infinity } => {
                let mut out = Vec::with_capacity(RESET_LEN);
                out.push(VARIANT_RESET);
                out.extend_from_slice(&size.to_le_bytes());
                out.push(*infinity);
                out
            }
            RouteTableMessage::Patch(patch) => {
                let mut out = Vec::with_capacity(PATCH_HEADER_LEN + patch.data.len());
                out.push(VARIANT_PATCH);
                out.push(patch.sequence_number);
                out.push(patch.sequence_size);
                out.push(patch.compressor.to_byte());
                out.push(patch.entry_bits);
                out.extend_from_slice(&patch.data);
                out
            }
        }
    }

    /// Parse and validate wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<RouteTableMessage, DecodeError> {
        let (&variant, rest) = bytes.split_first().ok_or(DecodeError::Truncated)?;
        match variant {
            VARIANT_RESET => {
                if bytes.len() != RESET_LEN {
                    return Err(DecodeError::BadLength {
                        expected: RESET_LEN,
                        got: bytes.len(),
                    });
                }
                let size = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
                let infinity = rest[4];
                if size == 0 {
                    return Err(DecodeError::ZeroSize);
                }
                if infinity == 0 {
                    return Err(DecodeError::ZeroInfinity);
                }
                Ok(RouteTableMessage::Reset { size, infinity })
            }
            VARIANT_PATCH => {
                if bytes.len() < PATCH_HEADER_LEN {
                    return Err(DecodeError::Truncated);
                }
                let sequence_number = rest[0];
                let sequence_size = rest[1];
                if sequence_number == 0 || sequence_number > sequence_size {
                    return Err(DecodeError::BadSequence {
                        number: sequence_number,
                        size: sequence_size,
                    });
                }
                let compressor =
                    Compressor::from_byte(rest[2]).ok_or(DecodeError::UnknownCompressor(rest[2]))?;
                let entry_bits = rest[3];
                if entry_bits != ENTRY_BITS_NIBBLE && entry_bits != ENTRY_BITS_BYTE {
                    return Err(DecodeError::BadEntryBits(entry_bits));
                }
                let data = rest[4..].to_vec();
                if data.is_empty() {
                    return Err(DecodeError::EmptyPatch);
                }
                Ok(RouteTableMessage::Patch(PatchMessage {
                    sequence_number,
                    sequence_size,
                    compressor,
                    entry_bits,
                    data,
                }))
            }
            other => Err(DecodeError::UnknownVariant(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_wire_bytes() {
        let msg = RouteTableMessage::Reset {
            size: 65536,
            infinity: 7,
        };
        assert_eq!(msg.encode(), vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x07]);
    }

    #[test]
    fn test_patch_wire_bytes() {
        let msg = RouteTableMessage::Patch(PatchMessage {
            sequence_number: 1,
            sequence_size: 2,
            compressor: Compressor::Deflate,
            entry_bits: 4,
            data: vec![0xAB, 0xCD],
        });
        assert_eq!(
            msg.encode(),
            vec![0x01, 0x01, 0x02, 0x01, 0x04, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_decode_reset() {
        let msg = RouteTableMessage::decode(&[0x00, 0x00, 0x02, 0x00, 0x00, 0x02]).unwrap();
        assert_eq!(
            msg,
            RouteTableMessage::Reset {
                size: 512,
                infinity: 2
            }
        );
    }

    #[test]
    fn test_decode_patch() {
        let msg = RouteTableMessage::decode(&[0x01, 0x02, 0x03, 0x00, 0x08, 0xFF]).unwrap();
        assert_eq!(
            msg,
            RouteTableMessage::Patch(PatchMessage {
                sequence_number: 2,
                sequence_size: 3,
                compressor: Compressor::None,
                entry_bits: 8,
                data: vec![0xFF],
            })
        );
    }

    #[test]
    fn test_encoded_len_matches_encode() {
        let reset = RouteTableMessage::Reset {
            size: 1024,
            infinity: 7,
        };
        assert_eq!(reset.encoded_len(), reset.encode().len());
        let patch = RouteTableMessage::Patch(PatchMessage {
            sequence_number: 1,
            sequence_size: 1,
            compressor: Compressor::None,
            entry_bits: 8,
            data: vec![1, 2, 3],
        });
        assert_eq!(patch.encoded_len(), patch.encode().len());
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(
            RouteTableMessage::decode(&[]),
            Err(DecodeError::Truncated)
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_variant() {
        assert!(matches!(
            RouteTableMessage::decode(&[0x07, 0x00]),
            Err(DecodeError::UnknownVariant(0x07))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_reset_length() {
        assert!(matches!(
            RouteTableMessage::decode(&[0x00, 0x00, 0x01]),
            Err(DecodeError::BadLength { expected: 6, got: 3 })
        ));
        assert!(matches!(
            RouteTableMessage::decode(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x07, 0x99]),
            Err(DecodeError::BadLength { expected: 6, got: 7 })
        ));
    }

    #[test]
    fn test_decode_rejects_zero_fields() {
        assert!(matches!(
            RouteTableMessage::decode(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x07]),
            Err(DecodeError::ZeroSize)
        ));
        assert!(matches!(
            RouteTableMessage::decode(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x00]),
            Err(DecodeError::ZeroInfinity)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_sequence() {
        // Zero sequence number.
        assert!(matches!(
            RouteTableMessage::decode(&[0x01, 0x00, 0x01, 0x00, 0x08, 0x01]),
            Err(DecodeError::BadSequence { number: 0, size: 1 })
        ));
        // Number beyond size.
        assert!(matches!(
            RouteTableMessage::decode(&[0x01, 0x03, 0x02, 0x00, 0x08, 0x01]),
            Err(DecodeError::BadSequence { number: 3, size: 2 })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_compressor_and_width() {
        assert!(matches!(
            RouteTableMessage::decode(&[0x01, 0x01, 0x01, 0x02, 0x08, 0x01]),
            Err(DecodeError::UnknownCompressor(0x02))
        ));
        assert!(matches!(
            RouteTableMessage::decode(&[0x01, 0x01, 0x01, 0x00, 0x05, 0x01]),
            Err(DecodeError::BadEntryBits(5))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_patch_data() {
        assert!(matches!(
            RouteTableMessage::decode(&[0x01, 0x01, 0x01, 0x00, 0x08]),
            Err(DecodeError::EmptyPatch)
        ));
    }
}
