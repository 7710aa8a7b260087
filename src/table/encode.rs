//! Outbound update encoding.
//!
//! Encoding diffs the current table against the snapshot the neighbor
//! already holds and emits the smallest message sequence that closes the
//! gap: slot deltas as signed entries, packed to 4 bits when infinity
//! allows, deflated when that actually saves bytes, and chunked into
//! patch messages of bounded size.

use tracing::debug;

use crate::compress::deflate;
use crate::protocol::{
    Compressor, PatchMessage, RouteTableMessage, ENTRY_BITS_BYTE, ENTRY_BITS_NIBBLE,
};

use super::RouteTable;

/// Most data bytes carried by one patch message.
pub const MAX_PATCH_DATA: usize = 4096;

impl RouteTable {
    /// Compute the messages that bring a neighbor's mirror of this table
    /// up to date.
    ///
    /// `prev` is the snapshot from the previous send; `None` means the
    /// neighbor knows nothing yet, which prepends a reset announcing the
    /// table. Returns an empty vector when the snapshot already matches.
    ///
    /// `allow_compression` permits deflating the entry data; pass `false`
    /// for neighbors that never advertised compression support. Deflate
    /// is only used when it actually shrinks the payload.
    ///
    /// Snapshots must be the same size as the table; rescale with
    /// [`RouteTable::resized`] before diffing against a neighbor that
    /// negotiated a different size.
    ///
    /// # Panics
    ///
    /// If `prev` has a different size than `self`, or if the update needs
    /// more than 255 messages, which a size within wire range cannot.
    pub fn encode_updates(
        &self,
        prev: Option<&RouteTable>,
        allow_compression: bool,
    ) -> Vec<RouteTableMessage> {
        debug_assert!(self.size() <= u32::MAX as usize);
        let mut messages = Vec::new();
        let diff = match prev {
            Some(prev) => {
                assert_eq!(prev.size(), self.size(), "patch requires equal table sizes");
                let mut diff = self.bits.clone();
                diff.xor(&prev.bits);
                diff
            }
            None => {
                messages.push(RouteTableMessage::Reset {
                    size: self.size() as u32,
                    infinity: self.infinity,
                });
                self.bits.clone()
            }
        };

        let mut data = vec![0i8; self.size()];
        let mut changed = false;
        let mut pos = 0;
        while let Some(slot) = diff.next_set(pos) {
            data[slot] = if self.bits.get(slot) {
                self.keyword_present
            } else {
                self.keyword_absent
            };
            changed = true;
            pos = slot + 1;
        }
        if !changed {
            return messages;
        }

        let nibble_fits = self.keyword_present >= -8 && self.keyword_absent <= 7;
        let (entry_bits, body) = if nibble_fits {
            (ENTRY_BITS_NIBBLE, halve(&data))
        } else {
            (ENTRY_BITS_BYTE, data.iter().map(|&v| v as u8).collect())
        };

        let (compressor, payload) = if allow_compression {
            match deflate(&body) {
                Some(packed) if packed.len() < body.len() => (Compressor::Deflate, packed),
                _ => (Compressor::None, body),
            }
        } else {
            (Compressor::None, body)
        };

        let chunk_count = payload.len().div_ceil(MAX_PATCH_DATA);
        assert!(
            chunk_count <= usize::from(u8::MAX),
            "patch sequence needs more than 255 messages"
        );
        let sequence_size = chunk_count as u8;
        for (i, chunk) in payload.chunks(MAX_PATCH_DATA).enumerate() {
            messages.push(RouteTableMessage::Patch(PatchMessage {
                sequence_number: (i + 1) as u8,
                sequence_size,
                compressor,
                entry_bits,
                data: chunk.to_vec(),
            }));
        }
        debug!(
            messages = messages.len(),
            bytes = payload.len(),
            compressor = %compressor,
            entry_bits,
            "encoded table update"
        );
        messages
    }
}

/// Pack signed 4-bit entries two per byte, high nibble first, zero
/// padding an odd count.
pub(super) fn halve(data: &[i8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len().div_ceil(2));
    for pair in data.chunks(2) {
        let hi = pair[0] as u8;
        let lo = pair.get(1).copied().unwrap_or(0) as u8;
        out.push((hi << 4) | (lo & 0x0F));
    }
    out
}

/// Unpack bytes into signed 4-bit entries, sign extending each nibble.
pub(super) fn unhalve(data: &[u8]) -> Vec<i8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        out.push((byte as i8) >> 4);
        out.push(((byte << 4) as i8) >> 4);
    }
    out
}
