//! Inbound patch application.
//!
//! A neighbor sends table updates as a sequence of up to 255 patch
//! messages. The sequence must arrive gapless and in order, every
//! message must agree on the sequence size and compressor, and a
//! compressed sequence is one zlib stream cut at arbitrary byte
//! boundaries, so the decompressor lives across the whole sequence.
//! Entries are signed deltas applied at a running offset: negative sets
//! the slot, positive clears it, zero leaves it alone.

use thiserror::Error;
use tracing::{debug, trace};

use crate::compress::{InflateError, Inflater};
use crate::protocol::{Compressor, PatchMessage, ENTRY_BITS_NIBBLE};

use super::encode::unhalve;
use super::RouteTable;

/// Why a patch message could not be applied.
///
/// All of these are fatal for the neighbor connection: the mirror table
/// can no longer be trusted to match the sender's view.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch arrived before any reset")]
    MissingReset,
    #[error("patch {got} violates sequence order, expected {expected}")]
    SequenceViolation { expected: u8, got: u8 },
    #[error("sequence size or compressor changed mid-sequence")]
    InconsistentSequence,
    #[error("patch entries {offset}..{end} exceed table size {size}")]
    Overflow {
        offset: usize,
        end: usize,
        size: usize,
    },
    #[error(transparent)]
    Corrupt(#[from] InflateError),
}

/// State of an in-flight patch sequence.
pub(super) struct PatchProgress {
    pub(super) sequence_size: u8,
    pub(super) last_number: u8,
    compressor: Compressor,
    /// Entry offset where the next message's deltas land.
    next_offset: usize,
    /// Present for the whole sequence iff it is compressed.
    inflater: Option<Inflater>,
}

impl RouteTable {
    /// Apply one message of an inbound patch sequence.
    ///
    /// Any error leaves the table's bits exactly as they were before the
    /// call and discards the in-flight sequence; callers should treat it
    /// as fatal and drop the neighbor.
    pub fn apply_patch(&mut self, msg: &PatchMessage) -> Result<(), PatchError> {
        // Owning the progress keeps the borrow checker out of the way and
        // makes every error path discard the sequence for free.
        let mut progress = match self.patch.take() {
            None => {
                if msg.sequence_number != 1 {
                    return Err(PatchError::SequenceViolation {
                        expected: 1,
                        got: msg.sequence_number,
                    });
                }
                debug!(
                    sequence_size = msg.sequence_size,
                    compressor = %msg.compressor,
                    "patch sequence started"
                );
                PatchProgress {
                    sequence_size: msg.sequence_size,
                    last_number: 0,
                    compressor: msg.compressor,
                    next_offset: 0,
                    inflater: match msg.compressor {
                        Compressor::Deflate => Some(Inflater::new()),
                        Compressor::None => None,
                    },
                }
            }
            Some(in_flight) => {
                if msg.sequence_number != in_flight.last_number.wrapping_add(1) {
                    return Err(PatchError::SequenceViolation {
                        expected: in_flight.last_number.wrapping_add(1),
                        got: msg.sequence_number,
                    });
                }
                if msg.sequence_size != in_flight.sequence_size
                    || msg.compressor != in_flight.compressor
                {
                    return Err(PatchError::InconsistentSequence);
                }
                in_flight
            }
        };

        let inflated;
        let raw: &[u8] = match &mut progress.inflater {
            Some(inflater) => {
                inflated = inflater.inflate(&msg.data)?;
                &inflated
            }
            None => &msg.data,
        };

        let mut values: Vec<i8> = if msg.entry_bits == ENTRY_BITS_NIBBLE {
            unhalve(raw)
        } else {
            raw.iter().map(|&b| b as i8).collect()
        };
        // A nibble body zero-pads an odd entry count; the pad may poke a
        // single no-op entry past an odd-sized table.
        if msg.entry_bits == ENTRY_BITS_NIBBLE
            && progress.next_offset + values.len() == self.size() + 1
            && values.last() == Some(&0)
        {
            values.pop();
        }

        let offset = progress.next_offset;
        let end = offset + values.len();
        if end > self.size() {
            return Err(PatchError::Overflow {
                offset,
                end,
                size: self.size(),
            });
        }
        for (k, &value) in values.iter().enumerate() {
            if value < 0 {
                self.bits.set(offset + k);
            } else if value > 0 {
                self.bits.clear(offset + k);
            }
        }
        trace!(
            number = msg.sequence_number,
            entries = values.len(),
            offset,
            "applied patch chunk"
        );

        progress.next_offset = end;
        progress.last_number = msg.sequence_number;
        if msg.sequence_number == progress.sequence_size {
            debug!(
                entries = progress.next_offset,
                ones = self.bits.count_ones(),
                "patch sequence completed"
            );
            self.bits.compact();
        } else {
            self.patch = Some(progress);
        }
        self.mutated();
        Ok(())
    }

    /// Whether a patch sequence is currently open.
    pub fn patch_in_flight(&self) -> bool {
        self.patch.is_some()
    }
}
