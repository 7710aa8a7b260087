//! Per-neighbor routing state.
//!
//! Each neighbor connection owns one [`RoutingState`]: the mirror of the
//! table that neighbor advertised to us, the snapshot of the table we
//! last advertised to them, and traffic counters. The inbound mirror
//! answers "should this query be forwarded there"; the outbound snapshot
//! keeps updates incremental.

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{DecodeError, RouteTableMessage};
use crate::query::Query;
use crate::stats::{UpdateStats, UpdateStatsSnapshot};
use crate::table::{PatchError, RouteTable};

/// Anything that can go wrong consuming a neighbor's update bytes.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Routing state for one neighbor connection.
#[derive(Debug, Default)]
pub struct RoutingState {
    /// Mirror of what the neighbor advertised, once they have reset.
    inbound: Option<RouteTable>,
    /// Snapshot of the table we last sent them.
    last_sent: Option<RouteTable>,
    stats: UpdateStats,
}

impl RoutingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and apply one inbound frame.
    pub fn handle_bytes(&mut self, bytes: &[u8]) -> Result<(), RoutingError> {
        let msg = RouteTableMessage::decode(bytes)?;
        self.handle_message(&msg)?;
        Ok(())
    }

    /// Apply one inbound message to the neighbor's mirror table.
    ///
    /// Errors are fatal for the connection; the mirror no longer tracks
    /// what the neighbor thinks it sent.
    pub fn handle_message(&mut self, msg: &RouteTableMessage) -> Result<(), PatchError> {
        match msg {
            RouteTableMessage::Reset { size, infinity } => {
                debug!(size = *size, infinity = *infinity, "neighbor reset route table");
                self.inbound = Some(RouteTable::from_reset(*size as usize, *infinity));
                self.stats.record_reset();
                Ok(())
            }
            RouteTableMessage::Patch(patch) => {
                let table = match self.inbound.as_mut() {
                    Some(table) => table,
                    None => {
                        self.stats.record_patch_failure();
                        return Err(PatchError::MissingReset);
                    }
                };
                self.stats.record_patch(patch.data.len());
                match table.apply_patch(patch) {
                    Ok(()) => {
                        if patch.sequence_number == patch.sequence_size {
                            self.stats.record_sequence_completed();
                        }
                        Ok(())
                    }
                    Err(err) => {
                        warn!(error = %err, "patch application failed");
                        self.stats.record_patch_failure();
                        Err(err)
                    }
                }
            }
        }
    }

    /// Whether a query should be forwarded to this neighbor.
    ///
    /// A neighbor that has not advertised a table receives nothing
    /// through this check; flooding policies for such neighbors live a
    /// layer up.
    pub fn should_route(&mut self, query: &Query) -> bool {
        let routed = self
            .inbound
            .as_ref()
            .is_some_and(|table| table.contains(query));
        self.stats.record_query(routed);
        routed
    }

    /// Messages that bring this neighbor up to date with `local`.
    ///
    /// Diffs against the last sent snapshot; a changed table size forces
    /// a fresh reset instead of a patch. `allow_compression` reflects
    /// whether this neighbor accepts deflated patch data. Returns an
    /// empty vector when the neighbor is already current, and snapshots
    /// `local` otherwise.
    pub fn prepare_update(
        &mut self,
        local: &RouteTable,
        allow_compression: bool,
    ) -> Vec<RouteTableMessage> {
        let prev = self.last_sent.as_ref().filter(|p| p.size() == local.size());
        let messages = local.encode_updates(prev, allow_compression);
        if !messages.is_empty() {
            let bytes: usize = messages.iter().map(|m| m.encoded_len()).sum();
            self.stats.record_sent(messages.len(), bytes);
            self.last_sent = Some(local.clone());
        }
        messages
    }

    /// The neighbor's advertised table, if they have sent one.
    pub fn inbound_table(&self) -> Option<&RouteTable> {
        self.inbound.as_ref()
    }

    pub fn stats(&self) -> UpdateStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_local(paths: &[&str]) -> RouteTable {
        let mut table = RouteTable::new(1024, 7);
        for path in paths {
            table.add(path);
        }
        table
    }

    #[test]
    fn test_update_flow_and_query_gating() {
        let local = make_local(&["foo bar.mp3"]);
        let mut sender = RoutingState::new();
        let mut receiver = RoutingState::new();

        let messages = sender.prepare_update(&local, true);
        assert!(!messages.is_empty());
        for msg in &messages {
            receiver.handle_message(msg).unwrap();
        }

        assert_eq!(receiver.inbound_table().unwrap(), &local);
        assert!(receiver.should_route(&Query::new("foo")));
        assert!(!receiver.should_route(&Query::new("baz")));

        let stats = receiver.stats();
        assert_eq!(stats.resets_received, 1);
        assert_eq!(stats.sequences_completed, 1);
        assert_eq!(stats.queries_checked, 2);
        assert_eq!(stats.queries_routed, 1);

        let sent = sender.stats();
        assert_eq!(sent.update_messages_sent as usize, messages.len());
        assert!(sent.update_bytes_sent > 0);
    }

    #[test]
    fn test_handle_bytes_round_trip() {
        let local = make_local(&["foo"]);
        let mut sender = RoutingState::new();
        let mut receiver = RoutingState::new();
        for msg in sender.prepare_update(&local, true) {
            receiver.handle_bytes(&msg.encode()).unwrap();
        }
        assert!(receiver.should_route(&Query::new("foo")));
    }

    #[test]
    fn test_compression_can_be_disabled() {
        let local = make_local(&["foo bar baz.mp3"]);
        let mut sender = RoutingState::new();
        let mut receiver = RoutingState::new();

        let messages = sender.prepare_update(&local, false);
        for msg in &messages {
            if let RouteTableMessage::Patch(patch) = msg {
                assert_eq!(patch.compressor, crate::protocol::Compressor::None);
            }
            receiver.handle_message(msg).unwrap();
        }
        assert_eq!(receiver.inbound_table().unwrap(), &local);
    }

    #[test]
    fn test_handle_bytes_propagates_decode_errors() {
        let mut state = RoutingState::new();
        let err = state.handle_bytes(&[0x42]).unwrap_err();
        assert!(matches!(err, RoutingError::Decode(_)));
    }

    #[test]
    fn test_patch_before_reset_is_rejected() {
        let mut state = RoutingState::new();
        let patch = RouteTableMessage::Patch(crate::protocol::PatchMessage {
            sequence_number: 1,
            sequence_size: 1,
            compressor: crate::protocol::Compressor::None,
            entry_bits: 8,
            data: vec![0xFA],
        });
        let err = state.handle_message(&patch).unwrap_err();
        assert!(matches!(err, PatchError::MissingReset));
        assert_eq!(state.stats().patch_failures, 1);
    }

    #[test]
    fn test_no_route_without_advertised_table() {
        let mut state = RoutingState::new();
        assert!(!state.should_route(&Query::new("foo")));
        assert_eq!(state.stats().queries_checked, 1);
    }

    #[test]
    fn test_second_update_is_incremental_or_empty() {
        let mut local = make_local(&["foo"]);
        let mut sender = RoutingState::new();
        let mut receiver = RoutingState::new();
        for msg in sender.prepare_update(&local, true) {
            receiver.handle_message(&msg).unwrap();
        }

        // Nothing changed: nothing to send.
        assert!(sender.prepare_update(&local, true).is_empty());

        // A delta goes out as patches only.
        local.add("bar");
        let messages = sender.prepare_update(&local, true);
        assert!(!messages.is_empty());
        assert!(messages
            .iter()
            .all(|m| matches!(m, RouteTableMessage::Patch(_))));
        for msg in &messages {
            receiver.handle_message(msg).unwrap();
        }
        assert!(receiver.should_route(&Query::new("bar")));
    }

    #[test]
    fn test_size_change_forces_fresh_reset() {
        let small = make_local(&["foo"]);
        let mut sender = RoutingState::new();
        let _ = sender.prepare_update(&small, true);

        let mut large = RouteTable::new(4096, 7);
        large.add("foo");
        let messages = sender.prepare_update(&large, true);
        assert!(matches!(
            messages[0],
            RouteTableMessage::Reset { size: 4096, .. }
        ));
    }
}
