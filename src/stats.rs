//! Counters for route table traffic.
//!
//! Plain counters bumped from the owning connection's thread; a
//! [`UpdateStats::snapshot`] clones them into a serializable struct for
//! logs or a control surface.

use serde::Serialize;

use crate::table::RouteTable;

/// Per-connection update and query counters.
#[derive(Debug, Default)]
pub struct UpdateStats {
    resets_received: u64,
    patches_received: u64,
    sequences_completed: u64,
    patch_failures: u64,
    update_messages_sent: u64,
    update_bytes_sent: u64,
    update_bytes_received: u64,
    queries_checked: u64,
    queries_routed: u64,
}

impl UpdateStats {
    pub fn record_reset(&mut self) {
        self.resets_received += 1;
    }

    pub fn record_patch(&mut self, bytes: usize) {
        self.patches_received += 1;
        self.update_bytes_received += bytes as u64;
    }

    pub fn record_sequence_completed(&mut self) {
        self.sequences_completed += 1;
    }

    pub fn record_patch_failure(&mut self) {
        self.patch_failures += 1;
    }

    pub fn record_sent(&mut self, messages: usize, bytes: usize) {
        self.update_messages_sent += messages as u64;
        self.update_bytes_sent += bytes as u64;
    }

    pub fn record_query(&mut self, routed: bool) {
        self.queries_checked += 1;
        if routed {
            self.queries_routed += 1;
        }
    }

    pub fn snapshot(&self) -> UpdateStatsSnapshot {
        UpdateStatsSnapshot {
            resets_received: self.resets_received,
            patches_received: self.patches_received,
            sequences_completed: self.sequences_completed,
            patch_failures: self.patch_failures,
            update_messages_sent: self.update_messages_sent,
            update_bytes_sent: self.update_bytes_sent,
            update_bytes_received: self.update_bytes_received,
            queries_checked: self.queries_checked,
            queries_routed: self.queries_routed,
        }
    }
}

/// Serializable copy of [`UpdateStats`] at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatsSnapshot {
    pub resets_received: u64,
    pub patches_received: u64,
    pub sequences_completed: u64,
    pub patch_failures: u64,
    pub update_messages_sent: u64,
    pub update_bytes_sent: u64,
    pub update_bytes_received: u64,
    pub queries_checked: u64,
    pub queries_routed: u64,
}

/// Point-in-time summary of one table's occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub size: usize,
    pub infinity: u8,
    pub slots_set: usize,
    pub percent_full: f64,
}

impl TableStats {
    pub fn of(table: &RouteTable) -> TableStats {
        TableStats {
            size: table.size(),
            infinity: table.infinity(),
            slots_set: table.count_ones(),
            percent_full: table.percent_full(),
        }
    }
}
