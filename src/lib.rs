//! QRP: Query Routing Protocol
//!
//! Keyword-summary exchange for decentralized overlay meshes. Each node
//! hashes the keywords of its shared content into a fixed-size bit
//! table, ships the table to its neighbors as compressed incremental
//! patches, and forwards a query down a link only when the neighbor's
//! table claims every keyword. False positives cost a wasted forward;
//! false negatives never happen for indexed content.

pub mod bits;
pub mod cache;
pub mod compress;
pub mod config;
pub mod connection;
pub mod hash;
pub mod protocol;
pub mod query;
pub mod refresh;
pub mod stats;
pub mod table;

pub use cache::ResampleCache;
pub use config::{ConfigError, RoutingConfig};
pub use connection::{RoutingError, RoutingState};
pub use protocol::{Compressor, DecodeError, PatchMessage, RouteTableMessage};
pub use query::{Query, RichQuery};
pub use refresh::{LibraryEntry, LibraryHandle, SharedLibrary, TableRefresher};
pub use stats::{TableStats, UpdateStats, UpdateStatsSnapshot};
pub use table::{PatchError, RouteTable, DEFAULT_INFINITY, DEFAULT_TABLE_SIZE, MAX_PATCH_DATA};
