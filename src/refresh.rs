//! Shared library tracking and debounced table rebuilds.
//!
//! The local route table is a pure function of the shared library, so
//! rather than patching it in place on every add or remove, the
//! refresher rebuilds it from scratch after changes settle. Each change
//! pushes the rebuild deadline out by a quiet period; a cap bounds how
//! long a continuously changing library can defer the rebuild.
//! Subscribers observe finished tables through a watch channel and
//! never see a half-built one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tracing::debug;

use crate::config::{ConfigError, RoutingConfig};
use crate::table::RouteTable;

// ===== Shared library =====

/// One shared file.
///
/// The path contributes keywords and keyword prefixes; each URN is
/// indexed whole so exact-identifier queries can match it.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    /// Path or title the file is shared under.
    pub path: String,
    /// Content identifiers, e.g. `urn:sha1:...`.
    pub urns: Vec<String>,
}

/// The set of files this node shares, keyed by path.
#[derive(Debug, Default)]
pub struct SharedLibrary {
    entries: Vec<LibraryEntry>,
}

impl SharedLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any existing entry with the same path.
    pub fn add(&mut self, entry: LibraryEntry) {
        match self.entries.iter_mut().find(|e| e.path == entry.path) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove the entry with the given path. Returns false if absent.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.entries.iter().position(|e| e.path == path) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.entries.iter()
    }

    /// Build a fresh table covering every entry.
    pub fn build_table(&self, size: usize, infinity: u8) -> RouteTable {
        let mut table = RouteTable::new(size, infinity);
        for entry in &self.entries {
            table.add(&entry.path);
            for urn in &entry.urns {
                table.add_indivisible(urn);
            }
        }
        table
    }
}

// ===== Rebuild debounce =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduleState {
    Clean,
    Dirty { first_ms: u64, deadline_ms: u64 },
}

/// Debounce state for table rebuilds.
///
/// Pure bookkeeping over millisecond timestamps supplied by the
/// caller, so it can be driven by any clock.
#[derive(Debug)]
pub struct RebuildSchedule {
    delay_ms: u64,
    max_delay_ms: u64,
    state: ScheduleState,
}

impl RebuildSchedule {
    pub fn new(delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            delay_ms,
            max_delay_ms,
            state: ScheduleState::Clean,
        }
    }

    /// Record a library change at `now_ms`.
    ///
    /// Pushes the deadline out by the quiet delay, but never past
    /// `max_delay_ms` after the first unflushed change.
    pub fn mark_dirty(&mut self, now_ms: u64) {
        self.state = match self.state {
            ScheduleState::Clean => ScheduleState::Dirty {
                first_ms: now_ms,
                deadline_ms: now_ms + self.delay_ms,
            },
            ScheduleState::Dirty { first_ms, .. } => ScheduleState::Dirty {
                first_ms,
                deadline_ms: (now_ms + self.delay_ms).min(first_ms + self.max_delay_ms),
            },
        };
    }

    pub fn is_dirty(&self) -> bool {
        self.state != ScheduleState::Clean
    }

    /// Deadline of the pending rebuild, if one is scheduled.
    pub fn deadline_ms(&self) -> Option<u64> {
        match self.state {
            ScheduleState::Clean => None,
            ScheduleState::Dirty { deadline_ms, .. } => Some(deadline_ms),
        }
    }

    /// Consume a due deadline. Returns true exactly when a rebuild
    /// should run now, resetting the schedule to clean.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        match self.state {
            ScheduleState::Dirty { deadline_ms, .. } if now_ms >= deadline_ms => {
                self.state = ScheduleState::Clean;
                true
            }
            _ => false,
        }
    }
}

// ===== Refresher task =====

/// Cloneable handle for mutating the shared library.
///
/// Every mutation nudges the refresher, which rebuilds the table once
/// changes settle.
#[derive(Debug, Clone)]
pub struct LibraryHandle {
    library: Arc<Mutex<SharedLibrary>>,
    dirty_tx: mpsc::UnboundedSender<()>,
}

impl LibraryHandle {
    /// Add or replace a shared file.
    pub async fn add_file(&self, path: impl Into<String>, urns: Vec<String>) {
        let entry = LibraryEntry { path: path.into(), urns };
        self.library.lock().await.add(entry);
        let _ = self.dirty_tx.send(());
    }

    /// Remove a shared file. Returns false if no entry had that path.
    pub async fn remove_file(&self, path: &str) -> bool {
        let removed = self.library.lock().await.remove(path);
        if removed {
            let _ = self.dirty_tx.send(());
        }
        removed
    }

    pub async fn file_count(&self) -> usize {
        self.library.lock().await.len()
    }
}

/// Rebuilds the local route table when the shared library changes.
///
/// Owns the library behind a handle, debounces change notifications,
/// and publishes each finished table to a watch channel.
pub struct TableRefresher {
    config: RoutingConfig,
    library: Arc<Mutex<SharedLibrary>>,
    schedule: RebuildSchedule,
    dirty_rx: mpsc::UnboundedReceiver<()>,
    table_tx: watch::Sender<Arc<RouteTable>>,
    started: Instant,
}

impl TableRefresher {
    /// Create a refresher with its library handle and table watch.
    ///
    /// The watch starts with an empty table of the configured size;
    /// subscribers see a new value after each rebuild.
    pub fn new(
        config: RoutingConfig,
    ) -> Result<(Self, LibraryHandle, watch::Receiver<Arc<RouteTable>>), ConfigError> {
        config.validate()?;

        let library = Arc::new(Mutex::new(SharedLibrary::new()));
        let (dirty_tx, dirty_rx) = mpsc::unbounded_channel();
        let initial = Arc::new(RouteTable::new(config.table_size, config.infinity));
        let (table_tx, table_rx) = watch::channel(initial);
        let schedule = RebuildSchedule::new(config.rebuild_delay_ms, config.max_rebuild_delay_ms);

        let handle = LibraryHandle {
            library: Arc::clone(&library),
            dirty_tx,
        };
        let refresher = Self {
            config,
            library,
            schedule,
            dirty_rx,
            table_tx,
            started: Instant::now(),
        };
        Ok((refresher, handle, table_rx))
    }

    /// Run until every library handle is dropped.
    ///
    /// A rebuild still pending at shutdown is flushed so late changes
    /// are not lost.
    pub async fn run(mut self) {
        loop {
            let deadline = self.schedule.deadline_ms();
            tokio::select! {
                changed = self.dirty_rx.recv() => match changed {
                    Some(()) => {
                        let now = self.now_ms();
                        self.schedule.mark_dirty(now);
                    }
                    None => break,
                },
                _ = sleep_until_ms(self.started, deadline), if deadline.is_some() => {
                    let now = self.now_ms();
                    if self.schedule.take_due(now) {
                        self.rebuild().await;
                    }
                }
            }
        }
        if self.schedule.is_dirty() {
            self.rebuild().await;
        }
        debug!("library closed, refresher stopping");
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    async fn rebuild(&mut self) {
        let table = {
            let library = self.library.lock().await;
            library.build_table(self.config.table_size, self.config.infinity)
        };
        debug!(
            slots = table.count_ones(),
            percent_full = table.percent_full(),
            "rebuilt route table"
        );
        self.table_tx.send_replace(Arc::new(table));
    }
}

async fn sleep_until_ms(started: Instant, deadline_ms: Option<u64>) {
    match deadline_ms {
        Some(ms) => tokio::time::sleep_until(started + Duration::from_millis(ms)).await,
        None => std::future::pending().await,
    }
}
