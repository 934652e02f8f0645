//! Database configuration.

use std::time::Duration;

/// Which keydir implementation backs a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeydirKind {
    /// Ordered tree-backed keydir with a configurable fan-out.
    BTree {
        /// Target fan-out per node; informational only, since Rust's
        /// standard `BTreeMap` does not expose a tunable node size.
        degree: usize,
    },
    /// Skip-list-backed keydir.
    SkipList,
}

impl Default for KeydirKind {
    fn default() -> Self {
        Self::BTree { degree: 32 }
    }
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Maximum size of a single segment file before rollover.
    pub data_file_size: u64,

    /// How often the active segment is fsynced on a timer, independent of
    /// any per-write sync. `Duration::ZERO` disables the timer (every write
    /// is still synced if `sync_on_put` is set).
    pub sync_interval: Duration,

    /// Whether every successful put/delete/batch commit is synced before
    /// returning to the caller.
    pub sync_on_put: bool,

    /// Keydir implementation to use.
    pub keydir_kind: KeydirKind,

    /// Maximum number of records a single write batch may contain.
    pub max_batch_records: usize,

    /// Skip loading the hint file / full keydir rebuild eagerly and defer
    /// it to first access. Currently informational; `Database::open` always
    /// builds the keydir before returning, but the flag is threaded through
    /// so callers can opt into the behavior once implemented.
    pub fast_open: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            data_file_size: 256 * 1024 * 1024, // 256 MiB
            sync_interval: Duration::ZERO,
            sync_on_put: true,
            keydir_kind: KeydirKind::default(),
            max_batch_records: 10_000,
            fast_open: false,
        }
    }
}

impl Options {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the database already exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the maximum segment file size before rollover.
    #[must_use]
    pub const fn data_file_size(mut self, size: u64) -> Self {
        self.data_file_size = size;
        self
    }

    /// Sets the periodic sync interval for the active segment.
    #[must_use]
    pub const fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets whether every put/delete/commit syncs before returning.
    #[must_use]
    pub const fn sync_on_put(mut self, value: bool) -> Self {
        self.sync_on_put = value;
        self
    }

    /// Sets the keydir implementation.
    #[must_use]
    pub const fn keydir_kind(mut self, kind: KeydirKind) -> Self {
        self.keydir_kind = kind;
        self
    }

    /// Sets the maximum number of records per write batch.
    #[must_use]
    pub const fn max_batch_records(mut self, max: usize) -> Self {
        self.max_batch_records = max;
        self
    }

    /// Sets whether to defer index construction to first access.
    #[must_use]
    pub const fn fast_open(mut self, value: bool) -> Self {
        self.fast_open = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = Options::default();
        assert!(opts.create_if_missing);
        assert!(!opts.error_if_exists);
        assert!(opts.sync_on_put);
        assert_eq!(opts.keydir_kind, KeydirKind::BTree { degree: 32 });
    }

    #[test]
    fn builder_pattern() {
        let opts = Options::new()
            .create_if_missing(false)
            .sync_on_put(false)
            .data_file_size(1024)
            .keydir_kind(KeydirKind::SkipList);

        assert!(!opts.create_if_missing);
        assert!(!opts.sync_on_put);
        assert_eq!(opts.data_file_size, 1024);
        assert_eq!(opts.keydir_kind, KeydirKind::SkipList);
    }
}
