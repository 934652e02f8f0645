//! Crash recovery testing for bitcask-style databases.
//!
//! This module provides utilities for testing crash recovery behavior. It
//! simulates crashes at various points during an append and verifies that
//! the database recovers to a consistent state — either every record in a
//! committed batch is visible, or none of them are.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bitcask_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::with_temp_dir().unwrap();
//! harness.test_committed_batch_survives();
//! ```

use bitcask_core::{BackendFactory, CoreError, Database, Options};
use bitcask_storage::StorageBackend;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Result of a single crash recovery scenario.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the scenario behaved as expected.
    pub passed: bool,
    /// What was being tested.
    pub description: String,
    /// Keys expected to be live after recovery.
    pub expected_keys: usize,
    /// Keys actually found live after recovery.
    pub actual_keys: usize,
    /// Failure detail, if any.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Builds a passing result.
    #[must_use]
    pub fn pass(description: &str, keys: usize) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            expected_keys: keys,
            actual_keys: keys,
            error: None,
        }
    }

    /// Builds a failing result.
    #[must_use]
    pub fn fail(description: &str, expected: usize, actual: usize, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected_keys: expected,
            actual_keys: actual,
            error: Some(error.to_string()),
        }
    }
}

/// A storage backend wrapper that fails deterministically after a
/// configured number of bytes have been appended, simulating a process
/// crash mid-write.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
}

impl CrashableBackend {
    /// Wraps `inner`, initially configured never to crash.
    #[must_use]
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
        }
    }

    /// Fails the next append that would cross `bytes` total bytes written.
    pub fn crash_after(&self, bytes: usize) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Fails every subsequent sync.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Whether a simulated crash has already happened.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> bitcask_storage::StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> bitcask_storage::StorageResult<u64> {
        let current = self.bytes_written.fetch_add(data.len(), Ordering::SeqCst);
        let threshold = self.crash_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            self.crashed.store(true, Ordering::SeqCst);
            return Err(crash_error("simulated crash during append"));
        }
        if current + data.len() > threshold {
            self.crashed.store(true, Ordering::SeqCst);
            let partial = threshold - current;
            if partial > 0 {
                let _ = self.inner.append(&data[..partial]);
            }
            return Err(crash_error("simulated crash during partial append"));
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> bitcask_storage::StorageResult<()> {
        self.inner.flush()
    }

    fn size(&self) -> bitcask_storage::StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> bitcask_storage::StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn sync(&mut self) -> bitcask_storage::StorageResult<()> {
        if self.fail_on_sync.load(Ordering::SeqCst) {
            self.crashed.store(true, Ordering::SeqCst);
            return Err(crash_error("simulated crash during sync"));
        }
        self.inner.sync()
    }
}

fn crash_error(message: &str) -> bitcask_storage::StorageError {
    bitcask_storage::StorageError::Io(std::io::Error::other(message))
}

/// Drives a sequence of crash/reopen scenarios against a single database
/// directory.
pub struct CrashRecoveryHarness {
    /// Database directory under test.
    pub db_path: PathBuf,
    /// Results accumulated so far.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Creates a harness rooted at `db_path`.
    #[must_use]
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            results: Vec::new(),
        }
    }

    /// Creates a harness in a fresh temporary directory.
    pub fn with_temp_dir() -> std::io::Result<Self> {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_dir = std::env::temp_dir()
            .join("bitcask_crash_test")
            .join(format!("test_{}_{unique}", std::process::id()));
        std::fs::create_dir_all(&temp_dir)?;
        Ok(Self::new(temp_dir))
    }

    /// Removes the test directory.
    pub fn cleanup(&self) -> std::io::Result<()> {
        if self.db_path.exists() {
            std::fs::remove_dir_all(&self.db_path)?;
        }
        Ok(())
    }

    fn open_fresh(&self) -> Result<Database, CoreError> {
        let _ = std::fs::remove_dir_all(&self.db_path);
        std::fs::create_dir_all(&self.db_path)?;
        Database::open(&self.db_path)
    }

    fn reopen(&self) -> Result<Database, CoreError> {
        Database::open(&self.db_path)
    }

    /// A batch committed and synced before the process "crashes" (the
    /// handle is dropped) must be fully visible after reopening.
    pub fn test_committed_batch_survives(&mut self) -> CrashRecoveryResult {
        let outcome = (|| {
            let db = self.open_fresh()?;
            let batch = db.new_write_batch();
            for i in 0..10u8 {
                batch.put(&[i], &[i; 8])?;
            }
            batch.commit()?;
            drop(db);

            let db = self.reopen()?;
            let found = (0..10u8).filter(|i| db.get(&[*i]).is_ok()).count();
            drop(db);

            Ok(if found == 10 {
                CrashRecoveryResult::pass("committed batch survives restart", 10)
            } else {
                CrashRecoveryResult::fail("committed batch survives restart", 10, found, "some keys were lost")
            })
        })();

        let result = outcome.unwrap_or_else(|e: CoreError| {
            CrashRecoveryResult::fail("committed batch survives restart", 10, 0, &e.to_string())
        });
        self.results.push(result.clone());
        result
    }

    /// A batch whose commit marker never reached disk must leave no trace
    /// after reopening: either all of its records are visible, or none are.
    pub fn test_crash_before_commit_marker_discards_batch(&mut self) -> CrashRecoveryResult {
        let outcome = (|| {
            let factory: BackendFactory = Arc::new(|path: &Path| {
                let inner = bitcask_storage::FileBackend::open(path)?;
                let wrapped = CrashableBackend::new(Box::new(inner));
                wrapped.crash_after(24);
                Ok(Box::new(wrapped) as Box<dyn StorageBackend>)
            });

            let _ = std::fs::remove_dir_all(&self.db_path);
            std::fs::create_dir_all(&self.db_path)?;
            let db = Database::open_with_backend(&self.db_path, Options::default(), factory)?;

            let batch = db.new_write_batch();
            batch.put(b"a", b"1").ok();
            batch.put(b"b", b"2").ok();
            let _ = batch.commit();
            drop(db);

            let db = self.reopen()?;
            let a = db.get(b"a").is_ok();
            let b = db.get(b"b").is_ok();
            drop(db);

            Ok(if a == b {
                CrashRecoveryResult::pass("incomplete batch is all-or-nothing after restart", usize::from(a) * 2)
            } else {
                CrashRecoveryResult::fail(
                    "incomplete batch is all-or-nothing after restart",
                    0,
                    usize::from(a) + usize::from(b),
                    "batch partially applied",
                )
            })
        })();

        let result = outcome.unwrap_or_else(|e: CoreError| {
            CrashRecoveryResult::fail("incomplete batch is all-or-nothing after restart", 0, 0, &e.to_string())
        });
        self.results.push(result.clone());
        result
    }

    /// A delete committed and synced must stay deleted after reopening.
    pub fn test_delete_survives_restart(&mut self) -> CrashRecoveryResult {
        let outcome = (|| {
            let db = self.open_fresh()?;
            db.put(b"k", b"v")?;
            db.delete(b"k")?;
            drop(db);

            let db = self.reopen()?;
            let gone = db.get(b"k").is_err();
            drop(db);

            Ok(if gone {
                CrashRecoveryResult::pass("delete survives restart", 0)
            } else {
                CrashRecoveryResult::fail("delete survives restart", 0, 1, "deleted key reappeared")
            })
        })();

        let result = outcome.unwrap_or_else(|e: CoreError| {
            CrashRecoveryResult::fail("delete survives restart", 0, 0, &e.to_string())
        });
        self.results.push(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_batch_survives() {
        let mut harness = CrashRecoveryHarness::with_temp_dir().unwrap();
        let result = harness.test_committed_batch_survives();
        harness.cleanup().ok();
        assert!(result.passed, "{:?}", result.error);
    }

    #[test]
    fn delete_survives_restart() {
        let mut harness = CrashRecoveryHarness::with_temp_dir().unwrap();
        let result = harness.test_delete_survives_restart();
        harness.cleanup().ok();
        assert!(result.passed, "{:?}", result.error);
    }

    #[test]
    fn incomplete_batch_is_all_or_nothing() {
        let mut harness = CrashRecoveryHarness::with_temp_dir().unwrap();
        let result = harness.test_crash_before_commit_marker_discards_batch();
        harness.cleanup().ok();
        assert!(result.passed, "{:?}", result.error);
    }
}
