//! # bitcask_testkit
//!
//! Test utilities for exercising bitcask-style crash recovery: a
//! [`StorageBackend`](bitcask_storage::StorageBackend) wrapper that fails
//! deterministically mid-write, and a harness that drives crash/reopen
//! scenarios against a real [`Database`](bitcask_core::Database).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
