//! File system primitives with atomicity guarantees.
//!
//! Provides atomic single-file writes, read-modify-write updates, and
//! multi-file transactions that are committed or rolled back as a unit.

pub mod atomic;
pub mod content;
pub mod nonblocking;
pub mod transaction;

pub use atomic::{atomic_update, atomic_write, read_text};
pub use content::{Content, DEFAULT_MODE, Encoding, UpdateOptions, WriteOptions, parse_mode};
pub use transaction::{Snapshot, Transaction, TransactionStats, WriteRequest, multi_write};
