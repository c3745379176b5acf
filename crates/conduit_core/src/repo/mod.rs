//! Storer capability and its relational implementation.
//!
//! # Responsibility
//! - Define the persistence contract used by the service layer.
//! - Isolate SQL text, transactions and aggregate reconstruction from callers.
//!
//! # Invariants
//! - Every multi-statement write commits fully or rolls back fully.
//! - Errors identify the failing step; nothing is retried internally.

pub mod sqlite_storer;
pub mod storer;
