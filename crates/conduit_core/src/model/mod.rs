//! Entity model shared by the storer, services and transport layers.
//!
//! # Responsibility
//! - Define the plain records persisted by the relational storer.
//! - Keep pure helpers (validation, patch merge) next to the data they touch.
//!
//! # Invariants
//! - An id of `0` means "not yet assigned by the store".
//! - `updated_at == None` means "never updated", never an epoch value.

pub mod order;
pub mod product;
