//! Use-case services over the storer capability.
//!
//! # Responsibility
//! - Orchestrate storer calls into request-level entry points.
//! - Supply timestamps and owner identity; never issue SQL directly.
//!
//! # See also
//! - `repo::storer` for the persistence contract.

pub mod order_service;
pub mod product_service;
