//! Catalog data access contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the reader/writer contracts sessions expose to services.
//! - Isolate SQLite query details from batch orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`ItemNotFound`,
//!   `CollectionNotFound`, `ParentNotFound`) in addition to DB transport
//!   errors.

pub mod catalog_repo;
pub(crate) mod maintenance_repo;
