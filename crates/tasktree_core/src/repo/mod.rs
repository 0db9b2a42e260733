//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the row store primitives structural operations are built on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Item::validate()` before persistence.
//! - Repository APIs return semantic errors (`ItemNotFound`) in addition to
//!   DB transport errors.

pub mod tag_repo;
pub mod tree_repo;
