//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into structural tree operations.
//! - Keep callers decoupled from storage details.
//!
//! `TreeService` is defined in `tree_service`; the other modules extend it
//! with one structural concern each.

pub mod cloning;
pub mod ordering;
pub mod relocation;
pub mod sentinel;
pub mod stuck;
pub mod traversal;
pub mod tree_service;
