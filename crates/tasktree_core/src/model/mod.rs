//! Domain model for the item hierarchy.
//!
//! # Responsibility
//! - Define canonical records mirrored by the `items`, `tags` and `item_tags`
//!   tables.
//! - Keep kind semantics (task vs container) in one place.
//!
//! # Invariants
//! - Every record is identified by an opaque, stable id.
//! - `completed_at` is only ever set on task items.
//! - Trashing is structural (relocation under a sentinel), not a flag.
//! - Tag names and sentinel titles compare with full Unicode case folding
//!   in Rust, never with SQLite's ASCII-only `lower()`.

pub mod id;
pub mod item;
pub mod tag;

/// Case-insensitive name comparison used for tag names and sentinel titles.
///
/// Both sides are trimmed and lowercased with Unicode rules, so `Étape`
/// matches `ÉTAPE`.
pub fn names_match(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}
