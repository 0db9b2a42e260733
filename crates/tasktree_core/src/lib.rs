//! Core item tree store for task management.
//! This crate is the single source of truth for hierarchy invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, SentinelTitles, TreeConfig};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::id::{ItemId, TagId};
pub use model::item::{Item, ItemKind, ItemValidationError};
pub use model::tag::{ItemTag, Tag};
pub use repo::tag_repo::TagRepository;
pub use repo::tree_repo::{SqliteTreeRepository, TreeRepoError, TreeRepoResult, TreeRepository};
pub use service::cloning::CloneOutcome;
pub use service::relocation::{ArchiveOutcome, EmptyTrashReport};
pub use service::sentinel::{Sentinel, SentinelTable};
pub use service::stuck::StuckProjects;
pub use service::traversal::TreeIndex;
pub use service::tree_service::{
    EntityKind, RelationViolation, TreeService, TreeServiceError, TreeServiceResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
