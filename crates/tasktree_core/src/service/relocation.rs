//! Subtree relocation to sentinel folders.
//!
//! # Responsibility
//! - Trash and archive subtrees by re-parenting only their root.
//! - Permanently purge the direct children of Trash.
//!
//! # Invariants
//! - Descendants follow their root structurally; they are never rewritten.
//! - Archiving an already archived item performs no write.
//! - Emptying the trash never recurses: grandchildren of Trash stay in place
//!   as orphaned rows.

use crate::model::id::ItemId;
use crate::model::item::Item;
use crate::repo::tag_repo::TagRepository;
use crate::repo::tree_repo::TreeRepository;
use crate::service::sentinel::Sentinel;
use crate::service::traversal::Ancestry;
use crate::service::tree_service::{EntityKind, TreeService, TreeServiceResult};
use log::info;

/// Result of an archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Item was moved under Archive.
    Archived(Item),
    /// Item already lived under Archive (or is Archive); nothing was written.
    AlreadyArchived,
}

/// Rows removed by an empty-trash pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmptyTrashReport {
    pub removed: Vec<ItemId>,
}

impl<R: TreeRepository + TagRepository> TreeService<R> {
    /// Moves an item and, structurally, its whole subtree under Trash.
    pub fn delete_item(&self, id: &ItemId) -> TreeServiceResult<Item> {
        self.repo.in_transaction(|| -> TreeServiceResult<Item> {
            let item = self.require_live(id, EntityKind::Item)?;
            let sentinels = self.resolve_sentinels()?;
            let trash = sentinels.require(Sentinel::Trash)?;
            self.relocate(&item, Some(trash))
        })
    }

    /// Moves an item under Archive unless it is already archived.
    pub fn archive_item(&self, id: &ItemId) -> TreeServiceResult<ArchiveOutcome> {
        self.repo.in_transaction(|| -> TreeServiceResult<ArchiveOutcome> {
            let item = self.require_live(id, EntityKind::Item)?;
            let sentinels = self.resolve_sentinels()?;
            let archive = sentinels.require(Sentinel::Archive)?;

            if item.id == *archive || self.walk_ancestry(&item.id, archive)? == Ancestry::Found {
                info!(
                    "event=tree_archive module=tree status=noop item_id={}",
                    item.id
                );
                return Ok(ArchiveOutcome::AlreadyArchived);
            }

            let moved = self.relocate(&item, Some(archive))?;
            Ok(ArchiveOutcome::Archived(moved))
        })
    }

    /// Permanently removes direct children of Trash modified before `cutoff`
    /// (epoch seconds), or all direct children when `cutoff` is `None`.
    pub fn empty_trash(&self, cutoff: Option<i64>) -> TreeServiceResult<EmptyTrashReport> {
        self.repo.in_transaction(|| -> TreeServiceResult<EmptyTrashReport> {
            let sentinels = self.resolve_sentinels()?;
            let trash = sentinels.require(Sentinel::Trash)?;
            let removed = self.repo.list_direct_children_before(trash, cutoff)?;
            let purged = self.repo.purge_items(&removed)?;
            info!(
                "event=tree_empty_trash module=tree status=ok cutoff={} removed={}",
                cutoff.map_or_else(|| "none".to_string(), |value| value.to_string()),
                purged
            );
            Ok(EmptyTrashReport { removed })
        })
    }
}
