//! Sibling order maintenance.
//!
//! # Responsibility
//! - Compute append positions for new or moved items.
//! - Swap, reposition, and fully reorder live siblings.
//! - Re-parent items while rejecting parent cycles; a parent chain too deep
//!   to walk within the traversal ceiling is rejected as well.
//!
//! # Invariants
//! - `move_to_position` and `reorder_children` leave live siblings numbered
//!   densely from 0; only rows whose position changes are written.
//! - A cross-parent move does not renumber the siblings it leaves behind.
//! - Invalid requests are rejected before the first write.

use crate::model::id::ItemId;
use crate::model::item::Item;
use crate::repo::tag_repo::TagRepository;
use crate::repo::tree_repo::TreeRepository;
use crate::service::traversal::Ancestry;
use crate::service::tree_service::{
    EntityKind, RelationViolation, TreeService, TreeServiceResult,
};
use log::info;
use std::collections::{HashMap, HashSet};

impl<R: TreeRepository + TagRepository> TreeService<R> {
    /// Position a new last live child of `parent_id` would receive.
    pub fn append_position(&self, parent_id: Option<&ItemId>) -> TreeServiceResult<i64> {
        if let Some(parent_id) = parent_id {
            self.require_live(parent_id, EntityKind::Parent)?;
        }
        Ok(self.repo.next_sort_order(parent_id)?)
    }

    /// Exchanges the positions of two siblings.
    pub fn swap(&self, first: &ItemId, second: &ItemId) -> TreeServiceResult<()> {
        self.repo.in_transaction(|| -> TreeServiceResult<()> {
            let first_item = self.require_live(first, EntityKind::Item)?;
            let second_item = self.require_live(second, EntityKind::Item)?;
            if first_item.parent_id != second_item.parent_id {
                return Err(RelationViolation::DifferentParents {
                    first: first.clone(),
                    second: second.clone(),
                }
                .into());
            }
            if first_item.sort_order == second_item.sort_order {
                return Ok(());
            }

            self.repo
                .set_sort_order(&first_item.id, second_item.sort_order)?;
            self.repo
                .set_sort_order(&second_item.id, first_item.sort_order)?;
            info!(
                "event=tree_swap module=tree status=ok first_id={} second_id={}",
                first, second
            );
            Ok(())
        })
    }

    /// Moves an item to `target_index` among its live siblings and renumbers
    /// the whole sibling set densely. Returns the resulting sibling order.
    pub fn move_to_position(
        &self,
        id: &ItemId,
        target_index: i64,
    ) -> TreeServiceResult<Vec<ItemId>> {
        self.repo.in_transaction(|| -> TreeServiceResult<Vec<ItemId>> {
            let item = self.require_live(id, EntityKind::Item)?;
            let mut ordered: Vec<Item> = self
                .repo
                .list_children(item.parent_id.as_ref())?
                .into_iter()
                .filter(|sibling| sibling.id != item.id)
                .collect();

            let index = target_index.clamp(0, ordered.len() as i64) as usize;
            ordered.insert(index, item);
            let changed = self.renumber(&ordered)?;
            info!(
                "event=tree_move_to_position module=tree status=ok item_id={} index={} changed={}",
                id, index, changed
            );
            Ok(ordered.into_iter().map(|sibling| sibling.id).collect())
        })
    }

    /// Assigns `position = index` for a full permutation of the live children
    /// of `parent_id`. Returns the number of rows whose position changed.
    pub fn reorder_children(
        &self,
        parent_id: Option<&ItemId>,
        ordered_ids: &[ItemId],
    ) -> TreeServiceResult<usize> {
        self.repo.in_transaction(|| -> TreeServiceResult<usize> {
            if let Some(parent_id) = parent_id {
                self.require_live(parent_id, EntityKind::Parent)?;
            }
            let children = self.repo.list_children(parent_id)?;
            let mut by_id: HashMap<ItemId, Item> = children
                .into_iter()
                .map(|child| (child.id.clone(), child))
                .collect();

            let mut seen = HashSet::new();
            for id in ordered_ids {
                if !seen.insert(id) {
                    return Err(RelationViolation::DuplicateId(id.clone()).into());
                }
                if !by_id.contains_key(id) {
                    return Err(RelationViolation::ForeignChild {
                        parent_id: parent_id.cloned(),
                        id: id.clone(),
                    }
                    .into());
                }
            }
            if ordered_ids.len() != by_id.len() {
                return Err(RelationViolation::CountMismatch {
                    expected: by_id.len(),
                    actual: ordered_ids.len(),
                }
                .into());
            }

            let ordered: Vec<Item> = ordered_ids
                .iter()
                .filter_map(|id| by_id.remove(id))
                .collect();
            let changed = self.renumber(&ordered)?;
            info!(
                "event=tree_reorder module=tree status={} parent_id={} count={} changed={}",
                if changed == 0 { "noop" } else { "ok" },
                parent_label(parent_id),
                ordered.len(),
                changed
            );
            Ok(changed)
        })
    }

    /// Re-parents an item, appending it after the live children of
    /// `new_parent_id`. The vacated sibling set keeps its gaps.
    pub fn move_item(
        &self,
        id: &ItemId,
        new_parent_id: Option<&ItemId>,
    ) -> TreeServiceResult<Item> {
        self.repo.in_transaction(|| -> TreeServiceResult<Item> {
            let item = self.require_live(id, EntityKind::Item)?;
            self.relocate(&item, new_parent_id)
        })
    }

    /// Re-parent step shared by move, delete, and archive. Runs inside the
    /// caller's transaction.
    pub(crate) fn relocate(
        &self,
        item: &Item,
        new_parent_id: Option<&ItemId>,
    ) -> TreeServiceResult<Item> {
        if let Some(parent_id) = new_parent_id {
            self.require_live(parent_id, EntityKind::Parent)?;
            // An unfinished walk cannot rule out a cycle.
            let would_cycle = *parent_id == item.id
                || self.walk_ancestry(parent_id, &item.id)? != Ancestry::RootReached;
            if would_cycle {
                return Err(RelationViolation::Cycle {
                    item_id: item.id.clone(),
                    parent_id: parent_id.clone(),
                }
                .into());
            }
        }

        let position = self.repo.next_sort_order(new_parent_id)?;
        self.repo.set_parent(&item.id, new_parent_id, position)?;
        info!(
            "event=tree_move module=tree status=ok item_id={} from_parent={} to_parent={} sort_order={}",
            item.id,
            parent_label(item.parent_id.as_ref()),
            parent_label(new_parent_id),
            position
        );
        self.require_live(&item.id, EntityKind::Item)
    }

    fn renumber(&self, ordered: &[Item]) -> TreeServiceResult<usize> {
        let mut changed = 0;
        for (index, item) in ordered.iter().enumerate() {
            let position = index as i64;
            if item.sort_order != position {
                self.repo.set_sort_order(&item.id, position)?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

pub(crate) fn parent_label(parent_id: Option<&ItemId>) -> &str {
    parent_id.map_or("root", ItemId::as_str)
}
