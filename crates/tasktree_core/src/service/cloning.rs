//! Subtree cloning (template instantiation).
//!
//! # Responsibility
//! - Deep-copy a live subtree under a destination with fresh ids.
//! - Carry content fields and tag links onto every copied descendant.
//!
//! # Invariants
//! - Copied node count is `1 + |descendants(template, unbounded)|`.
//! - Nesting and relative sibling order are preserved.
//! - No copied node is completed.
//! - Descendants of kind `Template` become the configured container kind;
//!   only the root keeps the caller-chosen kind.
//! - The copy is written in one transaction; a failure leaves no partial copy.

use crate::model::id::ItemId;
use crate::model::item::{Item, ItemKind};
use crate::repo::tag_repo::TagRepository;
use crate::repo::tree_repo::TreeRepository;
use crate::service::traversal::TreeIndex;
use crate::service::tree_service::{
    normalize_title, EntityKind, TreeService, TreeServiceError, TreeServiceResult,
};
use log::{info, warn};
use std::collections::HashSet;

/// Result of a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// The copied root as persisted.
    pub root: Item,
    /// Number of rows created, root included.
    pub created: usize,
}

struct CloneWalk<'a> {
    index: &'a TreeIndex,
    visited: HashSet<ItemId>,
    created: usize,
}

impl<R: TreeRepository + TagRepository> TreeService<R> {
    /// Copies the live subtree rooted at `template_id` under
    /// `destination_id`, titling and typing the new root from the arguments.
    pub fn clone_subtree(
        &self,
        template_id: &ItemId,
        destination_id: Option<&ItemId>,
        new_root_title: impl Into<String>,
        new_root_kind: ItemKind,
    ) -> TreeServiceResult<CloneOutcome> {
        let title = normalize_title(new_root_title.into())?;
        self.repo.in_transaction(|| -> TreeServiceResult<CloneOutcome> {
            let index = self.load_tree_index()?;
            let template = index
                .get(template_id)
                .ok_or_else(|| TreeServiceError::not_found(EntityKind::Template, template_id))?;
            if let Some(destination_id) = destination_id {
                if index.get(destination_id).is_none() {
                    return Err(TreeServiceError::not_found(
                        EntityKind::Parent,
                        destination_id,
                    ));
                }
            }

            let mut root = Item::new(destination_id.cloned(), title, new_root_kind);
            root.sort_order = self.repo.next_sort_order(destination_id)?;
            root.notes = template.notes.clone();
            let root = self.repo.insert_item(&root)?;

            let mut walk = CloneWalk {
                index: &index,
                visited: HashSet::from([template_id.clone()]),
                created: 1,
            };
            self.clone_children(&mut walk, template_id, &root.id, 1)?;

            info!(
                "event=tree_clone module=tree status=ok template_id={} new_root_id={} created={}",
                template_id, root.id, walk.created
            );
            Ok(CloneOutcome {
                created: walk.created,
                root,
            })
        })
    }

    fn clone_children(
        &self,
        walk: &mut CloneWalk<'_>,
        source_parent: &ItemId,
        target_parent: &ItemId,
        depth: usize,
    ) -> TreeServiceResult<()> {
        if depth > self.config.max_traversal_depth {
            warn!(
                "event=tree_clone module=tree status=truncated source_id={} depth={}",
                source_parent, depth
            );
            return Ok(());
        }

        let index = walk.index;
        for child_id in index.children(Some(source_parent)) {
            if !walk.visited.insert(child_id.clone()) {
                continue;
            }
            let Some(source) = index.get(child_id) else {
                continue;
            };

            let copy = self.copy_descendant(source, target_parent)?;
            walk.created += 1;
            self.clone_children(walk, &source.id, &copy.id, depth + 1)?;
        }
        Ok(())
    }

    fn copy_descendant(&self, source: &Item, target_parent: &ItemId) -> TreeServiceResult<Item> {
        let kind = match source.kind {
            ItemKind::Template => self.config.template_container_kind.clone(),
            ref other => other.clone(),
        };
        let mut copy = Item::new(Some(target_parent.clone()), source.title.clone(), kind);
        copy.sort_order = source.sort_order;
        copy.due_date = source.due_date;
        copy.available_from = source.available_from;
        copy.notes = source.notes.clone();
        let copy = self.repo.insert_item(&copy)?;

        for link in self.repo.list_item_tag_links(&source.id)? {
            self.repo.attach_tag(&copy.id, &link.tag_id)?;
        }
        Ok(copy)
    }
}
