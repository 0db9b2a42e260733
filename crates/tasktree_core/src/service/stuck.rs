//! Stuck-project detection.
//!
//! A candidate project is a container item directly under an area (a live
//! root-level container that is not a sentinel) or directly under a caller
//! supplied scope. It is stuck when nothing within two levels below it
//! carries the actionable tag.

use crate::model::id::{ItemId, TagId};
use crate::model::item::Item;
use crate::repo::tag_repo::TagRepository;
use crate::repo::tree_repo::TreeRepository;
use crate::service::traversal::TreeIndex;
use crate::service::tree_service::{EntityKind, TreeService, TreeServiceError, TreeServiceResult};
use log::{info, warn};
use std::collections::HashSet;

/// Levels below a candidate searched for the actionable tag.
pub const STUCK_SEARCH_DEPTH: usize = 2;

/// Result of a stuck-project search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StuckProjects {
    /// Candidates lacking an actionable descendant, in tree order.
    Computed(Vec<Item>),
    /// The actionable tag does not exist, so no candidate can be judged.
    NotComputable { missing_tag: String },
}

impl<R: TreeRepository + TagRepository> TreeService<R> {
    /// Finds container projects with no actionable item within two levels.
    pub fn find_stuck_projects(
        &self,
        scope_root: Option<&ItemId>,
    ) -> TreeServiceResult<StuckProjects> {
        let Some(actionable) = self.repo.find_tag_by_name(&self.config.actionable_tag)? else {
            warn!(
                "event=tree_stuck module=tree status=not_computable reason=missing_actionable_tag"
            );
            return Ok(StuckProjects::NotComputable {
                missing_tag: self.config.actionable_tag.clone(),
            });
        };

        let index = self.load_tree_index()?;
        let areas: Vec<ItemId> = match scope_root {
            Some(scope_root) => {
                if index.get(scope_root).is_none() {
                    return Err(TreeServiceError::not_found(EntityKind::Item, scope_root));
                }
                vec![scope_root.clone()]
            }
            None => self.top_level_areas(&index)?,
        };

        let actionable_items = self.repo.item_ids_with_tag(&actionable.id)?;
        let excluded_items = self.items_with_excluded_tags()?;

        let mut stuck = Vec::new();
        let mut candidates = 0;
        for area in &areas {
            for candidate_id in index.children(Some(area)) {
                let Some(candidate) = index.get(candidate_id) else {
                    continue;
                };
                if !candidate.kind.is_container() || excluded_items.contains(candidate_id) {
                    continue;
                }
                candidates += 1;

                let has_actionable = index
                    .descendants(
                        candidate_id,
                        Some(STUCK_SEARCH_DEPTH),
                        self.config.max_traversal_depth,
                    )
                    .iter()
                    .any(|id| actionable_items.contains(id));
                if !has_actionable {
                    stuck.push(candidate.clone());
                }
            }
        }

        info!(
            "event=tree_stuck module=tree status=ok areas={} candidates={} stuck={}",
            areas.len(),
            candidates,
            stuck.len()
        );
        Ok(StuckProjects::Computed(stuck))
    }

    fn top_level_areas(&self, index: &TreeIndex) -> TreeServiceResult<Vec<ItemId>> {
        let sentinels = self.resolve_sentinels()?;
        Ok(index
            .children(None)
            .iter()
            .filter(|id| sentinels.role_of(id).is_none())
            .filter(|id| index.get(id).is_some_and(|item| item.kind.is_container()))
            .cloned()
            .collect())
    }

    fn items_with_excluded_tags(&self) -> TreeServiceResult<HashSet<ItemId>> {
        let mut tag_ids: Vec<TagId> = Vec::new();
        for name in &self.config.excluded_tags {
            if let Some(tag) = self.repo.find_tag_by_name(name)? {
                tag_ids.push(tag.id);
            }
        }

        let mut items = HashSet::new();
        for tag_id in &tag_ids {
            items.extend(self.repo.item_ids_with_tag(tag_id)?);
        }
        Ok(items)
    }
}
