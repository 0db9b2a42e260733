//! Item tree use-case service.
//!
//! # Responsibility
//! - Validate hierarchy invariants above the row store.
//! - Host the structural operations (traversal, ordering, relocation,
//!   cloning, stuck detection); each lives in its own sibling module as an
//!   `impl TreeService` block.
//! - Provide the creation and field-level entry points those operations
//!   depend on.
//!
//! # Invariants
//! - Referenced ids are checked before any write; a missing id aborts the
//!   operation untouched.
//! - Structural mutations run inside exactly one repository transaction.
//! - `completed_at` is never set on a non-task item.

use crate::config::{ConfigError, TreeConfig};
use crate::model::id::{ItemId, TagId};
use crate::model::item::{Item, ItemKind, ItemValidationError};
use crate::model::tag::Tag;
use crate::repo::tag_repo::TagRepository;
use crate::repo::tree_repo::{TreeRepoError, TreeRepository};
use crate::service::sentinel::{Sentinel, SentinelTable};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which kind of reference was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Item,
    Parent,
    Tag,
    Template,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Item => "item",
            Self::Parent => "parent",
            Self::Tag => "tag",
            Self::Template => "template",
        };
        f.write_str(label)
    }
}

/// Structural relation rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationViolation {
    /// Swap between items that do not share a parent.
    DifferentParents { first: ItemId, second: ItemId },
    /// Reorder list names an id that is not a live child of the parent.
    ForeignChild {
        parent_id: Option<ItemId>,
        id: ItemId,
    },
    /// Reorder list names the same id twice.
    DuplicateId(ItemId),
    /// Reorder list length differs from the live child count.
    CountMismatch { expected: usize, actual: usize },
    /// Move would place an item under itself or its own descendant.
    Cycle { item_id: ItemId, parent_id: ItemId },
}

impl Display for RelationViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DifferentParents { first, second } => {
                write!(f, "items {first} and {second} do not share a parent")
            }
            Self::ForeignChild { parent_id, id } => match parent_id {
                Some(parent_id) => write!(f, "item {id} is not a live child of {parent_id}"),
                None => write!(f, "item {id} is not a live root-level item"),
            },
            Self::DuplicateId(id) => write!(f, "item {id} appears more than once"),
            Self::CountMismatch { expected, actual } => {
                write!(f, "expected {expected} child ids, got {actual}")
            }
            Self::Cycle { item_id, parent_id } => {
                write!(f, "moving {item_id} under {parent_id} would create a cycle")
            }
        }
    }
}

/// Errors from tree service operations.
#[derive(Debug)]
pub enum TreeServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Referenced id does not exist among live rows.
    NotFound { entity: EntityKind, id: String },
    /// Structural request rejected before any write.
    InvalidRelation(RelationViolation),
    /// Completion state requested on a non-task item.
    TypeMismatch { id: ItemId, kind: ItemKind },
    /// Required sentinel folder is not present at the root level.
    ConfigurationMissing { sentinel: Sentinel, title: String },
    /// Store unreachable, corrupt, or not migrated. Retryable by the caller.
    StorageUnavailable(TreeRepoError),
}

impl TreeServiceError {
    pub(crate) fn not_found(entity: EntityKind, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Only storage failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "title must not be blank"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidRelation(violation) => write!(f, "invalid relation: {violation}"),
            Self::TypeMismatch { id, kind } => {
                write!(f, "item {id} of kind {kind} cannot be completed")
            }
            Self::ConfigurationMissing { sentinel, title } => write!(
                f,
                "configuration missing: {sentinel} folder titled `{title}` not found at root"
            ),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeRepoError> for TreeServiceError {
    fn from(value: TreeRepoError) -> Self {
        match value {
            TreeRepoError::ItemNotFound(id) => Self::not_found(EntityKind::Item, id),
            TreeRepoError::TagNotFound(id) => Self::not_found(EntityKind::Tag, id),
            TreeRepoError::Validation(ItemValidationError::CompletedNonTask { id, kind }) => {
                Self::TypeMismatch { id, kind }
            }
            other => Self::StorageUnavailable(other),
        }
    }
}

impl From<RelationViolation> for TreeServiceError {
    fn from(value: RelationViolation) -> Self {
        Self::InvalidRelation(value)
    }
}

pub type TreeServiceResult<T> = Result<T, TreeServiceError>;

/// Item tree service facade.
///
/// Holds no tree state between calls; every operation reads what it needs
/// from the repository.
pub struct TreeService<R: TreeRepository + TagRepository> {
    pub(crate) repo: R,
    pub(crate) config: TreeConfig,
}

impl<R: TreeRepository + TagRepository> TreeService<R> {
    /// Creates service with default configuration.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            config: TreeConfig::default(),
        }
    }

    /// Creates service with a caller-supplied configuration.
    ///
    /// The configuration must pass `TreeConfig::validate`; in particular a
    /// zero traversal ceiling is rejected.
    pub fn with_config(repo: R, config: TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Creates one item appended as the last live child of `parent_id`.
    pub fn create_item(
        &self,
        parent_id: Option<&ItemId>,
        title: impl Into<String>,
        kind: ItemKind,
    ) -> TreeServiceResult<Item> {
        let title = normalize_title(title.into())?;
        self.repo.in_transaction(|| -> TreeServiceResult<Item> {
            if let Some(parent_id) = parent_id {
                self.require_live(parent_id, EntityKind::Parent)?;
            }
            let mut item = Item::new(parent_id.cloned(), title, kind);
            item.sort_order = self.repo.next_sort_order(parent_id)?;
            let created = self.repo.insert_item(&item)?;
            debug!(
                "event=item_create module=tree status=ok item_id={} sort_order={}",
                created.id, created.sort_order
            );
            Ok(created)
        })
    }

    /// Creates one item in the default capture folder.
    pub fn capture(&self, title: impl Into<String>, kind: ItemKind) -> TreeServiceResult<Item> {
        let sentinels = self.resolve_sentinels()?;
        let inbox = sentinels.require(Sentinel::Inbox)?.clone();
        self.create_item(Some(&inbox), title, kind)
    }

    /// Loads one live item.
    pub fn get_item(&self, id: &ItemId) -> TreeServiceResult<Item> {
        self.require_live(id, EntityKind::Item)
    }

    /// Lists live children of `parent_id` in display order.
    pub fn list_children(&self, parent_id: Option<&ItemId>) -> TreeServiceResult<Vec<Item>> {
        if let Some(parent_id) = parent_id {
            self.require_live(parent_id, EntityKind::Parent)?;
        }
        Ok(self.repo.list_children(parent_id)?)
    }

    /// Changes item kind; leaving `Task` clears the completion timestamp.
    pub fn set_kind(&self, id: &ItemId, kind: ItemKind) -> TreeServiceResult<Item> {
        self.repo.in_transaction(|| -> TreeServiceResult<Item> {
            let item = self.require_live(id, EntityKind::Item)?;
            if item.kind == kind {
                return Ok(item);
            }
            self.repo.set_kind(id, &kind)?;
            self.require_live(id, EntityKind::Item)
        })
    }

    /// Marks a task complete or open again.
    pub fn set_completed(&self, id: &ItemId, completed: bool) -> TreeServiceResult<Item> {
        self.repo.in_transaction(|| -> TreeServiceResult<Item> {
            let item = self.require_live(id, EntityKind::Item)?;
            if !item.kind.is_task() {
                return Err(TreeServiceError::TypeMismatch {
                    id: id.clone(),
                    kind: item.kind,
                });
            }
            if item.is_completed() == completed {
                return Ok(item);
            }
            self.repo.set_completed(id, completed)?;
            self.require_live(id, EntityKind::Item)
        })
    }

    /// Returns the live tag named `name`, creating it when absent.
    pub fn ensure_tag(&self, name: &str) -> TreeServiceResult<Tag> {
        let name = normalize_title(name.to_string())?;
        self.repo.in_transaction(|| -> TreeServiceResult<Tag> {
            if let Some(existing) = self.repo.find_tag_by_name(&name)? {
                return Ok(existing);
            }
            let tag = self.repo.insert_tag(&name, None)?;
            info!("event=tag_create module=tree status=ok tag_id={}", tag.id);
            Ok(tag)
        })
    }

    /// Attaches a tag to an item. Attaching twice is a no-op.
    pub fn attach_tag(&self, item_id: &ItemId, tag_id: &TagId) -> TreeServiceResult<()> {
        self.repo.in_transaction(|| -> TreeServiceResult<()> {
            self.require_live(item_id, EntityKind::Item)?;
            if self.repo.get_tag(tag_id)?.is_none() {
                return Err(TreeServiceError::not_found(EntityKind::Tag, tag_id));
            }
            self.repo.attach_tag(item_id, tag_id)?;
            Ok(())
        })
    }

    /// Lists live tags attached to one item.
    pub fn item_tags(&self, item_id: &ItemId) -> TreeServiceResult<Vec<Tag>> {
        self.require_live(item_id, EntityKind::Item)?;
        Ok(self.repo.list_item_tags(item_id)?)
    }

    /// Resolves every configured sentinel folder once.
    pub fn resolve_sentinels(&self) -> TreeServiceResult<SentinelTable> {
        SentinelTable::resolve(&self.repo, &self.config.sentinels)
    }

    pub(crate) fn require_live(&self, id: &ItemId, entity: EntityKind) -> TreeServiceResult<Item> {
        self.repo
            .get_item(id, false)?
            .ok_or_else(|| TreeServiceError::not_found(entity, id))
    }
}

pub(crate) fn normalize_title(value: String) -> TreeServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TreeServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, RelationViolation, TreeServiceError};
    use crate::model::id::ItemId;
    use crate::model::item::{ItemKind, ItemValidationError};
    use crate::repo::tree_repo::TreeRepoError;

    #[test]
    fn repo_not_found_maps_to_typed_not_found() {
        let err: TreeServiceError = TreeRepoError::ItemNotFound(ItemId::from("x1")).into();
        assert!(matches!(
            err,
            TreeServiceError::NotFound { entity: EntityKind::Item, ref id } if id == "x1"
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_failure_maps_to_type_mismatch() {
        let err: TreeServiceError = TreeRepoError::Validation(ItemValidationError::CompletedNonTask {
            id: ItemId::from("n1"),
            kind: ItemKind::Note,
        })
        .into();
        assert!(matches!(err, TreeServiceError::TypeMismatch { .. }));
    }

    #[test]
    fn storage_errors_are_retryable() {
        let err: TreeServiceError = TreeRepoError::MissingRequiredTable("items").into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("storage unavailable"));
    }

    #[test]
    fn count_mismatch_message_names_expected_and_actual() {
        let err = TreeServiceError::from(RelationViolation::CountMismatch {
            expected: 3,
            actual: 2,
        });
        assert_eq!(
            err.to_string(),
            "invalid relation: expected 3 child ids, got 2"
        );
    }
}
