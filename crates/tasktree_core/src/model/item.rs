//! Item domain model.
//!
//! # Responsibility
//! - Define the canonical record for folders, projects, tasks and notes.
//! - Provide kind predicates used by structural operations.
//!
//! # Invariants
//! - `completed_at` must be `None` unless `kind == ItemKind::Task`.
//! - `sort_order` is meaningful only relative to live siblings.
//! - `deleted_at` marks a soft-deleted row; such rows are not live.
//! - Known kinds are written back in canonical spelling (`Folder`, not
//!   `folder`); unknown kinds are written back exactly as read.

use crate::model::id::ItemId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Open set of item kinds as found in `items.item_type`.
///
/// Known kinds parse case-insensitively and ignore surrounding whitespace,
/// so a legacy `folder` row reads as `Folder`. Only rows this crate inserts
/// (create, capture, clone) or retypes get the canonical spelling; moves and
/// reorders never touch `item_type`. Anything else is kept in `Other` and
/// written back byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemKind {
    Task,
    Note,
    Project,
    Folder,
    Template,
    Reference,
    Other(String),
}

impl ItemKind {
    /// Lenient read of a stored `item_type` value.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "task" => Self::Task,
            "note" => Self::Note,
            "project" => Self::Project,
            "folder" => Self::Folder,
            "template" => Self::Template,
            "reference" => Self::Reference,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Spelling written to `items.item_type`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Task => "Task",
            Self::Note => "Note",
            Self::Project => "Project",
            Self::Folder => "Folder",
            Self::Template => "Template",
            Self::Reference => "Reference",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Only tasks carry completion state.
    pub fn is_task(&self) -> bool {
        matches!(self, Self::Task)
    }

    /// Kinds that group other items and can be flagged as stuck.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Folder | Self::Project)
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ItemKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ItemKind> for String {
    fn from(value: ItemKind) -> Self {
        value.as_str().to_string()
    }
}

/// Validation failures for item records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// A non-task item carries a completion timestamp.
    CompletedNonTask { id: ItemId, kind: ItemKind },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompletedNonTask { id, kind } => {
                write!(f, "item {id} of kind {kind} cannot carry completed_at")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// One row of the `items` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// `None` means root-level item.
    pub parent_id: Option<ItemId>,
    pub sort_order: i64,
    pub kind: ItemKind,
    /// Epoch seconds.
    pub created_at: i64,
    /// Epoch seconds; bumped by every persisted mutation.
    pub modified_at: i64,
    pub completed_at: Option<i64>,
    pub due_date: Option<i64>,
    /// Defers actionability; stored as `earliest_start_time`.
    pub available_from: Option<i64>,
    pub notes: Option<String>,
    pub deleted_at: Option<i64>,
    /// Set on every write; cleared only by the external replicator.
    pub needs_push: bool,
}

impl Item {
    /// Builds an unsaved item with a fresh id.
    ///
    /// Timestamps are placeholders; storage assigns the real values on insert.
    pub fn new(parent_id: Option<ItemId>, title: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: ItemId::generate(),
            title: title.into(),
            parent_id,
            sort_order: 0,
            kind,
            created_at: 0,
            modified_at: 0,
            completed_at: None,
            due_date: None,
            available_from: None,
            notes: None,
            deleted_at: None,
            needs_push: true,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Checks record-level invariants before persistence.
    /// Titles are checked by the service layer on creation only.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.completed_at.is_some() && !self.kind.is_task() {
            return Err(ItemValidationError::CompletedNonTask {
                id: self.id.clone(),
                kind: self.kind.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Item, ItemKind, ItemValidationError};

    #[test]
    fn kind_parse_is_case_insensitive_and_preserves_unknown() {
        assert_eq!(ItemKind::parse("TASK"), ItemKind::Task);
        assert_eq!(ItemKind::parse(" folder "), ItemKind::Folder);
        assert_eq!(
            ItemKind::parse("Checklist"),
            ItemKind::Other("Checklist".to_string())
        );
        assert_eq!(ItemKind::parse("Checklist").as_str(), "Checklist");
    }

    #[test]
    fn containers_are_folders_and_projects() {
        assert!(ItemKind::Folder.is_container());
        assert!(ItemKind::Project.is_container());
        assert!(!ItemKind::Task.is_container());
        assert!(!ItemKind::Template.is_container());
    }

    #[test]
    fn validate_rejects_completion_on_non_task() {
        let mut item = Item::new(None, "Notebook", ItemKind::Note);
        item.completed_at = Some(10);
        assert!(matches!(
            item.validate(),
            Err(ItemValidationError::CompletedNonTask { .. })
        ));

        item.kind = ItemKind::Task;
        assert!(item.validate().is_ok());
    }

    #[test]
    fn kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&ItemKind::Project).unwrap();
        assert_eq!(json, "\"Project\"");
        let kind: ItemKind = serde_json::from_str("\"template\"").unwrap();
        assert_eq!(kind, ItemKind::Template);
    }
}
