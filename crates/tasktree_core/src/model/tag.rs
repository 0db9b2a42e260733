//! Tag domain model.
//!
//! # Invariants
//! - Tag names are unique among live tags, compared case-insensitively.
//! - Item/tag associations are soft-deletable; a row with `deleted_at` set
//!   does not count as membership.

use crate::model::id::{ItemId, TagId};
use crate::model::names_match;
use serde::{Deserialize, Serialize};

/// One row of the `tags` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: Option<String>,
    pub deleted_at: Option<i64>,
    pub needs_push: bool,
}

impl Tag {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Returns whether `name` refers to this tag under case-insensitive matching.
    pub fn matches_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

/// One row of the `item_tags` association table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    pub item_id: ItemId,
    pub tag_id: TagId,
    pub created_at: i64,
    pub modified_at: i64,
    pub deleted_at: Option<i64>,
    pub needs_push: bool,
}

#[cfg(test)]
mod tests {
    use super::Tag;
    use crate::model::id::TagId;

    #[test]
    fn name_matching_ignores_case_and_padding() {
        let tag = Tag {
            id: TagId::generate(),
            name: "Next".to_string(),
            color: None,
            deleted_at: None,
            needs_push: false,
        };
        assert!(tag.matches_name(" next "));
        assert!(tag.matches_name("NEXT"));
        assert!(!tag.matches_name("Nextish"));

        let accented = Tag {
            name: "Étape".to_string(),
            ..tag
        };
        assert!(accented.matches_name("ÉTAPE"));
        assert!(accented.matches_name("étape"));
        assert!(!accented.matches_name("Etape"));
    }
}
