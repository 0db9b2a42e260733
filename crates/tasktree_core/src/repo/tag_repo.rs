//! Tag and item/tag association persistence.
//!
//! # Responsibility
//! - Resolve tags by case-insensitive name among live rows; matching runs
//!   in Rust so non-ASCII names fold correctly.
//! - Maintain the soft-deletable `item_tags` association.
//!
//! # Invariants
//! - Live tag names are unique ignoring case.
//! - Re-attaching a soft-deleted association revives the existing row.

use crate::model::id::{ItemId, TagId};
use crate::model::tag::{ItemTag, Tag};
use crate::repo::tree_repo::{parse_flag, SqliteTreeRepository, TreeRepoError, TreeRepoResult};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;

const TAG_SELECT_SQL: &str = "SELECT id, name, color, deleted_at, needs_push FROM tags";

/// Row store primitives over `tags` and `item_tags`.
pub trait TagRepository {
    /// Finds a live tag by case-insensitive name.
    fn find_tag_by_name(&self, name: &str) -> TreeRepoResult<Option<Tag>>;
    /// Loads one live tag by id.
    fn get_tag(&self, id: &TagId) -> TreeRepoResult<Option<Tag>>;
    /// Inserts a new tag row. Callers check name uniqueness first.
    fn insert_tag(&self, name: &str, color: Option<&str>) -> TreeRepoResult<Tag>;
    /// Links an item to a tag; returns whether any row changed.
    fn attach_tag(&self, item_id: &ItemId, tag_id: &TagId) -> TreeRepoResult<bool>;
    /// Lists live associations of one item.
    fn list_item_tag_links(&self, item_id: &ItemId) -> TreeRepoResult<Vec<ItemTag>>;
    /// Lists live tags attached to one item, ordered by name.
    fn list_item_tags(&self, item_id: &ItemId) -> TreeRepoResult<Vec<Tag>>;
    /// Returns ids of every item with a live association to `tag_id`.
    fn item_ids_with_tag(&self, tag_id: &TagId) -> TreeRepoResult<HashSet<ItemId>>;
}

impl TagRepository for SqliteTreeRepository<'_> {
    fn find_tag_by_name(&self, name: &str) -> TreeRepoResult<Option<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL}
             WHERE deleted_at IS NULL
             ORDER BY id ASC;"
        ))?;
        let rows = stmt.query_map([], parse_tag_row_sql)?;
        for row in rows {
            let tag = row??;
            if tag.matches_name(name) {
                return Ok(Some(tag));
            }
        }
        Ok(None)
    }

    fn get_tag(&self, id: &TagId) -> TreeRepoResult<Option<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL}
             WHERE id = ?1
               AND deleted_at IS NULL;"
        ))?;
        stmt.query_row([id.as_str()], parse_tag_row_sql)
            .optional()?
            .transpose()
    }

    fn insert_tag(&self, name: &str, color: Option<&str>) -> TreeRepoResult<Tag> {
        let id = TagId::generate();
        self.conn.execute(
            "INSERT INTO tags (id, name, color, deleted_at, needs_push)
             VALUES (?1, ?2, ?3, NULL, 1);",
            params![id.as_str(), name.trim(), color],
        )?;
        self.get_tag(&id)?.ok_or(TreeRepoError::TagNotFound(id))
    }

    fn attach_tag(&self, item_id: &ItemId, tag_id: &TagId) -> TreeRepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO item_tags (item_id, tag_id, deleted_at, needs_push)
             VALUES (?1, ?2, NULL, 1)
             ON CONFLICT(item_id, tag_id) DO UPDATE
             SET deleted_at = NULL,
                 modified_at = CAST(strftime('%s', 'now') AS INTEGER),
                 needs_push = 1
             WHERE item_tags.deleted_at IS NOT NULL;",
            params![item_id.as_str(), tag_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn list_item_tag_links(&self, item_id: &ItemId) -> TreeRepoResult<Vec<ItemTag>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, tag_id, created_at, modified_at, deleted_at, needs_push
             FROM item_tags
             WHERE item_id = ?1
               AND deleted_at IS NULL
             ORDER BY tag_id ASC;",
        )?;
        let mut rows = stmt.query([item_id.as_str()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(ItemTag {
                item_id: ItemId::new(row.get::<_, String>("item_id")?),
                tag_id: TagId::new(row.get::<_, String>("tag_id")?),
                created_at: row.get("created_at")?,
                modified_at: row.get("modified_at")?,
                deleted_at: row.get("deleted_at")?,
                needs_push: parse_flag(row.get("needs_push")?, "item_tags.needs_push")?,
            });
        }
        Ok(links)
    }

    fn list_item_tags(&self, item_id: &ItemId) -> TreeRepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.color, t.deleted_at, t.needs_push
             FROM tags t
             INNER JOIN item_tags it ON it.tag_id = t.id
             WHERE it.item_id = ?1
               AND it.deleted_at IS NULL
               AND t.deleted_at IS NULL
             ORDER BY t.name COLLATE NOCASE ASC, t.id ASC;",
        )?;
        let mut rows = stmt.query([item_id.as_str()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }

    fn item_ids_with_tag(&self, tag_id: &TagId) -> TreeRepoResult<HashSet<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id
             FROM item_tags
             WHERE tag_id = ?1
               AND deleted_at IS NULL;",
        )?;
        let mut rows = stmt.query([tag_id.as_str()])?;
        let mut ids = HashSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(ItemId::new(row.get::<_, String>(0)?));
        }
        Ok(ids)
    }
}

fn parse_tag_row_sql(row: &Row<'_>) -> rusqlite::Result<TreeRepoResult<Tag>> {
    Ok(parse_tag_row(row))
}

fn parse_tag_row(row: &Row<'_>) -> TreeRepoResult<Tag> {
    Ok(Tag {
        id: TagId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        color: row.get(2)?,
        deleted_at: row.get(3)?,
        needs_push: parse_flag(row.get(4)?, "tags.needs_push")?,
    })
}

#[cfg(test)]
mod tests {
    use super::TagRepository;
    use crate::db::open_db_in_memory;
    use crate::model::item::{Item, ItemKind};
    use crate::repo::tree_repo::{SqliteTreeRepository, TreeRepository};

    #[test]
    fn find_tag_by_name_is_case_insensitive_and_skips_deleted() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let tag = repo.insert_tag("Next", Some("green")).unwrap();

        let found = repo.find_tag_by_name("NEXT").unwrap().unwrap();
        assert_eq!(found.id, tag.id);
        assert_eq!(found.color.as_deref(), Some("green"));

        conn.execute(
            "UPDATE tags SET deleted_at = 5 WHERE id = ?1;",
            [tag.id.as_str()],
        )
        .unwrap();
        assert!(repo.find_tag_by_name("next").unwrap().is_none());
    }

    #[test]
    fn attach_is_idempotent_and_revives_soft_deleted_links() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let item = repo
            .insert_item(&Item::new(None, "Call plumber", ItemKind::Task))
            .unwrap();
        let tag = repo.insert_tag("Errand", None).unwrap();

        assert!(repo.attach_tag(&item.id, &tag.id).unwrap());
        assert!(!repo.attach_tag(&item.id, &tag.id).unwrap());

        conn.execute(
            "UPDATE item_tags SET deleted_at = 9, needs_push = 0 WHERE item_id = ?1;",
            [item.id.as_str()],
        )
        .unwrap();
        assert!(repo.list_item_tags(&item.id).unwrap().is_empty());

        assert!(repo.attach_tag(&item.id, &tag.id).unwrap());
        let links = repo.list_item_tag_links(&item.id).unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].needs_push);
        assert_eq!(links[0].deleted_at, None);
        assert!(repo.item_ids_with_tag(&tag.id).unwrap().contains(&item.id));
    }

    #[test]
    fn find_tag_by_name_folds_non_ascii_case() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let tag = repo.insert_tag("Étape", None).unwrap();

        let found = repo.find_tag_by_name(" ÉTAPE ").unwrap().unwrap();
        assert_eq!(found.id, tag.id);
        assert!(repo.find_tag_by_name("Etape").unwrap().is_none());
    }
}
