//! Item row store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide row-level persistence primitives over the `items` table.
//! - Keep SQL details and ordering behavior inside repository boundary.
//! - Offer one transaction boundary that structural operations run inside.
//!
//! # Invariants
//! - Only live (`deleted_at IS NULL`) rows are returned unless stated otherwise.
//! - Child listing is deterministic: `sort_order ASC, id ASC`.
//! - Every write sets `needs_push = 1` and bumps `modified_at`.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::id::{ItemId, TagId};
use crate::model::item::{Item, ItemKind, ItemValidationError};
use crate::model::names_match;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    title,
    parent_id,
    sort_order,
    created_at,
    modified_at,
    completed_at,
    due_date,
    earliest_start_time,
    item_type,
    notes,
    deleted_at,
    needs_push
FROM items";

/// Result type used by row store operations.
pub type TreeRepoResult<T> = Result<T, TreeRepoError>;

/// Errors from row store operations.
#[derive(Debug)]
pub enum TreeRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target item does not exist or is soft-deleted.
    ItemNotFound(ItemId),
    /// Target tag does not exist or is soft-deleted.
    TagNotFound(TagId),
    /// Record failed validation before write.
    Validation(ItemValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for TreeRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "tree repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "tree repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "tree repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid item data: {message}"),
        }
    }
}

impl Error for TreeRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TreeRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TreeRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ItemValidationError> for TreeRepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Row store primitives over the `items` table.
///
/// Parents are passed as `Option<&ItemId>`; `None` addresses the root level.
pub trait TreeRepository {
    /// Runs `op` inside one write transaction; an `Err` rolls back every write.
    ///
    /// Calls made while a transaction is already open join it.
    fn in_transaction<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<TreeRepoError>;
    /// Loads one item by id.
    fn get_item(&self, id: &ItemId, include_deleted: bool) -> TreeRepoResult<Option<Item>>;
    /// Inserts one validated item; storage assigns timestamps.
    fn insert_item(&self, item: &Item) -> TreeRepoResult<Item>;
    /// Lists live children under one parent in display order.
    fn list_children(&self, parent_id: Option<&ItemId>) -> TreeRepoResult<Vec<Item>>;
    /// Lists live child ids under one parent in display order.
    fn list_child_ids(&self, parent_id: Option<&ItemId>) -> TreeRepoResult<Vec<ItemId>>;
    /// Lists every live item, used to build per-operation tree snapshots.
    fn list_live_items(&self) -> TreeRepoResult<Vec<Item>>;
    /// Returns `max(sort_order) + 1` among live children, or `0`.
    fn next_sort_order(&self, parent_id: Option<&ItemId>) -> TreeRepoResult<i64>;
    /// Returns the parent pointer of a live item; `None` when the item is absent.
    fn parent_of(&self, id: &ItemId) -> TreeRepoResult<Option<Option<ItemId>>>;
    /// Finds a live root-level item by case-insensitive exact title.
    fn find_root_by_title(&self, title: &str) -> TreeRepoResult<Option<ItemId>>;
    /// Re-parents one live item and assigns its sort order.
    fn set_parent(
        &self,
        id: &ItemId,
        parent_id: Option<&ItemId>,
        sort_order: i64,
    ) -> TreeRepoResult<()>;
    /// Assigns the sort order of one live item.
    fn set_sort_order(&self, id: &ItemId, sort_order: i64) -> TreeRepoResult<()>;
    /// Changes kind, clearing `completed_at` when the new kind is not a task.
    fn set_kind(&self, id: &ItemId, kind: &ItemKind) -> TreeRepoResult<()>;
    /// Sets or clears the completion timestamp (storage clock).
    fn set_completed(&self, id: &ItemId, completed: bool) -> TreeRepoResult<()>;
    /// Lists direct children of `parent_id` regardless of `deleted_at`,
    /// restricted to rows modified strictly before `cutoff` when given.
    fn list_direct_children_before(
        &self,
        parent_id: &ItemId,
        cutoff: Option<i64>,
    ) -> TreeRepoResult<Vec<ItemId>>;
    /// Permanently removes item rows with their tag links and time entries.
    fn purge_items(&self, ids: &[ItemId]) -> TreeRepoResult<usize>;
}

/// SQLite-backed row store.
pub struct SqliteTreeRepository<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteTreeRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> TreeRepoResult<Self> {
        ensure_tree_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TreeRepository for SqliteTreeRepository<'_> {
    fn in_transaction<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<TreeRepoError>,
    {
        if !self.conn.is_autocommit() {
            return op();
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(TreeRepoError::from)?;
        let value = op()?;
        tx.commit().map_err(TreeRepoError::from)?;
        Ok(value)
    }

    fn get_item(&self, id: &ItemId, include_deleted: bool) -> TreeRepoResult<Option<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;
        let mut rows = stmt.query(params![id.as_str(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn insert_item(&self, item: &Item) -> TreeRepoResult<Item> {
        item.validate()?;
        self.conn.execute(
            "INSERT INTO items (
                id,
                title,
                parent_id,
                sort_order,
                completed_at,
                due_date,
                earliest_start_time,
                item_type,
                notes,
                deleted_at,
                needs_push
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, 1);",
            params![
                item.id.as_str(),
                item.title.as_str(),
                item.parent_id.as_ref().map(ItemId::as_str),
                item.sort_order,
                item.completed_at,
                item.due_date,
                item.available_from,
                item.kind.as_str(),
                item.notes.as_deref(),
            ],
        )?;
        self.get_item(&item.id, false)?
            .ok_or_else(|| TreeRepoError::ItemNotFound(item.id.clone()))
    }

    fn list_children(&self, parent_id: Option<&ItemId>) -> TreeRepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE parent_id IS ?1
               AND deleted_at IS NULL
             ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([parent_id.map(ItemId::as_str)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn list_child_ids(&self, parent_id: Option<&ItemId>) -> TreeRepoResult<Vec<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM items
             WHERE parent_id IS ?1
               AND deleted_at IS NULL
             ORDER BY sort_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query([parent_id.map(ItemId::as_str)])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(ItemId::new(row.get::<_, String>(0)?));
        }
        Ok(ids)
    }

    fn list_live_items(&self) -> TreeRepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE deleted_at IS NULL
             ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn next_sort_order(&self, parent_id: Option<&ItemId>) -> TreeRepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1
             FROM items
             WHERE parent_id IS ?1
               AND deleted_at IS NULL;",
            [parent_id.map(ItemId::as_str)],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn parent_of(&self, id: &ItemId) -> TreeRepoResult<Option<Option<ItemId>>> {
        let parent: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT parent_id
                 FROM items
                 WHERE id = ?1
                   AND deleted_at IS NULL;",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parent.map(|value| value.map(ItemId::new)))
    }

    fn find_root_by_title(&self, title: &str) -> TreeRepoResult<Option<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title
             FROM items
             WHERE parent_id IS NULL
               AND deleted_at IS NULL
             ORDER BY sort_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let candidate: String = row.get(1)?;
            if names_match(&candidate, title) {
                return Ok(Some(ItemId::new(row.get::<_, String>(0)?)));
            }
        }
        Ok(None)
    }

    fn set_parent(
        &self,
        id: &ItemId,
        parent_id: Option<&ItemId>,
        sort_order: i64,
    ) -> TreeRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET parent_id = ?2,
                 sort_order = ?3,
                 modified_at = CAST(strftime('%s', 'now') AS INTEGER),
                 needs_push = 1
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.as_str(), parent_id.map(ItemId::as_str), sort_order],
        )?;
        if changed == 0 {
            return Err(TreeRepoError::ItemNotFound(id.clone()));
        }
        Ok(())
    }

    fn set_sort_order(&self, id: &ItemId, sort_order: i64) -> TreeRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET sort_order = ?2,
                 modified_at = CAST(strftime('%s', 'now') AS INTEGER),
                 needs_push = 1
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.as_str(), sort_order],
        )?;
        if changed == 0 {
            return Err(TreeRepoError::ItemNotFound(id.clone()));
        }
        Ok(())
    }

    fn set_kind(&self, id: &ItemId, kind: &ItemKind) -> TreeRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET item_type = ?2,
                 completed_at = CASE WHEN ?3 = 1 THEN completed_at ELSE NULL END,
                 modified_at = CAST(strftime('%s', 'now') AS INTEGER),
                 needs_push = 1
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.as_str(), kind.as_str(), bool_to_int(kind.is_task())],
        )?;
        if changed == 0 {
            return Err(TreeRepoError::ItemNotFound(id.clone()));
        }
        Ok(())
    }

    fn set_completed(&self, id: &ItemId, completed: bool) -> TreeRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET completed_at = CASE
                     WHEN ?2 = 1 THEN CAST(strftime('%s', 'now') AS INTEGER)
                     ELSE NULL
                 END,
                 modified_at = CAST(strftime('%s', 'now') AS INTEGER),
                 needs_push = 1
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.as_str(), bool_to_int(completed)],
        )?;
        if changed == 0 {
            return Err(TreeRepoError::ItemNotFound(id.clone()));
        }
        Ok(())
    }

    fn list_direct_children_before(
        &self,
        parent_id: &ItemId,
        cutoff: Option<i64>,
    ) -> TreeRepoResult<Vec<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM items
             WHERE parent_id = ?1
               AND (?2 IS NULL OR modified_at < ?2)
             ORDER BY sort_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query(params![parent_id.as_str(), cutoff])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(ItemId::new(row.get::<_, String>(0)?));
        }
        Ok(ids)
    }

    fn purge_items(&self, ids: &[ItemId]) -> TreeRepoResult<usize> {
        let mut removed = 0;
        for id in ids {
            self.conn
                .execute("DELETE FROM item_tags WHERE item_id = ?1;", [id.as_str()])?;
            self.conn
                .execute("DELETE FROM time_entries WHERE item_id = ?1;", [id.as_str()])?;
            removed += self
                .conn
                .execute("DELETE FROM items WHERE id = ?1;", [id.as_str()])?;
        }
        Ok(removed)
    }
}

fn parse_item_row(row: &Row<'_>) -> TreeRepoResult<Item> {
    let kind_text: String = row.get("item_type")?;
    let needs_push = parse_flag(row.get("needs_push")?, "items.needs_push")?;

    Ok(Item {
        id: ItemId::new(row.get::<_, String>("id")?),
        title: row.get("title")?,
        parent_id: row.get::<_, Option<String>>("parent_id")?.map(ItemId::new),
        sort_order: row.get("sort_order")?,
        kind: ItemKind::parse(&kind_text),
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
        completed_at: row.get("completed_at")?,
        due_date: row.get("due_date")?,
        available_from: row.get("earliest_start_time")?,
        notes: row.get("notes")?,
        deleted_at: row.get("deleted_at")?,
        needs_push,
    })
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> TreeRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(TreeRepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_tree_connection_ready(conn: &Connection) -> TreeRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(TreeRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    ensure_table_columns(
        conn,
        "items",
        &[
            "id",
            "title",
            "parent_id",
            "sort_order",
            "created_at",
            "modified_at",
            "completed_at",
            "due_date",
            "earliest_start_time",
            "item_type",
            "notes",
            "deleted_at",
            "needs_push",
        ],
    )?;
    ensure_table_columns(
        conn,
        "tags",
        &["id", "name", "color", "deleted_at", "needs_push"],
    )?;
    ensure_table_columns(
        conn,
        "item_tags",
        &[
            "item_id",
            "tag_id",
            "created_at",
            "modified_at",
            "deleted_at",
            "needs_push",
        ],
    )?;
    ensure_table_columns(
        conn,
        "time_entries",
        &["id", "item_id", "started_at", "ended_at", "duration", "needs_push"],
    )?;
    Ok(())
}

fn ensure_table_columns(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> TreeRepoResult<()> {
    if !table_exists(conn, table)? {
        return Err(TreeRepoError::MissingRequiredTable(table));
    }
    let present = table_columns(conn, table)?;
    for column in columns {
        if !present.iter().any(|name| name == column) {
            return Err(TreeRepoError::MissingRequiredColumn { table, column });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> TreeRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> TreeRepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::{SqliteTreeRepository, TreeRepoError, TreeRepository};
    use crate::db::open_db_in_memory;
    use crate::model::item::{Item, ItemKind};
    use rusqlite::Connection;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteTreeRepository::try_new(&conn).err().unwrap();
        assert!(matches!(
            err,
            TreeRepoError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn next_sort_order_ignores_soft_deleted_siblings() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let mut first = Item::new(None, "First", ItemKind::Folder);
        first.sort_order = 0;
        repo.insert_item(&first).unwrap();
        let mut second = Item::new(None, "Second", ItemKind::Folder);
        second.sort_order = 7;
        repo.insert_item(&second).unwrap();
        assert_eq!(repo.next_sort_order(None).unwrap(), 8);

        conn.execute(
            "UPDATE items SET deleted_at = 1 WHERE id = ?1;",
            [second.id.as_str()],
        )
        .unwrap();
        assert_eq!(repo.next_sort_order(None).unwrap(), 1);
    }

    #[test]
    fn failed_transaction_rolls_back_writes() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let item = Item::new(None, "Rollback", ItemKind::Task);

        let result = repo.in_transaction(|| -> Result<(), TreeRepoError> {
            repo.insert_item(&item)?;
            Err(TreeRepoError::InvalidData("forced".to_string()))
        });
        assert!(result.is_err());
        assert!(repo.get_item(&item.id, true).unwrap().is_none());
        assert!(conn.is_autocommit());
    }

    #[test]
    fn set_kind_away_from_task_clears_completion() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let item = repo
            .insert_item(&Item::new(None, "Ship it", ItemKind::Task))
            .unwrap();
        repo.set_completed(&item.id, true).unwrap();
        assert!(repo.get_item(&item.id, false).unwrap().unwrap().is_completed());

        repo.set_kind(&item.id, &ItemKind::Note).unwrap();
        let reloaded = repo.get_item(&item.id, false).unwrap().unwrap();
        assert_eq!(reloaded.kind, ItemKind::Note);
        assert_eq!(reloaded.completed_at, None);
        assert!(reloaded.needs_push);
    }
}
