use rusqlite::Connection;
use tasktree_core::db::open_db_in_memory;
use tasktree_core::{
    ArchiveOutcome, Item, ItemId, ItemKind, Sentinel, SqliteTreeRepository, TreeService,
    TreeServiceError,
};

struct Fixture {
    trash: Item,
    archive: Item,
    work: Item,
}

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> TreeService<SqliteTreeRepository<'_>> {
    TreeService::new(SqliteTreeRepository::try_new(conn).unwrap())
}

fn seed(service: &TreeService<SqliteTreeRepository<'_>>) -> Fixture {
    Fixture {
        work: service.create_item(None, "Work", ItemKind::Folder).unwrap(),
        trash: service.create_item(None, "Trash", ItemKind::Folder).unwrap(),
        archive: service
            .create_item(None, "Archive", ItemKind::Folder)
            .unwrap(),
    }
}

fn row_count(conn: &Connection, sql: &str, id: &ItemId) -> i64 {
    conn.query_row(sql, [id.as_str()], |row| row.get(0)).unwrap()
}

fn set_modified_at(conn: &Connection, id: &ItemId, value: i64) {
    conn.execute(
        "UPDATE items SET modified_at = ?2 WHERE id = ?1;",
        rusqlite::params![id.as_str(), value],
    )
    .unwrap();
}

#[test]
fn delete_moves_subtree_root_under_trash() {
    let conn = setup();
    let service = service(&conn);
    let fixture = seed(&service);
    service
        .create_item(Some(&fixture.trash.id), "Old junk", ItemKind::Task)
        .unwrap();
    let project = service
        .create_item(Some(&fixture.work.id), "Launch", ItemKind::Project)
        .unwrap();
    let step = service
        .create_item(Some(&project.id), "Draft copy", ItemKind::Task)
        .unwrap();
    let detail = service
        .create_item(Some(&step.id), "Pick font", ItemKind::Task)
        .unwrap();

    let deleted = service.delete_item(&project.id).unwrap();

    assert_eq!(deleted.parent_id.as_ref(), Some(&fixture.trash.id));
    assert_eq!(deleted.sort_order, 1);
    assert_eq!(service.get_item(&step.id).unwrap().parent_id, Some(project.id.clone()));
    assert!(service
        .is_descendant_of(&detail.id, &fixture.trash.id)
        .unwrap());
    assert!(service.list_children(Some(&fixture.work.id)).unwrap().is_empty());
}

#[test]
fn delete_without_trash_reports_configuration_missing() {
    let conn = setup();
    let service = service(&conn);
    let work = service.create_item(None, "Work", ItemKind::Folder).unwrap();
    let task = service
        .create_item(Some(&work.id), "Keep me", ItemKind::Task)
        .unwrap();

    let err = service.delete_item(&task.id).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::ConfigurationMissing {
            sentinel: Sentinel::Trash,
            ..
        }
    ));
    assert_eq!(service.get_item(&task.id).unwrap().parent_id, Some(work.id));
}

#[test]
fn archive_is_idempotent() {
    let conn = setup();
    let service = service(&conn);
    let fixture = seed(&service);
    let project = service
        .create_item(Some(&fixture.work.id), "Finished", ItemKind::Project)
        .unwrap();
    let step = service
        .create_item(Some(&project.id), "Wrap up", ItemKind::Task)
        .unwrap();

    let outcome = service.archive_item(&project.id).unwrap();
    let ArchiveOutcome::Archived(archived) = outcome else {
        panic!("expected first archive to move the item");
    };
    assert_eq!(archived.parent_id.as_ref(), Some(&fixture.archive.id));

    set_modified_at(&conn, &project.id, 1000);
    set_modified_at(&conn, &step.id, 1000);
    conn.execute("UPDATE items SET needs_push = 0;", []).unwrap();

    assert_eq!(
        service.archive_item(&project.id).unwrap(),
        ArchiveOutcome::AlreadyArchived
    );
    assert_eq!(
        service.archive_item(&step.id).unwrap(),
        ArchiveOutcome::AlreadyArchived
    );
    assert_eq!(
        service.archive_item(&fixture.archive.id).unwrap(),
        ArchiveOutcome::AlreadyArchived
    );

    let reloaded = service.get_item(&project.id).unwrap();
    assert_eq!(reloaded.modified_at, 1000);
    assert!(!reloaded.needs_push);
    assert_eq!(service.get_item(&step.id).unwrap().modified_at, 1000);
}

#[test]
fn empty_trash_purges_direct_children_only() {
    let conn = setup();
    let service = service(&conn);
    let fixture = seed(&service);
    let doomed = service
        .create_item(Some(&fixture.trash.id), "Doomed", ItemKind::Project)
        .unwrap();
    let grandchild = service
        .create_item(Some(&doomed.id), "Left behind", ItemKind::Task)
        .unwrap();
    let keeper = service
        .create_item(Some(&fixture.work.id), "Keeper", ItemKind::Task)
        .unwrap();

    let tag = service.ensure_tag("Errand").unwrap();
    service.attach_tag(&doomed.id, &tag.id).unwrap();
    service.attach_tag(&keeper.id, &tag.id).unwrap();
    conn.execute(
        "INSERT INTO time_entries (id, item_id, started_at) VALUES ('t1', ?1, 10);",
        [doomed.id.as_str()],
    )
    .unwrap();

    let report = service.empty_trash(None).unwrap();

    assert_eq!(report.removed, vec![doomed.id.clone()]);
    assert_eq!(
        row_count(&conn, "SELECT COUNT(*) FROM items WHERE id = ?1;", &doomed.id),
        0
    );
    assert_eq!(
        row_count(
            &conn,
            "SELECT COUNT(*) FROM item_tags WHERE item_id = ?1;",
            &doomed.id
        ),
        0
    );
    assert_eq!(
        row_count(
            &conn,
            "SELECT COUNT(*) FROM time_entries WHERE item_id = ?1;",
            &doomed.id
        ),
        0
    );

    let orphan_parent: Option<String> = conn
        .query_row(
            "SELECT parent_id FROM items WHERE id = ?1;",
            [grandchild.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphan_parent.as_deref(), Some(doomed.id.as_str()));

    assert_eq!(service.item_tags(&keeper.id).unwrap().len(), 1);
    assert!(service.get_item(&fixture.trash.id).is_ok());
}

#[test]
fn empty_trash_honors_cutoff_and_soft_deleted_rows() {
    let conn = setup();
    let service = service(&conn);
    let fixture = seed(&service);
    let old = service
        .create_item(Some(&fixture.trash.id), "Old", ItemKind::Task)
        .unwrap();
    let recent = service
        .create_item(Some(&fixture.trash.id), "Recent", ItemKind::Task)
        .unwrap();
    let hidden = service
        .create_item(Some(&fixture.trash.id), "Hidden", ItemKind::Task)
        .unwrap();
    set_modified_at(&conn, &old.id, 100);
    set_modified_at(&conn, &recent.id, 5000);
    set_modified_at(&conn, &hidden.id, 200);
    conn.execute(
        "UPDATE items SET deleted_at = 300 WHERE id = ?1;",
        [hidden.id.as_str()],
    )
    .unwrap();

    let report = service.empty_trash(Some(1000)).unwrap();

    assert_eq!(report.removed.len(), 2);
    assert!(report.removed.contains(&old.id));
    assert!(report.removed.contains(&hidden.id));
    let remaining: Vec<ItemId> = service
        .list_children(Some(&fixture.trash.id))
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(remaining, vec![recent.id]);
}

#[test]
fn empty_trash_without_trash_folder_fails() {
    let conn = setup();
    let service = service(&conn);
    let err = service.empty_trash(None).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::ConfigurationMissing {
            sentinel: Sentinel::Trash,
            ..
        }
    ));
}
