//! Sentinel folder resolution.
//!
//! Sentinel folders are ordinary root-level items recognized by title. They
//! are resolved once per operation into a `SentinelTable`; a missing entry
//! surfaces as `TreeServiceError::ConfigurationMissing` at the point of use.

use crate::config::SentinelTitles;
use crate::model::id::ItemId;
use crate::repo::tree_repo::TreeRepository;
use crate::service::tree_service::{TreeServiceError, TreeServiceResult};
use log::debug;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Named structural roles played by root-level folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sentinel {
    Trash,
    Archive,
    Reference,
    Templates,
    /// Default capture location.
    Inbox,
}

impl Sentinel {
    pub const ALL: [Sentinel; 5] = [
        Sentinel::Trash,
        Sentinel::Archive,
        Sentinel::Reference,
        Sentinel::Templates,
        Sentinel::Inbox,
    ];

    fn title<'a>(&self, titles: &'a SentinelTitles) -> &'a str {
        match self {
            Self::Trash => &titles.trash,
            Self::Archive => &titles.archive,
            Self::Reference => &titles.reference,
            Self::Templates => &titles.templates,
            Self::Inbox => &titles.inbox,
        }
    }
}

impl Display for Sentinel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Trash => "trash",
            Self::Archive => "archive",
            Self::Reference => "reference",
            Self::Templates => "templates",
            Self::Inbox => "inbox",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct SentinelEntry {
    title: String,
    id: Option<ItemId>,
}

/// Name-to-id lookup of sentinel folders, resolved for one operation.
#[derive(Debug, Clone)]
pub struct SentinelTable {
    entries: BTreeMap<Sentinel, SentinelEntry>,
}

impl SentinelTable {
    /// Looks up every sentinel by case-insensitive title among live roots.
    pub fn resolve<R: TreeRepository>(
        repo: &R,
        titles: &SentinelTitles,
    ) -> TreeServiceResult<Self> {
        let mut entries = BTreeMap::new();
        for sentinel in Sentinel::ALL {
            let title = sentinel.title(titles);
            let id = repo.find_root_by_title(title)?;
            if id.is_none() {
                debug!("event=sentinel_resolve module=tree status=missing sentinel={sentinel}");
            }
            entries.insert(
                sentinel,
                SentinelEntry {
                    title: title.to_string(),
                    id,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Returns the sentinel id when present.
    pub fn get(&self, sentinel: Sentinel) -> Option<&ItemId> {
        self.entries
            .get(&sentinel)
            .and_then(|entry| entry.id.as_ref())
    }

    /// Returns the sentinel id or a typed configuration error.
    pub fn require(&self, sentinel: Sentinel) -> TreeServiceResult<&ItemId> {
        self.get(sentinel)
            .ok_or_else(|| TreeServiceError::ConfigurationMissing {
                sentinel,
                title: self
                    .entries
                    .get(&sentinel)
                    .map(|entry| entry.title.clone())
                    .unwrap_or_default(),
            })
    }

    /// Returns the sentinel role played by `id`, if any.
    pub fn role_of(&self, id: &ItemId) -> Option<Sentinel> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.id.as_ref() == Some(id))
            .map(|(sentinel, _)| *sentinel)
    }
}

#[cfg(test)]
mod tests {
    use super::{Sentinel, SentinelTable};
    use crate::config::SentinelTitles;
    use crate::db::open_db_in_memory;
    use crate::model::item::{Item, ItemKind};
    use crate::repo::tree_repo::{SqliteTreeRepository, TreeRepository};
    use crate::service::tree_service::TreeServiceError;

    #[test]
    fn resolves_by_case_insensitive_root_title_only() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let trash = repo
            .insert_item(&Item::new(None, "TRASH", ItemKind::Folder))
            .unwrap();
        let outer = repo
            .insert_item(&Item::new(None, "Work", ItemKind::Folder))
            .unwrap();
        repo.insert_item(&Item::new(Some(outer.id.clone()), "Archive", ItemKind::Folder))
            .unwrap();

        let table = SentinelTable::resolve(&repo, &SentinelTitles::default()).unwrap();
        assert_eq!(table.get(Sentinel::Trash), Some(&trash.id));
        assert_eq!(table.role_of(&trash.id), Some(Sentinel::Trash));
        assert_eq!(table.get(Sentinel::Archive), None);

        let err = table.require(Sentinel::Archive).unwrap_err();
        assert!(matches!(
            err,
            TreeServiceError::ConfigurationMissing {
                sentinel: Sentinel::Archive,
                ref title,
            } if title == "Archive"
        ));
    }

    #[test]
    fn localized_titles_match_across_non_ascii_case() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTreeRepository::try_new(&conn).unwrap();
        let trash = repo
            .insert_item(&Item::new(None, "ÉLÉMENTS SUPPRIMÉS", ItemKind::Folder))
            .unwrap();
        let titles = SentinelTitles {
            trash: "Éléments supprimés".to_string(),
            ..SentinelTitles::default()
        };

        let table = SentinelTable::resolve(&repo, &titles).unwrap();
        assert_eq!(table.get(Sentinel::Trash), Some(&trash.id));
    }
}
