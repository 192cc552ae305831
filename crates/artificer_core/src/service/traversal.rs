//! Hierarchy traversal: scope -> ordered leaf pages.
//!
//! # Responsibility
//! - Resolve a traversal scope (folder or collection) against the store.
//! - Compute folder descendant closure without upward traversal.
//! - Enumerate leaf pages in store order.
//!
//! # Invariants
//! - Closure expansion terminates for any folder order.
//! - A missing scope is a fatal precondition, raised before any mutation.

use crate::model::document::{Folder, FolderId, Journal, Page};
use crate::repo::store_repo::{DocumentStore, StoreError};
use crate::service::MigrationError;
use std::collections::HashSet;

/// Root of a page traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalScope {
    /// Every world journal.
    All,
    /// A world folder, by name or id, and all its descendants.
    Folder(String),
    /// A fixed-name collection.
    Collection(String),
}

/// One page with its owning journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRecord {
    pub page: Page,
    pub journal: Journal,
}

/// Returns `root` plus every folder transitively parented under it.
///
/// Repeats passes over `folders`, accepting any folder whose parent is
/// already accepted, until a pass adds nothing.
pub fn descendant_folder_ids(folders: &[Folder], root: FolderId) -> HashSet<FolderId> {
    let mut accepted = HashSet::from([root]);
    loop {
        let mut added = false;
        for folder in folders {
            let Some(parent_id) = folder.parent_id else {
                continue;
            };
            if accepted.contains(&parent_id) && accepted.insert(folder.folder_id) {
                added = true;
            }
        }
        if !added {
            return accepted;
        }
    }
}

/// Finds a folder by id text or by exact, then case-insensitive, name.
pub fn find_folder<'a>(folders: &'a [Folder], name_or_id: &str) -> Option<&'a Folder> {
    let needle = name_or_id.trim();
    folders
        .iter()
        .find(|folder| folder.folder_id.to_string() == needle)
        .or_else(|| folders.iter().find(|folder| folder.name == needle))
        .or_else(|| {
            folders
                .iter()
                .find(|folder| folder.name.trim().eq_ignore_ascii_case(needle))
        })
}

/// Journals reachable under `scope`, in store order.
pub fn scoped_journals<S: DocumentStore>(
    store: &S,
    scope: &TraversalScope,
) -> Result<Vec<Journal>, MigrationError> {
    let journals = store.list_journals()?;
    match scope {
        TraversalScope::All => Ok(journals
            .into_iter()
            .filter(|journal| journal.pack_id.is_none())
            .collect()),
        TraversalScope::Folder(name_or_id) => {
            let folders = store.list_folders()?;
            let root = find_folder(&folders, name_or_id)
                .ok_or_else(|| MigrationError::ScopeNotFound(name_or_id.clone()))?;
            let closure = descendant_folder_ids(&folders, root.folder_id);
            Ok(journals
                .into_iter()
                .filter(|journal| journal.pack_id.is_none())
                .filter(|journal| {
                    journal
                        .folder_id
                        .is_some_and(|folder_id| closure.contains(&folder_id))
                })
                .collect())
        }
        TraversalScope::Collection(pack_id) => {
            let packs = store.list_packs()?;
            if !packs.iter().any(|pack| &pack.pack_id == pack_id) {
                return Err(MigrationError::CollectionNotFound(pack_id.clone()));
            }
            Ok(journals
                .into_iter()
                .filter(|journal| journal.pack_id.as_deref() == Some(pack_id.as_str()))
                .collect())
        }
    }
}

/// Ordered leaf pages reachable under `scope`.
pub fn collect_leaf_records<S: DocumentStore>(
    store: &S,
    scope: &TraversalScope,
) -> Result<Vec<LeafRecord>, MigrationError> {
    let mut records = Vec::new();
    for journal in scoped_journals(store, scope)? {
        for page in store.list_pages(journal.journal_id)? {
            records.push(LeafRecord {
                page,
                journal: journal.clone(),
            });
        }
    }
    Ok(records)
}
