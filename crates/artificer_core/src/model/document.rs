//! Document hierarchy read models and mutation patches.
//!
//! # Responsibility
//! - Describe folders, journals, pages, packs and items as read from the
//!   document store.
//! - Describe the partial patches the engine sends back to the store.
//!
//! # Invariants
//! - Folder parent links form a tree (no cycles).
//! - A page belongs to exactly one journal.
//! - Journals and items inside a locked pack are read-only.

use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable folder identifier.
pub type FolderId = Uuid;
/// Stable journal identifier.
pub type JournalId = Uuid;
/// Stable page identifier.
pub type PageId = Uuid;
/// Stable item identifier.
pub type ItemId = Uuid;
/// Stable structured recipe identifier.
pub type RecipeId = Uuid;

/// Kind of records a fixed-name collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackKind {
    Journal,
    Item,
    Recipe,
}

/// Fixed-name source collection (compendium).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    /// Fixed collection name, e.g. `artificer.recipes`.
    pub pack_id: String,
    pub label: String,
    pub kind: PackKind,
    /// Locked collections are reference-only.
    pub locked: bool,
}

/// Folder node in the world hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub folder_id: FolderId,
    /// `None` means a root-level folder.
    pub parent_id: Option<FolderId>,
    pub name: String,
    pub sort_order: i64,
}

/// Journal owning an ordered sequence of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    pub journal_id: JournalId,
    pub folder_id: Option<FolderId>,
    /// Owning collection; `None` means a world journal.
    pub pack_id: Option<String>,
    pub name: String,
    pub sort_order: i64,
    /// True when the owning collection is locked.
    pub read_only: bool,
}

/// Rich-text page owned by one journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_id: PageId,
    pub journal_id: JournalId,
    pub name: String,
    pub content: String,
    /// Associated structured recipe, when linked.
    pub recipe_id: Option<RecipeId>,
    pub sort_order: i64,
}

/// Input for creating one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub name: String,
    pub content: String,
    pub recipe_id: Option<RecipeId>,
}

impl NewPage {
    /// Copy of an existing page, keeping its recipe link.
    pub fn copy_of(page: &Page) -> Self {
        Self {
            name: page.name.clone(),
            content: page.content.clone(),
            recipe_id: page.recipe_id,
        }
    }
}

/// Partial page update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagePatch {
    pub page_id: PageId,
    pub name: Option<String>,
    pub content: Option<String>,
}

/// Item carrying vendor-defined metadata flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub item_id: ItemId,
    pub pack_id: Option<String>,
    pub name: String,
    pub rarity: String,
    /// Raw flags object keyed by namespace scope.
    pub flags: Value,
    pub read_only: bool,
}

/// Partial update to one flag namespace of an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagPatch {
    /// Namespace scope key inside the flags object.
    pub scope: String,
    /// Keys to set (overwriting existing values).
    pub set: Map<String, Value>,
    /// Keys to remove.
    pub unset: Vec<String>,
}

impl FlagPatch {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// Normalizes a record name for grouping: trimmed and case-folded.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
