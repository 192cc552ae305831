use artificer_core::db::open_db_in_memory;
use artificer_core::{
    DocumentStore, EngineConfig, FlagPatch, Folder, FolderId, Item, ItemId, Journal, JournalId,
    MigrationOp, MigrationService, NewPage, Pack, Page, PageId, PagePatch, RunOptions,
    SqliteDocumentStore, SqliteRecipeCache, StoreError, StoreResult,
};
use rusqlite::Connection;
use serde_json::json;
use std::cell::Cell;
use std::collections::HashSet;

/// Delegating store that counts mutation calls and rejects writes to chosen
/// pages and items.
struct CountingStore<S> {
    inner: S,
    mutations: Cell<usize>,
    reject_pages: HashSet<PageId>,
    reject_items: HashSet<ItemId>,
}

impl<S: DocumentStore> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            mutations: Cell::new(0),
            reject_pages: HashSet::new(),
            reject_items: HashSet::new(),
        }
    }

    fn mutate<T>(&self, rejected: bool, call: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
        self.mutations.set(self.mutations.get() + 1);
        if rejected {
            return Err(StoreError::Rejected("simulated write failure".to_string()));
        }
        call()
    }
}

impl<S: DocumentStore> DocumentStore for CountingStore<S> {
    fn list_packs(&self) -> StoreResult<Vec<Pack>> {
        self.inner.list_packs()
    }

    fn list_folders(&self) -> StoreResult<Vec<Folder>> {
        self.inner.list_folders()
    }

    fn list_journals(&self) -> StoreResult<Vec<Journal>> {
        self.inner.list_journals()
    }

    fn list_pages(&self, journal_id: JournalId) -> StoreResult<Vec<Page>> {
        self.inner.list_pages(journal_id)
    }

    fn get_page(&self, page_id: PageId) -> StoreResult<Option<Page>> {
        self.inner.get_page(page_id)
    }

    fn create_folder(&self, parent_id: Option<FolderId>, name: &str) -> StoreResult<Folder> {
        self.mutate(false, || self.inner.create_folder(parent_id, name))
    }

    fn create_journal(&self, folder_id: Option<FolderId>, name: &str) -> StoreResult<Journal> {
        self.mutate(false, || self.inner.create_journal(folder_id, name))
    }

    fn create_pages(&self, journal_id: JournalId, pages: &[NewPage]) -> StoreResult<Vec<Page>> {
        self.mutate(false, || self.inner.create_pages(journal_id, pages))
    }

    fn update_pages(&self, journal_id: JournalId, patches: &[PagePatch]) -> StoreResult<()> {
        let rejected = patches
            .iter()
            .any(|patch| self.reject_pages.contains(&patch.page_id));
        self.mutate(rejected, || self.inner.update_pages(journal_id, patches))
    }

    fn delete_pages(&self, journal_id: JournalId, page_ids: &[PageId]) -> StoreResult<()> {
        let rejected = page_ids.iter().any(|id| self.reject_pages.contains(id));
        self.mutate(rejected, || self.inner.delete_pages(journal_id, page_ids))
    }

    fn list_items(&self) -> StoreResult<Vec<Item>> {
        self.inner.list_items()
    }

    fn update_item_flags(&self, item_id: ItemId, patch: &FlagPatch) -> StoreResult<()> {
        let rejected = self.reject_items.contains(&item_id);
        self.mutate(rejected, || self.inner.update_item_flags(item_id, patch))
    }
}

fn seed(conn: &Connection) -> Vec<Page> {
    let store = SqliteDocumentStore::try_new(conn).unwrap();
    let journal = store.create_journal(None, "Salves").unwrap();
    let pages: Vec<NewPage> = [
        ("Ember Salve", "name: Ember Salve\ntool: Mortar\nworkHours: 24"),
        ("ember salve", "name: ember salve"),
        ("Frost Tonic", "name: Frost Tonic\nrarity: Rare\nskillLevel:"),
        ("Lore", "Nothing to see."),
    ]
    .iter()
    .map(|(name, content)| NewPage {
        name: name.to_string(),
        content: content.to_string(),
        recipe_id: None,
    })
    .collect();
    store.create_pages(journal.journal_id, &pages).unwrap()
}

fn counting_service(
    conn: &Connection,
) -> MigrationService<CountingStore<SqliteDocumentStore<'_>>, SqliteRecipeCache<'_>> {
    let config = EngineConfig::default();
    let store = CountingStore::new(SqliteDocumentStore::try_new(conn).unwrap());
    let cache = SqliteRecipeCache::new(conn, &config);
    MigrationService::new(store, cache, config)
}

#[test]
fn dry_run_issues_no_mutation_calls_and_matches_apply_counts() {
    let ops = [
        MigrationOp::NormalizeRecipePages,
        MigrationOp::DeduplicatePages,
        MigrationOp::ReorganizeByRarity {
            target_folder: "By Rarity".to_string(),
        },
    ];
    for op in ops {
        let preview_conn = open_db_in_memory().unwrap();
        seed(&preview_conn);
        let mut preview = counting_service(&preview_conn);
        let preview_report = preview.run(&op, RunOptions { dry_run: true }).unwrap();
        assert_eq!(preview.store().mutations.get(), 0, "{}", op.name());

        let apply_conn = open_db_in_memory().unwrap();
        seed(&apply_conn);
        let mut apply = counting_service(&apply_conn);
        let apply_report = apply.run(&op, RunOptions { dry_run: false }).unwrap();

        assert_eq!(preview_report.counts(), apply_report.counts(), "{}", op.name());
        assert_eq!(
            apply.store().mutations.get(),
            apply_report.mutations(),
            "{}",
            op.name()
        );
    }
}

#[test]
fn failed_page_write_is_reported_and_run_continues() {
    let conn = open_db_in_memory().unwrap();
    let pages = seed(&conn);
    let mut store = CountingStore::new(SqliteDocumentStore::try_new(&conn).unwrap());
    store.reject_pages.insert(pages[0].page_id);
    let config = EngineConfig::default();
    let cache = SqliteRecipeCache::new(&conn, &config);
    let mut service = MigrationService::new(store, cache, config);

    let report = service
        .run(&MigrationOp::NormalizeRecipePages, RunOptions::default())
        .unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].name, "Ember Salve");
    assert!(report.errors[0].error.contains("simulated write failure"));
    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 1);

    let reader = SqliteDocumentStore::try_new(&conn).unwrap();
    let untouched = reader.get_page(pages[0].page_id).unwrap().unwrap();
    assert_eq!(untouched.content, pages[0].content);
    let frost = reader.get_page(pages[2].page_id).unwrap().unwrap();
    assert!(frost.content.contains("\nskillLevel: 12\n"));
    assert!(frost.content.ends_with("rarity: rare"));
}

#[test]
fn failed_item_write_is_reported_and_run_continues() {
    let conn = open_db_in_memory().unwrap();
    let writer = SqliteDocumentStore::try_new(&conn).unwrap();
    let flags = json!({ "artificer": { "componentType": "herb" } });
    let first = writer.create_item(None, "Ashroot", "", &flags).unwrap();
    let second = writer.create_item(None, "Bloodmoss", "", &flags).unwrap();

    let mut store = CountingStore::new(SqliteDocumentStore::try_new(&conn).unwrap());
    store.reject_items.insert(first.item_id);
    let config = EngineConfig::default();
    let cache = SqliteRecipeCache::new(&conn, &config);
    let mut service = MigrationService::new(store, cache, config);

    let report = service
        .run(&MigrationOp::RemoveComponentType, RunOptions::default())
        .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].name, "Ashroot");
    assert_eq!(
        writer.get_item(second.item_id).unwrap().unwrap().flags,
        json!({ "artificer": {} })
    );
}
