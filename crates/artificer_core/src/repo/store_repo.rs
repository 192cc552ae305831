//! Document-store accessor contract and SQLite implementation.
//!
//! # Responsibility
//! - Enumerate folders, journals, pages, packs and items.
//! - Create, patch and delete pages embedded in a journal.
//! - Patch one namespace of an item's flags.
//!
//! # Invariants
//! - Listing is deterministic: `sort_order ASC, uuid ASC` (items by name).
//! - Journals and items inside a locked pack reject every mutation.
//! - Callers must not assume batching across calls is transactional.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::document::{
    FlagPatch, Folder, FolderId, Item, ItemId, Journal, JournalId, NewPage, Pack, PackKind, Page,
    PageId, PagePatch,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by document-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from document-store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target record does not exist.
    NotFound { kind: &'static str, id: String },
    /// Target record lives in a locked collection.
    ReadOnly { kind: &'static str, id: String },
    /// Connection schema is not at the expected version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// The store refused the mutation for its own reasons.
    Rejected(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn read_only(kind: &'static str, id: impl ToString) -> Self {
        Self::ReadOnly {
            kind,
            id: id.to_string(),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::ReadOnly { kind, id } => write!(f, "{kind} is read-only: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "document store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
            Self::Rejected(message) => write!(f, "store rejected mutation: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Accessor over the hierarchical document store.
pub trait DocumentStore {
    /// Lists fixed-name collections.
    fn list_packs(&self) -> StoreResult<Vec<Pack>>;
    /// Lists every folder.
    fn list_folders(&self) -> StoreResult<Vec<Folder>>;
    /// Lists every journal, world and collection alike.
    fn list_journals(&self) -> StoreResult<Vec<Journal>>;
    /// Lists the pages owned by one journal, in page order.
    fn list_pages(&self, journal_id: JournalId) -> StoreResult<Vec<Page>>;
    /// Reads one page with full content.
    fn get_page(&self, page_id: PageId) -> StoreResult<Option<Page>>;
    /// Creates one world folder.
    fn create_folder(&self, parent_id: Option<FolderId>, name: &str) -> StoreResult<Folder>;
    /// Creates one world journal.
    fn create_journal(&self, folder_id: Option<FolderId>, name: &str) -> StoreResult<Journal>;
    /// Appends pages to a journal.
    fn create_pages(&self, journal_id: JournalId, pages: &[NewPage]) -> StoreResult<Vec<Page>>;
    /// Applies partial patches to pages of a journal.
    fn update_pages(&self, journal_id: JournalId, patches: &[PagePatch]) -> StoreResult<()>;
    /// Deletes pages from a journal.
    fn delete_pages(&self, journal_id: JournalId, page_ids: &[PageId]) -> StoreResult<()>;
    /// Lists every item, world and collection alike.
    fn list_items(&self) -> StoreResult<Vec<Item>>;
    /// Applies a patch to one flag namespace of an item.
    fn update_item_flags(&self, item_id: ItemId, patch: &FlagPatch) -> StoreResult<()>;
}

const JOURNAL_SELECT_SQL: &str = "SELECT
    j.journal_uuid AS journal_uuid,
    j.folder_uuid AS folder_uuid,
    j.pack_id AS pack_id,
    j.name AS name,
    j.sort_order AS sort_order,
    COALESCE(p.locked, 0) AS locked
FROM journals j
LEFT JOIN packs p ON p.pack_id = j.pack_id";

const PAGE_SELECT_SQL: &str = "SELECT
    page_uuid,
    journal_uuid,
    name,
    content,
    recipe_uuid,
    sort_order
FROM pages";

const ITEM_SELECT_SQL: &str = "SELECT
    i.item_uuid AS item_uuid,
    i.pack_id AS pack_id,
    i.name AS name,
    i.rarity AS rarity,
    i.flags_json AS flags_json,
    COALESCE(p.locked, 0) AS locked
FROM items i
LEFT JOIN packs p ON p.pack_id = i.pack_id";

/// SQLite-backed document store.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Creates the store from a fully upgraded connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Registers one fixed-name collection.
    pub fn create_pack(
        &self,
        pack_id: &str,
        label: &str,
        kind: PackKind,
        locked: bool,
    ) -> StoreResult<Pack> {
        self.conn.execute(
            "INSERT INTO packs (pack_id, label, kind, locked) VALUES (?1, ?2, ?3, ?4);",
            params![pack_id, label, pack_kind_to_db(kind), bool_to_int(locked)],
        )?;
        Ok(Pack {
            pack_id: pack_id.to_string(),
            label: label.to_string(),
            kind,
            locked,
        })
    }

    /// Creates a journal inside a collection. Authoring path only: it does
    /// not check the collection lock.
    pub fn create_pack_journal(&self, pack_id: &str, name: &str) -> StoreResult<Journal> {
        insert_journal(self.conn, None, Some(pack_id), name)
    }

    /// Creates one item with raw flags. Authoring path only.
    pub fn create_item(
        &self,
        pack_id: Option<&str>,
        name: &str,
        rarity: &str,
        flags: &Value,
    ) -> StoreResult<Item> {
        let item_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO items (item_uuid, pack_id, name, rarity, flags_json)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item_uuid.to_string(),
                pack_id,
                name,
                rarity,
                flags.to_string()
            ],
        )?;
        load_item(self.conn, item_uuid)?.ok_or_else(|| StoreError::not_found("item", item_uuid))
    }

    /// Loads one item by id.
    pub fn get_item(&self, item_id: ItemId) -> StoreResult<Option<Item>> {
        load_item(self.conn, item_id)
    }

    fn writable_journal(&self, journal_id: JournalId) -> StoreResult<Journal> {
        let journal = load_journal(self.conn, journal_id)?
            .ok_or_else(|| StoreError::not_found("journal", journal_id))?;
        if journal.read_only {
            return Err(StoreError::read_only("journal", journal_id));
        }
        Ok(journal)
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn list_packs(&self) -> StoreResult<Vec<Pack>> {
        let mut stmt = self.conn.prepare(
            "SELECT pack_id, label, kind, locked
             FROM packs
             ORDER BY pack_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut packs = Vec::new();
        while let Some(row) = rows.next()? {
            let kind_text: String = row.get("kind")?;
            let kind = parse_pack_kind(&kind_text).ok_or_else(|| {
                StoreError::InvalidData(format!("invalid pack kind `{kind_text}` in packs.kind"))
            })?;
            packs.push(Pack {
                pack_id: row.get("pack_id")?,
                label: row.get("label")?,
                kind,
                locked: int_to_bool(row.get("locked")?, "packs.locked")?,
            });
        }
        Ok(packs)
    }

    fn list_folders(&self) -> StoreResult<Vec<Folder>> {
        let mut stmt = self.conn.prepare(
            "SELECT folder_uuid, parent_uuid, name, sort_order
             FROM folders
             ORDER BY sort_order ASC, folder_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next()? {
            folders.push(parse_folder_row(row)?);
        }
        Ok(folders)
    }

    fn list_journals(&self) -> StoreResult<Vec<Journal>> {
        let mut stmt = self.conn.prepare(&format!(
            "{JOURNAL_SELECT_SQL}
             ORDER BY j.sort_order ASC, j.journal_uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut journals = Vec::new();
        while let Some(row) = rows.next()? {
            journals.push(parse_journal_row(row)?);
        }
        Ok(journals)
    }

    fn list_pages(&self, journal_id: JournalId) -> StoreResult<Vec<Page>> {
        if load_journal(self.conn, journal_id)?.is_none() {
            return Err(StoreError::not_found("journal", journal_id));
        }
        let mut stmt = self.conn.prepare(&format!(
            "{PAGE_SELECT_SQL}
             WHERE journal_uuid = ?1
             ORDER BY sort_order ASC, page_uuid ASC;"
        ))?;
        let mut rows = stmt.query([journal_id.to_string()])?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push(parse_page_row(row)?);
        }
        Ok(pages)
    }

    fn get_page(&self, page_id: PageId) -> StoreResult<Option<Page>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAGE_SELECT_SQL} WHERE page_uuid = ?1;"))?;
        let mut rows = stmt.query([page_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_page_row(row)?));
        }
        Ok(None)
    }

    fn create_folder(&self, parent_id: Option<FolderId>, name: &str) -> StoreResult<Folder> {
        let folder_uuid = Uuid::new_v4();
        let sort_order: i64 = match parent_id {
            Some(parent_id) => self.conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM folders WHERE parent_uuid = ?1;",
                [parent_id.to_string()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM folders WHERE parent_uuid IS NULL;",
                [],
                |row| row.get(0),
            )?,
        };
        self.conn.execute(
            "INSERT INTO folders (folder_uuid, parent_uuid, name, sort_order)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                folder_uuid.to_string(),
                parent_id.map(|value| value.to_string()),
                name,
                sort_order,
            ],
        )?;
        Ok(Folder {
            folder_id: folder_uuid,
            parent_id,
            name: name.to_string(),
            sort_order,
        })
    }

    fn create_journal(&self, folder_id: Option<FolderId>, name: &str) -> StoreResult<Journal> {
        insert_journal(self.conn, folder_id, None, name)
    }

    fn create_pages(&self, journal_id: JournalId, pages: &[NewPage]) -> StoreResult<Vec<Page>> {
        self.writable_journal(journal_id)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut sort_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM pages WHERE journal_uuid = ?1;",
            [journal_id.to_string()],
            |row| row.get(0),
        )?;

        let mut created = Vec::with_capacity(pages.len());
        for page in pages {
            let page_uuid = Uuid::new_v4();
            tx.execute(
                "INSERT INTO pages (page_uuid, journal_uuid, name, content, recipe_uuid, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    page_uuid.to_string(),
                    journal_id.to_string(),
                    page.name,
                    page.content,
                    page.recipe_id.map(|value| value.to_string()),
                    sort_order,
                ],
            )?;
            created.push(Page {
                page_id: page_uuid,
                journal_id,
                name: page.name.clone(),
                content: page.content.clone(),
                recipe_id: page.recipe_id,
                sort_order,
            });
            sort_order += 1;
        }

        tx.commit()?;
        Ok(created)
    }

    fn update_pages(&self, journal_id: JournalId, patches: &[PagePatch]) -> StoreResult<()> {
        self.writable_journal(journal_id)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for patch in patches {
            let changed = tx.execute(
                "UPDATE pages
                 SET name = COALESCE(?3, name),
                     content = COALESCE(?4, content),
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE page_uuid = ?1
                   AND journal_uuid = ?2;",
                params![
                    patch.page_id.to_string(),
                    journal_id.to_string(),
                    patch.name.as_deref(),
                    patch.content.as_deref(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("page", patch.page_id));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_pages(&self, journal_id: JournalId, page_ids: &[PageId]) -> StoreResult<()> {
        self.writable_journal(journal_id)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for page_id in page_ids {
            let changed = tx.execute(
                "DELETE FROM pages WHERE page_uuid = ?1 AND journal_uuid = ?2;",
                params![page_id.to_string(), journal_id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("page", page_id));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_items(&self) -> StoreResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             ORDER BY i.name ASC, i.item_uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn update_item_flags(&self, item_id: ItemId, patch: &FlagPatch) -> StoreResult<()> {
        let mut item =
            load_item(self.conn, item_id)?.ok_or_else(|| StoreError::not_found("item", item_id))?;
        if item.read_only {
            return Err(StoreError::read_only("item", item_id));
        }

        apply_flag_patch(&mut item.flags, patch)?;
        self.conn.execute(
            "UPDATE items
             SET flags_json = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_uuid = ?1;",
            params![item_id.to_string(), item.flags.to_string()],
        )?;
        Ok(())
    }
}

/// Applies a namespace patch to a raw flags object.
fn apply_flag_patch(flags: &mut Value, patch: &FlagPatch) -> StoreResult<()> {
    if !flags.is_object() {
        *flags = Value::Object(Map::new());
    }
    let Some(root) = flags.as_object_mut() else {
        return Err(StoreError::InvalidData("flags must be an object".to_string()));
    };
    let bag = root
        .entry(patch.scope.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(bag) = bag.as_object_mut() else {
        return Err(StoreError::InvalidData(format!(
            "flag scope `{}` is not an object",
            patch.scope
        )));
    };
    for (key, value) in &patch.set {
        bag.insert(key.clone(), value.clone());
    }
    for key in &patch.unset {
        bag.remove(key);
    }
    Ok(())
}

fn insert_journal(
    conn: &Connection,
    folder_id: Option<FolderId>,
    pack_id: Option<&str>,
    name: &str,
) -> StoreResult<Journal> {
    let journal_uuid = Uuid::new_v4();
    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1
         FROM journals
         WHERE folder_uuid IS ?1
           AND pack_id IS ?2;",
        params![folder_id.map(|value| value.to_string()), pack_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO journals (journal_uuid, folder_uuid, pack_id, name, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            journal_uuid.to_string(),
            folder_id.map(|value| value.to_string()),
            pack_id,
            name,
            sort_order,
        ],
    )?;
    load_journal(conn, journal_uuid)?.ok_or_else(|| StoreError::not_found("journal", journal_uuid))
}

fn load_journal(conn: &Connection, journal_id: JournalId) -> StoreResult<Option<Journal>> {
    let mut stmt = conn.prepare(&format!("{JOURNAL_SELECT_SQL} WHERE j.journal_uuid = ?1;"))?;
    let mut rows = stmt.query([journal_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_journal_row(row)?));
    }
    Ok(None)
}

fn load_item(conn: &Connection, item_id: ItemId) -> StoreResult<Option<Item>> {
    let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE i.item_uuid = ?1;"))?;
    let mut rows = stmt.query([item_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_item_row(row)?));
    }
    Ok(None)
}

fn parse_folder_row(row: &Row<'_>) -> StoreResult<Folder> {
    let folder_uuid_text: String = row.get("folder_uuid")?;
    Ok(Folder {
        folder_id: parse_uuid(&folder_uuid_text, "folders.folder_uuid")?,
        parent_id: row
            .get::<_, Option<String>>("parent_uuid")?
            .map(|value| parse_uuid(&value, "folders.parent_uuid"))
            .transpose()?,
        name: row.get("name")?,
        sort_order: row.get("sort_order")?,
    })
}

fn parse_journal_row(row: &Row<'_>) -> StoreResult<Journal> {
    let journal_uuid_text: String = row.get("journal_uuid")?;
    Ok(Journal {
        journal_id: parse_uuid(&journal_uuid_text, "journals.journal_uuid")?,
        folder_id: row
            .get::<_, Option<String>>("folder_uuid")?
            .map(|value| parse_uuid(&value, "journals.folder_uuid"))
            .transpose()?,
        pack_id: row.get("pack_id")?,
        name: row.get("name")?,
        sort_order: row.get("sort_order")?,
        read_only: int_to_bool(row.get("locked")?, "packs.locked")?,
    })
}

fn parse_page_row(row: &Row<'_>) -> StoreResult<Page> {
    let page_uuid_text: String = row.get("page_uuid")?;
    let journal_uuid_text: String = row.get("journal_uuid")?;
    Ok(Page {
        page_id: parse_uuid(&page_uuid_text, "pages.page_uuid")?,
        journal_id: parse_uuid(&journal_uuid_text, "pages.journal_uuid")?,
        name: row.get("name")?,
        content: row.get("content")?,
        recipe_id: row
            .get::<_, Option<String>>("recipe_uuid")?
            .map(|value| parse_uuid(&value, "pages.recipe_uuid"))
            .transpose()?,
        sort_order: row.get("sort_order")?,
    })
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let item_uuid_text: String = row.get("item_uuid")?;
    let flags_text: String = row.get("flags_json")?;
    let flags = serde_json::from_str(&flags_text).map_err(|err| {
        StoreError::InvalidData(format!(
            "invalid json in items.flags_json for {item_uuid_text}: {err}"
        ))
    })?;
    Ok(Item {
        item_id: parse_uuid(&item_uuid_text, "items.item_uuid")?,
        pack_id: row.get("pack_id")?,
        name: row.get("name")?,
        rarity: row.get("rarity")?,
        flags,
        read_only: int_to_bool(row.get("locked")?, "packs.locked")?,
    })
}

fn pack_kind_to_db(kind: PackKind) -> &'static str {
    match kind {
        PackKind::Journal => "journal",
        PackKind::Item => "item",
        PackKind::Recipe => "recipe",
    }
}

fn parse_pack_kind(value: &str) -> Option<PackKind> {
    match value {
        "journal" => Some(PackKind::Journal),
        "item" => Some(PackKind::Item),
        "recipe" => Some(PackKind::Recipe),
        _ => None,
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn int_to_bool(value: i64, column: &'static str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["packs", "folders", "journals", "pages", "items", "recipes"] {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [table],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::apply_flag_patch;
    use crate::model::document::FlagPatch;
    use serde_json::json;

    #[test]
    fn flag_patch_sets_and_unsets_inside_scope_only() {
        let mut flags = json!({
            "artificer": { "skillLevel": 3, "componentType": "reagent" },
            "core": { "sourceId": "x" }
        });
        let mut patch = FlagPatch::new("artificer");
        patch.set.insert("skillLevel".to_string(), json!(6));
        patch.unset.push("componentType".to_string());

        apply_flag_patch(&mut flags, &patch).unwrap();
        assert_eq!(
            flags,
            json!({ "artificer": { "skillLevel": 6 }, "core": { "sourceId": "x" } })
        );
    }

    #[test]
    fn flag_patch_rejects_non_object_scope() {
        let mut flags = json!({ "artificer": "broken" });
        let mut patch = FlagPatch::new("artificer");
        patch.set.insert("quirk".to_string(), json!("x"));
        assert!(apply_flag_patch(&mut flags, &patch).is_err());
    }
}
