//! Migration orchestrator.
//!
//! # Responsibility
//! - Decide the mutation for each traversed record and apply it, or only
//!   count it under dry-run.
//! - Aggregate counts and per-record errors into a `MigrationReport`.
//!
//! # Invariants
//! - Recomputed values are compared with stored values; no-op writes are
//!   never issued, so a second run reports zero mutations.
//! - Dry-run follows the same decision path and issues no store mutation.
//! - A failed write is recorded and the run continues with the next record.
//! - Moves are copy-then-delete; a copy already present in the target is
//!   not made again, even after the copy was normalized.
//! - Every configured source collection exists before any record is touched.

use crate::block::parser::parse_block;
use crate::block::reconcile::{looks_like_recipe, reconcile};
use crate::block::rich_text::strip_rich_text;
use crate::config::{EngineConfig, RunOptions};
use crate::model::document::{
    normalize_name, FlagPatch, FolderId, Item, JournalId, NewPage, Page, PagePatch, RecipeId,
};
use crate::model::flags::{FlagField, ItemFlagsView};
use crate::repo::recipe_cache::RecipeCache;
use crate::repo::store_repo::{DocumentStore, StoreError};
use crate::service::grouping::{classify, plan_deduplication, GroupingKey};
use crate::service::report::MigrationReport;
use crate::service::traversal::{collect_leaf_records, find_folder, LeafRecord, TraversalScope};
use crate::service::MigrationError;
use crate::tables::{
    clamp_skill_level, legacy_biome_to_official, merge_quirk, rarity_to_skill_level, Rarity,
};
use log::{info, warn};
use serde_json::{json, Value};

const CACHE_RECORD_NAME: &str = "recipe cache";

/// One runnable migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOp {
    /// Parse, reconcile and rewrite recipe pages as canonical blocks.
    NormalizeRecipePages,
    /// Delete same-journal pages with duplicate normalized names.
    DeduplicatePages,
    /// Move pages into per-skill journals under a target folder.
    ReorganizeBySkill { target_folder: String },
    /// Move pages into per-rarity journals under a target folder.
    ReorganizeByRarity { target_folder: String },
    /// Derive item skill levels from rarity.
    MigrateItemSkillLevels,
    /// Remap legacy item biome terms to the official taxonomy.
    MigrateItemBiomes,
    /// Drop the deprecated `componentType` flag.
    RemoveComponentType,
}

impl MigrationOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NormalizeRecipePages => "normalize_recipe_pages",
            Self::DeduplicatePages => "deduplicate_pages",
            Self::ReorganizeBySkill { .. } => "reorganize_by_skill",
            Self::ReorganizeByRarity { .. } => "reorganize_by_rarity",
            Self::MigrateItemSkillLevels => "migrate_item_skill_levels",
            Self::MigrateItemBiomes => "migrate_item_biomes",
            Self::RemoveComponentType => "remove_component_type",
        }
    }
}

/// Migration service facade.
pub struct MigrationService<S: DocumentStore, C: RecipeCache> {
    store: S,
    cache: C,
    config: EngineConfig,
    scope: TraversalScope,
}

impl<S: DocumentStore, C: RecipeCache> MigrationService<S, C> {
    /// Creates the service; page traversal is scoped by `config`.
    pub fn new(store: S, cache: C, config: EngineConfig) -> Self {
        let scope = config.recipe_scope();
        Self {
            store,
            cache,
            config,
            scope,
        }
    }

    /// Overrides the page traversal scope.
    pub fn with_scope(mut self, scope: TraversalScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Runs one migration.
    ///
    /// # Errors
    /// - `ScopeNotFound` / `CollectionNotFound` when the traversal root or a
    ///   configured collection is missing.
    /// - `Store` when enumeration fails before any record is processed.
    pub fn run(
        &mut self,
        op: &MigrationOp,
        options: RunOptions,
    ) -> Result<MigrationReport, MigrationError> {
        info!(
            "event=migration_run module=service status=start op={} dry_run={}",
            op.name(),
            options.dry_run
        );
        let mut report = MigrationReport::new(op.name(), options.dry_run);
        let result = match op {
            MigrationOp::NormalizeRecipePages => self.normalize_recipe_pages(options, &mut report),
            MigrationOp::DeduplicatePages => self.deduplicate_pages(options, &mut report),
            MigrationOp::ReorganizeBySkill { target_folder } => {
                self.reorganize(GroupingKey::Skill, target_folder, options, &mut report)
            }
            MigrationOp::ReorganizeByRarity { target_folder } => {
                self.reorganize(GroupingKey::Rarity, target_folder, options, &mut report)
            }
            MigrationOp::MigrateItemSkillLevels => {
                self.migrate_items(op, skill_level_patch, options, &mut report)
            }
            MigrationOp::MigrateItemBiomes => {
                self.migrate_items(op, biome_patch, options, &mut report)
            }
            MigrationOp::RemoveComponentType => {
                self.migrate_items(op, component_type_patch, options, &mut report)
            }
        };

        if let Err(err) = result {
            warn!(
                "event=migration_run module=service status=error op={} error={}",
                op.name(),
                err
            );
            return Err(err);
        }

        info!(
            "event=migration_run module=service status=ok op={} dry_run={} updated={} skipped={} kept={} moved={} created={} deleted={} not_in_data={} errors={}",
            op.name(),
            options.dry_run,
            report.updated,
            report.skipped,
            report.kept,
            report.moved,
            report.created,
            report.deleted,
            report.not_in_data,
            report.errors.len()
        );
        Ok(report)
    }

    fn normalize_recipe_pages(
        &mut self,
        options: RunOptions,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        let records = collect_leaf_records(&self.store, &self.scope)?;
        for record in records {
            if record.journal.read_only {
                report.skipped += 1;
                continue;
            }
            let raw = parse_block(&strip_rich_text(&record.page.content));
            if !looks_like_recipe(&raw) {
                report.skipped += 1;
                continue;
            }
            let block = reconcile(&raw).to_block();
            if block == record.page.content {
                report.skipped += 1;
                continue;
            }

            if !options.dry_run {
                let patch = PagePatch {
                    page_id: record.page.page_id,
                    name: None,
                    content: Some(block),
                };
                if let Err(err) = self.store.update_pages(record.journal.journal_id, &[patch]) {
                    record_failure(report, &record.page.name, record.page.page_id, err);
                    continue;
                }
            }
            report.updated += 1;
        }
        Ok(())
    }

    fn deduplicate_pages(
        &mut self,
        options: RunOptions,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        let records = collect_leaf_records(&self.store, &self.scope)?;
        let plan = plan_deduplication(&records);
        report.kept += plan.keep.len();

        for record in plan.delete {
            if record.journal.read_only {
                report.skipped += 1;
                continue;
            }
            if !options.dry_run {
                if let Err(err) = self
                    .store
                    .delete_pages(record.journal.journal_id, &[record.page.page_id])
                {
                    record_failure(report, &record.page.name, record.page.page_id, err);
                    continue;
                }
            }
            report.deleted += 1;
        }
        Ok(())
    }

    fn reorganize(
        &mut self,
        key: GroupingKey,
        target_folder: &str,
        options: RunOptions,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        if self.config.recipe_storage_source.reads_compendia() {
            self.require_packs(&self.config.recipe_compendiums)?;
        }
        self.cache.refresh()?;
        let records = collect_leaf_records(&self.store, &self.scope)?;
        let mut targets = self.load_target_plan(target_folder)?;

        for record in &records {
            let structured = record
                .page
                .recipe_id
                .and_then(|recipe_id| self.cache.find(recipe_id))
                .is_some();
            if !structured {
                report.not_in_data += 1;
            }

            let Some(label) = classify(record, key, &self.cache) else {
                report.skipped += 1;
                continue;
            };

            let index = match self.target_journal(&mut targets, &label, options, report) {
                Ok(index) => index,
                Err(err) => {
                    record_failure(report, &record.page.name, record.page.page_id, err);
                    continue;
                }
            };
            if targets.journals[index].journal_id == Some(record.journal.journal_id) {
                report.kept += 1;
                continue;
            }

            let already_copied = targets.journals[index].contains(record);
            if record.journal.read_only && already_copied {
                report.skipped += 1;
                continue;
            }

            if !already_copied {
                let journal_id = targets.journals[index].journal_id;
                if let (false, Some(journal_id)) = (options.dry_run, journal_id) {
                    if let Err(err) = self
                        .store
                        .create_pages(journal_id, &[NewPage::copy_of(&record.page)])
                    {
                        record_failure(report, &record.page.name, record.page.page_id, err);
                        continue;
                    }
                }
                targets.journals[index].remember(record);
            }

            if !record.journal.read_only {
                if !options.dry_run {
                    if let Err(err) = self
                        .store
                        .delete_pages(record.journal.journal_id, &[record.page.page_id])
                    {
                        record_failure(report, &record.page.name, record.page.page_id, err);
                        continue;
                    }
                }
                report.deleted += 1;
            }
            report.moved += 1;
        }

        if !options.dry_run && report.moved + report.deleted > 0 {
            if let Err(err) = self.cache.refresh() {
                warn!(
                    "event=recipe_cache_refresh module=service status=error error={}",
                    err
                );
                report.record_error(CACHE_RECORD_NAME, err);
            }
        }
        Ok(())
    }

    fn load_target_plan(&self, target_folder: &str) -> Result<TargetPlan, MigrationError> {
        let folders = self.store.list_folders()?;
        let Some(folder) = find_folder(&folders, target_folder) else {
            return Ok(TargetPlan {
                folder_name: target_folder.trim().to_string(),
                folder: TargetFolder::Missing,
                journals: Vec::new(),
            });
        };

        let mut journals = Vec::new();
        for journal in self.store.list_journals()? {
            if journal.pack_id.is_some() || journal.folder_id != Some(folder.folder_id) {
                continue;
            }
            let pages = self
                .store
                .list_pages(journal.journal_id)?
                .into_iter()
                .map(|page| PageKey::of(&page))
                .collect();
            journals.push(TargetJournal {
                label: journal.name.trim().to_string(),
                journal_id: Some(journal.journal_id),
                pages,
            });
        }

        Ok(TargetPlan {
            folder_name: folder.name.clone(),
            folder: TargetFolder::Existing(folder.folder_id),
            journals,
        })
    }

    /// Index of the target journal for `label`, creating (or planning) the
    /// folder and journal on first use.
    fn target_journal(
        &self,
        targets: &mut TargetPlan,
        label: &str,
        options: RunOptions,
        report: &mut MigrationReport,
    ) -> Result<usize, StoreError> {
        if let Some(index) = targets
            .journals
            .iter()
            .position(|journal| journal.label.eq_ignore_ascii_case(label))
        {
            return Ok(index);
        }

        let folder_id = match targets.folder {
            TargetFolder::Existing(folder_id) => Some(folder_id),
            TargetFolder::Planned => None,
            TargetFolder::Missing => {
                let folder_id = if options.dry_run {
                    targets.folder = TargetFolder::Planned;
                    None
                } else {
                    let folder = self.store.create_folder(None, &targets.folder_name)?;
                    targets.folder = TargetFolder::Existing(folder.folder_id);
                    Some(folder.folder_id)
                };
                report.created += 1;
                folder_id
            }
        };

        let journal_id = if options.dry_run {
            None
        } else {
            Some(self.store.create_journal(folder_id, label)?.journal_id)
        };
        report.created += 1;
        targets.journals.push(TargetJournal {
            label: label.to_string(),
            journal_id,
            pages: Vec::new(),
        });
        Ok(targets.journals.len() - 1)
    }

    fn require_packs(&self, pack_ids: &[String]) -> Result<(), MigrationError> {
        let packs = self.store.list_packs()?;
        match pack_ids
            .iter()
            .find(|pack_id| !packs.iter().any(|pack| &pack.pack_id == *pack_id))
        {
            Some(missing) => Err(MigrationError::CollectionNotFound(missing.clone())),
            None => Ok(()),
        }
    }

    fn migrate_items(
        &mut self,
        op: &MigrationOp,
        compute: fn(&Item, &ItemFlagsView) -> FlagPatch,
        options: RunOptions,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        self.require_packs(&self.config.ingredient_compendiums)?;

        let items = self.store.list_items()?.into_iter().filter(|item| {
            item.pack_id.as_ref().map_or(true, |pack_id| {
                self.config.ingredient_compendiums.contains(pack_id)
            })
        });
        for item in items {
            if item.read_only {
                report.skipped += 1;
                continue;
            }
            let Some(view) = ItemFlagsView::resolve(&item.flags) else {
                report.skipped += 1;
                continue;
            };
            let patch = compute(&item, &view);
            if patch.is_empty() {
                report.skipped += 1;
                continue;
            }

            if !options.dry_run {
                if let Err(err) = self.store.update_item_flags(item.item_id, &patch) {
                    warn!(
                        "event=migration_record module=service status=error op={} record_id={}",
                        op.name(),
                        item.item_id
                    );
                    report.record_error(item.name.clone(), err);
                    continue;
                }
            }
            report.updated += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetFolder {
    Existing(FolderId),
    /// Would be created; dry-run only.
    Planned,
    Missing,
}

struct TargetPlan {
    folder_name: String,
    folder: TargetFolder,
    journals: Vec<TargetJournal>,
}

/// Target journal with a local view of its pages.
struct TargetJournal {
    label: String,
    /// `None` while only planned under dry-run.
    journal_id: Option<JournalId>,
    /// Pages present, or copied in this run.
    pages: Vec<PageKey>,
}

impl TargetJournal {
    fn contains(&self, record: &LeafRecord) -> bool {
        let key = PageKey::of(&record.page);
        self.pages.iter().any(|existing| existing.same_record(&key))
    }

    fn remember(&mut self, record: &LeafRecord) {
        self.pages.push(PageKey::of(&record.page));
    }
}

/// Identity of a page for the move resume check.
struct PageKey {
    name: String,
    recipe_id: Option<RecipeId>,
    content: String,
}

impl PageKey {
    fn of(page: &Page) -> Self {
        Self {
            name: normalize_name(&page.name),
            recipe_id: page.recipe_id,
            content: comparable_content(&page.content),
        }
    }

    /// Same name and either the same linked recipe or the same canonical
    /// content.
    fn same_record(&self, other: &PageKey) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.recipe_id, other.recipe_id) {
            (Some(left), Some(right)) => left == right,
            _ => self.content == other.content,
        }
    }
}

/// Canonical block for recipe pages, stripped text otherwise.
fn comparable_content(content: &str) -> String {
    let text = strip_rich_text(content);
    let raw = parse_block(&text);
    if looks_like_recipe(&raw) {
        reconcile(&raw).to_block()
    } else {
        text
    }
}

fn record_failure(
    report: &mut MigrationReport,
    name: &str,
    record_id: impl std::fmt::Display,
    err: StoreError,
) {
    warn!(
        "event=migration_record module=service status=error op={} record_id={}",
        report.operation, record_id
    );
    report.record_error(name, err);
}

/// Rarity-derived skill level, written only when it differs from the stored
/// value (type included).
fn skill_level_patch(item: &Item, view: &ItemFlagsView) -> FlagPatch {
    let mut patch = view.patch();
    if Rarity::parse(&item.rarity).is_none() {
        return patch;
    }
    let Some(derived) = rarity_to_skill_level(&item.rarity, view.skill_level()) else {
        return patch;
    };
    let derived = clamp_skill_level(derived);
    let stored = view.raw(FlagField::SkillLevel).and_then(Value::as_i64);
    if stored != Some(derived) {
        patch.set.insert(
            view.write_key(FlagField::SkillLevel).to_string(),
            json!(derived),
        );
    }
    patch
}

/// Official biome tokens plus any quirk phrases contributed by legacy terms.
fn biome_patch(_item: &Item, view: &ItemFlagsView) -> FlagPatch {
    let mut patch = view.patch();
    let biomes = view.biomes();
    if biomes.is_empty() {
        return patch;
    }
    let remap = legacy_biome_to_official(&biomes);
    if !remap.changed {
        return patch;
    }

    let stored = view.raw(FlagField::Biomes);
    let remapped = json!(remap.biomes);
    if stored != Some(&remapped) {
        patch
            .set
            .insert(view.write_key(FlagField::Biomes).to_string(), remapped);
    }
    if !remap.quirks.is_empty() {
        let merged = merge_quirk(view.quirk(), &remap.quirks);
        if merged != view.quirk() {
            patch
                .set
                .insert(view.write_key(FlagField::Quirk).to_string(), json!(merged));
        }
    }
    patch
}

fn component_type_patch(_item: &Item, view: &ItemFlagsView) -> FlagPatch {
    let mut patch = view.patch();
    patch.unset = view
        .present_keys(FlagField::ComponentType)
        .into_iter()
        .map(str::to_string)
        .collect();
    patch
}
