//! Recipe and item schema normalization and migration engine.
//! Parses recipe blocks, reconciles them to the canonical schema, and
//! migrates pages and items inside a hierarchical document store.

pub mod block;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tables;

pub use block::parser::parse_block;
pub use block::reconcile::{looks_like_recipe, reconcile};
pub use block::rich_text::strip_rich_text;
pub use config::{ConfigError, EngineConfig, RecipeStorageSource, RunOptions};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{
    FlagPatch, Folder, FolderId, Item, ItemId, Journal, JournalId, NewPage, Pack, PackKind, Page,
    PageId, PagePatch, RecipeId,
};
pub use model::flags::{FlagField, FlagNamespace, ItemFlagsView};
pub use model::recipe::{FieldMap, RecipeRecord, CANONICAL_FIELDS, META_FIELDS};
pub use repo::recipe_cache::{insert_recipe, RecipeCache, SqliteRecipeCache, StructuredRecipe};
pub use repo::store_repo::{DocumentStore, SqliteDocumentStore, StoreError, StoreResult};
pub use service::migration_service::{MigrationOp, MigrationService};
pub use service::report::{MigrationReport, RecordError, ReportCounts};
pub use service::traversal::TraversalScope;
pub use service::MigrationError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
