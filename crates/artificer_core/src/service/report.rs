//! Aggregated migration run report.

use serde::Serialize;

/// One per-record failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    /// Record identity (page or item name).
    pub name: String,
    pub error: String,
}

/// Counts and per-record errors returned to the operator surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub operation: String,
    pub dry_run: bool,
    /// Records rewritten in place.
    pub updated: usize,
    /// Records left untouched (already canonical, unclassified, read-only).
    pub skipped: usize,
    /// Records already in their target grouping.
    pub kept: usize,
    /// Records copied into a different grouping.
    pub moved: usize,
    /// Folders and journals created for target groupings.
    pub created: usize,
    /// Records deleted (duplicates, or move sources).
    pub deleted: usize,
    /// Records with no associated structured recipe.
    pub not_in_data: usize,
    pub errors: Vec<RecordError>,
}

/// Count-only projection, comparable across dry-run and apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCounts {
    pub updated: usize,
    pub skipped: usize,
    pub kept: usize,
    pub moved: usize,
    pub created: usize,
    pub deleted: usize,
    pub not_in_data: usize,
    pub errors: usize,
}

impl MigrationReport {
    pub fn new(operation: &str, dry_run: bool) -> Self {
        Self {
            operation: operation.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_error(&mut self, name: impl Into<String>, error: impl ToString) {
        self.errors.push(RecordError {
            name: name.into(),
            error: error.to_string(),
        });
    }

    pub fn counts(&self) -> ReportCounts {
        ReportCounts {
            updated: self.updated,
            skipped: self.skipped,
            kept: self.kept,
            moved: self.moved,
            created: self.created,
            deleted: self.deleted,
            not_in_data: self.not_in_data,
            errors: self.errors.len(),
        }
    }

    /// Number of mutations the run issued (or would issue under dry-run).
    pub fn mutations(&self) -> usize {
        self.updated + self.moved + self.created + self.deleted
    }
}
