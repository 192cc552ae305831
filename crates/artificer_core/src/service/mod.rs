//! Migration use-case services.
//!
//! # Responsibility
//! - Traverse the document store and classify records.
//! - Orchestrate per-record mutations into an aggregate report.
//!
//! # Invariants
//! - Only precondition failures escape as `MigrationError`; per-record
//!   failures are collected into the report.

use crate::repo::store_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod grouping;
pub mod migration_service;
pub mod report;
pub mod traversal;

/// Fatal run preconditions, raised before any record is processed.
#[derive(Debug)]
pub enum MigrationError {
    /// Scoping folder does not exist.
    ScopeNotFound(String),
    /// Required source collection does not exist.
    CollectionNotFound(String),
    /// Store failure while enumerating records.
    Store(StoreError),
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScopeNotFound(scope) => write!(f, "folder not found: {scope}"),
            Self::CollectionNotFound(pack_id) => write!(f, "collection not found: {pack_id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for MigrationError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
