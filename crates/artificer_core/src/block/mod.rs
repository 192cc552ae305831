//! Recipe block parsing and canonical reconciliation.
//!
//! # Responsibility
//! - Parse `key: value` text blocks into ordered raw field mappings.
//! - Reconcile raw (possibly legacy) mappings into canonical records.
//! - Strip rich-text markup before parsing or scanning page content.
//!
//! # Invariants
//! - Parsing never fails; malformed lines degrade to best-effort extraction.
//! - `reconcile` is idempotent over its own output.

pub mod parser;
pub mod reconcile;
pub mod rich_text;
