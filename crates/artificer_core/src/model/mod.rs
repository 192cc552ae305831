//! Domain model for recipe records, item flags and the document hierarchy.
//!
//! # Responsibility
//! - Define the canonical recipe field set and its fixed order.
//! - Define the resolved view over the two item flag namespaces.
//! - Define folder/journal/page/item read models and mutation patches.
//!
//! # Invariants
//! - Canonical recipe output always carries every canonical field.
//! - A page is owned by exactly one journal at a time.

pub mod document;
pub mod flags;
pub mod recipe;
