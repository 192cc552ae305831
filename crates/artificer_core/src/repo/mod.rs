//! Document-store accessor and recipe cache.
//!
//! # Responsibility
//! - Define the accessor contract the migration engine runs against.
//! - Isolate SQLite query details from orchestration.
//!
//! # Invariants
//! - Accessor APIs return semantic errors (`NotFound`, `ReadOnly`) in
//!   addition to DB transport errors.

pub mod recipe_cache;
pub mod store_repo;
