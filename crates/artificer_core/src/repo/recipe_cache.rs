//! Structured recipe cache.
//!
//! # Responsibility
//! - Rebuild the structured recipe list from the `recipes` table.
//! - Honor the configured storage-source precedence.
//!
//! # Invariants
//! - After `refresh`, names are unique by normalized name; the first source
//!   in precedence order wins.
//! - `get_all` never touches storage.

use crate::config::{EngineConfig, RecipeSource};
use crate::model::document::{normalize_name, RecipeId};
use crate::repo::store_repo::{parse_uuid, StoreResult};
use log::debug;
use rusqlite::{params, Connection, Row};
use std::collections::HashSet;

/// Structured recipe row used for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecipe {
    pub recipe_id: RecipeId,
    /// Source collection; `None` means a world recipe.
    pub pack_id: Option<String>,
    pub name: String,
    pub skill: String,
    pub rarity: String,
    pub skill_level: Option<i64>,
}

/// In-memory recipe list with explicit invalidation.
pub trait RecipeCache {
    /// Invalidates and rebuilds from the store.
    fn refresh(&mut self) -> StoreResult<()>;
    /// Current structured recipes.
    fn get_all(&self) -> &[StructuredRecipe];

    /// Looks up one recipe by stable id.
    fn find(&self, recipe_id: RecipeId) -> Option<&StructuredRecipe> {
        self.get_all()
            .iter()
            .find(|recipe| recipe.recipe_id == recipe_id)
    }
}

/// Cache backed by the `recipes` table.
pub struct SqliteRecipeCache<'conn> {
    conn: &'conn Connection,
    sources: Vec<RecipeSource>,
    compendiums: Vec<String>,
    recipes: Vec<StructuredRecipe>,
}

impl<'conn> SqliteRecipeCache<'conn> {
    /// Creates an empty cache; call `refresh` before reading.
    pub fn new(conn: &'conn Connection, config: &EngineConfig) -> Self {
        Self {
            conn,
            sources: config.recipe_storage_source.sources().to_vec(),
            compendiums: config.recipe_compendiums.clone(),
            recipes: Vec::new(),
        }
    }

    fn load_world(&self) -> StoreResult<Vec<StructuredRecipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT recipe_uuid, pack_id, name, skill, rarity, skill_level
             FROM recipes
             WHERE pack_id IS NULL
             ORDER BY name ASC, recipe_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut recipes = Vec::new();
        while let Some(row) = rows.next()? {
            recipes.push(parse_recipe_row(row)?);
        }
        Ok(recipes)
    }

    fn load_pack(&self, pack_id: &str) -> StoreResult<Vec<StructuredRecipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT recipe_uuid, pack_id, name, skill, rarity, skill_level
             FROM recipes
             WHERE pack_id = ?1
             ORDER BY name ASC, recipe_uuid ASC;",
        )?;
        let mut rows = stmt.query([pack_id])?;
        let mut recipes = Vec::new();
        while let Some(row) = rows.next()? {
            recipes.push(parse_recipe_row(row)?);
        }
        Ok(recipes)
    }
}

impl RecipeCache for SqliteRecipeCache<'_> {
    fn refresh(&mut self) -> StoreResult<()> {
        let mut seen = HashSet::new();
        let mut recipes = Vec::new();
        for source in &self.sources {
            let batch = match source {
                RecipeSource::World => self.load_world()?,
                RecipeSource::Compendia => {
                    let mut batch = Vec::new();
                    for pack_id in &self.compendiums {
                        batch.extend(self.load_pack(pack_id)?);
                    }
                    batch
                }
            };
            for recipe in batch {
                if seen.insert(normalize_name(&recipe.name)) {
                    recipes.push(recipe);
                }
            }
        }
        debug!(
            "event=recipe_cache_refresh module=repo status=ok recipes={}",
            recipes.len()
        );
        self.recipes = recipes;
        Ok(())
    }

    fn get_all(&self) -> &[StructuredRecipe] {
        &self.recipes
    }
}

/// Inserts one structured recipe. Authoring path only.
pub fn insert_recipe(conn: &Connection, recipe: &StructuredRecipe) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO recipes (recipe_uuid, pack_id, name, skill, rarity, skill_level)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            recipe.recipe_id.to_string(),
            recipe.pack_id.as_deref(),
            recipe.name,
            recipe.skill,
            recipe.rarity,
            recipe.skill_level,
        ],
    )?;
    Ok(())
}

fn parse_recipe_row(row: &Row<'_>) -> StoreResult<StructuredRecipe> {
    let recipe_uuid_text: String = row.get("recipe_uuid")?;
    Ok(StructuredRecipe {
        recipe_id: parse_uuid(&recipe_uuid_text, "recipes.recipe_uuid")?,
        pack_id: row.get("pack_id")?,
        name: row.get("name")?,
        skill: row.get("skill")?,
        rarity: row.get("rarity")?,
        skill_level: row.get("skill_level")?,
    })
}
