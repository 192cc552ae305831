//! Per-run engine configuration.
//!
//! # Responsibility
//! - Read host settings once at the start of a run.
//! - Derive the traversal scope and recipe source precedence.
//!
//! # Invariants
//! - A built `EngineConfig` is immutable for the duration of a run.
//! - Empty compendium slots are ignored.

use crate::service::traversal::TraversalScope;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

const RECIPE_FOLDER_KEY: &str = "recipeJournalFolder";
const STORAGE_SOURCE_KEY: &str = "recipeStorageSource";
const RECIPE_SLOTS_KEY: &str = "numRecipeCompendiums";
const RECIPE_SLOT_PREFIX: &str = "recipeCompendium";
const INGREDIENT_SLOTS_KEY: &str = "numIngredientCompendiums";
const INGREDIENT_SLOT_PREFIX: &str = "ingredientCompendium";

/// Errors raised while building configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Settings text is not valid JSON of the expected shape.
    InvalidJson(serde_json::Error),
    /// `recipeStorageSource` has an unknown value.
    UnknownStorageSource(String),
    /// A slot count is not a non-negative integer.
    InvalidSlotCount { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "invalid settings json: {err}"),
            Self::UnknownStorageSource(value) => write!(
                f,
                "unknown recipe storage source `{value}`; expected world-only|compendia-only|compendia-then-world|world-then-compendia"
            ),
            Self::InvalidSlotCount { key, value } => {
                write!(f, "`{key}` must be a non-negative integer, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(value)
    }
}

/// One place structured recipes are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeSource {
    World,
    Compendia,
}

/// Where structured recipes are read from, in precedence order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecipeStorageSource {
    #[serde(alias = "worldOnly")]
    WorldOnly,
    #[serde(alias = "compendiaOnly")]
    CompendiaOnly,
    #[serde(alias = "compendiaThenWorld")]
    CompendiaThenWorld,
    #[default]
    #[serde(alias = "worldThenCompendia")]
    WorldThenCompendia,
}

impl RecipeStorageSource {
    /// Parses a kebab-case or camelCase value.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        serde_json::from_value(Value::String(value.trim().to_string()))
            .map_err(|_| ConfigError::UnknownStorageSource(value.to_string()))
    }

    /// Sources in precedence order.
    pub fn sources(self) -> &'static [RecipeSource] {
        match self {
            Self::WorldOnly => &[RecipeSource::World],
            Self::CompendiaOnly => &[RecipeSource::Compendia],
            Self::CompendiaThenWorld => &[RecipeSource::Compendia, RecipeSource::World],
            Self::WorldThenCompendia => &[RecipeSource::World, RecipeSource::Compendia],
        }
    }

    pub fn reads_compendia(self) -> bool {
        self.sources().contains(&RecipeSource::Compendia)
    }
}

/// Engine configuration, built once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Folder name or id scoping page traversal; empty means no filter.
    pub recipe_journal_folder: String,
    pub recipe_storage_source: RecipeStorageSource,
    pub recipe_compendiums: Vec<String>,
    pub ingredient_compendiums: Vec<String>,
}

impl EngineConfig {
    /// Builds configuration from the host's flat settings map.
    ///
    /// Compendium ids are read from indexed slots
    /// (`recipeCompendium1..N`) bounded by the matching count key.
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self, ConfigError> {
        let recipe_journal_folder = settings
            .get(RECIPE_FOLDER_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let recipe_storage_source = match settings.get(STORAGE_SOURCE_KEY).and_then(Value::as_str)
        {
            Some(value) if !value.trim().is_empty() => RecipeStorageSource::parse(value)?,
            _ => RecipeStorageSource::default(),
        };

        Ok(Self {
            recipe_journal_folder,
            recipe_storage_source,
            recipe_compendiums: read_slots(settings, RECIPE_SLOTS_KEY, RECIPE_SLOT_PREFIX)?,
            ingredient_compendiums: read_slots(
                settings,
                INGREDIENT_SLOTS_KEY,
                INGREDIENT_SLOT_PREFIX,
            )?,
        })
    }

    /// Parses settings JSON: either a flat settings map (detected by any
    /// slot-count key) or the structured camelCase form.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Map<String, Value> = serde_json::from_str(text)?;
        if settings.contains_key(RECIPE_SLOTS_KEY) || settings.contains_key(INGREDIENT_SLOTS_KEY)
        {
            return Self::from_settings(&settings);
        }
        Ok(serde_json::from_value(Value::Object(settings))?)
    }

    /// Traversal scope for page migrations.
    pub fn recipe_scope(&self) -> TraversalScope {
        if self.recipe_journal_folder.trim().is_empty() {
            TraversalScope::All
        } else {
            TraversalScope::Folder(self.recipe_journal_folder.trim().to_string())
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute and count, but issue no mutation.
    pub dry_run: bool,
}

fn read_slots(
    settings: &Map<String, Value>,
    count_key: &'static str,
    prefix: &str,
) -> Result<Vec<String>, ConfigError> {
    let count = match settings.get(count_key) {
        None | Some(Value::Null) => 0,
        Some(Value::Number(number)) => number.as_u64().ok_or_else(|| {
            ConfigError::InvalidSlotCount {
                key: count_key,
                value: number.to_string(),
            }
        })?,
        Some(Value::String(text)) => {
            text.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSlotCount {
                    key: count_key,
                    value: text.clone(),
                })?
        }
        Some(other) => {
            return Err(ConfigError::InvalidSlotCount {
                key: count_key,
                value: other.to_string(),
            })
        }
    };

    let mut slots: Vec<(u64, &str)> = settings
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(prefix)?.parse::<u64>().ok()?;
            let value = value.as_str()?.trim();
            (1..=count).contains(&index).then_some((index, value))
        })
        .filter(|(_, value)| !value.is_empty())
        .collect();
    slots.sort_unstable_by_key(|(index, _)| *index);
    Ok(slots
        .into_iter()
        .map(|(_, value)| value.to_string())
        .collect())
}
