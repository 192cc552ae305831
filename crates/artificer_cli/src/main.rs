//! Operator entry point for artificer migrations.
//!
//! # Responsibility
//! - Open a store file, build the run configuration once, run one migration.
//! - Print the JSON report; exit non-zero only on precondition failures.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use artificer_core::{
    default_log_level, init_logging, open_db, EngineConfig, MigrationOp, MigrationService,
    RunOptions, SqliteDocumentStore, SqliteRecipeCache, TraversalScope,
};
use clap::{Parser, Subcommand};
use log::info;

const DEFAULT_SKILL_FOLDER: &str = "Recipes by Skill";
const DEFAULT_RARITY_FOLDER: &str = "Recipes by Rarity";

#[derive(Parser, Debug)]
#[command(
    name = "artificer",
    version,
    about = "Normalize and migrate recipe pages and item flags"
)]
struct Cli {
    /// SQLite document store file.
    #[arg(long, env = "ARTIFICER_DB")]
    db: PathBuf,

    /// Settings JSON (flat host settings or structured config).
    #[arg(long, env = "ARTIFICER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Traverse this collection instead of the configured folder scope.
    #[arg(long)]
    collection: Option<String>,

    /// Count what would change without writing.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "ARTIFICER_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level; defaults to the build mode's level.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite recipe pages as canonical blocks.
    NormalizeRecipes,
    /// Delete duplicate-name pages within each journal.
    Dedupe,
    /// Move pages into per-skill journals.
    SplitBySkill {
        #[arg(long, default_value = DEFAULT_SKILL_FOLDER)]
        target: String,
    },
    /// Move pages into per-rarity journals.
    SplitByRarity {
        #[arg(long, default_value = DEFAULT_RARITY_FOLDER)]
        target: String,
    },
    /// Derive item skill levels from rarity.
    ItemSkillLevels,
    /// Remap legacy item biomes.
    ItemBiomes,
    /// Remove the deprecated componentType flag.
    RemoveComponentType,
}

impl Command {
    fn into_op(self) -> MigrationOp {
        match self {
            Self::NormalizeRecipes => MigrationOp::NormalizeRecipePages,
            Self::Dedupe => MigrationOp::DeduplicatePages,
            Self::SplitBySkill { target } => MigrationOp::ReorganizeBySkill {
                target_folder: target,
            },
            Self::SplitByRarity { target } => MigrationOp::ReorganizeByRarity {
                target_folder: target,
            },
            Self::ItemSkillLevels => MigrationOp::MigrateItemSkillLevels,
            Self::ItemBiomes => MigrationOp::MigrateItemBiomes,
            Self::RemoveComponentType => MigrationOp::RemoveComponentType,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("initializing logging")?;
    }

    let config = match cli.settings.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            EngineConfig::from_json_str(&text)
                .with_context(|| format!("parsing settings {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    let conn = open_db(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;
    let store = SqliteDocumentStore::try_new(&conn).context("preparing document store")?;
    let cache = SqliteRecipeCache::new(&conn, &config);
    let mut service = MigrationService::new(store, cache, config);
    if let Some(collection) = cli.collection {
        service = service.with_scope(TraversalScope::Collection(collection));
    }

    let op = cli.command.into_op();
    let report = service
        .run(&op, RunOptions {
            dry_run: cli.dry_run,
        })
        .with_context(|| format!("running {}", op.name()))?;

    info!(
        "event=cli_report module=cli status=ok op={} dry_run={} mutations={} errors={}",
        op.name(),
        report.dry_run,
        report.mutations(),
        report.errors.len()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );
    Ok(())
}
