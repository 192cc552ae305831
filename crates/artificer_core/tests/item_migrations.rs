use artificer_core::db::open_db_in_memory;
use artificer_core::{
    EngineConfig, ItemId, MigrationError, MigrationOp, MigrationReport, MigrationService, PackKind,
    RunOptions, SqliteDocumentStore, SqliteRecipeCache,
};
use rusqlite::Connection;
use serde_json::{json, Value};

const APPLY: RunOptions = RunOptions { dry_run: false };

fn run(conn: &Connection, config: EngineConfig, op: MigrationOp) -> MigrationReport {
    try_run(conn, config, op).unwrap()
}

fn try_run(
    conn: &Connection,
    config: EngineConfig,
    op: MigrationOp,
) -> Result<MigrationReport, MigrationError> {
    let store = SqliteDocumentStore::try_new(conn).unwrap();
    let cache = SqliteRecipeCache::new(conn, &config);
    MigrationService::new(store, cache, config).run(&op, APPLY)
}

fn create_item(conn: &Connection, pack_id: Option<&str>, rarity: &str, flags: Value) -> ItemId {
    let store = SqliteDocumentStore::try_new(conn).unwrap();
    store
        .create_item(pack_id, "Ashroot", rarity, &flags)
        .unwrap()
        .item_id
}

fn flags_of(conn: &Connection, item_id: ItemId) -> Value {
    let store = SqliteDocumentStore::try_new(conn).unwrap();
    store.get_item(item_id).unwrap().unwrap().flags
}

#[test]
fn legacy_namespace_is_written_back_in_place() {
    let conn = open_db_in_memory().unwrap();
    let legacy = create_item(
        &conn,
        None,
        "rare",
        json!({ "artificer": { "type": "reagent", "skillLevel": 2 } }),
    );
    let namespaced = create_item(
        &conn,
        None,
        "uncommon",
        json!({ "artificer-crafting": { "artificerType": "reagent", "artificerSkillLevel": 0 } }),
    );

    let report = run(&conn, EngineConfig::default(), MigrationOp::MigrateItemSkillLevels);
    assert_eq!(report.updated, 2);

    assert_eq!(
        flags_of(&conn, legacy),
        json!({ "artificer": { "type": "reagent", "skillLevel": 12 } })
    );
    assert_eq!(
        flags_of(&conn, namespaced),
        json!({ "artificer-crafting": { "artificerType": "reagent", "artificerSkillLevel": 6 } })
    );

    let again = run(&conn, EngineConfig::default(), MigrationOp::MigrateItemSkillLevels);
    assert_eq!(again.updated, 0);
    assert_eq!(again.skipped, 2);
}

#[test]
fn common_items_keep_sticky_zero() {
    let conn = open_db_in_memory().unwrap();
    let zero = create_item(&conn, None, "Common", json!({ "artificer": { "skillLevel": 0 } }));
    let five = create_item(&conn, None, "common", json!({ "artificer": { "skillLevel": 5 } }));
    let unknown = create_item(&conn, None, "mythic", json!({ "artificer": { "skillLevel": 9 } }));

    let report = run(&conn, EngineConfig::default(), MigrationOp::MigrateItemSkillLevels);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(flags_of(&conn, zero)["artificer"]["skillLevel"], json!(0));
    assert_eq!(flags_of(&conn, five)["artificer"]["skillLevel"], json!(1));
    assert_eq!(flags_of(&conn, unknown)["artificer"]["skillLevel"], json!(9));
}

#[test]
fn biomes_are_remapped_once_and_official_lists_are_untouched() {
    let conn = open_db_in_memory().unwrap();
    let legacy = create_item(
        &conn,
        None,
        "",
        json!({ "artificer": { "biomes": "volcano, Forest", "quirk": "" } }),
    );
    let official = create_item(
        &conn,
        None,
        "",
        json!({ "artificer-crafting": { "biomes": "Forest, swamp" } }),
    );

    let report = run(&conn, EngineConfig::default(), MigrationOp::MigrateItemBiomes);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);

    let flags = flags_of(&conn, legacy);
    assert_eq!(flags["artificer"]["biomes"], json!(["mountain", "Forest"]));
    assert_eq!(flags["artificer"]["quirk"], json!("Volcanic"));
    assert!(flags.get("artificer-crafting").is_none());
    assert_eq!(
        flags_of(&conn, official),
        json!({ "artificer-crafting": { "biomes": "Forest, swamp" } })
    );

    let again = run(&conn, EngineConfig::default(), MigrationOp::MigrateItemBiomes);
    assert_eq!(again.updated, 0);
}

#[test]
fn component_type_is_removed_from_world_and_configured_compendium_items() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::try_new(&conn).unwrap();
    store
        .create_pack("artificer.ingredients", "Ingredients", PackKind::Item, false)
        .unwrap();
    store
        .create_pack("artificer.locked", "Locked", PackKind::Item, true)
        .unwrap();
    store
        .create_pack("other.items", "Other", PackKind::Item, false)
        .unwrap();

    let flags = json!({ "artificer": { "type": "reagent", "componentType": "herb" } });
    let world = create_item(&conn, None, "", flags.clone());
    let configured = create_item(&conn, Some("artificer.ingredients"), "", flags.clone());
    let locked = create_item(&conn, Some("artificer.locked"), "", flags.clone());
    let unconfigured = create_item(&conn, Some("other.items"), "", flags.clone());
    create_item(&conn, None, "", json!({ "core": { "sourceId": "x" } }));

    let config = EngineConfig {
        ingredient_compendiums: vec![
            "artificer.ingredients".to_string(),
            "artificer.locked".to_string(),
        ],
        ..EngineConfig::default()
    };
    let report = run(&conn, config, MigrationOp::RemoveComponentType);
    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 2);

    let stripped = json!({ "artificer": { "type": "reagent" } });
    assert_eq!(flags_of(&conn, world), stripped);
    assert_eq!(flags_of(&conn, configured), stripped);
    assert_eq!(flags_of(&conn, locked), flags);
    assert_eq!(flags_of(&conn, unconfigured), flags);
}

#[test]
fn missing_ingredient_compendium_is_fatal() {
    let conn = open_db_in_memory().unwrap();
    let item = create_item(&conn, None, "", json!({ "artificer": { "componentType": "x" } }));

    let config = EngineConfig {
        ingredient_compendiums: vec!["missing.pack".to_string()],
        ..EngineConfig::default()
    };
    let err = try_run(&conn, config, MigrationOp::RemoveComponentType).unwrap_err();
    assert!(matches!(err, MigrationError::CollectionNotFound(pack) if pack == "missing.pack"));
    assert_eq!(
        flags_of(&conn, item),
        json!({ "artificer": { "componentType": "x" } })
    );
}
