//! Field reconciler: raw (possibly legacy) mapping -> canonical record.
//!
//! # Responsibility
//! - Copy legacy field names onto canonical ones.
//! - Derive `time` from `workHours` when `time` is unset.
//! - Clamp/normalize enumerated and numeric values.
//! - Emit the full canonical skeleton plus present meta fields.
//!
//! # Invariants
//! - Existing `time` values are never overwritten by derivation.
//! - Meta fields are emitted only when present in the input.
//! - `reconcile(reconcile(x).to_field_map()) == reconcile(x)`.

use crate::model::recipe::{
    FieldMap, RecipeRecord, CANONICAL_FIELDS, INGREDIENTS_FIELD, META_FIELDS,
};
use crate::tables::{
    canonical_field_for_legacy, clamp_skill_level, rarity_to_skill_level,
    skill_level_to_success_dc, work_hours_to_seconds, Rarity, LEGACY_FIELD_RENAMES,
};
use once_cell::sync::Lazy;
use regex::Regex;

static LIST_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])(?:\s|$)").expect("valid list marker regex"));

const LIST_ITEM_PREFIX: &str = "- ";

/// Reconciles a raw mapping into a canonical `RecipeRecord`.
pub fn reconcile(raw: &FieldMap) -> RecipeRecord {
    let mut fields = raw.clone();
    apply_legacy_renames(raw, &mut fields);
    derive_time(&mut fields);
    normalize_rarity(&mut fields);
    normalize_skill_level(&mut fields);
    fill_success_dc(&mut fields);

    let canonical = CANONICAL_FIELDS
        .iter()
        .map(|key| {
            let value = fields.get(key).unwrap_or_default();
            let value = if *key == INGREDIENTS_FIELD {
                normalize_ingredients(value)
            } else {
                normalize_text(value)
            };
            (*key, value)
        })
        .collect();

    let meta = META_FIELDS
        .iter()
        .filter_map(|key| fields.get(key).map(|value| (*key, normalize_text(value))))
        .collect();

    RecipeRecord::from_parts(canonical, meta)
}

/// Returns whether a parsed mapping carries any recipe field at all.
///
/// Pages without one are not recipe blocks and are skipped by migrations.
pub fn looks_like_recipe(fields: &FieldMap) -> bool {
    fields.iter().any(|(key, _)| {
        CANONICAL_FIELDS.iter().any(|field| *field == key)
            || canonical_field_for_legacy(key).is_some()
    })
}

fn apply_legacy_renames(raw: &FieldMap, fields: &mut FieldMap) {
    for (legacy, canonical) in LEGACY_FIELD_RENAMES {
        if let Some(value) = raw.get(legacy) {
            if !raw.contains_key(canonical) {
                fields.insert(*canonical, value);
            }
        }
    }
}

fn derive_time(fields: &mut FieldMap) {
    if fields.get_non_empty("time").is_some() {
        return;
    }
    let seconds = fields
        .get_non_empty("workHours")
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(work_hours_to_seconds);
    if let Some(seconds) = seconds {
        fields.insert("time", seconds.to_string());
    }
}

fn normalize_rarity(fields: &mut FieldMap) {
    let parsed = fields.get_non_empty("rarity").and_then(Rarity::parse);
    if let Some(rarity) = parsed {
        fields.insert("rarity", rarity.as_str());
    }
}

fn normalize_skill_level(fields: &mut FieldMap) {
    match fields.get_non_empty("skillLevel") {
        Some(value) => {
            if let Ok(level) = value.trim().parse::<i64>() {
                fields.insert("skillLevel", clamp_skill_level(level).to_string());
            }
        }
        None => {
            let derived = fields
                .get_non_empty("rarity")
                .filter(|value| Rarity::parse(value).is_some())
                .and_then(|value| rarity_to_skill_level(value, None));
            if let Some(level) = derived {
                fields.insert("skillLevel", level.to_string());
            }
        }
    }
}

/// Fills a present-but-empty `dc` from the skill level.
fn fill_success_dc(fields: &mut FieldMap) {
    if fields.get("dc").map(str::trim) != Some("") {
        return;
    }
    let level = fields
        .get_non_empty("skillLevel")
        .and_then(|value| value.trim().parse::<i64>().ok());
    if let Some(level) = level {
        fields.insert("dc", skill_level_to_success_dc(level).to_string());
    }
}

fn normalize_text(value: &str) -> String {
    value
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn normalize_ingredients(value: &str) -> String {
    value
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            if LIST_MARKER_RE.is_match(line) {
                line.to_string()
            } else {
                format!("{LIST_ITEM_PREFIX}{}", line.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{looks_like_recipe, reconcile};
    use crate::block::parser::parse_block;
    use crate::model::recipe::{FieldMap, CANONICAL_FIELDS};

    fn map(entries: &[(&str, &str)]) -> FieldMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn output_has_full_canonical_skeleton_in_order() {
        let record = reconcile(&map(&[("skill", "Alchemy"), ("name", "Ember Salve")]));
        let keys: Vec<&str> = record.fields().map(|(key, _)| key).collect();
        assert_eq!(keys, CANONICAL_FIELDS.to_vec());
        assert_eq!(record.get("toolName"), Some(""));
        assert_eq!(record.name(), "Ember Salve");
    }

    #[test]
    fn legacy_tool_copies_to_tool_name_when_absent() {
        let record = reconcile(&map(&[("name", "A"), ("tool", "Mortar")]));
        assert_eq!(record.get("toolName"), Some("Mortar"));
        assert_eq!(record.get("tool"), None);
    }

    #[test]
    fn legacy_tool_does_not_override_canonical() {
        let record = reconcile(&map(&[("tool", "Mortar"), ("toolName", "")]));
        assert_eq!(record.get("toolName"), Some(""));
    }

    #[test]
    fn time_derives_from_work_hours() {
        let bucket = reconcile(&map(&[("workHours", "8")]));
        assert_eq!(bucket.get("time"), Some("28800"));
        let day = reconcile(&map(&[("workHours", "24"), ("time", "")]));
        assert_eq!(day.get("time"), Some("86400"));
        let odd = reconcile(&map(&[("workHours", "11")]));
        assert_eq!(odd.get("time"), Some("39600"));
    }

    #[test]
    fn existing_time_is_never_overwritten() {
        let record = reconcile(&map(&[("workHours", "8"), ("time", "600")]));
        assert_eq!(record.get("time"), Some("600"));
    }

    #[test]
    fn meta_fields_only_when_present() {
        let without = reconcile(&map(&[("name", "A")]));
        assert!(without.meta_keys().is_empty());

        let with = reconcile(&map(&[("isHomebrew", "true"), ("name", "A"), ("rarity", "Very Rare")]));
        assert_eq!(with.meta_keys(), vec!["rarity", "isHomebrew"]);
        assert_eq!(with.get("rarity"), Some("very rare"));
    }

    #[test]
    fn skill_level_is_clamped_and_derived_from_rarity() {
        let clamped = reconcile(&map(&[("skillLevel", "37")]));
        assert_eq!(clamped.get("skillLevel"), Some("20"));

        let derived = reconcile(&map(&[("rarity", "uncommon"), ("skillLevel", "")]));
        assert_eq!(derived.get("skillLevel"), Some("6"));

        let text = reconcile(&map(&[("skillLevel", "expert")]));
        assert_eq!(text.get("skillLevel"), Some("expert"));
    }

    #[test]
    fn empty_dc_is_filled_from_skill_level() {
        let record = reconcile(&map(&[("skillLevel", "12"), ("dc", "")]));
        assert_eq!(record.get("dc"), Some("12"));

        let kept = reconcile(&map(&[("skillLevel", "12"), ("dc", "25")]));
        assert_eq!(kept.get("dc"), Some("25"));
    }

    #[test]
    fn ingredients_get_uniform_list_prefix() {
        let record = reconcile(&map(&[("ingredients", "\nSalt\n- Water\n\n  * Ash\n2) Ember")]));
        assert_eq!(
            record.get("ingredients"),
            Some("- Salt\n- Water\n  * Ash\n2) Ember")
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let raw = parse_block(
            "name: Ember Salve\ntool: Mortar\nworkHours: 11\nrarity: Rare\ndc:\ningredients:\nSalt\n- Water\ndescription: Warm.\n  Apply twice.",
        );
        let once = reconcile(&raw);
        let twice = reconcile(&once.to_field_map());
        assert_eq!(once, twice);
    }

    #[test]
    fn serialized_block_reparses_to_same_record() {
        let raw = parse_block("name: A\nheat:\ningredients:\n- Salt\n- Water\ndescription: One\n  Two\nproductValue: 5");
        let record = reconcile(&raw);
        let block = record.to_block();
        let reparsed = reconcile(&parse_block(&block));
        assert_eq!(reparsed, record);
        assert_eq!(reparsed.to_block(), block);
        assert!(block.contains("\nheat:\n"));
        assert!(block.contains("\ningredients:\n- Salt\n- Water\n"));
        assert!(block.ends_with("productValue: 5"));
    }

    #[test]
    fn looks_like_recipe_needs_a_known_field() {
        assert!(looks_like_recipe(&map(&[("tool", "Mortar")])));
        assert!(looks_like_recipe(&map(&[("name", "A")])));
        assert!(!looks_like_recipe(&map(&[("author", "Someone")])));
    }
}
