//! Resolved view over the two legacy item flag namespaces.
//!
//! Items store crafting metadata either in the namespaced bag
//! (`flags["artificer-crafting"]`) or in the bare legacy bag
//! (`flags["artificer"]`). Reads project whichever bag is populated; writes
//! always target the bag the item already uses.
//!
//! # Invariants
//! - Resolution never introduces a second bag on an item.
//! - Writes reuse the key spelling already present inside the bag.

use crate::model::document::FlagPatch;
use serde_json::{Map, Value};

/// Scope key of the namespaced flag bag.
pub const NAMESPACED_SCOPE: &str = "artificer-crafting";
/// Scope key of the bare legacy flag bag.
pub const LEGACY_SCOPE: &str = "artificer";

/// Which flag bag an item uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagNamespace {
    Namespaced,
    Legacy,
}

impl FlagNamespace {
    pub fn scope(self) -> &'static str {
        match self {
            Self::Namespaced => NAMESPACED_SCOPE,
            Self::Legacy => LEGACY_SCOPE,
        }
    }
}

/// Logical flag fields with per-namespace key spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagField {
    SkillLevel,
    Biomes,
    Quirk,
    ComponentType,
}

impl FlagField {
    /// Key spellings, preferred first, for one namespace.
    fn keys(self, namespace: FlagNamespace) -> &'static [&'static str] {
        match (self, namespace) {
            (Self::SkillLevel, FlagNamespace::Namespaced) => {
                &["artificerSkillLevel", "skillLevel"]
            }
            (Self::SkillLevel, FlagNamespace::Legacy) => &["skillLevel", "artificerSkillLevel"],
            (Self::Biomes, _) => &["biomes"],
            (Self::Quirk, _) => &["quirk"],
            (Self::ComponentType, _) => &["componentType"],
        }
    }
}

/// Read-time projection of an item's crafting flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFlagsView {
    namespace: FlagNamespace,
    bag: Map<String, Value>,
}

impl ItemFlagsView {
    /// Picks the populated bag. The namespaced bag wins when both are
    /// populated; an empty bag is used only when it is the sole one present.
    pub fn resolve(flags: &Value) -> Option<Self> {
        let namespaced = flags.get(NAMESPACED_SCOPE).and_then(Value::as_object);
        let legacy = flags.get(LEGACY_SCOPE).and_then(Value::as_object);
        let (namespace, bag) = match (namespaced, legacy) {
            (Some(bag), _) if !bag.is_empty() => (FlagNamespace::Namespaced, bag),
            (_, Some(bag)) if !bag.is_empty() => (FlagNamespace::Legacy, bag),
            (Some(bag), _) => (FlagNamespace::Namespaced, bag),
            (None, Some(bag)) => (FlagNamespace::Legacy, bag),
            (None, None) => return None,
        };
        Some(Self {
            namespace,
            bag: bag.clone(),
        })
    }

    pub fn namespace(&self) -> FlagNamespace {
        self.namespace
    }

    /// Key to write for `field`: the spelling already in the bag, otherwise
    /// the namespace's preferred spelling.
    pub fn write_key(&self, field: FlagField) -> &'static str {
        let keys = field.keys(self.namespace);
        keys.iter()
            .copied()
            .find(|key| self.bag.contains_key(*key))
            .unwrap_or(keys[0])
    }

    /// Raw stored value of `field`, in any spelling.
    pub fn raw(&self, field: FlagField) -> Option<&Value> {
        field
            .keys(self.namespace)
            .iter()
            .find_map(|key| self.bag.get(*key))
    }

    /// Stored skill level; `None` when missing or non-numeric.
    pub fn skill_level(&self) -> Option<i64> {
        match self.raw(FlagField::SkillLevel)? {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.round() as i64)),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Biome tokens from an array or a comma-separated string.
    pub fn biomes(&self) -> Vec<String> {
        match self.raw(FlagField::Biomes) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn quirk(&self) -> &str {
        self.raw(FlagField::Quirk)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Every spelling of `field` present in the bag.
    pub fn present_keys(&self, field: FlagField) -> Vec<&'static str> {
        field
            .keys(self.namespace)
            .iter()
            .copied()
            .filter(|key| self.bag.contains_key(*key))
            .collect()
    }

    /// Starts a patch targeting this item's bag.
    pub fn patch(&self) -> FlagPatch {
        FlagPatch::new(self.namespace.scope())
    }
}

#[cfg(test)]
mod tests {
    use super::{FlagField, FlagNamespace, ItemFlagsView, LEGACY_SCOPE};
    use serde_json::json;

    #[test]
    fn resolves_namespaced_bag() {
        let flags = json!({
            "artificer-crafting": { "artificerType": "component", "artificerSkillLevel": 4 }
        });
        let view = ItemFlagsView::resolve(&flags).expect("bag should resolve");
        assert_eq!(view.namespace(), FlagNamespace::Namespaced);
        assert_eq!(view.skill_level(), Some(4));
        assert_eq!(view.write_key(FlagField::SkillLevel), "artificerSkillLevel");
    }

    #[test]
    fn resolves_legacy_bag_and_targets_it_for_writes() {
        let flags = json!({ "artificer": { "type": "reagent", "skillLevel": "7" } });
        let view = ItemFlagsView::resolve(&flags).expect("legacy bag should resolve");
        assert_eq!(view.namespace(), FlagNamespace::Legacy);
        assert_eq!(view.skill_level(), Some(7));
        assert_eq!(view.write_key(FlagField::SkillLevel), "skillLevel");
        assert_eq!(view.patch().scope, LEGACY_SCOPE);
    }

    #[test]
    fn write_key_reuses_alternate_spelling_already_present() {
        let flags = json!({ "artificer": { "artificerSkillLevel": 2 } });
        let view = ItemFlagsView::resolve(&flags).unwrap();
        assert_eq!(view.skill_level(), Some(2));
        assert_eq!(view.write_key(FlagField::SkillLevel), "artificerSkillLevel");
    }

    #[test]
    fn populated_legacy_bag_wins_over_empty_namespaced_bag() {
        let flags = json!({ "artificer-crafting": {}, "artificer": { "biomes": "forest, cave" } });
        let view = ItemFlagsView::resolve(&flags).unwrap();
        assert_eq!(view.namespace(), FlagNamespace::Legacy);
        assert_eq!(view.biomes(), vec!["forest".to_string(), "cave".to_string()]);
    }

    #[test]
    fn missing_bags_do_not_resolve() {
        assert!(ItemFlagsView::resolve(&json!({ "core": {} })).is_none());
        assert!(ItemFlagsView::resolve(&json!(null)).is_none());
    }

    #[test]
    fn non_numeric_skill_level_reads_as_none() {
        let flags = json!({ "artificer": { "skillLevel": "expert" } });
        let view = ItemFlagsView::resolve(&flags).unwrap();
        assert_eq!(view.skill_level(), None);
    }
}
