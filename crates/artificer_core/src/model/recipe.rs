//! Recipe record model and canonical block serialization.
//!
//! # Responsibility
//! - Hold the ordered raw field mapping produced by the block parser.
//! - Hold the reconciled `RecipeRecord` in canonical field order.
//! - Serialize records back into the durable `key: value` block format.
//!
//! # Invariants
//! - `RecipeRecord` always contains every canonical field, in order.
//! - Unset canonical fields serialize as `key:` with no value.
//! - Meta fields are only present when they were present in the input.

/// Canonical recipe fields, in serialized order.
pub const CANONICAL_FIELDS: &[&str] = &[
    "name",
    "resultItemName",
    "type",
    "category",
    "skill",
    "skillLevel",
    "workstation",
    "toolName",
    "apparatusName",
    "containerName",
    "processType",
    "processLevel",
    "heat",
    "time",
    "goldCost",
    "workHours",
    "ingredients",
    "tags",
    "description",
    "source",
    "license",
];

/// Provenance/meta fields appended after the canonical skeleton when present.
pub const META_FIELDS: &[&str] = &["dc", "productValue", "rarity", "isHomebrew"];

/// Field whose continuation lines may be unindented list items.
pub const INGREDIENTS_FIELD: &str = "ingredients";

/// Ordered key/value mapping. Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value when present and not blank.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Reconciled recipe in canonical shape.
///
/// Constructed by the field reconciler; the canonical skeleton is always
/// complete, so lookups of canonical fields never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRecord {
    canonical: Vec<(&'static str, String)>,
    meta: Vec<(&'static str, String)>,
}

impl RecipeRecord {
    /// Builds a record from canonical values (in `CANONICAL_FIELDS` order) and
    /// present meta values (in `META_FIELDS` order).
    pub(crate) fn from_parts(
        canonical: Vec<(&'static str, String)>,
        meta: Vec<(&'static str, String)>,
    ) -> Self {
        debug_assert_eq!(canonical.len(), CANONICAL_FIELDS.len());
        Self { canonical, meta }
    }

    /// Returns a canonical or meta field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.canonical
            .iter()
            .chain(self.meta.iter())
            .find(|(field, _)| *field == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn name(&self) -> &str {
        self.get("name").unwrap_or_default()
    }

    /// Iterates fields in serialized order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.canonical
            .iter()
            .chain(self.meta.iter())
            .map(|(key, value)| (*key, value.as_str()))
    }

    /// Meta field names present on this record.
    pub fn meta_keys(&self) -> Vec<&'static str> {
        self.meta.iter().map(|(key, _)| *key).collect()
    }

    /// Converts back into a raw mapping, e.g. to reconcile again.
    pub fn to_field_map(&self) -> FieldMap {
        self.fields().collect()
    }

    /// Serializes into the durable block format.
    ///
    /// - Empty values render as `key:`.
    /// - `ingredients` always renders one list item per following line.
    /// - Other multi-line values keep their continuation lines verbatim.
    pub fn to_block(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (key, value) in self.fields() {
            if key == INGREDIENTS_FIELD {
                lines.push(format!("{key}:"));
                lines.extend(value.lines().map(str::to_string));
                continue;
            }
            let mut parts = value.split('\n');
            let first = parts.next().unwrap_or_default();
            if first.is_empty() {
                lines.push(format!("{key}:"));
            } else {
                lines.push(format!("{key}: {first}"));
            }
            lines.extend(parts.map(str::to_string));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::FieldMap;

    #[test]
    fn insert_replaces_in_place() {
        let mut map = FieldMap::new();
        map.insert("name", "A");
        map.insert("skill", "Alchemy");
        map.insert("name", "B");
        let keys: Vec<&str> = map.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["name", "skill"]);
        assert_eq!(map.get("name"), Some("B"));
    }

    #[test]
    fn get_non_empty_skips_blank_values() {
        let map: FieldMap = [("time", "  "), ("heat", "3")].into_iter().collect();
        assert_eq!(map.get_non_empty("time"), None);
        assert_eq!(map.get_non_empty("heat"), Some("3"));
        assert!(map.contains_key("time"));
    }
}
