//! Static lookup tables for legacy-to-current recipe/item migration.
//!
//! # Responsibility
//! - Map rarity to skill level, skill level to success DC, and discrete
//!   work-hour buckets to derived time in seconds.
//! - Map free-text legacy habitat terms to the official biome taxonomy.
//! - Map legacy block field names to canonical field names.
//!
//! # Invariants
//! - Every function here is pure and has no side effects.
//! - Skill levels produced here are always within `[0, 20]`.

use std::collections::HashSet;

/// Lowest valid skill level ("unskilled").
pub const MIN_SKILL_LEVEL: i64 = 0;
/// Highest valid skill level.
pub const MAX_SKILL_LEVEL: i64 = 20;

/// Skill level assumed for derivation when the stored value is missing or
/// non-numeric.
const FALLBACK_SKILL_LEVEL: i64 = 1;

const SECONDS_PER_HOUR: i64 = 3600;

/// Discrete work-hour buckets with fixed derived time.
const WORK_HOUR_BUCKETS: &[(i64, i64)] = &[
    (8, 28_800),
    (24, 86_400),
    (80, 288_000),
    (240, 864_000),
];

/// Legacy block field name -> canonical field name.
pub const LEGACY_FIELD_RENAMES: &[(&str, &str)] = &[
    ("tool", "toolName"),
    ("apparatus", "apparatusName"),
    ("container", "containerName"),
    ("result", "resultItemName"),
    ("station", "workstation"),
];

/// Official biome taxonomy tokens.
pub const OFFICIAL_BIOMES: &[&str] = &[
    "arctic",
    "coastal",
    "desert",
    "forest",
    "grassland",
    "hill",
    "mountain",
    "swamp",
    "underdark",
    "underwater",
    "urban",
];

/// One legacy habitat term and what it becomes.
struct LegacyBiome {
    term: &'static str,
    biomes: &'static [&'static str],
    quirk: Option<&'static str>,
}

const LEGACY_BIOMES: &[LegacyBiome] = &[
    LegacyBiome {
        term: "alpine",
        biomes: &["mountain", "arctic"],
        quirk: None,
    },
    LegacyBiome {
        term: "battlefield",
        biomes: &["grassland", "urban"],
        quirk: Some("Found on old battlefields"),
    },
    LegacyBiome {
        term: "beach",
        biomes: &["coastal"],
        quirk: None,
    },
    LegacyBiome {
        term: "cave",
        biomes: &["underdark"],
        quirk: None,
    },
    LegacyBiome {
        term: "caves",
        biomes: &["underdark"],
        quirk: None,
    },
    LegacyBiome {
        term: "city",
        biomes: &["urban"],
        quirk: None,
    },
    LegacyBiome {
        term: "graveyard",
        biomes: &["urban"],
        quirk: Some("Grows among graves"),
    },
    LegacyBiome {
        term: "hills",
        biomes: &["hill"],
        quirk: None,
    },
    LegacyBiome {
        term: "jungle",
        biomes: &["forest"],
        quirk: Some("Tropical"),
    },
    LegacyBiome {
        term: "lake",
        biomes: &["coastal"],
        quirk: Some("Freshwater"),
    },
    LegacyBiome {
        term: "marsh",
        biomes: &["swamp"],
        quirk: None,
    },
    LegacyBiome {
        term: "mountains",
        biomes: &["mountain"],
        quirk: None,
    },
    LegacyBiome {
        term: "ocean",
        biomes: &["underwater", "coastal"],
        quirk: None,
    },
    LegacyBiome {
        term: "plains",
        biomes: &["grassland"],
        quirk: None,
    },
    LegacyBiome {
        term: "river",
        biomes: &["coastal"],
        quirk: Some("Freshwater"),
    },
    LegacyBiome {
        term: "ruins",
        biomes: &["urban"],
        quirk: Some("Found in ruins"),
    },
    LegacyBiome {
        term: "sea",
        biomes: &["underwater", "coastal"],
        quirk: None,
    },
    LegacyBiome {
        term: "tundra",
        biomes: &["arctic"],
        quirk: None,
    },
    LegacyBiome {
        term: "volcano",
        biomes: &["mountain"],
        quirk: Some("Volcanic"),
    },
];

/// Item rarity tiers recognized by the rarity tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    VeryRare,
    Legendary,
}

impl Rarity {
    /// Parses rarity text, tolerating case, spacing and `veryRare`-style keys.
    pub fn parse(value: &str) -> Option<Self> {
        let compact: String = value
            .chars()
            .filter(|ch| !ch.is_whitespace() && *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match compact.as_str() {
            "common" => Some(Self::Common),
            "uncommon" => Some(Self::Uncommon),
            "rare" => Some(Self::Rare),
            "veryrare" => Some(Self::VeryRare),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }

    /// Canonical lowercase spelling used in serialized blocks.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::VeryRare => "very rare",
            Self::Legendary => "legendary",
        }
    }

    /// Title-cased label used for grouping journals.
    pub fn label(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::VeryRare => "Very Rare",
            Self::Legendary => "Legendary",
        }
    }
}

/// Clamps a skill level into `[0, 20]`.
pub fn clamp_skill_level(level: i64) -> i64 {
    level.clamp(MIN_SKILL_LEVEL, MAX_SKILL_LEVEL)
}

/// Derives time in seconds from a work-hours value.
///
/// Exact buckets {8, 24, 80, 240} use the fixed table; any other positive
/// value is `hours * 3600`. Returns `None` for non-positive or non-finite
/// input.
pub fn work_hours_to_seconds(hours: f64) -> Option<i64> {
    if !hours.is_finite() || hours <= 0.0 {
        return None;
    }
    if hours.fract() == 0.0 {
        let whole = hours as i64;
        if let Some((_, seconds)) = WORK_HOUR_BUCKETS.iter().find(|(h, _)| *h == whole) {
            return Some(*seconds);
        }
    }
    Some((hours * SECONDS_PER_HOUR as f64).round() as i64)
}

/// Derives a skill level from rarity text.
///
/// `current` is the stored skill level (`None` when missing or
/// non-numeric). A stored `0` is sticky for common items; any other
/// current value yields `1` for common. Unrecognized rarity returns
/// `current` unchanged.
pub fn rarity_to_skill_level(rarity: &str, current: Option<i64>) -> Option<i64> {
    let Some(rarity) = Rarity::parse(rarity) else {
        return current;
    };
    let level = match rarity {
        Rarity::Common => {
            if current == Some(MIN_SKILL_LEVEL) {
                MIN_SKILL_LEVEL
            } else {
                FALLBACK_SKILL_LEVEL
            }
        }
        Rarity::Uncommon => 6,
        Rarity::Rare => 12,
        Rarity::VeryRare => 17,
        Rarity::Legendary => 20,
    };
    Some(level)
}

/// Maps a skill level (clamped to `[0, 20]`) to its success DC.
pub fn skill_level_to_success_dc(level: i64) -> i64 {
    match clamp_skill_level(level) {
        0..=3 => 4,
        4..=9 => 8,
        10..=14 => 12,
        15..=19 => 16,
        _ => 18,
    }
}

/// Returns the canonical field for a legacy field name, if any.
pub fn canonical_field_for_legacy(legacy: &str) -> Option<&'static str> {
    LEGACY_FIELD_RENAMES
        .iter()
        .find(|(from, _)| *from == legacy)
        .map(|(_, to)| *to)
}

/// Returns whether `token` is an official biome (case-insensitive).
pub fn is_official_biome(token: &str) -> bool {
    let lowered = token.trim().to_ascii_lowercase();
    OFFICIAL_BIOMES.iter().any(|biome| *biome == lowered)
}

/// Result of remapping one biome list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiomeRemap {
    /// Remapped tokens, deduplicated case-insensitively, in first-seen order.
    pub biomes: Vec<String>,
    /// Quirk phrases contributed by legacy terms, in first-seen order.
    pub quirks: Vec<&'static str>,
    /// False when the input was already composed only of official tokens.
    pub changed: bool,
}

/// Remaps legacy habitat terms onto official biome tokens.
///
/// Official tokens pass through verbatim. Unknown terms are kept verbatim so
/// no data is dropped. When every input token is already official the input
/// is returned untouched with `changed = false`.
pub fn legacy_biome_to_official(tokens: &[String]) -> BiomeRemap {
    if tokens.iter().all(|token| is_official_biome(token)) {
        return BiomeRemap {
            biomes: tokens.to_vec(),
            quirks: Vec::new(),
            changed: false,
        };
    }

    let mut seen = HashSet::new();
    let mut biomes = Vec::new();
    let mut quirks: Vec<&'static str> = Vec::new();
    let mut push = |value: String, biomes: &mut Vec<String>| {
        if seen.insert(value.trim().to_ascii_lowercase()) {
            biomes.push(value);
        }
    };

    for token in tokens {
        let lowered = token.trim().to_ascii_lowercase();
        if is_official_biome(&lowered) {
            push(token.clone(), &mut biomes);
            continue;
        }
        match LEGACY_BIOMES.iter().find(|entry| entry.term == lowered) {
            Some(entry) => {
                for biome in entry.biomes {
                    push((*biome).to_string(), &mut biomes);
                }
                if let Some(quirk) = entry.quirk {
                    if !quirks.contains(&quirk) {
                        quirks.push(quirk);
                    }
                }
            }
            None => push(token.clone(), &mut biomes),
        }
    }

    let changed = biomes != tokens || !quirks.is_empty();
    BiomeRemap {
        biomes,
        quirks,
        changed,
    }
}

/// Appends quirk phrases to free text, skipping phrases already present.
///
/// Phrases are separated by `"; "` and compared case-insensitively.
pub fn merge_quirk(existing: &str, additions: &[&str]) -> String {
    let mut parts: Vec<String> = existing
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    for addition in additions {
        let present = parts
            .iter()
            .any(|part| part.eq_ignore_ascii_case(addition.trim()));
        if !present {
            parts.push(addition.trim().to_string());
        }
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn work_hours_buckets_use_fixed_table() {
        assert_eq!(work_hours_to_seconds(8.0), Some(28_800));
        assert_eq!(work_hours_to_seconds(24.0), Some(86_400));
        assert_eq!(work_hours_to_seconds(80.0), Some(288_000));
        assert_eq!(work_hours_to_seconds(240.0), Some(864_000));
    }

    #[test]
    fn work_hours_outside_buckets_scale_by_hour() {
        assert_eq!(work_hours_to_seconds(11.0), Some(39_600));
        assert_eq!(work_hours_to_seconds(1.5), Some(5_400));
        assert_eq!(work_hours_to_seconds(0.0), None);
        assert_eq!(work_hours_to_seconds(-4.0), None);
    }

    #[test]
    fn rarity_derivation_honors_sticky_zero() {
        assert_eq!(rarity_to_skill_level("uncommon", Some(0)), Some(6));
        assert_eq!(rarity_to_skill_level("common", Some(0)), Some(0));
        assert_eq!(rarity_to_skill_level("common", Some(5)), Some(1));
        assert_eq!(rarity_to_skill_level("common", None), Some(1));
        assert_eq!(rarity_to_skill_level("Very Rare", None), Some(17));
        assert_eq!(rarity_to_skill_level("veryRare", Some(3)), Some(17));
        assert_eq!(rarity_to_skill_level("legendary", Some(2)), Some(20));
    }

    #[test]
    fn unrecognized_rarity_passes_current_through() {
        assert_eq!(rarity_to_skill_level("artifact", Some(9)), Some(9));
        assert_eq!(rarity_to_skill_level("", None), None);
    }

    #[test]
    fn success_dc_bands() {
        assert_eq!(skill_level_to_success_dc(0), 4);
        assert_eq!(skill_level_to_success_dc(3), 4);
        assert_eq!(skill_level_to_success_dc(4), 8);
        assert_eq!(skill_level_to_success_dc(9), 8);
        assert_eq!(skill_level_to_success_dc(10), 12);
        assert_eq!(skill_level_to_success_dc(14), 12);
        assert_eq!(skill_level_to_success_dc(15), 16);
        assert_eq!(skill_level_to_success_dc(19), 16);
        assert_eq!(skill_level_to_success_dc(20), 18);
        assert_eq!(skill_level_to_success_dc(35), 18);
        assert_eq!(skill_level_to_success_dc(-2), 4);
    }

    #[test]
    fn official_biomes_are_left_untouched() {
        let input = tokens(&["Forest", "swamp"]);
        let remap = legacy_biome_to_official(&input);
        assert!(!remap.changed);
        assert_eq!(remap.biomes, input);
        assert!(remap.quirks.is_empty());
    }

    #[test]
    fn legacy_biomes_map_to_official_tokens_with_quirks() {
        let remap = legacy_biome_to_official(&tokens(&["volcano", "alpine", "Mountain"]));
        assert!(remap.changed);
        assert_eq!(remap.biomes, tokens(&["mountain", "arctic"]));
        assert_eq!(remap.quirks, vec!["Volcanic"]);
    }

    #[test]
    fn unknown_legacy_terms_are_kept() {
        let remap = legacy_biome_to_official(&tokens(&["astral sea", "forest"]));
        assert!(!remap.changed);
        assert_eq!(remap.biomes, tokens(&["astral sea", "forest"]));
    }

    #[test]
    fn merge_quirk_deduplicates_in_order() {
        assert_eq!(merge_quirk("", &["Volcanic"]), "Volcanic");
        assert_eq!(
            merge_quirk("Smells of sulfur; volcanic", &["Volcanic", "Tropical"]),
            "Smells of sulfur; volcanic; Tropical"
        );
    }

    #[test]
    fn legacy_field_lookup() {
        assert_eq!(canonical_field_for_legacy("tool"), Some("toolName"));
        assert_eq!(canonical_field_for_legacy("toolName"), None);
    }
}
