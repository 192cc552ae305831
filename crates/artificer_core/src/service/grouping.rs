//! Classification policies over traversed leaf pages.
//!
//! # Invariants
//! - Every input record lands in exactly one bucket of a plan.
//! - Classification misses are reported, never dropped.

use crate::block::rich_text::strip_rich_text;
use crate::model::document::{normalize_name, JournalId};
use crate::repo::recipe_cache::RecipeCache;
use crate::service::traversal::LeafRecord;
use crate::tables::Rarity;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static SKILL_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*skill\s*:[ \t]*(\S[^\r\n]*)$").expect("valid skill regex"));
static RARITY_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*rarity\s*:[ \t]*(\S[^\r\n]*)$").expect("valid rarity regex")
});

/// Result of the duplicate-name policy.
#[derive(Debug, Default)]
pub struct DedupPlan<'a> {
    pub keep: Vec<&'a LeafRecord>,
    pub delete: Vec<&'a LeafRecord>,
}

/// Groups by (journal, normalized name); the first record in input order is
/// kept and later ones are scheduled for deletion.
pub fn plan_deduplication(records: &[LeafRecord]) -> DedupPlan<'_> {
    let mut seen: HashSet<(JournalId, String)> = HashSet::new();
    let mut plan = DedupPlan::default();
    for record in records {
        let key = (record.journal.journal_id, normalize_name(&record.page.name));
        if seen.insert(key) {
            plan.keep.push(record);
        } else {
            plan.delete.push(record);
        }
    }
    plan
}

/// Derived key used to split records into target journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingKey {
    Skill,
    Rarity,
}

impl GroupingKey {
    fn marker(self) -> &'static Regex {
        match self {
            Self::Skill => &SKILL_MARKER_RE,
            Self::Rarity => &RARITY_MARKER_RE,
        }
    }

    /// Canonical group label for a raw value; `None` when unusable.
    pub fn label_for(self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self {
            Self::Skill => Some(title_case(trimmed)),
            Self::Rarity => Rarity::parse(trimmed).map(|rarity| rarity.label().to_string()),
        }
    }
}

/// Group label for a record, from its linked structured recipe, falling back
/// to an explicit marker line in the stripped page content.
pub fn classify<C: RecipeCache>(
    record: &LeafRecord,
    key: GroupingKey,
    cache: &C,
) -> Option<String> {
    let structured = record
        .page
        .recipe_id
        .and_then(|recipe_id| cache.find(recipe_id))
        .and_then(|recipe| {
            let raw = match key {
                GroupingKey::Skill => recipe.skill.as_str(),
                GroupingKey::Rarity => recipe.rarity.as_str(),
            };
            key.label_for(raw)
        });
    if structured.is_some() {
        return structured;
    }

    let text = strip_rich_text(&record.page.content);
    key.marker()
        .captures(&text)
        .and_then(|captures| captures.get(1))
        .and_then(|value| key.label_for(value.as_str()))
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
