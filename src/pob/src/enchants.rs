//! Amulet enchant extraction from `QueryMods.lua`.
//!
//! Trade mods are stored as marker blocks:
//!
//! ```text
//! ["tradeMod"] = {
//!     ["id"] = "enchant.stat_2954116742|16",
//!     ["text"] = "Allocates Frenzy",
//!     ["type"] = "enchant",
//! },
//! ```
//!
//! Only enchants whose text starts with `Allocates ` are kept; those are the
//! ones that can appear on amulets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENCHANT_LIMIT: i64 = 25;

const ENCHANT_TYPE: &str = "enchant";
const ALLOCATES_PREFIX: &str = "Allocates ";

/// Body of a `["tradeMod"]` block, up to its first closing brace.
static TRADE_MOD_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\["tradeMod"\]\s*=\s*\{([^}]*)\}"#).unwrap());

static ID_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\["id"\]\s*=\s*"([^"]+)""#).unwrap());
static TEXT_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\["text"\]\s*=\s*"([^"]+)""#).unwrap());
static TYPE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\["type"\]\s*=\s*"([^"]+)""#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnchantRecord {
    pub id: String,
    pub text: String,
}

/// Extract qualifying enchants, sorted by text.
///
/// Blocks missing any of the three fields are skipped. Duplicate ids are kept.
pub fn extract_enchants(source: &str) -> Vec<EnchantRecord> {
    let mut out: Vec<EnchantRecord> = TRADE_MOD_BLOCK
        .captures_iter(source)
        .filter_map(|caps| {
            let body = caps.get(1)?.as_str();
            let id = ID_FIELD.captures(body)?.get(1)?.as_str();
            let text = TEXT_FIELD.captures(body)?.get(1)?.as_str();
            let kind = TYPE_FIELD.captures(body)?.get(1)?.as_str();

            if kind != ENCHANT_TYPE || !text.starts_with(ALLOCATES_PREFIX) {
                return None;
            }

            Some(EnchantRecord {
                id: id.to_string(),
                text: text.to_string(),
            })
        })
        .collect();

    out.sort_by(|a, b| a.text.cmp(&b.text));
    out
}

/// Apply the query contract: case-insensitive substring filter on `text`,
/// then truncation. A missing or non-positive limit returns every match.
pub fn filter_enchants(
    records: &[EnchantRecord],
    query: Option<&str>,
    limit: Option<i64>,
) -> Vec<EnchantRecord> {
    let needle = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let matches = records.iter().filter(|record| match &needle {
        Some(needle) => record.text.to_lowercase().contains(needle.as_str()),
        None => true,
    });

    match limit {
        Some(limit) if limit > 0 => matches.take(limit as usize).cloned().collect(),
        _ => matches.cloned().collect(),
    }
}
