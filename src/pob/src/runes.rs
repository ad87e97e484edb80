//! Rune table extraction from `ModRunes.lua`.
//!
//! The source is a nested Lua table literal. Under each rune entry, sections
//! keyed by equipment slot list the rune names that fit that slot:
//!
//! ```text
//! return {
//!     ["Desert Rune"] = {
//!         ["helmet"] = {
//!             type = "Rune",
//!             "Desert Rune",
//!         },
//!     },
//! }
//! ```
//!
//! This is not a Lua parser. A line-oriented brace counter recognises the two
//! shapes above and skips everything else, matching how the data files are
//! laid out upstream.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Equipment slots that can appear as rune table section keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Weapon,
    Bow,
    Caster,
    Armour,
    Helmet,
    Gloves,
    Boots,
    Sceptre,
    Shield,
    Focus,
    #[serde(rename = "body armour")]
    BodyArmour,
}

impl Slot {
    pub const ALL: [Slot; 11] = [
        Slot::Weapon,
        Slot::Bow,
        Slot::Caster,
        Slot::Armour,
        Slot::Helmet,
        Slot::Gloves,
        Slot::Boots,
        Slot::Sceptre,
        Slot::Shield,
        Slot::Focus,
        Slot::BodyArmour,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::Weapon => "weapon",
            Slot::Bow => "bow",
            Slot::Caster => "caster",
            Slot::Armour => "armour",
            Slot::Helmet => "helmet",
            Slot::Gloves => "gloves",
            Slot::Boots => "boots",
            Slot::Sceptre => "sceptre",
            Slot::Shield => "shield",
            Slot::Focus => "focus",
            Slot::BodyArmour => "body armour",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = ();

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Slot::ALL
            .iter()
            .copied()
            .find(|slot| slot.name() == key)
            .ok_or(())
    }
}

/// Slot -> distinct rune names. Slots with nothing extracted are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuneTable {
    entries: BTreeMap<Slot, BTreeSet<String>>,
}

impl RuneTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: Slot, rune: impl Into<String>) -> bool {
        self.entries.entry(slot).or_default().insert(rune.into())
    }

    /// Runes for one slot, sorted.
    pub fn get(&self, slot: Slot) -> Option<&BTreeSet<String>> {
        self.entries.get(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeSet::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &BTreeSet<String>)> {
        self.entries
            .iter()
            .filter(|(_, runes)| !runes.is_empty())
            .map(|(slot, runes)| (*slot, runes))
    }

    /// Presentation form: slot name -> sorted rune names, non-empty slots only.
    pub fn to_sorted_map(&self) -> BTreeMap<String, Vec<String>> {
        self.iter()
            .map(|(slot, runes)| (slot.name().to_string(), runes.iter().cloned().collect()))
            .collect()
    }

    /// Union of the named slots, sorted and de-duplicated.
    pub fn union<'a>(&self, slots: impl IntoIterator<Item = &'a Slot>) -> Vec<String> {
        let mut out = BTreeSet::new();
        for slot in slots {
            if let Some(runes) = self.entries.get(slot) {
                out.extend(runes.iter().cloned());
            }
        }
        out.into_iter().collect()
    }
}

/// Turns rune table source text into a [`RuneTable`].
///
/// Parsing never fails: malformed input yields a partial or empty table.
pub trait RuneTableParser: Send + Sync {
    fn parse(&self, text: &str) -> RuneTable;
}

/// `["key"] = {` with nothing after the brace.
static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\[\s*"([^"]+)"\s*\]\s*=\s*\{\s*$"#).unwrap());

/// `"name"` with an optional trailing comma.
static QUOTED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^"([^"]+)"\s*,?\s*$"#).unwrap());

/// Line-oriented brace-depth scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineScanParser;

impl RuneTableParser for LineScanParser {
    fn parse(&self, text: &str) -> RuneTable {
        let mut table = RuneTable::new();
        let mut depth: i64 = 0;
        let mut section: Option<Slot> = None;

        for raw in text.lines() {
            let line = raw.trim();

            // Section headers only count inside the outer return table.
            if depth >= 1 {
                if let Some(caps) = SECTION_HEADER.captures(line) {
                    section = caps[1].parse::<Slot>().ok();
                    depth += 1;
                    continue;
                }
            }

            if let Some(slot) = section {
                if !line.contains("type") {
                    if let Some(caps) = QUOTED_ITEM.captures(line) {
                        table.insert(slot, &caps[1]);
                    }
                }
            }

            let opens = line.matches('{').count() as i64;
            let closes = line.matches('}').count() as i64;
            depth = (depth + opens - closes).max(0);

            if depth == 1 {
                section = None;
            }
        }

        table
    }
}
