//! Memoized access to the rune and enchant tables.
//!
//! Each table is read and parsed at most once per store. Read failures are
//! returned to the caller and not remembered, so a missing file can be fixed
//! without restarting the process.

use crate::config::PobPaths;
use crate::enchants::{extract_enchants, filter_enchants, EnchantRecord};
use crate::error::{Error, Result};
use crate::memo::Memo;
use crate::runes::{LineScanParser, RuneTable, RuneTableParser, Slot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a rune query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RuneSelection {
    /// No slot requested: every non-empty slot with its sorted runes.
    All(BTreeMap<String, Vec<String>>),
    /// One or more slots requested: their sorted union.
    Slots(Vec<String>),
}

pub struct DataStore {
    runes_file: PathBuf,
    enchants_file: PathBuf,
    parser: Box<dyn RuneTableParser>,
    runes: Memo<RuneTable>,
    enchants: Memo<Vec<EnchantRecord>>,
}

impl DataStore {
    pub fn new(paths: &PobPaths) -> Self {
        Self::with_files(&paths.runes_file, &paths.enchants_file)
    }

    pub fn with_files(runes_file: impl Into<PathBuf>, enchants_file: impl Into<PathBuf>) -> Self {
        DataStore {
            runes_file: runes_file.into(),
            enchants_file: enchants_file.into(),
            parser: Box::new(LineScanParser),
            runes: Memo::new(),
            enchants: Memo::new(),
        }
    }

    /// Swap in a different rune table parser.
    pub fn with_parser(mut self, parser: impl RuneTableParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// The full rune table, parsed on first use.
    pub fn rune_table(&self) -> Result<&RuneTable> {
        self.runes.get_or_try_init(|| {
            let text = read_lossy(&self.runes_file)?;
            let table = self.parser.parse(&text);
            tracing::debug!(
                path = %self.runes_file.display(),
                slots = table.iter().count(),
                "Parsed rune table"
            );
            Ok(table)
        })
    }

    /// Runes for a comma-separated, case-insensitive slot list.
    ///
    /// Unknown slot names contribute nothing.
    pub fn runes_for(&self, slots: &str) -> Result<Vec<String>> {
        let table = self.rune_table()?;
        let wanted: Vec<Slot> = slots
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        Ok(table.union(&wanted))
    }

    /// Rune query as exposed over HTTP: an absent or empty slot list returns
    /// the whole table.
    pub fn runes(&self, slot: Option<&str>) -> Result<RuneSelection> {
        match slot.filter(|s| !s.is_empty()) {
            None => Ok(RuneSelection::All(self.rune_table()?.to_sorted_map())),
            Some(slots) => self.runes_for(slots).map(RuneSelection::Slots),
        }
    }

    /// Every qualifying amulet enchant, sorted by text.
    pub fn enchant_list(&self) -> Result<&[EnchantRecord]> {
        self.enchants
            .get_or_try_init(|| {
                let text = read_lossy(&self.enchants_file)?;
                let records = extract_enchants(&text);
                tracing::debug!(
                    path = %self.enchants_file.display(),
                    count = records.len(),
                    "Extracted amulet enchants"
                );
                Ok(records)
            })
            .map(Vec::as_slice)
    }

    /// Filtered, truncated enchant query.
    pub fn amulet_enchants(
        &self,
        query: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<EnchantRecord>> {
        Ok(filter_enchants(self.enchant_list()?, query, limit))
    }

    #[cfg(test)]
    fn is_cached(&self) -> (bool, bool) {
        (self.runes.is_set(), self.enchants.is_set())
    }
}

/// Read a data file, replacing invalid UTF-8 instead of failing.
fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| {
        tracing::warn!(path = %path.display(), "Failed to read data file: {}", e);
        Error::io(path, e)
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const RUNES: &str = r#"return {
	["Iron Rune"] = {
		["weapon"] = {
			type = "Rune",
			"Lesser Iron Rune",
			"Iron Rune",
		},
		["Gloves"] = {
			"Iron Rune",
		},
	},
	["Storm Rune"] = {
		["gloves"] = {
			"Storm Rune",
		},
	},
}
"#;

    const ENCHANTS: &str = r#"return {
	["tradeMod"] = { ["id"] = "enchant.b", ["text"] = "Allocates Intelligence", ["type"] = "enchant" },
	["tradeMod"] = { ["id"] = "enchant.a", ["text"] = "Allocates Frenzy", ["type"] = "enchant" },
	["tradeMod"] = { ["id"] = "implicit.c", ["text"] = "Allocates Frenzy", ["type"] = "implicit" },
}
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        runes: PathBuf,
        enchants: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let runes = dir.path().join("ModRunes.lua");
        let enchants = dir.path().join("QueryMods.lua");
        fs::write(&runes, RUNES).unwrap();
        fs::write(&enchants, ENCHANTS).unwrap();
        Fixture {
            _dir: dir,
            runes,
            enchants,
        }
    }

    struct CountingParser(Arc<AtomicUsize>);

    impl RuneTableParser for CountingParser {
        fn parse(&self, text: &str) -> RuneTable {
            self.0.fetch_add(1, Ordering::SeqCst);
            LineScanParser.parse(text)
        }
    }

    #[test]
    fn test_runes_whole_table() {
        let fx = fixture();
        let store = DataStore::with_files(&fx.runes, &fx.enchants);

        let RuneSelection::All(map) = store.runes(None).unwrap() else {
            panic!("expected whole table");
        };
        assert_eq!(map["weapon"], vec!["Iron Rune", "Lesser Iron Rune"]);
        assert_eq!(map["gloves"], vec!["Iron Rune", "Storm Rune"]);
        assert!(!map.contains_key("boots"));

        assert_eq!(store.runes(Some("")).unwrap(), RuneSelection::All(map));
    }

    #[test]
    fn test_runes_for_slot_list() {
        let fx = fixture();
        let store = DataStore::with_files(&fx.runes, &fx.enchants);

        assert_eq!(
            store.runes_for(" WEAPON , gloves,,amulet").unwrap(),
            vec!["Iron Rune", "Lesser Iron Rune", "Storm Rune"]
        );
        assert!(store.runes_for("amulet").unwrap().is_empty());
    }

    #[test]
    fn test_rune_table_parsed_once() {
        let fx = fixture();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = DataStore::with_files(&fx.runes, &fx.enchants)
            .with_parser(CountingParser(Arc::clone(&calls)));

        let first = store.rune_table().unwrap().clone();
        fs::remove_file(&fx.runes).unwrap();
        let second = store.rune_table().unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_rune_file_is_fatal_and_not_cached() {
        let fx = fixture();
        let missing = fx.runes.with_file_name("Later.lua");
        let store = DataStore::with_files(&missing, &fx.enchants);

        let err = store.runes(None).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(store.is_cached(), (false, false));

        fs::write(&missing, RUNES).unwrap();
        assert_eq!(store.runes_for("gloves").unwrap().len(), 2);
        assert!(store.is_cached().0);
    }

    #[test]
    fn test_empty_file_is_empty_table() {
        let fx = fixture();
        fs::write(&fx.runes, "").unwrap();
        let store = DataStore::with_files(&fx.runes, &fx.enchants);
        assert_eq!(store.runes(None).unwrap(), RuneSelection::All(BTreeMap::new()));
    }

    #[test]
    fn test_amulet_enchants_query() {
        let fx = fixture();
        let store = DataStore::with_files(&fx.runes, &fx.enchants);

        let all = store.amulet_enchants(None, None).unwrap();
        assert_eq!(
            all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["enchant.a", "enchant.b"]
        );

        let frenzy = store.amulet_enchants(Some("frenzy"), Some(25)).unwrap();
        assert_eq!(frenzy.len(), 1);
        assert_eq!(frenzy[0].id, "enchant.a");

        let limited = store.amulet_enchants(Some("allocates"), Some(1)).unwrap();
        assert_eq!(limited[0].text, "Allocates Frenzy");
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_missing_enchant_file_then_recovery() {
        let fx = fixture();
        let missing = fx.enchants.with_file_name("Later.lua");
        let store = DataStore::with_files(&fx.runes, &missing);

        assert!(store.amulet_enchants(None, None).unwrap_err().is_configuration());

        fs::write(&missing, ENCHANTS).unwrap();
        assert_eq!(store.amulet_enchants(None, None).unwrap().len(), 2);
        assert!(store.is_cached().1);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let fx = fixture();
        let mut bytes = RUNES.as_bytes().to_vec();
        bytes.extend_from_slice(b"\n-- \xff\xfe trailing junk\n");
        fs::write(&fx.runes, bytes).unwrap();

        let store = DataStore::with_files(&fx.runes, &fx.enchants);
        assert_eq!(store.runes_for("weapon").unwrap().len(), 2);
    }
}
