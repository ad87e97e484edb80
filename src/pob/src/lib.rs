//! # pob
//!
//! Path of Building helpers for the local trade-site bridge.
//!
//! This library provides:
//! - Extraction of the rune table (slot -> rune names) from `ModRunes.lua`
//! - Extraction of amulet enchants (`["tradeMod"]` blocks) from `QueryMods.lua`
//! - Success-only memoization of both tables for the life of the process
//! - A gateway that owns the single build-analysis engine and serializes
//!   every call into it
//!
//! ## Example
//!
//! ```no_run
//! use pob::{DataStore, PobPaths};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let paths = PobPaths::from_install("/opt/pob");
//! let store = DataStore::new(&paths);
//!
//! let helmet = store.runes_for("helmet,gloves")?;
//! println!("{} runes fit helmets or gloves", helmet.len());
//!
//! let enchants = store.amulet_enchants(Some("frenzy"), Some(5))?;
//! for enchant in enchants {
//!     println!("{} ({})", enchant.text, enchant.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod enchants;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod headless;
pub mod memo;
pub mod runes;
pub mod store;

#[doc(inline)]
pub use config::PobPaths;
#[doc(inline)]
pub use enchants::{extract_enchants, filter_enchants, EnchantRecord, DEFAULT_ENCHANT_LIMIT};
#[doc(inline)]
pub use engine::{BuildEngine, BuildSource, EngineFactory, EngineFailure};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use gateway::{decode_build_source, validate_item_text, EngineGateway, GatewayStatus};
#[doc(inline)]
pub use headless::{HeadlessEngine, HeadlessFactory};
#[doc(inline)]
pub use memo::Memo;
#[doc(inline)]
pub use runes::{LineScanParser, RuneTable, RuneTableParser, Slot};
#[doc(inline)]
pub use store::{DataStore, RuneSelection};
