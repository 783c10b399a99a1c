//! prefsearch - typo-tolerant search over hierarchical settings trees
//!
//! Settings are indexed per category into an immutable snapshot. Queries are
//! scored with a weighted rule set (exact, prefix and substring matches on
//! title, key and summary, plural and typo variants, then a fuzzy fallback)
//! and ranked in parallel. A debounce coordinator runs only the latest
//! keystroke query, and a hierarchical assembler presents matches under the
//! groups that contain them.

pub(crate) mod candidate;
pub mod config;
pub mod debounce;
pub mod hierarchy;
pub mod indexer;
pub mod interface;
mod ranking;
mod search;
pub mod similarity;
pub mod source;
mod store;

pub use config::SearchConfig;
pub use debounce::{DebouncePhase, Debouncer};
pub use indexer::{CategoryTree, IndexSnapshot, Indexer};
pub use interface::*;
pub use source::{load_manifest, Category, JsonTreeSource, TreeError, TreeSource};
pub use store::SettingsSearch;
