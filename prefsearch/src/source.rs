//! Entry tree sources.
//!
//! A category's tree is produced on demand by a [`TreeSource`] so a source that
//! fails (missing file, malformed JSON) only takes its own category out of the
//! index. In-memory trees are infallible sources.

use crate::interface::Entry;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Error type for loading entry trees
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

/// Produces the entry tree of one category
pub trait TreeSource: Send + Sync {
    fn load(&self) -> Result<Entry, TreeError>;
}

impl TreeSource for Entry {
    fn load(&self) -> Result<Entry, TreeError> {
        Ok(self.clone())
    }
}

/// Reads a single entry tree from a JSON file each time it is loaded
#[derive(Debug, Clone)]
pub struct JsonTreeSource {
    path: PathBuf,
}

impl JsonTreeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TreeSource for JsonTreeSource {
    fn load(&self) -> Result<Entry, TreeError> {
        let file = File::open(&self.path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// A named category and the source of its tree
#[derive(Clone)]
pub struct Category {
    key: String,
    title: String,
    source: Arc<dyn TreeSource>,
}

impl Category {
    /// Category backed by an in-memory tree
    pub fn new(key: impl Into<String>, title: impl Into<String>, root: Entry) -> Self {
        Self::from_source(key, title, Arc::new(root))
    }

    pub fn from_source(key: impl Into<String>, title: impl Into<String>, source: Arc<dyn TreeSource>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn load(&self) -> Result<Entry, TreeError> {
        self.source.load()
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Category")
            .field("key", &self.key)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifest
// ─────────────────────────────────────────────────────────────────────────────

/// One manifest row: either an inline `tree` or a `path` to a tree file
#[derive(Debug, Deserialize)]
struct ManifestCategory {
    key: String,
    title: String,
    #[serde(default)]
    tree: Option<Entry>,
    #[serde(default)]
    path: Option<PathBuf>,
}

/// Load the category list from a JSON manifest.
///
/// Relative tree paths resolve against the manifest's directory. Tree files
/// are not opened here; a broken tree file surfaces during the index build.
pub fn load_manifest(path: &Path) -> Result<Vec<Category>, TreeError> {
    let file = File::open(path)?;
    let rows: Vec<ManifestCategory> = serde_json::from_reader(BufReader::new(file))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    rows.into_iter()
        .map(|row| match (row.tree, row.path) {
            (Some(tree), None) => Ok(Category::new(row.key, row.title, tree)),
            (None, Some(tree_path)) => {
                let resolved = if tree_path.is_absolute() {
                    tree_path
                } else {
                    base.join(tree_path)
                };
                Ok(Category::from_source(row.key, row.title, Arc::new(JsonTreeSource::new(resolved))))
            }
            (Some(_), Some(_)) => Err(TreeError::Manifest(format!(
                "category '{}' has both an inline tree and a path",
                row.key
            ))),
            (None, None) => Err(TreeError::Manifest(format!(
                "category '{}' has neither an inline tree nor a path",
                row.key
            ))),
        })
        .collect()
}
