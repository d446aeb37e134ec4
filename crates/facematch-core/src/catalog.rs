//! Reference catalog: the ordered list of images a query is searched against.

use crate::types::ImageRef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The catalog source could not be loaded.
///
/// Distinct from an empty catalog, which loads fine and never matches.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog at {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Ordered image references. Order is exactly the order of the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub images: Vec<ImageRef>,
}

impl Catalog {
    pub fn new(images: Vec<ImageRef>) -> Self {
        Self { images }
    }

    /// Load a catalog from a JSON file of the form `{"images": [...]}`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| CatalogError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageRef> {
        self.images.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a ImageRef;
    type IntoIter = std::slice::Iter<'a, ImageRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

impl FromIterator<ImageRef> for Catalog {
    fn from_iter<I: IntoIterator<Item = ImageRef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
