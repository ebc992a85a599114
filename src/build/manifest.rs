//! Build manifest: which slugs have a prerendered document.
//!
//! Persisted as `<build>/buildManifest.json`:
//!
//! ```json
//! { "pages": { "/about": { "markup": "about.html", "script": "static/chunks/about.js" } } }
//! ```
//!
//! A [`ManifestBuilder`] collects entries during the build; `finish()` turns
//! it into an immutable [`BuildManifest`] that the router shares via `Arc`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{MANIFEST_FILE, Slug};
use crate::utils::fs::write_atomic;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("duplicate manifest entry for `{0}`")]
    Duplicate(Slug),

    #[error("I/O error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest `{}`", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Artifacts of one prerendered page, relative to the build directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageManifestEntry {
    pub markup: String,
    pub script: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pages: BTreeMap<Slug, PageManifestEntry>,
}

impl BuildManifest {
    /// Whether `slug` has a prerendered document.
    #[inline]
    pub fn has(&self, slug: &Slug) -> bool {
        self.pages.contains_key(slug)
    }

    #[inline]
    pub fn get(&self, slug: &Slug) -> Option<&PageManifestEntry> {
        self.pages.get(slug)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Slugs in sorted order.
    pub fn slugs(&self) -> impl Iterator<Item = &Slug> {
        self.pages.keys()
    }

    /// Path of the manifest file inside `build_dir`.
    pub fn path_in(build_dir: &Path) -> PathBuf {
        build_dir.join(MANIFEST_FILE)
    }

    /// Atomically write the manifest into `build_dir`.
    pub fn persist(&self, build_dir: &Path) -> Result<PathBuf, ManifestError> {
        let path = Self::path_in(build_dir);
        let json = serde_json::to_vec_pretty(self).map_err(|source| ManifestError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Read a manifest written by [`BuildManifest::persist`].
    pub fn load(build_dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::path_in(build_dir);
        let content = fs::read(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&content).map_err(|source| ManifestError::Json { path, source })
    }
}

/// Accumulates entries; duplicates are rejected.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    pages: BTreeMap<Slug, PageManifestEntry>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slug: Slug, entry: PageManifestEntry) -> Result<(), ManifestError> {
        if self.pages.contains_key(&slug) {
            return Err(ManifestError::Duplicate(slug));
        }
        self.pages.insert(slug, entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(self) -> BuildManifest {
        BuildManifest { pages: self.pages }
    }
}
