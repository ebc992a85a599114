//! Slug → renderable page lookup.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;

use super::PageRenderable;
use crate::core::Slug;

/// A loaded page and the client bundle that hydrates it.
#[derive(Clone)]
pub struct RegisteredPage {
    pub page: Arc<dyn PageRenderable>,
    /// Bundle path relative to the build directory.
    pub script: String,
}

/// Pages loaded by the build, keyed by slug.
///
/// Filled once by the pipeline, then shared read-only across request workers.
#[derive(Clone, Default)]
pub struct PageRegistry {
    pages: FxHashMap<Slug, RegisteredPage>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page, returning the one it replaced.
    pub fn insert(
        &mut self,
        slug: Slug,
        page: Arc<dyn PageRenderable>,
        script: impl Into<String>,
    ) -> Option<RegisteredPage> {
        self.pages.insert(
            slug,
            RegisteredPage {
                page,
                script: script.into(),
            },
        )
    }

    pub fn get(&self, slug: &Slug) -> Option<RegisteredPage> {
        self.pages.get(slug).cloned()
    }

    pub fn contains(&self, slug: &Slug) -> bool {
        self.pages.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl fmt::Debug for PageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slugs: Vec<_> = self.pages.keys().map(Slug::as_str).collect();
        slugs.sort_unstable();
        f.debug_struct("PageRegistry").field("pages", &slugs).finish()
    }
}
