//! Page sources and renderable pages.
//!
//! - [`discover_pages`] lists the page sources under the pages directory
//! - [`PageRenderable`] is what a compiled page can do: produce markup
//! - [`PageRegistry`] maps slugs to loaded pages

mod registry;

pub use registry::PageRegistry;

use std::{
    io,
    path::{Path, PathBuf},
};

use jwalk::WalkDir;
use thiserror::Error;

use crate::core::{Slug, SlugError, slug};
use crate::log;
use crate::render::RenderError;

/// File stems reserved for the application shell.
const SHELL_STEMS: &[&str] = &["_app", "_document"];

/// Path segment whose subtree holds API handlers, not pages.
const API_SEGMENT: &str = "api";

/// Lazily produced markup chunks.
pub type ChunkIter = Box<dyn Iterator<Item = Result<String, RenderError>> + Send>;

/// A page that can render its markup (the body of `#__pleb`).
pub trait PageRenderable: Send + Sync {
    fn render_to_markup(&self) -> Result<String, RenderError>;

    /// Markup as it becomes available. Defaults to one chunk.
    fn render_chunks(&self) -> ChunkIter {
        Box::new(std::iter::once(self.render_to_markup()))
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("pages directory `{}` not found", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to read pages directory `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A discovered page source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    /// Absolute filesystem path.
    pub path: PathBuf,
    /// Path relative to the pages directory, `/`-separated.
    pub relative: String,
}

impl PageSource {
    pub fn slug(&self) -> Result<Slug, SlugError> {
        slug::to_slug(&self.relative)
    }
}

/// List page sources under `pages_dir`, sorted by relative path.
///
/// Skips hidden entries, the app shell (`_app.*`, `_document.*`), anything
/// below an `api` directory, and files without a page extension (with a
/// warning).
pub fn discover_pages(pages_dir: &Path) -> Result<Vec<PageSource>, DiscoveryError> {
    if !pages_dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(pages_dir.to_path_buf()));
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(pages_dir).sort(true) {
        let entry = entry.map_err(|e| DiscoveryError::Io {
            path: pages_dir.to_path_buf(),
            source: io::Error::other(e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(relative) = relative_path(&path, pages_dir) else {
            log!("warning"; "skipping `{}`: not a UTF-8 path", path.display());
            continue;
        };
        if is_reserved(&relative) {
            continue;
        }
        if !slug::is_page_file(&relative) {
            log!("warning"; "skipping `{}`: unsupported page extension", relative);
            continue;
        }

        pages.push(PageSource { path, relative });
    }

    pages.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(pages)
}

/// Find the source that maps to `slug`, scanning the directory afresh.
pub fn find_page(pages_dir: &Path, slug: &Slug) -> Result<Option<PageSource>, DiscoveryError> {
    Ok(discover_pages(pages_dir)?
        .into_iter()
        .find(|page| page.slug().is_ok_and(|s| &s == slug)))
}

/// Find the source whose extension-less relative path is `stem`.
pub fn find_page_by_stem(
    pages_dir: &Path,
    stem: &str,
) -> Result<Option<PageSource>, DiscoveryError> {
    Ok(discover_pages(pages_dir)?
        .into_iter()
        .find(|page| slug::to_stem_path(&page.relative).is_ok_and(|s| s == stem)))
}

fn relative_path(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(segments?.join("/"))
}

fn is_reserved(relative: &str) -> bool {
    let mut segments = relative.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            let stem = segment.split('.').next().unwrap_or(segment);
            return SHELL_STEMS.contains(&stem);
        }
        if segment == API_SEGMENT {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "export default () => null").unwrap();
    }

    fn relatives(pages: &[PageSource]) -> Vec<&str> {
        pages.iter().map(|p| p.relative.as_str()).collect()
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in [
            "index.tsx",
            "about.tsx",
            "_app.tsx",
            "_document.jsx",
            "api/hello.ts",
            "blog/api-docs.tsx",
            "blog/index.tsx",
            "styles.css",
            ".hidden.tsx",
        ] {
            touch(dir.path(), name);
        }

        let pages = discover_pages(dir.path()).unwrap();
        assert_eq!(
            relatives(&pages),
            vec!["about.tsx", "blog/api-docs.tsx", "blog/index.tsx", "index.tsx"]
        );
        assert!(pages.iter().all(|p| p.path.is_absolute() || p.path.starts_with(dir.path())));
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = discover_pages(&dir.path().join("pages")).unwrap_err();
        assert!(matches!(err, DiscoveryError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_discover_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(discover_pages(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_find_page_by_slug_and_stem() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.tsx");
        touch(dir.path(), "blog/index.jsx");

        let found = find_page(dir.path(), &Slug::from_request("/blog").unwrap()).unwrap();
        assert_eq!(found.unwrap().relative, "blog/index.jsx");
        assert!(find_page(dir.path(), &Slug::from_request("/nope").unwrap()).unwrap().is_none());

        let found = find_page_by_stem(dir.path(), "blog/index").unwrap();
        assert_eq!(found.unwrap().relative, "blog/index.jsx");
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("_app.tsx"));
        assert!(is_reserved("blog/_document.tsx"));
        assert!(is_reserved("api/users/list.ts"));
        assert!(!is_reserved("apis.tsx"));
        assert!(!is_reserved("api.tsx"));
        assert!(!is_reserved("app.tsx"));
    }
}
