//! Slug type and the page path mapping.
//!
//! Build time maps a page's relative source path to a slug and artifact names;
//! request time maps a URL back to a slug. Both directions live here so they
//! cannot drift apart.
//!
//! | Source             | Slug        | Markup             | Script           |
//! |--------------------|-------------|--------------------|------------------|
//! | `index.tsx`        | `/`         | `index.html`       | `index.js`       |
//! | `about.tsx`        | `/about`    | `about.html`       | `about.js`       |
//! | `blog/index.jsx`   | `/blog`     | `blog/index.html`  | `blog/index.js`  |
//! | `blog/first.ts`    | `/blog/first` | `blog/first.html` | `blog/first.js` |

use std::fmt;
use std::sync::OnceLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recognized page source extensions.
pub const PAGE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js"];

/// File stem that maps to its directory's slug.
const INDEX_STEM: &str = "index";

/// Base used to resolve request targets.
const BASE_HOST: &str = "http://localhost";

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("unsupported page extension: `{0}`")]
    UnsupportedExtension(String),

    #[error("invalid page path: `{0}`")]
    InvalidPath(String),
}

/// Canonical URL path of a page.
///
/// Invariants:
/// - Always decoded (no percent-encoding)
/// - Always starts with `/`
/// - No trailing slash, except for the root slug
/// - No empty, `.` or `..` segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// The root slug `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let joined = segments.into_iter().collect::<Vec<_>>().join("/");
        Self(format!("/{joined}"))
    }

    /// Derive the slug targeted by a request URL.
    ///
    /// Accepts origin-form targets (`/about?x=1`) as well as absolute URLs.
    /// Query string and fragment are dropped, percent-encoding is decoded and
    /// a trailing slash is ignored.
    pub fn from_request(target: &str) -> Result<Self, SlugError> {
        static BASE: OnceLock<Option<url::Url>> = OnceLock::new();
        let invalid = || SlugError::InvalidPath(target.to_string());
        let base = BASE
            .get_or_init(|| url::Url::parse(BASE_HOST).ok())
            .as_ref()
            .ok_or_else(invalid)?;

        let parsed = base
            .join(target)
            .map_err(|_| invalid())?;
        let decoded = percent_decode_str(parsed.path())
            .decode_utf8()
            .map_err(|_| invalid())?;

        let segments: Vec<&str> = decoded.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(invalid());
        }

        Ok(Self::from_segments(segments))
    }

    /// Decoded slug string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Request path that resolves to this slug (percent-encoded per segment).
    pub fn to_request_path(&self) -> String {
        if self.is_root() {
            return "/".to_string();
        }
        self.0
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split a relative page path into its extension-less path.
///
/// `blog/post.tsx` -> `blog/post`
fn strip_page_extension(relative: &str) -> Result<&str, SlugError> {
    if relative.is_empty()
        || relative.starts_with('/')
        || relative
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == "..")
    {
        return Err(SlugError::InvalidPath(relative.to_string()));
    }

    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && PAGE_EXTENSIONS.contains(&ext) => {
            // The stem becomes a slug segment
            if stem == "." || stem == ".." {
                return Err(SlugError::InvalidPath(relative.to_string()));
            }
            Ok(&relative[..relative.len() - ext.len() - 1])
        }
        _ => Err(SlugError::UnsupportedExtension(relative.to_string())),
    }
}

/// Whether the relative path carries a recognized page extension.
pub fn is_page_file(relative: &str) -> bool {
    strip_page_extension(relative).is_ok()
}

/// Map a relative page path to its slug.
pub fn to_slug(relative: &str) -> Result<Slug, SlugError> {
    let stem_path = strip_page_extension(relative)?;
    let mut segments: Vec<&str> = stem_path.split('/').collect();
    if segments.last() == Some(&INDEX_STEM) {
        segments.pop();
    }
    Ok(Slug::from_segments(segments))
}

/// Replace the page extension with `.html`.
pub fn to_html_artifact_name(relative: &str) -> Result<String, SlugError> {
    Ok(format!("{}.html", strip_page_extension(relative)?))
}

/// Replace the page extension with `.js` (client bundle name).
pub fn to_script_name(relative: &str) -> Result<String, SlugError> {
    Ok(format!("{}.js", strip_page_extension(relative)?))
}

/// Replace the page extension with `.mjs` (server module name).
pub fn to_server_module_name(relative: &str) -> Result<String, SlugError> {
    Ok(format!("{}.mjs", strip_page_extension(relative)?))
}

/// Extension-less relative path of a page (`blog/post.tsx` -> `blog/post`).
pub fn to_stem_path(relative: &str) -> Result<&str, SlugError> {
    strip_page_extension(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_slug_index_and_named() {
        assert_eq!(to_slug("index.tsx").unwrap().as_str(), "/");
        assert_eq!(to_slug("about.tsx").unwrap().as_str(), "/about");
        assert_eq!(to_slug("index.js").unwrap(), Slug::root());
        assert_eq!(to_slug("contact.jsx").unwrap().as_str(), "/contact");
    }

    #[test]
    fn test_to_slug_nested() {
        assert_eq!(to_slug("blog/index.tsx").unwrap().as_str(), "/blog");
        assert_eq!(to_slug("blog/first-post.ts").unwrap().as_str(), "/blog/first-post");
        // Only the file stem `index` is special
        assert_eq!(to_slug("index/about.tsx").unwrap().as_str(), "/index/about");
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(to_html_artifact_name("about.tsx").unwrap(), "about.html");
        assert_eq!(to_html_artifact_name("index.tsx").unwrap(), "index.html");
        assert_eq!(to_html_artifact_name("blog/post.jsx").unwrap(), "blog/post.html");
        assert_eq!(to_script_name("about.tsx").unwrap(), "about.js");
        assert_eq!(to_server_module_name("about.tsx").unwrap(), "about.mjs");
        // Dots inside the stem are kept
        assert_eq!(to_html_artifact_name("v1.2.tsx").unwrap(), "v1.2.html");
    }

    #[test]
    fn test_unsupported_extensions() {
        for name in ["style.css", "README.md", "index", ".tsx", "about.html", "data.json"] {
            assert!(
                matches!(to_slug(name), Err(SlugError::UnsupportedExtension(_))),
                "{name} should be rejected"
            );
            assert!(to_html_artifact_name(name).is_err());
        }
        assert!(!is_page_file("about.html"));
        assert!(is_page_file("about.tsx"));
    }

    #[test]
    fn test_invalid_relative_paths() {
        for name in ["", "/about.tsx", "../about.tsx", "blog//post.tsx", "./index.tsx"] {
            assert!(
                matches!(to_slug(name), Err(SlugError::InvalidPath(_))),
                "{name} should be invalid"
            );
        }
    }

    #[test]
    fn test_dot_stems_are_invalid() {
        for name in ["..tsx", "...tsx", "blog/..tsx", "blog/...jsx"] {
            assert!(
                matches!(to_slug(name), Err(SlugError::InvalidPath(_))),
                "{name} should be invalid"
            );
            assert!(to_html_artifact_name(name).is_err());
            assert!(!is_page_file(name));
        }
        // Leading dots followed by a name are fine
        let slug = to_slug("blog/.well.tsx").unwrap();
        assert_eq!(slug.as_str(), "/blog/.well");
        assert_eq!(Slug::from_request(&slug.to_request_path()).unwrap(), slug);
    }

    #[test]
    fn test_from_request_basic() {
        assert_eq!(Slug::from_request("/").unwrap(), Slug::root());
        assert_eq!(Slug::from_request("").unwrap(), Slug::root());
        assert_eq!(Slug::from_request("/about").unwrap().as_str(), "/about");
        assert_eq!(Slug::from_request("/about/").unwrap().as_str(), "/about");
        assert_eq!(Slug::from_request("/about?x=1#top").unwrap().as_str(), "/about");
        assert_eq!(Slug::from_request("/blog//post").unwrap().as_str(), "/blog/post");
        assert_eq!(
            Slug::from_request("http://example.com/about").unwrap().as_str(),
            "/about"
        );
    }

    #[test]
    fn test_from_request_decodes() {
        assert_eq!(Slug::from_request("/my%20page").unwrap().as_str(), "/my page");
        assert_eq!(Slug::from_request("/%E4%BD%A0%E5%A5%BD").unwrap().as_str(), "/你好");
    }

    #[test]
    fn test_from_request_rejects_dot_segments() {
        // `..` written literally is resolved by the URL parser, escaped forms are not
        assert_eq!(Slug::from_request("/a/../about").unwrap().as_str(), "/about");
        assert!(Slug::from_request("/a/%2e%2e%2F..%2Fetc").is_err());
    }

    #[test]
    fn test_round_trip_request_path() {
        let names = [
            "index.tsx",
            "about.tsx",
            "blog/index.tsx",
            "blog/first-post.jsx",
            "my page.tsx",
            "100%.ts",
            "what?.js",
            "hash#tag.tsx",
            "ünïcode.tsx",
            "v1.2.tsx",
        ];
        for name in names {
            let slug = to_slug(name).unwrap();
            let back = Slug::from_request(&slug.to_request_path()).unwrap();
            assert_eq!(back, slug, "round trip failed for {name}");
        }
    }

    #[test]
    fn test_to_request_path_encodes_segments() {
        assert_eq!(Slug::root().to_request_path(), "/");
        assert_eq!(to_slug("my page.tsx").unwrap().to_request_path(), "/my%20page");
        assert_eq!(to_slug("blog/a-b.tsx").unwrap().to_request_path(), "/blog/a-b");
    }

    #[test]
    fn test_slug_serde_is_plain_string() {
        let slug = to_slug("about.tsx").unwrap();
        assert_eq!(serde_json::to_string(&slug).unwrap(), "\"/about\"");
        let parsed: Slug = serde_json::from_str("\"/about\"").unwrap();
        assert_eq!(parsed, slug);
    }
}
