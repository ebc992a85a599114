//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! pages = "pages"             # Page components, one route per file
//! output = ".pleb"            # Build directory, wiped on every start
//! public = "public"           # Copied into <output>/static
//! jobs = 0                    # Parallel page workers (0 = all cores)
//! dynamic = ["/dashboard"]    # Rendered per request instead of prerendered
//! allow_partial = false       # Keep serving the pages that did build
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::core::Slug;
use crate::utils::path::resolve_against;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Page source directory.
    pub pages: PathBuf,

    /// Build output directory.
    pub output: PathBuf,

    /// Public assets directory.
    pub public: PathBuf,

    /// Page worker threads, 0 uses the available parallelism.
    pub jobs: usize,

    /// Slugs compiled at build time but rendered per request.
    pub dynamic: Vec<String>,

    /// Exclude failed pages from the manifest instead of failing the build.
    pub allow_partial: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pages: "pages".into(),
            output: ".pleb".into(),
            public: "public".into(),
            jobs: 0,
            dynamic: Vec::new(),
            allow_partial: false,
        }
    }
}

impl BuildConfig {
    /// Resolve directories against the project root.
    pub fn normalize(&mut self, root: &Path) {
        self.pages = resolve_against(root, &self.pages);
        self.output = resolve_against(root, &self.output);
        self.public = resolve_against(root, &self.public);
    }

    /// Normalized slugs listed in `dynamic`. Invalid entries are dropped
    /// (they are reported by [`BuildConfig::validate`]).
    pub fn dynamic_slugs(&self) -> FxHashSet<Slug> {
        self.dynamic
            .iter()
            .filter_map(|s| Slug::from_request(s).ok())
            .collect()
    }

    /// Worker count for the page pool.
    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for entry in &self.dynamic {
            if !entry.starts_with('/') || Slug::from_request(entry).is_err() {
                diag.error(
                    "build.dynamic",
                    format!("`{entry}` is not a page path (expected e.g. \"/about\")"),
                );
            }
        }
        if self.output.as_os_str().is_empty() {
            diag.error("build.output", "must not be empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::config::ConfigDiagnostics;
    use crate::core::Slug;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_build_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.pages, PathBuf::from("pages"));
        assert_eq!(config.build.output, PathBuf::from(".pleb"));
        assert_eq!(config.build.public, PathBuf::from("public"));
        assert_eq!(config.build.jobs, 0);
        assert!(config.build.dynamic.is_empty());
        assert!(!config.build.allow_partial);
        assert!(config.build.worker_count() >= 1);
    }

    #[test]
    fn test_build_config_override() {
        let config = test_parse_config(
            "[build]\npages = \"src/pages\"\njobs = 2\ndynamic = [\"/dashboard\", \"/blog/\"]\nallow_partial = true",
        );
        assert_eq!(config.build.pages, PathBuf::from("src/pages"));
        assert_eq!(config.build.worker_count(), 2);
        assert!(config.build.allow_partial);

        let dynamic = config.build.dynamic_slugs();
        assert!(dynamic.contains(&Slug::from_request("/dashboard").unwrap()));
        assert!(dynamic.contains(&Slug::from_request("/blog").unwrap()));
    }

    #[test]
    fn test_build_config_normalize() {
        let mut config = test_parse_config("[build]\noutput = \"/tmp/pleb-out\"");
        config.build.normalize(Path::new("/nonexistent-site"));
        assert_eq!(config.build.pages, PathBuf::from("/nonexistent-site/pages"));
        assert_eq!(config.build.output, PathBuf::from("/tmp/pleb-out"));
    }

    #[test]
    fn test_build_config_invalid_dynamic() {
        let config = test_parse_config("[build]\ndynamic = [\"about\", \"/ok\"]");
        let mut diag = ConfigDiagnostics::new();
        config.build.validate(&mut diag);
        assert_eq!(diag.len(), 1);
        assert_eq!(diag.errors()[0].field, "build.dynamic");
    }
}
