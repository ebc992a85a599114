//! Project configuration management for `pleb.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [build] [serve] [compiler] [document]
//! ├── error          # ConfigError, ConfigDiagnostics
//! └── mod.rs         # PlebConfig (this file)
//! ```
//!
//! The config file is optional: a project without `pleb.toml` runs on the
//! defaults. Relative paths are resolved against the project root, which is
//! the `--entry` directory (or the directory of an `--entry` file).

mod error;
pub mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{BuildConfig, CompilerConfig, DocumentConfig, ServeConfig};

use crate::{
    cli::{Cli, Commands},
    core::Mode,
    debug, log,
    utils::path::normalize_path,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing pleb.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlebConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Server mode, decided by the command (internal use only)
    #[serde(skip)]
    pub mode: Mode,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub document: DocumentConfig,
}

impl PlebConfig {
    /// Load configuration for a CLI invocation.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = resolve_root(cli.build_args().entry.as_deref())?;
        let config_path = if cli.config.is_absolute() {
            cli.config.clone()
        } else {
            root.join(&cli.config)
        };

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            debug!("config"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        config.config_path = config_path;
        config.finalize(&root);
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Default configuration rooted at `root`.
    pub fn for_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.finalize(root);
        config
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Resolve the root and every configured path against it.
    fn finalize(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.build.normalize(&root);
        self.compiler.normalize(&root);
        self.root = root;
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.build_args().verbose);
        self.mode = cli.mode();

        if let Commands::Dev { args } | Commands::Start { args } = &cli.command {
            Self::update_option(&mut self.serve.interface, args.interface.as_ref());
            Self::update_option(&mut self.serve.port, args.port.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate all sections, collecting every error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.build.validate(&mut diag);
        self.serve.validate(&mut diag);
        self.compiler.validate(&mut diag);
        diag.into_result()
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }
}

/// Project root from `--entry`: the directory itself, or the parent of a file.
fn resolve_root(entry: Option<&Path>) -> Result<PathBuf> {
    let Some(entry) = entry else {
        return std::env::current_dir().context("Failed to get current working directory");
    };

    let path = normalize_path(entry);
    if path.is_dir() {
        return Ok(path);
    }
    if path.is_file() {
        return path
            .parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("entry `{}` has no parent directory", path.display()));
    }
    bail!("entry `{}` does not exist", entry.display())
}

/// Parse config, failing on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PlebConfig {
    let (parsed, ignored) = PlebConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        let result = PlebConfig::parse_with_ignored("[build\npages = \"pages\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\npages = \"src\"\n[unknown_section]\nfield = \"value\"\n[serve]\nwatch = true";
        let (config, ignored) = PlebConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.build.pages, PathBuf::from("src"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
        assert!(ignored.iter().any(|f| f == "serve.watch"));
    }

    #[test]
    fn test_for_root_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let config = PlebConfig::for_root(dir.path());
        let root = normalize_path(dir.path());

        assert_eq!(config.root, root);
        assert_eq!(config.build.pages, root.join("pages"));
        assert_eq!(config.build.output, root.join(".pleb"));
        assert_eq!(config.build.public, root.join("public"));
        assert_eq!(config.mode, Mode::Production);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pleb.toml");
        fs::write(&path, "[serve]\nport = 4000\n").unwrap();

        let config = PlebConfig::from_path(&path).unwrap();
        assert_eq!(config.serve.port, 4000);

        let missing = PlebConfig::from_path(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(..))));
    }

    #[test]
    fn test_resolve_root_from_file_entry() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("server.ts");
        fs::write(&file, "").unwrap();

        assert_eq!(resolve_root(Some(&file)).unwrap(), normalize_path(dir.path()));
        assert_eq!(
            resolve_root(Some(dir.path())).unwrap(),
            normalize_path(dir.path())
        );
        assert!(resolve_root(Some(&dir.path().join("missing"))).is_err());
    }

    #[test]
    fn test_root_relative() {
        let config = PlebConfig::for_root(Path::new("/nonexistent-site"));
        assert_eq!(
            config.root_relative("/nonexistent-site/pages/about.tsx"),
            PathBuf::from("pages/about.tsx")
        );
    }
}
