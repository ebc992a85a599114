//! `[compiler]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [compiler]
//! bundler = ["npx", "esbuild"]    # Command used to bundle pages
//! runtime = ["node"]              # Command used to run the render shim
//! format = "esm"                  # Browser bundle format: esm | iife
//! tsconfig = "tsconfig.json"      # Passed to the bundler when set
//! timeout = 60                    # Seconds per bundler invocation
//! render_timeout = 30             # Seconds per page render
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compiler::OutputFormat;
use crate::config::ConfigDiagnostics;
use crate::utils::path::resolve_against;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Bundler command (program + leading arguments).
    pub bundler: Vec<String>,

    /// JavaScript runtime command.
    pub runtime: Vec<String>,

    /// Output format of browser bundles.
    pub format: OutputFormat,

    /// Optional tsconfig passed to the bundler.
    pub tsconfig: Option<PathBuf>,

    /// Bundler timeout in seconds.
    pub timeout: u64,

    /// Render timeout in seconds.
    pub render_timeout: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            bundler: vec!["esbuild".into()],
            runtime: vec!["node".into()],
            format: OutputFormat::Esm,
            tsconfig: None,
            timeout: 60,
            render_timeout: 30,
        }
    }
}

impl CompilerConfig {
    pub fn normalize(&mut self, root: &Path) {
        if let Some(tsconfig) = self.tsconfig.take() {
            let expanded = shellexpand::tilde(&tsconfig.to_string_lossy()).into_owned();
            self.tsconfig = Some(resolve_against(root, Path::new(&expanded)));
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.bundler.first().is_none_or(|p| p.trim().is_empty()) {
            diag.error("compiler.bundler", "must name a command");
        }
        if self.runtime.first().is_none_or(|p| p.trim().is_empty()) {
            diag.error("compiler.runtime", "must name a command");
        }
        if self.format == OutputFormat::Cjs {
            diag.error("compiler.format", "browser bundles must be `esm` or `iife`");
        }
        if self.timeout == 0 {
            diag.error("compiler.timeout", "must be greater than 0");
        }
        if self.render_timeout == 0 {
            diag.error("compiler.render_timeout", "must be greater than 0");
        }
        if let Some(tsconfig) = &self.tsconfig
            && !tsconfig.is_file()
        {
            diag.error(
                "compiler.tsconfig",
                format!("`{}` does not exist", tsconfig.display()),
            );
        }
    }
}
