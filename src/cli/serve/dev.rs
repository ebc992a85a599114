//! On-demand compilation for the development server.
//!
//! Every request compiles from the live page sources into its own scratch
//! directory under `<build>/server/`, so concurrent requests never share
//! output files. Compiles of one source are still serialized through a
//! per-source lock.

use std::{
    fs,
    path::PathBuf,
    sync::Arc,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tempfile::TempDir;

use super::router::DispatchError;
use crate::{
    compiler::{CompileOptions, Compiler, OutputFormat},
    config::PlebConfig,
    core::{DEV_PREFIX, SERVER_DIR, Slug, slug},
    debug,
    page::{PageRenderable, PageSource, find_page, find_page_by_stem},
};

/// A freshly compiled page.
///
/// The scratch directory holds the server module and must outlive the render.
pub struct DevPage {
    pub page: Arc<dyn PageRenderable>,
    pub script_url: String,
    pub scratch: TempDir,
}

pub struct DevCompiler {
    compiler: Arc<dyn Compiler>,
    pages_dir: PathBuf,
    scratch_dir: PathBuf,
    format: OutputFormat,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DevCompiler {
    pub fn new(config: &PlebConfig, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            pages_dir: config.build.pages.clone(),
            scratch_dir: config.build.output.join(SERVER_DIR),
            format: config.compiler.format,
            locks: DashMap::new(),
        }
    }

    /// Compile the page at `slug` into a server module and load it.
    pub fn page(&self, slug: &Slug) -> Result<DevPage, DispatchError> {
        let source = find_page(&self.pages_dir, slug)?
            .ok_or_else(|| DispatchError::SourceMissing(slug.to_string()))?;
        let stem = slug::to_stem_path(&source.relative)
            .map_err(|_| DispatchError::SourceMissing(slug.to_string()))?;
        let script_url = dev_script_url(stem);

        let scratch = self.scratch()?;
        let module = scratch.path().join("page.mjs");
        self.compile(&source, &module, CompileOptions::server())?;
        let page = self.compiler.load(&module)?;

        Ok(DevPage {
            page,
            script_url,
            scratch,
        })
    }

    /// Compile the hydration bundle of the page whose stem path is `stem`.
    pub fn script(&self, stem: &str) -> Result<Vec<u8>, DispatchError> {
        let source = find_page_by_stem(&self.pages_dir, stem)?
            .ok_or_else(|| DispatchError::SourceMissing(format!("{DEV_PREFIX}{stem}.js")))?;

        let scratch = self.scratch()?;
        let output = scratch.path().join("page.js");
        self.compile(&source, &output, CompileOptions::browser(self.format))?;

        fs::read(&output).map_err(|source| DispatchError::Io {
            path: output.clone(),
            source,
        })
    }

    fn compile(
        &self,
        source: &PageSource,
        output: &std::path::Path,
        options: CompileOptions,
    ) -> Result<(), DispatchError> {
        let lock = self.lock(&source.relative);
        let _guard = lock.lock();
        debug!("dev"; "compiling {} for {}", source.relative, options.target.as_str());
        self.compiler.compile(&source.path, output, options)?;
        Ok(())
    }

    fn lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    fn scratch(&self) -> Result<TempDir, DispatchError> {
        let io = |source| DispatchError::Io {
            path: self.scratch_dir.clone(),
            source,
        };
        fs::create_dir_all(&self.scratch_dir).map_err(io)?;
        tempfile::Builder::new()
            .prefix(".pleb-dev-")
            .tempdir_in(&self.scratch_dir)
            .map_err(io)
    }
}

/// `/__pleb/dev/<stem>.js`, each stem segment percent-encoded.
pub fn dev_script_url(stem: &str) -> String {
    let encoded: Vec<String> = stem
        .split('/')
        .map(|segment| utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string())
        .collect();
    format!("{DEV_PREFIX}{}.js", encoded.join("/"))
}
