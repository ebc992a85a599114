//! Project build for `pleb build`, and the build step of `dev` and `start`.

use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};

use crate::{
    build::{BuildError, BuildOutput, Pipeline},
    compiler::{CommandCompiler, Compiler},
    config::PlebConfig,
    log,
    page::DiscoveryError,
};

/// Build the project with the configured bundler and runtime.
///
/// A missing pages directory is reported and exits with status 1.
pub fn build_project(config: &PlebConfig) -> Result<(BuildOutput, Arc<dyn Compiler>)> {
    let compiler = CommandCompiler::new(config);
    compiler.check().context("compiler toolchain unavailable")?;
    let compiler: Arc<dyn Compiler> = Arc::new(compiler);

    log!("build"; "{} build of {}", config.mode, config.root.display());
    let started = Instant::now();

    let output = match Pipeline::new(config, Arc::clone(&compiler)).run() {
        Ok(output) => output,
        Err(BuildError::Discovery(DiscoveryError::DirectoryNotFound(dir))) => {
            log!("error"; "pages directory `{}` not found", config.root_relative(&dir).display());
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("build failed"),
    };

    log!("build"; "done in {:.2}s", started.elapsed().as_secs_f64());
    Ok((output, compiler))
}
