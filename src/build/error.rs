//! Build error types.

use std::path::PathBuf;

use thiserror::Error;

use super::manifest::ManifestError;
use crate::compiler::CompileError;
use crate::core::Slug;
use crate::page::DiscoveryError;
use crate::render::RenderError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("`{first}` and `{second}` both map to `{slug}`")]
    SlugCollision {
        slug: Slug,
        first: String,
        second: String,
    },

    #[error("refusing to clean `{}`: {reason}", dir.display())]
    UnsafeBuildDirectory { dir: PathBuf, reason: &'static str },

    #[error("failed to compile `{page}`")]
    Compile {
        page: String,
        #[source]
        source: CompileError,
    },

    #[error("failed to render `{page}`")]
    Render {
        page: String,
        #[source]
        source: RenderError,
    },

    #[error("`{page}` panicked: {message}")]
    Panicked { page: String, message: String },

    #[error("I/O error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("failed to start build workers")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BuildError {
    pub(super) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
