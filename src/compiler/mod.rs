//! Compiler adapter: turns page sources into runnable modules.
//!
//! The bundler and the JavaScript runtime are external collaborators. The
//! rest of the crate only sees the [`Compiler`] trait:
//!
//! - `compile` writes a bundle for a target (browser hydration bundle, or a
//!   node server module)
//! - `load` turns a compiled server module into a [`PageRenderable`]
//!
//! [`CommandCompiler`] implements it by spawning the configured commands.

mod command;

pub use command::CommandCompiler;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::PageRenderable;
use crate::utils::exec::ExecError;

/// Platform a bundle is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Browser,
    Node,
}

impl Target {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Node => "node",
        }
    }
}

/// Module format of a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

impl OutputFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
            Self::Iife => "iife",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub target: Target,
    pub format: OutputFormat,
}

impl CompileOptions {
    /// Server module loaded by the render shim (always ESM).
    pub const fn server() -> Self {
        Self {
            target: Target::Node,
            format: OutputFormat::Esm,
        }
    }

    /// Client hydration bundle.
    pub const fn browser(format: OutputFormat) -> Self {
        Self {
            target: Target::Browser,
            format,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("`{0}` not found in PATH")]
    CommandNotFound(String),

    #[error("failed to bundle `{}`", path.display())]
    Bundle {
        path: PathBuf,
        #[source]
        source: ExecError,
    },

    #[error("server module `{}` does not exist", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("I/O error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bundler/runtime boundary.
pub trait Compiler: Send + Sync {
    /// Bundle `source` into `output`. Parent directories are created.
    fn compile(
        &self,
        source: &Path,
        output: &Path,
        options: CompileOptions,
    ) -> Result<(), CompileError>;

    /// Load a server module compiled with [`CompileOptions::server`].
    fn load(&self, module: &Path) -> Result<Arc<dyn PageRenderable>, CompileError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process compiler for pipeline and router tests.
    //!
    //! `compile` writes the page source verbatim; `load` renders the module
    //! file contents as markup. A source containing `COMPILE_ERROR` fails to
    //! compile, `RENDER_ERROR` fails to render and `SPLIT` is rendered as two
    //! chunks with a failure in between.

    use super::*;
    use crate::render::RenderError;
    use crate::page::ChunkIter;
    use parking_lot::Mutex;
    use std::fs;

    #[derive(Default)]
    pub struct FakeCompiler {
        pub compiled: Mutex<Vec<(PathBuf, Target)>>,
    }

    impl FakeCompiler {
        pub fn compiled_count(&self, target: Target) -> usize {
            self.compiled
                .lock()
                .iter()
                .filter(|(_, t)| *t == target)
                .count()
        }
    }

    impl Compiler for FakeCompiler {
        fn compile(
            &self,
            source: &Path,
            output: &Path,
            options: CompileOptions,
        ) -> Result<(), CompileError> {
            let io = |source| CompileError::Io {
                path: output.to_path_buf(),
                source,
            };
            let content = fs::read_to_string(source).map_err(io)?;
            if content.contains("COMPILE_ERROR") {
                return Err(CompileError::Bundle {
                    path: source.to_path_buf(),
                    source: ExecError::Timeout {
                        program: "fake".into(),
                        after: std::time::Duration::ZERO,
                    },
                });
            }
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent).map_err(io)?;
            }
            fs::write(output, &content).map_err(io)?;
            self.compiled
                .lock()
                .push((source.to_path_buf(), options.target));
            Ok(())
        }

        fn load(&self, module: &Path) -> Result<Arc<dyn PageRenderable>, CompileError> {
            let markup = fs::read_to_string(module)
                .map_err(|_| CompileError::ModuleNotFound(module.to_path_buf()))?;
            Ok(Arc::new(FakePage {
                markup: markup.trim().to_string(),
            }))
        }
    }

    pub struct FakePage {
        pub markup: String,
    }

    impl PageRenderable for FakePage {
        fn render_to_markup(&self) -> Result<String, RenderError> {
            self.render_chunks().collect()
        }

        fn render_chunks(&self) -> ChunkIter {
            if self.markup.contains("RENDER_ERROR") {
                return Box::new(std::iter::once(Err(RenderError::Failed(
                    "page threw".into(),
                ))));
            }
            if let Some((first, second)) = self.markup.split_once("SPLIT") {
                return Box::new(
                    vec![
                        Ok(first.to_string()),
                        Err(RenderError::Failed("boundary threw".into())),
                        Ok(second.to_string()),
                    ]
                    .into_iter(),
                );
            }
            Box::new(std::iter::once(Ok(self.markup.clone())))
        }
    }
}
