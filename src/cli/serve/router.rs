//! Request dispatch.
//!
//! ```text
//! /__pleb/static/*     → StaticFiles   (<build>/static/)
//! /__pleb/dev/<p>.js   → DevScripts    (development only)
//! anything else        → page handler:
//!     slug in manifest → prerendered document
//!     production       → registry page, streamed
//!     development      → compile from source, streamed
//! ```
//!
//! The router only reads the manifest it was constructed with; a build
//! never mutates it behind a running server.

use std::{
    fmt,
    fs::File,
    io::{self, Read},
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
    sync::Arc,
};

use percent_encoding::percent_decode_str;
use tempfile::TempDir;
use thiserror::Error;

use super::dev::{DevCompiler, DevPage};
use crate::{
    build::{BuildManifest, BuildOutput},
    compiler::{CompileError, Compiler},
    config::PlebConfig,
    core::{DEV_PREFIX, STATIC_DIR, STATIC_PREFIX, Slug},
    debug, log,
    logger::error_chain,
    page::{DiscoveryError, PageRegistry, PageRenderable},
    render::{PageContext, RenderError, RenderEvent, RenderStream, Renderer, SHELL_ERROR_HTML},
    utils::{
        mime::{self, types},
        path::join_url_path,
    },
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("`{slug}` is in the build manifest but `{}` is missing", path.display())]
    ArtifactMissing { slug: Slug, path: PathBuf },

    #[error("no page for `{0}`")]
    SourceMissing(String),

    #[error("no asset at `{0}`")]
    AssetMissing(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("page shell failed to render")]
    Shell(#[source] RenderError),

    #[error("I/O error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What to send back.
pub enum Reply {
    /// An opened file, sent with a known length.
    File {
        file: File,
        len: u64,
        path: PathBuf,
        content_type: &'static str,
    },
    /// An in-memory body.
    Body {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// A document rendered while it is sent.
    Stream(RenderBody),
}

impl Reply {
    pub fn empty(status: u16) -> Self {
        Self::Body {
            status,
            content_type: types::PLAIN,
            body: Vec::new(),
        }
    }

    pub const fn status(&self) -> u16 {
        match self {
            Self::File { .. } | Self::Stream(_) => 200,
            Self::Body { status, .. } => *status,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File {
                path,
                len,
                content_type,
                ..
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("len", len)
                .field("content_type", content_type)
                .finish(),
            Self::Body { status, body, .. } => f
                .debug_struct("Body")
                .field("status", status)
                .field("len", &body.len())
                .finish(),
            Self::Stream(body) => f.debug_tuple("Stream").field(&body.slug).finish(),
        }
    }
}

/// Request-scoped result of the manifest lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    pub slug: Slug,
    /// Prerendered document, when the manifest lists the slug.
    pub artifact_path: Option<PathBuf>,
}

/// A request handler that runs before the page handler.
pub trait Middleware: Send + Sync {
    /// Handle `path` (query stripped), or `None` to pass it on.
    fn handle(&self, path: &str) -> Option<Result<Reply, DispatchError>>;
}

/// Serves `<build>/static/` under `/__pleb/static/`.
struct StaticFiles {
    dir: PathBuf,
}

impl Middleware for StaticFiles {
    fn handle(&self, path: &str) -> Option<Result<Reply, DispatchError>> {
        let relative = path.strip_prefix(STATIC_PREFIX)?;
        let missing = || DispatchError::AssetMissing(path.to_string());

        let Some(file_path) = percent_decode_str(relative)
            .decode_utf8()
            .ok()
            .and_then(|decoded| join_url_path(&self.dir, &decoded))
        else {
            return Some(Err(missing()));
        };

        Some(match open_file(&file_path) {
            Ok(Some((file, len))) => Ok(Reply::File {
                file,
                len,
                content_type: mime::from_path(&file_path),
                path: file_path,
            }),
            Ok(None) => Err(missing()),
            Err(source) => Err(DispatchError::Io {
                path: file_path,
                source,
            }),
        })
    }
}

/// Compiles hydration bundles on request in development.
struct DevScripts {
    dev: Arc<DevCompiler>,
}

impl Middleware for DevScripts {
    fn handle(&self, path: &str) -> Option<Result<Reply, DispatchError>> {
        let rest = path.strip_prefix(DEV_PREFIX)?;
        let stem = rest
            .strip_suffix(".js")
            .and_then(|stem| percent_decode_str(stem).decode_utf8().ok());

        Some(match stem {
            Some(stem) => self.dev.script(&stem).map(|body| Reply::Body {
                status: 200,
                content_type: types::JAVASCRIPT,
                body,
            }),
            None => Err(DispatchError::AssetMissing(path.to_string())),
        })
    }
}

pub struct Router {
    build_dir: PathBuf,
    manifest: BuildManifest,
    registry: PageRegistry,
    renderer: Renderer,
    dev: Option<Arc<DevCompiler>>,
    middleware: Vec<Box<dyn Middleware>>,
}

impl Router {
    pub fn new(config: &PlebConfig, output: BuildOutput, compiler: Arc<dyn Compiler>) -> Self {
        let build_dir = config.build.output.clone();
        let mut middleware: Vec<Box<dyn Middleware>> = vec![Box::new(StaticFiles {
            dir: build_dir.join(STATIC_DIR),
        })];

        let dev = config
            .mode
            .is_dev()
            .then(|| Arc::new(DevCompiler::new(config, compiler)));
        if let Some(dev) = &dev {
            middleware.push(Box::new(DevScripts {
                dev: Arc::clone(dev),
            }));
        }

        Self {
            build_dir,
            manifest: output.manifest,
            registry: output.registry,
            renderer: Renderer::new(config.document.clone()),
            dev,
            middleware,
        }
    }

    /// Answer `url`. Failures become status codes; nothing propagates.
    pub fn handle(&self, url: &str) -> Reply {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(url)));
        match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => error_reply(url, &e),
            Err(_) => {
                log!("error"; "{}: request handler panicked", url);
                Reply::empty(500)
            }
        }
    }

    pub fn dispatch(&self, url: &str) -> Result<Reply, DispatchError> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        for middleware in &self.middleware {
            if let Some(result) = middleware.handle(path) {
                return result;
            }
        }
        self.page(url)
    }

    /// Derive the slug of `url` and look it up in the manifest.
    pub fn resolve(&self, url: &str) -> Result<ResolvedPage, DispatchError> {
        let slug =
            Slug::from_request(url).map_err(|_| DispatchError::SourceMissing(url.to_string()))?;
        let artifact_path = self
            .manifest
            .get(&slug)
            .map(|entry| self.build_dir.join(&entry.markup));
        Ok(ResolvedPage {
            slug,
            artifact_path,
        })
    }

    fn page(&self, url: &str) -> Result<Reply, DispatchError> {
        let ResolvedPage {
            slug,
            artifact_path,
        } = self.resolve(url)?;

        if let Some(path) = artifact_path {
            // Opened here so a vanished artifact is still a 404
            let opened = open_file(&path).map_err(|source| DispatchError::Io {
                path: path.clone(),
                source,
            })?;
            let Some((file, len)) = opened else {
                return Err(DispatchError::ArtifactMissing { slug, path });
            };
            return Ok(Reply::File {
                file,
                len,
                path,
                content_type: types::HTML,
            });
        }

        match &self.dev {
            Some(dev) => {
                let DevPage {
                    page,
                    script_url,
                    scratch,
                } = dev.page(&slug)?;
                let ctx = PageContext::with_script_url(&slug, script_url);
                self.stream(&slug, page.as_ref(), &ctx, Some(scratch))
            }
            None => {
                let entry = self
                    .registry
                    .get(&slug)
                    .ok_or_else(|| DispatchError::SourceMissing(slug.to_string()))?;
                let ctx = PageContext::new(&slug, &entry.script);
                self.stream(&slug, entry.page.as_ref(), &ctx, None)
            }
        }
    }

    /// Wait for the shell; only then is a 200 committed.
    fn stream(
        &self,
        slug: &Slug,
        page: &dyn PageRenderable,
        ctx: &PageContext<'_>,
        scratch: Option<TempDir>,
    ) -> Result<Reply, DispatchError> {
        let mut events = self.renderer.render_stream(page, ctx);
        match events.next() {
            Some(RenderEvent::ShellReady(head)) => Ok(Reply::Stream(RenderBody {
                slug: slug.clone(),
                events,
                pending: head.into_bytes(),
                offset: 0,
                _scratch: scratch,
            })),
            Some(RenderEvent::ShellError(e) | RenderEvent::Error(e)) => {
                Err(DispatchError::Shell(e))
            }
            _ => Err(DispatchError::Shell(RenderError::Failed(
                "no shell produced".into(),
            ))),
        }
    }
}

/// Open a regular file with its length; `None` when there is no such file.
fn open_file(path: &Path) -> io::Result<Option<(File, u64)>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let metadata = file.metadata()?;
    Ok(metadata.is_file().then(|| (file, metadata.len())))
}

fn error_reply(url: &str, err: &DispatchError) -> Reply {
    match err {
        DispatchError::SourceMissing(_) | DispatchError::AssetMissing(_) => {
            debug!("serve"; "404 {}", url);
            Reply::empty(404)
        }
        DispatchError::ArtifactMissing { .. } => {
            log!("error"; "{}", err);
            Reply::empty(404)
        }
        DispatchError::Shell(_) => {
            log!("error"; "{}: {}", url, error_chain(err));
            Reply::Body {
                status: 500,
                content_type: types::HTML,
                body: SHELL_ERROR_HTML.as_bytes().to_vec(),
            }
        }
        _ => {
            log!("error"; "{}: {}", url, error_chain(err));
            Reply::empty(500)
        }
    }
}

/// Response body pulling markup from a render as the client reads.
///
/// A failure after the shell is logged and ends the body early.
pub struct RenderBody {
    slug: Slug,
    events: RenderStream,
    pending: Vec<u8>,
    offset: usize,
    _scratch: Option<TempDir>,
}

impl Read for RenderBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.pending.len() {
            match self.events.next() {
                Some(RenderEvent::ShellReady(chunk) | RenderEvent::Chunk(chunk)) => {
                    self.pending = chunk.into_bytes();
                    self.offset = 0;
                }
                Some(RenderEvent::Error(e) | RenderEvent::ShellError(e)) => {
                    log!("error"; "{}: {}", self.slug, error_chain(&e));
                    return Ok(0);
                }
                Some(RenderEvent::AllReady) | None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}
