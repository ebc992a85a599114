//! Page rendering into the document shell.
//!
//! Two outputs over the same page:
//!
//! - [`Renderer::render_to_string`]: the whole document, used at build time
//! - [`Renderer::render_stream`]: a [`RenderStream`] of [`RenderEvent`]s,
//!   used for dynamic responses
//!
//! # Stream events
//!
//! ```text
//! ShellReady(head + first chunk) → Chunk* → Chunk(tail) → AllReady
//!        │                           │
//!        └─ ShellError (first chunk  └─ Error (later chunk failed,
//!           failed, nothing sent)       stream ends)
//! ```
//!
//! Rendering never touches the filesystem or the manifest.

mod document;

pub use document::DocumentShell;

use std::time::Duration;

use thiserror::Error;

use crate::config::DocumentConfig;
use crate::core::{PLEB_PREFIX, Slug};
use crate::page::{ChunkIter, PageRenderable};
use crate::utils::exec::ExecError;

/// Body of the response when the shell could not be rendered.
pub const SHELL_ERROR_HTML: &str = "<!doctype html><p>Loading...</p>";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),

    #[error("render timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("render output is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("failed to read render output")]
    Io(#[source] std::io::Error),
}

/// Per-page render inputs.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    pub slug: &'a Slug,
    /// URL of the client bundle that hydrates the page.
    pub script_url: String,
}

impl<'a> PageContext<'a> {
    /// Context for a page whose bundle is `script` (relative to the build dir).
    pub fn new(slug: &'a Slug, script: &str) -> Self {
        Self {
            slug,
            script_url: script_url(script),
        }
    }

    pub fn with_script_url(slug: &'a Slug, script_url: String) -> Self {
        Self { slug, script_url }
    }
}

/// URL serving a build-relative path (`static/chunks/a.js` -> `/__pleb/static/chunks/a.js`).
pub fn script_url(script: &str) -> String {
    format!("{PLEB_PREFIX}/{}", script.trim_start_matches('/'))
}

/// Progressive rendering milestones.
#[derive(Debug)]
pub enum RenderEvent {
    /// Document head, root open tag and the first markup chunk.
    ShellReady(String),
    Chunk(String),
    AllReady,
    /// The page failed before producing any markup.
    ShellError(RenderError),
    /// The page failed after the shell was produced.
    Error(RenderError),
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    document: DocumentConfig,
}

impl Renderer {
    pub fn new(document: DocumentConfig) -> Self {
        Self { document }
    }

    fn shell(&self, ctx: &PageContext<'_>) -> DocumentShell {
        DocumentShell::new(&self.document, ctx.slug, &ctx.script_url)
    }

    /// Render the whole document.
    pub fn render_to_string(
        &self,
        page: &dyn PageRenderable,
        ctx: &PageContext<'_>,
    ) -> Result<String, RenderError> {
        let markup = page.render_to_markup()?;
        Ok(self.shell(ctx).wrap(&markup))
    }

    /// Render as a stream of events.
    pub fn render_stream(&self, page: &dyn PageRenderable, ctx: &PageContext<'_>) -> RenderStream {
        let DocumentShell { head, tail } = self.shell(ctx);
        RenderStream {
            chunks: page.render_chunks(),
            head: Some(head),
            tail: Some(tail),
            state: StreamState::Shell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Shell,
    Body,
    Finished,
    Done,
}

/// Iterator of [`RenderEvent`]s for one render.
pub struct RenderStream {
    chunks: ChunkIter,
    head: Option<String>,
    tail: Option<String>,
    state: StreamState,
}

impl Iterator for RenderStream {
    type Item = RenderEvent;

    fn next(&mut self) -> Option<RenderEvent> {
        match self.state {
            StreamState::Shell => {
                let mut head = self.head.take().unwrap_or_default();
                match self.chunks.next() {
                    Some(Ok(first)) => {
                        self.state = StreamState::Body;
                        head.push_str(&first);
                        Some(RenderEvent::ShellReady(head))
                    }
                    None => {
                        self.state = StreamState::Body;
                        Some(RenderEvent::ShellReady(head))
                    }
                    Some(Err(e)) => {
                        self.state = StreamState::Done;
                        Some(RenderEvent::ShellError(e))
                    }
                }
            }
            StreamState::Body => match self.chunks.next() {
                Some(Ok(chunk)) => Some(RenderEvent::Chunk(chunk)),
                Some(Err(e)) => {
                    self.state = StreamState::Done;
                    Some(RenderEvent::Error(e))
                }
                None => {
                    self.state = StreamState::Finished;
                    Some(RenderEvent::Chunk(self.tail.take().unwrap_or_default()))
                }
            },
            StreamState::Finished => {
                self.state = StreamState::Done;
                Some(RenderEvent::AllReady)
            }
            StreamState::Done => None,
        }
    }
}
