//! The build pipeline.
//!
//! ```text
//! Idle → DiscoveringPages → CompilingPage(i) → RenderingPage(i)
//!      → WritingManifest → CopyingAssets → Ready
//!                 (any step) ↘ Failed
//! ```
//!
//! Every run starts from an empty build directory. Pages are processed on a
//! bounded rayon pool, one task per page; the `collect` is the only join
//! point. Manifest entries are inserted after the join, and the manifest file
//! is written once, atomically. Nothing before that write is visible to the
//! router.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{BuildError, BuildManifest, ManifestBuilder, PageManifestEntry};
use crate::{
    compiler::{CompileOptions, Compiler},
    config::PlebConfig,
    core::{CHUNKS_DIR, SERVER_DIR, STATIC_DIR, Slug, slug},
    debug, log,
    logger::{ProgressLine, error_chain},
    page::{PageRegistry, PageRenderable, PageSource, discover_pages},
    render::{PageContext, Renderer},
    utils::{
        fs::{copy_dir_files, recreate_dir, write_atomic},
        path::is_within,
        plural::plural_count,
    },
};

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutput {
    pub manifest: BuildManifest,
    pub registry: PageRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    DiscoveringPages,
    CompilingPage(usize),
    RenderingPage(usize),
    WritingManifest,
    CopyingAssets,
    Ready,
    Failed,
}

/// Where one page's artifacts go, relative to the build directory.
#[derive(Debug, Clone)]
pub struct PagePlan {
    pub source: PageSource,
    pub slug: Slug,
    /// `about.html`
    pub markup: String,
    /// `static/chunks/about.js`
    pub script: String,
    /// `server/about.mjs`
    pub server_module: String,
    /// Rendered per request instead of prerendered.
    pub dynamic: bool,
}

impl PagePlan {
    fn new(source: PageSource, dynamic: &FxHashSet<Slug>) -> Result<Self, slug::SlugError> {
        let relative = source.relative.as_str();
        let slug = slug::to_slug(relative)?;
        let markup = slug::to_html_artifact_name(relative)?;
        let script = format!(
            "{STATIC_DIR}/{CHUNKS_DIR}/{}",
            slug::to_script_name(relative)?
        );
        let server_module = format!("{SERVER_DIR}/{}", slug::to_server_module_name(relative)?);
        Ok(Self {
            dynamic: dynamic.contains(&slug),
            source,
            slug,
            markup,
            script,
            server_module,
        })
    }

    pub fn entry(&self) -> PageManifestEntry {
        PageManifestEntry {
            markup: self.markup.clone(),
            script: self.script.clone(),
        }
    }
}

/// Plan every source, rejecting two sources that map to one slug.
pub fn plan_pages(
    sources: Vec<PageSource>,
    dynamic: &FxHashSet<Slug>,
) -> Result<Vec<PagePlan>, BuildError> {
    let mut seen: FxHashMap<Slug, String> = FxHashMap::default();
    let mut plans = Vec::with_capacity(sources.len());

    for source in sources {
        let plan = match PagePlan::new(source, dynamic) {
            Ok(plan) => plan,
            Err(e) => {
                log!("warning"; "skipping page: {}", e);
                continue;
            }
        };
        if let Some(first) = seen.get(&plan.slug) {
            return Err(BuildError::SlugCollision {
                slug: plan.slug,
                first: first.clone(),
                second: plan.source.relative,
            });
        }
        seen.insert(plan.slug.clone(), plan.source.relative.clone());
        plans.push(plan);
    }

    Ok(plans)
}

struct PageOutput {
    page: Arc<dyn PageRenderable>,
    rendered: bool,
}

pub struct Pipeline<'a> {
    config: &'a PlebConfig,
    compiler: Arc<dyn Compiler>,
    renderer: Renderer,
    state: Mutex<BuildState>,
    quiet: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PlebConfig, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            config,
            compiler,
            renderer: Renderer::new(config.document.clone()),
            state: Mutex::new(BuildState::Idle),
            quiet: false,
        }
    }

    /// Hide the progress line.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn state(&self) -> BuildState {
        *self.state.lock()
    }

    fn set_state(&self, state: BuildState) {
        *self.state.lock() = state;
    }

    /// Run a full build.
    pub fn run(&self) -> Result<BuildOutput, BuildError> {
        let result = self.run_steps();
        self.set_state(match result {
            Ok(_) => BuildState::Ready,
            Err(_) => BuildState::Failed,
        });
        result
    }

    fn run_steps(&self) -> Result<BuildOutput, BuildError> {
        let build = &self.config.build;

        self.set_state(BuildState::DiscoveringPages);
        self.ensure_build_dir()?;
        let sources = discover_pages(&build.pages)?;
        let plans = plan_pages(sources, &build.dynamic_slugs())?;
        if plans.is_empty() {
            log!("warning"; "no pages found in `{}`", self.config.root_relative(&build.pages).display());
        }

        let (manifest, registry) = if self.config.mode.is_dev() {
            debug!("build"; "{} rendered on request", plural_count(plans.len(), "page"));
            (BuildManifest::default(), PageRegistry::new())
        } else {
            self.build_pages(&plans)?
        };

        self.set_state(BuildState::WritingManifest);
        manifest.persist(&build.output)?;

        self.set_state(BuildState::CopyingAssets);
        let assets = self.copy_public()?;

        log!(
            "build";
            "{} prerendered, {} dynamic, {} copied",
            plural_count(manifest.len(), "page"),
            registry.len().saturating_sub(manifest.len()),
            plural_count(assets, "asset")
        );

        Ok(BuildOutput { manifest, registry })
    }

    /// Refuse to wipe anything the project still needs, then start empty.
    fn ensure_build_dir(&self) -> Result<(), BuildError> {
        let build = &self.config.build;
        let dir = &build.output;

        let guarded = [
            (&self.config.root, "it contains the project root"),
            (&build.pages, "it contains the pages directory"),
            (&build.public, "it contains the public directory"),
        ];
        for (protected, reason) in guarded {
            if is_within(protected, dir) {
                return Err(BuildError::UnsafeBuildDirectory {
                    dir: dir.clone(),
                    reason,
                });
            }
        }
        let enclosing = [
            (&build.pages, "it is inside the pages directory"),
            (&build.public, "it is inside the public directory"),
        ];
        for (protected, reason) in enclosing {
            if is_within(dir, protected) {
                return Err(BuildError::UnsafeBuildDirectory {
                    dir: dir.clone(),
                    reason,
                });
            }
        }

        recreate_dir(dir).map_err(BuildError::io(dir))
    }

    fn build_pages(&self, plans: &[PagePlan]) -> Result<(BuildManifest, PageRegistry), BuildError> {
        let allow_partial = self.config.build.allow_partial;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.build.worker_count())
            .thread_name(|i| format!("pleb-build-{i}"))
            .build()?;

        let has_error = AtomicBool::new(false);
        let progress = (!self.quiet && !plans.is_empty())
            .then(|| ProgressLine::new(&[("pages", plans.len())]));

        let outcomes: Vec<Option<Result<PageOutput, BuildError>>> = pool.install(|| {
            plans
                .par_iter()
                .enumerate()
                .map(|(index, plan)| {
                    if !allow_partial && has_error.load(Ordering::Relaxed) {
                        return None;
                    }
                    let outcome = self.process_page_guarded(index, plan);
                    if let Err(e) = &outcome {
                        has_error.store(true, Ordering::Relaxed);
                        log!("error"; "{}: {}", plan.source.relative, error_chain(e));
                    }
                    if let Some(p) = &progress {
                        p.inc("pages");
                    }
                    Some(outcome)
                })
                .collect()
        });

        if let Some(p) = progress {
            p.finish();
        }

        let mut manifest = ManifestBuilder::new();
        let mut registry = PageRegistry::new();
        let mut excluded = 0;
        for (plan, outcome) in plans.iter().zip(outcomes) {
            match outcome {
                Some(Ok(output)) => {
                    registry.insert(plan.slug.clone(), output.page, plan.script.clone());
                    if output.rendered {
                        manifest.insert(plan.slug.clone(), plan.entry())?;
                    }
                }
                Some(Err(_)) if allow_partial => excluded += 1,
                Some(Err(e)) => return Err(e),
                None => {}
            }
        }
        if excluded > 0 {
            log!("warning"; "{} excluded from the build", plural_count(excluded, "failed page"));
        }

        Ok((manifest.finish(), registry))
    }

    /// [`Self::process_page`] with panics turned into errors.
    fn process_page_guarded(&self, index: usize, plan: &PagePlan) -> Result<PageOutput, BuildError> {
        catch_unwind(AssertUnwindSafe(|| self.process_page(index, plan))).unwrap_or_else(|payload| {
            Err(BuildError::Panicked {
                page: plan.source.relative.clone(),
                message: panic_message(payload.as_ref()),
            })
        })
    }

    fn process_page(&self, index: usize, plan: &PagePlan) -> Result<PageOutput, BuildError> {
        let build_dir: &Path = &self.config.build.output;
        let page_id = &plan.source.relative;
        let compile_err = |source| BuildError::Compile {
            page: page_id.clone(),
            source,
        };

        self.set_state(BuildState::CompilingPage(index));
        let module = build_dir.join(&plan.server_module);
        self.compiler
            .compile(&plan.source.path, &module, CompileOptions::server())
            .map_err(compile_err)?;
        self.compiler
            .compile(
                &plan.source.path,
                &build_dir.join(&plan.script),
                CompileOptions::browser(self.config.compiler.format),
            )
            .map_err(compile_err)?;
        let page = self.compiler.load(&module).map_err(compile_err)?;

        if plan.dynamic {
            debug!("build"; "{} is dynamic, not prerendered", plan.slug);
            return Ok(PageOutput {
                page,
                rendered: false,
            });
        }

        self.set_state(BuildState::RenderingPage(index));
        let ctx = PageContext::new(&plan.slug, &plan.script);
        let html = self
            .renderer
            .render_to_string(page.as_ref(), &ctx)
            .map_err(|source| BuildError::Render {
                page: page_id.clone(),
                source,
            })?;

        let path = build_dir.join(&plan.markup);
        write_atomic(&path, html).map_err(BuildError::io(&path))?;
        debug!("build"; "{} -> {}", plan.slug, plan.markup);

        Ok(PageOutput {
            page,
            rendered: true,
        })
    }

    /// Copy the public directory into `<build>/static/`.
    fn copy_public(&self) -> Result<usize, BuildError> {
        let public = &self.config.build.public;
        if !public.is_dir() {
            log!("warning"; "public directory `{}` not found, no assets copied", self.config.root_relative(public).display());
            return Ok(0);
        }

        let dest = self.config.build.output.join(STATIC_DIR);
        let report = copy_dir_files(public, &dest).map_err(BuildError::io(public))?;
        for skipped in &report.skipped {
            log!("warning"; "`{}` already exists, not overwritten", self.config.root_relative(skipped).display());
        }
        Ok(report.copied)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
