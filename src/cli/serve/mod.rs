//! HTTP server for `pleb dev` and `pleb start`.
//!
//! Bound only after the build pipeline returned, so every request sees a
//! complete manifest. Requests run on a fixed rayon pool; a slow render
//! occupies one worker and never blocks the accept loop.

mod dev;
mod lifecycle;
mod response;
mod router;

pub use router::{DispatchError, Reply, Router};

use crate::{build::BuildOutput, compiler::Compiler, config::PlebConfig, debug, log};
use anyhow::{Context, Result};
use std::sync::Arc;
use tiny_http::Server;

/// Serve a finished build until Ctrl+C.
pub fn serve(config: &PlebConfig, output: BuildOutput, compiler: Arc<dyn Compiler>) -> Result<()> {
    let router = Arc::new(Router::new(config, output, compiler));
    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    lifecycle::register_shutdown(Arc::clone(&server))?;

    log!("serve"; "http://{} ({})", addr, config.mode);
    run_request_loop(&server, &router, config.serve.workers)
}

fn run_request_loop(server: &Server, router: &Arc<Router>, workers: usize) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("pleb-serve-{i}"))
        .build()
        .context("failed to create request workers")?;

    for request in server.incoming_requests() {
        let router = Arc::clone(router);
        pool.spawn(move || {
            let url = request.url().to_string();
            let reply = router.handle(&url);
            debug!("serve"; "{} {} {}", reply.status(), request.method(), url);
            if let Err(e) = response::send(request, reply) {
                debug!("serve"; "{}: {}", url, e);
            }
        });
    }
    Ok(())
}
