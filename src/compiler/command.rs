//! Compiler backed by external commands (esbuild + node by default).
//!
//! # Bundling
//!
//! Every page is bundled from a generated entry that imports the page
//! source, never from the source itself:
//!
//! | Target    | Entry               | Output                          |
//! |-----------|---------------------|---------------------------------|
//! | `Node`    | `SERVER_ENTRY`      | `server/<name>.mjs`, exports `render` |
//! | `Browser` | `HYDRATE_ENTRY`     | `static/chunks/<name>.js`       |
//!
//! Server bundles keep packages external so React resolves from the
//! project's `node_modules`.
//!
//! # Rendering
//!
//! A loaded module is a [`ScriptPage`]: each render spawns the runtime on the
//! render shim, which streams the page markup to stdout. A reader thread
//! forwards stdout chunks over a channel; the consumer enforces the render
//! deadline and kills the child when it passes.

use std::{
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    process::Child,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use tempfile::NamedTempFile;

use super::{CompileError, CompileOptions, Compiler, Target};
use crate::config::PlebConfig;
use crate::core::SERVER_DIR;
use crate::debug;
use crate::embed::compiler::{
    EntryVars, HYDRATE_ENTRY, RENDER_SHIM, RENDER_SHIM_NAME, SERVER_ENTRY,
};
use crate::page::{ChunkIter, PageRenderable};
use crate::render::RenderError;
use crate::utils::exec::{Cmd, ExecError, wait_with_deadline};
use crate::utils::fs::write_atomic;

/// Read buffer for render output.
const CHUNK_SIZE: usize = 8 * 1024;

/// Chunks buffered between the reader thread and the consumer.
const CHANNEL_CAPACITY: usize = 16;

pub struct CommandCompiler {
    bundler: Vec<String>,
    runtime: Vec<String>,
    tsconfig: Option<PathBuf>,
    root: PathBuf,
    shim_dir: PathBuf,
    timeout: Duration,
    render_timeout: Duration,
}

impl CommandCompiler {
    pub fn new(config: &PlebConfig) -> Self {
        Self {
            bundler: config.compiler.bundler.clone(),
            runtime: config.compiler.runtime.clone(),
            tsconfig: config.compiler.tsconfig.clone(),
            root: config.root.clone(),
            shim_dir: config.build.output.join(SERVER_DIR),
            timeout: config.compiler.timeout(),
            render_timeout: config.compiler.render_timeout(),
        }
    }

    /// Verify the bundler and runtime programs can be found.
    pub fn check(&self) -> Result<(), CompileError> {
        for command in [&self.bundler, &self.runtime] {
            let program = command.first().map(String::as_str).unwrap_or_default();
            which::which(program).map_err(|_| CompileError::CommandNotFound(program.into()))?;
        }
        Ok(())
    }

    /// Write the entry wrapper for `source` next to `output`.
    ///
    /// The temp file is removed when the returned handle drops.
    fn write_entry(
        &self,
        source: &Path,
        output: &Path,
        target: Target,
    ) -> Result<NamedTempFile, CompileError> {
        let dir = output.parent().unwrap_or(self.root.as_path());
        let io = |source| CompileError::Io {
            path: dir.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io)?;

        let source = source.to_string_lossy();
        let vars = EntryVars { source: &source };
        let content = match target {
            Target::Browser => HYDRATE_ENTRY.render(&vars),
            Target::Node => SERVER_ENTRY.render(&vars),
        };

        let mut entry = tempfile::Builder::new()
            .prefix(".pleb-entry-")
            .suffix(".mjs")
            .tempfile_in(dir)
            .map_err(io)?;
        std::io::Write::write_all(&mut entry, content.as_bytes()).map_err(io)?;
        Ok(entry)
    }

    /// Write the render shim unless it is already in place.
    fn ensure_shim(&self) -> Result<PathBuf, CompileError> {
        let shim = self.shim_dir.join(RENDER_SHIM_NAME);
        let up_to_date = std::fs::read_to_string(&shim).is_ok_and(|s| s == RENDER_SHIM);
        if !up_to_date {
            write_atomic(&shim, RENDER_SHIM).map_err(|source| CompileError::Io {
                path: shim.clone(),
                source,
            })?;
        }
        Ok(shim)
    }
}

impl Compiler for CommandCompiler {
    fn compile(
        &self,
        source: &Path,
        output: &Path,
        options: CompileOptions,
    ) -> Result<(), CompileError> {
        let entry = self.write_entry(source, output, options.target)?;

        let mut cmd = Cmd::from_slice(self.bundler.as_slice())
            .arg(entry.path())
            .arg("--bundle")
            .arg("--jsx=automatic")
            .arg("--log-level=warning")
            .arg(format!("--platform={}", options.target.as_str()))
            .arg(format!("--format={}", options.format))
            .arg(format!("--outfile={}", output.display()));
        if options.target == Target::Node {
            cmd = cmd.arg("--packages=external");
        }
        if let Some(tsconfig) = &self.tsconfig {
            cmd = cmd.arg(format!("--tsconfig={}", tsconfig.display()));
        }

        debug!("compile"; "{} -> {}", source.display(), output.display());
        cmd.cwd(&self.root)
            .timeout(self.timeout)
            .run()
            .map_err(|source_err| CompileError::Bundle {
                path: source.to_path_buf(),
                source: source_err,
            })?;
        Ok(())
    }

    fn load(&self, module: &Path) -> Result<Arc<dyn PageRenderable>, CompileError> {
        if !module.is_file() {
            return Err(CompileError::ModuleNotFound(module.to_path_buf()));
        }
        let shim = self.ensure_shim()?;
        Ok(Arc::new(ScriptPage {
            runtime: self.runtime.clone(),
            shim,
            module: module.to_path_buf(),
            cwd: self.root.clone(),
            timeout: self.render_timeout,
        }))
    }
}

/// A compiled server module rendered by the runtime.
#[derive(Debug, Clone)]
pub struct ScriptPage {
    runtime: Vec<String>,
    shim: PathBuf,
    module: PathBuf,
    cwd: PathBuf,
    timeout: Duration,
}

impl ScriptPage {
    fn spawn(&self) -> Result<ScriptChunks, RenderError> {
        let cmd = Cmd::from_slice(self.runtime.as_slice())
            .arg(&self.shim)
            .arg(&self.module)
            .cwd(&self.cwd)
            .envs([("NODE_ENV", "production")]);
        let program = cmd.program_name();
        let mut child = cmd.spawn_piped()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (tx, rx) = channel::bounded(CHANNEL_CAPACITY);
        thread::spawn(move || {
            let Some(mut stdout) = stdout else { return };
            let mut buf = [0u8; CHUNK_SIZE];
            let mut pending: Vec<u8> = Vec::new();
            loop {
                let n = match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(RenderError::Io(e)));
                        return;
                    }
                };
                pending.extend_from_slice(&buf[..n]);
                match take_utf8(&mut pending) {
                    Ok(Some(chunk)) => {
                        if tx.send(Ok(chunk)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                }
            }
            if !pending.is_empty() {
                let _ = tx.send(Err(RenderError::InvalidUtf8));
            }
        });

        let stderr = thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf);
            }
            buf
        });

        Ok(ScriptChunks {
            rx,
            child: Some(child),
            stderr: Some(stderr),
            program,
            timeout: self.timeout,
            deadline: Instant::now() + self.timeout,
        })
    }
}

impl PageRenderable for ScriptPage {
    fn render_to_markup(&self) -> Result<String, RenderError> {
        self.render_chunks().collect()
    }

    fn render_chunks(&self) -> ChunkIter {
        match self.spawn() {
            Ok(chunks) => Box::new(chunks),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }
}

/// Split the longest valid UTF-8 prefix off `pending`.
///
/// An incomplete sequence at the end stays pending for the next read.
fn take_utf8(pending: &mut Vec<u8>) -> Result<Option<String>, RenderError> {
    let valid = match std::str::from_utf8(pending) {
        Ok(s) => s.len(),
        Err(e) if e.error_len().is_some() => return Err(RenderError::InvalidUtf8),
        Err(e) => e.valid_up_to(),
    };
    if valid == 0 {
        return Ok(None);
    }
    let rest = pending.split_off(valid);
    let chunk = std::mem::replace(pending, rest);
    String::from_utf8(chunk)
        .map(Some)
        .map_err(|_| RenderError::InvalidUtf8)
}

/// Markup chunks of one running render.
struct ScriptChunks {
    rx: Receiver<Result<String, RenderError>>,
    child: Option<Child>,
    stderr: Option<thread::JoinHandle<String>>,
    program: String,
    timeout: Duration,
    deadline: Instant,
}

impl ScriptChunks {
    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Reap the child after stdout closed; a non-zero exit is a render failure.
    fn finish(&mut self) -> Option<Result<String, RenderError>> {
        let mut child = self.child.take()?;
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let status = match wait_with_deadline(&mut child, remaining, &self.program) {
            Ok(status) => status,
            Err(ExecError::Timeout { .. }) => return Some(Err(RenderError::Timeout(self.timeout))),
            Err(e) => return Some(Err(e.into())),
        };
        if status.success() {
            return None;
        }
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        Some(Err(RenderError::Failed(format!(
            "{} exited with {status}: {}",
            self.program,
            stderr.trim()
        ))))
    }
}

impl Iterator for ScriptChunks {
    type Item = Result<String, RenderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(Ok(chunk)) => Some(Ok(chunk)),
            Ok(Err(e)) => {
                self.kill();
                Some(Err(e))
            }
            Err(RecvTimeoutError::Disconnected) => self.finish(),
            Err(RecvTimeoutError::Timeout) => {
                self.kill();
                Some(Err(RenderError::Timeout(self.timeout)))
            }
        }
    }
}

impl Drop for ScriptChunks {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_utf8_keeps_incomplete_tail() {
        // "é" is 0xC3 0xA9
        let mut pending = vec![b'a', 0xC3];
        assert_eq!(take_utf8(&mut pending).unwrap(), Some("a".to_string()));
        assert_eq!(pending, vec![0xC3]);

        assert_eq!(take_utf8(&mut pending).unwrap(), None);
        pending.push(0xA9);
        assert_eq!(take_utf8(&mut pending).unwrap(), Some("é".to_string()));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_utf8_rejects_invalid() {
        let mut pending = vec![b'a', 0xFF, b'b'];
        assert!(matches!(take_utf8(&mut pending), Err(RenderError::InvalidUtf8)));
    }

    #[test]
    fn test_load_missing_module() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PlebConfig::for_root(dir.path());
        let compiler = CommandCompiler::new(&config);
        let err = compiler.load(&dir.path().join("missing.mjs")).err().unwrap();
        assert!(matches!(err, CompileError::ModuleNotFound(_)));
    }

    #[test]
    fn test_load_writes_shim() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PlebConfig::for_root(dir.path());
        let module = config.build.output.join("server/about.mjs");
        std::fs::create_dir_all(module.parent().unwrap()).unwrap();
        std::fs::write(&module, "export function render() {}").unwrap();

        let compiler = CommandCompiler::new(&config);
        compiler.load(&module).unwrap();

        let shim = config.build.output.join("server").join(RENDER_SHIM_NAME);
        assert_eq!(std::fs::read_to_string(shim).unwrap(), RENDER_SHIM);
    }

    #[test]
    fn test_check_reports_missing_bundler() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = PlebConfig::for_root(dir.path());
        config.compiler.bundler = vec!["pleb-no-such-bundler".into()];
        let err = CommandCompiler::new(&config).check().unwrap_err();
        assert!(matches!(err, CompileError::CommandNotFound(p) if p == "pleb-no-such-bundler"));
    }

    /// `sh` stands in for the runtime: the shim path is the script.
    #[cfg(unix)]
    fn sh_page(dir: &Path, script: &str, timeout: Duration) -> ScriptPage {
        let shim = dir.join("shim.sh");
        std::fs::write(&shim, script).unwrap();
        ScriptPage {
            runtime: vec!["sh".into()],
            shim,
            module: dir.join("module.mjs"),
            cwd: dir.to_path_buf(),
            timeout,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_script_page_streams_stdout() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = sh_page(dir.path(), "printf '<h1>'; printf 'hi</h1>'", Duration::from_secs(10));
        assert_eq!(page.render_to_markup().unwrap(), "<h1>hi</h1>");
    }

    #[cfg(unix)]
    #[test]
    fn test_script_page_failure_carries_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = sh_page(dir.path(), "echo boom >&2; exit 2", Duration::from_secs(10));
        let mut chunks = page.render_chunks();
        match chunks.next() {
            Some(Err(RenderError::Failed(msg))) => assert!(msg.contains("boom")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(chunks.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_script_page_error_after_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = sh_page(dir.path(), "printf '<p>'; exit 1", Duration::from_secs(10));
        let chunks: Vec<_> = page.render_chunks().collect();
        assert!(matches!(chunks.first(), Some(Ok(s)) if s == "<p>"));
        assert!(matches!(chunks.last(), Some(Err(RenderError::Failed(_)))));
    }

    #[cfg(unix)]
    #[test]
    fn test_script_page_timeout_kills_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = sh_page(dir.path(), "sleep 5", Duration::from_millis(200));
        let started = Instant::now();
        let result = page.render_to_markup();
        assert!(matches!(result, Err(RenderError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
