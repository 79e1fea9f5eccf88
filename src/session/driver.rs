//! Live driver: watches a recipe file, recompiles on save and runs the
//! playback clock in fixed-size blocks.
//!
//! Three parties share one [`SharedSession`]: the file watcher signals
//! edits over a channel, a worker thread compiles them, and the block loop
//! on the calling thread advances the clock and performs the swaps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use notify::event::EventKind;
use notify::{RecursiveMode, Watcher};
use thiserror::Error;

use super::{Install, SharedSession};
use crate::dsl::{Compiler, RecipeFormat};

/// Coalesce bursts of write events from a single save.
const EDIT_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cannot read recipe {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),
    #[error("could not start compile worker: {0}")]
    Worker(std::io::Error),
}

pub struct LiveDriver {
    path: PathBuf,
    format: RecipeFormat,
    session: SharedSession,
    block_size: u32,
    running: Arc<AtomicBool>,
}

impl LiveDriver {
    pub fn new(path: impl Into<PathBuf>, session: SharedSession, block_size: u32) -> Self {
        let path = path.into();
        Self {
            format: RecipeFormat::from_path(&path),
            path,
            session,
            block_size: block_size.max(1),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Clearing this flag ends [`LiveDriver::run`] after the current block.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Compile the file as it is now and hand the result to the session.
    pub fn reload(&self) -> Result<Install, DriverError> {
        reload(&self.path, self.format, &self.session)
    }

    /// Run until the running flag is cleared.
    pub fn run(&self) -> Result<(), DriverError> {
        match self.reload()? {
            Install::Rejected => {
                tracing::warn!("initial compile failed; waiting for a valid edit")
            }
            _ => tracing::info!(path = %self.path.display(), "loaded recipe"),
        }

        let (tx, rx) = mpsc::channel::<()>();
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            let ours = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if ours {
                let _ = tx.send(());
            }
        })?;
        // Watch the directory: editors that save by rename replace the file.
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let worker = {
            let path = self.path.clone();
            let format = self.format;
            let session = self.session.clone();
            thread::Builder::new()
                .name("synthtax-compile".into())
                .spawn(move || {
                    while rx.recv().is_ok() {
                        thread::sleep(EDIT_SETTLE);
                        while rx.try_recv().is_ok() {}
                        if let Err(e) = reload(&path, format, &session) {
                            tracing::warn!(error = %e, "reload failed");
                        }
                    }
                })
                .map_err(DriverError::Worker)?
        };

        self.session.with(|s| s.play());
        let sample_rate = self.session.with(|s| s.transport().sample_rate()).max(1);
        let block = Duration::from_secs_f64(self.block_size as f64 / sample_rate as f64);
        tracing::info!(
            block_size = self.block_size,
            sample_rate,
            "live playback started (Ctrl-C to stop)"
        );

        let mut deadline = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            self.session.tick(self.block_size);
            deadline += block;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }

        self.session.with(|s| s.stop());
        drop(watcher);
        let _ = worker.join();
        tracing::info!("live playback stopped");
        Ok(())
    }
}

fn reload(path: &Path, format: RecipeFormat, session: &SharedSession) -> Result<Install, DriverError> {
    let ticket = session.ticket();
    let source = fs::read_to_string(path).map_err(|source| DriverError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let result = Compiler::compile_as(&source, format);
    Ok(session.install(ticket, result))
}
