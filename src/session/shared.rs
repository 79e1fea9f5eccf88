//! Thread-safe handle to a [`LiveSession`].
//!
//! The edit path and the playback path both go through the same mutex, so
//! a boundary check never sees a half-installed candidate. Compiles run
//! outside the lock; tickets order their results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Install, LiveSession, SwapReport};
use crate::dsl::{CompileError, Compiler, RecipeFormat};
use crate::graph::Graph;
use crate::time::Beat;

/// Issue order of a compile. Higher is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
struct Inner {
    session: LiveSession,
    /// Newest ticket whose result reached the session.
    installed: u64,
}

#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Inner>>,
    next_ticket: Arc<AtomicU64>,
}

impl SharedSession {
    pub fn new(session: LiveSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                session,
                installed: 0,
            })),
            next_ticket: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take a ticket before compiling an edit.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Install a compile result. Results older than one already installed
    /// are discarded, failures included.
    pub fn install(&self, ticket: Ticket, result: Result<Graph, CompileError>) -> Install {
        let mut inner = self.inner.lock();
        if ticket.0 <= inner.installed {
            tracing::debug!(ticket = ticket.0, newest = inner.installed, "discarding stale compile");
            return Install::Stale;
        }
        inner.installed = ticket.0;
        inner.session.install(result)
    }

    /// Ticket, compile (unlocked), install.
    pub fn submit(&self, source: &str, format: RecipeFormat) -> Install {
        let ticket = self.ticket();
        let result = Compiler::compile_as(source, format);
        self.install(ticket, result)
    }

    pub fn on_advance(&self, from: Beat, to: Beat) -> Option<SwapReport> {
        self.inner.lock().session.on_advance(from, to)
    }

    pub fn tick(&self, frames: u32) -> Option<SwapReport> {
        self.inner.lock().session.tick(frames)
    }

    pub fn snapshot(&self) -> Option<Arc<Graph>> {
        self.inner.lock().session.snapshot()
    }

    /// Run `f` with the session locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut LiveSession) -> R) -> R {
        f(&mut self.inner.lock().session)
    }
}
