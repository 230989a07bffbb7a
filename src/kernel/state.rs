//! Session registry: the single source of truth for which speech session is
//! current and which chunks are waiting to be played.
//!
//! All reads and writes go through one mutex. The lock is never held across
//! an `.await`; the speech loop copies what it needs out of the critical
//! section before touching the HAL.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tracing::debug;

use super::event::SessionId;
use super::speech::chunk::SpeechChunk;
use super::speech::signal::FinishedSignal;

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    is_finished: AtomicBool,
    speech_finished: FinishedSignal,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            is_finished: AtomicBool::new(false),
            speech_finished: FinishedSignal::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Acquire)
    }

    /// Marks the session finished. Returns `true` only for the caller that
    /// flipped the flag, so termination events fire exactly once.
    pub fn try_finish(&self) -> bool {
        !self.is_finished.swap(true, Ordering::AcqRel)
    }

    pub fn speech_finished(&self) -> &FinishedSignal {
        &self.speech_finished
    }
}

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    chunks: VecDeque<SpeechChunk>,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<SessionId>,
    sessions: HashMap<SessionId, Entry>,
}

/// Result of `start_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    /// Same id as the current session; nothing in flight is invalidated.
    Continued,
    /// A different session became current; in-flight speech must stop.
    Superseded,
}

/// Result of `enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    /// The chunk's session is not current (superseded or never started).
    NotCurrent,
}

/// What one wake of the speech loop has to do.
#[derive(Debug, Default)]
pub struct Wake {
    /// Sessions removed by cleanup that still owe their termination events.
    pub terminated: Vec<Arc<Session>>,
    pub work: Option<(Arc<Session>, SpeechChunk)>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    ready: Semaphore,
    running: AtomicBool,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ready: Semaphore::new(0),
            running: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> Option<SessionId> {
        self.lock().current.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().sessions.contains_key(id)
    }

    pub fn pending_chunks(&self, id: &str) -> usize {
        self.lock()
            .sessions
            .get(id)
            .map(|entry| entry.chunks.len())
            .unwrap_or(0)
    }

    /// Makes `id` current. A supersession also wakes the speech loop so the
    /// previous session is cleaned up even if no chunk ever follows.
    pub fn start_session(&self, id: &str) -> SessionStart {
        let outcome = {
            let mut inner = self.lock();
            let outcome = if inner.current.as_deref() == Some(id) {
                SessionStart::Continued
            } else {
                SessionStart::Superseded
            };

            let entry = inner.sessions.entry(id.to_string()).or_insert_with(|| Entry {
                session: Arc::new(Session::new(id.to_string())),
                chunks: VecDeque::new(),
            });
            // Ids may be reused after completion.
            entry.session.is_finished.store(false, Ordering::Release);
            inner.current = Some(id.to_string());
            outcome
        };

        if outcome == SessionStart::Superseded {
            self.notify();
        }
        debug!(session_id = id, ?outcome, "started TTS session");
        outcome
    }

    /// Forgets the current session so later chunks for it are dropped. The
    /// speech loop is woken to terminate it.
    pub fn clear_current(&self) -> Option<SessionId> {
        let previous = self.lock().current.take();
        if previous.is_some() {
            self.notify();
        }
        previous
    }

    pub fn enqueue(&self, id: &str, chunk: SpeechChunk) -> Enqueue {
        {
            let mut inner = self.lock();
            if inner.current.as_deref() != Some(id) {
                return Enqueue::NotCurrent;
            }
            let entry = inner.sessions.entry(id.to_string()).or_insert_with(|| Entry {
                session: Arc::new(Session::new(id.to_string())),
                chunks: VecDeque::new(),
            });
            entry.chunks.push_back(chunk);
        }
        self.ready.add_permits(1);
        Enqueue::Accepted
    }

    /// Sets the finished latch of `id`, if that session is still registered.
    pub fn signal_finished(&self, id: &str) -> bool {
        match self.lock().sessions.get(id) {
            Some(entry) => {
                entry.session.speech_finished.set();
                true
            }
            None => false,
        }
    }

    /// One critical section per wake: drop every non-current session, then
    /// pop at most one chunk from the current one.
    pub fn next_work(&self) -> Wake {
        let mut inner = self.lock();
        let mut wake = Wake::default();

        let current = inner.current.clone();
        let stale: Vec<SessionId> = inner
            .sessions
            .keys()
            .filter(|id| current.as_ref() != Some(*id))
            .cloned()
            .collect();

        for id in stale {
            if let Some(entry) = inner.sessions.remove(&id) {
                if entry.session.try_finish() {
                    wake.terminated.push(entry.session);
                }
                debug!(session_id = %id, dropped = entry.chunks.len(), "cleaned up TTS session");
            }
        }

        if let Some(id) = current {
            if let Some(entry) = inner.sessions.get_mut(&id) {
                if let Some(chunk) = entry.chunks.pop_front() {
                    wake.work = Some((entry.session.clone(), chunk));
                }
            }
        }

        wake
    }

    /// Blocks until work is signaled. Each call consumes one signal.
    pub async fn wait_for_work(&self) {
        if let Ok(permit) = self.ready.acquire().await {
            permit.forget();
        }
    }

    /// Wakes the speech loop once without queuing a chunk.
    pub fn notify(&self) {
        self.ready.add_permits(1);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop_running(&self) {
        self.running.store(false, Ordering::Release);
        self.notify();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
