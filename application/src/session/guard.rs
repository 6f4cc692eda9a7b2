//! Session Concurrency Guard
//!
//! Enforces at most one active generation per conversation session and
//! hands out the [`CancellationToken`] for it.
//!
//! A second `try_begin_generation` on a busy session is refused
//! immediately, never queued. Refusal is an outcome, not an error: the
//! caller reports it to the client and does nothing else.
//!
//! Accepting returns a [`GenerationLease`]. The lease ends the generation
//! exactly once, either explicitly or when dropped, and carries the
//! generation epoch so a stale lease can never end a newer generation.

use conductor_domain::{ConversationSession, SessionId, SessionMode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Session {session} has no mode '{mode}'")]
    UnknownMode { session: SessionId, mode: String },
}

/// Why a generation was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// Another generation is in flight on this session
    AlreadyActive,
    /// The session was never opened or has been closed
    UnknownSession,
}

/// Outcome of [`SessionConcurrencyGuard::try_begin_generation`].
#[derive(Debug)]
pub enum BeginGeneration {
    Accepted(GenerationLease),
    Refused(Refusal),
}

struct SessionEntry {
    session: ConversationSession,
    token: Option<CancellationToken>,
}

type SessionTable = Arc<Mutex<HashMap<SessionId, SessionEntry>>>;

fn lock(table: &SessionTable) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ends the generation identified by `epoch`, if it is still the active one.
fn end_epoch(table: &SessionTable, session_id: &SessionId, epoch: u64) -> bool {
    let mut sessions = lock(table);
    let Some(entry) = sessions.get_mut(session_id) else {
        return false;
    };
    if !entry.session.active_generation || entry.session.generation_epoch != epoch {
        return false;
    }
    entry.session.active_generation = false;
    entry.token = None;
    debug!(session = %session_id, epoch, "Generation ended");
    true
}

/// Ownership of one active generation.
#[derive(Debug)]
pub struct GenerationLease {
    table: SessionTable,
    session_id: SessionId,
    epoch: u64,
    token: CancellationToken,
    ended: bool,
}

impl GenerationLease {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Token cancelled by [`SessionConcurrencyGuard::cancel`].
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// End the generation now. Returns whether this lease still owned it.
    pub fn end(mut self) -> bool {
        self.ended = true;
        end_epoch(&self.table, &self.session_id, self.epoch)
    }
}

impl Drop for GenerationLease {
    fn drop(&mut self) {
        if !self.ended {
            end_epoch(&self.table, &self.session_id, self.epoch);
        }
    }
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("session", &self.session)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

/// Table of conversation sessions with single-flight generations.
#[derive(Default)]
pub struct SessionConcurrencyGuard {
    sessions: SessionTable,
}

impl SessionConcurrencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session, or reset the modes of an idle existing one.
    pub fn open_session(&self, session_id: SessionId, modes: Vec<SessionMode>) -> ConversationSession {
        let mut sessions = lock(&self.sessions);
        let entry = sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionEntry {
                session: ConversationSession::new(session_id.clone()),
                token: None,
            });
        if !modes.is_empty() {
            entry.session.current_mode_id = modes.first().map(|m| m.id.clone());
            entry.session.available_modes = modes;
        }
        info!(session = %session_id, "Session opened");
        entry.session.clone()
    }

    /// Close a session, cancelling its active generation if any.
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        let removed = lock(&self.sessions).remove(session_id);
        match removed {
            Some(entry) => {
                if let Some(token) = entry.token {
                    token.cancel();
                }
                info!(session = %session_id, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Atomically check that no generation is active and start one.
    pub fn try_begin_generation(&self, session_id: &SessionId) -> BeginGeneration {
        let mut sessions = lock(&self.sessions);
        let Some(entry) = sessions.get_mut(session_id) else {
            return BeginGeneration::Refused(Refusal::UnknownSession);
        };
        if entry.session.active_generation {
            debug!(session = %session_id, "Generation refused: already active");
            return BeginGeneration::Refused(Refusal::AlreadyActive);
        }

        let token = CancellationToken::new();
        entry.session.active_generation = true;
        entry.session.generation_epoch += 1;
        entry.token = Some(token.clone());
        let epoch = entry.session.generation_epoch;
        debug!(session = %session_id, epoch, "Generation started");

        BeginGeneration::Accepted(GenerationLease {
            table: self.sessions.clone(),
            session_id: session_id.clone(),
            epoch,
            token,
            ended: false,
        })
    }

    /// End the active generation regardless of which lease owns it.
    ///
    /// Returns whether one was active.
    pub fn end_generation(&self, session_id: &SessionId) -> bool {
        let epoch = match lock(&self.sessions).get(session_id) {
            Some(entry) => entry.session.generation_epoch,
            None => return false,
        };
        end_epoch(&self.sessions, session_id, epoch)
    }

    /// Request cancellation of the active generation.
    ///
    /// Returns whether a generation was active to cancel.
    pub fn cancel(&self, session_id: &SessionId) -> bool {
        let sessions = lock(&self.sessions);
        match sessions.get(session_id).and_then(|e| e.token.as_ref()) {
            Some(token) => {
                token.cancel();
                info!(session = %session_id, "Generation cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, session_id: &SessionId) -> bool {
        lock(&self.sessions)
            .get(session_id)
            .is_some_and(|e| e.session.active_generation)
    }

    /// Switch the session's mode.
    pub fn set_mode(&self, session_id: &SessionId, mode_id: &str) -> Result<(), SessionError> {
        let mut sessions = lock(&self.sessions);
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.clone()))?;
        if !entry.session.supports_mode(mode_id) {
            return Err(SessionError::UnknownMode {
                session: session_id.clone(),
                mode: mode_id.to_string(),
            });
        }
        entry.session.current_mode_id = Some(mode_id.to_string());
        Ok(())
    }

    /// Snapshot of a session.
    pub fn session(&self, session_id: &SessionId) -> Option<ConversationSession> {
        lock(&self.sessions)
            .get(session_id)
            .map(|e| e.session.clone())
    }
}
