//! Launch session model and storage.
//!
//! Each browser session owns one [`LaunchSession`] record, keyed by an opaque
//! [`SessionId`] the HTTP layer keeps in a cookie. Records are isolated from
//! each other; a record is only read and written by requests carrying its id.
//!
//! # Lifecycle
//!
//! - Empty until the EHR launches the app
//! - Cleared and refilled with `iss`/`launch` on a new launch
//! - Gains `state` the first time an authorization URL is built
//! - Dropped after the idle TTL

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::LaunchResult;

/// Default idle lifetime of a launch session (1 hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Default minimum time between two sweeps of expired sessions.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Session Types
// ============================================================================

/// Opaque identifier of a browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Session-scoped launch state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSession {
    /// FHIR server base URL received from the EHR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Opaque launch token received from the EHR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<String>,

    /// Anti-forgery token sent with the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl LaunchSession {
    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iss.is_none() && self.launch.is_none() && self.state.is_none()
    }

    /// Forgets everything from a previous launch.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Starts a new launch: clears prior state, then stores `iss` and `launch`.
    pub fn begin_launch(&mut self, iss: impl Into<String>, launch: impl Into<String>) {
        self.clear();
        self.iss = Some(iss.into());
        self.launch = Some(launch.into());
    }

    /// Returns the stored `state`, generating and storing one first if needed.
    ///
    /// A launch gets at most one `state`; later calls return the same value.
    pub fn state_or_insert_with(&mut self, generate: impl FnOnce() -> String) -> &str {
        self.state.get_or_insert_with(generate)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Storage for launch sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session. Unknown or expired ids yield an empty session.
    async fn load(&self, id: &SessionId) -> LaunchResult<LaunchSession>;

    /// Stores a session, replacing any previous record.
    async fn save(&self, id: &SessionId, session: &LaunchSession) -> LaunchResult<()>;
}

struct StoredSession {
    session: LaunchSession,
    touched_at: Instant,
}

/// In-process session store with an idle TTL.
///
/// Expired entries are dropped when they are next looked up. Saves also
/// sweep the whole map, at most once per purge interval. No background task
/// is involved.
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, StoredSession>,
    ttl: Duration,
    purge_interval: Duration,
    created_at: Instant,
    /// Milliseconds after `created_at` of the last sweep.
    last_purge_ms: AtomicU64,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl InMemorySessionStore {
    /// Creates a store whose sessions expire after `ttl` without use.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            purge_interval: DEFAULT_PURGE_INTERVAL,
            created_at: Instant::now(),
            last_purge_ms: AtomicU64::new(0),
        }
    }

    /// Sets the minimum time between two sweeps triggered by `save`.
    #[must_use]
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Returns the number of stored sessions, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops all expired sessions.
    pub fn purge_expired(&self) {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions.retain(|_, v| v.touched_at.elapsed() < ttl);

        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired launch sessions");
        }
    }

    /// Sweeps expired sessions if the purge interval has elapsed.
    ///
    /// Concurrent callers race on the timestamp; only the winner sweeps.
    fn purge_if_due(&self) {
        let now = u64::try_from(self.created_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let interval = u64::try_from(self.purge_interval.as_millis()).unwrap_or(u64::MAX);
        let last = self.last_purge_ms.load(Ordering::Relaxed);

        if now.saturating_sub(last) < interval {
            return;
        }
        if self
            .last_purge_ms
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.purge_expired();
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> LaunchResult<LaunchSession> {
        let expired = match self.sessions.get(id) {
            Some(entry) if entry.touched_at.elapsed() < self.ttl => {
                return Ok(entry.session.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove(id);
            tracing::debug!(session_id = %id, "Launch session expired");
        }
        Ok(LaunchSession::default())
    }

    async fn save(&self, id: &SessionId, session: &LaunchSession) -> LaunchResult<()> {
        self.purge_if_due();
        self.sessions.insert(
            *id,
            StoredSession {
                session: session.clone(),
                touched_at: Instant::now(),
            },
        );
        Ok(())
    }
}

// ============================================================================
// Per-session serialization
// ============================================================================

/// Per-session mutual exclusion for renders.
///
/// A render holds its session's lock from `load` through `save`, so two
/// requests carrying the same cookie never interleave and a `state` placed
/// in an authorization URL is always the one that ends up stored. Different
/// sessions never wait on each other.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder works on `id`, then takes the lock.
    pub async fn acquire(&self, id: &SessionId) -> SessionGuard<'_> {
        let lock = self.locks.entry(*id).or_default().clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            locks: self,
            id: *id,
            guard: Some(guard),
        }
    }

    /// Returns the number of sessions with a held or awaited lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if no lock is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one session. Released on drop.
pub struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    id: SessionId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Release first so an idle lock is referenced only by the table
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
