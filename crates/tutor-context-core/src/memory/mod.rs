//! # Conversation Memory
//!
//! A process-wide store of conversation sessions with time-to-live expiry
//! and per-session history eviction.
//!
//! ## Lifecycle
//!
//! A session is created explicitly with [`ConversationStore::create`] or
//! implicitly by the first [`ConversationStore::add_message`] for an unknown
//! id. Once idle for longer than the TTL it behaves exactly like an absent
//! session: reads return nothing and the next write starts a fresh
//! conversation under the same id. Expired sessions are purged either
//! lazily when a read finds them, or eagerly by [`ConversationStore::clear_expired`].
//!
//! ## Thread Safety
//!
//! Sessions are spread across a fixed number of shards, each guarded by an
//! `RwLock`, and every session sits behind its own `Mutex`. Shard locks are
//! held only to look up, insert, or remove entries, so work on different
//! sessions never contends on a session lock. The lock order is always
//! shard, then session. Removal marks the session as evicted while holding
//! both locks, so a writer that raced with a purge retries against the
//! fresh entry instead of appending to a detached one.
//!
//! ## Example
//!
//! ```rust
//! use tutor_context_core::memory::{ConversationStore, StoreParams};
//! use tutor_context_core::models::Role;
//!
//! let store = ConversationStore::new(StoreParams::default());
//! let id = store.create(Some("student-42"));
//! store.add_message(&id, Role::User, "When is tuition due?", None);
//! store.add_message(&id, Role::Assistant, "Tuition is due on May 1.", None);
//!
//! assert_eq!(
//!     store.get_context_string(&id),
//!     "User: When is tuition due?\nAssistant: Tuition is due on May 1."
//! );
//! ```

mod clock;
mod session;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Message, Metadata, Role};

pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{Session, SessionSummary};

pub const DEFAULT_MAX_HISTORY: usize = 10;
pub const DEFAULT_TTL_HOURS: i64 = 24;
pub const DEFAULT_SHARDS: usize = 16;

/// Validated store limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreParams {
    max_history: usize,
    ttl: Duration,
    shards: usize,
}

impl StoreParams {
    pub fn new(max_history: usize, ttl: Duration, shards: usize) -> Result<Self> {
        if max_history == 0 {
            return Err(Error::InvalidConfiguration(
                "max_conversation_history must be at least 1".to_string(),
            ));
        }
        if ttl <= Duration::zero() {
            return Err(Error::InvalidConfiguration(
                "conversation ttl must be positive".to_string(),
            ));
        }
        if shards == 0 {
            return Err(Error::InvalidConfiguration(
                "memory shards must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_history,
            ttl,
            shards,
        })
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn shards(&self) -> usize {
        self.shards
    }
}

impl Default for StoreParams {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            shards: DEFAULT_SHARDS,
        }
    }
}

struct Slot {
    session: Session,
    /// Set once the slot has been removed from its shard.
    evicted: bool,
}

type SlotRef = Arc<Mutex<Slot>>;
type Shard = RwLock<HashMap<String, SlotRef>>;

/// Sharded, TTL-bounded conversation store.
///
/// Construct one per process and share it behind an `Arc`.
pub struct ConversationStore {
    params: StoreParams,
    shards: Vec<Shard>,
    clock: Arc<dyn Clock>,
}

impl ConversationStore {
    pub fn new(params: StoreParams) -> Self {
        Self::with_clock(params, Arc::new(SystemClock))
    }

    pub fn with_clock(params: StoreParams, clock: Arc<dyn Clock>) -> Self {
        let shards = (0..params.shards())
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            params,
            shards,
            clock,
        }
    }

    pub fn params(&self) -> &StoreParams {
        &self.params
    }

    /// Allocate a new, empty session and return its id.
    pub fn create(&self, student_id: Option<&str>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(
            session_id.clone(),
            student_id.map(str::to_string),
            self.clock.now(),
        );
        let slot = Arc::new(Mutex::new(Slot {
            session,
            evicted: false,
        }));
        write_shard(self.shard(&session_id)).insert(session_id.clone(), slot);
        info!(session_id = %session_id, student_id = ?student_id, "created session");
        session_id
    }

    /// Append a message, creating or resetting the session when it is
    /// unknown or expired. History beyond `max_history` is evicted oldest
    /// first.
    pub fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
        metadata: Option<Metadata>,
    ) {
        let content = content.into();
        loop {
            let slot = self.lookup_or_insert(session_id);
            let mut guard = lock_slot(&slot);
            if guard.evicted {
                // Purged between lookup and lock; the shard may hold a new entry.
                continue;
            }

            let now = self.clock.now();
            if guard.session.is_expired(now, self.params.ttl) {
                debug!(session_id, "session expired, starting a fresh conversation");
                guard.session = Session::new(session_id.to_string(), None, now);
            }
            let message = Message::new(role, content, now, metadata);
            guard.session.push(message, self.params.max_history, now);
            return;
        }
    }

    /// The most recent `min(max_messages, len)` messages in chronological
    /// order, or all of them when `max_messages` is `None`. Unknown and
    /// expired sessions yield an empty history.
    pub fn get_history(&self, session_id: &str, max_messages: Option<usize>) -> Vec<Message> {
        self.read_live(session_id, |session| {
            session.recent(max_messages.unwrap_or(usize::MAX))
        })
        .unwrap_or_default()
    }

    /// Render history as `User: ...` / `Assistant: ...` lines.
    pub fn get_context_string(&self, session_id: &str) -> String {
        self.get_history(session_id, None)
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the session is absent or idle for longer than the TTL.
    pub fn is_expired(&self, session_id: &str) -> bool {
        let Some(slot) = self.lookup(session_id) else {
            return true;
        };
        let guard = lock_slot(&slot);
        guard.evicted || guard.session.is_expired(self.clock.now(), self.params.ttl)
    }

    /// Overview of a live session.
    pub fn summary(&self, session_id: &str) -> Option<SessionSummary> {
        self.read_live(session_id, Session::summary)
    }

    /// Delete a session. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        let removed = self.remove_if(session_id, |_| true);
        if removed {
            info!(session_id, "cleared session");
        }
        removed
    }

    /// Delete every expired session and return how many were removed.
    ///
    /// Each removal happens with both the shard and the session locked, so
    /// a session is either untouched or entirely gone.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.params.ttl;
        let mut removed = 0;

        for shard in &self.shards {
            write_shard(shard).retain(|_, slot| {
                let mut guard = lock_slot(slot);
                if guard.session.is_expired(now, ttl) {
                    guard.evicted = true;
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }

        if removed > 0 {
            info!(removed, "cleared expired sessions");
        }
        removed
    }

    /// Number of stored sessions, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| read_shard(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, session_id: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    fn lookup(&self, session_id: &str) -> Option<SlotRef> {
        read_shard(self.shard(session_id)).get(session_id).cloned()
    }

    fn lookup_or_insert(&self, session_id: &str) -> SlotRef {
        if let Some(slot) = self.lookup(session_id) {
            return slot;
        }
        write_shard(self.shard(session_id))
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "implicitly created session");
                Arc::new(Mutex::new(Slot {
                    session: Session::new(session_id.to_string(), None, self.clock.now()),
                    evicted: false,
                }))
            })
            .clone()
    }

    /// Run `f` on a live session, purging it first if it has expired.
    fn read_live<T>(&self, session_id: &str, f: impl FnOnce(&Session) -> T) -> Option<T> {
        let slot = self.lookup(session_id)?;
        {
            let guard = lock_slot(&slot);
            if guard.evicted {
                return None;
            }
            if !guard.session.is_expired(self.clock.now(), self.params.ttl) {
                return Some(f(&guard.session));
            }
        }

        let ttl = self.params.ttl;
        if self.remove_if(session_id, |s| s.is_expired(self.clock.now(), ttl)) {
            debug!(session_id, "purged expired session on read");
        }
        None
    }

    /// Remove the session if `predicate` holds while it is locked.
    fn remove_if(&self, session_id: &str, predicate: impl FnOnce(&Session) -> bool) -> bool {
        let mut shard = write_shard(self.shard(session_id));
        let Some(slot) = shard.get(session_id).cloned() else {
            return false;
        };
        let mut guard = lock_slot(&slot);
        if !predicate(&guard.session) {
            return false;
        }
        guard.evicted = true;
        drop(guard);
        shard.remove(session_id);
        true
    }
}

fn read_shard(shard: &Shard) -> std::sync::RwLockReadGuard<'_, HashMap<String, SlotRef>> {
    shard.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_shard(shard: &Shard) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SlotRef>> {
    shard.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock_slot(slot: &SlotRef) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::thread;

    fn store_with_clock(
        max_history: usize,
        ttl_minutes: i64,
    ) -> (ConversationStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let params = StoreParams::new(max_history, Duration::minutes(ttl_minutes), 4).unwrap();
        (ConversationStore::with_clock(params, clock.clone()), clock)
    }

    #[test]
    fn test_params_validation() {
        assert!(StoreParams::new(0, Duration::hours(1), 4).is_err());
        assert!(StoreParams::new(5, Duration::zero(), 4).is_err());
        assert!(StoreParams::new(5, Duration::hours(1), 0).is_err());
        assert!(StoreParams::new(5, Duration::hours(1), 1).is_ok());
    }

    #[test]
    fn test_create_returns_unique_ids() {
        let (store, _) = store_with_clock(10, 60);
        let a = store.create(None);
        let b = store.create(Some("s1"));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.summary(&b).unwrap().student_id.as_deref(), Some("s1"));
        assert!(store.get_history(&a, None).is_empty());
    }

    #[test]
    fn test_twelve_messages_keep_last_ten() {
        let (store, _) = store_with_clock(10, 60);
        let id = store.create(None);
        for i in 1..=12 {
            store.add_message(&id, Role::User, format!("message {}", i), None);
        }
        let history = store.get_history(&id, Some(1000));
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        let expected: Vec<String> = (3..=12).map(|i| format!("message {}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_history_limit_returns_most_recent() {
        let (store, _) = store_with_clock(10, 60);
        let id = store.create(None);
        for i in 0..5 {
            store.add_message(&id, Role::User, format!("m{}", i), None);
        }
        let last_two: Vec<_> = store
            .get_history(&id, Some(2))
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(last_two, vec!["m3", "m4"]);
        assert!(store.get_history(&id, Some(0)).is_empty());
    }

    #[test]
    fn test_unknown_session_reads_empty_and_writes_create() {
        let (store, _) = store_with_clock(10, 60);
        assert!(store.get_history("nope", None).is_empty());
        assert_eq!(store.get_context_string("nope"), "");
        assert!(store.is_expired("nope"));

        store.add_message("nope", Role::User, "hello", None);
        assert_eq!(store.get_history("nope", None).len(), 1);
        assert!(!store.is_expired("nope"));
    }

    #[test]
    fn test_context_string_format() {
        let (store, _) = store_with_clock(10, 60);
        let id = store.create(None);
        store.add_message(&id, Role::User, "Hi", None);
        store.add_message(&id, Role::Assistant, "Hello!", None);
        assert_eq!(store.get_context_string(&id), "User: Hi\nAssistant: Hello!");
    }

    #[test]
    fn test_metadata_is_kept() {
        let (store, _) = store_with_clock(10, 60);
        let id = store.create(None);
        let mut meta = Metadata::new();
        meta.insert("confidence".into(), serde_json::json!(0.9));
        store.add_message(&id, Role::Assistant, "Answer.", Some(meta));
        let history = store.get_history(&id, None);
        assert_eq!(history[0].metadata["confidence"], serde_json::json!(0.9));
    }

    #[test]
    fn test_expired_session_reads_empty_and_is_purged() {
        let (store, clock) = store_with_clock(10, 30);
        let id = store.create(None);
        store.add_message(&id, Role::User, "hello", None);

        clock.advance(Duration::minutes(30));
        assert!(!store.is_expired(&id), "exactly ttl is still live");

        clock.advance(Duration::seconds(1));
        assert!(store.is_expired(&id));
        assert!(store.get_history(&id, None).is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_write_to_expired_session_starts_fresh() {
        let (store, clock) = store_with_clock(10, 30);
        let id = store.create(Some("s1"));
        store.add_message(&id, Role::User, "old", None);
        clock.advance(Duration::hours(1));

        store.add_message(&id, Role::User, "new", None);
        let history = store.get_history(&id, None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "new");
        let summary = store.summary(&id).unwrap();
        assert_eq!(summary.student_id, None);
        assert_eq!(summary.created_at, clock.now());
    }

    #[test]
    fn test_clear_expired_removes_only_stale() {
        let (store, clock) = store_with_clock(10, 30);
        let stale = store.create(None);
        store.add_message(&stale, Role::User, "old", None);
        clock.advance(Duration::minutes(20));
        let fresh = store.create(None);
        store.add_message(&fresh, Role::User, "new", None);
        clock.advance(Duration::minutes(15));

        assert_eq!(store.clear_expired(), 1);
        assert!(store.summary(&stale).is_none());
        assert_eq!(store.get_history(&fresh, None).len(), 1);
        assert_eq!(store.clear_expired(), 0);
    }

    #[test]
    fn test_clear() {
        let (store, _) = store_with_clock(10, 30);
        let id = store.create(None);
        assert!(store.clear(&id));
        assert!(!store.clear(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_writers_same_session() {
        let params = StoreParams::new(1000, Duration::hours(1), 8).unwrap();
        let store = ConversationStore::new(params);
        let id = store.create(None);

        thread::scope(|scope| {
            for t in 0..8 {
                let (store, id) = (&store, &id);
                scope.spawn(move || {
                    for i in 0..50 {
                        store.add_message(id, Role::User, format!("{}-{}", t, i), None);
                    }
                });
            }
        });

        let history = store.get_history(&id, None);
        assert_eq!(history.len(), 400);
        for t in 0..8 {
            let mine: Vec<_> = history
                .iter()
                .filter(|m| m.content.starts_with(&format!("{}-", t)))
                .map(|m| m.content.clone())
                .collect();
            let expected: Vec<_> = (0..50).map(|i| format!("{}-{}", t, i)).collect();
            assert_eq!(mine, expected);
        }
    }

    #[test]
    fn test_sweep_concurrent_with_writers() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let params = StoreParams::new(5, Duration::minutes(1), 4).unwrap();
        let store = Arc::new(ConversationStore::with_clock(params, clock.clone()));

        let stale: Vec<_> = (0..20).map(|_| store.create(None)).collect();
        clock.advance(Duration::minutes(5));

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    store.add_message(&format!("live-{}", i % 10), Role::User, "hi", None);
                }
            })
        };
        let sweeper = {
            let store = store.clone();
            thread::spawn(move || (0..20).map(|_| store.clear_expired()).sum::<usize>())
        };
        writer.join().unwrap();
        let swept = sweeper.join().unwrap();

        assert_eq!(swept, stale.len());
        for i in 0..10 {
            assert_eq!(store.get_history(&format!("live-{}", i), None).len(), 5);
        }
    }
}
