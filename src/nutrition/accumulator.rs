use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::record::NutritionRecord;

pub const DEFAULT_DAILY_LIMIT: u32 = 2000;
pub const MIN_DAILY_LIMIT: u32 = 1000;
pub const MAX_DAILY_LIMIT: u32 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("daily limit must be between {} and {} kcal, got {}", MIN_DAILY_LIMIT, MAX_DAILY_LIMIT, .0)]
pub struct InvalidLimit(pub u32);

pub fn validate_limit(limit: u32) -> Result<u32, InvalidLimit> {
    if (MIN_DAILY_LIMIT..=MAX_DAILY_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(InvalidLimit(limit))
    }
}

/// Running calorie total for one login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAccumulatorState {
    pub daily_used: u32,
    pub daily_limit: u32,
}

impl SessionAccumulatorState {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_used: 0,
            daily_limit,
        }
    }

    pub fn advance(self, record: &NutritionRecord) -> Self {
        Self {
            daily_used: self.daily_used.saturating_add(record.counted_calories()),
            ..self
        }
    }

    /// Change the budget without touching what has been eaten so far.
    pub fn with_limit(self, daily_limit: u32) -> Self {
        Self {
            daily_limit,
            ..self
        }
    }

    /// Strictly over the limit; landing exactly on it is not exceeded.
    pub fn exceeded(&self) -> bool {
        self.daily_used > self.daily_limit
    }

    pub fn summary(&self) -> DailySummary {
        DailySummary {
            daily_used: self.daily_used,
            daily_limit: self.daily_limit,
            exceeded: self.exceeded(),
            remaining: self.daily_limit.saturating_sub(self.daily_used),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub daily_used: u32,
    pub daily_limit: u32,
    pub exceeded: bool,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session {0} has ended")]
pub struct SessionEnded(pub Uuid);

// Refresh tokens live 14 days by default; nothing outlives them.
const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(14 * 24 * 60 * 60);

struct Slot {
    state: SessionAccumulatorState,
    touched: Instant,
}

#[derive(Default)]
struct Sessions {
    live: HashMap<Uuid, Slot>,
    // Logged-out sessions, kept until every token naming them has expired.
    ended: HashMap<Uuid, Instant>,
}

/// Accumulators of all live sessions, keyed by the session id carried in the
/// access token. Every mutation happens under one lock acquisition, so two
/// analyses racing in the same session cannot lose an update.
#[derive(Clone)]
pub struct SessionStore {
    default_limit: u32,
    lifetime: Duration,
    inner: Arc<Mutex<Sessions>>,
}

impl SessionStore {
    pub fn new(default_limit: u32) -> Self {
        Self {
            default_limit,
            lifetime: DEFAULT_SESSION_LIFETIME,
            inner: Arc::new(Mutex::new(Sessions::default())),
        }
    }

    /// How long an idle session (or the record of a logout) is kept. Should
    /// match the refresh-token lifetime.
    pub fn with_lifetime(self, lifetime: Duration) -> Self {
        Self { lifetime, ..self }
    }

    /// Start a fresh accumulator at zero. Called on login.
    pub async fn open(&self, session_id: Uuid) -> DailySummary {
        let now = Instant::now();
        let mut sessions = self.inner.lock().await;
        self.prune(&mut sessions, now);
        let state = SessionAccumulatorState::new(self.default_limit);
        sessions.live.insert(session_id, Slot { state, touched: now });
        info!(%session_id, daily_limit = state.daily_limit, "session accumulator opened");
        state.summary()
    }

    /// Drop the accumulator and refuse the session from now on. Called on
    /// logout.
    pub async fn close(&self, session_id: Uuid) -> Option<DailySummary> {
        let mut sessions = self.inner.lock().await;
        sessions.ended.insert(session_id, Instant::now());
        let removed = sessions.live.remove(&session_id);
        if removed.is_some() {
            info!(%session_id, "session accumulator closed");
        }
        removed.map(|s| s.state.summary())
    }

    /// Fails only when the session has been closed.
    pub async fn check(&self, session_id: Uuid) -> Result<(), SessionEnded> {
        let sessions = self.inner.lock().await;
        if sessions.ended.contains_key(&session_id) {
            return Err(SessionEnded(session_id));
        }
        Ok(())
    }

    pub async fn summary(&self, session_id: Uuid) -> Result<DailySummary, SessionEnded> {
        let mut sessions = self.inner.lock().await;
        Ok(self.slot(&mut sessions, session_id)?.state.summary())
    }

    pub async fn set_limit(
        &self,
        session_id: Uuid,
        daily_limit: u32,
    ) -> Result<DailySummary, SessionEnded> {
        let mut sessions = self.inner.lock().await;
        let slot = self.slot(&mut sessions, session_id)?;
        slot.state = slot.state.with_limit(daily_limit);
        debug!(%session_id, daily_limit, "daily limit changed");
        Ok(slot.state.summary())
    }

    /// Apply an optional limit change and the record's calories in a single
    /// critical section.
    pub async fn record(
        &self,
        session_id: Uuid,
        daily_limit: Option<u32>,
        record: &NutritionRecord,
    ) -> Result<DailySummary, SessionEnded> {
        let mut sessions = self.inner.lock().await;
        let slot = self.slot(&mut sessions, session_id)?;
        let mut next = slot.state;
        if let Some(limit) = daily_limit {
            next = next.with_limit(limit);
        }
        next = next.advance(record);
        slot.state = next;
        debug!(
            %session_id,
            added = record.counted_calories(),
            daily_used = next.daily_used,
            daily_limit = next.daily_limit,
            "daily total advanced"
        );
        if next.exceeded() {
            warn!(%session_id, daily_used = next.daily_used, daily_limit = next.daily_limit, "daily limit exceeded");
        }
        Ok(next.summary())
    }

    /// Forget sessions idle for longer than the lifetime, and logouts older
    /// than it. Returns how many entries were dropped.
    pub async fn prune_at(&self, now: Instant) -> usize {
        let mut sessions = self.inner.lock().await;
        self.prune(&mut sessions, now)
    }

    /// Background sweep so sessions that never log out do not pile up.
    pub fn spawn_pruner(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                store.prune_at(Instant::now()).await;
            }
        })
    }

    fn prune(&self, sessions: &mut Sessions, now: Instant) -> usize {
        let lifetime = self.lifetime;
        let before = sessions.live.len() + sessions.ended.len();
        sessions
            .live
            .retain(|_, slot| now.saturating_duration_since(slot.touched) <= lifetime);
        sessions
            .ended
            .retain(|_, at| now.saturating_duration_since(*at) <= lifetime);
        let dropped = before - sessions.live.len() - sessions.ended.len();
        if dropped > 0 {
            debug!(dropped, "expired sessions pruned");
        }
        dropped
    }

    // Sessions that outlived a restart come back lazily at zero; closed ones
    // stay closed.
    fn slot<'a>(
        &self,
        sessions: &'a mut Sessions,
        session_id: Uuid,
    ) -> Result<&'a mut Slot, SessionEnded> {
        if sessions.ended.contains_key(&session_id) {
            warn!(%session_id, "request for a closed session");
            return Err(SessionEnded(session_id));
        }
        let now = Instant::now();
        let slot = sessions.live.entry(session_id).or_insert_with(|| {
            debug!(%session_id, "no accumulator for session; starting at zero");
            Slot {
                state: SessionAccumulatorState::new(self.default_limit),
                touched: now,
            }
        });
        slot.touched = now;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::analyze_report;
    use time::OffsetDateTime;

    fn record_with(calories: Option<u32>) -> NutritionRecord {
        let text = match calories {
            Some(c) => format!("Snack\nTotal Calories: {c} kcal"),
            None => "Snack\nno numbers here".to_string(),
        };
        analyze_report(&text, "1 piece", Uuid::nil(), OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn advance_is_additive() {
        let s = SessionAccumulatorState {
            daily_used: 100,
            daily_limit: 2000,
        };
        let r1 = record_with(Some(350));
        let r2 = record_with(Some(420));
        let out = s.advance(&r1).advance(&r2);
        assert_eq!(out.daily_used, 100 + 350 + 420);
        assert_eq!(out.daily_limit, 2000);
    }

    #[test]
    fn unknown_calories_count_as_zero() {
        let s = SessionAccumulatorState::new(2000).advance(&record_with(None));
        assert_eq!(s.daily_used, 0);
    }

    #[test]
    fn exactly_on_limit_is_not_exceeded() {
        let s = SessionAccumulatorState::new(2000).advance(&record_with(Some(2000)));
        assert_eq!(s.daily_used, 2000);
        assert!(!s.exceeded());
        assert_eq!(s.summary().remaining, 0);

        let s = s.advance(&record_with(Some(1)));
        assert_eq!(s.daily_used, 2001);
        assert!(s.exceeded());
        assert_eq!(s.summary().remaining, 0);
    }

    #[test]
    fn limit_change_keeps_used() {
        let s = SessionAccumulatorState::new(2000)
            .advance(&record_with(Some(1500)))
            .with_limit(1200);
        assert_eq!(s.daily_used, 1500);
        assert!(s.exceeded());
    }

    #[test]
    fn limit_validation() {
        assert_eq!(validate_limit(2000), Ok(2000));
        assert_eq!(validate_limit(1000), Ok(1000));
        assert_eq!(validate_limit(4000), Ok(4000));
        assert_eq!(validate_limit(999), Err(InvalidLimit(999)));
        assert_eq!(validate_limit(0), Err(InvalidLimit(0)));
        assert!(validate_limit(4001).unwrap_err().to_string().contains("4001"));
    }

    #[tokio::test]
    async fn open_resets_and_close_discards() {
        let store = SessionStore::new(DEFAULT_DAILY_LIMIT);
        let sid = Uuid::new_v4();
        store.open(sid).await;
        store.record(sid, None, &record_with(Some(700))).await.unwrap();
        assert_eq!(store.summary(sid).await.unwrap().daily_used, 700);

        // A second login gets a new session and starts from zero again.
        let again = Uuid::new_v4();
        assert_eq!(store.open(again).await.daily_used, 0);

        let closed = store.close(sid).await.unwrap();
        assert_eq!(closed.daily_used, 700);
        assert!(store.close(sid).await.is_none());
    }

    #[tokio::test]
    async fn closed_session_is_not_revived() {
        let store = SessionStore::new(DEFAULT_DAILY_LIMIT);
        let sid = Uuid::new_v4();
        store.open(sid).await;
        store.close(sid).await;

        let pizza = record_with(Some(800));
        assert_eq!(store.record(sid, None, &pizza).await, Err(SessionEnded(sid)));
        assert_eq!(store.summary(sid).await, Err(SessionEnded(sid)));
        assert_eq!(store.set_limit(sid, 1500).await, Err(SessionEnded(sid)));
        assert_eq!(store.check(sid).await, Err(SessionEnded(sid)));
    }

    #[tokio::test]
    async fn idle_sessions_and_old_logouts_are_pruned() {
        let store = SessionStore::new(DEFAULT_DAILY_LIMIT).with_lifetime(Duration::from_secs(60));
        let (idle, ended) = (Uuid::new_v4(), Uuid::new_v4());
        store.open(idle).await;
        store.record(idle, None, &record_with(Some(500))).await.unwrap();
        store.open(ended).await;
        store.close(ended).await;

        assert_eq!(store.prune_at(Instant::now()).await, 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(store.prune_at(later).await, 2);

        // Every token naming these sessions has expired by now.
        assert_eq!(store.summary(idle).await.unwrap().daily_used, 0);
        assert!(store.check(ended).await.is_ok());
    }

    #[tokio::test]
    async fn record_applies_limit_then_calories() {
        let store = SessionStore::new(DEFAULT_DAILY_LIMIT);
        let sid = Uuid::new_v4();
        store.open(sid).await;
        let summary = store
            .record(sid, Some(1000), &record_with(Some(1001)))
            .await
            .unwrap();
        assert_eq!(summary.daily_limit, 1000);
        assert_eq!(summary.daily_used, 1001);
        assert!(summary.exceeded);

        let summary = store.set_limit(sid, 3000).await.unwrap();
        assert_eq!(summary.daily_used, 1001);
        assert!(!summary.exceeded);
    }

    #[tokio::test]
    async fn concurrent_records_do_not_lose_updates() {
        let store = SessionStore::new(DEFAULT_DAILY_LIMIT);
        let sid = Uuid::new_v4();
        store.open(sid).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record(sid, None, &record_with(Some(10))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.summary(sid).await.unwrap().daily_used, 500);
    }

    #[tokio::test]
    async fn unknown_session_starts_lazily() {
        let store = SessionStore::new(1800);
        let summary = store.summary(Uuid::new_v4()).await.unwrap();
        assert_eq!(summary.daily_used, 0);
        assert_eq!(summary.daily_limit, 1800);
    }
}
