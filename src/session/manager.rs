/// Session state machine.
///
/// `SessionManager` owns the whole session lifecycle: login, scheduled
/// refresh, and verified logout. The refresh guard, throttle stamp, and
/// timer handle are private fields of this object, never ambient globals
/// and never persisted. A crash mid-refresh cannot wedge a later process,
/// and any stale in-progress marker a previous process might have persisted
/// is ignored by construction.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::session::api::{AuthApi, AuthPayload};
use crate::session::error::SessionError;
use crate::session::scheduler::{compute_refresh_delay, RefreshScheduler};
use crate::session::token_store::{self, TokenStore, UserProfile};

/// Delay before the post-logout verification pass re-checks persisted state.
const LOGOUT_VERIFY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tokens with less lifetime than this refresh on the short delay.
    pub min_lifetime_threshold: Duration,
    /// Short fixed delay for near-expiry tokens.
    pub near_expiry_delay: Duration,
    /// Two attempts closer together than this fail fast as too frequent.
    pub min_refresh_interval: Duration,
    /// Delay before retrying after a transient refresh failure.
    pub retry_backoff: Duration,
    /// Explicit timeout for outbound auth requests.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_lifetime_threshold: Duration::from_secs(10 * 60),
            near_expiry_delay: Duration::from_secs(30),
            min_refresh_interval: Duration::from_secs(2 * 60),
            retry_backoff: Duration::from_secs(2 * 60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    /// A failed login; carries the message the login form displays. Resting
    /// here is equivalent to `Anonymous`; the next `login` or `logout`
    /// moves on.
    Error(String),
}

/// What a refresh attempt did. A `Skipped` attempt observed another attempt
/// in flight (or a session that ended mid-request) and sent nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Skipped,
}

struct SessionInner<A> {
    api: A,
    store: TokenStore,
    config: SessionConfig,
    state: Mutex<SessionState>,
    user: Mutex<Option<UserProfile>>,
    /// Bumped on logout; a refresh result from a previous epoch is discarded.
    epoch: AtomicU64,
    /// Re-entrancy guard: set while a refresh request is in flight.
    refreshing: AtomicBool,
    last_refresh_attempt: Mutex<Option<Instant>>,
    scheduler: RefreshScheduler,
}

pub struct SessionManager<A: AuthApi> {
    inner: Arc<SessionInner<A>>,
}

impl<A: AuthApi> Clone for SessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: AuthApi> SessionManager<A> {
    pub fn new(api: A, store: TokenStore, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                api,
                store,
                config,
                state: Mutex::new(SessionState::Anonymous),
                user: Mutex::new(None),
                epoch: AtomicU64::new(0),
                refreshing: AtomicBool::new(false),
                last_refresh_attempt: Mutex::new(None),
                scheduler: RefreshScheduler::default(),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.lock().unwrap().clone()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.user.lock().unwrap().clone()
    }

    /// `Refreshing` still counts: the UI keeps treating the user as signed
    /// in while a token exchange is in flight.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Authenticated | SessionState::Refreshing
        )
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.inner.refreshing.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Restores the session from persisted state at startup: a live token
    /// resumes as `Authenticated`; an expired token with a cached user
    /// snapshot goes straight through `Refreshing`; anything else rests as
    /// `Anonymous`.
    pub async fn resume(&self) -> SessionState {
        match self.inner.store.token() {
            Some(token) if !token_store::is_expired(&token) => {
                *self.inner.user.lock().unwrap() = self.inner.store.user_snapshot();
                *self.inner.state.lock().unwrap() = SessionState::Authenticated;
                Self::schedule_from_token(&self.inner, &token);
            }
            Some(_) if self.inner.store.user_snapshot().is_some() => {
                // The refresh outcome decides where the session lands.
                let _ = Self::run_refresh(self.inner.clone()).await;
            }
            Some(_) => {
                self.inner.store.clear();
                *self.inner.state.lock().unwrap() = SessionState::Anonymous;
            }
            None => {
                *self.inner.state.lock().unwrap() = SessionState::Anonymous;
            }
        }
        self.state()
    }

    /// Authenticates with the server. Failures carry the server-provided
    /// message and are never retried automatically.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        *self.inner.state.lock().unwrap() = SessionState::Authenticating;

        match self.inner.api.login(email, password).await {
            Ok(payload) => {
                self.inner.store.set_token(&payload.token);
                self.inner.store.set_user_snapshot(&payload.user);
                *self.inner.user.lock().unwrap() = Some(payload.user.clone());
                *self.inner.state.lock().unwrap() = SessionState::Authenticated;
                Self::schedule_from_token(&self.inner, &payload.token);
                Ok(payload.user)
            }
            Err(e) => {
                *self.inner.state.lock().unwrap() = SessionState::Error(e.display_message());
                Err(e)
            }
        }
    }

    /// Exchanges the current token for a fresh one. Safe to call from
    /// anywhere: a concurrent attempt no-ops, a too-frequent attempt fails
    /// fast without touching the network, and a result arriving after
    /// logout is discarded.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SessionError> {
        Self::run_refresh(self.inner.clone()).await
    }

    async fn run_refresh(inner: Arc<SessionInner<A>>) -> Result<RefreshOutcome, SessionError> {
        let Some(token) = inner.store.token() else {
            return Err(SessionError::NoToken);
        };

        // Re-entrancy guard: concurrent attempts are dropped, not queued.
        if inner.refreshing.swap(true, Ordering::SeqCst) {
            tracing::debug!("Refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        }

        // Throttle on attempt timestamps, not outcomes.
        {
            let mut last_attempt = inner.last_refresh_attempt.lock().unwrap();
            if let Some(previous) = *last_attempt {
                if previous.elapsed() < inner.config.min_refresh_interval {
                    drop(last_attempt);
                    inner.refreshing.store(false, Ordering::SeqCst);
                    Self::schedule_retry(&inner);
                    return Err(SessionError::RefreshTooFrequent);
                }
            }
            *last_attempt = Some(Instant::now());
        }

        let epoch = inner.epoch.load(Ordering::SeqCst);
        *inner.state.lock().unwrap() = SessionState::Refreshing;

        match inner.api.refresh(&token).await {
            Ok(payload) => {
                if inner.epoch.load(Ordering::SeqCst) != epoch {
                    // Logout won while we were on the wire; the guard was
                    // already cleared there.
                    tracing::debug!("Discarding refresh result for an ended session");
                    return Ok(RefreshOutcome::Skipped);
                }

                inner.store.set_token(&payload.token);
                inner.store.set_user_snapshot(&payload.user);
                *inner.user.lock().unwrap() = Some(payload.user);
                *inner.state.lock().unwrap() = SessionState::Authenticated;
                inner.refreshing.store(false, Ordering::SeqCst);
                Self::schedule_from_token(&inner, &payload.token);
                Ok(RefreshOutcome::Refreshed)
            }
            Err(e) if e.is_transient() => {
                if inner.epoch.load(Ordering::SeqCst) == epoch {
                    inner.refreshing.store(false, Ordering::SeqCst);
                    *inner.state.lock().unwrap() = SessionState::Authenticated;
                    Self::schedule_retry(&inner);
                }
                tracing::debug!(error = %e, "Transient refresh failure, retry scheduled");
                Err(e)
            }
            Err(e) => {
                if inner.epoch.load(Ordering::SeqCst) == epoch {
                    inner.refreshing.store(false, Ordering::SeqCst);
                    tracing::warn!(error = %e, "Refresh rejected, ending session");
                    Self::teardown(&inner);
                }
                Err(e)
            }
        }
    }

    /// A `401` seen by the shared API client on an ordinary call. Suppressed
    /// while a refresh is in flight; the refresh's own outcome decides.
    pub async fn handle_unauthorized(&self) {
        if self.refresh_in_flight() {
            tracing::debug!("401 during refresh in flight, suppressed");
            return;
        }
        self.logout().await;
    }

    /// Ends the session: cancels the pending timer, clears the guard and
    /// throttle stamp, clears persisted state and the in-memory user, and
    /// bumps the epoch so any in-flight refresh result is discarded. The
    /// bearer header on outbound requests disappears with the stored token.
    /// A verification pass then re-checks persisted state and force-clears
    /// residue. Idempotent.
    pub async fn logout(&self) {
        Self::teardown(&self.inner);

        tokio::time::sleep(LOGOUT_VERIFY_DELAY).await;

        if !self.inner.store.is_empty() {
            tracing::warn!("Persisted session data survived logout, force-clearing");
            self.inner.store.clear();
        }
        if self.inner.scheduler.has_pending() {
            tracing::warn!("Refresh timer survived logout, cancelling");
            self.inner.scheduler.cancel();
        }
    }

    fn teardown(inner: &SessionInner<A>) {
        // Epoch first: anything already on the wire must not apply.
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.scheduler.cancel();
        inner.refreshing.store(false, Ordering::SeqCst);
        *inner.last_refresh_attempt.lock().unwrap() = None;
        inner.store.clear();
        *inner.user.lock().unwrap() = None;
        *inner.state.lock().unwrap() = SessionState::Anonymous;
    }

    fn schedule_from_token(inner: &Arc<SessionInner<A>>, token: &str) {
        let remaining = token_store::remaining_lifetime(token);
        let delay = compute_refresh_delay(
            remaining,
            inner.config.min_lifetime_threshold,
            inner.config.near_expiry_delay,
        );
        tracing::debug!(delay_secs = delay.as_secs(), "Refresh scheduled");
        Self::schedule_refresh_in(inner, delay);
    }

    fn schedule_retry(inner: &Arc<SessionInner<A>>) {
        Self::schedule_refresh_in(inner, inner.config.retry_backoff);
    }

    fn schedule_refresh_in(inner: &Arc<SessionInner<A>>, delay: Duration) {
        let weak: Weak<SessionInner<A>> = Arc::downgrade(inner);
        // Boxed so the timer future does not recursively embed its own type.
        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            if let Some(inner) = weak.upgrade() {
                if let Err(e) = Self::run_refresh(inner).await {
                    tracing::debug!(error = %e, "Scheduled refresh did not complete");
                }
            }
        });
        inner.scheduler.schedule(delay, task);
    }
}
