//! Credential store and the proactive refresh timer.
//!
//! ```text
//! authenticate() ──→ [Authenticated] ──(expiresIn - 300s)──→ refresh()
//!                        │     ▲                                │
//!                        │     └──────────── ok ────────────────┤
//!                        ▼                                      ▼ err
//!                    logout() ─────────→ [Unauthenticated] ←────┘
//! ```
//!
//! Every mutation (authenticate, refresh, logout, the timer itself) goes
//! through one async writer lock. Readers only look at the `watch` snapshot
//! and never wait on the writer.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use super::firebase_client::{IdentityClient, TokenGrant};
use crate::errors::AuthError;

/// How long before expiry the id token is renewed.
pub const REFRESH_OFFSET: Duration = Duration::from_secs(300);
/// Shortest delay a refresh timer is ever armed with.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(30);
/// Longest token lifetime taken at face value; larger `expiresIn` values are clamped.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

fn token_lifetime(expires_in_secs: u64) -> Duration {
    Duration::from_secs(expires_in_secs).min(MAX_TOKEN_LIFETIME)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub offset: Duration,
    pub min_delay: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            offset: REFRESH_OFFSET,
            min_delay: MIN_REFRESH_DELAY,
        }
    }
}

impl RefreshPolicy {
    pub fn delay_for(&self, expires_in_secs: u64) -> Duration {
        token_lifetime(expires_in_secs)
            .saturating_sub(self.offset)
            .max(self.min_delay)
    }
}

/// Current credentials. `id_token` is present iff the session is authenticated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    user_id: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Session {
    fn from_grant(grant: &TokenGrant) -> Self {
        let expires_at = chrono::Duration::from_std(token_lifetime(grant.expires_in))
            .ok()
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        Self {
            id_token: Some(grant.id_token.clone()),
            refresh_token: Some(grant.refresh_token.clone()),
            expires_at,
            user_id: grant.user_id.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.id_token.is_some()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    RefreshFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut(LogoutReason),
}

#[derive(Default)]
struct RefreshSlot {
    task: Option<JoinHandle<()>>,
    delay: Option<Duration>,
    /// Bumped whenever the pending timer is cancelled or replaced.
    generation: u64,
}

impl RefreshSlot {
    fn cancel(&mut self) {
        self.generation += 1;
        self.delay = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Inner {
    identity: IdentityClient,
    policy: RefreshPolicy,
    state: watch::Sender<Session>,
    events: broadcast::Sender<SessionEvent>,
    writer: Mutex<RefreshSlot>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.writer.get_mut().cancel();
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Clear the session. Returns whether a session was actually active.
    fn clear_locked(&self, slot: &mut RefreshSlot, reason: LogoutReason) -> bool {
        slot.cancel();
        let previous = self.state.send_replace(Session::default());

        if previous.is_authenticated() {
            log::info!("Session cleared ({:?})", reason);
            self.emit(SessionEvent::LoggedOut(reason));
            true
        } else {
            false
        }
    }

    async fn exchange_refresh_token(&self) -> Result<TokenGrant, AuthError> {
        let refresh_token = self.state.borrow().refresh_token.clone();
        match refresh_token {
            Some(token) => self.identity.refresh(&token).await,
            None => Err(AuthError::MissingRefreshToken),
        }
    }
}

/// Owns the single session. Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(identity: IdentityClient) -> Self {
        Self::with_policy(identity, RefreshPolicy::default())
    }

    pub fn with_policy(identity: IdentityClient, policy: RefreshPolicy) -> Self {
        let (state, _) = watch::channel(Session::default());
        let (events, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                identity,
                policy,
                state,
                events,
                writer: Mutex::new(RefreshSlot::default()),
            }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Bearer credential for the next request, if logged in.
    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().id_token.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Delay the pending refresh timer was armed with, `None` if nothing is pending.
    pub async fn pending_refresh_delay(&self) -> Option<Duration> {
        let slot = self.inner.writer.lock().await;
        match &slot.task {
            Some(task) if !task.is_finished() => slot.delay,
            _ => None,
        }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let mut slot = self.inner.writer.lock().await;

        let grant = match self.inner.identity.sign_in(email, password).await {
            Ok(grant) => grant,
            Err(e) => {
                log::error!("Error occurred while authenticating with ScapeCloud: {}", e);
                return Err(e);
            }
        };

        self.install(&mut slot, &grant);
        log::info!("Authenticated with ScapeCloud as {}", email.trim());
        self.inner.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Exchange the refresh token now. Any failure logs the session out.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let mut slot = self.inner.writer.lock().await;

        match self.inner.exchange_refresh_token().await {
            Ok(grant) => {
                self.install(&mut slot, &grant);
                log::info!("ScapeCloud session refreshed");
                self.inner.emit(SessionEvent::Refreshed);
                Ok(())
            }
            Err(e) => {
                log::error!("Error occurred while re-authenticating with ScapeCloud: {}", e);
                self.inner
                    .clear_locked(&mut slot, LogoutReason::RefreshFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Clear tokens and cancel the pending refresh. Returns whether a session was active.
    pub async fn logout(&self) -> bool {
        let mut slot = self.inner.writer.lock().await;
        self.inner.clear_locked(&mut slot, LogoutReason::UserRequested)
    }

    /// Store a fresh grant and cancel-and-replace the refresh timer.
    fn install(&self, slot: &mut RefreshSlot, grant: &TokenGrant) {
        self.inner.state.send_replace(Session::from_grant(grant));

        slot.cancel();
        let delay = self.inner.policy.delay_for(grant.expires_in);
        let generation = slot.generation;
        slot.delay = Some(delay);
        slot.task = Some(tokio::spawn(refresh_loop(
            Arc::downgrade(&self.inner),
            generation,
            delay,
        )));

        log::debug!("Next session refresh in {:?}", delay);
    }
}

/// Body of the deferred refresh task. Renews in place after each success so the
/// task never has to replace itself; stops on cancellation or failure.
async fn refresh_loop(weak: Weak<Inner>, generation: u64, mut delay: Duration) {
    loop {
        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut slot = inner.writer.lock().await;
        if slot.generation != generation {
            return;
        }

        match inner.exchange_refresh_token().await {
            Ok(grant) => {
                inner.state.send_replace(Session::from_grant(&grant));
                delay = inner.policy.delay_for(grant.expires_in);
                slot.delay = Some(delay);
                log::info!("ScapeCloud session refreshed, next refresh in {:?}", delay);
                inner.emit(SessionEvent::Refreshed);
            }
            Err(e) => {
                log::error!("Error occurred while re-authenticating with ScapeCloud: {}", e);
                // Detach our own handle so clearing does not abort this task
                slot.task = None;
                inner.clear_locked(&mut slot, LogoutReason::RefreshFailed(e.to_string()));
                return;
            }
        }
    }
}
