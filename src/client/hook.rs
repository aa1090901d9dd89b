//! The access session hook consumed by UI code.
//!
//! # Lifecycle
//!
//! - **Unknown**: just created, nothing checked yet
//! - **Inactive**: no cached session, or it ran out
//! - **Active**: cached session with `expires_at > now`; a one-second
//!   countdown runs until it reaches zero, then the cache is cleared
//!
//! Unknown → Active/Inactive via `check_session`, Inactive → Active via a
//! successful `activate_code`, Active → Inactive via the countdown or
//! `end_session`.
//!
//! The server is the source of truth. The local mirror only serves instant
//! reads after a reload and stands in when a check cannot reach the server.
//! It is only written while the state lock is held, so it always matches
//! the cached session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{
    client::{
        error::ClientError,
        storage::{FileStorage, SessionStorage},
        transport::{HttpTransport, SessionTransport},
    },
    clock::Clock,
    config::ClientConfig,
    models::access_session::{SessionView, format_countdown},
};

/// Client-side view of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unknown,
    Inactive,
    Active,
}

#[derive(Debug, Default)]
struct CountdownState {
    session: Option<SessionView>,
    time_remaining: u64,
    checked: bool,
}

/// State shared with the countdown task.
struct Shared<S> {
    storage: S,
    clock: Arc<dyn Clock>,
    state: Mutex<CountdownState>,
}

impl<S: SessionStorage> Shared<S> {
    fn state(&self) -> MutexGuard<'_, CountdownState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute the remaining time. Never moves upward for the same
    /// session; at zero the session and its mirror are dropped.
    fn tick(&self) -> u64 {
        let now = self.clock.now();
        let mut state = self.state();

        let Some(session) = state.session.as_ref() else {
            state.time_remaining = 0;
            return 0;
        };

        let remaining = session.seconds_remaining(now).min(state.time_remaining);
        state.time_remaining = remaining;

        if remaining == 0 {
            if let Some(expired) = state.session.take() {
                tracing::debug!(session_id = %expired.id, "Access session expired");
            }
            self.forget_mirror();
        }

        remaining
    }

    fn remember(&self, session: &SessionView) {
        if let Err(err) = self.storage.save(session) {
            tracing::warn!(error = %err, "Failed to mirror access session locally");
        }
    }

    fn forget_mirror(&self) {
        if let Err(err) = self.storage.clear() {
            tracing::warn!(error = %err, "Failed to clear local access session mirror");
        }
    }

    fn cached_mirror(&self) -> Option<SessionView> {
        match self.storage.load() {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "Unreadable local access session mirror");
                None
            }
        }
    }
}

pub struct AccessSessionHook<T, S> {
    transport: T,
    shared: Arc<Shared<S>>,
    countdown: Mutex<Option<JoinHandle<()>>>,
}

impl<T, S> AccessSessionHook<T, S>
where
    T: SessionTransport,
    S: SessionStorage + 'static,
{
    /// Create a hook in the Unknown state. Nothing is read or fetched.
    pub fn new(transport: T, storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            shared: Arc::new(Shared {
                storage,
                clock,
                state: Mutex::new(CountdownState::default()),
            }),
            countdown: Mutex::new(None),
        }
    }

    /// Create a hook, show the mirrored session straight away if it is
    /// still valid, then confirm with the server.
    pub async fn mount(transport: T, storage: S, clock: Arc<dyn Clock>) -> Self {
        let hook = Self::new(transport, storage, clock);
        hook.restore_mirror();
        hook.check_session().await;
        hook
    }

    pub fn session(&self) -> Option<SessionView> {
        self.shared.state().session.clone()
    }

    /// Seconds until the cached session expires, as of the last tick.
    pub fn time_remaining(&self) -> u64 {
        self.shared.state().time_remaining
    }

    pub fn is_active(&self) -> bool {
        let now = self.shared.clock.now();
        self.shared
            .state()
            .session
            .as_ref()
            .is_some_and(|session| session.is_active_at(now))
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_active() {
            SessionStatus::Active
        } else if self.shared.state().checked {
            SessionStatus::Inactive
        } else {
            SessionStatus::Unknown
        }
    }

    /// Whether the cached session opens `module_id`. `None` asks about
    /// access in general.
    pub fn has_module_access(&self, module_id: Option<&str>) -> bool {
        let now = self.shared.clock.now();
        self.shared
            .state()
            .session
            .as_ref()
            .is_some_and(|session| session.is_active_at(now) && session.covers_module(module_id))
    }

    /// `H:MM:SS` from one hour up, `M:SS` below.
    pub fn format_time_remaining(&self) -> String {
        format_countdown(self.time_remaining())
    }

    /// Advance the countdown now instead of waiting for the timer.
    pub fn tick(&self) -> u64 {
        self.shared.tick()
    }

    /// Ask the server for the current session and replace the local cache
    /// with its answer.
    ///
    /// Only when the call itself fails does the hook keep a previously
    /// cached session, and only while that session has not expired.
    pub async fn check_session(&self) -> Option<SessionView> {
        let result = self.transport.check().await;
        self.shared.state().checked = true;

        match result {
            Ok(response) => match response.session.filter(|_| response.active) {
                Some(session) => {
                    self.adopt(session);
                    self.session()
                }
                None => {
                    self.reset();
                    None
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "Session check failed, falling back to cached session");

                let now = self.shared.clock.now();
                let cached = self
                    .session()
                    .or_else(|| self.shared.cached_mirror())
                    .filter(|session| session.is_active_at(now));

                match cached {
                    Some(session) => {
                        self.adopt(session);
                        self.session()
                    }
                    None => {
                        self.reset();
                        None
                    }
                }
            }
        }
    }

    /// Redeem a code. The cache changes only after the server confirms.
    ///
    /// # Errors
    ///
    /// - `Rejected`: the server's reason, ready to show to the user
    /// - anything else: the call did not complete; nothing changed locally
    pub async fn activate_code(
        &self,
        code: &str,
        module_id: Option<&str>,
    ) -> Result<SessionView, ClientError> {
        let response = self.transport.activate(code, module_id).await?;

        if !response.success {
            return Err(match response.error {
                Some(message) => ClientError::Rejected(message),
                None => ClientError::MalformedResponse,
            });
        }

        let session = response.session.ok_or(ClientError::MalformedResponse)?;
        if response.already_active {
            tracing::debug!(session_id = %session.id, "Session was already active");
        }

        self.shared.state().checked = true;
        self.adopt(session.clone());

        Ok(session)
    }

    /// Forget the session locally. The server is not told; its view is
    /// governed by expiry alone.
    pub fn end_session(&self) {
        self.reset();
    }

    fn restore_mirror(&self) {
        let now = self.shared.clock.now();
        match self.shared.cached_mirror() {
            Some(session) if session.is_active_at(now) => self.adopt(session),
            Some(_) => self.reset(),
            None => {}
        }
    }

    /// Cache and mirror `session`. The countdown restarts only for a
    /// different session; for the current one it never moves upward.
    fn adopt(&self, session: SessionView) {
        let remaining = session.seconds_remaining(self.shared.clock.now());
        if remaining == 0 {
            self.reset();
            return;
        }

        let is_new = {
            let mut state = self.shared.state();
            let is_new = state.session.as_ref().map(|s| s.id) != Some(session.id);
            state.time_remaining = if is_new {
                remaining
            } else {
                remaining.min(state.time_remaining)
            };
            self.shared.remember(&session);
            state.session = Some(session);
            is_new
        };

        if is_new {
            self.start_countdown();
        }
    }

    fn reset(&self) {
        self.stop_countdown();

        let mut state = self.shared.state();
        state.session = None;
        state.time_remaining = 0;
        self.shared.forget_mirror();
    }

    fn start_countdown(&self) {
        let mut slot = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        // Outside a runtime the owner drives the countdown through `tick`
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        *slot = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if shared.tick() == 0 {
                    break;
                }
            }
        }));
    }

    fn stop_countdown(&self) {
        if let Some(handle) = self
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl AccessSessionHook<HttpTransport, FileStorage> {
    /// Hook that talks to the configured endpoint and mirrors the session
    /// under `cache_dir`. Nothing is fetched until the first call.
    pub fn from_config(config: &ClientConfig, clock: Arc<dyn Clock>) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(transport, FileStorage::new(&config.cache_dir), clock))
    }
}

impl<T, S> Drop for AccessSessionHook<T, S> {
    fn drop(&mut self) {
        let slot = self
            .countdown
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
