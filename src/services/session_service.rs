//! Partner session service - grants, checks and expires access sessions.
//!
//! This service handles:
//! - Lazy expiry: stale rows are deactivated at the start of every call
//! - One live session per requester address
//! - One activation per (address, code) pair, ever
//! - Expiry computation from the redeemed code's duration
//!
//! The service holds no per-request state; every invariant is enforced by
//! the store it is given.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    clock::Clock,
    error::AppError,
    middleware::requester::address_fingerprint,
    models::{
        access_code::{normalize_code, normalize_module_id},
        access_session::AccessSession,
    },
    store::{AccessStore, ActivationOutcome, NewActivation},
};

/// What `activate` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// A code was redeemed and a new session recorded.
    Created(AccessSession),
    /// The requester already had a live session; nothing was redeemed.
    AlreadyActive(AccessSession),
}

impl Activation {
    pub fn session(&self) -> &AccessSession {
        match self {
            Activation::Created(session) | Activation::AlreadyActive(session) => session,
        }
    }
}

pub struct SessionService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: AccessStore> SessionService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Deactivate every session that has run out.
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let swept = self.store.deactivate_expired(self.clock.now()).await?;
        if swept > 0 {
            tracing::debug!(swept, "Deactivated expired sessions");
        }
        Ok(swept)
    }

    /// Find the requester's live session.
    ///
    /// # Process
    ///
    /// 1. Sweep expired rows
    /// 2. Return the newest active row with `expires_at > now`, if any
    pub async fn check(&self, requester: IpAddr) -> Result<Option<AccessSession>, AppError> {
        let now = self.clock.now();
        let swept = self.store.deactivate_expired(now).await?;
        if swept > 0 {
            tracing::debug!(swept, "Deactivated expired sessions");
        }

        self.store
            .find_active_session(&requester.to_string(), now)
            .await
    }

    /// Redeem `code` for the requester.
    ///
    /// # Process
    ///
    /// 1. Validate the code and module id (before touching the store)
    /// 2. Sweep expired rows
    /// 3. Live session already present: return it, redeem nothing
    /// 4. Address redeemed this code before: deny, with no recovery
    /// 5. Redeem against the registry and record the session atomically
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: missing or malformed code / module id
    /// - `CodeAlreadyUsed`: this address has used the code before
    /// - `CodeRejected`: the registry refused the code
    /// - `Database`: the store failed
    pub async fn activate(
        &self,
        requester: IpAddr,
        code: &str,
        module_id: Option<&str>,
    ) -> Result<Activation, AppError> {
        let code = normalize_code(code)?;
        let module_id = normalize_module_id(module_id)?;

        let now = self.clock.now();
        let ip_address = requester.to_string();
        let fingerprint = address_fingerprint(&requester);

        self.store.deactivate_expired(now).await?;

        if let Some(existing) = self.store.find_active_session(&ip_address, now).await? {
            tracing::debug!(
                requester = %fingerprint,
                session_id = %existing.id,
                "Activation skipped, session already active"
            );
            return Ok(Activation::AlreadyActive(existing));
        }

        if self.store.has_redeemed(&ip_address, &code).await? {
            tracing::warn!(requester = %fingerprint, "Code already used by this address");
            return Err(AppError::CodeAlreadyUsed);
        }

        let outcome = self
            .store
            .activate(NewActivation {
                ip_address: ip_address.clone(),
                code,
                module_id,
                now,
            })
            .await?;

        match outcome {
            ActivationOutcome::Created(session) => {
                tracing::info!(
                    requester = %fingerprint,
                    session_id = %session.id,
                    partner_id = %session.partner_id,
                    module_id = session.module_id.as_deref().unwrap_or("*"),
                    expires_at = %session.expires_at,
                    "Access session activated"
                );
                Ok(Activation::Created(session))
            }
            ActivationOutcome::AlreadyActive(session) => Ok(Activation::AlreadyActive(session)),
            ActivationOutcome::AlreadyUsed => {
                tracing::warn!(requester = %fingerprint, "Code already used by this address");
                Err(AppError::CodeAlreadyUsed)
            }
            ActivationOutcome::Rejected(rejection) => {
                tracing::warn!(
                    requester = %fingerprint,
                    reason = rejection.kind(),
                    "Code redemption refused"
                );
                Err(AppError::CodeRejected(rejection))
            }
            // A concurrent request for this address inserted first. If it
            // left a live session, report that one.
            ActivationOutcome::Conflict => {
                match self.store.find_active_session(&ip_address, now).await? {
                    Some(session) => Ok(Activation::AlreadyActive(session)),
                    None => Err(AppError::CodeAlreadyUsed),
                }
            }
        }
    }
}

/// Periodically sweep expired sessions until the task is dropped.
///
/// Runs alongside the per-request sweep; it only keeps `is_active` tidy
/// for rows nobody is asking about.
pub async fn run_expiry_sweeper<S: AccessStore>(service: Arc<SessionService<S>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match service.sweep_expired().await {
            Ok(swept) if swept > 0 => tracing::info!(swept, "Periodic expiry sweep"),
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "Periodic expiry sweep failed"),
        }
    }
}
