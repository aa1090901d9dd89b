//! In-process access store.
//!
//! Codes and sessions live behind a single mutex, so every operation,
//! activation included, is atomic. Clones share the same data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        access_code::{AccessCode, RedeemRejection},
        access_session::AccessSession,
    },
    store::{AccessStore, ActivationOutcome, NewActivation},
};

#[derive(Debug, Default)]
struct Tables {
    /// Keyed by upper-cased code
    codes: HashMap<String, AccessCode>,
    sessions: Vec<AccessSession>,
}

impl Tables {
    fn live_session(&self, ip_address: &str, now: DateTime<Utc>) -> Option<&AccessSession> {
        self.sessions
            .iter()
            .filter(|s| s.ip_address == ip_address && s.is_live_at(now))
            .max_by_key(|s| s.started_at)
    }

    fn has_redeemed(&self, ip_address: &str, code: &str) -> bool {
        self.sessions
            .iter()
            .any(|s| s.ip_address == ip_address && s.code == code)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a code in the registry.
    pub fn insert_code(&self, mut code: AccessCode) {
        code.code = code.code.to_ascii_uppercase();
        self.tables().codes.insert(code.code.clone(), code);
    }

    pub fn code(&self, code: &str) -> Option<AccessCode> {
        self.tables().codes.get(&code.to_ascii_uppercase()).cloned()
    }

    /// Every session ever recorded, oldest first.
    pub fn sessions(&self) -> Vec<AccessSession> {
        self.tables().sessions.clone()
    }
}

impl AccessStore for MemoryStore {
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tables = self.tables();
        let mut updated = 0;
        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.is_active && s.expires_at <= now)
        {
            session.is_active = false;
            updated += 1;
        }
        Ok(updated)
    }

    async fn find_active_session(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError> {
        Ok(self.tables().live_session(ip_address, now).cloned())
    }

    async fn has_redeemed(&self, ip_address: &str, code: &str) -> Result<bool, AppError> {
        Ok(self.tables().has_redeemed(ip_address, code))
    }

    async fn activate(&self, activation: NewActivation) -> Result<ActivationOutcome, AppError> {
        let mut tables = self.tables();

        if let Some(existing) = tables.live_session(&activation.ip_address, activation.now) {
            return Ok(ActivationOutcome::AlreadyActive(existing.clone()));
        }

        if tables.has_redeemed(&activation.ip_address, &activation.code) {
            return Ok(ActivationOutcome::AlreadyUsed);
        }

        let Some(access_code) = tables.codes.get_mut(&activation.code) else {
            return Ok(ActivationOutcome::Rejected(RedeemRejection::NotFound));
        };

        let redeemed = match access_code.check_redeemable(activation.module_id.as_deref(), activation.now) {
            Ok(redeemed) => redeemed,
            Err(rejection) => return Ok(ActivationOutcome::Rejected(rejection)),
        };
        access_code.current_uses += 1;

        let session = AccessSession::from_redemption(&activation.ip_address, redeemed, activation.now);
        tables.sessions.push(session.clone());

        Ok(ActivationOutcome::Created(session))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
