//! PostgreSQL-backed access store.
//!
//! # Atomicity Guarantees
//!
//! Activation runs inside one PostgreSQL transaction:
//! - a transaction-scoped advisory lock keyed on the requester address
//!   serialises racing activations from the same address
//! - the code row is locked `FOR UPDATE` while it is validated and its
//!   `current_uses` incremented
//! - the session insert relies on `UNIQUE (ip_address, code)`; a violation
//!   rolls everything back and is reported as a conflict

use chrono::{DateTime, Utc};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        access_code::{AccessCode, RedeemRejection},
        access_session::AccessSession,
    },
    store::{AccessStore, ActivationOutcome, NewActivation},
};

const SESSION_COLUMNS: &str = "id, ip_address, code, partner_id, module_id, \
     activity_duration_minutes, started_at, expires_at, is_active";

#[derive(Debug, Clone)]
pub struct PgAccessStore {
    pool: DbPool,
}

impl PgAccessStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl AccessStore for PgAccessStore {
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let updated = sqlx::query(
            "UPDATE access_sessions SET is_active = false WHERE is_active AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    async fn find_active_session(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessSession>, AppError> {
        let session = sqlx::query_as::<_, AccessSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM access_sessions
            WHERE ip_address = $1 AND is_active AND expires_at > $2
            ORDER BY started_at DESC
            LIMIT 1
            "#
        ))
        .bind(ip_address)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn has_redeemed(&self, ip_address: &str, code: &str) -> Result<bool, AppError> {
        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM access_sessions WHERE ip_address = $1 AND code = $2)",
        )
        .bind(ip_address)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(used)
    }

    async fn activate(&self, activation: NewActivation) -> Result<ActivationOutcome, AppError> {
        let NewActivation {
            ip_address,
            code,
            module_id,
            now,
        } = activation;

        let mut tx = self.pool.begin().await?;

        // Held until commit/rollback; other activations for this address wait here
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&ip_address)
            .execute(&mut *tx)
            .await?;

        // Re-check under the lock: a racing request may have won already
        if let Some(existing) = sqlx::query_as::<_, AccessSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM access_sessions
            WHERE ip_address = $1 AND is_active AND expires_at > $2
            ORDER BY started_at DESC
            LIMIT 1
            "#
        ))
        .bind(&ip_address)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        {
            tx.rollback().await?;
            return Ok(ActivationOutcome::AlreadyActive(existing));
        }

        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM access_sessions WHERE ip_address = $1 AND code = $2)",
        )
        .bind(&ip_address)
        .bind(&code)
        .fetch_one(&mut *tx)
        .await?;

        if used {
            tx.rollback().await?;
            return Ok(ActivationOutcome::AlreadyUsed);
        }

        // Lock the code row so concurrent redemptions from other addresses
        // see each other's increments
        let Some(access_code) = sqlx::query_as::<_, AccessCode>(
            r#"
            SELECT id, code, partner_id, module_id, activity_duration_minutes,
                   max_uses, current_uses, is_active, expires_at
            FROM access_codes
            WHERE UPPER(code) = $1
            FOR UPDATE
            "#,
        )
        .bind(&code)
        .fetch_optional(&mut *tx)
        .await?
        else {
            tx.rollback().await?;
            return Ok(ActivationOutcome::Rejected(RedeemRejection::NotFound));
        };

        let redeemed = match access_code.check_redeemable(module_id.as_deref(), now) {
            Ok(redeemed) => redeemed,
            Err(rejection) => {
                tx.rollback().await?;
                return Ok(ActivationOutcome::Rejected(rejection));
            }
        };

        sqlx::query("UPDATE access_codes SET current_uses = current_uses + 1 WHERE id = $1")
            .bind(access_code.id)
            .execute(&mut *tx)
            .await?;

        // Sessions record the normalised code, which is what the
        // (ip_address, code) constraint and `has_redeemed` compare against
        let mut session = AccessSession::from_redemption(&ip_address, redeemed, now);
        session.code = code;

        let inserted = sqlx::query_as::<_, AccessSession>(&format!(
            r#"
            INSERT INTO access_sessions ({SESSION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session.id)
        .bind(&session.ip_address)
        .bind(&session.code)
        .bind(session.partner_id)
        .bind(&session.module_id)
        .bind(session.activity_duration_minutes)
        .bind(session.started_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .fetch_one(&mut *tx)
        .await;

        let session = match inserted {
            Ok(session) => session,
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(ActivationOutcome::Conflict);
            }
            Err(err) => return Err(err.into()),
        };

        // Commit the redemption and the session together
        tx.commit().await?;

        Ok(ActivationOutcome::Created(session))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
