//! Database helpers for the credential store and token ledger.
//!
//! Every multi-statement mutation here is a single transaction: a crash
//! between a revocation and the matching insert must never leave a usable
//! stale refresh token or an unrevoked session next to a changed password.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::Role;
use super::utils::is_unique_violation;

/// Outcome of inserting a refresh-token ledger row.
///
/// A duplicate hash cannot happen for honestly minted tokens (each carries a
/// fresh jti); the unique constraint is the backstop against replays and
/// insert races, surfaced as a conflict rather than a raw storage error.
#[derive(Debug)]
pub(super) enum LedgerOutcome {
    Recorded,
    DuplicateToken,
}

/// Identity row used by login, refresh, and profile lookups.
pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) school_id: Option<Uuid>,
    pub(super) role: Role,
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) last_login_at: Option<DateTime<Utc>>,
}

/// Unconsumed password-reset code row.
pub(super) struct OtpRecord {
    pub(super) id: Uuid,
    pub(super) otp_hash: String,
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<UserRecord> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in database: {role}"))?;
    Ok(UserRecord {
        id: row.get("id"),
        school_id: row.get("school_id"),
        role,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        last_login_at: row.get("last_login_at"),
    })
}

const USER_COLUMNS: &str = "id, school_id, role, email, password_hash, last_login_at";

/// Look up an active user by normalized email.
pub(super) async fn lookup_active_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = TRUE LIMIT 1"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    row.as_ref().map(row_to_user).transpose()
}

pub(super) async fn lookup_active_user_by_id(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserRecord>> {
    let query =
        format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    row.as_ref().map(row_to_user).transpose()
}

/// Record a successful login: persist the refresh-token ledger entry and
/// stamp `last_login_at` as one atomic unit.
pub(super) async fn persist_login(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &[u8],
    expires_at: DateTime<Utc>,
) -> Result<LedgerOutcome> {
    let mut tx = pool.begin().await.context("begin login transaction")?;

    match insert_refresh_token(&mut tx, user_id, token_hash, expires_at).await? {
        LedgerOutcome::DuplicateToken => {
            let _ = tx.rollback().await;
            return Ok(LedgerOutcome::DuplicateToken);
        }
        LedgerOutcome::Recorded => {}
    }

    let query = "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update last login")?;

    tx.commit().await.context("commit login transaction")?;
    Ok(LedgerOutcome::Recorded)
}

async fn insert_refresh_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    token_hash: &[u8],
    expires_at: DateTime<Utc>,
) -> Result<LedgerOutcome> {
    let query = r"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&mut **tx)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(LedgerOutcome::Recorded),
        Err(err) if is_unique_violation(&err) => Ok(LedgerOutcome::DuplicateToken),
        Err(err) => Err(err).context("failed to insert refresh token"),
    }
}

/// Resolve a refresh-token hash to its active owner.
///
/// The entry must exist, be unrevoked, be unexpired, and join to an active
/// user; callers cannot distinguish which check failed.
pub(super) async fn lookup_live_refresh_user(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT users.id, users.school_id, users.role, users.email,
               users.password_hash, users.last_login_at
        FROM refresh_tokens
        JOIN users ON users.id = refresh_tokens.user_id
        WHERE refresh_tokens.token_hash = $1
          AND refresh_tokens.revoked_at IS NULL
          AND refresh_tokens.expires_at > NOW()
          AND users.is_active = TRUE
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup refresh token")?;

    row.as_ref().map(row_to_user).transpose()
}

/// Rotate a refresh token: revoke the old ledger row and record the new one
/// atomically, so the old token is unusable the instant the new one exists.
pub(super) async fn rotate_refresh_token(
    pool: &PgPool,
    old_token_hash: &[u8],
    user_id: Uuid,
    new_token_hash: &[u8],
    new_expires_at: DateTime<Utc>,
) -> Result<LedgerOutcome> {
    let mut tx = pool.begin().await.context("begin rotation transaction")?;

    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(old_token_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke rotated refresh token")?;

    match insert_refresh_token(&mut tx, user_id, new_token_hash, new_expires_at).await? {
        LedgerOutcome::DuplicateToken => {
            let _ = tx.rollback().await;
            return Ok(LedgerOutcome::DuplicateToken);
        }
        LedgerOutcome::Recorded => {}
    }

    tx.commit().await.context("commit rotation transaction")?;
    Ok(LedgerOutcome::Recorded)
}

/// Revoke a single refresh token (logout). Idempotent; reports whether a
/// live row was actually revoked.
pub(super) async fn revoke_refresh_token(pool: &PgPool, token_hash: &[u8]) -> Result<bool> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(result.rows_affected() > 0)
}

/// Store a new password-reset OTP, invalidating all prior unused codes for
/// the email in the same transaction. Returns the stored expiry.
pub(super) async fn record_otp(
    pool: &PgPool,
    email: &str,
    otp_hash: &str,
    ttl_minutes: i64,
) -> Result<DateTime<Utc>> {
    let mut tx = pool.begin().await.context("begin otp transaction")?;

    let query = r"
        UPDATE password_reset_otps
        SET used_at = NOW()
        WHERE email = $1
          AND used_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to invalidate prior otps")?;

    let query = r"
        INSERT INTO password_reset_otps (email, otp_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 minute'))
        RETURNING expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(otp_hash)
        .bind(ttl_minutes)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert otp")?;

    tx.commit().await.context("commit otp transaction")?;
    Ok(row.get("expires_at"))
}

/// Most recent unused, unexpired OTP for an email, if any.
pub(super) async fn latest_unused_otp(pool: &PgPool, email: &str) -> Result<Option<OtpRecord>> {
    let query = r"
        SELECT id, otp_hash
        FROM password_reset_otps
        WHERE email = $1
          AND used_at IS NULL
          AND expires_at > NOW()
        ORDER BY created_at DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup otp")?;

    Ok(row.map(|row| OtpRecord {
        id: row.get("id"),
        otp_hash: row.get("otp_hash"),
    }))
}

pub(super) async fn mark_otp_used(pool: &PgPool, otp_id: Uuid) -> Result<()> {
    let query = "UPDATE password_reset_otps SET used_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(otp_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark otp used")?;
    Ok(())
}

/// Apply a password reset: set the new hash, revoke every live refresh
/// token, and consume any remaining unused OTPs for the email, atomically.
pub(super) async fn apply_password_reset(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    new_password_hash: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    set_password_hash(&mut tx, user_id, new_password_hash).await?;
    revoke_all_refresh_tokens(&mut tx, user_id).await?;

    let query = r"
        UPDATE password_reset_otps
        SET used_at = NOW()
        WHERE email = $1
          AND used_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume remaining otps")?;

    tx.commit().await.context("commit reset transaction")?;
    Ok(())
}

/// Apply an authenticated password change: set the new hash and revoke every
/// live refresh token, forcing re-login everywhere.
pub(super) async fn apply_password_change(
    pool: &PgPool,
    user_id: Uuid,
    new_password_hash: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin password change transaction")?;

    set_password_hash(&mut tx, user_id, new_password_hash).await?;
    revoke_all_refresh_tokens(&mut tx, user_id).await?;

    tx.commit()
        .await
        .context("commit password change transaction")?;
    Ok(())
}

async fn set_password_hash(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    new_password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to set password hash")?;
    Ok(())
}

async fn revoke_all_refresh_tokens(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE user_id = $1
          AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to revoke user refresh tokens")?;
    Ok(())
}
