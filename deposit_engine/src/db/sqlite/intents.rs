use chrono::{DateTime, Utc};
use dpg_common::WalletAddress;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{DepositIntent, IntentStatus, NewDepositIntent},
};

const INTENT_COLUMNS: &str = "id, user_account_id, expected_amount, status, created_at, expires_at";

pub async fn insert_intent(
    intent: NewDepositIntent,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO deposit_intents (user_account_id, expected_amount, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id;
        "#,
    )
    .bind(intent.user_account_id)
    .bind(intent.expected_amount)
    .bind(intent.expires_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Deposit intent #{id} created for account #{}", intent.user_account_id);
    Ok(id)
}

pub async fn fetch_intent(
    intent_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DepositIntent>, SqliteDatabaseError> {
    let intent =
        sqlx::query_as::<_, DepositIntent>(&format!("SELECT {INTENT_COLUMNS} FROM deposit_intents WHERE id = $1"))
            .bind(intent_id)
            .fetch_optional(conn)
            .await?;
    Ok(intent)
}

/// The most-recently-created live `Pending` intent owned by an account holding the sender wallet.
/// Last-writer-wins by creation time; matching is deliberately amount-blind.
pub async fn find_matchable_intent(
    sender: &WalletAddress,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
            SELECT id FROM deposit_intents
            WHERE status = 'Pending'
            AND expires_at > $1
            AND user_account_id IN (
                SELECT user_account_id FROM user_account_wallets WHERE wallet_address = $2
            )
            ORDER BY created_at DESC, id DESC
            LIMIT 1
        "#,
    )
    .bind(now)
    .bind(sender)
    .fetch_optional(conn)
    .await?;
    Ok(id)
}

pub async fn account_for_intent(intent_id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT user_account_id FROM deposit_intents WHERE id = $1")
        .bind(intent_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

pub async fn update_status(
    intent_id: i64,
    status: IntentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE deposit_intents SET status = $1 WHERE id = $2")
        .bind(status.to_string())
        .bind(intent_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Flips pending intents past their expiry to `Expired` and returns the affected ids. Intents in
/// any other state are left alone; an intent that already detected a transfer stays live so the
/// deposit can complete even if the transfer confirms slowly.
pub async fn expire_stale(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<i64>, SqliteDatabaseError> {
    let expired = sqlx::query_scalar::<_, i64>(
        r#"
            UPDATE deposit_intents SET status = 'Expired'
            WHERE status = 'Pending' AND expires_at <= $1
            RETURNING id;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    if !expired.is_empty() {
        debug!("📝️ {} deposit intents expired", expired.len());
    }
    Ok(expired)
}
