use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{LedgerEntry, NewLedgerEntry},
};

/// Outcome of trying to append a ledger entry. A duplicate key is not an error at this layer; it
/// is the signal the crediting engine's exactly-once guarantee is built on.
pub enum InsertEntryResult {
    Inserted(i64),
    DuplicateKey,
}

/// Appends a ledger entry. The `idempotency_key` uniqueness constraint makes this the single
/// serialisation point for a given balance-affecting event: whichever invocation inserts first
/// wins, every other one observes `DuplicateKey` and must apply no side effects.
pub async fn insert_entry(
    entry: NewLedgerEntry,
    balance_after: dpg_common::TokenAmount,
    conn: &mut SqliteConnection,
) -> Result<InsertEntryResult, SqliteDatabaseError> {
    let result = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO ledger_entries
                (user_account_id, entry_type, amount, balance_after, ref_type, ref_id, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id;
        "#,
    )
    .bind(entry.user_account_id)
    .bind(entry.entry_type.to_string())
    .bind(entry.amount)
    .bind(balance_after)
    .bind(&entry.ref_type)
    .bind(&entry.ref_id)
    .bind(&entry.idempotency_key)
    .fetch_one(conn)
    .await;
    match result {
        Ok(id) => Ok(InsertEntryResult::Inserted(id)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            trace!("🗃️ Ledger key {} already present. No entry written.", entry.idempotency_key);
            Ok(InsertEntryResult::DuplicateKey)
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_entries_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, SqliteDatabaseError> {
    let entries = sqlx::query_as::<_, LedgerEntry>(
        r#"
            SELECT id, user_account_id, entry_type, amount, balance_after, ref_type, ref_id,
                   idempotency_key, created_at
            FROM ledger_entries
            WHERE user_account_id = $1
            ORDER BY id ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
