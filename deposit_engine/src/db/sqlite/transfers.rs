use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::{ConfirmationUpdate, InsertTransferResult, TransferQueryFilter}},
    db_types::{NewTransfer, ObservedTransfer, TransferStatus},
};

/// Confirmation count at which a transfer stops being merely `Pending` and becomes `Confirming`.
const CONFIRMING_FLOOR: i64 = 6;

const TRANSFER_COLUMNS: &str = r#"
    id, tx_hash, log_index, sender, recipient, amount, block_number, confirmations, status,
    intent_id, credited_at, created_at, updated_at
"#;

/// Records an observed transfer. The `(tx_hash, log_index)` uniqueness constraint turns
/// re-observation into a no-op: on a collision the existing row id is returned untouched.
pub async fn idempotent_insert(
    transfer: NewTransfer,
    conn: &mut SqliteConnection,
) -> Result<InsertTransferResult, SqliteDatabaseError> {
    let result = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO transfers (tx_hash, log_index, sender, recipient, amount, block_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id;
        "#,
    )
    .bind(&transfer.tx_hash)
    .bind(transfer.log_index)
    .bind(&transfer.sender)
    .bind(&transfer.recipient)
    .bind(transfer.amount)
    .bind(transfer.block_number)
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(id) => Ok(InsertTransferResult::Inserted(id)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let id = sqlx::query_scalar::<_, i64>("SELECT id FROM transfers WHERE tx_hash = $1 AND log_index = $2")
                .bind(&transfer.tx_hash)
                .bind(transfer.log_index)
                .fetch_one(conn)
                .await?;
            Ok(InsertTransferResult::AlreadyExists(id))
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_transfer_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ObservedTransfer>, SqliteDatabaseError> {
    let transfer = sqlx::query_as::<_, ObservedTransfer>(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(transfer)
}

pub async fn fetch_transfer_by_key(
    tx_hash: &str,
    log_index: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ObservedTransfer>, SqliteDatabaseError> {
    let transfer = sqlx::query_as::<_, ObservedTransfer>(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE tx_hash = $1 AND log_index = $2"
    ))
    .bind(tx_hash)
    .bind(log_index)
    .fetch_optional(conn)
    .await?;
    Ok(transfer)
}

pub async fn fetch_transfers_for_intent(
    intent_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ObservedTransfer>, SqliteDatabaseError> {
    let transfers = sqlx::query_as::<_, ObservedTransfer>(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE intent_id = $1 ORDER BY block_number ASC, log_index ASC"
    ))
    .bind(intent_id)
    .fetch_all(conn)
    .await?;
    Ok(transfers)
}

/// The state a transfer belongs in at the given confirmation depth. Pure; the caller enforces the
/// no-backward-movement rule.
fn status_for_confirmations(confirmations: i64, threshold: i64) -> TransferStatus {
    if confirmations >= threshold {
        TransferStatus::Confirmed
    } else if confirmations >= CONFIRMING_FLOOR {
        TransferStatus::Confirming
    } else {
        TransferStatus::Pending
    }
}

fn progression_rank(status: TransferStatus) -> u8 {
    match status {
        TransferStatus::Pending => 0,
        TransferStatus::Confirming => 1,
        TransferStatus::Confirmed => 2,
        TransferStatus::Credited | TransferStatus::Reorged => 3,
    }
}

/// One confirmation-tracking sweep over every non-terminal transfer, not limited to any scan
/// window: older pending transfers keep advancing. Confirmation counts are persisted even when
/// unchanged-in-state so status displays always show a fresh value, and neither the count nor the
/// state ever moves backwards here. Idempotent; safe to run arbitrarily often.
pub async fn update_confirmations(
    height: i64,
    threshold: i64,
    conn: &mut SqliteConnection,
) -> Result<ConfirmationUpdate, SqliteDatabaseError> {
    let open = sqlx::query_as::<_, ObservedTransfer>(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE status IN ('Pending', 'Confirming', 'Confirmed')"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let mut result = ConfirmationUpdate::default();
    for transfer in open {
        let confirmations = (height - transfer.block_number).max(0).max(transfer.confirmations);
        let computed = status_for_confirmations(confirmations, threshold);
        let status = if progression_rank(computed) > progression_rank(transfer.status) { computed } else { transfer.status };
        sqlx::query("UPDATE transfers SET confirmations = $1, status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3")
            .bind(confirmations)
            .bind(status.to_string())
            .bind(transfer.id)
            .execute(&mut *conn)
            .await?;
        result.updated += 1;
        if status == TransferStatus::Confirmed && transfer.status != TransferStatus::Confirmed {
            trace!("🗃️ Transfer {}:{} reached {confirmations} confirmations", transfer.tx_hash, transfer.log_index);
            result.newly_confirmed.push(transfer.id);
        }
    }
    Ok(result)
}

pub async fn fetch_creditable(conn: &mut SqliteConnection) -> Result<Vec<ObservedTransfer>, SqliteDatabaseError> {
    let transfers = sqlx::query_as::<_, ObservedTransfer>(&format!(
        r#"SELECT {TRANSFER_COLUMNS} FROM transfers
           WHERE status = 'Confirmed' AND credited_at IS NULL
           ORDER BY block_number ASC, log_index ASC"#
    ))
    .fetch_all(conn)
    .await?;
    Ok(transfers)
}

pub async fn mark_credited(id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"UPDATE transfers
           SET status = 'Credited', credited_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
           WHERE id = $1"#,
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn set_intent(id: i64, intent_id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE transfers SET intent_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(intent_id)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Operator-only reorg flag. A credited transfer cannot be flagged; the money already moved and
/// must be handled with a manual ledger adjustment instead. The status guard lives in the UPDATE
/// itself, so a crediting transaction that lands first can never be overwritten.
pub async fn mark_reorged(
    tx_hash: &str,
    log_index: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        r#"UPDATE transfers SET status = 'Reorged', updated_at = CURRENT_TIMESTAMP
           WHERE tx_hash = $1 AND log_index = $2 AND status != 'Credited'"#,
    )
    .bind(tx_hash)
    .bind(log_index)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        let reason = match fetch_transfer_by_key(tx_hash, log_index, conn).await? {
            Some(t) => {
                format!("Transfer {tx_hash}:{log_index} is already {} and cannot be marked as reorged", t.status)
            },
            None => format!("Transfer {tx_hash}:{log_index} not found"),
        };
        return Err(SqliteDatabaseError::TransferStatusUpdateError(reason));
    }
    warn!("🗃️ Transfer {tx_hash}:{log_index} flagged as reorged. It will never be credited.");
    Ok(())
}

/// Fetches transfers according to the criteria in the `TransferQueryFilter`, newest first.
pub async fn search_transfers(
    filter: TransferQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<ObservedTransfer>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE 1 = 1"));
    if let Some(sender) = filter.sender {
        builder.push(" AND sender = ");
        builder.push_bind(sender.as_str().to_string());
    }
    if !filter.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut statuses = builder.separated(", ");
        for status in &filter.statuses {
            statuses.push_bind(status.to_string());
        }
        builder.push(")");
    }
    builder.push(" ORDER BY block_number DESC, log_index DESC");
    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let transfers = builder.build_query_as::<ObservedTransfer>().fetch_all(conn).await?;
    Ok(transfers)
}

pub async fn status_counts(
    conn: &mut SqliteConnection,
) -> Result<Vec<(TransferStatus, i64, dpg_common::TokenAmount)>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        "SELECT status, COUNT(*), COALESCE(SUM(amount), 0) FROM transfers GROUP BY status",
    )
    .fetch_all(conn)
    .await?;
    let counts = rows
        .into_iter()
        .map(|(status, count, total)| (TransferStatus::from(status), count, dpg_common::TokenAmount::from(total)))
        .collect();
    Ok(counts)
}

pub async fn max_block_number(conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let max = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(block_number) FROM transfers").fetch_one(conn).await?;
    Ok(max)
}
