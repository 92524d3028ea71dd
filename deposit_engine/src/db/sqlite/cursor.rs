use log::*;
use sqlx::SqliteConnection;

use crate::db::sqlite::SqliteDatabaseError;

/// The durably persisted scan cursor: the highest block a completed pass has scanned. `None`
/// means this deployment has never completed a pass.
pub async fn last_scanned_block(conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let block = sqlx::query_scalar::<_, i64>("SELECT last_scanned_block FROM scan_cursor WHERE id = 1")
        .fetch_optional(conn)
        .await?;
    Ok(block)
}

/// Writes the cursor. Called only after a pass completes, so a crash mid-pass re-derives the same
/// or an overlapping range on the next invocation; re-scanning is harmless by construction.
pub async fn set_last_scanned_block(block: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"
            INSERT INTO scan_cursor (id, last_scanned_block) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE
            SET last_scanned_block = excluded.last_scanned_block, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(block)
    .execute(conn)
    .await?;
    trace!("🗃️ Scan cursor advanced to block {block}");
    Ok(())
}
