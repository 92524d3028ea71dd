use dpg_common::{TokenAmount, WalletAddress};
use log::*;
use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, db_types::UserAccount};

const ACCOUNT_COLUMNS: &str = "id, created_at, updated_at, current_balance";

pub async fn account_by_id(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let account =
        sqlx::query_as::<_, UserAccount>(&format!("SELECT {ACCOUNT_COLUMNS} FROM user_accounts WHERE id = $1"))
            .bind(account_id)
            .fetch_optional(conn)
            .await?;
    Ok(account)
}

/// Fetches the user account holding the given wallet. If no account exists, `None` is returned.
pub async fn account_for_wallet(
    wallet: &WalletAddress,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, SqliteDatabaseError> {
    let account = sqlx::query_as::<_, UserAccount>(&format!(
        r#"
            SELECT {ACCOUNT_COLUMNS} FROM user_accounts
            WHERE user_accounts.id = (
                SELECT user_account_id FROM user_account_wallets WHERE wallet_address = $1 LIMIT 1
            )
        "#
    ))
    .bind(wallet)
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

/// Returns the internal account id for the given wallet, if a link exists.
pub async fn account_id_for_wallet(
    wallet: &WalletAddress,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT user_account_id FROM user_account_wallets WHERE wallet_address = $1 LIMIT 1",
    )
    .bind(wallet)
    .fetch_optional(conn)
    .await?;
    if let Some(id) = id {
        trace!("🧑️ Wallet {wallet} is linked to account #{id}");
    }
    Ok(id)
}

/// Creates a new user account and links the wallet to it.
async fn create_account_with_wallet(
    wallet: &WalletAddress,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let account_id = sqlx::query_scalar::<_, i64>("INSERT INTO user_accounts DEFAULT VALUES RETURNING id")
        .fetch_one(&mut *conn)
        .await?;
    let result = sqlx::query("INSERT INTO user_account_wallets (user_account_id, wallet_address) VALUES ($1, $2)")
        .bind(account_id)
        .bind(wallet)
        .execute(conn)
        .await;
    if let Err(e) = result {
        return Err(SqliteDatabaseError::AccountCreationError(format!(
            "Could not link wallet {wallet} to new account #{account_id}: {e}"
        )));
    }
    debug!("🧑️ Created user account #{account_id} linked to wallet {wallet}");
    Ok(account_id)
}

/// Fetches the account holding the wallet, creating the account and the link if none exists.
pub async fn fetch_or_create_account_for_wallet(
    wallet: &WalletAddress,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    match account_id_for_wallet(wallet, &mut *conn).await? {
        Some(id) => Ok(id),
        None => create_account_with_wallet(wallet, conn).await,
    }
}

pub async fn update_user_balance(
    account_id: i64,
    balance: TokenAmount,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"UPDATE user_accounts SET
           current_balance = $1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $2
        "#,
    )
    .bind(balance)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(())
}
