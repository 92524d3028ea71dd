use dpg_common::{TokenAmount, WalletAddress};

use super::TransferQueryFilter;
use crate::db_types::{DepositIntent, LedgerEntry, ObservedTransfer, TransferStatus, UserAccount};

#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    type Error: std::error::Error;

    /// Fetches the user account with the given id. If no account exists, `None` is returned.
    async fn fetch_user_account(&self, account_id: i64) -> Result<Option<UserAccount>, Self::Error>;

    /// Fetches the user account holding the given wallet address.
    async fn fetch_user_account_for_wallet(&self, wallet: &WalletAddress) -> Result<Option<UserAccount>, Self::Error>;

    /// Fetches a deposit intent by id.
    async fn fetch_intent(&self, intent_id: i64) -> Result<Option<DepositIntent>, Self::Error>;

    /// All observed transfers bound to the given intent, with their live confirmation counts.
    async fn fetch_transfers_for_intent(&self, intent_id: i64) -> Result<Vec<ObservedTransfer>, Self::Error>;

    /// Fetches a transfer by its natural key.
    async fn fetch_transfer(&self, tx_hash: &str, log_index: i64) -> Result<Option<ObservedTransfer>, Self::Error>;

    /// Admin listing: transfers matching the filter, newest first.
    async fn search_transfers(&self, filter: TransferQueryFilter) -> Result<Vec<ObservedTransfer>, Self::Error>;

    /// Aggregate transfer counts and amounts per status.
    async fn transfer_status_counts(&self) -> Result<Vec<(TransferStatus, i64, TokenAmount)>, Self::Error>;

    /// The full ledger for an account, oldest first.
    async fn fetch_ledger_for_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, Self::Error>;
}
