use chrono::{DateTime, Utc};
use dpg_common::WalletAddress;

use super::{ConfirmationUpdate, CreditResult, InsertTransferResult};
use crate::db_types::{NewDepositIntent, NewLedgerEntry, NewTransfer, ObservedTransfer};

#[allow(async_fn_in_trait)]
pub trait DepositGatewayDatabase: Clone {
    type Error: std::error::Error;

    /// The URL of the database.
    fn url(&self) -> &str;

    /// Records an observed transfer, keyed on `(tx_hash, log_index)`. If the pair is already
    /// present, the existing row is left untouched and `AlreadyExists` is returned; re-observing
    /// a block range is harmless by construction.
    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<InsertTransferResult, Self::Error>;

    /// Tries to bind the transfer to the most-recently-created `Pending` intent belonging to an
    /// account that holds the transfer's sender wallet. On a match the intent becomes `Detected`
    /// and its id is returned. Matching is deliberately amount-blind; an unmatched transfer stays
    /// recorded unassigned.
    async fn match_transfer_to_intent(&self, transfer_id: i64) -> Result<Option<i64>, Self::Error>;

    /// Recomputes `confirmations = height - block_number` for every non-terminal transfer and
    /// advances `Pending → Confirming → Confirmed` according to the threshold. Counts are
    /// persisted even when the state does not change, and neither the count nor the state ever
    /// moves backwards. Safe to run arbitrarily often.
    async fn update_confirmations(&self, height: i64, threshold: i64) -> Result<ConfirmationUpdate, Self::Error>;

    /// All transfers in `Confirmed` state that have not been credited yet.
    async fn fetch_creditable_transfers(&self) -> Result<Vec<ObservedTransfer>, Self::Error>;

    /// The atomic crediting unit. In a single transaction: resolve the owning account (bound
    /// intent first, sender wallet second), insert the deposit ledger entry under the transfer's
    /// deterministic idempotency key, apply the new balance, mark the transfer (and any bound
    /// intent) `Credited`.
    ///
    /// A duplicate idempotency key means the transfer was already credited, possibly by a
    /// concurrent invocation: everything rolls back and `AlreadyCredited` is returned without
    /// error. An unresolvable account rolls back to `NoAccount`. Any other failure rolls the
    /// whole unit back and propagates; the transfer stays `Confirmed` for the next pass.
    async fn credit_transfer(&self, transfer_id: i64) -> Result<CreditResult, Self::Error>;

    /// Inserts a non-deposit ledger entry (purchase, refund, manual adjustment) and applies its
    /// balance snapshot, under the same idempotency-key discipline as crediting.
    async fn insert_ledger_entry(&self, entry: NewLedgerEntry) -> Result<CreditResult, Self::Error>;

    /// The durably persisted scan cursor, if one has been written yet.
    async fn last_scanned_block(&self) -> Result<Option<i64>, Self::Error>;

    /// Persists the scan cursor. Only called after a pass completes.
    async fn set_last_scanned_block(&self, block: i64) -> Result<(), Self::Error>;

    /// A starting block for a fresh deployment: the highest block among recorded transfers minus
    /// the lookback window, or `height - lookback` when no transfers exist yet.
    async fn bootstrap_scan_block(&self, height: i64, lookback: i64) -> Result<i64, Self::Error>;

    /// Creates a new deposit intent in `Pending` state.
    async fn create_intent(&self, intent: NewDepositIntent) -> Result<i64, Self::Error>;

    /// Flips `Pending` intents past their expiry time to `Expired`. Returns the expired ids.
    async fn expire_stale_intents(&self, now: DateTime<Utc>) -> Result<Vec<i64>, Self::Error>;

    /// Fetches the account holding the given wallet, creating the account and the wallet link if
    /// neither exists. Returns the account id.
    async fn fetch_or_create_account_for_wallet(&self, wallet: &WalletAddress) -> Result<i64, Self::Error>;

    /// Operator action: flags a transfer whose block is no longer canonical. Terminal; a reorged
    /// transfer is never credited. Credited transfers cannot be flagged.
    async fn mark_transfer_reorged(&self, tx_hash: &str, log_index: i64) -> Result<(), Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
