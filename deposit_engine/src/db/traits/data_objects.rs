use dpg_common::TokenAmount;

use crate::db_types::TransferStatus;

/// Outcome of recording an observed transfer. Re-observation of a known `(tx_hash, log_index)`
/// pair is a no-op, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertTransferResult {
    Inserted(i64),
    AlreadyExists(i64),
}

/// Outcome of one crediting attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditResult {
    /// The ledger entry was written and the balance applied, exactly once.
    Applied { account_id: i64, new_balance: TokenAmount },
    /// The ledger already holds an entry for this transfer's idempotency key. Nothing was changed.
    AlreadyCredited,
    /// No account owns the sender address yet. The transfer stays `Confirmed` and will be retried
    /// on every pass until a matching account exists.
    NoAccount,
}

impl CreditResult {
    pub fn applied(&self) -> bool {
        matches!(self, CreditResult::Applied { .. })
    }
}

/// Result of one confirmation-tracking sweep.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationUpdate {
    /// Number of transfers whose confirmation count was refreshed.
    pub updated: usize,
    /// Transfers that crossed the threshold in this sweep.
    pub newly_confirmed: Vec<i64>,
}

/// Filter for the admin transfer listing. An empty filter returns everything, newest first.
#[derive(Debug, Clone, Default)]
pub struct TransferQueryFilter {
    pub statuses: Vec<TransferStatus>,
    pub sender: Option<dpg_common::WalletAddress>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TransferQueryFilter {
    pub fn with_status(mut self, status: TransferStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_sender(mut self, sender: dpg_common::WalletAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn paged(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() && self.sender.is_none()
    }
}
