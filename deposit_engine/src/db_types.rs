use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use dpg_common::{TokenAmount, WalletAddress};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::chain::RawTransfer;

/// Builds the ledger idempotency key for a deposit from the transfer's natural key. The key is
/// deterministic, so any number of crediting attempts for the same on-chain event collide on the
/// ledger's uniqueness constraint.
pub fn deposit_ledger_key(tx_hash: &str, log_index: i64) -> String {
    format!("deposit:{tx_hash}:{log_index}")
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   TransferStatus   -----------------------------------------------------------
/// Lifecycle of an observed on-chain transfer.
///
/// The only legal forward path is `Pending → Confirming → Confirmed → Credited`. `Reorged` is a
/// terminal flag applied by an operator when chain history changed underneath a transfer; such a
/// transfer is never credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Observed with fewer than six confirmations.
    Pending,
    /// Partially confirmed, below the configured threshold.
    Confirming,
    /// The confirmation threshold is met; eligible for crediting.
    Confirmed,
    /// Terminal. The balance has been applied.
    Credited,
    /// Terminal. The transfer's block is no longer on the canonical chain.
    Reorged,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Credited | TransferStatus::Reorged)
    }
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "Pending"),
            TransferStatus::Confirming => write!(f, "Confirming"),
            TransferStatus::Confirmed => write!(f, "Confirmed"),
            TransferStatus::Credited => write!(f, "Credited"),
            TransferStatus::Reorged => write!(f, "Reorged"),
        }
    }
}

impl FromStr for TransferStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirming" => Ok(Self::Confirming),
            "Confirmed" => Ok(Self::Confirmed),
            "Credited" => Ok(Self::Credited),
            "Reorged" => Ok(Self::Reorged),
            s => Err(ConversionError(format!("Invalid transfer status: {s}"))),
        }
    }
}

impl From<String> for TransferStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transfer status: {value}. Defaulting to Pending");
            TransferStatus::Pending
        })
    }
}

//--------------------------------------    IntentStatus    -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum IntentStatus {
    /// Declared by the user; waiting for a matching transfer to appear on-chain.
    Pending,
    /// A transfer from the expected sender has been observed and bound to this intent.
    Detected,
    /// The bound transfer has been credited.
    Credited,
    /// The intent passed its expiry time before any transfer was detected.
    Expired,
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentStatus::Pending => write!(f, "Pending"),
            IntentStatus::Detected => write!(f, "Detected"),
            IntentStatus::Credited => write!(f, "Credited"),
            IntentStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for IntentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Detected" => Ok(Self::Detected),
            "Credited" => Ok(Self::Credited),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid intent status: {s}"))),
        }
    }
}

impl From<String> for IntentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid intent status: {value}. Defaulting to Pending");
            IntentStatus::Pending
        })
    }
}

//--------------------------------------     EntryType      -----------------------------------------------------------
/// The kind of balance change a ledger entry records. A user's balance is, at all times, the sum
/// of the signed amounts across all four entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryType {
    Deposit,
    Purchase,
    Refund,
    Adjustment,
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Deposit => write!(f, "Deposit"),
            EntryType::Purchase => write!(f, "Purchase"),
            EntryType::Refund => write!(f, "Refund"),
            EntryType::Adjustment => write!(f, "Adjustment"),
        }
    }
}

impl FromStr for EntryType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Purchase" => Ok(Self::Purchase),
            "Refund" => Ok(Self::Refund),
            "Adjustment" => Ok(Self::Adjustment),
            s => Err(ConversionError(format!("Invalid ledger entry type: {s}"))),
        }
    }
}

//--------------------------------------    UserAccount     -----------------------------------------------------------
/// An internal account. `current_balance` is the materialised cache of the account's ledger sum
/// and is only ever mutated in the same transaction as the ledger entry that justifies it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_balance: TokenAmount,
}

//--------------------------------------   DepositIntent    -----------------------------------------------------------
/// A user's declared expectation of an incoming transfer. At most one intent is ever bound to a
/// given observed transfer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DepositIntent {
    pub id: i64,
    pub user_account_id: i64,
    pub expected_amount: TokenAmount,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDepositIntent {
    pub user_account_id: i64,
    pub expected_amount: TokenAmount,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------  ObservedTransfer  -----------------------------------------------------------
/// A single transfer-log event addressed to the treasury. `(tx_hash, log_index)` is the natural
/// unique key; a transaction may emit several relevant transfer logs.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ObservedTransfer {
    pub id: i64,
    pub tx_hash: String,
    pub log_index: i64,
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    pub amount: TokenAmount,
    pub block_number: i64,
    pub confirmations: i64,
    pub status: TransferStatus,
    pub intent_id: Option<i64>,
    pub credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ObservedTransfer {
    /// The deterministic ledger key for crediting this transfer.
    pub fn ledger_key(&self) -> String {
        deposit_ledger_key(&self.tx_hash, self.log_index)
    }
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub tx_hash: String,
    pub log_index: i64,
    pub sender: WalletAddress,
    pub recipient: WalletAddress,
    pub amount: TokenAmount,
    pub block_number: i64,
}

impl From<RawTransfer> for NewTransfer {
    fn from(raw: RawTransfer) -> Self {
        Self {
            tx_hash: raw.tx_hash,
            log_index: raw.log_index,
            sender: raw.from,
            recipient: raw.to,
            amount: raw.amount,
            block_number: raw.block_number,
        }
    }
}

//--------------------------------------    LedgerEntry     -----------------------------------------------------------
/// An immutable record of a single balance change. Entries are append-only and guarded by the
/// unique `idempotency_key`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_account_id: i64,
    pub entry_type: EntryType,
    pub amount: TokenAmount,
    pub balance_after: TokenAmount,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry to be appended. The resulting balance snapshot is not part of this type: the
/// store computes it from the account's current balance inside the same transaction that applies
/// it, so a stale caller can never write an inconsistent snapshot.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_account_id: i64,
    pub entry_type: EntryType,
    pub amount: TokenAmount,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub idempotency_key: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ledger_key_format_is_stable() {
        let key = deposit_ledger_key("0xabc123", 7);
        assert_eq!(key, "deposit:0xabc123:7");
    }

    #[test]
    fn status_roundtrips() {
        for s in
            [TransferStatus::Pending, TransferStatus::Confirming, TransferStatus::Confirmed, TransferStatus::Credited, TransferStatus::Reorged]
        {
            assert_eq!(s.to_string().parse::<TransferStatus>().unwrap(), s);
        }
        for s in [IntentStatus::Pending, IntentStatus::Detected, IntentStatus::Credited, IntentStatus::Expired] {
            assert_eq!(s.to_string().parse::<IntentStatus>().unwrap(), s);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(TransferStatus::Credited.is_terminal());
        assert!(TransferStatus::Reorged.is_terminal());
        assert!(!TransferStatus::Confirmed.is_terminal());
    }
}
