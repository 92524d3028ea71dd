use std::fmt::Display;

use dpg_common::TokenAmount;
use serde::{Deserialize, Serialize};

use crate::db_types::{DepositIntent, ObservedTransfer, TransferStatus};

/// An intent together with every transfer bound to it, for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentStatusResult {
    pub intent: DepositIntent,
    pub transfers: Vec<ObservedTransfer>,
}

/// One row of the operator summary: how many transfers sit in a status, and their combined value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub status: TransferStatus,
    pub count: i64,
    pub total_amount: TokenAmount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSummary {
    pub breakdown: Vec<StatusBreakdown>,
}

impl TransferSummary {
    pub fn total_count(&self) -> i64 {
        self.breakdown.iter().map(|b| b.count).sum()
    }

    pub fn count_for(&self, status: TransferStatus) -> i64 {
        self.breakdown.iter().find(|b| b.status == status).map(|b| b.count).unwrap_or_default()
    }

    pub fn amount_for(&self, status: TransferStatus) -> TokenAmount {
        self.breakdown.iter().find(|b| b.status == status).map(|b| b.total_amount).unwrap_or_default()
    }
}

/// What a single reconciliation pass accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPassResult {
    /// Number of blocks scanned for transfer logs. Zero when the cursor was already at the tip.
    pub blocks_scanned: i64,
    /// Transfers recorded for the first time in this pass.
    pub new_transfers: usize,
    /// Transfers whose confirmation count was refreshed.
    pub confirmations_updated: usize,
    /// Transfers credited in this pass.
    pub newly_credited: usize,
}

impl Display for ScanPassResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} blocks scanned, {} new transfers, {} confirmation updates, {} credited",
            self.blocks_scanned, self.new_transfers, self.confirmations_updated, self.newly_credited
        )
    }
}
