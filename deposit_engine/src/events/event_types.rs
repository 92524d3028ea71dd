use dpg_common::TokenAmount;
use serde::{Deserialize, Serialize};

use crate::db_types::ObservedTransfer;

/// Fired when a scan pass records a transfer it has not seen before. The transfer may or may not
/// be bound to an intent at this point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDetectedEvent {
    pub transfer: ObservedTransfer,
    pub intent_id: Option<i64>,
}

impl TransferDetectedEvent {
    pub fn new(transfer: ObservedTransfer, intent_id: Option<i64>) -> Self {
        Self { transfer, intent_id }
    }
}

/// Fired exactly once per transfer, when the crediting engine applies its balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCreditedEvent {
    pub transfer: ObservedTransfer,
    pub account_id: i64,
    pub new_balance: TokenAmount,
}

impl TransferCreditedEvent {
    pub fn new(transfer: ObservedTransfer, account_id: i64, new_balance: TokenAmount) -> Self {
        Self { transfer, account_id, new_balance }
    }
}
