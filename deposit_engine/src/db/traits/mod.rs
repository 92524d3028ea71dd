//! Database management and control.
//!
//! This module defines the interface contracts the reconciliation engine requires from a durable
//! store backend.
//!
//! * [`DepositGatewayDatabase`] is the write side: idempotent transfer recording, intent matching,
//!   confirmation advancement, the atomic crediting unit, and the durable scan cursor. It is the
//!   one place where the engine's exactly-once guarantee is enforced; everything else in the
//!   system may be re-run freely.
//! * [`AccountManagement`] is the read side: account, intent, transfer and ledger queries used by
//!   status displays and admin tooling.
mod account_management;
mod data_objects;
mod deposit_gateway_database;

pub use account_management::AccountManagement;
pub use data_objects::{ConfirmationUpdate, CreditResult, InsertTransferResult, TransferQueryFilter};
pub use deposit_gateway_database::DepositGatewayDatabase;
