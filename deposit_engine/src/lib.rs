//! Deposit Reconciliation Engine
//!
//! This library watches a single ERC-20 style token contract on a single chain for transfers into
//! the treasury wallet, tracks each transfer's confirmation depth, and credits the owning user's
//! internal balance exactly once when the transfer becomes final. It reconciles two independently
//! mutating ledgers (the chain and the internal balance store) and is built so that every step is
//! safe to re-run after a crash, an overlapping scan, or a concurrent invocation.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should
//!    never need to access the database directly; use the public API of the engine instead. The
//!    exception is the data types used in the database, which live in the public `db_types` module.
//! 2. The chain reader ([`mod@chain`]), a stateless wrapper over a remote node RPC endpoint. The
//!    [`chain::ChainReader`] trait is the seam that lets tests drive the engine with a scripted
//!    chain.
//! 3. The engine public API ([`mod@dge_api`]): the scan orchestrator ([`ReconcilerApi`]) and the
//!    deposit/account query surface ([`DepositApi`]).
//!
//! The engine also emits events when transfers are detected and credited. A simple actor framework
//! lets you hook into these events and perform custom actions (see [`mod@events`]).
mod db;

pub mod chain;
pub mod config;
pub mod db_types;
pub mod events;
pub mod worker;
mod dge_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    AccountManagement,
    ConfirmationUpdate,
    CreditResult,
    DepositGatewayDatabase,
    InsertTransferResult,
    TransferQueryFilter,
};
pub use dge_api::{
    deposit_api::DepositApi,
    deposit_objects::{IntentStatusResult, ScanPassResult, StatusBreakdown, TransferSummary},
    errors::{DepositApiError, ReconcilerError},
    reconciler_api::ReconcilerApi,
};
