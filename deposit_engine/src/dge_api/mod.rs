//! The public API surfaces of the deposit gateway.
//!
//! [`DepositApi`] carries the user- and operator-facing operations: declaring deposit intents,
//! registering wallets, querying transfers and ledgers. [`ReconcilerApi`] is the engine side: it
//! drives scan passes against the chain and the store. Both are thin orchestration layers; all
//! atomicity lives in the database backend.
pub mod deposit_api;
pub mod deposit_objects;
pub mod errors;
pub mod reconciler_api;

pub use deposit_api::DepositApi;
pub use deposit_objects::{IntentStatusResult, ScanPassResult, StatusBreakdown, TransferSummary};
pub use errors::{DepositApiError, ReconcilerError};
pub use reconciler_api::ReconcilerApi;
