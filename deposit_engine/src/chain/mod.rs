//! Stateless access to the remote chain node.
//!
//! The [`ChainReader`] trait is the engine's only view of the chain: the current height, and the
//! token transfer logs addressed to a recipient within a block range. The production
//! implementation ([`EthereumReader`]) speaks JSON-RPC over HTTP; tests substitute a scripted
//! reader. Every failure from the remote node is a [`ChainReaderError`] and is treated as
//! retryable by the caller; nothing here touches local state.
mod rpc;

use dpg_common::{TokenAmount, WalletAddress};
use thiserror::Error;

pub use rpc::EthereumReader;

/// A single decoded transfer-log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    pub tx_hash: String,
    pub log_index: i64,
    pub from: WalletAddress,
    pub to: WalletAddress,
    pub amount: TokenAmount,
    pub block_number: i64,
}

#[derive(Debug, Error)]
pub enum ChainReaderError {
    #[error("Could not reach the chain RPC endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("The RPC node returned an error ({code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("Could not decode the RPC response: {0}")]
    Decode(String),
}

#[allow(async_fn_in_trait)]
pub trait ChainReader {
    /// The current tip height of the canonical chain.
    async fn current_height(&self) -> Result<i64, ChainReaderError>;

    /// All token transfer logs paying `recipient` in the inclusive block range
    /// `from_block..=to_block`, in log order.
    async fn transfers_to(
        &self,
        recipient: &WalletAddress,
        from_block: i64,
        to_block: i64,
    ) -> Result<Vec<RawTransfer>, ChainReaderError>;
}
