use std::sync::{Arc, Mutex};

use dpg_common::WalletAddress;

use crate::chain::{ChainReader, ChainReaderError, RawTransfer};

/// A scripted chain for tests. Push transfers and set the height by hand; cloning shares the
/// underlying script so a test can mutate the chain while the reconciler holds a copy.
#[derive(Clone, Default)]
pub struct MockChainReader {
    inner: Arc<Mutex<MockChain>>,
}

#[derive(Default)]
struct MockChain {
    height: i64,
    transfers: Vec<RawTransfer>,
    failing: bool,
}

impl MockChainReader {
    pub fn new(height: i64) -> Self {
        let reader = Self::default();
        reader.set_height(height);
        reader
    }

    pub fn set_height(&self, height: i64) {
        self.inner.lock().unwrap().height = height;
    }

    pub fn add_transfer(&self, transfer: RawTransfer) {
        self.inner.lock().unwrap().transfers.push(transfer);
    }

    /// When set, every call fails with a transport-style error until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    fn check_failing(&self) -> Result<(), ChainReaderError> {
        if self.inner.lock().unwrap().failing {
            return Err(ChainReaderError::Rpc { code: -32000, message: "node unavailable (scripted failure)".into() });
        }
        Ok(())
    }
}

impl ChainReader for MockChainReader {
    async fn current_height(&self) -> Result<i64, ChainReaderError> {
        self.check_failing()?;
        Ok(self.inner.lock().unwrap().height)
    }

    async fn transfers_to(
        &self,
        recipient: &WalletAddress,
        from_block: i64,
        to_block: i64,
    ) -> Result<Vec<RawTransfer>, ChainReaderError> {
        self.check_failing()?;
        let transfers = self
            .inner
            .lock()
            .unwrap()
            .transfers
            .iter()
            .filter(|t| &t.to == recipient && t.block_number >= from_block && t.block_number <= to_block)
            .cloned()
            .collect();
        Ok(transfers)
    }
}
