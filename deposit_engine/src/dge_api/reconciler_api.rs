use chrono::Utc;
use log::*;

use crate::{
    chain::ChainReader,
    config::{ConfigError, ScannerConfig},
    db::traits::{AccountManagement, CreditResult, DepositGatewayDatabase, InsertTransferResult},
    db_types::NewTransfer,
    dge_api::{errors::ReconcilerError, ScanPassResult},
    events::{EventProducers, TransferCreditedEvent, TransferDetectedEvent},
};

/// Drives reconciliation passes: scan a block range for transfers to the treasury, track
/// confirmations, and credit whatever has become creditable.
///
/// The api holds no state of its own between passes. Everything durable lives in the store, so a
/// crash at any point is recovered by simply running another pass.
pub struct ReconcilerApi<B, C> {
    db: B,
    reader: C,
    config: ScannerConfig,
    producers: EventProducers,
}

impl<B, C> ReconcilerApi<B, C>
where
    B: DepositGatewayDatabase + AccountManagement,
    C: ChainReader,
{
    pub fn new(db: B, reader: C, config: ScannerConfig) -> Self {
        Self { db, reader, config, producers: EventProducers::default() }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Runs one full reconciliation pass.
    ///
    /// A pass scans at most `scan_chunk_size` blocks beyond the stored cursor, stopping one block
    /// short of the tip. When the cursor is already caught up, the scan phase is skipped but
    /// confirmation tracking and crediting still run, so deferred credits (for example a deposit
    /// whose sender wallet was registered after confirmation) are retried on every pass. The
    /// cursor only advances after the pass completes, and only when blocks were actually scanned.
    pub async fn run_pass(&self) -> Result<ScanPassResult, ReconcilerError> {
        self.config.validate()?;
        let treasury = self
            .config
            .treasury_address
            .clone()
            .ok_or_else(|| ConfigError::MissingField("DPG_TREASURY_ADDRESS".into()))?;
        let threshold = self.config.confirmation_threshold;
        let height = self.reader.current_height().await?;
        let mut result = ScanPassResult::default();

        let from_block = match self.db.last_scanned_block().await.map_err(db_err)? {
            Some(cursor) => cursor + 1,
            None => {
                let start = self.db.bootstrap_scan_block(height, self.config.bootstrap_lookback).await.map_err(db_err)?;
                info!("⛏️ No scan cursor found. Bootstrapping the scan at block {start}.");
                start
            },
        };
        let to_block = (height - 1).min(from_block + self.config.scan_chunk_size - 1);

        if from_block <= to_block {
            trace!("⛏️ Scanning blocks {from_block}..={to_block} (tip is {height})");
            let raw_transfers = self.reader.transfers_to(&treasury, from_block, to_block).await?;
            result.blocks_scanned = to_block - from_block + 1;
            for raw in raw_transfers {
                let transfer = NewTransfer::from(raw);
                let (tx_hash, log_index) = (transfer.tx_hash.clone(), transfer.log_index);
                let insert = self.db.insert_transfer(transfer).await.map_err(db_err)?;
                let InsertTransferResult::Inserted(id) = insert else { continue };
                result.new_transfers += 1;
                let intent_id = self.db.match_transfer_to_intent(id).await.map_err(db_err)?;
                self.emit_detected(&tx_hash, log_index, intent_id).await.map_err(db_err)?;
            }
        } else {
            trace!("⛏️ Cursor is caught up to the tip ({height}). Nothing to scan this pass.");
        }

        let update = self.db.update_confirmations(height, threshold).await.map_err(db_err)?;
        result.confirmations_updated = update.updated;
        if !update.newly_confirmed.is_empty() {
            debug!("⛓️ {} transfer(s) reached {threshold} confirmations this pass", update.newly_confirmed.len());
        }

        result.newly_credited = self.credit_confirmed_transfers().await?;

        if result.blocks_scanned > 0 {
            self.db.set_last_scanned_block(to_block).await.map_err(db_err)?;
        }
        debug!("⛏️ Pass complete. {result}");
        Ok(result)
    }

    /// Tries to credit every transfer in `Confirmed` state. Transfers without an owning account
    /// are left untouched for a later pass.
    async fn credit_confirmed_transfers(&self) -> Result<usize, ReconcilerError> {
        let creditable = self.db.fetch_creditable_transfers().await.map_err(db_err)?;
        let mut credited = 0;
        for transfer in creditable {
            match self.db.credit_transfer(transfer.id).await.map_err(db_err)? {
                CreditResult::Applied { account_id, new_balance } => {
                    credited += 1;
                    info!(
                        "⛓️ Credited transfer {}:{} of {} to account #{account_id}. New balance: {new_balance}",
                        transfer.tx_hash, transfer.log_index, transfer.amount
                    );
                    self.emit_credited(&transfer.tx_hash, transfer.log_index, account_id, new_balance)
                        .await
                        .map_err(db_err)?;
                },
                CreditResult::AlreadyCredited => {
                    trace!("⛓️ Transfer {}:{} was already credited.", transfer.tx_hash, transfer.log_index);
                },
                CreditResult::NoAccount => {},
            }
        }
        Ok(credited)
    }

    /// Flips stale `Pending` intents to `Expired`. Run alongside the scan loop.
    pub async fn expire_stale_intents(&self) -> Result<Vec<i64>, ReconcilerError> {
        let expired = self.db.expire_stale_intents(Utc::now()).await.map_err(db_err)?;
        if !expired.is_empty() {
            info!("⛏️ Expired {} stale deposit intent(s): {expired:?}", expired.len());
        }
        Ok(expired)
    }

    async fn emit_detected(
        &self,
        tx_hash: &str,
        log_index: i64,
        intent_id: Option<i64>,
    ) -> Result<(), <B as AccountManagement>::Error> {
        if self.producers.transfer_detected_producer.is_empty() {
            return Ok(());
        }
        if let Some(transfer) = self.db.fetch_transfer(tx_hash, log_index).await? {
            let event = TransferDetectedEvent::new(transfer, intent_id);
            for producer in &self.producers.transfer_detected_producer {
                producer.publish_event(event.clone()).await;
            }
        }
        Ok(())
    }

    async fn emit_credited(
        &self,
        tx_hash: &str,
        log_index: i64,
        account_id: i64,
        new_balance: dpg_common::TokenAmount,
    ) -> Result<(), <B as AccountManagement>::Error> {
        if self.producers.transfer_credited_producer.is_empty() {
            return Ok(());
        }
        if let Some(transfer) = self.db.fetch_transfer(tx_hash, log_index).await? {
            let event = TransferCreditedEvent::new(transfer, account_id, new_balance);
            for producer in &self.producers.transfer_credited_producer {
                producer.publish_event(event.clone()).await;
            }
        }
        Ok(())
    }
}

fn db_err<E: std::error::Error>(e: E) -> ReconcilerError {
    ReconcilerError::DatabaseError(e.to_string())
}
