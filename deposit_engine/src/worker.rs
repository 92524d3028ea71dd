//! The long-running scan worker: a timer loop around [`ReconcilerApi::run_pass`].
use log::*;
use tokio::task::JoinHandle;

use crate::{
    chain::EthereumReader,
    config::ScannerConfig,
    db::sqlite::SqliteDatabase,
    dge_api::ReconcilerApi,
    events::EventProducers,
};

/// Starts the scan worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The worker validates the configuration and, when a chain id is configured, checks it against
/// the node before the first pass; on either failure it logs and exits rather than scanning the
/// wrong chain. Individual pass failures (an unreachable node, a locked database) are logged and
/// retried on the next tick.
pub fn start_scan_worker(
    db: SqliteDatabase,
    reader: EthereumReader,
    config: ScannerConfig,
    producers: EventProducers,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = config.validate() {
            error!("⛏️ The scan worker is not starting: {e}");
            return;
        }
        if let Some(expected) = config.chain_id {
            match reader.chain_id().await {
                Ok(actual) if actual == expected => {
                    debug!("⛏️ Node chain id {actual} matches the configuration");
                },
                Ok(actual) => {
                    error!(
                        "⛏️ The node reports chain id {actual}, but {expected} is configured. The scan worker is not \
                         starting."
                    );
                    return;
                },
                Err(e) => {
                    warn!("⛏️ Could not verify the node's chain id: {e}. Scanning anyway.");
                },
            }
        }
        let interval = std::time::Duration::from_secs(config.poll_interval_secs);
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let api = ReconcilerApi::new(db, reader, config).with_producers(producers);
        info!("⛏️ Scan worker started. Passes run every {}s.", interval.as_secs());
        loop {
            timer.tick().await;
            match api.run_pass().await {
                Ok(result) => {
                    debug!("⛏️ Scan pass done: {result}");
                },
                Err(e) => {
                    error!("⛏️ Scan pass failed: {e}. It will be retried on the next tick.");
                },
            }
            if let Err(e) = api.expire_stale_intents().await {
                error!("⛏️ Intent expiry job failed: {e}");
            }
        }
    })
}
