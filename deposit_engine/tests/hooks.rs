//! Event hook wiring: detected and credited events reach subscribed handlers.
use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use deposit_engine::{events::EventHooks, DepositApi, ReconcilerApi};
use futures_util::FutureExt;
use log::*;
use support::{new_test_db, raw_transfer, test_config, wallet, MockChainReader};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn detected_and_credited_events_fire() {
    let db = new_test_db().await;
    let deposits = DepositApi::new(db.clone());
    deposits.register_wallet(&wallet(1)).await.unwrap();

    let detected = HookCalled::default();
    let credited = HookCalled::default();
    let d2 = detected.clone();
    let c2 = credited.clone();
    let mut hooks = EventHooks::default();
    hooks.on_transfer_detected(move |ev| {
        info!("🪝️ Detected {}:{}", ev.transfer.tx_hash, ev.transfer.log_index);
        d2.called();
        async {}.boxed()
    });
    hooks.on_transfer_credited(move |ev| {
        info!("🪝️ Credited {}:{} to account #{}", ev.transfer.tx_hash, ev.transfer.log_index, ev.account_id);
        c2.called();
        async {}.boxed()
    });
    let handlers = deposit_engine::events::EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    let handler_task = tokio::spawn(handlers.start_handlers());

    let reader = MockChainReader::new(200);
    reader.add_transfer(raw_transfer("0xaaa1", 0, wallet(1), 5_000, 100));
    reader.add_transfer(raw_transfer("0xaaa1", 1, wallet(1), 2_000, 100));
    let api = ReconcilerApi::new(db, reader, test_config()).with_producers(producers);
    api.run_pass().await.unwrap();

    // Drop the api (and with it the producers) so the handlers drain and shut down.
    drop(api);
    handler_task.await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(detected.count(), 2);
    assert_eq!(credited.count(), 2);
}
