//! End-to-end scan pass behaviour: detection, confirmation tracking, cursor handling and crash
//! recovery, all driven through [`ReconcilerApi`] against a scripted chain.
use deposit_engine::{
    chain::EthereumReader,
    db_types::TransferStatus,
    events::EventProducers,
    worker::start_scan_worker,
    AccountManagement,
    DepositApi,
    DepositGatewayDatabase,
    ReconcilerApi,
    SqliteDatabase,
};
use dpg_common::Secret;
use support::{new_test_db, raw_transfer, test_config, token_contract, wallet, MockChainReader};

mod support;

fn reconciler(db: SqliteDatabase, reader: MockChainReader) -> ReconcilerApi<SqliteDatabase, MockChainReader> {
    ReconcilerApi::new(db, reader, test_config())
}

#[tokio::test]
async fn transfer_walks_the_full_lifecycle() {
    let db = new_test_db().await;
    let deposits = DepositApi::new(db.clone());
    let account_id = deposits.register_wallet(&wallet(1)).await.unwrap();

    let reader = MockChainReader::new(105);
    reader.add_transfer(raw_transfer("0xaaa1", 0, wallet(1), 5_000, 100));
    let api = reconciler(db.clone(), reader.clone());

    // First pass: 5 confirmations, so the transfer is recorded but stays Pending.
    let result = api.run_pass().await.unwrap();
    assert_eq!(result.new_transfers, 1);
    assert_eq!(result.newly_credited, 0);
    let transfer = db.fetch_transfer("0xaaa1", 0).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
    assert_eq!(transfer.confirmations, 5);

    // Seven confirmations: Confirming, still not creditable.
    reader.set_height(107);
    api.run_pass().await.unwrap();
    let transfer = db.fetch_transfer("0xaaa1", 0).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Confirming);
    assert_eq!(transfer.confirmations, 7);

    // Threshold reached: confirmed and credited in the same pass.
    reader.set_height(112);
    let result = api.run_pass().await.unwrap();
    assert_eq!(result.newly_credited, 1);
    let transfer = db.fetch_transfer("0xaaa1", 0).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Credited);
    assert!(transfer.credited_at.is_some());

    let account = deposits.fetch_user_account(account_id).await.unwrap();
    assert_eq!(account.current_balance.value(), 5_000);
    let ledger = deposits.ledger_for_account(account_id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].idempotency_key, "deposit:0xaaa1:0");
    assert_eq!(ledger[0].balance_after.value(), 5_000);
}

#[tokio::test]
async fn rescanning_an_overlapping_range_changes_nothing() {
    let db = new_test_db().await;
    let deposits = DepositApi::new(db.clone());
    let account_id = deposits.register_wallet(&wallet(2)).await.unwrap();

    let reader = MockChainReader::new(120);
    reader.add_transfer(raw_transfer("0xbbb1", 3, wallet(2), 1_000, 100));
    let api = reconciler(db.clone(), reader.clone());

    let result = api.run_pass().await.unwrap();
    assert_eq!(result.new_transfers, 1);
    assert_eq!(result.newly_credited, 1);

    // Rewind the cursor, as a crashed pass that never wrote it would have left things, and scan
    // the same range again.
    db.set_last_scanned_block(0).await.unwrap();
    let result = api.run_pass().await.unwrap();
    assert_eq!(result.new_transfers, 0);
    assert_eq!(result.newly_credited, 0);

    let account = deposits.fetch_user_account(account_id).await.unwrap();
    assert_eq!(account.current_balance.value(), 1_000);
    assert_eq!(deposits.ledger_for_account(account_id).await.unwrap().len(), 1);
    // Still exactly one row for the pair.
    let transfers = deposits.search_transfers(Default::default()).await.unwrap();
    assert_eq!(transfers.len(), 1);
}

#[tokio::test]
async fn cursor_survives_a_restart() {
    let db = new_test_db().await;
    let url = db.url().to_string();
    let reader = MockChainReader::new(200);
    let api = reconciler(db.clone(), reader.clone());

    let result = api.run_pass().await.unwrap();
    assert!(result.blocks_scanned > 0);
    let cursor = db.last_scanned_block().await.unwrap().unwrap();
    assert_eq!(cursor, 199);

    // A new connection to the same file picks up where the old process stopped.
    let db2 = SqliteDatabase::new_with_url(&url).await.unwrap();
    assert_eq!(db2.last_scanned_block().await.unwrap(), Some(199));
    reader.set_height(210);
    let api2 = reconciler(db2.clone(), reader);
    let result = api2.run_pass().await.unwrap();
    assert_eq!(result.blocks_scanned, 10);
    assert_eq!(db2.last_scanned_block().await.unwrap(), Some(209));
}

#[tokio::test]
async fn caught_up_pass_scans_nothing_but_still_credits() {
    let db = new_test_db().await;
    let deposits = DepositApi::new(db.clone());

    let reader = MockChainReader::new(150);
    reader.add_transfer(raw_transfer("0xccc1", 0, wallet(3), 2_500, 130));
    let api = reconciler(db.clone(), reader.clone());

    // Detect and confirm, but with no owning account the credit is deferred.
    api.run_pass().await.unwrap();
    let transfer = db.fetch_transfer("0xccc1", 0).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Confirmed);

    // Chain has not moved, so the next pass has nothing to scan. Registering the wallet in the
    // meantime makes the deferred credit land anyway.
    let account_id = deposits.register_wallet(&wallet(3)).await.unwrap();
    let result = api.run_pass().await.unwrap();
    assert_eq!(result.blocks_scanned, 0);
    assert_eq!(result.newly_credited, 1);
    let account = deposits.fetch_user_account(account_id).await.unwrap();
    assert_eq!(account.current_balance.value(), 2_500);
}

#[tokio::test]
async fn failed_pass_leaves_the_cursor_untouched() {
    let db = new_test_db().await;
    let reader = MockChainReader::new(100);
    let api = reconciler(db.clone(), reader.clone());

    api.run_pass().await.unwrap();
    let cursor = db.last_scanned_block().await.unwrap();

    reader.set_height(150);
    reader.set_failing(true);
    assert!(api.run_pass().await.is_err());
    assert_eq!(db.last_scanned_block().await.unwrap(), cursor);

    // Node comes back; the same range is scanned as if the failed pass never happened.
    reader.set_failing(false);
    let result = api.run_pass().await.unwrap();
    assert_eq!(result.blocks_scanned, 50);
    assert_eq!(db.last_scanned_block().await.unwrap(), Some(149));
}

#[tokio::test]
async fn scan_range_is_capped_by_the_chunk_size() {
    let db = new_test_db().await;
    let reader = MockChainReader::new(10_000);
    let mut config = test_config();
    config.bootstrap_lookback = 2_000;
    config.scan_chunk_size = 500;
    let api = ReconcilerApi::new(db.clone(), reader, config);

    let result = api.run_pass().await.unwrap();
    assert_eq!(result.blocks_scanned, 500);
    assert_eq!(db.last_scanned_block().await.unwrap(), Some(8_499));

    // Subsequent passes keep chewing through the backlog.
    let result = api.run_pass().await.unwrap();
    assert_eq!(result.blocks_scanned, 500);
    assert_eq!(db.last_scanned_block().await.unwrap(), Some(8_999));
}

#[tokio::test]
async fn misconfigured_reconciler_refuses_to_run() {
    let db = new_test_db().await;
    let reader = MockChainReader::new(100);
    let mut config = test_config();
    config.treasury_address = None;
    let api = ReconcilerApi::new(db, reader, config);
    assert!(api.run_pass().await.is_err());
}

#[tokio::test]
async fn worker_refuses_to_start_on_invalid_config() {
    let db = new_test_db().await;
    // The reader is never contacted: the configuration gate fires first.
    let reader = EthereumReader::new(Secret::new("http://localhost:8545".to_string()), token_contract());
    let mut config = test_config();
    config.treasury_address = None;
    let handle = start_scan_worker(db.clone(), reader, config, EventProducers::default());
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("the worker should exit immediately on an invalid configuration")
        .unwrap();
    assert!(db.last_scanned_block().await.unwrap().is_none());
}

#[tokio::test]
async fn transfers_to_other_recipients_are_ignored() {
    let db = new_test_db().await;
    let deposits = DepositApi::new(db.clone());
    deposits.register_wallet(&wallet(4)).await.unwrap();

    let reader = MockChainReader::new(200);
    let mut stray = raw_transfer("0xddd1", 0, wallet(4), 9_000, 150);
    stray.to = wallet(0x99);
    reader.add_transfer(stray);
    reader.add_transfer(raw_transfer("0xddd2", 0, wallet(4), 1_500, 150));
    let api = reconciler(db.clone(), reader);

    let result = api.run_pass().await.unwrap();
    assert_eq!(result.new_transfers, 1);
    assert!(db.fetch_transfer("0xddd1", 0).await.unwrap().is_none());
    assert!(db.fetch_transfer("0xddd2", 0).await.unwrap().is_some());
}
