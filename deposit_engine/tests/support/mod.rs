#![allow(dead_code)]
pub mod mock;
pub mod prepare_env;

use chrono::{Duration, Utc};
use deposit_engine::{chain::RawTransfer, config::ScannerConfig, db_types::NewDepositIntent, SqliteDatabase};
use dpg_common::{Secret, TokenAmount, WalletAddress};

pub use mock::MockChainReader;
pub use prepare_env::{prepare_test_env, random_db_path};

pub fn wallet(n: u8) -> WalletAddress {
    format!("0x{n:040x}").parse().unwrap()
}

pub fn treasury() -> WalletAddress {
    wallet(0xEE)
}

pub fn token_contract() -> WalletAddress {
    wallet(0xCC)
}

pub fn raw_transfer(tx_hash: &str, log_index: i64, from: WalletAddress, amount: i64, block_number: i64) -> RawTransfer {
    RawTransfer { tx_hash: tx_hash.to_string(), log_index, from, to: treasury(), amount: TokenAmount::from(amount), block_number }
}

pub fn test_config() -> ScannerConfig {
    ScannerConfig {
        rpc_url: Secret::new("http://localhost:8545".to_string()),
        token_address: Some(token_contract()),
        treasury_address: Some(treasury()),
        ..Default::default()
    }
}

pub fn intent_for(account_id: i64, amount: i64) -> NewDepositIntent {
    NewDepositIntent {
        user_account_id: account_id,
        expected_amount: TokenAmount::from(amount),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url).await.expect("Error creating database")
}
