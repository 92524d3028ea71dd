use dpg_common::{Secret, TokenAmount, WalletAddress};
use log::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ChainReader, ChainReaderError, RawTransfer};

/// `keccak256("Transfer(address,address,uint256)")`, the first topic of every ERC-20 transfer log.
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// A [`ChainReader`] backed by an Ethereum-style JSON-RPC node.
///
/// The reader is stateless. It issues `eth_blockNumber` and `eth_getLogs` calls, filtering logs on
/// the configured token contract and the transfer topic, and decodes amounts into exact base
/// units. An amount that does not fit the internal representation is never truncated: the log is
/// skipped with a warning naming the offending transfer, so one pathological log cannot wedge the
/// scan of an entire block range.
#[derive(Clone)]
pub struct EthereumReader {
    client: reqwest::Client,
    url: Secret<String>,
    token_address: WalletAddress,
}

impl std::fmt::Debug for EthereumReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthereumReader (token {})", self.token_address)
    }
}

impl EthereumReader {
    pub fn new(url: Secret<String>, token_address: WalletAddress) -> Self {
        Self { client: reqwest::Client::new(), url, token_address }
    }

    /// The chain id the node reports, for a startup sanity check against the configured value.
    pub async fn chain_id(&self) -> Result<i64, ChainReaderError> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        let hex = result.as_str().ok_or_else(|| ChainReaderError::Decode("eth_chainId result is not a string".into()))?;
        parse_hex_i64(hex)
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainReaderError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: RpcResponse = self
            .client
            .post(self.url.reveal())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(err) = response.error {
            return Err(ChainReaderError::Rpc { code: err.code, message: err.message });
        }
        response.result.ok_or_else(|| ChainReaderError::Decode(format!("{method} response carried no result")))
    }
}

impl ChainReader for EthereumReader {
    async fn current_height(&self) -> Result<i64, ChainReaderError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        let hex =
            result.as_str().ok_or_else(|| ChainReaderError::Decode("eth_blockNumber result is not a string".into()))?;
        parse_hex_i64(hex)
    }

    async fn transfers_to(
        &self,
        recipient: &WalletAddress,
        from_block: i64,
        to_block: i64,
    ) -> Result<Vec<RawTransfer>, ChainReaderError> {
        let filter = json!([{
            "address": self.token_address.as_str(),
            "topics": [TRANSFER_TOPIC, Value::Null, address_topic(recipient)],
            "fromBlock": to_hex_block(from_block),
            "toBlock": to_hex_block(to_block),
        }]);
        let result = self.rpc_call("eth_getLogs", filter).await?;
        let logs = result.as_array().ok_or_else(|| ChainReaderError::Decode("eth_getLogs result is not an array".into()))?;
        let mut transfers = Vec::with_capacity(logs.len());
        for log in logs {
            match decode_transfer_log(log) {
                Ok(Some(transfer)) => transfers.push(transfer),
                Ok(None) => trace!("⛓️ Skipping removed log entry in block range {from_block}-{to_block}"),
                Err(e) => return Err(e),
            }
        }
        debug!("⛓️ {} transfer logs decoded for blocks {from_block}-{to_block}", transfers.len());
        Ok(transfers)
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Decodes a single `eth_getLogs` entry. Returns `Ok(None)` for logs that must not be recorded:
/// logs the node marks as removed (their block has been reorged away), and logs whose amount
/// exceeds the representable range.
fn decode_transfer_log(log: &Value) -> Result<Option<RawTransfer>, ChainReaderError> {
    if log.get("removed").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(None);
    }
    let field = |name: &str| {
        log.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ChainReaderError::Decode(format!("log entry is missing field '{name}'")))
    };
    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainReaderError::Decode("log entry is missing topics".into()))?;
    if topics.len() != 3 {
        return Err(ChainReaderError::Decode(format!("expected 3 topics on a transfer log, got {}", topics.len())));
    }
    let topic = |i: usize| {
        topics[i].as_str().ok_or_else(|| ChainReaderError::Decode(format!("topic {i} is not a string")))
    };
    let from = topic_to_address(topic(1)?)?;
    let to = topic_to_address(topic(2)?)?;
    let tx_hash = field("transactionHash")?.to_lowercase();
    let log_index = parse_hex_i64(field("logIndex")?)?;
    let Some(amount) = parse_hex_amount(field("data")?)? else {
        warn!(
            "⛓️ Transfer {tx_hash}:{log_index} carries an amount beyond the representable range. It is being \
             skipped and will never be credited automatically."
        );
        return Ok(None);
    };
    let transfer = RawTransfer {
        tx_hash,
        log_index,
        from,
        to,
        amount,
        block_number: parse_hex_i64(field("blockNumber")?)?,
    };
    Ok(Some(transfer))
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn parse_hex_i64(s: &str) -> Result<i64, ChainReaderError> {
    i64::from_str_radix(strip_0x(s), 16).map_err(|e| ChainReaderError::Decode(format!("{s} is not a hex quantity: {e}")))
}

/// Parses a 256-bit hex word into an exact token amount. `Ok(None)` means the value is a valid
/// hex word too large to represent; it is never truncated. Malformed input is still an error.
fn parse_hex_amount(s: &str) -> Result<Option<TokenAmount>, ChainReaderError> {
    let digits = strip_0x(s).trim_start_matches('0');
    if digits.is_empty() {
        return Ok(Some(TokenAmount::from(0)));
    }
    if digits.len() > 32 {
        return Ok(None);
    }
    let value = u128::from_str_radix(digits, 16)
        .map_err(|e| ChainReaderError::Decode(format!("{s} is not a hex amount: {e}")))?;
    Ok(TokenAmount::try_from(value).ok())
}

/// Extracts the address from a 32-byte log topic (the address occupies the low 20 bytes).
fn topic_to_address(topic: &str) -> Result<WalletAddress, ChainReaderError> {
    let digits = strip_0x(topic);
    if digits.len() != 64 {
        return Err(ChainReaderError::Decode(format!("{topic} is not a 32-byte topic")));
    }
    digits[24..].parse().map_err(|e: dpg_common::AddressParseError| ChainReaderError::Decode(e.to_string()))
}

fn to_hex_block(block: i64) -> String {
    format!("{block:#x}")
}

/// The 32-byte topic form of an address, for `eth_getLogs` filters.
fn address_topic(address: &WalletAddress) -> String {
    format!("0x{:0>64}", address.hex_digits())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_quantities_decode() {
        assert_eq!(parse_hex_i64("0x3e8").unwrap(), 1000);
        assert_eq!(parse_hex_i64("0x0").unwrap(), 0);
        assert!(parse_hex_i64("0xzz").is_err());
    }

    #[test]
    fn block_numbers_encode_as_hex() {
        assert_eq!(to_hex_block(1000), "0x3e8");
        assert_eq!(to_hex_block(0), "0x0");
    }

    #[test]
    fn amounts_decode_exactly() {
        let word = format!("0x{:0>64}", "f4240");
        assert_eq!(parse_hex_amount(&word).unwrap(), Some(TokenAmount::from(1_000_000)));
        let zero = format!("0x{:0>64}", "0");
        assert_eq!(parse_hex_amount(&zero).unwrap(), Some(TokenAmount::from(0)));
        let garbage = format!("0x{:0>64}", "zz");
        assert!(parse_hex_amount(&garbage).is_err());
    }

    #[test]
    fn oversized_amounts_are_never_truncated() {
        let word = format!("0x{:f>64}", "");
        assert_eq!(parse_hex_amount(&word).unwrap(), None);
        // Just past i64::MAX, still a 16-digit word.
        let word = format!("0x{:0>64}", "8000000000000000");
        assert_eq!(parse_hex_amount(&word).unwrap(), None);
    }

    #[test]
    fn oversized_transfer_logs_are_skipped_not_fatal() {
        let log = serde_json::json!({
            "transactionHash": "0xdead00000000000000000000000000000000000000000000000000000000beef",
            "logIndex": "0x0",
            "blockNumber": "0x3e8",
            "data": format!("0x{:f>64}", ""),
            "topics": [
                TRANSFER_TOPIC,
                format!("0x{:0>64}", "1111111111111111111111111111111111111111"),
                format!("0x{:0>64}", "2222222222222222222222222222222222222222"),
            ],
        });
        assert!(decode_transfer_log(&log).unwrap().is_none());
    }

    #[test]
    fn topics_round_trip_addresses() {
        let addr: WalletAddress = "0xAbCdEf0123456789abcdef0123456789ABCDEF01".parse().unwrap();
        let topic = address_topic(&addr);
        assert_eq!(topic.len(), 66);
        assert_eq!(topic_to_address(&topic).unwrap(), addr);
    }

    #[test]
    fn transfer_logs_decode() {
        let log = serde_json::json!({
            "transactionHash": "0xDEAD00000000000000000000000000000000000000000000000000000000beef",
            "logIndex": "0x2",
            "blockNumber": "0x3e8",
            "data": format!("0x{:0>64}", "989680"),
            "topics": [
                TRANSFER_TOPIC,
                format!("0x{:0>64}", "1111111111111111111111111111111111111111"),
                format!("0x{:0>64}", "2222222222222222222222222222222222222222"),
            ],
        });
        let transfer = decode_transfer_log(&log).unwrap().unwrap();
        assert_eq!(transfer.tx_hash, "0xdead00000000000000000000000000000000000000000000000000000000beef");
        assert_eq!(transfer.log_index, 2);
        assert_eq!(transfer.block_number, 1000);
        assert_eq!(transfer.amount, TokenAmount::from(10_000_000));
        assert_eq!(transfer.from.as_str(), "0x1111111111111111111111111111111111111111");
        assert_eq!(transfer.to.as_str(), "0x2222222222222222222222222222222222222222");
    }

    #[test]
    fn removed_logs_are_skipped() {
        let log = serde_json::json!({ "removed": true });
        assert!(decode_transfer_log(&log).unwrap().is_none());
    }
}
