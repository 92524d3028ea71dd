use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------   WalletAddress    -----------------------------------------------------------
/// A 20-byte chain address in its canonical form: `0x` followed by 40 lowercase hex characters.
///
/// Every address entering the system (RPC logs, user registrations, configuration) is normalised
/// through this type, so address comparisons elsewhere are plain string equality.
#[derive(Clone, Debug, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct WalletAddress(String);

#[derive(Debug, Clone, Error)]
#[error("Invalid wallet address: {0}")]
pub struct AddressParseError(pub String);

impl FromStr for WalletAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if hex.len() != 40 {
            return Err(AddressParseError(format!("{s} is not 20 bytes long")));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError(format!("{s} contains non-hex characters")));
        }
        Ok(Self(format!("0x{}", hex.to_lowercase())))
    }
}

impl Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address without its `0x` prefix.
    pub fn hex_digits(&self) -> &str {
        &self.0[2..]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn addresses_are_normalised_to_lowercase() {
        let mixed = "0xAbCdEf0123456789abcdef0123456789ABCDEF01".parse::<WalletAddress>().unwrap();
        assert_eq!(mixed.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
        let bare = "ABCDEF0123456789abcdef0123456789abcdef01".parse::<WalletAddress>().unwrap();
        assert_eq!(bare, mixed);
    }

    #[test]
    fn rejects_bad_lengths_and_characters() {
        assert!("0x1234".parse::<WalletAddress>().is_err());
        assert!("0xZZcdef0123456789abcdef0123456789abcdef01".parse::<WalletAddress>().is_err());
        assert!("".parse::<WalletAddress>().is_err());
    }
}
