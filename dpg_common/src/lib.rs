mod token_amount;
mod wallet_address;

pub mod op;
mod secret;

pub use secret::Secret;
pub use token_amount::{AmountConversionError, TokenAmount, TOKEN_DECIMALS, TOKEN_SYMBOL};
pub use wallet_address::{AddressParseError, WalletAddress};
