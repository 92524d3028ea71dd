pub mod mock_reader;
pub mod prepare_env;

pub use mock_reader::MockChainReader;
