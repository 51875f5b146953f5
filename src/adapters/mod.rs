// Adapters layer: concrete implementations of the domain ports (input file, payment provider).

pub mod omise;
pub mod storage;

pub use omise::{Credentials, GatewaySettings, OmiseGateway};
pub use storage::ShiftedFileSource;
