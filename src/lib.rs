pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{Credentials, GatewaySettings, OmiseGateway, ShiftedFileSource};
pub use crate::core::engine::{AbortSignal, BatchEngine};
pub use crate::core::report::RunReport;
pub use crate::core::runner::DonationRunner;
pub use utils::error::{DonateError, Result};
