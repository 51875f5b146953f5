#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::TomlConfig;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_key, validate_path, validate_positive_number, validate_range, validate_url,
};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

/// CLI 與 TOML 設定共用的檢查
pub fn validate_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_path("input", config.input_path())?;
    validate_positive_number("concurrency", config.concurrency(), 1)?;
    validate_range("timeout_seconds", config.timeout_seconds(), 1, MAX_TIMEOUT_SECONDS)?;
    validate_url("vault_endpoint", config.vault_endpoint())?;
    validate_url("api_endpoint", config.api_endpoint())?;

    // tokenize 只能用公開金鑰，charge/confirm 只能用私密金鑰
    validate_key("public_key", config.public_key(), "pkey_")?;
    validate_key("secret_key", config.secret_key(), "skey_")?;
    Ok(())
}
