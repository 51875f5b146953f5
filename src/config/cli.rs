use crate::adapters::omise::{
    DEFAULT_API_ENDPOINT, DEFAULT_CURRENCY, DEFAULT_DESCRIPTION, DEFAULT_RETURN_URI,
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_VAULT_ENDPOINT,
};
use crate::adapters::storage::DEFAULT_SHIFT_OFFSET;
use crate::config::{validate_provider, DEFAULT_CONCURRENCY};
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;

// 可覆蓋 TOML 設定的欄位都用 Option，未指定時才套用預設值
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "tamboon")]
#[command(about = "Charge a batch of donations through the Omise payment API")]
pub struct CliConfig {
    /// Path to the rot-encoded donation file (e.g. data/fng.1000.csv.rot128)
    pub input: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Byte offset used to encode the input file
    #[arg(long)]
    pub shift_offset: Option<u8>,

    /// Maximum number of donations processed at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Publishable key, used for tokenization only
    #[arg(long, env = "OMISE_PUBLIC_KEY", hide_env_values = true)]
    pub public_key: Option<String>,

    /// Secret key, used for charges only
    #[arg(long, env = "OMISE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long)]
    pub vault_endpoint: Option<String>,

    #[arg(long)]
    pub api_endpoint: Option<String>,

    #[arg(long)]
    pub currency: Option<String>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Enable verbose output (debug logs and one line per donation)
    #[arg(short, long)]
    pub verbose: bool,

    /// Log time and memory per phase
    #[arg(long)]
    pub monitor: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        self.input.as_deref().unwrap_or("")
    }

    fn shift_offset(&self) -> u8 {
        self.shift_offset.unwrap_or(DEFAULT_SHIFT_OFFSET)
    }

    fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    fn public_key(&self) -> &str {
        self.public_key.as_deref().unwrap_or("")
    }

    fn secret_key(&self) -> &str {
        self.secret_key.as_deref().unwrap_or("")
    }

    fn vault_endpoint(&self) -> &str {
        self.vault_endpoint.as_deref().unwrap_or(DEFAULT_VAULT_ENDPOINT)
    }

    fn api_endpoint(&self) -> &str {
        self.api_endpoint.as_deref().unwrap_or(DEFAULT_API_ENDPOINT)
    }

    fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
    }

    fn description(&self) -> &str {
        DEFAULT_DESCRIPTION
    }

    fn return_uri(&self) -> &str {
        DEFAULT_RETURN_URI
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn monitoring_enabled(&self) -> bool {
        self.monitor
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_provider(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::DonateError;

    #[test]
    fn test_defaults_apply_when_flags_missing() {
        let config = CliConfig::try_parse_from([
            "tamboon",
            "data/fng.1000.csv.rot128",
            "--public-key",
            "pkey_test_123",
            "--secret-key",
            "skey_test_456",
        ])
        .unwrap();

        assert_eq!(config.input_path(), "data/fng.1000.csv.rot128");
        assert_eq!(config.shift_offset(), 128);
        assert_eq!(config.concurrency(), DEFAULT_CONCURRENCY);
        assert_eq!(config.vault_endpoint(), "https://vault.omise.co");
        assert_eq!(config.api_endpoint(), "https://api.omise.co");
        assert_eq!(config.currency(), "THB");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = CliConfig::try_parse_from([
            "tamboon",
            "input.rot128",
            "--concurrency",
            "2",
            "--shift-offset",
            "3",
            "--api-endpoint",
            "http://127.0.0.1:9000",
            "--verbose",
            "--json",
        ])
        .unwrap();

        assert_eq!(config.concurrency(), 2);
        assert_eq!(config.shift_offset(), 3);
        assert_eq!(config.api_endpoint(), "http://127.0.0.1:9000");
        assert!(config.verbose);
        assert!(config.json);
    }

    #[test]
    fn test_validation_rejects_swapped_keys() {
        let config = CliConfig {
            input: Some("input.rot128".to_string()),
            public_key: Some("skey_test_456".to_string()),
            secret_key: Some("pkey_test_123".to_string()),
            ..CliConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(DonateError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_validation_requires_input_and_concurrency() {
        let missing_input = CliConfig {
            public_key: Some("pkey_test_123".to_string()),
            secret_key: Some("skey_test_456".to_string()),
            ..CliConfig::default()
        };
        assert!(missing_input.validate().is_err());

        let zero = CliConfig {
            input: Some("input.rot128".to_string()),
            concurrency: Some(0),
            ..missing_input
        };
        assert!(zero.validate().is_err());
    }
}
