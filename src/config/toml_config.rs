use crate::adapters::omise::{
    DEFAULT_API_ENDPOINT, DEFAULT_CURRENCY, DEFAULT_DESCRIPTION, DEFAULT_RETURN_URI,
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_VAULT_ENDPOINT,
};
use crate::adapters::storage::DEFAULT_SHIFT_OFFSET;
use crate::config::{validate_provider, DEFAULT_CONCURRENCY};
use crate::core::ConfigProvider;
use crate::utils::error::{DonateError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: String,
    pub shift_offset: Option<u8>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub public_key: String,
    pub secret_key: String,
    pub vault_endpoint: Option<String>,
    pub api_endpoint: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub return_uri: Option<String>,
    pub timeout_seconds: Option<u64>,
}

// 不把私密金鑰印進 log
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .field("vault_endpoint", &self.vault_endpoint)
            .field("api_endpoint", &self.api_endpoint)
            .field("currency", &self.currency)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DonateError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DonateError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OMISE_SECRET_KEY})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DonateError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 命令列有指定的值優先於檔案
    #[cfg(feature = "cli")]
    pub fn apply_overrides(&mut self, cli: &crate::config::CliConfig) {
        if let Some(input) = &cli.input {
            self.input.path = input.clone();
        }
        if let Some(offset) = cli.shift_offset {
            self.input.shift_offset = Some(offset);
        }
        if let Some(concurrency) = cli.concurrency {
            self.engine.concurrency = Some(concurrency);
        }
        if let Some(key) = &cli.public_key {
            self.gateway.public_key = key.clone();
        }
        if let Some(key) = &cli.secret_key {
            self.gateway.secret_key = key.clone();
        }
        if let Some(endpoint) = &cli.vault_endpoint {
            self.gateway.vault_endpoint = Some(endpoint.clone());
        }
        if let Some(endpoint) = &cli.api_endpoint {
            self.gateway.api_endpoint = Some(endpoint.clone());
        }
        if let Some(currency) = &cli.currency {
            self.gateway.currency = Some(currency.clone());
        }
        if let Some(timeout) = cli.timeout_seconds {
            self.gateway.timeout_seconds = Some(timeout);
        }
        if cli.monitor {
            self.monitoring.enabled = true;
        }
    }

    fn unresolved_variable(field: &str, value: &str) -> Result<()> {
        if value.starts_with("${") && value.ends_with('}') {
            return Err(DonateError::MissingConfigError {
                field: format!("{} (environment variable {} is not set)", field, value),
            });
        }
        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.input.path
    }

    fn shift_offset(&self) -> u8 {
        self.input.shift_offset.unwrap_or(DEFAULT_SHIFT_OFFSET)
    }

    fn concurrency(&self) -> usize {
        self.engine.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    fn public_key(&self) -> &str {
        &self.gateway.public_key
    }

    fn secret_key(&self) -> &str {
        &self.gateway.secret_key
    }

    fn vault_endpoint(&self) -> &str {
        self.gateway.vault_endpoint.as_deref().unwrap_or(DEFAULT_VAULT_ENDPOINT)
    }

    fn api_endpoint(&self) -> &str {
        self.gateway.api_endpoint.as_deref().unwrap_or(DEFAULT_API_ENDPOINT)
    }

    fn currency(&self) -> &str {
        self.gateway.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
    }

    fn description(&self) -> &str {
        self.gateway.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
    }

    fn return_uri(&self) -> &str {
        self.gateway.return_uri.as_deref().unwrap_or(DEFAULT_RETURN_URI)
    }

    fn timeout_seconds(&self) -> u64 {
        self.gateway.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        Self::unresolved_variable("gateway.public_key", &self.gateway.public_key)?;
        Self::unresolved_variable("gateway.secret_key", &self.gateway.secret_key)?;
        validate_provider(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[input]
path = "data/fng.1000.csv.rot128"

[gateway]
public_key = "pkey_test_123"
secret_key = "skey_test_456"
api_endpoint = "http://127.0.0.1:8080"
timeout_seconds = 10

[engine]
concurrency = 4
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = TomlConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.input_path(), "data/fng.1000.csv.rot128");
        assert_eq!(config.shift_offset(), 128);
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.vault_endpoint(), "https://vault.omise.co");
        assert_eq!(config.api_endpoint(), "http://127.0.0.1:8080");
        assert_eq!(config.currency(), "THB");
        assert_eq!(config.timeout_seconds(), 10);
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TAMBOON_TEST_SECRET_KEY", "skey_from_env");
        let content = SAMPLE.replace("skey_test_456", "${TAMBOON_TEST_SECRET_KEY}");

        let config = TomlConfig::from_toml_str(&content).unwrap();

        assert_eq!(config.secret_key(), "skey_from_env");
        std::env::remove_var("TAMBOON_TEST_SECRET_KEY");
    }

    #[test]
    fn test_unset_env_var_is_reported_as_missing() {
        let content = SAMPLE.replace("pkey_test_123", "${TAMBOON_TEST_UNSET_PUBLIC_KEY}");
        let config = TomlConfig::from_toml_str(&content).unwrap();

        assert!(matches!(
            config.validate(),
            Err(DonateError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = TomlConfig::from_toml_str("[input\npath = 1");
        assert!(matches!(
            result,
            Err(DonateError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_timeout_and_endpoint() {
        let mut config = TomlConfig::from_toml_str(SAMPLE).unwrap();
        config.gateway.timeout_seconds = Some(0);
        assert!(config.validate().is_err());

        config.gateway.timeout_seconds = Some(30);
        config.gateway.vault_endpoint = Some("ftp://vault.omise.co".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_key_not_in_debug_output() {
        let config = TomlConfig::from_toml_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config);

        assert!(debug.contains("pkey_test_123"));
        assert!(!debug.contains("skey_test_456"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = TomlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.concurrency(), 4);

        assert!(matches!(
            TomlConfig::from_file("/nonexistent/tamboon.toml"),
            Err(DonateError::IoError(_))
        ));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_overrides_file_values() {
        use crate::config::CliConfig;

        let mut config = TomlConfig::from_toml_str(SAMPLE).unwrap();
        let cli = CliConfig {
            input: Some("other.rot128".to_string()),
            concurrency: Some(16),
            monitor: true,
            ..CliConfig::default()
        };

        config.apply_overrides(&cli);

        assert_eq!(config.input_path(), "other.rot128");
        assert_eq!(config.concurrency(), 16);
        assert_eq!(config.timeout_seconds(), 10);
        assert_eq!(config.secret_key(), "skey_test_456");
        assert!(config.monitoring_enabled());
    }
}
