use crate::domain::model::DonationRecord;
use crate::domain::ports::{ConfigProvider, PaymentGateway};
use crate::utils::error::{DonateError, GatewayError, Result, Stage};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_VAULT_ENDPOINT: &str = "https://vault.omise.co";
pub const DEFAULT_API_ENDPOINT: &str = "https://api.omise.co";
pub const DEFAULT_CURRENCY: &str = "THB";
pub const DEFAULT_DESCRIPTION: &str = "Donation charge";
pub const DEFAULT_RETURN_URI: &str = "http://www.example.com/complete";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

// 錯誤訊息中保留的回應內容上限
const MAX_ERROR_BODY: usize = 256;

/// 公開金鑰只用於 tokenize；私密金鑰只用於 charge 與 confirm
#[derive(Clone)]
pub struct Credentials {
    public_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub vault_endpoint: String,
    pub api_endpoint: String,
    pub currency: String,
    pub description: String,
    pub return_uri: String,
    pub timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            vault_endpoint: DEFAULT_VAULT_ENDPOINT.to_string(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            return_uri: DEFAULT_RETURN_URI.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl GatewaySettings {
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            vault_endpoint: config.vault_endpoint().to_string(),
            api_endpoint: config.api_endpoint().to_string(),
            currency: config.currency().to_string(),
            description: config.description().to_string(),
            return_uri: config.return_uri().to_string(),
            timeout: Duration::from_secs(config.timeout_seconds()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    description: &'a str,
    amount: i64,
    currency: &'a str,
    return_uri: &'a str,
    card: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChargeStatus {
    id: String,
    paid: bool,
}

pub struct OmiseGateway {
    client: Client,
    credentials: Credentials,
    settings: GatewaySettings,
    vault_base: Url,
    api_base: Url,
}

impl OmiseGateway {
    pub fn new(credentials: Credentials, settings: GatewaySettings) -> Result<Self> {
        let vault_base = parse_base("vault_endpoint", &settings.vault_endpoint)?;
        let api_base = parse_base("api_endpoint", &settings.api_endpoint)?;
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            credentials,
            settings,
            vault_base,
            api_base,
        })
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let credentials = Credentials::new(config.public_key(), config.secret_key());
        Self::new(credentials, GatewaySettings::from_config(config))
    }

    /// 每個 segment 都會被跳脫，ID 裡的 `/`、`?`、`#` 不會改變路徑
    fn endpoint(base: &Url, segments: &[&str]) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn parse_base(field: &str, endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| DonateError::InvalidConfigValueError {
        field: field.to_string(),
        value: endpoint.to_string(),
        reason,
    };
    let url = Url::parse(endpoint).map_err(|e| invalid(format!("Invalid URL format: {}", e)))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be used as a base".to_string()));
    }
    Ok(url)
}

/// 非 2xx 一律失敗；回應內容必須能解成預期的結構
async fn decode_response<T: DeserializeOwned>(
    stage: Stage,
    response: reqwest::Response,
) -> std::result::Result<T, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::new(stage, e))?;

    if !status.is_success() {
        let mut snippet = body;
        if snippet.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !snippet.is_char_boundary(cut) {
                cut -= 1;
            }
            snippet.truncate(cut);
        }
        return Err(GatewayError::status(stage, status.as_u16(), snippet));
    }

    serde_json::from_str(&body).map_err(|e| GatewayError::decode(stage, e.to_string()))
}

fn require_id(stage: Stage, id: String) -> std::result::Result<String, GatewayError> {
    if id.trim().is_empty() {
        return Err(GatewayError::decode(stage, "response carries an empty id"));
    }
    Ok(id)
}

#[async_trait]
impl PaymentGateway for OmiseGateway {
    async fn tokenize(&self, record: &DonationRecord) -> std::result::Result<String, GatewayError> {
        let stage = Stage::Tokenize;
        let expiration_month = record.expiration_month.to_string();
        let expiration_year = record.expiration_year.to_string();
        let form = [
            ("card[name]", record.card_holder_name.as_str()),
            ("card[number]", record.card_number.as_str()),
            ("card[expiration_month]", expiration_month.as_str()),
            ("card[expiration_year]", expiration_year.as_str()),
            ("card[security_code]", record.cvv.as_str()),
        ];

        let response = self
            .client
            .post(Self::endpoint(&self.vault_base, &["tokens"]))
            .basic_auth(&self.credentials.public_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::new(stage, e))?;

        let token: TokenResponse = decode_response(stage, response).await?;
        require_id(stage, token.id)
    }

    async fn charge(&self, token_id: &str, amount: i64) -> std::result::Result<String, GatewayError> {
        let stage = Stage::Charge;
        let request = ChargeRequest {
            description: &self.settings.description,
            amount,
            currency: &self.settings.currency,
            return_uri: &self.settings.return_uri,
            card: token_id,
        };

        let response = self
            .client
            .post(Self::endpoint(&self.api_base, &["charges"]))
            .basic_auth(&self.credentials.secret_key, None::<&str>)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::new(stage, e))?;

        let charge: ChargeResponse = decode_response(stage, response).await?;
        require_id(stage, charge.id)
    }

    async fn confirm_paid(&self, charge_id: &str) -> std::result::Result<bool, GatewayError> {
        let stage = Stage::Confirm;
        let response = self
            .client
            .get(Self::endpoint(&self.api_base, &["charges", charge_id]))
            .basic_auth(&self.credentials.secret_key, None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::new(stage, e))?;

        let status: ChargeStatus = decode_response(stage, response).await?;
        if status.id != charge_id {
            return Err(GatewayError::decode(
                stage,
                format!("expected charge {}, got {}", charge_id, status.id),
            ));
        }
        Ok(status.paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::GatewayErrorKind;
    use httpmock::prelude::*;
    use serde_json::json;

    // base64("pkey_test_123:") / base64("skey_test_456:")
    const PUBLIC_AUTH: &str = "Basic cGtleV90ZXN0XzEyMzo=";
    const SECRET_AUTH: &str = "Basic c2tleV90ZXN0XzQ1Njo=";

    fn gateway(server: &MockServer) -> OmiseGateway {
        let settings = GatewaySettings {
            vault_endpoint: server.base_url(),
            api_endpoint: server.base_url(),
            timeout: Duration::from_secs(5),
            ..GatewaySettings::default()
        };
        OmiseGateway::new(Credentials::new("pkey_test_123", "skey_test_456"), settings).unwrap()
    }

    fn record() -> DonationRecord {
        DonationRecord {
            amount: 2879410,
            card_holder_name: "Mr. Grossman R Oldbuck".to_string(),
            card_number: "5375543637862918".to_string(),
            cvv: "488".to_string(),
            expiration_month: 11,
            expiration_year: 2028,
        }
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let debug = format!("{:?}", Credentials::new("pkey_test_123", "skey_test_456"));
        assert!(debug.contains("pkey_test_123"));
        assert!(!debug.contains("skey_test_456"));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let base = Url::parse("https://api.omise.co/").unwrap();
        assert_eq!(
            OmiseGateway::endpoint(&base, &["charges"]).as_str(),
            "https://api.omise.co/charges"
        );

        let prefixed = Url::parse("http://127.0.0.1:8080/v1").unwrap();
        assert_eq!(
            OmiseGateway::endpoint(&prefixed, &["charges", "chrg_1"]).as_str(),
            "http://127.0.0.1:8080/v1/charges/chrg_1"
        );
    }

    #[test]
    fn test_charge_id_is_escaped_as_one_path_segment() {
        let base = Url::parse("https://api.omise.co").unwrap();
        let url = OmiseGateway::endpoint(&base, &["charges", "chrg_1/refunds?x=1#y"]);

        assert_eq!(url.path_segments().unwrap().count(), 2);
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.as_str(), "https://api.omise.co/charges/chrg_1%2Frefunds%3Fx=1%23y");
    }

    #[test]
    fn test_new_rejects_unusable_endpoint() {
        let settings = GatewaySettings {
            api_endpoint: "mailto:billing@example.com".to_string(),
            ..GatewaySettings::default()
        };
        let result = OmiseGateway::new(Credentials::new("pkey_test_123", "skey_test_456"), settings);

        assert!(matches!(
            result,
            Err(DonateError::InvalidConfigValueError { .. })
        ));
    }

    #[tokio::test]
    async fn test_tokenize_posts_card_form_with_public_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/tokens")
                    .header("Authorization", PUBLIC_AUTH)
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .x_www_form_urlencoded_tuple("card[name]", "Mr. Grossman R Oldbuck")
                    .x_www_form_urlencoded_tuple("card[number]", "5375543637862918")
                    .x_www_form_urlencoded_tuple("card[expiration_month]", "11")
                    .x_www_form_urlencoded_tuple("card[expiration_year]", "2028")
                    .x_www_form_urlencoded_tuple("card[security_code]", "488");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(json!({"object": "token", "id": "tokn_test_5abc"}));
            })
            .await;

        let token = gateway(&server).tokenize(&record()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "tokn_test_5abc");
    }

    #[tokio::test]
    async fn test_tokenize_fails_on_non_success_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/tokens");
                then.status(400)
                    .json_body(json!({"object": "error", "code": "invalid_card"}));
            })
            .await;

        let err = gateway(&server).tokenize(&record()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Tokenize);
        match err.kind {
            GatewayErrorKind::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_card"));
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tokenize_fails_on_unexpected_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/tokens");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let err = gateway(&server).tokenize(&record()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Tokenize);
        assert!(matches!(err.kind, GatewayErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn test_tokenize_rejects_empty_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/tokens");
                then.status(200).json_body(json!({"id": ""}));
            })
            .await;

        let err = gateway(&server).tokenize(&record()).await.unwrap_err();
        assert!(matches!(err.kind, GatewayErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn test_charge_posts_json_with_secret_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/charges")
                    .header("Authorization", SECRET_AUTH)
                    .json_body(json!({
                        "description": "Donation charge",
                        "amount": 2879410,
                        "currency": "THB",
                        "return_uri": "http://www.example.com/complete",
                        "card": "tokn_test_5abc"
                    }));
                then.status(200)
                    .json_body(json!({"object": "charge", "id": "chrg_test_5xyz", "paid": false}));
            })
            .await;

        let charge_id = gateway(&server)
            .charge("tokn_test_5abc", 2879410)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(charge_id, "chrg_test_5xyz");
    }

    #[tokio::test]
    async fn test_charge_fails_on_payment_required() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/charges");
                then.status(402).body("failed_processing");
            })
            .await;

        let err = gateway(&server).charge("tokn_x", 100).await.unwrap_err();
        assert_eq!(err.stage, Stage::Charge);
        assert!(matches!(err.kind, GatewayErrorKind::Status { status: 402, .. }));
    }

    #[tokio::test]
    async fn test_confirm_surfaces_paid_flag() {
        let server = MockServer::start_async().await;
        let paid = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/charges/chrg_paid")
                    .header("Authorization", SECRET_AUTH);
                then.status(200)
                    .json_body(json!({"object": "charge", "id": "chrg_paid", "paid": true}));
            })
            .await;
        let unpaid = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/charges/chrg_unpaid")
                    .header("Authorization", SECRET_AUTH);
                then.status(200)
                    .json_body(json!({"object": "charge", "id": "chrg_unpaid", "paid": false}));
            })
            .await;

        let gateway = gateway(&server);
        assert!(gateway.confirm_paid("chrg_paid").await.unwrap());
        assert!(!gateway.confirm_paid("chrg_unpaid").await.unwrap());

        paid.assert_async().await;
        unpaid.assert_async().await;
    }

    #[tokio::test]
    async fn test_confirm_requires_paid_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/charges/chrg_1");
                then.status(200).json_body(json!({"id": "chrg_1"}));
            })
            .await;

        let err = gateway(&server).confirm_paid("chrg_1").await.unwrap_err();
        assert_eq!(err.stage, Stage::Confirm);
        assert!(matches!(err.kind, GatewayErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn test_confirm_rejects_mismatched_charge() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/charges/chrg_1");
                then.status(200).json_body(json!({"id": "chrg_2", "paid": true}));
            })
            .await;

        let err = gateway(&server).confirm_paid("chrg_1").await.unwrap_err();
        assert!(matches!(err.kind, GatewayErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_per_stage() {
        let settings = GatewaySettings {
            vault_endpoint: "http://127.0.0.1:1".to_string(),
            api_endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
            ..GatewaySettings::default()
        };
        let gateway =
            OmiseGateway::new(Credentials::new("pkey_test_123", "skey_test_456"), settings).unwrap();

        let err = gateway.tokenize(&record()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Tokenize);
        assert!(matches!(err.kind, GatewayErrorKind::Transport(_)));

        let err = gateway.confirm_paid("chrg_1").await.unwrap_err();
        assert_eq!(err.stage, Stage::Confirm);
    }
}
