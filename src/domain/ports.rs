use crate::domain::model::DonationRecord;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;

/// 提供已解碼的批次檔文字
pub trait RecordSource: Send + Sync {
    fn read_text(&self) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn shift_offset(&self) -> u8;
    fn concurrency(&self) -> usize;
    fn public_key(&self) -> &str;
    fn secret_key(&self) -> &str;
    fn vault_endpoint(&self) -> &str;
    fn api_endpoint(&self) -> &str;
    fn currency(&self) -> &str;
    fn description(&self) -> &str;
    fn return_uri(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
    fn monitoring_enabled(&self) -> bool;
}

/// 金流服務的三個遠端呼叫，每個都可能獨立失敗
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn tokenize(&self, record: &DonationRecord) -> std::result::Result<String, GatewayError>;

    async fn charge(&self, token_id: &str, amount: i64) -> std::result::Result<String, GatewayError>;

    async fn confirm_paid(&self, charge_id: &str) -> std::result::Result<bool, GatewayError>;
}
