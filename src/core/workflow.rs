use crate::domain::model::{DonationRecord, RecordId, WorkflowState};
use crate::domain::ports::PaymentGateway;
use crate::utils::error::{GatewayError, Stage};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub type TokenEvent = (RecordId, Option<String>);
pub type ChargeEvent = (RecordId, bool);

/// 把每一步的結果連同來源記錄 ID 送到兩條結果串流
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    tokens: UnboundedSender<TokenEvent>,
    charges: UnboundedSender<ChargeEvent>,
}

impl ResultPublisher {
    pub fn new(tokens: UnboundedSender<TokenEvent>, charges: UnboundedSender<ChargeEvent>) -> Self {
        Self { tokens, charges }
    }

    fn publish_token(&self, record_id: RecordId, token_id: Option<String>) {
        if self.tokens.send((record_id, token_id)).is_err() {
            tracing::error!("Token stream closed before {} was published", record_id);
        }
    }

    fn publish_charge(&self, record_id: RecordId, paid: bool) {
        if self.charges.send((record_id, paid)).is_err() {
            tracing::error!("Charge stream closed before {} was published", record_id);
        }
    }
}

// 帶著下一步所需資料的內部狀態
#[derive(Debug)]
enum Progress {
    Pending,
    Tokenized { token_id: String },
    Charged { charge_id: String },
    Confirmed,
    Failed(Stage),
}

/// 單筆記錄的 tokenize → charge → confirm 流程
#[derive(Debug)]
pub struct Workflow {
    record_id: RecordId,
    record: Arc<DonationRecord>,
    progress: Progress,
}

impl Workflow {
    pub fn new(record_id: RecordId, record: Arc<DonationRecord>) -> Self {
        Self {
            record_id,
            record,
            progress: Progress::Pending,
        }
    }

    pub fn state(&self) -> WorkflowState {
        match self.progress {
            Progress::Pending => WorkflowState::Pending,
            Progress::Tokenized { .. } => WorkflowState::Tokenized,
            Progress::Charged { .. } => WorkflowState::Charged,
            Progress::Confirmed => WorkflowState::Confirmed,
            Progress::Failed(stage) => WorkflowState::Failed(stage),
        }
    }

    /// 推進一個狀態。終止狀態再呼叫不會有任何效果。
    pub async fn step<G>(&mut self, gateway: &G, publisher: &ResultPublisher) -> WorkflowState
    where
        G: PaymentGateway + ?Sized,
    {
        let id = self.record_id;
        let progress = std::mem::replace(&mut self.progress, Progress::Pending);

        self.progress = match progress {
            Progress::Pending => match gateway.tokenize(&self.record).await {
                Ok(token_id) => {
                    tracing::debug!("{} tokenized: {}", id, token_id);
                    publisher.publish_token(id, Some(token_id.clone()));
                    Progress::Tokenized { token_id }
                }
                Err(e) => {
                    self.log_failure(&e);
                    publisher.publish_token(id, None);
                    Progress::Failed(Stage::Tokenize)
                }
            },
            Progress::Tokenized { token_id } => {
                match gateway.charge(&token_id, self.record.amount).await {
                    Ok(charge_id) => {
                        tracing::debug!("{} charged: {}", id, charge_id);
                        Progress::Charged { charge_id }
                    }
                    Err(e) => {
                        self.log_failure(&e);
                        publisher.publish_charge(id, false);
                        Progress::Failed(Stage::Charge)
                    }
                }
            }
            Progress::Charged { charge_id } => match gateway.confirm_paid(&charge_id).await {
                Ok(paid) => {
                    tracing::debug!("{} confirmed: paid={}", id, paid);
                    publisher.publish_charge(id, paid);
                    Progress::Confirmed
                }
                Err(e) => {
                    self.log_failure(&e);
                    publisher.publish_charge(id, false);
                    Progress::Failed(Stage::Confirm)
                }
            },
            done @ (Progress::Confirmed | Progress::Failed(_)) => done,
        };

        self.state()
    }

    pub async fn run<G>(mut self, gateway: &G, publisher: &ResultPublisher) -> WorkflowState
    where
        G: PaymentGateway + ?Sized,
    {
        while !self.state().is_terminal() {
            self.step(gateway, publisher).await;
        }
        self.state()
    }

    fn log_failure(&self, error: &GatewayError) {
        tracing::warn!(
            "⚠️ {} ({}, card {}) {}",
            self.record_id,
            self.record.card_holder_name,
            self.record.masked_card_number(),
            error
        );
    }
}
