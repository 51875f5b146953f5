use crate::utils::error::Stage;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// 記錄在批次中的位置（0 起算，依檔案順序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(pub usize);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DonationRecord {
    pub amount: i64,
    pub card_holder_name: String,
    pub card_number: String,
    pub cvv: String,
    pub expiration_month: u32,
    pub expiration_year: i32,
}

impl DonationRecord {
    pub fn masked_card_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().collect();
        let visible = digits.len().min(4);
        let tail: String = digits[digits.len() - visible..].iter().collect();
        format!("{}{}", "*".repeat(digits.len() - visible), tail)
    }
}

// 卡號與 CVV 不得出現在日誌中
impl fmt::Debug for DonationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DonationRecord")
            .field("amount", &self.amount)
            .field("card_holder_name", &self.card_holder_name)
            .field("card_number", &self.masked_card_number())
            .field("cvv", &"***")
            .field("expiration_month", &self.expiration_month)
            .field("expiration_year", &self.expiration_year)
            .finish()
    }
}

/// 解析後的批次，解析完成後即為唯讀
#[derive(Debug, Clone, Default)]
pub struct DonationBatch {
    records: Vec<Arc<DonationRecord>>,
}

impl DonationBatch {
    pub fn new(records: Vec<DonationRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Arc<DonationRecord>> {
        self.records.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DonationRecord>> {
        self.records.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = (RecordId, &Arc<DonationRecord>)> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| (RecordId(index), record))
    }
}

/// 單筆記錄的工作流程狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "lowercase")]
pub enum WorkflowState {
    Pending,
    Tokenized,
    Charged,
    Confirmed,
    Failed(Stage),
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Confirmed | WorkflowState::Failed(_))
    }

    pub fn failure_stage(&self) -> Option<Stage> {
        match self {
            WorkflowState::Failed(stage) => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Pending => f.write_str("pending"),
            WorkflowState::Tokenized => f.write_str("tokenized"),
            WorkflowState::Charged => f.write_str("charged"),
            WorkflowState::Confirmed => f.write_str("confirmed"),
            WorkflowState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DonationOutcome {
    pub record_id: RecordId,
    pub record: Arc<DonationRecord>,
    pub token_id: Option<String>,
    pub charge_paid: Option<bool>,
    pub state: WorkflowState,
}

impl DonationOutcome {
    pub fn failure_stage(&self) -> Option<Stage> {
        self.state.failure_stage()
    }

    /// 中止訊號觸發後未啟動的記錄仍停留在 Pending
    pub fn was_launched(&self) -> bool {
        self.state != WorkflowState::Pending
    }

    pub fn is_paid(&self) -> bool {
        self.state == WorkflowState::Confirmed && self.charge_paid == Some(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DonateInfo {
    pub invalid_sum: i64,
    pub valid_sum: i64,
    pub total_sum: i64,
    pub invalid_count: usize,
    pub valid_count: usize,
    pub total_count: usize,
    pub top_donate_amount: i64,
    pub top_donor_name: String,
}
