use crate::domain::model::{DonateInfo, DonationOutcome, RecordId, WorkflowState};
use crate::utils::error::{Result, Stage};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub processed: usize,
    pub confirmed: usize,
    pub paid: usize,
    pub failed_tokenize: usize,
    pub failed_charge: usize,
    pub failed_confirm: usize,
    pub not_started: usize,
    pub donated_amount: i64,
    pub faulty_amount: i64,
}

impl OutcomeSummary {
    pub fn from_outcomes(outcomes: &[DonationOutcome]) -> Self {
        let mut summary = Self::default();

        for outcome in outcomes {
            match outcome.state {
                WorkflowState::Confirmed => summary.confirmed += 1,
                WorkflowState::Failed(Stage::Tokenize) => summary.failed_tokenize += 1,
                WorkflowState::Failed(Stage::Charge) => summary.failed_charge += 1,
                WorkflowState::Failed(Stage::Confirm) => summary.failed_confirm += 1,
                _ => {}
            }

            if outcome.was_launched() {
                summary.processed += 1;
            } else {
                summary.not_started += 1;
            }

            if outcome.is_paid() {
                summary.paid += 1;
                summary.donated_amount += outcome.record.amount;
            } else {
                summary.faulty_amount += outcome.record.amount;
            }
        }

        summary
    }

    pub fn failed(&self) -> usize {
        self.failed_tokenize + self.failed_charge + self.failed_confirm
    }
}

/// 單筆記錄的輸出列，不含卡片資料
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeLine {
    pub record_id: RecordId,
    pub name: String,
    pub amount: i64,
    #[serde(flatten)]
    pub state: WorkflowState,
    pub token_id: Option<String>,
    pub charge_paid: Option<bool>,
}

impl From<&DonationOutcome> for OutcomeLine {
    fn from(outcome: &DonationOutcome) -> Self {
        Self {
            record_id: outcome.record_id,
            name: outcome.record.card_holder_name.clone(),
            amount: outcome.record.amount,
            state: outcome.state,
            token_id: outcome.token_id.clone(),
            charge_paid: outcome.charge_paid,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub currency: String,
    pub donations: DonateInfo,
    pub outcomes: OutcomeSummary,
    pub records: Vec<OutcomeLine>,
}

impl RunReport {
    pub fn new(currency: &str, donations: DonateInfo, outcomes: &[DonationOutcome]) -> Self {
        Self {
            currency: currency.to_string(),
            donations,
            outcomes: OutcomeSummary::from_outcomes(outcomes),
            records: outcomes.iter().map(OutcomeLine::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn money(&self, amount: i64) -> String {
        format!("{} {:>14}", self.currency, group_thousands(amount))
    }

    /// `detailed` 會附上每筆記錄的結果
    pub fn render(&self, detailed: bool) -> String {
        if detailed {
            format!("{:#}", self)
        } else {
            self.to_string()
        }
    }
}

/// `{:#}` 會附上每筆記錄的結果
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.outcomes;
        let d = &self.donations;

        writeln!(f, "{:>22}: {}", "processed donations", o.processed)?;
        writeln!(f, "{:>22}: {}", "total valid amount", self.money(d.valid_sum))?;
        writeln!(
            f,
            "{:>22}: {}  ({})",
            "top single donation",
            self.money(d.top_donate_amount),
            d.top_donor_name
        )?;
        writeln!(f)?;
        writeln!(f, "{:>22}: {}", "successfully donated", self.money(o.donated_amount))?;
        writeln!(f, "{:>22}: {}", "faulty donation", self.money(o.faulty_amount))?;
        writeln!(
            f,
            "{:>22}: {} confirmed ({} paid), {} failed [tokenize {}, charge {}, confirm {}], {} not started",
            "outcomes",
            o.confirmed,
            o.paid,
            o.failed(),
            o.failed_tokenize,
            o.failed_charge,
            o.failed_confirm,
            o.not_started
        )?;

        if f.alternate() && !self.records.is_empty() {
            writeln!(f)?;
            for line in &self.records {
                let paid = match line.charge_paid {
                    Some(true) => "paid",
                    Some(false) => "unpaid",
                    None => "-",
                };
                writeln!(
                    f,
                    "{:>6} {:<40} {:>12} {:<18} {}",
                    line.record_id.to_string(),
                    line.name,
                    group_thousands(line.amount),
                    line.state.to_string(),
                    paid
                )?;
            }
        }

        Ok(())
    }
}

fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        grouped.insert(0, '-');
    }
    grouped
}
