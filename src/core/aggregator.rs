use crate::core::parser::is_expired;
use crate::domain::model::{DonateInfo, DonationBatch};
use chrono::{DateTime, Utc};

pub fn summarize(batch: &DonationBatch) -> DonateInfo {
    summarize_at(batch, Utc::now())
}

/// 單次走訪批次，計算有效/無效金額與最高捐款者。
///
/// 有效性與解析器使用同一個 `is_expired` 規則。最高金額只在「嚴格大於」時更新，
/// 所以金額相同時以檔案中先出現者為準。
pub fn summarize_at(batch: &DonationBatch, now: DateTime<Utc>) -> DonateInfo {
    let mut info = DonateInfo::default();

    for record in batch.iter() {
        if record.amount > info.top_donate_amount {
            info.top_donate_amount = record.amount;
            info.top_donor_name = record.card_holder_name.clone();
        }

        if is_expired(record.expiration_month, record.expiration_year, now) {
            info.invalid_sum += record.amount;
            info.invalid_count += 1;
        } else {
            info.valid_sum += record.amount;
            info.valid_count += 1;
        }

        info.total_sum += record.amount;
        info.total_count += 1;
    }

    info
}
