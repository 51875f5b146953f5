use crate::domain::model::{DonationBatch, DonationRecord};
use crate::utils::error::FormatError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

const FIELD_COUNT: usize = 6;

/// 以到期月份第一天 00:00 (UTC) 判斷卡片是否過期。
/// 該時間點必須嚴格晚於 `now` 才算有效，無法組成日期的值一律視為過期。
pub fn is_expired(expiration_month: u32, expiration_year: i32, now: DateTime<Utc>) -> bool {
    match NaiveDate::from_ymd_opt(expiration_year, expiration_month, 1) {
        Some(date) => date.and_time(NaiveTime::MIN).and_utc() <= now,
        None => true,
    }
}

pub fn parse(raw_text: &str) -> Result<DonationBatch, FormatError> {
    parse_at(raw_text, Utc::now())
}

/// 解析批次檔文字。
///
/// 第一行為標頭，一律略過。任何一行格式錯誤都會中止整個解析，不回傳部分結果；
/// 過期的卡片則直接丟棄，不算錯誤也不計數。行號從 0 起算（標頭為第 0 行）。
/// 只有最後一行可以是空的（檔尾換行），中間的空白行是 field-count 錯誤。
pub fn parse_at(raw_text: &str, now: DateTime<Utc>) -> Result<DonationBatch, FormatError> {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).flexible(true).quoting(false);

    let lines: Vec<&str> = raw_text.split('\n').collect();
    let last = lines.len() - 1;

    let mut records = Vec::new();
    let mut expired = 0usize;

    // 行號由這裡決定，不依賴 csv reader 的位置（CRLF 與空白行會讓它失準）
    for (line, &text) in lines.iter().enumerate().skip(1) {
        let text = text.strip_suffix('\r').unwrap_or(text);
        if line == last && text.is_empty() {
            continue;
        }

        let row = split_fields(&builder, text, line)?;
        if row.len() != FIELD_COUNT {
            return Err(FormatError::FieldCount {
                line,
                found: row.len(),
            });
        }

        let amount = parse_field::<i64>(&row[1], line, "amount")?;
        let expiration_month = parse_field::<u32>(&row[4], line, "expiration_month")?;
        if !(1..=12).contains(&expiration_month) {
            return Err(FormatError::FieldType {
                line,
                field: "expiration_month",
                value: row[4].to_string(),
            });
        }
        let expiration_year = parse_field::<i32>(&row[5], line, "expiration_year")?;

        if is_expired(expiration_month, expiration_year, now) {
            expired += 1;
            continue;
        }

        records.push(DonationRecord {
            amount,
            card_holder_name: row[0].to_string(),
            card_number: row[2].to_string(),
            cvv: row[3].to_string(),
            expiration_month,
            expiration_year,
        });
    }

    tracing::debug!(
        "Parsed {} records, dropped {} expired cards",
        records.len(),
        expired
    );
    Ok(DonationBatch::new(records))
}

// 空行在 csv 裡沒有任何 record，這裡視為單一空欄位
fn split_fields(
    builder: &csv::ReaderBuilder,
    text: &str,
    line: usize,
) -> Result<csv::StringRecord, FormatError> {
    let mut reader = builder.from_reader(text.as_bytes());
    match reader.records().next() {
        Some(result) => result.map_err(|e| FormatError::Unreadable {
            line,
            message: e.to_string(),
        }),
        None => Ok(csv::StringRecord::from(vec![""])),
    }
}

fn parse_field<T: std::str::FromStr>(
    value: &str,
    line: usize,
    field: &'static str,
) -> Result<T, FormatError> {
    value.parse::<T>().map_err(|_| FormatError::FieldType {
        line,
        field,
        value: value.to_string(),
    })
}
