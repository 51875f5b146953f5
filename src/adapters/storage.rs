use crate::domain::ports::RecordSource;
use crate::utils::error::{DonateError, Result};
use std::path::PathBuf;

pub const DEFAULT_SHIFT_OFFSET: u8 = 128;

/// 還原位移編碼：每個位元組減去 offset（mod 256），最後一個位元組是結尾標記，直接丟棄
pub fn decode_shifted(data: &[u8], offset: u8) -> Result<String> {
    let payload = match data.split_last() {
        Some((_sentinel, payload)) => payload,
        None => return Ok(String::new()),
    };

    let decoded: Vec<u8> = payload.iter().map(|b| b.wrapping_sub(offset)).collect();
    String::from_utf8(decoded).map_err(|e| DonateError::Decode {
        message: format!(
            "decoded bytes are not valid UTF-8 (offset {}): {}",
            offset, e
        ),
    })
}

/// 以位移編碼儲存的本機批次檔（例如 *.csv.rot128）
#[derive(Debug, Clone)]
pub struct ShiftedFileSource {
    path: PathBuf,
    offset: u8,
}

impl ShiftedFileSource {
    pub fn new(path: impl Into<PathBuf>, offset: u8) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    pub fn rot128(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DEFAULT_SHIFT_OFFSET)
    }
}

impl RecordSource for ShiftedFileSource {
    async fn read_text(&self) -> Result<String> {
        tracing::debug!("Reading batch file: {}", self.path.display());
        let data = tokio::fs::read(&self.path).await?;
        tracing::debug!("Read {} bytes, decoding with offset {}", data.len(), self.offset);
        decode_shifted(&data, self.offset)
    }
}

/// 測試與除錯用：把純文字編碼成位移格式
pub fn encode_shifted(text: &str, offset: u8) -> Vec<u8> {
    let mut data: Vec<u8> = text.bytes().map(|b| b.wrapping_add(offset)).collect();
    data.push(b'\n'.wrapping_add(offset));
    data
}
