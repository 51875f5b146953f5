use crate::core::aggregator;
use crate::core::engine::BatchEngine;
use crate::core::parser;
use crate::core::report::RunReport;
use crate::domain::ports::{PaymentGateway, RecordSource};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use chrono::{DateTime, Utc};

/// 一次完整的捐款批次：讀檔 → 解析 → 統計 → 扣款 → 報表
pub struct DonationRunner<S: RecordSource, G: PaymentGateway + 'static> {
    source: S,
    engine: BatchEngine<G>,
    currency: String,
    monitor: RunMonitor,
}

impl<S: RecordSource, G: PaymentGateway + 'static> DonationRunner<S, G> {
    pub fn new(source: S, engine: BatchEngine<G>, currency: impl Into<String>) -> Self {
        Self {
            source,
            engine,
            currency: currency.into(),
            monitor: RunMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(
        source: S,
        engine: BatchEngine<G>,
        currency: impl Into<String>,
        enable_monitoring: bool,
    ) -> Self {
        Self {
            monitor: RunMonitor::new(enable_monitoring),
            ..Self::new(source, engine, currency)
        }
    }

    pub fn engine(&self) -> &BatchEngine<G> {
        &self.engine
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// 整次執行使用同一個參考時間，解析與統計的有效性判斷不會前後不一
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        tracing::info!("📥 Loading donation batch");
        let text = self.source.read_text().await?;
        self.monitor.mark("load");

        // 格式錯誤直接結束，不會有任何扣款
        let batch = match parser::parse_at(&text, now) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("❌ Batch rejected before any charge: {}", e);
                return Err(e.into());
            }
        };
        tracing::info!("📋 Parsed {} donations with valid cards", batch.len());
        self.monitor.mark("parse");

        let summary = aggregator::summarize_at(&batch, now);
        tracing::info!(
            "🧮 Valid total {} across {} donations, top donation {} by {}",
            summary.valid_sum,
            summary.valid_count,
            summary.top_donate_amount,
            summary.top_donor_name
        );
        self.monitor.mark("summarize");

        let outcomes = self.engine.run(&batch).await;
        self.monitor.mark("process");

        let report = RunReport::new(&self.currency, summary, &outcomes);
        self.monitor.log_final_stats();
        Ok(report)
    }
}
