use crate::core::workflow::{ResultPublisher, Workflow};
use crate::domain::model::{DonationBatch, DonationOutcome, RecordId, WorkflowState};
use crate::domain::ports::PaymentGateway;
use crate::utils::error::Stage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// 停止啟動新的工作流程；已在執行中的會跑完
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchEngine<G: PaymentGateway + 'static> {
    gateway: Arc<G>,
    concurrency: usize,
    abort: AbortSignal,
}

impl<G: PaymentGateway + 'static> BatchEngine<G> {
    pub fn new(gateway: Arc<G>, concurrency: usize) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
            abort: AbortSignal::new(),
        }
    }

    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 對批次中每筆記錄各跑一個工作流程，回傳每筆記錄剛好一個結果（依 RecordId 排序）。
    ///
    /// 同時執行的工作流程數量受 semaphore 限制。token 與 charge 結果分別經由
    /// 兩條帶 RecordId 的串流送給各自唯一的收集器。所有工作流程結束、串流關閉、
    /// 收集器清空之後才組裝結果。
    pub async fn run(&self, batch: &DonationBatch) -> Vec<DonationOutcome> {
        tracing::info!(
            "🚀 Processing {} donations (concurrency {})",
            batch.len(),
            self.concurrency
        );

        let (token_tx, token_rx) = mpsc::unbounded_channel();
        let (charge_tx, charge_rx) = mpsc::unbounded_channel();
        let token_collector = tokio::spawn(collect(token_rx, "token"));
        let charge_collector = tokio::spawn(collect(charge_rx, "charge"));
        let publisher = ResultPublisher::new(token_tx, charge_tx);

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles: Vec<(RecordId, JoinHandle<WorkflowState>)> = Vec::with_capacity(batch.len());

        for (record_id, record) in batch.entries() {
            if self.abort.is_triggered() {
                break;
            }

            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // 等待 permit 期間可能收到中止訊號
            if self.abort.is_triggered() {
                break;
            }

            let gateway = Arc::clone(&self.gateway);
            let publisher = publisher.clone();
            let workflow = Workflow::new(record_id, Arc::clone(record));

            handles.push((
                record_id,
                tokio::spawn(async move {
                    let _permit = permit;
                    workflow.run(gateway.as_ref(), &publisher).await
                }),
            ));
        }

        if handles.len() < batch.len() {
            tracing::warn!(
                "🛑 Abort requested: {} of {} donations were not started",
                batch.len() - handles.len(),
                batch.len()
            );
        }

        // 等所有工作流程結束
        let mut states = vec![WorkflowState::Pending; batch.len()];
        let mut panicked = Vec::new();
        for (record_id, handle) in handles {
            match handle.await {
                Ok(state) => states[record_id.0] = state,
                Err(e) => {
                    tracing::error!("❌ Workflow for {} did not finish: {}", record_id, e);
                    panicked.push(record_id);
                }
            }
        }

        // 關閉兩條串流，再等收集器清空
        drop(publisher);
        let mut tokens = token_collector.await.unwrap_or_else(|e| {
            tracing::error!("❌ Token collector failed: {}", e);
            HashMap::new()
        });
        let mut charges = charge_collector.await.unwrap_or_else(|e| {
            tracing::error!("❌ Charge collector failed: {}", e);
            HashMap::new()
        });

        for record_id in panicked {
            states[record_id.0] = infer_failure(tokens.get(&record_id), charges.get(&record_id));
        }

        let outcomes: Vec<DonationOutcome> = batch
            .entries()
            .map(|(record_id, record)| DonationOutcome {
                record_id,
                record: Arc::clone(record),
                token_id: tokens.remove(&record_id).flatten(),
                charge_paid: charges.remove(&record_id),
                state: states[record_id.0],
            })
            .collect();

        let confirmed = outcomes
            .iter()
            .filter(|o| o.state == WorkflowState::Confirmed)
            .count();
        let failed = outcomes.iter().filter(|o| o.failure_stage().is_some()).count();
        tracing::info!(
            "✅ Batch finished: {} confirmed, {} failed, {} not started",
            confirmed,
            failed,
            outcomes.len() - confirmed - failed
        );

        outcomes
    }
}

/// 單一寫入者：只有這個 task 會修改結果表
async fn collect<T: Send>(
    mut rx: mpsc::UnboundedReceiver<(RecordId, T)>,
    stream: &'static str,
) -> HashMap<RecordId, T> {
    let mut results = HashMap::new();
    while let Some((record_id, value)) = rx.recv().await {
        if results.insert(record_id, value).is_some() {
            tracing::warn!("Duplicate {} result for {}", stream, record_id);
        }
    }
    tracing::debug!("{} stream drained: {} results", stream, results.len());
    results
}

// 工作流程異常結束時，依已發布的結果推斷停在哪一步
fn infer_failure(token: Option<&Option<String>>, charge: Option<&bool>) -> WorkflowState {
    match (token, charge) {
        (Some(Some(_)), Some(_)) => WorkflowState::Failed(Stage::Confirm),
        (Some(Some(_)), None) => WorkflowState::Failed(Stage::Charge),
        _ => WorkflowState::Failed(Stage::Tokenize),
    }
}
