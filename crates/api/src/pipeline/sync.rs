//! Optional bridge from pipeline events to the completion ledger.
//!
//! When enabled (`PIPELINE_AUTO_MARK_COMPLETE=true`) every successful job
//! marks its `(uuid, plan_id)` pair complete, so clients polling
//! `/pipeline/status` no longer depend on the executable calling back.

use std::sync::Arc;

use hvac_events::{PipelineEvent, PipelineEventKind};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::pipeline::ledger::CompletionLedger;

pub struct LedgerSync {
    ledger: Arc<CompletionLedger>,
}

impl LedgerSync {
    pub fn new(ledger: Arc<CompletionLedger>) -> Self {
        Self { ledger }
    }

    /// Consume events until the bus closes or `cancel` fires.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<PipelineEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Ledger sync started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Ledger sync shutting down");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => self.handle(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Ledger sync lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, ledger sync exiting");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&self, event: &PipelineEvent) {
        if event.kind == PipelineEventKind::Completed {
            self.ledger.mark_complete(&event.uuid, &event.plan_id).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
