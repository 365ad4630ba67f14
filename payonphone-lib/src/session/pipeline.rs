//! Three-stage payment pipeline: create intent, collect card, capture.
//!
//! Stages run strictly in order; a stage starts only after the previous one
//! returned successfully, and the first failure ends the run. Nothing is
//! committed until capture succeeds, so an aborted run needs no rollback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::intent::{PaymentIntent, PaymentIntentParameters};
use crate::runtime::{ReaderEventCallback, TerminalRuntime};
use crate::{Result, TerminalError};

/// A step of the payment pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Create the payment intent.
    CreateIntent,
    /// Present the intent to the reader and collect a card.
    CollectPaymentMethod,
    /// Process and capture the collected payment.
    Capture,
}

impl PipelineStage {
    /// Stage an error came from, if it is a pipeline error.
    pub fn of(error: &TerminalError) -> Option<Self> {
        match error {
            TerminalError::IntentCreation(_) => Some(Self::CreateIntent),
            TerminalError::MethodCollection { .. } => Some(Self::CollectPaymentMethod),
            TerminalError::Capture { .. } => Some(Self::Capture),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreateIntent => "create intent",
            Self::CollectPaymentMethod => "collect payment method",
            Self::Capture => "capture",
        };
        f.write_str(text)
    }
}

/// Callback invoked as the pipeline enters each stage.
pub type StageCallback = Arc<dyn Fn(PipelineStage) + Send + Sync>;

/// Runs one charge through the runtime.
pub struct PaymentPipeline {
    runtime: Arc<dyn TerminalRuntime>,
    on_event: ReaderEventCallback,
    on_stage: Option<StageCallback>,
}

impl PaymentPipeline {
    /// Create a pipeline forwarding reader prompts to `on_event`.
    pub fn new(runtime: Arc<dyn TerminalRuntime>, on_event: ReaderEventCallback) -> Self {
        Self {
            runtime,
            on_event,
            on_stage: None,
        }
    }

    /// Observe stage transitions.
    pub fn with_stage_callback(mut self, on_stage: StageCallback) -> Self {
        self.on_stage = Some(on_stage);
        self
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::debug!(%stage, "payment stage");
        if let Some(on_stage) = &self.on_stage {
            on_stage(stage);
        }
    }

    /// Run all three stages and return the captured intent.
    pub async fn run(&self, params: PaymentIntentParameters) -> Result<PaymentIntent> {
        self.enter(PipelineStage::CreateIntent);
        let intent = self
            .runtime
            .create_payment_intent(&params)
            .await
            .map_err(|e| TerminalError::IntentCreation(e.to_string()))?;

        self.enter(PipelineStage::CollectPaymentMethod);
        let intent_id = intent.id.clone();
        let intent = self
            .runtime
            .collect_payment_method(intent, self.on_event.clone())
            .await
            .map_err(|e| {
                // TODO: cancel the abandoned intent upstream once the runtime exposes cancel.
                tracing::warn!(intent_id = %intent_id, "intent abandoned after collection failure");
                TerminalError::MethodCollection {
                    intent_id: intent_id.clone(),
                    reason: e.to_string(),
                }
            })?;

        self.enter(PipelineStage::Capture);
        self.runtime
            .process_payment(intent)
            .await
            .map_err(|e| TerminalError::Capture {
                intent_id,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{Amount, Currency};
    use crate::config::ConnectionConfiguration;
    use crate::credentials::StaticTokenProvider;
    use crate::intent::PaymentIntentStatus;
    use crate::reader::ReaderEvent;
    use crate::runtime::{ReaderError, SimulatedOperation, SimulatedTerminal};
    use std::sync::Mutex;

    async fn connected_sim() -> Arc<SimulatedTerminal> {
        let sim = SimulatedTerminal::new();
        sim.set_token_provider(Arc::new(StaticTokenProvider::new("pst_test")));
        let reader = sim.config().readers[0].clone();
        sim.connect_reader(
            &reader,
            &ConnectionConfiguration {
                location_id: "tml_test".into(),
            },
            Arc::new(|_: ReaderEvent| {}),
        )
        .await
        .unwrap();
        sim
    }

    fn params(minor: u64) -> PaymentIntentParameters {
        PaymentIntentParameters::new(Amount::from_minor(minor).unwrap(), Currency::usd())
    }

    #[tokio::test]
    async fn test_runs_stages_in_order() {
        let sim = connected_sim().await;
        let stages = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let stage_sink = stages.clone();
        let event_sink = events.clone();

        let pipeline = PaymentPipeline::new(
            sim.clone(),
            Arc::new(move |e: ReaderEvent| event_sink.lock().unwrap().push(e)),
        )
        .with_stage_callback(Arc::new(move |s: PipelineStage| stage_sink.lock().unwrap().push(s)));

        let intent = pipeline.run(params(1599)).await.unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::Succeeded);
        assert_eq!(intent.amount.minor_units(), 1599);
        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                PipelineStage::CreateIntent,
                PipelineStage::CollectPaymentMethod,
                PipelineStage::Capture
            ]
        );
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, ReaderEvent::InputRequested(_))));
    }

    #[tokio::test]
    async fn test_intent_failure_stops_pipeline() {
        let sim = connected_sim().await;
        sim.fail(SimulatedOperation::CreateIntent, ReaderError::Other("offline".into()));
        let pipeline = PaymentPipeline::new(sim.clone(), Arc::new(|_: ReaderEvent| {}));

        let err = pipeline.run(params(500)).await.unwrap_err();
        assert_eq!(PipelineStage::of(&err), Some(PipelineStage::CreateIntent));
        assert_eq!(sim.calls(SimulatedOperation::Collect), 0);
        assert_eq!(sim.calls(SimulatedOperation::Capture), 0);
    }

    #[tokio::test]
    async fn test_collection_failure_skips_capture() {
        let sim = connected_sim().await;
        sim.fail(SimulatedOperation::Collect, ReaderError::Canceled);
        let pipeline = PaymentPipeline::new(sim.clone(), Arc::new(|_: ReaderEvent| {}));

        let err = pipeline.run(params(500)).await.unwrap_err();
        assert!(err.to_string().starts_with("collection failed"));
        assert_eq!(PipelineStage::of(&err), Some(PipelineStage::CollectPaymentMethod));
        assert_eq!(sim.calls(SimulatedOperation::Capture), 0);
    }

    #[tokio::test]
    async fn test_decline_is_capture_failure() {
        let sim = connected_sim().await;
        let pipeline = PaymentPipeline::new(sim.clone(), Arc::new(|_: ReaderEvent| {}));

        let err = pipeline.run(params(2001)).await.unwrap_err();
        assert!(err.to_string().starts_with("payment failed"));
        assert_eq!(PipelineStage::of(&err), Some(PipelineStage::Capture));
    }
}
