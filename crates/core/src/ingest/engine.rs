//! Ordered step executor.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use super::error::{PipelineError, StepError};
use super::state::{IngestOutcome, PipelineState};
use super::steps;
use crate::metrics::{PIPELINE_RUNS, PIPELINE_STEP_DURATION};

/// One stage of the ingestion pipeline.
///
/// A step either advances the shared state or returns an error that aborts
/// the run. Steps that open durable records are responsible for marking the
/// run failed before returning an error.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in errors, logs and metrics.
    fn name(&self) -> &'static str;

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError>;
}

/// Runs steps strictly in order, stopping at the first failure.
///
/// There is no rollback: side effects committed by earlier steps stay.
pub struct IngestPipeline {
    steps: Vec<Box<dyn Step>>,
}

impl IngestPipeline {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// The standard statement ingestion sequence.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(steps::FetchSource),
            Box::new(steps::ComputeChecksum),
            Box::new(steps::ResolveDocument),
            Box::new(steps::SupersedeOldRuns),
            Box::new(steps::StartParsingRun),
            Box::new(steps::ParseWithAiService),
            Box::new(steps::StoreRawOutput),
            Box::new(steps::TransformOutput),
            Box::new(steps::BuildValidator),
            Box::new(steps::ValidateCategories),
            Box::new(steps::PersistTransactions),
            Box::new(steps::MarkRunSucceeded),
        ])
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the pipeline and summarizes the final state.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        state: &mut PipelineState,
    ) -> Result<IngestOutcome, PipelineError> {
        let result = self.execute(cancel, state).await;
        let label = match &result {
            Ok(()) => "success",
            Err(PipelineError::Cancelled { .. }) => "cancelled",
            Err(PipelineError::StepFailed { .. }) => "failed",
        };
        PIPELINE_RUNS.with_label_values(&[label]).inc();
        result.map(|()| state.outcome())
    }

    /// Runs every step against `state`.
    ///
    /// Cancellation is observed before and during each step; a cancelled run
    /// marks its open parsing run failed.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        state: &mut PipelineState,
    ) -> Result<(), PipelineError> {
        for (position, step) in self.steps.iter().enumerate() {
            let index = position + 1;
            let name = step.name();

            if cancel.is_cancelled() {
                state.fail_run("ingestion cancelled").await;
                return Err(PipelineError::Cancelled { index, name });
            }

            debug!(step = name, index, source = %state.source_uri, "Running pipeline step");
            let started = Instant::now();
            let span = tracing::debug_span!("pipeline_step", step = name, index);

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = step.execute(state).instrument(span) => Some(result),
            };

            PIPELINE_STEP_DURATION
                .with_label_values(&[name])
                .observe(started.elapsed().as_secs_f64());

            match result {
                Some(Ok(())) => {}
                Some(Err(source)) => {
                    warn!(step = name, index, error = %source, "Pipeline step failed");
                    return Err(PipelineError::StepFailed {
                        index,
                        name,
                        source,
                    });
                }
                None => {
                    state.fail_run("ingestion cancelled").await;
                    return Err(PipelineError::Cancelled { index, name });
                }
            }
        }

        Ok(())
    }
}
