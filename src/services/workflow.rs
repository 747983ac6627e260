use crate::core::error::{PipelineError, StageError};
use crate::core::model::AutobiographyResult;
use crate::core::state::{PipelineState, PipelineStep};
use crate::services::llm::LlmClient;
use crate::services::stages::{self, GenerationSettings};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

/// Notified before each step of a run starts.
#[async_trait]
pub trait WorkflowObserver: Send + Sync {
    async fn on_step(&self, step: PipelineStep);
}

/// Drives analyze → extract_periods → integrate for one transcript at a time.
pub struct WorkflowManager {
    llm: Arc<dyn LlmClient>,
    settings: GenerationSettings,
}

impl WorkflowManager {
    pub fn new(llm: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    pub async fn run(&self, transcript: &str) -> Result<AutobiographyResult, PipelineError> {
        self.run_observed(transcript, None).await
    }

    pub async fn run_observed(
        &self,
        transcript: &str,
        observer: Option<&dyn WorkflowObserver>,
    ) -> Result<AutobiographyResult, PipelineError> {
        info!("Starting autobiography generation ({} chars)", transcript.chars().count());
        let mut state = PipelineState::new(transcript);

        while !state.is_terminal() {
            if let Some(observer) = observer {
                observer.on_step(state.current_step()).await;
            }
            state = self.step(state).await;
        }

        if let Some(observer) = observer {
            if state.error().is_none() {
                observer.on_step(state.current_step()).await;
            }
        }

        state.into_outcome()
    }

    /// Performs the work of `state.current_step()` and returns the successor state. Failures
    /// are recorded on the returned state, never propagated. Terminal states are returned as is.
    pub async fn step(&self, state: PipelineState) -> PipelineState {
        if state.is_terminal() {
            return state;
        }
        match state.current_step() {
            PipelineStep::Analyze => self.analyze_step(state).await,
            PipelineStep::ExtractPeriods => self.extract_periods_step(state).await,
            PipelineStep::Integrate => self.integrate_step(state).await,
            PipelineStep::Complete => state,
        }
    }

    async fn analyze_step(&self, state: PipelineState) -> PipelineState {
        info!("Step 1/3: analysing transcript");
        match stages::analyze(self.llm.as_ref(), &self.settings, state.transcript()).await {
            Ok(analysis) => {
                info!("Analysis complete: {}", analysis.author_name);
                state.with_analysis(analysis)
            }
            Err(e) => state.with_error(e),
        }
    }

    async fn extract_periods_step(&self, state: PipelineState) -> PipelineState {
        info!("Step 2/3: writing period chapters");
        let periods =
            stages::extract_periods(self.llm.as_ref(), &self.settings, state.transcript()).await;
        info!("{} of 5 periods have content", periods.with_content());
        state.with_periods(periods)
    }

    async fn integrate_step(&self, state: PipelineState) -> PipelineState {
        info!("Step 3/3: integrating autobiography");
        let outcome = match (state.analysis(), state.periods()) {
            (Some(analysis), Some(periods)) => {
                stages::integrate(self.llm.as_ref(), &self.settings, analysis, periods).await
            }
            _ => Err(StageError::Integration(
                "integration reached without analysis or period slots".to_string(),
            )),
        };

        match outcome {
            Ok(result) => {
                info!("Integration complete: {} chapters", result.chapters.len());
                state.with_result(result)
            }
            Err(e) => state.with_error(e),
        }
    }
}
