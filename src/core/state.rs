use crate::core::error::{PipelineError, StageError};
use crate::core::model::{AnalysisResult, AutobiographyResult, LifePeriod, PeriodExtraction};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Analyze,
    ExtractPeriods,
    Integrate,
    Complete,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Analyze => "analyze",
            PipelineStep::ExtractPeriods => "extract_periods",
            PipelineStep::Integrate => "integrate",
            PipelineStep::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Outcome of one period branch of the fan-out.
#[derive(Clone, Debug, PartialEq)]
pub enum PeriodOutcome {
    Extracted(PeriodExtraction),
    Failed(String),
}

impl PeriodOutcome {
    /// The extraction, only when the model reported evidence for the period.
    pub fn content(&self) -> Option<&PeriodExtraction> {
        match self {
            PeriodOutcome::Extracted(extraction) if extraction.has_content => Some(extraction),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PeriodOutcome::Failed(_))
    }
}

/// Exactly five outcomes, indexed by `LifePeriod::index`.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodSlots([PeriodOutcome; 5]);

impl PeriodSlots {
    /// Builds the slots from outcomes listed in canonical order. Missing trailing entries are
    /// recorded as failures so every period keeps a slot.
    pub fn from_ordered<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = PeriodOutcome>,
    {
        let mut iter = outcomes.into_iter();
        Self(std::array::from_fn(|_| {
            iter.next()
                .unwrap_or_else(|| PeriodOutcome::Failed("no outcome recorded".to_string()))
        }))
    }

    pub fn get(&self, period: LifePeriod) -> &PeriodOutcome {
        &self.0[period.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LifePeriod, &PeriodOutcome)> {
        LifePeriod::ALL.into_iter().zip(self.0.iter())
    }

    pub fn with_content(&self) -> usize {
        self.0.iter().filter(|o| o.content().is_some()).count()
    }
}

/// Record threaded through the controller. Every transition consumes the state and returns a
/// successor; nothing mutates a state that another step has already seen.
#[derive(Clone, Debug)]
pub struct PipelineState {
    transcript: String,
    analysis: Option<AnalysisResult>,
    periods: Option<PeriodSlots>,
    final_result: Option<AutobiographyResult>,
    current_step: PipelineStep,
    error: Option<StageError>,
}

impl PipelineState {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            analysis: None,
            periods: None,
            final_result: None,
            current_step: PipelineStep::Analyze,
            error: None,
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn periods(&self) -> Option<&PeriodSlots> {
        self.periods.as_ref()
    }

    pub fn final_result(&self) -> Option<&AutobiographyResult> {
        self.final_result.as_ref()
    }

    pub fn current_step(&self) -> PipelineStep {
        self.current_step
    }

    pub fn error(&self) -> Option<&StageError> {
        self.error.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.error.is_some() || self.current_step == PipelineStep::Complete
    }

    pub fn with_analysis(self, analysis: AnalysisResult) -> Self {
        Self {
            analysis: Some(analysis),
            current_step: PipelineStep::ExtractPeriods,
            ..self
        }
    }

    pub fn with_periods(self, periods: PeriodSlots) -> Self {
        Self {
            periods: Some(periods),
            current_step: PipelineStep::Integrate,
            ..self
        }
    }

    pub fn with_result(self, result: AutobiographyResult) -> Self {
        Self {
            final_result: Some(result),
            current_step: PipelineStep::Complete,
            ..self
        }
    }

    /// Keeps `current_step` at the step that failed.
    pub fn with_error(self, error: StageError) -> Self {
        Self {
            error: Some(error),
            ..self
        }
    }

    /// Converts a terminal state into the run's outcome.
    pub fn into_outcome(self) -> Result<AutobiographyResult, PipelineError> {
        if let Some(cause) = self.error {
            return Err(PipelineError {
                step: self.current_step,
                cause,
            });
        }
        match (self.current_step, self.final_result) {
            (PipelineStep::Complete, Some(result)) => Ok(result),
            (step, _) => Err(PipelineError {
                step,
                cause: StageError::Integration("run ended without a final result".to_string()),
            }),
        }
    }
}
