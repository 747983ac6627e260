use crate::core::state::PipelineStep;
use thiserror::Error;

/// Failure of one of the sequential pipeline stages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("integration failed: {0}")]
    Integration(String),
}

/// Terminal failure of a generation run, tagged with the step it happened in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("autobiography generation failed during {step}: {cause}")]
pub struct PipelineError {
    pub step: PipelineStep,
    pub cause: StageError,
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Invalid audio input: {0}")]
    Validation(String),

    #[error("Speech-to-text service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),
}
