//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Operation → Detail

use std::io;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::engine::EngineError;
use crate::identifier::IdentifierError;
use crate::upload::UploadError;

use super::types::JobPhase;

/// Top-level pipeline error with job context.
///
/// The `Display` form is the single user-facing failure message.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("{step_name} failed: {source}")]
    StepFailed {
        job_id: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The request was rejected before anything ran.
    #[error("{message}")]
    ValidationFailed { job_id: String, message: String },

    /// The access key was missing or rejected.
    #[error("Authorization failed: {source}")]
    Unauthorized {
        job_id: String,
        #[source]
        source: UploadError,
    },

    /// Another job is still running on this orchestrator.
    #[error("Another job is already in progress")]
    Busy,

    #[error("Job '{job_id}' was cancelled")]
    Cancelled { job_id: String },

    /// Failed to set up the job (work directory, log file).
    #[error("Job '{job_id}' setup failed: {message}")]
    SetupFailed { job_id: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        job_id: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_id: job_id.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(job_id: impl Into<String>, source: UploadError) -> Self {
        Self::Unauthorized {
            job_id: job_id.into(),
            source,
        }
    }

    pub fn setup_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(job_id: impl Into<String>) -> Self {
        Self::Cancelled {
            job_id: job_id.into(),
        }
    }

    /// Whether the job never left `Idle`.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. } | Self::Busy)
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The identifier could not be built from the job's results.
    #[error("Encoding error: {0}")]
    Encoding(#[from] IdentifierError),

    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A phase change the state machine does not allow.
    #[error("Invalid phase transition {from} -> {to}")]
    InvalidTransition { from: JobPhase, to: JobPhase },

    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }
}

pub type StepResult<T> = Result<T, StepError>;

pub type PipelineResult<T> = Result<T, PipelineError>;
