//! # Errores del Sistema de Jobs
//! src/error.rs
//!
//! Taxonomía de errores del pool y de los jobs.

use crate::job::JobStatus;
use thiserror::Error;

/// Resultado de la ejecución de una unidad de trabajo individual
#[derive(Error, Debug)]
pub enum TaskError {
    /// La unidad retornó un error
    #[error("work failed: {0:#}")]
    Failed(anyhow::Error),

    /// La unidad hizo panic (el worker sobrevive)
    #[error("work panicked: {0}")]
    Panicked(String),

    /// El handle fue cancelado antes de obtener un resultado
    #[error("work was cancelled")]
    Cancelled,
}

impl TaskError {
    /// Convierte el payload de un panic en un mensaje legible
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskError::Panicked(msg)
    }
}

/// Errores visibles para quien usa el executor
#[derive(Error, Debug)]
pub enum JobError {
    /// Submit después de end_submit / cancel / error
    #[error("job '{job}' does not accept submissions in status {status}")]
    AdmissionRejected { job: String, status: JobStatus },

    /// Operación no permitida en el estado actual
    #[error("cannot {action} job '{job}' in status {status}")]
    InvalidState {
        job: String,
        status: JobStatus,
        action: &'static str,
    },

    /// Una unidad de trabajo falló durante su ejecución
    #[error("job '{job}': unit #{index} failed: {source}")]
    WorkFailure {
        job: String,
        index: u64,
        #[source]
        source: TaskError,
    },

    /// El callback del job falló (fatal para el job)
    #[error("job '{job}': callback failed on unit #{index}: {source:#}")]
    CallbackFailure {
        job: String,
        index: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Falla interna drenando el canal de completados (fatal para el job)
    #[error("job '{job}': observer failure: {reason}")]
    ObserverFailure { job: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported or invalid text encoding: {0}")]
    Encoding(String),
}

impl JobError {
    /// Indica si el error termina el job (callback u observer)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JobError::CallbackFailure { .. } | JobError::ObserverFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
