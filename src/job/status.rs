//! # Estados de un Job
//! src/job/status.rs
//!
//! Máquina de estados explícita:
//!
//! ```text
//! Init -> Running -> EndSubmit -> Complete
//!            |           |
//!            +-----------+--> Cancelled | Error | CallbackError
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Estado de un job. El orden de los discriminantes es significativo
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum JobStatus {
    /// Creado, el observer loop todavía no arrancó
    Init = 1,

    /// Aceptando submits y drenando resultados
    Running = 2,

    /// Ya no acepta submits, drenando lo pendiente
    EndSubmit = 3,

    /// Cancelado por el usuario
    Cancelled = 4,

    /// Falla de una unidad (política fail-fast) o del observer
    Error = 5,

    /// El callback falló
    CallbackError = 6,

    /// Todos los resultados fueron entregados
    Complete = 7,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Init => "INIT",
            JobStatus::Running => "RUNNING",
            JobStatus::EndSubmit => "END_SUBMIT",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Error => "ERROR",
            JobStatus::CallbackError => "CALLBACK_ERROR",
            JobStatus::Complete => "COMPLETE",
        }
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    fn from_ordinal(value: u8) -> Self {
        match value {
            1 => JobStatus::Init,
            2 => JobStatus::Running,
            3 => JobStatus::EndSubmit,
            4 => JobStatus::Cancelled,
            5 => JobStatus::Error,
            6 => JobStatus::CallbackError,
            _ => JobStatus::Complete,
        }
    }

    /// Un estado terminal no vuelve a cambiar
    pub fn is_terminal(&self) -> bool {
        *self >= JobStatus::Cancelled
    }

    /// Sólo Init y Running aceptan submits
    pub fn accepts_submissions(&self) -> bool {
        *self <= JobStatus::Running
    }

    /// Terminal por falla (no por cancelación ni éxito)
    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::CallbackError)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado compartido entre threads, modificado sólo con operaciones atómicas
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub(crate) fn new(status: JobStatus) -> Self {
        Self(AtomicU8::new(status.ordinal()))
    }

    pub(crate) fn load(&self) -> JobStatus {
        JobStatus::from_ordinal(self.0.load(Ordering::SeqCst))
    }

    /// Transición condicionada: aplica `to` sólo si `allowed(actual)`.
    /// Retorna el estado previo en caso de éxito o el actual si se rechazó.
    pub(crate) fn transition<P>(&self, to: JobStatus, allowed: P) -> Result<JobStatus, JobStatus>
    where
        P: Fn(JobStatus) -> bool,
    {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            let status = JobStatus::from_ordinal(current);
            if !allowed(status) {
                return Err(status);
            }
            match self.0.compare_exchange(
                current,
                to.ordinal(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(status),
                Err(actual) => current = actual,
            }
        }
    }

    /// Mueve a un estado terminal salvo que ya haya uno
    pub(crate) fn finish(&self, to: JobStatus) -> JobStatus {
        match self.transition(to, |s| !s.is_terminal()) {
            Ok(_) => to,
            Err(existing) => existing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(JobStatus::Init < JobStatus::Running);
        assert!(JobStatus::Running < JobStatus::EndSubmit);
        assert!(JobStatus::EndSubmit < JobStatus::Cancelled);
        assert!(JobStatus::CallbackError < JobStatus::Complete);
    }

    #[test]
    fn test_terminal_and_admission() {
        assert!(JobStatus::Init.accepts_submissions());
        assert!(JobStatus::Running.accepts_submissions());
        assert!(!JobStatus::EndSubmit.accepts_submissions());
        assert!(!JobStatus::EndSubmit.is_terminal());

        for s in [
            JobStatus::Cancelled,
            JobStatus::Error,
            JobStatus::CallbackError,
            JobStatus::Complete,
        ] {
            assert!(s.is_terminal());
            assert!(!s.accepts_submissions());
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&JobStatus::CallbackError).unwrap();
        assert_eq!(json, r#""CALLBACK_ERROR""#);
        let back: JobStatus = serde_json::from_str(r#""END_SUBMIT""#).unwrap();
        assert_eq!(back, JobStatus::EndSubmit);
        assert_eq!(JobStatus::EndSubmit.to_string(), "END_SUBMIT");
    }

    #[test]
    fn test_ordinal_roundtrip() {
        for s in [JobStatus::Init, JobStatus::Running, JobStatus::Complete] {
            assert_eq!(JobStatus::from_ordinal(s.ordinal()), s);
        }
    }

    #[test]
    fn test_atomic_transition() {
        let status = AtomicStatus::new(JobStatus::Init);
        assert_eq!(
            status.transition(JobStatus::Running, |s| s == JobStatus::Init),
            Ok(JobStatus::Init)
        );
        assert_eq!(
            status.transition(JobStatus::Running, |s| s == JobStatus::Init),
            Err(JobStatus::Running)
        );
        assert_eq!(status.load(), JobStatus::Running);
    }

    #[test]
    fn test_finish_keeps_first_terminal() {
        let status = AtomicStatus::new(JobStatus::Running);
        assert_eq!(status.finish(JobStatus::Cancelled), JobStatus::Cancelled);
        assert_eq!(status.finish(JobStatus::Complete), JobStatus::Cancelled);
        assert_eq!(status.load(), JobStatus::Cancelled);
    }
}
