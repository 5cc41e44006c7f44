//! # Formato de Estadísticas
//! src/stats/format.rs
//!
//! Muestra de progreso de un job y los formateadores que la convierten en
//! texto: una línea legible por humanos o JSON.

use crate::job::{JobProgress, JobStatus};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Una muestra del reporter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSample {
    pub job: String,
    pub status: JobStatus,
    pub submitted: u64,
    pub completed: u64,
    pub errored: u64,
    pub running: u64,
    pub awaiting: u64,

    /// Completados desde la muestra anterior
    pub interval_completed: u64,
    pub interval_ms: u64,

    /// Completados por segundo en el último intervalo
    pub throughput: f64,
    pub elapsed_ms: u64,

    /// Sólo si se conoce el total de unidades
    pub total: Option<u64>,
    pub percent: Option<f64>,
    pub eta_ms: Option<u64>,

    /// Última muestra (el job llegó a un estado terminal)
    pub last: bool,
}

impl StatSample {
    /// Lee los contadores del job y calcula velocidad, porcentaje y ETA
    pub fn capture(
        progress: &JobProgress,
        previous_completed: u64,
        interval: Duration,
        total: Option<u64>,
        last: bool,
    ) -> Self {
        let completed = progress.completed();
        let interval_completed = completed.saturating_sub(previous_completed);
        let secs = interval.as_secs_f64();
        let throughput = if secs > 0.0 {
            interval_completed as f64 / secs
        } else {
            0.0
        };

        let percent = total.map(|t| {
            if t == 0 {
                100.0
            } else {
                completed as f64 / t as f64 * 100.0
            }
        });
        let eta_ms = total.and_then(|t| {
            let remaining = t.saturating_sub(completed);
            if remaining == 0 {
                Some(0)
            } else if throughput > 0.0 {
                Some((remaining as f64 / throughput * 1000.0) as u64)
            } else {
                None
            }
        });

        Self {
            job: progress.name().to_string(),
            status: progress.status(),
            submitted: progress.submitted(),
            completed,
            errored: progress.errored(),
            running: progress.running(),
            awaiting: progress.awaiting(),
            interval_completed,
            interval_ms: interval.as_millis() as u64,
            throughput,
            elapsed_ms: progress.elapsed().as_millis() as u64,
            total,
            percent,
            eta_ms,
            last,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn eta(&self) -> Option<Duration> {
        self.eta_ms.map(Duration::from_millis)
    }
}

/// Convierte muestras en texto y las emite
pub trait StatFormatter: Send {
    fn format(&self, sample: &StatSample) -> String;

    /// Por defecto se emite como evento de tracing
    fn emit(&self, line: &str) {
        info!(target: "jobpool::stats", "{}", line);
    }
}

impl<F> StatFormatter for F
where
    F: Fn(&StatSample) -> String + Send,
{
    fn format(&self, sample: &StatSample) -> String {
        self(sample)
    }
}

/// Formatea una duración en segundos, minutos u horas
pub fn format_duration(duration: Duration) -> String {
    let s = duration.as_secs_f64();
    if s > 60.0 {
        let m = s / 60.0;
        if m > 60.0 {
            format!("{:.2}h", m / 60.0)
        } else {
            format!("{:.2}min", m)
        }
    } else {
        format!("{:.2}s", s)
    }
}

/// Línea legible por humanos
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormatter;

impl StatFormatter for StandardFormatter {
    fn format(&self, sample: &StatSample) -> String {
        let mut line = String::new();

        if sample.last {
            line.push_str(&format!("finished [{}] status: {}, ", sample.job, sample.status));
        } else {
            line.push_str(&format!("running [{}] ", sample.job));
        }

        if let Some(percent) = sample.percent {
            let eta = sample
                .eta()
                .map(format_duration)
                .unwrap_or_else(|| "unknown".to_string());
            line.push_str(&format!("progress: {:.2}%, eta: {}, ", percent, eta));
        }

        line.push_str(&format!(
            "speed: {:.2}/s, completed: {}, errored: {}, running: {}, awaiting: {}, elapsed: {}",
            sample.throughput,
            sample.completed,
            sample.errored,
            sample.running,
            sample.awaiting,
            format_duration(sample.elapsed()),
        ));
        line
    }
}

/// Una línea JSON por muestra
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl StatFormatter for JsonFormatter {
    fn format(&self, sample: &StatSample) -> String {
        serde_json::to_string(sample)
            .unwrap_or_else(|e| format!(r#"{{"error": "cannot serialize sample: {}"}}"#, e))
    }
}
