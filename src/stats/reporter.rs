//! # Reporter de Estadísticas
//! src/stats/reporter.rs
//!
//! Muestreador periódico en segundo plano: lee los contadores del job cada
//! `interval`, calcula velocidad y ETA y emite una línea por el formateador.
//! Emite una última muestra cuando el job llega a un estado terminal.

use crate::error::{JobError, Result};
use crate::job::JobProgress;
use crate::stats::format::{StandardFormatter, StatFormatter, StatSample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Intervalo por defecto entre muestras
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Builder del reporter
pub struct JobStatistics {
    progress: JobProgress,
    total: Option<u64>,
    interval: Duration,
    formatter: Option<Box<dyn StatFormatter>>,
}

impl JobStatistics {
    pub fn new(progress: JobProgress) -> Self {
        Self {
            progress,
            total: None,
            interval: DEFAULT_INTERVAL,
            formatter: None,
        }
    }

    /// Total esperado de unidades, habilita porcentaje y ETA
    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn formatter(mut self, formatter: Box<dyn StatFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Arranca el thread del reporter. No impide que el proceso termine
    pub fn start(self) -> Result<StatisticsHandle> {
        if self.interval.is_zero() {
            return Err(JobError::InvalidConfig(
                "statistics interval must be > 0".to_string(),
            ));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let name = format!("stats-{}", self.progress.name());
        let formatter = self
            .formatter
            .unwrap_or_else(|| Box::new(StandardFormatter));
        let sampler = Sampler {
            progress: self.progress,
            total: self.total,
            interval: self.interval,
            formatter,
            stop: Arc::clone(&stop),
        };

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || sampler.run())
            .map_err(JobError::Spawn)?;

        Ok(StatisticsHandle {
            handle: Some(handle),
            stop,
        })
    }
}

struct Sampler {
    progress: JobProgress,
    total: Option<u64>,
    interval: Duration,
    formatter: Box<dyn StatFormatter>,
    stop: Arc<AtomicBool>,
}

impl Sampler {
    fn run(self) {
        debug!(job = %self.progress.name(), interval_ms = self.interval.as_millis() as u64, "statistics started");

        let mut previous_completed = self.progress.completed();
        let mut last_tick = Instant::now();

        loop {
            // Última muestra sólo cuando el loop del job terminó
            let finished = self.progress.wait_finished_timeout(self.interval);
            let last = finished || self.stop.load(Ordering::SeqCst);

            let now = Instant::now();
            let sample = StatSample::capture(
                &self.progress,
                previous_completed,
                now.duration_since(last_tick),
                self.total,
                last,
            );
            last_tick = now;
            previous_completed = sample.completed;

            self.formatter.emit(&self.formatter.format(&sample));

            if last {
                break;
            }
        }

        debug!(job = %self.progress.name(), "statistics stopped");
    }
}

/// Handle al reporter en segundo plano
pub struct StatisticsHandle {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl StatisticsHandle {
    /// Pide al reporter que emita su última muestra en el próximo tick
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Espera a que el reporter emita su última muestra
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("statistics thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}
