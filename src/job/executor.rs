//! # Executor de Jobs
//! src/job/executor.rs
//!
//! Fachada pública: dueño del pool, nombra los jobs y expone submit,
//! end_submit, await_complete, cancel y las estadísticas.

use crate::error::{JobError, Result};
use crate::job::observer::{ErrorPolicy, JobObserver, JobSnapshot};
use crate::pool::{PoolConfig, TaskHandle, WorkerPool};
use crate::stats::{JobStatistics, StatFormatter, StatisticsHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuración del Executor
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub pool: PoolConfig,

    /// Política por defecto para jobs nuevos
    pub error_policy: ErrorPolicy,
}

impl ExecutorConfig {
    /// Crea una configuración desde el Config principal
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            pool: PoolConfig::from_config(config),
            error_policy: if config.fail_fast {
                ErrorPolicy::FailFast
            } else {
                ErrorPolicy::Tolerate
            },
        }
    }
}

/// Executor basado en jobs sobre un pool acotado
#[derive(Clone)]
pub struct JobExecutor {
    pool: Arc<WorkerPool>,
    default_policy: ErrorPolicy,

    /// Secuencia para los nombres `job-<n>`
    number: Arc<AtomicU64>,
}

impl JobExecutor {
    /// Crea un executor con su propio pool
    pub fn create(min_workers: usize, max_workers: usize) -> Result<Self> {
        Self::with_config(ExecutorConfig {
            pool: PoolConfig::with_workers(min_workers, max_workers),
            ..ExecutorConfig::default()
        })
    }

    pub fn with_config(config: ExecutorConfig) -> Result<Self> {
        let pool = WorkerPool::with_config(config.pool)?;
        Ok(Self {
            pool: Arc::new(pool),
            default_policy: config.error_policy,
            number: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Reutiliza un pool existente (varios executors pueden compartirlo)
    pub fn from_pool(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            default_policy: ErrorPolicy::default(),
            number: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    fn generate_job_name(&self) -> String {
        format!("job-{}", self.number.fetch_add(1, Ordering::Relaxed))
    }

    /// Builder para jobs con nombre, callback o política propios
    pub fn job_builder<T: Send + 'static>(&self) -> JobBuilder<'_, T> {
        JobBuilder {
            executor: self,
            name: None,
            callback: None,
            policy: self.default_policy,
        }
    }

    /// Crea un job en Init, sin arrancar. Permite definir el callback con
    /// `JobObserver::set_callback` antes de `start_job`
    pub fn create_job<T: Send + 'static>(&self, name: Option<&str>) -> JobObserver<T> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.generate_job_name());
        JobObserver::new(name, self.default_policy)
    }

    /// Init -> Running: arranca el observer loop
    pub fn start_job<T: Send + 'static>(&self, job: &JobObserver<T>) -> Result<()> {
        job.start()
    }

    /// Comienza un job sin callback y con nombre generado
    pub fn begin_job<T: Send + 'static>(&self) -> Result<JobObserver<T>> {
        self.job_builder().begin()
    }

    pub fn begin_job_named<T: Send + 'static>(&self, name: &str) -> Result<JobObserver<T>> {
        self.job_builder().name(name).begin()
    }

    /// Comienza un job cuyo callback se invoca con cada resultado, en orden
    /// de submit
    pub fn begin_job_with_callback<T, F>(&self, callback: F) -> Result<JobObserver<T>>
    where
        T: Send + 'static,
        F: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        self.job_builder().callback(callback).begin()
    }

    pub fn begin_job_with_callback_named<T, F>(
        &self,
        callback: F,
        name: &str,
    ) -> Result<JobObserver<T>>
    where
        T: Send + 'static,
        F: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        self.job_builder().name(name).callback(callback).begin()
    }

    /// Envía una unidad de trabajo al job.
    ///
    /// Falla con `AdmissionRejected` (sin efectos) si el job ya no acepta
    /// submits. Bloquea mientras la cola del pool esté llena.
    pub fn submit_with_observer<T, F>(&self, job: &JobObserver<T>, work: F) -> Result<()>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        job.dispatch(&self.pool, work)
    }

    /// Variante para unidades sin valor de retorno
    pub fn submit_runnable<F>(&self, job: &JobObserver<()>, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        job.dispatch(&self.pool, move || {
            work();
            Ok(())
        })
    }

    /// Submit directo al pool, sin job
    pub fn submit<T, F>(&self, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.pool.submit(work)
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.execute(f)
    }

    /// Termina de enviar trabajo al job
    pub fn end_submit<T: Send + 'static>(&self, job: &JobObserver<T>) -> Result<()> {
        job.end_submit()
    }

    /// `end_submit` y espera a que el observer loop termine.
    ///
    /// Retorna la primera falla registrada como error; si no hubo fallas
    /// (incluido un job cancelado) retorna la foto final.
    pub fn await_complete<T: Send + 'static>(&self, job: &JobObserver<T>) -> Result<JobSnapshot> {
        job.end_submit()?;
        job.wait_finished();
        match job.take_failures().into_iter().next() {
            Some(first) => Err(first),
            None => Ok(job.snapshot()),
        }
    }

    /// Como `await_complete`, pero cada falla se entrega a `on_error` en el
    /// orden en que se observó
    pub fn await_complete_with<T, E>(&self, job: &JobObserver<T>, mut on_error: E) -> JobSnapshot
    where
        T: Send + 'static,
        E: FnMut(JobError),
    {
        if let Err(e) = job.end_submit() {
            on_error(e);
        }
        job.wait_finished();
        for failure in job.take_failures() {
            on_error(failure);
        }
        job.snapshot()
    }

    /// Espera acotada. `Ok(None)` si vence el plazo
    pub fn await_complete_timeout<T: Send + 'static>(
        &self,
        job: &JobObserver<T>,
        timeout: Duration,
    ) -> Result<Option<JobSnapshot>> {
        job.end_submit()?;
        if !job.wait_finished_timeout(timeout) {
            return Ok(None);
        }
        match job.take_failures().into_iter().next() {
            Some(first) => Err(first),
            None => Ok(Some(job.snapshot())),
        }
    }

    /// Cancela el job (best-effort). Retorna false si ya había terminado
    pub fn cancel<T: Send + 'static>(&self, job: &JobObserver<T>) -> bool {
        job.cancel()
    }

    /// Arranca el reporter de estadísticas del job
    pub fn start_statistics<T>(
        &self,
        job: &JobObserver<T>,
        interval: Duration,
        total: Option<u64>,
        formatter: Option<Box<dyn StatFormatter>>,
    ) -> Result<StatisticsHandle> {
        let mut stats = JobStatistics::new(job.progress()).interval(interval);
        if let Some(total) = total {
            stats = stats.total(total);
        }
        if let Some(formatter) = formatter {
            stats = stats.formatter(formatter);
        }
        stats.start()
    }
}

/// Builder de jobs
pub struct JobBuilder<'a, T> {
    executor: &'a JobExecutor,
    name: Option<String>,
    callback: Option<crate::job::JobCallback<T>>,
    policy: ErrorPolicy,
}

impl<T: Send + 'static> JobBuilder<'_, T> {
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Crea el job en Init sin arrancarlo
    pub fn build(self) -> Result<JobObserver<T>> {
        let name = self
            .name
            .unwrap_or_else(|| self.executor.generate_job_name());
        let job = JobObserver::new(name, self.policy);
        if let Some(callback) = self.callback {
            job.set_callback(callback)?;
        }
        Ok(job)
    }

    /// Crea el job y lo pasa a Running
    pub fn begin(self) -> Result<JobObserver<T>> {
        let job = self.build()?;
        job.start()?;
        Ok(job)
    }
}
