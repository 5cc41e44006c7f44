//! # Observer de Job
//! src/job/observer.rs
//!
//! Estado vivo de un job: estado, contadores, canal de completados, callback
//! y el handle del observer loop. Todos los contadores son atómicos y sólo
//! se exponen a través de métodos.

use crate::error::{JobError, Result};
use crate::job::channel::{Completion, CompletionChannel};
use crate::job::observer_loop;
use crate::job::status::{AtomicStatus, JobStatus};
use crate::pool::WorkerPool;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Callback invocado una vez por resultado, en orden de submit
pub type JobCallback<T> = Box<dyn FnMut(T) -> anyhow::Result<()> + Send>;

/// Qué hacer cuando una unidad de trabajo falla
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Contar la falla en `errored` y seguir drenando
    #[default]
    Tolerate,

    /// Terminar el job en `Error` y cancelar lo pendiente
    FailFast,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn decrement(counter: &AtomicU64) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
}

/// Parte no genérica del job: nombre, estado, contadores y tiempos
pub(crate) struct JobState {
    name: String,
    pub(crate) status: AtomicStatus,

    submitted: AtomicU64,
    awaiting: AtomicU64,
    running: AtomicU64,
    completed: AtomicU64,
    errored: AtomicU64,

    /// Momento de la transición Init -> Running
    started: OnceLock<(Instant, SystemTime)>,

    /// Momento en que terminó el observer loop
    finished: OnceLock<Instant>,

    /// Latch que se libera cuando el observer loop termina
    done: Mutex<bool>,
    done_cv: Condvar,
}

/// Decrementa `running` al terminar la unidad, incluso si hizo panic
pub(crate) struct RunningGuard<'a> {
    state: &'a JobState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        decrement(&self.state.running);
    }
}

impl JobState {
    fn new(name: String) -> Self {
        Self {
            name,
            status: AtomicStatus::new(JobStatus::Init),
            submitted: AtomicU64::new(0),
            awaiting: AtomicU64::new(0),
            running: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            errored: AtomicU64::new(0),
            started: OnceLock::new(),
            finished: OnceLock::new(),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        }
    }

    /// Registra un submit y retorna su índice (orden de submit)
    fn begin_submit(&self) -> u64 {
        let index = self.submitted.fetch_add(1, Ordering::SeqCst);
        self.awaiting.fetch_add(1, Ordering::SeqCst);
        index
    }

    /// Justo antes de ejecutar: awaiting -> running
    pub(crate) fn unit_started(&self) -> RunningGuard<'_> {
        decrement(&self.awaiting);
        self.running.fetch_add(1, Ordering::SeqCst);
        RunningGuard { state: self }
    }

    /// Unidades canceladas antes de arrancar: salen de `awaiting`
    pub(crate) fn units_abandoned(&self, count: u64) {
        for _ in 0..count {
            decrement(&self.awaiting);
        }
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_errored(&self) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }

    /// Todo lo enviado ya fue observado por el loop
    pub(crate) fn all_observed(&self) -> bool {
        let observed = self.completed.load(Ordering::SeqCst) + self.errored.load(Ordering::SeqCst);
        observed == self.submitted.load(Ordering::SeqCst)
    }

    fn mark_started(&self) {
        let _ = self.started.set((Instant::now(), SystemTime::now()));
    }

    /// Libera el latch de terminación
    pub(crate) fn mark_done(&self) {
        let _ = self.finished.set(Instant::now());
        let mut done = lock(&self.done);
        *done = true;
        self.done_cv.notify_all();
    }

    fn is_done(&self) -> bool {
        *lock(&self.done)
    }

    fn wait_done(&self) {
        let mut done = lock(&self.done);
        while !*done {
            done = self
                .done_cv
                .wait(done)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Espera al latch como máximo `timeout`. Retorna true si se liberó
    fn wait_done_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = lock(&self.done);
        while !*done {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            done = self
                .done_cv
                .wait_timeout(done, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }

    fn elapsed(&self) -> Duration {
        match (self.started.get(), self.finished.get()) {
            (Some((start, _)), Some(end)) => end.saturating_duration_since(*start),
            (Some((start, _)), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            name: self.name.clone(),
            status: self.status.load(),
            submitted: self.submitted.load(Ordering::SeqCst),
            awaiting: self.awaiting.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
            started_at_ms: self.started.get().map(|(_, wall)| {
                wall.duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0)
            }),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

/// Foto de los contadores de un job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub name: String,
    pub status: JobStatus,
    pub submitted: u64,
    pub awaiting: u64,
    pub running: u64,
    pub completed: u64,
    pub errored: u64,
    /// Epoch en milisegundos del arranque, si ya arrancó
    pub started_at_ms: Option<u64>,
    pub elapsed_ms: u64,
}

impl JobSnapshot {
    /// Unidades enviadas que todavía no fueron observadas
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.errored)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Vista de sólo lectura del progreso de un job, independiente del tipo
/// de resultado. Es lo que consume el reporter de estadísticas.
#[derive(Clone)]
pub struct JobProgress {
    state: Arc<JobState>,
}

impl JobProgress {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn status(&self) -> JobStatus {
        self.state.status.load()
    }

    pub fn submitted(&self) -> u64 {
        self.state.submitted.load(Ordering::SeqCst)
    }

    pub fn awaiting(&self) -> u64 {
        self.state.awaiting.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> u64 {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::SeqCst)
    }

    pub fn errored(&self) -> u64 {
        self.state.errored.load(Ordering::SeqCst)
    }

    /// Tiempo desde el arranque (congelado cuando el loop termina)
    pub fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.state.snapshot()
    }

    /// Espera a que el observer loop termine, como máximo `timeout`
    pub fn wait_finished_timeout(&self, timeout: Duration) -> bool {
        self.state.wait_done_timeout(timeout)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_done()
    }
}

impl std::fmt::Debug for JobProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobProgress")
            .field("name", &self.state.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Parte genérica: canal, callback, fallas y el loop
struct ObserverInner<T> {
    channel: CompletionChannel<T>,
    callback: Mutex<Option<JobCallback<T>>>,
    policy: ErrorPolicy,

    /// Serializa submits y end_submit para que el orden del canal sea el
    /// orden de submit y el sentinela quede detrás de todo lo aceptado
    admission: Mutex<()>,

    /// Fallas observadas por el loop, en orden
    failures: Mutex<Vec<JobError>>,

    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Handle del job: barato de clonar, compartido entre quien hace submit,
/// el pool y el observer loop
pub struct JobObserver<T> {
    state: Arc<JobState>,
    inner: Arc<ObserverInner<T>>,
}

impl<T> Clone for JobObserver<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for JobObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobObserver")
            .field("name", &self.state.name)
            .field("status", &self.status())
            .field("pending", &self.inner.channel.len())
            .finish()
    }
}

impl<T> JobObserver<T> {
    /// Crea un job en estado Init
    pub(crate) fn new(name: String, policy: ErrorPolicy) -> Self {
        Self {
            state: Arc::new(JobState::new(name)),
            inner: Arc::new(ObserverInner {
                channel: CompletionChannel::new(),
                callback: Mutex::new(None),
                policy,
                admission: Mutex::new(()),
                failures: Mutex::new(Vec::new()),
                loop_handle: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn status(&self) -> JobStatus {
        self.state.status.load()
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.inner.policy
    }

    pub fn submitted(&self) -> u64 {
        self.state.submitted.load(Ordering::SeqCst)
    }

    pub fn awaiting(&self) -> u64 {
        self.state.awaiting.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> u64 {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::SeqCst)
    }

    pub fn errored(&self) -> u64 {
        self.state.errored.load(Ordering::SeqCst)
    }

    /// Momento (reloj de pared) en que el job pasó a Running
    pub fn start_time(&self) -> Option<SystemTime> {
        self.state.started.get().map(|(_, wall)| *wall)
    }

    pub fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.state.snapshot()
    }

    /// Vista no genérica para estadísticas
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            state: Arc::clone(&self.state),
        }
    }

    /// Indica si el observer loop ya terminó
    pub fn is_finished(&self) -> bool {
        self.state.is_done()
    }

    /// Define el callback. Sólo se permite mientras el job está en Init
    pub fn set_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        let mut slot = lock(&self.inner.callback);
        let status = self.status();
        if status != JobStatus::Init {
            return Err(JobError::InvalidState {
                job: self.state.name.clone(),
                status,
                action: "change the callback of",
            });
        }
        *slot = Some(Box::new(callback));
        Ok(())
    }

    pub(crate) fn take_callback(&self) -> Option<JobCallback<T>> {
        lock(&self.inner.callback).take()
    }

    pub(crate) fn state(&self) -> &JobState {
        &self.state
    }

    pub(crate) fn channel(&self) -> &CompletionChannel<T> {
        &self.inner.channel
    }

    pub(crate) fn record_failure(&self, failure: JobError) {
        lock(&self.inner.failures).push(failure);
    }

    /// Retira las fallas registradas hasta ahora
    pub(crate) fn take_failures(&self) -> Vec<JobError> {
        std::mem::take(&mut *lock(&self.inner.failures))
    }

    fn rejected(&self, status: JobStatus) -> JobError {
        JobError::AdmissionRejected {
            job: self.state.name.clone(),
            status,
        }
    }
}

impl<T: Send + 'static> JobObserver<T> {
    /// Init -> Running y arranca el observer loop
    pub(crate) fn start(&self) -> Result<()> {
        if let Err(status) = self
            .state
            .status
            .transition(JobStatus::Running, |s| s == JobStatus::Init)
        {
            return Err(JobError::InvalidState {
                job: self.state.name.clone(),
                status,
                action: "start",
            });
        }
        self.state.mark_started();

        match observer_loop::spawn(self.clone()) {
            Ok(handle) => {
                *lock(&self.inner.loop_handle) = Some(handle);
                debug!(job = %self.state.name, "job started");
                Ok(())
            }
            Err(e) => {
                self.state.status.finish(JobStatus::Error);
                self.abandon();
                Err(e)
            }
        }
    }

    /// Cierra el canal, cancela lo pendiente y libera el latch sin loop
    fn abandon(&self) {
        for item in self.inner.channel.close() {
            self.discard(&item);
        }
        self.state.mark_done();
    }

    /// Cancela un elemento que el loop nunca va a observar
    pub(crate) fn discard(&self, item: &Completion<T>) {
        if item.cancel() {
            self.state.units_abandoned(1);
        }
    }

    /// Envía una unidad al pool y agrega su handle al final del canal
    pub(crate) fn dispatch<F>(&self, pool: &WorkerPool, work: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let _admission = lock(&self.inner.admission);

        let status = self.status();
        if !status.accepts_submissions() {
            return Err(self.rejected(status));
        }

        let index = self.state.begin_submit();
        let state = Arc::clone(&self.state);
        let handle = pool.submit(move || {
            // Cancelado entre la admisión y el arranque: no corre
            if state.status.load() == JobStatus::Cancelled {
                state.units_abandoned(1);
                return Err(anyhow::anyhow!(crate::error::TaskError::Cancelled));
            }
            let _running = state.unit_started();
            work()
        });

        match self.inner.channel.push_back(Completion::Result {
            index,
            handle: handle.clone(),
        }) {
            // Cancelado mientras esperábamos lugar en el pool
            Err(refused) => self.discard(&refused),
            Ok(()) => {
                // Un cancel concurrente pudo recorrer el canal antes del push
                if self.status() == JobStatus::Cancelled && handle.cancel_unstarted() {
                    self.state.units_abandoned(1);
                }
            }
        }
        Ok(())
    }

    /// Marca el fin de los submits y agrega el sentinela al final del canal.
    /// Si el job seguía en Init, lo arranca para que el loop pueda drenar.
    pub(crate) fn end_submit(&self) -> Result<()> {
        let _admission = lock(&self.inner.admission);

        if self.status() == JobStatus::Init {
            match self.start() {
                Ok(()) => {}
                // Otro thread lo arrancó o lo canceló en el medio
                Err(JobError::InvalidState { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let moved = self
            .state
            .status
            .transition(JobStatus::EndSubmit, |s| s == JobStatus::Running);
        if moved.is_ok() {
            if let Err(refused) = self.inner.channel.push_back(Completion::EndOfSubmission) {
                self.discard(&refused);
            }
            debug!(job = %self.state.name, submitted = self.submitted(), "end of submission");
        }
        Ok(())
    }

    /// Cancela el job. Retorna false si ya estaba terminado
    pub(crate) fn cancel(&self) -> bool {
        match self.state.status.transition(JobStatus::Cancelled, |s| !s.is_terminal()) {
            Ok(JobStatus::Init) => {
                // Nunca arrancó: no hay loop que vea el sentinela
                self.abandon();
                debug!(job = %self.state.name, "job cancelled before start");
                true
            }
            Ok(_) => {
                if let Err(refused) = self.inner.channel.push_front(Completion::Cancel) {
                    self.discard(&refused);
                }
                // Lo que todavía no empezó ya no arranca
                let aborted = self.inner.channel.cancel_unstarted();
                self.state.units_abandoned(aborted);
                debug!(job = %self.state.name, aborted, "job cancellation requested");
                true
            }
            Err(_) => false,
        }
    }

    /// Bloquea hasta que el loop termine y lo une
    pub(crate) fn wait_finished(&self) {
        self.state.wait_done();
        self.join_loop();
    }

    pub(crate) fn wait_finished_timeout(&self, timeout: Duration) -> bool {
        if self.state.wait_done_timeout(timeout) {
            self.join_loop();
            true
        } else {
            false
        }
    }

    fn join_loop(&self) {
        let handle = lock(&self.inner.loop_handle).take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                tracing::error!(job = %self.state.name, "observer loop panicked");
            }
        }
    }
}
