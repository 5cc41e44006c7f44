//! # Pool de Workers Acotado
//! src/pool/worker.rs
//!
//! Pool de threads de tamaño fijo que drena una cola acotada. Cuando la cola
//! está llena el pool crece hasta `max_workers`; si aun así no hay espacio, el
//! thread que hace submit queda bloqueado (backpressure).

use crate::error::{JobError, Result, TaskError};
use crate::pool::handle::TaskHandle;
use crate::pool::queue::BoundedQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Configuración del pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Workers que se arrancan de inmediato y nunca se retiran
    pub min_workers: usize,

    /// Máximo de workers vivos
    pub max_workers: usize,

    /// Capacidad de la cola de trabajo
    pub queue_capacity: usize,

    /// Tiempo ocioso tras el cual se retira un worker extra
    pub keep_alive: Duration,

    /// Prefijo para el nombre de los threads
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self::with_workers(cpus, cpus)
    }
}

impl PoolConfig {
    /// Configuración con la capacidad de cola por defecto (`max_workers * 10`)
    pub fn with_workers(min_workers: usize, max_workers: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            queue_capacity: max_workers.saturating_mul(10),
            keep_alive: Duration::from_secs(60),
            thread_name_prefix: "jobpool-worker".to_string(),
        }
    }

    /// Crea la configuración del pool desde el Config principal
    pub fn from_config(config: &crate::config::Config) -> Self {
        let mut pool = Self::with_workers(config.min_workers, config.max_workers);
        if config.queue_capacity > 0 {
            pool.queue_capacity = config.queue_capacity;
        }
        pool.keep_alive = Duration::from_millis(config.keep_alive_ms);
        pool
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_workers == 0 {
            return Err(JobError::InvalidConfig(
                "min workers must be >= 1".to_string(),
            ));
        }
        if self.min_workers > self.max_workers {
            return Err(JobError::InvalidConfig(format!(
                "min workers ({}) must be <= max workers ({})",
                self.min_workers, self.max_workers
            )));
        }
        if self.queue_capacity == 0 {
            return Err(JobError::InvalidConfig(
                "queue capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unidad encolada: cómo ejecutarla y cómo abortarla si nunca corre
struct Task {
    run: Box<dyn FnOnce() + Send>,
    abort: Box<dyn FnOnce() + Send>,
}

impl Task {
    fn new<T, F>(handle: TaskHandle<T>, work: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let run_handle = handle.clone();
        let run = Box::new(move || {
            if !run_handle.try_start() {
                return;
            }
            let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(payload) => Err(TaskError::from_panic(payload)),
            };
            run_handle.complete(result);
        });
        let abort = Box::new(move || {
            handle.cancel();
        });
        Self { run, abort }
    }
}

/// Pool de workers con admisión bloqueante
pub struct WorkerPool {
    config: PoolConfig,

    /// Cola de trabajo compartida por todos los workers
    queue: BoundedQueue<Task>,

    /// Workers vivos actualmente
    live_workers: Arc<AtomicUsize>,

    /// Secuencia para nombrar threads
    next_worker_id: AtomicUsize,

    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Crea un pool con `min_workers` threads iniciales
    pub fn new(min_workers: usize, max_workers: usize) -> Result<Self> {
        Self::with_config(PoolConfig::with_workers(min_workers, max_workers))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            queue: BoundedQueue::new(config.queue_capacity),
            live_workers: Arc::new(AtomicUsize::new(0)),
            next_worker_id: AtomicUsize::new(0),
            handles: Mutex::new(Vec::with_capacity(config.max_workers)),
            config,
        };

        for _ in 0..pool.config.min_workers {
            pool.live_workers.fetch_add(1, Ordering::SeqCst);
            pool.spawn_worker(None)?;
        }

        debug!(
            min = pool.config.min_workers,
            max = pool.config.max_workers,
            queue_capacity = pool.config.queue_capacity,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Arranca un worker. `keep_alive` es `Some` para workers extra.
    /// El contador de workers vivos ya fue incrementado por quien llama.
    fn spawn_worker(&self, keep_alive: Option<Duration>) -> Result<()> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.config.thread_name_prefix, id);
        let queue = self.queue.clone();
        let live = Arc::clone(&self.live_workers);

        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::worker_loop(name, queue, live, keep_alive));

        match spawned {
            Ok(handle) => {
                let mut handles = self.handles.lock().unwrap_or_else(|p| p.into_inner());
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
                Ok(())
            }
            Err(e) => {
                self.live_workers.fetch_sub(1, Ordering::SeqCst);
                Err(JobError::Spawn(e))
            }
        }
    }

    /// Loop principal del worker
    fn worker_loop(
        name: String,
        queue: BoundedQueue<Task>,
        live: Arc<AtomicUsize>,
        keep_alive: Option<Duration>,
    ) {
        trace!(worker = %name, "worker started");

        loop {
            let task = match keep_alive {
                None => queue.dequeue(),
                Some(idle) => queue.dequeue_timeout(idle),
            };
            match task {
                Some(task) => (task.run)(),
                None => break,
            }
        }

        live.fetch_sub(1, Ordering::SeqCst);
        trace!(worker = %name, "worker exiting");
    }

    /// Agrega un worker extra si todavía hay margen hasta `max_workers`
    fn grow(&self) {
        let mut live = self.live_workers.load(Ordering::SeqCst);
        while live < self.config.max_workers {
            match self.live_workers.compare_exchange(
                live,
                live + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    if let Err(e) = self.spawn_worker(Some(self.config.keep_alive)) {
                        warn!(error = %e, "could not spawn extra worker");
                    }
                    return;
                }
                Err(current) => live = current,
            }
        }
    }

    fn admit(&self, task: Task) {
        if self.queue.is_full() {
            self.grow();
        }
        if let Err(task) = self.queue.enqueue(task) {
            debug!("pool is shut down, refusing work");
            (task.abort)();
        }
    }

    /// Envía una unidad de trabajo y retorna su handle.
    ///
    /// Bloquea mientras la cola esté llena. Si el pool ya fue apagado, el
    /// handle retornado está cancelado.
    pub fn submit<T, F>(&self, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let handle = TaskHandle::new();
        self.admit(Task::new(handle.clone(), work));
        handle
    }

    /// Ejecuta un closure sin interés en su resultado
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle: TaskHandle<()> = TaskHandle::new();
        self.admit(Task::new(handle, move || {
            f();
            Ok(())
        }));
    }

    /// Cierra la cola, deja terminar lo encolado y espera a los workers
    pub fn shutdown(&self) {
        self.queue.close();
        self.join_workers();
    }

    /// Como `shutdown`, pero cancela todo lo que no empezó
    pub fn shutdown_now(&self) {
        self.queue.close();
        let pending = self.queue.drain();
        if !pending.is_empty() {
            debug!(count = pending.len(), "cancelling queued work");
        }
        for task in pending {
            (task.abort)();
        }
        self.join_workers();
    }

    fn join_workers(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(|p| p.into_inner());
            guard.drain(..).collect()
        };
        let current = thread::current().id();
        for handle in handles {
            // Un worker que apaga su propio pool no puede esperarse a sí mismo
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.max_capacity()
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    fn wait_gate(gate: Arc<AtomicBool>) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static {
        move || {
            while !gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = WorkerPool::new(2, 2).unwrap();
        let handle = pool.submit(|| Ok(21 * 2));
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_work_error_is_reported() {
        let pool = WorkerPool::new(1, 1).unwrap();
        let handle: TaskHandle<()> = pool.submit(|| Err(anyhow::anyhow!("bad input")));
        match handle.wait() {
            Err(TaskError::Failed(e)) => assert_eq!(e.to_string(), "bad input"),
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 1).unwrap();
        let bad: TaskHandle<u32> = pool.submit(|| panic!("boom"));
        assert!(matches!(bad.wait(), Err(TaskError::Panicked(_))));

        let good = pool.submit(|| Ok(5));
        assert_eq!(good.wait().unwrap(), 5);
        assert_eq!(pool.live_workers(), 1);
    }

    #[test]
    fn test_submit_blocks_when_queue_full() {
        let mut config = PoolConfig::with_workers(1, 1);
        config.queue_capacity = 1;
        let pool = Arc::new(WorkerPool::with_config(config).unwrap());

        let gate = Arc::new(AtomicBool::new(false));

        // Uno corriendo, uno en cola: la cola queda llena
        let first = pool.submit(wait_gate(Arc::clone(&gate)));
        thread::sleep(Duration::from_millis(30));
        let second = pool.submit(wait_gate(Arc::clone(&gate)));

        let submitted = Arc::new(AtomicBool::new(false));
        let producer = {
            let pool = Arc::clone(&pool);
            let submitted = Arc::clone(&submitted);
            thread::spawn(move || {
                let h = pool.submit(|| Ok(()));
                submitted.store(true, Ordering::SeqCst);
                h
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!submitted.load(Ordering::SeqCst), "submit should block on a full queue");

        gate.store(true, Ordering::SeqCst);
        let third = producer.join().unwrap();
        assert!(first.wait().is_ok());
        assert!(second.wait().is_ok());
        assert!(third.wait().is_ok());
    }

    #[test]
    fn test_grows_up_to_max_workers() {
        let mut config = PoolConfig::with_workers(1, 3);
        config.queue_capacity = 1;
        let pool = WorkerPool::with_config(config).unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                pool.submit(|| {
                    thread::sleep(Duration::from_millis(50));
                    Ok(())
                })
            })
            .collect();

        assert!(pool.live_workers() > 1);
        assert!(pool.live_workers() <= 3);
        for h in handles {
            h.wait().unwrap();
        }
    }

    #[test]
    fn test_extra_workers_retire() {
        let mut config = PoolConfig::with_workers(1, 2);
        config.queue_capacity = 1;
        config.keep_alive = Duration::from_millis(50);
        let pool = WorkerPool::with_config(config).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                pool.submit(|| {
                    thread::sleep(Duration::from_millis(20));
                    Ok(())
                })
            })
            .collect();
        for h in handles {
            h.wait().unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.live_workers() > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(pool.live_workers(), 1);
    }

    #[test]
    fn test_submit_after_shutdown_is_cancelled() {
        let pool = WorkerPool::new(1, 1).unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());
        let handle = pool.submit(|| Ok(1));
        assert!(matches!(handle.wait(), Err(TaskError::Cancelled)));
    }

    #[test]
    fn test_shutdown_now_cancels_queued() {
        let mut config = PoolConfig::with_workers(1, 1);
        config.queue_capacity = 10;
        let pool = WorkerPool::with_config(config).unwrap();

        let slow = pool.submit(|| {
            thread::sleep(Duration::from_millis(100));
            Ok(0)
        });
        thread::sleep(Duration::from_millis(20));
        let queued: Vec<_> = (1..5).map(|i| pool.submit(move || Ok(i))).collect();

        pool.shutdown_now();
        assert_eq!(slow.wait().unwrap(), 0);
        for h in queued {
            assert!(matches!(h.wait(), Err(TaskError::Cancelled)));
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(WorkerPool::new(0, 2).is_err());
        assert!(WorkerPool::new(4, 2).is_err());

        let mut config = PoolConfig::with_workers(1, 1);
        config.queue_capacity = 0;
        assert!(WorkerPool::with_config(config).is_err());
    }

    #[test]
    fn test_default_queue_capacity() {
        let config = PoolConfig::with_workers(2, 4);
        assert_eq!(config.queue_capacity, 40);
        assert!(config.validate().is_ok());
    }
}
