//! # jobpool
//! src/lib.rs
//!
//! Ejecutor de jobs sobre un pool de workers acotado. Un job agrupa unidades
//! de trabajo; sus resultados se entregan a un callback en el mismo orden en
//! que se enviaron, aunque terminen en otro orden.
//!
//! ## Arquitectura
//!
//! - `pool`: pool de threads con cola acotada y backpressure
//! - `job`: estados, observer, observer loop y el `JobExecutor`
//! - `stats`: reporter periódico de progreso
//! - `text`: lectura de líneas con encoding y unión de secuencias
//! - `commands`: tareas por línea del binario
//! - `config`: configuración CLI / entorno
//! - `error`: errores del pool y de los jobs
//!
//! ## Ejemplo de uso
//!
//! ```rust
//! use jobpool::job::{JobExecutor, JobObserver, JobStatus};
//! use std::sync::{Arc, Mutex};
//!
//! let executor = JobExecutor::create(2, 4).unwrap();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! let job: JobObserver<usize> = executor
//!     .begin_job_with_callback(move |i| {
//!         sink.lock().unwrap().push(i);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! for i in 0..10 {
//!     executor.submit_with_observer(&job, move || Ok(i)).unwrap();
//! }
//!
//! let snapshot = executor.await_complete(&job).unwrap();
//! assert_eq!(snapshot.status, JobStatus::Complete);
//! assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod job;
pub mod pool;
pub mod stats;
pub mod text;

pub use error::{JobError, Result, TaskError};
pub use job::{ErrorPolicy, JobExecutor, JobObserver, JobSnapshot, JobStatus};
pub use pool::{TaskHandle, WorkerPool};
