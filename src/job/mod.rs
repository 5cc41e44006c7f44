//! # Sistema de Jobs
//!
//! Agrupa unidades de trabajo en un job con nombre, observa su progreso y
//! entrega los resultados al callback en orden de submit.
//!
//! ## Componentes
//!
//! - `status`: máquina de estados del job
//! - `channel`: canal ordenado de handles y sentinelas
//! - `observer`: contadores, callback y handle del loop
//! - `observer_loop`: el consumidor que drena el canal
//! - `executor`: API pública

pub mod channel;
pub mod executor;
pub mod observer;
mod observer_loop;
pub mod status;

pub use channel::Completion;
pub use executor::{ExecutorConfig, JobBuilder, JobExecutor};
pub use observer::{ErrorPolicy, JobCallback, JobObserver, JobProgress, JobSnapshot};
pub use status::JobStatus;
