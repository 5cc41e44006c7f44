//! # Pool de Workers
//!
//! Pool de threads acotado con admisión bloqueante:
//! - `queue`: cola FIFO acotada (backpressure)
//! - `handle`: handle tipo future al resultado de cada unidad
//! - `worker`: los threads y la política de crecimiento

pub mod handle;
pub mod queue;
pub mod worker;

pub use handle::TaskHandle;
pub use queue::BoundedQueue;
pub use worker::{PoolConfig, WorkerPool};
