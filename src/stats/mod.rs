//! # Estadísticas de Jobs
//! src/stats/mod.rs
//!
//! Reporter periódico de progreso:
//! - Velocidad (completados por segundo)
//! - Contadores del job
//! - Porcentaje y ETA cuando se conoce el total

pub mod format;
pub mod reporter;

pub use format::{format_duration, JsonFormatter, StandardFormatter, StatFormatter, StatSample};
pub use reporter::{JobStatistics, StatisticsHandle, DEFAULT_INTERVAL};
