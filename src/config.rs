//! # Configuración de jobpool
//! src/config.rs
//!
//! Configuración del binario con soporte para argumentos CLI y variables de
//! entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./jobpool --workers-min 2 \
//!   --workers-max 8 \
//!   --task grep --pattern 'ERROR' \
//!   --stat-interval-ms 2000 \
//!   access.log
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! JOBPOOL_WORKERS_MAX=16 JOBPOOL_TASK=hash ./jobpool data.txt
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Tarea aplicada a cada línea del input
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskKind {
    /// SHA-256 de la línea en hex
    Hash,
    /// Cantidad de matches de `--pattern`
    Grep,
    /// Cantidad de palabras
    Words,
    /// Suma de los enteros de la línea
    Sum,
}

/// Formato de la salida de estadísticas
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Configuración del ejecutor de jobs
#[derive(Debug, Clone, Parser)]
#[command(name = "jobpool")]
#[command(about = "Procesa un archivo línea por línea con un pool acotado, en orden")]
#[command(version = "0.1.0")]
pub struct Config {
    // === Workers ===

    /// Workers que el pool mantiene siempre vivos
    #[arg(long = "workers-min", default_value = "4", env = "JOBPOOL_WORKERS_MIN")]
    pub min_workers: usize,

    /// Máximo de workers cuando la cola está llena
    #[arg(long = "workers-max", default_value = "8", env = "JOBPOOL_WORKERS_MAX")]
    pub max_workers: usize,

    /// Capacidad de la cola del pool (0 = workers-max * 10)
    #[arg(long = "queue-capacity", default_value = "0", env = "JOBPOOL_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Tiempo ocioso tras el cual un worker extra se retira
    #[arg(long = "keep-alive-ms", default_value = "60000", env = "JOBPOOL_KEEP_ALIVE_MS")]
    pub keep_alive_ms: u64,

    // === Job ===

    /// Intervalo entre muestras de estadísticas (0 = sin estadísticas)
    #[arg(long = "stat-interval-ms", default_value = "10000", env = "JOBPOOL_STAT_INTERVAL_MS")]
    pub stat_interval_ms: u64,

    /// Detener el job ante la primera unidad fallida
    #[arg(long = "fail-fast", env = "JOBPOOL_FAIL_FAST")]
    pub fail_fast: bool,

    /// Tarea por línea
    #[arg(long, value_enum, default_value = "words", env = "JOBPOOL_TASK")]
    pub task: TaskKind,

    /// Expresión regular para `--task grep`
    #[arg(long, env = "JOBPOOL_PATTERN")]
    pub pattern: Option<String>,

    // === Input / Output ===

    /// Encoding del input (utf-8, utf-8-lossy, latin1)
    #[arg(long, default_value = "utf-8", env = "JOBPOOL_ENCODING")]
    pub encoding: String,

    /// Formato de las estadísticas
    #[arg(long, value_enum, default_value = "text", env = "JOBPOOL_FORMAT")]
    pub format: OutputFormat,

    /// Archivo de entrada (stdin si se omite)
    pub input: Option<PathBuf>,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        // Validar workers
        if self.min_workers == 0 {
            return Err("Min workers must be >= 1".to_string());
        }
        if self.max_workers < self.min_workers {
            return Err("Max workers must be >= min workers".to_string());
        }

        if self.keep_alive_ms == 0 {
            return Err("Keep-alive must be > 0".to_string());
        }

        // Validar tarea
        if self.task == TaskKind::Grep {
            match &self.pattern {
                None => return Err("Task grep requires --pattern".to_string()),
                Some(p) => {
                    if let Err(e) = regex::Regex::new(p) {
                        return Err(format!("Invalid pattern: {}", e));
                    }
                }
            }
        }

        if let Err(e) = self.encoding.parse::<crate::text::Encoding>() {
            return Err(e.to_string());
        }

        Ok(())
    }

    /// Capacidad de cola efectiva
    pub fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            self.max_workers * 10
        } else {
            self.queue_capacity
        }
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        let input = self
            .input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stdin>".to_string());

        eprintln!("╔══════════════════════════════════════════════════════════════╗");
        eprintln!("║                  jobpool Configuration                       ║");
        eprintln!("╚══════════════════════════════════════════════════════════════╝");
        eprintln!();
        eprintln!("👷 Worker Pool:");
        eprintln!("   ┌──────────────┬──────────┬────────────┬──────────────┐");
        eprintln!("   │ Min workers  │ Max      │ Queue Cap  │ Keep-alive   │");
        eprintln!("   ├──────────────┼──────────┼────────────┼──────────────┤");
        eprintln!("   │ {:^12} │ {:^8} │ {:^10} │ {:>9} ms │",
            self.min_workers, self.max_workers, self.effective_queue_capacity(), self.keep_alive_ms);
        eprintln!("   └──────────────┴──────────┴────────────┴──────────────┘");
        eprintln!();
        eprintln!("📄 Job:");
        eprintln!("   Input:        {} ({})", input, self.encoding);
        eprintln!("   Task:         {:?}", self.task);
        if let Some(pattern) = &self.pattern {
            eprintln!("   Pattern:      {}", pattern);
        }
        eprintln!("   On error:     {}", if self.fail_fast { "fail fast" } else { "tolerate" });

        if self.stat_interval_ms > 0 {
            eprintln!("   Statistics:   every {} ms ({:?})", self.stat_interval_ms, self.format);
        } else {
            eprintln!("   Statistics:   disabled");
        }

        eprintln!();
        eprintln!("═══════════════════════════════════════════════════════════════");
        eprintln!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            min_workers: 4,
            max_workers: 8,
            queue_capacity: 0,
            keep_alive_ms: 60_000,
            stat_interval_ms: 10_000,
            fail_fast: false,
            task: TaskKind::Words,
            pattern: None,
            encoding: "utf-8".to_string(),
            format: OutputFormat::Text,
            input: None,
        }
    }
}
