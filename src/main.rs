//! # jobpool - Entry Point
//! src/main.rs
//!
//! Lee un archivo (o stdin) línea por línea, aplica la tarea configurada a
//! cada línea en el pool y escribe los resultados en el orden del input.

use anyhow::{bail, Context};
use jobpool::commands::LineTask;
use jobpool::config::{Config, OutputFormat};
use jobpool::job::{ExecutorConfig, JobExecutor, JobObserver};
use jobpool::stats::{JsonFormatter, StandardFormatter, StatFormatter};
use jobpool::text::{self, Encoding};
use jobpool::JobError;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = Config::new();

    if let Err(e) = config.validate() {
        eprintln!("💥 Configuración inválida: {}", e);
        std::process::exit(1);
    }

    config.print_summary();

    if let Err(e) = run(&config) {
        eprintln!("💥 Error fatal: {:#}", e);
        std::process::exit(1);
    }
}

type LineSource = Box<dyn Iterator<Item = jobpool::Result<String>>>;

fn run(config: &Config) -> anyhow::Result<()> {
    let encoding: Encoding = config.encoding.parse()?;
    let task = Arc::new(LineTask::from_config(config)?);

    // Total de líneas sólo cuando el input es un archivo
    let (source, total, job_name): (LineSource, Option<u64>, String) = match &config.input {
        Some(path) => {
            let total = text::open_lines(path, encoding)
                .with_context(|| format!("cannot open {}", path.display()))?
                .count() as u64;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "input".to_string());
            (Box::new(text::open_lines(path, encoding)?), Some(total), name)
        }
        None => (
            Box::new(text::lines(io::stdin(), encoding)),
            None,
            "stdin".to_string(),
        ),
    };

    let executor = JobExecutor::with_config(ExecutorConfig::from_config(config))?;

    let mut out = io::stdout();
    let job: JobObserver<(usize, String)> = executor
        .job_builder()
        .name(&job_name)
        .callback(move |(index, value): (usize, String)| {
            writeln!(out, "{}\t{}", index + 1, value)?;
            Ok(())
        })
        .begin()?;

    let stats = if config.stat_interval_ms > 0 {
        let formatter: Box<dyn StatFormatter> = match config.format {
            OutputFormat::Text => Box::new(StandardFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
        };
        Some(executor.start_statistics(
            &job,
            Duration::from_millis(config.stat_interval_ms),
            total,
            Some(formatter),
        )?)
    } else {
        None
    };

    info!(job = %job_name, task = task.name(), "processing input");

    for (index, line) in source.enumerate() {
        let task = Arc::clone(&task);
        let submitted = executor.submit_with_observer(&job, move || {
            let line = line?;
            Ok((index, task.apply(&line)?))
        });
        // El job terminó antes (fail-fast o error del callback)
        if let Err(e) = submitted {
            warn!(error = %e, "submission stopped");
            break;
        }
    }

    let mut failed_lines = Vec::new();
    let snapshot = executor.await_complete_with(&job, |e| {
        if let JobError::WorkFailure { index, .. } = &e {
            failed_lines.push(index + 1);
        }
        error!(error = %e, "job failure");
    });

    if let Some(stats) = stats {
        stats.join();
    }

    info!(
        job = %snapshot.name,
        status = %snapshot.status,
        completed = snapshot.completed,
        errored = snapshot.errored,
        elapsed_ms = snapshot.elapsed_ms,
        "done"
    );

    if snapshot.status.is_failure() {
        bail!("job {} ended with status {}", snapshot.name, snapshot.status);
    }
    if let Some(lines) = text::mk_str(&failed_lines, ",", |n| n.to_string()) {
        warn!(failures = failed_lines.len(), lines = %lines, "some lines failed");
    }
    Ok(())
}
