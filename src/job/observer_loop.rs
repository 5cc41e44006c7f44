//! # Observer Loop
//! src/job/observer_loop.rs
//!
//! Un thread por job. Toma los handles del canal de completados estrictamente
//! en orden FIFO, espera cada resultado, invoca el callback y lleva el job a
//! su estado terminal. Los workers compiten por terminar primero; este loop
//! re-serializa la entrega en orden de submit.

use crate::error::{JobError, Result, TaskError};
use crate::job::channel::Completion;
use crate::job::observer::{ErrorPolicy, JobObserver};
use crate::job::status::JobStatus;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Arranca el loop del job en su propio thread
pub(crate) fn spawn<T: Send + 'static>(job: JobObserver<T>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("observer-{}", job.name()))
        .spawn(move || run(job))
        .map_err(JobError::Spawn)
}

fn run<T: Send + 'static>(job: JobObserver<T>) {
    let mut callback = job.take_callback();
    let mut end_requested = false;

    let outcome = loop {
        let Some(item) = job.channel().take() else {
            // Sólo se cierra desde aquí; si ocurre, alguien lo abandonó
            break JobStatus::Cancelled;
        };

        match item {
            Completion::EndOfSubmission => {
                end_requested = true;
                if job.state().all_observed() {
                    break JobStatus::Complete;
                }
                debug!(
                    job = %job.name(),
                    submitted = job.submitted(),
                    "end of submission ahead of outstanding results"
                );
            }

            Completion::Cancel => break JobStatus::Cancelled,

            Completion::Result { index, handle } => {
                let result = handle.wait();
                // Cancelado mientras esperábamos: no se entrega nada más
                if job.status() == JobStatus::Cancelled {
                    break JobStatus::Cancelled;
                }
                match result {
                    Ok(value) => {
                        if let Some(cb) = callback.as_mut() {
                            let delivered = panic::catch_unwind(AssertUnwindSafe(|| cb(value)))
                                .unwrap_or_else(|payload| {
                                    Err(anyhow::anyhow!(TaskError::from_panic(payload)))
                                });
                            if let Err(source) = delivered {
                                warn!(job = %job.name(), index, error = %source, "callback failed");
                                job.record_failure(JobError::CallbackFailure {
                                    job: job.name().to_string(),
                                    index,
                                    source,
                                });
                                break JobStatus::CallbackError;
                            }
                        }
                        job.state().mark_completed();
                    }

                    Err(TaskError::Cancelled) => {
                        warn!(job = %job.name(), index, "result cancelled outside the job");
                        job.record_failure(JobError::ObserverFailure {
                            job: job.name().to_string(),
                            reason: format!("unit #{} was cancelled outside the job", index),
                        });
                        break JobStatus::Error;
                    }

                    Err(source) => {
                        job.state().mark_errored();
                        debug!(job = %job.name(), index, error = %source, "work unit failed");
                        job.record_failure(JobError::WorkFailure {
                            job: job.name().to_string(),
                            index,
                            source,
                        });
                        if job.error_policy() == ErrorPolicy::FailFast {
                            break JobStatus::Error;
                        }
                    }
                }

                if end_requested && job.state().all_observed() {
                    break JobStatus::Complete;
                }
            }
        }
    };

    // Lo que quede en el canal ya no se va a observar
    let leftovers = job.channel().close();
    let mut cancelled = 0u64;
    for item in leftovers
        .iter()
        .filter(|item| matches!(item, Completion::Result { .. }))
    {
        job.discard(item);
        cancelled += 1;
    }

    let status = job.state().status.finish(outcome);
    job.state().mark_done();

    info!(
        job = %job.name(),
        status = %status,
        submitted = job.submitted(),
        completed = job.completed(),
        errored = job.errored(),
        cancelled,
        elapsed_ms = job.elapsed().as_millis() as u64,
        "job finished"
    );
}
