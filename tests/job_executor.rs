//! Tests de integración del executor de jobs
//! tests/job_executor.rs
//!
//! Ejercitan la API pública completa: orden de entrega, cancelación,
//! admisión, backpressure y manejo de fallas.

use jobpool::job::{ErrorPolicy, JobExecutor, JobObserver, JobStatus};
use jobpool::pool::{PoolConfig, WorkerPool};
use jobpool::JobError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Helper: job cuyo callback guarda cada resultado en un Vec compartido
fn collecting_job<T: Send + 'static>(
    executor: &JobExecutor,
) -> (JobObserver<T>, Arc<Mutex<Vec<T>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let job = executor
        .begin_job_with_callback(move |value| {
            sink.lock().unwrap().push(value);
            Ok(())
        })
        .expect("Failed to begin job");
    (job, seen)
}

// ==================== Orden de entrega ====================

#[test]
fn test_thousand_units_in_order() {
    let executor = JobExecutor::create(4, 8).unwrap();
    let (job, seen) = collecting_job::<usize>(&executor);

    for i in 0..1000 {
        executor.submit_with_observer(&job, move || Ok(i)).unwrap();
    }

    let snapshot = executor.await_complete(&job).unwrap();
    assert_eq!(snapshot.status, JobStatus::Complete);
    assert_eq!(snapshot.submitted, 1000);
    assert_eq!(snapshot.completed, 1000);
    assert_eq!(*seen.lock().unwrap(), (0..1000).collect::<Vec<_>>());
}

#[test]
fn test_order_kept_when_later_units_finish_first() {
    let executor = JobExecutor::create(4, 4).unwrap();
    let (job, seen) = collecting_job::<u64>(&executor);
    let finished = Arc::new(Mutex::new(Vec::new()));

    for i in 0..20u64 {
        let finished = Arc::clone(&finished);
        executor
            .submit_with_observer(&job, move || {
                thread::sleep(Duration::from_millis((20 - i) * 5));
                finished.lock().unwrap().push(i);
                Ok(i)
            })
            .unwrap();
    }

    executor.await_complete(&job).unwrap();
    assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    // Los workers terminaron fuera de orden
    assert_ne!(*finished.lock().unwrap(), (0..20).collect::<Vec<_>>());
}

// ==================== Contadores ====================

#[test]
fn test_counters_converge_with_failures() {
    let executor = JobExecutor::create(3, 6).unwrap();
    let (job, seen) = collecting_job::<u32>(&executor);

    for i in 0..70u32 {
        executor
            .submit_with_observer(&job, move || {
                if i % 7 == 0 {
                    anyhow::bail!("unit {} rejected", i);
                }
                Ok(i)
            })
            .unwrap();
    }

    let mut failures = Vec::new();
    let snapshot = executor.await_complete_with(&job, |e| failures.push(e));

    assert_eq!(snapshot.status, JobStatus::Complete);
    assert_eq!(snapshot.submitted, 70);
    assert_eq!(snapshot.errored, 10);
    assert_eq!(snapshot.completed, 60);
    assert_eq!(snapshot.submitted, snapshot.completed + snapshot.errored);
    assert_eq!(snapshot.running, 0);
    assert_eq!(snapshot.awaiting, 0);
    assert_eq!(failures.len(), 10);
    assert_eq!(seen.lock().unwrap().len(), 60);
}

#[test]
fn test_await_with_reports_each_failure() {
    let executor = JobExecutor::create(4, 4).unwrap();
    let job: JobObserver<()> = executor.begin_job().unwrap();

    for i in 0..100u64 {
        executor
            .submit_with_observer(&job, move || {
                if i == 37 {
                    anyhow::bail!("boom");
                }
                Ok(())
            })
            .unwrap();
    }

    let mut indices = Vec::new();
    let snapshot = executor.await_complete_with(&job, |e| match e {
        JobError::WorkFailure { index, .. } => indices.push(index),
        other => panic!("unexpected failure: {}", other),
    });

    assert_eq!(indices, vec![37]);
    assert_eq!(snapshot.completed, 99);
    assert_eq!(snapshot.errored, 1);
}

#[test]
fn test_fail_fast_stops_job() {
    let executor = JobExecutor::create(2, 2).unwrap();
    let job: JobObserver<u32> = executor
        .job_builder()
        .error_policy(ErrorPolicy::FailFast)
        .begin()
        .unwrap();

    executor.submit_with_observer(&job, || Ok(1)).unwrap();
    executor
        .submit_with_observer(&job, || Err(anyhow::anyhow!("bad unit")))
        .unwrap();

    let err = executor.await_complete(&job).unwrap_err();
    assert!(matches!(err, JobError::WorkFailure { index: 1, .. }));
    assert_eq!(job.status(), JobStatus::Error);

    // Terminal: no acepta más trabajo
    let rejected = executor.submit_with_observer(&job, || Ok(3));
    assert!(matches!(rejected, Err(JobError::AdmissionRejected { .. })));
}

#[test]
fn test_callback_failure_is_fatal() {
    let executor = JobExecutor::create(2, 2).unwrap();
    let job: JobObserver<u32> = executor
        .begin_job_with_callback(|v| {
            if v == 2 {
                anyhow::bail!("cannot store {}", v);
            }
            Ok(())
        })
        .unwrap();

    for i in 0..5 {
        executor.submit_with_observer(&job, move || Ok(i)).unwrap();
    }

    let err = executor.await_complete(&job).unwrap_err();
    assert!(matches!(err, JobError::CallbackFailure { index: 2, .. }));
    assert_eq!(job.status(), JobStatus::CallbackError);
    assert!(job.status().is_failure());
}

// ==================== Admisión ====================

#[test]
fn test_submit_after_end_submit_rejected() {
    let executor = JobExecutor::create(2, 2).unwrap();
    let (job, _seen) = collecting_job::<u32>(&executor);

    for i in 0..5 {
        executor.submit_with_observer(&job, move || Ok(i)).unwrap();
    }
    executor.end_submit(&job).unwrap();
    let before = job.snapshot();

    let result = executor.submit_with_observer(&job, || Ok(99));
    match result {
        Err(JobError::AdmissionRejected { job: name, status }) => {
            assert_eq!(name, job.name());
            assert!(status == JobStatus::EndSubmit || status == JobStatus::Complete);
        }
        other => panic!("expected AdmissionRejected, got {:?}", other.err()),
    }
    assert_eq!(job.submitted(), before.submitted);

    let snapshot = executor.await_complete(&job).unwrap();
    assert_eq!(snapshot.submitted, 5);
    assert_eq!(snapshot.completed, 5);
}

#[test]
fn test_end_submit_is_idempotent() {
    let executor = JobExecutor::create(1, 1).unwrap();
    let job: JobObserver<()> = executor.begin_job().unwrap();
    executor.submit_runnable(&job, || {}).unwrap();
    executor.end_submit(&job).unwrap();
    executor.end_submit(&job).unwrap();
    let snapshot = executor.await_complete(&job).unwrap();
    assert_eq!(snapshot.status, JobStatus::Complete);
    assert_eq!(snapshot.completed, 1);
}

// ==================== Cancelación ====================

#[test]
fn test_cancel_mid_stream() {
    let pool = WorkerPool::with_config(PoolConfig {
        queue_capacity: 50,
        ..PoolConfig::with_workers(2, 2)
    })
    .unwrap();
    let executor = JobExecutor::from_pool(Arc::new(pool));
    let (job, seen) = collecting_job::<u32>(&executor);
    let ran = Arc::new(Mutex::new(HashSet::new()));

    // La primera unidad es lenta: el loop queda esperándola mientras el
    // otro worker sigue tomando unidades de la cola
    for i in 0..15u32 {
        let ran = Arc::clone(&ran);
        executor
            .submit_with_observer(&job, move || {
                ran.lock().unwrap().insert(i);
                let ms = if i == 0 { 600 } else { 20 };
                thread::sleep(Duration::from_millis(ms));
                Ok(i)
            })
            .unwrap();
    }

    thread::sleep(Duration::from_millis(50));
    assert!(executor.cancel(&job));
    let ran_at_cancel = ran.lock().unwrap().clone();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert!(ran_at_cancel.len() < 15);

    let snapshot = executor.await_complete(&job).unwrap();
    assert_eq!(snapshot.status, JobStatus::Cancelled);

    // Después del cancel no arranca ninguna unidad más
    thread::sleep(Duration::from_millis(100));
    assert_eq!(*ran.lock().unwrap(), ran_at_cancel);

    // Entregas en orden y sólo de unidades que corrieron
    let delivered = seen.lock().unwrap().clone();
    assert_eq!(delivered, (0..delivered.len() as u32).collect::<Vec<_>>());
    assert!(delivered.iter().all(|i| ran_at_cancel.contains(i)));

    // Las unidades canceladas sin arrancar no quedan pendientes
    assert_eq!(job.awaiting(), 0);
    assert_eq!(job.running(), 0);

    // Cancelar otra vez no tiene efecto
    assert!(!executor.cancel(&job));
    assert!(matches!(
        executor.submit_with_observer(&job, || Ok(0)),
        Err(JobError::AdmissionRejected { status: JobStatus::Cancelled, .. })
    ));
}

#[test]
fn test_cancel_before_start() {
    let executor = JobExecutor::create(1, 1).unwrap();
    let job: JobObserver<u32> = executor.create_job(Some("never"));
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    executor
        .submit_with_observer(&job, move || {
            flag.store(true, Ordering::SeqCst);
            Ok(1)
        })
        .ok();

    assert!(executor.cancel(&job));
    let snapshot = executor.await_complete(&job).unwrap();
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.completed, 0);
}

// ==================== Backpressure ====================

#[test]
fn test_backpressure_blocks_submitter() {
    let pool = WorkerPool::with_config(PoolConfig {
        queue_capacity: 1,
        ..PoolConfig::with_workers(1, 1)
    })
    .unwrap();
    let executor = JobExecutor::from_pool(Arc::new(pool));
    let job: JobObserver<()> = executor.begin_job().unwrap();

    // Ocupa el único worker
    let (release, gate) = mpsc::channel::<()>();
    executor
        .submit_runnable(&job, move || {
            gate.recv().ok();
        })
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    // Llena la cola
    executor.submit_runnable(&job, || {}).unwrap();

    let admitted = Arc::new(AtomicBool::new(false));
    let submitter = {
        let executor = executor.clone();
        let job = job.clone();
        let admitted = Arc::clone(&admitted);
        thread::spawn(move || {
            executor.submit_runnable(&job, || {}).unwrap();
            admitted.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!admitted.load(Ordering::SeqCst), "submit should block while the queue is full");

    release.send(()).unwrap();
    submitter.join().unwrap();
    assert!(admitted.load(Ordering::SeqCst));

    let snapshot = executor.await_complete(&job).unwrap();
    assert_eq!(snapshot.completed, 3);
}

// ==================== Varios jobs ====================

#[test]
fn test_jobs_share_pool_independently() {
    let executor = JobExecutor::create(4, 4).unwrap();
    let (even, even_seen) = collecting_job::<u64>(&executor);
    let (odd, odd_seen) = collecting_job::<u64>(&executor);
    let total = Arc::new(AtomicU64::new(0));

    for i in 0..50u64 {
        let total = Arc::clone(&total);
        let job = if i % 2 == 0 { &even } else { &odd };
        executor
            .submit_with_observer(job, move || {
                total.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            })
            .unwrap();
    }

    executor.cancel(&odd);
    executor.await_complete(&even).unwrap();
    executor.await_complete(&odd).unwrap();

    assert_eq!(
        *even_seen.lock().unwrap(),
        (0..50).filter(|i| i % 2 == 0).collect::<Vec<_>>()
    );
    assert_eq!(even.status(), JobStatus::Complete);
    assert_eq!(odd.status(), JobStatus::Cancelled);
    assert!(odd_seen.lock().unwrap().iter().all(|i| i % 2 == 1));
}
