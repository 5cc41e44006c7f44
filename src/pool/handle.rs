//! # Handle de Resultado
//! src/pool/handle.rs
//!
//! Referencia tipo future al resultado de una unidad de trabajo.

use crate::error::TaskError;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Estado interno del handle
enum Slot<T> {
    /// En la cola del pool, todavía no empezó
    Pending,

    /// Un worker lo está ejecutando
    Running,

    /// Terminó; el resultado todavía no fue retirado
    Done(Result<T, TaskError>),

    /// Cancelado (antes o durante la ejecución)
    Cancelled,

    /// El resultado ya fue entregado por `wait`
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Handle al resultado de una unidad de trabajo
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskHandle<T> {
    /// Handle nuevo en estado pendiente
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Pending),
                ready: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pasa de Pending a Running. Retorna false si fue cancelado antes
    pub(crate) fn try_start(&self) -> bool {
        let mut slot = self.lock();
        match *slot {
            Slot::Pending => {
                *slot = Slot::Running;
                true
            }
            _ => false,
        }
    }

    /// Publica el resultado. Si el handle fue cancelado mientras corría,
    /// el resultado se descarta
    pub(crate) fn complete(&self, result: Result<T, TaskError>) {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Running | Slot::Pending) {
            *slot = Slot::Done(result);
            self.shared.ready.notify_all();
        }
    }

    /// Cancela el handle (best-effort).
    ///
    /// Trabajo pendiente nunca se ejecuta; trabajo en curso termina pero su
    /// resultado se descarta. Retorna true si el handle no había terminado.
    pub fn cancel(&self) -> bool {
        let mut slot = self.lock();
        match *slot {
            Slot::Pending | Slot::Running => {
                *slot = Slot::Cancelled;
                self.shared.ready.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Cancela sólo si la unidad todavía no empezó. Retorna true si la canceló
    pub(crate) fn cancel_unstarted(&self) -> bool {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Cancelled;
            self.shared.ready.notify_all();
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.lock(), Slot::Cancelled)
    }

    /// Verifica si el resultado ya está disponible (o fue cancelado)
    pub fn is_done(&self) -> bool {
        !matches!(*self.lock(), Slot::Pending | Slot::Running)
    }

    /// Bloquea hasta obtener el resultado
    pub fn wait(&self) -> Result<T, TaskError> {
        let mut slot = self.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Done(result) => return result,
                Slot::Cancelled => {
                    *slot = Slot::Cancelled;
                    return Err(TaskError::Cancelled);
                }
                Slot::Taken => return Err(TaskError::Cancelled),
                pending => {
                    *slot = pending;
                    slot = self
                        .shared
                        .ready
                        .wait(slot)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }
    }

    /// Como `wait`, con límite de tiempo. Retorna `None` si vence
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskError>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Done(result) => return Some(result),
                Slot::Cancelled => {
                    *slot = Slot::Cancelled;
                    return Some(Err(TaskError::Cancelled));
                }
                Slot::Taken => return Some(Err(TaskError::Cancelled)),
                pending => {
                    *slot = pending;
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    slot = self
                        .shared
                        .ready
                        .wait_timeout(slot, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.lock() {
            Slot::Pending => "pending",
            Slot::Running => "running",
            Slot::Done(Ok(_)) => "done",
            Slot::Done(Err(_)) => "failed",
            Slot::Cancelled => "cancelled",
            Slot::Taken => "taken",
        };
        f.debug_struct("TaskHandle").field("state", &state).finish()
    }
}
