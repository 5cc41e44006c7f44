//! # Cola Acotada con Backpressure
//! src/pool/queue.rs
//!
//! Cola FIFO thread-safe de capacidad fija. Cuando está llena, `enqueue`
//! bloquea al productor hasta que se libere espacio en lugar de rechazar.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Estado protegido por el mutex
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Cola acotada y bloqueante
pub struct BoundedQueue<T> {
    /// Items encolados y flag de cierre
    state: Arc<Mutex<QueueState<T>>>,

    /// Notifica a los consumidores cuando hay items nuevos
    not_empty: Arc<Condvar>,

    /// Notifica a los productores cuando se libera capacidad
    not_full: Arc<Condvar>,

    /// Capacidad máxima de la cola
    max_capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Crea una nueva cola con capacidad máxima (mínimo 1)
    pub fn new(max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(1);
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::with_capacity(max_capacity.min(4096)),
                closed: false,
            })),
            not_empty: Arc::new(Condvar::new()),
            not_full: Arc::new(Condvar::new()),
            max_capacity,
        }
    }

    // Un panic ajeno no debe dejar la cola inutilizable
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Encola un item, bloqueando mientras la cola esté llena.
    ///
    /// Las esperas interrumpidas (wakeups espurios, locks envenenados) se
    /// reintentan. Retorna `Err(item)` sólo si la cola fue cerrada.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(item);
            }
            if state.items.len() < self.max_capacity {
                state.items.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Intenta encolar sin bloquear
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed || state.items.len() >= self.max_capacity {
            return Err(item);
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Desencola el siguiente item.
    ///
    /// Bloquea hasta que haya un item disponible. Retorna `None` cuando la
    /// cola está cerrada y vacía.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Como `dequeue`, pero se rinde tras `timeout` sin items
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Cierra la cola: los productores bloqueados reciben su item de vuelta
    /// y los consumidores drenan lo que quede
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Remueve todos los items pendientes
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        let drained: Vec<T> = state.items.drain(..).collect();
        self.not_full.notify_all();
        drained
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verifica si la cola está llena
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Retorna la capacidad máxima
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            not_empty: Arc::clone(&self.not_empty),
            not_full: Arc::clone(&self.not_full),
            max_capacity: self.max_capacity,
        }
    }
}
