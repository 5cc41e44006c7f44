//! # Canal de Completados
//! src/job/channel.rs
//!
//! Cola doble sin límite que guarda los handles de resultados en orden de
//! submit. Los sentinelas de fin de submit van al final; los de cancelación
//! van al frente para que el observer loop los vea antes que lo pendiente.

use crate::pool::TaskHandle;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Elemento del canal
pub enum Completion<T> {
    /// Resultado de la unidad número `index` (orden de submit)
    Result { index: u64, handle: TaskHandle<T> },

    /// No habrá más submits
    EndOfSubmission,

    /// Cancelar el job
    Cancel,
}

impl<T> Completion<T> {
    /// Cancela el handle si el elemento es un resultado. Retorna true si
    /// la unidad nunca llegó a empezar
    pub(crate) fn cancel(&self) -> bool {
        match self {
            Completion::Result { handle, .. } => {
                let unstarted = handle.cancel_unstarted();
                if !unstarted {
                    handle.cancel();
                }
                unstarted
            }
            _ => false,
        }
    }
}

struct ChannelState<T> {
    items: VecDeque<Completion<T>>,
    closed: bool,
}

/// Canal ordenado: múltiples productores, un único consumidor
pub struct CompletionChannel<T> {
    state: Mutex<ChannelState<T>>,
    available: Condvar,
}

impl<T> CompletionChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Agrega al final. Si el canal está cerrado, devuelve el elemento
    pub fn push_back(&self, item: Completion<T>) -> Result<(), Completion<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        self.available.notify_one();
        Ok(())
    }

    /// Agrega al frente (prioridad). Si el canal está cerrado, devuelve el elemento
    pub fn push_front(&self, item: Completion<T>) -> Result<(), Completion<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_front(item);
        self.available.notify_one();
        Ok(())
    }

    /// Bloquea hasta tomar el elemento de la cabeza.
    ///
    /// Retorna `None` sólo si el canal fue cerrado y está vacío.
    pub fn take(&self) -> Option<Completion<T>> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Cierra el canal y retorna todo lo que quedaba
    pub fn close(&self) -> Vec<Completion<T>> {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
        state.items.drain(..).collect()
    }

    /// Cancela en el lugar los handles que todavía no empezaron, sin
    /// sacarlos del canal. Retorna cuántos canceló
    pub(crate) fn cancel_unstarted(&self) -> u64 {
        let state = self.lock();
        let mut cancelled = 0;
        for item in state.items.iter() {
            if let Completion::Result { handle, .. } = item {
                if handle.cancel_unstarted() {
                    cancelled += 1;
                }
            }
        }
        cancelled
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T> Default for CompletionChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}
