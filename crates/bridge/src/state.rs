//! Per-instance host state carried inside the wasmtime store.

use std::sync::{Arc, Mutex, MutexGuard};

use page::Document;

use crate::error::BridgeError;
use crate::externs::{self, ExternTable};
use crate::memory::MemoryViews;
use crate::value::Value;

pub struct HostState {
    pub page: Arc<Mutex<Document>>,
    pub externs: ExternTable,
    pub views: Option<MemoryViews>,
    /// Designated slot the guest polls after a fallible host call.
    pub last_error: Option<u32>,
    /// Host-side capture of everything the guest logged.
    pub console: Vec<String>,
}

impl HostState {
    pub fn new(page: Arc<Mutex<Document>>) -> Self {
        Self {
            page,
            externs: ExternTable::new(),
            views: None,
            last_error: None,
            console: Vec::new(),
        }
    }

    pub fn page(&self) -> MutexGuard<'_, Document> {
        self.page.lock().expect("page mutex poisoned")
    }

    /// Uniform failure path for fallible trampolines: the error becomes a
    /// handle, the handle lands in the last-error slot, and the guest gets
    /// the absent sentinel back.
    pub fn store_failure(&mut self, err: BridgeError) -> u32 {
        tracing::debug!(error = %err, "host operation failed; error stored for guest");
        let handle = self.externs.alloc(Value::from_error(&err));
        self.last_error = Some(handle);
        externs::UNDEFINED
    }

    /// Drain the last-error slot. The error value itself stays live until
    /// the guest frees its handle.
    pub fn take_last_error(&mut self) -> u32 {
        self.last_error.take().unwrap_or(externs::UNDEFINED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn state() -> HostState {
        HostState::new(Arc::new(Mutex::new(Document::new())))
    }

    #[test]
    fn store_failure_allocates_error_and_sets_slot() {
        let mut state = state();
        let unrelated = state.externs.alloc(Value::Number(7.0));
        let live_before = state.externs.live_count();

        let sentinel = state.store_failure(BridgeError::InvalidHandle(99));
        assert_eq!(sentinel, externs::UNDEFINED);
        assert_eq!(state.externs.live_count(), live_before + 1);

        let err_handle = state.last_error.expect("error slot set");
        assert!(matches!(
            state.externs.get(err_handle).unwrap(),
            Value::Error(_)
        ));
        // unrelated handles survive the failure path
        assert_eq!(state.externs.get(unrelated).unwrap(), &Value::Number(7.0));
    }

    #[test]
    fn take_last_error_drains_once() {
        let mut state = state();
        state.store_failure(BridgeError::InvalidHandle(1));
        let handle = state.take_last_error();
        assert_ne!(handle, externs::UNDEFINED);
        assert_eq!(state.take_last_error(), externs::UNDEFINED);
    }
}
