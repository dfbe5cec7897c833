//! Guest module lifecycle.
//!
//! `Unloaded → Loading → Running | Failed`. A failure anywhere between
//! reading the binary and returning from the guest entry point is logged
//! and terminal; it never propagates to the embedding host as a panic or
//! unhandled error, and there is no automatic retry.

use std::path::Path;
use std::sync::{Arc, Mutex};

use page::Document;
use wasmtime::{Config, Engine, Linker, Module, Store};

use crate::error::BridgeError;
use crate::memory::MemoryViews;
use crate::session::{CallbackRegistry, Session};
use crate::state::HostState;
use crate::trampolines;

pub const ENTRY_POINT: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Running,
    Failed,
}

pub struct ModuleHost {
    engine: Engine,
    state: LifecycleState,
}

impl ModuleHost {
    pub fn new() -> Result<Self, BridgeError> {
        let engine = Engine::new(&Config::new())?;
        Ok(Self {
            engine,
            state: LifecycleState::Unloaded,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Load, instantiate and start the guest. On success the host is
    /// `Running` and the session is returned; on failure the host is
    /// `Failed`, a diagnostic has been logged, and there is nothing to run.
    pub async fn start(
        &mut self,
        module_path: &Path,
        page: Arc<Mutex<Document>>,
    ) -> Option<Session> {
        self.state = LifecycleState::Loading;
        tracing::info!(path = %module_path.display(), "loading guest module");
        match self.instantiate(module_path, page).await {
            Ok(session) => {
                self.state = LifecycleState::Running;
                tracing::info!("guest module running");
                Some(session)
            }
            Err(err) => {
                self.state = LifecycleState::Failed;
                tracing::error!(
                    path = %module_path.display(),
                    error = %err,
                    "guest module failed to start"
                );
                None
            }
        }
    }

    async fn instantiate(
        &self,
        module_path: &Path,
        page: Arc<Mutex<Document>>,
    ) -> Result<Session, BridgeError> {
        let bytes = tokio::fs::read(module_path)
            .await
            .map_err(|source| BridgeError::Load {
                path: module_path.to_path_buf(),
                source,
            })?;
        let module = Module::new(&self.engine, &bytes)?;

        let mut linker = Linker::new(&self.engine);
        trampolines::add_to_linker(&mut linker)?;

        let mut store = Store::new(&self.engine, HostState::new(page));
        let instance = linker.instantiate(&mut store, &module)?;

        let views = MemoryViews::resolve(&mut store, &instance)?;
        store.data_mut().views = Some(views);
        let callbacks = CallbackRegistry::resolve(&mut store, &instance);

        let entry = instance
            .get_typed_func::<(), ()>(&mut store, ENTRY_POINT)
            .map_err(|_| BridgeError::MissingExport(ENTRY_POINT))?;
        entry.call(&mut store, ())?;

        Ok(Session {
            store,
            instance,
            callbacks,
        })
    }
}
