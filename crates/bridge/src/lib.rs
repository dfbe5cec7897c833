//! Typed host/guest bridge for a sandboxed WASM module.
//!
//! The guest runs inside a wasmtime instance and reaches host capabilities
//! (page mutation, logging, environment probes) through the trampoline
//! import surface. Host values cross the boundary as integer handles into
//! the extern table; strings cross as `(ptr, len)` spans written through
//! the guest's own allocator.

pub mod codec;
pub mod error;
pub mod externs;
pub mod lifecycle;
pub mod memory;
pub mod ops;
pub mod session;
pub mod state;
pub mod trampolines;
pub mod value;

pub use error::BridgeError;
pub use lifecycle::{LifecycleState, ModuleHost};
pub use session::Session;
pub use state::HostState;
pub use value::Value;
