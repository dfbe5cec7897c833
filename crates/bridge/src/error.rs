use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong at the host/guest boundary.
///
/// Failures raised by host operations on behalf of the guest are not
/// propagated as host errors: the trampoline layer converts them into error
/// handles the guest inspects through the last-error slot. Decoding failures
/// and guest aborts trap the offending call instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid handle {0}")]
    InvalidHandle(u32),
    #[error("handle {0} is reserved and cannot be freed")]
    ReservedHandle(u32),
    #[error("guest memory range {ptr}..+{len} is out of bounds")]
    OutOfBounds { ptr: u32, len: u32 },
    #[error("malformed utf-8 in guest memory at {ptr}..+{len}")]
    MalformedUtf8 {
        ptr: u32,
        len: u32,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("guest export `{0}` is missing or has the wrong type")]
    MissingExport(&'static str),
    #[error("expected a {expected}, got a {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    Page(#[from] page::PageError),
    #[error("failed to read guest binary {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("guest raised: {0}")]
    GuestAbort(String),
    #[error("wasm runtime error: {0}")]
    Wasm(String),
}

impl From<wasmtime::Error> for BridgeError {
    fn from(err: wasmtime::Error) -> Self {
        Self::Wasm(format!("{err:#}"))
    }
}

impl BridgeError {
    /// Short class name used when the error crosses into the guest as an
    /// error value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidHandle(_) | Self::ReservedHandle(_) => "HandleError",
            Self::OutOfBounds { .. } => "RangeError",
            Self::MalformedUtf8 { .. } => "DecodeError",
            Self::MissingExport(_) => "LinkError",
            Self::TypeMismatch { .. } => "TypeError",
            Self::Page(_) => "DomError",
            Self::Load { .. } => "LoadError",
            Self::GuestAbort(_) => "GuestError",
            Self::Wasm(_) => "WasmError",
        }
    }
}
