//! Cached views over the guest's linear memory.
//!
//! The guest owns its memory; the host only writes into spans handed out by
//! the guest-exported `alloc`/`realloc`. Captured extents go stale whenever
//! the memory grows, so every access revalidates the cached (base, length)
//! pair and re-captures when it no longer matches the live buffer.

use wasmtime::{AsContext, AsContextMut, Caller, Func, Instance, Memory};

use crate::error::BridgeError;

pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_ALLOC: &str = "alloc";
pub const EXPORT_REALLOC: &str = "realloc";

#[derive(Debug, Clone, Copy)]
pub struct MemoryViews {
    memory: Memory,
    alloc: Func,
    realloc: Func,
    base: usize,
    len: usize,
}

impl MemoryViews {
    /// Resolve the memory and allocator exports from a live instance.
    pub fn resolve(
        mut store: impl AsContextMut,
        instance: &Instance,
    ) -> Result<Self, BridgeError> {
        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or(BridgeError::MissingExport(EXPORT_MEMORY))?;
        let alloc = instance
            .get_func(&mut store, EXPORT_ALLOC)
            .ok_or(BridgeError::MissingExport(EXPORT_ALLOC))?;
        let realloc = instance
            .get_func(&mut store, EXPORT_REALLOC)
            .ok_or(BridgeError::MissingExport(EXPORT_REALLOC))?;
        Ok(Self::from_parts(memory, alloc, realloc))
    }

    /// Resolve lazily from inside a trampoline, for calls that arrive before
    /// instantiation has finished (e.g. a wasm start section).
    pub fn from_caller<T>(caller: &mut Caller<'_, T>) -> Result<Self, BridgeError> {
        let memory = caller
            .get_export(EXPORT_MEMORY)
            .and_then(|e| e.into_memory())
            .ok_or(BridgeError::MissingExport(EXPORT_MEMORY))?;
        let alloc = caller
            .get_export(EXPORT_ALLOC)
            .and_then(|e| e.into_func())
            .ok_or(BridgeError::MissingExport(EXPORT_ALLOC))?;
        let realloc = caller
            .get_export(EXPORT_REALLOC)
            .and_then(|e| e.into_func())
            .ok_or(BridgeError::MissingExport(EXPORT_REALLOC))?;
        Ok(Self::from_parts(memory, alloc, realloc))
    }

    fn from_parts(memory: Memory, alloc: Func, realloc: Func) -> Self {
        Self {
            memory,
            alloc,
            realloc,
            base: 0,
            len: 0,
        }
    }

    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Revalidate the captured extent against the live buffer.
    pub fn refresh(&mut self, ctx: impl AsContext) {
        let base = self.memory.data_ptr(&ctx) as usize;
        let len = self.memory.data_size(&ctx);
        if base != self.base || len != self.len {
            if self.len != 0 {
                tracing::trace!(
                    old_len = self.len,
                    new_len = len,
                    "guest memory moved or grew; view re-captured"
                );
            }
            self.base = base;
            self.len = len;
        }
    }

    /// Copy a byte range out of guest memory.
    pub fn read_bytes(
        &mut self,
        ctx: impl AsContext,
        ptr: u32,
        len: u32,
    ) -> Result<Vec<u8>, BridgeError> {
        self.refresh(&ctx);
        let data = self.memory.data(&ctx);
        let range = checked_range(data.len(), ptr, len)?;
        Ok(data[range].to_vec())
    }

    /// Write into a span the guest allocated for us.
    pub fn write_bytes(
        &mut self,
        mut ctx: impl AsContextMut,
        ptr: u32,
        bytes: &[u8],
    ) -> Result<(), BridgeError> {
        self.refresh(&ctx);
        let data = self.memory.data_mut(&mut ctx);
        let range = checked_range(data.len(), ptr, bytes.len() as u32)?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Word-view read: little-endian u32 at `ptr`.
    pub fn read_u32(&mut self, ctx: impl AsContext, ptr: u32) -> Result<u32, BridgeError> {
        self.refresh(&ctx);
        let data = self.memory.data(&ctx);
        let range = checked_range(data.len(), ptr, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&data[range]);
        Ok(u32::from_le_bytes(word))
    }

    /// Word-view write: little-endian u32 at `ptr`.
    pub fn write_u32(
        &mut self,
        ctx: impl AsContextMut,
        ptr: u32,
        value: u32,
    ) -> Result<(), BridgeError> {
        self.write_bytes(ctx, ptr, &value.to_le_bytes())
    }

    /// Ask the guest allocator for `size` bytes.
    pub fn alloc(
        &mut self,
        mut ctx: impl AsContextMut,
        size: u32,
        align: u32,
    ) -> Result<u32, BridgeError> {
        let alloc = self
            .alloc
            .typed::<(u32, u32), u32>(&ctx)
            .map_err(|_| BridgeError::MissingExport(EXPORT_ALLOC))?;
        let ptr = alloc.call(&mut ctx, (size, align))?;
        self.refresh(&ctx);
        Ok(ptr)
    }

    /// Resize a span previously obtained from [`MemoryViews::alloc`].
    pub fn realloc(
        &mut self,
        mut ctx: impl AsContextMut,
        ptr: u32,
        old_size: u32,
        new_size: u32,
        align: u32,
    ) -> Result<u32, BridgeError> {
        let realloc = self
            .realloc
            .typed::<(u32, u32, u32, u32), u32>(&ctx)
            .map_err(|_| BridgeError::MissingExport(EXPORT_REALLOC))?;
        let ptr = realloc.call(&mut ctx, (ptr, old_size, new_size, align))?;
        self.refresh(&ctx);
        Ok(ptr)
    }
}

fn checked_range(size: usize, ptr: u32, len: u32) -> Result<std::ops::Range<usize>, BridgeError> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|end| *end <= size)
        .ok_or(BridgeError::OutOfBounds { ptr, len })?;
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_rejects_overflow_and_oob() {
        assert!(checked_range(16, 0, 16).is_ok());
        assert!(matches!(
            checked_range(16, 8, 9),
            Err(BridgeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            checked_range(16, u32::MAX, 2),
            Err(BridgeError::OutOfBounds { .. })
        ));
    }
}
