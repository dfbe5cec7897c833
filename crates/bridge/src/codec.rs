//! String transfer across the memory boundary.
//!
//! Encoding is two-phase: a buffer sized to the character count takes the
//! longest ASCII prefix byte-for-byte, and only when non-ASCII text remains
//! does the buffer get reallocated, to the exact UTF-8 byte length of the
//! whole text. All-ASCII text therefore costs exactly one guest allocation
//! and no reallocs; everything else costs exactly one realloc.
//!
//! Decoding is strict: malformed bytes fail the call, they are never
//! substituted.

use wasmtime::{AsContext, AsContextMut};

use crate::error::BridgeError;
use crate::memory::MemoryViews;

const STRING_ALIGN: u32 = 1;

/// A transient span in guest memory. Valid only until the guest allocator
/// runs again; never stored across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub ptr: u32,
    pub len: u32,
}

pub fn encode(
    views: &mut MemoryViews,
    mut ctx: impl AsContextMut,
    text: &str,
) -> Result<ByteRange, BridgeError> {
    let cap = text.chars().count() as u32;
    let mut ptr = views.alloc(&mut ctx, cap, STRING_ALIGN)?;

    let prefix = text
        .bytes()
        .position(|b| !b.is_ascii())
        .unwrap_or(text.len());
    views.write_bytes(&mut ctx, ptr, &text.as_bytes()[..prefix])?;
    if prefix == text.len() {
        return Ok(ByteRange {
            ptr,
            len: prefix as u32,
        });
    }

    // char_count underestimates multi-byte text; grow to the exact UTF-8
    // length (a per-char worst case would still short 4-byte scalars).
    let rest = &text[prefix..];
    let exact = text.len() as u32;
    ptr = views.realloc(&mut ctx, ptr, cap, exact, STRING_ALIGN)?;
    views.write_bytes(&mut ctx, ptr + prefix as u32, rest.as_bytes())?;

    Ok(ByteRange { ptr, len: exact })
}

pub fn decode(
    views: &mut MemoryViews,
    ctx: impl AsContext,
    ptr: u32,
    len: u32,
) -> Result<String, BridgeError> {
    views.refresh(&ctx);
    let data = views.memory().data(&ctx);
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|end| *end <= data.len())
        .ok_or(BridgeError::OutOfBounds { ptr, len })?;
    let text = std::str::from_utf8(&data[start..end])
        .map_err(|source| BridgeError::MalformedUtf8 { ptr, len, source })?;
    Ok(text.to_owned())
}
