//! The guest's import surface.
//!
//! One linker entry per host capability, all under the `"host"` module.
//! Arguments arrive as handle indices and `(ptr, len)` byte ranges; results
//! leave as handles or raw primitives. Fallible capabilities share one
//! wrapper policy: the typed error becomes a handle in the last-error slot
//! and the guest receives the absent sentinel. Malformed string arguments
//! and explicit guest aborts trap the call instead.

use wasmtime::{Caller, Linker};

use crate::codec;
use crate::error::BridgeError;
use crate::memory::MemoryViews;
use crate::ops;
use crate::state::HostState;

pub const IMPORT_MODULE: &str = "host";

fn views(caller: &mut Caller<'_, HostState>) -> wasmtime::Result<MemoryViews> {
    if let Some(views) = caller.data().views {
        return Ok(views);
    }
    let views = MemoryViews::from_caller(caller)?;
    caller.data_mut().views = Some(views);
    Ok(views)
}

fn put_views(caller: &mut Caller<'_, HostState>, views: MemoryViews) {
    caller.data_mut().views = Some(views);
}

fn decode_arg(
    caller: &mut Caller<'_, HostState>,
    views: &mut MemoryViews,
    ptr: u32,
    len: u32,
) -> wasmtime::Result<String> {
    let text = codec::decode(views, &mut *caller, ptr, len)?;
    Ok(text)
}

fn settle(caller: &mut Caller<'_, HostState>, result: Result<u32, BridgeError>) -> u32 {
    match result {
        Ok(handle) => handle,
        Err(err) => caller.data_mut().store_failure(err),
    }
}

fn settle_unit(caller: &mut Caller<'_, HostState>, result: Result<(), BridgeError>) {
    if let Err(err) = result {
        caller.data_mut().store_failure(err);
    }
}

/// Wire every capability into the linker. The signatures here are the
/// guest-facing contract; changing one is a wire-format change.
pub fn add_to_linker(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "append_child",
        |mut caller: Caller<'_, HostState>, parent: u32, child: u32| -> u32 {
            let result = ops::append_child(caller.data_mut(), parent, child);
            settle(&mut caller, result)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "body",
        |mut caller: Caller<'_, HostState>, doc: u32| -> u32 { ops::body(caller.data_mut(), doc) },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "call",
        |mut caller: Caller<'_, HostState>, func: u32, this: u32| -> u32 {
            let result = ops::call_function(caller.data_mut(), func, this);
            settle(&mut caller, result)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "create_element",
        |mut caller: Caller<'_, HostState>, doc: u32, ptr: u32, len: u32| -> wasmtime::Result<u32> {
            let mut views = views(&mut caller)?;
            let tag = decode_arg(&mut caller, &mut views, ptr, len)?;
            put_views(&mut caller, views);
            let result = ops::create_element(caller.data_mut(), doc, &tag);
            Ok(settle(&mut caller, result))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "document",
        |mut caller: Caller<'_, HostState>, window: u32| -> u32 {
            ops::document(caller.data_mut(), window)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "is_window",
        |caller: Caller<'_, HostState>, handle: u32| -> u32 {
            // booleans cross as raw 0/1, not handles
            ops::is_window(caller.data(), handle) as u32
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "log",
        |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
            let mut views = views(&mut caller)?;
            let line = decode_arg(&mut caller, &mut views, ptr, len)?;
            put_views(&mut caller, views);
            ops::log(caller.data_mut(), &line);
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "new_function",
        |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
            let mut views = views(&mut caller)?;
            let source = decode_arg(&mut caller, &mut views, ptr, len)?;
            put_views(&mut caller, views);
            Ok(ops::new_function(caller.data_mut(), &source))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "set_attribute",
        |mut caller: Caller<'_, HostState>,
         element: u32,
         name_ptr: u32,
         name_len: u32,
         value_ptr: u32,
         value_len: u32|
         -> wasmtime::Result<()> {
            let mut views = views(&mut caller)?;
            let name = decode_arg(&mut caller, &mut views, name_ptr, name_len)?;
            let value = decode_arg(&mut caller, &mut views, value_ptr, value_len)?;
            put_views(&mut caller, views);
            let result = ops::set_attribute(caller.data_mut(), element, &name, &value);
            settle_unit(&mut caller, result);
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "set_text_content",
        |mut caller: Caller<'_, HostState>, element: u32, ptr: u32, len: u32| -> wasmtime::Result<()> {
            // ptr == 0 clears the text, mirroring an absent optional string
            let text = if ptr == 0 {
                None
            } else {
                let mut views = views(&mut caller)?;
                let text = decode_arg(&mut caller, &mut views, ptr, len)?;
                put_views(&mut caller, views);
                Some(text)
            };
            let result = ops::set_text_content(caller.data_mut(), element, text.as_deref());
            settle_unit(&mut caller, result);
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "global",
        |mut caller: Caller<'_, HostState>| -> u32 { ops::global_node(caller.data_mut()) },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "global_this",
        |mut caller: Caller<'_, HostState>| -> u32 { ops::global_this(caller.data_mut()) },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "self",
        |mut caller: Caller<'_, HostState>| -> u32 { ops::global_self(caller.data_mut()) },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "window",
        |mut caller: Caller<'_, HostState>| -> u32 { ops::global_window(caller.data_mut()) },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "debug_string",
        |mut caller: Caller<'_, HostState>, ret: u32, handle: u32| -> wasmtime::Result<()> {
            let mut views = views(&mut caller)?;
            let rendered = ops::debug_string(caller.data(), handle);
            let range = codec::encode(&mut views, &mut caller, &rendered)?;
            views.write_u32(&mut caller, ret, range.ptr)?;
            views.write_u32(&mut caller, ret + 4, range.len)?;
            put_views(&mut caller, views);
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "is_undefined",
        |caller: Caller<'_, HostState>, handle: u32| -> u32 {
            ops::is_undefined(caller.data(), handle) as u32
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "throw",
        |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
            let mut views = views(&mut caller)?;
            let message = decode_arg(&mut caller, &mut views, ptr, len)?;
            Err(BridgeError::GuestAbort(message).into())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "error_take",
        |mut caller: Caller<'_, HostState>| -> u32 { caller.data_mut().take_last_error() },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "drop_ref",
        |mut caller: Caller<'_, HostState>, handle: u32| {
            let result = ops::drop_ref(caller.data_mut(), handle);
            settle_unit(&mut caller, result);
        },
    )?;

    Ok(())
}
