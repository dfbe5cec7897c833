//! Host capability implementations.
//!
//! One function per capability the guest may invoke, working purely on
//! [`HostState`] with handles in and handles out. The wasm-facing argument
//! decoding and the error-slot wrapping live in the trampoline layer; every
//! fallible operation here returns a typed `Result` instead.

use page::NodeId;

use crate::error::BridgeError;
use crate::externs::UNDEFINED;
use crate::state::HostState;
use crate::value::{Function, Value};

fn node_arg(state: &HostState, handle: u32) -> Result<NodeId, BridgeError> {
    match state.externs.get(handle)? {
        Value::Node(id) => Ok(*id),
        other => Err(BridgeError::TypeMismatch {
            expected: "element",
            actual: other.kind(),
        }),
    }
}

fn document_arg(state: &HostState, handle: u32) -> Result<(), BridgeError> {
    match state.externs.get(handle)? {
        Value::Document => Ok(()),
        other => Err(BridgeError::TypeMismatch {
            expected: "document",
            actual: other.kind(),
        }),
    }
}

pub fn append_child(state: &mut HostState, parent: u32, child: u32) -> Result<u32, BridgeError> {
    let parent = node_arg(state, parent)?;
    let child = node_arg(state, child)?;
    state.page().append_child(parent, child)?;
    Ok(state.externs.alloc(Value::Node(child)))
}

/// `document.body` accessor; absent (non-document receiver) maps to the
/// shared sentinel rather than an error.
pub fn body(state: &mut HostState, doc: u32) -> u32 {
    let body = match state.externs.get(doc) {
        Ok(Value::Document) => Some(state.page().body()),
        _ => None,
    };
    state.externs.alloc_or_sentinel(body.map(Value::Node))
}

pub fn create_element(state: &mut HostState, doc: u32, tag: &str) -> Result<u32, BridgeError> {
    document_arg(state, doc)?;
    let id = state.page().create_element(tag)?;
    Ok(state.externs.alloc(Value::Node(id)))
}

pub fn document(state: &mut HostState, window: u32) -> u32 {
    let doc = match state.externs.get(window) {
        Ok(Value::Window) => Some(Value::Document),
        _ => None,
    };
    state.externs.alloc_or_sentinel(doc)
}

/// Invoke a function value with a `this` argument. Only script functions
/// built by [`new_function`] exist host-side; the canonical `return this`
/// body evaluates to the global object.
pub fn call_function(state: &mut HostState, func: u32, _this: u32) -> Result<u32, BridgeError> {
    let source = match state.externs.get(func)? {
        Value::Function(Function::Script(source)) => Some(source.clone()),
        Value::Function(_) => None,
        other => {
            return Err(BridgeError::TypeMismatch {
                expected: "function",
                actual: other.kind(),
            });
        }
    };
    match source.as_deref().map(str::trim) {
        Some("return this") => Ok(state.externs.alloc(Value::Window)),
        _ => Ok(UNDEFINED),
    }
}

pub fn new_function(state: &mut HostState, source: &str) -> u32 {
    state
        .externs
        .alloc(Value::Function(Function::Script(source.to_string())))
}

pub fn is_window(state: &HostState, handle: u32) -> bool {
    matches!(state.externs.get(handle), Ok(Value::Window))
}

pub fn is_undefined(state: &HostState, handle: u32) -> bool {
    matches!(state.externs.get(handle), Ok(Value::Undefined))
}

pub fn set_attribute(
    state: &mut HostState,
    element: u32,
    name: &str,
    value: &str,
) -> Result<(), BridgeError> {
    let element = node_arg(state, element)?;
    state.page().set_attribute(element, name, value)?;
    Ok(())
}

pub fn set_text_content(
    state: &mut HostState,
    element: u32,
    text: Option<&str>,
) -> Result<(), BridgeError> {
    let element = node_arg(state, element)?;
    state.page().set_text_content(element, text)?;
    Ok(())
}

pub fn log(state: &mut HostState, line: &str) {
    tracing::info!(target: "guest", "{line}");
    state.console.push(line.to_string());
}

/// The four global-binding accessors. This host models a window
/// environment: `window`, `globalThis` and `self` all resolve to the window
/// object, the node-style `global` binding is absent.
pub fn global_window(state: &mut HostState) -> u32 {
    state.externs.alloc(Value::Window)
}

pub fn global_this(state: &mut HostState) -> u32 {
    state.externs.alloc(Value::Window)
}

pub fn global_self(state: &mut HostState) -> u32 {
    state.externs.alloc(Value::Window)
}

pub fn global_node(state: &mut HostState) -> u32 {
    state.externs.alloc_or_sentinel(None)
}

/// Total diagnostic rendering; a stale handle renders as the sentinel value
/// rather than failing.
pub fn debug_string(state: &HostState, handle: u32) -> String {
    match state.externs.get(handle) {
        Ok(value) => value.debug_string(),
        Err(_) => "undefined".to_string(),
    }
}

pub fn drop_ref(state: &mut HostState, handle: u32) -> Result<(), BridgeError> {
    state.externs.free(handle).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use page::Document;

    use super::*;
    use crate::externs;

    fn state() -> HostState {
        HostState::new(Arc::new(Mutex::new(Document::new())))
    }

    #[test]
    fn window_document_body_chain() {
        let mut state = state();
        let win = global_window(&mut state);
        assert!(is_window(&state, win));
        let doc = document(&mut state, win);
        assert_ne!(doc, externs::UNDEFINED);
        let body = body(&mut state, doc);
        assert!(matches!(state.externs.get(body).unwrap(), Value::Node(_)));
    }

    #[test]
    fn document_accessor_on_non_window_is_absent() {
        let mut state = state();
        let num = state.externs.alloc(Value::Number(1.0));
        assert_eq!(document(&mut state, num), externs::UNDEFINED);
        assert_eq!(body(&mut state, num), externs::UNDEFINED);
    }

    #[test]
    fn create_and_append_element() {
        let mut state = state();
        let win = global_window(&mut state);
        let doc = document(&mut state, win);
        let body_h = body(&mut state, doc);
        let p = create_element(&mut state, doc, "p").unwrap();
        set_text_content(&mut state, p, Some("hi")).unwrap();
        append_child(&mut state, body_h, p).unwrap();

        let page = state.page.lock().unwrap();
        let children = page.children(page.body()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(page.text_content(children[0]).unwrap(), Some("hi"));
    }

    #[test]
    fn create_element_with_bad_tag_fails() {
        let mut state = state();
        let win = global_window(&mut state);
        let doc = document(&mut state, win);
        assert!(matches!(
            create_element(&mut state, doc, ""),
            Err(BridgeError::Page(_))
        ));
    }

    #[test]
    fn script_function_returning_this_yields_window() {
        let mut state = state();
        let f = new_function(&mut state, "return this");
        let ret = call_function(&mut state, f, externs::UNDEFINED).unwrap();
        assert!(is_window(&state, ret));

        let noop = new_function(&mut state, "return 1");
        let ret = call_function(&mut state, noop, externs::UNDEFINED).unwrap();
        assert_eq!(ret, externs::UNDEFINED);
    }

    #[test]
    fn calling_a_non_function_is_a_type_error() {
        let mut state = state();
        let num = state.externs.alloc(Value::Number(3.0));
        assert!(matches!(
            call_function(&mut state, num, externs::UNDEFINED),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn set_attribute_on_removed_node_fails() {
        let mut state = state();
        let win = global_window(&mut state);
        let doc = document(&mut state, win);
        let body_h = body(&mut state, doc);
        let el = create_element(&mut state, doc, "div").unwrap();
        append_child(&mut state, body_h, el).unwrap();

        let Value::Node(id) = *state.externs.get(el).unwrap() else {
            unreachable!()
        };
        state.page().remove(id).unwrap();

        assert!(matches!(
            set_attribute(&mut state, el, "id", "x"),
            Err(BridgeError::Page(_))
        ));
    }

    #[test]
    fn log_captures_console_lines() {
        let mut state = state();
        log(&mut state, "hello");
        log(&mut state, "world");
        assert_eq!(state.console, vec!["hello", "world"]);
    }

    #[test]
    fn undefined_probe_matches_only_the_sentinel() {
        let mut state = state();
        assert!(is_undefined(&state, externs::UNDEFINED));
        let h = state.externs.alloc(Value::Null);
        assert!(!is_undefined(&state, h));
        assert!(!is_undefined(&state, 9999));
    }
}
