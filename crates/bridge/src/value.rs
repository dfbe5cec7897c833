//! Host-side values reachable from the guest through handles.

use page::NodeId;

use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Symbol(Option<String>),
    Function(Function),
    Array(Vec<Value>),
    Object(serde_json::Map<String, serde_json::Value>),
    /// An element in the host page, by arena id.
    Node(NodeId),
    Window,
    Document,
    Error(ErrorValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Named(String),
    Anonymous,
    /// Built at runtime from source text via the `new_function` capability.
    Script(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl Value {
    pub fn from_error(err: &BridgeError) -> Self {
        Self::Error(ErrorValue {
            name: err.name().to_string(),
            message: err.to_string(),
            stack: String::new(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Function(_) => "function",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Node(_) => "element",
            Self::Window => "window",
            Self::Document => "document",
            Self::Error(_) => "error",
        }
    }

    /// Diagnostic rendering. Total: never fails, whatever the value holds.
    pub fn debug_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => format!("{s:?}"),
            Self::Symbol(None) => "Symbol".to_string(),
            Self::Symbol(Some(desc)) => format!("Symbol({desc})"),
            Self::Function(Function::Named(name)) if !name.is_empty() => {
                format!("Function({name})")
            }
            Self::Function(_) => "Function".to_string(),
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::debug_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Object(map) => match serde_json::to_string(map) {
                Ok(json) => format!("Object({json})"),
                Err(_) => "Object".to_string(),
            },
            Self::Node(_) => "Element".to_string(),
            Self::Window => "Window".to_string(),
            Self::Document => "Document".to_string(),
            Self::Error(err) => format!("{}: {}\n{}", err.name, err.message, err.stack),
        }
    }
}

// Matches host-console conventions: integral values print without a
// fractional part, non-finite values by name.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_render_bare() {
        assert_eq!(Value::Undefined.debug_string(), "undefined");
        assert_eq!(Value::Null.debug_string(), "null");
        assert_eq!(Value::Bool(true).debug_string(), "true");
        assert_eq!(Value::Number(5.0).debug_string(), "5");
        assert_eq!(Value::Number(2.5).debug_string(), "2.5");
        assert_eq!(Value::Number(f64::NAN).debug_string(), "NaN");
    }

    #[test]
    fn strings_render_quoted() {
        assert_eq!(Value::Str("hi".into()).debug_string(), "\"hi\"");
    }

    #[test]
    fn symbols_and_functions_render_by_name() {
        assert_eq!(Value::Symbol(None).debug_string(), "Symbol");
        assert_eq!(Value::Symbol(Some("tag".into())).debug_string(), "Symbol(tag)");
        assert_eq!(
            Value::Function(Function::Named("run".into())).debug_string(),
            "Function(run)"
        );
        assert_eq!(Value::Function(Function::Anonymous).debug_string(), "Function");
        assert_eq!(
            Value::Function(Function::Named(String::new())).debug_string(),
            "Function"
        );
    }

    #[test]
    fn arrays_render_recursively() {
        let arr = Value::Array(vec![
            Value::Number(1.0),
            Value::Array(vec![Value::Str("x".into())]),
            Value::Null,
        ]);
        assert_eq!(arr.debug_string(), "[1, [\"x\"], null]");
    }

    #[test]
    fn objects_render_as_json_with_fallback() {
        let mut map = serde_json::Map::new();
        map.insert("a".to_string(), serde_json::json!(1));
        assert_eq!(Value::Object(map).debug_string(), "Object({\"a\":1})");
        assert_eq!(
            Value::Object(serde_json::Map::new()).debug_string(),
            "Object({})"
        );
    }

    #[test]
    fn tagged_values_render_by_class() {
        assert_eq!(Value::Window.debug_string(), "Window");
        assert_eq!(Value::Document.debug_string(), "Document");
    }

    #[test]
    fn errors_render_name_message_stack() {
        let err = Value::Error(ErrorValue {
            name: "DomError".into(),
            message: "bad node".into(),
            stack: "at main".into(),
        });
        assert_eq!(err.debug_string(), "DomError: bad node\nat main");
    }

    #[test]
    fn deeply_nested_values_never_panic() {
        let mut value = Value::Number(0.0);
        for _ in 0..256 {
            value = Value::Array(vec![value]);
        }
        let rendered = value.debug_string();
        assert!(rendered.starts_with('['));
    }
}
