// Inspector protocol message model and outbound message transform
//
// This module is part of the inspector bridge.

pub mod errors;
pub mod transform;

// Re-export commonly used types
pub use errors::{ProtocolError, Result};
pub use transform::{rewrite, transform_outbound, EXECUTION_CONTEXT_ID, SCRIPT_PARSED};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shape of a protocol message, derived from which of `id` and `method` it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Frontend to backend request (has id and method)
    Command,
    /// Backend reply to a command (has id, no method)
    Response,
    /// Unsolicited backend notification (has method, no id)
    Event,
    /// Neither id nor method
    Unknown,
}

/// A protocol message held as a generic JSON object
///
/// The bridge relays methods it knows nothing about, so the message is kept
/// as a keyed document instead of a fixed schema. Accessors return `None`
/// for absent or mistyped fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolMessage {
    document: Map<String, Value>,
}

impl ProtocolMessage {
    /// Parse a message from its text form
    ///
    /// Fails if the text is not JSON or the top-level value is not an object.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Wrap an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(document) => Ok(Self { document }),
            Value::Array(_) => Err(ProtocolError::NotAnObject("array")),
            Value::String(_) => Err(ProtocolError::NotAnObject("string")),
            Value::Number(_) => Err(ProtocolError::NotAnObject("number")),
            Value::Bool(_) => Err(ProtocolError::NotAnObject("bool")),
            Value::Null => Err(ProtocolError::NotAnObject("null")),
        }
    }

    /// Method name, e.g. "Debugger.scriptParsed"
    pub fn method(&self) -> Option<&str> {
        self.document.get("method").and_then(Value::as_str)
    }

    /// Numeric request id
    pub fn id(&self) -> Option<u64> {
        self.document.get("id").and_then(Value::as_u64)
    }

    /// Parameter object
    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.document.get("params").and_then(Value::as_object)
    }

    /// Mutable parameter object
    pub fn params_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.document.get_mut("params").and_then(Value::as_object_mut)
    }

    /// Classify the message by the fields it carries
    pub fn kind(&self) -> MessageKind {
        match (self.id().is_some(), self.method().is_some()) {
            (true, true) => MessageKind::Command,
            (true, false) => MessageKind::Response,
            (false, true) => MessageKind::Event,
            (false, false) => MessageKind::Unknown,
        }
    }

    /// Borrow the underlying document
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Serialize back to compact JSON text
    pub fn to_text(&self) -> String {
        Value::Object(self.document.clone()).to_string()
    }

    /// Unwrap into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.document)
    }
}

/// Read a string field, treating absent or non-string values as empty
pub fn string_or_empty<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("")
}
