//! Outbound message rewriting
//!
//! Backends report scripts by bare filesystem path and know nothing about
//! execution contexts. DevTools frontends expect URI-shaped script locations
//! and a non-zero context id to group scripts under one target, so a small
//! allow-list of outbound notifications is patched here before broadcast.
//! Everything else, including payloads that are not JSON, goes out untouched.

use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

use crate::{string_or_empty, ProtocolMessage};

/// Notification announcing a newly compiled script
pub const SCRIPT_PARSED: &str = "Debugger.scriptParsed";

/// The single execution context every bridge session represents
pub const EXECUTION_CONTEXT_ID: i64 = 1;

const FILE_SCHEME: &str = "file://";

/// Rewrite an outbound backend message for delivery to frontends
///
/// Returns the input unchanged (borrowed) when the message is not on the
/// allow-list or cannot be parsed. A rewritten message is re-serialized.
pub fn transform_outbound(message: &str) -> Cow<'_, str> {
    // Heap snapshot chunks can be huge; only parse what could match.
    if !message.contains(SCRIPT_PARSED) {
        return Cow::Borrowed(message);
    }

    let mut parsed = match ProtocolMessage::parse(message) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Forwarding outbound message unmodified: {}", e);
            return Cow::Borrowed(message);
        }
    };

    if rewrite(&mut parsed) {
        Cow::Owned(parsed.to_text())
    } else {
        Cow::Borrowed(message)
    }
}

/// Apply the allow-listed field rewrites in place
///
/// Returns whether anything was changed.
pub fn rewrite(message: &mut ProtocolMessage) -> bool {
    match message.method() {
        Some(SCRIPT_PARSED) => rewrite_script_parsed(message),
        _ => false,
    }
}

fn rewrite_script_parsed(message: &mut ProtocolMessage) -> bool {
    let Some(params) = message.params_mut() else {
        return false;
    };

    let url = format!("{}{}", FILE_SCHEME, string_or_empty(params, "url"));

    params.insert(
        "executionContextId".to_string(),
        Value::from(EXECUTION_CONTEXT_ID),
    );
    params.insert("url".to_string(), Value::String(url));

    true
}
