//! Target discovery (`/json`, `/json/list`, `/json/version`)
//!
//! Generic DevTools clients locate a debuggable target by fetching these
//! documents before opening a WebSocket. Answers are pure functions of the
//! session and the bound address; no frontend needs to be attached.

use serde::{Deserialize, Serialize};

use crate::config::ListenerConfig;
use crate::session::InspectorSession;

/// Opaque id advertised for the single target
pub const TARGET_ID: &str = "6e99c4f9-6bb6-4f45-9749-5772545b2371";

/// Target type tag for a script process
pub const TARGET_TYPE: &str = "node";

const FRONTEND_URL_BASE: &str =
    "devtools://devtools/bundled/js_app.html?experiments=false&v8only=true&ws=";

/// Resolves the identity of the debug target
pub trait TargetLocator: Send + Sync {
    /// Stable identifier, typically the script's filesystem path
    fn resolve_identifier(&self) -> String;

    /// Human-readable title shown by frontends
    fn resolve_display_title(&self) -> String;
}

/// A script file run by a named runtime
#[derive(Debug, Clone)]
pub struct ScriptTarget {
    path: String,
    runtime_name: String,
    runtime_version: String,
}

impl ScriptTarget {
    /// Describe the script at `path` running under `runtime_name runtime_version`
    pub fn new(
        path: impl Into<String>,
        runtime_name: impl Into<String>,
        runtime_version: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            runtime_name: runtime_name.into(),
            runtime_version: runtime_version.into(),
        }
    }
}

impl TargetLocator for ScriptTarget {
    fn resolve_identifier(&self) -> String {
        self.path.clone()
    }

    fn resolve_display_title(&self) -> String {
        format!(
            "{} ({} {})",
            self.path, self.runtime_name, self.runtime_version
        )
    }
}

/// One entry of the `/json` target list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub description: String,
    pub devtools_frontend_url: String,
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub url: String,
    pub web_socket_debugger_url: String,
}

/// The `/json/version` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
}

/// Discovery answers for one session on one bound address
#[derive(Debug, Clone)]
pub struct DiscoveryService {
    identifier: String,
    title: String,
    host: String,
    port: u16,
    browser_version: String,
    protocol_version: String,
}

impl DiscoveryService {
    /// Build discovery answers for `session` reachable at `config.host:port`
    pub fn new(session: &InspectorSession, config: &ListenerConfig, port: u16) -> Self {
        Self {
            identifier: session.identifier().to_string(),
            title: session.title().to_string(),
            host: config.host.clone(),
            port,
            browser_version: config.browser_version.clone(),
            protocol_version: config.protocol_version.clone(),
        }
    }

    /// `host:port/devtools/page/<identifier>`, the part shared by both connection URLs
    fn page_address(&self) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}:{}/devtools/page/{}", host, self.port, self.identifier)
    }

    /// URL for direct WebSocket attachment
    pub fn web_socket_debugger_url(&self) -> String {
        format!("ws://{}", self.page_address())
    }

    /// URL that opens the bundled DevTools UI against this target
    pub fn devtools_frontend_url(&self) -> String {
        format!("{}{}", FRONTEND_URL_BASE, self.page_address())
    }

    /// The target list; always exactly one entry
    pub fn list_targets(&self) -> Vec<TargetDescriptor> {
        vec![TargetDescriptor {
            description: String::new(),
            devtools_frontend_url: self.devtools_frontend_url(),
            id: TARGET_ID.to_string(),
            title: self.title.clone(),
            target_type: TARGET_TYPE.to_string(),
            url: format!("file://{}", self.identifier),
            web_socket_debugger_url: self.web_socket_debugger_url(),
        }]
    }

    /// Runtime/protocol compatibility probe answer
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            browser: self.browser_version.clone(),
            protocol_version: self.protocol_version.clone(),
        }
    }

    /// Body of the 404 answer for an unknown path
    pub fn not_found_body(path: &str) -> String {
        format!("{} was not found", path)
    }
}
