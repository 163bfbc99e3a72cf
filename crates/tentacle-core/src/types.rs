//! Common types used throughout Tentacle

use crate::{Error, Result};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle point at which a policy script may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hook {
    /// Request head received, body not visible
    OnRequest,
    /// Response head received, body not visible
    OnResponse,
    /// Request body available for transformation
    OnRequestContent,
    /// Response body available for transformation
    OnResponseContent,
}

impl Hook {
    /// All hooks in gateway pipeline order
    pub const ALL: [Hook; 4] = [
        Hook::OnRequest,
        Hook::OnRequestContent,
        Hook::OnResponse,
        Hook::OnResponseContent,
    ];

    /// Name used in configuration and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnRequest => "onRequest",
            Self::OnResponse => "onResponse",
            Self::OnRequestContent => "onRequestContent",
            Self::OnResponseContent => "onResponseContent",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which body a stream transformation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodySide {
    /// Request body (client to upstream)
    Request,
    /// Response body (upstream to client)
    Response,
}

impl BodySide {
    /// Content hook that transforms this body
    pub fn content_hook(&self) -> Hook {
        match self {
            Self::Request => Hook::OnRequestContent,
            Self::Response => Hook::OnResponseContent,
        }
    }
}

impl fmt::Display for BodySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
        }
    }
}

/// Script text configured for each hook
///
/// A missing or whitespace-only script turns the hook into a pass-through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookScripts {
    /// Script run on the request head
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_request_script: Option<String>,

    /// Script run on the response head
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_response_script: Option<String>,

    /// Script run on the request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_request_content_script: Option<String>,

    /// Script run on the response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_response_content_script: Option<String>,
}

impl HookScripts {
    /// Create an empty configuration (every hook passes through)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the script for a hook
    pub fn with(mut self, hook: Hook, script: impl Into<String>) -> Self {
        *self.slot_mut(hook) = Some(script.into());
        self
    }

    /// Configured script for a hook, `None` when absent or blank
    pub fn script(&self, hook: Hook) -> Option<&str> {
        let script = match hook {
            Hook::OnRequest => &self.on_request_script,
            Hook::OnResponse => &self.on_response_script,
            Hook::OnRequestContent => &self.on_request_content_script,
            Hook::OnResponseContent => &self.on_response_content_script,
        };
        script.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Hooks that have a non-blank script, in pipeline order
    pub fn configured(&self) -> impl Iterator<Item = (Hook, &str)> + '_ {
        Hook::ALL
            .into_iter()
            .filter_map(move |hook| self.script(hook).map(|s| (hook, s)))
    }

    fn slot_mut(&mut self, hook: Hook) -> &mut Option<String> {
        match hook {
            Hook::OnRequest => &mut self.on_request_script,
            Hook::OnResponse => &mut self.on_response_script,
            Hook::OnRequestContent => &mut self.on_request_content_script,
            Hook::OnResponseContent => &mut self.on_response_content_script,
        }
    }
}

pub(crate) fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::try_from(name).map_err(|e| Error::invalid_header(name, e))
}

pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value).map_err(|e| Error::invalid_header(name, e))
}

pub(crate) fn header_lookup(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Flatten headers into a sorted name -> value map, joining repeated values with ", "
pub(crate) fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        snapshot
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    snapshot
}
