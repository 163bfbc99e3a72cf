//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tentacle_core::Hook;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Interpreter settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Scripts attached to each hook
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Directory relative script paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve a script path against the configuration's directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Interpreter settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Number of pooled interpreters (defaults to the CPU count)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

fn default_pool_size() -> usize {
    num_cpus::get()
}

/// Scripts attached to each hook
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Request head script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_request_script: Option<ScriptSource>,

    /// Response head script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_response_script: Option<ScriptSource>,

    /// Request body script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_request_content_script: Option<ScriptSource>,

    /// Response body script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_response_content_script: Option<ScriptSource>,
}

impl PolicyConfig {
    /// Source configured for a hook
    pub fn source(&self, hook: Hook) -> Option<&ScriptSource> {
        match hook {
            Hook::OnRequest => self.on_request_script.as_ref(),
            Hook::OnResponse => self.on_response_script.as_ref(),
            Hook::OnRequestContent => self.on_request_content_script.as_ref(),
            Hook::OnResponseContent => self.on_response_content_script.as_ref(),
        }
    }

    /// Hooks with a configured source, in pipeline order
    pub fn sources(&self) -> impl Iterator<Item = (Hook, &ScriptSource)> + '_ {
        Hook::ALL
            .into_iter()
            .filter_map(move |hook| self.source(hook).map(|s| (hook, s)))
    }
}

/// Where a script's text comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScriptSource {
    /// Script text written in the configuration
    Inline(String),
    /// Script read from a file
    File {
        /// Script path, relative to the configuration file
        file: PathBuf,
    },
}
