//! Configuration loading

use crate::{Config, ConfigFormat, ScriptSource};
use regex::Regex;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use tentacle_core::{Error, HookScripts, Result};

/// Load configuration from a file
///
/// Relative script paths in the file are resolved against its directory.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    let format = ConfigFormat::from_path(path)?;

    let mut config = load_from_str(&content, format)?;
    config.base_dir = path.parent().map(Path::to_path_buf);

    tracing::debug!(path = %path.display(), ?format, "Loaded configuration");
    Ok(config)
}

/// Expand environment variables in configuration string
/// Supports syntax: ${VAR} and ${VAR:-default}
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                return Err(Error::Config(format!(
                    "Environment variable '{var_name}' not set and no default provided"
                )));
            }
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load configuration from a string
///
/// Environment variables are expanded in every string value except inline
/// scripts, whose `${...}` belongs to Rhai. A value that is a single
/// placeholder expanding to a number or boolean takes that type.
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Config> {
    let mut document: Value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {e}")))?,
        ConfigFormat::Toml => toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?,
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse JSON: {e}")))?,
    };

    expand_document(&mut document)?;

    serde_json::from_value(document)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
}

fn expand_document(document: &mut Value) -> Result<()> {
    let sections = match document {
        Value::Object(sections) => sections,
        other => return expand_value(other),
    };

    for (section, value) in sections.iter_mut() {
        match (section.as_str(), value) {
            ("policy", Value::Object(hooks)) => {
                for script in hooks.values_mut() {
                    // Inline script text is left as written
                    if !script.is_string() {
                        expand_value(script)?;
                    }
                }
            }
            (_, value) => expand_value(value)?,
        }
    }
    Ok(())
}

fn expand_value(value: &mut Value) -> Result<()> {
    match value {
        Value::String(text) => {
            let expanded = expand_env_vars(text)?;
            if expanded != *text {
                *value = typed_scalar(text, expanded)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                expand_value(item)?;
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                expand_value(field)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn typed_scalar(original: &str, expanded: String) -> Result<Value> {
    if placeholder_regex()?.is_match(original) {
        if let Ok(scalar @ (Value::Number(_) | Value::Bool(_))) =
            serde_json::from_str::<Value>(&expanded)
        {
            return Ok(scalar);
        }
    }
    Ok(Value::String(expanded))
}

fn placeholder_regex() -> Result<Regex> {
    Regex::new(r"^\$\{[A-Za-z_][A-Za-z0-9_]*(:-[^}]*)?\}$")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))
}

/// Load and validate configuration
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = load_from_file(path)?;
    crate::validator::validate_config(&config)?;
    Ok(config)
}

impl Config {
    /// Read every configured script into hook scripts
    pub fn resolve_scripts(&self) -> Result<HookScripts> {
        let mut scripts = HookScripts::new();

        for (hook, source) in self.policy.sources() {
            let text = match source {
                ScriptSource::Inline(text) => text.clone(),
                ScriptSource::File { file } => {
                    let path = self.resolve_path(file);
                    fs::read_to_string(&path).map_err(|e| {
                        Error::Config(format!(
                            "Failed to read script for {hook} from {}: {e}",
                            path.display()
                        ))
                    })?
                }
            };
            scripts = scripts.with(hook, text);
        }

        Ok(scripts)
    }
}
