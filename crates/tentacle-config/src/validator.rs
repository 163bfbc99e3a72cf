//! Configuration validation

use crate::{Config, ScriptSource};
use tentacle_core::{Error, Result};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_engine(config)?;
    validate_policy(config)?;
    Ok(())
}

fn validate_engine(config: &Config) -> Result<()> {
    if config.engine.pool_size == 0 {
        return Err(Error::Config("engine.pool_size must be > 0".to_string()));
    }

    if config.engine.pool_size > 1024 {
        tracing::warn!(
            pool_size = config.engine.pool_size,
            "engine.pool_size is very high"
        );
    }

    Ok(())
}

fn validate_policy(config: &Config) -> Result<()> {
    for (hook, source) in config.policy.sources() {
        match source {
            ScriptSource::Inline(script) if script.trim().is_empty() => {
                tracing::debug!(%hook, "Blank script, hook will pass through");
            }
            ScriptSource::Inline(_) => {}
            ScriptSource::File { file } => {
                let path = config.resolve_path(file);
                if !path.is_file() {
                    return Err(Error::Config(format!(
                        "Script file for {} not found: {}",
                        hook,
                        path.display()
                    )));
                }
            }
        }
    }

    if config.policy.sources().next().is_none() {
        tracing::warn!("No scripts configured, every hook passes through");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, PolicyConfig};
    use std::path::PathBuf;

    #[test]
    fn test_zero_pool_size_rejected() {
        let config = Config {
            engine: EngineConfig { pool_size: 0 },
            ..Default::default()
        };

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn test_missing_script_file_rejected() {
        let config = Config {
            policy: PolicyConfig {
                on_response_script: Some(ScriptSource::File {
                    file: PathBuf::from("does/not/exist.rhai"),
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("onResponse"));
        assert!(err.to_string().contains("exist.rhai"));
    }

    #[test]
    fn test_inline_scripts_accepted() {
        let config = Config {
            policy: PolicyConfig {
                on_request_script: Some(ScriptSource::Inline("true".to_string())),
                on_request_content_script: Some(ScriptSource::Inline("  ".to_string())),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(validate_config(&config).is_ok());
    }
}
