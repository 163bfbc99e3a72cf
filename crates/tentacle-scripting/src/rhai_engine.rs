//! Rhai interpreter implementation

use crate::engine::{Bindings, Interpreter};
use crate::error::Result;
use crate::result::{ExecutionResult, ResultState};
use crate::view::{RequestView, ResponseView};
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Map, Module, Scope};
use std::collections::BTreeMap;
use tentacle_core::ExecutionContext;
use tracing::{debug, info, trace, warn};

type RhaiResult<T> = std::result::Result<T, Box<EvalAltResult>>;

/// Rhai interpreter
///
/// Scripts are compiled on every evaluation and run with full host trust: no
/// operation, depth or size limits are applied beyond Rhai's defaults.
#[derive(Debug)]
pub struct RhaiInterpreter {
    engine: Engine,
}

impl RhaiInterpreter {
    /// Create an interpreter with the policy API registered
    pub fn new() -> Self {
        let mut engine = Engine::new();

        engine.on_print(|msg| info!(target: "tentacle::script", "{}", msg));
        engine.on_debug(|msg, source, pos| {
            debug!(target: "tentacle::script", source = source.unwrap_or("inline"), %pos, "{}", msg)
        });

        Self::register_state(&mut engine);
        Self::register_result(&mut engine);
        Self::register_request(&mut engine);
        Self::register_response(&mut engine);
        Self::register_context(&mut engine);
        Self::register_functions(&mut engine);

        Self { engine }
    }

    /// `State::SUCCESS` / `State::FAILURE`
    fn register_state(engine: &mut Engine) {
        let mut module = Module::new();
        module.set_var("SUCCESS", ResultState::Success);
        module.set_var("FAILURE", ResultState::Failure);
        engine.register_static_module("State", module.into());

        engine
            .register_type_with_name::<ResultState>("State")
            .register_fn("==", |a: ResultState, b: ResultState| a == b)
            .register_fn("!=", |a: ResultState, b: ResultState| a != b)
            .register_fn("to_string", |s: &mut ResultState| s.to_string())
            .register_fn("to_debug", |s: &mut ResultState| s.to_string());
    }

    fn register_result(engine: &mut Engine) {
        engine
            .register_type_with_name::<ExecutionResult>("Result")
            .register_get("state", |r: &mut ExecutionResult| r.state)
            .register_set("state", |r: &mut ExecutionResult, state: ResultState| {
                r.state = state
            })
            .register_get("code", |r: &mut ExecutionResult| {
                r.code.map(Dynamic::from).unwrap_or(Dynamic::UNIT)
            })
            .register_set("code", |r: &mut ExecutionResult, code: i64| r.code = Some(code))
            .register_set("code", |r: &mut ExecutionResult, _: ()| r.code = None)
            .register_get("error", |r: &mut ExecutionResult| optional(r.error.clone()))
            .register_set("error", |r: &mut ExecutionResult, error: ImmutableString| {
                r.error = Some(error.to_string())
            })
            .register_set("error", |r: &mut ExecutionResult, _: ()| r.error = None)
            .register_get("content_type", |r: &mut ExecutionResult| {
                optional(r.content_type.clone())
            })
            .register_set(
                "content_type",
                |r: &mut ExecutionResult, content_type: ImmutableString| {
                    r.content_type = Some(content_type.to_string())
                },
            )
            .register_set("content_type", |r: &mut ExecutionResult, _: ()| {
                r.content_type = None
            })
            .register_fn("fail", |r: &mut ExecutionResult, code: i64, error: &str| {
                r.fail(code, error)
            })
            .register_fn(
                "fail",
                |r: &mut ExecutionResult, code: i64, error: &str, content_type: &str| {
                    r.fail(code, error);
                    r.content_type = Some(content_type.to_string());
                },
            );
    }

    fn register_request(engine: &mut Engine) {
        engine
            .register_type_with_name::<RequestView>("Request")
            .register_get("id", |v: &mut RequestView| v.request().id().to_string())
            .register_get("method", |v: &mut RequestView| v.request().method().to_string())
            .register_get("uri", |v: &mut RequestView| v.request().uri().to_string())
            .register_get("path", |v: &mut RequestView| v.request().path())
            .register_get("query", |v: &mut RequestView| optional(v.request().query()))
            .register_get("version", |v: &mut RequestView| {
                format!("{:?}", v.request().version())
            })
            .register_get("headers", |v: &mut RequestView| {
                header_map(v.request().header_map())
            })
            .register_get("content", |v: &mut RequestView| {
                optional(v.content().map(str::to_string))
            })
            .register_fn("header", |v: &mut RequestView, name: &str| {
                optional(v.request().header(name))
            })
            .register_fn("has_header", |v: &mut RequestView, name: &str| {
                v.request().header(name).is_some()
            })
            .register_fn(
                "set_header",
                |v: &mut RequestView, name: &str, value: &str| -> RhaiResult<()> {
                    v.request()
                        .set_header(name, value)
                        .map_err(|e| e.to_string().into())
                },
            )
            .register_fn("remove_header", |v: &mut RequestView, name: &str| {
                optional(v.request().remove_header(name))
            });
    }

    fn register_response(engine: &mut Engine) {
        engine
            .register_type_with_name::<ResponseView>("Response")
            .register_get("status", |v: &mut ResponseView| {
                i64::from(v.response().status().as_u16())
            })
            .register_set(
                "status",
                |v: &mut ResponseView, code: i64| -> RhaiResult<()> {
                    v.response()
                        .set_status(code)
                        .map_err(|e| e.to_string().into())
                },
            )
            .register_get("headers", |v: &mut ResponseView| {
                header_map(v.response().header_map())
            })
            .register_get("content", |v: &mut ResponseView| {
                optional(v.content().map(str::to_string))
            })
            .register_fn("header", |v: &mut ResponseView, name: &str| {
                optional(v.response().header(name))
            })
            .register_fn("has_header", |v: &mut ResponseView, name: &str| {
                v.response().header(name).is_some()
            })
            .register_fn(
                "set_header",
                |v: &mut ResponseView, name: &str, value: &str| -> RhaiResult<()> {
                    v.response()
                        .set_header(name, value)
                        .map_err(|e| e.to_string().into())
                },
            )
            .register_fn("remove_header", |v: &mut ResponseView, name: &str| {
                optional(v.response().remove_header(name))
            });
    }

    fn register_context(engine: &mut Engine) {
        fn get(ctx: &mut ExecutionContext, key: &str) -> RhaiResult<Dynamic> {
            match ctx.get(key) {
                Some(value) => rhai::serde::to_dynamic(value),
                None => Ok(Dynamic::UNIT),
            }
        }

        fn set(ctx: &mut ExecutionContext, key: &str, value: Dynamic) -> RhaiResult<()> {
            let value: serde_json::Value = rhai::serde::from_dynamic(&value)?;
            ctx.set(key, value);
            Ok(())
        }

        engine
            .register_type_with_name::<ExecutionContext>("Context")
            .register_get("request_id", |c: &mut ExecutionContext| {
                c.request_id().to_string()
            })
            .register_get("attributes", |c: &mut ExecutionContext| -> RhaiResult<Dynamic> {
                rhai::serde::to_dynamic(c.attributes())
            })
            .register_fn("get", get)
            .register_fn("set", set)
            .register_indexer_get(get)
            .register_indexer_set(set)
            .register_fn("contains", |c: &mut ExecutionContext, key: &str| c.contains(key))
            .register_fn("remove", |c: &mut ExecutionContext, key: &str| -> RhaiResult<Dynamic> {
                match c.remove(key) {
                    Some(value) => rhai::serde::to_dynamic(value),
                    None => Ok(Dynamic::UNIT),
                }
            });
    }

    /// Register helper functions available to every script
    fn register_functions(engine: &mut Engine) {
        // JSON
        engine.register_fn("json_decode", |s: &str| -> RhaiResult<Dynamic> {
            let value: serde_json::Value =
                serde_json::from_str(s).map_err(|e| format!("Invalid JSON: {}", e))?;
            rhai::serde::to_dynamic(value)
        });

        engine.register_fn("json_encode", |value: Dynamic| -> RhaiResult<String> {
            let value: serde_json::Value = rhai::serde::from_dynamic(&value)?;
            Ok(value.to_string())
        });

        // String utilities
        engine.register_fn("base64_encode", |s: &str| -> String {
            use base64::{engine::general_purpose, Engine as _};
            general_purpose::STANDARD.encode(s.as_bytes())
        });

        engine.register_fn("base64_decode", |s: &str| -> RhaiResult<String> {
            use base64::{engine::general_purpose, Engine as _};
            let bytes = general_purpose::STANDARD
                .decode(s.as_bytes())
                .map_err(|e| format!("Invalid base64: {}", e))?;
            String::from_utf8(bytes).map_err(|e| format!("Invalid UTF-8: {}", e).into())
        });

        // Utility functions
        engine.register_fn("unix_time", || -> i64 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default()
        });

        engine.register_fn("uuid", || -> String { uuid::Uuid::new_v4().to_string() });

        // Logging (for debugging scripts)
        engine.register_fn("log_debug", |msg: &str| {
            debug!(script_log = msg);
        });

        engine.register_fn("log_info", |msg: &str| {
            info!(script_log = msg);
        });

        engine.register_fn("log_warn", |msg: &str| {
            warn!(script_log = msg);
        });
    }
}

impl Default for RhaiInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for RhaiInterpreter {
    fn language(&self) -> &'static str {
        "rhai"
    }

    fn compile(&self, source: &str) -> Result<()> {
        self.engine.compile(source)?;
        Ok(())
    }

    fn evaluate(&self, source: &str, bindings: &mut Bindings) -> Result<Option<String>> {
        let ast = self.engine.compile(source)?;

        let mut scope = Scope::new();
        scope
            .push(Bindings::REQUEST, bindings.request.clone())
            .push(Bindings::RESPONSE, bindings.response.clone())
            .push(Bindings::CONTEXT, bindings.context.clone())
            .push(Bindings::RESULT, bindings.result.clone());

        let value: Dynamic = self.engine.eval_ast_with_scope(&mut scope, &ast)?;

        match scope.get_value::<ExecutionResult>(Bindings::RESULT) {
            Some(result) => bindings.result = result,
            None => warn!("Script replaced the `result` binding, keeping the original record"),
        }

        let text = stringify(value)?;
        trace!(returned = text.is_some(), "Rhai script evaluated");
        Ok(text)
    }
}

/// Convert a script's final value to text
fn stringify(value: Dynamic) -> Result<Option<String>> {
    if value.is_unit() {
        return Ok(None);
    }
    if value.is_map() || value.is_array() {
        let json: serde_json::Value = rhai::serde::from_dynamic(&value)?;
        return Ok(Some(json.to_string()));
    }
    if value.is_string() {
        return Ok(value.into_string().ok());
    }
    Ok(Some(value.to_string()))
}

fn optional(value: Option<String>) -> Dynamic {
    value.map(Dynamic::from).unwrap_or(Dynamic::UNIT)
}

fn header_map(headers: BTreeMap<String, String>) -> Map {
    headers
        .into_iter()
        .map(|(k, v)| (k.into(), Dynamic::from(v)))
        .collect()
}
