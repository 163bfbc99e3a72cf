//! Tentacle CLI

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tentacle_config::load_config;
use tentacle_core::{
    ExecutionContext, GatewayRequest, GatewayResponse, PolicyChain, PolicyFailure,
    RecordingChain, TransformableStream,
};
use tentacle_scripting::{ScriptPolicy, ScriptRunner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tentacle")]
#[command(about = "Tentacle script policy engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and compile every script
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "tentacle.yaml")]
        config: PathBuf,
    },

    /// Run the configured hooks against a synthetic exchange
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "tentacle.yaml")]
        config: PathBuf,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path and query
        #[arg(short, long, default_value = "/")]
        path: String,

        /// Request header as `name:value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the request body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Upstream response status
        #[arg(long, default_value_t = 200)]
        status: u16,

        /// Upstream response body
        #[arg(long)]
        response_body: Option<String>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info", env = "TENTACLE_LOG")]
        log_level: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            init_tracing("info")?;
            tracing::info!("Checking configuration: {}", config.display());

            let cfg = load_config(&config)?;
            let scripts = cfg.resolve_scripts()?;
            let policy =
                ScriptPolicy::with_runner(scripts, ScriptRunner::with_pool_size(1));

            let mut failed = 0;
            for (hook, result) in policy.validate() {
                match result {
                    Ok(()) => println!("✓ {hook}"),
                    Err(e) => {
                        failed += 1;
                        println!("✗ {hook}: {}", e.detailed());
                    }
                }
            }
            println!("  Pool size: {}", cfg.engine.pool_size);

            if failed > 0 {
                bail!("{failed} script(s) failed to compile");
            }
            Ok(())
        }

        Commands::Run {
            config,
            method,
            path,
            headers,
            body,
            body_file,
            status,
            response_body,
            log_level,
        } => {
            init_tracing(&log_level)?;

            let cfg = load_config(&config)?;
            let policy = ScriptPolicy::with_runner(
                cfg.resolve_scripts()?,
                ScriptRunner::with_pool_size(cfg.engine.pool_size),
            );

            let request_body = match (body, body_file) {
                (Some(body), _) => Some(Bytes::from(body)),
                (None, Some(file)) => Some(Bytes::from(
                    std::fs::read(&file)
                        .with_context(|| format!("reading {}", file.display()))?,
                )),
                (None, None) => None,
            };

            let exchange = Exchange::build(&method, &path, &headers, status)?;
            let response_body = response_body.map(Bytes::from);

            tokio::task::spawn_blocking(move || {
                exchange.run(&policy, request_body, response_body)
            })
            .await?
        }

        Commands::Version => {
            println!("Tentacle script policy engine");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

/// Synthetic request/response pair driven through the hooks
struct Exchange {
    request: GatewayRequest,
    response: GatewayResponse,
    context: ExecutionContext,
    chain: Arc<RecordingChain>,
}

impl Exchange {
    fn build(method: &str, path: &str, headers: &[String], status: u16) -> Result<Self> {
        let mut builder = http::Request::builder().method(method).uri(path);
        for header in headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| anyhow!("header must be name:value, got {header:?}"))?;
            builder = builder.header(name.trim(), value.trim());
        }
        let (request, _) = GatewayRequest::from_request(builder.body(())?);

        let response = http::Response::builder().status(status).body(())?;
        let (response, _) = GatewayResponse::from_response(response);

        let context = ExecutionContext::new(request.id());
        Ok(Self {
            request,
            response,
            context,
            chain: Arc::new(RecordingChain::new()),
        })
    }

    fn run(
        &self,
        policy: &ScriptPolicy,
        request_body: Option<Bytes>,
        response_body: Option<Bytes>,
    ) -> Result<()> {
        println!("> {} {}", self.request.method(), self.request.uri());

        policy.on_request(&self.request, &self.response, &self.context, &*self.chain);
        if self.stopped("onRequest") {
            return Ok(());
        }

        let stream =
            policy.on_request_content(&self.request, &self.response, &self.context, self.chain());
        let request_body = self.stream("onRequestContent", stream, request_body)?;
        if self.stopped("onRequestContent") {
            return Ok(());
        }
        print_head("request", &self.request.header_map());
        print_body("request", request_body.as_ref());

        policy.on_response(&self.request, &self.response, &self.context, &*self.chain);
        if self.stopped("onResponse") {
            return Ok(());
        }

        let stream =
            policy.on_response_content(&self.request, &self.response, &self.context, self.chain());
        let response_body = self.stream("onResponseContent", stream, response_body)?;
        if self.stopped("onResponseContent") {
            return Ok(());
        }

        println!("< {}", self.response.status());
        print_head("response", &self.response.header_map());
        print_body("response", response_body.as_ref());

        let attributes = self.context.attributes();
        if !attributes.is_empty() {
            println!("  context: {}", serde_json::to_string(&attributes)?);
        }
        Ok(())
    }

    fn chain(&self) -> Arc<dyn PolicyChain> {
        self.chain.clone()
    }

    fn stream(
        &self,
        hook: &str,
        stream: Option<TransformableStream>,
        body: Option<Bytes>,
    ) -> Result<Option<Bytes>> {
        let Some(mut stream) = stream else {
            return Ok(body);
        };
        if let Some(body) = &body {
            stream.write(body);
        }
        stream
            .end()
            .with_context(|| format!("{hook} aborted the stream"))
    }

    fn stopped(&self, hook: &str) -> bool {
        let Some(failure) = self.chain.failure() else {
            return false;
        };
        println!("✗ {hook} failed: {failure}");
        print_failure(&failure);
        true
    }
}

fn print_failure(failure: &PolicyFailure) {
    match failure.to_response() {
        Ok(response) => {
            println!("< {}", response.status());
            for (name, value) in response.headers() {
                println!("  {}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            println!("{}", String::from_utf8_lossy(response.body()));
        }
        Err(e) => tracing::error!(error = %e, "Unable to render failure response"),
    }
}

fn print_head(side: &str, headers: &std::collections::BTreeMap<String, String>) {
    println!("  {side} headers:");
    for (name, value) in headers {
        println!("    {name}: {value}");
    }
}

fn print_body(side: &str, body: Option<&Bytes>) {
    match body {
        Some(body) => println!("  {side} body: {}", String::from_utf8_lossy(body)),
        None => println!("  {side} body: <none>"),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into()))
        .init();

    Ok(())
}
