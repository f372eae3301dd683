//! svcstack - Lambda clients and functions from the command line
//!
//! `invoke` calls an action on a remote function; `serve` hosts a small
//! diagnostic function under the Lambda runtime. Both can ship logs and
//! counters to CloudWatch when the `logger` / `counters` sections are set.

mod config;
mod diagnostics;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Settings;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use svcstack_cloudwatch::{CloudWatchCounters, CloudWatchLogger};
use svcstack_core::{CachedCounters, Configurable, Logger, Openable, Parameters};
use svcstack_lambda::{LambdaClient, LambdaFunction, ShutdownHooks};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "svcstack")]
#[command(about = "Call and host Lambda functions", long_about = None)]
struct Args {
    /// Configuration file (YAML, JSON or TOML)
    #[arg(short, long, env = "SVCSTACK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SVCSTACK_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call an action on the function configured under `client`
    Invoke {
        /// Action name
        command: String,

        /// Call arguments as a JSON object
        #[arg(long)]
        args: Option<String>,

        /// Queue the call and return without a result
        #[arg(long)]
        one_way: bool,

        /// Correlation id; generated when omitted
        #[arg(long)]
        trace_id: Option<String>,
    },

    /// Host the diagnostic function (`ping`, `echo`) under the Lambda runtime
    Serve,
}

/// Optional CloudWatch sinks
struct Sinks {
    logger: Option<Arc<CloudWatchLogger>>,
    counters: Option<Arc<CloudWatchCounters>>,
}

impl Sinks {
    fn from_settings(settings: &Settings) -> Self {
        let logger = settings.logger_enabled().then(|| {
            let mut logger = CloudWatchLogger::new();
            logger.configure(&settings.logger);
            Arc::new(logger)
        });
        let counters = settings.counters_enabled().then(|| {
            let mut counters = CloudWatchCounters::new();
            counters.configure(&settings.counters);
            Arc::new(counters)
        });
        Self { logger, counters }
    }

    /// Cache published by the counters sink, or a local one
    fn cache(&self) -> CachedCounters {
        self.counters
            .as_ref()
            .map_or_else(CachedCounters::new, |c| c.counters().clone())
    }

    fn openables(&self) -> Vec<Arc<dyn Openable>> {
        let mut openables: Vec<Arc<dyn Openable>> = Vec::new();
        if let Some(logger) = &self.logger {
            openables.push(logger.clone());
        }
        if let Some(counters) = &self.counters {
            openables.push(counters.clone());
        }
        openables
    }

    /// Open every sink, registering its close with `hooks`
    async fn open(&self, trace_id: Option<&str>, hooks: &mut ShutdownHooks) -> anyhow::Result<()> {
        for sink in self.openables() {
            sink.open(trace_id).await.context("Failed to open CloudWatch sink")?;
            hooks.register("cloudwatch-sink", move || async move { sink.close(None).await });
        }
        Ok(())
    }
}

fn parse_args(raw: Option<&str>) -> anyhow::Result<Parameters> {
    let Some(raw) = raw else {
        return Ok(Parameters::new());
    };
    match serde_json::from_str::<Value>(raw).context("Call arguments are not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Call arguments must be a JSON object, got {}", other),
    }
}

async fn invoke(
    settings: &Settings,
    command: &str,
    args: Option<&str>,
    one_way: bool,
    trace_id: Option<&str>,
) -> anyhow::Result<()> {
    let args = parse_args(args)?;
    let sinks = Sinks::from_settings(settings);
    let mut hooks = ShutdownHooks::new();

    if let Err(err) = sinks.open(trace_id, &mut hooks).await {
        hooks.run_all().await;
        return Err(err);
    }

    let mut client = LambdaClient::new().with_counters(sinks.cache());
    client.configure(&settings.client);
    let client = Arc::new(client);

    let outcome = match client.open(trace_id).await {
        Ok(()) => {
            let closing = client.clone();
            hooks.register("lambda-client", move || async move { closing.close(None).await });
            if one_way {
                client.call_one_way(command, trace_id, &args).await.map(|()| None)
            } else {
                client.call(command, trace_id, &args).await.map(Some)
            }
        }
        Err(err) => Err(err),
    };

    if let (Err(err), Some(logger)) = (&outcome, &sinks.logger) {
        logger.error(trace_id, Some(err), &format!("Failed to call {}", command));
    }

    let failed = hooks.run_all().await;
    if failed > 0 {
        warn!(failed, "Some resources did not close cleanly");
    }

    match outcome.with_context(|| format!("Call to {} failed", command))? {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => info!(command = %command, "One-way call sent"),
    }
    Ok(())
}

async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let sinks = Sinks::from_settings(settings);

    let mut function = LambdaFunction::new("svcstack", None).with_counters(sinks.cache());
    function.configure(&settings.function);
    if let Some(logger) = &sinks.logger {
        function = function.with_logger(logger.clone());
    }
    for dependency in sinks.openables() {
        function = function.with_dependency(dependency);
    }
    diagnostics::register(&function).context("Failed to register actions")?;
    let function = Arc::new(function);

    let mut hooks = ShutdownHooks::new();
    let closing = function.clone();
    hooks.register("lambda-function", move || async move { closing.close(None).await });

    info!(function = %function.name(), "Serving lambda function");
    let result = tokio::select! {
        result = svcstack_lambda::runtime::serve(function.clone()) => {
            result.map_err(|e| anyhow::anyhow!(e)).context("Lambda runtime stopped")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    hooks.run_all().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load(args.config.as_deref())?;

    match &args.command {
        Command::Invoke {
            command,
            args: call_args,
            one_way,
            trace_id,
        } => invoke(&settings, command, call_args.as_deref(), *one_way, trace_id.as_deref()).await,
        Command::Serve => serve(&settings).await,
    }
}
