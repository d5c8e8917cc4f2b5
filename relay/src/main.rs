//! `cws` - Cirrus CI webhooks server.
//!
//! Runs the intake server with the integration picked on the command line
//! until SIGINT or SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cws::config::{DatadogArgs, GetdxArgs, GETDX_EVENT_TYPES};
use cws::datadog::{ApiSender, DogstatsdSender};
use cws::web::is_signature_verification_enabled;
use cws::{
    Cli, Command, ConfigError, DatadogDispatcher, DatadogSender, Dispatcher, EventFilter,
    GetdxDispatcher, IntakeServer, ServerConfig, ServerError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize structured JSON logging
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    match run(cli.command).await {
        Ok(()) => {
            info!("cws_shutdown_complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "cws_failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let (integration, config, dispatcher) = match command {
        Command::Datadog(args) => {
            let (config, dispatcher) = datadog(args).await?;
            ("datadog", config, dispatcher)
        }
        Command::Getdx(args) => {
            let (config, dispatcher) = getdx(args)?;
            ("getdx", config, dispatcher)
        }
    };

    info!(
        integration,
        http_addr = %config.http_addr,
        http_path = %config.http_path,
        secret_configured = is_signature_verification_enabled(&config.secret_token),
        event_types = %config.event_filter.describe(),
        "config_loaded"
    );

    let server = IntakeServer::bind(Arc::new(config), dispatcher)
        .await
        .context("Failed to start the intake server")?;

    match server.run(shutdown_signal()).await {
        Err(ServerError::Cancelled) => Ok(()),
        Err(e) => Err(e.into()),
        Ok(never) => match never {},
    }
}

async fn datadog(args: DatadogArgs) -> Result<(ServerConfig, Arc<dyn Dispatcher>)> {
    let config = ServerConfig::from_args(&args.server, EventFilter::new(args.event_types))?;

    let api_key = args.api_key.filter(|k| !k.is_empty());
    let sender = match (args.dogstatsd_addr.filter(|a| !a.is_empty()), api_key) {
        (Some(addr), _) => DatadogSender::Dogstatsd(DogstatsdSender::new(&addr).await?),
        (None, Some(api_key)) => DatadogSender::Api(ApiSender::new(api_key, &args.api_site)?),
        (None, None) => return Err(ConfigError::NoSender.into()),
    };

    info!(sender = sender.kind(), "datadog_sender_created");

    Ok((config, Arc::new(DatadogDispatcher::new(sender))))
}

fn getdx(args: GetdxArgs) -> Result<(ServerConfig, Arc<dyn Dispatcher>)> {
    let config =
        ServerConfig::from_args(&args.server, EventFilter::new(GETDX_EVENT_TYPES.iter().copied()))?;

    let instance = args
        .dx_instance
        .filter(|i| !i.is_empty())
        .ok_or(ConfigError::MissingDxInstance)?;

    let dispatcher = GetdxDispatcher::new(&instance, args.dx_api_key)?;
    info!(endpoint = %dispatcher.endpoint(), "getdx_dispatcher_created");

    Ok((config, Arc::new(dispatcher)))
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("cws_shutting_down");
}
