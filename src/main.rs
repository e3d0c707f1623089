//! cable-gateway binary.
//!
//! Wires the stock collaborators into the runner: the RPC controller
//! (HTTP backend, or the in-process acceptor when `ws_rpc.path` is set) and
//! the HTTP broadcast subscriber.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cable_gateway::config::loader::parse_config;
use cable_gateway::config::{validate_config, ConfigError, GatewayConfig};
use cable_gateway::http::ServerOptions;
use cable_gateway::node::Controller;
use cable_gateway::pubsub::{HttpSubscriber, Subscriber};
use cable_gateway::rpc::RpcController;
use cable_gateway::{BoxError, Runner};

#[derive(Parser)]
#[command(name = "cable-gateway")]
#[command(version, about = "Real-time websocket gateway", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// WebSocket endpoint path
    #[arg(long)]
    path: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    /// text or json
    #[arg(long)]
    log_format: Option<String>,

    /// RPC backend URL
    #[arg(long)]
    rpc_url: Option<String>,
}

impl Cli {
    fn config(&self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => parse_config(&fs::read_to_string(path).map_err(ConfigError::Io)?)?,
            None => GatewayConfig::default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.path {
            config.server.path = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(url) = &self.rpc_url {
            config.rpc.url = url.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

async fn run(config: GatewayConfig) -> Result<(), BoxError> {
    let mut runner = Runner::new("", config);

    runner
        .controller_factory(|_metrics, config| {
            let controller: Arc<dyn Controller> = Arc::new(RpcController::from_config(&config.rpc)?);
            Ok(controller)
        })?
        .subscriber_factory(|handler, config| {
            let options = ServerOptions::from_config(&config.server);
            let subscriber: Arc<dyn Subscriber> =
                Arc::new(HttpSubscriber::new(handler, &config.broadcast, &options)?);
            Ok(subscriber)
        })?;

    runner.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway stopped with an error");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
