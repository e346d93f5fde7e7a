use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use seldon_ingress_operator::{controller, Error};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Only watch SeldonDeployments in this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Port of the health/metrics HTTP server
    #[cfg(feature = "rest-api")]
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    api_port: u16,

    #[command(flatten)]
    ingress: controller::IngressDefaults,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Seldon Ingress Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_format);

    info!(
        "Starting Seldon Ingress Operator v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "Ingress defaults: enabled={} class={:?} host={:?} path_type={:?} grpc={} policy={:?}",
        args.ingress.enabled,
        args.ingress.class_name,
        args.ingress.host,
        args.ingress.path_type,
        args.ingress.grpc_enabled,
        args.ingress.path_policy
    );

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let ingress_enabled = args.ingress.enabled;
    let state = Arc::new(controller::ControllerState::new(
        client,
        args.ingress,
        args.namespace,
    ));

    #[cfg(feature = "rest-api")]
    {
        let port = args.api_port;
        tokio::spawn(async move {
            if let Err(e) = seldon_ingress_operator::rest_api::run_server(port).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    controller::run_controller(state).await?;

    if !ingress_enabled {
        // Keep serving /health until asked to stop
        tokio::signal::ctrl_c().await.map_err(|e| {
            Error::ConfigError(format!("Failed to listen for shutdown signal: {}", e))
        })?;
        info!("Shutdown signal received");
    }

    Ok(())
}
