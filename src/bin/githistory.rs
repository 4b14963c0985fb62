use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{self, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use githistory::config::{Config, DEFAULT_HEARTBEAT_INTERVAL};
use githistory::github::client::{DEFAULT_GRAPHQL_URL, DEFAULT_REST_BASE_URL};
use githistory::transport::HttpServerApp;

#[derive(Parser)]
#[command(author, version = "0.1.0", about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server with JSON and SSE endpoints
    Serve {
        /// Address to bind the HTTP server to
        #[arg(short, long, default_value = "0.0.0.0:5000")]
        address: String,

        /// Enable debug logging
        #[arg(short, long)]
        debug: bool,

        /// GitHub API token for authentication
        #[arg(short = 't', long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        /// Seconds between heartbeat events on open streams
        #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_secs())]
        heartbeat_secs: u64,

        /// GitHub GraphQL endpoint
        #[arg(long, default_value = DEFAULT_GRAPHQL_URL)]
        graphql_url: String,

        /// GitHub REST API base URL
        #[arg(long, default_value = DEFAULT_REST_BASE_URL)]
        rest_base_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            address,
            debug,
            github_token,
            heartbeat_secs,
            graphql_url,
            rest_base_url,
        } => {
            init_tracing(debug);

            let bind_addr: SocketAddr = address.parse()?;
            if heartbeat_secs == 0 {
                anyhow::bail!("--heartbeat-secs must be greater than zero");
            }
            if github_token.is_none() {
                tracing::warn!("No GitHub token provided; GraphQL requests will be rejected");
            }

            let config = Config {
                bind_addr,
                github_token,
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                graphql_url,
                rest_base_url,
            };
            run_http_server(config).await
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("info,{}={}", env!("CARGO_CRATE_NAME"), level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false), // Disable ANSI color codes
        )
        .init();
}

async fn run_http_server(config: Config) -> Result<()> {
    let app = HttpServerApp::new(config);

    tracing::info!("GitHub history server starting on http://{}", app.bind_addr());
    tracing::debug!(
        "Streams available under http://{}/api/user/{{login}}/...",
        app.bind_addr()
    );

    app.serve().await
}
