mod api;
mod gateway;

use clap::{Parser, Subcommand};
use parley_channels::http::HttpGateway;
use parley_core::{
    config::{self, shellexpand, Prompts},
    traits::{ChatStore, Provider},
};
use parley_memory::SqliteStore;
use parley_providers::{AnthropicProvider, OpenAiProvider};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "parley",
    version,
    about = "Parley - message-handling core for a conversational agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, env = "PARLEY_CONFIG", default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server and the message gateway.
    Start,
    /// Check configuration, store and provider availability.
    Status,
}

/// Stdout plus a daily-rolling file under `{data_dir}/logs/`. The returned
/// guard must stay alive for the file writer to flush.
fn init_tracing(cfg: &config::Config) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = format!("{}/logs", shellexpand(&cfg.parley.data_dir));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "parley.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.parley.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let _guard = init_tracing(&cfg);

            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                anyhow::bail!(
                    "provider '{}' is not available. Is the API key set?",
                    provider.name()
                );
            }

            let store: Option<Arc<dyn ChatStore>> = match SqliteStore::new(&cfg.memory).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    error!("durable store unavailable, running cache-only: {e}");
                    None
                }
            };

            let channel = Arc::new(HttpGateway::new(&cfg.delivery));
            let prompts = Prompts::load(&cfg.parley.data_dir);
            let cancel = CancellationToken::new();

            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received");
                }
                shutdown.cancel();
            });

            println!("{} - Starting agent...", cfg.parley.name);
            let (tx, rx) = mpsc::channel(256);
            let gw = Arc::new(gateway::Gateway::new(
                provider,
                channel,
                store.clone(),
                cfg.clone(),
                prompts,
                cancel.clone(),
            ));

            let api_state = api::ApiState::new(&cfg.api, tx, store, gw.supervisor().clone());
            let api_task = tokio::spawn(api::serve(cfg.api.clone(), api_state, cancel.clone()));

            gw.run(rx).await;
            cancel.cancel();
            if let Err(e) = api_task.await {
                error!("API server task failed: {e}");
            }
        }
        Commands::Status => {
            println!("{} - Status Check\n", cfg.parley.name);
            println!("Config: {}", cli.config);
            println!("Data dir: {}", shellexpand(&cfg.parley.data_dir));
            println!("Default provider: {}", cfg.provider.default);
            println!("Delivery: {}", cfg.delivery.base_url);
            println!("API: {}:{}", cfg.api.host, cfg.api.port);
            println!();

            let store = match SqliteStore::new(&cfg.memory).await {
                Ok(store) => match store.ping().await {
                    Ok(()) => "ok".to_string(),
                    Err(e) => format!("unreachable ({e})"),
                },
                Err(e) => format!("unavailable ({e})"),
            };
            println!("  store ({}): {store}", shellexpand(&cfg.memory.db_path));

            match build_provider(&cfg) {
                Ok(provider) => println!(
                    "  provider {}: {}",
                    provider.name(),
                    if provider.is_available().await {
                        "available"
                    } else {
                        "missing api key"
                    }
                ),
                Err(e) => println!("  provider: {e}"),
            }

            let individual = &cfg.onboarding.individual;
            let group = &cfg.onboarding.group;
            println!(
                "  onboarding: individual {} ({} fields), group {} ({} fields)",
                if individual.is_active() { "on" } else { "off" },
                individual.fields.len(),
                if group.is_active() { "on" } else { "off" },
                group.fields.len(),
            );
        }
    }

    Ok(())
}

/// Build the configured provider.
fn build_provider(cfg: &config::Config) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "openai" => {
            let oa = cfg.provider.openai.clone().unwrap_or_default();
            Ok(Arc::new(OpenAiProvider::from_config(&oa)))
        }
        "anthropic" => {
            let an = cfg.provider.anthropic.clone().unwrap_or_default();
            Ok(Arc::new(AnthropicProvider::from_config(&an)))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}
