//! Lure CLI
//!
//! `serve` runs the HTTP API together with the campaign scheduler;
//! `dispatch` runs a send worker. Workers scale horizontally and only share
//! the broker with the API. Without Redis, `serve` runs one worker itself.

mod commands;

use clap::{Parser, Subcommand};
use commands::{DispatchCommand, ServeCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LURE_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "LURE_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the campaign scheduler
    Serve(ServeCommand),
    /// Start an email send worker
    Dispatch(DispatchCommand),
}

fn log_filter(level: &str) -> anyhow::Result<tracing_subscriber::EnvFilter> {
    // RUST_LOG takes full control when set.
    if std::env::var("RUST_LOG").is_ok() {
        return tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG: {}", e));
    }
    tracing_subscriber::EnvFilter::try_new(format!(
        "lure={level},\
         lure_cli={level},\
         lure_core={level},\
         lure_database={level},\
         lure_migrations={level},\
         lure_identity={level},\
         lure_auth={level},\
         lure_tenants={level},\
         lure_queue={level},\
         lure_campaigns={level},\
         lure_dispatcher={level},\
         tower_http={level},\
         sqlx=warn,\
         sea_orm=warn,\
         sea_orm_migration=warn,\
         h2=warn,\
         tower=warn,\
         hyper=warn,\
         reqwest=warn,\
         rustls=warn,\
         lettre=warn,\
         redis=warn",
        level = level
    ))
    .map_err(|e| anyhow::anyhow!("Invalid log level {}: {}", level, e))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(log_filter(&cli.log_level)?)
        .with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
        Commands::Dispatch(dispatch_cmd) => dispatch_cmd.execute(),
    }
}
