//! FogSift client - load site data through a persistent local cache
//!
//! A command-line client for the FogSift site API: loads the wiki index,
//! sitemap, articles and metadata, caching responses on disk and dropping
//! them when a new site build is deployed.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fogsift::app::App;
use fogsift::cli::{Cli, Command};
use fogsift::config::Config;
use fogsift::refresh::{RefreshConfig, RefreshHandle, RefreshMessage};

/// Installs the tracing subscriber, logging to stderr
///
/// Defaults to "info" for this crate; `--verbose` or `FOGSIFT_DEBUG` raise
/// it to "debug", and `RUST_LOG` overrides both.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "fogsift=debug" } else { "fogsift=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Prints refresh progress until Ctrl+C
async fn watch(app: &App, interval_secs: u64) {
    let config = RefreshConfig {
        interval: Duration::from_secs(interval_secs.max(1)),
        enabled: true,
    };
    let mut handle = RefreshHandle::spawn(app.client().clone(), config);

    loop {
        tokio::select! {
            message = handle.receiver.recv() => match message {
                Some(RefreshMessage::RefreshStarted) => println!("refresh started"),
                Some(RefreshMessage::BuildSynced(Some(build))) => println!("build {}", build),
                Some(RefreshMessage::BuildSynced(None)) => println!("build unknown"),
                Some(RefreshMessage::ResourceLoaded(resource)) => println!("{:<10} ok", resource.name()),
                Some(RefreshMessage::RefreshError(e)) => eprintln!("error: {}", e),
                Some(RefreshMessage::RefreshCompleted) => println!("refresh completed"),
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping refresh");
                break;
            }
        }
    }

    handle.shutdown().await;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.apply_overrides(Config::from_env());
    init_tracing(config.debug);

    let app = App::from_config(config);

    if let Command::Watch { interval_secs } = cli.command {
        watch(&app, interval_secs).await;
        return ExitCode::SUCCESS;
    }

    let mut stdout = io::stdout().lock();
    if let Err(e) = app.run(&cli.command, &mut stdout).await {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
