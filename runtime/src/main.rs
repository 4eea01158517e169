// Copyright 2026 Pricescout Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pricescout_runtime::backend::BrowserProfile;
use pricescout_runtime::cli;
use pricescout_runtime::config::ServiceConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "pricescout",
    about = "Pricescout: concurrent product-page scraper for Flipkart and Amazon",
    version
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP scrape service
    Serve(ServeArgs),
    /// Scrape a single product URL and print the JSON envelope
    Scrape {
        /// Product page URL
        url: String,
    },
}

/// Overrides applied on top of `PRICESCOUT_*` environment settings.
#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,
    /// HTTP port
    #[arg(long)]
    port: Option<u16>,
    /// Fixed local port for the browser driver
    #[arg(long)]
    driver_port: Option<u16>,
    /// Path to the Chromium binary
    #[arg(long)]
    chromium_path: Option<PathBuf>,
    /// Browser flag set (stable, fast)
    #[arg(long)]
    browser_profile: Option<BrowserProfile>,
    /// Max seconds to queue for the browser lease
    #[arg(long)]
    lease_timeout_secs: Option<u64>,
    /// Overall per-request deadline in seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl ServeArgs {
    fn apply(self, config: &mut ServiceConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(port) = self.driver_port {
            config.driver_port = port;
        }
        if let Some(path) = self.chromium_path {
            config.chromium_path = Some(path);
        }
        if let Some(profile) = self.browser_profile {
            config.browser_profile = profile;
        }
        if let Some(secs) = self.lease_timeout_secs {
            config.lease_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.deadline_secs {
            config.request_deadline = Duration::from_secs(secs);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose, cli.log_json);

    let mut config = ServiceConfig::from_env();

    match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut config);
            cli::serve::run(config).await
        }
        Commands::Scrape { url } => {
            if !cli::scrape_cmd::run(config, url).await? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
