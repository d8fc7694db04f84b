/*
 *  main.rs
 *
 *  PixooArt - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};

use pixoo_art::config::{self, Cli, Settings};
use pixoo_art::modes::{CROP_MODE_OPTIONS, DISPLAY_MODE_OPTIONS};
use pixoo_art::service::{PixooService, SetupError};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

const SETUP_RETRY_MIN_SECS: u64 = 5;
const SETUP_RETRY_MAX_SECS: u64 = 300;

/// Waits for SIGINT, SIGTERM or SIGHUP.
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Keeps trying while the panel is unreachable, doubling the wait each time.
async fn start_with_retry(settings: &Settings) -> Result<Option<PixooService>, SetupError> {
    let mut wait = SETUP_RETRY_MIN_SECS;
    loop {
        match PixooService::start(settings).await {
            Ok(service) => return Ok(Some(service)),
            Err(e @ SetupError::NotReady(..)) => {
                warn!("{}. Retrying in {}s", e, wait);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                    _ = signal_handler() => return Ok(None),
                }
                wait = (wait * 2).min(SETUP_RETRY_MAX_SECS);
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_modes {
        println!("Display modes:");
        for mode in DISPLAY_MODE_OPTIONS {
            println!("  {}", mode);
        }
        println!("Crop modes:");
        for mode in CROP_MODE_OPTIONS {
            println!("  {}", mode);
        }
        return Ok(());
    }

    let cfg = config::load(&cli).context("loading configuration")?;
    if cli.dump_config {
        println!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(());
    }

    let level = if cli.debug { "debug".to_string() } else { cfg.log_level.clone().unwrap_or_else(|| "info".into()) };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let settings = Settings::from_config(&cfg).context("invalid configuration")?;
    info!("Driving Pixoo at {} from {}", settings.pixoo_ip, settings.media_player);

    let service = match start_with_retry(&settings).await {
        Ok(Some(service)) => service,
        Ok(None) => return Ok(()),
        Err(e) => {
            error!("Setup failed: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = signal_handler().await {
        error!("Signal handler failed: {}", e);
    }
    service.shutdown().await;
    info!("Bye.");
    Ok(())
}
