/*
 *  service.rs
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

//! Wires the components for one configured display and runs it.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::artwork::ArtworkResolver;
use crate::config::Settings;
use crate::hass::{HassError, HomeAssistant, MediaSource, StatePoller};
use crate::imaging::{HttpImageFetcher, ImageError, ImagePipeline};
use crate::lights::PeripheralTargets;
use crate::lyrics::LyricsEngine;
use crate::orchestrator::{Components, StatusReport, UpdateOrchestrator};
use crate::pixoo::{PixelDisplay, PixooDevice, PixooError};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Pixoo device at {0} is not reachable: {1}")]
    NotReady(String, PixooError),
    #[error("Home Assistant client: {0}")]
    Hass(#[from] HassError),
    #[error("Pixoo client: {0}")]
    Pixoo(#[from] PixooError),
    #[error("Image fetcher: {0}")]
    Image(#[from] ImageError),
    #[error("Lyrics client: {0}")]
    Lyrics(#[from] reqwest::Error),
}

/// A running display: poller, event loop and orchestrator.
pub struct PixooService {
    orchestrator: Arc<UpdateOrchestrator>,
    poller: Option<StatePoller>,
    event_loop: Option<JoinHandle<()>>,
    status_log: Option<JoinHandle<()>>,
}

/// Builds every component from settings, returning the orchestrator and the
/// host it reads. The device is probed once so an unreachable panel fails
/// setup instead of failing every update.
pub async fn build(settings: &Settings) -> Result<(UpdateOrchestrator, Arc<dyn MediaSource>), SetupError> {
    let hass = HomeAssistant::new(&settings.hass_url, settings.hass_token.as_deref())?;
    let device = PixooDevice::new(&settings.pixoo_ip)?;
    if let Err(e) = device.get_channel_index().await {
        return Err(SetupError::NotReady(settings.pixoo_ip.clone(), e));
    }
    info!("Pixoo device at {} is responding", settings.pixoo_ip);

    let display: Arc<dyn PixelDisplay> = Arc::new(device);
    let lights = PeripheralTargets::from_settings(Some(hass.clone()), &settings.light_entities, &settings.wled);
    let fetcher = HttpImageFetcher::new(&settings.hass_url, &settings.local_web_root)?;
    let images = ImagePipeline::new(Arc::new(fetcher), settings.images_cache_size);
    let artwork = ArtworkResolver::from_settings(settings);
    let lyrics = LyricsEngine::new(
        display.clone(),
        settings.lyrics_font,
        settings.lyrics_sync,
        settings.forced_font_color.clone(),
    )?;
    let media: Arc<dyn MediaSource> = Arc::new(hass);

    let orchestrator = UpdateOrchestrator::new(
        settings.clone(),
        Components { display, media: media.clone(), lights, images, artwork, lyrics },
    );
    Ok((orchestrator, media))
}

impl PixooService {
    pub async fn start(settings: &Settings) -> Result<Self, SetupError> {
        let (orchestrator, media) = build(settings).await?;
        Ok(Self::run(
            Arc::new(orchestrator),
            media,
            settings.media_player.clone(),
            Duration::from_millis(settings.poll_interval_ms),
        ))
    }

    /// Starts polling `entity_id` and feeding the orchestrator.
    pub fn run(
        orchestrator: Arc<UpdateOrchestrator>,
        source: Arc<dyn MediaSource>,
        entity_id: String,
        interval: Duration,
    ) -> Self {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let poller = StatePoller::start(source, entity_id, interval, events_tx);

        let orch = orchestrator.clone();
        let event_loop = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                orch.handle_event(event).await;
            }
            info!("Event stream closed.");
        });

        let status_log = tokio::spawn(log_status(orchestrator.subscribe()));

        PixooService {
            orchestrator,
            poller: Some(poller),
            event_loop: Some(event_loop),
            status_log: Some(status_log),
        }
    }

    pub fn orchestrator(&self) -> &Arc<UpdateOrchestrator> {
        &self.orchestrator
    }

    pub async fn shutdown(mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        // poller owned the sender, so the loop drains and ends
        if let Some(handle) = self.event_loop.take() {
            if let Err(e) = handle.await {
                error!("Event loop ended abnormally: {}", e);
            }
        }
        if let Some(handle) = self.status_log.take() {
            handle.abort();
        }
        self.orchestrator.shutdown().await;
        info!("Service stopped.");
    }
}

async fn log_status(mut rx: watch::Receiver<StatusReport>) {
    while rx.changed().await.is_ok() {
        let report = rx.borrow_and_update().clone();
        match serde_json::to_string(&report) {
            Ok(json) => debug!("status {}", json),
            Err(e) => error!("status report not serialisable: {}", e),
        }
        if !report.title.is_empty() {
            info!(
                "Now showing '{}' by '{}' ({})",
                report.title,
                report.artist,
                report.pic_source.as_deref().unwrap_or("no artwork")
            );
        }
    }
}
