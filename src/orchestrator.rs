/*
 *  orchestrator.rs
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

//! Decides what goes on the panel and drives the peripherals.
//!
//! Every update, event driven or forced, runs under one lock so writes to
//! the display never interleave. A pause is given a few seconds to turn
//! back into playback before the panel is blanked; that timer is the only
//! work scheduled outside the lock and it re-takes the lock when it fires.

use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::artwork::{ArtworkResolver, ImageSource, ResolveOptions};
use crate::config::Settings;
use crate::constants::{ITEMLIST_ACTIVE_TEXT_ID, ITEMLIST_INACTIVE_TEXT_ID, PAUSE_DEBOUNCE_MS};
use crate::deutils::seconds_to_hms;
use crate::hass::{EntityState, HostEvent, MediaSource};
use crate::imaging::{ImagePipeline, RenderConfig};
use crate::lights::{LightCommand, PeripheralTargets, brightness_pct};
use crate::lyrics::LyricsEngine;
use crate::media::{MediaMode, MediaSnapshot, PlaybackState, SnapshotContext};
use crate::modes::{ITEMLIST_MODES, NO_ITEMLIST_MODES, NO_LYRICS_MODES, ResolvedFeatureFlags, resolve};
use crate::pixoo::{PixelDisplay, build_item_list};

/// What the panel is showing, for observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub display_mode: String,
    pub crop_mode: String,
    pub state: PlaybackState,
    pub mode: MediaMode,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub pic_source: Option<String>,
    pub cover_url: Option<String>,
    pub lyrics_available: bool,
    pub temperature: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
}

/// Everything an orchestrator drives, built by the caller.
pub struct Components {
    pub display: Arc<dyn PixelDisplay>,
    pub media: Arc<dyn MediaSource>,
    pub lights: PeripheralTargets,
    pub images: ImagePipeline,
    pub artwork: ArtworkResolver,
    pub lyrics: LyricsEngine,
}

struct UpdateState {
    flags: ResolvedFeatureFlags,
    last_state: Option<PlaybackState>,
    last_track: Option<String>,
}

struct Shared {
    settings: Settings,
    parts: Components,
    update: Mutex<UpdateState>,
    off_timer: StdMutex<Option<JoinHandle<()>>>,
    off_generation: AtomicU64,
    status_tx: watch::Sender<StatusReport>,
}

pub struct UpdateOrchestrator {
    shared: Arc<Shared>,
}

impl UpdateOrchestrator {
    pub fn new(settings: Settings, parts: Components) -> Self {
        let flags = resolve(&settings.display_mode, &settings.crop_mode, &settings.originals);
        info!("Display mode '{}', crop mode '{}'", flags.display_mode, flags.crop_mode);
        let (status_tx, _) = watch::channel(StatusReport::default());
        UpdateOrchestrator {
            shared: Arc::new(Shared {
                settings,
                parts,
                update: Mutex::new(UpdateState { flags, last_state: None, last_track: None }),
                off_timer: StdMutex::new(None),
                off_generation: AtomicU64::new(0),
                status_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.shared.status_tx.subscribe()
    }

    pub async fn flags(&self) -> ResolvedFeatureFlags {
        self.shared.update.lock().await.flags.clone()
    }

    pub async fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::StateChange { old, new } => self.handle_state_change(old, new).await,
            HostEvent::Tick { position_ms } => self.shared.tick_lyrics(position_ms).await,
        }
    }

    pub async fn handle_state_change(&self, old: Option<String>, new: EntityState) {
        self.cancel_off_timer();
        let state = PlaybackState::parse(&new.state);
        debug!("State change {} -> {}", old.as_deref().unwrap_or("none"), state.as_str());

        if state.is_off_like() {
            info!("Media player is {}. Processing off/idle/paused state.", state.as_str());
            if state == PlaybackState::Paused {
                self.schedule_off_handling();
            } else {
                self.shared.off_handling().await;
            }
            self.shared.update.lock().await.last_state = Some(state);
            return;
        }

        let mut st = self.shared.update.lock().await;
        if state == PlaybackState::Playing && st.last_state.is_some_and(|s| s.is_off_like()) {
            info!("Media player started playing (was {:?}). Clearing image cache.", st.last_state);
            self.shared.parts.images.clear_cache();
        }
        st.last_state = Some(state);
        self.shared.run_update(&mut st).await;
    }

    /// Full refresh from the current player state.
    pub async fn force_update(&self) {
        info!("Force updating Pixoo display.");
        let mut st = self.shared.update.lock().await;
        self.shared.run_update(&mut st).await;
    }

    pub async fn set_display_mode(&self, mode: &str) {
        let mut st = self.shared.update.lock().await;
        let crop = st.flags.crop_mode.clone();
        st.flags = resolve(mode, &crop, &self.shared.settings.originals);
        info!("Display mode set to '{}'", st.flags.display_mode);
        self.shared.mode_changed(&mut st).await;
    }

    pub async fn set_crop_mode(&self, crop: &str) {
        let mut st = self.shared.update.lock().await;
        let mode = st.flags.display_mode.clone();
        st.flags = resolve(&mode, crop, &self.shared.settings.originals);
        info!("Crop mode set to '{}'", st.flags.crop_mode);
        self.shared.mode_changed(&mut st).await;
    }

    pub fn set_lyrics_sync(&self, sync_ms: i32) {
        self.shared.parts.lyrics.set_sync(sync_ms);
    }

    fn schedule_off_handling(&self) {
        let generation = self.shared.off_generation.load(Ordering::SeqCst);
        let shared = self.shared.clone();
        debug!("Delaying paused processing by {}ms.", PAUSE_DEBOUNCE_MS);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(PAUSE_DEBOUNCE_MS)).await;
            if shared.off_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            shared.off_handling().await;
        });
        *self.shared.off_timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Safe to call with nothing pending or after the timer fired.
    fn cancel_off_timer(&self) {
        self.shared.off_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.shared.off_timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
            debug!("Cancelled pending off-state timer.");
        }
    }

    pub async fn shutdown(&self) {
        self.cancel_off_timer();
        self.shared.parts.lyrics.shutdown().await;
        info!("Orchestrator shut down.");
    }
}

impl Drop for UpdateOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.shared.off_timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

impl Shared {
    async fn refresh(&self, flags: &ResolvedFeatureFlags) -> MediaSnapshot {
        let media = &self.parts.media;
        let player = media.entity_state(&self.settings.media_player).await;
        let temperature = match self.settings.temperature_sensor.as_deref() {
            Some(id) if flags.show_temperature => media.entity_state(id).await,
            _ => None,
        };
        let ctx = SnapshotContext {
            show_clock: flags.show_clock,
            force_ai: flags.force_ai,
            clean_title: self.settings.clean_title,
        };
        MediaSnapshot::from_state(player.as_ref(), temperature.as_ref(), ctx, Utc::now())
    }

    async fn mode_changed(&self, st: &mut UpdateState) {
        self.parts.images.clear_cache();
        st.last_track = None;
        if !st.flags.show_lyrics {
            self.parts.lyrics.reset().await;
        }
        self.run_update(st).await;
    }

    async fn run_update(&self, st: &mut UpdateState) {
        let mut snapshot = self.refresh(&st.flags).await;
        info!(
            "Executing display update for {} ({}, {}) at {}",
            self.settings.media_player,
            snapshot.state.as_str(),
            snapshot.mode.as_str(),
            seconds_to_hms(snapshot.position_ms as f64 / 1000.0)
        );

        if snapshot.is_playing() {
            self.check_track(st, &snapshot).await;
        }

        if !snapshot.is_playing() && !matches!(snapshot.state, PlaybackState::On | PlaybackState::Paused) {
            self.render_inactive(st, &snapshot).await;
        } else {
            self.render_active(st, &mut snapshot).await;
        }
        st.last_state = Some(snapshot.state);
        self.publish(st, &snapshot).await;
    }

    /// Loads lyrics when the track changes.
    async fn check_track(&self, st: &mut UpdateState, snapshot: &MediaSnapshot) {
        let key = snapshot.track_key();
        if st.last_track.as_deref() == Some(key.as_str()) {
            return;
        }
        st.last_track = Some(key);
        if st.flags.show_lyrics && snapshot.is_music() {
            self.parts.lyrics.fetch(&snapshot.artist, &snapshot.title).await;
        } else {
            self.parts.lyrics.reset().await;
        }
    }

    async fn off_handling(&self) {
        let mut st = self.update.lock().await;
        let snapshot = self.refresh(&st.flags).await;
        self.render_inactive(&mut st, &snapshot).await;
        self.publish(&st, &snapshot).await;
        info!("Pixoo display and lights handled for '{}' state.", snapshot.state.as_str());
    }

    async fn render_inactive(&self, st: &mut UpdateState, snapshot: &MediaSnapshot) {
        let display = &self.parts.display;
        if self.settings.full_control {
            if let Some(gif) = self.parts.images.black_screen_gif().await {
                display.display_gif(&gif).await;
            }
            let items = build_item_list(
                ITEMLIST_INACTIVE_TEXT_ID,
                st.flags.show_clock,
                st.flags.show_temperature,
                self.settings.clock_align,
                snapshot.temperature.as_deref(),
                self.settings.forced_font_color.as_deref(),
            );
            display.send_item_list(&items).await;
        } else {
            info!("Full control is off, leaving the display alone.");
        }
        self.parts.lyrics.reset().await;
        st.last_track = None;
        self.parts.lights.off().await;
    }

    async fn render_active(&self, st: &mut UpdateState, snapshot: &mut MediaSnapshot) {
        let flags = st.flags.clone();
        let display = &self.parts.display;
        let images = &self.parts.images;
        let lights = &self.parts.lights;

        if snapshot.mode == MediaMode::Tv && self.settings.tv_icon && snapshot.cover_url.is_none() {
            info!("TV mode is active, no specific art. Displaying TV icon.");
            if let Some(gif) = images.tv_icon_gif().await {
                display.display_gif(&gif).await;
            }
            lights.off().await;
            return;
        }

        let opts = ResolveOptions { force_ai: flags.force_ai, ai_model: flags.ai_model };
        let source = self.parts.artwork.resolve_source(snapshot, opts, display.as_ref(), images).await;

        let mut image_sent = false;
        match &source {
            ImageSource::Url { url, .. } => {
                let cfg = RenderConfig::new(&self.settings, &flags);
                match images.render(snapshot, url, &cfg, true).await {
                    Some(processed) => {
                        lights
                            .apply(LightCommand::On {
                                ambient: Some(processed.background_color),
                                accent: Some(processed.accent_rgb()),
                                brightness_pct: Some(brightness_pct(processed.brightness as f32)),
                            })
                            .await;
                        info!("Sending image data to Pixoo device.");
                        display.display_gif(&processed.gif_base64).await;
                        image_sent = true;
                        if flags.spotify_slide && snapshot.is_spotify {
                            warn!("Spotify slide show is selected but not available, showing the album art.");
                        }
                    }
                    None => {
                        warn!("Failed to get final image data. Sending black screen as fallback.");
                        if let Some(gif) = images.black_screen_gif().await {
                            display.display_gif(&gif).await;
                            image_sent = true;
                        }
                        lights.off().await;
                    }
                }
            }
            ImageSource::BlackScreenSent => lights.off().await,
            ImageSource::TvIconSent | ImageSource::InfoTextSent => {
                debug!("Fallback handled the display directly: {:?}", source);
            }
        }

        self.send_overlay(&flags, snapshot, image_sent).await;

        if flags.show_lyrics && snapshot.is_playing() && !flags.mode_in(NO_LYRICS_MODES) {
            if self.parts.lyrics.has_lyrics().await {
                self.parts.lyrics.tick(snapshot.position_ms, true).await;
            }
        }
    }

    /// Clock/temperature item list, or an empty one to wipe a stale overlay.
    async fn send_overlay(&self, flags: &ResolvedFeatureFlags, snapshot: &MediaSnapshot, image_sent: bool) {
        let any = flags.show_clock || flags.show_temperature;
        let show = !flags.mode_in(NO_ITEMLIST_MODES)
            && (flags.mode_in(ITEMLIST_MODES) || (flags.special_mode && any) || (!image_sent && any));

        let items = if show {
            let mode = flags.display_mode.to_lowercase();
            build_item_list(
                ITEMLIST_ACTIVE_TEXT_ID,
                flags.show_clock || mode.contains("clock"),
                flags.show_temperature || mode.contains("temperature"),
                self.settings.clock_align,
                snapshot.temperature.as_deref(),
                self.settings.forced_font_color.as_deref(),
            )
        } else {
            Vec::new()
        };

        if !items.is_empty() {
            self.parts.display.send_item_list(&items).await;
        } else if image_sent {
            debug!("Clearing previous ItemList by sending empty list.");
            self.parts.display.send_item_list(&[]).await;
        }
    }

    async fn tick_lyrics(&self, position_ms: u64) {
        let st = self.update.lock().await;
        let enabled = st.flags.show_lyrics && !st.flags.mode_in(NO_LYRICS_MODES);
        if st.last_state == Some(PlaybackState::Playing) {
            self.parts.lyrics.tick(position_ms, enabled).await;
        }
    }

    async fn publish(&self, st: &UpdateState, snapshot: &MediaSnapshot) {
        let report = StatusReport {
            display_mode: st.flags.display_mode.clone(),
            crop_mode: st.flags.crop_mode.clone(),
            state: snapshot.state,
            mode: snapshot.mode,
            title: snapshot.title.clone(),
            artist: snapshot.artist.clone(),
            album: snapshot.album.clone(),
            pic_source: snapshot.pic_source.clone(),
            cover_url: snapshot.cover_url.clone(),
            lyrics_available: self.parts.lyrics.has_lyrics().await,
            temperature: snapshot.temperature.clone(),
            updated_at: Some(Local::now()),
        };
        self.status_tx.send_replace(report);
    }
}
