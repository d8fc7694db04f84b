/*
 *  artwork.rs
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

//! Picks the artwork for the current media.
//!
//! The player's own cover wins unless generated art is forced. Otherwise the
//! catalogue stages run in order and the first URL ends the search, with a
//! generated image as the last resort. When nothing turns up the resolver
//! draws a fallback itself and says so through an `*Sent` variant.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::Settings;
use crate::imaging::ImagePipeline;
use crate::media::{MediaMode, MediaSnapshot};
use crate::modes::AiModel;
use crate::pixoo::PixelDisplay;
use crate::providers::{
    AiImageProvider, ArtworkProvider, DiscogsProvider, LastFmProvider, MusicBrainzProvider, ProviderError,
    SpotifyAlbumImage, SpotifyArtistImage, SpotifyClient, SpotifyFirstAlbumImage, TidalProvider,
};

const DIRECT_SOURCE: &str = "Direct";
const AI_SOURCE: &str = "AI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url { url: String, source: String },
    /// the TV icon is already on the panel
    TvIconSent,
    /// black screen plus a scrolling title is already on the panel
    InfoTextSent,
    /// a black screen is already on the panel
    BlackScreenSent,
}

impl ImageSource {
    pub fn is_sent(&self) -> bool {
        !matches!(self, ImageSource::Url { .. })
    }
}

/// Per update choices that follow the display mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub force_ai: bool,
    pub ai_model: AiModel,
}

pub struct ArtworkResolver {
    stages: Vec<Arc<dyn ArtworkProvider>>,
    ai_url: Option<String>,
    tv_icon: bool,
    info_fallback: bool,
}

fn built<P: ArtworkProvider + 'static>(name: &str, p: Result<P, ProviderError>) -> Option<Arc<dyn ArtworkProvider>> {
    match p {
        Ok(p) => Some(Arc::new(p)),
        Err(e) => {
            warn!("Skipping {} artwork stage: {}", name, e);
            None
        }
    }
}

/// Scrolling text for the info fallback: `"artist - title"` unless the
/// title already names the artist.
pub fn info_text(snapshot: &MediaSnapshot) -> String {
    let mut text = snapshot
        .cleaned_title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(&snapshot.title)
        .to_string();
    if text.is_empty() {
        text = "No Media Info".to_string();
    }
    if !snapshot.artist.is_empty() && !text.contains(&snapshot.artist) {
        text = format!("{} - {}", snapshot.artist, text);
    }
    text
}

impl ArtworkResolver {
    pub fn new(stages: Vec<Arc<dyn ArtworkProvider>>, tv_icon: bool, info_fallback: bool) -> Self {
        ArtworkResolver { stages, ai_url: None, tv_icon, info_fallback }
    }

    /// Overrides the generated image endpoint.
    pub fn with_ai_url(mut self, url: &str) -> Self {
        self.ai_url = Some(url.to_string());
        self
    }

    /// Catalogue stages for whatever credentials are configured, in chain order.
    pub fn from_settings(settings: &Settings) -> Self {
        let creds = &settings.credentials;
        let spotify = match SpotifyClient::from_credentials(creds) {
            Some(Ok(c)) => Some(Arc::new(c)),
            Some(Err(e)) => {
                warn!("Spotify client unavailable: {}", e);
                None
            }
            None => None,
        };

        let mut stages: Vec<Arc<dyn ArtworkProvider>> = Vec::new();
        if let Some(s) = &spotify {
            stages.push(Arc::new(SpotifyAlbumImage(s.clone())));
        }
        if let Some(token) = creds.discogs_token.as_deref() {
            stages.extend(built("Discogs", DiscogsProvider::new(token)));
        }
        if let Some(key) = creds.lastfm_api_key.as_deref() {
            stages.extend(built("Last.fm", LastFmProvider::new(key)));
        }
        if creds.has_tidal() {
            stages.push(Arc::new(TidalProvider));
        }
        if settings.musicbrainz_enabled {
            stages.extend(built("MusicBrainz", MusicBrainzProvider::new()));
        }
        if let Some(s) = &spotify {
            stages.push(Arc::new(SpotifyArtistImage(s.clone())));
            stages.push(Arc::new(SpotifyFirstAlbumImage(s.clone())));
        }
        info!("Artwork stages: {:?}", stages.iter().map(|s| s.name().to_string()).collect::<Vec<_>>());
        ArtworkResolver::new(stages, settings.tv_icon, settings.info_fallback)
    }

    fn ai_provider(&self, model: AiModel) -> AiImageProvider {
        match self.ai_url.as_deref() {
            Some(url) => AiImageProvider::with_url(model, url),
            None => AiImageProvider::new(model),
        }
    }

    async fn run_stages(&self, snapshot: &MediaSnapshot) -> Option<(String, String)> {
        for stage in &self.stages {
            if stage.music_only() && snapshot.mode != MediaMode::Music {
                continue;
            }
            info!("Trying {} fallback...", stage.name());
            match stage.attempt(snapshot).await {
                Ok(Some(url)) => {
                    info!("{} fallback found: {}", stage.name(), url);
                    return Some((url, stage.name().to_string()));
                }
                Ok(None) => {}
                Err(ProviderError::Missing(what)) => debug!("{}: missing {}", stage.name(), what),
                Err(e) => warn!("{} lookup failed: {}", stage.name(), e),
            }
        }
        None
    }

    /// Finds a URL for the pipeline, or draws a fallback and reports it.
    /// Records the satisfying source in `snapshot.pic_source`.
    pub async fn resolve_source(
        &self,
        snapshot: &mut MediaSnapshot,
        opts: ResolveOptions,
        display: &dyn PixelDisplay,
        images: &ImagePipeline,
    ) -> ImageSource {
        let mut found = None;
        if !opts.force_ai {
            if let Some(url) = snapshot.cover_url.clone().filter(|u| !u.is_empty()) {
                debug!("Using direct cover_url: {}", url);
                found = Some((url, DIRECT_SOURCE.to_string()));
            }
        }

        let searched = found.is_none();
        if searched {
            info!("Attempting fallback image sources.");
            display.send_info("Searching...").await;

            if !opts.force_ai {
                found = self.run_stages(snapshot).await;
            }

            if opts.force_ai || (found.is_none() && snapshot.ai_prompt.is_some()) {
                display.send_info("AI Image...").await;
                match self.ai_provider(opts.ai_model).attempt(snapshot).await {
                    Ok(Some(url)) => found = Some((url, AI_SOURCE.to_string())),
                    Ok(None) | Err(_) => {
                        warn!("AI image generation failed to produce a URL.");
                        display.send_info("AI Fail :(").await;
                    }
                }
            }
        }

        match found {
            Some((url, source)) => {
                info!("Final image URL to be processed: {} ({})", url, source);
                snapshot.pic_source = Some(source.clone());
                if searched {
                    display.send_info("Loading...").await;
                }
                ImageSource::Url { url, source }
            }
            None => self.fallback(snapshot, display, images).await,
        }
    }

    async fn fallback(&self, snapshot: &mut MediaSnapshot, display: &dyn PixelDisplay, images: &ImagePipeline) -> ImageSource {
        if snapshot.mode == MediaMode::Tv && self.tv_icon {
            info!("No image found, using TV icon.");
            display.send_info("TV Icon").await;
            if let Some(gif) = images.tv_icon_gif().await {
                display.display_gif(&gif).await;
            }
            snapshot.pic_source = Some("TV Icon".to_string());
            return ImageSource::TvIconSent;
        }

        if let Some(gif) = images.black_screen_gif().await {
            display.display_gif(&gif).await;
        }
        if self.info_fallback {
            info!("No image found, using info text on black screen fallback.");
            display.send_info(&info_text(snapshot)).await;
            ImageSource::InfoTextSent
        } else {
            info!("No image found and no specific fallbacks, sending black screen.");
            ImageSource::BlackScreenSent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_text() {
        let mut s = MediaSnapshot { title: "Song (Live)".into(), artist: "Band".into(), ..Default::default() };
        assert_eq!(info_text(&s), "Band - Song (Live)");
        s.cleaned_title = Some("Song".into());
        assert_eq!(info_text(&s), "Band - Song");
        s.title = String::new();
        s.cleaned_title = None;
        s.artist = String::new();
        assert_eq!(info_text(&s), "No Media Info");
        let s = MediaSnapshot { title: "Band - Song".into(), artist: "Band".into(), ..Default::default() };
        assert_eq!(info_text(&s), "Band - Song");
    }

    #[test]
    fn test_sent_variants() {
        assert!(ImageSource::BlackScreenSent.is_sent());
        assert!(!ImageSource::Url { url: "u".into(), source: "s".into() }.is_sent());
    }
}
