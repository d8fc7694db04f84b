/*
 *  providers/mod.rs
 *
 *  PixooArt - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *  Artwork lookup services, one strategy per catalogue
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

pub mod ai;
pub mod discogs;
pub mod lastfm;
pub mod musicbrainz;
pub mod spotify;
pub mod tidal;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{CONNECT_TIMEOUT_MS, PROVIDER_TIMEOUT_MS, USER_AGENT};
use crate::media::MediaSnapshot;

pub use ai::AiImageProvider;
pub use discogs::DiscogsProvider;
pub use lastfm::LastFmProvider;
pub use musicbrainz::MusicBrainzProvider;
pub use spotify::{SpotifyAlbumImage, SpotifyArtistImage, SpotifyClient, SpotifyFirstAlbumImage};
pub use tidal::TidalProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("{0} is not available")]
    Unavailable(&'static str),
}

/// One stage of the artwork fallback chain.
#[async_trait]
pub trait ArtworkProvider: Send + Sync {
    /// Recorded as the snapshot's `pic_source` on success.
    fn name(&self) -> &str;

    /// Most catalogues only know about music.
    fn music_only(&self) -> bool {
        true
    }

    /// `Ok(None)` means the service answered without a usable image.
    async fn attempt(&self, snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError>;
}

/// Shared client setup for the catalogue services.
pub(crate) fn provider_client() -> Result<Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
    headers.insert("Accept", header::HeaderValue::from_static("application/json"));

    Client::builder()
        .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
        .default_headers(headers)
        .timeout(Duration::from_millis(PROVIDER_TIMEOUT_MS))
        .build()
}

/// GET and decode, mapping non-success statuses to [`ProviderError::Status`].
pub(crate) async fn get_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status.as_u16()));
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Artist and album, both non-empty, or a `Missing` error naming the gap.
pub(crate) fn artist_and_album(snapshot: &MediaSnapshot) -> Result<(&str, &str), ProviderError> {
    if snapshot.artist.is_empty() {
        return Err(ProviderError::Missing("artist"));
    }
    if snapshot.album.is_empty() {
        return Err(ProviderError::Missing("album"));
    }
    Ok((&snapshot.artist, &snapshot.album))
}
