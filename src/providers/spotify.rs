/*
 *  providers/spotify.rs
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

//! Spotify Web API with client credentials.
//!
//! One track search feeds three stages of the chain: the matched album
//! image, the artist image and the first album image among the results.
//! The search result is remembered per track so the later stages don't
//! search again.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, header};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{ArtworkProvider, ProviderError, get_json, provider_client};
use crate::config::Credentials;
use crate::media::MediaSnapshot;

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_LIMIT: &str = "5";
/// Renew this long before the advertised expiry.
const TOKEN_MARGIN_SECS: u64 = 60;

/// What one track search turned up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotifyMatch {
    pub album_image: Option<String>,
    pub artist_image: Option<String>,
    pub first_album_image: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    api_url: String,
    token_url: String,
    client: Client,
    token: Mutex<Option<CachedToken>>,
    last_match: Mutex<Option<(String, SpotifyMatch)>>,
}

pub fn track_query(artist: &str, title: &str, album: &str) -> String {
    let mut q = format!("artist:{} track:{}", artist, title);
    if !album.is_empty() {
        q.push_str(" album:");
        q.push_str(album);
    }
    q
}

fn first_image(v: &Value) -> Option<String> {
    v.get("images")?.as_array()?.first()?.get("url")?.as_str().map(str::to_string)
}

impl SpotifyClient {
    /// None unless both id and secret are configured.
    pub fn from_credentials(creds: &Credentials) -> Option<Result<Self, ProviderError>> {
        let id = creds.spotify_client_id.as_deref()?;
        let secret = creds.spotify_client_secret.as_deref()?;
        Some(Self::with_urls(id, secret, SPOTIFY_API_URL, SPOTIFY_TOKEN_URL))
    }

    pub fn with_urls(id: &str, secret: &str, api_url: &str, token_url: &str) -> Result<Self, ProviderError> {
        Ok(SpotifyClient {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            client: provider_client()?,
            token: Mutex::new(None),
            last_match: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(t) = cached.as_ref().filter(|t| Instant::now() < t.expires_at) {
            return Ok(t.value.clone());
        }

        let request = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials");
        let body = get_json(request).await?;
        let value = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(ProviderError::Missing("access_token"))?
            .to_string();
        let lifetime = body.get("expires_in").and_then(Value::as_u64).unwrap_or(3600);
        let expires_at = Instant::now() + Duration::from_secs(lifetime.saturating_sub(TOKEN_MARGIN_SECS));
        info!("Successfully obtained Spotify access token.");
        *cached = Some(CachedToken { value: value.clone(), expires_at });
        Ok(value)
    }

    async fn api_get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_url, path);
        debug!("Fetching Spotify JSON from {}", url);
        get_json(self.client.get(url).bearer_auth(token).query(query)).await
    }

    async fn search(&self, snapshot: &MediaSnapshot) -> Result<SpotifyMatch, ProviderError> {
        let query = track_query(&snapshot.artist, &snapshot.title, &snapshot.album);
        let data = self
            .api_get("/search", &[("q", query.as_str()), ("type", "track"), ("limit", SEARCH_LIMIT)])
            .await?;
        let items = data
            .get("tracks")
            .and_then(|t| t.get("items"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let Some(best) = items.first() else {
            warn!("No Spotify track found for query: {}", query);
            return Ok(SpotifyMatch::default());
        };

        let album_image = best.get("album").and_then(first_image);
        let first_album_image = items.iter().filter_map(|i| i.get("album").and_then(first_image)).next();

        let artist_id = best
            .get("artists")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str);
        let artist_image = match artist_id {
            Some(id) => match self.api_get(&format!("/artists/{}", id), &[]).await {
                Ok(artist) => first_image(&artist),
                Err(e) => {
                    debug!("Spotify artist {} lookup failed: {}", id, e);
                    None
                }
            },
            None => None,
        };
        Ok(SpotifyMatch { album_image, artist_image, first_album_image })
    }

    /// Search once per track. Only completed searches are remembered; a
    /// failed one is tried again by the next stage or update.
    pub async fn match_for(&self, snapshot: &MediaSnapshot) -> Result<SpotifyMatch, ProviderError> {
        if snapshot.artist.is_empty() || snapshot.title.is_empty() {
            return Err(ProviderError::Missing("artist and title"));
        }
        let key = snapshot.track_key();
        let mut last = self.last_match.lock().await;
        if let Some((k, m)) = last.as_ref() {
            if *k == key {
                return Ok(m.clone());
            }
        }
        let found = self.search(snapshot).await?;
        *last = Some((key, found.clone()));
        Ok(found)
    }
}

macro_rules! spotify_stage {
    ($name:ident, $label:literal, $field:ident) => {
        pub struct $name(pub Arc<SpotifyClient>);

        #[async_trait]
        impl ArtworkProvider for $name {
            fn name(&self) -> &str {
                $label
            }

            async fn attempt(&self, snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
                Ok(self.0.match_for(snapshot).await?.$field)
            }
        }
    };
}

spotify_stage!(SpotifyAlbumImage, "Spotify (Album)", album_image);
spotify_stage!(SpotifyArtistImage, "Spotify (Artist)", artist_image);
spotify_stage!(SpotifyFirstAlbumImage, "Spotify (First Album Match)", first_album_image);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_query() {
        assert_eq!(track_query("Air", "La Femme", ""), "artist:Air track:La Femme");
        assert_eq!(track_query("Air", "La Femme", "Moon Safari"), "artist:Air track:La Femme album:Moon Safari");
    }

    #[tokio::test]
    async fn test_requires_artist_and_title() {
        let c = SpotifyClient::with_urls("id", "secret", "http://127.0.0.1:9", "http://127.0.0.1:9/token").unwrap();
        let snap = MediaSnapshot { artist: "Air".into(), ..Default::default() };
        assert!(matches!(c.match_for(&snap).await, Err(ProviderError::Missing(_))));
    }

    #[test]
    fn test_needs_both_credentials() {
        let creds = Credentials { spotify_client_id: Some("id".into()), ..Default::default() };
        assert!(SpotifyClient::from_credentials(&creds).is_none());
    }
}
