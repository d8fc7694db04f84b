//! MusicBrainz release-group search followed by a Cover Art Archive lookup.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::{ArtworkProvider, ProviderError, artist_and_album, get_json, provider_client};
use crate::media::MediaSnapshot;

const MUSICBRAINZ_URL: &str = "https://musicbrainz.org/ws/2/release-group";
const COVER_ART_URL: &str = "https://coverartarchive.org/release-group";

pub struct MusicBrainzProvider {
    search_url: String,
    cover_url: String,
    client: Client,
}

impl MusicBrainzProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_urls(MUSICBRAINZ_URL, COVER_ART_URL)
    }

    pub fn with_urls(search_url: &str, cover_url: &str) -> Result<Self, ProviderError> {
        Ok(MusicBrainzProvider {
            search_url: search_url.to_string(),
            cover_url: cover_url.trim_end_matches('/').to_string(),
            client: provider_client()?,
        })
    }
}

pub fn release_group_query(artist: &str, album: &str) -> String {
    format!("artist:\"{}\" AND releasegroup:\"{}\"", artist, album)
}

fn release_group_id(body: &Value) -> Option<&str> {
    body.get("release-groups")?.as_array()?.first()?.get("id")?.as_str()
}

fn front_image(body: &Value) -> Option<String> {
    body.get("images")?
        .as_array()?
        .iter()
        .filter(|img| img.get("front").and_then(Value::as_bool).unwrap_or(false))
        .find_map(|img| img.get("image").and_then(Value::as_str).filter(|u| !u.is_empty()))
        .map(str::to_string)
}

#[async_trait]
impl ArtworkProvider for MusicBrainzProvider {
    fn name(&self) -> &str {
        "MusicBrainz/CAA"
    }

    async fn attempt(&self, snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
        let (artist, album) = artist_and_album(snapshot)?;
        let query = release_group_query(artist, album);
        let search = get_json(
            self.client
                .get(&self.search_url)
                .query(&[("query", query.as_str()), ("fmt", "json"), ("limit", "1")]),
        )
        .await?;
        let Some(rgid) = release_group_id(&search) else {
            debug!("MusicBrainz: no release group for {} - {}", artist, album);
            return Ok(None);
        };

        let covers = get_json(self.client.get(format!("{}/{}", self.cover_url, rgid))).await?;
        let found = front_image(&covers);
        if found.is_none() {
            debug!("MusicBrainz/CAA: No image found for {} - {}", artist, album);
        }
        Ok(found)
    }
}
