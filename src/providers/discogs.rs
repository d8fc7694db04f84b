//! Discogs database search.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::{ArtworkProvider, ProviderError, artist_and_album, get_json, provider_client};
use crate::media::MediaSnapshot;

const DISCOGS_SEARCH_URL: &str = "https://api.discogs.com/database/search";

pub struct DiscogsProvider {
    token: String,
    search_url: String,
    client: Client,
}

impl DiscogsProvider {
    pub fn new(token: &str) -> Result<Self, ProviderError> {
        Self::with_url(token, DISCOGS_SEARCH_URL)
    }

    pub fn with_url(token: &str, search_url: &str) -> Result<Self, ProviderError> {
        Ok(DiscogsProvider {
            token: token.to_string(),
            search_url: search_url.to_string(),
            client: provider_client()?,
        })
    }
}

/// First release that carries a cover image.
fn first_cover(body: &Value) -> Option<String> {
    body.get("results")?
        .as_array()?
        .iter()
        .filter_map(|r| r.get("cover_image").and_then(Value::as_str))
        .find(|u| !u.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ArtworkProvider for DiscogsProvider {
    fn name(&self) -> &str {
        "Discogs"
    }

    async fn attempt(&self, snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
        let (artist, album) = artist_and_album(snapshot)?;
        let request = self
            .client
            .get(&self.search_url)
            .header("Authorization", format!("Discogs token={}", self.token))
            .query(&[("type", "release"), ("artist", artist), ("release_title", album), ("format", "album")]);
        let body = get_json(request).await?;
        let found = first_cover(&body);
        if found.is_none() {
            debug!("Discogs: No image found for {} - {}", artist, album);
        }
        Ok(found)
    }
}
