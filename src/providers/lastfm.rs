//! Last.fm `album.getinfo`.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::{ArtworkProvider, ProviderError, artist_and_album, get_json, provider_client};
use crate::media::MediaSnapshot;

const LASTFM_URL: &str = "http://ws.audioscrobbler.com/2.0/";

/// Largest first.
const SIZE_PRIORITY: [&str; 4] = ["mega", "extralarge", "large", "medium"];

pub struct LastFmProvider {
    api_key: String,
    url: String,
    client: Client,
}

impl LastFmProvider {
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_url(api_key, LASTFM_URL)
    }

    pub fn with_url(api_key: &str, url: &str) -> Result<Self, ProviderError> {
        Ok(LastFmProvider { api_key: api_key.to_string(), url: url.to_string(), client: provider_client()? })
    }
}

fn largest_image(body: &Value) -> Option<String> {
    let images = body.get("album")?.get("image")?.as_array()?;
    SIZE_PRIORITY.iter().find_map(|size| {
        images.iter().find_map(|img| {
            let url = img.get("#text").and_then(Value::as_str).filter(|u| !u.is_empty())?;
            (img.get("size").and_then(Value::as_str) == Some(*size)).then(|| url.to_string())
        })
    })
}

#[async_trait]
impl ArtworkProvider for LastFmProvider {
    fn name(&self) -> &str {
        "Last.fm"
    }

    async fn attempt(&self, snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
        let (artist, album) = artist_and_album(snapshot)?;
        let request = self.client.get(&self.url).query(&[
            ("method", "album.getinfo"),
            ("api_key", self.api_key.as_str()),
            ("artist", artist),
            ("album", album),
            ("format", "json"),
        ]);
        let found = largest_image(&get_json(request).await?);
        if found.is_none() {
            debug!("Last.fm: No image found for {} - {}", artist, album);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_size_priority() {
        let body = json!({"album": {"image": [
            {"size": "small", "#text": "s"},
            {"size": "large", "#text": "l"},
            {"size": "mega", "#text": ""},
            {"size": "extralarge", "#text": "xl"}
        ]}});
        assert_eq!(largest_image(&body).as_deref(), Some("xl"));
    }

    #[test]
    fn test_no_usable_size() {
        let body = json!({"album": {"image": [{"size": "small", "#text": "s"}]}});
        assert_eq!(largest_image(&body), None);
        assert_eq!(largest_image(&json!({"error": 6})), None);
    }
}
