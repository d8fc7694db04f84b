//! Generated artwork. Only builds the URL; the image pipeline fetches it.

use async_trait::async_trait;
use log::info;

use super::{ArtworkProvider, ProviderError};
use crate::constants::PANEL_SIZE;
use crate::media::MediaSnapshot;
use crate::modes::AiModel;

const POLLINATIONS_URL: &str = "https://image.pollinations.ai/prompt";

pub struct AiImageProvider {
    model: AiModel,
    base_url: String,
}

impl AiImageProvider {
    pub fn new(model: AiModel) -> Self {
        Self::with_url(model, POLLINATIONS_URL)
    }

    pub fn with_url(model: AiModel, base_url: &str) -> Self {
        AiImageProvider { model, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn image_url(&self, prompt: &str) -> String {
        format!(
            "{}/{}?model={}&width={}&height={}&nologo=true",
            self.base_url,
            urlencoding::encode(prompt),
            self.model.as_str(),
            PANEL_SIZE,
            PANEL_SIZE
        )
    }
}

#[async_trait]
impl ArtworkProvider for AiImageProvider {
    fn name(&self) -> &str {
        "AI"
    }

    fn music_only(&self) -> bool {
        false
    }

    async fn attempt(&self, snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
        let prompt = snapshot
            .ai_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ProviderError::Missing("AI prompt"))?;
        let url = self.image_url(prompt);
        info!("Constructed AI image URL: {}", url);
        Ok(Some(url))
    }
}
