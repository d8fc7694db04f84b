//! TIDAL catalogue. Credentials are accepted but there is no client yet,
//! so the stage always reports itself unavailable.

use async_trait::async_trait;
use log::warn;

use super::{ArtworkProvider, ProviderError};
use crate::media::MediaSnapshot;

#[derive(Debug, Default)]
pub struct TidalProvider;

#[async_trait]
impl ArtworkProvider for TidalProvider {
    fn name(&self) -> &str {
        "TIDAL"
    }

    async fn attempt(&self, _snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
        warn!("TIDAL album art lookup is not implemented");
        Err(ProviderError::Unavailable("TIDAL"))
    }
}
