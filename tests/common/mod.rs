//! Recording doubles for the orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pixoo_art::config::Settings;
use pixoo_art::hass::{EntityState, MediaSource};
use pixoo_art::imaging::{ImageError, ImageFetch, ImagePipeline, black_screen, encode_gif_base64};
use pixoo_art::lights::{AmbientLights, LightCommand, PeripheralTargets};
use pixoo_art::lyrics::LyricsEngine;
use pixoo_art::artwork::ArtworkResolver;
use pixoo_art::orchestrator::{Components, UpdateOrchestrator};
use pixoo_art::pixoo::{PixelDisplay, PixooError};

pub const PLAYER: &str = "media_player.living_room";

#[derive(Default)]
pub struct RecordingDisplay {
    pub commands: Mutex<Vec<Value>>,
}

impl RecordingDisplay {
    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }

    pub fn gifs(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c["Command"] == "Device/PlayTFGif")
            .map(|c| c["PicData"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c["Command"] == "Draw/SendHttpText")
            .map(|c| c["TextString"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn item_lists(&self) -> Vec<Value> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c["Command"] == "Draw/SendHttpItemList")
            .map(|c| c["ItemList"].clone())
            .collect()
    }
}

#[async_trait]
impl PixelDisplay for RecordingDisplay {
    async fn send_command(&self, payload: Value) -> bool {
        self.commands.lock().unwrap().push(payload);
        true
    }

    async fn get_channel_index(&self) -> Result<Option<i64>, PixooError> {
        Ok(Some(0))
    }
}

#[derive(Default)]
pub struct RecordingLights {
    pub commands: Mutex<Vec<LightCommand>>,
}

#[async_trait]
impl AmbientLights for RecordingLights {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn apply(&self, command: &LightCommand) {
        self.commands.lock().unwrap().push(*command);
    }
}

/// Serves the same image for every URL and remembers what was asked for.
pub struct StaticImages {
    pub bytes: Vec<u8>,
    pub requested: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageFetch for StaticImages {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        self.requested.lock().unwrap().push(url.to_string());
        Ok(self.bytes.clone())
    }
}

/// Optional per-read latency; `max_in_flight` records overlapping reads.
#[derive(Default)]
pub struct FakeHost {
    pub entities: Mutex<HashMap<String, EntityState>>,
    pub latency_ms: AtomicU64,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeHost {
    pub fn set(&self, state: EntityState) {
        self.entities.lock().unwrap().insert(state.entity_id.clone(), state);
    }
}

#[async_trait]
impl MediaSource for FakeHost {
    async fn entity_state(&self, entity_id: &str) -> Option<EntityState> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.entities.lock().unwrap().get(entity_id).cloned()
    }
}

pub fn solid_png(color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 64, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn black_gif() -> String {
    encode_gif_base64(&black_screen()).unwrap()
}

pub fn player(state: &str, cover: Option<&str>) -> EntityState {
    let mut e = EntityState::new(PLAYER, state)
        .with_attr("media_title", json!("Teardrop"))
        .with_attr("media_artist", json!("Massive Attack"))
        .with_attr("media_album_name", json!("Mezzanine"))
        .with_attr("media_content_type", json!("music"))
        .with_attr("media_duration", json!(330))
        .with_attr("media_position", json!(12));
    if let Some(c) = cover {
        e = e.with_attr("entity_picture", json!(c));
    }
    e
}

pub struct Rig {
    pub display: Arc<RecordingDisplay>,
    pub lights: Arc<RecordingLights>,
    pub images: Arc<StaticImages>,
    pub host: Arc<FakeHost>,
    pub settings: Settings,
    pub orchestrator: Arc<UpdateOrchestrator>,
}

impl Rig {
    pub fn light_commands(&self) -> Vec<LightCommand> {
        self.lights.commands.lock().unwrap().clone()
    }
}

/// No catalogue stages; generated art goes to `ai.test`.
pub fn rig(settings: Settings) -> Rig {
    rig_with_images(settings, solid_png([200, 40, 40]))
}

/// Same as [`rig`], but every image URL serves `bytes`.
pub fn rig_with_images(settings: Settings, bytes: Vec<u8>) -> Rig {
    let display = Arc::new(RecordingDisplay::default());
    let lights = Arc::new(RecordingLights::default());
    let images = Arc::new(StaticImages { bytes, requested: Mutex::new(Vec::new()) });
    let host = Arc::new(FakeHost::default());

    let lyrics = LyricsEngine::new(display.clone(), settings.lyrics_font, settings.lyrics_sync, None)
        .unwrap()
        .with_base_url("http://127.0.0.1:9");
    let artwork = ArtworkResolver::new(Vec::new(), settings.tv_icon, settings.info_fallback)
        .with_ai_url("http://ai.test/prompt");
    let parts = Components {
        display: display.clone(),
        media: host.clone(),
        lights: PeripheralTargets::new(vec![lights.clone() as Arc<dyn AmbientLights>]),
        images: ImagePipeline::new(images.clone(), settings.images_cache_size),
        artwork,
        lyrics,
    };
    let orchestrator = Arc::new(UpdateOrchestrator::new(settings.clone(), parts));
    Rig { display, lights, images, host, settings, orchestrator }
}

pub fn default_settings() -> Settings {
    Settings::with_required("10.0.0.40", PLAYER).unwrap()
}
