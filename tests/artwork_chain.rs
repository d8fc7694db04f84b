/*
 *  tests/artwork_chain.rs
 *
 *  Artwork resolution order and fallbacks with scripted stages.
 *
 *  PixooArt - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{RecordingDisplay, StaticImages, black_gif, solid_png};
use pixoo_art::artwork::{ArtworkResolver, ImageSource, ResolveOptions};
use pixoo_art::imaging::{ImagePipeline, encode_gif_base64, tv_icon};
use pixoo_art::media::{MediaMode, MediaSnapshot};
use pixoo_art::modes::AiModel;
use pixoo_art::providers::{ArtworkProvider, ProviderError};

/// Answers with a fixed result and counts how often it was asked.
struct Scripted {
    name: &'static str,
    answer: Option<&'static str>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(name: &'static str, answer: Option<&'static str>) -> Arc<Self> {
        Arc::new(Scripted { name, answer, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkProvider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn attempt(&self, _snapshot: &MediaSnapshot) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Some("fail") => Err(ProviderError::Status(502)),
            other => Ok(other.map(str::to_string)),
        }
    }
}

fn pipeline() -> ImagePipeline {
    let images = StaticImages { bytes: solid_png([10, 10, 10]), requested: Mutex::new(Vec::new()) };
    ImagePipeline::new(Arc::new(images), 4)
}

fn song(cover: Option<&str>) -> MediaSnapshot {
    MediaSnapshot {
        artist: "Massive Attack".into(),
        title: "Teardrop".into(),
        album: "Mezzanine".into(),
        mode: MediaMode::Music,
        cover_url: cover.map(str::to_string),
        ai_prompt: Some("Massive Attack Teardrop".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_stages_run_in_order_until_a_hit() {
    let broken = Scripted::new("Broken", Some("fail"));
    let empty = Scripted::new("Empty", None);
    let hit = Scripted::new("Hit", Some("http://art/hit.jpg"));
    let never = Scripted::new("Never", Some("http://art/never.jpg"));
    let stages: Vec<Arc<dyn ArtworkProvider>> = vec![
        broken.clone() as Arc<dyn ArtworkProvider>,
        empty.clone() as Arc<dyn ArtworkProvider>,
        hit.clone() as Arc<dyn ArtworkProvider>,
        never.clone() as Arc<dyn ArtworkProvider>,
    ];
    let resolver = ArtworkResolver::new(stages, true, false).with_ai_url("http://ai.test/prompt");
    let display = RecordingDisplay::default();

    let mut snap = song(None);
    let source = resolver.resolve_source(&mut snap, ResolveOptions::default(), &display, &pipeline()).await;

    assert_eq!(source, ImageSource::Url { url: "http://art/hit.jpg".into(), source: "Hit".into() });
    assert_eq!(snap.pic_source.as_deref(), Some("Hit"));
    assert_eq!((broken.calls(), empty.calls(), hit.calls(), never.calls()), (1, 1, 1, 0));
    assert_eq!(display.texts(), vec!["Searching...", "Loading..."]);
}

#[tokio::test]
async fn test_forced_ai_skips_cover_and_catalogue() {
    let stage = Scripted::new("Catalogue", Some("http://art/catalogue.jpg"));
    let resolver = ArtworkResolver::new(vec![stage.clone() as Arc<dyn ArtworkProvider>], true, false)
        .with_ai_url("http://ai.test/prompt");
    let display = RecordingDisplay::default();

    let mut snap = song(Some("http://covers.test/direct.jpg"));
    let opts = ResolveOptions { force_ai: true, ai_model: AiModel::Flux };
    let source = resolver.resolve_source(&mut snap, opts, &display, &pipeline()).await;

    match source {
        ImageSource::Url { url, source } => {
            assert!(url.starts_with("http://ai.test/prompt/Massive%20Attack"), "{}", url);
            assert!(url.contains("model=flux"));
            assert_eq!(source, "AI");
        }
        other => panic!("expected generated art, got {:?}", other),
    }
    assert_eq!(stage.calls(), 0);
    assert_eq!(display.texts(), vec!["Searching...", "AI Image...", "Loading..."]);
}

#[tokio::test]
async fn test_catalogue_stages_skip_non_music() {
    let stage = Scripted::new("Catalogue", Some("http://art/catalogue.jpg"));
    let resolver = ArtworkResolver::new(vec![stage.clone() as Arc<dyn ArtworkProvider>], false, false);
    let display = RecordingDisplay::default();

    let mut snap = song(None);
    snap.mode = MediaMode::Radio;
    snap.ai_prompt = None;
    let source = resolver.resolve_source(&mut snap, ResolveOptions::default(), &display, &pipeline()).await;

    assert_eq!(source, ImageSource::BlackScreenSent);
    assert_eq!(stage.calls(), 0);
    assert_eq!(display.gifs(), vec![black_gif()]);
}

#[tokio::test]
async fn test_tv_fallback_draws_icon() {
    let resolver = ArtworkResolver::new(Vec::new(), true, true);
    let display = RecordingDisplay::default();

    let mut snap = MediaSnapshot { title: "Some Show".into(), mode: MediaMode::Tv, is_tv: true, ..Default::default() };
    let source = resolver.resolve_source(&mut snap, ResolveOptions::default(), &display, &pipeline()).await;

    assert_eq!(source, ImageSource::TvIconSent);
    assert_eq!(snap.pic_source.as_deref(), Some("TV Icon"));
    assert_eq!(display.gifs(), vec![encode_gif_base64(&tv_icon()).unwrap()]);
    assert_eq!(display.texts(), vec!["Searching...", "TV Icon"]);
}

#[tokio::test]
async fn test_failed_generation_falls_back_to_info_text() {
    let resolver = ArtworkResolver::new(Vec::new(), true, true).with_ai_url("http://ai.test/prompt");
    let display = RecordingDisplay::default();

    // forced generation without a prompt cannot build a URL
    let mut snap = song(None);
    snap.ai_prompt = None;
    let opts = ResolveOptions { force_ai: true, ai_model: AiModel::Turbo };
    let source = resolver.resolve_source(&mut snap, opts, &display, &pipeline()).await;

    assert_eq!(source, ImageSource::InfoTextSent);
    assert_eq!(display.gifs(), vec![black_gif()]);
    assert_eq!(
        display.texts(),
        vec!["Searching...", "AI Image...", "AI Fail :(", "Massive Attack - Teardrop"]
    );
}
