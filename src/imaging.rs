/*
 *  imaging.rs
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

//! Artwork fetch and render.
//!
//! Bytes come in through an [`ImageFetch`], are decoded, enhanced, laid out
//! onto the 64x64 panel, optionally captioned and leave as a base64 GIF with
//! the colours the lights need. Decoding and filtering run on the blocking
//! pool, at most [`IMAGE_WORKERS`] at a time.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::text::{Baseline, Text};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, DynamicImage, Frame, Rgb, RgbImage};
use log::{debug, error, info};
use reqwest::{Client, header};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::cache::{FifoCache, cache_key};
use crate::canvas::RgbCanvas;
use crate::colortools::{
    Enhancements, average_color, brightness, contrast_text_color, dominant_palette, enhance,
    flatten_to_rgb, hex_to_rgb_list, rgb_hex,
};
use crate::config::Settings;
use crate::constants::{
    CAPTION_BG_OPACITY, CAPTION_FONT_SIZE, CAPTION_MAX_WIDTH, CAPTION_X, CAPTION_Y,
    CONNECT_TIMEOUT_MS, GIF_FRAME_MS, IMAGE_WORKERS, PANEL_SIZE, PROVIDER_TIMEOUT_MS,
    SPECIAL_TILE_LARGE, SPECIAL_TILE_SMALL, SPECIAL_TOP_PADDING, USER_AGENT,
};
use crate::media::MediaSnapshot;
use crate::modes::ResolvedFeatureFlags;
use crate::textlayout::{
    TextAlign, TextBackground, add_text_to_image, get_bidi, get_font, has_bidi, render_text_image,
    strip_annotations,
};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("no such image: {0}")]
    NotFound(String),
    #[error("image worker failed: {0}")]
    Worker(String),
}

/// Where a source reference is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRoute {
    /// `/local/...` under the host's web root on disk
    Local(PathBuf),
    /// other root relative path, served by the host
    Host(String),
    /// absolute http(s) URL
    Remote(String),
    /// anything else is tried as a filesystem path
    RawPath(PathBuf),
}

#[async_trait]
pub trait ImageFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

pub struct HttpImageFetcher {
    client: Client,
    host_base_url: String,
    local_web_root: PathBuf,
}

impl HttpImageFetcher {
    pub fn new(host_base_url: &str, local_web_root: &Path) -> Result<Self, ImageError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .default_headers(headers)
            .timeout(Duration::from_millis(PROVIDER_TIMEOUT_MS))
            .build()?;

        Ok(HttpImageFetcher {
            client,
            host_base_url: host_base_url.trim_end_matches('/').to_string(),
            local_web_root: local_web_root.to_path_buf(),
        })
    }

    pub fn route(&self, url: &str) -> FetchRoute {
        if let Some(rest) = url.strip_prefix("/local/") {
            FetchRoute::Local(self.local_web_root.join(rest))
        } else if url.starts_with('/') && !url.starts_with("//") {
            FetchRoute::Host(format!("{}{}", self.host_base_url, url))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            FetchRoute::Remote(url.to_string())
        } else {
            FetchRoute::RawPath(PathBuf::from(url))
        }
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageFetch for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        match self.route(url) {
            FetchRoute::Local(path) | FetchRoute::RawPath(path) => {
                if !path.exists() {
                    return Err(ImageError::NotFound(path.display().to_string()));
                }
                debug!("Reading image from {}", path.display());
                Ok(tokio::fs::read(&path).await?)
            }
            FetchRoute::Host(u) | FetchRoute::Remote(u) => {
                debug!("Fetching image from {}", u);
                self.get(&u).await
            }
        }
    }
}

/// Everything besides the source that changes the rendered bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderConfig {
    pub enhancements: Enhancements,
    pub crop_enabled: bool,
    pub crop_extra: bool,
    pub burned_caption: bool,
    pub clean_title: bool,
    pub forced_font_color: Option<String>,
    pub text_background: bool,
    pub special_mode: bool,
    pub show_clock: bool,
    pub show_temperature: bool,
}

impl RenderConfig {
    pub fn new(settings: &Settings, flags: &ResolvedFeatureFlags) -> Self {
        RenderConfig {
            enhancements: settings.enhancements,
            crop_enabled: flags.crop_enabled,
            crop_extra: flags.crop_extra,
            burned_caption: flags.burned_caption,
            clean_title: settings.clean_title,
            forced_font_color: settings.forced_font_color.clone(),
            text_background: flags.text_background,
            special_mode: flags.special_mode,
            show_clock: flags.show_clock,
            show_temperature: flags.show_temperature,
        }
    }

    fn caption_active(&self, is_primary: bool) -> bool {
        self.burned_caption && is_primary && !self.special_mode
    }
}

/// A panel ready image plus the colours derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedImage {
    pub gif_base64: String,
    pub font_color: [u8; 3],
    pub background_color: [u8; 3],
    pub color1: String,
    pub color2: String,
    pub color3: String,
    pub brightness: u8,
}

impl ProcessedImage {
    pub fn accent_rgb(&self) -> [u8; 3] {
        hex_to_rgb_list(Some(&self.color1))
    }
}

/// `"title - artist"`, or whichever half exists.
pub fn caption_text(title: &str, artist: &str, clean: bool) -> Option<String> {
    let text = match (title.is_empty(), artist.is_empty()) {
        (false, false) => format!("{} - {}", title, artist),
        (false, true) => title.to_string(),
        (true, false) => artist.to_string(),
        (true, true) => return None,
    };
    let text = if clean { strip_annotations(&text) } else { text };
    if text.is_empty() {
        return None;
    }
    Some(if has_bidi(&text) { get_bidi(&text) } else { text })
}

/// Framed tile layout. The small tile leaves room for the clock/temperature
/// row and gets gradient wings; the large one sits on a darkened edge colour.
pub fn special_layout(img: &RgbImage, small_tile: bool) -> RgbImage {
    let (w, h) = img.dimensions();
    let left = img.get_pixel(0, h / 2).0;
    let right = img.get_pixel(w - 1, h / 2).0;

    let size = if small_tile { SPECIAL_TILE_SMALL } else { SPECIAL_TILE_LARGE };
    let bg = if small_tile {
        [0, 0, 0]
    } else {
        let mut c = [0u8; 3];
        for i in 0..3 {
            c[i] = (((left[i] as u16 + right[i] as u16) / 2) / 3) as u8;
        }
        c
    };

    let mut out = RgbImage::from_pixel(PANEL_SIZE, PANEL_SIZE, Rgb(bg));
    let tile = imageops::resize(img, size, size, FilterType::Lanczos3);
    let paste_x = (PANEL_SIZE - size) / 2;
    let paste_y = SPECIAL_TOP_PADDING;

    if small_tile {
        let gradient_width = (PANEL_SIZE - size) / 2 - 2;
        let lerp = |from: [u8; 3], to: [u8; 3], ratio: f32| -> Rgb<u8> {
            let mut c = [0u8; 3];
            for i in 0..3 {
                c[i] = (from[i] as f32 * (1.0 - ratio) + to[i] as f32 * ratio) as u8;
            }
            Rgb(c)
        };
        for x in 0..gradient_width {
            let ratio = x as f32 / gradient_width as f32;
            let lc = lerp(left, bg, ratio);
            let rc = lerp(bg, right, ratio);
            let rx = paste_x + size + x + 2;
            for y in paste_y..paste_y + size {
                out.put_pixel(x, y, lc);
                if rx < PANEL_SIZE {
                    out.put_pixel(rx, y, rc);
                }
            }
        }
    }
    imageops::replace(&mut out, &tile, paste_x as i64, paste_y as i64);
    out
}

/// Trims 5% of the shorter side (plus 5px when `extra`) from every edge,
/// always leaving at least 2px.
pub fn crop_borders(img: RgbImage, extra: bool) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut border = ((w as f32 * 0.05) as u32).min((h as f32 * 0.05) as u32);
    if extra {
        border += 5;
    }
    border = border.min((w / 2).saturating_sub(1)).min((h / 2).saturating_sub(1));
    if border > 0 && w > 2 * border && h > 2 * border {
        debug!("Cropping {}x{} by {}", w, h, border);
        imageops::crop_imm(&img, border, border, w - 2 * border, h - 2 * border).to_image()
    } else {
        img
    }
}

/// Single frame, looping GIF as base64.
pub fn encode_gif_base64(img: &RgbImage) -> Result<String, ImageError> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite)?;
        let rgba = DynamicImage::ImageRgb8(img.clone()).to_rgba8();
        encoder.encode_frame(Frame::from_parts(rgba, 0, 0, Delay::from_numer_denom_ms(GIF_FRAME_MS, 1)))?;
    }
    Ok(BASE64.encode(&buf))
}

/// The synchronous half of [`ImagePipeline::render`].
pub fn process_image(
    bytes: &[u8],
    cfg: &RenderConfig,
    caption: Option<&str>,
    is_primary: bool,
) -> Result<ProcessedImage, ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let enhanced = enhance(flatten_to_rgb(decoded), &cfg.enhancements);

    let mut canvas = if cfg.special_mode && is_primary {
        special_layout(&enhanced, cfg.show_clock || cfg.show_temperature)
    } else {
        let src = if cfg.crop_enabled && is_primary { crop_borders(enhanced, cfg.crop_extra) } else { enhanced };
        imageops::resize(&src, PANEL_SIZE, PANEL_SIZE, FilterType::Lanczos3)
    };

    let average = average_color(&canvas);
    let bright = brightness(average);
    let font_color = contrast_text_color(bright);
    let [c1, c2, c3] = dominant_palette(&canvas, average);

    if cfg.caption_active(is_primary) {
        if let Some(text) = caption {
            let color = match cfg.forced_font_color.as_deref() {
                Some(hex) => hex_to_rgb_list(Some(hex)),
                None => font_color,
            };
            let background = cfg
                .text_background
                .then_some(TextBackground { color: [0, 0, 0], opacity: CAPTION_BG_OPACITY });
            add_text_to_image(
                &mut canvas,
                text,
                get_font("arial.ttf", CAPTION_FONT_SIZE),
                color,
                (CAPTION_X, CAPTION_Y),
                Some(CAPTION_MAX_WIDTH),
                background,
                TextAlign::Center,
            );
        }
    }

    Ok(ProcessedImage {
        gif_base64: encode_gif_base64(&canvas)?,
        font_color,
        background_color: average,
        color1: rgb_hex(c1),
        color2: rgb_hex(c2),
        color3: rgb_hex(c3),
        brightness: bright as u8,
    })
}

pub fn black_screen() -> RgbImage {
    RgbImage::new(PANEL_SIZE, PANEL_SIZE)
}

/// Outline of a television with "TV" in the screen.
pub fn tv_icon() -> RgbImage {
    let mut img = black_screen();
    let mut canvas = RgbCanvas::new(&mut img);
    let outline = PrimitiveStyleBuilder::new()
        .stroke_color(Rgb888::WHITE)
        .stroke_width(2)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();
    Rectangle::with_corners(Point::new(10, 15), Point::new(54, 50))
        .into_styled(outline)
        .draw(&mut canvas)
        .ok();
    let leg = PrimitiveStyle::with_stroke(Rgb888::WHITE, 2);
    for x in [20, 44] {
        Line::new(Point::new(x, 50), Point::new(x, 55)).into_styled(leg).draw(&mut canvas).ok();
    }
    let style = MonoTextStyle::new(get_font("DejaVuSans.ttf", 10), Rgb888::WHITE);
    Text::with_baseline("TV", Point::new(25, 25), style, Baseline::Top).draw(&mut canvas).ok();
    img
}

/// Fetch, render and cache. One instance per display.
pub struct ImagePipeline {
    fetcher: Arc<dyn ImageFetch>,
    cache: Mutex<FifoCache<ProcessedImage>>,
    workers: Arc<Semaphore>,
}

impl ImagePipeline {
    pub fn new(fetcher: Arc<dyn ImageFetch>, cache_size: usize) -> Self {
        ImagePipeline {
            fetcher,
            cache: Mutex::new(FifoCache::new(cache_size)),
            workers: Arc::new(Semaphore::new(IMAGE_WORKERS)),
        }
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, ImageError>
    where
        F: FnOnce() -> Result<T, ImageError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ImageError::Worker(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ImageError::Worker(e.to_string()))?
    }

    /// Renders `url` for the panel. Cache hits skip the fetch entirely and
    /// return the stored image unchanged. Every failure is logged and `None`.
    pub async fn render(
        &self,
        snapshot: &MediaSnapshot,
        url: &str,
        cfg: &RenderConfig,
        is_primary: bool,
    ) -> Option<ProcessedImage> {
        if url.is_empty() {
            debug!("No image URL provided.");
            return None;
        }
        let caption = if cfg.caption_active(is_primary) {
            caption_text(&snapshot.title, &snapshot.artist, cfg.clean_title)
        } else {
            None
        };
        let key = cache_key(&format!(
            "{}|{:?}|{}|{}",
            url,
            cfg,
            is_primary,
            caption.as_deref().unwrap_or("")
        ));

        if let Some(hit) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            debug!("Returning cached image for {}", url);
            return Some(hit);
        }

        let bytes = match self.fetcher.fetch(url).await {
            Ok(b) if !b.is_empty() => b,
            Ok(_) => {
                error!("Empty image body from {}", url);
                return None;
            }
            Err(e) => {
                error!("Error fetching image {}: {}", url, e);
                return None;
            }
        };

        let job_cfg = cfg.clone();
        let result = self
            .run_blocking(move || process_image(&bytes, &job_cfg, caption.as_deref(), is_primary))
            .await;
        match result {
            Ok(processed) => {
                self.cache
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(key, processed.clone());
                Some(processed)
            }
            Err(e) => {
                error!("Error processing image {}: {}", url, e);
                None
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
        info!("Image cache cleared.");
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub async fn black_screen_gif(&self) -> Option<String> {
        self.encode_job(black_screen).await
    }

    pub async fn tv_icon_gif(&self) -> Option<String> {
        self.encode_job(tv_icon).await
    }

    /// Text lines on a plain background as a base64 GIF.
    pub async fn create_text_image(
        &self,
        lines: Vec<String>,
        font_name: &str,
        font_size: u32,
        fg: [u8; 3],
        bg: [u8; 3],
        size: (u32, u32),
        align: TextAlign,
    ) -> Option<String> {
        let font = get_font(font_name, font_size);
        self.encode_job(move || render_text_image(&lines, font, fg, bg, size.0, size.1, align)).await
    }

    async fn encode_job<F>(&self, draw: F) -> Option<String>
    where
        F: FnOnce() -> RgbImage + Send + 'static,
    {
        match self.run_blocking(move || encode_gif_base64(&draw())).await {
            Ok(gif) => Some(gif),
            Err(e) => {
                error!("Error creating image: {}", e);
                None
            }
        }
    }
}
