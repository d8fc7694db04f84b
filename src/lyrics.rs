/*
 *  lyrics.rs
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

//! Time synced lyrics shown as firmware text under the artwork.
//!
//! Lines come from textyl.co as `(seconds, text)` pairs. Each tick picks the
//! last line whose start has passed and, when that changes, replaces the
//! text on the panel and arms an auto-clear. The auto-clear carries the
//! generation it was armed in and gives up if anything moved on since.

use log::{debug, error, info, warn};
use mini_moka::sync::Cache;
use rand::Rng;
use regex::Regex;
use reqwest::{Client, header};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::constants::{
    CONNECT_TIMEOUT_MS, DEFAULT_TEXT_COLOR, LYRICS_BASE_Y, LYRICS_LAST_LINE_HOLD_MS, LYRICS_LINE_GAP_MS,
    LYRICS_LINE_HEIGHT, LYRICS_MAX_HOLD_MS, LYRICS_MAX_Y, LYRICS_SINGLE_Y, LYRICS_TIMEOUT_MS, PANEL_SIZE,
    USER_AGENT,
};
use crate::pixoo::{HttpText, PixelDisplay};
use crate::textlayout::{get_bidi, has_bidi};

const TEXTYL_URL: &str = "https://api.textyl.co/api/lyrics";
const LYRICS_CACHE_SIZE: u64 = 64;
const LYRICS_CACHE_TTL_SECS: u64 = 6 * 3600;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static regex"));

/// `(start ms, text)`, ascending by start.
pub type LyricLines = Vec<(u64, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LyricsPhase {
    #[default]
    NoLyrics,
    Loaded,
    Displaying(usize),
    Cleared,
}

/// Diagnostics view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LyricsStatus {
    pub phase: LyricsPhase,
    pub lines: usize,
    pub displayed: String,
}

#[derive(Default)]
struct LyricsState {
    lines: LyricLines,
    /// text currently on the panel, empty when nothing is
    displayed: String,
    /// index of the last line sent, survives an auto-clear
    shown: Option<usize>,
    phase: LyricsPhase,
    generation: u64,
    clear_task: Option<JoinHandle<()>>,
}

impl LyricsState {
    fn cancel_clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.clear_task.take() {
            handle.abort();
            debug!("Cancelled pending lyric clear.");
        }
    }
}

/// Max characters per wrapped line for a firmware font id.
pub fn char_budget(font: u16) -> usize {
    match font {
        2 | 32 | 48 => 12,
        4 | 52 | 80 | 190 => 10,
        58 | 158 | 590 => 8,
        62 | 186 => 7,
        _ => 10,
    }
}

/// Drops anything but word characters, whitespace and `-`, then dashes the spaces.
pub fn sanitize_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "").replace(' ', "-")
}

/// None for HTML, bad JSON, a non-list or an untimed string list.
pub fn parse_lyrics(body: &str) -> Option<LyricLines> {
    if body.trim_start().starts_with('<') {
        warn!("Lyrics API returned HTML");
        return None;
    }
    let data: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to decode JSON lyrics: {}", e);
            return None;
        }
    };
    let Some(items) = data.as_array() else {
        warn!("Unexpected lyrics format, expected a list");
        return None;
    };

    let mut lines = LyricLines::new();
    for item in items {
        if item.is_string() {
            warn!("Lyrics API returned a flat string list (no timestamps), discarding.");
            return None;
        }
        let seconds = match item.get("seconds") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let text = item.get("lyrics").and_then(Value::as_str).map(str::trim);
        if let (Some(secs), Some(text)) = (seconds, text) {
            if !text.is_empty() && secs.is_finite() && secs >= 0.0 {
                lines.push(((secs * 1000.0) as u64, text.to_string()));
            }
        }
    }
    lines.sort_by_key(|(ms, _)| *ms);
    Some(lines)
}

/// Index of the last line whose start, shifted by `offset_ms`, has passed.
pub fn select_line(lines: &[(u64, String)], position_ms: u64, offset_ms: i64) -> Option<usize> {
    let mut found = None;
    for (idx, (at, _)) in lines.iter().enumerate() {
        if position_ms as i64 >= *at as i64 + offset_ms {
            found = Some(idx);
        } else {
            break;
        }
    }
    found
}

/// Word wrap into at most two lines of `max_chars`. Words stay in order;
/// whatever overflows the second line is appended to it and the rest dropped.
pub fn wrap_lyric(text: &str, max_chars: usize) -> Vec<String> {
    let mut rows = [String::new(), String::new()];
    let mut row = 0;
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let fits = |line: &String| {
            let sep = usize::from(!line.is_empty());
            line.chars().count() + sep + word.chars().count() <= max_chars
        };
        let mut overflow = false;
        if !rows[row].is_empty() && !fits(&rows[row]) {
            if row == 0 {
                row = 1;
                overflow = !rows[1].is_empty() && !fits(&rows[1]);
            } else {
                overflow = true;
            }
        }
        if !rows[row].is_empty() {
            rows[row].push(' ');
        }
        rows[row].push_str(word);
        if overflow {
            break;
        }
    }
    rows.into_iter().filter(|r| !r.is_empty()).collect()
}

/// How long a line stays up before the auto-clear.
pub fn hold_ms(lines: &[(u64, String)], idx: usize) -> u64 {
    match lines.get(idx + 1) {
        Some((next, _)) => next.saturating_sub(lines[idx].0).min(LYRICS_MAX_HOLD_MS),
        None => LYRICS_LAST_LINE_HOLD_MS,
    }
}

pub struct LyricsEngine {
    display: Arc<dyn PixelDisplay>,
    client: Client,
    base_url: String,
    cache: Cache<String, Arc<LyricLines>>,
    font: u16,
    color: String,
    sync_ms: AtomicI32,
    state: Arc<Mutex<LyricsState>>,
}

impl LyricsEngine {
    pub fn new(
        display: Arc<dyn PixelDisplay>,
        font: u16,
        sync_ms: i32,
        color: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .default_headers(headers)
            .timeout(Duration::from_millis(LYRICS_TIMEOUT_MS))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(LYRICS_CACHE_SIZE)
            .time_to_live(Duration::from_secs(LYRICS_CACHE_TTL_SECS))
            .build();

        Ok(LyricsEngine {
            display,
            client,
            base_url: TEXTYL_URL.to_string(),
            cache,
            font,
            color: color.unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
            sync_ms: AtomicI32::new(sync_ms),
            state: Arc::new(Mutex::new(LyricsState::default())),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn set_sync(&self, sync_ms: i32) {
        info!("Lyrics sync offset set to {} ms", sync_ms);
        self.sync_ms.store(sync_ms, Ordering::Relaxed);
    }

    /// -1 means no offset.
    fn offset_ms(&self) -> i64 {
        match self.sync_ms.load(Ordering::Relaxed) {
            -1 => 0,
            v => v as i64,
        }
    }

    async fn download(&self, artist: &str, title: &str) -> Option<LyricLines> {
        let url = format!("{}/{}/{}", self.base_url, sanitize_name(artist), sanitize_name(title));
        debug!("Fetching lyrics from: {}", url);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("Network error fetching lyrics for '{}' by '{}': {}", title, artist, e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("Failed to get lyrics for '{}' by '{}'. Status: {}", title, artist, response.status());
            return None;
        }
        match response.text().await {
            Ok(body) => parse_lyrics(&body),
            Err(e) => {
                error!("Error reading lyrics for '{}' by '{}': {}", title, artist, e);
                None
            }
        }
    }

    /// Loads lyrics for a new track, replacing whatever was loaded.
    /// Returns the number of lines; 0 leaves the engine in `NoLyrics`.
    pub async fn fetch(&self, artist: &str, title: &str) -> usize {
        {
            let mut s = self.state.lock().await;
            s.cancel_clear();
            s.lines.clear();
            s.shown = None;
            s.phase = LyricsPhase::NoLyrics;
        }
        if artist.is_empty() || title.is_empty() {
            debug!("Artist or title missing, cannot fetch lyrics.");
            return 0;
        }

        let key = format!("{}|{}", artist, title);
        let lines = match self.cache.get(&key) {
            Some(hit) => hit,
            // failed or unparseable lookups are retried on the next track change
            None => match self.download(artist, title).await {
                Some(fetched) => {
                    let fetched = Arc::new(fetched);
                    self.cache.insert(key, fetched.clone());
                    fetched
                }
                None => Arc::default(),
            },
        };

        let mut s = self.state.lock().await;
        if lines.is_empty() {
            info!("No lyrics lines found for '{}' by '{}'", title, artist);
        } else {
            info!("Fetched {} lines of lyrics for '{}' by '{}'", lines.len(), title, artist);
            s.lines = lines.as_ref().clone();
            s.phase = LyricsPhase::Loaded;
        }
        s.lines.len()
    }

    pub async fn has_lyrics(&self) -> bool {
        !self.state.lock().await.lines.is_empty()
    }

    /// Moves the panel text to the line for `position_ms`. With `enabled`
    /// false, or nothing loaded, only clears what is shown.
    pub async fn tick(&self, position_ms: u64, enabled: bool) {
        let mut s = self.state.lock().await;

        if !enabled || s.lines.is_empty() {
            if !s.displayed.is_empty() {
                debug!("No lyrics to display or lyrics disabled, clearing last lyric.");
                self.clear_now(&mut s).await;
            }
            return;
        }

        match select_line(&s.lines, position_ms, self.offset_ms()) {
            // by index, not text, so an auto-cleared line stays cleared
            Some(idx) if s.shown != Some(idx) => {
                s.cancel_clear();
                let text = s.lines[idx].1.clone();
                debug!("Displaying lyric {} '{}' at player pos {}ms", idx, text, position_ms);
                self.send_line(&text).await;
                s.displayed = text.clone();
                s.shown = Some(idx);
                s.phase = LyricsPhase::Displaying(idx);

                let hold = hold_ms(&s.lines, idx);
                if hold > 0 {
                    s.clear_task = Some(self.schedule_clear(hold, s.generation, text));
                }
            }
            Some(_) => {}
            None if !s.displayed.is_empty() || s.shown.is_some() => {
                debug!("No current lyric, clearing displayed lyric immediately.");
                self.clear_now(&mut s).await;
                s.shown = None;
            }
            None => {}
        }
    }

    async fn clear_now(&self, s: &mut LyricsState) {
        s.cancel_clear();
        if !s.displayed.is_empty() {
            self.display.clear_text().await;
            s.displayed.clear();
        }
        s.phase = if s.lines.is_empty() { LyricsPhase::NoLyrics } else { LyricsPhase::Cleared };
    }

    async fn send_line(&self, text: &str) {
        let text = if has_bidi(text) { get_bidi(text) } else { text.to_string() };
        let rows = wrap_lyric(&text, char_budget(self.font));
        let base_id: u32 = rand::rng().random_range(1..=10_000);

        self.display.clear_text().await;
        tokio::time::sleep(Duration::from_millis(LYRICS_LINE_GAP_MS)).await;
        for (i, row) in rows.iter().enumerate() {
            let y = if rows.len() == 1 {
                LYRICS_SINGLE_Y
            } else {
                (LYRICS_BASE_Y + i as i32 * LYRICS_LINE_HEIGHT).min(LYRICS_MAX_Y)
            };
            let payload = HttpText {
                text_id: base_id + i as u32,
                x: 0,
                y,
                dir: 0,
                font: self.font,
                width: PANEL_SIZE,
                speed: 10,
                text: row.clone(),
                color: self.color.clone(),
                align: Some(1),
            };
            if !self.display.send_text(&payload).await {
                error!("Error sending lyrics line to Pixoo");
                break;
            }
            tokio::time::sleep(Duration::from_millis(LYRICS_LINE_GAP_MS)).await;
        }
    }

    fn schedule_clear(&self, hold: u64, generation: u64, text: String) -> JoinHandle<()> {
        debug!("Scheduling lyric clear in {}ms", hold);
        let state = self.state.clone();
        let display = self.display.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(hold)).await;
            let mut s = state.lock().await;
            if s.generation != generation || s.displayed != text {
                return;
            }
            debug!("Auto-clearing lyrics after {}ms.", hold);
            display.clear_text().await;
            s.displayed.clear();
            s.phase = LyricsPhase::Cleared;
            s.clear_task = None;
        })
    }

    /// Track ended or lyrics turned off: clear the panel text and forget the track.
    pub async fn reset(&self) {
        let mut s = self.state.lock().await;
        s.cancel_clear();
        if !s.displayed.is_empty() {
            self.display.clear_text().await;
        }
        *s = LyricsState { generation: s.generation, ..Default::default() };
    }

    /// Cancels the timer and drops all state without touching the panel.
    pub async fn shutdown(&self) {
        let mut s = self.state.lock().await;
        s.cancel_clear();
        *s = LyricsState { generation: s.generation, ..Default::default() };
        debug!("Lyrics engine shutdown.");
    }

    pub async fn state(&self) -> LyricsStatus {
        let s = self.state.lock().await;
        LyricsStatus { phase: s.phase, lines: s.lines.len(), displayed: s.displayed.clone() }
    }

    #[cfg(test)]
    async fn load(&self, lines: LyricLines) {
        let mut s = self.state.lock().await;
        s.lines = lines;
        s.phase = LyricsPhase::Loaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixoo::PixooError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct TextRecorder {
        log: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl PixelDisplay for TextRecorder {
        async fn send_command(&self, payload: Value) -> bool {
            let entry = match payload["Command"].as_str() {
                Some("Draw/SendHttpText") => format!("text:{}@{}", payload["TextString"].as_str().unwrap_or(""), payload["y"]),
                Some(c) => c.to_string(),
                None => "?".into(),
            };
            self.log.lock().unwrap().push(entry);
            true
        }
        async fn get_channel_index(&self) -> Result<Option<i64>, PixooError> {
            Ok(Some(0))
        }
    }

    fn abc() -> LyricLines {
        vec![(0, "a".into()), (5000, "b".into()), (9000, "c".into())]
    }

    fn engine(rec: Arc<TextRecorder>) -> LyricsEngine {
        LyricsEngine::new(rec, 2, -1, None).unwrap()
    }

    #[test]
    fn test_line_selection() {
        let lines = abc();
        let pick = |p| select_line(&lines, p, 0).map(|i| lines[i].1.clone());
        assert_eq!(pick(4999).as_deref(), Some("a"));
        assert_eq!(pick(5000).as_deref(), Some("b"));
        assert_eq!(pick(8999).as_deref(), Some("b"));
        assert_eq!(pick(20000).as_deref(), Some("c"));
        let late: LyricLines = vec![(1000, "x".into())];
        assert_eq!(select_line(&late, 500, 0), None);
        assert_eq!(select_line(&late, 500, -600), Some(0));
    }

    #[test]
    fn test_char_budget_table() {
        assert_eq!(char_budget(2), 12);
        assert_eq!(char_budget(62), 7);
        assert_eq!(char_budget(190), 10);
        assert_eq!(char_budget(590), 8);
        assert_eq!(char_budget(999), 10);
    }

    #[test]
    fn test_wrap_two_lines() {
        assert_eq!(wrap_lyric("hello there you", 12), vec!["hello there", "you"]);
        assert_eq!(wrap_lyric("one two three four five six", 8), vec!["one two", "three four"]);
        assert_eq!(wrap_lyric("short", 8), vec!["short"]);
        assert_eq!(wrap_lyric("supercalifragilistic", 7), vec!["supercalifragilistic"]);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_name("AC/DC"), "ACDC");
        assert_eq!(sanitize_name("Guns N' Roses"), "Guns-N-Roses");
        assert_eq!(sanitize_name("Sigur Rós"), "Sigur-Rós");
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(parse_lyrics("<html>nope</html>"), None);
        assert_eq!(parse_lyrics("{not json"), None);
        assert_eq!(parse_lyrics(r#"{"lyrics": []}"#), None);
        assert_eq!(parse_lyrics(r#"["a", "b"]"#), None);
        let lines = parse_lyrics(r#"[{"seconds": 12, "lyrics": " two "}, {"seconds": 3.5, "lyrics": "one"}, {"seconds": 20, "lyrics": "  "}]"#).unwrap();
        assert_eq!(lines, vec![(3500, "one".to_string()), (12000, "two".to_string())]);
    }

    #[test]
    fn test_hold_times() {
        let lines: LyricLines = vec![(0, "a".into()), (5000, "b".into()), (40_000, "c".into())];
        assert_eq!(hold_ms(&lines, 0), 5000);
        assert_eq!(hold_ms(&lines, 1), 15_000);
        assert_eq!(hold_ms(&lines, 2), 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_sends_on_change_only() {
        let rec = Arc::new(TextRecorder::default());
        let eng = engine(rec.clone());
        eng.load(abc()).await;

        eng.tick(100, true).await;
        eng.tick(900, true).await;
        assert_eq!(*rec.log.lock().unwrap(), vec!["Draw/ClearHttpText", "text:a@58"]);
        assert_eq!(eng.state().await.phase, LyricsPhase::Displaying(0));

        eng.tick(5000, true).await;
        assert_eq!(rec.log.lock().unwrap().len(), 4);
        assert_eq!(eng.state().await.displayed, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_clear_fires_once() {
        let rec = Arc::new(TextRecorder::default());
        let eng = engine(rec.clone());
        eng.load(abc()).await;

        eng.tick(9500, true).await;
        tokio::time::sleep(Duration::from_millis(9_000)).await;
        assert_eq!(eng.state().await.displayed, "c");
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let st = eng.state().await;
        assert_eq!(st.displayed, "");
        assert_eq!(st.phase, LyricsPhase::Cleared);

        // same line again does not come back
        eng.tick(11_000, true).await;
        assert_eq!(rec.log.lock().unwrap().iter().filter(|e| e.starts_with("text:")).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_clear_is_ignored() {
        let rec = Arc::new(TextRecorder::default());
        let eng = engine(rec.clone());
        eng.load(abc()).await;

        eng.tick(0, true).await;
        tokio::time::sleep(Duration::from_millis(4_000)).await;
        eng.tick(5000, true).await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(eng.state().await.displayed, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_clears_and_reset_forgets() {
        let rec = Arc::new(TextRecorder::default());
        let eng = engine(rec.clone());
        eng.load(abc()).await;
        eng.tick(0, true).await;
        eng.tick(1000, false).await;
        assert_eq!(rec.log.lock().unwrap().last().map(String::as_str), Some("Draw/ClearHttpText"));
        assert_eq!(eng.state().await.displayed, "");

        eng.reset().await;
        assert_eq!(eng.state().await, LyricsStatus::default());
        assert!(!eng.has_lyrics().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_offset() {
        let rec = Arc::new(TextRecorder::default());
        let eng = engine(rec.clone());
        eng.load(abc()).await;
        eng.set_sync(1000);
        eng.tick(5500, true).await;
        assert_eq!(eng.state().await.displayed, "a");
    }
}
