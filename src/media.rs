/*
 *  media.rs
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

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::hass::EntityState;
use crate::textlayout::{clean_title, collapse_whitespace};

const TV_CONTENT_TYPES: &[&str] = &["tvshow", "movie", "episode", "channel"];
const TV_APPS: &[&str] = &["netflix", "plex", "hbo", "disney", "youtube", "tvheadend"];
const RADIO_CONTENT_TYPES: &[&str] = &["radio", "music"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Idle,
    Off,
    Standby,
    On,
    #[default]
    Unavailable,
}

impl PlaybackState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            "idle" => PlaybackState::Idle,
            "off" => PlaybackState::Off,
            "standby" => PlaybackState::Standby,
            "on" => PlaybackState::On,
            _ => PlaybackState::Unavailable,
        }
    }

    /// States that send the display into its inactive branch.
    pub fn is_off_like(&self) -> bool {
        matches!(
            self,
            PlaybackState::Off | PlaybackState::Idle | PlaybackState::Paused | PlaybackState::Standby
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Idle => "idle",
            PlaybackState::Off => "off",
            PlaybackState::Standby => "standby",
            PlaybackState::On => "on",
            PlaybackState::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum MediaMode {
    #[default]
    Music,
    Tv,
    Radio,
    Off,
    Clock,
}

impl MediaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaMode::Music => "Music",
            MediaMode::Tv => "TV",
            MediaMode::Radio => "Radio",
            MediaMode::Off => "Off",
            MediaMode::Clock => "Clock",
        }
    }
}

/// Inputs from settings and resolved flags that shape the snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotContext {
    pub show_clock: bool,
    pub force_ai: bool,
    pub clean_title: bool,
}

/// Media player state, rebuilt from scratch on every refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaSnapshot {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub state: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub mode: MediaMode,
    pub content_type: Option<String>,
    pub content_id: Option<String>,
    pub app_name: Option<String>,
    pub cover_url: Option<String>,
    /// Which artwork source satisfied the last resolution.
    pub pic_source: Option<String>,
    pub cleaned_title: Option<String>,
    pub ai_prompt: Option<String>,
    pub temperature: Option<String>,
    pub is_tv: bool,
    pub is_radio: bool,
    pub is_spotify: bool,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// "radio" anywhere, or an `fm`/`am` band word (`Jazz FM`, `1089am`).
/// Plain substrings would make "Dreams" a station.
fn looks_like_station(title: &str, bands: &[&str]) -> bool {
    title.contains("radio")
        || title
            .split(|c: char| !c.is_alphanumeric() && c != '.')
            .map(|w| w.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.'))
            .any(|w| bands.contains(&w))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl MediaSnapshot {
    /// Builds a snapshot from the player entity and the optional temperature
    /// sensor. A missing player reads as `unavailable`.
    pub fn from_state(
        player: Option<&EntityState>,
        temperature: Option<&EntityState>,
        ctx: SnapshotContext,
        now: DateTime<Utc>,
    ) -> Self {
        let mut snap = MediaSnapshot::default();
        snap.temperature = temperature.and_then(format_temperature);

        let Some(player) = player else {
            warn!("Media player entity not found");
            snap.mode = if ctx.show_clock { MediaMode::Clock } else { MediaMode::Off };
            return snap;
        };

        let attrs = player.media_attributes();
        snap.state = PlaybackState::parse(&player.state);
        snap.artist = attrs.media_artist.unwrap_or_default();
        snap.title = attrs.media_title.unwrap_or_default();
        snap.album = attrs.media_album_name.unwrap_or_default();
        snap.content_type = non_empty(attrs.media_content_type);
        snap.content_id = non_empty(attrs.media_content_id);
        snap.app_name = non_empty(attrs.app_name);
        snap.cover_url = non_empty(attrs.entity_picture);
        snap.duration_ms = secs_to_ms(attrs.media_duration.unwrap_or(0.0));

        let mut position = attrs.media_position.unwrap_or(0.0);
        if snap.state == PlaybackState::Playing {
            // the host only stamps the position when it changes
            if let Some(stamp) = attrs
                .media_position_updated_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            {
                let elapsed = (now - stamp.with_timezone(&Utc)).num_milliseconds();
                if elapsed > 0 {
                    position += elapsed as f64 / 1000.0;
                }
            }
        }
        snap.position_ms = secs_to_ms(position);
        if snap.duration_ms > 0 {
            snap.position_ms = snap.position_ms.min(snap.duration_ms);
        }

        snap.classify();

        if snap.state != PlaybackState::Playing && snap.state != PlaybackState::Paused {
            snap.mode = if ctx.show_clock { MediaMode::Clock } else { MediaMode::Off };
        }

        if !snap.title.is_empty() {
            let t = if ctx.clean_title { clean_title(&snap.title) } else { snap.title.clone() };
            snap.cleaned_title = Some(collapse_whitespace(&t));
        }

        let playing = snap.state == PlaybackState::Playing;
        if ctx.force_ai || (snap.cover_url.is_none() && playing && !snap.is_radio && !snap.is_tv) {
            snap.ai_prompt = Some(snap.format_ai_prompt());
        }

        debug!(
            "Snapshot: title='{}' artist='{}' album='{}' mode={} state={}",
            snap.title, snap.artist, snap.album, snap.mode.as_str(), snap.state.as_str()
        );
        snap
    }

    fn classify(&mut self) {
        let title = self.title.to_lowercase();
        let app = self.app_name.as_deref().map(str::to_lowercase);
        let content = self.content_type.as_deref().unwrap_or("");

        let is_tv = TV_CONTENT_TYPES.contains(&content)
            || app.as_deref().is_some_and(|a| contains_any(a, TV_APPS));
        let mut is_radio = RADIO_CONTENT_TYPES.contains(&content)
            && (looks_like_station(&title, &["fm", "am"])
                || app.as_deref().is_some_and(|a| a.contains("tunein")));

        if is_tv && is_radio {
            match app.as_deref() {
                Some(a) if !a.contains("tunein") => is_radio = false,
                None if !looks_like_station(&title, &["fm"]) => is_radio = false,
                _ => {}
            }
        }

        self.is_tv = is_tv;
        self.is_radio = is_radio;
        self.is_spotify = self.content_id.as_deref().is_some_and(|c| c.to_lowercase().contains("spotify"))
            || app.as_deref().is_some_and(|a| a.contains("spotify"));
        self.mode = if is_radio {
            MediaMode::Radio
        } else if is_tv {
            MediaMode::Tv
        } else {
            MediaMode::Music
        };
    }

    fn format_ai_prompt(&self) -> String {
        let title = self.title.as_str();
        if self.is_tv && !title.is_empty() {
            let mut prompt = title.to_string();
            if let Some(app) = self.app_name.as_deref().filter(|a| !title.contains(a)) {
                prompt.push_str(", ");
                prompt.push_str(app);
            }
            prompt.push_str(", movie poster style, cinematic lighting, high detail");
            prompt
        } else if self.is_radio && !title.is_empty() {
            format!("{}, radio, music broadcast, vibrant colors", title)
        } else if !self.artist.is_empty() && !title.is_empty() {
            let mut prompt = format!("{} - {}, album cover art, high detail, iconic", self.artist, title);
            if !self.album.is_empty() && !title.contains(&self.album) {
                prompt.push_str(", ");
                prompt.push_str(&self.album);
            }
            prompt
        } else if !title.is_empty() {
            format!("{}, abstract art, music visualization", title)
        } else {
            "abstract colorful music visualization".to_string()
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_music(&self) -> bool {
        self.mode == MediaMode::Music
    }

    /// Title for captions and notices: the cleaned form when available.
    pub fn display_title(&self) -> &str {
        self.cleaned_title.as_deref().unwrap_or(&self.title)
    }

    /// Identity of the current track; used to detect track changes.
    pub fn track_key(&self) -> String {
        format!("{}|{}|{}", self.artist, self.title, self.album)
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 { (secs * 1000.0) as u64 } else { 0 }
}

/// `"<int><unit>"` from a numeric sensor; unavailable or non-numeric reads as None.
pub fn format_temperature(sensor: &EntityState) -> Option<String> {
    let state = sensor.state.trim();
    if state.eq_ignore_ascii_case("unavailable") || state.eq_ignore_ascii_case("unknown") {
        debug!("Temperature sensor {} is {}", sensor.entity_id, state);
        return None;
    }
    match state.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            let unit = sensor.attr_str("unit_of_measurement").unwrap_or("");
            Some(format!("{}{}", v.trunc() as i64, unit))
        }
        _ => {
            warn!("Could not parse temperature value '{}' from {}", state, sensor.entity_id);
            None
        }
    }
}
