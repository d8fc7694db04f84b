/*
 *  modes.rs
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

//! Display mode resolution.
//!
//! A display mode is a user facing label such as `"Clock | Temperature (Background)"`.
//! `Default` restores the persisted settings; every other label starts from an
//! all-off baseline and switches features on by keyword.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const DISPLAY_MODE_OPTIONS: &[&str] = &[
    "Default",
    "Clean",
    "AI Generation (Flux)",
    "AI Generation (Turbo)",
    "Burned",
    "Burned | Clock",
    "Burned | Clock (Background)",
    "Burned | Temperature",
    "Burned | Temperature (Background)",
    "Burned | Clock & Temperature (Background)",
    "Text",
    "Text (Background)",
    "Clock",
    "Clock (Background)",
    "Clock | Temperature",
    "Clock | Temperature (Background)",
    "Clock | Temperature | Text",
    "Clock | Temperature | Text (Background)",
    "Lyrics",
    "Lyrics (Background)",
    "Temperature",
    "Temperature (Background)",
    "Temperature | Text",
    "Temperature | Text (Background)",
    "Special Mode",
    "Special Mode | Text",
];

/// Offered only when a Spotify client is configured.
pub const SPOTIFY_SLIDER_OPTIONS: &[&str] = &[
    "Spotify Slider (beta)",
    "Spotify Slider Special Mode with Text (beta)",
];

pub const CROP_MODE_OPTIONS: &[&str] = &["Default", "No Crop", "Crop", "Extra Crop"];

/// Modes that always carry the clock/temperature item list.
pub const ITEMLIST_MODES: &[&str] = &[
    "Clock",
    "Clock | Temperature",
    "Clock | Temperature | Text",
    "Temperature",
    "Temperature | Text",
    "Special Mode",
    "Special Mode | Text",
];

/// Modes that never carry an item list.
pub const NO_ITEMLIST_MODES: &[&str] = &["Album Art Only", "Lyrics Only", "Clean", "Burned"];

/// Modes in which lyrics are never ticked.
pub const NO_LYRICS_MODES: &[&str] = &["Clock", "Temperature", "Album Art Only", "Clean"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiModel {
    #[default]
    Turbo,
    Flux,
}

impl AiModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiModel::Turbo => "turbo",
            AiModel::Flux => "flux",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turbo" => Some(AiModel::Turbo),
            "flux" => Some(AiModel::Flux),
            _ => None,
        }
    }
}

/// The persisted feature settings that `Default` restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OriginalSettings {
    pub show_clock: bool,
    pub show_temperature: bool,
    pub show_lyrics: bool,
    pub show_itemlist_text: bool,
    pub text_background: bool,
    pub special_mode: bool,
    pub spotify_slide: bool,
    pub burned_caption: bool,
    pub force_ai: bool,
    pub ai_model: AiModel,
    pub crop_enabled: bool,
    pub crop_extra: bool,
}

/// Feature flags derived from the persisted settings plus the selected
/// display and crop modes. Recomputed, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFeatureFlags {
    pub display_mode: String,
    pub crop_mode: String,
    pub show_clock: bool,
    pub show_temperature: bool,
    pub show_lyrics: bool,
    pub show_itemlist_text: bool,
    pub text_background: bool,
    pub special_mode: bool,
    pub spotify_slide: bool,
    pub special_mode_spotify_slider: bool,
    pub burned_caption: bool,
    pub force_ai: bool,
    pub ai_model: AiModel,
    pub crop_enabled: bool,
    pub crop_extra: bool,
}

impl ResolvedFeatureFlags {
    /// Case-insensitive membership test of the resolved mode label.
    pub fn mode_in(&self, modes: &[&str]) -> bool {
        modes.iter().any(|m| m.eq_ignore_ascii_case(&self.display_mode))
    }
}

/// Resolves both the display and crop mode.
pub fn resolve(mode: &str, crop: &str, originals: &OriginalSettings) -> ResolvedFeatureFlags {
    let mut flags = resolve_mode(mode, originals);
    let (enabled, extra) = resolve_crop(crop, originals);
    flags.crop_mode = crop.to_string();
    flags.crop_enabled = enabled;
    flags.crop_extra = extra;
    flags
}

/// Display mode only, crop comes from the originals.
pub fn resolve_mode(mode: &str, originals: &OriginalSettings) -> ResolvedFeatureFlags {
    let m = mode.trim().to_lowercase();
    let mut f = ResolvedFeatureFlags {
        display_mode: mode.trim().to_string(),
        crop_mode: "Default".to_string(),
        show_clock: false,
        show_temperature: false,
        show_lyrics: false,
        show_itemlist_text: false,
        text_background: false,
        special_mode: false,
        spotify_slide: false,
        special_mode_spotify_slider: false,
        burned_caption: false,
        force_ai: false,
        ai_model: originals.ai_model,
        crop_enabled: originals.crop_enabled,
        crop_extra: originals.crop_extra,
    };

    if m == "default" {
        f.show_clock = originals.show_clock;
        f.show_temperature = originals.show_temperature;
        f.show_lyrics = originals.show_lyrics;
        f.show_itemlist_text = originals.show_itemlist_text;
        f.text_background = originals.text_background;
        f.special_mode = originals.special_mode;
        f.spotify_slide = originals.spotify_slide;
        f.burned_caption = originals.burned_caption;
        f.force_ai = originals.force_ai;
    } else {
        f.show_lyrics = m.contains("lyrics");
        f.spotify_slide = m.contains("spotify slider");
        f.special_mode = m.contains("special mode");
        f.show_clock = m.contains("clock");
        f.show_temperature = m.contains("temperature");
        f.show_itemlist_text = m.contains("text");
        f.text_background = m.contains("background");
        f.force_ai = m.contains("ai generation");
        f.burned_caption = m.contains("burned");

        if f.force_ai {
            if m.contains("flux") {
                f.ai_model = AiModel::Flux;
            } else if m.contains("turbo") {
                f.ai_model = AiModel::Turbo;
            }
        }

        match m.as_str() {
            "album art only" => {
                f.show_lyrics = false;
                f.show_clock = false;
                f.show_temperature = false;
                f.show_itemlist_text = false;
                f.text_background = false;
                f.special_mode = false;
                f.spotify_slide = false;
                f.burned_caption = false;
                f.force_ai = false;
            }
            "lyrics only" => {
                f.show_lyrics = true;
                f.show_clock = false;
                f.show_temperature = false;
                f.show_itemlist_text = false;
                f.text_background = false;
                f.special_mode = false;
                f.spotify_slide = false;
                f.burned_caption = false;
                f.force_ai = false;
            }
            _ => {}
        }
    }

    // a backing bar needs something on the panel to sit behind
    let itemlist_text = f.show_itemlist_text && m != "lyrics only" && m != "album art only";
    if !(f.show_clock || f.show_temperature || itemlist_text) {
        f.text_background = false;
    }
    f.special_mode_spotify_slider = f.spotify_slide && f.special_mode && f.show_itemlist_text;

    debug!(
        "Applied mode '{}': lyrics={} clock={} temp={} text={} burned={} force_ai={} ai_model={} text_bg={} special={} slide={}",
        mode, f.show_lyrics, f.show_clock, f.show_temperature, f.show_itemlist_text, f.burned_caption,
        f.force_ai, f.ai_model.as_str(), f.text_background, f.special_mode, f.spotify_slide
    );
    f
}

/// `(crop_enabled, crop_extra)` for a crop mode label.
pub fn resolve_crop(crop: &str, originals: &OriginalSettings) -> (bool, bool) {
    match crop.trim().to_lowercase().as_str() {
        "no crop" => (false, false),
        "crop" => (true, false),
        "extra crop" => (true, true),
        "default" => (originals.crop_enabled, originals.crop_extra),
        _ => {
            warn!("Unknown crop mode: {}. Applying Default.", crop);
            (originals.crop_enabled, originals.crop_extra)
        }
    }
}
