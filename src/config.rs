use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::colortools::Enhancements;
use crate::constants::{DEFAULT_IMAGE_CACHE_SIZE, LYRICS_DEFAULT_FONT, LYRICS_FONT_OPTIONS};
use crate::deutils::{deserialize_limit_colors, deserialize_opt_bool_from_anything, deserialize_opt_i64_from_anything};
use crate::modes::{AiModel, OriginalSettings};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level config file. Every field is optional so files stay short;
/// defaults are applied when the file is normalised into [`Settings`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,
    pub hass: Option<HassConfig>,
    pub pixoo: Option<PixooConfig>,
    pub display: Option<DisplayConfig>,
    pub lights: Option<LightsConfig>,
    pub providers: Option<ProvidersConfig>,
    pub lyrics: Option<LyricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HassConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub media_player: Option<String>,
    pub temperature_sensor: Option<String>,
    /// Filesystem directory served as `/local/`
    pub local_web_root: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub poll_interval_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PixooConfig {
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub full_control: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub images_cache_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub display_mode: Option<String>,
    pub crop_mode: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub show_clock: Option<bool>,
    pub clock_align: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub temperature: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub show_lyrics: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub show_text: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub text_background: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub special_mode: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub spotify_slide: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub burned: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub force_ai: Option<bool>,
    pub ai_model: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub tv_icon: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub info_fallback: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub clean_title: Option<bool>,
    /// preset name, see [`PREDEFINED_FONT_COLORS`]
    pub font_color: Option<String>,
    pub custom_font_color: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub contrast: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub sharpness: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub colors_enhanced: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub kernel_effect: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_limit_colors")]
    pub limit_colors: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub crop_borders: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub crop_extra: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LightsConfig {
    /// comma separated light entity ids
    pub light_entity: Option<String>,
    /// comma separated WLED addresses
    pub wled_ips: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub wled_brightness: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub wled_effect_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub wled_speed: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub wled_intensity: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub wled_palette: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub wled_only_at_night: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub discogs_token: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub tidal_client_id: Option<String>,
    pub tidal_client_secret: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_bool_from_anything")]
    pub musicbrainz: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LyricsConfig {
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub font: Option<i64>,
    /// ms offset, -1 for none
    #[serde(default, deserialize_with = "deserialize_opt_i64_from_anything")]
    pub sync: Option<i64>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "pixoo-art", version, about = "PixooArt - now playing on the Pixoo64")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub pixoo_ip: Option<String>,
    #[arg(long)]
    pub media_player: Option<String>,
    #[arg(long, value_hint = ValueHint::Url)]
    pub hass_url: Option<String>,
    #[arg(long)]
    pub display_mode: Option<String>,
    #[arg(long)]
    pub crop_mode: Option<String>,
    /// list the display and crop modes and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub list_modes: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Read YAML (explicit path or search) and layer the CLI on top.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            cfg = read_yaml(p)?;
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        cfg = read_yaml(&p)?;
    }

    apply_cli_overrides(&mut cfg, cli);
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        let p = home.join(".config/pixoo-art/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/pixoo-art.yaml");
        if p.exists() { return Some(p) }
    }
    for candidate in &["pixoo-art.yaml", "config.yaml", "config/pixoo-art.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.pixoo_ip.is_some() {
        cfg.pixoo.get_or_insert_with(Default::default).ip = cli.pixoo_ip.clone();
    }
    if cli.media_player.is_some() || cli.hass_url.is_some() {
        let hass = cfg.hass.get_or_insert_with(Default::default);
        if cli.media_player.is_some() { hass.media_player = cli.media_player.clone(); }
        if cli.hass_url.is_some() { hass.url = cli.hass_url.clone(); }
    }
    if cli.display_mode.is_some() || cli.crop_mode.is_some() {
        let display = cfg.display.get_or_insert_with(Default::default);
        if cli.display_mode.is_some() { display.display_mode = cli.display_mode.clone(); }
        if cli.crop_mode.is_some() { display.crop_mode = cli.crop_mode.clone(); }
    }
}

/// Font colour presets; `Automatic` means derive from the artwork.
pub const PREDEFINED_FONT_COLORS: &[(&str, Option<&str>)] = &[
    ("Automatic", None),
    ("White", Some("#FFFFFF")),
    ("Bright Yellow", Some("#FFFF00")),
    ("Gold", Some("#FFD700")),
    ("Light Cyan", Some("#E0FFFF")),
    ("Cyan / Aqua", Some("#00FFFF")),
    ("Bright Magenta", Some("#FF00FF")),
    ("Pink", Some("#FFC0CB")),
    ("Lime Green", Some("#32CD32")),
    ("Light Green", Some("#90EE90")),
    ("Orange", Some("#FFA500")),
    ("Red", Some("#FF0000")),
    ("Sky Blue", Some("#87CEEB")),
    ("Deep Sky Blue", Some("#00BFFF")),
    ("Spring Green", Some("#00FF7F")),
    ("Chartreuse", Some("#7FFF00")),
    ("Hot Pink", Some("#FF69B4")),
    ("Violet", Some("#EE82EE")),
    ("Turquoise", Some("#40E0D0")),
    ("Light Salmon", Some("#FFA07A")),
    ("Custom", None),
];

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}){1,2}$").expect("static regex"));
static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockAlign {
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub discogs_token: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub tidal_client_id: Option<String>,
    pub tidal_client_secret: Option<String>,
}

impl Credentials {
    pub fn has_spotify(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }
    pub fn has_tidal(&self) -> bool {
        self.tidal_client_id.is_some() && self.tidal_client_secret.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WledSettings {
    pub ips: Vec<String>,
    pub brightness: u8,
    pub effect_id: u16,
    pub speed: u8,
    pub intensity: u8,
    pub palette: u16,
    pub only_at_night: bool,
}

impl Default for WledSettings {
    fn default() -> Self {
        WledSettings {
            ips: Vec::new(),
            brightness: 255,
            effect_id: 38,
            speed: 60,
            intensity: 128,
            palette: 0,
            only_at_night: false,
        }
    }
}

/// Normalised, immutable settings for one display instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub hass_url: String,
    pub hass_token: Option<String>,
    pub media_player: String,
    pub temperature_sensor: Option<String>,
    pub local_web_root: PathBuf,
    pub poll_interval_ms: u64,
    pub pixoo_ip: String,
    pub full_control: bool,
    pub images_cache_size: usize,
    pub display_mode: String,
    pub crop_mode: String,
    pub originals: OriginalSettings,
    pub clock_align: ClockAlign,
    pub tv_icon: bool,
    pub info_fallback: bool,
    pub clean_title: bool,
    /// resolved `#RRGGBB`/`#RGB`, None for automatic
    pub forced_font_color: Option<String>,
    pub enhancements: Enhancements,
    pub lyrics_font: u16,
    pub lyrics_sync: i32,
    pub light_entities: Vec<String>,
    pub wled: WledSettings,
    pub credentials: Credentials,
    pub musicbrainz_enabled: bool,
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// A valid custom hex wins; otherwise the preset (if any).
pub fn resolve_font_color(custom: Option<&str>, preset: Option<&str>) -> Option<String> {
    if let Some(c) = custom.map(str::trim).filter(|c| !c.is_empty()) {
        if HEX_COLOR.is_match(c) {
            return Some(c.to_string());
        }
        warn!("Invalid custom font color '{}', falling back to preset", c);
    }
    let preset = preset?.trim();
    match PREDEFINED_FONT_COLORS.iter().find(|(name, _)| name.eq_ignore_ascii_case(preset)) {
        Some((_, hex)) => hex.map(str::to_string),
        None => {
            warn!("Unknown font color preset '{}', using Automatic", preset);
            None
        }
    }
}

/// Comma separated IPv4 list; malformed entries are dropped with a warning.
pub fn parse_wled_ips(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|ip| {
            let ok = IPV4.is_match(ip);
            if !ok {
                warn!("Invalid WLED IP address format: {}", ip);
            }
            ok
        })
        .map(str::to_string)
        .collect()
}

/// Clamps an optional integer into `min..=max`, warning when it had to move.
fn bounded(name: &str, value: Option<i64>, min: i64, max: i64, default: i64) -> i64 {
    match value {
        None => default,
        Some(v) if (min..=max).contains(&v) => v,
        Some(v) => {
            let c = v.clamp(min, max);
            warn!("{} {} is outside {}..={}, using {}", name, v, min, max, c);
            c
        }
    }
}

fn bounded_u8(name: &str, value: Option<i64>, default: u8) -> u8 {
    bounded(name, value, 0, u8::MAX as i64, default as i64) as u8
}

fn bounded_u16(name: &str, value: Option<i64>, default: u16) -> u16 {
    bounded(name, value, 0, u16::MAX as i64, default as i64) as u16
}

pub fn normalize_lyrics_font(font: Option<i64>) -> u16 {
    match font {
        Some(f) if u16::try_from(f).is_ok_and(|f| LYRICS_FONT_OPTIONS.contains(&f)) => f as u16,
        Some(f) => {
            warn!("Invalid lyrics font {}, using {}", f, LYRICS_DEFAULT_FONT);
            LYRICS_DEFAULT_FONT
        }
        None => LYRICS_DEFAULT_FONT,
    }
}

impl Settings {
    /// Validates required fields and normalises everything else.
    /// Malformed optional values fall back to defaults with a warning.
    pub fn from_config(cfg: &Config) -> Result<Settings, ConfigError> {
        let hass = cfg.hass.clone().unwrap_or_default();
        let pixoo = cfg.pixoo.clone().unwrap_or_default();
        let display = cfg.display.clone().unwrap_or_default();
        let lights = cfg.lights.clone().unwrap_or_default();
        let providers = cfg.providers.clone().unwrap_or_default();
        let lyrics = cfg.lyrics.clone().unwrap_or_default();

        let media_player = non_empty(&hass.media_player)
            .ok_or_else(|| ConfigError::Validation("hass.media_player is required".into()))?;
        let pixoo_ip = non_empty(&pixoo.ip)
            .ok_or_else(|| ConfigError::Validation("pixoo.ip is required".into()))?;

        let ai_model = match display.ai_model.as_deref() {
            None => AiModel::Turbo,
            Some(s) => AiModel::parse(s).unwrap_or_else(|| {
                warn!("Unknown AI model '{}', using turbo", s);
                AiModel::Turbo
            }),
        };
        let clock_align = match display.clock_align.as_deref().map(str::trim) {
            None => ClockAlign::Right,
            Some(a) if a.eq_ignore_ascii_case("left") => ClockAlign::Left,
            Some(a) if a.eq_ignore_ascii_case("right") => ClockAlign::Right,
            Some(a) => {
                warn!("Unknown clock alignment '{}', using Right", a);
                ClockAlign::Right
            }
        };

        let originals = OriginalSettings {
            show_clock: display.show_clock.unwrap_or(false),
            show_temperature: display.temperature.unwrap_or(false),
            show_lyrics: display.show_lyrics.unwrap_or(false),
            show_itemlist_text: display.show_text.unwrap_or(false),
            text_background: display.text_background.unwrap_or(true),
            special_mode: display.special_mode.unwrap_or(false),
            spotify_slide: display.spotify_slide.unwrap_or(false),
            burned_caption: display.burned.unwrap_or(false),
            force_ai: display.force_ai.unwrap_or(false),
            ai_model,
            crop_enabled: display.crop_borders.unwrap_or(false),
            crop_extra: display.crop_extra.unwrap_or(false),
        };

        let hass_url = non_empty(&hass.url)
            .unwrap_or_else(|| "http://homeassistant.local:8123".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Settings {
            hass_url,
            hass_token: non_empty(&hass.token),
            media_player,
            temperature_sensor: non_empty(&hass.temperature_sensor),
            local_web_root: hass.local_web_root.unwrap_or_else(|| PathBuf::from("www")),
            poll_interval_ms: bounded("poll_interval_ms", hass.poll_interval_ms, 100, 60_000, 1000) as u64,
            pixoo_ip,
            full_control: pixoo.full_control.unwrap_or(true),
            images_cache_size: bounded(
                "images_cache_size",
                pixoo.images_cache_size,
                1,
                1000,
                DEFAULT_IMAGE_CACHE_SIZE as i64,
            ) as usize,
            display_mode: non_empty(&display.display_mode).unwrap_or_else(|| "Default".into()),
            crop_mode: non_empty(&display.crop_mode).unwrap_or_else(|| "Default".into()),
            originals,
            clock_align,
            tv_icon: display.tv_icon.unwrap_or(true),
            info_fallback: display.info_fallback.unwrap_or(false),
            clean_title: display.clean_title.unwrap_or(true),
            forced_font_color: resolve_font_color(
                display.custom_font_color.as_deref(),
                display.font_color.as_deref(),
            ),
            enhancements: Enhancements {
                kernel: display.kernel_effect.unwrap_or(false),
                colors: display.colors_enhanced.unwrap_or(false),
                contrast: display.contrast.unwrap_or(false),
                sharpness: display.sharpness.unwrap_or(false),
                limit_colors: display.limit_colors,
            },
            lyrics_font: normalize_lyrics_font(lyrics.font),
            lyrics_sync: bounded("lyrics sync", lyrics.sync, -60_000, 60_000, -1) as i32,
            light_entities: lights
                .light_entity
                .as_deref()
                .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            wled: WledSettings {
                ips: lights.wled_ips.as_deref().map(parse_wled_ips).unwrap_or_default(),
                brightness: bounded_u8("wled_brightness", lights.wled_brightness, 255),
                effect_id: bounded_u16("wled_effect_id", lights.wled_effect_id, 38),
                speed: bounded_u8("wled_speed", lights.wled_speed, 60),
                intensity: bounded_u8("wled_intensity", lights.wled_intensity, 128),
                palette: bounded_u16("wled_palette", lights.wled_palette, 0),
                only_at_night: lights.wled_only_at_night.unwrap_or(false),
            },
            credentials: Credentials {
                spotify_client_id: non_empty(&providers.spotify_client_id),
                spotify_client_secret: non_empty(&providers.spotify_client_secret),
                discogs_token: non_empty(&providers.discogs_token),
                lastfm_api_key: non_empty(&providers.lastfm_api_key),
                tidal_client_id: non_empty(&providers.tidal_client_id),
                tidal_client_secret: non_empty(&providers.tidal_client_secret),
            },
            musicbrainz_enabled: providers.musicbrainz.unwrap_or(true),
        })
    }

    /// Minimal settings for a device and player, everything else default.
    pub fn with_required(pixoo_ip: &str, media_player: &str) -> Result<Settings, ConfigError> {
        let cfg = Config {
            hass: Some(HassConfig { media_player: Some(media_player.into()), ..Default::default() }),
            pixoo: Some(PixooConfig { ip: Some(pixoo_ip.into()), ..Default::default() }),
            ..Default::default()
        };
        Settings::from_config(&cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: debug
hass:
  url: http://hass.lan:8123/
  token: abc
  media_player: media_player.living_room
  temperature_sensor: sensor.outside
pixoo:
  ip: 192.168.1.50
  full_control: "yes"
display:
  display_mode: Clock | Temperature
  crop_mode: Extra Crop
  show_clock: true
  clock_align: Left
  ai_model: FLUX
  font_color: Gold
  limit_colors: "false"
  burned: 1
lights:
  light_entity: light.a, light.b
  wled_ips: 192.168.1.60, wled.local, 10.0.0.7
providers:
  spotify_client_id: id
  spotify_client_secret: ""
lyrics:
  font: 3
"#;

    #[test]
    fn test_sample_config_normalises() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let s = Settings::from_config(&cfg).unwrap();
        assert_eq!(s.hass_url, "http://hass.lan:8123");
        assert_eq!(s.media_player, "media_player.living_room");
        assert!(s.full_control);
        assert_eq!(s.display_mode, "Clock | Temperature");
        assert_eq!(s.crop_mode, "Extra Crop");
        assert_eq!(s.clock_align, ClockAlign::Left);
        assert_eq!(s.originals.ai_model, AiModel::Flux);
        assert!(s.originals.burned_caption);
        assert_eq!(s.forced_font_color.as_deref(), Some("#FFD700"));
        assert_eq!(s.enhancements.limit_colors, None);
        assert_eq!(s.light_entities, vec!["light.a", "light.b"]);
        assert_eq!(s.wled.ips, vec!["192.168.1.60", "10.0.0.7"]);
        assert!(!s.credentials.has_spotify());
        assert_eq!(s.lyrics_font, LYRICS_DEFAULT_FONT);
        assert_eq!(s.lyrics_sync, -1);
        assert_eq!(s.images_cache_size, DEFAULT_IMAGE_CACHE_SIZE);
    }

    #[test]
    fn test_required_fields() {
        let cfg: Config = serde_yaml::from_str("pixoo:\n  ip: 1.2.3.4\n").unwrap();
        assert!(matches!(Settings::from_config(&cfg), Err(ConfigError::Validation(_))));
        let cfg: Config = serde_yaml::from_str("hass:\n  media_player: media_player.x\n").unwrap();
        assert!(matches!(Settings::from_config(&cfg), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_font_color_resolution() {
        assert_eq!(resolve_font_color(Some("#abc"), Some("Red")).as_deref(), Some("#abc"));
        assert_eq!(resolve_font_color(Some("#12345"), Some("Red")).as_deref(), Some("#FF0000"));
        assert_eq!(resolve_font_color(None, Some("Automatic")), None);
        assert_eq!(resolve_font_color(None, Some("Custom")), None);
        assert_eq!(resolve_font_color(None, Some("Plaid")), None);
        assert_eq!(resolve_font_color(None, None), None);
    }

    #[test]
    fn test_lyrics_font_options() {
        assert_eq!(normalize_lyrics_font(Some(58)), 58);
        assert_eq!(normalize_lyrics_font(Some(59)), LYRICS_DEFAULT_FONT);
        assert_eq!(normalize_lyrics_font(Some(-2)), LYRICS_DEFAULT_FONT);
        assert_eq!(normalize_lyrics_font(Some(70_000)), LYRICS_DEFAULT_FONT);
        assert_eq!(normalize_lyrics_font(None), LYRICS_DEFAULT_FONT);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["pixoo-art", "--pixoo-ip", "10.1.1.1", "--display-mode", "Lyrics"]);
        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli);
        assert_eq!(cfg.pixoo.unwrap().ip.as_deref(), Some("10.1.1.1"));
        assert_eq!(cfg.display.unwrap().display_mode.as_deref(), Some("Lyrics"));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let yaml = r#"
hass:
  media_player: media_player.den
  poll_interval_ms: 5
pixoo:
  ip: 1.2.3.4
  images_cache_size: "lots"
  full_control: perhaps
display:
  crop_borders: maybe
lights:
  wled_brightness: 300
  wled_speed: "-4"
  wled_effect_id: "77"
lyrics:
  font: big
  sync: "250"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let s = Settings::from_config(&cfg).unwrap();
        assert_eq!(s.wled.brightness, 255);
        assert_eq!(s.wled.speed, 0);
        assert_eq!(s.wled.effect_id, 77);
        assert_eq!(s.lyrics_font, LYRICS_DEFAULT_FONT);
        assert_eq!(s.lyrics_sync, 250);
        assert!(!s.originals.crop_enabled);
        assert!(s.full_control);
        assert_eq!(s.poll_interval_ms, 100);
        assert_eq!(s.images_cache_size, DEFAULT_IMAGE_CACHE_SIZE);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::with_required("1.2.3.4", "media_player.den").unwrap();
        assert!(s.full_control && s.tv_icon && s.clean_title && s.musicbrainz_enabled);
        assert!(s.originals.text_background);
        assert!(!s.info_fallback);
        assert_eq!(s.wled.effect_id, 38);
        assert_eq!(s.clock_align, ClockAlign::Right);
        assert_eq!(s.local_web_root, PathBuf::from("www"));
    }
}
