//! This module contains global constants used across the imaging, lyrics and device modules.

/// Edge length of the Pixoo64 panel in pixels.
pub const PANEL_SIZE: u32 = 64;

/// Default capacity of the processed image cache.
pub const DEFAULT_IMAGE_CACHE_SIZE: usize = 25;

// item list overlays
pub const ITEMLIST_ACTIVE_TEXT_ID: u32 = 100;
pub const ITEMLIST_INACTIVE_TEXT_ID: u32 = 200;
pub const ITEMLIST_Y: i32 = 57;
pub const ITEMLIST_FONT: u16 = 2;
pub const CLOCK_X_RIGHT: i32 = 34;
pub const CLOCK_X_LEFT: i32 = 2;
pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";

// scrolling info notices ("Searching...", "Loading...")
pub const INFO_TEXT_X: i32 = 0;
pub const INFO_TEXT_Y: i32 = 56;
pub const INFO_TEXT_COLOR: [u8; 3] = [100, 100, 100];
pub const INFO_TEXT_FONT: u16 = 2;
pub const INFO_TEXT_WIDTH: u32 = 64;
pub const INFO_TEXT_SPEED: u32 = 10;

// special mode layout
pub const SPECIAL_TILE_SMALL: u32 = 34;
pub const SPECIAL_TILE_LARGE: u32 = 56;
pub const SPECIAL_TOP_PADDING: u32 = 8;

// burned caption
pub const CAPTION_FONT_SIZE: u32 = 8;
pub const CAPTION_X: i32 = 2;
pub const CAPTION_Y: i32 = 56;
pub const CAPTION_MAX_WIDTH: u32 = 60;
pub const CAPTION_BG_OPACITY: f32 = 0.6;

/// Frame duration of the single frame GIF pushed to the panel, in ms.
pub const GIF_FRAME_MS: u32 = 100;

// lyrics
pub const LYRICS_DEFAULT_FONT: u16 = 190;
pub const LYRICS_FONT_OPTIONS: [u16; 12] = [2, 4, 32, 52, 58, 62, 48, 80, 158, 186, 190, 590];
pub const LYRICS_MAX_HOLD_MS: u64 = 15_000;
pub const LYRICS_LAST_LINE_HOLD_MS: u64 = 10_000;
pub const LYRICS_LINE_GAP_MS: u64 = 50;
pub const LYRICS_BASE_Y: i32 = 56;
pub const LYRICS_SINGLE_Y: i32 = 58;
pub const LYRICS_LINE_HEIGHT: i32 = 8;
pub const LYRICS_MAX_Y: i32 = 59;

/// Delay before a "paused" player blanks the panel.
pub const PAUSE_DEBOUNCE_MS: u64 = 5_000;

// lights
pub const LIGHT_MIN_PCT: u8 = 10;
pub const LIGHT_MAX_PCT: u8 = 100;
pub const LIGHT_DEFAULT_PCT: u8 = 80;

// http timeouts in ms
pub const DEVICE_TIMEOUT_MS: u64 = 5_000;
pub const PROVIDER_TIMEOUT_MS: u64 = 10_000;
pub const LYRICS_TIMEOUT_MS: u64 = 15_000;
pub const CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Concurrent image workers.
pub const IMAGE_WORKERS: usize = 3;

/// User agent sent to every external service.
pub const USER_AGENT: &str = concat!("PixooArt ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));
