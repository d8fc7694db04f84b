/*
 *  textlayout.rs
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

//! Caption text: bidi reordering, pixel width wrapping and compositing
//! onto an RGB canvas with an optional translucent backing bar.

use std::sync::LazyLock;

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, iso_8859_1 as fonts};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Baseline, Text};
use image::{Rgb, RgbImage};
use log::warn;
use regex::Regex;
use unicode_bidi::{BidiInfo, Level};

use crate::canvas::{RgbCanvas, to_rgb888};

static RTL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{0590}-\u{05FF}\u{0600}-\u{06FF}\u{0750}-\u{077F}\u{08A0}-\u{08FF}\u{FB1D}-\u{FDFF}\u{FE70}-\u{FEFF}]")
        .expect("static regex")
});

static ANNOTATIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[.*?\]|\s*\(.*?\)").expect("static regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// True when the text holds Hebrew or Arabic script.
pub fn has_bidi(text: &str) -> bool {
    !text.is_empty() && RTL_CHARS.is_match(text)
}

/// Visual (display) order for mixed direction text, left-to-right base.
pub fn get_bidi(text: &str) -> String {
    let info = BidiInfo::new(text, Some(Level::ltr()));
    if info.paragraphs.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for para in &info.paragraphs {
        out.push_str(&info.reorder_line(para, para.range.clone()));
    }
    out
}

/// Strip trailing `(Remastered)`/`[Live]` style annotations.
pub fn strip_annotations(text: &str) -> String {
    ANNOTATIONS.replace_all(text, "").trim().to_string()
}

/// Annotations removed and runs of whitespace collapsed.
pub fn clean_title(text: &str) -> String {
    collapse_whitespace(&strip_annotations(text))
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "center" | "centre" => TextAlign::Center,
            "right" => TextAlign::Right,
            _ => TextAlign::Left,
        }
    }
}

/// Resolves a font by name and nominal pixel size.
///
/// Bitmap fonts can be asked for directly (`"5x8"`, `"6x10"`...). The
/// family names a panel config usually carries (`arial.ttf`, `DejaVuSans.ttf`)
/// pick the bundled face closest to `size`. Unknown names fall back to the
/// same size based choice with a warning.
pub fn get_font(name: &str, size: u32) -> &'static MonoFont<'static> {
    let key = name.to_ascii_lowercase();
    match key.as_str() {
        "4x6" => return &fonts::FONT_4X6,
        "5x7" => return &fonts::FONT_5X7,
        "5x8" => return &fonts::FONT_5X8,
        "6x9" => return &fonts::FONT_6X9,
        "6x10" => return &fonts::FONT_6X10,
        "6x12" => return &fonts::FONT_6X12,
        "6x13" => return &fonts::FONT_6X13,
        "7x13" => return &fonts::FONT_7X13,
        "9x15" => return &fonts::FONT_9X15,
        "10x20" => return &fonts::FONT_10X20,
        _ => {}
    }
    let known_family = ["arial", "dejavusans", "default"]
        .iter()
        .any(|f| key.trim_end_matches(".ttf") == *f);
    if !known_family {
        warn!("Font '{}' not bundled, using default face for size {}", name, size);
    }
    match size {
        0..=6 => &fonts::FONT_4X6,
        7 => &fonts::FONT_5X7,
        8 => &fonts::FONT_5X8,
        9 => &fonts::FONT_6X9,
        10..=11 => &fonts::FONT_6X10,
        12 => &fonts::FONT_6X12,
        13..=14 => &fonts::FONT_7X13,
        15..=18 => &fonts::FONT_9X15,
        _ => &fonts::FONT_10X20,
    }
}

/// Rendered width of a single line in pixels.
pub fn text_width(text: &str, font: &MonoFont) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * font.character_size.width + (n - 1) * font.character_spacing
}

/// Word wrap to `max_width` pixels. Words wider than a line are broken
/// by character.
pub fn split_string(text: &str, max_width: u32, font: &MonoFont) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        if text_width(word, font) > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut piece = String::new();
            for ch in word.chars() {
                piece.push(ch);
                if text_width(&piece, font) > max_width {
                    piece.pop();
                    if !piece.is_empty() {
                        lines.push(std::mem::take(&mut piece));
                    }
                    piece.push(ch);
                }
            }
            current = piece;
            continue;
        }
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, font) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Backing bar drawn behind caption lines.
#[derive(Debug, Clone, Copy)]
pub struct TextBackground {
    pub color: [u8; 3],
    pub opacity: f32,
}

const BG_PAD_X: i32 = 3;
const BG_PAD_Y: i32 = 1;

/// Draws `text` onto `img`, wrapped to `max_width` when given.
///
/// With a width, alignment is within `[x, x + max_width)`; without one the
/// position is the anchor (left edge, centre or right edge).
pub fn add_text_to_image(
    img: &mut RgbImage,
    text: &str,
    font: &MonoFont,
    color: [u8; 3],
    position: (i32, i32),
    max_width: Option<u32>,
    background: Option<TextBackground>,
    align: TextAlign,
) {
    let lines = match max_width {
        Some(w) => split_string(text, w, font),
        None => vec![text.to_string()],
    };
    let line_height = font.character_size.height as i32;
    let style = MonoTextStyle::new(font, to_rgb888(color));
    let mut canvas = RgbCanvas::new(img);

    for (i, line) in lines.iter().enumerate() {
        let w = text_width(line, font) as i32;
        let x = match (align, max_width) {
            (TextAlign::Left, _) => position.0,
            (TextAlign::Center, Some(mw)) => position.0 + (mw as i32 - w) / 2,
            (TextAlign::Center, None) => position.0 - w / 2,
            (TextAlign::Right, Some(mw)) => position.0 + mw as i32 - w,
            (TextAlign::Right, None) => position.0 - w,
        };
        let y = position.1 + i as i32 * line_height;

        if let Some(bg) = background {
            let area = Rectangle::new(
                Point::new(x - BG_PAD_X, y - BG_PAD_Y),
                Size::new((w + 2 * BG_PAD_X) as u32, (line_height + 2 * BG_PAD_Y) as u32),
            );
            canvas.blend_rect(&area, bg.color, bg.opacity);
        }
        Text::with_baseline(line, Point::new(x, y), style, Baseline::Top)
            .draw(&mut canvas)
            .ok();
    }
}

/// A whole canvas of centred (or aligned) lines, used for text-only screens.
pub fn render_text_image(
    lines: &[String],
    font: &MonoFont,
    fg: [u8; 3],
    bg: [u8; 3],
    width: u32,
    height: u32,
    align: TextAlign,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb(bg));
    let line_height = font.character_size.height as i32;
    let gap = line_height / 4;
    let total = lines.len() as i32 * line_height + (lines.len().saturating_sub(1) as i32) * gap;
    let mut y = (height as i32 - total) / 2;
    let style = MonoTextStyle::new(font, to_rgb888(fg));
    let mut canvas = RgbCanvas::new(&mut img);

    for line in lines {
        let w = text_width(line, font) as i32;
        let x = match align {
            TextAlign::Left => 2,
            TextAlign::Center => (width as i32 - w) / 2,
            TextAlign::Right => width as i32 - w - 2,
        };
        Text::with_baseline(line, Point::new(x, y), style, Baseline::Top)
            .draw(&mut canvas)
            .ok();
        y += line_height + gap;
    }
    img
}
