/*
 *  colortools.rs
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

//! Colour conversion, palette extraction and the enhancement filters
//! applied to artwork before it is pushed to the panel.

use image::{DynamicImage, Rgb, RgbImage};
use log::debug;

/// Parses `#RRGGBB` or `#RGB` into `[r, g, b]`.
/// Anything else (missing `#`, bad length, non-hex digits) yields black.
pub fn hex_to_rgb_list(hex: Option<&str>) -> [u8; 3] {
    let Some(s) = hex else { return [0, 0, 0] };
    let Some(digits) = s.strip_prefix('#') else { return [0, 0, 0] };
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return [0, 0, 0];
    }
    let expanded: String = match digits.len() {
        6 => digits.to_string(),
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        _ => return [0, 0, 0],
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).unwrap_or(0);
    [channel(0), channel(2), channel(4)]
}

/// Formats three components as lower-case `#rrggbb`, clamping each to 0..=255.
/// Any other component count gives `#000000`.
pub fn rgb_to_hex(components: &[i32]) -> String {
    match components {
        [r, g, b] => format!(
            "#{:02x}{:02x}{:02x}",
            (*r).clamp(0, 255),
            (*g).clamp(0, 255),
            (*b).clamp(0, 255)
        ),
        _ => "#000000".to_string(),
    }
}

#[inline]
pub fn rgb_hex(c: [u8; 3]) -> String {
    rgb_to_hex(&[c[0] as i32, c[1] as i32, c[2] as i32])
}

/// Drops any alpha or palette by compositing onto white.
pub fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let (w, h) = rgba.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let a = p[3] as u32;
        let over = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([over(p[0]), over(p[1]), over(p[2])])
    })
}

/// ITU-R 601-2 luma, as used for greyscale conversion.
#[inline]
fn luma(p: &Rgb<u8>) -> f32 {
    (p[0] as f32 * 299.0 + p[1] as f32 * 587.0 + p[2] as f32 * 114.0) / 1000.0
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// 3x3 convolution, edge pixels are left untouched.
fn convolve3x3(img: &RgbImage, kernel: &[f32; 9], divisor: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0f32; 3];
            for ky in 0..3u32 {
                for kx in 0..3u32 {
                    let k = kernel[(ky * 3 + kx) as usize];
                    let p = img.get_pixel(x + kx - 1, y + ky - 1);
                    for c in 0..3 {
                        acc[c] += p[c] as f32 * k;
                    }
                }
            }
            out.put_pixel(x, y, Rgb(acc.map(|v| clamp_u8(v / divisor))));
        }
    }
    out
}

/// `degenerate + factor * (img - degenerate)`, pixelwise.
fn blend(degenerate: &RgbImage, img: &RgbImage, factor: f32) -> RgbImage {
    let mut out = img.clone();
    for (o, (d, s)) in out.pixels_mut().zip(degenerate.pixels().zip(img.pixels())) {
        for c in 0..3 {
            o[c] = clamp_u8(d[c] as f32 + factor * (s[c] as f32 - d[c] as f32));
        }
    }
    out
}

pub fn sharpen_kernel(img: &RgbImage) -> RgbImage {
    convolve3x3(img, &[-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0], 1.0)
}

/// Saturation: blend away from the greyscale rendition.
pub fn enhance_color(img: &RgbImage, factor: f32) -> RgbImage {
    let grey = RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let l = clamp_u8(luma(img.get_pixel(x, y)));
        Rgb([l, l, l])
    });
    blend(&grey, img, factor)
}

/// Contrast: blend away from a flat image at the mean luma.
pub fn enhance_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let n = (img.width() * img.height()).max(1) as f32;
    let mean = (img.pixels().map(|p| luma(p).trunc()).sum::<f32>() / n + 0.5).trunc() as u8;
    let flat = RgbImage::from_pixel(img.width(), img.height(), Rgb([mean, mean, mean]));
    blend(&flat, img, factor)
}

/// Sharpness: blend away from a smoothed copy.
pub fn enhance_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let smooth = convolve3x3(img, &[1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0], 13.0);
    blend(&smooth, img, factor)
}

/// Median cut palette, most populous bucket first.
pub fn median_cut(img: &RgbImage, colors: usize) -> Vec<[u8; 3]> {
    let mut boxes: Vec<Vec<[u8; 3]>> = vec![img.pixels().map(|p| p.0).collect()];
    if boxes[0].is_empty() || colors == 0 {
        return Vec::new();
    }
    while boxes.len() < colors {
        let widest = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() > 1)
            .map(|(i, b)| {
                let (channel, lo, range) = widest_channel(b);
                (i, channel, lo, range)
            })
            .max_by_key(|&(_, _, _, range)| range);
        let Some((idx, channel, lo, range)) = widest else { break };
        if range == 0 {
            break;
        }
        // split at the middle of the value range, not the pixel count
        let mid = lo + range / 2;
        let mut bucket = boxes.swap_remove(idx);
        bucket.sort_unstable_by_key(|p| p[channel]);
        let cut = bucket.partition_point(|p| p[channel] <= mid);
        let upper = bucket.split_off(cut);
        boxes.push(bucket);
        boxes.push(upper);
    }
    boxes.sort_by(|a, b| b.len().cmp(&a.len()));
    boxes.iter().map(|b| bucket_mean(b)).collect()
}

fn widest_channel(bucket: &[[u8; 3]]) -> (usize, u8, u8) {
    let mut lo = [u8::MAX; 3];
    let mut hi = [u8::MIN; 3];
    for p in bucket {
        for c in 0..3 {
            lo[c] = lo[c].min(p[c]);
            hi[c] = hi[c].max(p[c]);
        }
    }
    (0..3)
        .map(|c| (c, lo[c], hi[c] - lo[c]))
        .max_by_key(|&(_, _, r)| r)
        .unwrap_or((0, 0, 0))
}

fn bucket_mean(bucket: &[[u8; 3]]) -> [u8; 3] {
    let n = bucket.len().max(1) as u64;
    let mut sum = [0u64; 3];
    for p in bucket {
        for c in 0..3 {
            sum[c] += p[c] as u64;
        }
    }
    sum.map(|s| ((s + n / 2) / n) as u8)
}

/// Reduces the image to at most `colors` colours (never fewer than 2).
pub fn limit_colors(img: &RgbImage, colors: u32) -> RgbImage {
    let palette = median_cut(img, colors.max(2) as usize);
    if palette.is_empty() {
        return img.clone();
    }
    let mut out = img.clone();
    for p in out.pixels_mut() {
        if let Some(best) = palette.iter().min_by_key(|c| distance2(c, &p.0)) {
            *p = Rgb(*best);
        }
    }
    out
}

#[inline]
fn distance2(a: &[u8; 3], b: &[u8; 3]) -> u32 {
    (0..3)
        .map(|c| {
            let d = a[c] as i32 - b[c] as i32;
            (d * d) as u32
        })
        .sum()
}

/// Which enhancement filters to run, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Enhancements {
    pub kernel: bool,
    pub colors: bool,
    pub contrast: bool,
    pub sharpness: bool,
    pub limit_colors: Option<u32>,
}

const ENHANCE_FACTOR: f32 = 1.2;

pub fn enhance(img: RgbImage, opts: &Enhancements) -> RgbImage {
    let mut img = img;
    if opts.kernel {
        img = sharpen_kernel(&img);
    }
    if opts.colors {
        img = enhance_color(&img, ENHANCE_FACTOR);
    }
    if opts.contrast {
        img = enhance_contrast(&img, ENHANCE_FACTOR);
    }
    if opts.sharpness {
        img = enhance_sharpness(&img, ENHANCE_FACTOR);
    }
    if let Some(n) = opts.limit_colors.filter(|n| *n > 0) {
        debug!("Limiting colors to {}", n.max(2));
        img = limit_colors(&img, n);
    }
    img
}

/// Box average of every pixel, the same as a 1x1 area downsample.
pub fn average_color(img: &RgbImage) -> [u8; 3] {
    let pixels: Vec<[u8; 3]> = img.pixels().map(|p| p.0).collect();
    bucket_mean(&pixels)
}

/// Mean of the three channels, 0..=255.
pub fn brightness(c: [u8; 3]) -> f32 {
    (c[0] as f32 + c[1] as f32 + c[2] as f32) / 3.0
}

/// Caption colour that reads against the given brightness.
pub fn contrast_text_color(brightness: f32) -> [u8; 3] {
    if brightness > 128.0 { [0, 0, 0] } else { [255, 255, 255] }
}

/// Up to three distinct palette colours for the strip lights.
/// Pure black and white are skipped unless nothing else exists;
/// gaps cascade from the previous colour, the first from `fallback`.
pub fn dominant_palette(img: &RgbImage, fallback: [u8; 3]) -> [[u8; 3]; 3] {
    let palette = median_cut(img, 5);
    let mut picked: Vec<[u8; 3]> = Vec::with_capacity(3);
    for c in palette.iter().filter(|c| **c != [0, 0, 0] && **c != [255, 255, 255]) {
        if !picked.contains(c) {
            picked.push(*c);
        }
        if picked.len() == 3 {
            break;
        }
    }
    if picked.is_empty() {
        for c in &palette {
            if !picked.contains(c) {
                picked.push(*c);
            }
            if picked.len() == 3 {
                break;
            }
        }
    }
    let c1 = picked.first().copied().unwrap_or(fallback);
    let c2 = picked.get(1).copied().unwrap_or(c1);
    let c3 = picked.get(2).copied().unwrap_or(c2);
    [c1, c2, c3]
}
