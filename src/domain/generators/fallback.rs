// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 合成回退资源
//!
//! 颜色由网站 id 的 SHA-256 决定，同一个 id 总是得到同一种颜色。
//! 渲染过程不访问网络。

use image::{DynamicImage, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use crate::domain::generators::glyphs::{self, GLYPH_HEIGHT, GLYPH_WIDTH};

/// 调色板颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteColor {
    pub hex: &'static str,
    pub rgb: [u8; 3],
}

pub const PALETTE: [PaletteColor; 8] = [
    PaletteColor { hex: "#2563EB", rgb: [0x25, 0x63, 0xEB] },
    PaletteColor { hex: "#7C3AED", rgb: [0x7C, 0x3A, 0xED] },
    PaletteColor { hex: "#DB2777", rgb: [0xDB, 0x27, 0x77] },
    PaletteColor { hex: "#DC2626", rgb: [0xDC, 0x26, 0x26] },
    PaletteColor { hex: "#EA580C", rgb: [0xEA, 0x58, 0x0C] },
    PaletteColor { hex: "#16A34A", rgb: [0x16, 0xA3, 0x4A] },
    PaletteColor { hex: "#0891B2", rgb: [0x08, 0x91, 0xB2] },
    PaletteColor { hex: "#4B5563", rgb: [0x4B, 0x55, 0x63] },
];

pub const LOGO_EDGE: u32 = 256;
pub const FAVICON_EDGE: u32 = 32;
const LOGO_RADIUS: u32 = 48;
const FAVICON_SCALE: u32 = 4;

/// `hash(id) mod paletteSize`
pub fn palette_index(website_id: &str) -> usize {
    let digest = Sha256::digest(website_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % PALETTE.len() as u64) as usize
}

pub fn palette_color(website_id: &str) -> PaletteColor {
    PALETTE[palette_index(website_id)]
}

/// 名称的首字母缩写，最多两个字符
///
/// 名称中没有字母数字时退回 id，仍然没有时为 `?`。
pub fn initials(name: &str, website_id: &str) -> String {
    let from = |text: &str| -> String {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .filter_map(|word| word.chars().next())
            .take(2)
            .map(|c| c.to_ascii_uppercase())
            .collect()
    };

    let letters = from(name);
    if !letters.is_empty() {
        return letters;
    }
    let letters = from(website_id);
    if !letters.is_empty() {
        return letters;
    }
    "?".to_string()
}

/// 渲染 Logo：圆角矩形背景上的首字母
pub fn render_logo(name: &str, website_id: &str) -> Vec<u8> {
    let color = palette_color(website_id);
    let text = initials(name, website_id);
    let font_size = if text.chars().count() > 1 { 104 } else { 136 };
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{edge}" height="{edge}" viewBox="0 0 {edge} {edge}">"#,
            r#"<rect width="{edge}" height="{edge}" rx="{radius}" ry="{radius}" fill="{fill}"/>"#,
            r#"<text x="50%" y="50%" dominant-baseline="central" text-anchor="middle" "#,
            r##"font-family="Helvetica, Arial, sans-serif" font-size="{size}" font-weight="700" fill="#FFFFFF">{text}</text>"##,
            "</svg>"
        ),
        edge = LOGO_EDGE,
        radius = LOGO_RADIUS,
        fill = color.hex,
        size = font_size,
        text = text,
    )
    .into_bytes()
}

/// 渲染 Favicon：纯色背景上的单个字形
pub fn render_favicon_image(name: &str, website_id: &str) -> DynamicImage {
    let color = palette_color(website_id);
    let letter = initials(name, website_id).chars().next().unwrap_or('?');
    let rows = glyphs::glyph(letter);

    let background = Rgba([color.rgb[0], color.rgb[1], color.rgb[2], 255]);
    let foreground = Rgba([255, 255, 255, 255]);
    let offset_x = (FAVICON_EDGE - GLYPH_WIDTH * FAVICON_SCALE) / 2;
    let offset_y = (FAVICON_EDGE - GLYPH_HEIGHT * FAVICON_SCALE) / 2;

    let image = RgbaImage::from_fn(FAVICON_EDGE, FAVICON_EDGE, |x, y| {
        let inside = x >= offset_x
            && y >= offset_y
            && glyphs::is_set(
                &rows,
                (x - offset_x) / FAVICON_SCALE,
                (y - offset_y) / FAVICON_SCALE,
            );
        if inside {
            foreground
        } else {
            background
        }
    });
    DynamicImage::ImageRgba8(image)
}
