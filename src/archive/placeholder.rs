//! Placeholder page images for archives.
//!
//! When a page cannot be retrieved, the archive embeds a generated
//! substitute carrying a "Page N could not be found" message so page count
//! and order are preserved. The message is rasterized with a small built-in
//! 5x7 glyph face covering the characters the fixed message needs.

use image::{DynamicImage, Rgb, RgbImage};

/// Placeholder canvas size: wide landscape strip, roughly page-shaped for
/// text content.
pub const PLACEHOLDER_WIDTH: u32 = 800;
pub const PLACEHOLDER_HEIGHT: u32 = 200;

const BACKGROUND: Rgb<u8> = Rgb([245, 245, 245]);
const BORDER: Rgb<u8> = Rgb([120, 120, 120]);
const INK: Rgb<u8> = Rgb([60, 60, 60]);

/// Pixel scale applied to the 5x7 glyphs.
const GLYPH_SCALE: u32 = 3;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Advance per character, in glyph cells.
const ADVANCE: u32 = GLYPH_WIDTH + 1;

/// The message text for a missing page, 1-based.
pub fn missing_page_message(page_number: usize) -> String {
    format!("Page {page_number} could not be found")
}

/// Render the placeholder raster for a missing page.
pub fn placeholder_image(message: &str) -> DynamicImage {
    let mut img = RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, BACKGROUND);

    for x in 0..PLACEHOLDER_WIDTH {
        for y in [0, 1, PLACEHOLDER_HEIGHT - 2, PLACEHOLDER_HEIGHT - 1] {
            img.put_pixel(x, y, BORDER);
        }
    }
    for y in 0..PLACEHOLDER_HEIGHT {
        for x in [0, 1, PLACEHOLDER_WIDTH - 2, PLACEHOLDER_WIDTH - 1] {
            img.put_pixel(x, y, BORDER);
        }
    }

    let text_width = message.len() as u32 * ADVANCE * GLYPH_SCALE;
    let x0 = PLACEHOLDER_WIDTH.saturating_sub(text_width) / 2;
    let y0 = (PLACEHOLDER_HEIGHT - GLYPH_HEIGHT * GLYPH_SCALE) / 2;
    draw_text(&mut img, message, x0, y0);

    DynamicImage::ImageRgb8(img)
}

fn draw_text(img: &mut RgbImage, text: &str, x0: u32, y0: u32) {
    for (i, c) in text.chars().enumerate() {
        let glyph = glyph(c);
        let gx = x0 + i as u32 * ADVANCE * GLYPH_SCALE;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let px = gx + col * GLYPH_SCALE + dx;
                        let py = y0 + row as u32 * GLYPH_SCALE + dy;
                        if px < img.width() && py < img.height() {
                            img.put_pixel(px, py, INK);
                        }
                    }
                }
            }
        }
    }
}

/// 5x7 bitmaps, one byte per row, low 5 bits used. Covers the characters of
/// the missing-page message plus digits; anything else renders as a box.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        ' ' => [0, 0, 0, 0, 0, 0, 0],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0E],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}
