//! Detection overlay rendering.
//!
//! Boxes arrive center-based from the service and are drawn top-left based.
//! Labels sit in a filled bar directly above each box. Everything is clipped to
//! the surface, so boxes that run off the frame are drawn partially.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::path::Path;

use crate::detect::{Detection, PlantClass};

const CROP_COLOR: Rgb<u8> = Rgb([0x00, 0xff, 0x00]);
const WEED_COLOR: Rgb<u8> = Rgb([0xff, 0x00, 0x00]);
const TEXT_COLOR: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

const GLYPH_WIDTH: i64 = 5;
const GLYPH_HEIGHT: i64 = 7;
const GLYPH_ADVANCE: i64 = GLYPH_WIDTH + 1;

pub fn class_color(class: PlantClass) -> Rgb<u8> {
    match class {
        PlantClass::Crop => CROP_COLOR,
        PlantClass::Weed => WEED_COLOR,
    }
}

/// `"Paddy 90%"`.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} {}%",
        detection.class.label(),
        detection.confidence_percent()
    )
}

#[derive(Clone, Debug)]
pub struct DetectionRenderer {
    pub line_width: u32,
    pub label_height: u32,
    pub label_padding: u32,
}

impl Default for DetectionRenderer {
    fn default() -> Self {
        Self {
            line_width: 2,
            label_height: 20,
            label_padding: 5,
        }
    }
}

impl DetectionRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw every detection onto `surface`.
    pub fn render(&self, surface: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            self.draw_detection(surface, detection);
        }
    }

    /// Copy `base` and draw the detections onto the copy.
    pub fn annotate(&self, base: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut surface = base.clone();
        self.render(&mut surface, detections);
        surface
    }

    /// Load an image, draw detections, write the result next to it or at `out`.
    pub fn annotate_file(&self, input: &Path, detections: &[Detection], out: &Path) -> Result<()> {
        let base = image::open(input)
            .with_context(|| format!("open image {}", input.display()))?
            .into_rgb8();
        let annotated = self.annotate(&base, detections);
        annotated
            .save(out)
            .with_context(|| format!("write annotated image {}", out.display()))?;
        log::debug!(
            "rendered {} detections onto {}",
            detections.len(),
            out.display()
        );
        Ok(())
    }

    fn draw_detection(&self, surface: &mut RgbImage, detection: &Detection) {
        let color = class_color(detection.class);
        let (x, y) = detection.top_left();
        let x = x.round() as i64;
        let y = y.round() as i64;
        let w = detection.width().round().max(0.0) as i64;
        let h = detection.height().round().max(0.0) as i64;

        stroke_rect(surface, x, y, w, h, self.line_width as i64, color);

        let text = label_text(detection);
        let pad = self.label_padding as i64;
        let label_h = self.label_height as i64;
        let label_w = text_width(&text) + pad * 2;
        fill_rect(surface, x, y - label_h, label_w, label_h, color);

        let text_y = y - label_h + (label_h - GLYPH_HEIGHT) / 2;
        draw_text(surface, x + pad, text_y, &text, TEXT_COLOR);
    }
}

fn put(surface: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x < 0 || y < 0 || x >= surface.width() as i64 || y >= surface.height() as i64 {
        return;
    }
    surface.put_pixel(x as u32, y as u32, color);
}

fn fill_rect(surface: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(surface.width() as i64);
    let y1 = (y + h).min(surface.height() as i64);
    for py in y0..y1 {
        for px in x0..x1 {
            surface.put_pixel(px as u32, py as u32, color);
        }
    }
}

fn stroke_rect(
    surface: &mut RgbImage,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    line: i64,
    color: Rgb<u8>,
) {
    if w <= 0 || h <= 0 || line <= 0 {
        return;
    }
    // Centered on the box edge, like a canvas stroke.
    let half = line / 2;
    let (ox, oy) = (x - half, y - half);
    let (ow, oh) = (w + line, h + line);
    fill_rect(surface, ox, oy, ow, line, color);
    fill_rect(surface, ox, oy + oh - line, ow, line, color);
    fill_rect(surface, ox, oy, line, oh, color);
    fill_rect(surface, ox + ow - line, oy, line, oh, color);
}

fn text_width(text: &str) -> i64 {
    let chars = text.chars().count() as i64;
    if chars == 0 {
        0
    } else {
        chars * GLYPH_ADVANCE - 1
    }
}

fn draw_text(surface: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let origin = x + i as i64 * GLYPH_ADVANCE;
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b10000 >> col) != 0 {
                    put(surface, origin + col, y + row as i64, color);
                }
            }
        }
    }
}

/// 5x7 bitmaps for the characters labels can contain. Unknown characters
/// render as a hollow box.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        ' ' => [0; 7],
        '%' => [
            0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011,
        ],
        '0' => [
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ],
        '1' => [
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ],
        '2' => [
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ],
        '3' => [
            0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110,
        ],
        '4' => [
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ],
        '5' => [
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ],
        '6' => [
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ],
        '7' => [
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ],
        '8' => [
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ],
        '9' => [
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ],
        'P' => [
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ],
        'W' => [
            0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010,
        ],
        'a' => [
            0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111,
        ],
        'd' => [
            0b00001, 0b00001, 0b01101, 0b10011, 0b10001, 0b10001, 0b01111,
        ],
        'e' => [
            0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110,
        ],
        'y' => [
            0b00000, 0b00000, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110,
        ],
        _ => [
            0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111,
        ],
    }
}
