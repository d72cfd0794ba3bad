use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::source::VideoSource;

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;
const SYNTHETIC_SECONDS: usize = 5;

/// Generated `stub://` video for tests and demos.
///
/// Each frame is a field-green gradient shifted by the frame index, so
/// consecutive frames differ.
pub struct SyntheticSource {
    name: String,
    fps: f64,
    frame_count: usize,
}

impl SyntheticSource {
    pub fn new(url: &str, fps: u32) -> Result<Self> {
        let Some(name) = url.strip_prefix("stub://") else {
            return Err(anyhow!("synthetic sources use stub:// urls, got {}", url));
        };
        if fps == 0 {
            return Err(anyhow!("fps must be greater than zero"));
        }
        log::info!("SyntheticSource: connected to {} (synthetic)", url);
        Ok(Self {
            name: name.to_string(),
            fps: fps as f64,
            frame_count: SYNTHETIC_SECONDS * fps as usize,
        })
    }
}

impl VideoSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        (SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)
    }

    fn frame_at(&mut self, timestamp_s: f64) -> Result<RgbImage> {
        let index = self.frame_index(timestamp_s)? as u32;
        Ok(RgbImage::from_fn(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, |x, y| {
            let shift = (x + y + index * 3) % 256;
            Rgb([(shift / 4) as u8, (96 + shift / 2) as u8, (shift / 8) as u8])
        }))
    }
}
