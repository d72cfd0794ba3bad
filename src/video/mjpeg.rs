//! Motion-JPEG file source.
//!
//! An `.mjpeg` file is a plain concatenation of JPEG images. The file is read
//! once and split on SOI/EOI markers; frames are decoded on demand.

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use std::path::Path;

use super::source::VideoSource;
use crate::upload::validate_video;

pub struct MjpegFileSource {
    name: String,
    data: Vec<u8>,
    frames: Vec<(usize, usize)>,
    fps: f64,
    dimensions: (u32, u32),
}

impl MjpegFileSource {
    pub fn open(path: &Path, fps: u32) -> Result<Self> {
        validate_video(path)?;
        let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_bytes(path.display().to_string(), data, fps)
    }

    pub fn from_bytes(name: String, data: Vec<u8>, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(anyhow!("fps must be greater than zero"));
        }
        let frames = split_frames(&data);
        let Some(&(start, end)) = frames.first() else {
            return Err(anyhow!("{} contains no JPEG frames", name));
        };
        let first = decode(&data[start..end]).with_context(|| format!("decode {}", name))?;
        let dimensions = first.dimensions();
        log::info!(
            "MjpegFileSource: {} frames ({}x{}) from {}",
            frames.len(),
            dimensions.0,
            dimensions.1,
            name
        );
        Ok(Self {
            name,
            data,
            frames,
            fps: fps as f64,
            dimensions,
        })
    }
}

impl VideoSource for MjpegFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frame_at(&mut self, timestamp_s: f64) -> Result<RgbImage> {
        let index = self.frame_index(timestamp_s)?;
        let (start, end) = self.frames[index];
        decode(&self.data[start..end]).with_context(|| format!("decode frame {}", index))
    }
}

fn decode(jpeg: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?.into_rgb8())
}

/// Byte ranges of every complete JPEG in `data`.
fn split_frames(data: &[u8]) -> Vec<(usize, usize)> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while let Some((start, end)) = find_jpeg_bounds(&data[offset..]) {
        frames.push((offset + start, offset + end));
        offset += end;
    }
    frames
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}
