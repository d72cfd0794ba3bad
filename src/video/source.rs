use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// JPEG quality for frames sent to `/process-frame`.
pub const SNAPSHOT_JPEG_QUALITY: u8 = 80;

/// Slack added before flooring `timestamp * fps`, so a timestamp produced by
/// `timestamp_of` maps back to its own frame.
const FRAME_INDEX_EPSILON: f64 = 1e-6;

/// Seekable video.
///
/// Timestamps are seconds from the start of the video. Frames are addressed
/// by time; a source maps a timestamp to the frame showing at that moment.
pub trait VideoSource: Send {
    fn name(&self) -> &str;

    fn fps(&self) -> f64;

    fn frame_count(&self) -> usize;

    fn dimensions(&self) -> (u32, u32);

    fn frame_at(&mut self, timestamp_s: f64) -> Result<RgbImage>;

    fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.fps()
    }

    /// Index of the frame on screen at `timestamp_s`, clamped to the video.
    fn frame_index(&self, timestamp_s: f64) -> Result<usize> {
        let count = self.frame_count();
        if count == 0 {
            return Err(anyhow!("{} has no frames", self.name()));
        }
        if !timestamp_s.is_finite() || timestamp_s < 0.0 {
            return Err(anyhow!("invalid timestamp {}", timestamp_s));
        }
        let index = (timestamp_s * self.fps() + FRAME_INDEX_EPSILON).floor() as usize;
        Ok(index.min(count - 1))
    }

    /// Presentation time of a frame index.
    fn timestamp_of(&self, index: usize) -> f64 {
        index as f64 / self.fps()
    }
}

/// Encode a frame as JPEG for upload.
pub fn snapshot_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, SNAPSHOT_JPEG_QUALITY)
        .encode_image(frame)
        .map_err(|e| anyhow!("jpeg encode failed: {}", e))?;
    Ok(out)
}
