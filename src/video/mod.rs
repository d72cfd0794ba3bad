//! Video analysis: sources, the frame cache and the inference worker.

use anyhow::{anyhow, Result};
use std::path::Path;

pub mod mjpeg;
pub mod sampler;
pub mod session;
pub mod source;
pub mod synthetic;
pub mod worker;

pub use mjpeg::MjpegFileSource;
pub use sampler::{
    Completion, FrameCacheEntry, FrameRequest, FrameSampler, ProcessingMetrics, RequestToken,
    Sample, SamplerState, FRAME_MATCH_TOLERANCE_S,
};
pub use session::{Pacing, PlaybackSummary, SessionEvent, VideoSession};
pub use source::{snapshot_jpeg, VideoSource};
pub use synthetic::SyntheticSource;
pub use worker::FrameWorker;

/// Open a video by path, or a generated one for `stub://` names.
pub fn open_source(location: &str, fps: u32) -> Result<Box<dyn VideoSource>> {
    if location.trim().is_empty() {
        return Err(anyhow!("no video selected"));
    }
    if location.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(location, fps)?));
    }
    if location.contains("://") {
        return Err(anyhow!("video input must be a local file"));
    }
    Ok(Box::new(MjpegFileSource::open(Path::new(location), fps)?))
}
