//! Paddy Scout
//!
//! Client side of a paddy field scouting tool. Images and video frames are sent
//! to an external detection service; the returned crop/weed boxes are drawn as
//! overlays, summarized, and scored into heuristic field-health risk tiers.
//!
//! # Module Structure
//!
//! - `detect`: Detection data model (Detection, AnalysisResult, FrameStatistics)
//! - `risk`: Threshold-based risk classification and recommendations
//! - `render`: Bounding box and label overlays on raster images
//! - `storage` / `history`: Durable client state and the capped analysis history
//! - `client`: Detection service HTTP client and wire format
//! - `video`: Video sources, timestamp-keyed frame cache and the inference worker
//! - `controller`: Image analysis page state and actions
//! - `report`: Text presentation of results, history and risk

use anyhow::Result;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod client;
pub mod config;
pub mod controller;
pub mod detect;
pub mod history;
pub mod render;
pub mod report;
pub mod risk;
pub mod storage;
pub mod upload;
pub mod video;

pub use client::{FrameAnalysis, HttpInferenceClient, InferenceClient, ModelInfo};
pub use config::AppConfig;
pub use controller::{AppState, Controller, Notice, NoticeKind};
pub use detect::{AnalysisResult, Detection, FrameStatistics, PlantClass};
pub use history::{HistoryEntry, HistoryStore, MAX_HISTORY_ENTRIES};
pub use render::DetectionRenderer;
pub use risk::recommend::{field_advice, recommendations, FieldAdvice, Priority, Recommendation};
pub use risk::{RiskAssessment, Severity};
pub use storage::{InMemoryStateStore, SqliteStateStore, StateStore};
pub use upload::ImageUpload;
pub use video::{
    FrameSampler, MjpegFileSource, Sample, SyntheticSource, VideoSession, VideoSource,
};

/// Unique shared-cache in-memory SQLite URI, for tests and throwaway sessions.
pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:paddy_scout_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn now_s() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
