//! Detection service client.
//!
//! The service is an external collaborator: `/predict` analyzes a whole image
//! upload, `/process-frame` analyzes a single JPEG video frame.

use anyhow::Result;

use crate::upload::ImageUpload;

pub mod http;
pub mod wire;

pub use http::{frame_data_uri, HttpInferenceClient};
pub use wire::{
    parse_detections, parse_frame_response, parse_predict_response, FrameAnalysis, ModelInfo,
    PredictOutcome,
};

/// Anything that can run detections for the controllers.
///
/// Implementations must be movable onto the frame worker thread.
pub trait InferenceClient: Send {
    fn predict(&self, upload: &ImageUpload) -> Result<PredictOutcome>;

    /// Analyze one JPEG-encoded frame.
    fn process_frame(&self, jpeg: &[u8]) -> Result<FrameAnalysis>;
}

impl<C: InferenceClient + ?Sized> InferenceClient for Box<C> {
    fn predict(&self, upload: &ImageUpload) -> Result<PredictOutcome> {
        (**self).predict(upload)
    }

    fn process_frame(&self, jpeg: &[u8]) -> Result<FrameAnalysis> {
        (**self).process_frame(jpeg)
    }
}
