//! Detection data model shared by the image and video paths.

mod result;

pub use result::{
    average_confidence, confidence_distribution, weed_crop_ratio, weed_density, AnalysisResult,
    ConfidenceBand, ConfidenceDistribution, Detection, FrameStatistics, PlantClass,
    HIGH_CONFIDENCE, MEDIUM_CONFIDENCE,
};
