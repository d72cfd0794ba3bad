//! Detection service payloads.
//!
//! Parsing is lenient about detections: entries that do not deserialize are
//! skipped, and a missing `results` list means "nothing detected". A payload
//! that is not JSON at all, or that carries an `error`, is a failure.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::{AnalysisResult, Detection, FrameStatistics};

/// `/predict` response.
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    /// Reference to the service-rendered image.
    #[serde(default)]
    pub predicted: Option<String>,

    /// Reference to the stored upload.
    #[serde(default)]
    pub original: Option<String>,

    #[serde(default)]
    pub results: Value,

    /// Server-side counts; informational only, counts are recomputed.
    #[serde(default)]
    pub statistics: Option<PredictStatistics>,

    #[serde(default)]
    pub error: Option<String>,

    /// Optional note shown with an empty result.
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictStatistics {
    #[serde(default)]
    pub paddy_count: u32,
    #[serde(default)]
    pub weed_count: u32,
    #[serde(default)]
    pub total_objects: u32,
}

/// `/process-frame` request body.
#[derive(Debug, Serialize)]
pub struct FrameRequestBody<'a> {
    pub image: &'a str,
}

/// `/process-frame` response.
#[derive(Debug, Deserialize)]
pub struct FrameResponse {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub results: Value,

    #[serde(default)]
    pub statistics: Option<FrameStatistics>,

    #[serde(default)]
    pub error: Option<String>,
}

/// `/model-info` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Parsed `/predict` outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictOutcome {
    pub result: AnalysisResult,
    pub message: Option<String>,
}

/// Parsed `/process-frame` outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameAnalysis {
    pub detections: Vec<Detection>,
    pub statistics: FrameStatistics,
}

pub fn parse_predict_response(payload: &[u8]) -> Result<PredictOutcome> {
    let response: PredictResponse =
        serde_json::from_slice(payload).map_err(|e| anyhow!("invalid predict response: {}", e))?;
    if let Some(error) = response.error {
        return Err(anyhow!("{}", error));
    }
    let detections = parse_detections(&response.results);
    if let Some(stats) = &response.statistics {
        let recounted = AnalysisResult::new(detections.clone(), None);
        if stats.total_objects != recounted.total_objects() {
            log::debug!(
                "service reported {} objects, recounted {}",
                stats.total_objects,
                recounted.total_objects()
            );
        }
    }
    Ok(PredictOutcome {
        result: AnalysisResult::new(detections, response.predicted),
        message: response.message,
    })
}

pub fn parse_frame_response(payload: &[u8]) -> Result<FrameAnalysis> {
    let response: FrameResponse =
        serde_json::from_slice(payload).map_err(|e| anyhow!("invalid frame response: {}", e))?;
    match response.status.as_deref() {
        Some("success") => {}
        other => {
            let reason = response
                .error
                .unwrap_or_else(|| format!("status {}", other.unwrap_or("missing")));
            return Err(anyhow!("frame processing failed: {}", reason));
        }
    }
    let detections = parse_detections(&response.results);
    let statistics = response
        .statistics
        .unwrap_or_else(|| FrameStatistics::from_detections(&detections));
    Ok(FrameAnalysis {
        detections,
        statistics,
    })
}

/// Decode a `results` array, skipping malformed entries.
pub fn parse_detections(results: &Value) -> Vec<Detection> {
    let Some(items) = results.as_array() else {
        if !results.is_null() {
            log::warn!("detection results are not a list; treating as empty");
        }
        return Vec::new();
    };
    items
        .iter()
        .filter_map(
            |item| match serde_json::from_value::<Detection>(item.clone()) {
                Ok(detection) if valid_confidence(detection.confidence) => Some(detection),
                Ok(detection) => {
                    log::warn!(
                        "skipping detection with confidence {}",
                        detection.confidence
                    );
                    None
                }
                Err(err) => {
                    log::warn!("skipping malformed detection: {}", err);
                    None
                }
            },
        )
        .collect()
}

fn valid_confidence(confidence: f32) -> bool {
    confidence.is_finite() && (0.0..=1.0).contains(&confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::PlantClass;

    const PREDICT_OK: &str = r#"{
        "original": "../static/uploads/field.jpg",
        "predicted": "../static/uploads/predicted_field.jpg",
        "results": [
            {"class": "Paddy", "confidence": 0.91, "bbox": [120.5, 80.0, 40.0, 60.0]},
            {"class": "Weed", "confidence": 0.55, "bbox": [30.0, 30.0, 10.0, 12.0]},
            {"class": "Weed", "confidence": 0.42, "bbox": [60.0, 90.0, 8.0, 8.0]}
        ],
        "statistics": {"paddy_count": 1, "weed_count": 2, "total_objects": 3},
        "status": "success"
    }"#;

    #[test]
    fn parses_predict_response() {
        let outcome = parse_predict_response(PREDICT_OK.as_bytes()).unwrap();
        let result = outcome.result;
        assert_eq!(result.crop_count(), 1);
        assert_eq!(result.weed_count(), 2);
        assert_eq!(
            result.predicted_image(),
            Some("../static/uploads/predicted_field.jpg")
        );
        assert_eq!(result.detections()[0].class, PlantClass::Crop);
    }

    #[test]
    fn service_error_is_a_failure() {
        let err = parse_predict_response(br#"{"error": "Invalid file type"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid file type");
    }

    #[test]
    fn missing_or_malformed_results_mean_nothing_detected() {
        let outcome = parse_predict_response(br#"{"predicted": "p.jpg"}"#).unwrap();
        assert!(outcome.result.is_empty());

        let outcome = parse_predict_response(
            br#"{"results": [{"confidence": 0.9}, {"class": "Weed", "confidence": 0.6, "bbox": [1,2,3,4]}, 7]}"#,
        )
        .unwrap();
        assert_eq!(outcome.result.total_objects(), 1);

        let outcome =
            parse_predict_response(br#"{"results": "oops", "message": "blurry"}"#).unwrap();
        assert!(outcome.result.is_empty());
        assert_eq!(outcome.message.as_deref(), Some("blurry"));
    }

    #[test]
    fn incomplete_detections_are_skipped() {
        let outcome = parse_predict_response(
            br#"{"results": [
                {"class": "Weed"},
                {"class": "Paddy", "confidence": 0.9},
                {"class": "Weed", "confidence": 1.7, "bbox": [1, 1, 2, 2]},
                {"class": "Weed", "confidence": -0.1, "bbox": [1, 1, 2, 2]},
                {"class": "Paddy", "confidence": 1.0, "bbox": [4, 4, 2, 2]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(outcome.result.total_objects(), 1);
        assert_eq!(outcome.result.crop_count(), 1);
        assert_eq!(outcome.result.weed_count(), 0);
        assert_eq!(outcome.result.detections()[0].bbox, [4.0, 4.0, 2.0, 2.0]);

        let frame = parse_frame_response(
            br#"{"status": "success", "results": [{"class": "Weed", "bbox": [1, 1, 1, 1]}]}"#,
        )
        .unwrap();
        assert!(frame.detections.is_empty());
        assert_eq!(frame.statistics.weed_count, 0);
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(parse_predict_response(b"<html>502</html>").is_err());
    }

    #[test]
    fn parses_frame_response() {
        let payload = br#"{
            "status": "success",
            "results": [{"class": "Weed", "confidence": 0.7, "bbox": [5, 5, 4, 4]}],
            "statistics": {"paddy_count": 0, "weed_count": 1, "weed_density": 100.0}
        }"#;
        let frame = parse_frame_response(payload).unwrap();
        assert_eq!(frame.detections.len(), 1);
        assert_eq!(frame.statistics.weed_density, 100.0);
    }

    #[test]
    fn frame_statistics_are_recomputed_when_missing() {
        let payload = br#"{
            "status": "success",
            "results": [
                {"class": "Paddy", "confidence": 0.7, "bbox": [5, 5, 4, 4]},
                {"class": "Paddy", "confidence": 0.7, "bbox": [5, 5, 4, 4]},
                {"class": "Weed", "confidence": 0.7, "bbox": [5, 5, 4, 4]}
            ]
        }"#;
        let frame = parse_frame_response(payload).unwrap();
        assert_eq!(frame.statistics.paddy_count, 2);
        assert_eq!(frame.statistics.weed_density, 33.33);
    }

    #[test]
    fn non_success_frame_status_fails() {
        let err = parse_frame_response(br#"{"status": "error", "error": "Model not loaded"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Model not loaded"));
        assert!(parse_frame_response(br#"{"results": []}"#).is_err());
    }
}
