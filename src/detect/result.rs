use serde::{Deserialize, Serialize};

/// Confidence at or above which a detection counts as high confidence.
pub const HIGH_CONFIDENCE: f32 = 0.7;
/// Confidence at or above which a detection counts as medium confidence.
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

/// Plant class reported by the detection service.
///
/// The service labels crops as `"Paddy"`. Anything that is not recognizably a
/// crop is counted as a weed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlantClass {
    Crop,
    Weed,
}

impl PlantClass {
    /// Name used on the wire and in labels.
    pub fn label(self) -> &'static str {
        match self {
            PlantClass::Crop => "Paddy",
            PlantClass::Weed => "Weed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        if lowered.contains("paddy") || lowered.contains("crop") {
            PlantClass::Crop
        } else {
            PlantClass::Weed
        }
    }
}

impl From<String> for PlantClass {
    fn from(raw: String) -> Self {
        PlantClass::parse(&raw)
    }
}

impl From<PlantClass> for String {
    fn from(class: PlantClass) -> Self {
        class.label().to_string()
    }
}

/// A single classified box from the detection service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: PlantClass,
    /// 0..=1
    pub confidence: f32,
    /// `[center_x, center_y, width, height]` in pixels.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(class: PlantClass, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class,
            confidence,
            bbox,
        }
    }

    /// Top-left corner of the box.
    pub fn top_left(&self) -> (f32, f32) {
        let [cx, cy, w, h] = self.bbox;
        (cx - w / 2.0, cy - h / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.bbox[2]
    }

    pub fn height(&self) -> f32 {
        self.bbox[3]
    }

    /// Box area in square pixels, rounded.
    pub fn area_px(&self) -> u32 {
        (self.width() * self.height()).round().max(0.0) as u32
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence)
    }

    /// Confidence as a whole percentage.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round().max(0.0) as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f32) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Detections bucketed by confidence band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfidenceDistribution {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// Outcome of analyzing one image or frame.
///
/// Counts are always derived from the detection list; a stored record is
/// recounted when it is loaded back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "AnalysisRecord")]
pub struct AnalysisResult {
    detections: Vec<Detection>,
    crop_count: u32,
    weed_count: u32,
    total_objects: u32,
    predicted_image: Option<String>,
}

#[derive(Deserialize)]
struct AnalysisRecord {
    #[serde(default)]
    detections: Vec<Detection>,
    #[serde(default)]
    predicted_image: Option<String>,
}

impl From<AnalysisRecord> for AnalysisResult {
    fn from(record: AnalysisRecord) -> Self {
        AnalysisResult::new(record.detections, record.predicted_image)
    }
}

impl AnalysisResult {
    pub fn new(detections: Vec<Detection>, predicted_image: Option<String>) -> Self {
        let (crop_count, weed_count) = count_classes(&detections);
        Self {
            detections,
            crop_count,
            weed_count,
            total_objects: crop_count + weed_count,
            predicted_image,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn crop_count(&self) -> u32 {
        self.crop_count
    }

    pub fn weed_count(&self) -> u32 {
        self.weed_count
    }

    pub fn total_objects(&self) -> u32 {
        self.total_objects
    }

    /// Opaque reference to the service-rendered image, if any.
    pub fn predicted_image(&self) -> Option<&str> {
        self.predicted_image.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn average_confidence(&self) -> f32 {
        average_confidence(&self.detections)
    }

    pub fn weed_crop_ratio(&self) -> f64 {
        weed_crop_ratio(self.crop_count, self.weed_count)
    }

    pub fn confidence_distribution(&self) -> ConfidenceDistribution {
        confidence_distribution(&self.detections)
    }
}

/// Per-frame statistics as reported by `/process-frame`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStatistics {
    #[serde(default)]
    pub paddy_count: u32,
    #[serde(default)]
    pub weed_count: u32,
    /// Weed share of all plants, percent.
    #[serde(default)]
    pub weed_density: f64,
}

impl FrameStatistics {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let (paddy_count, weed_count) = count_classes(detections);
        Self {
            paddy_count,
            weed_count,
            weed_density: weed_density(paddy_count, weed_count),
        }
    }

    pub fn total_plants(&self) -> u32 {
        self.paddy_count + self.weed_count
    }
}

/// Weed share of all detected plants as a percentage, rounded to one decimal.
/// Zero when nothing was detected.
pub fn weed_crop_ratio(crop_count: u32, weed_count: u32) -> f64 {
    let total = crop_count + weed_count;
    if total == 0 {
        return 0.0;
    }
    let ratio = weed_count as f64 / total as f64 * 100.0;
    (ratio * 10.0).round() / 10.0
}

/// Weed density with the service's two-decimal rounding.
pub fn weed_density(paddy_count: u32, weed_count: u32) -> f64 {
    let total = paddy_count + weed_count;
    if total == 0 {
        return 0.0;
    }
    let density = weed_count as f64 / total as f64 * 100.0;
    (density * 100.0).round() / 100.0
}

pub fn average_confidence(detections: &[Detection]) -> f32 {
    if detections.is_empty() {
        return 0.0;
    }
    let sum: f32 = detections.iter().map(|d| d.confidence).sum();
    sum / detections.len() as f32
}

pub fn confidence_distribution(detections: &[Detection]) -> ConfidenceDistribution {
    let mut dist = ConfidenceDistribution::default();
    for detection in detections {
        match detection.confidence_band() {
            ConfidenceBand::High => dist.high += 1,
            ConfidenceBand::Medium => dist.medium += 1,
            ConfidenceBand::Low => dist.low += 1,
        }
    }
    dist
}

fn count_classes(detections: &[Detection]) -> (u32, u32) {
    detections
        .iter()
        .fold((0, 0), |(crops, weeds), d| match d.class {
            PlantClass::Crop => (crops + 1, weeds),
            PlantClass::Weed => (crops, weeds + 1),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Detection> {
        vec![
            Detection::new(PlantClass::Crop, 0.9, [0.0, 0.0, 10.0, 10.0]),
            Detection::new(PlantClass::Weed, 0.6, [0.0, 0.0, 5.0, 5.0]),
        ]
    }

    #[test]
    fn counts_are_derived_from_detections() {
        let result = AnalysisResult::new(sample(), Some("predicted.jpg".to_string()));
        assert_eq!(result.crop_count(), 1);
        assert_eq!(result.weed_count(), 1);
        assert_eq!(result.total_objects(), 2);
        assert_eq!(result.weed_crop_ratio(), 50.0);
        assert!((result.average_confidence() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn ratio_is_zero_without_plants() {
        assert_eq!(weed_crop_ratio(0, 0), 0.0);
        assert_eq!(weed_density(0, 0), 0.0);
        assert_eq!(AnalysisResult::empty().weed_crop_ratio(), 0.0);
    }

    #[test]
    fn ratio_rounds_to_one_decimal() {
        assert_eq!(weed_crop_ratio(6, 1), 14.3);
        assert_eq!(weed_crop_ratio(0, 3), 100.0);
        assert_eq!(weed_density(2, 1), 33.33);
    }

    #[test]
    fn class_names_parse_leniently() {
        assert_eq!(PlantClass::parse("Paddy"), PlantClass::Crop);
        assert_eq!(PlantClass::parse("paddy plant"), PlantClass::Crop);
        assert_eq!(PlantClass::parse("Weed"), PlantClass::Weed);
        assert_eq!(PlantClass::parse("unknown"), PlantClass::Weed);
    }

    #[test]
    fn detection_wire_format() {
        let json = r#"{"class":"Paddy","confidence":0.82,"bbox":[50.0,40.0,20.0,10.0]}"#;
        let detection: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(detection.class, PlantClass::Crop);
        assert_eq!(detection.top_left(), (40.0, 35.0));
        assert_eq!(detection.area_px(), 200);
        assert_eq!(detection.confidence_percent(), 82);

        let encoded = serde_json::to_value(&detection).unwrap();
        assert_eq!(encoded["class"], "Paddy");
    }

    #[test]
    fn stored_results_are_recounted() {
        let json = r#"{
            "detections": [{"class":"Weed","confidence":0.4,"bbox":[1,1,2,2]}],
            "crop_count": 7,
            "weed_count": 0,
            "total_objects": 7,
            "predicted_image": null
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.crop_count(), 0);
        assert_eq!(result.weed_count(), 1);
        assert_eq!(result.total_objects(), 1);
    }

    #[test]
    fn confidence_bands_split_at_thresholds() {
        let detections = vec![
            Detection::new(PlantClass::Crop, 0.7, [0.0; 4]),
            Detection::new(PlantClass::Crop, 0.69, [0.0; 4]),
            Detection::new(PlantClass::Weed, 0.5, [0.0; 4]),
            Detection::new(PlantClass::Weed, 0.49, [0.0; 4]),
        ];
        let dist = confidence_distribution(&detections);
        assert_eq!(
            dist,
            ConfidenceDistribution {
                high: 1,
                medium: 2,
                low: 1
            }
        );
    }
}
