//! Field health risk scoring.
//!
//! Everything here is a pure function of three numbers: crop count, weed count
//! and the weed-to-crop ratio (percent, one decimal). The presentation layer
//! only formats the structured output.
//!
//! Threshold comparisons are strict: a ratio of exactly 50.0 is not "> 50".

pub mod recommend;

use crate::detect::{weed_crop_ratio, AnalysisResult};

/// Ratio thresholds shared by every ratio-driven ladder.
pub const RATIO_MODERATE: f64 = 15.0;
pub const RATIO_HIGH: f64 = 30.0;
pub const RATIO_CRITICAL: f64 = 50.0;

/// Overall score thresholds.
pub const SCORE_MODERATE: u8 = 25;
pub const SCORE_HIGH: u8 = 50;
pub const SCORE_CRITICAL: u8 = 75;

/// Generic four-step severity scale, least severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Ratio ladder: `> 50` critical, `> 30` high, `> 15` moderate.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > RATIO_CRITICAL {
            Severity::Critical
        } else if ratio > RATIO_HIGH {
            Severity::High
        } else if ratio > RATIO_MODERATE {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    /// Crop density ladder on the absolute crop count.
    pub fn from_crop_count(crop_count: u32) -> Self {
        if crop_count < 3 {
            Severity::Critical
        } else if crop_count < 5 {
            Severity::High
        } else if crop_count < 8 {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    pub fn style(self) -> Style {
        match self {
            Severity::Low => Style::Success,
            Severity::Moderate => Style::Info,
            Severity::High => Style::Warning,
            Severity::Critical => Style::Danger,
        }
    }
}

/// Display style hint for badges and bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Success,
    Info,
    Warning,
    Danger,
}

impl Style {
    pub fn name(self) -> &'static str {
        match self {
            Style::Success => "success",
            Style::Info => "info",
            Style::Warning => "warning",
            Style::Danger => "danger",
        }
    }
}

/// Weed infestation tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeedRisk {
    Low,
    Moderate,
    High,
    Severe,
}

impl WeedRisk {
    pub fn from_ratio(ratio: f64) -> Self {
        match Severity::from_ratio(ratio) {
            Severity::Low => WeedRisk::Low,
            Severity::Moderate => WeedRisk::Moderate,
            Severity::High => WeedRisk::High,
            Severity::Critical => WeedRisk::Severe,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeedRisk::Low => "Low",
            WeedRisk::Moderate => "Moderate",
            WeedRisk::High => "High",
            WeedRisk::Severe => "Severe",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            WeedRisk::Low => "Low weed pressure detected",
            WeedRisk::Moderate => "Moderate weed presence detected",
            WeedRisk::High => "Significant weed pressure detected",
            WeedRisk::Severe => "Critical weed infestation detected",
        }
    }

    /// Bar fill, percent.
    pub fn progress(self) -> u8 {
        match self {
            WeedRisk::Low => 10,
            WeedRisk::Moderate => 40,
            WeedRisk::High => 70,
            WeedRisk::Severe => 90,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            WeedRisk::Low => Severity::Low,
            WeedRisk::Moderate => Severity::Moderate,
            WeedRisk::High => Severity::High,
            WeedRisk::Severe => Severity::Critical,
        }
    }
}

/// Crop health tier. Declared from healthiest to poorest so that the derived
/// ordering follows severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CropHealth {
    Healthy,
    Fair,
    AtRisk,
    Poor,
}

impl CropHealth {
    pub fn from_ratio(ratio: f64) -> Self {
        match Severity::from_ratio(ratio) {
            Severity::Low => CropHealth::Healthy,
            Severity::Moderate => CropHealth::Fair,
            Severity::High => CropHealth::AtRisk,
            Severity::Critical => CropHealth::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CropHealth::Healthy => "Healthy",
            CropHealth::Fair => "Fair",
            CropHealth::AtRisk => "At Risk",
            CropHealth::Poor => "Poor",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CropHealth::Healthy => "Crops appear to be in good condition",
            CropHealth::Fair => "Some impact on paddy health from weeds",
            CropHealth::AtRisk => "Crops potentially suffering from weed competition",
            CropHealth::Poor => "Crops at high risk due to weed competition",
        }
    }

    pub fn progress(self) -> u8 {
        match self {
            CropHealth::Healthy => 90,
            CropHealth::Fair => 70,
            CropHealth::AtRisk => 40,
            CropHealth::Poor => 20,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            CropHealth::Healthy => Severity::Low,
            CropHealth::Fair => Severity::Moderate,
            CropHealth::AtRisk => Severity::High,
            CropHealth::Poor => Severity::Critical,
        }
    }
}

/// Overall risk tier, bucketed on the numeric score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverallRisk {
    Low,
    Moderate,
    High,
    Critical,
}

impl OverallRisk {
    pub fn from_score(score: u8) -> Self {
        if score > SCORE_CRITICAL {
            OverallRisk::Critical
        } else if score > SCORE_HIGH {
            OverallRisk::High
        } else if score > SCORE_MODERATE {
            OverallRisk::Moderate
        } else {
            OverallRisk::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OverallRisk::Low => "Low Risk",
            OverallRisk::Moderate => "Moderate Risk",
            OverallRisk::High => "High Risk",
            OverallRisk::Critical => "Critical Risk",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OverallRisk::Low => "No significant health risks detected",
            OverallRisk::Moderate => "Some risk factors present",
            OverallRisk::High => "Significant risk to paddy health and yield",
            OverallRisk::Critical => "Immediate intervention required",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            OverallRisk::Low => Severity::Low,
            OverallRisk::Moderate => Severity::Moderate,
            OverallRisk::High => Severity::High,
            OverallRisk::Critical => Severity::Critical,
        }
    }
}

/// `min(round(ratio * 1.5), 100)`.
pub fn overall_risk_score(ratio: f64) -> u8 {
    (ratio * 1.5).round().clamp(0.0, 100.0) as u8
}

/// One row of the risk factor table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskFactor {
    pub factor: &'static str,
    pub level: Severity,
    pub description: &'static str,
    pub recommendation: &'static str,
}

/// Derived risk view of an analysis. Never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskAssessment {
    pub crop_count: u32,
    pub weed_count: u32,
    pub weed_crop_ratio: f64,
    pub weed_risk: WeedRisk,
    pub crop_health: CropHealth,
    pub crop_density: Severity,
    pub overall_score: u8,
    pub overall_risk: OverallRisk,
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    /// Classify from explicit counts and ratio.
    pub fn classify(crop_count: u32, weed_count: u32, weed_crop_ratio: f64) -> Self {
        let overall_score = overall_risk_score(weed_crop_ratio);
        Self {
            crop_count,
            weed_count,
            weed_crop_ratio,
            weed_risk: WeedRisk::from_ratio(weed_crop_ratio),
            crop_health: CropHealth::from_ratio(weed_crop_ratio),
            crop_density: Severity::from_crop_count(crop_count),
            overall_score,
            overall_risk: OverallRisk::from_score(overall_score),
            factors: risk_factors(crop_count, weed_count, weed_crop_ratio),
        }
    }

    /// Classify from counts, deriving the ratio.
    pub fn from_counts(crop_count: u32, weed_count: u32) -> Self {
        Self::classify(
            crop_count,
            weed_count,
            weed_crop_ratio(crop_count, weed_count),
        )
    }

    pub fn from_result(result: &AnalysisResult) -> Self {
        Self::from_counts(result.crop_count(), result.weed_count())
    }
}

/// The five-row factor table, in display order.
pub fn risk_factors(crop_count: u32, weed_count: u32, ratio: f64) -> Vec<RiskFactor> {
    let ratio_level = Severity::from_ratio(ratio);
    let density_level = Severity::from_crop_count(crop_count);
    let resistance = herbicide_resistance_level(weed_count, ratio);
    let soil = soil_health_level(weed_count, ratio);

    vec![
        RiskFactor {
            factor: "Weed Competition",
            level: ratio_level,
            description: "Competition for nutrients, water, and sunlight",
            recommendation: match ratio_level {
                Severity::Critical => "Immediate weed control action required",
                Severity::High => "Schedule weed control within 7 days",
                Severity::Moderate => "Monitor and plan for weed control measures",
                Severity::Low => "Continue regular monitoring",
            },
        },
        RiskFactor {
            factor: "Paddy Density",
            level: density_level,
            description: "Evaluation of paddy population density",
            recommendation: match density_level {
                Severity::Critical => "Consider replanting or supplemental seeding",
                Severity::High => "Provide additional nutrients to support existing crops",
                Severity::Moderate => "Monitor for adequate spacing and growth",
                Severity::Low => "Maintain current management practices",
            },
        },
        RiskFactor {
            factor: "Potential Yield Loss",
            level: ratio_level,
            description: "Estimated impact on harvest yield",
            recommendation: match ratio_level {
                Severity::Critical => "Expect >30% yield reduction without intervention",
                Severity::High => "Potential 15-30% yield impact if untreated",
                Severity::Moderate => "Possible 5-15% yield impact",
                Severity::Low => "Minimal impact on yield expected",
            },
        },
        RiskFactor {
            factor: "Herbicide Resistance Risk",
            level: resistance,
            description: "Risk of developing herbicide resistance",
            recommendation: match resistance {
                Severity::High | Severity::Critical => {
                    "Use herbicide rotation and integrated weed management"
                }
                Severity::Moderate => "Consider alternating herbicide modes of action",
                Severity::Low => "Follow standard resistance management practices",
            },
        },
        RiskFactor {
            factor: "Soil Health Impact",
            level: soil,
            description: "Impact on soil nutrients and structure",
            recommendation: match soil {
                Severity::High | Severity::Critical => "Conduct soil tests and consider amendments",
                Severity::Moderate => "Monitor soil nutrient levels",
                Severity::Low => "Maintain standard soil health practices",
            },
        },
    ]
}

fn herbicide_resistance_level(weed_count: u32, ratio: f64) -> Severity {
    if weed_count > 10 && ratio > 40.0 {
        Severity::High
    } else if weed_count > 5 && ratio > 25.0 {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

fn soil_health_level(weed_count: u32, ratio: f64) -> Severity {
    if weed_count > 12 && ratio > 45.0 {
        Severity::High
    } else if weed_count > 7 && ratio > 30.0 {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, PlantClass};

    #[test]
    fn one_crop_one_weed_is_high_not_severe() {
        let result = AnalysisResult::new(
            vec![
                Detection::new(PlantClass::Crop, 0.9, [0.0, 0.0, 10.0, 10.0]),
                Detection::new(PlantClass::Weed, 0.6, [0.0, 0.0, 5.0, 5.0]),
            ],
            None,
        );
        let risk = RiskAssessment::from_result(&result);
        assert_eq!(risk.weed_crop_ratio, 50.0);
        assert_eq!(risk.weed_risk, WeedRisk::High);
        assert_eq!(risk.crop_health, CropHealth::AtRisk);
        assert_eq!(risk.overall_score, 75);
        assert_eq!(risk.overall_risk, OverallRisk::High);
        assert_eq!(risk.overall_risk.label(), "High Risk");
        assert_eq!(risk.crop_density, Severity::Critical);
    }

    #[test]
    fn ladders_are_monotonic_in_ratio() {
        let mut previous = (WeedRisk::Low, CropHealth::Healthy, OverallRisk::Low);
        let mut ratio = 0.0;
        while ratio <= 100.0 {
            let risk = RiskAssessment::classify(10, 10, ratio);
            let current = (risk.weed_risk, risk.crop_health, risk.overall_risk);
            assert!(current.0 >= previous.0, "weed risk regressed at {ratio}");
            assert!(current.1 >= previous.1, "crop health regressed at {ratio}");
            assert!(current.2 >= previous.2, "overall risk regressed at {ratio}");
            previous = current;
            ratio += 0.1;
        }
    }

    #[test]
    fn boundaries_are_strict() {
        assert_eq!(WeedRisk::from_ratio(15.0), WeedRisk::Low);
        assert_eq!(WeedRisk::from_ratio(15.1), WeedRisk::Moderate);
        assert_eq!(WeedRisk::from_ratio(30.0), WeedRisk::Moderate);
        assert_eq!(WeedRisk::from_ratio(30.1), WeedRisk::High);
        assert_eq!(WeedRisk::from_ratio(50.0), WeedRisk::High);
        assert_eq!(WeedRisk::from_ratio(50.1), WeedRisk::Severe);
        assert_eq!(OverallRisk::from_score(25), OverallRisk::Low);
        assert_eq!(OverallRisk::from_score(26), OverallRisk::Moderate);
        assert_eq!(OverallRisk::from_score(76), OverallRisk::Critical);
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(overall_risk_score(0.0), 0);
        assert_eq!(overall_risk_score(10.0), 15);
        assert_eq!(overall_risk_score(33.3), 50);
        assert_eq!(overall_risk_score(66.7), 100);
        assert_eq!(overall_risk_score(100.0), 100);
        for tenth in 0..=1000 {
            let ratio = tenth as f64 / 10.0;
            let expected = (ratio * 1.5).round().min(100.0) as u8;
            assert_eq!(overall_risk_score(ratio), expected);
        }
    }

    #[test]
    fn density_buckets_on_crop_count() {
        assert_eq!(Severity::from_crop_count(0), Severity::Critical);
        assert_eq!(Severity::from_crop_count(2), Severity::Critical);
        assert_eq!(Severity::from_crop_count(3), Severity::High);
        assert_eq!(Severity::from_crop_count(5), Severity::Moderate);
        assert_eq!(Severity::from_crop_count(8), Severity::Low);
    }

    #[test]
    fn factor_table_tracks_weed_pressure() {
        let factors = risk_factors(4, 12, 75.0);
        let names: Vec<_> = factors.iter().map(|f| f.factor).collect();
        assert_eq!(
            names,
            vec![
                "Weed Competition",
                "Paddy Density",
                "Potential Yield Loss",
                "Herbicide Resistance Risk",
                "Soil Health Impact",
            ]
        );
        assert_eq!(factors[0].level, Severity::Critical);
        assert_eq!(factors[1].level, Severity::High);
        assert_eq!(factors[3].level, Severity::High);
        assert_eq!(factors[4].level, Severity::Moderate);
        assert_eq!(
            factors[3].recommendation,
            "Use herbicide rotation and integrated weed management"
        );

        let calm = risk_factors(20, 1, 4.8);
        assert!(calm.iter().all(|f| f.level == Severity::Low));
    }

    #[test]
    fn empty_field_is_low_risk() {
        let risk = RiskAssessment::from_counts(0, 0);
        assert_eq!(risk.weed_crop_ratio, 0.0);
        assert_eq!(risk.overall_score, 0);
        assert_eq!(risk.weed_risk, WeedRisk::Low);
        assert_eq!(risk.crop_health, CropHealth::Healthy);
    }
}
