//! Intervention recommendations.

use super::Severity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recommendation {
    pub title: &'static str,
    pub body: &'static str,
    pub priority: Priority,
}

const fn rec(title: &'static str, body: &'static str, priority: Priority) -> Recommendation {
    Recommendation {
        title,
        body,
        priority,
    }
}

static SEVERE: [Recommendation; 4] = [
    rec(
        "Immediate Herbicide Application",
        "Apply a broad-spectrum herbicide as soon as possible to prevent further paddy damage. \
         Consider consulting with an agronomist to select the most effective product.",
        Priority::High,
    ),
    rec(
        "Manual Weed Removal",
        "For severely affected areas, consider manual weed removal to immediately reduce \
         competition with crops.",
        Priority::High,
    ),
    rec(
        "Soil Testing",
        "Conduct soil tests to assess nutrient depletion and adjust fertilization accordingly.",
        Priority::Medium,
    ),
    rec(
        "Paddy Health Assessment",
        "Evaluate paddy stress levels and consider supplemental irrigation or fertilization \
         to support recovery.",
        Priority::Medium,
    ),
];

static HIGH: [Recommendation; 3] = [
    rec(
        "Targeted Herbicide Application",
        "Apply selective herbicides to control the weed population while minimizing impact on crops.",
        Priority::Medium,
    ),
    rec(
        "Increased Monitoring",
        "Schedule weekly field inspections to track weed growth patterns and paddy response.",
        Priority::Medium,
    ),
    rec(
        "Consider Inter-row Cultivation",
        "Mechanical cultivation between paddy rows may help reduce weed pressure.",
        Priority::Medium,
    ),
];

static MODERATE: [Recommendation; 2] = [
    rec(
        "Preventative Herbicide Application",
        "Apply a light herbicide treatment to prevent weed population growth.",
        Priority::Low,
    ),
    rec(
        "Regular Monitoring",
        "Continue monitoring fields for changes in weed population.",
        Priority::Low,
    ),
];

static LOW: [Recommendation; 2] = [
    rec(
        "Routine Monitoring",
        "Maintain standard field observation schedules.",
        Priority::Low,
    ),
    rec(
        "Preventative Practices",
        "Continue implementing good agricultural practices like paddy rotation and proper \
         field margin management.",
        Priority::Low,
    ),
];

/// Intervention list for a field, chosen by the ratio ladder.
///
/// The counts are accepted for symmetry with the classifier; only the ratio
/// selects the set.
pub fn recommendations(_crop_count: u32, _weed_count: u32, ratio: f64) -> Vec<Recommendation> {
    let set: &[Recommendation] = match Severity::from_ratio(ratio) {
        Severity::Critical => &SEVERE,
        Severity::High => &HIGH,
        Severity::Moderate => &MODERATE,
        Severity::Low => &LOW,
    };
    set.to_vec()
}

/// Weed pressure on absolute weed count, used by the quick field advice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WeedPressure {
    None,
    Light,
    Moderate,
    Heavy,
}

impl WeedPressure {
    pub fn from_count(weed_count: u32) -> Self {
        match weed_count {
            0 => WeedPressure::None,
            1..=2 => WeedPressure::Light,
            3..=9 => WeedPressure::Moderate,
            _ => WeedPressure::Heavy,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeedPressure::None => "No",
            WeedPressure::Light => "Light",
            WeedPressure::Moderate => "Moderate",
            WeedPressure::Heavy => "Heavy",
        }
    }
}

/// Short advice shown right after an analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldAdvice {
    pub weed_pressure: WeedPressure,
    pub weed_actions: Vec<String>,
    pub crop_notes: Vec<String>,
}

pub fn field_advice(crop_count: u32, weed_count: u32) -> FieldAdvice {
    let weed_pressure = WeedPressure::from_count(weed_count);

    let weed_actions = match weed_pressure {
        WeedPressure::None => vec!["No weeds detected. Excellent field condition!".to_string()],
        pressure => {
            let heavy = pressure == WeedPressure::Heavy;
            vec![
                if heavy {
                    "Immediate herbicide application recommended".to_string()
                } else {
                    "Manual removal may be sufficient".to_string()
                },
                format!(
                    "Monitor field every {} days",
                    if heavy { "3-4" } else { "7-10" }
                ),
                "Consider crop rotation to prevent weed adaptation".to_string(),
            ]
        }
    };

    let crop_notes = if crop_count == 0 {
        vec!["No crops detected. Check your planting.".to_string()]
    } else {
        let mut notes = vec![
            if weed_count > crop_count {
                "Weeds are competing with crops - prioritize weed control".to_string()
            } else {
                "Good crop-to-weed ratio".to_string()
            },
            "Monitor soil moisture and nutrient levels".to_string(),
            "Consider fertilization in 2-3 weeks".to_string(),
        ];
        if weed_count > 0 {
            notes.push(format!(
                "Schedule next inspection in {} days",
                if weed_count > 5 { "3-5" } else { "7-10" }
            ));
        }
        notes
    };

    FieldAdvice {
        weed_pressure,
        weed_actions,
        crop_notes,
    }
}
