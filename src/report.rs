//! Plain-text rendering of results, history and risk pages.

use std::fmt::Write as _;

use crate::client::ModelInfo;
use crate::controller::RiskPage;
use crate::detect::AnalysisResult;
use crate::history::HistoryEntry;
use crate::risk::recommend::FieldAdvice;
use crate::risk::Severity;
use crate::video::{FrameCacheEntry, ProcessingMetrics};

pub const NO_OBJECTS: &str = "No objects detected in the image";
pub const NO_HISTORY: &str = "No detection history yet";
pub const NO_RISK_DATA: &str = "No analysis selected. Analyze an image or pick one from history.";

const BAR_WIDTH: usize = 20;

/// `[##########----------] 50%`
pub fn progress_bar(percent: u8) -> String {
    let percent = percent.min(100) as usize;
    let filled = (percent * BAR_WIDTH + 50) / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent
    )
}

fn badge(level: Severity) -> String {
    format!("{} ({})", level.label(), level.style().name())
}

pub fn analysis_summary(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Paddy plants:       {}", result.crop_count());
    let _ = writeln!(out, "Weeds:              {}", result.weed_count());
    let _ = writeln!(out, "Total objects:      {}", result.total_objects());
    if result.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", NO_OBJECTS);
        return out;
    }
    let _ = writeln!(
        out,
        "Average confidence: {:.1}%",
        result.average_confidence() * 100.0
    );
    let _ = writeln!(out, "Weed/crop ratio:    {:.1}%", result.weed_crop_ratio());
    let dist = result.confidence_distribution();
    let _ = writeln!(
        out,
        "Confidence:         high {} / medium {} / low {}",
        dist.high, dist.medium, dist.low
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>3}  {:<6} {:>10}  {:>12}  {:>11}  {:>8}",
        "#", "Class", "Confidence", "Position", "Size", "Area"
    );
    for (i, d) in result.detections().iter().enumerate() {
        let (x, y) = d.top_left();
        let _ = writeln!(
            out,
            "{:>3}  {:<6} {:>9}%  {:>12}  {:>11}  {:>6}px",
            i + 1,
            d.class.label(),
            d.confidence_percent(),
            format!("({}, {})", x.round() as i64, y.round() as i64),
            format!("{}x{}", d.width().round() as i64, d.height().round() as i64),
            d.area_px()
        );
    }
    out
}

pub fn field_advice(advice: &FieldAdvice) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Weed management ({} weed pressure):",
        advice.weed_pressure.label()
    );
    for line in &advice.weed_actions {
        let _ = writeln!(out, "  - {}", line);
    }
    let _ = writeln!(out, "Crop health:");
    for line in &advice.crop_notes {
        let _ = writeln!(out, "  - {}", line);
    }
    out
}

pub fn history_table(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return format!("{}\n", NO_HISTORY);
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<19}  {:>5}  {:>5}  {:>9}  Image",
        "#", "Time", "Paddy", "Weed", "Avg conf"
    );
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<19}  {:>5}  {:>5}  {:>8.1}%  {}",
            i + 1,
            entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            entry.crop_count,
            entry.weed_count,
            entry.average_confidence * 100.0,
            entry.image_ref.as_deref().unwrap_or("-")
        );
    }
    out
}

pub fn risk_page(page: Option<&RiskPage>) -> String {
    let Some(page) = page else {
        return format!("{}\n", NO_RISK_DATA);
    };
    let a = &page.assessment;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Paddy: {}  Weeds: {}  Weed/crop ratio: {:.1}%",
        a.crop_count, a.weed_count, a.weed_crop_ratio
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Weed infestation: {:<9} {}  {}",
        a.weed_risk.label(),
        progress_bar(a.weed_risk.progress()),
        a.weed_risk.description()
    );
    let _ = writeln!(
        out,
        "Paddy health:     {:<9} {}  {}",
        a.crop_health.label(),
        progress_bar(a.crop_health.progress()),
        a.crop_health.description()
    );
    let _ = writeln!(
        out,
        "Overall:          {} [{}] score {}/100  {}",
        a.overall_risk.label(),
        a.overall_risk.severity().style().name(),
        a.overall_score,
        a.overall_risk.description()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Risk factors:");
    for factor in &a.factors {
        let _ = writeln!(
            out,
            "  {:<26} {:<20} {}",
            factor.factor,
            badge(factor.level),
            factor.description
        );
        let _ = writeln!(out, "  {:<26} -> {}", "", factor.recommendation);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommendations:");
    for rec in &page.recommendations {
        let _ = writeln!(out, "  [{}] {}", rec.priority.label(), rec.title);
        let _ = writeln!(out, "         {}", rec.body);
    }
    out
}

pub fn frame_summary(entry: &FrameCacheEntry, metrics: &ProcessingMetrics) -> String {
    let stats = &entry.statistics;
    let mut line = format!(
        "t={:>7.2}s  paddy {:>3}  weed {:>3}  density {:>5.1}%  {} ms",
        entry.timestamp_s,
        stats.paddy_count,
        stats.weed_count,
        stats.weed_density,
        entry.processing_time_ms
    );
    if let (Some(avg), Some(fps)) = (metrics.average_ms(), metrics.fps()) {
        let _ = write!(line, "  (avg {:.0} ms, {:.1} fps)", avg, fps);
    }
    line
}

pub fn model_info(info: &ModelInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model:       {}", info.model_name);
    let _ = writeln!(out, "Classes:     {}", info.classes.join(", "));
    if !info.description.is_empty() {
        let _ = writeln!(out, "Description: {}", info.description);
    }
    out
}
