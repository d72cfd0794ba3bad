use std::cell::Cell;
use std::io::Cursor;

use anyhow::{anyhow, Result};
use image::{ImageFormat, Rgb, RgbImage};

use paddy_scout::client::{FrameAnalysis, PredictOutcome};
use paddy_scout::report;
use paddy_scout::{
    AnalysisResult, Controller, Detection, ImageUpload, InferenceClient, PlantClass,
    SqliteStateStore, MAX_HISTORY_ENTRIES,
};

/// Each call returns one more weed than the last, with a numbered image ref.
struct GrowingWeeds {
    calls: Cell<u32>,
}

impl InferenceClient for GrowingWeeds {
    fn predict(&self, _upload: &ImageUpload) -> Result<PredictOutcome> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        let mut detections = vec![Detection::new(
            PlantClass::Crop,
            0.9,
            [5.0, 5.0, 2.0, 2.0],
        )];
        for _ in 0..n {
            detections.push(Detection::new(
                PlantClass::Weed,
                0.5,
                [9.0, 9.0, 2.0, 2.0],
            ));
        }
        Ok(PredictOutcome {
            result: AnalysisResult::new(detections, Some(format!("predicted_{n}.png"))),
            message: None,
        })
    }

    fn process_frame(&self, _jpeg: &[u8]) -> Result<FrameAnalysis> {
        Err(anyhow!("not used"))
    }
}

/// Service that never finds anything.
struct EmptyField;

impl InferenceClient for EmptyField {
    fn predict(&self, _upload: &ImageUpload) -> Result<PredictOutcome> {
        Ok(PredictOutcome {
            result: AnalysisResult::empty(),
            message: None,
        })
    }

    fn process_frame(&self, _jpeg: &[u8]) -> Result<FrameAnalysis> {
        Err(anyhow!("not used"))
    }
}

fn png() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(12, 12, Rgb([30, 140, 30]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[test]
fn history_is_capped_and_survives_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("state.db");
    let db = db.to_string_lossy().to_string();

    {
        let client = GrowingWeeds {
            calls: Cell::new(0),
        };
        let mut controller = Controller::new(client, SqliteStateStore::open(&db)?)?;
        controller.select_bytes("plot.png", png())?;
        for _ in 0..11 {
            controller.analyze()?;
        }
        assert_eq!(controller.view_history().len(), MAX_HISTORY_ENTRIES);
    }

    let client = GrowingWeeds {
        calls: Cell::new(0),
    };
    let mut controller = Controller::new(client, SqliteStateStore::open(&db)?)?;
    let history = controller.view_history();
    assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
    assert_eq!(history[0].image_ref.as_deref(), Some("predicted_11.png"));
    assert_eq!(history[0].weed_count, 11);
    assert!(history
        .iter()
        .all(|entry| entry.image_ref.as_deref() != Some("predicted_1.png")));

    // The most recent analysis is the active one.
    let active = controller.risk_report().expect("active result");
    assert_eq!(active.assessment.weed_count, 11);

    // Picking an older entry changes the risk page and persists.
    let page = controller.select_for_risk(9)?;
    assert_eq!(page.assessment.weed_count, 2);
    drop(controller);

    let mut controller = Controller::new(
        GrowingWeeds {
            calls: Cell::new(0),
        },
        SqliteStateStore::open(&db)?,
    )?;
    assert_eq!(
        controller.risk_report().map(|p| p.assessment.weed_count),
        Some(2)
    );

    controller.clear_history()?;
    assert_eq!(
        report::history_table(controller.view_history()),
        format!("{}\n", report::NO_HISTORY)
    );
    assert!(controller.risk_report().is_none());
    Ok(())
}

#[test]
fn empty_results_are_not_recorded() -> Result<()> {
    let store = SqliteStateStore::open(&paddy_scout::shared_memory_uri())?;
    let mut controller = Controller::new(EmptyField, store)?;
    controller.select_bytes("bare.png", png())?;
    let result = controller.analyze()?.clone();
    assert!(result.is_empty());
    assert!(report::analysis_summary(&result).contains(report::NO_OBJECTS));
    assert!(controller.view_history().is_empty());
    assert_eq!(
        controller.state().notice.as_ref().map(|n| n.message.as_str()),
        Some(report::NO_OBJECTS)
    );
    Ok(())
}
