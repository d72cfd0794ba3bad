//! Image analysis page controller.
//!
//! Every user action goes through a method here. Failures never poison the
//! controller: they are returned as a [`Notice`] and also kept in the state
//! until dismissed, while the previous result stays on screen.

use anyhow::Context;
use std::fmt;
use std::path::Path;

use crate::client::InferenceClient;
use crate::detect::AnalysisResult;
use crate::history::{HistoryEntry, HistoryStore};
use crate::render::DetectionRenderer;
use crate::risk::recommend::{recommendations, Recommendation};
use crate::risk::RiskAssessment;
use crate::storage::StateStore;
use crate::upload::ImageUpload;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    /// Bad input; nothing was sent.
    Validation,
    /// The detection service could not be reached or reported an error.
    Transport,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Validation,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Transport,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Notice {}

/// What the image page shows.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub selected: Option<ImageUpload>,
    pub current: Option<AnalysisResult>,
    /// Service note attached to the current result.
    pub message: Option<String>,
    pub notice: Option<Notice>,
}

/// Risk page content for the active result.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskPage {
    pub assessment: RiskAssessment,
    pub recommendations: Vec<Recommendation>,
}

impl RiskPage {
    pub fn for_result(result: &AnalysisResult) -> Self {
        let assessment = RiskAssessment::from_result(result);
        let recommendations = recommendations(
            assessment.crop_count,
            assessment.weed_count,
            assessment.weed_crop_ratio,
        );
        Self {
            assessment,
            recommendations,
        }
    }
}

pub struct Controller<C: InferenceClient, S: StateStore> {
    client: C,
    history: HistoryStore<S>,
    renderer: DetectionRenderer,
    state: AppState,
}

impl<C: InferenceClient, S: StateStore> Controller<C, S> {
    pub fn new(client: C, store: S) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            history: HistoryStore::open(store)?,
            renderer: DetectionRenderer::new(),
            state: AppState::default(),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn dismiss_notice(&mut self) {
        self.state.notice = None;
    }

    /// Validate and remember an image file. An invalid file leaves the
    /// previous selection in place.
    pub fn select_file(&mut self, path: &Path) -> Result<&ImageUpload, Notice> {
        let upload = ImageUpload::from_path(path).map_err(invalid_input);
        self.accept_selection(upload)
    }

    pub fn select_bytes(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<&ImageUpload, Notice> {
        let upload = ImageUpload::from_bytes(file_name, bytes).map_err(invalid_input);
        self.accept_selection(upload)
    }

    fn accept_selection(
        &mut self,
        upload: Result<ImageUpload, Notice>,
    ) -> Result<&ImageUpload, Notice> {
        match upload {
            Ok(upload) => {
                log::info!(
                    "selected {} ({} bytes)",
                    upload.file_name,
                    upload.bytes.len()
                );
                self.state.notice = None;
                Ok(self.state.selected.insert(upload))
            }
            Err(notice) => Err(self.raise(notice)),
        }
    }

    /// Send the selected image for analysis.
    ///
    /// A result with detections is added to the history and becomes the
    /// active result for the risk page.
    pub fn analyze(&mut self) -> Result<&AnalysisResult, Notice> {
        let Some(upload) = self.state.selected.as_ref() else {
            return Err(self.raise(Notice::validation("Please select an image first")));
        };
        let outcome = match self.client.predict(upload) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("analysis of {} failed: {:#}", upload.file_name, err);
                let notice = Notice::transport(format!("Error processing image: {:#}", err));
                return Err(self.raise(notice));
            }
        };
        let result = outcome.result;
        log::info!(
            "analysis found {} paddy and {} weed",
            result.crop_count(),
            result.weed_count()
        );
        if result.is_empty() {
            self.state.notice = Some(Notice::info(
                outcome
                    .message
                    .as_deref()
                    .unwrap_or("No objects detected in the image"),
            ));
        } else {
            if let Err(err) = self.history.append(HistoryEntry::now(result.clone())) {
                log::warn!("failed to save detection history: {:#}", err);
            }
            self.state.notice = None;
        }
        self.state.message = outcome.message;
        Ok(self.state.current.insert(result))
    }

    pub fn view_history(&self) -> &[HistoryEntry] {
        self.history.list()
    }

    /// Make a history entry the active result and return its risk page.
    pub fn select_for_risk(&mut self, index: usize) -> Result<RiskPage, Notice> {
        match self.history.select(index) {
            Ok(result) => Ok(RiskPage::for_result(result)),
            Err(err) => Err(self.raise(Notice::validation(format!("{:#}", err)))),
        }
    }

    pub fn clear_history(&mut self) -> Result<(), Notice> {
        match self.history.clear() {
            Ok(()) => {
                log::info!("detection history cleared");
                Ok(())
            }
            Err(err) => Err(self.raise(Notice::transport(format!(
                "Error clearing history: {:#}",
                err
            )))),
        }
    }

    /// Risk page for the active result, if there is one.
    pub fn risk_report(&self) -> Option<RiskPage> {
        self.history.active().map(RiskPage::for_result)
    }

    /// Draw the current detections onto the selected image and save it.
    pub fn annotate(&mut self, out: &Path) -> Result<(), Notice> {
        let (Some(upload), Some(result)) = (&self.state.selected, &self.state.current) else {
            return Err(self.raise(Notice::validation("Nothing analyzed yet")));
        };
        let drawn = image::load_from_memory(&upload.bytes)
            .context("decode selected image")
            .map(|base| self.renderer.annotate(&base.into_rgb8(), result.detections()))
            .and_then(|annotated| {
                annotated
                    .save(out)
                    .with_context(|| format!("write {}", out.display()))
            });
        match drawn {
            Ok(()) => Ok(()),
            Err(err) => Err(self.raise(Notice::validation(format!("{:#}", err)))),
        }
    }

    fn raise(&mut self, notice: Notice) -> Notice {
        self.state.notice = Some(notice.clone());
        notice
    }
}

fn invalid_input(err: anyhow::Error) -> Notice {
    Notice::validation(format!("{:#}", err))
}
