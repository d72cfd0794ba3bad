use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_SERVICE_URL: &str = "http://localhost:8800";
const DEFAULT_STATE_DB_PATH: &str = "paddy_scout.db";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_VIDEO_FPS: u32 = 10;
const DEFAULT_MAX_IN_FLIGHT: usize = 1;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    service_url: Option<String>,
    state_db_path: Option<String>,
    request_timeout_secs: Option<u64>,
    video: Option<VideoConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    fps: Option<u32>,
    max_in_flight: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the detection service.
    pub service_url: String,
    pub state_db_path: String,
    pub request_timeout: Duration,
    pub video: VideoSettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    /// Playback rate for sources without their own timing.
    pub fps: u32,
    /// Outstanding `/process-frame` requests allowed at once.
    pub max_in_flight: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            state_db_path: DEFAULT_STATE_DB_PATH.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            video: VideoSettings {
                fps: DEFAULT_VIDEO_FPS,
                max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            },
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PADDY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let defaults = Self::default();
        let video = VideoSettings {
            fps: file
                .video
                .as_ref()
                .and_then(|video| video.fps)
                .unwrap_or(defaults.video.fps),
            max_in_flight: file
                .video
                .as_ref()
                .and_then(|video| video.max_in_flight)
                .unwrap_or(defaults.video.max_in_flight),
        };
        Self {
            service_url: file.service_url.unwrap_or(defaults.service_url),
            state_db_path: file.state_db_path.unwrap_or(defaults.state_db_path),
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            video,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PADDY_SERVICE_URL") {
            if !url.trim().is_empty() {
                self.service_url = url.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("PADDY_STATE_DB") {
            if !path.trim().is_empty() {
                self.state_db_path = path;
            }
        }
        if let Ok(timeout) = std::env::var("PADDY_REQUEST_TIMEOUT_SECS") {
            let seconds: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("PADDY_REQUEST_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.request_timeout = Duration::from_secs(seconds);
        }
        if let Ok(fps) = std::env::var("PADDY_VIDEO_FPS") {
            self.video.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("PADDY_VIDEO_FPS must be an integer"))?;
        }
        if let Ok(max) = std::env::var("PADDY_MAX_IN_FLIGHT") {
            self.video.max_in_flight = max
                .trim()
                .parse()
                .map_err(|_| anyhow!("PADDY_MAX_IN_FLIGHT must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let url = Url::parse(&self.service_url)
            .map_err(|e| anyhow!("invalid service url {}: {}", self.service_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!("service url must be http or https"));
        }
        if self.request_timeout.as_secs() == 0 {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        if self.video.fps == 0 || self.video.fps > 120 {
            return Err(anyhow!("video fps must be between 1 and 120"));
        }
        if self.video.max_in_flight == 0 {
            return Err(anyhow!("max_in_flight must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
