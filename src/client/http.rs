use anyhow::{anyhow, Context, Result};
use base64::{prelude::BASE64_STANDARD, Engine};
use rand::RngCore;
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::wire::{
    parse_frame_response, parse_predict_response, FrameAnalysis, FrameRequestBody, ModelInfo,
    PredictOutcome,
};
use super::InferenceClient;
use crate::config::AppConfig;
use crate::upload::ImageUpload;

const MAX_RESPONSE_BYTES: u64 = 32 * 1024 * 1024;

/// Blocking HTTP client for the detection service.
#[derive(Clone)]
pub struct HttpInferenceClient {
    agent: ureq::Agent,
    base: Url,
}

impl HttpInferenceClient {
    pub fn new(service_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(service_url)
            .map_err(|e| anyhow!("invalid service url {}: {}", service_url, e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { agent, base })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(&cfg.service_url, cfg.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an image reference returned by the service to an absolute URL.
    pub fn resolve_image_ref(&self, reference: &str) -> Result<Url> {
        self.base
            .join(reference)
            .map_err(|e| anyhow!("invalid image reference {}: {}", reference, e))
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        let url = self.endpoint("model-info")?;
        let response = self.agent.get(url.as_str()).call().map_err(transport_error)?;
        let body = read_body(response)?;
        serde_json::from_slice(&body).map_err(|e| anyhow!("invalid model info response: {}", e))
    }

    /// Download a service-hosted image, e.g. the rendered prediction.
    pub fn fetch_image(&self, reference: &str) -> Result<Vec<u8>> {
        let url = self.resolve_image_ref(reference)?;
        let response = self.agent.get(url.as_str()).call().map_err(transport_error)?;
        read_body(response)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| anyhow!("invalid endpoint {}: {}", path, e))
    }
}

impl InferenceClient for HttpInferenceClient {
    fn predict(&self, upload: &ImageUpload) -> Result<PredictOutcome> {
        let url = self.endpoint("predict")?;
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, upload);
        log::debug!(
            "posting {} ({} bytes) to {}",
            upload.file_name,
            upload.bytes.len(),
            url
        );
        let response = self
            .agent
            .post(url.as_str())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(transport_error)?;
        let payload = read_body(response)?;
        parse_predict_response(&payload)
    }

    fn process_frame(&self, jpeg: &[u8]) -> Result<FrameAnalysis> {
        let url = self.endpoint("process-frame")?;
        let image = frame_data_uri(jpeg);
        let response = self
            .agent
            .post(url.as_str())
            .send_json(FrameRequestBody { image: &image })
            .map_err(transport_error)?;
        let payload = read_body(response)?;
        parse_frame_response(&payload)
    }
}

/// `data:image/jpeg;base64,...` for a JPEG frame.
pub fn frame_data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(jpeg))
}

fn multipart_boundary() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("paddy-scout-{}", hex::encode(bytes))
}

fn multipart_body(boundary: &str, upload: &ImageUpload) -> Vec<u8> {
    let file_name = upload.file_name.replace('"', "");
    let mut body = Vec::with_capacity(upload.bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {}\r\n\r\n",
            upload.content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(&upload.bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut body)
        .context("read service response")?;
    Ok(body)
}

fn transport_error(err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            // The service reports failures as `{"error": ...}` with a 4xx/5xx.
            let detail = response
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
                .and_then(|json| json.get("error").and_then(|e| e.as_str()).map(str::to_string));
            match detail {
                Some(detail) => anyhow!("server responded with {}: {}", code, detail),
                None => anyhow!("server responded with {}", code),
            }
        }
        ureq::Error::Transport(transport) => {
            anyhow!("detection service unreachable: {}", transport)
        }
    }
}
