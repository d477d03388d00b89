//! Vision backend over an OpenAI-compatible chat-completions API.
//!
//! Works with any server that accepts `image_url` content parts (vLLM,
//! llama.cpp server, TGI). Each crop is sent as a base64 PNG data URL with
//! greedy decoding and a two-token budget, so answers stay a bare Yes/No.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::backend::VisionBackend;
use falldetect_core::{Error, Result, VisionSettings};

/// Generation budget per question.
const MAX_NEW_TOKENS: u32 = 2;

pub struct HttpVisionBackend {
    client: Client,
    runtime: Handle,
    settings: VisionSettings,
}

impl HttpVisionBackend {
    /// Build the client and probe `GET /v1/models`.
    ///
    /// Must run inside a Tokio runtime; the backend keeps a handle to it and
    /// drives requests from blocking threads with `Handle::block_on`.
    pub async fn connect(settings: VisionSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let url = format!("{}/v1/models", settings.endpoint);
        info!("Probing vision endpoint {}", url);
        let mut request = client.get(&url);
        if let Some(key) = &settings.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::ResourceNotReady(format!("Vision endpoint unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::ResourceNotReady(format!(
                "Vision endpoint returned {}",
                response.status()
            )));
        }

        info!("Vision endpoint ready: model={}", settings.model);
        Ok(Self {
            client,
            runtime: Handle::current(),
            settings,
        })
    }

    async fn complete(&self, image_url: String, question: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.settings.endpoint);
        let body = request_body(&self.settings.model, &image_url, question);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::ClassificationFailure(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ClassificationFailure(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::ClassificationFailure(format!("Invalid response body: {}", e)))?;
        let answer = extract_answer(&payload)?;
        debug!("Model answered {:?}", answer);
        Ok(answer)
    }
}

impl VisionBackend for HttpVisionBackend {
    /// Blocks the calling thread. Call from `spawn_blocking` or a plain
    /// thread, never from an async task.
    fn ask(&mut self, image: &DynamicImage, question: &str) -> Result<String> {
        let image_url = png_data_url(image)?;
        self.runtime.block_on(self.complete(image_url, question))
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}

fn request_body(model: &str, image_url: &str, question: &str) -> Value {
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "image_url", "image_url": {"url": image_url}},
                {"type": "text", "text": question},
            ],
        }],
        "temperature": 0.0,
        "max_tokens": MAX_NEW_TOKENS,
        "stream": false,
    })
}

fn extract_answer(payload: &Value) -> Result<String> {
    let missing =
        || Error::ClassificationFailure("Response has no choices/message content".to_string());

    let message = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(missing)?;

    match message.get("content") {
        Some(Value::String(text)) => Ok(text.clone()),
        // Some servers return content as a list of parts.
        Some(Value::Array(parts)) => {
            let text: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            if text.is_empty() {
                return Err(missing());
            }
            Ok(text)
        }
        _ => Err(missing()),
    }
}

fn png_data_url(image: &DynamicImage) -> Result<String> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Error::ClassificationFailure(format!("PNG encode failed: {}", e)))?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buf)
    ))
}
