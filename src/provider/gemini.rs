use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::Provider;
use crate::wire::{ImageArtifact, ImageRequest};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API. `imagen-*` image models go through
/// `:predict`; any other image model is asked for an inline image through
/// `:generateContent`.
pub struct Gemini {
    text_model: String,
    image_model: String,
    api_key: String,
    api_base: String,
    client: Client,
}

impl Gemini {
    pub fn new(
        text_model: String,
        image_model: String,
        api_key: String,
        api_base: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            text_model,
            image_model,
            api_key,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base.trim_end_matches('/'), model, method)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<String> {
        debug!(url, "gemini request");
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .context("gemini request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("gemini read body failed")?;
        debug!(%status, bytes = text.len(), "gemini response");

        if !status.is_success() {
            return Err(anyhow!("Gemini API error ({}): {}", status, text));
        }
        Ok(text)
    }

    fn uses_predict(&self) -> bool {
        self.image_model.starts_with("imagen")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

fn parts(resp: GenerateContentResponse) -> Result<Vec<Part>> {
    if resp.candidates.is_empty() {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(anyhow!("gemini returned no content: {reason}"));
    }
    Ok(resp
        .candidates
        .into_iter()
        .take(1)
        .flat_map(|c| c.content.map(|c| c.parts).unwrap_or_default())
        .collect())
}

fn text_from_body(body: &str) -> Result<String> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("gemini response parse error: {e}"))?;
    let text: String = parts(parsed)?.into_iter().filter_map(|p| p.text).collect();
    if text.trim().is_empty() {
        return Err(anyhow!("gemini: empty text content"));
    }
    Ok(text)
}

fn inline_images_from_body(body: &str) -> Result<Vec<ImageArtifact>> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("gemini response parse error: {e}"))?;
    // A blocked prompt is an answer without an image, not a transport error.
    if parsed.candidates.is_empty() {
        return Ok(Vec::new());
    }
    parts(parsed)?
        .into_iter()
        .filter_map(|p| p.inline_data)
        .map(|d| ImageArtifact::from_base64(d.mime_type, &d.data))
        .collect()
}

fn predictions_from_body(body: &str, fallback_mime: &str) -> Result<Vec<ImageArtifact>> {
    let parsed: PredictResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("imagen response parse error: {e}"))?;
    parsed
        .predictions
        .into_iter()
        .filter_map(|p| {
            let data = p.bytes_base64_encoded?;
            Some((p.mime_type.unwrap_or_else(|| fallback_mime.to_string()), data))
        })
        .map(|(mime, data)| ImageArtifact::from_base64(mime, &data))
        .filter(|img| !matches!(img, Ok(i) if i.is_empty()))
        .collect()
}

#[async_trait]
impl Provider for Gemini {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        let text = self.post(&self.url(&self.text_model, "generateContent"), &body).await?;
        text_from_body(&text)
    }

    async fn generate_images(&self, req: &ImageRequest) -> Result<Vec<ImageArtifact>> {
        if self.uses_predict() {
            let mut parameters = json!({
                "sampleCount": 1,
                "outputOptions": { "mimeType": req.mime_type },
            });
            if let Some(ratio) = &req.aspect_ratio {
                parameters["aspectRatio"] = json!(ratio);
            }
            let body = json!({ "instances": [{ "prompt": req.prompt }], "parameters": parameters });
            let text = self.post(&self.url(&self.image_model, "predict"), &body).await?;
            predictions_from_body(&text, &req.mime_type)
        } else {
            let mut generation_config = json!({ "responseModalities": ["TEXT", "IMAGE"] });
            if let Some(ratio) = &req.aspect_ratio {
                generation_config["imageConfig"] = json!({ "aspectRatio": ratio });
            }
            let body = json!({
                "contents": [{ "role": "user", "parts": [{ "text": req.prompt }] }],
                "generationConfig": generation_config,
            });
            let text = self.post(&self.url(&self.image_model, "generateContent"), &body).await?;
            inline_images_from_body(&text)
        }
    }
}
