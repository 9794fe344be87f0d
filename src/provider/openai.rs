use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::Provider;
use crate::wire::{ImageArtifact, ImageRequest};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible backend: chat completions for text, the images endpoint
/// for pictures. The prompt goes out as a single user message.
pub struct OpenAIProvider {
    text_model: String,
    image_model: String,
    api_key: String,
    api_base: String,
    client: Client,
}

impl OpenAIProvider {
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

    async fn post(&self, path: &str, body: &Value) -> Result<String> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), path);
        debug!(%url, "openai request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("openai request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("openai read body failed")?;
        debug!(%status, bytes = text.len(), "openai response");

        if !status.is_success() {
            return Err(anyhow!("OpenAI API error ({}): {}", status, text));
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

/// Closest size the images endpoint accepts for an aspect ratio.
fn size_for_ratio(ratio: Option<&str>) -> &'static str {
    match ratio {
        Some("9:16") | Some("3:4") | Some("2:3") => "1024x1536",
        Some("16:9") | Some("4:3") | Some("3:2") => "1536x1024",
        _ => "1024x1024",
    }
}

fn mime_for_format(mime: &str) -> (&'static str, &'static str) {
    match mime {
        "image/png" => ("png", "image/png"),
        "image/webp" => ("webp", "image/webp"),
        _ => ("jpeg", "image/jpeg"),
    }
}

fn content_from_body(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("Failed to parse OpenAI response: {e}\nRaw: {body}"))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow!("openai: empty content"))
}

fn images_from_body(body: &str, mime: &str) -> Result<Vec<ImageArtifact>> {
    let parsed: ImagesResponse =
        serde_json::from_str(body).map_err(|e| anyhow!("Failed to parse OpenAI images response: {e}"))?;
    parsed
        .data
        .into_iter()
        .filter_map(|d| d.b64_json)
        .map(|b64| ImageArtifact::from_base64(mime, &b64))
        .collect()
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.text_model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.7,
        });
        let text = self.post("chat/completions", &body).await?;
        content_from_body(&text)
    }

    async fn generate_images(&self, req: &ImageRequest) -> Result<Vec<ImageArtifact>> {
        let (format, mime) = mime_for_format(&req.mime_type);
        let body = json!({
            "model": self.image_model,
            "prompt": req.prompt,
            "n": 1,
            "size": size_for_ratio(req.aspect_ratio.as_deref()),
            "output_format": format,
        });
        let text = self.post("images/generations", &body).await?;
        images_from_body(&text, mime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_to_size() {
        assert_eq!(size_for_ratio(Some("9:16")), "1024x1536");
        assert_eq!(size_for_ratio(Some("1:1")), "1024x1024");
        assert_eq!(size_for_ratio(Some("16:9")), "1536x1024");
        assert_eq!(size_for_ratio(None), "1024x1024");
    }

    #[test]
    fn first_choice_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"title\":\"x\"}"}}]}"#;
        assert_eq!(content_from_body(body).unwrap(), r#"{"title":"x"}"#);
        assert!(content_from_body(r#"{"choices":[]}"#).is_err());
        assert!(content_from_body(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
    }

    #[test]
    fn images_without_payload_are_empty() {
        let body = r#"{"data":[{"url":"https://example.invalid/a.png"}]}"#;
        assert!(images_from_body(body, "image/png").unwrap().is_empty());

        let body = r#"{"data":[{"b64_json":"AQID"}]}"#;
        let images = images_from_body(body, "image/jpeg").unwrap();
        assert_eq!(images[0], ImageArtifact::new("image/jpeg", vec![1, 2, 3]));
    }
}
