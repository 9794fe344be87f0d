//! Scripted in-memory provider for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::Provider;
use crate::wire::{ImageArtifact, ImageRequest};

#[derive(Debug, Clone)]
pub enum ImageScript {
    /// Return one image whose bytes are the prompt text.
    Image,
    /// Answer without an image.
    Empty,
    /// Fail the request.
    Fail,
    /// Like `Image`, after the given delay.
    Delayed(Duration),
}

pub struct ScriptedProvider {
    text: Result<String, String>,
    rules: Vec<(String, ImageScript)>,
    delay: Duration,
    text_calls: AtomicUsize,
    image_calls: Mutex<Vec<ImageRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            text: Err("no text scripted".into()),
            rules: Vec::new(),
            delay: Duration::ZERO,
            text_calls: AtomicUsize::new(0),
            image_calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Ok(text.into());
        self
    }

    pub fn with_text_error(mut self, message: impl Into<String>) -> Self {
        self.text = Err(message.into());
        self
    }

    /// Requests whose prompt contains `needle`, or whose aspect ratio equals
    /// it, follow `script`. First matching rule wins.
    pub fn on_image(mut self, needle: impl Into<String>, script: ImageScript) -> Self {
        self.rules.push((needle.into(), script));
        self
    }

    /// Latency of every image request without a `Delayed` rule.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_calls.lock().iter().map(|r| r.prompt.clone()).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn script_for(&self, req: &ImageRequest) -> ImageScript {
        self.rules
            .iter()
            .find(|(needle, _)| req.prompt.contains(needle.as_str()) || req.aspect_ratio.as_deref() == Some(needle.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or(ImageScript::Image)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate_text(&self, _prompt: &str) -> Result<String> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.text.clone().map_err(|e| anyhow!(e))
    }

    async fn generate_images(&self, req: &ImageRequest) -> Result<Vec<ImageArtifact>> {
        self.image_calls.lock().push(req.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let script = self.script_for(req);
        let delay = match script {
            ImageScript::Delayed(d) => d,
            _ => self.delay,
        };
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            ImageScript::Image | ImageScript::Delayed(_) => {
                Ok(vec![ImageArtifact::new(req.mime_type.clone(), req.prompt.clone().into_bytes())])
            }
            ImageScript::Empty => Ok(Vec::new()),
            ImageScript::Fail => Err(anyhow!("scripted failure for {:?}", req.prompt)),
        }
    }
}
