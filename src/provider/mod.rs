use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::wire::{ImageArtifact, ImageRequest};

pub mod gemini;
pub mod openai;
#[cfg(test)]
pub mod mock;

/// A generative backend. Both calls are single request/response round trips;
/// retries and pacing are the caller's business.
#[async_trait]
pub trait Provider: Send + Sync {
    /// One prompt in, the model's raw text out.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Images for one prompt. An empty vector means the backend answered
    /// without producing an image.
    async fn generate_images(&self, req: &ImageRequest) -> Result<Vec<ImageArtifact>>;
}

pub type DynProvider = Box<dyn Provider + Send + Sync>;

pub fn make_provider(cfg: &Config) -> Result<DynProvider> {
    let api_key = cfg
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| anyhow!("no API key configured; pass --api-key or set one of {:?}", cfg.credential_vars()))?;
    let timeout = Duration::from_secs(cfg.timeout_secs);

    match cfg.provider {
        ProviderKind::Gemini => Ok(Box::new(gemini::Gemini::new(
            cfg.text_model.clone(),
            cfg.image_model.clone(),
            api_key,
            cfg.api_base.clone(),
            timeout,
        )?)),
        ProviderKind::OpenAI => Ok(Box::new(openai::OpenAIProvider::new(
            cfg.text_model.clone(),
            cfg.image_model.clone(),
            api_key,
            cfg.api_base.clone(),
            timeout,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_rejected_before_any_request() {
        let cfg = Config { api_key: Some("  ".into()), ..Config::default() };
        let err = make_provider(&cfg).err().expect("blank key must fail");
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn builds_each_kind() {
        for provider in [ProviderKind::Gemini, ProviderKind::OpenAI] {
            let cfg = Config { provider, api_key: Some("k".into()), ..Config::default() };
            assert!(make_provider(&cfg).is_ok());
        }
    }
}
