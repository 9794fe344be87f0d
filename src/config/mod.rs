use anyhow::{Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::ProviderKind;

/// Explicit backend and output configuration. Nothing below reads global
/// state; the credential is resolved once here and handed to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: String,
    pub provider: ProviderKind,
    pub text_model: String,
    pub image_model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    pub image_mime_type: String,
    pub out_dir: String,
    pub save_outputs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: "2025-10-01".into(),
            provider: ProviderKind::Gemini,
            text_model: "gemini-2.5-flash".into(),
            image_model: "imagen-4.0-generate-001".into(),
            api_key: None,
            api_base: None,
            timeout_secs: 300,
            image_mime_type: "image/jpeg".into(),
            out_dir: "vibe-out".into(),
            save_outputs: true,
        }
    }
}

impl Config {
    /// Read a TOML config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Environment variables consulted for the credential, most specific first.
    pub fn credential_vars(&self) -> &'static [&'static str] {
        match self.provider {
            ProviderKind::Gemini => &["VIBE_API_KEY", "GEMINI_API_KEY", "API_KEY"],
            ProviderKind::OpenAI => &["VIBE_API_KEY", "OPENAI_API_KEY"],
        }
    }

    /// Fill in the credential from the environment when none was configured.
    pub fn resolve_credential<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            return;
        }
        self.api_key = self
            .credential_vars()
            .iter()
            .find_map(|var| lookup(var).filter(|v| !v.trim().is_empty()));
    }
}
