use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::wire::{BatchImage, Plan};

/// Logs go to stderr; stdout carries the rendered plan. `RUST_LOG` overrides
/// the default level.
pub fn init_tracing(debug: bool) {
    let default = if debug { "vibe_studio=debug,info" } else { "vibe_studio=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub run: Uuid,
    pub kind: &'static str,
    pub created_at: DateTime<Utc>,
    pub files: Vec<String>,
}

/// Output directory of one run.
pub struct RunDir {
    pub dir: PathBuf,
    manifest: Manifest,
}

impl RunDir {
    pub fn create(out_dir: &Path, kind: &'static str) -> Result<Self> {
        let run = Uuid::new_v4();
        let dir = out_dir.join("runs").join(run.to_string());
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, manifest: Manifest { run, kind, created_at: Utc::now(), files: Vec::new() } })
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.persist(&path).with_context(|| format!("failed to write {}", path.display()))?;
        self.manifest.files.push(name.to_string());
        Ok(path)
    }

    pub fn save_raw_response(&mut self, raw: &str) -> Result<PathBuf> {
        self.write("plan.response.txt", raw.as_bytes())
    }

    /// Write the plan JSON without image bytes, plus one file per image.
    pub fn save_plan(&mut self, plan: &Plan) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for week in &plan.weekly_plan {
            for (d, day) in week.plan.iter().enumerate() {
                for (e, ex) in day.exercises.iter().enumerate() {
                    let Some(img) = &ex.image else { continue };
                    let name = format!("w{}-d{}-e{}-{}.{}", week.week, d + 1, e + 1, slug(&ex.name), img.extension());
                    written.push(self.write(&name, &img.data)?);
                }
            }
        }
        let bare = plan.without_images();
        written.push(self.write("plan.json", to_string_pretty(&bare)?.as_bytes())?);
        Ok(written)
    }

    /// File names follow the download names of the web version:
    /// `ad_<title>_<format>.<ext>`.
    pub fn save_batch(&mut self, title: &str, images: &[BatchImage]) -> Result<Vec<PathBuf>> {
        let title = whitespace_to_underscore(title.trim());
        let mut written = Vec::new();
        for img in images {
            let format = format_to_underscore(&img.format);
            let name = format!("ad_{}_{}.{}", title, format, img.image.extension());
            written.push(self.write(&name, &img.image.data)?);
        }
        Ok(written)
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        let manifest = to_string_pretty(&self.manifest)?;
        self.write("manifest.json", manifest.as_bytes())?;
        Ok(self.dir)
    }
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static FORMAT_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s/]+").expect("format separator regex"));
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug regex"));

fn whitespace_to_underscore(s: &str) -> String {
    WHITESPACE.replace_all(s, "_").into_owned()
}

fn format_to_underscore(s: &str) -> String {
    FORMAT_SEPARATORS.replace_all(s, "_").into_owned()
}

fn slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_SLUG.replace_all(&lowered, "-").trim_matches('-').to_string()
}
