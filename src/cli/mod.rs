use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::prompt::{AdRequest, FitnessProfile, Level, VisualStyle};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "google")]
    Gemini,
    #[value(name = "openai", alias = "open-ai")]
    OpenAI,
}

#[derive(Parser, Debug)]
#[command(name = "vibe_studio", version, about = "Generate fitness plans with illustrated exercises, or ad images in three formats")]
pub struct Args {
    /// TOML config file; flags below override it.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    #[arg(long)]
    pub text_model: Option<String>,

    #[arg(long)]
    pub image_model: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub api_base: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long)]
    pub out_dir: Option<String>,

    /// Do not write images or the plan to the output directory.
    #[arg(long, default_value_t = false)]
    pub no_save: bool,

    /// Hide the enrichment progress bar.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a multi-week training plan and illustrate every exercise.
    Plan(PlanArgs),
    /// Generate ad images for Reel/Story, Square Post and Horizontal Ad.
    Ads(AdsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct PlanArgs {
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub weight_kg: Option<f32>,
    #[arg(long)]
    pub height_cm: Option<f32>,
    #[arg(long)]
    pub days_per_week: Option<u32>,
    #[arg(long, default_value_t = 4)]
    pub weeks: u32,
    #[arg(long, default_value = "unspecified")]
    pub sex: String,
    #[arg(long, value_enum, default_value_t = Level::Beginner)]
    pub level: Level,
    #[arg(long, default_value = "general fitness")]
    pub goal: String,
    #[arg(long, default_value = "bodyweight only")]
    pub equipment: String,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct AdsArgs {
    #[arg(long, default_value = "")]
    pub title: String,
    #[arg(long, value_enum, default_value_t = VisualStyle::Realistic)]
    pub style: VisualStyle,
    /// Render the title as large text inside the images.
    #[arg(long, default_value_t = false)]
    pub add_text: bool,
}

impl Args {
    /// Layer the command-line overrides on top of a loaded config.
    pub fn apply_to(&self, cfg: &mut Config) {
        if let Some(p) = self.provider {
            cfg.provider = p;
        }
        if let Some(m) = &self.text_model {
            cfg.text_model = m.clone();
        }
        if let Some(m) = &self.image_model {
            cfg.image_model = m.clone();
        }
        if let Some(k) = &self.api_key {
            cfg.api_key = Some(k.clone());
        }
        if let Some(b) = &self.api_base {
            cfg.api_base = Some(b.clone());
        }
        if let Some(t) = self.timeout_secs {
            cfg.timeout_secs = t;
        }
        if let Some(d) = &self.out_dir {
            cfg.out_dir = d.clone();
        }
        if self.no_save {
            cfg.save_outputs = false;
        }
    }
}

impl From<&PlanArgs> for FitnessProfile {
    fn from(a: &PlanArgs) -> Self {
        FitnessProfile {
            age: a.age,
            weight_kg: a.weight_kg,
            height_cm: a.height_cm,
            days_per_week: a.days_per_week,
            weeks: a.weeks,
            sex: a.sex.clone(),
            level: a.level,
            goal: a.goal.clone(),
            equipment: a.equipment.clone(),
            notes: a.notes.clone(),
        }
    }
}

impl From<&AdsArgs> for AdRequest {
    fn from(a: &AdsArgs) -> Self {
        AdRequest { title: a.title.clone(), style: a.style, add_text: a.add_text }
    }
}
