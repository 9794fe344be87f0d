use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::FlowError;
use crate::wire::BatchDescriptor;

/// ========================================
/// Fitness plan
/// ========================================

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessProfile {
    pub age: Option<u32>,
    pub weight_kg: Option<f32>,
    pub height_cm: Option<f32>,
    pub days_per_week: Option<u32>,
    pub weeks: u32,
    pub sex: String,
    pub level: Level,
    pub goal: String,
    pub equipment: String,
    pub notes: Option<String>,
}

/// A profile whose required numbers are known to be present and sane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub age: u32,
    pub weight_kg: f32,
    pub height_cm: f32,
    pub days_per_week: u32,
}

impl FitnessProfile {
    pub fn validate(&self) -> Result<Vitals, FlowError> {
        let age = self.age.filter(|a| *a > 0).ok_or_else(|| FlowError::invalid("age", "Please enter your age."))?;
        let weight_kg = self
            .weight_kg
            .filter(|w| w.is_finite() && *w > 0.0)
            .ok_or_else(|| FlowError::invalid("weight_kg", "Please enter your weight in kg."))?;
        let height_cm = self
            .height_cm
            .filter(|h| h.is_finite() && *h > 0.0)
            .ok_or_else(|| FlowError::invalid("height_cm", "Please enter your height in cm."))?;
        let days_per_week = self
            .days_per_week
            .filter(|d| (1..=7).contains(d))
            .ok_or_else(|| FlowError::invalid("days_per_week", "Please choose between 1 and 7 training days per week."))?;
        if !(1..=12).contains(&self.weeks) {
            return Err(FlowError::invalid("weeks", "The plan must last between 1 and 12 weeks."));
        }
        Ok(Vitals { age, weight_kg, height_cm, days_per_week })
    }
}

fn plan_contract() -> &'static str {
r#"{
  "title": string,
  "introduction": string,
  "weeklyPlan": [
    { "week": number,
      "plan": [
        { "day": string,
          "exercises": [
            { "name": string, "sets": string, "reps": string, "rpe": string,
              "rest": string, "description": string, "imageQuery": string }
          ] } ] } ],
  "nutritionAdvice": { "protein": string, "hydration": string, "sleep": string },
  "finalMessage": string
}"#
}

/// Prompt for the structured plan request. Call after [`FitnessProfile::validate`].
pub fn plan_prompt(profile: &FitnessProfile, vitals: &Vitals) -> String {
    let mut p = format!(
        r#"You are an expert personal trainer. Create a {weeks}-week training plan for this person:
- Age: {age}
- Sex: {sex}
- Weight: {weight} kg
- Height: {height} cm
- Experience level: {level}
- Goal: {goal}
- Training days per week: {days}
- Available equipment: {equipment}
"#,
        weeks = profile.weeks,
        age = vitals.age,
        sex = profile.sex,
        weight = vitals.weight_kg,
        height = vitals.height_cm,
        level = profile.level.as_str(),
        goal = profile.goal,
        days = vitals.days_per_week,
        equipment = profile.equipment,
    );
    if let Some(notes) = profile.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        p.push_str(&format!("- Notes: {notes}\n"));
    }
    p.push_str(&format!(
        r#"
Rules:
- Number the weeks from 1 to {weeks}; each week lists exactly {days} training days.
- "sets", "reps", "rpe" and "rest" are short strings (e.g. "3", "8-10", "7", "90s").
- "imageQuery" is a short English description of a photo that shows the exercise being performed.
- Progress intensity from week to week.

Return EXACTLY ONE JSON document (no markdown, no prose before or after) with this shape:
{contract}
"#,
        weeks = profile.weeks,
        days = vitals.days_per_week,
        contract = plan_contract(),
    ));
    p
}

/// Image prompt for one exercise illustration.
pub fn exercise_image_prompt(image_query: &str) -> String {
    format!("Clear instructional fitness photo: {}. Single person, neutral gym background, no text.", image_query.trim())
}

/// ========================================
/// Ad images
/// ========================================

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    Realistic,
    Cinematic,
    Minimalist,
    Typographic,
    Illustrative,
    Abstract,
    Vintage,
    Futuristic,
}

impl VisualStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            VisualStyle::Realistic => "realistic",
            VisualStyle::Cinematic => "cinematic",
            VisualStyle::Minimalist => "minimalist",
            VisualStyle::Typographic => "typographic",
            VisualStyle::Illustrative => "illustrative",
            VisualStyle::Abstract => "abstract",
            VisualStyle::Vintage => "vintage",
            VisualStyle::Futuristic => "futuristic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRequest {
    pub title: String,
    pub style: VisualStyle,
    pub add_text: bool,
}

impl AdRequest {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.title.trim().is_empty() {
            return Err(FlowError::invalid("title", "Please enter a title for the ad."));
        }
        Ok(())
    }
}

/// The three placements every ad is rendered for, in display order.
pub fn ad_formats() -> Vec<BatchDescriptor> {
    vec![
        BatchDescriptor::new("Reel/Story", "9:16"),
        BatchDescriptor::new("Square Post", "1:1"),
        BatchDescriptor::new("Horizontal Ad", "16:9"),
    ]
}

pub fn ad_base_prompt(req: &AdRequest) -> String {
    let title = req.title.trim();
    let mut p = format!(
        "Create a high-quality image for a Meta (Facebook/Instagram) ad. The ad is for a product or service called \"{title}\". The visual style must be {}.",
        req.style.as_str()
    );
    if req.add_text {
        p.push_str(&format!(
            " The image must include the text \"{title}\" large, clear and legible, perfectly integrated into the design."
        ));
    } else {
        p.push_str(" The image must not contain any text.");
    }
    p
}

pub fn ad_format_prompt(base: &str, format: &BatchDescriptor) -> String {
    format!("{base} The image format must be suitable for a {}.", format.label)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn profile() -> FitnessProfile {
        FitnessProfile {
            age: Some(34),
            weight_kg: Some(72.5),
            height_cm: Some(178.0),
            days_per_week: Some(3),
            weeks: 4,
            sex: "female".into(),
            level: Level::Intermediate,
            goal: "build strength".into(),
            equipment: "dumbbells, pull-up bar".into(),
            notes: Some("  sore left knee ".into()),
        }
    }

    #[test]
    fn plan_prompt_carries_profile_and_contract() {
        let p = profile();
        let vitals = p.validate().unwrap();
        let text = plan_prompt(&p, &vitals);
        assert!(text.contains("4-week"));
        assert!(text.contains("Age: 34"));
        assert!(text.contains("Weight: 72.5 kg"));
        assert!(text.contains("intermediate"));
        assert!(text.contains("Notes: sore left knee\n"));
        assert!(text.contains("\"weeklyPlan\""));
        assert!(text.contains("\"imageQuery\": string"));
        assert!(text.contains("EXACTLY ONE JSON document"));
    }

    #[test]
    fn blank_notes_are_omitted() {
        let p = FitnessProfile { notes: Some("   ".into()), ..profile() };
        let text = plan_prompt(&p, &p.validate().unwrap());
        assert!(!text.contains("Notes:"));
    }

    #[test]
    fn missing_required_numbers_are_invalid_input() {
        let cases = [
            (FitnessProfile { age: None, ..profile() }, "age"),
            (FitnessProfile { weight_kg: Some(0.0), ..profile() }, "weight_kg"),
            (FitnessProfile { height_cm: Some(f32::NAN), ..profile() }, "height_cm"),
            (FitnessProfile { days_per_week: Some(8), ..profile() }, "days_per_week"),
            (FitnessProfile { weeks: 0, ..profile() }, "weeks"),
        ];
        for (p, expected) in cases {
            match p.validate() {
                Err(FlowError::InvalidInput { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected InvalidInput({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn ad_prompt_with_and_without_text() {
        let mut req = AdRequest { title: " EcoFly ".into(), style: VisualStyle::Cinematic, add_text: false };
        let no_text = ad_base_prompt(&req);
        assert!(no_text.contains("called \"EcoFly\""));
        assert!(no_text.contains("cinematic"));
        assert!(no_text.ends_with("must not contain any text."));

        req.add_text = true;
        let with_text = ad_base_prompt(&req);
        assert!(with_text.contains("include the text \"EcoFly\""));
    }

    #[test]
    fn blank_title_is_invalid() {
        let req = AdRequest { title: "  ".into(), style: VisualStyle::Realistic, add_text: false };
        assert!(matches!(req.validate(), Err(FlowError::InvalidInput { field: "title", .. })));
    }

    #[test]
    fn formats_in_display_order() {
        let ratios: Vec<_> = ad_formats().into_iter().map(|f| f.ratio).collect();
        assert_eq!(ratios, ["9:16", "1:1", "16:9"]);
        let prompt = ad_format_prompt("base.", &ad_formats()[0]);
        assert_eq!(prompt, "base. The image format must be suitable for a Reel/Story.");
    }
}
