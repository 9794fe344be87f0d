use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use uuid::Uuid;

/// ========================================
/// Structured plan returned by the model
/// ========================================

/// Identity of one parsed plan. Assigned at parse time, never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlanId(pub Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(skip)]
    pub id: PlanId,
    pub title: String,
    pub introduction: String,
    pub weekly_plan: Vec<Arc<WeekBlock>>,
    pub nutrition_advice: NutritionAdvice,
    pub final_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekBlock {
    pub week: u32,
    pub plan: Vec<Arc<DayBlock>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBlock {
    pub day: String,
    pub exercises: Vec<Arc<Exercise>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    pub sets: String,
    pub reps: String,
    pub rpe: String,
    pub rest: String,
    pub description: String,
    pub image_query: String,
    /// Filled in by enrichment; the model never provides it.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionAdvice {
    pub protein: String,
    pub hydration: String,
    pub sleep: String,
}

impl Plan {
    pub fn exercise_count(&self) -> usize {
        self.weekly_plan
            .iter()
            .flat_map(|w| w.plan.iter())
            .map(|d| d.exercises.len())
            .sum()
    }

    /// Copy of the plan with every image removed.
    pub fn without_images(&self) -> Plan {
        let weekly_plan = self
            .weekly_plan
            .iter()
            .map(|w| {
                Arc::new(WeekBlock {
                    week: w.week,
                    plan: w
                        .plan
                        .iter()
                        .map(|d| {
                            Arc::new(DayBlock {
                                day: d.day.clone(),
                                exercises: d
                                    .exercises
                                    .iter()
                                    .map(|e| Arc::new(Exercise { image: None, ..Exercise::clone(e) }))
                                    .collect(),
                            })
                        })
                        .collect(),
                })
            })
            .collect();
        Plan { weekly_plan, ..self.clone() }
    }

    pub fn enriched_count(&self) -> usize {
        self.weekly_plan
            .iter()
            .flat_map(|w| w.plan.iter())
            .flat_map(|d| d.exercises.iter())
            .filter(|e| e.image.is_some())
            .count()
    }
}

/// Where a single exercise lives inside a specific plan.
///
/// The exercise is found by position, not by name, so two exercises sharing a
/// name on the same day are still distinct leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafAddress {
    pub plan: PlanId,
    /// The `week` value of the week block, not its position.
    pub week: u32,
    pub day: usize,
    pub exercise: usize,
}

/// ========================================
/// Images
/// ========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub mime_type: String,
    pub data: Bytes,
}

impl ImageArtifact {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    /// Decode a base64 payload as returned inline by the image backends.
    pub fn from_base64(mime_type: impl Into<String>, encoded: &str) -> anyhow::Result<Self> {
        let data = BASE64.decode(encoded.trim())?;
        Ok(Self::new(mime_type, data))
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpeg",
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Serialize for ImageArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.data_uri())
    }
}

/// One image request to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    /// `None` lets the backend pick its default framing.
    pub aspect_ratio: Option<String>,
    pub mime_type: String,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), aspect_ratio: None, mime_type: mime_type.into() }
    }

    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }
}

/// A named output format of the batch generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDescriptor {
    pub label: String,
    pub ratio: String,
}

impl BatchDescriptor {
    pub fn new(label: impl Into<String>, ratio: impl Into<String>) -> Self {
        Self { label: label.into(), ratio: ratio.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImage {
    pub image: ImageArtifact,
    pub format: String,
    pub ratio: String,
}

impl BatchImage {
    pub fn src(&self) -> String {
        self.image.data_uri()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_is_base64() {
        let img = ImageArtifact::new("image/jpeg", vec![0xff, 0xd8, 0xff]);
        assert_eq!(img.data_uri(), "data:image/jpeg;base64,/9j/");
        assert_eq!(img.extension(), "jpeg");
    }

    #[test]
    fn from_base64_rejects_garbage() {
        assert!(ImageArtifact::from_base64("image/png", "not base64 !!").is_err());
        let img = ImageArtifact::from_base64("image/png", " aGk= ").unwrap();
        assert_eq!(&img.data[..], b"hi");
    }

    #[test]
    fn exercise_serializes_image_as_data_uri_only_when_present() {
        let mut ex = Exercise {
            name: "Squat".into(),
            sets: "3".into(),
            reps: "8".into(),
            rpe: "7".into(),
            rest: "90s".into(),
            description: "Back squat".into(),
            image_query: "barbell back squat".into(),
            image: None,
        };
        let bare = serde_json::to_value(&ex).unwrap();
        assert!(bare.get("image").is_none());
        assert_eq!(bare["imageQuery"], "barbell back squat");

        ex.image = Some(ImageArtifact::new("image/png", vec![1, 2, 3]));
        let with_image = serde_json::to_value(&ex).unwrap();
        assert_eq!(with_image["image"], "data:image/png;base64,AQID");
    }
}
