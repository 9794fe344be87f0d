use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::batch::generate_batch;
use crate::enrich::{EnrichmentEvent, EnrichmentPipeline, EnrichmentReport};
use crate::errors::FlowError;
use crate::plan::parse_plan;
use crate::prompt::{ad_base_prompt, ad_formats, plan_prompt, AdRequest, FitnessProfile};
use crate::provider::Provider;
use crate::state::{GenerationToken, PlanStore};
use crate::wire::{BatchImage, Plan};

/// A plan that was just published, together with the raw model text it came from.
pub struct GeneratedPlan {
    pub token: GenerationToken,
    pub plan: Arc<Plan>,
    pub raw: String,
}

/// Validate the profile, ask for a plan and publish it without images.
///
/// Starting the generation supersedes whatever plan the store held before,
/// including any illustration pass still running against it.
pub async fn generate_plan(
    provider: &dyn Provider,
    store: &PlanStore,
    profile: &FitnessProfile,
) -> Result<GeneratedPlan, FlowError> {
    let vitals = profile.validate()?;
    let token = store.begin_generation();

    let raw = provider.generate_text(&plan_prompt(profile, &vitals)).await.map_err(|e| {
        warn!(error = %format!("{e:#}"), "plan request failed");
        FlowError::backend(&e)
    })?;
    let plan = parse_plan(&raw)?;
    let plan_id = plan.id;
    info!(plan = %plan.id.0, title = %plan.title, weeks = plan.weekly_plan.len(), exercises = plan.exercise_count(), "plan parsed");

    // A newer generation started while we waited; its plan wins.
    let plan = store.install(token, plan).ok_or_else(|| {
        info!(plan = %plan_id.0, "plan dropped, a newer request took over");
        FlowError::Superseded
    })?;
    Ok(GeneratedPlan { token, plan, raw })
}

pub async fn enrich_plan(
    provider: &dyn Provider,
    store: &PlanStore,
    generated: &GeneratedPlan,
    mime_type: &str,
    events: UnboundedSender<EnrichmentEvent>,
) -> EnrichmentReport {
    EnrichmentPipeline::new(provider, store, mime_type).run(generated.token, &generated.plan, events).await
}

pub async fn generate_ads(
    provider: &dyn Provider,
    request: &AdRequest,
    mime_type: &str,
) -> Result<Vec<BatchImage>, FlowError> {
    request.validate()?;
    generate_batch(provider, &ad_base_prompt(request), &ad_formats(), mime_type).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::tests::SAMPLE_PLAN;
    use crate::prompt::tests::profile;
    use crate::prompt::VisualStyle;
    use crate::provider::mock::{ImageScript, ScriptedProvider};
    use crate::ux::render_plan;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn plan_end_to_end_with_partial_illustrations() {
        colored::control::set_override(false);
        let provider = ScriptedProvider::new()
            .with_text(format!("```json\n{SAMPLE_PLAN}\n```"))
            .on_image("push up", ImageScript::Fail);
        let store = PlanStore::new();
        let mut rx_state = store.subscribe();

        let generated = generate_plan(&provider, &store, &profile()).await.unwrap();
        assert!(!generated.plan.title.is_empty());
        assert!(!generated.plan.weekly_plan.is_empty());
        assert!(rx_state.has_changed().unwrap());
        let _ = rx_state.borrow_and_update();

        let initial = render_plan(&generated.plan);
        assert_eq!(initial.matches("image pending").count(), 5);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = enrich_plan(&provider, &store, &generated, "image/jpeg", tx).await;
        assert_eq!(report.attached, 4);
        assert_eq!(report.failed, 1);
        while rx.recv().await.is_some() {}

        assert!(rx_state.has_changed().unwrap());
        let final_plan = store.snapshot().unwrap();
        let rendered = render_plan(&final_plan);
        assert_eq!(rendered.matches("image pending").count(), 1);
        assert_eq!(rendered.matches("image ready").count(), 4);
        let push_up = rendered.lines().find(|l| l.contains("Push-up")).unwrap();
        assert!(push_up.contains("image pending"));
    }

    #[tokio::test]
    async fn invalid_profile_sends_nothing() {
        let provider = ScriptedProvider::new().with_text(SAMPLE_PLAN);
        let store = PlanStore::new();
        let bad = FitnessProfile { height_cm: None, ..profile() };

        let err = generate_plan(&provider, &store, &bad).await.err().unwrap();
        assert!(matches!(err, FlowError::InvalidInput { field: "height_cm", .. }));
        assert_eq!(provider.text_calls(), 0);
    }

    #[tokio::test]
    async fn backend_failure_produces_no_plan() {
        let provider = ScriptedProvider::new().with_text_error("503 overloaded");
        let store = PlanStore::new();

        let err = generate_plan(&provider, &store, &profile()).await.err().unwrap();
        match err {
            FlowError::BackendRequestFailure { message } => assert!(message.contains("503")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn malformed_plan_keeps_raw_for_diagnostics() {
        let provider = ScriptedProvider::new().with_text("Sorry, I can't help with that.");
        let store = PlanStore::new();

        match generate_plan(&provider, &store, &profile()).await.err().unwrap() {
            FlowError::MalformedResponse { raw, .. } => assert_eq!(raw, "Sorry, I can't help with that."),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.snapshot().is_none());
        assert!(provider.image_prompts().is_empty());
    }

    #[tokio::test]
    async fn new_generation_replaces_previous_progress() {
        let provider = ScriptedProvider::new().with_text(SAMPLE_PLAN);
        let store = PlanStore::new();

        let first = generate_plan(&provider, &store, &profile()).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        enrich_plan(&provider, &store, &first, "image/jpeg", tx).await;
        assert_eq!(store.snapshot().unwrap().enriched_count(), 5);

        let second = generate_plan(&provider, &store, &profile()).await.unwrap();
        assert_ne!(first.plan.id, second.plan.id);
        assert_eq!(store.snapshot().unwrap().enriched_count(), 0);
    }

    #[tokio::test]
    async fn overlapping_requests_keep_only_the_newest_plan() {
        let provider = ScriptedProvider::new().with_text(SAMPLE_PLAN);
        let store = PlanStore::new();

        // both requests are in flight before either answer arrives
        let (older_profile, newer_profile) = (profile(), profile());
        let (older, newer) = tokio::join!(
            generate_plan(&provider, &store, &older_profile),
            generate_plan(&provider, &store, &newer_profile)
        );

        assert!(matches!(older, Err(FlowError::Superseded)));
        let newer = newer.unwrap();
        assert!(Arc::ptr_eq(&store.snapshot().unwrap(), &newer.plan));
        assert_eq!(provider.text_calls(), 2);
    }

    #[tokio::test]
    async fn ads_blank_title_is_rejected_before_requests() {
        let provider = ScriptedProvider::new();
        let req = AdRequest { title: "".into(), style: VisualStyle::Realistic, add_text: false };
        let err = generate_ads(&provider, &req, "image/jpeg").await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput { field: "title", .. }));
        assert!(provider.image_prompts().is_empty());
    }

    #[tokio::test]
    async fn ads_use_base_prompt_for_every_format() {
        let provider = ScriptedProvider::new();
        let req = AdRequest { title: "EcoFly".into(), style: VisualStyle::Minimalist, add_text: true };
        let images = generate_ads(&provider, &req, "image/jpeg").await.unwrap();
        assert_eq!(images.len(), 3);
        for prompt in provider.image_prompts() {
            assert!(prompt.contains("\"EcoFly\""));
            assert!(prompt.contains("minimalist"));
        }
    }
}
