use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::errors::LeafEnrichmentFailure;
use crate::prompt::exercise_image_prompt;
use crate::provider::Provider;
use crate::state::{GenerationToken, PlanStore};
use crate::wire::{ImageArtifact, ImageRequest, LeafAddress, Plan};

/// One exercise to illustrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub address: LeafAddress,
    pub name: String,
    pub image_query: String,
}

/// Every exercise of `plan`, weeks then days then exercises, each in array order.
pub fn leaves(plan: &Plan) -> Vec<Leaf> {
    let mut out = Vec::with_capacity(plan.exercise_count());
    for week in &plan.weekly_plan {
        for (day_pos, day) in week.plan.iter().enumerate() {
            for (ex_pos, exercise) in day.exercises.iter().enumerate() {
                out.push(Leaf {
                    address: LeafAddress { plan: plan.id, week: week.week, day: day_pos, exercise: ex_pos },
                    name: exercise.name.clone(),
                    image_query: exercise.image_query.clone(),
                });
            }
        }
    }
    out
}

/// Outcome of one processed leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentEvent {
    Attached { address: LeafAddress, name: String },
    Failed { address: LeafAddress, name: String, failure: LeafEnrichmentFailure },
    /// The image arrived after the plan was superseded and was dropped.
    Discarded { address: LeafAddress, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub total: usize,
    pub visited: usize,
    pub attached: usize,
    pub failed: usize,
    pub discarded: usize,
    /// The run stopped early because a newer generation started.
    pub superseded: bool,
}

/// Walks a plan and illustrates each exercise, one request at a time.
///
/// Request N+1 is only sent after the result of request N has been merged
/// into the store. A failing leaf is logged and skipped; nothing stops the
/// walk except a newer generation taking over the store.
pub struct EnrichmentPipeline<'a> {
    provider: &'a dyn Provider,
    store: &'a PlanStore,
    mime_type: String,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(provider: &'a dyn Provider, store: &'a PlanStore, mime_type: impl Into<String>) -> Self {
        Self { provider, store, mime_type: mime_type.into() }
    }

    pub async fn run(
        &self,
        token: GenerationToken,
        plan: &Plan,
        events: UnboundedSender<EnrichmentEvent>,
    ) -> EnrichmentReport {
        let leaves = leaves(plan);
        let mut report = EnrichmentReport { total: leaves.len(), ..Default::default() };
        info!(plan = %plan.id.0, exercises = report.total, "illustrating plan");

        for leaf in leaves {
            if !self.store.is_current(token) {
                info!(plan = %plan.id.0, remaining = report.total - report.visited, "plan superseded, stopping");
                report.superseded = true;
                break;
            }
            report.visited += 1;

            let event = match self.fetch(&leaf).await {
                Ok(artifact) => {
                    if self.store.merge(&leaf.address, artifact) {
                        report.attached += 1;
                        EnrichmentEvent::Attached { address: leaf.address, name: leaf.name }
                    } else {
                        debug!(exercise = %leaf.name, "image for a stale plan dropped");
                        report.discarded += 1;
                        EnrichmentEvent::Discarded { address: leaf.address, name: leaf.name }
                    }
                }
                Err(failure) => {
                    warn!(exercise = %leaf.name, week = leaf.address.week, day = leaf.address.day, %failure, "could not illustrate exercise");
                    report.failed += 1;
                    EnrichmentEvent::Failed { address: leaf.address, name: leaf.name, failure }
                }
            };
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }

        info!(
            attached = report.attached,
            failed = report.failed,
            discarded = report.discarded,
            superseded = report.superseded,
            "illustration pass finished"
        );
        report
    }

    async fn fetch(&self, leaf: &Leaf) -> Result<ImageArtifact, LeafEnrichmentFailure> {
        let req = ImageRequest::new(exercise_image_prompt(&leaf.image_query), self.mime_type.clone());
        match self.provider.generate_images(&req).await {
            Ok(images) => images
                .into_iter()
                .find(|img| !img.is_empty())
                .ok_or(LeafEnrichmentFailure::Declined),
            Err(e) => Err(LeafEnrichmentFailure::Backend { message: format!("{e:#}") }),
        }
    }
}
