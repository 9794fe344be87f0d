use crate::wire::{DayBlock, Exercise, ImageArtifact, LeafAddress, Plan, WeekBlock};
use std::sync::Arc;

/// Attach `artifact` to the exercise at `address`, producing a new snapshot.
///
/// Only the containers on the path from the root to the exercise are
/// reallocated; every other week, day and exercise is shared with `plan`.
/// If the address does not exist in `plan` (another plan, unknown week, index
/// out of range) the input snapshot is returned as is.
pub fn attach_artifact(plan: &Arc<Plan>, address: &LeafAddress, artifact: ImageArtifact) -> Arc<Plan> {
    if address.plan != plan.id {
        return Arc::clone(plan);
    }
    let Some(week_pos) = plan.weekly_plan.iter().position(|w| w.week == address.week) else {
        return Arc::clone(plan);
    };
    let week = &plan.weekly_plan[week_pos];
    let Some(day) = week.plan.get(address.day) else {
        return Arc::clone(plan);
    };
    let Some(exercise) = day.exercises.get(address.exercise) else {
        return Arc::clone(plan);
    };

    if exercise.image.as_ref() == Some(&artifact) {
        return Arc::clone(plan);
    }

    let exercise = Exercise { image: Some(artifact), ..Exercise::clone(exercise) };

    let mut exercises = day.exercises.clone();
    exercises[address.exercise] = Arc::new(exercise);
    let day = DayBlock { day: day.day.clone(), exercises };

    let mut days = week.plan.clone();
    days[address.day] = Arc::new(day);
    let week = WeekBlock { week: week.week, plan: days };

    let mut weeks = plan.weekly_plan.clone();
    weeks[week_pos] = Arc::new(week);

    Arc::new(Plan { weekly_plan: weeks, ..Plan::clone(plan) })
}
