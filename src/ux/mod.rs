use colored::Colorize;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;

use crate::enrich::{EnrichmentEvent, EnrichmentReport};
use crate::wire::{BatchImage, Exercise, Plan};

fn image_status(ex: &Exercise) -> String {
    match &ex.image {
        Some(img) => format!("[image ready, {}]", format_size(img.len(), BINARY)).green().to_string(),
        None => "[image pending]".dimmed().to_string(),
    }
}

/// Render the plan as it currently stands. Exercises without an image show a
/// pending marker.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", plan.title.bold());
    let _ = writeln!(out, "{}\n", plan.introduction);

    for week in &plan.weekly_plan {
        let _ = writeln!(out, "{}", format!("=== Week {} ===", week.week).cyan().bold());
        for day in &week.plan {
            let _ = writeln!(out, "  {}", day.day.yellow().bold());
            for ex in &day.exercises {
                let _ = writeln!(
                    out,
                    "    • {}: {} x {} @ RPE {}, rest {}  {}",
                    ex.name.bold(),
                    ex.sets,
                    ex.reps,
                    ex.rpe,
                    ex.rest,
                    image_status(ex)
                );
                let _ = writeln!(out, "      {}", ex.description);
            }
        }
        out.push('\n');
    }

    let n = &plan.nutrition_advice;
    let _ = writeln!(out, "{}", "Nutrition".magenta().bold());
    let _ = writeln!(out, "  Protein:   {}", n.protein);
    let _ = writeln!(out, "  Hydration: {}", n.hydration);
    let _ = writeln!(out, "  Sleep:     {}", n.sleep);
    let _ = writeln!(out, "\n{}", plan.final_message.italic());
    out
}

pub fn render_batch(title: &str, images: &[BatchImage]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", format!("Ad images for \"{}\"", title.trim()).bold());
    for img in images {
        let src = img.src();
        let preview: String = src.chars().take(48).collect();
        let _ = writeln!(
            out,
            "  {} ({})  {}  {}…",
            img.format.green().bold(),
            img.ratio,
            format_size(img.image.len(), BINARY),
            preview.dimmed()
        );
    }
    out
}

pub fn render_report(report: &EnrichmentReport) -> String {
    let mut line = format!(
        "Illustrated {}/{} exercises ({} failed)",
        report.attached, report.total, report.failed
    );
    if report.superseded {
        line.push_str(", stopped early: a newer plan was requested");
    }
    line
}

/// Progress bar for the illustration pass; hidden when `enabled` is false.
pub fn enrichment_progress(total: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} illustrating [{bar:30}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Advance the bar for one processed exercise; `ready` is the number of
/// illustrated exercises in the latest snapshot.
pub fn track(bar: &ProgressBar, event: &EnrichmentEvent, ready: usize) {
    match event {
        EnrichmentEvent::Attached { name, .. } => bar.set_message(format!("{ready} ready, last: {name}")),
        EnrichmentEvent::Failed { name, .. } => bar.set_message(format!("{ready} ready, no image for {name}")),
        EnrichmentEvent::Discarded { .. } => {}
    }
    bar.inc(1);
}
