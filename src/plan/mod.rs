use crate::errors::FlowError;
use crate::wire::{Plan, PlanId};
use std::collections::HashSet;
use tracing::debug;

/// Remove a Markdown code fence around the model output, if there is one.
/// Handles a `json` fence, a fence with any other (or no) language tag, and
/// unfenced text, which is returned trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // `json` is the tag only when whitespace or the document follows it;
    // `jsonc`, `json5` and the like take the generic path.
    let json_body = rest
        .strip_prefix("json")
        .filter(|after| after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '{' || c == '['));
    let body = match json_body {
        Some(after_tag) => after_tag,
        // Generic fence: anything before the first newline that is not the
        // start of the document is a language tag.
        None => match rest.split_once('\n') {
            Some((tag, after)) if !tag.trim_start().starts_with(['{', '[']) => after,
            _ => rest,
        },
    };

    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the raw model text into a [`Plan`]. All-or-nothing: any decode or
/// shape problem yields [`FlowError::MalformedResponse`].
pub fn parse_plan(raw: &str) -> Result<Plan, FlowError> {
    let malformed = |reason: String| {
        debug!(%reason, raw, "discarding malformed plan response");
        FlowError::MalformedResponse { raw: raw.to_string(), reason }
    };

    let mut plan: Plan = serde_json::from_str(strip_code_fence(raw)).map_err(|e| malformed(e.to_string()))?;
    validate(&plan).map_err(malformed)?;

    plan.id = PlanId::new();
    Ok(plan)
}

fn validate(plan: &Plan) -> Result<(), String> {
    let mut seen = HashSet::new();
    for week in &plan.weekly_plan {
        if week.week == 0 {
            return Err("week index must be a positive integer".to_string());
        }
        if !seen.insert(week.week) {
            return Err(format!("week {} appears more than once", week.week));
        }
    }
    Ok(())
}
