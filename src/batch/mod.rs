use futures::future::join_all;
use tracing::{info, warn};

use crate::errors::FlowError;
use crate::prompt::ad_format_prompt;
use crate::provider::Provider;
use crate::wire::{BatchDescriptor, BatchImage, ImageRequest};

/// Fires one image request per descriptor at once and joins them by index.
///
/// All-or-nothing: the first descriptor (in input order) whose request failed
/// or came back empty fails the whole batch.
pub async fn generate_batch(
    provider: &dyn Provider,
    base_prompt: &str,
    descriptors: &[BatchDescriptor],
    mime_type: &str,
) -> Result<Vec<BatchImage>, FlowError> {
    info!(formats = descriptors.len(), "requesting image batch");

    let requests: Vec<ImageRequest> = descriptors
        .iter()
        .map(|d| ImageRequest::new(ad_format_prompt(base_prompt, d), mime_type).with_aspect_ratio(d.ratio.clone()))
        .collect();
    let results = join_all(requests.iter().map(|req| provider.generate_images(req))).await;

    let mut out = Vec::with_capacity(descriptors.len());
    for (descriptor, result) in descriptors.iter().zip(results) {
        let images = result.map_err(|e| {
            warn!(format = %descriptor.label, error = %format!("{e:#}"), "image request failed");
            FlowError::BackendRequestFailure { message: format!("{} ({}): {e:#}", descriptor.label, descriptor.ratio) }
        })?;
        let image = images.into_iter().find(|img| !img.is_empty()).ok_or_else(|| {
            warn!(format = %descriptor.label, "no image returned");
            FlowError::BatchPartialFailure { label: descriptor.label.clone() }
        })?;
        out.push(BatchImage { image, format: descriptor.label.clone(), ratio: descriptor.ratio.clone() });
    }
    Ok(out)
}
