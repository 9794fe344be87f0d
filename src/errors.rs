use thiserror::Error;

/// Top-level failures of the plan and ad flows. Each one ends the flow and is
/// turned into a user-visible message by [`user_message`].
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("backend request failed: {message}")]
    BackendRequestFailure { message: String },

    /// `raw` is the untouched model text, kept for diagnostics only.
    #[error("model response is not a valid plan: {reason}")]
    MalformedResponse { raw: String, reason: String },

    #[error("no image was generated for format {label}")]
    BatchPartialFailure { label: String },

    /// A newer plan request took over the store before this one finished.
    #[error("plan request superseded by a newer one")]
    Superseded,
}

impl FlowError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FlowError::InvalidInput { field, reason: reason.into() }
    }

    pub fn backend(err: &anyhow::Error) -> Self {
        FlowError::BackendRequestFailure { message: format!("{err:#}") }
    }
}

/// Why a single exercise stayed without an image. Recorded, never surfaced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeafEnrichmentFailure {
    /// The backend answered but the answer carried no image payload.
    #[error("backend returned no image")]
    Declined,
    #[error("backend error: {message}")]
    Backend { message: String },
}

/// Text shown to the user for a failed flow. Never includes raw model output.
pub fn user_message(err: &FlowError) -> String {
    match err {
        FlowError::InvalidInput { reason, .. } => reason.clone(),
        FlowError::BackendRequestFailure { message } => {
            format!("There was an error contacting the model: {message}. Please try again.")
        }
        FlowError::MalformedResponse { .. } => {
            "The model returned a plan we could not read. Please try generating it again.".to_string()
        }
        FlowError::BatchPartialFailure { label } => {
            format!("There was an error generating the images: no image was produced for the {label} format. Please try again.")
        }
        FlowError::Superseded => "A newer plan request replaced this one before it finished.".to_string(),
    }
}
