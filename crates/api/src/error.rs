/// Shown to rule authors when a rule yields several result rows.
pub const MULTIPLE_RESULTS_MESSAGE: &str = "the rule returned multiple results; \
update it so that it produces a single result object (for example, use a \
'first' hit policy on decision tables) and run it again";

/// All errors that can be returned by a [`RulesApi`](crate::RulesApi)
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body was not the JSON we expected.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A decision result was an array. This is a rule-authoring error, not a
    /// transient fault, and is never retried.
    #[error("{}", MULTIPLE_RESULTS_MESSAGE)]
    MultipleResults,

    /// A decision result was neither an object nor an array.
    #[error("unexpected decision result: expected an object, got {kind}")]
    UnexpectedResult { kind: String },

    /// No scenario with the given id exists.
    #[error("scenario not found: {id}")]
    NotFound { id: String },

    /// The blocking HTTP task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(String),
}

impl ApiError {
    /// True for failures caused by the data itself rather than the transport.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            ApiError::MultipleResults | ApiError::UnexpectedResult { .. }
        )
    }
}
