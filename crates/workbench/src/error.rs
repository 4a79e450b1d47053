use brms_api::ApiError;
use brms_core::CoreError;

/// Errors surfaced to the user by workbench operations.
///
/// Validation variants are raised before any network call is attempted.
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("scenario title cannot be empty")]
    EmptyTitle,

    #[error("a scenario named '{title}' already exists")]
    DuplicateTitle { title: String },

    #[error("scenario not found: {id}")]
    ScenarioNotFound { id: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl WorkbenchError {
    /// True when the error was raised locally, before any request was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkbenchError::EmptyTitle
                | WorkbenchError::DuplicateTitle { .. }
                | WorkbenchError::ScenarioNotFound { .. }
        )
    }
}
