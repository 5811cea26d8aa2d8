use thiserror::Error;

/// Input rejected before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("missing task id")]
    MissingId,

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Outcome of the identity gate when it refuses a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("{email} is not on the allow list")]
    NotAllowed { email: String },
}

/// Failure of a lifecycle mutation. Neither variant is fatal to the caller;
/// the task is left as it was.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("storage write failed: {0:#}")]
    Storage(anyhow::Error),
}
