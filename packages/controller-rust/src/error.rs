//! Controller error kinds and their structured-response rendering.

/// Errors surfaced by controller operations.
///
/// Every fallible request handler renders one of these into a
/// `{success: false, error}` structured response; the variants map to
/// the controller's error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Unknown export ID, instance, or transfer.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed input: non-object payload, non-positive index, same
    /// source and target, and similar.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// An awaited resource did not become available within its deadline.
    #[error("not ready: {0}")]
    NotReady(String),

    /// An instance bridge reported failure for a sub-operation.
    #[error("{0}")]
    RemoteRejected(String),

    /// A watchdog or wait deadline elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Attempted state transition from a terminal state. Ignored by the
    /// orchestrator; logged.
    #[error("transfer {transfer_id} is already {status}")]
    Conflict {
        transfer_id: String,
        status: &'static str,
    },

    /// Persistence read/write failure.
    #[error("storage I/O failed: {0}")]
    Io(#[from] anyhow::Error),

    /// Subscription requested `logs` without the required permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl ControllerError {
    /// The error string placed in structured responses.
    #[must_use]
    pub fn response_message(&self) -> String {
        match self {
            // Remote rejections pass the instance's reason through
            // verbatim so callers see the original failure first.
            Self::RemoteRejected(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}
