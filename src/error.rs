use thiserror::Error;

pub type Result<T> = std::result::Result<T, PregelError>;

/// Everything that can go wrong during a run.
///
/// None of these is recovered from: the first error raised by any
/// participant aborts the whole run.
#[derive(Debug, Error)]
pub enum PregelError {
    /// Invalid run configuration, detected before any participant starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A vertex operation needing a worker context was called on a vertex
    /// that is not attached to one.
    #[error("vertex operation `{operation}` called without an attached worker context")]
    Detached { operation: &'static str },

    /// `next_message` was called on an empty inbox.
    #[error("vertex {vertex} has no more messages in this superstep")]
    EmptyInbox { vertex: i64 },

    /// A reader, writer, combiner or vertex program broke the engine's
    /// contract.
    #[error("contract violation: {0}")]
    Contract(String),

    /// A collaborator extension point was invoked but never implemented.
    #[error("extension point `{operation}` is not implemented")]
    Unimplemented { operation: &'static str },

    /// Participants disagree about the protocol, or a peer disappeared.
    #[error("coordination failure: {0}")]
    Coordination(String),

    /// Another participant failed and the run was torn down.
    #[error("run aborted by another participant")]
    Aborted,

    #[error("malformed input at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PregelError {
    /// Whether this error is a consequence of some other participant's
    /// failure rather than a root cause.
    pub fn is_secondary(&self) -> bool {
        matches!(self, PregelError::Aborted)
    }
}
