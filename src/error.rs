use thiserror::Error;

/// Everything that can send the simulator to a non-zero exit.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("profile not found: {path}")]
    ProfileNotFound { path: String },

    #[error("malformed profile at line {line}: {reason}")]
    ProfileMalformed { line: usize, reason: String },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SimError {
    /// Every error path exits 1: a profile/argument problem and an
    /// internal invariant break are both reported the same way at the
    /// process boundary, distinguished only by the message on stderr.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
