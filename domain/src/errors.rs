use thiserror::Error;

/// Why the language model produced no usable answer.
///
/// Each variant maps to a fixed policy in the answer service: `NotConfigured`
/// is reported to the user as-is, everything else falls back to the offline
/// answer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LlmError {
    #[error("no API key configured (set {env_var})")]
    NotConfigured { env_var: &'static str },

    /// Network failure, timeout, or a body that could not be read.
    #[error("request to {provider} failed: {message}")]
    Transport { provider: String, message: String },

    /// The provider answered with a non-success status (quota, rate limit, auth).
    #[error("{provider} returned HTTP {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },
}

impl LlmError {
    /// Transient failures are worth retrying later; configuration problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::NotConfigured { .. } => false,
            LlmError::Provider { status, .. } => *status == 429 || *status >= 500,
            LlmError::Transport { .. } | LlmError::EmptyResponse { .. } => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no vector index found at {path}")]
    NotFound { path: String },

    #[error(
        "index at {path} was built with embedding model '{stored}', but the configured model is '{configured}'"
    )]
    ModelMismatch {
        path: String,
        stored: String,
        configured: String,
    },

    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unsupported index format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}
