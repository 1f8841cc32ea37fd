use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `echoquill`.
///
/// Each subsystem defines its own error enum. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum EchoquillError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── OAuth / login ───────────────────────────────────────────────────
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    // ── Token exchange proxy ────────────────────────────────────────────
    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),

    // ── Chat completion service ─────────────────────────────────────────
    #[error("completion: {0}")]
    Completion(#[from] CompletionError),

    // ── Suggestion pipeline ─────────────────────────────────────────────
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    // ── Persistence ─────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Cooperative cancellation ────────────────────────────────────────
    #[error("operation cancelled")]
    Cancelled,

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── OAuth / login errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
    /// Callback state did not match the pending handshake, or no fresh
    /// handshake exists. Treated identically so a forged callback learns
    /// nothing about slot contents.
    #[error("authorization state mismatch or expired handshake; restart login")]
    InvalidState,

    #[error("authorization callback carried no code")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(#[from] ExchangeError),
}

// ─── Token exchange errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("exchange rejected: {0}")]
    BadRequest(String),

    #[error("token endpoint returned {status}: {body}")]
    UpstreamToken { status: u16, body: String },

    #[error("profile endpoint returned {status}: {body}")]
    UpstreamProfile { status: u16, body: String },

    #[error("exchange transport: {0}")]
    Transport(String),
}

// ─── Completion service errors ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion service returned no content")]
    NoCompletion,

    #[error("persona payload malformed: {0}")]
    MalformedPersona(String),

    #[error("query list payload malformed: {0}")]
    MalformedQueryList(String),

    #[error("reply payload malformed: {0}")]
    MalformedReply(String),

    #[error("completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion request timed out")]
    Timeout,

    #[error("completion transport: {0}")]
    Transport(String),
}

// ─── Pipeline errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("suggestion {id} is {from}; cannot move to {to}")]
    IllegalTransition { id: String, from: String, to: String },

    #[error("suggestion not found: {0}")]
    NotFound(String),
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open failed: {0}")]
    Open(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, EchoquillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = EchoquillError::Config(ConfigError::Validation("missing client_id".into()));
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn invalid_state_mentions_restart() {
        let err = EchoquillError::Auth(AuthError::InvalidState);
        assert!(err.to_string().contains("restart login"));
    }

    #[test]
    fn upstream_token_carries_status() {
        let err = EchoquillError::Exchange(ExchangeError::UpstreamToken {
            status: 401,
            body: "invalid_client".into(),
        });
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid_client"));
    }

    #[test]
    fn illegal_transition_names_both_states() {
        let err = EchoquillError::Pipeline(PipelineError::IllegalTransition {
            id: "s-1".into(),
            from: "approved".into(),
            to: "rejected".into(),
        });
        assert!(err.to_string().contains("approved"));
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: EchoquillError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }

    #[test]
    fn sqlx_error_maps_to_query() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Query(_)));
    }
}
