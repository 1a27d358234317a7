use thiserror::Error;

/// Validation and contract errors exposed by `solvency-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("client ID cannot be empty")]
    EmptySubjectId,
    #[error("invalid client ID format: '{value}'. Expected pattern: client-XXX (where XXX is 3 digits)")]
    InvalidSubjectId { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' cannot be empty")]
    EmptyField { field: &'static str },

    #[error("credit score {value} is outside 0..=1000")]
    ScoreOutOfRange { value: i64 },
}

/// Configuration errors raised while building a gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable '{name}' has invalid value '{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
    #[error("cache TTL must be greater than zero")]
    ZeroTtl,
    #[error("upstream timeout must be greater than zero")]
    ZeroTimeout,
    #[error("metrics registry rejected the gateway collectors: {reason}")]
    Metrics { reason: String },
}
