use thiserror::Error;

/// Errors surfaced by the object pool core.
///
/// Steady-state business outcomes (a session no longer matching, a claim
/// call returning nothing) are never represented here - they are encoded in
/// the `bool`/`Vec<String>` return values the scripts already produce.
/// `PoolError` exists for the conditions a caller cannot route around by
/// just trying again or reading a `false`.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The underlying store connection failed or timed out. `Claim` and the
    /// pool client retry these forever with fixed back-off - this
    /// variant only ever escapes one-shot calls that opt out of retrying.
    #[error("store transport error: {0}")]
    Transport(#[from] anyhow::Error),

    /// A script returned a shape the client didn't expect (malformed JSON,
    /// wrong arity). This is a programmer error in the adapter, not a
    /// runtime condition callers should retry past.
    #[error("malformed script response: {0}")]
    MalformedResponse(String),

    /// A processor descriptor named a pool that was never registered.
    #[error("pool '{0}' is not registered")]
    UnknownPool(String),
}

/// Classifies an error for the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Worth retrying forever with back-off (network blip, connection reset).
    Transient,
    /// Retrying will not help (bad arguments, logic bug surfaced as an error).
    Definite,
}

/// Lets retry loops decide, without a big match on every possible transport
/// error type, whether to keep trying.
pub trait Categorizable {
    fn category(&self) -> ErrorCategory;
}

impl Categorizable for PoolError {
    fn category(&self) -> ErrorCategory {
        match self {
            PoolError::Transport(_) => ErrorCategory::Transient,
            PoolError::MalformedResponse(_) | PoolError::UnknownPool(_) => {
                ErrorCategory::Definite
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
