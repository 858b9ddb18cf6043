use crate::ids::CounterId;

/// Failures of a single counter operation.
///
/// Neither variant is fatal: the triggering event is abandoned, nothing is
/// broadcast, and the connection stays open.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("counter not found: {0}")]
    NotFound(CounterId),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CounterError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
