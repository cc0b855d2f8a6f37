use thiserror::Error;

/// Errors surfaced by the dissemination engine.
///
/// Message loss is not represented here: a discarded message is an expected
/// outcome of the loss model and only shows up in the link counters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DisseminationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("protocol mode `{0}` has no implementation")]
    ProtocolModeUnimplemented(String),

    #[error("discard rate is undefined before any message attempt")]
    DivisionUndefined,

    #[error("exchange task faulted: {0}")]
    RuntimeFault(String),

    #[error("malformed run summary: {0}")]
    MalformedSummary(String),
}

impl From<tokio::task::JoinError> for DisseminationError {
    fn from(err: tokio::task::JoinError) -> Self {
        DisseminationError::RuntimeFault(err.to_string())
    }
}

pub type Result<T, E = DisseminationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_mode() {
        let err = DisseminationError::ProtocolModeUnimplemented("gossip-shout".to_owned());
        assert_eq!(
            err.to_string(),
            "protocol mode `gossip-shout` has no implementation"
        );
    }

    #[tokio::test]
    async fn panicked_task_becomes_runtime_fault() {
        let handle = tokio::spawn(async { panic!("boom") });
        let err: DisseminationError = handle.await.unwrap_err().into();
        assert!(matches!(err, DisseminationError::RuntimeFault(_)));
    }
}
