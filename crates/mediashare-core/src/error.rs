use thiserror::Error;

/// Failure while reposting one inbound message.
#[derive(Debug, Error)]
pub enum RepostError {
    /// The archiver failed to persist the media.
    #[error("archiving failed: {0}")]
    Archive(String),

    /// The outbound post could not be delivered.
    #[error("sending {kind} post to {destination} failed: {message}")]
    Send {
        kind: &'static str,
        destination: i64,
        message: String,
    },

    /// The post was built but no repost channel is configured.
    #[error("no repost destination configured for archived message {0}")]
    NoDestination(i64),
}

impl RepostError {
    pub(crate) fn archive(err: anyhow::Error) -> Self {
        Self::Archive(format!("{:#}", err))
    }

    pub(crate) fn send(kind: &'static str, destination: i64, err: anyhow::Error) -> Self {
        Self::Send {
            kind,
            destination,
            message: format!("{:#}", err),
        }
    }
}
