use thiserror::Error;

/// Failure reported by the game backend collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected by backend: {0}")]
    Rejected(String),
    #[error("client is not logged in")]
    NotLoggedIn,
}

#[derive(Debug, Error)]
pub enum BotError {
    /// Transient I/O from the backend. Not handled by the engine; the driver retries.
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("not connected, please wait")]
    NotConnected,
    /// Fatal: the session must end.
    #[error("version mismatch: running {local}, latest is {remote}; please update")]
    VersionMismatch { local: u32, remote: u32 },
    #[error("action task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BotError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. })
    }
}

pub type Result<T, E = BotError> = std::result::Result<T, E>;
