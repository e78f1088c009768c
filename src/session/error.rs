use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Token fetch failed: {0}")]
    TokenFetchFailed(String),

    #[error("Join failed: {0}")]
    JoinFailed(String),

    #[error("Microphone toggle failed: {0}")]
    MicrophoneToggleFailed(String),

    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),

    #[error("Connection attempt {0} was superseded")]
    Abandoned(u64),

    #[error("Session has been shut down")]
    Disposed,
}
