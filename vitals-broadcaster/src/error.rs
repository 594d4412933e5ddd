use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Subscriber limit reached ({0})")]
    SubscriberLimit(usize),

    #[error("Broadcaster not started")]
    NotStarted,

    #[error("Broadcaster already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
