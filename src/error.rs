use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("server index {index} is out of range ({len} servers)")]
    ServerOutOfRange { index: usize, len: usize },

    #[error("server \"{0}\" did not answer the latency probe")]
    ServerUnreachable(String),

    #[error("cannot change server while a test is running")]
    RunInProgress,

    #[error("a test is already running")]
    AlreadyRunning,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("server list error: {0}")]
    ServerList(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
