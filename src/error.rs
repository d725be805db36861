use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("invalid url: {0}")]
    InvalidUri(String),
    #[error("invalid playlist data: {0}")]
    Parse(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("storage failed: {0}")]
    Storage(String),
}
