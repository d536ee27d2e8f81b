use crate::game::GameError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed client request: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("connection closed by client")]
    ConnectionClosed,
    #[error("game aborted: the other session is gone")]
    GameAborted,
    #[error(transparent)]
    Game(#[from] GameError),
}
