#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GameError {
    #[error("invalid location (expected: 0-8, found: {0})")]
    InvalidLocation(usize),
    #[error("can't make turn on a finished game")]
    GameIsFinished,
}
