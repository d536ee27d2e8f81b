pub mod board;
pub mod error;
pub mod state;

pub use board::{Board, Location, Mark};
pub use error::GameError;
pub use state::GameOutcome;
