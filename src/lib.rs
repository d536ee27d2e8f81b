pub mod game;
pub mod server;
pub mod wire;
