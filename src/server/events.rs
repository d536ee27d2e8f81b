use std::net::SocketAddr;

use tokio::sync::broadcast;

use crate::game::{GameOutcome, Location, Mark};

/// Connection and move events, observable by anything interested in the
/// game's progress: the binary logs them, tests subscribe to them, and a
/// UI could render them.
#[derive(Clone, Debug)]
pub enum ServerEvent {
    Listening { addr: SocketAddr },
    PlayerConnected { mark: Mark, addr: SocketAddr },
    MoveApplied { mark: Mark, location: Location },
    MoveRejected { mark: Mark, location: Location },
    GameFinished { outcome: GameOutcome },
    SessionClosed { mark: Mark },
    SessionFailed { mark: Mark, reason: String },
}

/// Fan-out for [`ServerEvent`]s. Every emitted event is traced and
/// broadcast to all current subscribers.
#[derive(Clone, Debug)]
pub struct EventLog {
    sender: broadcast::Sender<ServerEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ServerEvent) {
        match &event {
            ServerEvent::Listening { addr } => {
                tracing::info!(%addr, "server awaiting connections")
            }
            ServerEvent::PlayerConnected { mark, addr } => {
                tracing::info!(%mark, %addr, "player connected")
            }
            ServerEvent::MoveApplied { mark, location } => {
                tracing::info!(%mark, %location, "move applied")
            }
            ServerEvent::MoveRejected { mark, location } => {
                tracing::debug!(%mark, %location, "move rejected")
            }
            ServerEvent::GameFinished { outcome } => {
                tracing::info!(%outcome, "game finished")
            }
            ServerEvent::SessionClosed { mark } => {
                tracing::info!(%mark, "session closed")
            }
            ServerEvent::SessionFailed { mark, reason } => {
                tracing::warn!(%mark, %reason, "session failed")
            }
        }
        // send only fails when there are no subscribers, which is fine
        let _ = self.sender.send(event);
    }
}
