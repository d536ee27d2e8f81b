use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::game::{GameError, GameOutcome, Location, Mark};
use crate::server::error::{ServerError, ServerResult};
use crate::server::events::{EventLog, ServerEvent};
use crate::server::turn_gate::{MoveOutcome, OpponentLatch, TurnGate};
use crate::wire::{self, ClientRequest, ServerMessage};

/// What one session tells the other about. Delivered over a channel, so
/// the sessions never poll each other's state.
#[derive(Clone, Copy, Debug)]
pub enum PeerNotice {
    Moved { location: Location },
    Finished { outcome: GameOutcome },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum SessionState {
    Connecting,
    AwaitingOpponent,
    Active,
    Finished,
}

/// What the active loop should do after handling one client request.
enum Step {
    Continue,
    /// The game ended on the opponent's move; stop reading requests and
    /// wait for the terminal notice.
    StopReading,
    /// This session's own move ended the game.
    Done,
}

/// Drives one connected player: sends the mark assignment, holds Mark A
/// in `AwaitingOpponent` until Mark B arrives, then loops over move
/// requests and opponent notices until the game reaches a terminal
/// outcome or the connection fails.
pub struct PlayerSession {
    mark: Mark,
    state: SessionState,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    gate: Arc<TurnGate>,
    latch: Arc<OpponentLatch>,
    peer: UnboundedSender<PeerNotice>,
    notices: UnboundedReceiver<PeerNotice>,
    events: EventLog,
    cancel: CancellationToken,
}

impl PlayerSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: TcpStream,
        mark: Mark,
        gate: Arc<TurnGate>,
        latch: Arc<OpponentLatch>,
        peer: UnboundedSender<PeerNotice>,
        notices: UnboundedReceiver<PeerNotice>,
        events: EventLog,
        cancel: CancellationToken,
    ) -> Self {
        let (read_half, writer) = stream.into_split();
        Self {
            mark,
            state: SessionState::Connecting,
            lines: BufReader::new(read_half).lines(),
            writer,
            gate,
            latch,
            peer,
            notices,
            events,
            cancel,
        }
    }

    /// Runs the session to completion. On failure the shared game state is
    /// torn down so the peer session cannot stay blocked forever.
    pub async fn run(mut self) -> ServerResult<()> {
        let result = self.play().await;
        self.set_state(SessionState::Finished);
        match &result {
            Ok(()) => self.events.emit(ServerEvent::SessionClosed { mark: self.mark }),
            Err(err) => {
                self.gate.abort().await;
                self.cancel.cancel();
                self.events.emit(ServerEvent::SessionFailed {
                    mark: self.mark,
                    reason: err.to_string(),
                });
            }
        }
        result
    }

    async fn play(&mut self) -> ServerResult<()> {
        self.send(ServerMessage::assign(self.mark)).await?;

        if self.mark == Mark::A {
            self.set_state(SessionState::AwaitingOpponent);
            tokio::select! {
                _ = self.latch.wait() => {}
                _ = self.cancel.cancelled() => return Err(ServerError::GameAborted),
            }
            self.send(ServerMessage::opponent_connected()).await?;
        }

        self.set_state(SessionState::Active);
        self.active_loop().await
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(mark = %self.mark, from = ?self.state, to = ?state, "session state change");
        self.state = state;
    }

    async fn active_loop(&mut self) -> ServerResult<()> {
        let mut take_requests = true;
        loop {
            tokio::select! {
                notice = self.notices.recv() => match notice {
                    Some(PeerNotice::Moved { location }) => {
                        self.send(ServerMessage::OpponentMoved { location }).await?;
                    }
                    Some(PeerNotice::Finished { outcome }) => {
                        self.send(ServerMessage::game_over(outcome)).await?;
                        return Ok(());
                    }
                    // the peer session is gone without finishing the game
                    None => return Err(ServerError::GameAborted),
                },
                line = self.lines.next_line(), if take_requests => match line? {
                    Some(line) => match self.handle_request(wire::decode_request(&line)?).await? {
                        Step::Continue => {}
                        Step::StopReading => take_requests = false,
                        Step::Done => return Ok(()),
                    },
                    None => return Err(ServerError::ConnectionClosed),
                },
                _ = self.cancel.cancelled() => return Err(ServerError::GameAborted),
            }
        }
    }

    async fn handle_request(&mut self, request: ClientRequest) -> ServerResult<Step> {
        let ClientRequest::Move { location } = request;
        match self.gate.attempt_move(location, self.mark).await {
            Ok(MoveOutcome::Accepted {
                location,
                mark,
                outcome,
            }) => {
                self.events.emit(ServerEvent::MoveApplied { mark, location });
                self.send(ServerMessage::MoveAccepted { location }).await?;
                // a vanished peer surfaces on the notice channel, not here
                let _ = self.peer.send(PeerNotice::Moved { location });

                if outcome.is_terminal() {
                    self.events.emit(ServerEvent::GameFinished { outcome });
                    self.send(ServerMessage::game_over(outcome)).await?;
                    let _ = self.peer.send(PeerNotice::Finished { outcome });
                    return Ok(Step::Done);
                }
                Ok(Step::Continue)
            }
            Ok(MoveOutcome::Rejected) => {
                self.events.emit(ServerEvent::MoveRejected {
                    mark: self.mark,
                    location,
                });
                self.send(ServerMessage::move_rejected()).await?;
                Ok(Step::Continue)
            }
            // the game ended while this request was waiting for its turn;
            // the terminal notice from the peer is already on its way
            Err(ServerError::Game(GameError::GameIsFinished)) => Ok(Step::StopReading),
            Err(err) => Err(err),
        }
    }

    async fn send(&mut self, message: ServerMessage) -> ServerResult<()> {
        wire::send_message(&mut self.writer, &message).await?;
        Ok(())
    }
}
