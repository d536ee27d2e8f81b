pub mod error;
pub mod events;
pub mod session;
pub mod turn_gate;

pub use error::{ServerError, ServerResult};
pub use events::{EventLog, ServerEvent};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::game::Mark;
use session::{PeerNotice, PlayerSession};
use turn_gate::{OpponentLatch, TurnGate};

/// Hosts exactly one game for its lifetime: accepts two connections in
/// order (the first is unconditionally Mark A, the second Mark B), wires
/// both sessions to one shared [`TurnGate`], and runs the game to a
/// terminal outcome. All game correctness lives in the gate, the board
/// and the sessions; this is wiring only.
pub struct GameServer {
    listener: TcpListener,
    events: EventLog,
    cancel: CancellationToken,
}

impl GameServer {
    /// Binds the listening socket. Failure here is fatal to the whole
    /// process: there is no game without a listener.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            events: EventLog::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Subscribes to the stream of connection and move events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Cancelling this token shuts the game down: pending accepts stop
    /// and both sessions wake out of any suspended wait.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(self) -> ServerResult<()> {
        self.events.emit(ServerEvent::Listening {
            addr: self.local_addr()?,
        });

        let gate = Arc::new(TurnGate::new());
        let latch = Arc::new(OpponentLatch::new());
        let (to_second, from_first) = mpsc::unbounded_channel();
        let (to_first, from_second) = mpsc::unbounded_channel();

        // Mark A's session starts right away and suspends on the latch
        // while the second connection is awaited.
        let first = self
            .spawn_session(Mark::A, &gate, &latch, to_second, from_second)
            .await?;
        let second = match self
            .spawn_session(Mark::B, &gate, &latch, to_first, from_first)
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                gate.abort().await;
                self.cancel.cancel();
                let _ = first.await;
                return Err(err);
            }
        };

        // Mark A has been suspended since it connected; resume it now.
        latch.release();

        let (first_result, second_result) = tokio::join!(first, second);
        for result in [first_result, second_result] {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(%err, "session ended with error"),
                Err(err) => tracing::warn!(%err, "session task failed to join"),
            }
        }
        Ok(())
    }

    async fn spawn_session(
        &self,
        mark: Mark,
        gate: &Arc<TurnGate>,
        latch: &Arc<OpponentLatch>,
        peer: UnboundedSender<PeerNotice>,
        notices: UnboundedReceiver<PeerNotice>,
    ) -> ServerResult<JoinHandle<ServerResult<()>>> {
        let (stream, addr) = self.accept().await?;
        self.events.emit(ServerEvent::PlayerConnected { mark, addr });
        let session = PlayerSession::new(
            stream,
            mark,
            Arc::clone(gate),
            Arc::clone(latch),
            peer,
            notices,
            self.events.clone(),
            self.cancel.clone(),
        );
        Ok(tokio::spawn(session.run()))
    }

    async fn accept(&self) -> ServerResult<(TcpStream, SocketAddr)> {
        tokio::select! {
            accepted = self.listener.accept() => Ok(accepted?),
            _ = self.cancel.cancelled() => Err(ServerError::GameAborted),
        }
    }
}
