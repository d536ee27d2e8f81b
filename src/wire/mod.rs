//! The line-delimited JSON protocol spoken between the server and its two
//! clients. One message per line; the byte plumbing underneath is plain
//! buffered socket I/O.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::game::{GameOutcome, Location, Mark};

/// Used when no port argument is given or it fails to parse.
pub const DEFAULT_PORT: u16 = 12345;

/// Requests a client may send while the game is in progress.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ClientRequest {
    Move { location: Location },
}

/// Messages the server sends to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection: the mark this client plays with.
    Assign { mark: Mark, status: String },
    /// Sent to Mark A once Mark B has connected.
    OpponentConnected { status: String },
    /// The requested move was applied.
    MoveAccepted { location: Location },
    /// The requested cell is occupied; the client keeps its turn and
    /// should re-send.
    MoveRejected { status: String },
    /// The opponent made a move; its mark is known a priori.
    OpponentMoved { location: Location },
    /// Sent to both clients exactly once, when the game reaches a
    /// terminal outcome.
    GameOver { outcome: GameOutcome, status: String },
}

impl ServerMessage {
    pub fn assign(mark: Mark) -> Self {
        let status = match mark {
            Mark::A => "connected, waiting for another player",
            Mark::B => "connected, your opponent moves first",
        };
        Self::Assign {
            mark,
            status: status.to_string(),
        }
    }

    pub fn opponent_connected() -> Self {
        Self::OpponentConnected {
            status: "other player connected; you may move".to_string(),
        }
    }

    pub fn move_rejected() -> Self {
        Self::MoveRejected {
            status: "invalid move, try again".to_string(),
        }
    }

    pub fn game_over(outcome: GameOutcome) -> Self {
        Self::GameOver {
            outcome,
            status: outcome.to_string(),
        }
    }
}

/// Writes one message followed by a newline.
pub async fn send_message<W>(writer: &mut W, message: &ServerMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(message).map_err(std::io::Error::other)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

/// Parses one line received from a client. A line that doesn't decode, or
/// that names a location outside the board, violates the protocol framing.
pub fn decode_request(line: &str) -> Result<ClientRequest, serde_json::Error> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_move_request() {
        let request = decode_request(r#"{"request":"move","location":4}"#).unwrap();
        assert_eq!(
            request,
            ClientRequest::Move {
                location: Location::try_from(4).unwrap()
            }
        );
    }

    #[test]
    fn test_decode_rejects_out_of_range_location() {
        assert!(decode_request(r#"{"request":"move","location":9}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_request("move 4").is_err());
        assert!(decode_request(r#"{"request":"quit"}"#).is_err());
    }

    #[test]
    fn test_game_over_status_strings() {
        let ServerMessage::GameOver { status, .. } =
            ServerMessage::game_over(GameOutcome::Win(Mark::A))
        else {
            panic!("expected GameOver");
        };
        assert_eq!(status, "Mark A wins");

        let ServerMessage::GameOver { status, .. } = ServerMessage::game_over(GameOutcome::Draw)
        else {
            panic!("expected GameOver");
        };
        assert_eq!(status, "Draw");
    }

    #[test]
    fn test_server_message_roundtrip_through_line() {
        let message = ServerMessage::MoveAccepted {
            location: Location::try_from(0).unwrap(),
        };
        let line = serde_json::to_string(&message).unwrap();
        let decoded: ServerMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(decoded, message);
    }
}
