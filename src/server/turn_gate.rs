use std::pin::pin;

use tokio::sync::{watch, Mutex, Notify};

use crate::game::{Board, GameError, GameOutcome, Location, Mark};
use crate::server::error::{ServerError, ServerResult};

/// Result of a move submitted to the [`TurnGate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MoveOutcome {
    /// The move was applied. `outcome` is the game state right after it,
    /// so the caller can tell whether this move ended the game.
    Accepted {
        location: Location,
        mark: Mark,
        outcome: GameOutcome,
    },
    /// The target cell is occupied. Nothing changed and the mover keeps
    /// its turn.
    Rejected,
}

#[derive(Debug)]
struct GateInner {
    board: Board,
    current: Mark,
    aborted: bool,
}

/// The single monitor guarding the board, the current turn, and the
/// turn-wait condition. Admits exactly one move at a time, and only from
/// the session whose mark matches the current turn; everyone else
/// suspends until the turn advances to them or the game is torn down.
#[derive(Debug)]
pub struct TurnGate {
    inner: Mutex<GateInner>,
    turn_changed: Notify,
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                board: Board::new(),
                current: Mark::A,
                aborted: false,
            }),
            turn_changed: Notify::new(),
        }
    }

    /// Validates and applies one move. Suspends (without busy-waiting)
    /// while it is not `mark`'s turn; the check-place-advance sequence
    /// runs under one lock, so no caller can observe a half-applied move
    /// or sneak two moves into the same turn slot.
    pub async fn attempt_move(&self, location: Location, mark: Mark) -> ServerResult<MoveOutcome> {
        let mut notified = pin!(self.turn_changed.notified());
        loop {
            // register for wakeup before checking the condition, so a turn
            // change between the check and the await cannot be missed
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().await;
                if inner.aborted {
                    return Err(ServerError::GameAborted);
                }
                if inner.board.evaluate().is_terminal() {
                    return Err(GameError::GameIsFinished.into());
                }
                if inner.current == mark {
                    if inner.board.is_occupied(location) {
                        return Ok(MoveOutcome::Rejected);
                    }
                    inner.board.place(location, mark);
                    inner.current = mark.other();
                    let outcome = inner.board.evaluate();
                    drop(inner);
                    self.turn_changed.notify_waiters();
                    return Ok(MoveOutcome::Accepted {
                        location,
                        mark,
                        outcome,
                    });
                }
            }
            notified.as_mut().await;
            notified.set(self.turn_changed.notified());
        }
    }

    /// Tears the game down: every suspended caller wakes up with an error
    /// instead of staying blocked on a turn that will never come.
    pub async fn abort(&self) {
        self.inner.lock().await.aborted = true;
        self.turn_changed.notify_waiters();
    }

    pub async fn current_mark(&self) -> Mark {
        self.inner.lock().await.current
    }

    pub async fn board(&self) -> Board {
        self.inner.lock().await.board
    }
}

/// One-shot latch the first player's session waits on until the second
/// player connects. Releasing an already released latch is a no-op.
#[derive(Debug)]
pub struct OpponentLatch {
    released: watch::Sender<bool>,
}

impl Default for OpponentLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl OpponentLatch {
    pub fn new() -> Self {
        Self {
            released: watch::Sender::new(false),
        }
    }

    pub fn release(&self) {
        self.released.send_replace(true);
    }

    pub fn is_released(&self) -> bool {
        *self.released.borrow()
    }

    pub async fn wait(&self) {
        let mut receiver = self.released.subscribe();
        // cannot fail: the sender lives at least as long as `self`
        let _ = receiver.wait_for(|released| *released).await;
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn loc(index: usize) -> Location {
        Location::try_from(index).unwrap()
    }

    async fn accept(gate: &TurnGate, location: usize, mark: Mark) -> GameOutcome {
        match gate.attempt_move(loc(location), mark).await.unwrap() {
            MoveOutcome::Accepted { outcome, .. } => outcome,
            MoveOutcome::Rejected => panic!("move at {} was rejected", location),
        }
    }

    #[tokio::test]
    async fn test_turn_alternates_starting_with_a() {
        let gate = TurnGate::new();
        assert_eq!(gate.current_mark().await, Mark::A);

        let moves = [
            (0, Mark::A),
            (1, Mark::B),
            (3, Mark::A),
            (4, Mark::B),
        ];
        for (n, (location, mark)) in moves.into_iter().enumerate() {
            // after N accepted moves the mover is A iff N is even
            let expected = if n % 2 == 0 { Mark::A } else { Mark::B };
            assert_eq!(gate.current_mark().await, expected);
            accept(&gate, location, mark).await;
        }
        assert_eq!(gate.current_mark().await, Mark::A);
        assert_eq!(gate.board().await.move_count(), 4);
    }

    #[tokio::test]
    async fn test_occupied_cell_is_rejected_without_losing_the_turn() {
        let gate = TurnGate::new();
        accept(&gate, 0, Mark::A).await;
        accept(&gate, 1, Mark::B).await;

        let board_before = gate.board().await;
        let outcome = gate.attempt_move(loc(0), Mark::A).await.unwrap();
        assert_eq!(outcome, MoveOutcome::Rejected);
        // nothing changed: same board, still A's turn, same mover retries
        assert_eq!(gate.board().await, board_before);
        assert_eq!(gate.current_mark().await, Mark::A);

        accept(&gate, 2, Mark::A).await;
        assert_eq!(gate.current_mark().await, Mark::B);
    }

    #[tokio::test]
    async fn test_out_of_turn_attempt_suspends_until_turn_advances() {
        let gate = Arc::new(TurnGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.attempt_move(loc(1), Mark::B).await })
        };

        // B must not proceed while it is still A's turn
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());
        assert_eq!(gate.board().await.move_count(), 0);

        accept(&gate, 0, Mark::A).await;
        let outcome = waiter.await.unwrap().unwrap();
        assert!(matches!(outcome, MoveOutcome::Accepted { .. }));
        assert_eq!(gate.current_mark().await, Mark::A);
        assert_eq!(gate.board().await.get(loc(1)), Some(Mark::B));
    }

    #[tokio::test]
    async fn test_abort_wakes_suspended_caller() {
        let gate = Arc::new(TurnGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.attempt_move(loc(0), Mark::B).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        gate.abort().await;
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ServerError::GameAborted)));
    }

    #[tokio::test]
    async fn test_attempt_after_abort_fails_immediately() {
        let gate = TurnGate::new();
        gate.abort().await;
        let result = gate.attempt_move(loc(0), Mark::A).await;
        assert!(matches!(result, Err(ServerError::GameAborted)));
    }

    #[tokio::test]
    async fn test_column_win_for_a() {
        let gate = TurnGate::new();
        // A plays the left column at 0, 3, 6
        assert_eq!(accept(&gate, 0, Mark::A).await, GameOutcome::InProgress);
        assert_eq!(accept(&gate, 1, Mark::B).await, GameOutcome::InProgress);
        assert_eq!(accept(&gate, 3, Mark::A).await, GameOutcome::InProgress);
        assert_eq!(accept(&gate, 4, Mark::B).await, GameOutcome::InProgress);
        assert_eq!(accept(&gate, 6, Mark::A).await, GameOutcome::Win(Mark::A));

        let board = gate.board().await;
        assert_eq!(board.get(loc(0)), Some(Mark::A));
        assert_eq!(board.get(loc(1)), Some(Mark::B));
        assert_eq!(board.get(loc(3)), Some(Mark::A));
        assert_eq!(board.get(loc(4)), Some(Mark::B));
        assert_eq!(board.get(loc(6)), Some(Mark::A));
        assert_eq!(board.get(loc(8)), None);
        assert_eq!(board.move_count(), 5);

        // no further moves are accepted on a finished game
        let result = gate.attempt_move(loc(8), Mark::B).await;
        assert!(matches!(
            result,
            Err(ServerError::Game(GameError::GameIsFinished))
        ));
    }

    #[tokio::test]
    async fn test_draw_after_nine_moves() {
        let gate = TurnGate::new();
        let moves = [
            (0, Mark::A),
            (1, Mark::B),
            (2, Mark::A),
            (4, Mark::B),
            (3, Mark::A),
            (5, Mark::B),
            (7, Mark::A),
            (6, Mark::B),
        ];
        for (location, mark) in moves {
            assert_eq!(accept(&gate, location, mark).await, GameOutcome::InProgress);
        }
        assert_eq!(accept(&gate, 8, Mark::A).await, GameOutcome::Draw);
        assert!(gate.board().await.is_full());
    }

    #[tokio::test]
    async fn test_waiter_woken_by_the_winning_move_gets_game_is_finished() {
        let gate = Arc::new(TurnGate::new());
        accept(&gate, 0, Mark::A).await;
        accept(&gate, 1, Mark::B).await;
        accept(&gate, 3, Mark::A).await;
        accept(&gate, 4, Mark::B).await;

        // B queues its next move before A has played the winning one
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.attempt_move(loc(5), Mark::B).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        assert_eq!(accept(&gate, 6, Mark::A).await, GameOutcome::Win(Mark::A));
        let result = waiter.await.unwrap();
        assert!(matches!(
            result,
            Err(ServerError::Game(GameError::GameIsFinished))
        ));
        // the queued move was never applied
        assert_eq!(gate.board().await.get(loc(5)), None);
    }

    #[tokio::test]
    async fn test_latch_blocks_until_released() {
        let latch = Arc::new(OpponentLatch::new());
        assert!(!latch.is_released());

        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        latch.release();
        waiter.await.unwrap();
        assert!(latch.is_released());
    }

    #[tokio::test]
    async fn test_latch_release_is_idempotent() {
        let latch = OpponentLatch::new();
        latch.release();
        latch.release();
        assert!(latch.is_released());
        // waiting after release returns immediately
        latch.wait().await;
    }
}
