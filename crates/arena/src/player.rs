//! The two kinds of seat at the board.
//!
//! The orchestrator asks a [`Mover`] for a move each turn and never looks at
//! which kind it is talking to. [`EngineMover`] drives a UCI engine process;
//! [`HumanMover`] waits for moves submitted through the arena handle.

use crate::record::PlayerInfo;
use chess_core::Move;
use chess_rules::Board;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use uci::{
    EngineInfo, EngineSession, GoOptions, Interrupter, SessionConfig, UciError, POLL_TICK,
};

/// Everything a mover may look at when asked for a move.
pub struct Turn<'a> {
    /// Current position. The mover never gets a live handle to the game.
    pub board: &'a Board,
    /// Start position as FEN, or `None` for the standard start.
    pub start_fen: Option<&'a str>,
    /// Moves played so far from the start position.
    pub moves: &'a [Move],
    /// Engine move-time budget.
    pub budget: Duration,
    /// Set when the game is being aborted.
    pub abort: &'a AtomicBool,
    /// Moves submitted by human operators, in submission order.
    pub human_input: &'a Receiver<Move>,
    /// Number of the ply being requested, starting at 1.
    pub ply: usize,
}

/// A move offered by a mover. It is validated before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub mv: Move,
    /// Last search info, for engine moves.
    pub info: Option<EngineInfo>,
}

impl Proposal {
    pub fn new(mv: Move) -> Self {
        Self { mv, info: None }
    }
}

/// Reasons a mover produced no move.
#[derive(Error, Debug)]
pub enum MoverError {
    /// No move arrived within the allowed time.
    #[error("No move within {0:?}")]
    Timeout(Duration),
    /// The mover gave up the game.
    #[error("Resigned")]
    Resigned,
    /// The wait was cancelled by an abort.
    #[error("Cancelled")]
    Cancelled,
    /// The engine process failed.
    #[error("Engine error: {0}")]
    Engine(#[from] UciError),
    /// The engine sent a best move that is not coordinate text.
    #[error("Malformed best move {0:?}")]
    MalformedMove(String),
}

/// A seat at the board.
pub trait Mover: Send {
    /// Identity recorded in the game record.
    fn player(&self) -> PlayerInfo;

    /// Produces the next move for the side to move.
    ///
    /// Live search info is passed to `on_info` as it arrives.
    ///
    /// # Errors
    ///
    /// See [`MoverError`]. [`MoverError::Cancelled`] must be returned
    /// promptly once `turn.abort` is set.
    fn request_move(
        &mut self,
        turn: &Turn<'_>,
        on_info: &mut dyn FnMut(&EngineInfo),
    ) -> Result<Proposal, MoverError>;

    /// Whether an illegal move is answered with another request.
    ///
    /// When false an illegal move is a fault that ends the game.
    fn reprompt_on_illegal(&self) -> bool {
        false
    }

    /// Handle that cancels a blocking [`Mover::request_move`] from another thread.
    fn interrupter(&self) -> Option<Interrupter> {
        None
    }

    /// Called once before the first move of a game.
    fn new_game(&mut self) -> Result<(), MoverError> {
        Ok(())
    }

    /// Releases any resources. Called once when the game ends.
    fn shutdown(&mut self) {}
}

/// A seat played by a UCI engine.
pub struct EngineMover {
    session: EngineSession,
    player: PlayerInfo,
}

impl EngineMover {
    /// Spawns the engine and completes the UCI handshake.
    ///
    /// # Arguments
    ///
    /// * `path` - Engine executable.
    /// * `config` - Session settings.
    /// * `name` - Display name. Falls back to the name the engine reports,
    ///   then to the executable's file name.
    ///
    /// # Errors
    ///
    /// Returns [`UciError`] if the engine cannot be spawned or does not
    /// finish the handshake within the startup timeout.
    pub fn spawn(
        path: &Path,
        config: SessionConfig,
        name: Option<String>,
    ) -> Result<Self, UciError> {
        let session = EngineSession::start(path, config)?;
        let identity = session.identity();
        let name = name
            .or_else(|| identity.name.clone())
            .unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            });
        let mut player = PlayerInfo::engine(name, path);
        player.author = identity.author.clone();
        Ok(Self { session, player })
    }
}

impl Mover for EngineMover {
    fn player(&self) -> PlayerInfo {
        self.player.clone()
    }

    fn request_move(
        &mut self,
        turn: &Turn<'_>,
        on_info: &mut dyn FnMut(&EngineInfo),
    ) -> Result<Proposal, MoverError> {
        let moves: Vec<String> = turn.moves.iter().map(|m| m.to_uci()).collect();
        let go = GoOptions::movetime(turn.budget.as_millis() as u64);

        let outcome = self
            .session
            .search(turn.start_fen, &moves, &go, |info: &EngineInfo| on_info(info))
            .map_err(|e| match e {
                UciError::Timeout(limit) => MoverError::Timeout(limit),
                UciError::Interrupted => MoverError::Cancelled,
                other => MoverError::Engine(other),
            })?;
        debug!(
            engine = %self.session.label(),
            ply = turn.ply,
            best = ?outcome.best_move,
            elapsed = ?outcome.elapsed,
            "search finished"
        );

        let text = outcome.best_move.ok_or(MoverError::Resigned)?;
        let mv = Move::from_uci(&text).ok_or(MoverError::MalformedMove(text))?;
        Ok(Proposal {
            mv,
            info: outcome.info,
        })
    }

    fn interrupter(&self) -> Option<Interrupter> {
        Some(self.session.interrupter())
    }

    fn new_game(&mut self) -> Result<(), MoverError> {
        self.session.new_game().map_err(|e| match e {
            UciError::Interrupted => MoverError::Cancelled,
            other => MoverError::Engine(other),
        })
    }

    fn shutdown(&mut self) {
        self.session.shutdown();
    }
}

/// A seat played by a person.
///
/// Moves are taken from [`Turn::human_input`]. A move submitted early stays
/// queued until this seat's turn.
pub struct HumanMover {
    player: PlayerInfo,
    timeout: Option<Duration>,
}

impl HumanMover {
    /// Creates a human seat. `timeout` bounds each move; `None` waits forever.
    pub fn new(name: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            player: PlayerInfo::human(name),
            timeout,
        }
    }
}

impl Mover for HumanMover {
    fn player(&self) -> PlayerInfo {
        self.player.clone()
    }

    fn request_move(
        &mut self,
        turn: &Turn<'_>,
        _on_info: &mut dyn FnMut(&EngineInfo),
    ) -> Result<Proposal, MoverError> {
        let start = Instant::now();
        loop {
            if turn.abort.load(Ordering::SeqCst) {
                return Err(MoverError::Cancelled);
            }
            let wait = match self.timeout {
                Some(limit) => {
                    let elapsed = start.elapsed();
                    if elapsed >= limit {
                        return Err(MoverError::Timeout(limit));
                    }
                    (limit - elapsed).min(POLL_TICK)
                }
                None => POLL_TICK,
            };
            match turn.human_input.recv_timeout(wait) {
                Ok(mv) => return Ok(Proposal::new(mv)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(MoverError::Cancelled),
            }
        }
    }

    fn reprompt_on_illegal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    fn request(
        mover: &mut HumanMover,
        abort: &AtomicBool,
        input: &Receiver<Move>,
    ) -> Result<Proposal, MoverError> {
        let board = Board::startpos();
        let turn = Turn {
            board: &board,
            start_fen: None,
            moves: &[],
            budget: Duration::from_millis(100),
            abort,
            human_input: input,
            ply: 1,
        };
        mover.request_move(&turn, &mut |_: &EngineInfo| {})
    }

    #[test]
    fn test_human_takes_queued_move() {
        let (tx, rx) = mpsc::channel();
        let e2e4 = Move::from_uci("e2e4").unwrap();
        tx.send(e2e4).unwrap();

        let mut mover = HumanMover::new("Operator", None);
        let proposal = request(&mut mover, &AtomicBool::new(false), &rx).unwrap();
        assert_eq!(proposal, Proposal::new(e2e4));
        assert!(mover.reprompt_on_illegal());
        assert!(mover.interrupter().is_none());
    }

    #[test]
    fn test_human_timeout() {
        let (_tx, rx) = mpsc::channel();
        let mut mover = HumanMover::new("Operator", Some(Duration::from_millis(60)));
        let start = Instant::now();
        let result = request(&mut mover, &AtomicBool::new(false), &rx);
        assert!(matches!(result, Err(MoverError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_human_abort_cancels_wait() {
        let (_tx, rx) = mpsc::channel();
        let abort = AtomicBool::new(false);
        let mut mover = HumanMover::new("Operator", None);

        let result = thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(50));
                abort.store(true, Ordering::SeqCst);
            });
            request(&mut mover, &abort, &rx)
        });
        assert!(matches!(result, Err(MoverError::Cancelled)));
    }

    #[test]
    fn test_human_disconnected_queue_cancels() {
        let (tx, rx) = mpsc::channel::<Move>();
        drop(tx);
        let mut mover = HumanMover::new("Operator", None);
        let result = request(&mut mover, &AtomicBool::new(false), &rx);
        assert!(matches!(result, Err(MoverError::Cancelled)));
    }

    #[test]
    fn test_mover_error_messages() {
        assert_eq!(MoverError::Resigned.to_string(), "Resigned");
        assert_eq!(
            MoverError::MalformedMove("zz9".to_string()).to_string(),
            "Malformed best move \"zz9\""
        );
        assert_eq!(
            MoverError::Engine(UciError::Interrupted).to_string(),
            format!("Engine error: {}", UciError::Interrupted)
        );
    }

    #[test]
    fn test_engine_spawn_failure() {
        let result = EngineMover::spawn(
            Path::new("/nonexistent/engine"),
            SessionConfig::default(),
            None,
        );
        assert!(matches!(result, Err(UciError::Spawn { .. })));
    }
}
