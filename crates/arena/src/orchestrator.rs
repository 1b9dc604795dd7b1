//! The arena game loop.
//!
//! [`Arena::start`] runs one game on a dedicated thread and returns an
//! [`ArenaHandle`]. The handle accepts commands (pause, resume, abort, human
//! moves) and exposes a stream of [`ArenaEvent`]s. The game thread owns the
//! board; observers only ever see snapshots.
//!
//! # Example
//!
//! ```no_run
//! use chess_arena::{Arena, ArenaEvent, GameConfig};
//!
//! let mut config = GameConfig::default();
//! config.white.engine = Some("/usr/bin/stockfish".into());
//! config.black.engine = Some("/usr/bin/stockfish".into());
//!
//! let handle = Arena::new(config)?.start()?;
//! for event in handle.events().iter() {
//!     if let ArenaEvent::PlyApplied(ply) = event {
//!         println!("{}. {}", ply.ply, ply.mv);
//!     }
//! }
//! let record = handle.join()?;
//! println!("{}", record.result);
//! # Ok::<(), chess_arena::ArenaError>(())
//! ```

use crate::config::{ConfigError, GameConfig};
use crate::player::{EngineMover, HumanMover, Mover, MoverError, Turn};
use crate::record::{GameRecord, PlayerInfo, PlyRecord};
use chess_core::{Color, Move};
use chess_rules::{Board, Game, GameResult, IllegalMoveError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};
use uci::{EngineInfo, Interrupter, UciError};

/// Lifecycle of an arena game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Notifications emitted by a running game, in order.
#[derive(Debug, Clone)]
pub enum ArenaEvent {
    /// Both seats are ready and play begins from `board`.
    Started {
        white: PlayerInfo,
        black: PlayerInfo,
        board: Board,
    },
    /// The game is waiting for `color` to produce ply number `ply`.
    AwaitingMove { color: Color, ply: usize },
    /// Live search info from an engine.
    Thinking { color: Color, info: EngineInfo },
    PlyApplied(PlyRecord),
    /// A proposed move failed validation and was not applied.
    MoveRejected {
        color: Color,
        mv: Move,
        error: IllegalMoveError,
    },
    /// A seat failed in a way that ends the game.
    Fault { color: Color, message: String },
    Paused,
    Resumed,
    /// Always the last event of a game.
    Finished {
        result: GameResult,
        record: GameRecord,
    },
}

/// Errors starting or joining an arena game.
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to spawn game thread: {0}")]
    Spawn(std::io::Error),
    #[error("Game thread panicked")]
    ThreadPanicked,
}

/// State shared between the game thread and its controllers.
struct Control {
    abort: AtomicBool,
    paused: Mutex<bool>,
    wake: Condvar,
    state: Mutex<ArenaState>,
    interrupters: Mutex<Vec<Interrupter>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Control {
    fn new() -> Self {
        Self {
            abort: AtomicBool::new(false),
            paused: Mutex::new(false),
            wake: Condvar::new(),
            state: Mutex::new(ArenaState::Idle),
            interrupters: Mutex::new(Vec::new()),
        }
    }

    fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
        {
            let _paused = lock(&self.paused);
            self.wake.notify_all();
        }
        for interrupter in lock(&self.interrupters).iter() {
            interrupter.interrupt();
        }
    }

    fn set_paused(&self, value: bool) {
        *lock(&self.paused) = value;
        self.wake.notify_all();
    }

    fn is_paused(&self) -> bool {
        *lock(&self.paused)
    }

    /// Blocks while paused. Returns early on abort.
    fn wait_while_paused(&self) {
        let guard = lock(&self.paused);
        let _guard = self
            .wake
            .wait_while(guard, |paused| *paused && !self.is_aborted())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Sleeps for `delay`. Returns early on abort.
    fn pace(&self, delay: Duration) {
        let guard = lock(&self.paused);
        let _guard = self
            .wake
            .wait_timeout_while(guard, delay, |_| !self.is_aborted())
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn state(&self) -> ArenaState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ArenaState) {
        *lock(&self.state) = state;
    }

    fn register(&self, interrupter: Interrupter) {
        lock(&self.interrupters).push(interrupter.clone());
        if self.is_aborted() {
            interrupter.interrupt();
        }
    }
}

enum Seats {
    FromConfig,
    Provided {
        white: Box<dyn Mover>,
        black: Box<dyn Mover>,
    },
}

/// A configured game that has not started yet.
pub struct Arena {
    config: GameConfig,
    seats: Seats,
}

impl Arena {
    /// Creates a game whose seats are built from `config` when it starts.
    ///
    /// A player with an engine path gets an [`EngineMover`]; any other
    /// player gets a [`HumanMover`].
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Config`] if the configuration does not validate.
    pub fn new(config: GameConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            config,
            seats: Seats::FromConfig,
        })
    }

    /// Creates a game with caller-built seats. The seats in `config` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Config`] if the configuration does not validate.
    pub fn with_seats(
        config: GameConfig,
        white: Box<dyn Mover>,
        black: Box<dyn Mover>,
    ) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            config,
            seats: Seats::Provided { white, black },
        })
    }

    /// Starts the game on its own thread.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Spawn`] if the thread cannot be created.
    pub fn start(self) -> Result<ArenaHandle, ArenaError> {
        let start = self.config.start_board()?;
        let control = Arc::new(Control::new());
        let (event_tx, events) = mpsc::channel();
        let (human_tx, human_rx) = mpsc::channel();

        control.set_state(ArenaState::Running);
        let runner = Runner {
            config: self.config,
            control: Arc::clone(&control),
            events: event_tx,
            human_input: human_rx,
        };
        let seats = self.seats;
        let thread = thread::Builder::new()
            .name("arena".to_string())
            .spawn(move || runner.run(seats, start))
            .map_err(ArenaError::Spawn)?;

        Ok(ArenaHandle {
            controller: ArenaController { control, human_tx },
            events,
            thread,
        })
    }
}

/// Cloneable command side of a running game.
#[derive(Clone)]
pub struct ArenaController {
    control: Arc<Control>,
    human_tx: Sender<Move>,
}

impl ArenaController {
    /// Suspends the game before the next ply. Engines are left running.
    pub fn pause(&self) {
        self.control.set_paused(true);
    }

    pub fn resume(&self) {
        self.control.set_paused(false);
    }

    /// Ends the game with result `Aborted`, cancelling any wait in progress.
    pub fn abort(&self) {
        self.control.abort();
    }

    /// Queues a move for the next human turn.
    ///
    /// The move is validated when it is played; an illegal move produces
    /// [`ArenaEvent::MoveRejected`]. Returns false if the game has ended.
    pub fn submit_human_move(&self, mv: Move) -> bool {
        self.human_tx.send(mv).is_ok()
    }

    pub fn state(&self) -> ArenaState {
        self.control.state()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }
}

/// Handle to a game running on its own thread.
pub struct ArenaHandle {
    controller: ArenaController,
    events: Receiver<ArenaEvent>,
    thread: JoinHandle<GameRecord>,
}

impl ArenaHandle {
    pub fn pause(&self) {
        self.controller.pause();
    }

    pub fn resume(&self) {
        self.controller.resume();
    }

    pub fn abort(&self) {
        self.controller.abort();
    }

    pub fn submit_human_move(&self, mv: Move) -> bool {
        self.controller.submit_human_move(mv)
    }

    pub fn state(&self) -> ArenaState {
        self.controller.state()
    }

    pub fn is_paused(&self) -> bool {
        self.controller.is_paused()
    }

    /// Events in emission order. The channel closes after
    /// [`ArenaEvent::Finished`].
    pub fn events(&self) -> &Receiver<ArenaEvent> {
        &self.events
    }

    /// A controller usable from other threads.
    pub fn controller(&self) -> ArenaController {
        self.controller.clone()
    }

    /// Waits for the game to end and returns its record.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ThreadPanicked`] if the game thread panicked.
    pub fn join(self) -> Result<GameRecord, ArenaError> {
        self.thread.join().map_err(|_| ArenaError::ThreadPanicked)
    }
}

struct Runner {
    config: GameConfig,
    control: Arc<Control>,
    events: Sender<ArenaEvent>,
    human_input: Receiver<Move>,
}

impl Runner {
    fn emit(&self, event: ArenaEvent) {
        // A dropped receiver just means nobody is watching.
        let _ = self.events.send(event);
    }

    fn run(self, seats: Seats, start: Board) -> GameRecord {
        let (mut white, mut black) = match seats {
            Seats::Provided { white, black } => (white, black),
            Seats::FromConfig => match self.build_seats() {
                Ok(pair) => pair,
                Err((color, err)) => return self.fail_startup(&start, color, err),
            },
        };

        let mut record = GameRecord::new(white.player(), black.player(), &start);
        let result = self.play(&mut record, &start, &mut white, &mut black);

        white.shutdown();
        black.shutdown();
        lock(&self.control.interrupters).clear();
        self.finish(record, result)
    }

    fn build_seats(&self) -> Result<(Box<dyn Mover>, Box<dyn Mover>), (Color, UciError)> {
        let white = self
            .build_seat(Color::White)
            .map_err(|e| (Color::White, e))?;
        let black = match self.build_seat(Color::Black) {
            Ok(seat) => seat,
            Err(e) => {
                let mut white = white;
                white.shutdown();
                return Err((Color::Black, e));
            }
        };
        Ok((white, black))
    }

    fn build_seat(&self, color: Color) -> Result<Box<dyn Mover>, UciError> {
        let player = self.config.player(color);
        match &player.engine {
            Some(path) => {
                let mover = EngineMover::spawn(
                    path,
                    self.config.session_config(color),
                    player.name.clone(),
                )?;
                Ok(Box::new(mover))
            }
            None => {
                let name = player.name.clone().unwrap_or_else(|| color.to_string());
                Ok(Box::new(HumanMover::new(name, self.config.human_timeout())))
            }
        }
    }

    fn configured_player(&self, color: Color) -> PlayerInfo {
        let player = self.config.player(color);
        match &player.engine {
            Some(path) => PlayerInfo::engine(
                player.name.clone().unwrap_or_else(|| path.display().to_string()),
                path,
            ),
            None => PlayerInfo::human(player.name.clone().unwrap_or_else(|| color.to_string())),
        }
    }

    fn fail_startup(&self, start: &Board, color: Color, err: UciError) -> GameRecord {
        let mut record = GameRecord::new(
            self.configured_player(Color::White),
            self.configured_player(Color::Black),
            start,
        );
        self.fault(&mut record, color, format!("{} engine failed to start: {}", color, err));
        self.finish(record, GameResult::Aborted)
    }

    fn fault(&self, record: &mut GameRecord, color: Color, message: String) {
        error!(game = %record.id, %color, %message, "engine fault");
        record.faults.push(message.clone());
        self.emit(ArenaEvent::Fault { color, message });
    }

    fn finish(&self, mut record: GameRecord, result: GameResult) -> GameRecord {
        record.result = result;
        record.finished_at = Some(Utc::now());
        self.control.set_state(if result == GameResult::Aborted {
            ArenaState::Aborted
        } else {
            ArenaState::Completed
        });
        info!(
            game = %record.id,
            %result,
            plies = record.plies.len(),
            "game finished"
        );
        self.emit(ArenaEvent::Finished {
            result,
            record: record.clone(),
        });
        record
    }

    /// Runs turns until the game ends. Returns the result.
    fn play(
        &self,
        record: &mut GameRecord,
        start: &Board,
        white: &mut Box<dyn Mover>,
        black: &mut Box<dyn Mover>,
    ) -> GameResult {
        for (color, seat) in [(Color::White, &mut *white), (Color::Black, &mut *black)] {
            if let Some(interrupter) = seat.interrupter() {
                self.control.register(interrupter);
            }
            match seat.new_game() {
                Ok(()) => {}
                Err(MoverError::Cancelled) => return GameResult::Aborted,
                Err(_) if self.control.is_aborted() => return GameResult::Aborted,
                Err(e) => {
                    self.fault(record, color, format!("{} failed to start a new game: {}", color, e));
                    return GameResult::Aborted;
                }
            }
        }

        self.emit(ArenaEvent::Started {
            white: record.white.clone(),
            black: record.black.clone(),
            board: start.clone(),
        });
        info!(
            game = %record.id,
            white = %record.white.name,
            black = %record.black.name,
            fen = %record.start_fen,
            "game started"
        );

        let mut game =
            Game::from_board(start.clone()).with_draw_order(self.config.draw_order.clone());
        let start_fen = self.config.start_fen.as_deref();
        let mut result = game.classify();

        while !result.is_terminal() {
            if self.control.is_aborted() {
                return GameResult::Aborted;
            }
            if self.control.is_paused() {
                self.emit(ArenaEvent::Paused);
                self.control.wait_while_paused();
                if self.control.is_aborted() {
                    return GameResult::Aborted;
                }
                self.emit(ArenaEvent::Resumed);
            }

            let color = game.board().side_to_move();
            let ply = game.ply_count() + 1;
            self.emit(ArenaEvent::AwaitingMove { color, ply });

            let seat = match color {
                Color::White => &mut *white,
                Color::Black => &mut *black,
            };
            let turn = Turn {
                board: game.board(),
                start_fen,
                moves: game.moves(),
                budget: self.config.movetime(),
                abort: &self.control.abort,
                human_input: &self.human_input,
                ply,
            };
            let started = Instant::now();
            let outcome = seat.request_move(&turn, &mut |info: &EngineInfo| {
                self.emit(ArenaEvent::Thinking {
                    color,
                    info: info.clone(),
                });
            });
            let think = started.elapsed();

            if self.control.is_aborted() {
                return GameResult::Aborted;
            }

            match outcome {
                Ok(proposal) => match game.play(proposal.mv) {
                    Ok(mv) => {
                        let applied = PlyRecord::new(
                            ply,
                            color,
                            mv,
                            game.board().clone(),
                            proposal.info,
                            think,
                        );
                        record.plies.push(applied.clone());
                        self.emit(ArenaEvent::PlyApplied(applied));

                        result = game.classify();
                        let delay = self.config.move_delay();
                        if !result.is_terminal() && !delay.is_zero() {
                            self.control.pace(delay);
                        }
                    }
                    Err(err) => {
                        warn!(game = %record.id, %color, mv = %proposal.mv, "illegal move rejected");
                        self.emit(ArenaEvent::MoveRejected {
                            color,
                            mv: proposal.mv,
                            error: err.clone(),
                        });
                        if !seat.reprompt_on_illegal() {
                            self.fault(record, color, format!("{} played an illegal move: {}", color, err));
                            return GameResult::Aborted;
                        }
                    }
                },
                Err(MoverError::Timeout(limit)) => {
                    warn!(game = %record.id, %color, ?limit, "no move in time");
                    return GameResult::TimeForfeit(color.opposite());
                }
                Err(MoverError::Resigned) => {
                    info!(game = %record.id, %color, "resigned");
                    return GameResult::Resignation(color.opposite());
                }
                Err(MoverError::Cancelled) => return GameResult::Aborted,
                Err(err) => {
                    self.fault(record, color, format!("{}: {}", color, err));
                    return GameResult::Aborted;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Proposal;
    use std::collections::VecDeque;

    /// Plays a fixed list of moves, then resigns.
    struct Scripted {
        name: &'static str,
        moves: VecDeque<&'static str>,
    }

    impl Scripted {
        fn boxed(name: &'static str, moves: &[&'static str]) -> Box<dyn Mover> {
            Box::new(Self {
                name,
                moves: moves.iter().copied().collect(),
            })
        }
    }

    impl Mover for Scripted {
        fn player(&self) -> PlayerInfo {
            PlayerInfo::human(self.name)
        }

        fn request_move(
            &mut self,
            _turn: &Turn<'_>,
            _on_info: &mut dyn FnMut(&EngineInfo),
        ) -> Result<Proposal, MoverError> {
            let text = self.moves.pop_front().ok_or(MoverError::Resigned)?;
            Move::from_uci(text)
                .map(Proposal::new)
                .ok_or_else(|| MoverError::MalformedMove(text.to_string()))
        }
    }

    /// Blocks in `new_game` until released, then fails as an interrupted engine would.
    struct Stalled {
        release: Arc<AtomicBool>,
    }

    impl Mover for Stalled {
        fn player(&self) -> PlayerInfo {
            PlayerInfo::human("Stalled")
        }

        fn request_move(
            &mut self,
            _turn: &Turn<'_>,
            _on_info: &mut dyn FnMut(&EngineInfo),
        ) -> Result<Proposal, MoverError> {
            Err(MoverError::Resigned)
        }

        fn new_game(&mut self) -> Result<(), MoverError> {
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(MoverError::Engine(UciError::Interrupted))
        }
    }

    /// Refuses to start a game because the wait was cancelled.
    struct Cancelling;

    impl Mover for Cancelling {
        fn player(&self) -> PlayerInfo {
            PlayerInfo::human("Cancelling")
        }

        fn request_move(
            &mut self,
            _turn: &Turn<'_>,
            _on_info: &mut dyn FnMut(&EngineInfo),
        ) -> Result<Proposal, MoverError> {
            Err(MoverError::Resigned)
        }

        fn new_game(&mut self) -> Result<(), MoverError> {
            Err(MoverError::Cancelled)
        }
    }

    fn run(config: GameConfig, white: Box<dyn Mover>, black: Box<dyn Mover>) -> (Vec<ArenaEvent>, GameRecord) {
        let handle = Arena::with_seats(config, white, black).unwrap().start().unwrap();
        let events: Vec<ArenaEvent> = handle.events().iter().collect();
        let record = handle.join().unwrap();
        (events, record)
    }

    #[test]
    fn test_fools_mate_completes() {
        let (events, record) = run(
            GameConfig::default(),
            Scripted::boxed("W", &["f2f3", "g2g4"]),
            Scripted::boxed("B", &["e7e5", "d8h4"]),
        );

        assert_eq!(record.result, GameResult::Checkmate(Color::Black));
        assert_eq!(record.coordinates(), vec!["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert!(record.replay().is_ok());
        assert!(record.finished_at.is_some());
        assert!(matches!(events.first(), Some(ArenaEvent::Started { .. })));
        assert!(matches!(
            events.last(),
            Some(ArenaEvent::Finished {
                result: GameResult::Checkmate(Color::Black),
                ..
            })
        ));
        let applied = events
            .iter()
            .filter(|e| matches!(e, ArenaEvent::PlyApplied(_)))
            .count();
        assert_eq!(applied, 4);
    }

    #[test]
    fn test_resignation_goes_to_opponent() {
        let (_, record) = run(
            GameConfig::default(),
            Scripted::boxed("W", &["e2e4"]),
            Scripted::boxed("B", &[]),
        );
        assert_eq!(record.result, GameResult::Resignation(Color::White));
        assert_eq!(record.plies.len(), 1);
    }

    #[test]
    fn test_illegal_move_from_non_reprompting_seat_aborts() {
        let (events, record) = run(
            GameConfig::default(),
            Scripted::boxed("W", &["e2e5"]),
            Scripted::boxed("B", &[]),
        );
        assert_eq!(record.result, GameResult::Aborted);
        assert!(record.plies.is_empty());
        assert_eq!(record.faults.len(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, ArenaEvent::MoveRejected { color: Color::White, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ArenaEvent::Fault { color: Color::White, .. })));
    }

    #[test]
    fn test_terminal_start_position_plays_no_moves() {
        let config = GameConfig {
            start_fen: Some("4k3/8/8/8/8/8/8/4K3 w - - 0 1".to_string()),
            ..GameConfig::default()
        };
        let (events, record) = run(
            config,
            Scripted::boxed("W", &["e1e2"]),
            Scripted::boxed("B", &[]),
        );
        assert_eq!(record.result, GameResult::DrawByInsufficientMaterial);
        assert!(record.plies.is_empty());
        assert!(!events
            .iter()
            .any(|e| matches!(e, ArenaEvent::AwaitingMove { .. })));
    }

    #[test]
    fn test_state_after_completion() {
        let handle = Arena::with_seats(
            GameConfig::default(),
            Scripted::boxed("W", &[]),
            Scripted::boxed("B", &[]),
        )
        .unwrap()
        .start()
        .unwrap();
        let _: Vec<ArenaEvent> = handle.events().iter().collect();
        assert_eq!(handle.state(), ArenaState::Completed);
        handle.join().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GameConfig {
            draw_order: vec![],
            ..GameConfig::default()
        };
        let result = Arena::with_seats(config, Scripted::boxed("W", &[]), Scripted::boxed("B", &[]));
        assert!(matches!(result, Err(ArenaError::Config(_))));
    }

    #[test]
    fn test_abort_cuts_pacing_delay() {
        let config = GameConfig {
            move_delay_ms: 10_000,
            ..GameConfig::default()
        };
        let handle = Arena::with_seats(
            config,
            Scripted::boxed("W", &["e2e4"]),
            Scripted::boxed("B", &["e7e5"]),
        )
        .unwrap()
        .start()
        .unwrap();

        let started = Instant::now();
        handle.pause();
        assert!(handle.is_paused());
        handle.abort();

        let events: Vec<ArenaEvent> = handle.events().iter().collect();
        let record = handle.join().unwrap();
        assert_eq!(record.result, GameResult::Aborted);
        assert!(record.plies.len() <= 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(
            events.last(),
            Some(ArenaEvent::Finished {
                result: GameResult::Aborted,
                ..
            })
        ));
    }

    #[test]
    fn test_abort_during_new_game_is_not_a_fault() {
        let release = Arc::new(AtomicBool::new(false));
        let handle = Arena::with_seats(
            GameConfig::default(),
            Box::new(Stalled {
                release: Arc::clone(&release),
            }),
            Scripted::boxed("B", &[]),
        )
        .unwrap()
        .start()
        .unwrap();

        handle.abort();
        release.store(true, Ordering::SeqCst);

        let events: Vec<ArenaEvent> = handle.events().iter().collect();
        let record = handle.join().unwrap();
        assert_eq!(record.result, GameResult::Aborted);
        assert!(record.faults.is_empty(), "{:?}", record.faults);
        assert!(!events.iter().any(|e| matches!(e, ArenaEvent::Fault { .. })));
    }

    #[test]
    fn test_cancelled_new_game_is_not_a_fault() {
        let (events, record) = run(
            GameConfig::default(),
            Scripted::boxed("W", &["e2e4"]),
            Box::new(Cancelling),
        );
        assert_eq!(record.result, GameResult::Aborted);
        assert!(record.faults.is_empty());
        assert!(!events.iter().any(|e| matches!(e, ArenaEvent::Fault { .. })));
    }
}
