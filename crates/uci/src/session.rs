//! Engine process lifecycle.
//!
//! An [`EngineSession`] owns one engine subprocess. The engine's stdout is
//! read on a dedicated thread that parses each line and pushes it into a
//! bounded channel; the session consumes that channel with deadlines, so a
//! silent or hung engine can never block the caller past its budget.
//!
//! # Example
//!
//! ```no_run
//! use uci::{EngineSession, GoOptions, SessionConfig};
//!
//! let mut session = EngineSession::start("/usr/bin/stockfish", SessionConfig::default())?;
//! session.new_game()?;
//! let outcome = session.search(None, &[], &GoOptions::movetime(500), |info| {
//!     println!("{}", info);
//! })?;
//! println!("Best move: {:?}", outcome.best_move);
//! # Ok::<(), uci::UciError>(())
//! ```

use crate::{EngineInfo, EngineMessage, EngineOption, GoOptions, GuiCommand, UciError};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest a blocking wait goes without checking the interrupt flag.
pub const POLL_TICK: Duration = Duration::from_millis(25);

/// How long to wait for a late `bestmove` after sending `stop`.
const STOP_RESYNC: Duration = Duration::from_millis(500);

/// Settings for one engine session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Label used in log fields.
    pub label: String,
    /// Extra command-line arguments for the engine executable.
    pub args: Vec<String>,
    /// Options sent with `setoption` before the ready check.
    pub options: Vec<(String, String)>,
    /// Bound on the whole handshake, from spawn to `readyok`.
    pub startup_timeout: Duration,
    /// Extra wait beyond the move time before a search is given up.
    pub move_overhead: Duration,
    /// Time between `quit` and a forced kill.
    pub quit_grace: Duration,
    /// Capacity of the reader-to-session message queue.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            label: "engine".to_string(),
            args: Vec::new(),
            options: Vec::new(),
            startup_timeout: Duration::from_secs(15),
            move_overhead: Duration::from_secs(5),
            quit_grace: Duration::from_secs(2),
            queue_capacity: 256,
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Spawned,
    Handshaking,
    Ready,
    Thinking,
    Quitting,
    Terminated,
}

/// What the engine reported about itself during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineIdentity {
    pub name: Option<String>,
    pub author: Option<String>,
    pub options: Vec<EngineOption>,
}

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Move text as sent by the engine; `None` for a null move.
    pub best_move: Option<String>,
    pub ponder: Option<String>,
    /// The last info line seen during the search.
    pub info: Option<EngineInfo>,
    pub elapsed: Duration,
}

enum ReaderEvent {
    Message(EngineMessage),
    Closed,
    Failed(std::io::Error),
}

/// Cancels a session's blocking waits from another thread.
///
/// Interrupting sets the session's interrupt flag and closes the engine's
/// stdin. Any wait in progress returns [`UciError::Interrupted`] within one
/// [`POLL_TICK`]. The session cannot be used for further searches.
#[derive(Debug, Clone)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Ok(mut stdin) = self.stdin.lock() {
            stdin.take();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A live UCI engine process.
///
/// # Lifecycle
///
/// 1. [`EngineSession::start`] spawns the process and runs the handshake
/// 2. [`EngineSession::search`] runs one search per call
/// 3. [`EngineSession::shutdown`] (or [`Drop`]) quits the engine, killing it
///    if it does not exit within the grace period
pub struct EngineSession {
    child: Child,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    rx: Receiver<ReaderEvent>,
    interrupted: Arc<AtomicBool>,
    state: SessionState,
    identity: EngineIdentity,
    config: SessionConfig,
}

impl EngineSession {
    /// Spawns an engine and completes the UCI handshake.
    ///
    /// Sends `uci` and waits for `uciok`, recording the identity and the
    /// declared options, then sends the configured options and waits for
    /// `readyok`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the engine executable.
    /// * `config` - Session settings; see [`SessionConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`UciError::Spawn`] if the process cannot be launched,
    /// [`UciError::StartupTimeout`] if `readyok` does not arrive within
    /// `config.startup_timeout`, and [`UciError::Crashed`] if the engine
    /// exits during the handshake. The process is torn down on error.
    pub fn start<P: AsRef<Path>>(path: P, config: SessionConfig) -> Result<Self, UciError> {
        let path = path.as_ref();
        let mut child = Command::new(path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| UciError::Spawn {
                path: path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (tx, rx) = mpsc::sync_channel(config.queue_capacity.max(1));
        if let Some(stdout) = stdout {
            spawn_reader(stdout, tx, config.label.clone());
        }
        info!(engine = %config.label, path = %path.display(), "engine spawned");

        let mut session = Self {
            child,
            stdin: Arc::new(Mutex::new(stdin)),
            rx,
            interrupted: Arc::new(AtomicBool::new(false)),
            state: SessionState::Spawned,
            identity: EngineIdentity::default(),
            config,
        };
        session.handshake()?;
        Ok(session)
    }

    fn handshake(&mut self) -> Result<(), UciError> {
        self.state = SessionState::Handshaking;
        let timeout = self.config.startup_timeout;
        let deadline = Instant::now() + timeout;

        self.send(&GuiCommand::Uci)?;
        loop {
            match self.next_message(deadline)? {
                Some(EngineMessage::Id { name, author }) => {
                    if name.is_some() {
                        self.identity.name = name;
                    }
                    if author.is_some() {
                        self.identity.author = author;
                    }
                }
                Some(EngineMessage::Option(option)) => self.identity.options.push(option),
                Some(EngineMessage::UciOk) => break,
                Some(_) => {}
                None => return Err(UciError::StartupTimeout(timeout)),
            }
        }

        for (name, value) in self.config.options.clone() {
            self.send(&GuiCommand::SetOption {
                name,
                value: Some(value),
            })?;
        }

        self.send(&GuiCommand::IsReady)?;
        if !self.wait_ready(deadline)? {
            return Err(UciError::StartupTimeout(timeout));
        }

        self.state = SessionState::Ready;
        info!(
            engine = %self.config.label,
            name = self.identity.name.as_deref().unwrap_or("?"),
            "engine ready"
        );
        Ok(())
    }

    /// Waits for `readyok`; `false` if the deadline passes first.
    fn wait_ready(&mut self, deadline: Instant) -> Result<bool, UciError> {
        loop {
            match self.next_message(deadline)? {
                Some(EngineMessage::ReadyOk) => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &EngineIdentity {
        &self.identity
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Returns a handle that can cancel this session's waits.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            flag: Arc::clone(&self.interrupted),
            stdin: Arc::clone(&self.stdin),
        }
    }

    /// Tells the engine a new game starts and waits until it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::InvalidState`] unless the session is ready, and
    /// [`UciError::Timeout`] if `readyok` does not arrive within the
    /// startup timeout.
    pub fn new_game(&mut self) -> Result<(), UciError> {
        self.expect_ready("start a new game")?;
        self.send(&GuiCommand::UciNewGame)?;
        self.send(&GuiCommand::IsReady)?;
        let deadline = Instant::now() + self.config.startup_timeout;
        if self.wait_ready(deadline)? {
            Ok(())
        } else {
            Err(UciError::Timeout(self.config.startup_timeout))
        }
    }

    /// Runs one search and returns the engine's best move.
    ///
    /// Sends the position and `go`, then waits for `bestmove`. Every `info`
    /// line that arrives meanwhile is passed to `on_info`. The wait lasts the
    /// `go` move time plus the configured move overhead.
    ///
    /// # Arguments
    ///
    /// * `fen` - Start position, or `None` for the standard one.
    /// * `moves` - Moves played from the start position, in coordinate text.
    /// * `go` - Search limits.
    /// * `on_info` - Observer for live search info.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::Timeout`] if no best move arrives in time (the
    /// engine is sent `stop` first), [`UciError::Crashed`] if the engine
    /// exits, [`UciError::Interrupted`] if an [`Interrupter`] fired, and
    /// [`UciError::InvalidState`] unless the session is ready.
    pub fn search<F>(
        &mut self,
        fen: Option<&str>,
        moves: &[String],
        go: &GoOptions,
        mut on_info: F,
    ) -> Result<SearchOutcome, UciError>
    where
        F: FnMut(&EngineInfo),
    {
        self.expect_ready("search")?;

        self.send(&GuiCommand::Position {
            fen: fen.map(str::to_string),
            moves: moves.to_vec(),
        })?;
        self.send(&GuiCommand::Go(go.clone()))?;
        self.state = SessionState::Thinking;

        let start = Instant::now();
        let budget = Duration::from_millis(go.movetime.unwrap_or(0)) + self.config.move_overhead;
        let deadline = start + budget;
        let mut last_info = None;

        loop {
            match self.next_message(deadline)? {
                Some(EngineMessage::Info(info)) => {
                    on_info(&info);
                    last_info = Some(info);
                }
                Some(EngineMessage::BestMove { mv, ponder }) => {
                    self.state = SessionState::Ready;
                    return Ok(SearchOutcome {
                        best_move: mv,
                        ponder,
                        info: last_info,
                        elapsed: start.elapsed(),
                    });
                }
                Some(_) => {}
                None => break,
            }
        }

        warn!(engine = %self.config.label, ?budget, "search timed out, sending stop");
        self.send(&GuiCommand::Stop)?;
        let resync = Instant::now() + STOP_RESYNC;
        while let Some(message) = self.next_message(resync)? {
            if let EngineMessage::BestMove { .. } = message {
                self.state = SessionState::Ready;
                break;
            }
        }
        Err(UciError::Timeout(budget))
    }

    /// Quits the engine, killing it if it outlives the grace period.
    ///
    /// Safe to call more than once; [`Drop`] calls it too.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Quitting;

        let _ = self.send(&GuiCommand::Quit);
        if let Ok(mut stdin) = self.stdin.lock() {
            stdin.take();
        }

        let deadline = Instant::now() + self.config.quit_grace;
        let mut exited = false;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                exited = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if !exited {
            warn!(engine = %self.config.label, "engine ignored quit, killing");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();

        self.state = SessionState::Terminated;
        info!(engine = %self.config.label, "engine session closed");
    }

    fn expect_ready(&self, action: &'static str) -> Result<(), UciError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(UciError::Interrupted);
        }
        if self.state != SessionState::Ready {
            return Err(UciError::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    fn send(&mut self, command: &GuiCommand) -> Result<(), UciError> {
        let line = command.to_uci();
        debug!(engine = %self.config.label, "> {}", line);

        let mut guard = self
            .stdin
            .lock()
            .map_err(|_| std::io::Error::other("engine stdin lock poisoned"))?;
        let Some(stdin) = guard.as_mut() else {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(UciError::Interrupted);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        };
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    /// Next message before `deadline`, or `None` once it passes.
    fn next_message(&mut self, deadline: Instant) -> Result<Option<EngineMessage>, UciError> {
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(UciError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = (deadline - now).min(POLL_TICK);
            match self.rx.recv_timeout(wait) {
                Ok(ReaderEvent::Message(message)) => return Ok(Some(message)),
                Ok(ReaderEvent::Failed(err)) => return Err(UciError::Io(err)),
                Ok(ReaderEvent::Closed) | Err(RecvTimeoutError::Disconnected) => {
                    if self.interrupted.load(Ordering::SeqCst) {
                        return Err(UciError::Interrupted);
                    }
                    let status = self.exit_status();
                    error!(engine = %self.config.label, ?status, "engine exited");
                    return Err(UciError::Crashed { status });
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    /// Exit status of a process whose output has closed, if it is known soon.
    fn exit_status(&mut self) -> Option<ExitStatus> {
        for _ in 0..10 {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Some(status);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_reader(stdout: ChildStdout, tx: SyncSender<ReaderEvent>, label: String) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    let _ = tx.send(ReaderEvent::Failed(err));
                    return;
                }
            }
            // Engines are not required to print UTF-8; bad bytes must not end the session.
            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\n', '\r']);
            debug!(engine = %label, "< {}", line);
            if tx
                .send(ReaderEvent::Message(EngineMessage::parse(line)))
                .is_err()
            {
                return;
            }
        }
        let _ = tx.send(ReaderEvent::Closed);
    });
}
