//! Configuration file loading for the arena.
//!
//! A game is configured by one [`GameConfig`], usually read from
//! `arena.toml`. Every field has a default, so an empty file describes a
//! human-vs-human game from the standard start position.

use chess_core::{Color, FenError};
use chess_rules::{Board, DrawRule, DEFAULT_DRAW_ORDER};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uci::SessionConfig;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// The configured start position is not a valid FEN.
    #[error("Invalid start position {fen:?}: {source}")]
    InvalidStartPosition {
        fen: String,
        #[source]
        source: FenError,
    },
    /// The draw-rule order is empty or names a rule twice.
    #[error("Invalid draw order: {0}")]
    InvalidDrawOrder(String),
}

/// One side of the board.
///
/// A player with an `engine` path is driven over UCI; without one the
/// player is a human whose moves arrive through the arena handle.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Display name. Engines default to the name they report.
    #[serde(default)]
    pub name: Option<String>,
    /// Path to a UCI engine executable.
    #[serde(default)]
    pub engine: Option<PathBuf>,
    /// Extra command-line arguments for the engine.
    #[serde(default)]
    pub args: Vec<String>,
    /// UCI options sent with `setoption` during the handshake.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl PlayerConfig {
    pub fn is_engine(&self) -> bool {
        self.engine.is_some()
    }
}

/// Settings for one arena game.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Engine move-time budget per move, in milliseconds.
    #[serde(default = "default_movetime_ms")]
    pub movetime_ms: u64,
    /// Pacing pause between plies, in milliseconds.
    #[serde(default)]
    pub move_delay_ms: u64,
    /// Per-move limit for human players. Absent means no limit.
    #[serde(default)]
    pub human_timeout_ms: Option<u64>,
    /// Start position. Absent means the standard start.
    #[serde(default)]
    pub start_fen: Option<String>,
    /// Extra wait beyond the move time before an engine forfeits.
    #[serde(default = "default_move_overhead_ms")]
    pub move_overhead_ms: u64,
    /// Bound on the engine handshake.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    /// Grace period between `quit` and a forced kill.
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
    /// Precedence of draw rules that hold at the same time.
    #[serde(default = "default_draw_order")]
    pub draw_order: Vec<DrawRule>,
    #[serde(default)]
    pub white: PlayerConfig,
    #[serde(default)]
    pub black: PlayerConfig,
}

fn default_movetime_ms() -> u64 {
    1000
}

fn default_move_overhead_ms() -> u64 {
    5000
}

fn default_startup_timeout_ms() -> u64 {
    15_000
}

fn default_quit_grace_ms() -> u64 {
    2000
}

fn default_draw_order() -> Vec<DrawRule> {
    DEFAULT_DRAW_ORDER.to_vec()
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            movetime_ms: default_movetime_ms(),
            move_delay_ms: 0,
            human_timeout_ms: None,
            start_fen: None,
            move_overhead_ms: default_move_overhead_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            quit_grace_ms: default_quit_grace_ms(),
            draw_order: default_draw_order(),
            white: PlayerConfig::default(),
            black: PlayerConfig::default(),
        }
    }
}

impl GameConfig {
    /// Loads the configuration from `arena.toml` in the working directory.
    ///
    /// Returns the default configuration if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads the configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read, or
    /// [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        PathBuf::from("arena.toml")
    }

    /// Checks the settings that cannot be checked by deserialization alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidStartPosition`] for a bad `start_fen`
    /// and [`ConfigError::InvalidDrawOrder`] for an empty or repeating
    /// `draw_order`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.start_board()?;

        if self.draw_order.is_empty() {
            return Err(ConfigError::InvalidDrawOrder(
                "at least one draw rule is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for rule in &self.draw_order {
            if !seen.insert(rule) {
                return Err(ConfigError::InvalidDrawOrder(format!(
                    "{:?} listed more than once",
                    rule
                )));
            }
        }
        Ok(())
    }

    /// Builds the configured start position.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidStartPosition`] if `start_fen` is set
    /// and does not parse.
    pub fn start_board(&self) -> Result<Board, ConfigError> {
        match &self.start_fen {
            Some(fen) => {
                Board::from_fen(fen).map_err(|source| ConfigError::InvalidStartPosition {
                    fen: fen.clone(),
                    source,
                })
            }
            None => Ok(Board::startpos()),
        }
    }

    pub fn player(&self, color: Color) -> &PlayerConfig {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn player_mut(&mut self, color: Color) -> &mut PlayerConfig {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    pub fn movetime(&self) -> Duration {
        Duration::from_millis(self.movetime_ms)
    }

    pub fn move_delay(&self) -> Duration {
        Duration::from_millis(self.move_delay_ms)
    }

    pub fn human_timeout(&self) -> Option<Duration> {
        self.human_timeout_ms.map(Duration::from_millis)
    }

    /// Session settings for the engine playing `color`.
    pub fn session_config(&self, color: Color) -> SessionConfig {
        let player = self.player(color);
        SessionConfig {
            label: player
                .name
                .clone()
                .unwrap_or_else(|| color.to_string().to_lowercase()),
            args: player.args.clone(),
            options: player
                .options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
            move_overhead: Duration::from_millis(self.move_overhead_ms),
            quit_grace: Duration::from_millis(self.quit_grace_ms),
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_valid_toml_config() {
        let toml_content = r#"
movetime_ms = 250
move_delay_ms = 100
human_timeout_ms = 60000
start_fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"
draw_order = ["repetition", "fifty_move", "insufficient_material"]

[white]
name = "Stockfish"
engine = "/usr/bin/stockfish"
args = ["--quiet"]

[white.options]
Hash = "64"
Threads = "2"

[black]
name = "Operator"
"#;

        let config = GameConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.movetime(), Duration::from_millis(250));
        assert_eq!(config.move_delay(), Duration::from_millis(100));
        assert_eq!(config.human_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.draw_order[0], DrawRule::Repetition);

        assert!(config.white.is_engine());
        assert_eq!(config.white.engine, Some(PathBuf::from("/usr/bin/stockfish")));
        assert_eq!(config.white.options.get("Hash").map(String::as_str), Some("64"));
        assert!(!config.black.is_engine());
        assert_eq!(config.black.name.as_deref(), Some("Operator"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = GameConfig::from_toml_str("").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.movetime_ms, 1000);
        assert_eq!(config.move_overhead_ms, 5000);
        assert_eq!(config.startup_timeout_ms, 15_000);
        assert_eq!(config.quit_grace_ms, 2000);
        assert_eq!(config.human_timeout(), None);
        assert_eq!(config.draw_order, DEFAULT_DRAW_ORDER.to_vec());
        assert_eq!(config.start_board().unwrap(), Board::startpos());
    }

    #[test]
    fn test_invalid_start_position_rejected() {
        let config = GameConfig {
            start_fen: Some("not a fen".to_string()),
            ..GameConfig::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidStartPosition { fen, .. }) => assert_eq!(fen, "not a fen"),
            other => panic!("Expected InvalidStartPosition, got {:?}", other),
        }
    }

    #[test]
    fn test_start_position_with_capturable_king_rejected() {
        let config = GameConfig {
            start_fen: Some("4k3/8/8/8/8/8/8/r3K3 b - - 0 1".to_string()),
            ..GameConfig::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidStartPosition { source, .. }) => {
                assert_eq!(source, FenError::OpponentInCheck(Color::White))
            }
            other => panic!("Expected InvalidStartPosition, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_draw_order_rejected() {
        let empty = GameConfig {
            draw_order: vec![],
            ..GameConfig::default()
        };
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::InvalidDrawOrder(_))
        ));

        let repeated = GameConfig {
            draw_order: vec![DrawRule::FiftyMove, DrawRule::FiftyMove],
            ..GameConfig::default()
        };
        assert!(matches!(
            repeated.validate(),
            Err(ConfigError::InvalidDrawOrder(_))
        ));
    }

    #[test]
    fn test_unknown_draw_rule_is_parse_error() {
        let result = GameConfig::from_toml_str(r#"draw_order = ["agreement"]"#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "movetime_ms = 42\n[black]\nengine = \"/opt/engine\"").unwrap();

        let config = GameConfig::from_path(file.path()).unwrap();
        assert_eq!(config.movetime_ms, 42);
        assert!(config.player(Color::Black).is_engine());
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = GameConfig::from_path(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_config_path_returns_expected_path() {
        assert_eq!(GameConfig::config_path(), PathBuf::from("arena.toml"));
    }

    #[test]
    fn test_session_config_from_player() {
        let mut config = GameConfig {
            startup_timeout_ms: 300,
            quit_grace_ms: 50,
            move_overhead_ms: 70,
            ..GameConfig::default()
        };
        config.player_mut(Color::White).engine = Some(PathBuf::from("/bin/engine"));
        config
            .player_mut(Color::White)
            .options
            .insert("Hash".to_string(), "32".to_string());

        let session = config.session_config(Color::White);
        assert_eq!(session.label, "white");
        assert_eq!(session.startup_timeout, Duration::from_millis(300));
        assert_eq!(session.quit_grace, Duration::from_millis(50));
        assert_eq!(session.move_overhead, Duration::from_millis(70));
        assert_eq!(session.options, vec![("Hash".to_string(), "32".to_string())]);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = GameConfig::default();
        config.white.engine = Some(PathBuf::from("/usr/bin/stockfish"));
        config.human_timeout_ms = Some(5000);

        let serialized = toml::to_string(&config).unwrap();
        let deserialized = GameConfig::from_toml_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }
}
