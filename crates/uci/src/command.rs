//! Commands sent from the client to an engine.

use std::fmt;

/// Commands the client writes to an engine's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiCommand {
    /// Enter UCI mode.
    Uci,
    /// Ask the engine to confirm it has processed everything so far.
    IsReady,
    /// The next search belongs to a different game.
    UciNewGame,
    /// Set an engine option. Button options carry no value.
    SetOption { name: String, value: Option<String> },
    /// Set up a position from the start (or a FEN) plus moves.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start searching.
    Go(GoOptions),
    /// Stop searching and report a best move.
    Stop,
    /// Exit the engine.
    Quit,
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// White time remaining in milliseconds.
    pub wtime: Option<u64>,
    /// Black time remaining in milliseconds.
    pub btime: Option<u64>,
    /// White increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves to go until next time control.
    pub movestogo: Option<u32>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    /// Fixed time per move.
    pub fn movetime(ms: u64) -> Self {
        Self {
            movetime: Some(ms),
            ..Self::default()
        }
    }
}

impl GuiCommand {
    /// Formats the command as a protocol line, without the newline.
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            GuiCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(fen) => format!("position fen {}", fen),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            GuiCommand::Go(opts) => {
                let mut parts = vec!["go".to_string()];
                let numeric = [
                    ("wtime", opts.wtime),
                    ("btime", opts.btime),
                    ("winc", opts.winc),
                    ("binc", opts.binc),
                    ("movestogo", opts.movestogo.map(u64::from)),
                    ("depth", opts.depth.map(u64::from)),
                    ("movetime", opts.movetime),
                ];
                for (name, value) in numeric {
                    if let Some(v) = value {
                        parts.push(format!("{} {}", name, v));
                    }
                }
                if opts.infinite {
                    parts.push("infinite".to_string());
                }
                parts.join(" ")
            }
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
        }
    }
}

impl fmt::Display for GuiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands() {
        assert_eq!(GuiCommand::Uci.to_uci(), "uci");
        assert_eq!(GuiCommand::IsReady.to_uci(), "isready");
        assert_eq!(GuiCommand::UciNewGame.to_uci(), "ucinewgame");
        assert_eq!(GuiCommand::Stop.to_uci(), "stop");
        assert_eq!(GuiCommand::Quit.to_string(), "quit");
    }

    #[test]
    fn setoption() {
        let cmd = GuiCommand::SetOption {
            name: "Hash".to_string(),
            value: Some("64".to_string()),
        };
        assert_eq!(cmd.to_uci(), "setoption name Hash value 64");

        let button = GuiCommand::SetOption {
            name: "Clear Hash".to_string(),
            value: None,
        };
        assert_eq!(button.to_uci(), "setoption name Clear Hash");
    }

    #[test]
    fn position_startpos() {
        let cmd = GuiCommand::Position {
            fen: None,
            moves: vec![],
        };
        assert_eq!(cmd.to_uci(), "position startpos");
    }

    #[test]
    fn position_startpos_with_moves() {
        let cmd = GuiCommand::Position {
            fen: None,
            moves: vec!["e2e4".to_string(), "e7e5".to_string()],
        };
        assert_eq!(cmd.to_uci(), "position startpos moves e2e4 e7e5");
    }

    #[test]
    fn position_fen() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let cmd = GuiCommand::Position {
            fen: Some(fen.to_string()),
            moves: vec!["e7e5".to_string()],
        };
        assert_eq!(cmd.to_uci(), format!("position fen {} moves e7e5", fen));
    }

    #[test]
    fn go_movetime() {
        assert_eq!(
            GuiCommand::Go(GoOptions::movetime(1000)).to_uci(),
            "go movetime 1000"
        );
    }

    #[test]
    fn go_clock_and_infinite() {
        let opts = GoOptions {
            wtime: Some(60000),
            btime: Some(55000),
            winc: Some(1000),
            binc: Some(1000),
            movestogo: Some(20),
            ..GoOptions::default()
        };
        assert_eq!(
            GuiCommand::Go(opts).to_uci(),
            "go wtime 60000 btime 55000 winc 1000 binc 1000 movestogo 20"
        );

        let infinite = GoOptions {
            infinite: true,
            ..GoOptions::default()
        };
        assert_eq!(GuiCommand::Go(infinite).to_uci(), "go infinite");
        assert_eq!(GuiCommand::Go(GoOptions::default()).to_uci(), "go");
    }
}
