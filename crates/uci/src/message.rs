//! Messages sent from an engine to the client.

use crate::EngineInfo;
use serde::{Deserialize, Serialize};

/// Best-move texts that mean the engine has no move to play.
const NULL_MOVES: [&str; 3] = ["(none)", "0000", "null"];

/// An option declared by the engine during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineOption {
    pub name: String,
    /// Declared type: `check`, `spin`, `combo`, `button` or `string`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    /// Allowed values of a combo option.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<String>,
}

impl EngineOption {
    /// Parses the text after `option `.
    fn parse(rest: &str) -> Option<Self> {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let mut option = EngineOption::default();
        let mut field: Option<&str> = None;
        let mut value: Vec<&str> = Vec::new();

        for token in tokens {
            match token {
                // Names may contain spaces, so keywords only end a field
                // once the name has been read.
                "type" | "default" | "min" | "max" | "var"
                    if field != Some("name") || !value.is_empty() =>
                {
                    assign_field(field, &mut value, &mut option);
                    field = Some(token);
                }
                "name" if field.is_none() => field = Some("name"),
                _ => value.push(token),
            }
        }
        assign_field(field, &mut value, &mut option);

        if option.name.is_empty() {
            None
        } else {
            Some(option)
        }
    }
}

fn assign_field(field: Option<&str>, value: &mut Vec<&str>, option: &mut EngineOption) {
    let text = value.join(" ");
    value.clear();
    match field {
        Some("name") => option.name = text,
        Some("type") => option.kind = text,
        Some("default") => option.default = Some(text),
        Some("min") => option.min = text.parse().ok(),
        Some("max") => option.max = text.parse().ok(),
        Some("var") => option.vars.push(text),
        _ => {}
    }
}

/// Messages an engine writes to its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    /// Engine identification; one of the two fields per line.
    Id {
        name: Option<String>,
        author: Option<String>,
    },
    /// UCI mode handshake complete.
    UciOk,
    /// Reply to `isready`.
    ReadyOk,
    Option(EngineOption),
    Info(EngineInfo),
    /// End of a search. `mv` is `None` when the engine reports a null move
    /// and empty when the move token is missing.
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
    /// Anything else. The protocol requires clients to ignore these.
    Unknown(String),
}

impl EngineMessage {
    /// Parses one line of engine output. Never fails.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (trimmed, ""),
        };

        match keyword {
            "uciok" if rest.is_empty() => EngineMessage::UciOk,
            "readyok" if rest.is_empty() => EngineMessage::ReadyOk,
            "id" => Self::parse_id(rest).unwrap_or_else(|| Self::unknown(trimmed)),
            "option" => EngineOption::parse(rest)
                .map(EngineMessage::Option)
                .unwrap_or_else(|| Self::unknown(trimmed)),
            "info" => EngineInfo::parse(trimmed)
                .map(EngineMessage::Info)
                .unwrap_or_else(|| Self::unknown(trimmed)),
            "bestmove" => Self::parse_bestmove(rest),
            _ => Self::unknown(trimmed),
        }
    }

    fn unknown(line: &str) -> Self {
        EngineMessage::Unknown(line.to_string())
    }

    fn parse_id(rest: &str) -> Option<Self> {
        let (field, value) = rest.split_once(char::is_whitespace)?;
        let value = Some(value.trim().to_string());
        match field {
            "name" => Some(EngineMessage::Id {
                name: value,
                author: None,
            }),
            "author" => Some(EngineMessage::Id {
                name: None,
                author: value,
            }),
            _ => None,
        }
    }

    fn parse_bestmove(rest: &str) -> Self {
        let mut tokens = rest.split_whitespace();
        let mv = match tokens.next() {
            Some(m) if NULL_MOVES.contains(&m) => None,
            Some(m) => Some(m.to_string()),
            None => Some(String::new()),
        };
        let ponder = match (tokens.next(), tokens.next()) {
            (Some("ponder"), Some(p)) if !NULL_MOVES.contains(&p) => Some(p.to_string()),
            _ => None,
        };
        EngineMessage::BestMove { mv, ponder }
    }
}
