//! UCI info line types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    /// Centipawn score from the engine's point of view (100 = 1 pawn).
    Cp(i32),
    /// Mate in N moves (positive = engine mates, negative = engine is mated).
    Mate(i32),
}

impl Score {
    /// Centipawn stand-in for a forced mate.
    pub const MATE_CP: i32 = 30_000;

    /// Score as centipawns from the engine's point of view.
    ///
    /// Mate scores collapse to [`Score::MATE_CP`], negated when the engine
    /// is the side being mated.
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => Self::MATE_CP,
            Score::Mate(_) => -Self::MATE_CP,
        }
    }
}

/// Whether a score is exact or only a search bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBound {
    Lower,
    Upper,
}

/// Search information reported by an engine while thinking.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Search depth in plies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Selective search depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<u32>,
    /// Index of this line in multi-PV mode (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipv: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound: Option<ScoreBound>,
    /// Nodes searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    /// Nodes per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// Principal variation (best line found).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pv: Vec<String>,
    /// Current move being searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currmove: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currmovenumber: Option<u32>,
    /// Hash table usage (per mille).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashfull: Option<u32>,
    /// Free text; always the rest of the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
}

impl EngineInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as a UCI info line.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(d) = self.seldepth {
            parts.push(format!("seldepth {}", d));
        }
        if let Some(n) = self.multipv {
            parts.push(format!("multipv {}", n));
        }
        if let Some(s) = self.score {
            match s {
                Score::Cp(cp) => parts.push(format!("score cp {}", cp)),
                Score::Mate(m) => parts.push(format!("score mate {}", m)),
            }
            match self.bound {
                Some(ScoreBound::Lower) => parts.push("lowerbound".to_string()),
                Some(ScoreBound::Upper) => parts.push("upperbound".to_string()),
                None => {}
            }
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {}", n));
        }
        if let Some(n) = self.nps {
            parts.push(format!("nps {}", n));
        }
        if let Some(t) = self.time {
            parts.push(format!("time {}", t));
        }
        if let Some(h) = self.hashfull {
            parts.push(format!("hashfull {}", h));
        }
        if let Some(ref m) = self.currmove {
            parts.push(format!("currmove {}", m));
        }
        if let Some(n) = self.currmovenumber {
            parts.push(format!("currmovenumber {}", n));
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }
        if let Some(ref s) = self.string {
            parts.push(format!("string {}", s));
        }

        parts.join(" ")
    }

    /// Parse a UCI info line.
    ///
    /// Returns `None` if the line is not an info line. Unknown tokens and
    /// unparsable values are skipped.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("info") {
            return None;
        }

        let mut info = EngineInfo::new();
        let parts: Vec<&str> = tokens.collect();
        let mut i = 0;

        while i < parts.len() {
            let value = parts.get(i + 1).copied();
            match parts[i] {
                "depth" => info.depth = value.and_then(|v| v.parse().ok()),
                "seldepth" => info.seldepth = value.and_then(|v| v.parse().ok()),
                "multipv" => info.multipv = value.and_then(|v| v.parse().ok()),
                "nodes" => info.nodes = value.and_then(|v| v.parse().ok()),
                "nps" => info.nps = value.and_then(|v| v.parse().ok()),
                "time" => info.time = value.and_then(|v| v.parse().ok()),
                "hashfull" => info.hashfull = value.and_then(|v| v.parse().ok()),
                "currmove" => info.currmove = value.map(str::to_string),
                "currmovenumber" => info.currmovenumber = value.and_then(|v| v.parse().ok()),
                "score" => {
                    let amount = parts.get(i + 2).and_then(|v| v.parse().ok());
                    info.score = match (value, amount) {
                        (Some("cp"), Some(cp)) => Some(Score::Cp(cp)),
                        (Some("mate"), Some(m)) => Some(Score::Mate(m)),
                        _ => info.score,
                    };
                    i += 3;
                    info.bound = match parts.get(i).copied() {
                        Some("lowerbound") => Some(ScoreBound::Lower),
                        Some("upperbound") => Some(ScoreBound::Upper),
                        _ => None,
                    };
                    if info.bound.is_some() {
                        i += 1;
                    }
                    continue;
                }
                "pv" => {
                    i += 1;
                    info.pv.clear();
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue;
                }
                "string" => {
                    info.string = Some(parts[i + 1..].join(" "));
                    break;
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Some(info)
    }
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "string"
            | "tbhits"
            | "cpuload"
            | "refutation"
            | "currline"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_centipawns() {
        assert_eq!(Score::Cp(-35).centipawns(), -35);
        assert_eq!(Score::Mate(3).centipawns(), Score::MATE_CP);
        assert_eq!(Score::Mate(-2).centipawns(), -Score::MATE_CP);
        assert_eq!(Score::Mate(0).centipawns(), -Score::MATE_CP);
    }

    #[test]
    fn parse_info() {
        let line = "info depth 12 score cp 30 nodes 125000 nps 500000 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(12));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.bound, None);
        assert_eq!(info.nodes, Some(125000));
        assert_eq!(info.nps, Some(500000));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn parse_mate_score() {
        let info = EngineInfo::parse("info depth 20 score mate -3 pv e2e4").unwrap();
        assert_eq!(info.score, Some(Score::Mate(-3)));
        assert_eq!(info.pv, vec!["e2e4"]);
    }

    #[test]
    fn parse_bounds_and_multipv() {
        let line = "info depth 18 seldepth 24 multipv 2 score cp -15 upperbound nodes 10 time 42 hashfull 310";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(info.seldepth, Some(24));
        assert_eq!(info.multipv, Some(2));
        assert_eq!(info.score, Some(Score::Cp(-15)));
        assert_eq!(info.bound, Some(ScoreBound::Upper));
        assert_eq!(info.nodes, Some(10));
        assert_eq!(info.time, Some(42));
        assert_eq!(info.hashfull, Some(310));
    }

    #[test]
    fn parse_currmove_and_string() {
        let info =
            EngineInfo::parse("info currmove e2e4 currmovenumber 1 string NNUE evaluation enabled")
                .unwrap();
        assert_eq!(info.currmove.as_deref(), Some("e2e4"));
        assert_eq!(info.currmovenumber, Some(1));
        assert_eq!(info.string.as_deref(), Some("NNUE evaluation enabled"));
    }

    #[test]
    fn unknown_tokens_skipped() {
        let info = EngineInfo::parse("info depth 5 tbhits 0 wdl 500 400 100 nodes 99 pv d2d4 tbhits 3")
            .unwrap();
        assert_eq!(info.depth, Some(5));
        assert_eq!(info.nodes, Some(99));
        assert_eq!(info.pv, vec!["d2d4"]);
    }

    #[test]
    fn non_info_line() {
        assert!(EngineInfo::parse("bestmove e2e4").is_none());
        assert!(EngineInfo::parse("informational").is_none());
        assert_eq!(EngineInfo::parse("info").unwrap(), EngineInfo::default());
    }

    #[test]
    fn to_uci_roundtrip_fields() {
        let info = EngineInfo {
            depth: Some(10),
            score: Some(Score::Cp(35)),
            bound: Some(ScoreBound::Lower),
            nodes: Some(50000),
            pv: vec!["e2e4".to_string(), "e7e5".to_string()],
            ..EngineInfo::default()
        };
        let uci = info.to_uci();
        assert_eq!(uci, "info depth 10 score cp 35 lowerbound nodes 50000 pv e2e4 e7e5");
        assert_eq!(EngineInfo::parse(&uci).unwrap(), info);
    }

    #[test]
    fn serializes_sparse() {
        let info = EngineInfo::parse("info depth 3 score mate 2").unwrap();
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"depth":3,"score":{"mate":2}}"#);
    }
}
