//! End-to-end games against scripted engines run through `sh -c`.
#![cfg(unix)]

use chess_arena::{
    Arena, ArenaEvent, ArenaHandle, ArenaState, GameConfig, PlayerConfig, PlayerKind,
};
use chess_core::{Color, Move};
use chess_rules::GameResult;
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

/// An engine that plays `moves` in order, then resigns.
fn playing(moves: &str) -> String {
    engine(
        r#"set -- $moves
      if [ $# -gt 0 ]; then
        echo "info depth 1 score cp 5 pv $1"
        echo "bestmove $1"
        shift
        moves="$*"
      else
        echo "bestmove (none)"
      fi"#,
    )
    .replace("__MOVES__", moves)
}

/// Answers the handshake; `go` is the body of the `go` case.
fn engine(go: &str) -> String {
    format!(
        r#"
moves="__MOVES__"
while read -r cmd rest; do
  case "$cmd" in
    uci)
      echo "id name Scripted"
      echo "id author Test Suite"
      echo "uciok";;
    isready) echo "readyok";;
    go)
      {go};;
    quit) exit 0;;
  esac
done
"#
    )
}

fn engine_player(script: String) -> PlayerConfig {
    PlayerConfig {
        name: None,
        engine: Some(PathBuf::from("sh")),
        args: vec!["-c".to_string(), script],
        ..PlayerConfig::default()
    }
}

fn base_config() -> GameConfig {
    GameConfig {
        movetime_ms: 50,
        move_overhead_ms: 500,
        startup_timeout_ms: 5000,
        quit_grace_ms: 300,
        ..GameConfig::default()
    }
}

fn mv(text: &str) -> Move {
    Move::from_uci(text).unwrap()
}

/// Reads events until `done` matches one, returning everything read.
fn wait_for(handle: &ArenaHandle, done: impl Fn(&ArenaEvent) -> bool) -> Vec<ArenaEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match handle.events().recv_timeout(left) {
            Ok(event) => {
                let matched = done(&event);
                seen.push(event);
                if matched {
                    return seen;
                }
            }
            Err(RecvTimeoutError::Timeout) => panic!("timed out waiting, saw {:?}", seen),
            Err(RecvTimeoutError::Disconnected) => panic!("game ended early, saw {:?}", seen),
        }
    }
}

fn finish(handle: ArenaHandle) -> (Vec<ArenaEvent>, chess_arena::GameRecord) {
    let events: Vec<ArenaEvent> = handle.events().iter().collect();
    let state = handle.state();
    let record = handle.join().unwrap();
    let expected = if record.result == GameResult::Aborted {
        ArenaState::Aborted
    } else {
        ArenaState::Completed
    };
    assert_eq!(state, expected);
    (events, record)
}

fn count(events: &[ArenaEvent], pred: impl Fn(&ArenaEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn test_engine_mates_human() {
    let mut config = base_config();
    config.white = engine_player(playing("e2e4 f1c4 d1h5 h5f7"));
    config.black.name = Some("Operator".to_string());

    let handle = Arena::new(config).unwrap().start().unwrap();
    for text in ["e7e5", "b8c6", "g8f6"] {
        assert!(handle.submit_human_move(mv(text)));
    }
    let (events, record) = finish(handle);

    assert_eq!(record.result, GameResult::Checkmate(Color::White));
    assert_eq!(
        record.coordinates(),
        vec!["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7"]
    );
    assert!(record.replay().is_ok());
    assert_eq!(record.white.kind, PlayerKind::Engine);
    assert_eq!(record.white.name, "Scripted");
    assert_eq!(record.white.author.as_deref(), Some("Test Suite"));
    assert_eq!(record.black.kind, PlayerKind::Human);
    assert_eq!(record.black.name, "Operator");

    assert!(record.plies[0].info.is_some());
    assert!(record.plies[1].info.is_none());
    assert_eq!(record.plies[0].eval_cp, Some(5));
    assert_eq!(record.plies[1].eval_cp, None);
    assert!(record.plies[6].mv.is_capture());
    assert_eq!(record.plies[6].material(), (39, 38));

    assert_eq!(
        count(&events, |e| matches!(e, ArenaEvent::Thinking { color: Color::White, .. })),
        4
    );
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::PlyApplied(_))), 7);
    assert!(matches!(events.first(), Some(ArenaEvent::Started { .. })));
    assert!(matches!(events.last(), Some(ArenaEvent::Finished { .. })));
}

#[test]
fn test_engine_vs_engine_resignation() {
    let mut config = base_config();
    config.white = engine_player(playing("e2e4 g1f3"));
    config.black = engine_player(playing("e7e5"));

    let (_, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Resignation(Color::White));
    assert_eq!(record.coordinates(), vec!["e2e4", "e7e5", "g1f3"]);
    assert!(record.faults.is_empty());
    // Both engines claim +5 for themselves.
    let evals: Vec<Option<i32>> = record.plies.iter().map(|p| p.eval_cp).collect();
    assert_eq!(evals, vec![Some(5), Some(-5), Some(5)]);
}

#[test]
fn test_engine_crash_aborts_game() {
    let mut config = base_config();
    config.white = engine_player(engine("exit 3"));

    let started = Instant::now();
    let (events, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Aborted);
    assert!(record.plies.is_empty());
    assert_eq!(record.faults.len(), 1);
    assert_eq!(
        count(&events, |e| matches!(e, ArenaEvent::Fault { color: Color::White, .. })),
        1
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_silent_engine_forfeits_on_time() {
    let mut config = base_config();
    config.black.name = Some("Operator".to_string());
    config.white = engine_player(engine(":"));

    let (events, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::TimeForfeit(Color::Black));
    assert!(record.plies.is_empty());
    assert!(record.faults.is_empty());
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::Fault { .. })), 0);
}

#[test]
fn test_illegal_engine_move_is_fatal() {
    let mut config = base_config();
    config.white = engine_player(engine(r#"echo "bestmove e2e5""#));

    let (events, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Aborted);
    assert!(record.plies.is_empty());
    assert_eq!(record.faults.len(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        ArenaEvent::MoveRejected { color: Color::White, mv, .. } if mv.to_uci() == "e2e5"
    )));
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::Fault { .. })), 1);
}

#[test]
fn test_malformed_engine_move_is_fatal() {
    let mut config = base_config();
    config.white = engine_player(engine(r#"echo "bestmove banana""#));

    let (events, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Aborted);
    assert!(record.faults[0].contains("banana"));
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::MoveRejected { .. })), 0);
}

#[test]
fn test_empty_bestmove_is_fatal() {
    let mut config = base_config();
    config.white = engine_player(engine(r#"echo "bestmove""#));

    let (_, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Aborted);
    assert_eq!(record.faults.len(), 1);
    assert!(record.faults[0].contains("Malformed"), "{:?}", record.faults);
}

#[test]
fn test_null_bestmove_resigns() {
    let mut config = base_config();
    config.white = engine_player(engine(r#"echo "bestmove 0000""#));

    let (_, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Resignation(Color::Black));
}

#[test]
fn test_startup_timeout_aborts_before_start() {
    let mut config = base_config();
    config.startup_timeout_ms = 300;
    config.black = engine_player("while read -r line; do :; done".to_string());

    let (events, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Aborted);
    assert_eq!(record.black.kind, PlayerKind::Engine);
    assert_eq!(record.faults.len(), 1);
    assert!(!events.iter().any(|e| matches!(e, ArenaEvent::Started { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, ArenaEvent::Fault { color: Color::Black, .. })));
}

#[test]
fn test_abort_interrupts_thinking_engine() {
    let mut config = base_config();
    config.movetime_ms = 10_000;
    config.white = engine_player(engine(r#"sleep 20; echo "bestmove e2e4""#));

    let handle = Arena::new(config).unwrap().start().unwrap();
    wait_for(&handle, |e| matches!(e, ArenaEvent::AwaitingMove { ply: 1, .. }));
    let aborted_at = Instant::now();
    handle.abort();
    let (events, record) = finish(handle);

    assert!(aborted_at.elapsed() < Duration::from_secs(5));
    assert_eq!(record.result, GameResult::Aborted);
    assert!(record.plies.is_empty());
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::PlyApplied(_))), 0);
}

#[test]
fn test_abort_mid_game_stops_plies() {
    let mut config = base_config();
    config.white = engine_player(playing("e2e4 d2d4"));

    let handle = Arena::new(config).unwrap().start().unwrap();
    wait_for(&handle, |e| matches!(e, ArenaEvent::AwaitingMove { ply: 2, .. }));
    handle.abort();
    let (events, record) = finish(handle);

    assert_eq!(record.result, GameResult::Aborted);
    assert_eq!(record.coordinates(), vec!["e2e4"]);
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::PlyApplied(_))), 0);
    assert!(record.replay().is_ok());
}

#[test]
fn test_illegal_human_move_is_reprompted() {
    let mut config = base_config();
    config.black = engine_player(playing(""));

    let handle = Arena::new(config).unwrap().start().unwrap();
    handle.submit_human_move(mv("e2e5"));
    handle.submit_human_move(mv("e2e4"));
    let (events, record) = finish(handle);

    assert_eq!(record.result, GameResult::Resignation(Color::White));
    assert_eq!(record.coordinates(), vec!["e2e4"]);
    assert!(record.faults.is_empty());
    assert_eq!(
        count(&events, |e| matches!(e, ArenaEvent::MoveRejected { color: Color::White, .. })),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(e, ArenaEvent::AwaitingMove { ply: 1, .. })),
        2
    );
}

#[test]
fn test_human_timeout_forfeits() {
    let config = GameConfig {
        human_timeout_ms: Some(100),
        ..base_config()
    };

    let (_, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::TimeForfeit(Color::Black));
    assert_eq!(record.white.kind, PlayerKind::Human);
    assert_eq!(record.white.name, "White");
}

#[test]
fn test_pause_and_resume_between_plies() {
    let handle = Arena::new(base_config()).unwrap().start().unwrap();
    handle.pause();
    assert!(handle.is_paused());
    handle.submit_human_move(mv("e2e4"));
    wait_for(&handle, |e| matches!(e, ArenaEvent::Paused));

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(handle.state(), ArenaState::Running);

    handle.submit_human_move(mv("e7e5"));
    handle.resume();
    let events = wait_for(&handle, |e| matches!(e, ArenaEvent::PlyApplied(p) if p.ply == 2));
    assert!(events.iter().any(|e| matches!(e, ArenaEvent::Resumed)));

    handle.abort();
    let (_, record) = finish(handle);
    assert_eq!(record.result, GameResult::Aborted);
    assert_eq!(record.coordinates(), vec!["e2e4", "e7e5"]);
}

#[test]
fn test_custom_start_position_black_to_move() {
    let mut config = base_config();
    config.start_fen = Some("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1".to_string());
    config.black = engine_player(playing("e8d8"));
    config.white.name = Some("Operator".to_string());

    let handle = Arena::new(config).unwrap().start().unwrap();
    handle.submit_human_move(mv("e2e4"));
    let (_, record) = finish(handle);

    assert_eq!(record.start_fen, "4k3/8/8/8/8/8/4P3/4K3 b - - 0 1");
    assert_eq!(record.coordinates(), vec!["e8d8", "e2e4"]);
    assert_eq!(record.plies[0].color, Color::Black);
    assert_eq!(record.result, GameResult::Resignation(Color::White));
}

#[test]
fn test_checkmated_start_position_ends_immediately() {
    let config = GameConfig {
        start_fen: Some(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3".to_string(),
        ),
        ..base_config()
    };

    let (events, record) = finish(Arena::new(config).unwrap().start().unwrap());

    assert_eq!(record.result, GameResult::Checkmate(Color::Black));
    assert!(record.plies.is_empty());
    assert_eq!(count(&events, |e| matches!(e, ArenaEvent::AwaitingMove { .. })), 0);
}
