use anyhow::{bail, Context};
use chess_arena::tournament::{Stopper, TournamentConfig, TournamentEvent, TournamentRunner};
use chess_arena::{Arena, ArenaController, ArenaEvent, GameConfig};
use chess_core::{Color, Move};
use chess_rules::{perft_divide, Board};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use tracing::Level;

#[derive(Parser)]
#[command(name = "arena")]
#[command(about = "Play chess between humans and UCI engines")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one game
    Play {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Engine for white (human if absent)
        #[arg(long)]
        white: Option<PathBuf>,
        /// Engine for black (human if absent)
        #[arg(long)]
        black: Option<PathBuf>,
        /// Engine move time in milliseconds
        #[arg(long)]
        movetime: Option<u64>,
        /// Pause between plies in milliseconds
        #[arg(long)]
        delay: Option<u64>,
        /// Start position
        #[arg(long)]
        fen: Option<String>,
        /// Print the final game record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a tournament between engines
    Tournament {
        /// Tournament configuration file
        config: PathBuf,
        /// Print every game record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count leaf nodes of the move tree
    Perft {
        /// Start position
        #[arg(long)]
        fen: Option<String>,
        /// Search depth in plies
        depth: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Play {
            config,
            white,
            black,
            movetime,
            delay,
            fen,
            json,
        } => {
            let mut game_config = match config {
                Some(path) => GameConfig::from_path(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => GameConfig::load()?,
            };
            if let Some(path) = white {
                game_config.white.engine = Some(path);
            }
            if let Some(path) = black {
                game_config.black.engine = Some(path);
            }
            if let Some(ms) = movetime {
                game_config.movetime_ms = ms;
            }
            if let Some(ms) = delay {
                game_config.move_delay_ms = ms;
            }
            if fen.is_some() {
                game_config.start_fen = fen;
            }
            play(game_config, json)
        }
        Commands::Tournament { config, json } => {
            let config = TournamentConfig::from_path(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            tournament(config, json)
        }
        Commands::Perft { fen, depth } => {
            let board = match fen {
                Some(fen) => Board::from_fen(&fen)?,
                None => Board::startpos(),
            };
            let mut total = 0;
            for (mv, count) in perft_divide(&board, depth) {
                println!("{}: {}", mv, count);
                total += count;
            }
            println!();
            println!("Nodes searched: {}", total);
            Ok(())
        }
    }
}

fn play(config: GameConfig, json: bool) -> anyhow::Result<()> {
    let has_human = !config.white.is_engine() || !config.black.is_engine();
    let handle = Arena::new(config)?.start()?;

    if has_human {
        println!("Enter moves as coordinates (e2e4), or pause / resume / abort.");
    }
    let controller = handle.controller();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || read_commands(controller))?;

    for event in handle.events().iter() {
        match event {
            ArenaEvent::Started { white, black, board } => {
                println!("{} (white) vs {} (black)", white.name, black.name);
                println!("{}", board);
            }
            ArenaEvent::AwaitingMove { color, ply } => {
                println!("Ply {}: {} to move", ply, color);
            }
            ArenaEvent::Thinking { .. } => {}
            ArenaEvent::PlyApplied(ply) => {
                let number = (ply.ply + 1) / 2;
                let dots = if ply.color == Color::White { "." } else { "..." };
                match &ply.info {
                    Some(info) => println!("{}{} {} ({}) [{} ms]", number, dots, ply.mv, info, ply.think_ms),
                    None => println!("{}{} {} [{} ms]", number, dots, ply.mv, ply.think_ms),
                }
                println!("{}", ply.board);
            }
            ArenaEvent::MoveRejected { color, mv, error } => {
                println!("{} move {} rejected: {}", color, mv, error);
            }
            ArenaEvent::Fault { color, message } => {
                eprintln!("{} fault: {}", color, message);
            }
            ArenaEvent::Paused => println!("Paused"),
            ArenaEvent::Resumed => println!("Resumed"),
            ArenaEvent::Finished { result, record } => {
                println!("{}", result);
                if json {
                    println!("{}", record.to_json()?);
                }
            }
        }
    }

    let record = handle.join()?;
    if record.result == chess_rules::GameResult::InProgress {
        bail!("game ended without a result");
    }
    Ok(())
}

fn tournament(config: TournamentConfig, json: bool) -> anyhow::Result<()> {
    let runner = TournamentRunner::new(config)?;
    println!("Type abort to stop the tournament.");
    let stopper = runner.stopper();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || read_stop(stopper))?;

    let report = runner.run(|event| match event {
        TournamentEvent::RoundStarted { round, pairings, byes } => {
            println!("Round {}", round);
            for (white, black) in pairings {
                println!("  {} - {}", white, black);
            }
            for name in byes {
                println!("  {} (bye)", name);
            }
        }
        TournamentEvent::Game { event, .. } => {
            if let ArenaEvent::Fault { color, message } = event {
                eprintln!("{} fault: {}", color, message);
            }
        }
        TournamentEvent::GameFinished {
            white,
            black,
            result,
            ..
        } => println!("{} - {}: {}", white, black, result),
        TournamentEvent::Finished { .. } => println!("Tournament complete"),
    })?;

    println!();
    for (place, standing) in report.standings.iter().enumerate() {
        println!(
            "{:>2}. {:<24} {:>4.1}  +{} ={} -{}",
            place + 1,
            standing.name,
            standing.score(),
            standing.wins,
            standing.draws,
            standing.losses
        );
    }
    if json {
        for record in &report.games {
            println!("{}", record.to_json()?);
        }
    }
    if !report.completed {
        bail!("tournament stopped before the last round");
    }
    Ok(())
}

fn read_stop(stopper: Stopper) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if matches!(line.trim(), "abort" | "quit") {
            stopper.stop();
            break;
        }
    }
}

fn read_commands(controller: ArenaController) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "" => {}
            "pause" => controller.pause(),
            "resume" => controller.resume(),
            "abort" | "quit" => {
                controller.abort();
                break;
            }
            text => match Move::from_uci(text) {
                Some(mv) => {
                    if !controller.submit_human_move(mv) {
                        break;
                    }
                }
                None => eprintln!("Not a move: {}", text),
            },
        }
    }
}
