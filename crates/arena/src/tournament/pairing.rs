//! Pairing schedules and the score table they are built from.
//!
//! Players are referred to by their index in the entry list. Every choice
//! is deterministic: ties in color allocation and drawn knockout games go to
//! the better-placed player.

use chess_core::Color;
use chess_rules::GameResult;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};

/// How a tournament pairs its players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TournamentFormat {
    /// Everyone meets everyone, twice with colors reversed when `double`.
    RoundRobin {
        #[serde(default)]
        double: bool,
    },
    /// A fixed number of rounds pairing players on equal scores.
    Swiss { rounds: u32 },
    /// Single elimination from a seeded bracket.
    Knockout,
}

impl Default for TournamentFormat {
    fn default() -> Self {
        TournamentFormat::RoundRobin { double: false }
    }
}

/// One player's line in the score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub name: String,
    /// Score counted in half points so draws stay exact.
    pub half_points: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub byes: u32,
    /// Colors played, in round order.
    pub colors: Vec<Color>,
    /// Entry indexes of the opponents met, in round order.
    pub opponents: Vec<usize>,
}

impl Standing {
    fn new(name: String) -> Self {
        Self {
            name,
            half_points: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            byes: 0,
            colors: Vec::new(),
            opponents: Vec::new(),
        }
    }

    pub fn score(&self) -> f64 {
        f64::from(self.half_points) / 2.0
    }

    pub fn games(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    /// Black games minus white games.
    fn color_balance(&self) -> i64 {
        self.colors
            .iter()
            .map(|c| match c {
                Color::White => -1,
                Color::Black => 1,
            })
            .sum()
    }
}

/// A game to be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub round: u32,
    pub white: usize,
    pub black: usize,
}

/// The games of one round plus any players sitting it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub number: u32,
    pub pairings: Vec<Pairing>,
    /// Players advanced or scored without playing.
    pub byes: Vec<usize>,
}

/// All rounds of a round robin by the circle method.
///
/// With an odd count a phantom entry is added and its opponent sits out.
pub fn round_robin(players: usize, double: bool) -> Vec<Vec<(usize, usize)>> {
    let mut circle: Vec<Option<usize>> = (0..players).map(Some).collect();
    if players % 2 == 1 {
        circle.push(None);
    }
    let size = circle.len();
    if size < 2 {
        return Vec::new();
    }

    let mut rounds = Vec::with_capacity(size - 1);
    for round in 0..size - 1 {
        let mut pairs = Vec::with_capacity(size / 2);
        for i in 0..size / 2 {
            let (Some(a), Some(b)) = (circle[i], circle[size - 1 - i]) else {
                continue;
            };
            // The fixed seat swaps color every round, the others by board.
            let flip = if i == 0 { round % 2 == 1 } else { i % 2 == 1 };
            pairs.push(if flip { (b, a) } else { (a, b) });
        }
        rounds.push(pairs);
        circle[1..].rotate_right(1);
    }

    if double {
        let reversed: Vec<Vec<(usize, usize)>> = rounds
            .iter()
            .map(|pairs| pairs.iter().map(|&(w, b)| (b, w)).collect())
            .collect();
        rounds.extend(reversed);
    }
    rounds
}

/// Key for the set of pairs that already met.
fn pair_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Entry indexes ordered best first: score, then wins, then name.
fn ranked(standings: &[Standing]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..standings.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (&standings[a], &standings[b]);
        (Reverse(sa.half_points), Reverse(sa.wins), &sa.name).cmp(&(
            Reverse(sb.half_points),
            Reverse(sb.wins),
            &sb.name,
        ))
    });
    order
}

/// Pairs one Swiss round.
///
/// Players are ranked by score and paired top down, avoiding rematches
/// where any rematch-free pairing exists. With an odd count the lowest
/// ranked player without a bye sits out.
pub fn swiss_round(
    standings: &[Standing],
    played: &HashSet<(usize, usize)>,
) -> (Vec<(usize, usize)>, Option<usize>) {
    let mut order = ranked(standings);

    let mut bye = None;
    if order.len() % 2 == 1 {
        let pick = order
            .iter()
            .rposition(|&p| standings[p].byes == 0)
            .unwrap_or(order.len() - 1);
        bye = Some(order.remove(pick));
    }

    let pairs = pair_without_rematch(&order, played)
        .unwrap_or_else(|| order.chunks(2).map(|c| (c[0], c[1])).collect());
    let pairs = pairs
        .into_iter()
        .map(|(a, b)| assign_colors(standings, a, b))
        .collect();
    (pairs, bye)
}

fn pair_without_rematch(
    players: &[usize],
    played: &HashSet<(usize, usize)>,
) -> Option<Vec<(usize, usize)>> {
    let Some((&first, rest)) = players.split_first() else {
        return Some(Vec::new());
    };
    for (i, &other) in rest.iter().enumerate() {
        if played.contains(&pair_key(first, other)) {
            continue;
        }
        let remaining: Vec<usize> = rest
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, &p)| p)
            .collect();
        if let Some(mut pairs) = pair_without_rematch(&remaining, played) {
            pairs.insert(0, (first, other));
            return Some(pairs);
        }
    }
    None
}

/// Orders `(a, b)` as `(white, black)`. `a` is the better-ranked player.
fn assign_colors(standings: &[Standing], a: usize, b: usize) -> (usize, usize) {
    let (sa, sb) = (&standings[a], &standings[b]);
    let black_last = |s: &Standing| s.colors.last() == Some(&Color::Black);
    match sa.color_balance().cmp(&sb.color_balance()) {
        Ordering::Greater => (a, b),
        Ordering::Less => (b, a),
        Ordering::Equal if black_last(sb) && !black_last(sa) => (b, a),
        Ordering::Equal => (a, b),
    }
}

/// First knockout round. Seed `i` meets seed `size - 1 - i`, where `size`
/// is the next power of two; seeds without an opponent get a bye.
pub fn knockout_bracket(players: usize) -> Vec<(usize, Option<usize>)> {
    let size = players.next_power_of_two();
    (0..size / 2)
        .filter(|&i| i < players)
        .map(|i| {
            let other = size - 1 - i;
            (i, (other < players).then_some(other))
        })
        .collect()
}

/// Tournament progress: the score table and what the next round holds.
#[derive(Debug, Clone)]
pub struct Tournament {
    format: TournamentFormat,
    standings: Vec<Standing>,
    round: u32,
    played: HashSet<(usize, usize)>,
    schedule: Vec<Vec<(usize, usize)>>,
    /// Current knockout round as (white or bye player, opponent).
    bracket: Vec<(usize, Option<usize>)>,
    /// Knockout winners by pairing.
    winners: HashMap<(usize, usize), usize>,
    /// Knockout losers in elimination order.
    eliminated: Vec<usize>,
    finished: bool,
}

impl Tournament {
    pub fn new(format: TournamentFormat, names: Vec<String>) -> Self {
        let schedule = match format {
            TournamentFormat::RoundRobin { double } => round_robin(names.len(), double),
            _ => Vec::new(),
        };
        Self {
            format,
            standings: names.into_iter().map(Standing::new).collect(),
            round: 0,
            played: HashSet::new(),
            schedule,
            bracket: Vec::new(),
            winners: HashMap::new(),
            eliminated: Vec::new(),
            finished: false,
        }
    }

    pub fn format(&self) -> TournamentFormat {
        self.format
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn name(&self, player: usize) -> &str {
        &self.standings[player].name
    }

    /// Starts the next round. Returns `None` once the tournament is over.
    ///
    /// All games of the current round must be recorded first.
    pub fn next_round(&mut self) -> Option<Round> {
        if self.finished {
            return None;
        }
        let number = self.round + 1;
        let (pairs, byes): (Vec<(usize, usize)>, Vec<usize>) = match self.format {
            TournamentFormat::RoundRobin { .. } => {
                let Some(pairs) = self.schedule.get(self.round as usize) else {
                    return self.finish();
                };
                (pairs.clone(), Vec::new())
            }
            TournamentFormat::Swiss { rounds } => {
                if self.round >= rounds || self.standings.len() < 2 {
                    return self.finish();
                }
                let (pairs, bye) = swiss_round(&self.standings, &self.played);
                if let Some(p) = bye {
                    let standing = &mut self.standings[p];
                    standing.byes += 1;
                    standing.wins += 1;
                    standing.half_points += 2;
                }
                (pairs, bye.into_iter().collect())
            }
            TournamentFormat::Knockout => {
                let bracket = if self.round == 0 {
                    knockout_bracket(self.standings.len())
                } else {
                    let advancing = self.advancing();
                    advancing
                        .chunks(2)
                        .map(|c| (c[0], c.get(1).copied()))
                        .collect()
                };
                if bracket.len() < 2 && bracket.iter().all(|(_, b)| b.is_none()) {
                    return self.finish();
                }
                let pairs = bracket.iter().filter_map(|&(w, b)| Some((w, b?))).collect();
                let byes = bracket
                    .iter()
                    .filter(|(_, b)| b.is_none())
                    .map(|&(w, _)| w)
                    .collect();
                self.bracket = bracket;
                (pairs, byes)
            }
        };

        self.round = number;
        Some(Round {
            number,
            pairings: pairs
                .into_iter()
                .map(|(white, black)| Pairing {
                    round: number,
                    white,
                    black,
                })
                .collect(),
            byes,
        })
    }

    fn finish(&mut self) -> Option<Round> {
        self.finished = true;
        None
    }

    /// Knockout players through to the next round, in bracket order.
    fn advancing(&self) -> Vec<usize> {
        self.bracket
            .iter()
            .filter_map(|&(w, b)| match b {
                None => Some(w),
                Some(b) => self.winners.get(&(w, b)).copied(),
            })
            .collect()
    }

    /// Scores a finished game.
    ///
    /// Unfinished or aborted games score nothing. In a knockout a game
    /// without a winner sends the white player, the better seed, through.
    pub fn record(&mut self, pairing: &Pairing, result: GameResult) {
        let (w, b) = (pairing.white, pairing.black);
        self.played.insert(pair_key(w, b));

        let scored = result.is_draw() || result.winner().is_some();
        if scored {
            for (player, color, opponent) in [(w, Color::White, b), (b, Color::Black, w)] {
                let standing = &mut self.standings[player];
                standing.colors.push(color);
                standing.opponents.push(opponent);
                match result.winner() {
                    Some(winner) if winner == color => {
                        standing.wins += 1;
                        standing.half_points += 2;
                    }
                    Some(_) => standing.losses += 1,
                    None => {
                        standing.draws += 1;
                        standing.half_points += 1;
                    }
                }
            }
        }

        if self.format == TournamentFormat::Knockout {
            let (winner, loser) = match result.winner() {
                Some(Color::Black) => (b, w),
                _ => (w, b),
            };
            self.winners.insert((w, b), winner);
            self.eliminated.push(loser);
        }
    }

    /// The score table, best first.
    ///
    /// Knockout tables list players still in first, then the rest by how
    /// late they went out.
    pub fn standings(&self) -> Vec<Standing> {
        let mut order = ranked(&self.standings);
        if self.format == TournamentFormat::Knockout {
            let out_at = |p: usize| {
                self.eliminated
                    .iter()
                    .position(|&e| e == p)
                    .map_or(0, |i| self.eliminated.len() - i)
            };
            order.sort_by_key(|&p| out_at(p));
        }
        order
            .into_iter()
            .map(|p| self.standings[p].clone())
            .collect()
    }

    /// The tournament winner, once finished.
    pub fn winner(&self) -> Option<Standing> {
        if !self.finished {
            return None;
        }
        self.standings().into_iter().next()
    }
}
