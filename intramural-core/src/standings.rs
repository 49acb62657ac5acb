//! Standings
//!
//! Standings are computed from scratch from the reported matches of the main stage every time
//! they are requested. Playoff rounds never count.
use std::borrow::Cow;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display, Formatter};

use crate::double_elimination;
use crate::{Entrant, Error, Format, Phase, Result, RoundId, TeamId, TournamentState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The rank and statistics of a single team.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StandingEntry {
    pub team: TeamId,
    /// The 1-based rank.
    pub rank: usize,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub byes: u64,
    pub points: u64,
    pub score_diff: i64,
    /// Buchholz score for Swiss and round robin, elimination depth for double elimination.
    pub tiebreak: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Standings {
    format: Format,
    entries: Vec<StandingEntry>,
}

impl Standings {
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, StandingEntry> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the team at the 1-based `rank`.
    pub fn team_at(&self, rank: usize) -> Option<TeamId> {
        let index = rank.checked_sub(1)?;
        self.entries.get(index).map(|entry| entry.team)
    }

    pub fn get(&self, team: TeamId) -> Option<&StandingEntry> {
        self.entries.iter().find(|entry| entry.team == team)
    }

    /// Returns the column names of the table returned by [`rows`].
    ///
    /// [`rows`]: Self::rows
    pub fn keys(&self) -> &'static [&'static str] {
        match self.format {
            Format::Swiss | Format::RoundRobin => &[
                "Rank", "Team", "Wins", "Draws", "Losses", "Byes", "Points", "Buchholz", "Diff",
            ],
            Format::DoubleElimination => &["Rank", "Team", "Wins", "Losses", "Depth"],
        }
    }

    /// Returns the standings as rows of a table, one cell per [`key`]. `name` returns the
    /// display name of a team.
    ///
    /// [`key`]: Self::keys
    pub fn rows<F>(&self, mut name: F) -> Vec<Vec<EntryValue>>
    where
        F: FnMut(TeamId) -> String,
    {
        self.entries
            .iter()
            .map(|entry| match self.format {
                Format::Swiss | Format::RoundRobin => vec![
                    EntryValue::from(entry.rank as u64),
                    name(entry.team).into(),
                    entry.wins.into(),
                    entry.draws.into(),
                    entry.losses.into(),
                    entry.byes.into(),
                    entry.points.into(),
                    entry.tiebreak.into(),
                    entry.score_diff.into(),
                ],
                Format::DoubleElimination => vec![
                    EntryValue::from(entry.rank as u64),
                    name(entry.team).into(),
                    entry.wins.into(),
                    entry.losses.into(),
                    entry.tiebreak.into(),
                ],
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Standings {
    type Item = &'a StandingEntry;
    type IntoIter = std::slice::Iter<'a, StandingEntry>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A single cell of a standings table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryValue {
    I64(i64),
    U64(u64),
    Str(Cow<'static, str>),
}

impl Display for EntryValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::I64(val) => Display::fmt(val, f),
            Self::U64(val) => Display::fmt(val, f),
            Self::Str(val) => Display::fmt(val, f),
        }
    }
}

impl From<i64> for EntryValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<u64> for EntryValue {
    #[inline]
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<&'static str> for EntryValue {
    #[inline]
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for EntryValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

#[derive(Clone, Debug, Default)]
struct Tally {
    wins: u64,
    losses: u64,
    draws: u64,
    byes: u64,
    points: u64,
    score_diff: i64,
    /// Opponents faced, once per match.
    opponents: Vec<TeamId>,
    /// Depth of the match in which the team was eliminated.
    depth: Option<i64>,
}

impl Tally {
    fn played(&self) -> u64 {
        self.wins + self.losses + self.draws
    }
}

/// The score differential of the first side, saturated to the range of an `i64`.
fn score_diff(score: [u64; 2]) -> i64 {
    let diff = i128::from(score[0]) - i128::from(score[1]);
    diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Computes the standings of the tournament.
///
/// # Errors
///
/// Returns [`Error::InvalidFormatState`] if `format` is not the format of the tournament.
pub fn compute(state: &TournamentState, format: Format) -> Result<Standings> {
    compute_inner(state, format, None)
}

/// Computes the standings using only the rounds up to and including `round`.
pub fn compute_through(state: &TournamentState, round: RoundId) -> Result<Standings> {
    compute_inner(state, state.format(), Some(round))
}

fn compute_inner(
    state: &TournamentState,
    format: Format,
    through: Option<RoundId>,
) -> Result<Standings> {
    if format != state.format() {
        return Err(Error::InvalidFormatState(
            "standings requested for a different format",
        ));
    }

    let tallies = tally(state, through);

    let entries = match format {
        Format::Swiss | Format::RoundRobin => points_table(&tallies),
        Format::DoubleElimination => elimination_table(state, &tallies, through),
    };

    Ok(Standings { format, entries })
}

fn tally(state: &TournamentState, through: Option<RoundId>) -> BTreeMap<TeamId, Tally> {
    let mut tallies: BTreeMap<TeamId, Tally> = state
        .teams()
        .ids()
        .into_iter()
        .map(|id| (id, Tally::default()))
        .collect();

    let losers_rounds = state
        .rounds()
        .iter()
        .filter(|round| matches!(round.phase, Phase::Losers(_)))
        .count() as i64;

    for round in state.rounds() {
        if !round.phase.is_main_stage() || through.map_or(false, |through| round.id > through) {
            continue;
        }

        let depth = match round.phase {
            Phase::Losers(n) => n as i64,
            Phase::GrandFinal => losers_rounds + 1,
            Phase::GrandFinalReset => losers_rounds + 2,
            _ => 0,
        };

        for m in state.round_matches(round.id) {
            let score = match m.score() {
                Some(score) => score,
                None => continue,
            };

            let [a, b] = m.slots().map(|slot| slot.entrant());
            match (a, b) {
                (Some(Entrant::Team(a)), Some(Entrant::Team(b))) => {
                    let diff = score_diff(score);
                    let outcome = score[0].cmp(&score[1]);

                    for (team, opponent, diff, outcome) in [
                        (a, b, diff, outcome),
                        (b, a, diff.saturating_neg(), outcome.reverse()),
                    ] {
                        let tally = tallies.entry(team).or_default();
                        tally.opponents.push(opponent);
                        tally.score_diff = tally.score_diff.saturating_add(diff);

                        match outcome {
                            Ordering::Greater => tally.wins += 1,
                            Ordering::Less => {
                                tally.losses += 1;
                                if tally.losses == 2 {
                                    tally.depth = Some(depth);
                                }
                            }
                            Ordering::Equal => tally.draws += 1,
                        }
                    }
                }
                (Some(Entrant::Team(team)), Some(Entrant::Bye))
                | (Some(Entrant::Bye), Some(Entrant::Team(team))) => {
                    tallies.entry(team).or_default().byes += 1;
                }
                _ => (),
            }
        }
    }

    let scoring = state.config().scoring;
    for tally in tallies.values_mut() {
        tally.points = tally.wins * scoring.win
            + tally.draws * scoring.draw
            + tally.losses * scoring.loss
            + tally.byes * scoring.bye;
    }

    tallies
}

fn entry(team: TeamId, tally: &Tally, tiebreak: i64) -> StandingEntry {
    StandingEntry {
        team,
        rank: 0,
        wins: tally.wins,
        losses: tally.losses,
        draws: tally.draws,
        byes: tally.byes,
        points: tally.points,
        score_diff: tally.score_diff,
        tiebreak,
    }
}

fn rank(mut entries: Vec<StandingEntry>) -> Vec<StandingEntry> {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    entries
}

fn points_table(tallies: &BTreeMap<TeamId, Tally>) -> Vec<StandingEntry> {
    let mut entries: Vec<_> = tallies
        .iter()
        .map(|(team, tally)| {
            // Opponents that left the tournament count with 0 points.
            let buchholz: u64 = tally
                .opponents
                .iter()
                .filter_map(|opponent| tallies.get(opponent))
                .map(|opponent| opponent.points)
                .sum();

            entry(*team, tally, buchholz as i64)
        })
        .collect();

    entries.sort_by_key(|entry| (Reverse(entry.points), Reverse(entry.tiebreak), entry.team));
    rank(entries)
}

fn elimination_table(
    state: &TournamentState,
    tallies: &BTreeMap<TeamId, Tally>,
    through: Option<RoundId>,
) -> Vec<StandingEntry> {
    let finalists = match through {
        None => double_elimination::champion(state),
        // The finals are always the last rounds.
        Some(_) => None,
    };

    let mut top = Vec::new();
    let mut alive = Vec::new();
    let mut eliminated = Vec::new();
    let mut unplayed = Vec::new();

    let placed: HashSet<TeamId> = finalists.iter().flat_map(|(a, b)| [*a, *b]).collect();

    if let Some((champion, runner_up)) = finalists {
        for team in [champion, runner_up] {
            if let Some(tally) = tallies.get(&team) {
                top.push(entry(team, tally, tally.depth.unwrap_or_default()));
            }
        }
    }

    for (team, tally) in tallies {
        if placed.contains(team) {
            continue;
        }

        match tally.depth {
            Some(depth) => eliminated.push(entry(*team, tally, depth)),
            None if tally.played() == 0 => unplayed.push(entry(*team, tally, 0)),
            None => alive.push(entry(*team, tally, 0)),
        }
    }

    alive.sort_by_key(|entry| (Reverse(entry.wins), entry.losses, entry.team));
    eliminated.sort_by_key(|entry| (Reverse(entry.tiebreak), Reverse(entry.wins), entry.team));
    unplayed.sort_by_key(|entry| entry.team);

    top.extend(alive);
    top.extend(eliminated);
    top.extend(unplayed);
    rank(top)
}
