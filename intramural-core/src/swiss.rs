use std::collections::HashSet;

use crate::standings;
use crate::{
    Entrant, Error, Format, Generator, Phase, Result, RoundPlan, Spot, TeamId, TournamentState,
};

/// A swiss tournament.
///
/// # Implementation notes
///
/// Teams are ordered by their points, then by their Buchholz score (the sum of the points of all
/// opponents they faced), then by their id. The first round therefore pairs teams in
/// registration order.
///
/// Every team is paired with the nearest team below it it has not met yet. If that leaves the
/// remaining teams unpairable, the next candidate is tried. If no pairing without a rematch
/// exists, teams are paired with their neighbours.
///
/// With an odd number of teams, the lowest ranked team that did not have a bye yet receives one.
#[derive(Copy, Clone, Debug, Default)]
pub struct Swiss;

impl Swiss {
    /// Returns the number of rounds to play.
    fn target(state: &TournamentState) -> usize {
        match state.config().rounds {
            Some(rounds) => rounds as usize,
            None => default_rounds(state.teams().len()),
        }
    }

    fn plan(state: &TournamentState, number: u32) -> Result<RoundPlan> {
        let standings = standings::compute(state, Format::Swiss)?;
        let order: Vec<TeamId> = standings.iter().map(|entry| entry.team).collect();

        let mut met = HashSet::new();
        let mut had_bye = HashSet::new();
        for round in state.rounds() {
            if !matches!(round.phase, Phase::Swiss(_)) {
                continue;
            }

            for m in state.round_matches(round.id) {
                let [a, b] = m.slots();
                match (a.entrant(), b.entrant()) {
                    (Some(Entrant::Team(a)), Some(Entrant::Team(b))) => {
                        met.insert(key(a, b));
                    }
                    (Some(Entrant::Team(team)), Some(Entrant::Bye))
                    | (Some(Entrant::Bye), Some(Entrant::Team(team))) => {
                        had_bye.insert(team);
                    }
                    _ => (),
                }
            }
        }

        let mut slots = Vec::with_capacity(order.len() / 2 + 1);

        if order.len() % 2 == 0 {
            let pairs = pair(&order, &met).unwrap_or_else(|| {
                log::debug!("No pairing without rematches for round {}", number);
                adjacent(&order)
            });

            slots.extend(pairs.into_iter().map(to_spots));
        } else {
            // Bye candidates from the bottom of the table, teams without a bye first.
            let mut candidates: Vec<TeamId> = order
                .iter()
                .rev()
                .filter(|team| !had_bye.contains(*team))
                .copied()
                .collect();
            candidates.extend(order.iter().rev().filter(|team| had_bye.contains(*team)));

            let rest = |bye: TeamId| -> Vec<TeamId> {
                order.iter().copied().filter(|team| *team != bye).collect()
            };

            let found = candidates
                .iter()
                .find_map(|bye| pair(&rest(*bye), &met).map(|pairs| (*bye, pairs)));

            let (bye, pairs) = match found {
                Some(found) => found,
                None => {
                    log::debug!("No pairing without rematches for round {}", number);

                    let bye = *candidates
                        .first()
                        .ok_or(Error::InvalidFormatState("no teams to pair"))?;
                    (bye, adjacent(&rest(bye)))
                }
            };

            slots.extend(pairs.into_iter().map(to_spots));
            slots.push([Spot::Team(bye), Spot::Bye]);
        }

        log::debug!("Paired Swiss round {}: {:?}", number, slots);

        Ok(RoundPlan::new(Phase::Swiss(number), slots))
    }
}

impl Generator for Swiss {
    fn initial(&self, state: &TournamentState) -> Result<Vec<RoundPlan>> {
        if state.teams().len() < 2 {
            return Err(Error::InvalidFormatState("at least two teams are required"));
        }

        Ok(vec![Self::plan(state, 1)?])
    }

    fn next(&self, state: &TournamentState) -> Result<Vec<RoundPlan>> {
        let mut played = 0;
        let mut last = None;
        for round in state.rounds() {
            match round.phase {
                Phase::Swiss(_) => {
                    played += 1;
                    last = Some(round.id);
                }
                // The main stage ends with the first playoff round.
                Phase::Playoff(_) => return Ok(Vec::new()),
                _ => (),
            }
        }

        let last = match last {
            Some(last) => last,
            None => return Ok(Vec::new()),
        };

        if played >= Self::target(state) {
            return Ok(Vec::new());
        }

        if !state.is_round_complete(last) {
            return Err(Error::RoundNotComplete);
        }

        Ok(vec![Self::plan(state, played as u32 + 1)?])
    }
}

#[inline]
fn key(a: TeamId, b: TeamId) -> (TeamId, TeamId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[inline]
fn to_spots(pair: [TeamId; 2]) -> [Spot; 2] {
    [Spot::Team(pair[0]), Spot::Team(pair[1])]
}

/// Pairs `teams` in order without rematches, backtracking when a choice leaves the remaining
/// teams unpairable.
fn pair(teams: &[TeamId], met: &HashSet<(TeamId, TeamId)>) -> Option<Vec<[TeamId; 2]>> {
    let (first, rest) = match teams.split_first() {
        Some(split) => split,
        None => return Some(Vec::new()),
    };

    for (index, other) in rest.iter().enumerate() {
        if met.contains(&key(*first, *other)) {
            continue;
        }

        let mut remaining = rest.to_vec();
        remaining.remove(index);

        if let Some(mut pairs) = pair(&remaining, met) {
            pairs.insert(0, [*first, *other]);
            return Some(pairs);
        }
    }

    None
}

fn adjacent(teams: &[TeamId]) -> Vec<[TeamId; 2]> {
    teams.chunks_exact(2).map(|c| [c[0], c[1]]).collect()
}

/// `ceil(log2(teams))` rounds, at least one.
fn default_rounds(teams: usize) -> usize {
    match teams {
        0..=2 => 1,
        n => (usize::BITS - (n - 1).leading_zeros()) as usize,
    }
}
