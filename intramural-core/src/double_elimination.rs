use crate::{
    Error, Generator, MatchId, Phase, Result, RoundPlan, Spot, TeamId, TournamentState,
};

/// A double elimination tournament.
///
/// The whole bracket is created when the tournament starts. The bracket size is the next power
/// of two of the number of teams; missing teams are filled with byes in the first winners round.
/// The only round created later is the grand final reset, which is played if the team coming
/// from the losers bracket wins the grand final.
#[derive(Copy, Clone, Debug, Default)]
pub struct DoubleElimination;

impl DoubleElimination {
    /// Returns the seeds of a bracket with `size` slots in the order they are placed in the
    /// first round. Neighbouring seeds play each other.
    fn seed_order(size: usize) -> Vec<usize> {
        let mut seeds = vec![1];

        while seeds.len() < size {
            let sum = seeds.len() * 2 + 1;
            seeds = seeds.iter().flat_map(|seed| [*seed, sum - seed]).collect();
        }

        seeds
    }
}

/// Collects rounds while predicting the ids of the matches they will create.
struct Builder {
    next: u64,
    plans: Vec<RoundPlan>,
}

impl Builder {
    fn new(state: &TournamentState) -> Self {
        Self {
            next: state.matches().len() as u64,
            plans: Vec::new(),
        }
    }

    fn round(&mut self, phase: Phase, slots: Vec<[Spot; 2]>) -> Vec<MatchId> {
        let ids = (self.next..self.next + slots.len() as u64)
            .map(MatchId)
            .collect();

        self.next += slots.len() as u64;
        self.plans.push(RoundPlan::new(phase, slots));
        ids
    }
}

fn winners_of(matches: &[MatchId]) -> Vec<[Spot; 2]> {
    matches
        .chunks_exact(2)
        .map(|c| [Spot::WinnerOf(c[0]), Spot::WinnerOf(c[1])])
        .collect()
}

impl Generator for DoubleElimination {
    fn initial(&self, state: &TournamentState) -> Result<Vec<RoundPlan>> {
        let teams = state.teams().ids();
        if teams.len() < 2 {
            return Err(Error::InvalidFormatState("at least two teams are required"));
        }

        let size = teams.len().next_power_of_two();
        let depth = size.trailing_zeros();

        log::debug!(
            "Creating a new DoubleElimination bracket with {} teams (size {})",
            teams.len(),
            size
        );

        let seed = |seed: usize| -> Spot {
            match teams.get(seed - 1) {
                Some(team) => Spot::Team(*team),
                None => Spot::Bye,
            }
        };

        let mut builder = Builder::new(state);

        // Upper bracket.
        let first = Self::seed_order(size)
            .chunks_exact(2)
            .map(|c| [seed(c[0]), seed(c[1])])
            .collect();

        let mut winners = vec![builder.round(Phase::Winners(1), first)];
        for round in 2..=depth {
            let slots = winners_of(&winners[winners.len() - 1]);
            winners.push(builder.round(Phase::Winners(round), slots));
        }

        let upper_final = winners[winners.len() - 1][0];

        let grand_final = if depth >= 2 {
            // Lower bracket.
            let slots = winners[0]
                .chunks_exact(2)
                .map(|c| [Spot::LoserOf(c[0]), Spot::LoserOf(c[1])])
                .collect();

            let mut number = 1;
            let mut losers = builder.round(Phase::Losers(number), slots);

            for round in 2..=depth {
                // Drop the losers of the upper bracket round against the survivors. Reverse the
                // drop order every other round to avoid immediate rematches.
                let mut drops = winners[round as usize - 1].clone();
                if round % 2 == 0 {
                    drops.reverse();
                }

                let slots = drops
                    .iter()
                    .zip(losers.iter())
                    .map(|(drop, survivor)| [Spot::LoserOf(*drop), Spot::WinnerOf(*survivor)])
                    .collect();

                number += 1;
                losers = builder.round(Phase::Losers(number), slots);

                if round < depth {
                    number += 1;
                    losers = builder.round(Phase::Losers(number), winners_of(&losers));
                }
            }

            [Spot::WinnerOf(upper_final), Spot::WinnerOf(losers[0])]
        } else {
            [Spot::WinnerOf(upper_final), Spot::LoserOf(upper_final)]
        };

        builder.round(Phase::GrandFinal, vec![grand_final]);

        log::debug!(
            "Created a new DoubleElimination bracket with {} rounds and {} matches",
            builder.plans.len(),
            builder.next as usize - state.matches().len()
        );

        Ok(builder.plans)
    }

    fn next(&self, state: &TournamentState) -> Result<Vec<RoundPlan>> {
        let mut grand_final = None;
        for round in state.rounds() {
            match round.phase {
                Phase::GrandFinal => grand_final = round.matches.first().copied(),
                Phase::GrandFinalReset => return Ok(Vec::new()),
                _ => (),
            }
        }

        let grand_final = match grand_final.and_then(|id| state.get_match(id)) {
            Some(m) => m,
            None => return Ok(Vec::new()),
        };

        if !grand_final.is_reported() {
            return Err(Error::RoundNotComplete);
        }

        // The team from the lower bracket won the first grand final.
        if grand_final.winner_index() == Some(1) {
            log::debug!("Creating grand final reset after match {}", grand_final.id());

            let id = grand_final.id();
            return Ok(vec![RoundPlan::new(
                Phase::GrandFinalReset,
                vec![[Spot::WinnerOf(id), Spot::LoserOf(id)]],
            )]);
        }

        Ok(Vec::new())
    }
}

/// Returns the team that won the tournament, if it is decided.
pub(crate) fn champion(state: &TournamentState) -> Option<(TeamId, TeamId)> {
    let mut grand_final = None;
    let mut reset = None;
    for round in state.rounds() {
        match round.phase {
            Phase::GrandFinal => grand_final = round.matches.first().copied(),
            Phase::GrandFinalReset => reset = round.matches.first().copied(),
            _ => (),
        }
    }

    let decider = match (reset, grand_final) {
        (Some(reset), _) => state.get_match(reset)?,
        (None, Some(grand_final)) => {
            let m = state.get_match(grand_final)?;
            if m.winner_index() != Some(0) {
                return None;
            }

            m
        }
        (None, None) => return None,
    };

    if !decider.is_reported() {
        return None;
    }

    let winner = decider.winner()?.team()?;
    let loser = decider.loser()?.team()?;
    Some((winner, loser))
}
