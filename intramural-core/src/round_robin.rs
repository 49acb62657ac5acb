use crate::{Error, Generator, Phase, Result, RoundPlan, Spot, TournamentState};

/// A round robin tournament where every team plays every other team exactly once.
///
/// All rounds are created when the tournament starts. With an odd number of teams, one team is
/// idle every round; no match is created for it.
#[derive(Copy, Clone, Debug, Default)]
pub struct RoundRobin;

impl RoundRobin {
    /// Returns the team index sitting at position `index` of a circle of `n` teams in `round`.
    #[inline]
    fn circle_entrant(n: usize, round: usize, index: usize) -> usize {
        debug_assert!(n % 2 == 0);

        if index == 0 {
            return 0;
        }

        match index as isize - round as isize {
            res if res <= 0 => n - (res.unsigned_abs()) - 1,
            res => res as usize,
        }
    }
}

impl Generator for RoundRobin {
    fn initial(&self, state: &TournamentState) -> Result<Vec<RoundPlan>> {
        let teams = state.teams().ids();
        if teams.len() < 2 {
            return Err(Error::InvalidFormatState("at least two teams are required"));
        }

        log::debug!("Creating round robin schedule for {} teams", teams.len());

        // teams.len() if even, teams.len() + 1 if odd.
        let teams_even = teams.len() + teams.len() % 2;
        let num_rounds = teams_even - 1;

        // Pin team 0 and rotate everybody else once per round. Every round pairs the upper half
        // of the circle with the lower half.
        let mut plans = Vec::with_capacity(num_rounds);
        for round in 0..num_rounds {
            let mut slots = Vec::with_capacity(teams_even / 2);

            for index in 0..teams_even / 2 {
                let first = Self::circle_entrant(teams_even, round, index);
                let second = Self::circle_entrant(teams_even, round, teams_even - index - 1);

                // The padding entrant sits out.
                if let (Some(first), Some(second)) = (teams.get(first), teams.get(second)) {
                    slots.push([Spot::Team(*first), Spot::Team(*second)]);
                }
            }

            plans.push(RoundPlan::new(Phase::RoundRobin(round as u32 + 1), slots));
        }

        Ok(plans)
    }

    #[inline]
    fn next(&self, _state: &TournamentState) -> Result<Vec<RoundPlan>> {
        Ok(Vec::new())
    }
}
