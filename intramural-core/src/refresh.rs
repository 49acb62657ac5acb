//! Round refresh
//!
//! A refresh brings the bracket up to date with the reported results: placeholder slots whose
//! source is decided are resolved, matches against a bye are settled and, with
//! [`RefreshScope::Full`], the format is asked for new rounds. A refresh is idempotent; running
//! it twice without new results changes nothing.
use crate::standings;
use crate::{Entrant, Error, MatchId, Result, Spot, TournamentState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RefreshScope {
    /// Only resolve placeholders and settle byes.
    Placeholders,
    /// Also generate new rounds.
    Full,
}

/// What a refresh changed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RefreshReport {
    /// The number of slots that were resolved.
    pub resolved: usize,
    /// The number of bye matches that were settled.
    pub settled: usize,
    /// The number of rounds that were appended.
    pub rounds_created: usize,
}

impl RefreshReport {
    /// Returns `true` if nothing changed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resolved == 0 && self.settled == 0 && self.rounds_created == 0
    }

    /// Adds the counts of `other` to this report.
    pub fn merge(&mut self, other: RefreshReport) {
        self.resolved += other.resolved;
        self.settled += other.settled;
        self.rounds_created += other.rounds_created;
    }
}

/// Refreshes the tournament.
///
/// # Errors
///
/// Returns [`Error::BracketCorrupt`] if the tournament is halted or the refresh finds an
/// inconsistent bracket. In the latter case the tournament is halted.
pub fn refresh(state: &mut TournamentState, scope: RefreshScope) -> Result<RefreshReport> {
    if let Some(reason) = state.corruption() {
        return Err(Error::BracketCorrupt(reason.to_owned()));
    }

    match run(state, scope) {
        Err(Error::BracketCorrupt(reason)) => {
            log::warn!("Halting tournament {}: {}", state.id(), reason);

            state.halt(reason.clone());
            Err(Error::BracketCorrupt(reason))
        }
        res => res,
    }
}

fn run(state: &mut TournamentState, scope: RefreshScope) -> Result<RefreshReport> {
    let mut report = RefreshReport::default();

    loop {
        loop {
            let resolved = resolve(state)?;
            let settled = settle_byes(state);

            report.resolved += resolved;
            report.settled += settled;

            if resolved == 0 && settled == 0 {
                break;
            }
        }

        if scope == RefreshScope::Placeholders || state.rounds().is_empty() {
            break;
        }

        let plans = match state.format().generator().next(state) {
            Ok(plans) => plans,
            // Not an error for a refresh; the next result continues.
            Err(Error::RoundNotComplete) => Vec::new(),
            Err(err) => return Err(err),
        };

        if plans.is_empty() {
            break;
        }

        for plan in plans {
            state.create_round(plan.phase, plan.slots)?;
            report.rounds_created += 1;
        }
    }

    if !report.is_empty() {
        log::debug!("Refreshed tournament {}: {:?}", state.id(), report);
    }

    Ok(report)
}

/// Returns the entrant a placeholder resolves to, or `None` if its source is not decided yet.
fn source(state: &TournamentState, spot: Spot) -> Result<Option<Entrant>> {
    match spot {
        Spot::Team(team) => Ok(Some(Entrant::Team(team))),
        Spot::Bye => Ok(Some(Entrant::Bye)),
        Spot::WinnerOf(id) | Spot::LoserOf(id) => {
            let m = state.get_match(id).ok_or_else(|| {
                Error::BracketCorrupt(format!("slot references missing match {}", id))
            })?;

            if !m.is_reported() {
                return Ok(None);
            }

            // A drawn match has neither winner nor loser.
            Ok(match spot {
                Spot::WinnerOf(_) => m.winner(),
                _ => m.loser(),
            })
        }
        Spot::RankAfter { round, rank } => {
            let complete = state
                .rounds()
                .iter()
                .take_while(|r| r.id <= round)
                .all(|r| state.is_round_complete(r.id));

            if !complete {
                return Ok(None);
            }

            let standings = standings::compute_through(state, round)?;
            Ok(Some(match standings.team_at(rank) {
                Some(team) => Entrant::Team(team),
                None => Entrant::Bye,
            }))
        }
    }
}

/// Resolves all placeholders whose source is decided and verifies the ones already resolved.
fn resolve(state: &mut TournamentState) -> Result<usize> {
    let mut resolved = 0;

    for index in 0..state.matches.len() {
        let id = MatchId(index as u64);

        for side in 0..2 {
            let slot = state.matches[index].slots()[side];
            if !slot.spot().is_placeholder() {
                continue;
            }

            let source = source(state, slot.spot())?;

            match (slot.entrant(), source) {
                (None, Some(entrant)) => {
                    state.matches[index].slots_mut()[side].resolve(entrant)?;
                    resolved += 1;

                    log::debug!(
                        "Resolved slot {} of match {} ({:?}) to {:?}",
                        side,
                        id,
                        slot.spot(),
                        entrant
                    );
                }
                (Some(current), Some(entrant)) if current != entrant => {
                    return Err(Error::BracketCorrupt(format!(
                        "slot {} of match {} holds {:?}, but {:?} resolves to {:?}",
                        side,
                        id,
                        current,
                        slot.spot(),
                        entrant
                    )));
                }
                (Some(current), None) => {
                    return Err(Error::BracketCorrupt(format!(
                        "slot {} of match {} holds {:?}, but {:?} is undecided",
                        side,
                        id,
                        current,
                        slot.spot()
                    )));
                }
                _ => (),
            }
        }

        if let Some([a, b]) = state.matches[index].teams() {
            if a == b {
                return Err(Error::BracketCorrupt(format!(
                    "team {} faces itself in match {}",
                    a, id
                )));
            }
        }
    }

    Ok(resolved)
}

/// Scores every unreported match against a bye.
fn settle_byes(state: &mut TournamentState) -> usize {
    let mut settled = 0;

    for m in state.matches.iter_mut() {
        if m.is_reported() || !m.is_resolved() || !m.has_bye() {
            continue;
        }

        let score = match m.slots().map(|slot| slot.entrant()) {
            [Some(Entrant::Bye), Some(Entrant::Bye)] => [0, 0],
            [Some(Entrant::Bye), _] => [0, 1],
            _ => [1, 0],
        };

        log::debug!("Settling bye match {} as {:?}", m.id(), score);

        m.set_score(score);
        settled += 1;
    }

    settled
}

#[cfg(test)]
mod tests {
    use super::{RefreshReport, RefreshScope};
    use crate::tests::tournament;
    use crate::{
        Entrant, Error, Format, MatchId, MatchStatus, Phase, RoundId, Spot, TeamId,
    };

    #[test]
    fn test_refresh_idempotent() {
        let mut state = tournament(Format::DoubleElimination, 6);
        state.start().unwrap();
        state.report_result(MatchId(1), 2, 0).unwrap();

        let before = state.clone();
        assert_eq!(
            state.refresh(RefreshScope::Full),
            Ok(RefreshReport::default())
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_refresh_resolves_on_report() {
        let mut state = tournament(Format::DoubleElimination, 4);
        state.start().unwrap();

        // Losers round 1 waits for both winners round 1 matches.
        state.report_result(MatchId(0), 2, 1).unwrap();
        assert_eq!(state.matches()[3].status(), MatchStatus::AwaitingTeams);
        assert_eq!(
            state.matches()[3].slots()[0].entrant(),
            Some(Entrant::Team(TeamId(3)))
        );

        let report = state.report_result(MatchId(1), 0, 2).unwrap();
        assert_eq!(report.resolved, 2);
        assert_eq!(state.matches()[3].teams(), Some([TeamId(3), TeamId(1)]));
        assert_eq!(state.matches()[2].teams(), Some([TeamId(0), TeamId(2)]));
    }

    #[test]
    fn test_refresh_rank_after() {
        let mut state = tournament(Format::RoundRobin, 3);
        state.start().unwrap();

        let last = RoundId(state.rounds().len() as u64 - 1);
        state
            .create_round(
                Phase::Playoff(1),
                vec![[
                    Spot::RankAfter {
                        round: last,
                        rank: 1,
                    },
                    Spot::RankAfter {
                        round: last,
                        rank: 4,
                    },
                ]],
            )
            .unwrap();

        let playoff = MatchId(state.matches().len() as u64 - 1);
        for id in 0..playoff.0 {
            state.report_result(MatchId(id), 1, 0).unwrap();
        }

        // Rank 4 does not exist with three teams and turns into a bye.
        let m = &state.matches()[playoff.0 as usize];
        assert_eq!(m.slots()[1].entrant(), Some(Entrant::Bye));
        assert!(m.is_reported());
    }

    #[test]
    fn test_refresh_corruption() {
        let mut state = tournament(Format::DoubleElimination, 4);
        state.start().unwrap();
        state.report_result(MatchId(0), 2, 1).unwrap();

        // Tamper with a resolved slot.
        state.matches[2].slots_mut()[0] = crate::Slot::new(Spot::WinnerOf(MatchId(0)));
        state.matches[2].slots_mut()[0]
            .resolve(Entrant::Team(TeamId(3)))
            .unwrap();

        assert!(matches!(
            state.refresh(RefreshScope::Placeholders),
            Err(Error::BracketCorrupt(_))
        ));
        assert!(state.is_halted());

        assert!(matches!(
            state.report_result(MatchId(1), 2, 1),
            Err(Error::BracketCorrupt(_))
        ));

        state.matches[2].slots_mut()[0] = crate::Slot::new(Spot::WinnerOf(MatchId(0)));
        state.clear_corruption();
        assert_eq!(
            state.refresh(RefreshScope::Placeholders).unwrap().resolved,
            1
        );
    }
}
