use chrono::{DateTime, Utc};

use crate::{Entrant, MatchId, Phase, RoundId, Slot, Spot, TeamId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The status of a [`Match`]. The status is derived from the match data and never stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchStatus {
    /// At least one slot is still waiting for its placeholder to resolve.
    AwaitingTeams,
    /// Both teams are known, no time is set.
    Scheduled,
    /// Both teams are known and a time is set.
    TimeSet,
    /// A result was reported.
    Reported,
}

/// A match between two slots.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    id: MatchId,
    round: RoundId,
    slots: [Slot; 2],
    scheduled: Option<DateTime<Utc>>,
    score: Option<[u64; 2]>,
    /// Whether each side confirmed the scheduled time.
    confirmed: [bool; 2],
}

impl Match {
    pub(crate) fn new(id: MatchId, round: RoundId, spots: [Spot; 2]) -> Self {
        Self {
            id,
            round,
            slots: [Slot::new(spots[0]), Slot::new(spots[1])],
            scheduled: None,
            score: None,
            confirmed: [false; 2],
        }
    }

    #[inline]
    pub fn id(&self) -> MatchId {
        self.id
    }

    #[inline]
    pub fn round(&self) -> RoundId {
        self.round
    }

    #[inline]
    pub fn slots(&self) -> &[Slot; 2] {
        &self.slots
    }

    #[inline]
    pub(crate) fn slots_mut(&mut self) -> &mut [Slot; 2] {
        &mut self.slots
    }

    #[inline]
    pub fn scheduled(&self) -> Option<DateTime<Utc>> {
        self.scheduled
    }

    #[inline]
    pub fn score(&self) -> Option<[u64; 2]> {
        self.score
    }

    #[inline]
    pub fn confirmed(&self) -> [bool; 2] {
        self.confirmed
    }

    #[inline]
    pub fn is_reported(&self) -> bool {
        self.score.is_some()
    }

    /// Returns `true` if both slots are resolved.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.slots.iter().all(Slot::is_resolved)
    }

    pub fn status(&self) -> MatchStatus {
        if self.score.is_some() {
            MatchStatus::Reported
        } else if !self.is_resolved() {
            MatchStatus::AwaitingTeams
        } else if self.scheduled.is_some() {
            MatchStatus::TimeSet
        } else {
            MatchStatus::Scheduled
        }
    }

    /// Returns both teams if both slots resolved to a team.
    pub fn teams(&self) -> Option<[TeamId; 2]> {
        match (self.slots[0].team(), self.slots[1].team()) {
            (Some(a), Some(b)) => Some([a, b]),
            _ => None,
        }
    }

    /// Returns `true` if `team` occupies one of the slots.
    #[inline]
    pub fn contains(&self, team: TeamId) -> bool {
        self.side(team).is_some()
    }

    /// Returns the index of the slot occupied by `team`.
    pub fn side(&self, team: TeamId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.team() == Some(team))
    }

    /// Returns the entrant in the slot opposite of `team`.
    pub fn opponent(&self, team: TeamId) -> Option<Entrant> {
        let side = self.side(team)?;
        self.slots[1 - side].entrant()
    }

    /// Returns `true` if one of the slots resolved to a [`Entrant::Bye`].
    pub fn has_bye(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.entrant() == Some(Entrant::Bye))
    }

    /// Returns the index of the winning slot. Returns `None` if the match is not decided yet or
    /// ended in a draw.
    pub fn winner_index(&self) -> Option<usize> {
        let a = self.slots[0].entrant()?;
        let b = self.slots[1].entrant()?;

        match (a, b) {
            (Entrant::Bye, Entrant::Bye) => Some(0),
            (Entrant::Bye, _) => Some(1),
            (_, Entrant::Bye) => Some(0),
            _ => {
                let score = self.score?;
                match score[0].cmp(&score[1]) {
                    std::cmp::Ordering::Greater => Some(0),
                    std::cmp::Ordering::Less => Some(1),
                    std::cmp::Ordering::Equal => None,
                }
            }
        }
    }

    /// Returns the winning entrant. A match between two byes is won by a bye.
    pub fn winner(&self) -> Option<Entrant> {
        let index = self.winner_index()?;
        self.slots[index].entrant()
    }

    /// Returns the losing entrant. A match against a bye is lost by the bye.
    pub fn loser(&self) -> Option<Entrant> {
        let index = self.winner_index()?;
        self.slots[1 - index].entrant()
    }

    pub(crate) fn set_score(&mut self, score: [u64; 2]) {
        self.score = Some(score);
    }

    /// Sets the scheduled time. Returns `false` if the time did not change. Changing the time
    /// resets the confirmations of both sides.
    pub(crate) fn set_scheduled(&mut self, time: DateTime<Utc>) -> bool {
        if self.scheduled == Some(time) {
            return false;
        }

        self.scheduled = Some(time);
        self.confirmed = [false; 2];
        true
    }

    pub(crate) fn confirm(&mut self, side: usize) {
        self.confirmed[side] = true;
    }
}

/// A round of matches sharing a [`Phase`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Round {
    pub id: RoundId,
    pub phase: Phase,
    pub matches: Vec<MatchId>,
}

/// A round that has not been created yet.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundPlan {
    pub phase: Phase,
    pub slots: Vec<[Spot; 2]>,
}

impl RoundPlan {
    #[inline]
    pub fn new(phase: Phase, slots: Vec<[Spot; 2]>) -> Self {
        Self { phase, slots }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Match, MatchStatus};
    use crate::{Entrant, MatchId, RoundId, Spot, TeamId};

    fn team(id: u64) -> Spot {
        Spot::Team(TeamId(id))
    }

    #[test]
    fn test_match_status() {
        let mut m = Match::new(MatchId(0), RoundId(0), [team(0), Spot::WinnerOf(MatchId(1))]);
        assert_eq!(m.status(), MatchStatus::AwaitingTeams);

        m.slots_mut()[1].resolve(Entrant::Team(TeamId(1))).unwrap();
        assert_eq!(m.status(), MatchStatus::Scheduled);

        assert!(m.set_scheduled(Utc.with_ymd_and_hms(2023, 1, 1, 18, 0, 0).unwrap()));
        assert_eq!(m.status(), MatchStatus::TimeSet);

        m.set_score([1, 0]);
        assert_eq!(m.status(), MatchStatus::Reported);
    }

    #[test]
    fn test_match_winner() {
        let mut m = Match::new(MatchId(0), RoundId(0), [team(0), team(1)]);
        assert_eq!(m.winner(), None);

        m.set_score([1, 3]);
        assert_eq!(m.winner(), Some(Entrant::Team(TeamId(1))));
        assert_eq!(m.loser(), Some(Entrant::Team(TeamId(0))));

        let mut m = Match::new(MatchId(0), RoundId(0), [team(0), team(1)]);
        m.set_score([2, 2]);
        assert_eq!(m.winner(), None);
        assert_eq!(m.loser(), None);

        let m = Match::new(MatchId(0), RoundId(0), [Spot::Bye, team(1)]);
        assert_eq!(m.winner(), Some(Entrant::Team(TeamId(1))));
        assert_eq!(m.loser(), Some(Entrant::Bye));

        let m = Match::new(MatchId(0), RoundId(0), [Spot::Bye, Spot::Bye]);
        assert_eq!(m.winner(), Some(Entrant::Bye));
        assert_eq!(m.loser(), Some(Entrant::Bye));
    }

    #[test]
    fn test_match_scheduled_resets_confirmations() {
        let time = Utc.with_ymd_and_hms(2023, 1, 1, 18, 0, 0).unwrap();

        let mut m = Match::new(MatchId(0), RoundId(0), [team(0), team(1)]);
        assert!(m.set_scheduled(time));
        m.confirm(0);
        m.confirm(1);

        assert!(!m.set_scheduled(time));
        assert_eq!(m.confirmed(), [true, true]);

        assert!(m.set_scheduled(time + chrono::Duration::hours(1)));
        assert_eq!(m.confirmed(), [false, false]);
    }

    #[test]
    fn test_match_opponent() {
        let m = Match::new(MatchId(0), RoundId(0), [team(4), Spot::Bye]);
        assert_eq!(m.opponent(TeamId(4)), Some(Entrant::Bye));
        assert_eq!(m.opponent(TeamId(5)), None);
        assert!(m.has_bye());
        assert_eq!(m.teams(), None);
    }
}
