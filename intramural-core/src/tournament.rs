//! The tournament state
//!
//! A [`TournamentState`] owns everything scoped to a single tournament: its configuration,
//! registered teams, rounds, matches and reminder schedules. All mutations go through methods on
//! the state which keep the bracket consistent.
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

use crate::refresh::{self, RefreshReport, RefreshScope};
use crate::reminder::{Dispatcher, ReminderOffsets, ReminderSchedule};
use crate::standings::{self, Standings};
use crate::{
    DoubleElimination, Error, Generator, Match, MatchId, Phase, Registry, ReminderHandle, Result,
    Round, RoundId, RoundRobin, Spot, Swiss, Team, TeamId, TeamRef, TournamentId,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Format {
    Swiss,
    RoundRobin,
    DoubleElimination,
}

impl Format {
    /// Returns the [`Generator`] producing the rounds of this format.
    pub fn generator(self) -> &'static dyn Generator {
        match self {
            Self::Swiss => &Swiss,
            Self::RoundRobin => &RoundRobin,
            Self::DoubleElimination => &DoubleElimination,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Swiss => "swiss",
            Self::RoundRobin => "round-robin",
            Self::DoubleElimination => "double-elimination",
        })
    }
}

#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
#[error("invalid format: {0}")]
pub struct ParseFormatError(String);

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "swiss" => Ok(Self::Swiss),
            "round-robin" => Ok(Self::RoundRobin),
            "double-elimination" => Ok(Self::DoubleElimination),
            _ => Err(ParseFormatError(s.to_owned())),
        }
    }
}

/// Points awarded per match outcome in Swiss and round robin standings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Scoring {
    pub win: u64,
    pub draw: u64,
    pub loss: u64,
    pub bye: u64,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            win: 1,
            draw: 0,
            loss: 0,
            bye: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TournamentConfig {
    pub name: String,
    pub format: Format,
    /// The number of Swiss rounds. Defaults to `ceil(log2(teams))` when `None`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rounds: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub start: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scoring: Scoring,
}

impl TournamentConfig {
    pub fn new<T>(name: T, format: Format) -> Self
    where
        T: ToString,
    {
        Self {
            name: name.to_string(),
            format,
            rounds: None,
            start: None,
            scoring: Scoring::default(),
        }
    }
}

/// A single tournament.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TournamentState {
    pub(crate) id: TournamentId,
    pub(crate) config: TournamentConfig,
    pub(crate) teams: Registry,
    pub(crate) rounds: Vec<Round>,
    /// Indexed by [`MatchId`].
    pub(crate) matches: Vec<Match>,
    pub(crate) reminders: Vec<ReminderSchedule>,
    /// Set when a refresh detected an inconsistent bracket. Halts all further refreshes.
    pub(crate) corrupt: Option<String>,
}

impl TournamentState {
    pub fn new(id: TournamentId, config: TournamentConfig) -> Self {
        Self {
            id,
            config,
            teams: Registry::new(),
            rounds: Vec::new(),
            matches: Vec::new(),
            reminders: Vec::new(),
            corrupt: None,
        }
    }

    #[inline]
    pub fn id(&self) -> TournamentId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.config.format
    }

    #[inline]
    pub fn teams(&self) -> &Registry {
        &self.teams
    }

    #[inline]
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    #[inline]
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    #[inline]
    pub fn reminders(&self) -> &[ReminderSchedule] {
        &self.reminders
    }

    #[inline]
    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.get(id.index())
    }

    #[inline]
    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.matches.get(id.index())
    }

    /// Returns the phase of the round containing the match.
    pub fn phase_of(&self, id: MatchId) -> Option<Phase> {
        let m = self.get_match(id)?;
        self.round(m.round()).map(|round| round.phase)
    }

    /// Returns the matches of a round.
    pub fn round_matches(&self, id: RoundId) -> impl Iterator<Item = &Match> + '_ {
        self.round(id)
            .into_iter()
            .flat_map(|round| round.matches.iter())
            .filter_map(|id| self.get_match(*id))
    }

    /// Returns the reason the tournament was halted, if any.
    #[inline]
    pub fn corruption(&self) -> Option<&str> {
        self.corrupt.as_deref()
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.corrupt.is_some()
    }

    /// Halts the tournament. All refreshes fail until [`clear_corruption`] is called.
    ///
    /// [`clear_corruption`]: Self::clear_corruption
    pub fn halt(&mut self, reason: String) {
        self.corrupt = Some(reason);
    }

    pub fn clear_corruption(&mut self) {
        if let Some(reason) = self.corrupt.take() {
            log::info!("Clearing corruption of tournament {}: {}", self.id, reason);
        }
    }

    /// Registers a new team.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTeam`] if the team is already registered, or
    /// [`Error::InvalidFormatState`] if the tournament was started and its format does not
    /// accept late entrants.
    pub fn add_team(&mut self, team_ref: TeamRef, display_name: Option<String>) -> Result<TeamId> {
        if self.teams.contains(team_ref) {
            return Err(Error::DuplicateTeam(team_ref));
        }

        if !self.rounds.is_empty() && self.format() != Format::Swiss {
            return Err(Error::InvalidFormatState(
                "teams cannot join after the tournament started",
            ));
        }

        if self
            .rounds
            .iter()
            .any(|round| !round.phase.is_main_stage())
        {
            return Err(Error::InvalidFormatState(
                "teams cannot join after the playoffs started",
            ));
        }

        let id = self.teams.add(team_ref, display_name)?;
        log::debug!("Added team {} as {} to tournament {}", team_ref, id, self.id);
        Ok(id)
    }

    /// Removes a team that never played.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TeamHasHistory`] if the team appears in a reported match, or
    /// [`Error::InvalidFormatState`] if it occupies a slot of a pending match.
    pub fn remove_team(&mut self, team_ref: TeamRef) -> Result<Team> {
        let id = self.teams.get(team_ref).ok_or(Error::TeamNotFound)?.id;

        let mut pending = false;
        for m in self.matches.iter().filter(|m| m.contains(id)) {
            if m.is_reported() {
                return Err(Error::TeamHasHistory(team_ref));
            }

            pending = true;
        }

        if pending {
            return Err(Error::InvalidFormatState(
                "team is part of a pending match",
            ));
        }

        self.teams.remove(team_ref)
    }

    pub fn rename_team(&mut self, team_ref: TeamRef, display_name: Option<String>) -> Result<()> {
        self.teams.rename(team_ref, display_name)
    }

    /// Appends a new round with one match per entry in `slots`.
    pub fn create_round(&mut self, phase: Phase, slots: Vec<[Spot; 2]>) -> Result<RoundId> {
        if !phase.belongs_to(self.format()) {
            return Err(Error::InvalidFormatState(
                "phase does not belong to the tournament format",
            ));
        }

        let previous = self.rounds.last().map(|round| round.phase);
        if !follows(previous, phase) {
            return Err(Error::InvalidFormatState("phase is out of sequence"));
        }

        if slots.is_empty() {
            return Err(Error::InvalidFormatState("round has no matches"));
        }

        let mut seen = HashSet::new();
        for spot in slots.iter().flatten() {
            match spot {
                Spot::Bye => continue,
                Spot::Team(team) => {
                    if !self.teams.contains_id(*team) {
                        return Err(Error::TeamNotFound);
                    }
                }
                Spot::WinnerOf(id) | Spot::LoserOf(id) => {
                    if id.index() >= self.matches.len() {
                        return Err(Error::MatchNotFound(*id));
                    }
                }
                Spot::RankAfter { round, rank } => {
                    if round.index() >= self.rounds.len() {
                        return Err(Error::InvalidFormatState(
                            "rank references a round that does not exist",
                        ));
                    }

                    if *rank == 0 {
                        return Err(Error::InvalidFormatState("ranks start at 1"));
                    }
                }
            }

            if !seen.insert(*spot) {
                return Err(Error::InvalidFormatState("spot appears twice in the round"));
            }
        }

        let round_id = RoundId(self.rounds.len() as u64);
        let mut matches = Vec::with_capacity(slots.len());
        for spots in slots {
            let id = MatchId(self.matches.len() as u64);
            self.matches.push(Match::new(id, round_id, spots));
            matches.push(id);
        }

        log::debug!(
            "Created round {} ({}) with {} matches in tournament {}",
            round_id,
            phase,
            matches.len(),
            self.id
        );

        self.rounds.push(Round {
            id: round_id,
            phase,
            matches,
        });

        Ok(round_id)
    }

    /// Sets the time of a match and schedules its reminders. Setting the time a match already
    /// has does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MatchNotFound`] for an unknown match and [`Error::ReminderOutOfRange`]
    /// if `offsets` put a reminder outside the representable time range. On error the match
    /// keeps its previous time.
    pub fn set_match_time(
        &mut self,
        id: MatchId,
        time: DateTime<Utc>,
        dispatcher: &dyn Dispatcher,
        offsets: &ReminderOffsets,
    ) -> Result<()> {
        let m = self
            .matches
            .get_mut(id.index())
            .ok_or(Error::MatchNotFound(id))?;

        if m.scheduled() == Some(time) {
            return Ok(());
        }

        let schedule = ReminderSchedule::schedule(self.id, id, time, offsets, dispatcher)?;
        m.set_scheduled(time);

        match self.reminders.iter_mut().find(|s| s.match_id == id) {
            Some(existing) => {
                existing.cancel(dispatcher);
                *existing = schedule;
            }
            None => self.reminders.push(schedule),
        }

        Ok(())
    }

    /// Confirms the time of a match on behalf of one of its teams.
    pub fn confirm_time(&mut self, id: MatchId, team_ref: TeamRef) -> Result<()> {
        let team = self.teams.get(team_ref).ok_or(Error::TeamNotFound)?.id;

        let m = self
            .matches
            .get_mut(id.index())
            .ok_or(Error::MatchNotFound(id))?;

        let side = m.side(team).ok_or(Error::TeamNotFound)?;

        if m.scheduled().is_none() {
            return Err(Error::InvalidFormatState("match has no time set"));
        }

        m.confirm(side);
        Ok(())
    }

    /// Returns all matches with a time set, ordered by time and id.
    pub fn scheduled_matches(&self) -> Vec<&Match> {
        let mut matches: Vec<_> = self
            .matches
            .iter()
            .filter(|m| m.scheduled().is_some())
            .collect();

        matches.sort_by_key(|m| (m.scheduled(), m.id()));
        matches
    }

    /// Marks the reminder with `handle` as sent. Returns `false` if no pending reminder has that
    /// handle.
    pub fn acknowledge_reminder(&mut self, handle: ReminderHandle) -> bool {
        self.reminders
            .iter_mut()
            .any(|schedule| schedule.acknowledge(handle))
    }

    /// Records the result of a match and refreshes the bracket.
    ///
    /// Submitting the same result again succeeds without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyReported`] if a different result was already recorded,
    /// [`Error::TeamsUnresolved`] if not both slots hold a team and [`Error::DrawNotAllowed`] for
    /// a draw in an elimination match.
    pub fn report_result(&mut self, id: MatchId, score_a: u64, score_b: u64) -> Result<RefreshReport> {
        if let Some(reason) = &self.corrupt {
            return Err(Error::BracketCorrupt(reason.clone()));
        }

        let phase = self.phase_of(id).ok_or(Error::MatchNotFound(id))?;
        let m = &mut self.matches[id.index()];

        let submitted = [score_a, score_b];
        if let Some(reported) = m.score() {
            if reported == submitted {
                return Ok(RefreshReport::default());
            }

            return Err(Error::AlreadyReported {
                id,
                reported,
                submitted,
            });
        }

        if m.teams().is_none() {
            return Err(Error::TeamsUnresolved(id));
        }

        if score_a == score_b && phase.is_elimination() {
            return Err(Error::DrawNotAllowed);
        }

        m.set_score(submitted);
        log::debug!(
            "Reported match {} of tournament {} as {}-{}",
            id,
            self.id,
            score_a,
            score_b
        );

        self.refresh(RefreshScope::Full)
    }

    /// Creates the opening rounds of the tournament.
    pub fn start(&mut self) -> Result<RefreshReport> {
        if !self.rounds.is_empty() {
            return Err(Error::InvalidFormatState("tournament was already started"));
        }

        if self.teams.len() < 2 {
            return Err(Error::InvalidFormatState("at least two teams are required"));
        }

        let plans = self.format().generator().initial(self)?;

        log::debug!(
            "Starting tournament {} ({}) with {} teams",
            self.id,
            self.format(),
            self.teams.len()
        );

        let mut report = RefreshReport {
            rounds_created: self.create_rounds(plans)?,
            ..Default::default()
        };

        report.merge(self.refresh(RefreshScope::Full)?);
        Ok(report)
    }

    /// Asks the format for the next rounds and creates them.
    ///
    /// Unlike a refresh, this returns [`Error::RoundNotComplete`] if the format cannot continue
    /// yet.
    pub fn generate_next_round(&mut self) -> Result<RefreshReport> {
        if let Some(reason) = &self.corrupt {
            return Err(Error::BracketCorrupt(reason.clone()));
        }

        if self.rounds.is_empty() {
            return Err(Error::InvalidFormatState("tournament was not started"));
        }

        let plans = self.format().generator().next(self)?;
        let mut report = RefreshReport {
            rounds_created: self.create_rounds(plans)?,
            ..Default::default()
        };

        report.merge(self.refresh(RefreshScope::Full)?);
        Ok(report)
    }

    fn create_rounds(&mut self, plans: Vec<crate::RoundPlan>) -> Result<usize> {
        let created = plans.len();
        for plan in plans {
            self.create_round(plan.phase, plan.slots)?;
        }

        Ok(created)
    }

    /// Resolves placeholders, settles byes and, with [`RefreshScope::Full`], generates new
    /// rounds.
    #[inline]
    pub fn refresh(&mut self, scope: RefreshScope) -> Result<RefreshReport> {
        refresh::refresh(self, scope)
    }

    /// Returns `true` if every match of the round was reported.
    pub fn is_round_complete(&self, id: RoundId) -> bool {
        match self.round(id) {
            Some(_) => self.round_matches(id).all(Match::is_reported),
            None => false,
        }
    }

    /// Returns `true` if the tournament was started, every match was reported and the format
    /// has no further rounds to add.
    pub fn is_complete(&self) -> bool {
        !self.rounds.is_empty()
            && self.matches.iter().all(Match::is_reported)
            && matches!(self.format().generator().next(self), Ok(plans) if plans.is_empty())
    }

    /// Computes the standings of the main stage.
    #[inline]
    pub fn standings(&self) -> Result<Standings> {
        standings::compute(self, self.format())
    }
}

/// Returns `true` if a round with `phase` may follow a round with `previous`.
fn follows(previous: Option<Phase>, phase: Phase) -> bool {
    match (previous, phase) {
        (None, Phase::Swiss(1) | Phase::RoundRobin(1) | Phase::Winners(1)) => true,
        (Some(Phase::Swiss(p)), Phase::Swiss(n))
        | (Some(Phase::RoundRobin(p)), Phase::RoundRobin(n))
        | (Some(Phase::Winners(p)), Phase::Winners(n))
        | (Some(Phase::Losers(p)), Phase::Losers(n))
        | (Some(Phase::Playoff(p)), Phase::Playoff(n)) => n == p + 1,
        (Some(Phase::Winners(_)), Phase::Losers(1)) => true,
        (Some(Phase::Winners(_) | Phase::Losers(_)), Phase::GrandFinal) => true,
        (Some(Phase::GrandFinal), Phase::GrandFinalReset) => true,
        (Some(prev), Phase::Playoff(1)) => prev.is_main_stage(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{follows, Format};
    use crate::reminder::tests::RecordingDispatcher;
    use crate::reminder::ReminderStatus;
    use crate::tests::{report_all, tournament};
    use crate::{
        Error, MatchId, MatchStatus, Phase, ReminderOffsets, RoundId, Spot, TeamId, TeamRef,
    };

    #[test]
    fn test_format_from_str() {
        for format in [Format::Swiss, Format::RoundRobin, Format::DoubleElimination] {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }

        assert!("single-elimination".parse::<Format>().is_err());
    }

    #[test]
    fn test_follows() {
        assert!(follows(None, Phase::Swiss(1)));
        assert!(!follows(None, Phase::Swiss(2)));
        assert!(!follows(None, Phase::Losers(1)));
        assert!(follows(Some(Phase::Swiss(1)), Phase::Swiss(2)));
        assert!(!follows(Some(Phase::Swiss(1)), Phase::Swiss(3)));
        assert!(follows(Some(Phase::Winners(3)), Phase::Losers(1)));
        assert!(follows(Some(Phase::Losers(4)), Phase::GrandFinal));
        assert!(follows(Some(Phase::Winners(1)), Phase::GrandFinal));
        assert!(!follows(Some(Phase::Losers(4)), Phase::GrandFinalReset));
        assert!(follows(Some(Phase::GrandFinal), Phase::GrandFinalReset));
        assert!(follows(Some(Phase::RoundRobin(5)), Phase::Playoff(1)));
        assert!(follows(Some(Phase::Playoff(1)), Phase::Playoff(2)));
        assert!(!follows(Some(Phase::Playoff(1)), Phase::Swiss(2)));
        assert!(!follows(None, Phase::Playoff(1)));
    }

    #[test]
    fn test_add_team_after_start() {
        let mut state = tournament(Format::RoundRobin, 4);
        state.start().unwrap();
        assert!(matches!(
            state.add_team(TeamRef(200), None),
            Err(Error::InvalidFormatState(_))
        ));
        assert_eq!(
            state.add_team(TeamRef(100), None),
            Err(Error::DuplicateTeam(TeamRef(100)))
        );

        let mut state = tournament(Format::Swiss, 4);
        state.start().unwrap();
        assert_eq!(state.add_team(TeamRef(200), None), Ok(TeamId(4)));
    }

    #[test]
    fn test_remove_team() {
        let mut state = tournament(Format::Swiss, 5);
        state.start().unwrap();

        assert_eq!(state.remove_team(TeamRef(999)), Err(Error::TeamNotFound));

        // The team with the bye already has a reported match.
        assert_eq!(
            state.remove_team(TeamRef(104)),
            Err(Error::TeamHasHistory(TeamRef(104)))
        );

        assert!(matches!(
            state.remove_team(TeamRef(100)),
            Err(Error::InvalidFormatState(_))
        ));

        state.add_team(TeamRef(200), None).unwrap();
        assert_eq!(state.remove_team(TeamRef(200)).unwrap().team_ref, TeamRef(200));
    }

    #[test]
    fn test_create_round() {
        let mut state = tournament(Format::Swiss, 4);

        assert!(matches!(
            state.create_round(Phase::Winners(1), vec![[Spot::Team(TeamId(0)), Spot::Bye]]),
            Err(Error::InvalidFormatState(_))
        ));
        assert!(matches!(
            state.create_round(Phase::Swiss(2), vec![[Spot::Team(TeamId(0)), Spot::Bye]]),
            Err(Error::InvalidFormatState(_))
        ));
        assert_eq!(
            state.create_round(Phase::Swiss(1), vec![[Spot::Team(TeamId(9)), Spot::Bye]]),
            Err(Error::TeamNotFound)
        );
        assert!(matches!(
            state.create_round(
                Phase::Swiss(1),
                vec![
                    [Spot::Team(TeamId(0)), Spot::Team(TeamId(1))],
                    [Spot::Team(TeamId(1)), Spot::Team(TeamId(2))]
                ]
            ),
            Err(Error::InvalidFormatState(_))
        ));
        assert_eq!(
            state.create_round(
                Phase::Swiss(1),
                vec![[Spot::WinnerOf(MatchId(0)), Spot::Team(TeamId(1))]]
            ),
            Err(Error::MatchNotFound(MatchId(0)))
        );

        let round = state
            .create_round(
                Phase::Swiss(1),
                vec![
                    [Spot::Team(TeamId(0)), Spot::Team(TeamId(1))],
                    [Spot::Team(TeamId(2)), Spot::Team(TeamId(3))],
                ],
            )
            .unwrap();

        assert_eq!(round, RoundId(0));
        assert_eq!(state.rounds()[0].matches, vec![MatchId(0), MatchId(1)]);
        assert_eq!(state.matches()[1].status(), MatchStatus::Scheduled);
    }

    #[test]
    fn test_report_result() {
        let mut state = tournament(Format::RoundRobin, 4);
        state.start().unwrap();

        assert_eq!(
            state.report_result(MatchId(99), 1, 0),
            Err(Error::MatchNotFound(MatchId(99)))
        );

        state.report_result(MatchId(0), 2, 1).unwrap();
        assert_eq!(state.report_result(MatchId(0), 2, 1), Ok(Default::default()));
        assert_eq!(
            state.report_result(MatchId(0), 1, 2),
            Err(Error::AlreadyReported {
                id: MatchId(0),
                reported: [2, 1],
                submitted: [1, 2],
            })
        );

        // Draws are fine outside of elimination brackets.
        state.report_result(MatchId(1), 1, 1).unwrap();
    }

    #[test]
    fn test_report_result_unresolved() {
        let mut state = tournament(Format::DoubleElimination, 4);
        state.start().unwrap();

        // Winners round 2 waits for winners round 1.
        assert_eq!(
            state.report_result(MatchId(2), 1, 0),
            Err(Error::TeamsUnresolved(MatchId(2)))
        );
        assert_eq!(
            state.report_result(MatchId(0), 1, 1),
            Err(Error::DrawNotAllowed)
        );
    }

    #[test]
    fn test_start() {
        let mut state = tournament(Format::Swiss, 1);
        assert!(matches!(state.start(), Err(Error::InvalidFormatState(_))));

        let mut state = tournament(Format::Swiss, 4);
        let report = state.start().unwrap();
        assert_eq!(report.rounds_created, 1);
        assert!(matches!(state.start(), Err(Error::InvalidFormatState(_))));

        // The created round and the settled bye end up in one report.
        let mut state = tournament(Format::Swiss, 5);
        assert_eq!(
            state.start().unwrap(),
            crate::RefreshReport {
                resolved: 0,
                settled: 1,
                rounds_created: 1,
            }
        );
    }

    #[test]
    fn test_generate_next_round() {
        let mut state = tournament(Format::Swiss, 4);
        assert!(matches!(
            state.generate_next_round(),
            Err(Error::InvalidFormatState(_))
        ));

        state.start().unwrap();
        assert_eq!(state.generate_next_round(), Err(Error::RoundNotComplete));

        report_all(&mut state);
        assert_eq!(state.rounds().len(), 2);
        report_all(&mut state);
        assert_eq!(state.rounds().len(), 2);
        assert!(state.is_complete());
        assert_eq!(state.generate_next_round().unwrap().rounds_created, 0);
    }

    #[test]
    fn test_set_match_time() {
        let dispatcher = RecordingDispatcher::default();
        let offsets = ReminderOffsets::default();
        let time = Utc.with_ymd_and_hms(2023, 5, 1, 19, 0, 0).unwrap();

        let mut state = tournament(Format::RoundRobin, 4);
        state.start().unwrap();

        assert_eq!(
            state.set_match_time(MatchId(99), time, &dispatcher, &offsets),
            Err(Error::MatchNotFound(MatchId(99)))
        );

        state
            .set_match_time(MatchId(0), time, &dispatcher, &offsets)
            .unwrap();
        assert_eq!(state.matches()[0].status(), MatchStatus::TimeSet);
        assert_eq!(state.reminders().len(), 1);

        let teams = state.matches()[0].teams().unwrap();
        let team_ref = state.teams().by_id(teams[0]).unwrap().team_ref;
        state.confirm_time(MatchId(0), team_ref).unwrap();
        assert_eq!(state.matches()[0].confirmed(), [true, false]);

        // Same time again changes nothing.
        state
            .set_match_time(MatchId(0), time, &dispatcher, &offsets)
            .unwrap();
        assert_eq!(dispatcher.scheduled.lock().unwrap().len(), 2);
        assert_eq!(state.matches()[0].confirmed(), [true, false]);

        let later = time + Duration::hours(2);
        state
            .set_match_time(MatchId(0), later, &dispatcher, &offsets)
            .unwrap();
        assert_eq!(dispatcher.scheduled.lock().unwrap().len(), 4);
        assert_eq!(dispatcher.cancelled.lock().unwrap().len(), 2);
        assert_eq!(state.reminders().len(), 1);
        assert_eq!(state.reminders()[0].scheduled, later);
        assert_eq!(state.matches()[0].confirmed(), [false, false]);

        let handle = state.reminders()[0].reminders[1].handle;
        assert!(state.acknowledge_reminder(handle));
        assert_eq!(
            state.reminders()[0].reminders[1].status,
            ReminderStatus::Sent
        );
    }

    #[test]
    fn test_set_match_time_out_of_range() {
        let dispatcher = RecordingDispatcher::default();
        let time = Utc.with_ymd_and_hms(2030, 5, 1, 18, 0, 0).unwrap();

        let mut state = tournament(Format::RoundRobin, 2);
        state.start().unwrap();
        state
            .set_match_time(MatchId(0), time, &dispatcher, &ReminderOffsets::default())
            .unwrap();

        let before = state.clone();
        let offsets = ReminderOffsets::new(Duration::days(100_000_000), Duration::hours(1));

        assert_eq!(
            state.set_match_time(MatchId(0), time + Duration::hours(2), &dispatcher, &offsets),
            Err(Error::ReminderOutOfRange(MatchId(0)))
        );
        assert_eq!(state, before);
        assert_eq!(dispatcher.scheduled.lock().unwrap().len(), 2);
        assert!(dispatcher.cancelled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_confirm_time() {
        let dispatcher = RecordingDispatcher::default();
        let mut state = tournament(Format::RoundRobin, 4);
        state.start().unwrap();

        let teams = state.matches()[0].teams().unwrap();
        let team_ref = state.teams().by_id(teams[1]).unwrap().team_ref;

        assert!(matches!(
            state.confirm_time(MatchId(0), team_ref),
            Err(Error::InvalidFormatState(_))
        ));

        let time = Utc.with_ymd_and_hms(2023, 5, 1, 19, 0, 0).unwrap();
        state
            .set_match_time(MatchId(0), time, &dispatcher, &ReminderOffsets::default())
            .unwrap();

        let outsider = state
            .teams()
            .iter()
            .find(|team| !teams.contains(&team.id))
            .unwrap()
            .team_ref;
        assert_eq!(
            state.confirm_time(MatchId(0), outsider),
            Err(Error::TeamNotFound)
        );

        state.confirm_time(MatchId(0), team_ref).unwrap();
        assert_eq!(state.matches()[0].confirmed(), [false, true]);
    }

    #[test]
    fn test_scheduled_matches() {
        let dispatcher = RecordingDispatcher::default();
        let offsets = ReminderOffsets::default();
        let time = Utc.with_ymd_and_hms(2023, 5, 1, 19, 0, 0).unwrap();

        let mut state = tournament(Format::RoundRobin, 4);
        state.start().unwrap();

        state
            .set_match_time(MatchId(3), time, &dispatcher, &offsets)
            .unwrap();
        state
            .set_match_time(MatchId(1), time + Duration::hours(1), &dispatcher, &offsets)
            .unwrap();
        state
            .set_match_time(MatchId(2), time, &dispatcher, &offsets)
            .unwrap();

        let ids: Vec<_> = state.scheduled_matches().iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec![MatchId(2), MatchId(3), MatchId(1)]);
    }
}
