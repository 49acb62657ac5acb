//! # intramural-core
//!
//! This crate contains the tournament format engine: everything required to run a Swiss,
//! round robin or double elimination tournament from a list of registered teams and the results
//! reported for its matches. It performs no I/O; persistence and reminder delivery are left to
//! the caller through the [`Dispatcher`] trait and plain (de)serialization of
//! [`TournamentState`].
//!
//! Important types:
//! - [`TournamentState`]: A single tournament with its teams, rounds, matches and reminders.
//! - [`Generator`]: A trait implemented by every format to produce rounds.
//! - [`Spot`]: Where the occupant of a match slot comes from. Either a concrete team, a bye or a
//! placeholder referencing another match or a ranking.
//! - [`Slot`]: A [`Spot`] together with the [`Entrant`] it resolved to.
//! - [`Match`]: A match of two slots with an optional time and score.
//! - [`Standings`]: Rankings derived from the reported matches.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to all model types.
//!
pub mod id;
pub mod phase;
pub mod refresh;
pub mod registry;
pub mod reminder;
pub mod standings;
pub mod tournament;

mod double_elimination;
mod matches;
mod round_robin;
mod spot;
mod swiss;

pub use double_elimination::DoubleElimination;
pub use id::{MatchId, ReminderHandle, RoundId, TeamId, TeamRef, TournamentId};
pub use matches::{Match, MatchStatus, Round, RoundPlan};
pub use phase::Phase;
pub use refresh::{RefreshReport, RefreshScope};
pub use registry::{Registry, Team};
pub use reminder::{Dispatcher, ReminderOffsets, ReminderPayload, ReminderSchedule};
pub use round_robin::RoundRobin;
pub use spot::{Entrant, Slot, Spot};
pub use standings::{StandingEntry, Standings};
pub use swiss::Swiss;
pub use tournament::{Format, Scoring, TournamentConfig, TournamentState};

use std::result;

use thiserror::Error;

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("team {0} is already registered")]
    DuplicateTeam(TeamRef),
    #[error("team {0} appears in a reported match")]
    TeamHasHistory(TeamRef),
    #[error("team not found")]
    TeamNotFound,
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("match {0} does not have both teams yet")]
    TeamsUnresolved(MatchId),
    #[error(
        "match {id} was already reported as {}-{}, not {}-{}",
        .reported[0], .reported[1], .submitted[0], .submitted[1]
    )]
    AlreadyReported {
        id: MatchId,
        reported: [u64; 2],
        submitted: [u64; 2],
    },
    #[error("draws are not allowed in elimination matches")]
    DrawNotAllowed,
    #[error("invalid format state: {0}")]
    InvalidFormatState(&'static str),
    #[error("the current round is not complete")]
    RoundNotComplete,
    #[error("bracket corrupt: {0}")]
    BracketCorrupt(String),
    #[error("reminders for match {0} fall outside the supported time range")]
    ReminderOutOfRange(MatchId),
}

/// A tournament format.
///
/// A `Generator` produces the rounds of a tournament. Every round it returns is appended to the
/// [`TournamentState`] in order, so match ids referenced by later rounds of the same batch can
/// be computed from the current number of matches.
pub trait Generator {
    /// Returns the rounds that open the tournament. Called exactly once, before any round
    /// exists.
    fn initial(&self, state: &TournamentState) -> Result<Vec<RoundPlan>>;

    /// Returns the rounds that follow from the results reported so far. An empty `Vec` means
    /// that the format has nothing to add.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RoundNotComplete`] if the next round depends on results that were not
    /// reported yet.
    fn next(&self, state: &TournamentState) -> Result<Vec<RoundPlan>>;
}
