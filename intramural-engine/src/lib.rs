//! # intramural-engine
//!
//! The stateful shell around [`intramural_core`]: a registry of live tournaments with one lock
//! per tournament, persistence and timer-based reminder delivery.
pub mod config;
pub mod dispatch;
pub mod id;
pub mod live;
pub mod logger;
pub mod store;

pub use live::{LiveTournament, Tournaments};

use std::io;

use intramural_core::TournamentId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] intramural_core::Error),
    #[error("tournament {0} not found")]
    TournamentNotFound(TournamentId),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the [`intramural_core::Error`] if this error was returned by the tournament.
    pub fn as_core(&self) -> Option<&intramural_core::Error> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}
