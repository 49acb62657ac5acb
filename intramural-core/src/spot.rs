use crate::{Error, MatchId, Result, RoundId, TeamId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The occupant of a resolved [`Slot`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Entrant {
    Team(TeamId),
    /// The slot is permanently empty. The other side advances without playing.
    Bye,
}

impl Entrant {
    /// Returns the [`TeamId`] if the `Entrant` is a [`Team`].
    ///
    /// [`Team`]: Self::Team
    #[inline]
    pub fn team(self) -> Option<TeamId> {
        match self {
            Self::Team(team) => Some(team),
            Self::Bye => None,
        }
    }

    /// Returns `true` if the `Entrant` is a [`Bye`].
    ///
    /// [`Bye`]: Self::Bye
    #[inline]
    pub fn is_bye(self) -> bool {
        matches!(self, Self::Bye)
    }
}

/// Where the occupant of a slot comes from.
///
/// Concrete spots ([`Team`] and [`Bye`]) are known when the round is created. Placeholder spots
/// are resolved once the match or round they refer to has been reported.
///
/// [`Team`]: Self::Team
/// [`Bye`]: Self::Bye
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Spot {
    Team(TeamId),
    Bye,
    /// The winner of a match.
    WinnerOf(MatchId),
    /// The loser of a match.
    LoserOf(MatchId),
    /// The team at a 1-based `rank` in the standings computed after `round`.
    RankAfter { round: RoundId, rank: usize },
}

impl Spot {
    /// Returns `true` if the `Spot` is a placeholder that has to be resolved later.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Self::Team(_) | Self::Bye)
    }

    /// Returns the match this `Spot` depends on, if any.
    #[inline]
    pub fn source_match(&self) -> Option<MatchId> {
        match self {
            Self::WinnerOf(id) | Self::LoserOf(id) => Some(*id),
            _ => None,
        }
    }

    fn concrete(&self) -> Option<Entrant> {
        match self {
            Self::Team(team) => Some(Entrant::Team(*team)),
            Self::Bye => Some(Entrant::Bye),
            _ => None,
        }
    }
}

/// A slot of a [`Match`], holding the [`Spot`] it was created with and the [`Entrant`] it
/// resolved to.
///
/// [`Match`]: crate::Match
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Slot {
    spot: Spot,
    entrant: Option<Entrant>,
}

impl Slot {
    /// Creates a new `Slot`. Concrete spots are resolved immediately.
    pub fn new(spot: Spot) -> Self {
        Self {
            spot,
            entrant: spot.concrete(),
        }
    }

    #[inline]
    pub fn spot(&self) -> Spot {
        self.spot
    }

    #[inline]
    pub fn entrant(&self) -> Option<Entrant> {
        self.entrant
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.entrant.is_some()
    }

    /// Returns the team in this slot, if it resolved to a team.
    #[inline]
    pub fn team(&self) -> Option<TeamId> {
        self.entrant.and_then(Entrant::team)
    }

    /// Resolves the slot to `entrant`. Returns `true` if the slot changed.
    ///
    /// Resolving an already resolved slot to the same entrant is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BracketCorrupt`] if the slot was already resolved to a different
    /// entrant.
    pub fn resolve(&mut self, entrant: Entrant) -> Result<bool> {
        match self.entrant {
            None => {
                self.entrant = Some(entrant);
                Ok(true)
            }
            Some(current) if current == entrant => Ok(false),
            Some(current) => Err(Error::BracketCorrupt(format!(
                "slot {:?} resolved to {:?}, cannot change to {:?}",
                self.spot, current, entrant
            ))),
        }
    }
}
