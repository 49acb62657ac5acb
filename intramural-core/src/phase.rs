//! Round phases
//!
//! Every [`Round`] is tagged with a [`Phase`] that describes its position in the tournament.
//! Phases are serialized as short strings, e.g. `swiss-3`, `losers-2` or `grand-final`.
//!
//! [`Round`]: crate::Round
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

use crate::Format;

/// The position of a round within a tournament. Numbered phases start at 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Swiss(u32),
    RoundRobin(u32),
    /// A round of the upper bracket of a double elimination tournament.
    Winners(u32),
    /// A round of the lower bracket of a double elimination tournament.
    Losers(u32),
    GrandFinal,
    /// The second grand final, played if the team from the lower bracket wins the first one.
    GrandFinalReset,
    /// A round appended after the main stage, usually seeded with [`Spot::RankAfter`].
    ///
    /// [`Spot::RankAfter`]: crate::Spot::RankAfter
    Playoff(u32),
}

impl Phase {
    /// Returns `true` if the round counts towards the standings of the tournament.
    #[inline]
    pub fn is_main_stage(&self) -> bool {
        !matches!(self, Self::Playoff(_))
    }

    /// Returns `true` if matches in this phase must produce a winner.
    #[inline]
    pub fn is_elimination(&self) -> bool {
        !matches!(self, Self::Swiss(_) | Self::RoundRobin(_))
    }

    /// Returns `true` if this phase may appear in a tournament using `format`.
    pub fn belongs_to(&self, format: Format) -> bool {
        match self {
            Self::Swiss(_) => format == Format::Swiss,
            Self::RoundRobin(_) => format == Format::RoundRobin,
            Self::Winners(_) | Self::Losers(_) | Self::GrandFinal | Self::GrandFinalReset => {
                format == Format::DoubleElimination
            }
            Self::Playoff(_) => format != Format::DoubleElimination,
        }
    }

    /// Returns the number of a numbered phase.
    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Swiss(n)
            | Self::RoundRobin(n)
            | Self::Winners(n)
            | Self::Losers(n)
            | Self::Playoff(n) => Some(*n),
            Self::GrandFinal | Self::GrandFinalReset => None,
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swiss(n) => write!(f, "swiss-{}", n),
            Self::RoundRobin(n) => write!(f, "round-robin-{}", n),
            Self::Winners(n) => write!(f, "winners-{}", n),
            Self::Losers(n) => write!(f, "losers-{}", n),
            Self::GrandFinal => f.write_str("grand-final"),
            Self::GrandFinalReset => f.write_str("grand-final-reset"),
            Self::Playoff(n) => write!(f, "playoff-{}", n),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid phase: {0}")]
pub struct ParsePhaseError(String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grand-final" => return Ok(Self::GrandFinal),
            "grand-final-reset" => return Ok(Self::GrandFinalReset),
            _ => (),
        }

        let err = || ParsePhaseError(s.to_owned());

        let (name, number) = s.rsplit_once('-').ok_or_else(err)?;
        let number: u32 = number.parse().map_err(|_| err())?;
        if number == 0 {
            return Err(err());
        }

        match name {
            "swiss" => Ok(Self::Swiss(number)),
            "round-robin" => Ok(Self::RoundRobin(number)),
            "winners" => Ok(Self::Winners(number)),
            "losers" => Ok(Self::Losers(number)),
            "playoff" => Ok(Self::Playoff(number)),
            _ => Err(err()),
        }
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::fmt::{self, Formatter};

    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Phase;

    impl Serialize for Phase {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Phase {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct PhaseVisitor;

            impl<'de> Visitor<'de> for PhaseVisitor {
                type Value = Phase;

                fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                    formatter.write_str("a round phase")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    v.parse().map_err(E::custom)
                }

                fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    self.visit_str(&v)
                }
            }

            deserializer.deserialize_str(PhaseVisitor)
        }
    }
}
