//! Identifiers used throughout the engine.
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! id {
    ($(#[$meta:meta])* $name:ident, $id:ty) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        #[repr(transparent)]
        pub struct $name(pub $id);

        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AsRef<$id> for $name {
            #[inline]
            fn as_ref(&self) -> &$id {
                &self.0
            }
        }

        impl PartialEq<$id> for $name {
            #[inline]
            fn eq(&self, other: &$id) -> bool {
                self.0 == *other
            }
        }

        impl From<$id> for $name {
            #[inline]
            fn from(id: $id) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = <$id as FromStr>::Err;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse::<$id>()?))
            }
        }
    };
}

id!(TournamentId, u64);
id!(
    /// The internal id of a team, assigned by the [`Registry`] in registration order.
    ///
    /// [`Registry`]: crate::Registry
    TeamId,
    u64
);
id!(
    /// The external reference of a team, as known by the caller.
    TeamRef,
    u64
);
id!(
    /// The index of a match within its tournament. Match ids are assigned sequentially.
    MatchId,
    u64
);
id!(
    /// The index of a round within its tournament.
    RoundId,
    u64
);
id!(
    /// A handle returned by a [`Dispatcher`] for a single scheduled reminder.
    ///
    /// [`Dispatcher`]: crate::Dispatcher
    ReminderHandle,
    u64
);

impl MatchId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl RoundId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
