//! Team registration
use crate::{Error, Result, TeamId, TeamRef};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A registered team.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Team {
    pub id: TeamId,
    pub team_ref: TeamRef,
    pub display_name: Option<String>,
}

impl Team {
    /// Returns the display name of the team, falling back to its reference.
    pub fn name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.team_ref.to_string(),
        }
    }
}

/// The teams of a tournament.
///
/// Teams are kept in registration order. [`TeamId`]s are assigned sequentially and never reused,
/// even after the team was removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Registry {
    teams: Vec<Team>,
    next_id: u64,
}

impl Registry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new team.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTeam`] if a team with the same `team_ref` is already
    /// registered.
    pub fn add(&mut self, team_ref: TeamRef, display_name: Option<String>) -> Result<TeamId> {
        if self.contains(team_ref) {
            return Err(Error::DuplicateTeam(team_ref));
        }

        let id = TeamId(self.next_id);
        self.next_id += 1;

        self.teams.push(Team {
            id,
            team_ref,
            display_name,
        });

        Ok(id)
    }

    /// Removes the team with the given reference.
    pub fn remove(&mut self, team_ref: TeamRef) -> Result<Team> {
        let index = self
            .teams
            .iter()
            .position(|team| team.team_ref == team_ref)
            .ok_or(Error::TeamNotFound)?;

        Ok(self.teams.remove(index))
    }

    /// Changes the display name of a team.
    pub fn rename(&mut self, team_ref: TeamRef, display_name: Option<String>) -> Result<()> {
        let team = self
            .teams
            .iter_mut()
            .find(|team| team.team_ref == team_ref)
            .ok_or(Error::TeamNotFound)?;

        team.display_name = display_name;
        Ok(())
    }

    pub fn get(&self, team_ref: TeamRef) -> Option<&Team> {
        self.teams.iter().find(|team| team.team_ref == team_ref)
    }

    pub fn by_id(&self, id: TeamId) -> Option<&Team> {
        // Teams are sorted by id.
        self.teams
            .binary_search_by_key(&id, |team| team.id)
            .ok()
            .map(|index| &self.teams[index])
    }

    #[inline]
    pub fn contains(&self, team_ref: TeamRef) -> bool {
        self.get(team_ref).is_some()
    }

    #[inline]
    pub fn contains_id(&self, id: TeamId) -> bool {
        self.by_id(id).is_some()
    }

    /// Returns the ids of all teams in registration order.
    pub fn ids(&self) -> Vec<TeamId> {
        self.teams.iter().map(|team| team.id).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Team> {
        self.teams.iter()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Team;
    type IntoIter = std::slice::Iter<'a, Team>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
