//! Live tournaments
//!
//! A [`LiveTournament`] is the only handle through which a loaded tournament is read or
//! changed. All handles to the same tournament share one state behind a [`RwLock`], so every
//! tournament has exactly one mutator at a time while unrelated tournaments never contend.
//! Every change is applied to a copy of the state and persisted before it becomes visible.
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use intramural_core::{
    Dispatcher, Match, MatchId, Phase, RefreshReport, RefreshScope, ReminderHandle,
    ReminderOffsets, ReminderPayload, Round, RoundId, Spot, Standings, Team, TeamId, TeamRef,
    TournamentConfig, TournamentId, TournamentState,
};
use parking_lot::{Mutex, RwLock};

use crate::store::Store;
use crate::{id, Error, Result};

type Registry = Arc<RwLock<HashMap<TournamentId, Weak<LiveTournamentInner>>>>;

/// The registry of all currently loaded tournaments.
#[derive(Clone)]
pub struct Tournaments {
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    offsets: ReminderOffsets,
    inner: Registry,
}

impl Tournaments {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<dyn Dispatcher>,
        offsets: ReminderOffsets,
    ) -> Self {
        Self {
            store,
            dispatcher,
            offsets,
            inner: Arc::default(),
        }
    }

    /// Creates and persists a new tournament.
    pub fn create(&self, config: TournamentConfig) -> Result<LiveTournament> {
        let id = TournamentId(id::TOURNAMENT.generate());
        let state = TournamentState::new(id, config);

        self.store.save(id, &state)?;

        log::debug!("Created tournament {} ({})", id, state.config().name);

        let tournament = self.make_live(state);
        self.inner
            .write()
            .insert(id, Arc::downgrade(&tournament.inner));

        Ok(tournament)
    }

    /// Returns the live tournament with the given `id`, loading it from the [`Store`] if it is
    /// not loaded yet.
    pub fn get(&self, id: TournamentId) -> Result<LiveTournament> {
        if let Some(tournament) = self.get_local(id) {
            return Ok(tournament);
        }

        // Loading happens under the write lock so there is never more than one live copy.
        let mut tournaments = self.inner.write();

        if let Some(inner) = tournaments.get(&id).and_then(Weak::upgrade) {
            return Ok(LiveTournament { inner });
        }

        let state = match self.store.load(id)? {
            Some(state) => state,
            None => return Err(Error::TournamentNotFound(id)),
        };

        log::debug!("Loaded tournament {}", id);

        let tournament = self.make_live(state);
        tournaments.insert(id, Arc::downgrade(&tournament.inner));

        Ok(tournament)
    }

    /// Returns the live tournament with the given `id` if it is currently loaded.
    pub fn get_local(&self, id: TournamentId) -> Option<LiveTournament> {
        let inner = self.inner.read();

        inner
            .get(&id)
            .and_then(Weak::upgrade)
            .map(|inner| LiveTournament { inner })
    }

    /// Returns the number of loaded tournaments.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_live(&self, state: TournamentState) -> LiveTournament {
        LiveTournament {
            inner: Arc::new(LiveTournamentInner {
                id: state.id(),
                state: RwLock::new(state),
                store: self.store.clone(),
                dispatcher: self.dispatcher.clone(),
                offsets: self.offsets,
                tournaments: self.inner.clone(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct LiveTournament {
    inner: Arc<LiveTournamentInner>,
}

impl LiveTournament {
    #[inline]
    pub fn id(&self) -> TournamentId {
        self.inner.id
    }

    /// Returns a copy of the complete tournament state.
    pub fn snapshot(&self) -> TournamentState {
        self.inner.state.read().clone()
    }

    pub fn config(&self) -> TournamentConfig {
        self.inner.state.read().config().clone()
    }

    pub fn teams(&self) -> Vec<Team> {
        self.inner.state.read().teams().iter().cloned().collect()
    }

    pub fn rounds(&self) -> Vec<Round> {
        self.inner.state.read().rounds().to_vec()
    }

    pub fn matches(&self) -> Vec<Match> {
        self.inner.state.read().matches().to_vec()
    }

    pub fn get_match(&self, id: MatchId) -> Option<Match> {
        self.inner.state.read().get_match(id).cloned()
    }

    pub fn scheduled_matches(&self) -> Vec<Match> {
        self.inner
            .state
            .read()
            .scheduled_matches()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn standings(&self) -> Result<Standings> {
        Ok(self.inner.state.read().standings()?)
    }

    pub fn is_complete(&self) -> bool {
        self.inner.state.read().is_complete()
    }

    pub fn is_halted(&self) -> bool {
        self.inner.state.read().is_halted()
    }

    pub fn add_team(&self, team_ref: TeamRef, display_name: Option<String>) -> Result<TeamId> {
        self.mutate(|state, _| state.add_team(team_ref, display_name))
    }

    pub fn remove_team(&self, team_ref: TeamRef) -> Result<Team> {
        self.mutate(|state, _| state.remove_team(team_ref))
    }

    pub fn rename_team(&self, team_ref: TeamRef, display_name: Option<String>) -> Result<()> {
        self.mutate(|state, _| state.rename_team(team_ref, display_name))
    }

    pub fn start(&self) -> Result<RefreshReport> {
        self.mutate(|state, _| state.start())
    }

    pub fn create_round(&self, phase: Phase, slots: Vec<[Spot; 2]>) -> Result<RoundId> {
        self.mutate(|state, _| state.create_round(phase, slots))
    }

    pub fn generate_next_round(&self) -> Result<RefreshReport> {
        self.mutate(|state, _| state.generate_next_round())
    }

    pub fn report_result(&self, id: MatchId, score_a: u64, score_b: u64) -> Result<RefreshReport> {
        self.mutate(|state, _| state.report_result(id, score_a, score_b))
    }

    pub fn refresh(&self, scope: RefreshScope) -> Result<RefreshReport> {
        self.mutate(|state, _| state.refresh(scope))
    }

    /// Clears the corruption marker of a halted tournament and refreshes it.
    pub fn clear_corruption(&self) -> Result<RefreshReport> {
        self.mutate(|state, _| {
            state.clear_corruption();
            state.refresh(RefreshScope::Full)
        })
    }

    pub fn set_match_time(&self, id: MatchId, time: DateTime<Utc>) -> Result<()> {
        let offsets = self.inner.offsets;
        self.mutate(|state, dispatcher| state.set_match_time(id, time, dispatcher, &offsets))
    }

    pub fn confirm_time(&self, id: MatchId, team_ref: TeamRef) -> Result<()> {
        self.mutate(|state, _| state.confirm_time(id, team_ref))
    }

    /// Marks a fired reminder as sent. Returns `false` if no pending reminder has `handle`.
    pub fn acknowledge_reminder(&self, handle: ReminderHandle) -> Result<bool> {
        self.mutate(|state, _| Ok(state.acknowledge_reminder(handle)))
    }

    fn mutate<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TournamentState, &dyn Dispatcher) -> intramural_core::Result<T>,
    {
        let inner = &*self.inner;
        let mut state = inner.state.write();

        let mut next = state.clone();
        let staged = Staged::new(&*inner.dispatcher);

        match f(&mut next, &staged) {
            Ok(value) => {
                if let Err(err) = inner.store.save(inner.id, &next) {
                    log::error!("Failed to save tournament {}: {}", inner.id, err);

                    inner.discard(&state, &next);
                    return Err(err);
                }

                *state = next;
                staged.commit();
                Ok(value)
            }
            Err(intramural_core::Error::BracketCorrupt(reason)) => {
                inner.discard(&state, &next);

                // Only the halt survives the failed operation.
                if next.is_halted() && !state.is_halted() {
                    let mut halted = state.clone();
                    halted.halt(reason.clone());

                    inner.store.save(inner.id, &halted)?;
                    *state = halted;
                }

                Err(intramural_core::Error::BracketCorrupt(reason).into())
            }
            Err(err) => {
                inner.discard(&state, &next);
                Err(err.into())
            }
        }
    }
}

/// A [`Dispatcher`] that forwards new reminders right away but holds back cancellations until
/// [`commit`] is called. Reminders replaced by a change must keep firing if that change is never
/// persisted.
///
/// [`commit`]: Staged::commit
struct Staged<'a> {
    dispatcher: &'a dyn Dispatcher,
    cancelled: Mutex<Vec<ReminderHandle>>,
}

impl<'a> Staged<'a> {
    fn new(dispatcher: &'a dyn Dispatcher) -> Self {
        Self {
            dispatcher,
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Cancels all held back reminders.
    fn commit(self) {
        for handle in self.cancelled.into_inner() {
            self.dispatcher.cancel(handle);
        }
    }
}

impl<'a> Dispatcher for Staged<'a> {
    fn schedule_fire(&self, at: DateTime<Utc>, payload: ReminderPayload) -> ReminderHandle {
        self.dispatcher.schedule_fire(at, payload)
    }

    fn cancel(&self, handle: ReminderHandle) {
        self.cancelled.lock().push(handle);
    }
}

struct LiveTournamentInner {
    id: TournamentId,
    state: RwLock<TournamentState>,
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    offsets: ReminderOffsets,
    tournaments: Registry,
}

impl LiveTournamentInner {
    /// Cancels reminders that were handed to the dispatcher while building a state that is
    /// thrown away.
    fn discard(&self, current: &TournamentState, next: &TournamentState) {
        for schedule in next.reminders() {
            for reminder in schedule.reminders.iter() {
                let known = current.reminders().iter().any(|s| {
                    s.reminders
                        .iter()
                        .any(|r| r.handle == reminder.handle)
                });

                if !known {
                    self.dispatcher.cancel(reminder.handle);
                }
            }
        }
    }
}

impl Drop for LiveTournamentInner {
    fn drop(&mut self) {
        let mut tournaments = self.tournaments.write();

        // The entry may already point to a newer copy loaded after this one became unreachable.
        if let Some(entry) = tournaments.get(&self.id) {
            if entry.strong_count() == 0 {
                tournaments.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, ErrorKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use intramural_core::reminder::ReminderStatus;
    use intramural_core::{
        Dispatcher, Error as CoreError, Format, MatchId, ReminderHandle, ReminderOffsets,
        ReminderPayload, TeamRef, TournamentConfig, TournamentId, TournamentState,
    };
    use parking_lot::Mutex;

    use super::Tournaments;
    use crate::store::{MemoryStore, Store};
    use crate::Error;

    #[derive(Debug, Default)]
    struct Recorder {
        next: Mutex<u64>,
        cancelled: Mutex<Vec<ReminderHandle>>,
    }

    impl Dispatcher for Recorder {
        fn schedule_fire(&self, _: chrono::DateTime<Utc>, _: ReminderPayload) -> ReminderHandle {
            let mut next = self.next.lock();
            *next += 1;
            ReminderHandle(*next)
        }

        fn cancel(&self, handle: ReminderHandle) {
            self.cancelled.lock().push(handle);
        }
    }

    /// A [`MemoryStore`] whose saves fail while `failing` is set.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl Store for FlakyStore {
        fn load(&self, id: TournamentId) -> crate::Result<Option<TournamentState>> {
            self.inner.load(id)
        }

        fn save(&self, id: TournamentId, state: &TournamentState) -> crate::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(ErrorKind::Other, "disk full").into());
            }

            self.inner.save(id, state)
        }
    }

    fn tournaments() -> (Tournaments, Arc<MemoryStore>, Arc<Recorder>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(Recorder::default());

        (
            Tournaments::new(store.clone(), dispatcher.clone(), ReminderOffsets::default()),
            store,
            dispatcher,
        )
    }

    #[test]
    fn test_tournaments_registry() {
        let (tournaments, store, _) = tournaments();

        let tournament = tournaments
            .create(TournamentConfig::new("Spring Cup", Format::RoundRobin))
            .unwrap();
        let id = tournament.id();
        assert_eq!(tournaments.len(), 1);
        assert!(store.load(id).unwrap().is_some());

        let other = tournaments.get(id).unwrap();
        other.add_team(TeamRef(1), None).unwrap();
        assert_eq!(tournament.teams().len(), 1);

        drop(tournament);
        drop(other);
        assert!(tournaments.is_empty());
        assert!(tournaments.get_local(id).is_none());

        // Reloaded from the store.
        let tournament = tournaments.get(id).unwrap();
        assert_eq!(tournament.teams().len(), 1);
        assert_eq!(tournaments.len(), 1);

        assert!(matches!(
            tournaments.get(TournamentId(id.0 + 1)),
            Err(Error::TournamentNotFound(_))
        ));
    }

    #[test]
    fn test_mutate_atomic() {
        let (tournaments, store, _) = tournaments();

        let tournament = tournaments
            .create(TournamentConfig::new("Spring Cup", Format::Swiss))
            .unwrap();
        tournament.add_team(TeamRef(1), None).unwrap();

        let before = tournament.snapshot();
        let err = tournament.add_team(TeamRef(1), None).unwrap_err();
        assert_eq!(err.as_core(), Some(&CoreError::DuplicateTeam(TeamRef(1))));

        assert_eq!(tournament.snapshot(), before);
        assert_eq!(store.load(tournament.id()).unwrap(), Some(before));
    }

    #[test]
    fn test_set_match_time() {
        let (tournaments, store, dispatcher) = tournaments();

        let tournament = tournaments
            .create(TournamentConfig::new("Spring Cup", Format::RoundRobin))
            .unwrap();
        tournament.add_team(TeamRef(1), None).unwrap();
        tournament.add_team(TeamRef(2), None).unwrap();
        tournament.start().unwrap();

        let time = Utc.with_ymd_and_hms(2030, 5, 1, 18, 0, 0).unwrap();
        tournament.set_match_time(MatchId(0), time).unwrap();
        tournament
            .set_match_time(MatchId(0), time + Duration::hours(2))
            .unwrap();

        // The first two reminders are replaced.
        assert_eq!(
            *dispatcher.cancelled.lock(),
            vec![ReminderHandle(1), ReminderHandle(2)]
        );

        let state: TournamentState = store.load(tournament.id()).unwrap().unwrap();
        let schedule = &state.reminders()[0];
        assert_eq!(schedule.scheduled, time + Duration::hours(2));
        assert_eq!(schedule.reminders[0].handle, ReminderHandle(3));

        assert!(tournament.acknowledge_reminder(ReminderHandle(3)).unwrap());
        assert!(!tournament.acknowledge_reminder(ReminderHandle(1)).unwrap());
        assert_eq!(
            tournament.snapshot().reminders()[0].reminders[0].status,
            ReminderStatus::Sent
        );

        tournament.confirm_time(MatchId(0), TeamRef(2)).unwrap();
        assert_eq!(
            tournament.get_match(MatchId(0)).unwrap().confirmed(),
            [false, true]
        );
    }

    #[test]
    fn test_save_failure_keeps_reminders() {
        let store = Arc::new(FlakyStore::default());
        let dispatcher = Arc::new(Recorder::default());
        let tournaments =
            Tournaments::new(store.clone(), dispatcher.clone(), ReminderOffsets::default());

        let tournament = tournaments
            .create(TournamentConfig::new("Spring Cup", Format::RoundRobin))
            .unwrap();
        tournament.add_team(TeamRef(1), None).unwrap();
        tournament.add_team(TeamRef(2), None).unwrap();
        tournament.start().unwrap();

        let time = Utc.with_ymd_and_hms(2030, 5, 1, 18, 0, 0).unwrap();
        tournament.set_match_time(MatchId(0), time).unwrap();

        let before = tournament.snapshot();
        store.failing.store(true, Ordering::SeqCst);

        let err = tournament
            .set_match_time(MatchId(0), time + Duration::hours(2))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        // Only the reminders of the lost change are cancelled.
        assert_eq!(
            *dispatcher.cancelled.lock(),
            vec![ReminderHandle(3), ReminderHandle(4)]
        );
        assert_eq!(tournament.snapshot(), before);
        assert_eq!(store.load(tournament.id()).unwrap(), Some(before.clone()));

        assert!(tournament.report_result(MatchId(0), 2, 1).is_err());
        assert_eq!(tournament.snapshot(), before);

        store.failing.store(false, Ordering::SeqCst);
        tournament
            .set_match_time(MatchId(0), time + Duration::hours(2))
            .unwrap();

        assert_eq!(
            *dispatcher.cancelled.lock(),
            vec![
                ReminderHandle(3),
                ReminderHandle(4),
                ReminderHandle(1),
                ReminderHandle(2)
            ]
        );
        assert!(tournament.acknowledge_reminder(ReminderHandle(5)).unwrap());
    }
}
