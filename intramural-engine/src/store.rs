//! Persistence of tournament states.
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use intramural_core::{TournamentId, TournamentState};
use parking_lot::RwLock;

use crate::Result;

pub trait Store: Send + Sync {
    /// Loads the tournament with the given `id`. Returns `None` if it was never saved.
    fn load(&self, id: TournamentId) -> Result<Option<TournamentState>>;

    fn save(&self, id: TournamentId, state: &TournamentState) -> Result<()>;
}

/// A [`Store`] keeping serialized states in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<TournamentId, Vec<u8>>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn load(&self, id: TournamentId) -> Result<Option<TournamentState>> {
        let inner = self.inner.read();

        match inner.get(&id) {
            Some(buf) => Ok(Some(serde_json::from_slice(buf)?)),
            None => Ok(None),
        }
    }

    fn save(&self, id: TournamentId, state: &TournamentState) -> Result<()> {
        let buf = serde_json::to_vec(state)?;

        self.inner.write().insert(id, buf);
        Ok(())
    }
}

/// A [`Store`] writing one JSON document per tournament into a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a new `FileStore` in `dir`, creating the directory if it does not exist.
    pub fn new<P>(dir: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: TournamentId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl Store for FileStore {
    fn load(&self, id: TournamentId) -> Result<Option<TournamentState>> {
        let buf = match fs::read(self.path(id)) {
            Ok(buf) => buf,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_slice(&buf)?))
    }

    fn save(&self, id: TournamentId, state: &TournamentState) -> Result<()> {
        let path = self.path(id);
        let tmp = self.dir.join(format!("{}.json.tmp", id));

        let buf = serde_json::to_vec(state)?;

        // Readers only ever see a complete document.
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        log::debug!("Saved tournament {} to {}", id, path.display());
        Ok(())
    }
}
