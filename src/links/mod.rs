//! Chat account to game account links.
//!
//! [`IdentityLinkStore`] keeps a one-to-one mapping between chat users and
//! Steam accounts. The full snapshot is loaded at startup and indexed in both
//! directions.
//!
//! Every mutation runs under the store mutex and an exclusive lock on a
//! sibling `.lock` file, so writers in other processes are serialized too.
//! Under the lock the snapshot is reloaded, checked, written back with an
//! atomic rename, and only then swapped into memory. Racing requests for the
//! same id resolve to a single winner and a failed write changes nothing.
//! Reads pick up snapshots written by other processes when the file's size or
//! modification time changes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{ExternalId, GameAccount, IdentityLink, SteamId};
use crate::storage::{EventLog, FileLock, JsonlReader, JsonlWriter, StorageError};

/// Errors returned by link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Account already linked")]
    AlreadyLinked,

    #[error("No link exists for {0}")]
    NotLinked(ExternalId),

    #[error("Unknown game account: {0}")]
    UnknownGameAccount(SteamId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

/// Bidirectional index over the current links.
#[derive(Debug, Clone, Default)]
struct LinkIndex {
    /// Links in creation order; this is what gets persisted.
    links: Vec<IdentityLink>,
    by_external: HashMap<ExternalId, SteamId>,
    by_steam: HashMap<SteamId, ExternalId>,
}

impl LinkIndex {
    fn from_links(links: Vec<IdentityLink>) -> Result<Self, String> {
        let mut index = Self::default();
        for link in links {
            if index.by_external.contains_key(&link.external_id) {
                return Err(format!("duplicate external id {}", link.external_id));
            }
            if index.by_steam.contains_key(&link.steam_id) {
                return Err(format!("duplicate steam id {}", link.steam_id));
            }
            index.insert(link);
        }
        Ok(index)
    }

    fn insert(&mut self, link: IdentityLink) {
        self.by_external
            .insert(link.external_id.clone(), link.steam_id.clone());
        self.by_steam
            .insert(link.steam_id.clone(), link.external_id.clone());
        self.links.push(link);
    }

    fn remove(&mut self, external_id: &ExternalId) -> Option<IdentityLink> {
        let steam_id = self.by_external.remove(external_id)?;
        self.by_steam.remove(&steam_id);
        let pos = self
            .links
            .iter()
            .position(|l| &l.external_id == external_id)?;
        Some(self.links.remove(pos))
    }
}

/// Size and modification time of the snapshot when it was last loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SnapshotStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl SnapshotStamp {
    /// A missing file stamps as the default.
    fn of(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) => Self {
                modified: meta.modified().ok(),
                len: meta.len(),
            },
            Err(_) => Self::default(),
        }
    }
}

#[derive(Debug)]
struct Loaded {
    index: LinkIndex,
    stamp: SnapshotStamp,
}

/// Durable one-to-one mapping between chat and game accounts.
pub struct IdentityLinkStore {
    path: PathBuf,
    lock_path: PathBuf,
    writer: JsonlWriter<IdentityLink>,
    state: Mutex<Loaded>,
    accounts: Arc<dyn EventLog>,
}

impl IdentityLinkStore {
    /// Load the link snapshot at `path`. A missing file is an empty store.
    ///
    /// Fails if the snapshot has unreadable lines or maps an id twice.
    pub fn open(path: PathBuf, accounts: Arc<dyn EventLog>) -> Result<Self, StorageError> {
        let loaded = load_snapshot(&path)?;
        info!(
            "Loaded {} account links from {:?}",
            loaded.index.links.len(),
            path
        );

        Ok(Self {
            lock_path: lock_path_for(&path),
            writer: JsonlWriter::new(path.clone()),
            path,
            state: Mutex::new(loaded),
            accounts,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Loaded> {
        // The state is only replaced wholesale, so a panic elsewhere cannot
        // leave it half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock the state, first reloading it if another process replaced the
    /// snapshot. A failed reload keeps the last good state.
    fn current(&self) -> MutexGuard<'_, Loaded> {
        let mut state = self.lock();
        if SnapshotStamp::of(&self.path) != state.stamp {
            match load_snapshot(&self.path) {
                Ok(loaded) => {
                    debug!(
                        "Reloaded {} links from {:?}",
                        loaded.index.links.len(),
                        self.path
                    );
                    *state = loaded;
                }
                Err(e) => warn!(
                    "Keeping cached links, reload of {:?} failed: {}",
                    self.path, e
                ),
            }
        }
        state
    }

    /// Apply `change` to the latest on-disk snapshot and persist the result.
    ///
    /// Holds the store mutex and the cross-process file lock throughout. If
    /// `change` or the write fails, the file is untouched and memory holds
    /// the snapshot as it was read.
    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut LinkIndex) -> Result<R, LinkError>,
    ) -> Result<R, LinkError> {
        let mut state = self.lock();
        let _file_lock = FileLock::exclusive(self.lock_path.clone())?;

        *state = load_snapshot(&self.path)?;
        let mut next = state.index.clone();
        let result = change(&mut next)?;

        self.writer.write_all(&next.links)?;
        *state = Loaded {
            index: next,
            stamp: SnapshotStamp::of(&self.path),
        };
        Ok(result)
    }

    /// Link `external_id` to `steam_id`.
    pub async fn link(
        &self,
        external_id: ExternalId,
        steam_id: SteamId,
    ) -> Result<IdentityLink, LinkError> {
        if self.accounts.find_account(&steam_id).await?.is_none() {
            debug!("Link rejected, unknown steam id {}", steam_id);
            return Err(LinkError::UnknownGameAccount(steam_id));
        }

        let link = self.mutate(|index| {
            if index.by_external.contains_key(&external_id)
                || index.by_steam.contains_key(&steam_id)
            {
                return Err(LinkError::AlreadyLinked);
            }
            let link = IdentityLink::new(external_id, steam_id);
            index.insert(link.clone());
            Ok(link)
        })?;

        info!("Linked {} to {}", link.external_id, link.steam_id);
        Ok(link)
    }

    /// Remove the link owned by `external_id`.
    pub fn unlink(&self, external_id: &ExternalId) -> Result<IdentityLink, LinkError> {
        let removed = self.mutate(|index| {
            index
                .remove(external_id)
                .ok_or_else(|| LinkError::NotLinked(external_id.clone()))
        })?;

        info!("Unlinked {} from {}", removed.external_id, removed.steam_id);
        Ok(removed)
    }

    /// Game account linked to `external_id`.
    pub fn resolve(&self, external_id: &ExternalId) -> Option<SteamId> {
        self.current().index.by_external.get(external_id).cloned()
    }

    /// Chat account linked to `steam_id`.
    pub fn resolve_external(&self, steam_id: &SteamId) -> Option<ExternalId> {
        self.current().index.by_steam.get(steam_id).cloned()
    }

    /// Look up a game account in the event log. Unknown ids are `Ok(None)`.
    pub async fn resolve_account(
        &self,
        steam_id: &SteamId,
    ) -> Result<Option<GameAccount>, LinkError> {
        match self.accounts.find_account(steam_id).await {
            Ok(account) => Ok(account),
            Err(e) => {
                warn!("Account lookup for {} failed: {}", steam_id, e);
                Err(LinkError::StoreUnavailable(e))
            }
        }
    }

    /// Snapshot of all links in creation order.
    pub fn links(&self) -> Vec<IdentityLink> {
        self.current().index.links.clone()
    }

    pub fn len(&self) -> usize {
        self.current().index.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `linked_accounts.jsonl` locks through `linked_accounts.jsonl.lock`.
fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

fn load_snapshot(path: &Path) -> Result<Loaded, StorageError> {
    let stamp = SnapshotStamp::of(path);
    let links = JsonlReader::<IdentityLink>::new(path.to_path_buf()).read_all_strict()?;
    let index = LinkIndex::from_links(links).map_err(|message| StorageError::Corrupt {
        path: path.to_path_buf(),
        line: 0,
        message,
    })?;
    Ok(Loaded { index, stamp })
}
