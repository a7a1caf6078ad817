//! Read access to the combat event log.
//!
//! The game-server logger owns these tables; this crate only queries them.
//! Queries are expressed as a table, an [`EventFilter`] predicate and, for
//! aggregations, a [`GroupKey`]. Backends that can push these down (e.g. a
//! SQL store) override the query methods; file and memory backends get them
//! for free from [`EventLog::scan`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{JsonlReader, StorageError};
use crate::calculate::rank_groups;
use crate::models::{CombatEvent, GameAccount, SteamId};

/// Combat log tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTable {
    Wound,
    Death,
    Revive,
}

impl EventTable {
    /// Get the filename for this table.
    pub fn filename(&self) -> &'static str {
        match self {
            EventTable::Wound => "wounds.jsonl",
            EventTable::Death => "deaths.jsonl",
            EventTable::Revive => "revives.jsonl",
        }
    }
}

/// Filename of the game account table.
pub const ACCOUNTS_FILENAME: &str = "steam_users.jsonl";

/// Column to group by in aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Attacker,
    Victim,
    Reviver,
    Match,
}

impl GroupKey {
    /// Key and display label for an event, `None` when the column is null.
    fn extract(&self, event: &CombatEvent) -> Option<(String, Option<String>)> {
        match self {
            GroupKey::Attacker => event
                .attacker
                .as_ref()
                .map(|id| (id.as_str().to_string(), event.attacker_name.clone())),
            GroupKey::Victim => event
                .victim
                .as_ref()
                .map(|id| (id.as_str().to_string(), event.victim_name.clone())),
            GroupKey::Reviver => event
                .reviver
                .as_ref()
                .map(|id| (id.as_str().to_string(), event.reviver_name.clone())),
            GroupKey::Match => event.match_id.map(|m| (m.to_string(), None)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Row predicate. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub attacker: Option<SteamId>,
    pub victim: Option<SteamId>,
    pub reviver: Option<SteamId>,
    pub not_attacker: Option<SteamId>,
    pub not_victim: Option<SteamId>,
    pub teamkill: Option<bool>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attacker(mut self, id: &SteamId) -> Self {
        self.attacker = Some(id.clone());
        self
    }

    pub fn victim(mut self, id: &SteamId) -> Self {
        self.victim = Some(id.clone());
        self
    }

    pub fn reviver(mut self, id: &SteamId) -> Self {
        self.reviver = Some(id.clone());
        self
    }

    pub fn not_attacker(mut self, id: &SteamId) -> Self {
        self.not_attacker = Some(id.clone());
        self
    }

    pub fn not_victim(mut self, id: &SteamId) -> Self {
        self.not_victim = Some(id.clone());
        self
    }

    pub fn teamkill(mut self, teamkill: bool) -> Self {
        self.teamkill = Some(teamkill);
        self
    }

    /// Check whether an event satisfies every set condition.
    pub fn matches(&self, event: &CombatEvent) -> bool {
        fn equals(want: &Option<SteamId>, got: &Option<SteamId>) -> bool {
            match want {
                Some(id) => got.as_ref() == Some(id),
                None => true,
            }
        }
        fn differs(avoid: &Option<SteamId>, got: &Option<SteamId>) -> bool {
            match avoid {
                Some(id) => got.as_ref() != Some(id),
                None => true,
            }
        }

        equals(&self.attacker, &event.attacker)
            && equals(&self.victim, &event.victim)
            && equals(&self.reviver, &event.reviver)
            && differs(&self.not_attacker, &event.attacker)
            && differs(&self.not_victim, &event.victim)
            && self.teamkill.map_or(true, |tk| event.teamkill == tk)
    }
}

/// One aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub display_name: Option<String>,
    pub count: u64,
}

/// Read-only access to the combat log and the account table.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Backend identifier for logging.
    fn name(&self) -> &'static str;

    /// Look up a game account. A missing account is `Ok(None)`.
    async fn find_account(&self, steam_id: &SteamId) -> Result<Option<GameAccount>, StorageError>;

    /// All rows of `table` matching `filter`, in log order.
    async fn scan(
        &self,
        table: EventTable,
        filter: &EventFilter,
    ) -> Result<Vec<CombatEvent>, StorageError>;

    /// Number of rows matching `filter`.
    async fn count_events(
        &self,
        table: EventTable,
        filter: &EventFilter,
    ) -> Result<u64, StorageError> {
        Ok(self.scan(table, filter).await?.len() as u64)
    }

    /// Number of distinct non-null `key` values among matching rows.
    async fn count_distinct(
        &self,
        table: EventTable,
        filter: &EventFilter,
        key: GroupKey,
    ) -> Result<u64, StorageError> {
        let rows = self.scan(table, filter).await?;
        let distinct: HashSet<String> = rows
            .iter()
            .filter_map(|e| key.extract(e).map(|(k, _)| k))
            .collect();
        Ok(distinct.len() as u64)
    }

    /// Group matching rows by `key` and return the `limit` largest (or
    /// smallest) groups. Rows with a null key are dropped. Equal counts keep
    /// the order in which the group first appeared in the log.
    async fn group_and_count_top(
        &self,
        table: EventTable,
        filter: &EventFilter,
        key: GroupKey,
        limit: usize,
        order: SortOrder,
    ) -> Result<Vec<GroupCount>, StorageError> {
        let rows = self.scan(table, filter).await?;
        let ranked = rank_groups(
            rows.iter().filter_map(|e| key.extract(e)),
            order == SortOrder::Desc,
        );

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|g| GroupCount {
                key: g.key,
                display_name: g.label,
                count: g.count,
            })
            .collect())
    }
}

/// Event log backed by JSONL tables in a directory.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    dir: PathBuf,
}

impl JsonlEventLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn table_path(&self, table: EventTable) -> PathBuf {
        self.dir.join(table.filename())
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.dir.join(ACCOUNTS_FILENAME)
    }
}

#[async_trait]
impl EventLog for JsonlEventLog {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn find_account(&self, steam_id: &SteamId) -> Result<Option<GameAccount>, StorageError> {
        let path = self.accounts_path();
        let steam_id = steam_id.clone();
        run_blocking(move || {
            let accounts = JsonlReader::<GameAccount>::new(path).read_all()?;
            // Later rows win so a re-logged account reports its newest name.
            Ok(accounts.into_iter().rev().find(|a| a.steam_id == steam_id))
        })
        .await
    }

    async fn scan(
        &self,
        table: EventTable,
        filter: &EventFilter,
    ) -> Result<Vec<CombatEvent>, StorageError> {
        let path = self.table_path(table);
        let filter = filter.clone();
        let matched = run_blocking(move || {
            let rows = JsonlReader::<CombatEvent>::new(path).read_all()?;
            Ok(rows.into_iter().filter(|e| filter.matches(e)).collect::<Vec<_>>())
        })
        .await?;
        debug!("{:?} scan matched {} rows", table, matched.len());
        Ok(matched)
    }
}

/// Run a file read on the blocking pool so concurrent queries and timeouts
/// keep making progress on the runtime.
async fn run_blocking<T, F>(read: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(read)
        .await
        .map_err(|e| StorageError::Unavailable(format!("event log read task failed: {}", e)))?
}

/// In-process event log, used by tests and embedders that already hold the
/// rows in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    accounts: Vec<GameAccount>,
    wounds: Vec<CombatEvent>,
    deaths: Vec<CombatEvent>,
    revives: Vec<CombatEvent>,
    offline: AtomicBool,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: GameAccount) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_event(mut self, table: EventTable, event: CombatEvent) -> Self {
        self.push(table, event);
        self
    }

    pub fn push(&mut self, table: EventTable, event: CombatEvent) {
        match table {
            EventTable::Wound => self.wounds.push(event),
            EventTable::Death => self.deaths.push(event),
            EventTable::Revive => self.revives.push(event),
        }
    }

    /// Make every query fail until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory log is offline".to_string()));
        }
        Ok(())
    }

    fn table(&self, table: EventTable) -> &[CombatEvent] {
        match table {
            EventTable::Wound => &self.wounds,
            EventTable::Death => &self.deaths,
            EventTable::Revive => &self.revives,
        }
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_account(&self, steam_id: &SteamId) -> Result<Option<GameAccount>, StorageError> {
        self.ensure_online()?;
        Ok(self
            .accounts
            .iter()
            .rev()
            .find(|a| &a.steam_id == steam_id)
            .cloned())
    }

    async fn scan(
        &self,
        table: EventTable,
        filter: &EventFilter,
    ) -> Result<Vec<CombatEvent>, StorageError> {
        self.ensure_online()?;
        Ok(self
            .table(table)
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}
