//! Per-player statistics aggregation.
//!
//! [`StatsAggregator`] turns the raw combat log into a [`StatsReport`]. The
//! sub-queries are independent reads and run concurrently; the report is
//! only assembled once every one of them has succeeded.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{EventCounts, GameAccount, StatsReport, SteamId, TopPlayer};
use crate::storage::{EventFilter, EventLog, EventTable, GroupKey, SortOrder, StorageError};

/// Errors returned by [`StatsAggregator::compute_stats`].
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Unknown account: {0}")]
    UnknownAccount(SteamId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StorageError> for StatsError {
    fn from(e: StorageError) -> Self {
        StatsError::StoreUnavailable(e.to_string())
    }
}

/// Computes statistics reports from an event log.
pub struct StatsAggregator {
    log: Arc<dyn EventLog>,
    timeout: Option<Duration>,
}

impl StatsAggregator {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log, timeout: None }
    }

    /// Fail with `StoreUnavailable` when the queries take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Compute the report for `steam_id`.
    pub async fn compute_stats(&self, steam_id: &SteamId) -> Result<StatsReport, StatsError> {
        let work = self.compute(steam_id);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(StatsError::StoreUnavailable(format!(
                    "stats query timed out after {:?}",
                    limit
                ))),
            },
            None => work.await,
        };

        if let Err(StatsError::StoreUnavailable(ref reason)) = result {
            warn!(
                "Stats for {} failed on {} store: {}",
                steam_id,
                self.log.name(),
                reason
            );
        }
        result
    }

    async fn compute(&self, steam_id: &SteamId) -> Result<StatsReport, StatsError> {
        let account = self
            .log
            .find_account(steam_id)
            .await?
            .ok_or_else(|| StatsError::UnknownAccount(steam_id.clone()))?;

        debug!("Computing stats for {} ({})", account.last_name, steam_id);

        let id = steam_id;
        let log = self.log.as_ref();

        let kills_filter = EventFilter::new().attacker(id);
        let deaths_filter = EventFilter::new().victim(id);
        let revives_filter = EventFilter::new().reviver(id);
        let revived_filter = EventFilter::new().victim(id);
        let teamkills_filter = EventFilter::new().attacker(id).teamkill(true);
        let killed_filter = EventFilter::new().attacker(id).not_victim(id);
        let died_to_filter = EventFilter::new().victim(id).not_attacker(id);

        let (
            kills,
            deaths,
            revives,
            revived,
            hits,
            wounded,
            teamkills,
            matches_played,
            most_killed,
            most_died_to,
            most_revived,
        ) = tokio::try_join!(
            log.count_events(EventTable::Death, &kills_filter),
            log.count_events(EventTable::Death, &deaths_filter),
            log.count_events(EventTable::Revive, &revives_filter),
            log.count_events(EventTable::Revive, &revived_filter),
            log.count_events(EventTable::Wound, &kills_filter),
            log.count_events(EventTable::Wound, &deaths_filter),
            log.count_events(EventTable::Death, &teamkills_filter),
            log.count_distinct(EventTable::Death, &kills_filter, GroupKey::Match),
            top_player(log, EventTable::Death, &killed_filter, GroupKey::Victim),
            top_player(log, EventTable::Death, &died_to_filter, GroupKey::Attacker),
            top_player(log, EventTable::Revive, &revives_filter, GroupKey::Victim),
        )?;

        let counts = EventCounts {
            kills,
            deaths,
            revives,
            revived,
            hits,
            wounded,
            teamkills,
            matches_played,
        };

        info!(
            "Stats for {}: {} kills, {} deaths, {} matches",
            steam_id, counts.kills, counts.deaths, counts.matches_played
        );

        Ok(StatsReport::new(
            account,
            counts,
            most_killed,
            most_died_to,
            most_revived,
        ))
    }

    /// Resolve the account without computing anything.
    pub async fn find_account(&self, steam_id: &SteamId) -> Result<Option<GameAccount>, StatsError> {
        Ok(self.log.find_account(steam_id).await?)
    }
}

/// Largest group for `key` among rows matching `filter`.
async fn top_player(
    log: &dyn EventLog,
    table: EventTable,
    filter: &EventFilter,
    key: GroupKey,
) -> Result<Option<TopPlayer>, StorageError> {
    let top = log
        .group_and_count_top(table, filter, key, 1, SortOrder::Desc)
        .await?;

    Ok(top.into_iter().next().map(|g| TopPlayer {
        name: g.display_name.unwrap_or_else(|| g.key.clone()),
        steam_id: SteamId::from(g.key),
        count: g.count,
    }))
}
