//! Per-player statistics report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameAccount, SteamId};
use crate::calculate::{hits_per_revive, kd_ratio, revives_per_death};

/// Raw event counts for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub kills: u64,
    pub deaths: u64,
    pub revives: u64,
    pub revived: u64,
    /// Wounds dealt
    pub hits: u64,
    /// Wounds taken
    pub wounded: u64,
    pub teamkills: u64,
    pub matches_played: u64,
}

/// The opponent (or ally) a player interacted with most.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPlayer {
    pub steam_id: SteamId,
    pub name: String,
    pub count: u64,
}

/// Aggregate statistics for a game account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub account: GameAccount,

    /// When the report was computed
    pub computed_at: DateTime<Utc>,

    #[serde(flatten)]
    pub counts: EventCounts,

    /// kills / deaths, or kills when there are no deaths
    pub kd_ratio: f64,

    pub revives_per_death: f64,

    pub hits_per_revive: f64,

    pub most_killed: Option<TopPlayer>,

    pub most_died_to: Option<TopPlayer>,

    pub most_revived: Option<TopPlayer>,
}

impl StatsReport {
    /// Build a report, deriving the ratios from the counts.
    pub fn new(
        account: GameAccount,
        counts: EventCounts,
        most_killed: Option<TopPlayer>,
        most_died_to: Option<TopPlayer>,
        most_revived: Option<TopPlayer>,
    ) -> Self {
        Self {
            account,
            computed_at: Utc::now(),
            kd_ratio: kd_ratio(counts.kills, counts.deaths),
            revives_per_death: revives_per_death(counts.revives, counts.deaths),
            hits_per_revive: hits_per_revive(counts.hits, counts.revives),
            counts,
            most_killed,
            most_died_to,
            most_revived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_derives_ratios() {
        let counts = EventCounts {
            kills: 5,
            deaths: 2,
            revives: 4,
            hits: 20,
            ..Default::default()
        };
        let report = StatsReport::new(GameAccount::new("1", "Alpha"), counts, None, None, None);

        assert_eq!(report.kd_ratio, 2.5);
        assert_eq!(report.revives_per_death, 2.0);
        assert_eq!(report.hits_per_revive, 5.0);
    }

    #[test]
    fn test_report_with_no_deaths() {
        let counts = EventCounts {
            kills: 5,
            revives: 3,
            ..Default::default()
        };
        let report = StatsReport::new(GameAccount::new("1", "Alpha"), counts, None, None, None);

        assert_eq!(report.kd_ratio, 5.0);
        assert_eq!(report.revives_per_death, 0.0);
        assert_eq!(report.hits_per_revive, 0.0);
    }

    #[test]
    fn test_report_serializes_counts_flat() {
        let counts = EventCounts {
            kills: 3,
            ..Default::default()
        };
        let report = StatsReport::new(GameAccount::new("1", "Alpha"), counts, None, None, None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["kills"], 3);
        assert_eq!(json["account"]["last_name"], "Alpha");
        assert!(json["most_killed"].is_null());
    }
}
