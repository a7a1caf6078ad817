//! Combat event log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SteamId;

/// One row of the wound, death or revive log.
///
/// The three tables share a layout; only revive rows carry the reviver
/// columns. Ids are optional because the server logs environmental damage
/// and disconnected players without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub time: DateTime<Utc>,

    /// Match the event happened in
    #[serde(default)]
    pub match_id: Option<u64>,

    #[serde(default)]
    pub wound_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub victim: Option<SteamId>,
    #[serde(default)]
    pub victim_name: Option<String>,
    #[serde(default)]
    pub victim_team_id: Option<i32>,
    #[serde(default)]
    pub victim_squad_id: Option<i32>,

    #[serde(default)]
    pub attacker: Option<SteamId>,
    #[serde(default)]
    pub attacker_name: Option<String>,
    #[serde(default)]
    pub attacker_team_id: Option<i32>,
    #[serde(default)]
    pub attacker_squad_id: Option<i32>,

    #[serde(default)]
    pub damage: Option<f64>,
    #[serde(default)]
    pub weapon: Option<String>,
    #[serde(default)]
    pub teamkill: bool,

    #[serde(default)]
    pub reviver: Option<SteamId>,
    #[serde(default)]
    pub reviver_name: Option<String>,
    #[serde(default)]
    pub reviver_team_id: Option<i32>,
    #[serde(default)]
    pub reviver_squad_id: Option<i32>,
}

impl CombatEvent {
    /// Create an event with everything but the timestamp unset.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            match_id: None,
            wound_time: None,
            victim: None,
            victim_name: None,
            victim_team_id: None,
            victim_squad_id: None,
            attacker: None,
            attacker_name: None,
            attacker_team_id: None,
            attacker_squad_id: None,
            damage: None,
            weapon: None,
            teamkill: false,
            reviver: None,
            reviver_name: None,
            reviver_team_id: None,
            reviver_squad_id: None,
        }
    }

    pub fn in_match(mut self, match_id: u64) -> Self {
        self.match_id = Some(match_id);
        self
    }

    pub fn with_victim(mut self, id: impl Into<SteamId>, name: impl Into<String>) -> Self {
        self.victim = Some(id.into());
        self.victim_name = Some(name.into());
        self
    }

    pub fn with_attacker(mut self, id: impl Into<SteamId>, name: impl Into<String>) -> Self {
        self.attacker = Some(id.into());
        self.attacker_name = Some(name.into());
        self
    }

    pub fn with_reviver(mut self, id: impl Into<SteamId>, name: impl Into<String>) -> Self {
        self.reviver = Some(id.into());
        self.reviver_name = Some(name.into());
        self
    }

    pub fn with_weapon(mut self, weapon: impl Into<String>, damage: f64) -> Self {
        self.weapon = Some(weapon.into());
        self.damage = Some(damage);
        self
    }

    pub fn as_teamkill(mut self) -> Self {
        self.teamkill = true;
        self
    }
}
