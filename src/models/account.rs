//! Game account and identity link models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ExternalId, SteamId};

/// A player's game account as recorded by the server log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAccount {
    /// Primary key
    pub steam_id: SteamId,

    /// Most recent in-game name
    #[serde(default)]
    pub last_name: String,
}

impl GameAccount {
    pub fn new(steam_id: impl Into<SteamId>, last_name: impl Into<String>) -> Self {
        Self {
            steam_id: steam_id.into(),
            last_name: last_name.into(),
        }
    }
}

/// Binding between a chat account and a game account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub external_id: ExternalId,
    pub steam_id: SteamId,

    /// When the link was created. Older snapshots lack it.
    #[serde(default = "Utc::now")]
    pub linked_at: DateTime<Utc>,
}

impl IdentityLink {
    pub fn new(external_id: ExternalId, steam_id: SteamId) -> Self {
        Self {
            external_id,
            steam_id,
            linked_at: Utc::now(),
        }
    }
}
