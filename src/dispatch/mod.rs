//! Chat command handling.
//!
//! Turns an incoming chat message into link, unlink and stats calls and
//! describes the reply. Sending and deleting messages is left to the chat
//! connector, which receives a [`DispatchOutcome`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::links::{IdentityLinkStore, LinkError};
use crate::models::{ExternalId, StatsReport, SteamId, TopPlayer};
use crate::stats::{StatsAggregator, StatsError};

pub const MSG_MISSING_STEAM_ID: &str = "Please provide a steamID";
pub const MSG_UNKNOWN_STEAM_ID: &str = "No user found with that steamID";
pub const MSG_ALREADY_LINKED: &str = "Account already linked";
pub const MSG_LINKED: &str = "Account successfully linked";
pub const MSG_NOT_LINKED: &str = "Please link your account first";
pub const MSG_UNLINKED: &str = "Account successfully unlinked";
pub const MSG_ACCOUNT_GONE: &str = "No account found with this steamID";
pub const MSG_UNAVAILABLE: &str = "Stats are temporarily unavailable, please try again later";

/// A message as delivered by the chat connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author_id: ExternalId,

    #[serde(default)]
    pub author_is_bot: bool,

    #[serde(default)]
    pub channel_id: String,

    pub content: String,
}

/// Commands understood by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Link(Option<SteamId>),
    Unlink,
    Stats,
}

impl Command {
    /// Parse `content` if its first space-separated word is `prefix`
    /// immediately followed by a known command name.
    ///
    /// The Steam ID for `link` is the second space-separated word; an empty
    /// word (two spaces in a row) counts as missing.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let mut words = content.split(' ');
        let name = words.next()?.strip_prefix(prefix)?;

        match name {
            "link" => Some(Command::Link(
                words.next().filter(|w| !w.is_empty()).map(SteamId::from),
            )),
            "unlink" => Some(Command::Unlink),
            "stats" => Some(Command::Stats),
            _ => None,
        }
    }
}

/// One labelled value on a stats card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardField {
    pub name: String,
    pub value: String,
}

/// Stats report flattened into display strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCard {
    pub title: String,
    pub url: String,
    pub fields: Vec<CardField>,
}

impl StatsCard {
    pub fn from_report(report: &StatsReport) -> Self {
        let c = &report.counts;
        let field = |name: &str, value: String| CardField {
            name: name.to_string(),
            value,
        };

        Self {
            title: format!(
                "{} - {} STATS",
                report.account.last_name, report.account.steam_id
            ),
            url: report.account.steam_id.profile_url(),
            fields: vec![
                field("Kills", c.kills.to_string()),
                field("Deaths", c.deaths.to_string()),
                field("KD", format!("{:.2}", report.kd_ratio)),
                field("Revive", c.revives.to_string()),
                field("Revived", c.revived.to_string()),
                field("RPD", format!("{:.2}", report.revives_per_death)),
                field("Wound", c.hits.to_string()),
                field("Wounded", c.wounded.to_string()),
                field("HPR", format!("{:.2}", report.hits_per_revive)),
                field("TK", c.teamkills.to_string()),
                field("Played Match", c.matches_played.to_string()),
                field("Most Killed", top_label(&report.most_killed)),
                field("Most Died", top_label(&report.most_died_to)),
                field("Most Revived", top_label(&report.most_revived)),
            ],
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

fn top_label(top: &Option<TopPlayer>) -> String {
    match top {
        Some(p) => format!("{} ({})", p.name, p.count),
        None => "N/A".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Text { content: String },
    Stats(StatsCard),
}

impl Reply {
    fn text(content: &str) -> Self {
        Reply::Text {
            content: content.to_string(),
        }
    }
}

/// What the chat connector should do with a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Remove the original message (it may contain a Steam ID)
    pub delete_message: bool,
    pub reply: Option<Reply>,
}

impl DispatchOutcome {
    pub fn ignored() -> Self {
        Self::default()
    }

    fn reply(reply: Reply) -> Self {
        Self {
            delete_message: false,
            reply: Some(reply),
        }
    }

    fn deleted(mut self) -> Self {
        self.delete_message = true;
        self
    }
}

/// Routes chat commands to the link store and the stats aggregator.
pub struct Dispatcher {
    config: ChatConfig,
    links: Arc<IdentityLinkStore>,
    stats: Arc<StatsAggregator>,
}

impl Dispatcher {
    pub fn new(
        config: ChatConfig,
        links: Arc<IdentityLinkStore>,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            config,
            links,
            stats,
        }
    }

    /// Handle one incoming message.
    pub async fn handle(&self, message: &ChatMessage) -> DispatchOutcome {
        if message.author_is_bot {
            return DispatchOutcome::ignored();
        }
        if !self.config.channel_id.is_empty() && message.channel_id != self.config.channel_id {
            return DispatchOutcome::ignored();
        }
        let Some(command) = Command::parse(&message.content, &self.config.prefix) else {
            return DispatchOutcome::ignored();
        };

        debug!("Command {:?} from {}", command, message.author_id);

        match command {
            Command::Link(steam_id) => self.link(&message.author_id, steam_id).await.deleted(),
            Command::Unlink => self.unlink(&message.author_id).deleted(),
            Command::Stats => self.stats(&message.author_id).await,
        }
    }

    async fn link(&self, author: &ExternalId, steam_id: Option<SteamId>) -> DispatchOutcome {
        let Some(steam_id) = steam_id else {
            return DispatchOutcome::reply(Reply::text(MSG_MISSING_STEAM_ID));
        };

        let text = match self.links.link(author.clone(), steam_id).await {
            Ok(_) => MSG_LINKED,
            Err(LinkError::UnknownGameAccount(_)) => MSG_UNKNOWN_STEAM_ID,
            Err(LinkError::AlreadyLinked) => MSG_ALREADY_LINKED,
            Err(LinkError::NotLinked(_)) => MSG_NOT_LINKED,
            Err(LinkError::StoreUnavailable(e)) => {
                warn!("Link for {} failed: {}", author, e);
                MSG_UNAVAILABLE
            }
        };
        DispatchOutcome::reply(Reply::text(text))
    }

    fn unlink(&self, author: &ExternalId) -> DispatchOutcome {
        let text = match self.links.unlink(author) {
            Ok(_) => MSG_UNLINKED,
            Err(LinkError::NotLinked(_)) => MSG_NOT_LINKED,
            Err(e) => {
                warn!("Unlink for {} failed: {}", author, e);
                MSG_UNAVAILABLE
            }
        };
        DispatchOutcome::reply(Reply::text(text))
    }

    async fn stats(&self, author: &ExternalId) -> DispatchOutcome {
        let Some(steam_id) = self.links.resolve(author) else {
            return DispatchOutcome::reply(Reply::text(MSG_NOT_LINKED));
        };

        match self.stats.compute_stats(&steam_id).await {
            Ok(report) => {
                info!("Serving stats for {} to {}", steam_id, author);
                DispatchOutcome::reply(Reply::Stats(StatsCard::from_report(&report)))
            }
            Err(StatsError::UnknownAccount(_)) => {
                DispatchOutcome::reply(Reply::text(MSG_ACCOUNT_GONE))
            }
            Err(StatsError::StoreUnavailable(_)) => {
                DispatchOutcome::reply(Reply::text(MSG_UNAVAILABLE))
            }
        }
    }
}
