//! # Squad Stats
//!
//! Player statistics for game-server combat logs, served through chat
//! commands once a chat account is linked to a Steam account.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (accounts, links, combat events, reports)
//! - **storage**: JSONL files and the read-only event log interface
//! - **links**: Durable one-to-one chat/Steam account links
//! - **stats**: Per-player report aggregation
//! - **calculate**: Ratio metrics and group ranking
//! - **dispatch**: Chat command handling
//! - **api**: REST API endpoints for the chat connector
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod dispatch;
pub mod links;
pub mod models;
pub mod stats;
pub mod storage;

pub use models::*;
