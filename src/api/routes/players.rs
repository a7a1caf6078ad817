use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{ExternalId, StatsReport, SteamId};
use crate::stats::StatsError;

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub external_id: ExternalId,
    pub steam_id: SteamId,
}

pub async fn player_stats(
    State(state): State<AppState>,
    Path(steam_id): Path<String>,
) -> Result<Json<StatsReport>, ApiError> {
    let steam_id = SteamId::from(steam_id);
    match state.stats.compute_stats(&steam_id).await {
        Ok(report) => Ok(Json(report)),
        Err(StatsError::UnknownAccount(id)) => {
            Err(ApiError::NotFound(format!("account {}", id)))
        }
        Err(e @ StatsError::StoreUnavailable(_)) => Err(ApiError::Unavailable(e.to_string())),
    }
}

pub async fn get_link(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<LinkResponse>, ApiError> {
    let external_id = ExternalId::from(external_id);
    let steam_id = state
        .links
        .resolve(&external_id)
        .ok_or_else(|| ApiError::NotFound(format!("link for {}", external_id)))?;

    Ok(Json(LinkResponse {
        external_id,
        steam_id,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::state::AppState;
    use crate::config::ChatConfig;
    use crate::dispatch::Dispatcher;
    use crate::links::IdentityLinkStore;
    use crate::models::{CombatEvent, GameAccount};
    use crate::stats::StatsAggregator;
    use crate::storage::{EventLog, EventTable, MemoryEventLog};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn setup_test_state(dir: &std::path::Path, log: Arc<MemoryEventLog>) -> AppState {
        let event_log: Arc<dyn EventLog> = log;
        let links = Arc::new(
            IdentityLinkStore::open(dir.join("links.jsonl"), event_log.clone()).unwrap(),
        );
        let stats = Arc::new(StatsAggregator::new(event_log));
        let dispatcher = Arc::new(Dispatcher::new(
            ChatConfig::default(),
            links.clone(),
            stats.clone(),
        ));
        AppState {
            links,
            stats,
            dispatcher,
        }
    }

    fn sample_log() -> MemoryEventLog {
        MemoryEventLog::new()
            .with_account(GameAccount::new("765", "Alpha"))
            .with_account(GameAccount::new("766", "Bravo"))
            .with_event(
                EventTable::Death,
                CombatEvent::at(Utc::now())
                    .in_match(4)
                    .with_attacker("765", "Alpha")
                    .with_victim("766", "Bravo"),
            )
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn post_json(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_player_stats() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, json) = get_json(app, "/api/players/765/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["kills"], 1);
        assert_eq!(json["deaths"], 0);
        assert_eq!(json["matches_played"], 1);
        assert_eq!(json["kd_ratio"], 1.0);
        assert_eq!(json["most_killed"]["name"], "Bravo");
    }

    #[tokio::test]
    async fn test_player_stats_unknown_account() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, json) = get_json(app, "/api/players/000/stats").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_player_stats_store_offline() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(sample_log());
        let app = build_router(setup_test_state(dir.path(), log.clone()));
        log.set_offline(true);

        let (status, json) = get_json(app, "/api/players/765/stats").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"]["code"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_message_link_then_lookup() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, json) = post_json(
            app.clone(),
            "/api/messages",
            r#"{"author_id":"u1","channel_id":"c","content":"!link 765"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["delete_message"], true);
        assert_eq!(json["reply"]["type"], "text");
        assert_eq!(json["reply"]["content"], "Account successfully linked");

        let (status, json) = get_json(app.clone(), "/api/links/u1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["steam_id"], "765");

        let (status, json) = post_json(
            app,
            "/api/messages",
            r#"{"author_id":"u1","content":"!stats"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reply"]["type"], "stats");
        assert_eq!(json["reply"]["title"], "Alpha - 765 STATS");
    }

    #[tokio::test]
    async fn test_message_ignored() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, json) = post_json(
            app,
            "/api/messages",
            r#"{"author_id":"u1","content":"just chatting"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["delete_message"], false);
        assert!(json["reply"].is_null());
    }

    #[tokio::test]
    async fn test_message_missing_author() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, _) = post_json(
            app,
            "/api/messages",
            r#"{"author_id":"","content":"!stats"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_link_not_found() {
        let dir = TempDir::new().unwrap();
        let app = build_router(setup_test_state(dir.path(), Arc::new(sample_log())));

        let (status, _) = get_json(app, "/api/links/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
