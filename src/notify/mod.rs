//! Media player notification (the `notifyPlayer` job kind).
//!
//! Generalizes the single-player Jellyfin client into a list of configured
//! players, each refreshed independently; one player's failure does not
//! block the others. Talks the same `X-Emby-Token`-header REST contract,
//! which Jellyfin, Emby, and Jellyfin-compatible servers all accept.

use std::time::Duration;

use async_trait::async_trait;
use mediarch_common::Result;
use mediarch_db::models::Job;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::MediaPlayerConfig;
use crate::queue::JobHandler;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PlayerClient {
    client: Client,
    base_url: String,
    api_key: String,
    name: String,
}

impl PlayerClient {
    pub fn new(config: &MediaPlayerConfig) -> Self {
        let client = Client::builder().timeout(CONNECTION_TIMEOUT).build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build http client with timeout, using default");
            Client::new()
        });

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            name: config.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trigger a full library refresh.
    pub async fn refresh_library(&self) -> Result<()> {
        let url = format!("{}/Library/Refresh", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(mediarch_common::Error::internal(format!("player refresh failed ({status}): {body}")));
        }

        Ok(())
    }

    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/System/Info", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;
        Ok(response.status().is_success())
    }
}

fn transport_error(player: &str, e: &reqwest::Error) -> mediarch_common::Error {
    if e.is_timeout() || e.is_connect() {
        mediarch_common::Error::ProviderUnavailable { provider: player.to_string(), message: e.to_string() }
    } else {
        mediarch_common::Error::internal(format!("{player} request failed: {e}"))
    }
}

/// Handles `notifyPlayer` jobs by refreshing every enabled configured player.
/// Best-effort across players: one failing does not fail the others, but the
/// job itself fails (for retry) if every configured player failed.
pub struct NotifyHandler {
    players: Vec<PlayerClient>,
}

impl NotifyHandler {
    pub fn new(configs: &[MediaPlayerConfig]) -> Self {
        let players = configs.iter().filter(|c| c.enabled).map(PlayerClient::new).collect();
        Self { players }
    }
}

#[async_trait]
impl JobHandler for NotifyHandler {
    async fn handle(&self, _job: &Job) -> Result<()> {
        if self.players.is_empty() {
            info!("no media players configured, notifyPlayer job is a no-op");
            return Ok(());
        }

        let mut failures = 0;
        for player in &self.players {
            match player.refresh_library().await {
                Ok(()) => info!(player = player.name(), "notified media player"),
                Err(e) => {
                    warn!(player = player.name(), error = %e, "failed to notify media player");
                    failures += 1;
                }
            }
        }

        if failures == self.players.len() {
            return Err(mediarch_common::Error::internal("all configured media players failed to refresh"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> MediaPlayerConfig {
        MediaPlayerConfig { name: "test".to_string(), url: url.to_string(), api_key: "key".to_string(), enabled: true }
    }

    #[tokio::test]
    async fn empty_player_list_is_a_noop() {
        let handler = NotifyHandler::new(&[]);
        let job = Job {
            id: mediarch_common::JobId::new(),
            kind: mediarch_common::JobKind::NotifyPlayer,
            priority: mediarch_common::JobPriority::BACKGROUND,
            payload: serde_json::json!({}),
            status: mediarch_db::models::JobStatus::Processing,
            retry_count: 0,
            max_retries: 3,
            manual: false,
            dedup_key: None,
            created_at: chrono::Utc::now(),
            started_at: None,
        };
        assert!(handler.handle(&job).await.is_ok());
    }

    #[tokio::test]
    async fn disabled_players_are_excluded() {
        let mut cfg = config("http://localhost:9");
        cfg.enabled = false;
        let handler = NotifyHandler::new(&[cfg]);
        assert!(handler.players.is_empty());
    }

    #[tokio::test]
    async fn unreachable_player_fails_the_job() {
        let handler = NotifyHandler::new(&[config("http://127.0.0.1:1")]);
        let job = Job {
            id: mediarch_common::JobId::new(),
            kind: mediarch_common::JobKind::NotifyPlayer,
            priority: mediarch_common::JobPriority::BACKGROUND,
            payload: serde_json::json!({}),
            status: mediarch_db::models::JobStatus::Processing,
            retry_count: 0,
            max_retries: 3,
            manual: false,
            dedup_key: None,
            created_at: chrono::Utc::now(),
            started_at: None,
        };
        assert!(handler.handle(&job).await.is_err());
    }
}
