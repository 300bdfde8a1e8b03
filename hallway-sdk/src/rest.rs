//! REST-backed [`Platform`] implementation.
//!
//! Talks to the platform's HTTP API with the bot credential in the
//! `Authorization` header. Every request is bounded by a single timeout;
//! expiry is reported as [`PlatformError::Timeout`] and treated as
//! recoverable by callers.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::PlatformError;
use crate::model::{ChannelId, GuildId, MessageId, UserId};
use crate::platform::{Platform, Privilege};

/// Upper bound on any single platform call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the platform API.
pub struct RestPlatform {
    http: reqwest::Client,
    base: String,
}

impl RestPlatform {
    /// Build a client for the API at `base` authenticating as `token`.
    pub fn new(base: &str, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bot {token}"))
            .context("credential contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("HTTP client construction failed")?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, PlatformError> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout(REQUEST_TIMEOUT)
            } else {
                PlatformError::Transient(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        Err(match status {
            reqwest::StatusCode::NOT_FOUND => PlatformError::NotFound,
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                PlatformError::PermissionDenied(error_text(resp).await)
            }
            _ => PlatformError::Transient(format!("HTTP {status}: {}", error_text(resp).await)),
        })
    }
}

async fn error_text(resp: reqwest::Response) -> String {
    resp.text().await.unwrap_or_default()
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, PlatformError> {
    resp.json()
        .await
        .map_err(|e| PlatformError::Transient(format!("malformed response: {e}")))
}

#[derive(Debug, Deserialize)]
struct CreatedChannel {
    id: ChannelId,
}

#[derive(Debug, Deserialize)]
struct PostedMessage {
    id: MessageId,
}

#[derive(Debug, Deserialize)]
struct PurgeResult {
    deleted: usize,
}

#[derive(Debug, Deserialize)]
struct Occupancy {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct Privileges {
    administrator: bool,
    manage_messages: bool,
}

#[async_trait]
impl Platform for RestPlatform {
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        category: ChannelId,
        name: &str,
        user_limit: Option<u32>,
    ) -> Result<ChannelId, PlatformError> {
        let body = serde_json::json!({
            "name": name,
            "kind": "voice",
            "parent_id": category,
            "user_limit": user_limit,
        });
        let resp = self
            .execute(
                self.http
                    .post(self.url(&format!("/guilds/{guild}/channels")))
                    .json(&body),
            )
            .await?;
        let created: CreatedChannel = decode(resp).await?;
        Ok(created.id)
    }

    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), PlatformError> {
        let body = serde_json::json!({ "channel_id": channel });
        self.execute(
            self.http
                .patch(self.url(&format!("/guilds/{guild}/members/{user}")))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        self.execute(self.http.delete(self.url(&format!("/channels/{channel}"))))
            .await?;
        Ok(())
    }

    async fn set_connect_permission(
        &self,
        guild: GuildId,
        channel: ChannelId,
        allow: bool,
    ) -> Result<(), PlatformError> {
        // The default role's id is the guild id.
        let body = serde_json::json!({ "connect": allow });
        self.execute(
            self.http
                .put(self.url(&format!("/channels/{channel}/permissions/{guild}")))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        let body = serde_json::json!({ "content": text });
        let resp = self
            .execute(
                self.http
                    .post(self.url(&format!("/channels/{channel}/messages")))
                    .json(&body),
            )
            .await?;
        let posted: PostedMessage = decode(resp).await?;
        Ok(posted.id)
    }

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), PlatformError> {
        let body = serde_json::json!({ "content": text });
        self.execute(
            self.http
                .post(self.url(&format!("/users/{user}/messages")))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.execute(
            self.http
                .delete(self.url(&format!("/channels/{channel}/messages/{message}"))),
        )
        .await?;
        Ok(())
    }

    async fn purge_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<usize, PlatformError> {
        let body = serde_json::json!({ "limit": limit });
        let resp = self
            .execute(
                self.http
                    .post(self.url(&format!("/channels/{channel}/messages/purge")))
                    .json(&body),
            )
            .await?;
        let result: PurgeResult = decode(resp).await?;
        Ok(result.deleted)
    }

    async fn occupancy(&self, channel: ChannelId) -> Result<usize, PlatformError> {
        let resp = self
            .execute(
                self.http
                    .get(self.url(&format!("/channels/{channel}/occupancy"))),
            )
            .await;
        match resp {
            Ok(resp) => {
                let occupancy: Occupancy = decode(resp).await?;
                Ok(occupancy.count)
            }
            // A deleted channel reads as empty.
            Err(PlatformError::NotFound) => Ok(0),
            Err(e) => Err(e),
        }
    }

    async fn has_privilege(
        &self,
        guild: GuildId,
        user: UserId,
        privilege: Privilege,
    ) -> Result<bool, PlatformError> {
        let resp = self
            .execute(
                self.http
                    .get(self.url(&format!("/guilds/{guild}/members/{user}/privileges"))),
            )
            .await?;
        let privileges: Privileges = decode(resp).await?;
        Ok(match privilege {
            Privilege::ManageMessages => privileges.manage_messages,
            Privilege::Administrator => privileges.administrator,
        })
    }
}
