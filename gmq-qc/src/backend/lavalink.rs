//! Lavalink v4 REST client
//!
//! Drives the guild players of a Lavalink node over its REST API. The same
//! client also resolves queries through `/v4/loadtracks` (see
//! `resolver::lavalink`). Track-ended notifications arrive from the node's
//! websocket, which the gateway layer owns and forwards to
//! `POST /guilds/{id}/track-ended`.

use super::{AudioBackend, ControlMessage, VoiceConnection};
use crate::error::{Error, Result};
use async_trait::async_trait;
use gmq_common::config::BackendSection;
use gmq_common::{GuildId, Track};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("gmq-qc/", env!("CARGO_PKG_VERSION"));

/// Lavalink node client
pub struct LavalinkClient {
    http_client: reqwest::Client,
    base_url: String,
    password: String,
    session_id: String,
}

impl LavalinkClient {
    /// Build a client for the node described by `section`
    ///
    /// The HTTP client carries its own timeout as a backstop; sessions apply
    /// the configured per-call timeout on top.
    pub fn new(section: &BackendSection) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(section.timeout_ms.saturating_mul(2)))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: section.url.trim_end_matches('/').to_string(),
            password: section.password.clone(),
            session_id: section.session_id.clone(),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    fn player_url(&self, guild: GuildId) -> Result<String> {
        if self.session_id.is_empty() {
            return Err(Error::BackendUnavailable(
                "no Lavalink session id configured".to_string(),
            ));
        }
        Ok(format!(
            "{}/v4/sessions/{}/players/{}",
            self.base_url, self.session_id, guild
        ))
    }

    /// PATCH the guild's player with a partial player update
    async fn update_player(&self, guild: GuildId, body: Value) -> Result<()> {
        let url = self.player_url(guild)?;
        debug!(guild = %guild, body = %body, "Updating Lavalink player");

        let response = self
            .http_client
            .patch(&url)
            .query(&[("noReplace", "false")])
            .header("Authorization", &self.password)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        check_status(response).await
    }
}

/// Map a non-2xx response into a backend error
pub(crate) async fn check_status(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(Error::Backend(format!("{} {}", status.as_u16(), error_text)))
}

/// Player update body that starts `track`
fn play_body(track: &Track) -> Value {
    match track.encoded.as_deref() {
        Some(encoded) => json!({ "track": { "encoded": encoded } }),
        None => json!({ "track": { "identifier": track.uri } }),
    }
}

fn control_body(message: &ControlMessage) -> Value {
    match message {
        ControlMessage::Equalizer(bands) => json!({ "filters": { "equalizer": bands } }),
    }
}

#[async_trait]
impl AudioBackend for LavalinkClient {
    async fn connect(&self, guild: GuildId, voice: &VoiceConnection) -> Result<()> {
        self.update_player(
            guild,
            json!({
                "voice": {
                    "token": voice.token,
                    "endpoint": voice.endpoint,
                    "sessionId": voice.session_id,
                }
            }),
        )
        .await
    }

    async fn play(&self, guild: GuildId, track: &Track) -> Result<()> {
        self.update_player(guild, play_body(track)).await
    }

    async fn stop(&self, guild: GuildId) -> Result<()> {
        self.update_player(guild, json!({ "track": { "encoded": null } }))
            .await
    }

    async fn set_pause(&self, guild: GuildId, paused: bool) -> Result<()> {
        self.update_player(guild, json!({ "paused": paused })).await
    }

    async fn set_volume(&self, guild: GuildId, volume: u16) -> Result<()> {
        let volume = volume.min(super::MAX_BACKEND_VOLUME);
        self.update_player(guild, json!({ "volume": volume })).await
    }

    async fn send_control(&self, guild: GuildId, message: ControlMessage) -> Result<()> {
        self.update_player(guild, control_body(&message)).await
    }

    async fn disconnect(&self, guild: GuildId) -> Result<()> {
        let url = self.player_url(guild)?;
        debug!(guild = %guild, "Destroying Lavalink player");

        let response = self
            .http_client
            .delete(&url)
            .header("Authorization", &self.password)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        check_status(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(session_id: &str) -> BackendSection {
        BackendSection {
            url: "http://lava:2333/".to_string(),
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_player_url() {
        let client = LavalinkClient::new(&section("abc")).unwrap();
        assert_eq!(
            client.player_url(GuildId(42)).unwrap(),
            "http://lava:2333/v4/sessions/abc/players/42"
        );
    }

    #[test]
    fn test_player_url_requires_session() {
        let client = LavalinkClient::new(&section("")).unwrap();
        assert!(matches!(
            client.player_url(GuildId(42)),
            Err(Error::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_play_body_prefers_encoded_handle() {
        let mut track = Track::new("Song", "https://youtu.be/dQw4w9WgXcQ", 212);
        assert_eq!(
            play_body(&track),
            json!({ "track": { "identifier": "https://youtu.be/dQw4w9WgXcQ" } })
        );

        track.encoded = Some("QAAA".to_string());
        assert_eq!(play_body(&track), json!({ "track": { "encoded": "QAAA" } }));
    }

    #[test]
    fn test_equalizer_body() {
        let body = control_body(&ControlMessage::bass_boost());
        let bands = body["filters"]["equalizer"].as_array().unwrap();
        assert_eq!(bands.len(), 15);
        assert_eq!(bands[0]["band"], 0);
    }
}
