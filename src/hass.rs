//! Home Assistant REST bridge.
//!
//! Entity state reads, light service calls and a polling task that turns
//! media player changes into [`HostEvent`]s.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants::{CONNECT_TIMEOUT_MS, DEVICE_TIMEOUT_MS, USER_AGENT};
use crate::deutils::deserialize_opt_f64_from_anything;
use crate::media::{MediaSnapshot, SnapshotContext};

#[derive(Debug, Error)]
pub enum HassError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Home Assistant returned HTTP {0}")]
    Status(u16),
    #[error("Invalid header value: {0}")]
    Header(#[from] header::InvalidHeaderValue),
}

/// One entity as returned by `GET /api/states/<entity_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl EntityState {
    pub fn new(entity_id: &str, state: &str) -> Self {
        EntityState {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            ..Default::default()
        }
    }

    /// Builder used by tests and the poller alike.
    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn media_attributes(&self) -> MediaAttributes {
        serde_json::from_value(Value::Object(self.attributes.clone())).unwrap_or_default()
    }
}

/// The media player attributes we care about.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct MediaAttributes {
    #[serde(default)]
    pub media_title: Option<String>,
    #[serde(default)]
    pub media_artist: Option<String>,
    #[serde(default)]
    pub media_album_name: Option<String>,
    #[serde(default)]
    pub media_content_type: Option<String>,
    #[serde(default)]
    pub media_content_id: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub entity_picture: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_f64_from_anything")]
    pub media_duration: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_opt_f64_from_anything")]
    pub media_position: Option<f64>,
    #[serde(default)]
    pub media_position_updated_at: Option<String>,
}

/// Anything that can hand back the current state of an entity.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// `None` when the entity does not exist or the host is unreachable.
    async fn entity_state(&self, entity_id: &str) -> Option<EntityState>;
}

#[derive(Debug, Clone)]
pub struct HomeAssistant {
    base_url: String,
    client: Client,
}

impl HomeAssistant {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, HassError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Content-Type", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        if let Some(t) = token {
            let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", t))?;
            auth.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .default_headers(headers)
            .timeout(Duration::from_millis(DEVICE_TIMEOUT_MS))
            .build()?;

        Ok(HomeAssistant { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_state(&self, entity_id: &str) -> Result<Option<EntityState>, HassError> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if !s.is_success() => Err(HassError::Status(s.as_u16())),
            _ => Ok(Some(response.json::<EntityState>().await?)),
        }
    }

    /// `light.turn_on` with optional colour and brightness, or `light.turn_off`.
    pub async fn call_light(
        &self,
        turn_on: bool,
        entity_id: &str,
        rgb: Option<[u8; 3]>,
        brightness_pct: Option<u8>,
    ) -> Result<(), HassError> {
        let service = if turn_on { "turn_on" } else { "turn_off" };
        let mut body = json!({ "entity_id": entity_id });
        if turn_on {
            if let Some(c) = rgb {
                body["rgb_color"] = json!(c);
            }
            if let Some(b) = brightness_pct {
                body["brightness_pct"] = json!(b);
            }
        }
        let url = format!("{}/api/services/light/{}", self.base_url, service);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(HassError::Status(response.status().as_u16()));
        }
        debug!("light.{} {} -> {}", service, entity_id, response.status());
        Ok(())
    }
}

#[async_trait]
impl MediaSource for HomeAssistant {
    async fn entity_state(&self, entity_id: &str) -> Option<EntityState> {
        match self.get_state(entity_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to read {}: {}", entity_id, e);
                None
            }
        }
    }
}

/// Inbound notifications for the configured media player.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Playback state or track changed. `old` is None for the initial event.
    StateChange { old: Option<String>, new: EntityState },
    /// Periodic playback position update while playing.
    Tick { position_ms: u64 },
}

/// Identity of what is showing; a change here is treated like a state change.
/// The picture's query string is dropped since its access token rotates.
fn track_key(state: &EntityState) -> String {
    let a = state.media_attributes();
    let picture = a.entity_picture.as_deref().unwrap_or_default();
    format!(
        "{}|{}|{}|{}|{}",
        a.media_title.unwrap_or_default(),
        a.media_artist.unwrap_or_default(),
        a.media_album_name.unwrap_or_default(),
        picture.split('?').next().unwrap_or_default(),
        a.app_name.unwrap_or_default(),
    )
}

/// Background polling task feeding [`HostEvent`]s to the service loop.
pub struct StatePoller {
    stop_sender: Option<mpsc::Sender<()>>,
    poll_handle: Option<JoinHandle<()>>,
}

impl StatePoller {
    /// Spawns the poller. The first successful read is always emitted as a
    /// `StateChange` with no previous state.
    pub fn start(
        source: Arc<dyn MediaSource>,
        entity_id: String,
        interval: Duration,
        events: mpsc::Sender<HostEvent>,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        info!("Polling {} every {}ms", entity_id, interval.as_millis());

        let poll_handle = tokio::spawn(async move {
            let mut last: Option<(String, String)> = None;
            loop {
                if let Some(current) = source.entity_state(&entity_id).await {
                    let key = track_key(&current);
                    let event = match &last {
                        None => Some(HostEvent::StateChange { old: None, new: current.clone() }),
                        Some((state, track)) if *state != current.state || *track != key => {
                            Some(HostEvent::StateChange { old: Some(state.clone()), new: current.clone() })
                        }
                        _ if current.state == "playing" && current.media_attributes().media_position.is_some() => {
                            let snap = MediaSnapshot::from_state(Some(&current), None, SnapshotContext::default(), Utc::now());
                            Some(HostEvent::Tick { position_ms: snap.position_ms })
                        }
                        _ => None,
                    };
                    last = Some((current.state.clone(), key));
                    if let Some(ev) = event {
                        if events.send(ev).await.is_err() {
                            debug!("Event receiver dropped, poller exiting.");
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = rx.recv() => {
                        debug!("State poller received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        StatePoller { stop_sender: Some(tx), poll_handle: Some(poll_handle) }
    }

    pub async fn stop(mut self) {
        if let Some(sender) = self.stop_sender.take() {
            let _ = sender.send(()).await;
        }
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for StatePoller {
    fn drop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            if let Err(e) = sender.try_send(()) {
                error!("Failed to send stop signal to state poller: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        states: Mutex<Vec<EntityState>>,
    }

    #[async_trait]
    impl MediaSource for Scripted {
        async fn entity_state(&self, _entity_id: &str) -> Option<EntityState> {
            let mut s = self.states.lock().unwrap();
            if s.len() > 1 { Some(s.remove(0)) } else { s.first().cloned() }
        }
    }

    fn playing(title: &str, pos: f64) -> EntityState {
        EntityState::new("media_player.x", "playing")
            .with_attr("media_title", json!(title))
            .with_attr("media_position", json!(pos))
    }

    #[test]
    fn test_media_attributes_lenient() {
        let s = EntityState::new("media_player.x", "playing")
            .with_attr("media_title", json!("Song"))
            .with_attr("media_position", json!("12.5"))
            .with_attr("media_duration", json!("n/a"));
        let a = s.media_attributes();
        assert_eq!(a.media_title.as_deref(), Some("Song"));
        assert_eq!(a.media_position, Some(12.5));
        assert_eq!(a.media_duration, None);
    }

    #[test]
    fn test_track_key_ignores_picture_token() {
        let a = playing("Song", 1.0).with_attr("entity_picture", json!("/api/media_player_proxy/x?token=aaa&cache=1"));
        let b = playing("Song", 9.0).with_attr("entity_picture", json!("/api/media_player_proxy/x?token=bbb&cache=1"));
        let c = playing("Song", 9.0).with_attr("entity_picture", json!("/api/media_player_proxy/y?token=bbb"));
        assert_eq!(track_key(&a), track_key(&b));
        assert_ne!(track_key(&b), track_key(&c));
    }

    #[test]
    fn test_entity_state_parses_rest_payload() {
        let raw = r#"{"entity_id":"sensor.t","state":"21.4","attributes":{"unit_of_measurement":"°C"},"last_updated":"2024-01-01T00:00:00+00:00"}"#;
        let s: EntityState = serde_json::from_str(raw).unwrap();
        assert_eq!(s.state, "21.4");
        assert_eq!(s.attr_str("unit_of_measurement"), Some("°C"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_emits_initial_change_and_ticks() {
        let source = Arc::new(Scripted {
            states: Mutex::new(vec![
                playing("A", 1.0),
                playing("A", 2.0),
                playing("B", 0.0),
                EntityState::new("media_player.x", "paused").with_attr("media_title", json!("B")),
            ]),
        });
        let (tx, mut rx) = mpsc::channel(16);
        let poller = StatePoller::start(source, "media_player.x".into(), Duration::from_millis(100), tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, HostEvent::StateChange { old: None, .. }));
        assert_eq!(rx.recv().await.unwrap(), HostEvent::Tick { position_ms: 2000 });
        match rx.recv().await.unwrap() {
            HostEvent::StateChange { old, new } => {
                assert_eq!(old.as_deref(), Some("playing"));
                assert_eq!(new.attr_str("media_title"), Some("B"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match rx.recv().await.unwrap() {
            HostEvent::StateChange { new, .. } => assert_eq!(new.state, "paused"),
            other => panic!("unexpected {:?}", other),
        }
        poller.stop().await;
    }
}
