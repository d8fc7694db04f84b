//! Pixoo64 HTTP command client.
//!
//! Every command is a JSON object POSTed to `http://<ip>:80/post`. Failures
//! are logged and reported as `false`; nothing here retries.

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, header};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

use crate::config::ClockAlign;
use crate::constants::{
    CLOCK_X_LEFT, CLOCK_X_RIGHT, CONNECT_TIMEOUT_MS, DEFAULT_TEXT_COLOR, DEVICE_TIMEOUT_MS,
    INFO_TEXT_COLOR, INFO_TEXT_FONT, INFO_TEXT_SPEED, INFO_TEXT_WIDTH, INFO_TEXT_X, INFO_TEXT_Y,
    ITEMLIST_FONT, ITEMLIST_Y, PANEL_SIZE, USER_AGENT,
};
use crate::colortools::rgb_hex;

#[derive(Debug, Error)]
pub enum PixooError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device returned HTTP {0}")]
    Status(u16),
    #[error("device reported error_code {0}")]
    Device(i64),
}

/// Scrolling text element (`Draw/SendHttpText`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpText {
    #[serde(rename = "TextId")]
    pub text_id: u32,
    pub x: i32,
    pub y: i32,
    pub dir: u8,
    pub font: u16,
    #[serde(rename = "TextWidth")]
    pub width: u32,
    pub speed: u32,
    #[serde(rename = "TextString")]
    pub text: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<u8>,
}

impl HttpText {
    /// Grey status line across the bottom of the panel.
    pub fn info(text: &str) -> Self {
        HttpText {
            text_id: 1,
            x: INFO_TEXT_X,
            y: INFO_TEXT_Y,
            dir: 0,
            font: INFO_TEXT_FONT,
            width: INFO_TEXT_WIDTH,
            speed: INFO_TEXT_SPEED,
            text: text.to_string(),
            color: rgb_hex(INFO_TEXT_COLOR),
            align: None,
        }
    }
}

/// One firmware-drawn overlay element (`Draw/SendHttpItemList`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayItem {
    #[serde(rename = "TextId")]
    pub text_id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub x: i32,
    pub y: i32,
    pub font: u16,
    pub color: String,
    #[serde(rename = "TextString", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

pub const ITEM_CLOCK: u8 = 3;
pub const ITEM_DEVICE_TEMPERATURE: u8 = 17;
pub const ITEM_TEXT: u8 = 22;

/// Clock and/or temperature overlay.
///
/// Text ids count up from `base_id`. The temperature takes the clock's
/// usual slot when the clock is left aligned; without a sensor reading the
/// device's own weather temperature item is used.
pub fn build_item_list(
    base_id: u32,
    clock: bool,
    temperature: bool,
    clock_align: ClockAlign,
    temperature_text: Option<&str>,
    color: Option<&str>,
) -> Vec<DisplayItem> {
    let color = color.unwrap_or(DEFAULT_TEXT_COLOR).to_string();
    let mut items = Vec::new();
    let mut text_id = base_id;

    if clock {
        text_id += 1;
        items.push(DisplayItem {
            text_id: text_id.to_string(),
            kind: ITEM_CLOCK,
            x: if clock_align == ClockAlign::Right { CLOCK_X_RIGHT } else { CLOCK_X_LEFT },
            y: ITEMLIST_Y,
            font: ITEMLIST_FONT,
            color: color.clone(),
            text: None,
        });
    }
    if temperature {
        text_id += 1;
        let x = if clock_align == ClockAlign::Left && clock { CLOCK_X_RIGHT } else { CLOCK_X_LEFT };
        let (kind, text) = match temperature_text {
            Some(t) => (ITEM_TEXT, Some(t.to_string())),
            None => (ITEM_DEVICE_TEMPERATURE, None),
        };
        items.push(DisplayItem {
            text_id: text_id.to_string(),
            kind,
            x,
            y: ITEMLIST_Y,
            font: ITEMLIST_FONT,
            color,
            text,
        });
    }
    items
}

/// A JSON command sink. Only the two transport methods are required; the
/// command helpers build their payloads on top.
#[async_trait]
pub trait PixelDisplay: Send + Sync {
    /// Fire-and-forget; `false` on any failure.
    async fn send_command(&self, payload: Value) -> bool;

    /// `Ok(None)` when the device answered but without a usable index.
    async fn get_channel_index(&self) -> Result<Option<i64>, PixooError>;

    async fn set_channel_index(&self, index: i64) -> bool {
        if !(0..=4).contains(&index) {
            warn!("Channel index {} out of typical range, sending anyway", index);
        }
        self.send_command(json!({"Command": "Channel/SetIndex", "SelectIndex": index})).await
    }

    async fn set_brightness(&self, brightness: i32) -> bool {
        if !(0..=100).contains(&brightness) {
            warn!("Brightness value {} out of range (0-100). Clamping.", brightness);
        }
        let b = brightness.clamp(0, 100);
        self.send_command(json!({"Command": "Channel/SetBrightness", "Brightness": b})).await
    }

    /// Single frame base64 GIF.
    async fn display_gif(&self, gif_base64: &str) -> bool {
        debug!("Sending GIF data ({} bytes base64)", gif_base64.len());
        self.send_command(json!({
            "Command": "Device/PlayTFGif",
            "PicNum": 1,
            "PicWidth": PANEL_SIZE,
            "PicOffset": 0,
            "PicID": 1,
            "PicSpeed": 100,
            "PicData": gif_base64,
        }))
        .await
    }

    async fn send_text(&self, text: &HttpText) -> bool {
        let mut payload = serde_json::to_value(text).unwrap_or_else(|_| json!({}));
        payload["Command"] = json!("Draw/SendHttpText");
        self.send_command(payload).await
    }

    async fn send_item_list(&self, items: &[DisplayItem]) -> bool {
        self.send_command(json!({"Command": "Draw/SendHttpItemList", "ItemList": items})).await
    }

    async fn clear_text(&self) -> bool {
        self.send_command(json!({"Command": "Draw/ClearHttpText"})).await
    }

    /// Status line in the panel's info slot.
    async fn send_info(&self, text: &str) -> bool {
        self.send_text(&HttpText::info(text)).await
    }
}

#[derive(Debug, Clone)]
pub struct PixooDevice {
    endpoint: String,
    client: Client,
}

impl PixooDevice {
    pub fn new(ip: &str) -> Result<Self, PixooError> {
        Self::with_endpoint(&format!("http://{}:80/post", ip))
    }

    /// Full command URL; lets tests point the client at a mock server.
    pub fn with_endpoint(endpoint: &str) -> Result<Self, PixooError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Content-Type", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .default_headers(headers)
            .timeout(Duration::from_millis(DEVICE_TIMEOUT_MS))
            .build()?;

        Ok(PixooDevice { endpoint: endpoint.to_string(), client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, payload: &Value) -> Result<Value, PixooError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PixooError::Status(status.as_u16()));
        }
        // some firmware answers with an empty body
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        match body.get("error_code").and_then(Value::as_i64) {
            Some(code) if code != 0 => Err(PixooError::Device(code)),
            _ => Ok(body),
        }
    }
}

#[async_trait]
impl PixelDisplay for PixooDevice {
    async fn send_command(&self, payload: Value) -> bool {
        let command = payload.get("Command").and_then(Value::as_str).unwrap_or("?").to_string();
        match self.post(&payload).await {
            Ok(_) => {
                debug!("{} sent", command);
                true
            }
            Err(e) => {
                error!("Error sending {} to {}: {}", command, self.endpoint, e);
                false
            }
        }
    }

    async fn get_channel_index(&self) -> Result<Option<i64>, PixooError> {
        match self.post(&json!({"Command": "Channel/GetIndex"})).await {
            Ok(body) => Ok(body.get("SelectIndex").and_then(Value::as_i64)),
            Err(PixooError::Device(code)) => {
                error!("Error in response from Pixoo: {}", code);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ITEMLIST_ACTIVE_TEXT_ID, ITEMLIST_INACTIVE_TEXT_ID};

    #[test]
    fn test_info_text_payload() {
        let v = serde_json::to_value(HttpText::info("Searching...")).unwrap();
        assert_eq!(v["TextString"], "Searching...");
        assert_eq!(v["x"], 0);
        assert_eq!(v["y"], 56);
        assert_eq!(v["TextWidth"], 64);
        assert_eq!(v["color"], "#646464");
        assert!(v.get("align").is_none());
    }

    #[test]
    fn test_item_list_clock_right_with_sensor() {
        let items = build_item_list(ITEMLIST_ACTIVE_TEXT_ID, true, true, ClockAlign::Right, Some("21°C"), None);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text_id, "101");
        assert_eq!(items[0].kind, ITEM_CLOCK);
        assert_eq!(items[0].x, 34);
        assert_eq!(items[1].text_id, "102");
        assert_eq!(items[1].kind, ITEM_TEXT);
        assert_eq!(items[1].x, 2);
        assert_eq!(items[1].text.as_deref(), Some("21°C"));
        assert_eq!(items[1].color, "#FFFFFF");
    }

    #[test]
    fn test_item_list_left_clock_moves_temperature() {
        let items = build_item_list(ITEMLIST_INACTIVE_TEXT_ID, true, true, ClockAlign::Left, None, Some("#FF0000"));
        assert_eq!(items[0].text_id, "201");
        assert_eq!(items[0].x, 2);
        assert_eq!(items[1].x, 34);
        assert_eq!(items[1].kind, ITEM_DEVICE_TEMPERATURE);
        assert_eq!(items[1].color, "#FF0000");
        let v = serde_json::to_value(&items[1]).unwrap();
        assert!(v.get("TextString").is_none());
        assert_eq!(v["type"], 17);
    }

    #[test]
    fn test_item_list_empty() {
        assert!(build_item_list(ITEMLIST_ACTIVE_TEXT_ID, false, false, ClockAlign::Right, Some("1°"), None).is_empty());
    }
}
