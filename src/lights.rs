/*
 *  lights.rs
 *
 *  PixooArt - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

//! Ambient lighting that follows the artwork.
//!
//! Home Assistant lights take the image's average colour; WLED strips take
//! the first palette colour. Both are best effort.

use async_trait::async_trait;
use chrono::{Local, Timelike};
use log::{debug, error};
use reqwest::{Client, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::config::WledSettings;
use crate::constants::{
    CONNECT_TIMEOUT_MS, DEVICE_TIMEOUT_MS, LIGHT_DEFAULT_PCT, LIGHT_MAX_PCT, LIGHT_MIN_PCT, USER_AGENT,
};
use crate::hass::HomeAssistant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightCommand {
    Off,
    On {
        /// average colour, for room lights
        ambient: Option<[u8; 3]>,
        /// dominant colour, for strips
        accent: Option<[u8; 3]>,
        brightness_pct: Option<u8>,
    },
}

/// Image brightness (0-255) as a light percentage, clamped to 10-100.
pub fn brightness_pct(brightness: f32) -> u8 {
    let pct = (brightness / 255.0 * 100.0) as i32;
    pct.clamp(LIGHT_MIN_PCT as i32, LIGHT_MAX_PCT as i32) as u8
}

/// Percentage back onto WLED's 0-255 scale.
pub fn wled_brightness(pct: u8) -> u8 {
    (pct as f32 / 100.0 * 255.0) as u8
}

pub fn is_night(hour: u32) -> bool {
    hour >= 18 || hour < 6
}

#[async_trait]
pub trait AmbientLights: Send + Sync {
    fn name(&self) -> &str;
    async fn apply(&self, command: &LightCommand);
}

/// Home Assistant light entities.
pub struct HassLights {
    hass: HomeAssistant,
    entities: Vec<String>,
}

impl HassLights {
    pub fn new(hass: HomeAssistant, entities: Vec<String>) -> Self {
        HassLights { hass, entities }
    }
}

#[async_trait]
impl AmbientLights for HassLights {
    fn name(&self) -> &str {
        "hass"
    }

    async fn apply(&self, command: &LightCommand) {
        for entity in &self.entities {
            let result = match *command {
                LightCommand::Off => self.hass.call_light(false, entity, None, None).await,
                LightCommand::On { ambient, brightness_pct, .. } => {
                    let pct = match ambient {
                        Some(_) => brightness_pct.unwrap_or(LIGHT_DEFAULT_PCT),
                        None => LIGHT_DEFAULT_PCT,
                    };
                    self.hass.call_light(true, entity, ambient, Some(pct)).await
                }
            };
            if let Err(e) = result {
                error!("Error calling light service for {}: {}", entity, e);
            }
        }
    }
}

/// WLED strips over their JSON state API.
pub struct WledStrips {
    urls: Vec<String>,
    settings: WledSettings,
    client: Client,
}

impl WledStrips {
    pub fn new(settings: WledSettings) -> Option<Self> {
        let urls = settings.ips.iter().map(|ip| format!("http://{}/json/state", ip)).collect();
        Self::with_urls(urls, settings)
    }

    /// Explicit state URLs, for tests against a mock server.
    pub fn with_urls(urls: Vec<String>, settings: WledSettings) -> Option<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Content-Type", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .default_headers(headers)
            .timeout(Duration::from_millis(DEVICE_TIMEOUT_MS))
            .build();
        match client {
            Ok(client) => Some(WledStrips { urls, settings, client }),
            Err(e) => {
                error!("Failed to build WLED client: {}", e);
                None
            }
        }
    }

    /// Request body for one command.
    pub fn payload(&self, command: &LightCommand) -> Value {
        match *command {
            LightCommand::Off => json!({ "on": false }),
            LightCommand::On { accent, brightness_pct, .. } => {
                let s = &self.settings;
                let bri = brightness_pct.map(wled_brightness).unwrap_or(s.brightness);
                let mut seg = json!({ "id": 0 });
                match accent {
                    Some(c) => {
                        seg["col"] = json!([c]);
                        seg["fx"] = json!(0);
                        seg["pal"] = json!(0);
                    }
                    None => {
                        seg["fx"] = json!(s.effect_id);
                        seg["pal"] = json!(s.palette);
                    }
                }
                seg["sx"] = json!(s.speed);
                seg["ix"] = json!(s.intensity);
                json!({ "on": true, "bri": bri, "seg": [seg] })
            }
        }
    }
}

#[async_trait]
impl AmbientLights for WledStrips {
    fn name(&self) -> &str {
        "wled"
    }

    async fn apply(&self, command: &LightCommand) {
        if matches!(command, LightCommand::On { .. })
            && self.settings.only_at_night
            && !is_night(Local::now().hour())
        {
            debug!("WLED limited to night time, leaving strips alone");
            return;
        }
        let body = self.payload(command);
        for url in &self.urls {
            debug!("Controlling WLED at {}: {}", url, body);
            match self.client.post(url).json(&body).send().await {
                Ok(r) if r.status().is_success() => {}
                Ok(r) => error!("WLED at {} returned {}", url, r.status()),
                Err(e) => error!("Error controlling WLED light at {}: {}", url, e),
            }
        }
    }
}

/// The configured light sinks, driven together.
#[derive(Clone, Default)]
pub struct PeripheralTargets {
    lights: Vec<Arc<dyn AmbientLights>>,
}

impl PeripheralTargets {
    pub fn new(lights: Vec<Arc<dyn AmbientLights>>) -> Self {
        PeripheralTargets { lights }
    }

    pub fn from_settings(hass: Option<HomeAssistant>, entities: &[String], wled: &WledSettings) -> Self {
        let mut lights: Vec<Arc<dyn AmbientLights>> = Vec::new();
        if let Some(hass) = hass.filter(|_| !entities.is_empty()) {
            lights.push(Arc::new(HassLights::new(hass, entities.to_vec())));
        }
        if !wled.ips.is_empty() {
            if let Some(strips) = WledStrips::new(wled.clone()) {
                lights.push(Arc::new(strips));
            }
        }
        PeripheralTargets { lights }
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub async fn apply(&self, command: LightCommand) {
        for light in &self.lights {
            debug!("lights[{}] <- {:?}", light.name(), command);
            light.apply(&command).await;
        }
    }

    pub async fn off(&self) {
        self.apply(LightCommand::Off).await;
    }
}
