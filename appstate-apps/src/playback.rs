//! Twitch playback poller.
//!
//! Every tick the app refreshes three facts about the device and publishes
//! them as entities: whether the Twitch app holds window focus, the raw
//! media-session playback state, and (while focused and playing) the channel
//! currently on screen. Each fact also fires a change event the first tick
//! it differs from the previous poll.

use std::path::PathBuf;
use std::time::Duration;

use appstate_adb::{AdbKey, ConnectTimeouts, DeviceConnection};
use appstate_config::AppSpec;
use appstate_entities::StateValue;
use appstate_kernel::{App, AppContext, AppError, AppFactory, AppResult, Schedule};
use appstate_primitives::{AppId, EntityId, PlaybackState};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{append_extension, expand_tilde, parse};

const DEFAULT_ENTITY_PREFIX: &str = "firetv_twitch";
const DEFAULT_POLL_SECS: u64 = 5;
const DEFAULT_SESSION_HEADER: &str = "TwitchMediaSession";
const UI_DUMP_PATH: &str = "/sdcard/window_dump.xml";

const TIMEOUTS: ConnectTimeouts =
    ConnectTimeouts::new(Duration::from_secs(10), Duration::from_secs(10));

/// Polls a Fire TV over ADB and publishes Twitch app state.
pub struct TwitchPlaybackApp {
    host: String,
    port: u16,
    private_key_path: PathBuf,
    public_key_path: PathBuf,
    prefix: String,
    poll: Duration,
    session_header: String,

    key: Option<AdbKey>,
    device: Option<DeviceConnection>,

    last_playback: Option<u32>,
    last_focus: Option<bool>,
    last_channel: Option<String>,

    focused_entity: EntityId,
    playback_entity: EntityId,
    playing_entity: EntityId,
    channel_entity: EntityId,
}

impl std::fmt::Debug for TwitchPlaybackApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchPlaybackApp")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("prefix", &self.prefix)
            .field("poll", &self.poll)
            .field("connected", &self.device.is_some())
            .finish()
    }
}

impl TwitchPlaybackApp {
    /// Builds the app from its configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when `adbkey` is missing, `poll_secs` is
    /// zero or unparseable, or `entity_prefix` cannot name entities.
    pub fn from_spec(app_id: &AppId, spec: &AppSpec) -> AppResult<Self> {
        let config_err = |err: &dyn std::fmt::Display| AppError::config(err.to_string());

        let private_key_path = expand_tilde(
            spec.option_path("adbkey")
                .ok_or_else(|| AppError::config("`adbkey` is required"))?,
        );
        let public_key_path = spec
            .option_path("adbkey_pub")
            .map(expand_tilde)
            .unwrap_or_else(|| append_extension(&private_key_path, "pub"));

        let prefix = spec
            .option_str("entity_prefix")
            .unwrap_or_else(|| DEFAULT_ENTITY_PREFIX.to_owned());

        // `poll_secs` is canonical; `poll_interval` is the legacy spelling.
        let poll_secs = match spec.option_u64(app_id, "poll_secs").map_err(|e| config_err(&e))? {
            Some(value) => value,
            None => spec
                .option_u64(app_id, "poll_interval")
                .map_err(|e| config_err(&e))?
                .unwrap_or(DEFAULT_POLL_SECS),
        };
        if poll_secs == 0 {
            return Err(AppError::config("`poll_secs` must be positive"));
        }

        let session_header = spec
            .option_str("session_header")
            .unwrap_or_else(|| DEFAULT_SESSION_HEADER.to_owned());

        let focused_entity =
            EntityId::binary_sensor(format!("{prefix}_is_focused")).map_err(|e| config_err(&e))?;
        let playback_entity =
            EntityId::sensor(format!("{prefix}_playback_state")).map_err(|e| config_err(&e))?;
        let playing_entity =
            EntityId::binary_sensor(format!("{prefix}_playing")).map_err(|e| config_err(&e))?;
        let channel_entity =
            EntityId::sensor(format!("{prefix}_playback_channel")).map_err(|e| config_err(&e))?;

        Ok(Self {
            host: spec.host().to_owned(),
            port: spec.port(),
            private_key_path,
            public_key_path,
            prefix,
            poll: Duration::from_secs(poll_secs),
            session_header,
            key: None,
            device: None,
            last_playback: None,
            last_focus: None,
            last_channel: None,
            focused_entity,
            playback_entity,
            playing_entity,
            channel_entity,
        })
    }

    /// Returns the configured poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll
    }

    async fn ensure_connected(&mut self) -> AppResult<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let key = match &self.key {
            Some(key) => key.clone(),
            None => {
                if !self.private_key_path.exists() {
                    return Err(AppError::config(format!(
                        "adb private key missing: {}",
                        self.private_key_path.display()
                    )));
                }
                if !self.public_key_path.exists() {
                    return Err(AppError::config(format!(
                        "adb public key missing: {}",
                        self.public_key_path.display()
                    )));
                }
                let key = AdbKey::load(&self.private_key_path)
                    .map_err(|err| AppError::config(err.to_string()))?;
                self.key = Some(key.clone());
                key
            }
        };

        match DeviceConnection::connect(&self.host, self.port, &key, TIMEOUTS).await {
            Ok(device) => {
                info!(host = %self.host, port = self.port, "adb connected");
                self.device = Some(device);
                Ok(())
            }
            Err(err) => Err(AppError::device(format!("adb connect error: {err}"))),
        }
    }

    /// Runs a shell command; on failure the connection is dropped so the next
    /// tick reconnects, and the tick continues with missing data.
    async fn shell_or_reset(&mut self, command: &str) -> Option<String> {
        let device = self.device.as_mut()?;
        match device.shell(command).await {
            Ok(output) => Some(output),
            Err(err) => {
                warn!(command, error = %err, "adb shell failed, dropping connection");
                if let Some(device) = self.device.take() {
                    device.close().await;
                }
                None
            }
        }
    }

    async fn publish_focus(&mut self, ctx: &AppContext, focused: Option<bool>) {
        let attributes = attribute_map(json!({
            "friendly_name": format!("{} is focused", self.prefix),
            "device_class": "running",
            "updated": Utc::now().to_rfc3339(),
            "source": "dumpsys window",
        }));
        ctx.bus()
            .set_state(
                self.focused_entity.clone(),
                StateValue::OnOff(focused.unwrap_or(false)),
                attributes,
            )
            .await;

        if focused != self.last_focus {
            self.last_focus = focused;
            ctx.bus().fire_event(
                "twitch_is_focused_changed",
                json!({ "host": self.host, "state": focused }),
            );
        }
    }

    async fn publish_playback(&mut self, ctx: &AppContext, state: Option<u32>) {
        let updated = Utc::now().to_rfc3339();

        let attributes = attribute_map(json!({
            "friendly_name": format!("{} playback state", self.prefix),
            "updated": updated,
            "meanings": {
                "1": "stopped/idle/menu",
                "3": "playing",
                "6": "transition/unknown (observed)",
            },
        }));
        let value = state.map_or(StateValue::Unknown, |raw| {
            StateValue::Integer(i64::from(raw))
        });
        ctx.bus()
            .set_state(self.playback_entity.clone(), value, attributes)
            .await;

        let playing = state
            .map(PlaybackState::from_raw)
            .is_some_and(PlaybackState::is_playing);
        let attributes = attribute_map(json!({
            "friendly_name": format!("{} playing", self.prefix),
            "device_class": "running",
            "updated": updated,
            "source": "dumpsys media_session",
        }));
        ctx.bus()
            .set_state(
                self.playing_entity.clone(),
                StateValue::OnOff(playing),
                attributes,
            )
            .await;

        if state != self.last_playback {
            self.last_playback = state;
            ctx.bus().fire_event(
                "twitch_playback_state_changed",
                json!({ "host": self.host, "state": state, "playing": playing }),
            );
        }
    }

    /// Fetches the on-screen channel, but only while the bus reports the app
    /// focused and playing; the UI dump is expensive.
    async fn current_channel(&mut self, ctx: &AppContext) -> Option<String> {
        let focused = ctx.bus().is_on(&self.focused_entity).await;
        let playing = ctx.bus().is_on(&self.playing_entity).await;
        if !(focused && playing) {
            return None;
        }

        let dump = self
            .shell_or_reset(&format!("uiautomator dump --compressed {UI_DUMP_PATH} 2>&1"))
            .await?;
        if dump.is_empty() {
            warn!("uiautomator dump produced no output");
            return None;
        }

        let xml = self.shell_or_reset(&format!("cat {UI_DUMP_PATH}")).await?;
        if !xml.contains("<hierarchy") {
            warn!(
                preview = %xml.chars().take(120).collect::<String>(),
                "failed to read ui dump"
            );
            return None;
        }

        parse::active_channel(&xml)
    }

    async fn publish_channel(&mut self, ctx: &AppContext, channel: Option<String>) {
        let attributes = attribute_map(json!({
            "friendly_name": format!("{} playback channel", self.prefix),
            "updated": Utc::now().to_rfc3339(),
        }));
        let value = channel
            .clone()
            .map_or(StateValue::Unknown, StateValue::Text);
        ctx.bus()
            .set_state(self.channel_entity.clone(), value, attributes)
            .await;

        if channel != self.last_channel {
            self.last_channel = channel.clone();
            ctx.bus().fire_event(
                "twitch_playback_active_channel_changed",
                json!({ "host": self.host, "state": channel }),
            );
        }
    }
}

fn attribute_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl App for TwitchPlaybackApp {
    fn schedule(&self) -> Schedule {
        Schedule::Every(self.poll)
    }

    async fn tick(&mut self, ctx: &AppContext) -> AppResult<()> {
        self.ensure_connected().await?;

        let output = self.shell_or_reset("dumpsys window").await;
        let focused = output
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(parse::app_in_focus);
        self.publish_focus(ctx, focused).await;

        let output = self.shell_or_reset("dumpsys media_session").await;
        let state = output
            .as_deref()
            .and_then(|text| parse::playback_state(text, &self.session_header));
        self.publish_playback(ctx, state).await;

        let channel = self.current_channel(ctx).await;
        self.publish_channel(ctx, channel).await;

        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(device) = self.device.take() {
            device.close().await;
        }
    }
}

/// Factory for the `TwitchPlayback` class.
#[derive(Debug)]
pub struct TwitchPlaybackFactory;

impl AppFactory for TwitchPlaybackFactory {
    fn module(&self) -> &str {
        crate::MODULE
    }

    fn class(&self) -> &str {
        "TwitchPlayback"
    }

    fn build(&self, app_id: &AppId, spec: &AppSpec) -> AppResult<Box<dyn App>> {
        Ok(Box::new(TwitchPlaybackApp::from_spec(app_id, spec)?))
    }
}
