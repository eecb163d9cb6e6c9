//! Service payload builders for the `media_player` and `remote` domains
//!
//! These are thin data shapes over the generic `call_service` envelope; no
//! protocol logic lives here.

use serde_json::json;

use crate::client::HassClient;
use crate::protocol::Command;

/// Set a media player's volume; `level` is 0.0 to 1.0
pub fn volume_set(entity_id: &str, level: f64) -> Command {
    Command::call_service(
        "media_player",
        "volume_set",
        json!({ "entity_id": entity_id, "volume_level": level }),
    )
}

/// Mute or unmute a media player
pub fn volume_mute(entity_id: &str, muted: bool) -> Command {
    Command::call_service(
        "media_player",
        "volume_mute",
        json!({ "entity_id": entity_id, "is_volume_muted": muted }),
    )
}

/// Switch a media player to one of its `source_list` entries
pub fn select_source(entity_id: &str, source: &str) -> Command {
    Command::call_service(
        "media_player",
        "select_source",
        json!({ "entity_id": entity_id, "source": source }),
    )
}

/// Select a sound mode (supported by Denon and Songpal receivers)
pub fn select_sound_mode(entity_id: &str, sound_mode: &str) -> Command {
    Command::call_service(
        "media_player",
        "select_sound_mode",
        json!({ "entity_id": entity_id, "sound_mode": sound_mode }),
    )
}

/// Press a button on a `remote` entity
pub fn send_button(entity_id: &str, button: RemoteButton) -> Command {
    Command::call_service(
        "remote",
        "send_command",
        json!({ "entity_id": entity_id, "command": button.as_str() }),
    )
}

/// Buttons understood by the `remote.send_command` service (the Roku set)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteButton {
    Back,
    Backspace,
    ChannelDown,
    ChannelUp,
    Down,
    Enter,
    FindRemote,
    Forward,
    Home,
    Info,
    InputAv1,
    InputHdmi1,
    InputHdmi2,
    InputHdmi3,
    InputHdmi4,
    InputTuner,
    Left,
    Literal,
    Play,
    Power,
    Replay,
    Reverse,
    Right,
    Search,
    Select,
    Up,
    VolumeDown,
    VolumeMute,
    VolumeUp,
}

impl RemoteButton {
    /// Wire name of the button
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteButton::Back => "back",
            RemoteButton::Backspace => "backspace",
            RemoteButton::ChannelDown => "channel_down",
            RemoteButton::ChannelUp => "channel_up",
            RemoteButton::Down => "down",
            RemoteButton::Enter => "enter",
            RemoteButton::FindRemote => "find_remote",
            RemoteButton::Forward => "forward",
            RemoteButton::Home => "home",
            RemoteButton::Info => "info",
            RemoteButton::InputAv1 => "input_av1",
            RemoteButton::InputHdmi1 => "input_hdmi1",
            RemoteButton::InputHdmi2 => "input_hdmi2",
            RemoteButton::InputHdmi3 => "input_hdmi3",
            RemoteButton::InputHdmi4 => "input_hdmi4",
            RemoteButton::InputTuner => "input_tuner",
            RemoteButton::Left => "left",
            RemoteButton::Literal => "literal",
            RemoteButton::Play => "play",
            RemoteButton::Power => "power",
            RemoteButton::Replay => "replay",
            RemoteButton::Reverse => "reverse",
            RemoteButton::Right => "right",
            RemoteButton::Search => "search",
            RemoteButton::Select => "select",
            RemoteButton::Up => "up",
            RemoteButton::VolumeDown => "volume_down",
            RemoteButton::VolumeMute => "volume_mute",
            RemoteButton::VolumeUp => "volume_up",
        }
    }
}

/// Fire-and-forget control of one `media_player` entity
///
/// ```no_run
/// # use hass_ws::{Config, HassClient};
/// # #[tokio::main]
/// # async fn main() {
/// # let client = HassClient::connect(Config::new("host", 8123, "token"));
/// let roku = client.media_player("media_player.roku");
/// roku.set_volume(0.4).await;
/// roku.set_mute(false).await;
/// # }
/// ```
#[derive(Clone)]
pub struct MediaPlayer {
    client: HassClient,
    entity_id: String,
}

impl MediaPlayer {
    pub(crate) fn new(client: HassClient, entity_id: String) -> Self {
        Self { client, entity_id }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub async fn set_volume(&self, level: f64) {
        self.client
            .send_command(volume_set(&self.entity_id, level), None)
            .await;
    }

    pub async fn set_mute(&self, muted: bool) {
        self.client
            .send_command(volume_mute(&self.entity_id, muted), None)
            .await;
    }

    pub async fn select_source(&self, source: &str) {
        self.client
            .send_command(select_source(&self.entity_id, source), None)
            .await;
    }

    pub async fn select_sound_mode(&self, sound_mode: &str) {
        self.client
            .send_command(select_sound_mode(&self.entity_id, sound_mode), None)
            .await;
    }
}

/// Fire-and-forget button presses on one `remote` entity
#[derive(Clone)]
pub struct Remote {
    client: HassClient,
    entity_id: String,
}

impl Remote {
    pub(crate) fn new(client: HassClient, entity_id: String) -> Self {
        Self { client, entity_id }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub async fn press(&self, button: RemoteButton) {
        self.client
            .send_command(send_button(&self.entity_id, button), None)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn encoded(cmd: Command) -> Value {
        serde_json::from_str(&cmd.encode().unwrap()).unwrap()
    }

    #[test]
    fn volume_set_payload() {
        let v = encoded(volume_set("media_player.roku", 0.35));
        assert_eq!(v["type"], "call_service");
        assert_eq!(v["domain"], "media_player");
        assert_eq!(v["service"], "volume_set");
        assert_eq!(v["service_data"]["entity_id"], "media_player.roku");
        assert_eq!(v["service_data"]["volume_level"], 0.35);
    }

    #[test]
    fn volume_mute_payload() {
        let v = encoded(volume_mute("media_player.avr", true));
        assert_eq!(v["service"], "volume_mute");
        assert_eq!(v["service_data"]["is_volume_muted"], true);
    }

    #[test]
    fn select_source_payload() {
        let v = encoded(select_source("media_player.roku", "Netflix"));
        assert_eq!(v["service"], "select_source");
        assert_eq!(v["service_data"]["source"], "Netflix");
    }

    #[test]
    fn select_sound_mode_payload() {
        let v = encoded(select_sound_mode("media_player.avr", "stereo"));
        assert_eq!(v["service"], "select_sound_mode");
        assert_eq!(v["service_data"]["sound_mode"], "stereo");
    }

    #[test]
    fn remote_button_payload() {
        let v = encoded(send_button("remote.roku", RemoteButton::ChannelUp));
        assert_eq!(v["domain"], "remote");
        assert_eq!(v["service"], "send_command");
        assert_eq!(v["service_data"]["command"], "channel_up");
    }

    #[test]
    fn button_wire_names() {
        assert_eq!(RemoteButton::FindRemote.as_str(), "find_remote");
        assert_eq!(RemoteButton::InputHdmi3.as_str(), "input_hdmi3");
        assert_eq!(RemoteButton::VolumeMute.as_str(), "volume_mute");
    }
}
