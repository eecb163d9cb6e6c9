use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{HassError, Result};

/// Message types the server may send us
pub const TYPE_AUTH_REQUIRED: &str = "auth_required";
pub const TYPE_AUTH_OK: &str = "auth_ok";
pub const TYPE_AUTH_INVALID: &str = "auth_invalid";
pub const TYPE_RESULT: &str = "result";
pub const TYPE_EVENT: &str = "event";
pub const TYPE_PONG: &str = "pong";

/// Event type we subscribe to
pub const EVENT_STATE_CHANGED: &str = "state_changed";

/// Outbound command envelope
///
/// Every command carries a `type` discriminator plus kind-specific fields.
/// The `id` is assigned by the controller just before the command goes out;
/// the auth command is the one message sent without an id, before a session
/// exists.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(rename = "type")]
    pub kind: String,

    /// Kind-specific fields, serialized inline next to `type` and `id`
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Command {
    /// Create a command with the given `type` and no extra fields
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            data: Map::new(),
        }
    }

    /// Add a kind-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// The `auth` handshake command; never carries an id
    pub fn auth(access_token: impl Into<String>) -> Self {
        Self::new("auth").with_field("access_token", Value::String(access_token.into()))
    }

    /// Subscribe to `state_changed` events
    pub fn subscribe_events() -> Self {
        Self::new("subscribe_events")
            .with_field("event_type", Value::String(EVENT_STATE_CHANGED.into()))
    }

    /// Request a snapshot of every entity's current state
    pub fn get_states() -> Self {
        Self::new("get_states")
    }

    /// Liveness probe; the server answers with `pong`
    pub fn ping() -> Self {
        Self::new("ping")
    }

    /// Invoke a service in a domain, e.g. `media_player.volume_set`
    pub fn call_service(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: Value,
    ) -> Self {
        Self::new("call_service")
            .with_field("domain", Value::String(domain.into()))
            .with_field("service", Value::String(service.into()))
            .with_field("service_data", service_data)
    }

    /// Serialize to a single JSON text frame
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Error detail attached to a failed command response
#[derive(Debug, Clone, Deserialize)]
pub struct CommandError {
    /// Documented as an integer, but servers send a string in practice.
    /// We accept either and always expose a string; callers must not
    /// assume it parses as a number.
    #[serde(default, deserialize_with = "code_as_string")]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

fn code_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Code>::deserialize(deserializer)?.map(|code| match code {
        Code::Text(s) => s,
        Code::Int(n) => n.to_string(),
        Code::Float(f) => f.to_string(),
    }))
}

/// Response to a command we sent, matched back by `id`
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    pub id: u64,

    pub success: bool,

    /// Shape depends on the command that was sent: an array for
    /// `get_states`, an object or null for most others
    #[serde(default)]
    pub result: Option<Value>,

    /// Only present when `success` is false, and not always then
    #[serde(default)]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    /// Error code for logging, with a placeholder when the server sent none
    pub fn error_code(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .unwrap_or("<no error code>")
    }

    /// Error message for logging, with a placeholder when the server sent none
    pub fn error_message(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .unwrap_or("<no error message>")
    }
}

/// Payload of a `state_changed` event
///
/// Every field is optional: a structurally incomplete event is dropped by
/// the controller rather than failing decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub entity_id: Option<String>,

    #[serde(default)]
    pub event_type: Option<String>,

    /// Raw state snapshot after the change; projected by the controller
    #[serde(default)]
    pub new_state: Option<Value>,

    /// Raw state snapshot before the change
    #[serde(default)]
    pub old_state: Option<Value>,

    /// ISO-8601 timestamp, e.g. `2016-11-26T01:37:10.466994+00:00`
    #[serde(default)]
    pub time_fired: Option<String>,

    #[serde(default)]
    pub origin: Option<String>,
}

/// Inner wrapper of an event frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub data: Option<EventData>,
}

/// Inbound `event` frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub event: Option<EventBody>,
}

/// Decoded inbound message, discriminated by the wire `type` field
#[derive(Debug, Clone)]
pub enum ServerMessage {
    AuthRequired,
    AuthOk,
    AuthInvalid { message: Option<String> },
    Result(CommandResponse),
    Event(EventMessage),
    Pong { id: Option<u64> },
    /// Forward-compatibility: a `type` we do not recognize
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct Discriminator {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct AuthInvalidBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PongBody {
    #[serde(default)]
    id: Option<u64>,
}

impl ServerMessage {
    /// Decode a raw text frame
    ///
    /// The discriminator is decoded first to select the envelope type, then
    /// the frame is fully decoded into it. Unknown `type` values are not an
    /// error; text that is not valid JSON, lacks a `type`, or fails to
    /// decode as its declared envelope is.
    pub fn decode(text: &str) -> Result<Self> {
        let discriminator: Discriminator = serde_json::from_str(text)
            .map_err(|e| HassError::MalformedMessage(format!("bad discriminator: {e}")))?;

        let malformed =
            |e: serde_json::Error| HassError::MalformedMessage(format!("bad {} frame: {e}", discriminator.kind));

        match discriminator.kind.as_str() {
            TYPE_AUTH_REQUIRED => Ok(ServerMessage::AuthRequired),
            TYPE_AUTH_OK => Ok(ServerMessage::AuthOk),
            TYPE_AUTH_INVALID => {
                let body: AuthInvalidBody = serde_json::from_str(text).map_err(malformed)?;
                Ok(ServerMessage::AuthInvalid {
                    message: body.message,
                })
            }
            TYPE_RESULT => {
                let response: CommandResponse = serde_json::from_str(text).map_err(malformed)?;
                Ok(ServerMessage::Result(response))
            }
            TYPE_EVENT => {
                let event: EventMessage = serde_json::from_str(text).map_err(malformed)?;
                Ok(ServerMessage::Event(event))
            }
            TYPE_PONG => {
                let body: PongBody = serde_json::from_str(text).map_err(malformed)?;
                Ok(ServerMessage::Pong { id: body.id })
            }
            other => Ok(ServerMessage::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_command_omits_id() {
        let json = Command::auth("secret-token").encode().unwrap();
        assert!(!json.contains("\"id\""), "auth must not carry an id");
        assert!(json.contains("\"type\":\"auth\""));
        assert!(json.contains("\"access_token\":\"secret-token\""));
    }

    #[test]
    fn subscribe_command_carries_id_and_event_type() {
        let mut cmd = Command::subscribe_events();
        cmd.id = Some(1);
        let json = cmd.encode().unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"type\":\"subscribe_events\""));
        assert!(json.contains("\"event_type\":\"state_changed\""));
    }

    #[test]
    fn call_service_command_shape() {
        let mut cmd = Command::call_service(
            "media_player",
            "volume_set",
            json!({ "entity_id": "media_player.roku", "volume_level": 0.4 }),
        );
        cmd.id = Some(7);
        let encoded: Value = serde_json::from_str(&cmd.encode().unwrap()).unwrap();
        assert_eq!(encoded["type"], "call_service");
        assert_eq!(encoded["id"], 7);
        assert_eq!(encoded["domain"], "media_player");
        assert_eq!(encoded["service"], "volume_set");
        assert_eq!(encoded["service_data"]["volume_level"], 0.4);
    }

    #[test]
    fn decode_auth_messages() {
        assert!(matches!(
            ServerMessage::decode(r#"{"type":"auth_required","ha_version":"2024.1"}"#).unwrap(),
            ServerMessage::AuthRequired
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"type":"auth_ok"}"#).unwrap(),
            ServerMessage::AuthOk
        ));

        let invalid =
            ServerMessage::decode(r#"{"type":"auth_invalid","message":"Invalid password"}"#)
                .unwrap();
        match invalid {
            ServerMessage::AuthInvalid { message } => {
                assert_eq!(message.as_deref(), Some("Invalid password"));
            }
            other => panic!("expected AuthInvalid, got {other:?}"),
        }
    }

    #[test]
    fn decode_result_with_string_error_code() {
        let msg = ServerMessage::decode(
            r#"{"type":"result","id":3,"success":false,"error":{"code":"not_found","message":"Entity not found"}}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::Result(resp) => {
                assert_eq!(resp.id, 3);
                assert!(!resp.success);
                assert_eq!(resp.error_code(), "not_found");
                assert_eq!(resp.error_message(), "Entity not found");
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn decode_result_with_numeric_error_code() {
        // Older servers send the code as a number; we normalize to a string
        let msg = ServerMessage::decode(
            r#"{"type":"result","id":4,"success":false,"error":{"code":2,"message":"Bad format"}}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::Result(resp) => assert_eq!(resp.error_code(), "2"),
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn decode_result_without_error_uses_placeholders() {
        let msg =
            ServerMessage::decode(r#"{"type":"result","id":5,"success":false}"#).unwrap();
        match msg {
            ServerMessage::Result(resp) => {
                assert_eq!(resp.error_code(), "<no error code>");
                assert_eq!(resp.error_message(), "<no error message>");
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn decode_unknown_type_is_not_an_error() {
        let msg = ServerMessage::decode(r#"{"type":"zone_updated","data":{}}"#).unwrap();
        match msg {
            ServerMessage::Unknown(kind) => assert_eq!(kind, "zone_updated"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_frames_without_discriminator() {
        assert!(matches!(
            ServerMessage::decode("not json"),
            Err(HassError::MalformedMessage(_))
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"id":1}"#),
            Err(HassError::MalformedMessage(_))
        ));
    }

    #[test]
    fn decode_event_with_missing_pieces() {
        // An event with no nested data still decodes; the controller
        // decides whether there is anything to emit
        let msg = ServerMessage::decode(r#"{"type":"event","event":{}}"#).unwrap();
        match msg {
            ServerMessage::Event(event) => {
                assert!(event.event.unwrap().data.is_none());
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn decode_full_event() {
        let msg = ServerMessage::decode(
            r#"{"type":"event","event":{"data":{
                "entity_id":"media_player.roku",
                "event_type":"state_changed",
                "new_state":{"entity_id":"media_player.roku","state":"playing"},
                "old_state":{"entity_id":"media_player.roku","state":"idle"},
                "time_fired":"2016-11-26T01:37:10.466994+00:00",
                "origin":"LOCAL"
            }}}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::Event(event) => {
                let data = event.event.unwrap().data.unwrap();
                assert_eq!(data.entity_id.as_deref(), Some("media_player.roku"));
                assert_eq!(data.origin.as_deref(), Some("LOCAL"));
                assert_eq!(data.new_state.unwrap()["state"], "playing");
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }
}
