use serde_json::{Map, Value};

/// Attribute keys we lift out of the raw bag into typed fields
const KNOWN_ATTRIBUTES: &[&str] = &[
    "friendly_name",
    "volume_level",
    "is_volume_muted",
    "source",
    "source_list",
    "sound_mode",
    "sound_mode_list",
    "media_content_type",
    "supports_features",
    "entity_picture",
];

/// Well-known entity attributes, plus everything else the server sent
///
/// Every field is independently optional. An attribute whose value has the
/// wrong JSON type is treated as absent rather than failing the projection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes {
    /// Display name; most entity types have this
    pub friendly_name: Option<String>,

    /// Media player volume, 0.0 to 1.0
    pub volume_level: Option<f64>,

    pub is_volume_muted: Option<bool>,

    /// Active media source
    pub source: Option<String>,

    pub source_list: Option<Vec<String>>,

    pub sound_mode: Option<String>,

    pub sound_mode_list: Option<Vec<String>>,

    /// "app" for Roku, "channel" on some AVRs
    pub media_content_type: Option<String>,

    /// Bit flags; meaning varies by entity domain.
    /// Wire key is `supports_features`.
    pub supported_features: Option<u64>,

    /// Artwork URL for the active media source
    pub entity_picture: Option<String>,

    /// Attributes we did not recognize, preserved as-is
    pub extra: Map<String, Value>,
}

/// Immutable snapshot of one entity's state
///
/// Produced fresh on every poll response or state-changed event; no entity
/// identity is retained across snapshots beyond the `entity_id` key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityState {
    pub entity_id: String,

    /// Domain-specific state string, e.g. "playing", "paused", "off"
    pub state: String,

    /// ISO-8601 timestamp of the last state change
    pub last_changed: Option<String>,

    /// ISO-8601 timestamp of the last update of any kind
    pub last_updated: Option<String>,

    pub attributes: Attributes,
}

fn string_of(value: Option<&Value>) -> Option<String> {
    value.and_then(|v| v.as_str()).map(str::to_string)
}

fn string_list_of(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Project a raw entity snapshot into a normalized [`EntityState`]
///
/// Pure and total: anything missing or of the wrong type comes out as
/// absent (or empty, for `entity_id` and `state`). Unknown attributes land
/// in [`Attributes::extra`].
pub fn project(raw: &Value) -> EntityState {
    let attrs = raw.get("attributes");

    let attributes = Attributes {
        friendly_name: string_of(attrs.and_then(|a| a.get("friendly_name"))),
        volume_level: attrs
            .and_then(|a| a.get("volume_level"))
            .and_then(Value::as_f64),
        is_volume_muted: attrs
            .and_then(|a| a.get("is_volume_muted"))
            .and_then(Value::as_bool),
        source: string_of(attrs.and_then(|a| a.get("source"))),
        source_list: string_list_of(attrs.and_then(|a| a.get("source_list"))),
        sound_mode: string_of(attrs.and_then(|a| a.get("sound_mode"))),
        sound_mode_list: string_list_of(attrs.and_then(|a| a.get("sound_mode_list"))),
        media_content_type: string_of(attrs.and_then(|a| a.get("media_content_type"))),
        supported_features: attrs
            .and_then(|a| a.get("supports_features"))
            .and_then(Value::as_u64),
        entity_picture: string_of(attrs.and_then(|a| a.get("entity_picture"))),
        extra: attrs
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter(|(key, _)| !KNOWN_ATTRIBUTES.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default(),
    };

    EntityState {
        entity_id: string_of(raw.get("entity_id")).unwrap_or_default(),
        state: string_of(raw.get("state")).unwrap_or_default(),
        last_changed: string_of(raw.get("last_changed")),
        last_updated: string_of(raw.get("last_updated")),
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_full_media_player_snapshot() {
        let raw = json!({
            "entity_id": "media_player.roku",
            "state": "playing",
            "last_changed": "2016-11-26T01:37:10.466994+00:00",
            "last_updated": "2016-11-26T01:37:10.466994+00:00",
            "attributes": {
                "friendly_name": "Roku",
                "volume_level": 0.35,
                "is_volume_muted": false,
                "source": "Netflix",
                "source_list": ["Netflix", "YouTube"],
                "sound_mode": "stereo",
                "sound_mode_list": ["stereo", "surround"],
                "media_content_type": "app",
                "supports_features": 21437,
                "entity_picture": "/api/media_player_proxy/media_player.roku"
            }
        });

        let state = project(&raw);
        assert_eq!(state.entity_id, "media_player.roku");
        assert_eq!(state.state, "playing");
        assert_eq!(
            state.last_changed.as_deref(),
            Some("2016-11-26T01:37:10.466994+00:00")
        );
        assert_eq!(state.attributes.friendly_name.as_deref(), Some("Roku"));
        assert_eq!(state.attributes.volume_level, Some(0.35));
        assert_eq!(state.attributes.is_volume_muted, Some(false));
        assert_eq!(
            state.attributes.source_list.as_deref(),
            Some(["Netflix".to_string(), "YouTube".to_string()].as_slice())
        );
        assert_eq!(state.attributes.supported_features, Some(21437));
        assert!(state.attributes.extra.is_empty());
    }

    #[test]
    fn missing_optional_attributes_come_out_absent() {
        let raw = json!({
            "entity_id": "media_player.roku",
            "state": "idle",
            "last_changed": "2016-11-26T01:37:10+00:00",
            "last_updated": "2016-11-26T01:37:10+00:00",
            "attributes": {}
        });

        let state = project(&raw);
        assert_eq!(state.entity_id, "media_player.roku");
        assert_eq!(state.state, "idle");
        assert!(state.last_changed.is_some());
        assert!(state.last_updated.is_some());
        assert_eq!(state.attributes, Attributes::default());
    }

    #[test]
    fn wrong_typed_attributes_are_treated_as_absent() {
        let raw = json!({
            "entity_id": "media_player.avr",
            "state": "on",
            "attributes": {
                "volume_level": "loud",
                "is_volume_muted": "no",
                "source_list": ["a", 3, "b"],
                "supports_features": -1
            }
        });

        let state = project(&raw);
        assert_eq!(state.attributes.volume_level, None);
        assert_eq!(state.attributes.is_volume_muted, None);
        assert_eq!(state.attributes.source_list, None);
        assert_eq!(state.attributes.supported_features, None);
    }

    #[test]
    fn unknown_attributes_are_preserved_in_extra() {
        let raw = json!({
            "entity_id": "media_player.roku",
            "state": "playing",
            "attributes": {
                "friendly_name": "Roku",
                "app_id": 837,
                "device_class": "receiver"
            }
        });

        let state = project(&raw);
        assert_eq!(state.attributes.friendly_name.as_deref(), Some("Roku"));
        assert_eq!(state.attributes.extra["app_id"], 837);
        assert_eq!(state.attributes.extra["device_class"], "receiver");
        assert!(!state.attributes.extra.contains_key("friendly_name"));
    }

    #[test]
    fn projection_never_fails_on_garbage() {
        for raw in [json!(null), json!(42), json!("text"), json!([1, 2])] {
            let state = project(&raw);
            assert_eq!(state.entity_id, "");
            assert_eq!(state.state, "");
        }
    }
}
