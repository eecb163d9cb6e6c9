use serde::Deserialize;

fn default_port() -> u16 {
    8123
}

fn default_path() -> String {
    "/api/websocket".to_string()
}

/// Connection settings for a Home Assistant server
///
/// Deserializable so host applications can load it straight from their own
/// configuration files:
///
/// ```
/// use hass_ws::Config;
///
/// let config: Config = serde_json::from_str(
///     r#"{ "host": "hass.local", "access_token": "abc" }"#,
/// ).unwrap();
/// assert_eq!(config.port, 8123);
/// assert_eq!(config.url(), "ws://hass.local:8123/api/websocket");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server hostname or IP address
    pub host: String,

    /// Server port, 8123 unless overridden
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket API path on the server
    #[serde(default = "default_path")]
    pub path: String,

    /// Use TLS (`wss://`) for the connection
    #[serde(default)]
    pub secure: bool,

    /// Long-lived access token presented during the auth handshake
    pub access_token: String,
}

impl Config {
    /// Create a config for the standard API path on the given host
    pub fn new(host: impl Into<String>, port: u16, access_token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: default_path(),
            secure: false,
            access_token: access_token.into(),
        }
    }

    /// The WebSocket URL this config points at
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_port_path_and_scheme() {
        let config: Config =
            serde_json::from_str(r#"{ "host": "192.168.1.5", "access_token": "tok" }"#).unwrap();
        assert_eq!(config.port, 8123);
        assert_eq!(config.path, "/api/websocket");
        assert!(!config.secure);
        assert_eq!(config.url(), "ws://192.168.1.5:8123/api/websocket");
    }

    #[test]
    fn secure_config_uses_wss() {
        let config: Config = serde_json::from_str(
            r#"{ "host": "hass.example.com", "port": 443, "secure": true, "access_token": "tok" }"#,
        )
        .unwrap();
        assert_eq!(config.url(), "wss://hass.example.com:443/api/websocket");
    }
}
