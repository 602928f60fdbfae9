//! Server configuration.

use realmforge_session::SessionConfig;
use realmforge_world::WorldConfig;
use serde::Deserialize;

/// Which wire transport the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Raw TCP, one `\n`-terminated line per packet.
    #[default]
    Line,
    /// One WebSocket text frame per packet.
    WebSocket,
}

/// Everything needed to start a server, usually read from a TOML file.
///
/// ```toml
/// bind = "0.0.0.0:4000"
/// transport = "line"
/// channel_id = 1
///
/// [session]
/// idle_timeout_secs = 300
///
/// [world]
/// tick_interval_ms = 400
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub transport: TransportKind,
    /// Id of this process among the channels of the cross-node directory.
    pub channel_id: u32,
    pub session: SessionConfig,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:4000".to_string(),
            transport: TransportKind::default(),
            channel_id: 1,
            session: SessionConfig::default(),
            world: WorldConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "127.0.0.1:4000");
        assert_eq!(config.transport, TransportKind::Line);
        assert_eq!(config.channel_id, 1);
        assert_eq!(config.session.protocol_version, 1);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{ "transport": "websocket", "world": { "simulation_threads": 2 } }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.world.simulation_threads, 2);
        assert_eq!(config.world.tick_interval_ms, 400);
        assert_eq!(config.bind, "127.0.0.1:4000");
    }
}
