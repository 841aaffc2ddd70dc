//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};

/// Default bind address for the WebSocket server
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default bind port for the WebSocket server
pub const DEFAULT_BIND_PORT: u16 = 9100;

/// Default maximum inbound message size (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65536;

/// Default maximum inbound frame size (16KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16384;

/// Default number of outbound frames queued per connection
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 1024;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on, 0 for an ephemeral port
    pub port: u16,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Outbound frames queued per connection before it counts as failed
    pub send_queue_capacity: usize,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the WebSocket limits are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", DEFAULT_BIND_ADDRESS)?
            .set_default("server.port", DEFAULT_BIND_PORT as i64)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("websocket.max_message_size", DEFAULT_MAX_MESSAGE_SIZE as i64)?
            .set_default("websocket.max_frame_size", DEFAULT_MAX_FRAME_SIZE as i64)?
            .set_default(
                "websocket.send_queue_capacity",
                DEFAULT_SEND_QUEUE_CAPACITY as i64,
            )?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=9100 -> server.port = 9100
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("WSS_BIND_ADDRESS").ok())?
            .set_override_option("server.port", std::env::var("WSS_BIND_PORT").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.websocket.max_message_size == 0 {
            return Err(ConfigError::Message(
                "websocket.max_message_size must be greater than zero".into(),
            ));
        }
        if self.websocket.max_frame_size == 0 {
            return Err(ConfigError::Message(
                "websocket.max_frame_size must be greater than zero".into(),
            ));
        }
        if self.websocket.send_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "websocket.send_queue_capacity must be greater than zero".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: DEFAULT_BIND_ADDRESS.into(),
                port: DEFAULT_BIND_PORT,
            },
            cors: CorsSettings {
                allowed_origins: Vec::new(),
            },
            websocket: WebSocketSettings {
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                max_frame_size: DEFAULT_MAX_FRAME_SIZE,
                send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            },
            environment: "development".into(),
        }
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
