use serde::Deserialize;

/// Top-level server configuration, loaded from an optional TOML file and
/// layered with environment-variable overrides (see [`ServerConfig::load`]).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-connection and per-room hard limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub room_capacity: usize,
    /// Sliding-window rate limit: max frames per `rate_limit_window_secs`.
    pub rate_limit_count: usize,
    pub rate_limit_window_secs: u64,
    pub max_frame_size_bytes: usize,
    /// Bounded capacity of each member's outbound queue.
    pub outbound_queue_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            room_capacity: 4,
            rate_limit_count: 10,
            rate_limit_window_secs: 1,
            max_frame_size_bytes: 64 * 1024,
            outbound_queue_capacity: 128,
        }
    }
}

/// Room lifecycle configuration (idle eviction).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 2 * 3600,
            sweep_interval_secs: 60,
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret for the default HMAC token verifier. `None` disables
    /// the hub (every connection is rejected with `auth_failed`) rather than
    /// silently allowing unauthenticated access.
    pub token_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { token_secret: None }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting the process on a fatal misconfiguration.
    pub fn validate(&self) {
        if self.listen_addr().parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(addr = %self.listen_addr(), "listen address is not valid");
            std::process::exit(1);
        }
        if self.limits.room_capacity == 0 {
            tracing::error!("limits.room_capacity must be > 0");
            std::process::exit(1);
        }
        if self.limits.rate_limit_count == 0 {
            tracing::error!("limits.rate_limit_count must be > 0");
            std::process::exit(1);
        }
        if self.limits.rate_limit_window_secs == 0 {
            tracing::error!("limits.rate_limit_window_secs must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_frame_size_bytes == 0 {
            tracing::error!("limits.max_frame_size_bytes must be > 0");
            std::process::exit(1);
        }
        if self.limits.outbound_queue_capacity == 0 {
            tracing::error!("limits.outbound_queue_capacity must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_ttl_secs == 0 {
            tracing::error!("rooms.idle_ttl_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.sweep_interval_secs == 0 {
            tracing::error!("rooms.sweep_interval_secs must be > 0");
            std::process::exit(1);
        }
        if self.auth.token_secret.is_none() {
            tracing::warn!(
                "auth.token_secret is not set — every connection will be rejected as auth_failed"
            );
        }
    }

    /// Load config from an optional TOML file, then apply environment
    /// variable overrides. CLI flags are applied afterward by the caller
    /// (see `main`), so precedence is CLI > env > file > default.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = match path.and_then(|p| std::fs::read_to_string(p).ok()) {
            Some(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = path.unwrap_or(""), "loaded configuration from file");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse config file, using defaults");
                    ServerConfig::default()
                },
            },
            None => {
                tracing::info!("no config file given, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(host) = std::env::var("SIGHUB_HOST")
            && !host.is_empty()
        {
            config.host = host;
        }
        if let Ok(val) = std::env::var("SIGHUB_PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            config.port = port;
        }
        if let Ok(secret) = std::env::var("SIGHUB_TOKEN_SECRET")
            && !secret.is_empty()
        {
            config.auth.token_secret = Some(secret);
        }
        if let Ok(val) = std::env::var("SIGHUB_ROOM_CAPACITY")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.room_capacity = n;
        }
        if let Ok(val) = std::env::var("SIGHUB_RATE_LIMIT_COUNT")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.rate_limit_count = n;
        }
        if let Ok(val) = std::env::var("SIGHUB_IDLE_TTL_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.idle_ttl_secs = n;
        }

        config
    }
}
