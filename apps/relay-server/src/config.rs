use std::time::Duration;

/// Relay server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    /// HS256 secret used to validate client tokens.
    pub jwt_secret: String,
    /// Bearer token required on the `/api` routes.
    pub http_api_token: String,
    /// Endpoint receiving upstream dispatches. `None` disables forwarding.
    pub upstream_url: Option<String>,
    /// Bearer token sent with upstream dispatches.
    pub upstream_token: Option<String>,
    pub upstream_timeout: Duration,
    pub relay: RelayConfig,
}

/// Timing and channel policy for the gateway itself.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Idle window: a session with no inbound traffic for this long is dropped.
    pub read_timeout: Duration,
    pub ping_interval: Duration,
    /// Upper bound on a single transport write.
    pub write_timeout: Duration,
    /// Channels whose name starts with one of these require an authenticated session.
    pub auth_channel_prefixes: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(54),
            write_timeout: Duration::from_secs(10),
            auth_channel_prefixes: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port cannot be empty")]
    EmptyPort,
    #[error("JWT secret cannot be empty")]
    EmptyJwtSecret,
    #[error("HTTP API token cannot be empty")]
    EmptyHttpToken,
    #[error("{name} has an invalid value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            None => 8080,
            Some(v) if v.trim().is_empty() => return Err(ConfigError::EmptyPort),
            Some(v) => parse_var("PORT", &v)?,
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::EmptyJwtSecret)?;
        let http_api_token = lookup("HTTP_API_TOKEN")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::EmptyHttpToken)?;

        let defaults = RelayConfig::default();
        let relay = RelayConfig {
            read_timeout: secs_var(&lookup, "READ_TIMEOUT_SECS", defaults.read_timeout)?,
            ping_interval: secs_var(&lookup, "PING_INTERVAL_SECS", defaults.ping_interval)?,
            write_timeout: secs_var(&lookup, "WRITE_TIMEOUT_SECS", defaults.write_timeout)?,
            auth_channel_prefixes: lookup("AUTH_CHANNEL_PREFIXES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            port,
            jwt_secret,
            http_api_token,
            upstream_url: lookup("UPSTREAM_URL").filter(|s| !s.is_empty()),
            upstream_token: lookup("UPSTREAM_TOKEN").filter(|s| !s.is_empty()),
            upstream_timeout: secs_var(&lookup, "UPSTREAM_TIMEOUT_SECS", Duration::from_secs(10))?,
            relay,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

fn secs_var<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).filter(|s| !s.is_empty()) {
        Some(v) => Ok(Duration::from_secs(parse_var(name, &v)?)),
        None => Ok(default),
    }
}
