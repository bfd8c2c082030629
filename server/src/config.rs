//! Server configuration.
//!
//! Loaded from environment variables:
//!
//! - `HKV_LISTEN_PORT`: TCP port to listen on (default: `7000`)

/// Configuration for one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the listener binds to.
    pub listen_port: u16,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    /// Default port for the server.
    pub const DEFAULT_PORT: u16 = 7000;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `HKV_LISTEN_PORT` is set but is not a valid
    /// port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_port = Self::load_listen_port()?;
        Ok(Self { listen_port })
    }

    fn load_listen_port() -> Result<u16, ConfigError> {
        match std::env::var("HKV_LISTEN_PORT") {
            Ok(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "HKV_LISTEN_PORT".to_string(),
                message: format!("'{value}' is not a valid port number (must be 1-65535)"),
            }),
            Err(_) => Ok(Self::DEFAULT_PORT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        assert_eq!(ServerConfig::DEFAULT_PORT, 7000);
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidValue {
            name: "HKV_LISTEN_PORT".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid value for HKV_LISTEN_PORT: bad value"
        );
    }
}
