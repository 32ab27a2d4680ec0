//! Connection configuration types.

use std::fmt;
use std::time::Duration;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default bound on each reply wait and each write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plain TCP, the usual setup for a submission listener on a trusted network.
    #[default]
    None,
    /// Start with plaintext, upgrade with STARTTLS.
    StartTls,
    /// TLS from the start.
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 25,
            Self::Implicit => 465,
        }
    }
}

/// Account name and password for `AUTH PLAIN`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub name: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Submission connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Optional `AUTH PLAIN` credentials.
    pub credentials: Option<Credentials>,
    /// Hostname announced in EHLO.
    pub client_hostname: String,
    /// Connection timeout (TCP connect and, for implicit TLS, the handshake).
    pub connect_timeout: Duration,
    /// Bound on each reply wait and each write.
    pub io_timeout: Duration,
}

impl Config {
    /// Creates a plaintext configuration for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConfigBuilder::new(host).port(port).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    credentials: Option<Credentials>,
    client_hostname: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            credentials: None,
            client_hostname: "localhost".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Authenticates with `AUTH PLAIN` after EHLO.
    #[must_use]
    pub fn credentials(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(name, password));
        self
    }

    /// Sets the hostname announced in EHLO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reply/write timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            credentials: self.credentials,
            client_hostname: self.client_hostname,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 25);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("10.0.0.47", 2525);
        assert_eq!(config.host, "10.0.0.47");
        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert!(config.credentials.is_none());
        assert_eq!(config.client_hostname, "localhost");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("pmta.domain.tld")
            .security(Security::StartTls)
            .credentials("api", "secret")
            .client_hostname("sender.domain.tld")
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.credentials, Some(Credentials::new("api", "secret")));
        assert_eq!(config.client_hostname, "sender.domain.tld");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("pmta.domain.tld")
            .security(Security::Implicit)
            .build();
        assert_eq!(config.port, 465);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("api", "secret"));
        assert!(debug.contains("api"));
        assert!(!debug.contains("secret"));
    }
}
