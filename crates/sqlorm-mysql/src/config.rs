//! MySQL connection configuration.
//!
//! Translates between connection string keywords and the keyword
//! arguments MySQL drivers take (`passwd`, `db`, `charset`).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlorm_core::{ConnectParams, Error, Result};

/// Character set used when the connection string names none.
pub const DEFAULT_CHARSET: &str = "UTF8";

/// MySQL connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MySqlConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    /// Username for authentication
    pub user: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Database to select after connecting
    pub database: Option<String>,
    /// Connection character set, by its MySQL name
    pub charset: String,
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// Driver keywords passed through unchanged
    pub extra: BTreeMap<String, String>,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: None,
            password: None,
            database: None,
            charset: DEFAULT_CHARSET.to_string(),
            connect_timeout: None,
            extra: BTreeMap::new(),
        }
    }
}

impl MySqlConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the character set. `utf-8` is accepted for `UTF8`.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        let charset = charset.into();
        self.charset = if charset.eq_ignore_ascii_case("utf-8") {
            DEFAULT_CHARSET.to_string()
        } else {
            charset
        };
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Pass a driver keyword through unchanged.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Get the socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Read connection string keywords. Both the generic names (`dbname`,
    /// `password`, `encoding`) and the driver's (`db`, `passwd`, `charset`)
    /// are understood.
    pub fn from_params(params: &ConnectParams) -> Result<Self> {
        let mut config = Self::new();
        for (key, value) in params.iter() {
            config = match key {
                "host" => config.host(value),
                "port" => config.port(value.parse().map_err(|_| {
                    Error::IllegalConnectionString(format!("port={value} is not a port number"))
                })?),
                "user" => config.user(value),
                "password" | "passwd" => config.password(value),
                "dbname" | "db" => config.database(value),
                "encoding" | "charset" => config.charset(value),
                "connect_timeout" => config.connect_timeout(Duration::from_secs(
                    value.parse().map_err(|_| {
                        Error::IllegalConnectionString(format!(
                            "connect_timeout={value} is not a number of seconds"
                        ))
                    })?,
                )),
                _ => config.extra(key, value),
            };
        }
        Ok(config)
    }

    /// Keyword arguments for the driver.
    pub fn to_params(&self) -> ConnectParams {
        let mut params = ConnectParams::new()
            .with("host", self.host.as_str())
            .with("port", self.port.to_string())
            .with("charset", self.charset.as_str());
        if let Some(user) = &self.user {
            params.insert("user", user.as_str());
        }
        if let Some(password) = &self.password {
            params.insert("passwd", password.as_str());
        }
        if let Some(database) = &self.database {
            params.insert("db", database.as_str());
        }
        if let Some(timeout) = self.connect_timeout {
            params.insert("connect_timeout", timeout.as_secs().to_string());
        }
        for (key, value) in &self.extra {
            params.insert(key.as_str(), value.as_str());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MySqlConfig::new()
            .host("db.example.com")
            .port(3307)
            .user("myuser")
            .password("secret")
            .database("testdb")
            .connect_timeout(Duration::from_secs(10))
            .extra("unix_socket", "/tmp/mysql.sock");

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 3307);
        assert_eq!(config.user, Some("myuser".to_string()));
        assert_eq!(config.password, Some("secret".to_string()));
        assert_eq!(config.database, Some("testdb".to_string()));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(
            config.extra.get("unix_socket"),
            Some(&"/tmp/mysql.sock".to_string())
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = MySqlConfig::new().host("db.example.com").port(3307);
        assert_eq!(config.socket_addr(), "db.example.com:3307");
    }

    #[test]
    fn test_default_config() {
        let config = MySqlConfig::default();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.charset, "UTF8");
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_generic_keywords_become_driver_keywords() {
        let params = ConnectParams::new()
            .with("user", "ann")
            .with("password", "pw")
            .with("dbname", "shop")
            .with("encoding", "utf-8");
        let driver = MySqlConfig::from_params(&params).unwrap().to_params();
        assert_eq!(driver.get("passwd"), Some("pw"));
        assert_eq!(driver.get("db"), Some("shop"));
        assert_eq!(driver.get("charset"), Some("UTF8"));
        assert!(!driver.contains("password"));
        assert!(!driver.contains("dbname"));
    }

    #[test]
    fn test_bad_port() {
        let params = ConnectParams::new().with("port", "many");
        assert!(matches!(
            MySqlConfig::from_params(&params),
            Err(Error::IllegalConnectionString(_))
        ));
    }
}
