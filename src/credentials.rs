//! Connection credentials and pool settings.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RowForgeError};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 3306;

/// Where and as whom to connect, plus the name of the pool.
///
/// Immutable once built. Use [`Credentials::builder`], [`Credentials::from_env`]
/// or deserialize it; all three validate the same way.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CredentialsConfig")]
pub struct Credentials {
    hostname: String,
    port: u16,
    username: String,
    password: Option<String>,
    schema: Option<String>,
    pool_name: String,
}

impl Credentials {
    pub fn builder() -> CredentialsBuilder {
        CredentialsBuilder::default()
    }

    /// Reads `<PREFIX>_HOST`, `<PREFIX>_PORT`, `<PREFIX>_USER`,
    /// `<PREFIX>_PASSWORD`, `<PREFIX>_SCHEMA` and `<PREFIX>_POOL`.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix)).ok();

        let mut builder = Self::builder();
        if let Some(host) = var("HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = var("PORT") {
            let port = port.trim().parse::<u16>().map_err(|e| {
                RowForgeError::InvalidArgument(format!("{}_PORT is not a port: {}", prefix, e))
            })?;
            builder = builder.port(port);
        }
        if let Some(user) = var("USER") {
            builder = builder.user(user);
        }
        if let Some(password) = var("PASSWORD") {
            builder = builder.password(password);
        }
        if let Some(schema) = var("SCHEMA") {
            builder = builder.schema(schema);
        }
        if let Some(pool) = var("POOL") {
            builder = builder.pool(pool);
        }
        builder.build()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// `mysql://<host>:<port>/<schema>`, without user or password.
    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}/{}",
            self.hostname,
            self.port,
            self.schema.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("schema", &self.schema)
            .field("pool_name", &self.pool_name)
            .finish()
    }
}

/// Builds [`Credentials`]; `build` rejects missing or empty required fields.
#[derive(Debug, Clone)]
pub struct CredentialsBuilder {
    hostname: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    schema: Option<String>,
    pool_name: Option<String>,
}

impl Default for CredentialsBuilder {
    fn default() -> Self {
        Self {
            hostname: None,
            port: DEFAULT_PORT,
            username: None,
            password: None,
            schema: None,
            pool_name: None,
        }
    }
}

impl CredentialsBuilder {
    pub fn host(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn pool(mut self, pool_name: impl Into<String>) -> Self {
        self.pool_name = Some(pool_name.into());
        self
    }

    pub fn build(self) -> Result<Credentials> {
        Ok(Credentials {
            hostname: required(self.hostname, "Hostname")?,
            port: self.port,
            username: required(self.username, "Username")?,
            password: self.password,
            schema: self.schema,
            pool_name: required(self.pool_name, "Pool name")?,
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        None => Err(RowForgeError::InvalidArgument(format!(
            "{} cannot be null.",
            what
        ))),
        Some(v) if v.is_empty() => Err(RowForgeError::InvalidArgument(format!(
            "{} cannot be empty.",
            what
        ))),
        Some(v) => Ok(v),
    }
}

#[derive(Deserialize)]
struct CredentialsConfig {
    #[serde(alias = "hostname")]
    host: Option<String>,
    port: Option<u16>,
    #[serde(alias = "username")]
    user: Option<String>,
    password: Option<String>,
    schema: Option<String>,
    #[serde(alias = "pool_name")]
    pool: Option<String>,
}

impl TryFrom<CredentialsConfig> for Credentials {
    type Error = RowForgeError;

    fn try_from(config: CredentialsConfig) -> Result<Self> {
        let builder = CredentialsBuilder {
            hostname: config.host,
            port: config.port.unwrap_or(DEFAULT_PORT),
            username: config.user,
            password: config.password,
            schema: config.schema,
            pool_name: config.pool,
        };
        builder.build()
    }
}

/// Tuning of the pooled MySQL source.
///
/// The defaults follow the usual recommendations for MySQL pools: statement
/// caching, a pool sized from the CPU count and short acquire and leak
/// timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub cache_prepared_statements: bool,
    pub prepared_statement_cache_size: usize,
    pub prepared_statement_cache_sql_limit: usize,
    pub socket_timeout: Duration,
    pub max_pool_size: usize,
    pub min_idle: usize,
    pub max_lifetime: Duration,
    pub connection_timeout: Duration,
    /// Connections held longer than this are reported on release.
    pub leak_detection_threshold: Duration,
    /// Extra driver options, appended to the connection URL query.
    pub properties: BTreeMap<String, String>,
}

impl PoolSettings {
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let max_pool_size = parallelism * 2 + 1;
        Self {
            cache_prepared_statements: true,
            prepared_statement_cache_size: 250,
            prepared_statement_cache_sql_limit: 2048,
            socket_timeout: Duration::from_secs(30),
            max_pool_size,
            min_idle: max_pool_size.min(10),
            max_lifetime: Duration::from_secs(30 * 60),
            connection_timeout: Duration::from_secs(10),
            leak_detection_threshold: Duration::from_secs(10),
            properties: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_defaults() {
        let credentials = Credentials::builder()
            .host("db.local")
            .user("app")
            .pool("main")
            .build()
            .unwrap();
        assert_eq!(credentials.port(), DEFAULT_PORT);
        assert_eq!(credentials.password(), None);
        assert_eq!(credentials.schema(), None);
        assert_eq!(credentials.connection_url(), "mysql://db.local:3306/");
    }

    #[test]
    fn test_builder_rejects_empty_required_fields() {
        let err = Credentials::builder()
            .host("")
            .user("app")
            .pool("main")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("Hostname cannot be empty."));

        let err = Credentials::builder().host("h").pool("main").build().unwrap_err();
        assert!(err.to_string().contains("Username"));
    }

    #[test]
    fn test_debug_hides_password() {
        let credentials = Credentials::builder()
            .host("h")
            .user("u")
            .password("secret")
            .pool("p")
            .build()
            .unwrap();
        assert!(!format!("{:?}", credentials).contains("secret"));
    }

    #[test]
    fn test_pool_defaults() {
        let settings = PoolSettings::default();
        assert_eq!(settings.prepared_statement_cache_size, 250);
        assert_eq!(settings.prepared_statement_cache_sql_limit, 2048);
        assert_eq!(settings.min_idle, settings.max_pool_size.min(10));
        assert_eq!(settings.max_pool_size % 2, 1);
        assert_eq!(settings.connection_timeout, Duration::from_secs(10));
    }
}
