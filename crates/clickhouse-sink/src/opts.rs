use std::fmt;
use std::time::Duration;

/// Default timeout for establishing a connection to the store
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// ClickHouse connection options
#[derive(Clone)]
pub struct ClickHouseOpts {
    /// Base URL of the HTTP interface, e.g. `http://localhost:8123`
    pub endpoint: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl ClickHouseOpts {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Endpoint with a single trailing slash.
    pub(crate) fn base_url(&self) -> String {
        format!("{}/", self.endpoint.trim_end_matches('/'))
    }
}

// Keeps the password out of logs
impl fmt::Debug for ClickHouseOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseOpts")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
