//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateway::IsolationLevel;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Replication sets, processed in declaration order.
    pub replication_sets: Vec<ReplicationSetConfig>,

    /// Engine-wide settings.
    #[serde(default)]
    pub settings: Settings,
}

/// One source database and the destinations it replicates to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationSetConfig {
    /// Display name, used in logs and error reporting.
    pub name: String,

    /// Source database (change tracking must be enabled).
    pub source: EndpointConfig,

    /// Destination databases, non-empty.
    pub destinations: Vec<EndpointConfig>,

    /// Optional table allowlist. Entries are matched case-sensitively against
    /// the bracket-stripped qualified name, e.g. `dbo.Orders`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
}

/// Connection details for one database endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Display name.
    pub name: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Isolation level for destination apply transactions.
    ///
    /// Defaults to read-uncommitted: destinations are assumed to have no
    /// writers other than this tool, and the weaker level minimizes locking
    /// against concurrent readers.
    #[serde(default = "default_apply_isolation")]
    pub apply_isolation: IsolationLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            apply_isolation: default_apply_isolation(),
        }
    }
}

fn default_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

fn default_apply_isolation() -> IsolationLevel {
    IsolationLevel::ReadUncommitted
}
