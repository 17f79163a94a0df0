//! Thin gateway over a single SQL Server connection.
//!
//! Every component talks to a database through this wrapper. Unlike a pooled
//! setup, each gateway owns exactly one persistent connection: the extractor
//! runs `CHANGETABLE` reads inside a snapshot transaction and the applier
//! interleaves DML with `SyncInfo` bookkeeping, so consecutive statements must
//! observe the same session state.

use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Row, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::{ReplicateError, Result};

/// Transaction isolation levels the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    Snapshot,
}

impl IsolationLevel {
    /// T-SQL spelling for `SET TRANSACTION ISOLATION LEVEL`.
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::Snapshot => "SNAPSHOT",
        }
    }
}

/// An open connection to one SQL Server database.
pub struct SqlGateway {
    client: Client<Compat<TcpStream>>,
    endpoint: String,
}

impl SqlGateway {
    /// Open a connection to the given endpoint.
    pub async fn connect(endpoint: &EndpointConfig) -> Result<Self> {
        let config = build_config(endpoint);

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| ReplicateError::connection(&endpoint.name, e.to_string()))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| ReplicateError::connection(&endpoint.name, e.to_string()))?;

        debug!(
            "Connected to {} ({}:{}/{})",
            endpoint.name, endpoint.host, endpoint.port, endpoint.database
        );

        Ok(Self {
            client,
            endpoint: endpoint.name.clone(),
        })
    }

    /// Display name of the connected endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a parameterized query and return the first column of the first row.
    ///
    /// Returns `None` both for an empty result set and for a NULL scalar.
    pub async fn scalar_i64(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<Option<i64>> {
        let stream = self.client.query(sql, params).await?;
        let row = stream.into_row().await?;
        Ok(row.and_then(|r| r.get(0)))
    }

    /// Run a parameterized query and return all rows of the first result set.
    pub async fn fetch(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>> {
        let stream = self.client.query(sql, params).await?;
        Ok(stream.into_first_result().await?)
    }

    /// Execute a parameterized statement, returning the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<u64> {
        let result = self.client.execute(sql, params).await?;
        Ok(result.total())
    }

    /// Execute a raw T-SQL batch with no parameters, draining any results.
    ///
    /// Transaction control and DDL go through here: `sp_executesql` scopes
    /// SET options to the inner batch, while a raw batch applies them to the
    /// session.
    pub async fn batch(&mut self, sql: &str) -> Result<()> {
        let stream = self.client.simple_query(sql).await?;
        stream.into_results().await?;
        Ok(())
    }

    /// Begin a transaction at the given isolation level.
    pub async fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        self.batch(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}; BEGIN TRANSACTION",
            isolation.as_sql()
        ))
        .await
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT TRANSACTION").await
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK TRANSACTION").await
    }

    /// Close the connection, sending a clean TDS logout.
    ///
    /// Dropping the gateway also releases the socket; this just makes the
    /// teardown orderly. An open transaction is discarded by the server.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

fn build_config(endpoint: &EndpointConfig) -> Config {
    let mut config = Config::new();
    config.host(&endpoint.host);
    config.port(endpoint.port);
    config.database(&endpoint.database);
    config.authentication(AuthMethod::sql_server(&endpoint.user, &endpoint.password));

    if endpoint.encrypt {
        if endpoint.trust_server_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }

    config
}
