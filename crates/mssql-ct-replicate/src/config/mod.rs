//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::error::{ReplicateError, Result};

impl Config {
    /// Load configuration from a file.
    ///
    /// Automatically detects the format based on file extension:
    /// - `.json` files are parsed as JSON
    /// - `.yaml` or `.yml` files are parsed as YAML
    /// - Other extensions default to YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| ReplicateError::Config(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl EndpointConfig {
    /// ADO-style connection string, for display and diagnostics.
    pub fn connection_string(&self) -> String {
        format!(
            "Server=tcp:{},{};Database={};User Id={};Encrypt={};TrustServerCertificate={}",
            self.host, self.port, self.database, self.user, self.encrypt, self.trust_server_cert
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::IsolationLevel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_YAML: &str = r#"
replication_sets:
  - name: primary
    source:
      name: prod
      host: localhost
      port: 1433
      database: AppDb
      user: sa
      password: password
      encrypt: false
    destinations:
      - name: reporting
        host: reports.local
        database: AppDbReports
        user: sa
        password: password
      - name: archive
        host: archive.local
        database: AppDbArchive
        user: sa
        password: password
    tables:
      - dbo.Orders
      - dbo.OrderLines

settings:
  apply_isolation: read_committed
"#;

    const VALID_JSON: &str = r#"{
  "replication_sets": [
    {
      "name": "primary",
      "source": {
        "name": "prod",
        "host": "localhost",
        "database": "AppDb",
        "user": "sa",
        "password": "password"
      },
      "destinations": [
        {
          "name": "reporting",
          "host": "reports.local",
          "database": "AppDbReports",
          "user": "sa",
          "password": "password"
        }
      ]
    }
  ]
}"#;

    #[test]
    fn test_from_yaml_valid() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.replication_sets.len(), 1);
        let set = &config.replication_sets[0];
        assert_eq!(set.source.name, "prod");
        assert_eq!(set.source.port, 1433);
        assert_eq!(set.destinations.len(), 2);
        assert_eq!(
            set.tables.as_deref(),
            Some(&["dbo.Orders".to_string(), "dbo.OrderLines".to_string()][..])
        );
        assert_eq!(config.settings.apply_isolation, IsolationLevel::ReadCommitted);
    }

    #[test]
    fn test_from_json_valid_with_defaults() {
        let config = Config::from_json(VALID_JSON).unwrap();
        let set = &config.replication_sets[0];
        assert_eq!(set.source.port, 1433);
        assert!(set.source.encrypt);
        assert!(!set.source.trust_server_cert);
        assert!(set.tables.is_none());
        assert_eq!(
            config.settings.apply_isolation,
            IsolationLevel::ReadUncommitted
        );
    }

    #[test]
    fn test_from_json_invalid_syntax() {
        let result = Config::from_json(r#"{ "replication_sets": [ nope }"#);
        assert!(matches!(result, Err(ReplicateError::Config(_))));
    }

    #[test]
    fn test_empty_sets_rejected() {
        let result = Config::from_yaml("replication_sets: []");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_destinations_rejected() {
        let yaml = r#"
replication_sets:
  - name: primary
    source:
      name: prod
      host: localhost
      database: AppDb
      user: sa
      password: password
    destinations: []
"#;
        let result = Config::from_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_destination_names_rejected() {
        let yaml = r#"
replication_sets:
  - name: primary
    source:
      name: prod
      host: localhost
      database: AppDb
      user: sa
      password: password
    destinations:
      - name: reporting
        host: a.local
        database: Db1
        user: sa
        password: password
      - name: reporting
        host: b.local
        database: Db2
        user: sa
        password: password
"#;
        let result = Config::from_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_json_extension() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(VALID_JSON.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.replication_sets[0].source.database, "AppDb");
    }

    #[test]
    fn test_load_yaml_extension() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(VALID_YAML.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.replication_sets[0].destinations.len(), 2);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        let debug = format!("{:?}", config.replication_sets[0].source);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("password: \"password\""));
    }

    #[test]
    fn test_connection_string_omits_password() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        let cs = config.replication_sets[0].source.connection_string();
        assert!(cs.contains("Server=tcp:localhost,1433"));
        assert!(!cs.contains("password"));
    }
}
