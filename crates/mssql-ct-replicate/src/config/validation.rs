//! Configuration validation.

use std::collections::HashSet;

use crate::config::{Config, EndpointConfig};
use crate::error::{ReplicateError, Result};

pub fn validate(config: &Config) -> Result<()> {
    if config.replication_sets.is_empty() {
        return Err(ReplicateError::Config(
            "at least one replication set is required".to_string(),
        ));
    }

    let mut set_names = HashSet::new();
    for set in &config.replication_sets {
        if set.name.trim().is_empty() {
            return Err(ReplicateError::Config(
                "replication set name must not be empty".to_string(),
            ));
        }
        if !set_names.insert(set.name.as_str()) {
            return Err(ReplicateError::Config(format!(
                "duplicate replication set name '{}'",
                set.name
            )));
        }

        validate_endpoint(&set.name, "source", &set.source)?;

        if set.destinations.is_empty() {
            return Err(ReplicateError::Config(format!(
                "replication set '{}' has no destinations",
                set.name
            )));
        }

        let mut dest_names = HashSet::new();
        for dest in &set.destinations {
            validate_endpoint(&set.name, "destination", dest)?;
            if !dest_names.insert(dest.name.as_str()) {
                return Err(ReplicateError::Config(format!(
                    "replication set '{}' has duplicate destination name '{}'",
                    set.name, dest.name
                )));
            }
        }

        if let Some(tables) = &set.tables {
            if tables.iter().any(|t| t.trim().is_empty()) {
                return Err(ReplicateError::Config(format!(
                    "replication set '{}' has an empty table name in its allowlist",
                    set.name
                )));
            }
        }
    }

    Ok(())
}

fn validate_endpoint(set: &str, role: &str, endpoint: &EndpointConfig) -> Result<()> {
    if endpoint.name.trim().is_empty() {
        return Err(ReplicateError::Config(format!(
            "replication set '{}': {} endpoint name must not be empty",
            set, role
        )));
    }
    if endpoint.host.trim().is_empty() {
        return Err(ReplicateError::Config(format!(
            "replication set '{}': {} '{}' host must not be empty",
            set, role, endpoint.name
        )));
    }
    if endpoint.port == 0 {
        return Err(ReplicateError::Config(format!(
            "replication set '{}': {} '{}' port must be nonzero",
            set, role, endpoint.name
        )));
    }
    if endpoint.database.trim().is_empty() {
        return Err(ReplicateError::Config(format!(
            "replication set '{}': {} '{}' database must not be empty",
            set, role, endpoint.name
        )));
    }
    if endpoint.user.trim().is_empty() {
        return Err(ReplicateError::Config(format!(
            "replication set '{}': {} '{}' user must not be empty",
            set, role, endpoint.name
        )));
    }
    Ok(())
}
