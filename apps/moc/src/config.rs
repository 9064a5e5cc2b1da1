//! # Configuration
//!
//! `moc.toml` holds the server settings plus the reference data the engine
//! consumes: the person directory and the discipline catalog.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100
//!
//! [[people]]
//! id = "p7"
//! name = "Jonas Weber"
//! role = "Electrical Engineer"
//!
//! [[disciplines]]
//! id = "d1"
//! name = "Electrical"
//! direct_manager = "R. Osei"
//! ```
//!
//! A missing file yields the default configuration.

use moc_core::primitives::MAX_FIELD_LENGTH;
use moc_core::{Discipline, InMemoryDirectory, MocError, PersonRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Maximum size of a configuration file (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Default request body limit for the HTTP API (2 MB).
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER SECTION
// =============================================================================

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per second; `MOC_RATE_LIMIT` takes precedence. 0 disables.
    pub rate_limit: Option<u32>,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// MOC CONFIG
// =============================================================================

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MocConfig {
    pub server: ServerConfig,
    pub people: Vec<PersonRecord>,
    pub disciplines: Vec<Discipline>,
}

impl MocConfig {
    /// Load from `path`, or return the default if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, MocError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| MocError::IoError(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(MocError::DeserializationError(format!(
                "Config size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| MocError::IoError(format!("Failed to read config: {}", e)))?;
        let config = Self::from_toml_str(&text)?;

        tracing::info!(
            people = config.people.len(),
            disciplines = config.disciplines.len(),
            "Loaded config from {}",
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, MocError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| MocError::DeserializationError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Discipline ids become approval row ids, so they must be unique.
    pub fn validate(&self) -> Result<(), MocError> {
        let mut seen = BTreeSet::new();
        for discipline in &self.disciplines {
            let id = discipline.id.as_str();
            if id.trim().is_empty() || id.len() > MAX_FIELD_LENGTH {
                return Err(MocError::DeserializationError(format!(
                    "Invalid discipline id '{}'",
                    id
                )));
            }
            if !seen.insert(id) {
                return Err(MocError::DeserializationError(format!(
                    "Duplicate discipline id '{}'",
                    id
                )));
            }
        }

        if let Some(person) = self.people.iter().find(|p| p.id.as_str().trim().is_empty()) {
            return Err(MocError::DeserializationError(format!(
                "Person '{}' has an empty id",
                person.name
            )));
        }

        Ok(())
    }

    /// Person directory built from `[[people]]`.
    #[must_use]
    pub fn directory(&self) -> InMemoryDirectory {
        InMemoryDirectory::with_people(self.people.iter().cloned())
    }

    /// Discipline catalog in file order.
    #[must_use]
    pub fn catalog(&self) -> &[Discipline] {
        &self.disciplines
    }
}

// =============================================================================
// TESTS
// =============================================================================
