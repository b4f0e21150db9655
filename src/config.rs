/// Configuration Module
///
/// Provides configuration management for the Select Organisation Service.
/// Handles loading and parsing of YAML configuration files and environment
/// variables, and validates the result at startup so a misconfigured
/// service never begins accepting requests.
///
/// # Copyright
/// Copyright (c) 2025 Crown Copyright (Department for Education)
///
/// # License
/// Licensed under the MIT license.
/// Please see the LICENSE file in the root directory for details.

use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::signing::{HashAlgorithm, PaddingMode};

/// Application metadata configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct Application {
    /// Name of the application
    pub name: String,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server endpoint
    pub endpoint: String,
    /// Server port
    pub port: u16,
}

/// Selection flow configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SelectionConfig {
    /// Public base URL of this service, embedded in redirect URLs
    pub base_url: String,
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,
}

/// DynamoDB configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DynamoDbConfig {
    /// DynamoDB table name
    pub table_name: String,
    /// AWS region
    pub region: String,
    /// DynamoDB endpoint (optional, for local development)
    pub endpoint: Option<String>,
}

/// Organisations API configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrganisationsConfig {
    /// Base URL of the organisations API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Callback signing configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SigningConfig {
    /// PEM-encoded RSA private key
    pub private_key_pem: String,
    /// Identifier of the public key relying applications verify with
    pub public_key_id: String,
    /// Digest algorithm (sha256, sha384 or sha512)
    pub hash_algorithm: HashAlgorithm,
    /// Padding mode (pkcs1v15 or pss)
    pub padding: PaddingMode,
}

/// Select-organisation service configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct SelectOrganisationConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Selection flow configuration
    pub selection: SelectionConfig,
    /// DynamoDB configuration
    pub dynamodb: DynamoDbConfig,
    /// Organisations API configuration
    pub organisations: OrganisationsConfig,
    /// Callback signing configuration
    pub signing: SigningConfig,
}

/// Application configuration settings
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Application metadata
    pub application: Application,
    /// Select-organisation service configuration
    pub select_organisation: SelectOrganisationConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config value: {0}")]
    InvalidConfig(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Config {
    /// Creates a new Config instance by loading and merging configuration
    /// from multiple sources.
    ///
    /// # Configuration Sources
    /// Configuration is loaded in the following order (later sources
    /// override earlier ones):
    /// 1. Base configuration (`config/application.yml`)
    /// 2. Environment variables (prefixed with `APP_`, `__`-separated)
    ///
    /// # Errors
    /// Returns a `ConfigError` if:
    /// - Required configuration files cannot be read
    /// - Configuration values cannot be parsed
    /// - A value fails validation
    pub fn new() -> Result<Self, ConfigError> {
        let builder = ConfigFile::builder()
            .add_source(File::with_name("config/application.yml"))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        let config: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the select-organisation service configuration.
    pub fn select_organisation(&self) -> &SelectOrganisationConfig {
        &self.select_organisation
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let service = &self.select_organisation;

        if Url::parse(&service.selection.base_url).is_err() {
            return Err(ConfigError::InvalidConfig(
                "selection.base_url must be an absolute URL".to_string(),
            ));
        }
        if service.selection.session_ttl_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "selection.session_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if service.dynamodb.table_name.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "dynamodb.table_name must not be empty".to_string(),
            ));
        }
        if Url::parse(&service.organisations.base_url).is_err() {
            return Err(ConfigError::InvalidConfig(
                "organisations.base_url must be an absolute URL".to_string(),
            ));
        }
        if service.signing.public_key_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "signing.public_key_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
