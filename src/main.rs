//! DfE Sign-in Select Organisation Service
//!
//! This is the main entry point for the Select Organisation Service. The
//! service lets an end-user of a relying application choose which of their
//! organisations to act for, and reports the outcome back with a digitally
//! signed callback.
//!
//! # Architecture
//! The service is built using:
//! - axum for the HTTP API
//! - DynamoDB for session storage (with passive TTL expiry)
//! - The organisations API for resolving a user's organisations
//! - RSA signatures over callback payloads
//!
//! # Flow
//! 1. A relying application posts a create-session request
//! 2. The service resolves the user's organisation options and stores a session
//! 3. The user is redirected to the selection UI
//! 4. The user selects an organisation (or cancels)
//! 5. The service posts a signed callback to the relying application
//! 6. The session is invalidated

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt;

use select_organisation_service::callback::CallbackClient;
use select_organisation_service::config::Config;
use select_organisation_service::http::{router, AppState};
use select_organisation_service::organisations::{
    OrganisationsApiConfig, OrganisationsClient,
};
use select_organisation_service::service::{
    SelectOrganisationService, SelectionConfig,
};
use select_organisation_service::signing::{PayloadSigner, SigningConfig};
use select_organisation_service::store::dynamodb::{
    SessionStore, SessionStoreConfig,
};

/// Initializes the logging system with appropriate configuration.
///
/// Sets up structured logging with timestamps and log levels using
/// the tracing framework.
///
/// # Returns
/// * `Result<()>` - Success or error if logging setup fails
fn setup_logging() -> anyhow::Result<()> {
    fmt()
        .with_max_level(Level::DEBUG)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Initializes and starts all service dependencies.
///
/// Sets up the following components:
/// - Payload signer (first, so bad key material aborts startup)
/// - DynamoDB-backed session store
/// - Organisations API client
/// - Callback client
/// - axum server with the selection endpoints
///
/// # Arguments
/// * `config` - Application configuration
///
/// # Returns
/// * `Result<()>` - Success or error if any service fails to start
async fn setup_services(config: Config) -> anyhow::Result<()> {
    let service_config = config.select_organisation();

    info!(
        "Initializing payload signer with key id: {}",
        service_config.signing.public_key_id
    );
    let signer = PayloadSigner::new(&SigningConfig {
        private_key_pem: service_config.signing.private_key_pem.clone(),
        public_key_id: service_config.signing.public_key_id.clone(),
        hash_algorithm: service_config.signing.hash_algorithm,
        padding: service_config.signing.padding,
    })
    .context("Failed to initialize payload signer")?;
    info!("Payload signer initialized successfully");

    info!(
        "Initializing session store with table: {}",
        service_config.dynamodb.table_name
    );
    let store = SessionStore::new(SessionStoreConfig {
        region: service_config.dynamodb.region.clone(),
        table_name: service_config.dynamodb.table_name.clone(),
        endpoint: service_config.dynamodb.endpoint.clone(),
    })
    .await
    .context("Failed to initialize session store")?;
    info!("Session store initialized successfully");

    info!(
        "Initializing organisations client with URL: {}",
        service_config.organisations.base_url
    );
    let organisations = OrganisationsClient::new(OrganisationsApiConfig {
        base_url: service_config.organisations.base_url.clone(),
        timeout_secs: service_config.organisations.timeout_secs,
    })
    .context("Failed to initialize organisations client")?;
    info!("Organisations client initialized successfully");

    let callbacks = CallbackClient::new(Arc::new(signer))
        .context("Failed to initialize callback client")?;

    let service = SelectOrganisationService::new(
        Arc::new(store),
        Arc::new(organisations),
        SelectionConfig {
            base_url: service_config.selection.base_url.clone(),
            session_ttl_secs: service_config.selection.session_ttl_secs,
        },
    );

    let app = router(AppState {
        service: Arc::new(service),
        callbacks: Arc::new(callbacks),
    });

    let addr = format!(
        "{}:{}",
        service_config.server.endpoint, service_config.server.port
    );
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Main entry point for the select-organisation service.
///
/// # Flow
/// 1. Initializes logging and configuration
/// 2. Sets up service dependencies (signer, store, organisations client)
/// 3. Starts the HTTP server
///
/// # Returns
/// * `Result<()>` - Success or error if service fails to start
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging()?;
    info!("Select Organisation Service starting up...");

    info!("Loading configuration...");
    let config = Config::new().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    setup_services(config).await
}
