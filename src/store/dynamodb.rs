//! DynamoDB-backed store for select-organisation sessions.
//!
//! This module provides the persistence layer for pending organisation
//! selections. Sessions are stored as a single JSON payload attribute keyed
//! by an opaque session key, with an `expires_at` attribute the table's TTL
//! configuration uses to evict abandoned sessions passively.
use aws_config::meta::region::RegionProviderChain;
use aws_config::Region;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as AwsDynamoDbClient;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::session::SelectOrganisationSession;

/// Partition key attribute.
const SESSION_KEY_ATTRIBUTE: &str = "session_key";
/// Attribute holding the camelCase JSON payload.
const PAYLOAD_ATTRIBUTE: &str = "payload";
/// TTL attribute, epoch seconds.
const EXPIRES_AT_ATTRIBUTE: &str = "expires_at";

/// Configuration for DynamoDB connection and table settings
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// AWS region (e.g., "eu-west-2")
    pub region: String,
    /// DynamoDB table name
    pub table_name: String,
    /// Endpoint override, for local development
    pub endpoint: Option<String>,
}

#[async_trait::async_trait]
pub trait DynamoDbOps: std::fmt::Debug + Send + Sync {
    async fn put_item(
        &self,
        input: aws_sdk_dynamodb::operation::put_item::PutItemInput,
    ) -> Result<
        aws_sdk_dynamodb::operation::put_item::PutItemOutput,
        SdkError<PutItemError>,
    >;

    async fn get_item(
        &self,
        input: aws_sdk_dynamodb::operation::get_item::GetItemInput,
    ) -> Result<
        aws_sdk_dynamodb::operation::get_item::GetItemOutput,
        SdkError<GetItemError>,
    >;

    async fn delete_item(
        &self,
        input: aws_sdk_dynamodb::operation::delete_item::DeleteItemInput,
    ) -> Result<
        aws_sdk_dynamodb::operation::delete_item::DeleteItemOutput,
        SdkError<DeleteItemError>,
    >;
}

#[async_trait::async_trait]
impl DynamoDbOps for AwsDynamoDbClient {
    async fn put_item(
        &self,
        input: aws_sdk_dynamodb::operation::put_item::PutItemInput,
    ) -> Result<
        aws_sdk_dynamodb::operation::put_item::PutItemOutput,
        SdkError<PutItemError>,
    > {
        self.put_item()
            .set_item(input.item().cloned())
            .set_table_name(input.table_name().map(|s| s.to_string()))
            .send()
            .await
    }

    async fn get_item(
        &self,
        input: aws_sdk_dynamodb::operation::get_item::GetItemInput,
    ) -> Result<
        aws_sdk_dynamodb::operation::get_item::GetItemOutput,
        SdkError<GetItemError>,
    > {
        self.get_item()
            .set_key(input.key().cloned())
            .set_table_name(input.table_name().map(|s| s.to_string()))
            .send()
            .await
    }

    async fn delete_item(
        &self,
        input: aws_sdk_dynamodb::operation::delete_item::DeleteItemInput,
    ) -> Result<
        aws_sdk_dynamodb::operation::delete_item::DeleteItemOutput,
        SdkError<DeleteItemError>,
    > {
        self.delete_item()
            .set_key(input.key().cloned())
            .set_table_name(input.table_name().map(|s| s.to_string()))
            .send()
            .await
    }
}

/// Store for pending select-organisation sessions.
///
/// Provides the three operations the flow needs: `store` (upsert),
/// `retrieve` (optional result) and `invalidate` (idempotent delete). The
/// client handles all AWS SDK interactions; callers never see DynamoDB
/// types.
pub struct SessionStore {
    client: Box<dyn DynamoDbOps>,
    config: SessionStoreConfig,
}

impl SessionStore {
    /// Creates a new session store backed by DynamoDB.
    ///
    /// # Arguments
    /// * `config` - Region, table name and optional endpoint override
    ///
    /// # Returns
    /// * `Result<Self>` - New store instance or error if initialization fails
    pub async fn new(config: SessionStoreConfig) -> Result<Self, Error> {
        let region_provider =
            RegionProviderChain::first_try(Region::new(config.region.clone()));
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        let client = match &config.endpoint {
            Some(endpoint) => {
                let conf = aws_sdk_dynamodb::config::Builder::from(&shared_config)
                    .endpoint_url(endpoint)
                    .build();
                AwsDynamoDbClient::from_conf(conf)
            }
            None => AwsDynamoDbClient::new(&shared_config),
        };

        Ok(Self {
            client: Box::new(client),
            config,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_ops(client: Box<dyn DynamoDbOps>, table_name: &str) -> Self {
        Self {
            client,
            config: SessionStoreConfig {
                region: "eu-west-2".to_string(),
                table_name: table_name.to_string(),
                endpoint: None,
            },
        }
    }

    /// Stores a session under the given key, replacing any existing entry.
    ///
    /// The session's expiry is written to the table's TTL attribute, so
    /// entries that are never explicitly invalidated expire passively.
    ///
    /// # Arguments
    /// * `session_key` - Opaque key identifying the session; must be non-empty
    /// * `session` - Session data to persist
    ///
    /// # Returns
    /// * `Result<()>` - Success or error if storage fails
    pub async fn store(
        &self,
        session_key: &str,
        session: &SelectOrganisationSession,
    ) -> Result<(), Error> {
        validate_session_key(session_key)?;

        let payload = serde_json::to_string(session)?;

        let mut item = HashMap::new();
        item.insert(
            SESSION_KEY_ATTRIBUTE.to_string(),
            AttributeValue::S(session_key.to_string()),
        );
        item.insert(PAYLOAD_ATTRIBUTE.to_string(), AttributeValue::S(payload));
        item.insert(
            EXPIRES_AT_ATTRIBUTE.to_string(),
            AttributeValue::N(session.expires.timestamp().to_string()),
        );

        let input = aws_sdk_dynamodb::operation::put_item::PutItemInput::builder()
            .table_name(&self.config.table_name)
            .set_item(Some(item))
            .build()
            .map_err(Error::BuildError)?;

        self.client
            .put_item(input)
            .await
            .map_err(Error::PutItemError)?;

        info!("Stored select-organisation session {}", session_key);
        Ok(())
    }

    /// Retrieves a session by key.
    ///
    /// Absence is a normal outcome, not an error: a key that was never
    /// stored, was invalidated, or has expired all return `None`. Expiry is
    /// checked here as well because DynamoDB removes TTL-expired items
    /// lazily.
    ///
    /// # Arguments
    /// * `session_key` - Key to look up; must be non-empty
    ///
    /// # Returns
    /// * `Result<Option<SelectOrganisationSession>>` - Session if present
    pub async fn retrieve(
        &self,
        session_key: &str,
    ) -> Result<Option<SelectOrganisationSession>, Error> {
        validate_session_key(session_key)?;

        let mut key = HashMap::new();
        key.insert(
            SESSION_KEY_ATTRIBUTE.to_string(),
            AttributeValue::S(session_key.to_string()),
        );

        let input = aws_sdk_dynamodb::operation::get_item::GetItemInput::builder()
            .table_name(&self.config.table_name)
            .set_key(Some(key))
            .build()
            .map_err(Error::BuildError)?;

        let output = self.client
            .get_item(input)
            .await
            .map_err(Error::GetItemError)?;

        let Some(item) = output.item else {
            return Ok(None);
        };

        let payload = item
            .get(PAYLOAD_ATTRIBUTE)
            .and_then(|av| av.as_s().ok())
            .ok_or_else(|| Error::ParseError(PAYLOAD_ATTRIBUTE.to_string()))?;

        let session: SelectOrganisationSession = serde_json::from_str(payload)?;
        if session.is_expired() {
            debug!("Session {} has expired; treating as absent", session_key);
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Deletes a session by key.
    ///
    /// Idempotent: invalidating an absent or already-invalidated key is a
    /// no-op, since selection and cancel may race to invalidate the same
    /// session.
    ///
    /// # Arguments
    /// * `session_key` - Key of the session to remove; must be non-empty
    ///
    /// # Returns
    /// * `Result<()>` - Success or error if deletion fails
    pub async fn invalidate(&self, session_key: &str) -> Result<(), Error> {
        validate_session_key(session_key)?;

        let mut key = HashMap::new();
        key.insert(
            SESSION_KEY_ATTRIBUTE.to_string(),
            AttributeValue::S(session_key.to_string()),
        );

        let input = aws_sdk_dynamodb::operation::delete_item::DeleteItemInput::builder()
            .table_name(&self.config.table_name)
            .set_key(Some(key))
            .build()
            .map_err(Error::BuildError)?;

        self.client
            .delete_item(input)
            .await
            .map_err(Error::DeleteItemError)?;

        info!("Invalidated select-organisation session {}", session_key);
        Ok(())
    }
}

fn validate_session_key(session_key: &str) -> Result<(), Error> {
    if session_key.is_empty() {
        return Err(Error::InvalidSessionKey);
    }
    Ok(())
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session key must not be empty")]
    InvalidSessionKey,
    #[error("Failed to build input: {0}")]
    BuildError(#[from] aws_sdk_dynamodb::error::BuildError),
    #[error("Failed to put item: {0}")]
    PutItemError(SdkError<PutItemError>),
    #[error("Failed to get item: {0}")]
    GetItemError(SdkError<GetItemError>),
    #[error("Failed to delete item: {0}")]
    DeleteItemError(SdkError<DeleteItemError>),
    #[error("Failed to serialise session payload: {0}")]
    PayloadError(#[from] serde_json::Error),
    #[error("Failed to parse {0} from DynamoDB response")]
    ParseError(String),
}


#[cfg(test)]
mod tests {
    use super::testing::InMemoryDynamo;
    use super::*;
    use crate::session::{OrganisationOption, SelectOrganisationPrompt};
    use chrono::Duration;
    use uuid::Uuid;

    fn store() -> SessionStore {
        SessionStore::with_ops(Box::new(InMemoryDynamo::default()), "selection-sessions")
    }

    fn session(ttl_secs: i64) -> SelectOrganisationSession {
        SelectOrganisationSession::new(
            "svc-a".to_string(),
            Uuid::new_v4(),
            SelectOrganisationPrompt::default(),
            vec![
                OrganisationOption {
                    id: Uuid::new_v4(),
                    name: "Org A".to_string(),
                },
                OrganisationOption {
                    id: Uuid::new_v4(),
                    name: "Org B".to_string(),
                },
            ],
            true,
            "https://relying.example/callback".to_string(),
            Duration::seconds(ttl_secs),
        )
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let store = store();
        let session = session(600);

        store.store("key-1", &session).await.unwrap();
        let retrieved = store.retrieve("key-1").await.unwrap();

        assert_eq!(retrieved, Some(session));
    }

    #[tokio::test]
    async fn store_replaces_existing_entry() {
        let store = store();
        let first = session(600);
        let mut second = session(600);
        second.client_id = "svc-b".to_string();

        store.store("key-1", &first).await.unwrap();
        store.store("key-1", &second).await.unwrap();

        let retrieved = store.retrieve("key-1").await.unwrap().unwrap();
        assert_eq!(retrieved.client_id, "svc-b");
    }

    #[tokio::test]
    async fn retrieve_of_unknown_key_is_absent() {
        let store = store();
        assert_eq!(store.retrieve("never-stored").await.unwrap(), None);
    }

    #[tokio::test]
    async fn retrieve_of_expired_session_is_absent() {
        let store = store();
        store.store("key-1", &session(-5)).await.unwrap();

        assert_eq!(store.retrieve("key-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let store = store();
        store.store("key-1", &session(600)).await.unwrap();

        store.invalidate("key-1").await.unwrap();
        store.invalidate("key-1").await.unwrap();

        assert_eq!(store.retrieve("key-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_session_key_is_rejected() {
        let store = store();

        assert!(matches!(
            store.store("", &session(600)).await,
            Err(Error::InvalidSessionKey)
        ));
        assert!(matches!(
            store.retrieve("").await,
            Err(Error::InvalidSessionKey)
        ));
        assert!(matches!(
            store.invalidate("").await,
            Err(Error::InvalidSessionKey)
        ));
    }

    #[tokio::test]
    async fn ttl_attribute_carries_session_expiry() {
        // SessionStore owns a Box; keep a second handle through Arc.
        let ops = std::sync::Arc::new(InMemoryDynamo::default());
        let store =
            SessionStore::with_ops(Box::new(ops.clone()), "selection-sessions");
        let session = session(600);
        store.store("key-1", &session).await.unwrap();

        let item = ops.stored_item("key-1").unwrap();
        let expires_at = item
            .get(EXPIRES_AT_ATTRIBUTE)
            .and_then(|av| av.as_n().ok())
            .unwrap();
        assert_eq!(expires_at, &session.expires.timestamp().to_string());
    }
}
