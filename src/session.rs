use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Heading and hint text shown above the organisation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOrganisationPrompt {
    pub heading: String,
    pub hint: String,
}

impl Default for SelectOrganisationPrompt {
    fn default() -> Self {
        Self {
            heading: "Which organisation would you like to use?".to_string(),
            hint: "You are associated with more than one organisation.".to_string(),
        }
    }
}

/// A single organisation the user may choose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationOption {
    pub id: Uuid,
    pub name: String,
}

/// A pending organisation-selection request.
///
/// Created once by the create-session use case and never mutated; the
/// outcome of the flow is recorded as a callback, not a session update.
/// Serialised with camelCase property names for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOrganisationSession {
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub client_id: String,
    pub user_id: Uuid,
    pub prompt: SelectOrganisationPrompt,
    pub organisation_options: Vec<OrganisationOption>,
    pub allow_cancel: bool,
    pub callback_url: String,
}

impl SelectOrganisationSession {
    /// Creates a session stamped now, expiring after `ttl`.
    pub fn new(
        client_id: String,
        user_id: Uuid,
        prompt: SelectOrganisationPrompt,
        organisation_options: Vec<OrganisationOption>,
        allow_cancel: bool,
        callback_url: String,
        ttl: Duration,
    ) -> Self {
        let created = Utc::now();
        Self {
            created,
            expires: created + ttl,
            client_id,
            user_id,
            prompt,
            organisation_options,
            allow_cancel,
            callback_url,
        }
    }

    /// Check if the session has expired.
    ///
    /// The store consults this on retrieval: DynamoDB evicts TTL-expired
    /// items lazily, so an expired item can still be read back.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires
    }
}
