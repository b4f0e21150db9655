//! Use cases for the select-organisation flow.
//!
//! `SelectOrganisationService` owns the session store and the organisation
//! lookup, and implements the three operations the web surface needs:
//! create a session (validate, resolve options, persist, build the redirect
//! URL), retrieve a session, invalidate a session.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::organisations::{
    option_from_organisation, OrganisationDetailLevel, OrganisationFilter,
    OrganisationLookup,
};
use crate::session::{SelectOrganisationPrompt, SelectOrganisationSession};
use crate::store::dynamodb::{self, SessionStore};

/// Configuration for the selection flow
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Public base URL of this service, used to build redirect URLs
    pub base_url: String,
    /// Session lifetime in seconds
    pub session_ttl_secs: u64,
}

/// Request to start a selection flow on behalf of a relying application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub callback_url: String,
    pub client_id: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub prompt: Option<SelectOrganisationPrompt>,
    #[serde(default)]
    pub detail_level: OrganisationDetailLevel,
    #[serde(default)]
    pub filter: OrganisationFilter,
    #[serde(default = "default_allow_cancel")]
    pub allow_cancel: bool,
}

fn default_allow_cancel() -> bool {
    true
}

/// Outcome of creating a session.
///
/// `has_options` is false when the filtered option list came back empty,
/// letting the caller skip the redirect entirely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub request_id: Uuid,
    pub has_options: bool,
    pub url: String,
}

/// Implementation of the select-organisation use cases.
pub struct SelectOrganisationService {
    store: Arc<SessionStore>,
    organisations: Arc<dyn OrganisationLookup>,
    config: SelectionConfig,
}

impl SelectOrganisationService {
    pub fn new(
        store: Arc<SessionStore>,
        organisations: Arc<dyn OrganisationLookup>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            store,
            organisations,
            config,
        }
    }

    /// Creates a selection session and returns the redirect URL.
    ///
    /// Validation failures surface as [`Error::InvalidRequest`],
    /// distinguishable from lookup and storage failures.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, Error> {
        validate_request(&request)?;

        debug!(
            "Resolving organisations for user {} (client {})",
            request.user_id, request.client_id
        );
        let organisations = self
            .organisations
            .organisations_for_user(request.user_id, &request.filter)
            .await?;

        let options: Vec<_> = organisations
            .iter()
            .map(|org| option_from_organisation(org, request.detail_level))
            .collect();
        let has_options = !options.is_empty();

        let session_key = Uuid::new_v4().simple().to_string();
        let request_id = Uuid::new_v4();

        let session = SelectOrganisationSession::new(
            request.client_id.clone(),
            request.user_id,
            request.prompt.unwrap_or_default(),
            options,
            request.allow_cancel,
            request.callback_url,
            Duration::seconds(self.config.session_ttl_secs as i64),
        );

        self.store.store(&session_key, &session).await?;

        let url = format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            request.client_id,
            session_key
        );

        info!(
            "Created select-organisation session for client {} (request {})",
            request.client_id, request_id
        );

        Ok(CreateSessionResponse {
            request_id,
            has_options,
            url,
        })
    }

    /// Looks up a session by key; absence is a normal outcome.
    pub async fn retrieve_session(
        &self,
        session_key: &str,
    ) -> Result<Option<SelectOrganisationSession>, Error> {
        Ok(self.store.retrieve(session_key).await?)
    }

    /// Removes a session; invalidating an absent key is a no-op.
    pub async fn invalidate_session(&self, session_key: &str) -> Result<(), Error> {
        Ok(self.store.invalidate(session_key).await?)
    }
}

fn validate_request(request: &CreateSessionRequest) -> Result<(), Error> {
    if request.client_id.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "clientId must not be empty".to_string(),
        ));
    }

    match Url::parse(&request.callback_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(Error::InvalidRequest(
            "callbackUrl must be an absolute http(s) URL".to_string(),
        )),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] dynamodb::Error),

    #[error(transparent)]
    Organisations(#[from] crate::organisations::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organisations::{MockOrganisationLookup, Organisation};
    use crate::store::dynamodb::testing::InMemoryDynamo;

    fn service_with(
        lookup: MockOrganisationLookup,
    ) -> (SelectOrganisationService, Arc<InMemoryDynamo>) {
        let ops = Arc::new(InMemoryDynamo::default());
        let store = Arc::new(SessionStore::with_ops(
            Box::new(ops.clone()),
            "selection-sessions",
        ));
        let service = SelectOrganisationService::new(
            store,
            Arc::new(lookup),
            SelectionConfig {
                base_url: "https://signin.example/select-organisation".to_string(),
                session_ttl_secs: 600,
            },
        );
        (service, ops)
    }

    fn request(user_id: Uuid) -> CreateSessionRequest {
        CreateSessionRequest {
            callback_url: "https://relying.example/callback".to_string(),
            client_id: "svc-a".to_string(),
            user_id,
            prompt: None,
            detail_level: OrganisationDetailLevel::Standard,
            filter: OrganisationFilter::default(),
            allow_cancel: true,
        }
    }

    fn organisation(name: &str) -> Organisation {
        Organisation {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: None,
        }
    }

    #[test_log::test(tokio::test)]
    async fn create_session_persists_and_builds_redirect() {
        let user_id = Uuid::new_v4();
        let orgs = vec![organisation("Org A"), organisation("Org B")];
        let returned = orgs.clone();

        let mut lookup = MockOrganisationLookup::new();
        lookup
            .expect_organisations_for_user()
            .withf(move |uid, filter| {
                *uid == user_id && filter.organisation_ids.is_empty()
            })
            .returning(move |_, _| Ok(returned.clone()));

        let (service, _ops) = service_with(lookup);
        let response = service.create_session(request(user_id)).await.unwrap();

        assert!(response.has_options);
        let prefix = "https://signin.example/select-organisation/svc-a/";
        assert!(
            response.url.starts_with(&prefix),
            "unexpected url: {}",
            response.url
        );

        let session_key = response.url.rsplit('/').next().unwrap();
        let session = service
            .retrieve_session(session_key)
            .await
            .unwrap()
            .expect("session should have been stored");

        assert_eq!(session.client_id, "svc-a");
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.organisation_options.len(), 2);
        assert_eq!(session.organisation_options[0].name, "Org A");
        assert_eq!(
            session.prompt,
            SelectOrganisationPrompt::default(),
            "omitted prompt should be defaulted"
        );
        assert!(session.expires > session.created);
    }

    #[tokio::test]
    async fn has_options_is_false_for_empty_resolution() {
        let mut lookup = MockOrganisationLookup::new();
        lookup
            .expect_organisations_for_user()
            .returning(|_, _| Ok(Vec::new()));

        let (service, _ops) = service_with(lookup);
        let response = service
            .create_session(request(Uuid::new_v4()))
            .await
            .unwrap();

        assert!(!response.has_options);
    }

    #[tokio::test]
    async fn empty_client_id_is_invalid() {
        let (service, _ops) = service_with(MockOrganisationLookup::new());
        let mut bad = request(Uuid::new_v4());
        bad.client_id = "   ".to_string();

        let result = service.create_session(bad).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn malformed_callback_url_is_invalid() {
        let (service, _ops) = service_with(MockOrganisationLookup::new());

        for callback_url in ["not-a-url", "ftp://relying.example/cb", "/relative"] {
            let mut bad = request(Uuid::new_v4());
            bad.callback_url = callback_url.to_string();

            let result = service.create_session(bad).await;
            assert!(
                matches!(result, Err(Error::InvalidRequest(_))),
                "expected invalid request for {}",
                callback_url
            );
        }
    }

    #[tokio::test]
    async fn lookup_failure_is_not_a_validation_error() {
        let mut lookup = MockOrganisationLookup::new();
        lookup.expect_organisations_for_user().returning(|_, _| {
            Err(crate::organisations::Error::UnexpectedStatus(503))
        });

        let (service, _ops) = service_with(lookup);
        let result = service.create_session(request(Uuid::new_v4())).await;

        assert!(matches!(result, Err(Error::Organisations(_))));
    }

    #[tokio::test]
    async fn retrieve_and_invalidate_pass_through() {
        let mut lookup = MockOrganisationLookup::new();
        lookup
            .expect_organisations_for_user()
            .returning(|_, _| Ok(vec![]));

        let (service, _ops) = service_with(lookup);
        let response = service
            .create_session(request(Uuid::new_v4()))
            .await
            .unwrap();
        let session_key = response.url.rsplit('/').next().unwrap().to_string();

        assert!(service
            .retrieve_session(&session_key)
            .await
            .unwrap()
            .is_some());

        service.invalidate_session(&session_key).await.unwrap();
        service.invalidate_session(&session_key).await.unwrap();

        assert!(service
            .retrieve_session(&session_key)
            .await
            .unwrap()
            .is_none());
    }
}
