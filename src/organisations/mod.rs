//! Organisation lookup for the select-organisation flow.
//!
//! This module resolves which organisations a given user may choose from,
//! by querying the organisations API. The create-session use case consumes
//! the lookup through the [`OrganisationLookup`] trait; the HTTP client
//! here is the production implementation.
//!
//! @copyright 2025

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::session::OrganisationOption;

/// Configuration for the organisations API client
#[derive(Debug, Clone)]
pub struct OrganisationsApiConfig {
    /// Base URL of the organisations API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// An organisation as returned by the organisations API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
}

/// Restricts which of the user's organisations are offered.
///
/// An empty id list means every organisation the user is associated with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationFilter {
    #[serde(default)]
    pub organisation_ids: Vec<Uuid>,
}

/// How much organisation detail goes into an option's display name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrganisationDetailLevel {
    #[default]
    Standard,
    Extended,
}

/// Builds the option presented to the user for one organisation.
pub fn option_from_organisation(
    organisation: &Organisation,
    detail_level: OrganisationDetailLevel,
) -> OrganisationOption {
    let name = match (detail_level, &organisation.category) {
        (OrganisationDetailLevel::Extended, Some(category)) => {
            format!("{} ({})", organisation.name, category)
        }
        _ => organisation.name.clone(),
    };
    OrganisationOption {
        id: organisation.id,
        name,
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait OrganisationLookup: Send + Sync {
    /// Resolves the organisations the user may choose from, per the filter.
    async fn organisations_for_user(
        &self,
        user_id: Uuid,
        filter: &OrganisationFilter,
    ) -> Result<Vec<Organisation>, Error>;
}

/// HTTP client for the organisations API.
pub struct OrganisationsClient {
    client: Client,
    base_url: String,
}

impl OrganisationsClient {
    pub fn new(config: OrganisationsApiConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }
}

#[async_trait::async_trait]
impl OrganisationLookup for OrganisationsClient {
    async fn organisations_for_user(
        &self,
        user_id: Uuid,
        filter: &OrganisationFilter,
    ) -> Result<Vec<Organisation>, Error> {
        let url = format!("{}/users/{}/organisations", self.base_url, user_id);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            error!(
                "Organisation lookup failed for user {}: {}",
                user_id,
                response.status()
            );
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }

        let mut organisations: Vec<Organisation> = response.json().await?;
        if !filter.organisation_ids.is_empty() {
            organisations.retain(|org| filter.organisation_ids.contains(&org.id));
        }

        info!(
            "Resolved {} organisation(s) for user {}",
            organisations.len(),
            user_id
        );

        Ok(organisations)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Organisations API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Organisations API returned status {0}")]
    UnexpectedStatus(u16),
}
