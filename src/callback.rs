//! Signed callback delivery to relying applications.
//!
//! When a selection flow reaches a terminal event the service POSTs the
//! outcome to the session's callback URL. The payload is serialised to a
//! JSON string once, that exact string is signed, and the same string is
//! embedded verbatim in the body so the relying application can verify the
//! signature against the bytes it received.

use reqwest::Client;
use serde::Serialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::session::{OrganisationOption, SelectOrganisationSession};
use crate::signing::PayloadSigner;

/// Discriminator carried alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CallbackPayloadType {
    Selection,
    Cancel,
    SignOut,
    Error,
}

/// Terminal event of a selection flow.
///
/// All four events end the session: the caller invalidates it once the
/// callback has been delivered.
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    Selection { organisation: OrganisationOption },
    Cancel,
    SignOut,
    Error { message: String },
}

impl CallbackEvent {
    pub fn payload_type(&self) -> CallbackPayloadType {
        match self {
            CallbackEvent::Selection { .. } => CallbackPayloadType::Selection,
            CallbackEvent::Cancel => CallbackPayloadType::Cancel,
            CallbackEvent::SignOut => CallbackPayloadType::SignOut,
            CallbackEvent::Error { .. } => CallbackPayloadType::Error,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectionPayload<'a> {
    user_id: Uuid,
    organisation_id: Uuid,
    organisation_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserPayload {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload<'a> {
    user_id: Uuid,
    message: &'a str,
}

/// Wire body of a callback POST.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackBody<'a> {
    payload_type: CallbackPayloadType,
    payload_data: &'a RawValue,
    digital_signature: &'a str,
    public_key_id: &'a str,
}

fn payload_json(
    event: &CallbackEvent,
    session: &SelectOrganisationSession,
) -> Result<String, serde_json::Error> {
    match event {
        CallbackEvent::Selection { organisation } => {
            serde_json::to_string(&SelectionPayload {
                user_id: session.user_id,
                organisation_id: organisation.id,
                organisation_name: &organisation.name,
            })
        }
        CallbackEvent::Cancel | CallbackEvent::SignOut => {
            serde_json::to_string(&UserPayload {
                user_id: session.user_id,
            })
        }
        CallbackEvent::Error { message } => serde_json::to_string(&ErrorPayload {
            user_id: session.user_id,
            message,
        }),
    }
}

/// Posts signed terminal events to relying applications.
pub struct CallbackClient {
    client: Client,
    signer: Arc<PayloadSigner>,
}

impl CallbackClient {
    pub fn new(signer: Arc<PayloadSigner>) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, signer })
    }

    /// Signs and delivers the event to the session's callback URL.
    ///
    /// A non-2xx response from the relying application is an error; no
    /// retry is attempted.
    pub async fn send(
        &self,
        session: &SelectOrganisationSession,
        event: &CallbackEvent,
    ) -> Result<(), Error> {
        let payload = payload_json(event, session)?;
        let signature = self.signer.sign(&payload)?;
        let payload_data = RawValue::from_string(payload)?;

        let body = CallbackBody {
            payload_type: event.payload_type(),
            payload_data: &payload_data,
            digital_signature: &signature.signature,
            public_key_id: &signature.key_id,
        };

        let response = self.client
            .post(&session.callback_url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            error!(
                "Callback to {} rejected with status {}",
                session.callback_url,
                response.status()
            );
            return Err(Error::Rejected(response.status().as_u16()));
        }

        info!(
            "Delivered {:?} callback for client {}",
            event.payload_type(),
            session.client_id
        );

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to serialise callback payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Signing(#[from] crate::signing::Error),

    #[error("Callback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Relying application rejected callback with status {0}")]
    Rejected(u16),
}
