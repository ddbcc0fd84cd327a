//! Identity-toolkit style REST provider
//!
//! Talks to `{base-url}/v1/accounts:*` endpoints with the project API key.
//! The identity handed out is cached so `current` can report it.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Identity, IdentityError, IdentityOrigin, IdentityProvider};
use crate::config::IdentityConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    local_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// REST identity provider
pub struct HttpIdentityProvider {
    base_url: String,
    api_key: String,
    http: Client,
    active: Mutex<Option<Identity>>,
}

impl HttpIdentityProvider {
    /// Create a provider from configuration
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        debug!(base_url = %config.base_url, "HttpIdentityProvider::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(IdentityError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
            active: Mutex::new(None),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/accounts:{}?key={}", self.base_url, method, self.api_key)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, IdentityError> {
        debug!(%method, "HttpIdentityProvider::post: called");
        let response = self.http.post(self.endpoint(method)).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            debug!(status = status.as_u16(), %message, "HttpIdentityProvider::post: error response");
            return Err(IdentityError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))
    }

    /// Resolve the user id an id token belongs to
    async fn lookup_user_id(&self, id_token: &str) -> Result<String, IdentityError> {
        debug!("HttpIdentityProvider::lookup_user_id: called");
        let lookup: LookupResponse = self.post("lookup", json!({ "idToken": id_token })).await?;
        lookup
            .users
            .into_iter()
            .next()
            .map(|u| u.local_id)
            .ok_or_else(|| IdentityError::InvalidResponse("lookup returned no users".to_string()))
    }

    fn remember(&self, identity: &Identity) {
        if let Ok(mut active) = self.active.lock() {
            *active = Some(identity.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current(&self) -> Option<Identity> {
        debug!("HttpIdentityProvider::current: called");
        self.active.lock().ok().and_then(|a| a.clone())
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        debug!("HttpIdentityProvider::sign_in_anonymously: called");
        let response: SignInResponse = self.post("signUp", json!({ "returnSecureToken": true })).await?;
        let user_id = response
            .local_id
            .ok_or_else(|| IdentityError::InvalidResponse("signUp response missing localId".to_string()))?;

        let identity = Identity::new(user_id, IdentityOrigin::Anonymous).with_credential(response.id_token);
        self.remember(&identity);
        Ok(identity)
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<Identity, IdentityError> {
        debug!("HttpIdentityProvider::sign_in_with_token: called");
        let response: SignInResponse = self
            .post(
                "signInWithCustomToken",
                json!({ "token": token, "returnSecureToken": true }),
            )
            .await?;

        // Custom-token responses usually omit the user id
        let user_id = match response.local_id {
            Some(id) => id,
            None => self.lookup_user_id(&response.id_token).await?,
        };

        let identity = Identity::new(user_id, IdentityOrigin::Token).with_credential(response.id_token);
        self.remember(&identity);
        Ok(identity)
    }
}
