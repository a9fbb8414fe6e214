/// HTTP layer of the session client.
///
/// `AuthApi` is the capability the session manager drives for login and
/// refresh; `HttpAuthApi` implements it over reqwest with an explicit
/// request timeout. `ApiClient` serves ordinary feature calls, attaching the
/// bearer header automatically and routing stray `401`s into the session's
/// logout path.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::error::SessionError;
use crate::session::manager::SessionManager;
use crate::session::token_store::UserProfile;

/// A successful authentication exchange: the new token plus the user
/// snapshot to persist next to it.
#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

/// Server interactions the session manager depends on.
#[async_trait]
pub trait AuthApi: Send + Sync + 'static {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, SessionError>;
    async fn refresh(&self, token: &str) -> Result<AuthPayload, SessionError>;
}

#[derive(Deserialize)]
struct AuthResponseBody {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<UserProfile>,
    message: Option<String>,
}

fn payload_from_body(body: AuthResponseBody) -> Result<AuthPayload, SessionError> {
    match (body.success, body.token, body.user) {
        (true, Some(token), Some(user)) => Ok(AuthPayload { token, user }),
        _ => Err(SessionError::Rejected {
            status: 200,
            message: body
                .message
                .unwrap_or_else(|| "Invalid auth response format".to_string()),
        }),
    }
}

async fn rejection_message(response: reqwest::Response) -> String {
    response
        .json::<AuthResponseBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| "Request rejected".to_string())
}

/// `AuthApi` over HTTP.
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, SessionError> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(SessionError::Rejected {
                status,
                message: rejection_message(response).await,
            });
        }

        let body: AuthResponseBody = response
            .json()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;
        payload_from_body(body)
    }

    async fn refresh(&self, token: &str) -> Result<AuthPayload, SessionError> {
        let response = self
            .http
            .post(format!("{}/auth/refresh-token", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 || status == 404 {
            // The server rejected the token itself: fatal for the session.
            return Err(SessionError::Unauthorized(rejection_message(response).await));
        }
        if !response.status().is_success() {
            return Err(SessionError::Rejected {
                status,
                message: rejection_message(response).await,
            });
        }

        let body: AuthResponseBody = response
            .json()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;
        payload_from_body(body)
    }
}

/// Shared HTTP client for feature calls (client registry, checklists).
///
/// The bearer header is attached from the token store on every request, so
/// it disappears as soon as logout clears the store. A `401` from any of
/// these endpoints triggers the session's logout path unless a refresh is
/// already in flight.
pub struct ApiClient<A: AuthApi> {
    http: reqwest::Client,
    base_url: String,
    session: SessionManager<A>,
}

impl<A: AuthApi> ApiClient<A> {
    pub fn new(
        base_url: impl Into<String>,
        session: SessionManager<A>,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            session,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.http.post(format!("{}{}", self.base_url, path)).json(body);
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.http.put(format!("{}{}", self.base_url, path)).json(body);
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))
    }

    pub async fn delete(&self, path: &str) -> Result<(), SessionError> {
        let request = self.http.delete(format!("{}{}", self.base_url, path));
        self.execute(request).await?;
        Ok(())
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SessionError> {
        let request = match self.session.store().token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 {
            self.session.handle_unauthorized().await;
            return Err(SessionError::Unauthorized(
                rejection_message(response).await,
            ));
        }
        if !response.status().is_success() {
            return Err(SessionError::Rejected {
                status,
                message: rejection_message(response).await,
            });
        }

        Ok(response)
    }
}
