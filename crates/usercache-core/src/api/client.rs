//! Client for the remote user collection endpoint.

use reqwest::Client;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::models::UserRecord;

use super::ApiError;

/// Client for the user collection endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct UserApiClient {
    client: Client,
    endpoint: String,
}

impl UserApiClient {
    /// Create a new client. No retries are made and no timeout is set unless
    /// the config asks for one.
    pub fn new(config: &FetcherConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Fetch the full user collection in one request
    pub async fn fetch_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        debug!(url = %self.endpoint, "Fetching users");

        let response = self.client.get(&self.endpoint).send().await?;
        let response = Self::check_response(response).await?;

        let text = response.text().await?;
        let users: Vec<UserRecord> =
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;

        debug!(count = users.len(), "Users response parsed");
        Ok(users)
    }
}
