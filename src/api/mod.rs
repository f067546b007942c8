//! HTTP plumbing shared by the auth, upload and quota clients.
//!
//! Every backend call goes through [`ApiClient`] so that status handling is
//! uniform: a 2xx response is handed back to the caller, a non-2xx response
//! carrying a JSON `message` becomes [`AppError::ServiceError`], and anything
//! else becomes a [`NetworkError`].

use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{AppError, NetworkError};

pub const LOGIN_PATH: &str = "auth/login";
pub const REGISTER_PATH: &str = "auth/register";
pub const UPLOAD_PATH: &str = "tools/upload";
pub const SNAPSHOT_PATH: &str = "account/snapshot";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Url::join drops the last segment unless the path ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::InternalError(format!("HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, AppError> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let res = self.client.post(url).json(body).send().await?;
        Self::check_status(res).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        form: multipart::Form,
        token: &str,
    ) -> Result<Response, AppError> {
        let url = self.endpoint(path)?;
        debug!("POST (multipart) {}", url);
        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        Self::check_status(res).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, AppError> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let res = self.client.get(url).bearer_auth(token).send().await?;
        let res = Self::check_status(res).await?;
        read_json(res).await
    }

    async fn check_status(res: Response) -> Result<Response, AppError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { message: Some(message) }) if !message.trim().is_empty() => {
                warn!("Request rejected with {}: {}", status, message);
                Err(AppError::ServiceError {
                    status: status.as_u16(),
                    message,
                })
            }
            _ => {
                warn!("Request failed with {} and no readable message", status);
                Err(NetworkError::Status(status.as_u16()).into())
            }
        }
    }
}

/// Decode a successful response body, treating garbage as a network failure.
pub async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, AppError> {
    let body = res.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| NetworkError::MalformedResponse(e.to_string()).into())
}
