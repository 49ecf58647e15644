//! HTTP client for the admin panel's export API.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use woo_porter_admin::routes::api::exports::TokenResponse;
use woo_porter_core::BatchResponse;

use crate::driver::BatchClient;

/// Errors talking to the admin panel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("login rejected: check the access key")]
    LoginRejected,

    #[error("the access key does not have the export capability")]
    Forbidden,

    #[error("unexpected HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Unexpected(String),
}

/// Session-holding client for one export run.
pub struct HttpBatchClient {
    http: reqwest::Client,
    base_url: Url,
    csrf_token: String,
}

impl HttpBatchClient {
    /// Sign in with the access key and fetch the session's CSRF token.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the panel is unreachable, rejects the key,
    /// or the key lacks the export capability.
    pub async fn connect(base_url: &str, access_key: &SecretString) -> Result<Self, TransportError> {
        let base_url = panel_url(base_url)?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("wpx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let login = http
            .post(base_url.join("auth/login")?)
            .form(&[("access_key", access_key.expose_secret())])
            .send()
            .await?;
        if login.status() == StatusCode::UNAUTHORIZED {
            return Err(TransportError::LoginRejected);
        }
        if !login.status().is_success() {
            return Err(status_error(login).await);
        }

        let token = http.get(base_url.join("api/exports/token")?).send().await?;
        match token.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN => return Err(TransportError::Forbidden),
            StatusCode::UNAUTHORIZED => return Err(TransportError::LoginRejected),
            _ => return Err(status_error(token).await),
        }
        let TokenResponse { token } = token.json().await?;

        tracing::info!(base_url = %base_url, "Signed in to admin panel");

        Ok(Self {
            http,
            base_url,
            csrf_token: token,
        })
    }
}

/// Parse the panel's base URL, keeping any path prefix.
///
/// Endpoints are joined relative to the result, so the path always ends in `/`.
fn panel_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn status_error(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::Status { status, body }
}

#[async_trait]
impl BatchClient for HttpBatchClient {
    async fn fetch_batch(&self, offset: u64) -> Result<BatchResponse, TransportError> {
        let response = self
            .http
            .post(self.base_url.join("api/exports/customers/batch")?)
            .header("X-CSRF-Token", &self.csrf_token)
            .form(&[("offset", offset.to_string())])
            .send()
            .await?;

        // Failure envelopes come with 4xx/5xx statuses; only a body that is
        // not an envelope is a transport problem.
        let status = response.status().as_u16();
        let body = response.text().await?;
        serde_json::from_str::<BatchResponse>(&body)
            .map_err(|_| TransportError::Status { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_url_keeps_path_prefix() {
        let base = panel_url("https://shop.example.com/porter").unwrap();

        assert_eq!(
            base.join("api/exports/customers/batch").unwrap().as_str(),
            "https://shop.example.com/porter/api/exports/customers/batch"
        );
        assert_eq!(
            panel_url("https://shop.example.com/porter/").unwrap(),
            base
        );
    }

    #[test]
    fn test_panel_url_at_root() {
        let base = panel_url("http://127.0.0.1:3001").unwrap();

        assert_eq!(
            base.join("auth/login").unwrap().as_str(),
            "http://127.0.0.1:3001/auth/login"
        );
    }

    #[test]
    fn test_panel_url_rejects_garbage() {
        assert!(panel_url("not a url").is_err());
    }
}
