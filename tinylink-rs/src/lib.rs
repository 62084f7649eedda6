//! # tinylink-rs
//!
//! A Rust client library for the tinylink URL shortener API.
//!
//! This crate holds the wire types shared between the tinylink service and its
//! clients, plus a small HTTP client to create, list and delete short links.
//! Every call that touches owned links needs an API key configured on the server.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), tinylink_rs::TinylinkApiError> {
//! use tinylink_rs::TinylinkApi;
//!
//! let api = TinylinkApi::new("your-api-key-here".to_string())
//!     .with_url("http://localhost:8080");
//!
//! let created = api.create_short_url("https://example.com/very/long/url").await?;
//! println!("Shortened URL: {}", created.short_url);
//! # Ok(())
//! # }
//! ```
//!

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request payload for creating a shortened URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    /// The target URL to be shortened. Stored as given.
    ///
    /// Optional on the wire so the service can answer a missing or `null`
    /// url with its own validation error.
    pub url: Option<String>,
}

/// A stored short link as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    /// The short code, case-sensitive.
    pub code: String,
    /// The target exactly as it was submitted.
    pub target_url: String,
    /// Identity of the creator, `None` for anonymous links.
    pub owner_id: Option<String>,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Response from the service after creating a shortened URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedLinkResponse {
    /// The unique code of the shortened link.
    pub code: String,
    /// The complete shortened URL.
    pub short_url: String,
    /// The persisted record.
    pub link: LinkInfo,
}

impl CreatedLinkResponse {
    /// Creates a new `CreatedLinkResponse` for a stored link.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The base address (e.g., `https://tiny.example`)
    /// * `link` - The persisted record
    pub fn new(prefix: &str, link: LinkInfo) -> Self {
        Self {
            code: link.code.clone(),
            short_url: short_url(prefix, &link.code),
            link,
        }
    }
}

/// Click statistics for a single owned link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStatsResponse {
    pub link: LinkInfo,
    /// Most recent click timestamps, newest first.
    pub recent_clicks: Vec<DateTime<Utc>>,
}

/// Body returned by the service for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Joins a base address and a code into a short URL.
///
/// A trailing slash on `prefix` is ignored so `https://a.b/` and `https://a.b`
/// produce the same result.
pub fn short_url(prefix: &str, code: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), code)
}

/// A client for interacting with a tinylink service.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example() -> Result<(), tinylink_rs::TinylinkApiError> {
/// use tinylink_rs::TinylinkApi;
///
/// let api = TinylinkApi::new("your-api-key".to_string());
/// for link in api.list_links().await? {
///     println!("{} -> {} ({} clicks)", link.code, link.target_url, link.click_count);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TinylinkApi {
    url: String,
    key: String,
    client: reqwest::Client,
}

/// Errors that can occur when interacting with the tinylink API.
#[derive(Debug, Error)]
pub enum TinylinkApiError {
    /// An error occurred during API configuration (e.g., invalid URL parsing).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// An error occurred while sending the HTTP request or receiving the response.
    #[error("Request error: {0}")]
    RequestError(String),
    /// The service answered with a non-success status.
    #[error("Api error ({status}): {message}")]
    ApiError { status: u16, message: String },
    /// An error occurred while deserializing the API response.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl TinylinkApi {
    /// Creates a new `TinylinkApi` client against `http://localhost:8080`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tinylink_rs::TinylinkApi;
    ///
    /// let api = TinylinkApi::new("your-api-key".to_string());
    /// ```
    pub fn new(key: String) -> Self {
        Self {
            url: String::from("http://localhost:8080"),
            key,
            client: reqwest::Client::new(),
        }
    }

    /// Sets a custom API endpoint URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tinylink_rs::TinylinkApi;
    ///
    /// let api = TinylinkApi::new("your-api-key".to_string())
    ///     .with_url("https://tiny.example");
    /// ```
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.trim_end_matches('/').into();
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, TinylinkApiError> {
        Url::parse(&format!("{}{}", self.url, path))
            .map_err(|e| TinylinkApiError::ConfigurationError(e.to_string()))
    }

    /// Creates a shortened URL.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The API endpoint URL is invalid (`ConfigurationError`)
    /// - The HTTP request fails (`RequestError`)
    /// - The service rejects the request (`ApiError`)
    /// - The response cannot be deserialized (`DeserializationError`)
    pub async fn create_short_url(
        &self,
        original_link: &str,
    ) -> Result<CreatedLinkResponse, TinylinkApiError> {
        let resp = self
            .client
            .post(self.endpoint("/api/create")?)
            .header("Authorization", self.key.clone())
            .json(&CreateLinkRequest {
                url: Some(original_link.to_string()),
            })
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        parse_response(resp).await
    }

    /// Lists all links owned by the configured key, newest first.
    pub async fn list_links(&self) -> Result<Vec<LinkInfo>, TinylinkApiError> {
        let resp = self
            .client
            .get(self.endpoint("/api/links")?)
            .header("Authorization", self.key.clone())
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        parse_response(resp).await
    }

    /// Fetches click statistics of an owned link.
    pub async fn link_stats(&self, code: &str) -> Result<LinkStatsResponse, TinylinkApiError> {
        let resp = self
            .client
            .get(self.endpoint(&format!("/api/links/{code}"))?)
            .header("Authorization", self.key.clone())
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        parse_response(resp).await
    }

    /// Deletes an owned link.
    pub async fn delete_link(&self, code: &str) -> Result<(), TinylinkApiError> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("/api/links/{code}"))?)
            .header("Authorization", self.key.clone())
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        let _: serde::de::IgnoredAny = parse_response(resp).await?;

        Ok(())
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, TinylinkApiError> {
    let status = resp.status();

    if status != StatusCode::OK {
        let message = resp
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| status.to_string());

        return Err(TinylinkApiError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|e| TinylinkApiError::DeserializationError(e.to_string()))
}
