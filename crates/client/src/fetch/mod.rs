//! Network access for the worker.
//!
//! ### Requests
//! A [`Request`] carries the method, the absolute URL and the destination
//! (document, image, script, ...) the page asked for; the destination picks
//! the offline fallback when the network is unreachable.
//!
//! ### Responses
//! Any HTTP status is a [`Response`]: only transport failures are errors.
//! Each response is classified as [`ResponseType::Basic`] when it came from
//! the shell's origin and [`ResponseType::Cors`] otherwise; only basic
//! responses are eligible for the runtime cache.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: `max_body_bytes` from the app config (default 5MB)

pub mod url;

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};

use noor_core::{AppConfig, CachedResponse, Error};

pub use reqwest::Method;

pub use self::url::{UrlError, canonicalize, resolve, same_origin};

/// What the page will do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    #[default]
    Empty,
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Destination::Document),
            "image" => Ok(Destination::Image),
            "script" => Ok(Destination::Script),
            "style" => Ok(Destination::Style),
            "font" => Ok(Destination::Font),
            "" | "empty" => Ok(Destination::Empty),
            other => Err(Error::InvalidInput(format!("unknown destination: {other}"))),
        }
    }
}

/// A request the page wants answered.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: ::url::Url,
    pub destination: Destination,
}

impl Request {
    pub fn get(url: ::url::Url, destination: Destination) -> Self {
        Self { method: Method::GET, url, destination }
    }
}

/// Same-origin or cross-origin, as the fetch algorithm reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Basic,
    Cors,
    /// Synthesized locally (offline fallbacks).
    Default,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Default => "default",
        }
    }

    /// Read the label kept in a cache row. Rows written before the type was
    /// recorded are same-origin fills, so unknown labels read as basic.
    pub fn from_stored(label: &str) -> Self {
        match label {
            "cors" => ResponseType::Cors,
            "default" => ResponseType::Default,
            _ => ResponseType::Basic,
        }
    }
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: ::url::Url,
    pub status: u16,
    pub response_type: ResponseType,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// 2xx status.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Copy suitable for storing under `key`.
    pub fn to_cached(&self, key: &str) -> CachedResponse {
        let mut entry = CachedResponse::new(key, self.status, self.content_type.clone(), self.body.to_vec());
        entry.headers = self.headers.clone();
        entry.response_type = self.response_type.as_str().to_string();
        entry
    }

    /// Rebuild a response from a stored entry.
    pub fn from_cached(url: ::url::Url, entry: CachedResponse) -> Self {
        Self {
            url,
            status: entry.status,
            response_type: ResponseType::from_stored(&entry.response_type),
            content_type: entry.content_type,
            headers: entry.headers,
            body: Bytes::from(entry.body),
        }
    }
}

/// Anything that can answer a [`Request`] from the network.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "noor/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "noor/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_body_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// [`Network`] backed by reqwest.
pub struct HttpNetwork {
    http: Client,
    origin: ::url::Url,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a network client for pages served from `origin`.
    pub fn new(origin: ::url::Url, config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, origin, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url, e)))?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Network(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::Network(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let response_type = if same_origin(&self.origin, &final_url) { ResponseType::Basic } else { ResponseType::Cors };

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            url: final_url,
            status,
            response_type,
            content_type,
            headers: headers
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect(),
            body,
        })
    }
}
