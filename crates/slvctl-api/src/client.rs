// Backend HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, the `Frontend-Version`
// header, and status/body handling. Endpoint groups (devices, automation,
// settings, health) are implemented as inherent methods in separate
// files to keep this module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::ValidationBody;
use crate::transport::{FRONTEND_VERSION, FRONTEND_VERSION_HEADER, TransportConfig};

/// Raw HTTP client for the slvCtrl+ backend.
///
/// Every request is built as `{base_url}{path}` and carries the
/// `Frontend-Version` header. Non-success statuses are turned into
/// [`Error::Http`]; HTTP 400 bodies with field errors become
/// [`Error::Validation`].
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    frontend_version: String,
}

impl BackendClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            frontend_version: transport.frontend_version.clone(),
        })
    }

    /// Create a client from a possibly-unset backend URL.
    ///
    /// Fails with [`Error::NoBackendConfigured`] before anything touches
    /// the network when the URL is missing or blank.
    pub fn from_configured(
        backend_url: Option<&str>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let raw = backend_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::NoBackendConfigured)?;
        Self::new(Url::parse(raw)?, transport)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            frontend_version: FRONTEND_VERSION.to_owned(),
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build `{base}{path}`; `path` must start with `/`.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(FRONTEND_VERSION_HEADER, &self.frontend_version)
    }

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.request(reqwest::Method::GET, url).send().await?;
        let body = Self::check_status(resp).await?;
        decode(&body)
    }

    /// Send a POST request with a JSON body, returning the raw response body.
    pub(crate) async fn post(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<String, Error> {
        debug!("POST {}", url);

        let resp = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await?;
        Self::check_status(resp).await
    }

    /// Send a PUT request with a JSON body, returning the raw response body.
    pub(crate) async fn put(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<String, Error> {
        debug!("PUT {}", url);

        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(body)
            .send()
            .await?;
        Self::check_status(resp).await
    }

    /// Send a DELETE request.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);

        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        Self::check_status(resp).await.map(|_| ())
    }

    /// Map the status code, returning the body text on success.
    async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        trace!(%status, "response received");

        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            if let Ok(parsed) = serde_json::from_str::<ValidationBody>(&body) {
                return Err(Error::Validation {
                    errors: parsed.into_errors(),
                });
            }
            return Err(http_error(status));
        }

        if !status.is_success() {
            return Err(http_error(status));
        }

        Ok(resp.text().await?)
    }
}

fn http_error(status: reqwest::StatusCode) -> Error {
    Error::Http {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("Unknown").to_owned(),
    }
}

/// Decode a JSON body, keeping a preview of the raw text on failure.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })
}
