// Async HTTP client for the Gravity portal API.
//
// Base path: portal/v1/
// Auth: HTTP Basic or Bearer token

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::logs::{self, LineStream};
use crate::transport::TransportConfig;

/// API prefix every portal serves its operator endpoints under.
pub const API_PREFIX: &str = "portal/v1";

// ── Error response shape from the portal ─────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<NestedError>,
}

#[derive(serde::Deserialize)]
struct NestedError {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for one portal endpoint.
///
/// All paths are relative to `{base}/portal/v1/`. Methods return decoded
/// JSON payloads; non-2xx responses become [`Error::Api`] carrying the
/// status code and the portal's message.
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PortalClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for `base_url` with its own `reqwest::Client`.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http, credentials)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Append `portal/v1/` unless the caller already supplied it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with(API_PREFIX) {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/{API_PREFIX}/"));
        }

        Ok(url)
    }

    /// The normalized API root (always ends in `portal/v1/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"accounts/a1/sites"`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");

        let resp = self.credentials.apply(self.http.get(url)).send().await?;
        self.handle_response(resp).await
    }

    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self
            .credentials
            .apply(self.http.get(url).query(params))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// GET with a pre-encoded query string (used for presence-encoded
    /// flags such as `?last&complete`).
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, Error> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        debug!("GET {url}");

        let resp = self.credentials.apply(self.http.get(url)).send().await?;
        self.handle_response(resp).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");

        let resp = self
            .credentials
            .apply(self.http.post(url).json(body))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    pub async fn post_no_response<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");

        let resp = self
            .credentials
            .apply(self.http.post(url).json(body))
            .send()
            .await?;
        self.handle_empty(resp).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("PUT {url}");

        let resp = self
            .credentials
            .apply(self.http.put(url).json(body))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    pub async fn put_no_response<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.endpoint(path)?;
        debug!("PUT {url}");

        let resp = self
            .credentials
            .apply(self.http.put(url).json(body))
            .send()
            .await?;
        self.handle_empty(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.endpoint(path)?;
        debug!("DELETE {url}");

        let resp = self.credentials.apply(self.http.delete(url)).send().await?;
        self.handle_empty(resp).await
    }

    // ── File endpoints ───────────────────────────────────────────────

    /// Download a file-returning endpoint (reports, installer tarballs).
    pub async fn get_file(&self, path: &str, params: &[(&str, String)]) -> Result<Bytes, Error> {
        let url = self.endpoint(path)?;
        debug!("GET (file) {url}");

        let resp = self
            .credentials
            .apply(self.http.get(url).query(params))
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp.bytes().await?)
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    /// Tail a streaming endpoint over a websocket upgrade.
    pub async fn stream_lines(&self, path: &str) -> Result<LineStream, Error> {
        let mut url = self.endpoint(path)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot upgrade {url}")))?;
        debug!("WS {url}");

        logs::connect(&url, self.credentials.header_value()).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::Authentication {
                message: if raw.is_empty() {
                    "invalid credentials".into()
                } else {
                    raw
                },
            };
        }

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(&raw) {
            let message = err
                .message
                .or_else(|| err.error.and_then(|e| e.message))
                .unwrap_or_else(|| status.to_string());
            Error::Api {
                status: status.as_u16(),
                message,
                kind: err.kind,
            }
        } else {
            Error::Api {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                kind: None,
            }
        }
    }
}
