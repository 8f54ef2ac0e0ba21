//! Authenticated HTTPS transport with error classification.
//!
//! Every call maps failures onto three classes:
//! - secure-channel failures become [`Error::Ssl`] so the caller can refresh trust
//! - other transport failures become [`Error::ServerRequest`], with remediation hints
//! - unexpected HTTP statuses become [`Error::Api`]
//!
//! Retries are never attempted here.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::trust::Verification;
use crate::trust::connection::{self, ConnectionConfig};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout for requests that carry a package payload.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const JSON: &str = "application/json";
const ZIP: &str = "application/zip";

/// Request payload.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    Empty,
    Json(&'a Value),
    Package(&'a [u8]),
}

/// Status and raw text of a successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    host: String,
    base_url: Url,
    username: String,
    password: String,
    /// Canonical hostname resolved at bootstrap, used in remediation hints.
    server_hostname: Option<String>,
    upload_timeout: Duration,
    client: Client,
}

impl HttpClient {
    /// Client for `https://<server hostname or host>`.
    pub fn for_host(
        host: &str,
        username: &str,
        password: &str,
        verification: &Verification,
        connection: &ConnectionConfig,
    ) -> Result<Self> {
        let server_host = connection.server_hostname.as_deref().unwrap_or(host);
        let base_url = Url::parse(&format!("https://{server_host}")).map_err(|e| {
            Error::ServerConfig(format!("Invalid server address {server_host}: {e}"))
        })?;
        Self::new(host, base_url, username, password, verification, connection)
    }

    pub fn new(
        host: &str,
        base_url: Url,
        username: &str,
        password: &str,
        verification: &Verification,
        connection: &ConnectionConfig,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>);

        builder = match verification {
            Verification::Disabled => builder.danger_accept_invalid_certs(true),
            Verification::Bundle(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| Error::io(format!("Unable to read {}", path.display()), e))?;
                let certificates = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                    Error::Cert(format!("Unable to load {}: {e}", path.display()))
                })?;
                certificates
                    .into_iter()
                    .fold(builder, |b, cert| b.add_root_certificate(cert))
            }
        };

        if let Some(proxy_url) = connection::socks_proxy_url(connection) {
            let proxy = reqwest::Proxy::all(&proxy_url).map_err(|e| {
                Error::ServerConfig(format!("Invalid SOCKS proxy {proxy_url}: {e}"))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::ServerRequest(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            host: host.to_string(),
            base_url,
            username: username.to_string(),
            password: password.to_string(),
            server_hostname: connection.server_hostname.clone(),
            upload_timeout: UPLOAD_TIMEOUT,
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    pub fn set_upload_timeout(&mut self, timeout: Duration) {
        self.upload_timeout = timeout;
    }

    pub fn get(&self, endpoint: &str, headers: &[(&str, &str)]) -> Result<ApiResponse> {
        self.send(Method::GET, endpoint, headers, Body::Empty, &[200])
    }

    pub fn post(
        &self,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: Body<'_>,
    ) -> Result<ApiResponse> {
        self.send(Method::POST, endpoint, headers, body, &[200, 201])
    }

    pub fn put(&self, endpoint: &str, headers: &[(&str, &str)], body: Body<'_>) -> Result<ApiResponse> {
        self.send(Method::PUT, endpoint, headers, body, &[200, 202])
    }

    pub fn delete(&self, endpoint: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, endpoint, &[], Body::Empty, &[204])
    }

    /// GET with JSON headers, decoding the body into `T`.
    pub fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.get(endpoint, &json_headers())?.json(&self.host)
    }

    fn send(
        &self,
        method: Method,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: Body<'_>,
        valid_statuses: &[u16],
    ) -> Result<ApiResponse> {
        let url = self.base_url.join(endpoint).map_err(|e| {
            Error::ServerRequest(format!("Invalid endpoint {endpoint}: {e}"))
        })?;
        debug!(%method, %url, "request");

        let is_upload = matches!(body, Body::Package(_));
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request = attach_body(request, body, self.upload_timeout);

        let response = request
            .send()
            .map_err(|e| self.transport_error(&e, is_upload))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| self.transport_error(&e, is_upload))?;
        debug!(status, "response");

        if valid_statuses.contains(&status) {
            Ok(ApiResponse { status, text })
        } else {
            Err(api_error(status, &text, &self.username))
        }
    }

    fn transport_error(&self, err: &reqwest::Error, is_upload: bool) -> Error {
        let chain = error_chain(err);
        let server_host = self.server_hostname.as_deref().unwrap_or(&self.host);
        // The first entry is reqwest's own message, which embeds the request URL.
        if looks_like_tls_failure(&chain[1..]) {
            return Error::Ssl(format!("SSL error from host {server_host}:\n{}", chain.join(": ")));
        }
        let failure = TransportFailure {
            detail: chain.join(": "),
            connect_timeout: err.is_connect() && err.is_timeout(),
            write_timeout: is_upload && err.is_timeout(),
        };
        Error::ServerRequest(annotate_request_failure(
            server_host,
            self.server_hostname.as_deref(),
            &failure,
        ))
    }
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self, host: &str) -> Result<T> {
        serde_json::from_str(&self.text).map_err(|e| {
            Error::api(
                format!("Unable to parse response from host {host}: {e}"),
                self.status,
                0,
            )
        })
    }
}

pub fn json_headers() -> [(&'static str, &'static str); 2] {
    [(ACCEPT.as_str(), JSON), (CONTENT_TYPE.as_str(), JSON)]
}

pub fn zip_headers() -> [(&'static str, &'static str); 1] {
    [(CONTENT_TYPE.as_str(), ZIP)]
}

fn attach_body(request: RequestBuilder, body: Body<'_>, upload_timeout: Duration) -> RequestBuilder {
    match body {
        Body::Empty => request,
        Body::Json(value) => request.json(value),
        Body::Package(bytes) => request.body(bytes.to_vec()).timeout(upload_timeout),
    }
}

fn error_chain(err: &reqwest::Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

/// True when any underlying cause was raised by certificate or TLS handling.
///
/// `causes` must not include the top-level request error. Only phrases the TLS
/// backends emit are matched, never bare words that could come from a host name.
pub fn looks_like_tls_failure(causes: &[String]) -> bool {
    const MARKERS: [&str; 9] = [
        "invalid peer certificate",
        "certificate verify failed",
        "ssl routines",
        "tls handshake",
        "handshake failure",
        "received fatal alert",
        "unknownissuer",
        "self signed certificate",
        "certificate was not trusted",
    ];
    causes.iter().any(|message| {
        let lower = message.to_ascii_lowercase();
        MARKERS.iter().any(|marker| lower.contains(marker))
    })
}

#[derive(Debug, Clone, Default)]
pub struct TransportFailure {
    pub detail: String,
    pub connect_timeout: bool,
    pub write_timeout: bool,
}

/// Build the request-error message, appending a hint for known timeout shapes.
pub fn annotate_request_failure(
    server_host: &str,
    hostname: Option<&str>,
    failure: &TransportFailure,
) -> String {
    let mut message = format!("Request to host {server_host} failed:\n{}", failure.detail);
    let detail = failure.detail.to_ascii_lowercase();

    let connect_timeout = failure.connect_timeout
        || detail.contains("connecttimeout")
        || detail.contains("connect timed out");
    let write_timeout = failure.write_timeout || detail.contains("write operation timed out");

    match hostname {
        Some(hostname) if connect_timeout => message.push_str(&format!(
            "\nPlease check that {hostname} is present in your hosts configuration"
        )),
        _ if write_timeout => {
            message.push_str("\nTry supplying a longer timeout via the -t option")
        }
        _ => {}
    }
    message
}

/// Map an unexpected HTTP status and body onto [`Error::Api`].
pub fn api_error(status: u16, body: &str, username: &str) -> Error {
    if status == 401 {
        return Error::api(format!("Authentication failed for user {username}"), 401, 0);
    }

    let json: Option<Value> = serde_json::from_str(body).ok();
    let message = json
        .as_ref()
        .and_then(|j| {
            j.get("message")
                .or_else(|| j.get("http_response").and_then(|r| r.get("message")))
        })
        .map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.to_string());
    let api_code = json
        .as_ref()
        .and_then(|j| j.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    Error::api(message, status, api_code)
}
