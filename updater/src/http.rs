//! HTTP transport for registry queries.
//!
//! Registry providers need the status code and headers of every response
//! (404 means "not found", 403/429 and quota headers mean "back off"), so
//! the transport returns them instead of turning non-success statuses into
//! errors. Only connection-level failures are reported as [`TransportError`].

use std::collections::BTreeMap;
use std::time::Duration;

/// Errors raised when a request could not be completed at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request failed before a response was received.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The response body could not be read.
    #[error("could not read response body from {url}: {reason}")]
    Body {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

/// A fully-read registry response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers keyed by lower-case name.
    pub headers: BTreeMap<String, String>,
    /// Response body decoded as UTF-8.
    pub body: String,
}

impl RegistryResponse {
    /// Build a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header; the name is stored lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Read-only access to remote registries.
///
/// Abstractions allow tests to script registry behaviour without network
/// access.
#[cfg_attr(test, mockall::automock)]
pub trait RegistryClient {
    /// Issue a GET request with the given extra headers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<RegistryResponse, TransportError>;

    /// Issue a POST request with a URL-encoded form body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received.
    fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<RegistryResponse, TransportError>;
}

/// [`RegistryClient`] backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqClient {
    /// Build a client with a global request timeout.
    #[must_use]
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.into(),
        }
    }
}

impl RegistryClient for UreqClient {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<RegistryResponse, TransportError> {
        let mut request = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.call().map_err(|e| request_error(url, &e))?;
        read_response(url, response)
    }

    fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<RegistryResponse, TransportError> {
        let mut request = self
            .agent
            .post(url)
            .header("User-Agent", self.user_agent.as_str());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send_form(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|e| request_error(url, &e))?;
        read_response(url, response)
    }
}

fn read_response(
    url: &str,
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<RegistryResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| TransportError::Body {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
    Ok(RegistryResponse {
        status,
        headers,
        body,
    })
}

fn request_error(url: &str, err: &ureq::Error) -> TransportError {
    TransportError::Request {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}
