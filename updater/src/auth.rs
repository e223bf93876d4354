//! GitHub device authorisation.
//!
//! Obtains a bearer token for the GitHub provider without handling a
//! password: the user enters a short code in a browser while this side polls
//! for the result. The whole exchange is a single blocking step bounded by an
//! explicit timeout.

use std::rc::Rc;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::clock::Clock;
use crate::http::{RegistryClient, RegistryResponse, TransportError};

/// Default GitHub login endpoint root.
pub const DEFAULT_LOGIN_URL: &str = "https://github.com/login";

const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// What the user needs in order to approve the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCode {
    /// Code to type in.
    pub user_code: String,
    /// Page to type it in.
    pub verification_uri: String,
    /// How long the code stays valid.
    pub expires_in: Duration,
}

/// Presents the user code; implemented by the CLI.
#[cfg_attr(test, mockall::automock)]
pub trait AuthorizationPrompt {
    /// Show `code` to the user. Returning `false` abandons the flow.
    fn present(&self, code: &UserCode) -> bool;
}

/// How the flow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The user approved; carries the access token.
    Authorized(String),
    /// The user or the server refused.
    Declined,
    /// The code expired or the timeout elapsed first.
    Expired,
}

/// Failures that prevent the flow from reaching an outcome.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No OAuth application id is configured.
    #[error("no GitHub client id configured; set providers.github.client_id")]
    MissingClientId,

    /// The login endpoint answered with an unexpected status.
    #[error("{url} answered HTTP {status}")]
    Status {
        /// The endpoint.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The login endpoint answered with an unreadable document.
    #[error("unreadable answer from {url}: {reason}")]
    Malformed {
        /// The endpoint.
        url: String,
        /// Description of the problem.
        reason: String,
    },

    /// The server reported an error the flow cannot recover from.
    #[error("authorisation failed: {0}")]
    Rejected(String),

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Deserialize)]
struct DeviceCodeDocument {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

const fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenDocument {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    interval: Option<u64>,
}

/// Runs the device flow against a GitHub-compatible login endpoint.
pub struct DeviceAuthorizer {
    client: Rc<dyn RegistryClient>,
    clock: Rc<dyn Clock>,
    login_url: String,
    client_id: String,
    scope: String,
    timeout: Duration,
}

impl DeviceAuthorizer {
    /// Create an authoriser for the OAuth application `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingClientId`] when `client_id` is blank.
    pub fn new(
        client: Rc<dyn RegistryClient>,
        clock: Rc<dyn Clock>,
        client_id: &str,
    ) -> Result<Self, AuthError> {
        if client_id.trim().is_empty() {
            return Err(AuthError::MissingClientId);
        }
        Ok(Self {
            client,
            clock,
            login_url: DEFAULT_LOGIN_URL.to_owned(),
            client_id: client_id.trim().to_owned(),
            scope: String::new(),
            timeout: Duration::from_secs(15 * 60),
        })
    }

    /// Use a different login endpoint root.
    #[must_use]
    pub fn with_login_url(mut self, login_url: &str) -> Self {
        login_url.trim_end_matches('/').clone_into(&mut self.login_url);
        self
    }

    /// Request OAuth scopes (space separated); none by default.
    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        scope.clone_into(&mut self.scope);
        self
    }

    /// Give up after `timeout` even if the code is still valid.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the flow to completion.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the server cannot be reached or answers
    /// with something other than the documented protocol.
    pub fn authorize(&self, prompt: &dyn AuthorizationPrompt) -> Result<AuthOutcome, AuthError> {
        let device = self.request_code()?;
        let code = UserCode {
            user_code: device.user_code.clone(),
            verification_uri: device.verification_uri.clone(),
            expires_in: Duration::from_secs(device.expires_in),
        };
        if !prompt.present(&code) {
            log::info!("device authorisation abandoned by the user");
            return Ok(AuthOutcome::Declined);
        }

        let lifetime = self.timeout.min(code.expires_in);
        let deadline =
            self.clock.now() + TimeDelta::from_std(lifetime).unwrap_or(TimeDelta::MAX);
        let mut interval = Duration::from_secs(device.interval);
        loop {
            self.clock.sleep(interval);
            if self.clock.now() >= deadline {
                log::warn!("device authorisation timed out");
                return Ok(AuthOutcome::Expired);
            }
            let answer = self.poll(&device.device_code)?;
            if let Some(token) = answer.access_token.filter(|t| !t.is_empty()) {
                return Ok(AuthOutcome::Authorized(token));
            }
            match answer.error.as_deref() {
                Some("authorization_pending") => {}
                Some("slow_down") => {
                    interval = answer
                        .interval
                        .map_or(interval + SLOW_DOWN_STEP, Duration::from_secs);
                    log::debug!("slowing device polling to {}s", interval.as_secs());
                }
                Some("access_denied") => return Ok(AuthOutcome::Declined),
                Some("expired_token") => return Ok(AuthOutcome::Expired),
                Some(other) => {
                    return Err(AuthError::Rejected(
                        answer.error_description.unwrap_or_else(|| other.to_owned()),
                    ));
                }
                None => {
                    return Err(AuthError::Malformed {
                        url: self.token_url(),
                        reason: "neither a token nor an error".to_owned(),
                    });
                }
            }
        }
    }

    fn code_url(&self) -> String {
        format!("{}/device/code", self.login_url)
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/access_token", self.login_url)
    }

    fn request_code(&self) -> Result<DeviceCodeDocument, AuthError> {
        let url = self.code_url();
        let form = [
            ("client_id".to_owned(), self.client_id.clone()),
            ("scope".to_owned(), self.scope.clone()),
        ];
        let response = self.client.post_form(&url, &accept_json(), &form)?;
        decode(&url, &response)
    }

    fn poll(&self, device_code: &str) -> Result<TokenDocument, AuthError> {
        let url = self.token_url();
        let form = [
            ("client_id".to_owned(), self.client_id.clone()),
            ("device_code".to_owned(), device_code.to_owned()),
            ("grant_type".to_owned(), GRANT_TYPE.to_owned()),
        ];
        let response = self.client.post_form(&url, &accept_json(), &form)?;
        decode(&url, &response)
    }
}

fn accept_json() -> [(String, String); 1] {
    [("Accept".to_owned(), "application/json".to_owned())]
}

fn decode<T: for<'de> Deserialize<'de>>(
    url: &str,
    response: &RegistryResponse,
) -> Result<T, AuthError> {
    if !response.is_success() {
        return Err(AuthError::Status {
            url: url.to_owned(),
            status: response.status,
        });
    }
    serde_json::from_str(&response.body).map_err(|e| AuthError::Malformed {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}
