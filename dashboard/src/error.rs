//! Error taxonomy for calls to the YouTube Data and Analytics APIs.

use serde::Deserialize;

/// A failed call to one of the Google APIs.
///
/// Each variant maps to a different reaction from the caller, see [`ApiError::recovery`].
/// The clients never retry on their own.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// There is no token, or the API rejected it.
    #[error("not signed in: {0}")]
    Auth(String),

    /// The token is valid but lacks a scope the endpoint requires.
    #[error("missing permission: {0}")]
    Scope(String),

    /// Transport failure, timeout, or a non-200 status.
    #[error("{}", describe_network(.status, .message))]
    Network {
        /// HTTP status, absent when no response was received at all.
        status: Option<u16>,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("unexpected response from YouTube: {0}")]
    Decode(String),
}

fn describe_network(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("YouTube request failed with status {status}: {message}"),
        None => format!("YouTube request failed: {message}"),
    }
}

/// What the caller has to do about an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Send the user through sign-in again.
    SignIn,
    /// Ask the user to grant the additional scope.
    GrantConsent,
    /// Transient; trying again later may help.
    Retry,
    /// Nothing useful to do but report it.
    GiveUp,
}

impl ApiError {
    pub fn recovery(&self) -> Recovery {
        match self {
            ApiError::Auth(_) => Recovery::SignIn,
            ApiError::Scope(_) => Recovery::GrantConsent,
            ApiError::Network { .. } => Recovery::Retry,
            ApiError::Decode(_) => Recovery::GiveUp,
        }
    }

    /// Builds the error for a non-success response from its status and raw body.
    ///
    /// 401 means the token itself is bad. A 403 whose body names an insufficient-scope reason
    /// means the token needs more consent. Everything else is a plain network error carrying
    /// the message Google put in the body, if any.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<GoogleErrorEnvelope>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|e| e.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "no error details".to_string()
                } else {
                    trimmed.to_string()
                }
            });

        if status == 401 {
            return ApiError::Auth(message);
        }
        if status == 403 && parsed.as_ref().is_some_and(GoogleErrorEnvelope::is_scope_problem) {
            return ApiError::Scope(message);
        }
        ApiError::Network {
            status: Some(status),
            message,
        }
    }

    pub(crate) fn from_transport(e: &reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("could not connect: {e}")
        } else {
            e.to_string()
        };
        ApiError::Network {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }
}

/// The JSON error body Google APIs return alongside non-success statuses.
///
/// See: <https://cloud.google.com/apis/design/errors#http_mapping>
#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
    /// Legacy per-error list (`errors[].reason`), still used by the Data API.
    #[serde(default)]
    errors: Vec<GoogleErrorItem>,
    /// Structured details (`details[].reason`), used by newer endpoints.
    #[serde(default)]
    details: Vec<GoogleErrorItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorItem {
    reason: Option<String>,
}

/// Reasons that mean more consent would help. A bare `forbidden` is not one of them: it is also
/// what a channel or report the user does not own produces.
const SCOPE_REASONS: &[&str] = &["insufficientPermissions", "ACCESS_TOKEN_SCOPE_INSUFFICIENT"];

impl GoogleErrorEnvelope {
    fn is_scope_problem(&self) -> bool {
        let named = self
            .error
            .errors
            .iter()
            .chain(&self.error.details)
            .filter_map(|item| item.reason.as_deref())
            .any(|reason| SCOPE_REASONS.contains(&reason));
        named
            || self
                .error
                .message
                .as_deref()
                .is_some_and(|m| m.contains("insufficient authentication scopes"))
    }
}
