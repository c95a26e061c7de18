//! Error types for the console client core.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server rejected the request."
//! Responses carrying the API's `{"errors": [...]}` envelope land in `Api` so
//! the per-field errors survive for form display; anything else lands in
//! `HttpError` with the raw status code and body.
//!
//! Polling failures are generic over the status type and the fetch error of
//! the `StatusSource` being polled.

use std::fmt;

use thiserror::Error;

use crate::api_error::ApiFieldError;

/// Errors returned by `InstanceClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404; the requested resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status with a structured error envelope.
    #[error("HTTP {status}: {}", join_reasons(.errors))]
    Api {
        status: u16,
        errors: Vec<ApiFieldError>,
    },

    /// The server returned a non-2xx status without a recognizable body.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    /// The errors a form should display for this failure.
    ///
    /// Structured envelopes are returned as-is; every other variant becomes a
    /// single general error carrying the display string.
    pub fn field_errors(&self) -> Vec<ApiFieldError> {
        match self {
            ApiError::Api { errors, .. } => errors.clone(),
            other => vec![ApiFieldError::general(other.to_string())],
        }
    }
}

fn join_reasons(errors: &[ApiFieldError]) -> String {
    errors
        .iter()
        .map(|e| e.reason.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Rejected backoff configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackoffError {
    #[error("invalid backoff configuration: {0}")]
    InvalidConfig(String),
}

/// Terminal failure of a poll session.
#[derive(Debug, Error)]
pub enum PollError<S, E>
where
    S: fmt::Debug,
    E: std::error::Error + 'static,
{
    /// Attempts ran out before the resource reached the target status.
    #[error("target status not reached after {attempts} attempts (last status: {last_status:?})")]
    Timeout { last_status: S, attempts: u32 },

    /// The cancellation token fired before the session finished.
    #[error("poll cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// Fetching the resource failed; not retried.
    #[error("failed to fetch resource status")]
    ResourceFetch(#[source] E),
}

impl<S, E> PollError<S, E>
where
    S: fmt::Debug,
    E: std::error::Error + 'static,
{
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled { .. })
    }
}
