//! Wire shape of the errors the cloud API returns.
//!
//! Every non-2xx response body looks like
//! `{"errors": [{"field": "label", "reason": "..."}]}` where `field` is an
//! optional dotted/bracketed path into the request payload.

use serde::{Deserialize, Serialize};

/// A single error record from the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiFieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

impl ApiFieldError {
    /// An error attributed to the payload field at `field`.
    pub fn for_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            reason: reason.into(),
        }
    }

    /// An error not attributable to any one field.
    pub fn general(reason: impl Into<String>) -> Self {
        Self {
            field: None,
            reason: reason.into(),
        }
    }

    pub fn is_general(&self) -> bool {
        self.field.is_none()
    }
}

/// Response body of a failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub errors: Vec<ApiFieldError>,
}
