//! Stateless HTTP request builder and response parser for the instance API.
//!
//! # Design
//! `InstanceClient` holds only a `base_url` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The caller executes the actual HTTP round-trip.

use serde::de::DeserializeOwned;

use crate::api_error::ErrorEnvelope;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{CreateInstance, Instance, Page};

/// Synchronous, stateless client for the compute-instance endpoints.
#[derive(Debug, Clone)]
pub struct InstanceClient {
    base_url: String,
}

impl InstanceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn instances_url(&self) -> String {
        format!("{}/linode/instances", self.base_url)
    }

    pub fn build_list_instances(&self, page: u32, page_size: u32) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}?page={page}&page_size={page_size}", self.instances_url()),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_get_instance(&self, id: u64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/{id}", self.instances_url()),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_instance(&self, input: &CreateInstance) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.instances_url(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    pub fn build_boot_instance(&self, id: u64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/{id}/boot", self.instances_url()),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_delete_instance(&self, id: u64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}/{id}", self.instances_url()),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_list_instances(&self, response: HttpResponse) -> Result<Page<Instance>, ApiError> {
        check_status(&response, 200)?;
        parse_body(&response)
    }

    pub fn parse_get_instance(&self, response: HttpResponse) -> Result<Instance, ApiError> {
        check_status(&response, 200)?;
        parse_body(&response)
    }

    pub fn parse_create_instance(&self, response: HttpResponse) -> Result<Instance, ApiError> {
        check_status(&response, 200)?;
        parse_body(&response)
    }

    pub fn parse_boot_instance(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 200)
    }

    pub fn parse_delete_instance(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 200)
    }
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    match serde_json::from_str::<ErrorEnvelope>(&response.body) {
        Ok(envelope) if !envelope.errors.is_empty() => Err(ApiError::Api {
            status: response.status,
            errors: envelope.errors,
        }),
        _ => Err(ApiError::HttpError {
            status: response.status,
            body: response.body.clone(),
        }),
    }
}
