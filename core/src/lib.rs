//! Client core for a cloud-infrastructure management console.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values for the
//! compute-instance API without touching the network (host-does-IO pattern),
//! and provides the helpers console forms and flows lean on:
//!
//! - [`normalize`] turns the API's flat `{field, reason}` error lists into a
//!   per-field tree, or pushes them into flat form setters.
//! - [`backoff`] and [`poll`] wait for a resource (e.g. a booting instance)
//!   to reach a target status, with cancellation.
//! - [`pagination`] walks every page of a collection.
//!
//! # Design
//! - `InstanceClient` is stateless; it holds only `base_url`.
//! - Async helpers take the fetch step from the caller, so the core never
//!   owns a transport.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api_error;
pub mod backoff;
pub mod client;
pub mod error;
pub mod field_path;
pub mod http;
pub mod normalize;
pub mod pagination;
pub mod poll;
pub mod types;

pub use api_error::{ApiFieldError, ErrorEnvelope};
pub use backoff::{BackoffConfig, BackoffMethod, BackoffPolicy, StepRule};
pub use client::InstanceClient;
pub use error::{ApiError, BackoffError, PollError};
pub use field_path::{FieldPath, FieldPathError, Segment};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::{
    apply_flat, group_indexed_errors, handle_unauthorized, normalize, FieldErrorMap,
    FieldErrorNode, NormalizedErrors,
};
pub use pagination::get_all;
pub use poll::{poll_until, Poller, Sleeper, StatusSource, TokioSleeper};
pub use types::{CreateInstance, Instance, InstanceStatus, Page};
