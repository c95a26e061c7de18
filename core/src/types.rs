//! Domain DTOs for the compute-instance endpoints.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently.
//! Integration tests catch any schema drift between the two crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Provisioning,
    Booting,
    Running,
    Offline,
    ShuttingDown,
    Rebooting,
    Deleting,
    /// A status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Provisioning => "provisioning",
            InstanceStatus::Booting => "booting",
            InstanceStatus::Running => "running",
            InstanceStatus::Offline => "offline",
            InstanceStatus::ShuttingDown => "shutting_down",
            InstanceStatus::Rebooting => "rebooting",
            InstanceStatus::Deleting => "deleting",
            InstanceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A compute instance returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    pub id: u64,
    pub label: String,
    pub region: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub status: InstanceStatus,
}

/// Request payload for creating an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstance {
    pub label: String,
    pub region: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Boot right after provisioning. The API defaults to `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booted: Option<bool>,
}

/// One page of a paginated collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub pages: u32,
    pub results: u32,
}
