//! Runtime configuration for the billing data layer.
//!
//! Resolved once at startup and passed into the client, transport and
//! views. `from_env` is the only place environment variables are read.

use std::time::Duration;

use serde::Deserialize;

/// Concept set whose members are the billable service types.
pub const DEFAULT_SERVICE_TYPES_CONCEPT: &str = "21b8cf43-9f9f-4d02-9f4a-d710ece54c46";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_LINK_TEMPLATE: &str = "/home/billing/patient/{patientUuid}/{uuid}";
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub base_url: String,
    pub service_types_concept_uuid: String,
    /// Bill link template with `{patientUuid}` and `{uuid}` placeholders.
    pub link_template: String,
    pub page_size: usize,
    /// Per-request timeout applied by `HttpTransport`. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            service_types_concept_uuid: DEFAULT_SERVICE_TYPES_CONCEPT.to_string(),
            link_template: DEFAULT_LINK_TEMPLATE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: None,
        }
    }
}

impl BillingConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Build a config from `BILLING_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: lookup("BILLING_BASE_URL").unwrap_or(defaults.base_url),
            service_types_concept_uuid: lookup("BILLING_SERVICE_TYPES_CONCEPT")
                .unwrap_or(defaults.service_types_concept_uuid),
            link_template: lookup("BILLING_LINK_TEMPLATE").unwrap_or(defaults.link_template),
            page_size: lookup("BILLING_PAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            timeout_secs: lookup("BILLING_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Revalidation switches for `QueryCache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Re-fetch keys that already hold data when a new handle mounts them.
    pub revalidate_on_mount: bool,
    /// Re-fetch every mounted key when `QueryCache::focus` is called.
    pub revalidate_on_focus: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            revalidate_on_mount: true,
            revalidate_on_focus: true,
        }
    }
}
