//! HTTP transport for the management plane
//!
//! Speaks the Jolokia agent protocol each node exposes on its
//! management port: attribute reads as GET requests with path-encoded
//! mbean and attribute names, operation invocations as POSTed exec
//! requests. Every call opens a fresh request; the agent's JSON
//! envelope (`status`, `value`, `error`) is validated before the
//! value is handed to the decode step.

use std::time::Duration;

use serde_json::{json, Value};

use super::management_plane::{ManagementPlane, STORAGE_SERVICE_MBEAN};
use crate::utils::ManagementError;

/// Port of the per-node management agent
pub const DEFAULT_MANAGEMENT_PORT: u16 = 8778;

const BRIDGE_PATH: &str = "jolokia";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Management bridge for one node
pub struct HttpBridge {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBridge {
    /// Create a bridge for the node at `address`, default agent port
    pub fn new(address: &str) -> Result<Self, ManagementError> {
        Self::with_port(address, DEFAULT_MANAGEMENT_PORT)
    }

    /// Create a bridge for the node at `address:port`
    pub fn with_port(address: &str, port: u16) -> Result<Self, ManagementError> {
        let base_url = format!("http://{address}:{port}/{BRIDGE_PATH}");
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ManagementError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self { base_url, client })
    }

    /// Target agent URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fetch_envelope(
        &self,
        url: String,
        request: Option<Value>,
    ) -> Result<Value, ManagementError> {
        let builder = match request {
            Some(body) => self.client.post(&url).json(&body),
            None => self.client.get(&url),
        };

        let response = builder
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|source| ManagementError::Http {
                url: url.clone(),
                source,
            })?;

        let envelope: Value = response.json().map_err(|source| ManagementError::Http {
            url: url.clone(),
            source,
        })?;

        extract_value(&url, envelope)
    }
}

impl ManagementPlane for HttpBridge {
    fn read_attribute(&self, attribute: &str) -> Result<Value, ManagementError> {
        let url = format!(
            "{}/read/{}/{}",
            self.base_url, STORAGE_SERVICE_MBEAN, attribute
        );
        self.fetch_envelope(url, None)
    }

    fn invoke_operation(
        &self,
        operation: &str,
        arguments: &[Value],
    ) -> Result<Value, ManagementError> {
        let request = json!({
            "type": "exec",
            "mbean": STORAGE_SERVICE_MBEAN,
            "operation": operation,
            "arguments": arguments,
        });
        self.fetch_envelope(self.base_url.clone(), Some(request))
    }
}

/// Validate the agent envelope and extract its `value`
fn extract_value(url: &str, mut envelope: Value) -> Result<Value, ManagementError> {
    let status = envelope
        .get("status")
        .and_then(Value::as_u64)
        .unwrap_or_default();

    if status != 200 {
        let message = envelope
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("malformed agent response")
            .to_string();
        return Err(ManagementError::Status {
            url: url.to_string(),
            status,
            message,
        });
    }

    Ok(envelope
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null))
}
