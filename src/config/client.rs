use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Store connection pool parameters
///
/// `clients` logical clients are mapped round-robin onto `conns` physical
/// connections, and connections are mapped round-robin onto `endpoints`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Physical connections
    #[serde(default = "default_conns")]
    pub conns: usize,

    /// Logical clients (one worker each)
    #[serde(default = "default_clients")]
    pub clients: usize,

    /// Per operation timeout (unit: milliseconds, 0 = none)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connection establishment timeout (unit: milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Operations per connection before a worker reconnects (0 = never)
    #[serde(default)]
    pub reconnect_every: u64,

    /// Retries while creating the initial client pool
    #[serde(default)]
    pub connect_retry: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            conns: default_conns(),
            clients: default_clients(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_every: 0,
            connect_retry: BackoffPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::InvalidConfig("client.endpoints cannot be empty".into()));
        }
        if self.conns == 0 || self.clients == 0 {
            return Err(Error::InvalidConfig(format!(
                "client.conns ({}) and client.clients ({}) must be greater than 0",
                self.conns, self.clients
            )));
        }
        if self.conns > self.clients {
            return Err(Error::InvalidConfig(format!(
                "client.conns ({}) cannot exceed client.clients ({})",
                self.conns, self.clients
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig("client.connect_timeout_ms must be greater than 0".into()));
        }
        self.connect_retry.validate()
    }
}

fn default_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:2379".to_string()]
}
fn default_conns() -> usize {
    1
}
fn default_clients() -> usize {
    1
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
