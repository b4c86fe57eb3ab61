//! Caller-supplied tunnel configuration.
//!
//! These structs are intentionally dependency-light so they can be reused
//! by config loaders and embedding binaries without pulling in a transport
//! implementation.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{TunnelError, TunnelResult};
use crate::transport::TransportOptions;

/// Default time to wait for the transport to report establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Inclusive range of candidate remote ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// Lowest candidate port.
    pub min: u16,
    /// Highest candidate port.
    pub max: u16,
}

impl PortRange {
    /// Create a validated range. Fails when `min > max`.
    pub fn new(min: u16, max: u16) -> TunnelResult<Self> {
        if min > max {
            return Err(TunnelError::InvalidPortRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Draw a port uniformly at random from the range. A degenerate range
    /// always yields its single port.
    pub fn draw(&self) -> u16 {
        if self.min >= self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Everything a caller supplies to open tunnels toward one remote host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Remote host address.
    pub host: String,
    /// Candidate remote ports; each attempt draws a fresh one.
    pub port_range: PortRange,
    /// Local port the remote forward routes back to.
    pub local_port: u16,
    /// Remote host user.
    #[serde(default)]
    pub user: Option<String>,
    /// Time to wait for establishment before an attempt counts as failed.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Quiet period after which an open tunnel closes itself. Absent or
    /// zero disables activity watching.
    #[serde(default)]
    pub idle_timeout: Option<Duration>,
    /// Transport-specific knobs, opaque to the session core.
    #[serde(default)]
    pub transport: TransportOptions,
}

impl TunnelConfig {
    /// Create a config with the defaults: no user, 10s connect timeout, no
    /// idle timeout, default transport options.
    pub fn new(host: impl Into<String>, port_range: PortRange, local_port: u16) -> Self {
        Self {
            host: host.into(),
            port_range,
            local_port,
            user: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: None,
            transport: TransportOptions::default(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}
