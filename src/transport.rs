//! Transport seam between the session core and the mechanism that actually
//! performs the reverse forward.
//!
//! A transport starts the forward, streams normalized status events, and
//! accepts graceful or forceful terminate requests. The session core never
//! learns which concrete mechanism (spawned `ssh` client, protocol library)
//! sits behind the trait.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TunnelResult;

mod process;

pub use process::ProcessTransport;

/// Default port of the remote ssh service.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Everything a transport needs to establish one reverse forward.
#[derive(Clone, Debug)]
pub struct ForwardSpec {
    /// Remote host address.
    pub host: String,
    /// Remote port the host should listen on.
    pub remote_port: u16,
    /// Local port connections are routed back to.
    pub local_port: u16,
    /// Remote host user.
    pub user: Option<String>,
    /// Transport-specific knobs.
    pub options: TransportOptions,
}

/// Transport-specific knobs, carried through the config untouched by the
/// session core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// Port the ssh service listens on.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// Opaque credential reference: identity file path.
    #[serde(default)]
    pub identity: Option<PathBuf>,
    /// Extra arguments appended verbatim.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            ssh_port: DEFAULT_SSH_PORT,
            identity: None,
            extra_args: Vec::new(),
        }
    }
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// Normalized event stream every transport reports through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A diagnostic/status line.
    Status(String),
    /// Transport-level error, distinct from a status line.
    Error(String),
    /// Terminal event: the transport is gone.
    Closed {
        code: Option<i32>,
        signal: Option<String>,
    },
}

/// Handle plus event stream returned by a successful start. The handle is
/// exclusively owned by one session; ownership never transfers.
pub struct TransportLink {
    pub handle: Box<dyn TransportHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// A mechanism that can establish reverse forwards.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin establishing a reverse forward; non-blocking. The returned
    /// event stream ends with a single [`TransportEvent::Closed`].
    async fn start(&self, spec: ForwardSpec) -> TunnelResult<TransportLink>;
}

/// Shutdown control over one started forward.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Request shutdown; graceful first, forceful on escalation. Must not
    /// fail when the transport is already gone.
    async fn terminate(&self, forceful: bool) -> TunnelResult<()>;
}
