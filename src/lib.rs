//! Reverse SSH tunnel lifecycle management.
//!
//! Establishes a reverse port-forward from a randomly chosen remote port
//! back to a local service, with bounded retries, a connect timeout, and
//! optional idle-based auto-close. The mechanism that actually performs
//! the forwarding is pluggable behind the [`transport::Transport`] trait;
//! a subprocess `ssh` adapter is provided.

pub mod config;
pub mod error;
pub mod logging;
pub mod transport;
pub mod tunnel;
pub mod watcher;

pub use config::{DEFAULT_CONNECT_TIMEOUT, PortRange, TunnelConfig};
pub use error::{TunnelError, TunnelResult};
pub use transport::{
    ForwardSpec, ProcessTransport, Transport, TransportEvent, TransportHandle, TransportLink, TransportOptions,
};
pub use tunnel::{DEFAULT_MAX_RETRIES, ExitStatus, SessionEvent, SessionState, TunnelSession, open_with_retries};
pub use watcher::ActivityWatcher;
