//! Tunnel session lifecycle.
//!
//! This module provides:
//! - [`TunnelSession`]: one open attempt over an abstract transport, with
//!   status classification, graceful-then-forceful teardown, idle-based
//!   auto-close, and typed lifecycle notifications
//! - [`open_with_retries`]: the usual entry point, constructing fresh
//!   sessions (each with a newly drawn remote port) until one succeeds or
//!   the attempt budget is exhausted

mod outcome;
mod retry;
mod session;
mod status;

#[cfg(test)]
pub(crate) mod testutil;

pub use retry::{DEFAULT_MAX_RETRIES, open_with_retries};
pub use session::{ExitStatus, SessionEvent, SessionState, TunnelSession};
