use std::sync::Arc;

use tracing::{info, warn};

use super::session::TunnelSession;
use crate::config::TunnelConfig;
use crate::error::{TunnelError, TunnelResult};
use crate::transport::Transport;

/// Default attempt budget for [`open_with_retries`].
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Open a tunnel, constructing a fresh session per attempt until one
/// succeeds or the budget is exhausted.
///
/// Each attempt draws a new random remote port, which routes around a
/// remote port that is already bound or firewalled. Every rejection is
/// treated uniformly: the failed session is closed (releasing its
/// transport) before the next attempt starts. The config's connect timeout
/// bounds each attempt.
pub async fn open_with_retries(
    transport: Arc<dyn Transport>,
    config: &TunnelConfig,
    max_attempts: u32,
) -> TunnelResult<TunnelSession> {
    for attempt in 1..=max_attempts {
        let session = TunnelSession::new(Arc::clone(&transport), config.clone());
        match tokio::time::timeout(config.connect_timeout, session.open()).await {
            Ok(Ok(())) => return Ok(session),
            Ok(Err(err)) => {
                warn!(attempt, max_attempts, %err, "tunnel attempt failed");
            }
            Err(_) => {
                let err = TunnelError::OpenTimeout {
                    addr: session.proxy_addr().to_string(),
                    timeout: config.connect_timeout,
                };
                warn!(attempt, max_attempts, %err, "tunnel attempt timed out");
            }
        }
        session.close(Some("open attempt failed")).await;
        if attempt < max_attempts {
            info!("retrying to connect, {} attempts left", max_attempts - attempt);
        }
    }
    Err(TunnelError::RetryExhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
