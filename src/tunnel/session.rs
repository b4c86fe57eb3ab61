use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::outcome::OutcomeSlot;
use super::status::{StatusClass, classify};
use crate::config::TunnelConfig;
use crate::error::{TunnelError, TunnelResult};
use crate::transport::{ForwardSpec, Transport, TransportEvent, TransportHandle};
use crate::watcher::ActivityWatcher;

/// How long a graceful terminate may take before escalating to a forceful
/// one.
pub(crate) const GRACE_WINDOW: Duration = Duration::from_secs(3);

/// Lifecycle states of one session. Transitions are forward-only:
/// `Idle → Opening → Open → Closing → Closed`, with the terminal failure
/// edge `Opening → Failed`. A closed session is never resurrected; a retry
/// constructs a brand-new session with a fresh remote port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
}

/// Teardown completion value. Close never errors; escalation is reported
/// through the sentinel variant instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// The transport confirmed termination, or was never started.
    Exited {
        code: Option<i32>,
        signal: Option<String>,
    },
    /// The grace window lapsed; a forceful terminate was issued without
    /// waiting for confirmation.
    Forced,
}

/// Lifecycle notifications for callers that want to react to unexpected
/// terminations rather than only `close()`'s own outcome.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// The transport reported its exit.
    Exited {
        code: Option<i32>,
        signal: Option<String>,
    },
    /// Teardown fully observed.
    Closed,
}

#[derive(Clone, Debug)]
enum OpenFailure {
    Marker,
    Transport(String),
    ClosedEarly,
}

struct Shared {
    proxy_addr: String,
    state: Mutex<SessionState>,
    handle: tokio::sync::Mutex<Option<Box<dyn TransportHandle>>>,
    open_outcome: OutcomeSlot<Result<(), OpenFailure>>,
    close_outcome: OutcomeSlot<ExitStatus>,
    events: broadcast::Sender<SessionEvent>,
    watcher: Option<ActivityWatcher>,
}

/// One reverse-tunnel attempt: owns its transport handle exclusively,
/// classifies the transport's status stream, settles a write-once open
/// outcome, and tears down with graceful-then-forceful escalation.
pub struct TunnelSession {
    transport: Arc<dyn Transport>,
    config: TunnelConfig,
    remote_port: u16,
    shared: Arc<Shared>,
}

impl TunnelSession {
    /// Create a session with a freshly drawn remote port. The port is fixed
    /// for the life of the session.
    pub fn new(transport: Arc<dyn Transport>, config: TunnelConfig) -> Self {
        let remote_port = config.port_range.draw();
        let proxy_addr = format!("{}:{}", config.host, remote_port);
        let (events, _) = broadcast::channel(16);
        let idle_timeout = config.idle_timeout.filter(|timeout| !timeout.is_zero());
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let watcher = idle_timeout.map(|timeout| {
                let weak = weak.clone();
                ActivityWatcher::new(timeout, move || {
                    if let Some(shared) = weak.upgrade() {
                        tokio::spawn(shutdown(shared, "inactivity timeout".to_string()));
                    }
                })
            });
            Shared {
                proxy_addr,
                state: Mutex::new(SessionState::Idle),
                handle: tokio::sync::Mutex::new(None),
                open_outcome: OutcomeSlot::new(),
                close_outcome: OutcomeSlot::new(),
                events,
                watcher,
            }
        });
        Self {
            transport,
            config,
            remote_port,
            shared,
        }
    }

    /// The remote port drawn at construction.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// `host:remote_port` of the forward this session manages.
    pub fn proxy_addr(&self) -> &str {
        &self.shared.proxy_addr
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Start the transport and wait for it to report establishment.
    ///
    /// Resolves exactly once: a failure marker arriving after success is
    /// swallowed, and a stray success marker after failure cannot revive
    /// the session. The connect timeout is enforced by the caller wrapping
    /// this future (see [`super::open_with_retries`]), not by the session.
    pub async fn open(&self) -> TunnelResult<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != SessionState::Idle {
                return Err(TunnelError::NotIdle(*state));
            }
            *state = SessionState::Opening;
        }
        info!("creating tunnel to {}", self.shared.proxy_addr);
        let spec = ForwardSpec {
            host: self.config.host.clone(),
            remote_port: self.remote_port,
            local_port: self.config.local_port,
            user: self.config.user.clone(),
            options: self.config.transport.clone(),
        };
        let link = match self.transport.start(spec).await {
            Ok(link) => link,
            Err(err) => {
                *self.shared.state.lock() = SessionState::Failed;
                warn!(%err, "transport failed to start");
                return Err(TunnelError::open_failed(&self.shared.proxy_addr));
            }
        };
        *self.shared.handle.lock().await = Some(link.handle);
        tokio::spawn(pump_events(Arc::clone(&self.shared), link.events));

        // close() may have settled while start() was in flight; a handle
        // stored after that point is shutdown's blind spot, so terminate
        // it here and reject.
        let close_underway = matches!(
            *self.shared.state.lock(),
            SessionState::Closing | SessionState::Closed
        );
        if close_underway {
            self.shared
                .open_outcome
                .settle(Err(OpenFailure::ClosedEarly));
            terminate(&self.shared, false).await;
            return Err(TunnelError::open_failed(&self.shared.proxy_addr));
        }

        match self.shared.open_outcome.wait().await {
            Ok(()) => Ok(()),
            Err(_) => Err(TunnelError::open_failed(&self.shared.proxy_addr)),
        }
    }

    /// Tear the tunnel down. Safe in every state and never errors: a
    /// session that never started a transport settles immediately, and an
    /// already-closing session returns the same settled outcome.
    ///
    /// Issues a graceful terminate first; if the transport does not confirm
    /// within the 3-second grace window, issues a forceful terminate and
    /// settles with [`ExitStatus::Forced`] without waiting further.
    pub async fn close(&self, reason: Option<&str>) -> ExitStatus {
        let reason = reason.unwrap_or("close requested").to_string();
        shutdown(Arc::clone(&self.shared), reason).await
    }
}

impl fmt::Debug for TunnelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelSession")
            .field("proxy_addr", &self.shared.proxy_addr)
            .field("remote_port", &self.remote_port)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn shutdown(shared: Arc<Shared>, reason: String) -> ExitStatus {
    // Decide under the lock, await outside it.
    let already_closing = {
        let mut state = shared.state.lock();
        match *state {
            SessionState::Idle => {
                *state = SessionState::Closed;
                false
            }
            SessionState::Closing | SessionState::Closed => true,
            _ => {
                *state = SessionState::Closing;
                false
            }
        }
    };
    if already_closing {
        return shared.close_outcome.wait().await;
    }
    if let Some(watcher) = &shared.watcher {
        watcher.cancel();
    }
    // No transport was ever created, or it never got as far as a handle.
    if shared.handle.lock().await.is_none() {
        finish_close(&shared, ExitStatus::Exited { code: None, signal: None });
        return shared.close_outcome.wait().await;
    }

    info!(reason = %reason, "closing tunnel to {}", shared.proxy_addr);
    terminate(&shared, false).await;
    match tokio::time::timeout(GRACE_WINDOW, shared.close_outcome.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(
                "tunnel to {} did not confirm termination within {GRACE_WINDOW:?}, escalating",
                shared.proxy_addr
            );
            terminate(&shared, true).await;
            finish_close(&shared, ExitStatus::Forced);
            shared.close_outcome.wait().await
        }
    }
}

async fn terminate(shared: &Arc<Shared>, forceful: bool) {
    let handle = shared.handle.lock().await;
    if let Some(handle) = handle.as_ref()
        && let Err(err) = handle.terminate(forceful).await
    {
        warn!(%err, forceful, "terminate request failed");
    }
}

/// Settle the close outcome and finish the state machine. Only the first
/// caller has any effect.
fn finish_close(shared: &Arc<Shared>, status: ExitStatus) {
    if shared.close_outcome.settle(status) {
        if let Some(watcher) = &shared.watcher {
            watcher.cancel();
        }
        *shared.state.lock() = SessionState::Closed;
        let _ = shared.events.send(SessionEvent::Closed);
    }
}

async fn pump_events(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Status(line) => {
                if let Some(watcher) = &shared.watcher {
                    watcher.update();
                }
                handle_status(&shared, &line);
            }
            TransportEvent::Error(message) => {
                if shared.open_outcome.settle(Err(OpenFailure::Transport(message.clone()))) {
                    fail_state(&shared);
                    warn!("transport error for {}: {message}", shared.proxy_addr);
                }
            }
            TransportEvent::Closed { code, signal } => {
                info!(?code, ?signal, "tunnel to {} closed", shared.proxy_addr);
                let _ = shared.events.send(SessionEvent::Exited {
                    code,
                    signal: signal.clone(),
                });
                // A transport that dies before establishment fails the open.
                shared.open_outcome.settle(Err(OpenFailure::ClosedEarly));
                finish_close(&shared, ExitStatus::Exited { code, signal });
                break;
            }
        }
    }
}

fn handle_status(shared: &Arc<Shared>, line: &str) {
    match classify(line) {
        StatusClass::Success => {
            if shared.open_outcome.settle(Ok(())) {
                let established = {
                    let mut state = shared.state.lock();
                    if *state == SessionState::Opening {
                        *state = SessionState::Open;
                        true
                    } else {
                        false
                    }
                };
                if established {
                    info!("tunnel created to {}", shared.proxy_addr);
                    if let Some(watcher) = &shared.watcher {
                        watcher.start();
                    }
                }
            }
        }
        StatusClass::Failure => {
            if shared.open_outcome.settle(Err(OpenFailure::Marker)) {
                fail_state(shared);
                warn!("failed to create tunnel to {}", shared.proxy_addr);
            } else {
                // Some transports emit a trailing failure-looking diagnostic
                // even on clean paths.
                debug!("ignoring late failure marker: {line}");
            }
        }
        StatusClass::Terminated(message) => {
            info!("tunnel to {} is {message}", shared.proxy_addr);
        }
        StatusClass::Inert => {}
    }
}

/// Mark the open attempt failed, unless a close already owns the state.
fn fail_state(shared: &Arc<Shared>) {
    let mut state = shared.state.lock();
    if *state == SessionState::Opening {
        *state = SessionState::Failed;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
