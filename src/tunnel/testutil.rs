//! Scripted transport for lifecycle tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};

use crate::config::{PortRange, TunnelConfig};
use crate::error::TunnelResult;
use crate::transport::{ForwardSpec, Transport, TransportEvent, TransportHandle, TransportLink};

pub(crate) const SUCCESS_LINE: &str = "debug1: remote forward success for: listen 8000, connect localhost:3000";
pub(crate) const FAILURE_LINE: &str = "Warning: remote port forwarding failed for listen port 8000";

pub(crate) fn status(line: &str) -> TransportEvent {
    TransportEvent::Status(line.to_string())
}

pub(crate) fn test_config() -> TunnelConfig {
    TunnelConfig::new("remote-host", PortRange { min: 8000, max: 9000 }, 3000)
}

/// Transport whose event streams are scripted ahead of time, one script per
/// `start` call. Records starts, drawn ports, and terminate requests.
#[derive(Default)]
pub(crate) struct MockTransport {
    scripts: Mutex<Vec<Vec<TransportEvent>>>,
    confirm_graceful: bool,
    starts: AtomicUsize,
    pub(crate) ports: Mutex<Vec<u16>>,
    pub(crate) terminations: Arc<Mutex<Vec<bool>>>,
    live: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl MockTransport {
    /// One attempt with the given initial events.
    pub(crate) fn scripted(events: Vec<TransportEvent>) -> Self {
        Self::with_scripts(vec![events])
    }

    /// One script per expected attempt, consumed in order.
    pub(crate) fn with_scripts(scripts: Vec<Vec<TransportEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            ..Self::default()
        }
    }

    /// Answer graceful terminate requests with a closed event, the way a
    /// cooperative process reacts to SIGTERM.
    pub(crate) fn confirm_graceful(mut self) -> Self {
        self.confirm_graceful = true;
        self
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Inject an event into the most recently started attempt.
    pub(crate) fn inject(&self, event: TransportEvent) {
        if let Some(tx) = self.live.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start(&self, spec: ForwardSpec) -> TunnelResult<TransportLink> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.ports.lock().push(spec.remote_port);
        let (tx, rx) = mpsc::unbounded_channel();
        let script = {
            let mut scripts = self.scripts.lock();
            if scripts.is_empty() { Vec::new() } else { scripts.remove(0) }
        };
        for event in script {
            let _ = tx.send(event);
        }
        *self.live.lock() = Some(tx.clone());
        Ok(TransportLink {
            handle: Box::new(MockHandle {
                terminations: Arc::clone(&self.terminations),
                confirm_graceful: self.confirm_graceful,
                tx,
            }),
            events: rx,
        })
    }
}

/// Wrapper that parks `start` calls until released, for racing other
/// session operations against an in-flight transport start.
pub(crate) struct GatedTransport {
    pub(crate) inner: MockTransport,
    gate: Semaphore,
}

impl GatedTransport {
    pub(crate) fn new(inner: MockTransport) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
        }
    }

    /// Let one parked `start` call proceed.
    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn start(&self, spec: ForwardSpec) -> TunnelResult<TransportLink> {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.inner.start(spec).await
    }
}

struct MockHandle {
    terminations: Arc<Mutex<Vec<bool>>>,
    confirm_graceful: bool,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn terminate(&self, forceful: bool) -> TunnelResult<()> {
        self.terminations.lock().push(forceful);
        if !forceful && self.confirm_graceful {
            let _ = self.tx.send(TransportEvent::Closed {
                code: Some(0),
                signal: Some("SIGTERM".to_string()),
            });
        }
        Ok(())
    }
}
