use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ForwardSpec, Transport, TransportEvent, TransportHandle, TransportLink};
use crate::error::{TunnelError, TunnelResult};

/// Transport that spawns the system `ssh` client with a remote-forward
/// request and reads its verbose stderr as the status stream.
pub struct ProcessTransport {
    command: PathBuf,
}

impl ProcessTransport {
    pub fn new() -> Self {
        Self {
            command: PathBuf::from("ssh"),
        }
    }

    /// Override the spawned executable. Tests point this at a stub script.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for ProcessTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn start(&self, spec: ForwardSpec) -> TunnelResult<TransportLink> {
        let args = build_args(&spec);
        debug!(command = %self.command.display(), ?args, "spawning ssh client");
        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let pid = child.id();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TunnelError::other("ssh child has no stderr pipe"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let _ = tx.send(TransportEvent::Status(line));
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(TransportEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
            match child.wait().await {
                Ok(status) => {
                    let _ = tx.send(TransportEvent::Closed {
                        code: status.code(),
                        signal: exit_signal(&status),
                    });
                }
                Err(err) => {
                    let _ = tx.send(TransportEvent::Error(err.to_string()));
                }
            }
        });

        Ok(TransportLink {
            handle: Box::new(ProcessHandle { pid }),
            events: rx,
        })
    }
}

struct ProcessHandle {
    pid: Option<u32>,
}

#[async_trait]
impl TransportHandle for ProcessHandle {
    #[cfg(unix)]
    async fn terminate(&self, forceful: bool) -> TunnelResult<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let signal = if forceful { libc::SIGKILL } else { libc::SIGTERM };
        // ESRCH after exit is fine; the event pump reports the close.
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if rc != 0 {
            debug!(pid, signal, "kill returned an error, process likely already gone");
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn terminate(&self, _forceful: bool) -> TunnelResult<()> {
        Err(TunnelError::PlatformNotSupported {
            operation: "process signalling".to_string(),
        })
    }
}

fn build_args(spec: &ForwardSpec) -> Vec<String> {
    let mut args = vec![
        "-R".to_string(),
        format!("{}:localhost:{}", spec.remote_port, spec.local_port),
        "-N".to_string(),
        "-v".to_string(),
        "-p".to_string(),
        spec.options.ssh_port.to_string(),
    ];
    if let Some(identity) = &spec.options.identity {
        args.push("-i".to_string());
        args.push(identity.display().to_string());
    }
    args.extend(spec.options.extra_args.iter().cloned());
    let destination = match &spec.user {
        Some(user) => format!("{user}@{}", spec.host),
        None => spec.host.clone(),
    };
    args.push(destination);
    args
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(signal_name)
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    match signal {
        libc::SIGHUP => "SIGHUP".to_string(),
        libc::SIGINT => "SIGINT".to_string(),
        libc::SIGKILL => "SIGKILL".to_string(),
        libc::SIGTERM => "SIGTERM".to_string(),
        other => format!("SIG{other}"),
    }
}
