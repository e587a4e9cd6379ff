//! Transport over the system `ssh` client.
//!
//! Commands run in a separate `ssh` process per invocation (or
//! `sshpass -e ssh` when the host has a password and `sshpass` is
//! installed). The child is spawned with `kill_on_drop`, so dropping the
//! future on timeout or cancellation kills and reaps it.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::transport::{Transport, TransportError, TransportOutput};
use crate::config::SshSettings;
use crate::models::{DEFAULT_SSH_PORT, Host};

/// Exit status `ssh` itself uses for connection and authentication errors
const SSH_ERROR_EXIT: i32 = 255;

/// `ssh` diagnostics that mean the credentials or host key were rejected
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "Permission denied",
    "Host key verification failed",
    "Too many authentication failures",
];

/// `ssh` diagnostics that mean the connection itself failed
const CONNECTION_FAILURE_MARKERS: &[&str] = &[
    "ssh: ",
    "Connection refused",
    "Connection timed out",
    "Connection closed by",
    "Connection reset by",
    "No route to host",
    "Network is unreachable",
    "Could not resolve hostname",
    "kex_exchange_identification",
];

/// Runs commands through the system OpenSSH client
#[derive(Debug, Clone)]
pub struct SshTransport {
    settings: SshSettings,
    sshpass_available: bool,
}

impl SshTransport {
    /// Creates a transport, probing once for `sshpass`.
    #[must_use]
    pub fn new(settings: SshSettings) -> Self {
        let sshpass_available = std::process::Command::new("sshpass")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        tracing::debug!(sshpass_available, program = %settings.program, "SSH transport ready");
        Self {
            settings,
            sshpass_available,
        }
    }

    /// Builds the local command line for running `command` on `host`.
    fn build_command(&self, host: &Host, command: &str) -> Command {
        let credentials = host.credentials();
        let password = credentials
            .password_str()
            .filter(|_| self.sshpass_available);

        let mut cmd;
        if let Some(pw) = password {
            cmd = Command::new("sshpass");
            cmd.arg("-e").arg(&self.settings.program);
            cmd.env("SSHPASS", pw);
        } else {
            cmd = Command::new(&self.settings.program);
            cmd.arg("-o").arg("BatchMode=yes");
        }

        cmd.arg("-o").arg(format!(
            "StrictHostKeyChecking={}",
            self.settings.strict_host_key_checking
        ));
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", self.settings.connect_timeout_secs));
        for option in &self.settings.extra_options {
            cmd.arg("-o").arg(option);
        }

        if host.port() != DEFAULT_SSH_PORT {
            cmd.arg("-p").arg(host.port().to_string());
        }
        if let Some(ref key) = credentials.identity_file {
            cmd.arg("-i").arg(key);
        }

        cmd.arg(format!("{}@{}", credentials.user, host.address()));
        cmd.arg("--").arg(command);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn run(&self, host: &Host, command: &str) -> Result<TransportOutput, TransportError> {
        let mut cmd = self.build_command(host, command);
        let output = cmd.output().await.map_err(|e| TransportError::Spawn {
            program: self.settings.program.clone(),
            message: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();

        if exit_code == Some(SSH_ERROR_EXIT)
            && let Some(error) = classify_ssh_error(host.name(), &stderr)
        {
            return Err(error);
        }

        Ok(TransportOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}

/// Classifies an exit-255 diagnostic.
///
/// Returns `None` when stderr is not from the `ssh` client, meaning the
/// remote command itself exited with 255.
fn classify_ssh_error(host: &str, stderr: &str) -> Option<TransportError> {
    let message = stderr.trim().to_string();
    if AUTH_FAILURE_MARKERS.iter().any(|m| stderr.contains(m)) {
        Some(TransportError::Authentication {
            host: host.to_string(),
            message,
        })
    } else if CONNECTION_FAILURE_MARKERS.iter().any(|m| stderr.contains(m)) {
        Some(TransportError::Connection {
            host: host.to_string(),
            message,
        })
    } else {
        None
    }
}
