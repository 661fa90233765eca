//! Execution targets: local process control or a remote host over ssh/scp
//!
//! The local/remote split lives entirely behind [`ExecutionTarget`]; callers
//! select a target once at startup and never branch on locality afterwards
//! (the build concurrency policy reads `is_local` at synthesis time, nothing
//! else does). Remote operations shell out to `ssh`/`scp` so host lookup,
//! proxies, and authentication stay in the user's ssh config.

use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::{Result, TedbenchError};

/// Result of one command on a target. A non-zero exit is reported here,
/// not as an error, so callers can treat expected failures (a kill against
/// an absent session) as success.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Capability interface over a benchmark host
pub trait ExecutionTarget {
    /// Target identifier for error messages
    fn name(&self) -> &str;

    /// Whether commands run in the local environment
    fn is_local(&self) -> bool;

    /// Working directory for a config stem (remote hosts root under
    /// `tedbench/` in the login directory)
    fn workdir(&self, stem: &str) -> String;

    /// Run a shell command; `Err` only on transport/spawn failure
    fn run_command(&self, command: &str) -> Result<CommandOutput>;

    /// Place a local file at a target path
    fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;

    /// Retrieve a target file into a local path
    fn download_file(&self, remote: &str, local: &Path) -> Result<()>;
}

/// Connect to the machine named in the config. `"local"` never touches the
/// network; anything else is probed once over ssh and failure is fatal.
pub fn connect(machine: &str) -> Result<Box<dyn ExecutionTarget>> {
    if machine == "local" {
        Ok(Box::new(LocalTarget))
    } else {
        Ok(Box::new(RemoteTarget::connect(machine)?))
    }
}

/// Local process and file operations
pub struct LocalTarget;

impl ExecutionTarget for LocalTarget {
    fn name(&self) -> &str {
        "local"
    }

    fn is_local(&self) -> bool {
        true
    }

    fn workdir(&self, stem: &str) -> String {
        stem.to_string()
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let output = Command::new("sh").arg("-c").arg(command).output()?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }

    fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        copy_unless_same(local, Path::new(remote))
    }

    fn download_file(&self, remote: &str, local: &Path) -> Result<()> {
        copy_unless_same(Path::new(remote), local)
    }
}

/// Staging and destination paths coincide when the target is local
fn copy_unless_same(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::copy(from, to)?;
    Ok(())
}

/// Remote host driven through ssh/scp subprocesses
pub struct RemoteTarget {
    host: String,
}

impl RemoteTarget {
    /// Probe connectivity once; a failed round trip aborts the invocation
    pub fn connect(host: &str) -> Result<Self> {
        let target = Self {
            host: host.to_string(),
        };
        let probe = target.ssh(&["true"])?;
        if !probe.success {
            return Err(TedbenchError::Connection {
                target: host.to_string(),
                message: probe.stderr.trim().to_string(),
            });
        }
        tracing::debug!(host, "remote connection verified");
        Ok(target)
    }

    fn ssh(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(&self.host)
            .args(args)
            .output()
            .map_err(|e| TedbenchError::Connection {
                target: self.host.clone(),
                message: format!("failed to spawn ssh: {}", e),
            })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }

    fn scp(&self, from: &str, to: &str) -> Result<()> {
        let output = Command::new("scp")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(from)
            .arg(to)
            .output()
            .map_err(|e| TedbenchError::Connection {
                target: self.host.clone(),
                message: format!("failed to spawn scp: {}", e),
            })?;
        if !output.status.success() {
            return Err(TedbenchError::Connection {
                target: self.host.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl ExecutionTarget for RemoteTarget {
    fn name(&self) -> &str {
        &self.host
    }

    fn is_local(&self) -> bool {
        false
    }

    fn workdir(&self, stem: &str) -> String {
        format!("tedbench/{}", stem)
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput> {
        self.ssh(&[command])
    }

    fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        self.scp(
            &local.to_string_lossy(),
            &format!("{}:{}", self.host, remote),
        )
    }

    fn download_file(&self, remote: &str, local: &Path) -> Result<()> {
        self.scp(
            &format!("{}:{}", self.host, remote),
            &local.to_string_lossy(),
        )
    }
}
