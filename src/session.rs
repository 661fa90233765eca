//! Detached session lifecycle for launched benchmarks
//!
//! A benchmark runs unsupervised inside a named tmux session on the target;
//! the controlling process never waits on it. Teardown is idempotent: a kill
//! against an absent session is success, so both `launch` and
//! `fetch_results` can unconditionally clear any previous same-named
//! session.

use std::fs;
use std::path::PathBuf;

use crate::error::{Result, TedbenchError};
use crate::script::{DATA_FILE, SCRIPT_FILE};
use crate::target::ExecutionTarget;

/// Session name derived deterministically from the config's relative path
pub fn session_name(stem: &str) -> String {
    format!("tedbench_{}", stem.replace('/', "_"))
}

/// Controls the lifecycle of one named session on one target
pub struct SessionController<'a> {
    target: &'a dyn ExecutionTarget,
    name: String,
    workdir: String,
    local_dir: PathBuf,
}

impl<'a> SessionController<'a> {
    pub fn new(target: &'a dyn ExecutionTarget, stem: &str) -> Self {
        Self {
            name: session_name(stem),
            workdir: target.workdir(stem),
            local_dir: PathBuf::from(stem),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kill any session with our name. Not-found is success.
    pub fn kill_session(&self) -> Result<()> {
        let out = self
            .target
            .run_command(&format!("tmux kill-session -t {} 2>/dev/null", self.name))?;
        if !out.success {
            tracing::debug!(session = %self.name, "no existing session to kill");
        }
        Ok(())
    }

    /// Write the script into the working directory, then start it inside a
    /// fresh detached session. Returns as soon as the session is running;
    /// the benchmark itself is fire-and-forget.
    pub fn launch(&self, script_text: &str) -> Result<()> {
        self.kill_session()?;

        // stage the script locally; it is itself a persisted artifact
        fs::create_dir_all(&self.local_dir)?;
        let local_script = self.local_dir.join(SCRIPT_FILE);
        fs::write(&local_script, script_text)?;

        self.checked(&format!("mkdir -p {}", self.workdir))?;
        let remote_script = format!("{}/{}", self.workdir, SCRIPT_FILE);
        self.target.upload_file(&local_script, &remote_script)?;
        self.checked(&format!("chmod +x {}", remote_script))?;

        self.checked(&format!("tmux new-session -d -s {}", self.name))?;
        self.checked(&format!(
            "tmux send-keys -t {} 'cd {} && ./{}' Enter",
            self.name, self.workdir, SCRIPT_FILE
        ))?;
        tracing::info!(session = %self.name, target = %self.target.name(), "benchmark launched");
        Ok(())
    }

    /// Tear down the (presumably finished) session and retrieve the metrics
    /// file into the local working directory.
    pub fn fetch_results(&self) -> Result<PathBuf> {
        self.kill_session()?;
        fs::create_dir_all(&self.local_dir)?;
        let local_data = self.local_dir.join(DATA_FILE);
        self.target
            .download_file(&format!("{}/{}", self.workdir, DATA_FILE), &local_data)?;
        Ok(local_data)
    }

    /// Run a command that must succeed
    fn checked(&self, command: &str) -> Result<()> {
        let out = self.target.run_command(command)?;
        if !out.success {
            return Err(TedbenchError::Session {
                message: format!("'{}' failed: {}", command, out.stderr.trim()),
            });
        }
        Ok(())
    }

}
