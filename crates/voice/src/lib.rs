//! Voice agent invocation over one-shot subprocesses.
//!
//! The external calling agent is a script that takes a single JSON argument,
//! prints its result to stdout, and signals failure through a non-zero exit
//! code plus stderr diagnostics. Callers depend on [`VoiceAgentClient`], not
//! on the subprocess transport, and every call is bounded by a timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use maitre_core::config::VoiceConfig;
use maitre_core::VoiceCallRequest;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum VoiceAgentError {
    #[error("could not start voice agent process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("voice agent exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("voice agent did not finish within {0:?}")]
    Timeout(Duration),
    #[error("could not encode voice agent payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not parse voice agent output: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Narrow interface over the external calling agent: fire off a call, or
/// poll a previously started inquiry.
#[async_trait]
pub trait VoiceAgentClient: Send + Sync {
    async fn dispatch(&self, request: &VoiceCallRequest) -> Result<String, VoiceAgentError>;
    async fn check_status(&self, inquiry_id: &str) -> Result<Value, VoiceAgentError>;
}

/// Shells out to the configured interpreter with `{script} {json-payload}`.
pub struct ScriptVoiceAgentClient {
    interpreter: String,
    dispatch_script: PathBuf,
    status_script: PathBuf,
    call_timeout: Duration,
}

impl ScriptVoiceAgentClient {
    pub fn new(config: &VoiceConfig) -> Self {
        match which::which(&config.interpreter) {
            Ok(path) => info!(
                event_name = "voice.client.interpreter_found",
                interpreter = %path.display(),
                "voice agent interpreter resolved"
            ),
            Err(_) => warn!(
                event_name = "voice.client.interpreter_missing",
                interpreter = %config.interpreter,
                "voice agent interpreter not found in PATH, dispatch will fail to spawn"
            ),
        }

        Self::with_parts(
            config.interpreter.clone(),
            config.dispatch_script.clone(),
            config.status_script.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_parts(
        interpreter: String,
        dispatch_script: PathBuf,
        status_script: PathBuf,
        call_timeout: Duration,
    ) -> Self {
        Self { interpreter, dispatch_script, status_script, call_timeout }
    }

    async fn run_script(
        &self,
        script: &Path,
        payload: String,
    ) -> Result<std::process::Output, VoiceAgentError> {
        let pending = Command::new(&self.interpreter)
            .arg(script)
            .arg(payload)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.call_timeout, pending).await {
            Err(_) => return Err(VoiceAgentError::Timeout(self.call_timeout)),
            Ok(Err(error)) => return Err(VoiceAgentError::Spawn(error)),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(VoiceAgentError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl VoiceAgentClient for ScriptVoiceAgentClient {
    /// Fire a call for `request`, resolving with the agent's raw stdout.
    async fn dispatch(&self, request: &VoiceCallRequest) -> Result<String, VoiceAgentError> {
        let payload = serde_json::to_string(request).map_err(VoiceAgentError::Encode)?;
        let output = self.run_script(&self.dispatch_script, payload).await?;

        info!(
            event_name = "voice.dispatch.completed",
            venue_name = request.venue_name.as_deref().unwrap_or("unknown"),
            stdout_bytes = output.stdout.len(),
            "voice agent dispatch finished"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Poll the status checker for `inquiry_id`; its stdout must be JSON.
    async fn check_status(&self, inquiry_id: &str) -> Result<Value, VoiceAgentError> {
        let payload = json!({ "inquiry_id": inquiry_id }).to_string();
        let output = self.run_script(&self.status_script, payload).await?;

        serde_json::from_slice(&output.stdout).map_err(VoiceAgentError::Parse)
    }
}
