//! Code interpreter tool — run Python snippets in a local subprocess.
//!
//! The code is fed to the interpreter on stdin (`python3 -`). The process
//! is killed if the call is dropped, e.g. on the dispatcher's timeout.

use agentflux_core::error::ToolError;
use agentflux_core::tool::{Tool, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct CodeInterpretTool {
    python_bin: String,
}

#[derive(Debug, Deserialize)]
struct CodeInterpretInput {
    code: String,
}

impl CodeInterpretTool {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "code_interpret".into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for CodeInterpretTool {
    fn name(&self) -> &str {
        "code_interpret"
    }

    fn description(&self) -> &str {
        "A tool to execute python code snippets and return the output. No backticks, just valid python code."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to run",
                    "minLength": 1
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, call_id: &str, arguments: &str) -> Result<String, ToolError> {
        let input: CodeInterpretInput = parse_arguments(arguments)?;
        if input.code.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'code' must not be empty".into()));
        }

        debug!(call_id, interpreter = %self.python_bin, "Running code");

        let mut child = Command::new(&self.python_bin)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(format!("failed to start {}: {e}", self.python_bin)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.code.as_bytes())
                .await
                .map_err(|e| self.failed(e.to_string()))?;
            // Closing stdin lets the interpreter start executing
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let result_text = if output.status.success() {
            if stderr.is_empty() {
                stdout.to_string()
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(call_id, exit_code = code, "Code exited with failure");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(result_text.trim().to_string())
    }
}
