use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One installed language runtime reported by the backend.
pub struct Runtime {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Source file submitted for execution. Most languages accept an anonymous file.
pub struct ScriptFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ExecuteRequest` used across runbot components.
pub struct ExecuteRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<ScriptFile>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub stdin: String,
    /// Milliseconds.
    pub compile_timeout: u64,
    /// Milliseconds.
    pub run_timeout: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Output of a single compile or run stage. `code` is null when killed by a signal.
pub struct StageResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}

impl StageResult {
    pub fn failed(&self) -> bool {
        matches!(self.code, Some(code) if code != 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Structured execution result; every field is optional and evaluated by priority.
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
/// Enumerates supported `PistonError` values.
pub enum PistonError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("execution backend returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Trait contract for `CodeExecutor` behavior.
pub trait CodeExecutor: Send + Sync {
    async fn runtimes(&self) -> Result<Vec<Runtime>, PistonError>;

    async fn execute(&self, request: ExecuteRequest) -> Result<ExecutionResult, PistonError>;
}

#[cfg(test)]
mod tests {
    use super::{ExecuteRequest, ExecutionResult, ScriptFile, StageResult};
    use serde_json::json;

    #[test]
    fn unit_stage_result_failed_treats_null_and_zero_codes_as_success() {
        let mut stage = StageResult::default();
        assert!(!stage.failed());
        stage.code = Some(0);
        assert!(!stage.failed());
        stage.code = Some(1);
        assert!(stage.failed());
        stage.code = Some(-1);
        assert!(stage.failed());
    }

    #[test]
    fn functional_execution_result_parses_backend_payloads() {
        let parsed: ExecutionResult = serde_json::from_value(json!({
            "language": "rust",
            "version": "1.68.2",
            "compile": {"stdout": "", "stderr": "error[E0425]", "output": "error[E0425]", "code": 1, "signal": null},
            "run": {"stdout": "", "stderr": "", "output": "", "code": null, "signal": "SIGKILL"}
        }))
        .expect("parse result");
        assert_eq!(parsed.compile.as_ref().and_then(|stage| stage.code), Some(1));
        assert_eq!(
            parsed.run.as_ref().and_then(|stage| stage.signal.as_deref()),
            Some("SIGKILL")
        );
        assert!(parsed.message.is_none());

        let message_only: ExecutionResult =
            serde_json::from_value(json!({"message": "foo-* runtime is unknown"}))
                .expect("parse message");
        assert_eq!(message_only.message.as_deref(), Some("foo-* runtime is unknown"));
        assert!(message_only.run.is_none());
    }

    #[test]
    fn unit_execute_request_omits_anonymous_file_names() {
        let request = ExecuteRequest {
            language: "python".to_string(),
            version: "3.10.0".to_string(),
            files: vec![ScriptFile {
                name: None,
                content: "print(1)".to_string(),
            }],
            args: vec![],
            stdin: String::new(),
            compile_timeout: 10_000,
            run_timeout: 3_000,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["files"], json!([{"content": "print(1)"}]));
        assert_eq!(value["run_timeout"], json!(3_000));
    }
}
