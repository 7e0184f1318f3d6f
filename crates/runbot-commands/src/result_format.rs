use runbot_piston::ExecutionResult;

/// Reply text used when the backend reports neither stage output nor a message.
pub const GENERIC_EXECUTION_ERROR: &str = "Unknown error: the execution backend returned no output.";

/// Reduces an execution result to reply text.
///
/// A failing compile stage wins over everything else, then run output (even
/// when empty), then the backend's top-level message.
pub fn format_execution_result(result: &ExecutionResult) -> String {
    if let Some(compile) = result.compile.as_ref().filter(|stage| stage.failed()) {
        return compile.output.clone();
    }
    if let Some(run) = result.run.as_ref() {
        return run.output.clone();
    }
    if let Some(message) = result.message.as_ref() {
        return message.clone();
    }
    GENERIC_EXECUTION_ERROR.to_string()
}

#[cfg(test)]
mod tests {
    use super::{format_execution_result, GENERIC_EXECUTION_ERROR};
    use runbot_piston::{ExecutionResult, StageResult};

    fn stage(output: &str, code: Option<i32>) -> StageResult {
        StageResult {
            output: output.to_string(),
            code,
            ..StageResult::default()
        }
    }

    #[test]
    fn unit_format_execution_result_prefers_failed_compile_output() {
        let result = ExecutionResult {
            compile: Some(stage("E", Some(1))),
            run: Some(stage("R", Some(0))),
            ..ExecutionResult::default()
        };
        assert_eq!(format_execution_result(&result), "E");
    }

    #[test]
    fn functional_format_execution_result_falls_through_in_priority_order() {
        let run_only = ExecutionResult {
            run: Some(stage("R", Some(0))),
            ..ExecutionResult::default()
        };
        assert_eq!(format_execution_result(&run_only), "R");

        let message_only = ExecutionResult {
            message: Some("M".to_string()),
            ..ExecutionResult::default()
        };
        assert_eq!(format_execution_result(&message_only), "M");

        assert_eq!(
            format_execution_result(&ExecutionResult::default()),
            GENERIC_EXECUTION_ERROR
        );
    }

    #[test]
    fn regression_format_execution_result_ignores_successful_or_killed_compile() {
        let compiled = ExecutionResult {
            compile: Some(stage("warning: unused", Some(0))),
            run: Some(stage("", Some(0))),
            message: Some("M".to_string()),
            ..ExecutionResult::default()
        };
        assert_eq!(format_execution_result(&compiled), "");

        let killed = ExecutionResult {
            compile: Some(stage("partial", None)),
            message: Some("M".to_string()),
            ..ExecutionResult::default()
        };
        assert_eq!(format_execution_result(&killed), "M");
    }
}
