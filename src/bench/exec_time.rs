/// Text contract between ablbench and the OpenABL executable.
///
/// A run in reporting mode (`-R`) prints `Execution time: <seconds>s` somewhere in
/// its combined output. Everything else in the output is ignored. Keep all
/// knowledge of the output format in this module.

use regex::Regex;

use crate::errors::BenchError;

const EXEC_TIME_PATTERN: &str =
    r"Execution time: ([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)s";

/// Extract the execution time in seconds. Only the first match is used.
///
/// Returns `None` when no line carries the pattern.
pub fn parse_exec_time(output: &str) -> Option<f64> {
    let re = Regex::new(EXEC_TIME_PATTERN).ok()?;
    let caps = re.captures(output)?;
    caps.get(1)?.as_str().parse::<f64>().ok()
}

/// Same as [`parse_exec_time`] but fails with a parse error naming the command.
pub fn require_exec_time(command: &str, output: &str) -> Result<f64, BenchError> {
    parse_exec_time(output).ok_or_else(|| BenchError::Parse {
        command: command.to_string(),
        output: output.to_string(),
    })
}
