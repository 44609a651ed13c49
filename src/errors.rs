/// Error types for ablbench
///
/// Every error is fatal for the whole run. The binary maps them to exit codes;
/// library code only propagates.

use std::path::PathBuf;

/// Broad class of a failure, used for reporting and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Setup,
    Invocation,
    Parse,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("OpenABL binary not found. Tried: {}", join_paths(.tried))]
    BinaryNotFound {
        tried: Vec<PathBuf>
    },

    #[error("Result directory {} does not exist", .0.display())]
    ResultDirMissing(PathBuf),

    #[error("Using {backend} backend without {var} environment variable")]
    MissingEnv {
        backend: String,
        var: &'static str,
    },

    #[error("Invalid agent number specification (min-max): {0}")]
    InvalidRange(String),

    #[error("Unknown backend '{0}' and no agent range given. Valid backends: c, mason, mason2, flame, flamegpu")]
    UnknownBackend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to run command\n{command}\n{source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invocation of command\n{command}\nexited with exit code {} and the following output:\n{output}", display_code(.code))]
    Invocation {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Invocation of command\n{command}\ntimed out after {secs}s")]
    Timeout {
        command: String,
        secs: u64,
    },

    #[error("Failed to extract execution time from output of\n{command}\n{output}")]
    Parse {
        command: String,
        output: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        // Terminated by a signal on unix.
        None => "none".to_string(),
    }
}

impl BenchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BenchError::BinaryNotFound { .. }
            | BenchError::ResultDirMissing(_)
            | BenchError::MissingEnv { .. }
            | BenchError::InvalidRange(_)
            | BenchError::UnknownBackend(_)
            | BenchError::Config(_) => ErrorKind::Setup,
            BenchError::Spawn { .. }
            | BenchError::Invocation { .. }
            | BenchError::Timeout { .. } => ErrorKind::Invocation,
            BenchError::Parse { .. } => ErrorKind::Parse,
            BenchError::Io(_) => ErrorKind::Io,
        }
    }

    /// Process exit status for this error. Every class aborts the run with 1.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Setup | ErrorKind::Invocation | ErrorKind::Parse | ErrorKind::Io => 1,
        }
    }

    /// Helper to create range errors from the offending specification
    pub fn invalid_range(spec: &str, reason: &str) -> Self {
        BenchError::InvalidRange(format!("'{}': {}", spec, reason))
    }
}
