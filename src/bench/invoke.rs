/// Invocation layer: runs the OpenABL executable for one measurement.
///
/// The `ModelRunner` trait is the seam between sweep logic and the external
/// process, so sweeps can be driven by a fake in tests.

use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::Config;
use crate::errors::BenchError;

use super::exec_time::require_exec_time;
use super::{BackendConfig, BenchmarkTarget, RunParameters};

/// Executes one benchmark invocation and returns its combined output.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    /// Run `target` with the given parameters. A nonzero exit is an error.
    async fn run(
        &self,
        target: &BenchmarkTarget,
        params: &RunParameters,
        config: &BackendConfig,
    ) -> Result<Vec<u8>, BenchError>;

    /// Human-readable command line for `target`, used in error reports.
    fn describe(
        &self,
        target: &BenchmarkTarget,
        params: &RunParameters,
        config: &BackendConfig,
    ) -> String;
}

/// Run once and extract the reported execution time in seconds.
pub async fn get_exec_time(
    runner: &dyn ModelRunner,
    target: &BenchmarkTarget,
    params: &RunParameters,
    config: &BackendConfig,
) -> Result<f64, BenchError> {
    let raw = runner.run(target, params, config).await?;
    let output = String::from_utf8_lossy(&raw);
    require_exec_time(&runner.describe(target, params, config), &output)
}

/// Return the first candidate that exists as a regular file.
pub fn locate_binary(candidates: &[PathBuf]) -> Result<PathBuf, BenchError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| BenchError::BinaryNotFound {
            tried: candidates.to_vec(),
        })
}

/// Runs the real OpenABL binary as a child process.
#[derive(Debug, Clone)]
pub struct OpenablRunner {
    binary: PathBuf,
    examples_dir: PathBuf,
    asset_dir: PathBuf,
    timeout: Option<Duration>,
}

impl OpenablRunner {
    pub fn new(binary: PathBuf, examples_dir: PathBuf, asset_dir: PathBuf) -> Self {
        OpenablRunner {
            binary,
            examples_dir,
            asset_dir,
            timeout: None,
        }
    }

    /// Resolve the binary from the config's candidate list and adopt its paths.
    pub fn from_config(config: &Config) -> Result<Self, BenchError> {
        let binary = locate_binary(&config.binary_candidates())?;
        tracing::info!(binary = %binary.display(), "Using OpenABL binary");
        Ok(OpenablRunner::new(binary, config.examples_dir(), config.asset_dir())
            .with_timeout(config.timeout()))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model source file for `model`: `<examples_dir>/<model>.abl`.
    pub fn model_file(&self, model: &str) -> PathBuf {
        self.examples_dir.join(format!("{}.abl", model))
    }

    /// Argument list, excluding the binary itself, in the order the tool expects:
    /// input, backend, asset dir, raw reporting, then `-P` params and `-C` config.
    pub fn command_args(
        &self,
        target: &BenchmarkTarget,
        params: &RunParameters,
        config: &BackendConfig,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            self.model_file(&target.model).into(),
            "-b".into(),
            target.backend.clone().into(),
            "-A".into(),
            self.asset_dir.clone().into(),
            "-R".into(),
        ];
        for kv in params.to_args() {
            args.push("-P".into());
            args.push(kv.into());
        }
        for kv in config.to_args() {
            args.push("-C".into());
            args.push(kv.into());
        }
        args
    }
}

#[async_trait]
impl ModelRunner for OpenablRunner {
    async fn run(
        &self,
        target: &BenchmarkTarget,
        params: &RunParameters,
        config: &BackendConfig,
    ) -> Result<Vec<u8>, BenchError> {
        let command = self.describe(target, params, config);
        tracing::debug!(command = %command, "Invoking OpenABL");

        let spawn_err = |source: std::io::Error| BenchError::Spawn {
            command: command.clone(),
            source,
        };

        // stdout and stderr share one pipe so the output keeps its write order.
        let (mut reader, writer) = std::io::pipe().map_err(spawn_err)?;
        let writer_err = writer.try_clone().map_err(spawn_err)?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.command_args(target, params, config))
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_err)
            .kill_on_drop(true);
        let mut child = cmd.spawn().map_err(spawn_err)?;
        // The reader only sees EOF once the parent's write ends are closed.
        drop(cmd);

        let collect = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });
        let finished = async move {
            let status = child.wait().await?;
            let output = collect.await.map_err(std::io::Error::other)??;
            Ok::<_, std::io::Error>((status, output))
        };

        let (status, combined) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, finished).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(BenchError::Timeout {
                        command: command.clone(),
                        secs: limit.as_secs(),
                    })
                }
            },
            None => finished.await,
        }
        .map_err(spawn_err)?;

        if !status.success() {
            return Err(BenchError::Invocation {
                command,
                code: status.code(),
                output: String::from_utf8_lossy(&combined).into_owned(),
            });
        }

        Ok(combined)
    }

    fn describe(
        &self,
        target: &BenchmarkTarget,
        params: &RunParameters,
        config: &BackendConfig,
    ) -> String {
        std::iter::once(self.binary.as_os_str().to_os_string())
            .chain(self.command_args(target, params, config))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(binary: PathBuf) -> OpenablRunner {
        OpenablRunner::new(binary, PathBuf::from("/abl/examples"), PathBuf::from("/abl/asset"))
    }

    fn params(agents: u64) -> RunParameters {
        let mut p = RunParameters::new();
        p.insert("num_timesteps", 100);
        p.insert("num_agents", agents);
        p
    }

    #[test]
    fn test_command_args_order() {
        let r = runner(PathBuf::from("/abl/OpenABL"));
        let target = BenchmarkTarget::new("circle", "flamegpu");
        let mut config = BackendConfig::new();
        config.insert("flamegpu.buffer_size", 256);

        let args: Vec<String> = r
            .command_args(&target, &params(250), &config)
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(
            args,
            vec![
                "-i", "/abl/examples/circle.abl",
                "-b", "flamegpu",
                "-A", "/abl/asset",
                "-R",
                "-P", "num_timesteps=100",
                "-P", "num_agents=250",
                "-C", "flamegpu.buffer_size=256",
            ]
        );
    }

    #[test]
    fn test_describe_starts_with_binary() {
        let r = runner(PathBuf::from("/abl/OpenABL"));
        let target = BenchmarkTarget::new("ants", "c");
        assert_eq!(
            r.describe(&target, &params(500), &BackendConfig::new()),
            "/abl/OpenABL -i /abl/examples/ants.abl -b c -A /abl/asset -R -P num_timesteps=100 -P num_agents=500"
        );
    }

    #[test]
    fn test_locate_binary_prefers_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let root_bin = dir.path().join("OpenABL");
        let build_bin = dir.path().join("build").join("OpenABL");
        std::fs::create_dir_all(build_bin.parent().unwrap()).unwrap();
        std::fs::write(&build_bin, "").unwrap();

        let candidates = vec![root_bin.clone(), build_bin.clone()];
        assert_eq!(locate_binary(&candidates).unwrap(), build_bin);

        std::fs::write(&root_bin, "").unwrap();
        assert_eq!(locate_binary(&candidates).unwrap(), root_bin);
    }

    #[test]
    fn test_locate_binary_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        // A directory named like the binary is not a regular file.
        std::fs::create_dir(dir.path().join("OpenABL")).unwrap();
        let candidates = vec![dir.path().join("OpenABL"), dir.path().join("build/OpenABL")];
        match locate_binary(&candidates).unwrap_err() {
            BenchError::BinaryNotFound { tried } => assert_eq!(tried, candidates),
            other => panic!("expected BinaryNotFound, got {:?}", other),
        }
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn fake_binary(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("OpenABL");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_get_exec_time_from_process() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(
                dir.path(),
                "echo 'Compiling model'\necho 'Execution time: 1.5s'\necho 'bye' >&2",
            );
            let r = runner(bin);
            let target = BenchmarkTarget::new("circle", "c");
            let t = get_exec_time(&r, &target, &params(250), &BackendConfig::new())
                .await
                .unwrap();
            assert_eq!(t, 1.5);
        }

        #[tokio::test]
        async fn test_stderr_is_captured() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(dir.path(), "echo 'Execution time: 0.75s' >&2");
            let r = runner(bin);
            let target = BenchmarkTarget::new("circle", "c");
            let t = get_exec_time(&r, &target, &params(250), &BackendConfig::new())
                .await
                .unwrap();
            assert_eq!(t, 0.75);
        }

        #[tokio::test]
        async fn test_arguments_reach_the_process() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(dir.path(), "echo \"$@\"");
            let r = runner(bin);
            let target = BenchmarkTarget::new("boids2d", "mason");
            let out = r.run(&target, &params(1000), &BackendConfig::new()).await.unwrap();
            assert_eq!(
                String::from_utf8(out).unwrap().trim(),
                "-i /abl/examples/boids2d.abl -b mason -A /abl/asset -R -P num_timesteps=100 -P num_agents=1000"
            );
        }

        #[tokio::test]
        async fn test_first_report_wins_across_streams() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(
                dir.path(),
                "echo 'Execution time: 2.0s' >&2\nsleep 0.2\necho 'Execution time: 1.0s'",
            );
            let r = runner(bin);
            let target = BenchmarkTarget::new("circle", "c");
            let t = get_exec_time(&r, &target, &params(250), &BackendConfig::new())
                .await
                .unwrap();
            assert_eq!(t, 2.0);
        }

        #[tokio::test]
        async fn test_failure_output_keeps_write_order() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(dir.path(), "echo first >&2\necho second\necho third >&2\nexit 3");
            let r = runner(bin);
            let target = BenchmarkTarget::new("circle", "c");
            let err = r.run(&target, &params(250), &BackendConfig::new()).await.unwrap_err();
            match err {
                BenchError::Invocation { code, output, .. } => {
                    assert_eq!(code, Some(3));
                    assert_eq!(output, "first\nsecond\nthird\n");
                }
                other => panic!("expected invocation failure, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_invocation_failure() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(dir.path(), "echo 'segfault in kernel'\nexit 2");
            let r = runner(bin.clone());
            let target = BenchmarkTarget::new("circle", "c");
            let err = get_exec_time(&r, &target, &params(250), &BackendConfig::new())
                .await
                .unwrap_err();
            match err {
                BenchError::Invocation { command, code, output } => {
                    assert!(command.starts_with(&bin.display().to_string()));
                    assert_eq!(code, Some(2));
                    assert!(output.contains("segfault in kernel"));
                }
                other => panic!("expected invocation failure, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_missing_line_is_parse_failure() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(dir.path(), "echo 'Simulation done'");
            let r = runner(bin);
            let target = BenchmarkTarget::new("circle", "c");
            let err = get_exec_time(&r, &target, &params(250), &BackendConfig::new())
                .await
                .unwrap_err();
            assert!(matches!(err, BenchError::Parse { .. }), "got {:?}", err);
        }

        #[tokio::test]
        async fn test_timeout_kills_hung_process() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_binary(dir.path(), "exec sleep 30");
            let r = runner(bin).with_timeout(Some(Duration::from_millis(200)));
            let target = BenchmarkTarget::new("circle", "c");
            let err = r.run(&target, &params(250), &BackendConfig::new()).await.unwrap_err();
            assert!(matches!(err, BenchError::Timeout { .. }), "got {:?}", err);
        }
    }
}
