/// Sweep controller: drives one measurement per agent count for a target.
///
/// Agent counts grow geometrically (factor 2) from the range minimum and stop
/// once the next count would exceed the maximum. The first failure aborts the
/// sweep and every sweep after it; nothing is written for the failed target.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::errors::BenchError;

use super::invoke::{get_exec_time, ModelRunner};
use super::series::{ResultSeries, HEADER};
use super::{AgentRange, BackendConfig, BenchmarkTarget, RunParameters, GPU_BUFFER_SIZE_KEY};

pub const NUM_TIMESTEPS: u64 = 100;
pub const GROWTH_FACTOR: u64 = 2;

/// Smallest power of two >= `n`, i.e. `2^bit_length(n - 1)`. `next_pow2(1) == 1`.
///
/// `None` above `2^63`, where the result no longer fits in a `u64`.
pub fn next_pow2(n: u64) -> Option<u64> {
    n.max(1).checked_next_power_of_two()
}

/// Agent counts visited by a sweep over `range`, ascending.
pub fn agent_counts(range: AgentRange) -> impl Iterator<Item = u64> {
    std::iter::successors(Some(range.min), |n| n.checked_mul(GROWTH_FACTOR))
        .take_while(move |n| *n <= range.max)
}

/// `-P` parameters for one step.
pub fn run_params(agents: u64) -> RunParameters {
    let mut params = RunParameters::new();
    params.insert("num_timesteps", NUM_TIMESTEPS);
    params.insert("num_agents", agents);
    params
}

/// `-C` config for one step. Only the GPU backend gets a buffer-size hint.
pub fn backend_config(target: &BenchmarkTarget, agents: u64) -> Result<BackendConfig, BenchError> {
    let mut config = BackendConfig::new();
    if target.is_gpu() {
        let buffer_size = next_pow2(agents).ok_or_else(|| {
            BenchError::InvalidRange(format!("no buffer size fits {} agents", agents))
        })?;
        config.insert(GPU_BUFFER_SIZE_KEY, buffer_size);
    }
    Ok(config)
}

/// Owns the runner and the optional results directory for a whole run.
pub struct SweepController {
    runner: Arc<dyn ModelRunner>,
    results_dir: Option<PathBuf>,
    show_progress: bool,
}

impl SweepController {
    pub fn new(runner: Arc<dyn ModelRunner>, results_dir: Option<PathBuf>) -> Self {
        SweepController {
            runner,
            results_dir,
            show_progress: true,
        }
    }

    /// Disable the stderr progress bar (result rows are still printed).
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Measure every agent count in `range` and return the completed series.
    pub async fn run_sweep(
        &self,
        target: &BenchmarkTarget,
        range: AgentRange,
    ) -> Result<ResultSeries, BenchError> {
        println!(
            "Running {} on {} backend with {} agents",
            target.model, target.backend, range
        );
        println!("{}", HEADER);
        tracing::info!(model = %target.model, backend = %target.backend, range = %range, "Starting sweep");

        let pb = if self.show_progress {
            let pb = ProgressBar::new(agent_counts(range).count() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut series = ResultSeries::new();
        for agents in agent_counts(range) {
            pb.set_message(format!("{} agents", agents));

            let params = run_params(agents);
            let measured = match backend_config(target, agents) {
                Ok(config) => get_exec_time(self.runner.as_ref(), target, &params, &config).await,
                Err(e) => Err(e),
            };
            let exec_time = match measured {
                Ok(t) => t,
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            };

            let row = series.push(agents, exec_time);
            pb.suspend(|| println!("{}", row));
            tracing::debug!(agents, exec_time, "Measured step");
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(series)
    }

    /// Sweep `target` and persist the series if a results directory is configured.
    pub async fn run(
        &self,
        target: &BenchmarkTarget,
        range: AgentRange,
    ) -> Result<ResultSeries, BenchError> {
        let series = self.run_sweep(target, range).await?;
        if let Some(dir) = &self.results_dir {
            let path = series.write_to(dir, target)?;
            tracing::info!(path = %path.display(), points = series.len(), "Results saved");
        }
        Ok(series)
    }

    /// Sweep each model on `backend` in order, stopping at the first failure.
    pub async fn run_all(
        &self,
        backend: &str,
        models: &[String],
        range: AgentRange,
    ) -> Result<Vec<(BenchmarkTarget, ResultSeries)>, BenchError> {
        let mut done = Vec::with_capacity(models.len());
        for model in models {
            let target = BenchmarkTarget::new(model.as_str(), backend);
            let series = self.run(&target, range).await?;
            done.push((target, series));
        }
        Ok(done)
    }
}
