/// ablbench: sweep OpenABL models across agent counts and record execution times.
///
/// For each model, runs the OpenABL binary at agent counts min, 2*min, 4*min, ...
/// up to max, printing an `n,t` table to stdout and, when RESULT_DIR is set,
/// writing it to `<RESULT_DIR>/bench_<model>_<backend>.txt`.
/// Any failure aborts the whole run with exit status 1.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use ablbench::bench::invoke::OpenablRunner;
use ablbench::bench::sweep::SweepController;
use ablbench::bench::{parse_models, AgentRange, GPU_BACKEND, GPU_ENV_VAR};
use ablbench::config::Config;
use ablbench::errors::BenchError;
use ablbench::logging;

#[derive(Parser)]
#[command(
    name = "ablbench",
    version,
    about = "Agent-count sweep benchmark runner for OpenABL",
    after_help = "Default models:\n  circle, boids2d, game_of_life, sugarscape, ants, predator_prey\n\n\
                  Default agent ranges:\n  c:        250-32000\n  mason:    250-128000\n  \
                  mason2:   250-128000\n  flame:    250-4000\n  flamegpu: 250-10240000"
)]
struct Cli {
    /// Backend to benchmark: c, mason, mason2, flame, flamegpu
    backend: String,

    /// Comma-separated list of models (default: all six example models)
    models: Option<String>,

    /// Agent count range as min-max (default depends on backend)
    range: Option<String>,

    /// Directory for result files. Results are only printed when unset.
    #[arg(long, env = "RESULT_DIR")]
    results_dir: Option<PathBuf>,

    /// GPU architecture list, required by the flamegpu backend
    #[arg(long, env = "SMS")]
    sms: Option<String>,
}

async fn run(cli: Cli, config: &Config) -> Result<(), anyhow::Error> {
    // 1. Validate environment before any sweep work
    match &cli.results_dir {
        Some(dir) if !dir.is_dir() => {
            return Err(BenchError::ResultDirMissing(dir.clone()).into());
        }
        Some(dir) => tracing::info!(results_dir = %dir.display(), "Saving results"),
        None => tracing::warn!("No RESULT_DIR specified, results will not be saved"),
    }

    if cli.backend == GPU_BACKEND && cli.sms.is_none() {
        return Err(BenchError::MissingEnv {
            backend: cli.backend.clone(),
            var: GPU_ENV_VAR,
        }
        .into());
    }

    // 2. Resolve models and agent range
    let models = parse_models(cli.models.as_deref());
    if models.is_empty() {
        return Err(BenchError::Config("Model list is empty".to_string()).into());
    }
    let range = AgentRange::resolve(&cli.backend, cli.range.as_deref())?;

    // 3. Locate the executable
    let runner = OpenablRunner::from_config(config)?;

    // 4. Run every sweep in order; the first failure aborts the rest
    let controller = SweepController::new(Arc::new(runner), cli.results_dir);
    let completed = controller.run_all(&cli.backend, &models, range).await?;
    tracing::info!(sweeps = completed.len(), backend = %cli.backend, "All sweeps completed");

    Ok(())
}

#[tokio::main]
async fn main() {
    // 1. Parse CLI args. Usage errors exit 1; --help and --version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging (stderr only; stdout carries result tables)
    logging::init_logging(&config);

    if let Err(e) = run(cli, &config).await {
        let code = e
            .downcast_ref::<BenchError>()
            .map(BenchError::exit_code)
            .unwrap_or(1);
        eprintln!("{}", e);
        std::process::exit(code);
    }
}
