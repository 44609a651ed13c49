/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: ablbench.toml (in working directory)
/// 3. Environment variables: prefixed ABLBENCH_ (e.g., ABLBENCH_LOG_LEVEL=debug)
///
/// RESULT_DIR and SMS are read by the CLI layer, not here, so their names stay
/// compatible with existing benchmark scripts.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::BenchError;

/// Name of the executable looked up under the repository root.
pub const BINARY_NAME: &str = "OpenABL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Repository root holding the OpenABL binary, examples/ and asset/.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Explicit executable path. Replaces the candidate list when set.
    #[serde(default)]
    pub binary: Option<PathBuf>,

    /// Per-invocation timeout in seconds. Unset waits for the child indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            root_dir: default_root_dir(),
            binary: None,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: ABLBENCH_ROOT_DIR=/opt/openabl overrides root_dir in ablbench.toml
    pub fn load() -> Result<Config, BenchError> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file("ablbench.toml"))
                .merge(Env::prefixed("ABLBENCH_")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Config, BenchError> {
        figment
            .extract()
            .map_err(|e| BenchError::Config(format!("Failed to load config: {}", e)))
    }

    /// Directory containing `<model>.abl` files.
    pub fn examples_dir(&self) -> PathBuf {
        self.root_dir.join("examples")
    }

    /// Directory passed to the executable via `-A`.
    pub fn asset_dir(&self) -> PathBuf {
        self.root_dir.join("asset")
    }

    /// Ordered executable locations to probe: the root, then the build directory.
    pub fn binary_candidates(&self) -> Vec<PathBuf> {
        match &self.binary {
            Some(path) => vec![path.clone()],
            None => vec![
                self.root_dir.join(BINARY_NAME),
                self.root_dir.join("build").join(BINARY_NAME),
            ],
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
