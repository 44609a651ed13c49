/// Agent-count sweep benchmarking for OpenABL backends.
///
/// Provides the measurement context types, the default model and range tables,
/// and the submodules that invoke the executable and drive sweeps.

pub mod exec_time;
pub mod invoke;
pub mod series;
pub mod sweep;

use std::fmt;

use crate::errors::BenchError;

/// Backend that targets the GPU and needs a buffer-size hint per step.
pub const GPU_BACKEND: &str = "flamegpu";

/// Environment variable that must be present when running the GPU backend.
pub const GPU_ENV_VAR: &str = "SMS";

/// Config key carrying the buffer-size hint for the GPU backend.
pub const GPU_BUFFER_SIZE_KEY: &str = "flamegpu.buffer_size";

/// Largest accepted agent count; its buffer-size hint (itself) still fits in a `u64`.
pub const MAX_AGENTS: u64 = 1 << 63;

/// Models swept when none are given on the command line.
pub const DEFAULT_MODELS: [&str; 6] = [
    "circle",
    "boids2d",
    "game_of_life",
    "sugarscape",
    "ants",
    "predator_prey",
];

/// One measurement context: which model runs on which backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkTarget {
    pub model: String,
    pub backend: String,
}

impl BenchmarkTarget {
    pub fn new(model: impl Into<String>, backend: impl Into<String>) -> Self {
        BenchmarkTarget {
            model: model.into(),
            backend: backend.into(),
        }
    }

    pub fn is_gpu(&self) -> bool {
        self.backend == GPU_BACKEND
    }
}

impl fmt::Display for BenchmarkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.model, self.backend)
    }
}

/// Insertion-ordered key/value pairs handed to the executable as `key=value` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues(Vec<(String, u64)>);

/// Runtime parameters (`-P`), e.g. `num_timesteps` and `num_agents`.
pub type RunParameters = KeyValues;

/// Backend-specific configuration (`-C`).
pub type BackendConfig = KeyValues;

impl KeyValues {
    pub fn new() -> Self {
        KeyValues(Vec::new())
    }

    /// Set `key` to `value`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: u64) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `key=value` strings in insertion order.
    pub fn to_args(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// Inclusive bounds on the agent count of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentRange {
    pub min: u64,
    pub max: u64,
}

impl AgentRange {
    pub fn new(min: u64, max: u64) -> Result<Self, BenchError> {
        let spec = format!("{}-{}", min, max);
        if min == 0 {
            return Err(BenchError::invalid_range(&spec, "minimum must be at least 1"));
        }
        if min > max {
            return Err(BenchError::invalid_range(&spec, "minimum exceeds maximum"));
        }
        if max > MAX_AGENTS {
            return Err(BenchError::invalid_range(&spec, "maximum exceeds 2^63"));
        }
        Ok(AgentRange { min, max })
    }

    /// Parse a `min-max` specification.
    pub fn parse(spec: &str) -> Result<Self, BenchError> {
        let parts: Vec<&str> = spec.split('-').collect();
        if parts.len() != 2 {
            return Err(BenchError::invalid_range(spec, "expected exactly two numbers"));
        }
        let min = parts[0]
            .trim()
            .parse::<u64>()
            .map_err(|e| BenchError::invalid_range(spec, &e.to_string()))?;
        let max = parts[1]
            .trim()
            .parse::<u64>()
            .map_err(|e| BenchError::invalid_range(spec, &e.to_string()))?;
        AgentRange::new(min, max)
    }

    /// Default range for a known backend.
    pub fn default_for(backend: &str) -> Option<Self> {
        let (min, max) = match backend {
            "c" => (250, 32_000),
            "mason" | "mason2" => (250, 128_000),
            "flame" => (250, 4_000),
            GPU_BACKEND => (250, 10_240_000),
            _ => return None,
        };
        Some(AgentRange { min, max })
    }

    /// Explicit specification if given, otherwise the backend default.
    pub fn resolve(backend: &str, spec: Option<&str>) -> Result<Self, BenchError> {
        match spec {
            Some(spec) => AgentRange::parse(spec),
            None => AgentRange::default_for(backend)
                .ok_or_else(|| BenchError::UnknownBackend(backend.to_string())),
        }
    }
}

impl fmt::Display for AgentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Split a comma-separated model list, falling back to the defaults.
pub fn parse_models(spec: Option<&str>) -> Vec<String> {
    match spec {
        Some(spec) => spec
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect(),
        None => DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
    }
}
