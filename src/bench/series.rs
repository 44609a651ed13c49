/// Result table for one sweep: `n,t` header, then one `count,time` row per step.

use std::path::{Path, PathBuf};

use crate::errors::BenchError;

use super::BenchmarkTarget;

pub const HEADER: &str = "n,t";

/// Ordered (agent_count, exec_time) measurements of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSeries {
    points: Vec<(u64, f64)>,
}

impl ResultSeries {
    pub fn new() -> Self {
        ResultSeries { points: Vec::new() }
    }

    /// Append one measurement and return its rendered row.
    pub fn push(&mut self, agents: u64, exec_time: f64) -> String {
        self.points.push((agents, exec_time));
        format_row(agents, exec_time)
    }

    pub fn points(&self) -> &[(u64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Full table, every line newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(4 + self.points.len() * 16);
        out.push_str(HEADER);
        out.push('\n');
        for (n, t) in &self.points {
            out.push_str(&format_row(*n, *t));
            out.push('\n');
        }
        out
    }

    /// Read back a rendered table.
    pub fn parse(text: &str) -> Result<Self, BenchError> {
        let mut lines = text.lines();
        match lines.next() {
            Some(HEADER) => {}
            other => {
                return Err(BenchError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("expected header '{}', found {:?}", HEADER, other),
                )))
            }
        }

        let mut series = ResultSeries::new();
        for (idx, line) in lines.enumerate() {
            let invalid = || {
                BenchError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed row {}: {:?}", idx + 2, line),
                ))
            };
            let (n, t) = line.split_once(',').ok_or_else(invalid)?;
            let n = n.parse::<u64>().map_err(|_| invalid())?;
            let t = t.parse::<f64>().map_err(|_| invalid())?;
            series.points.push((n, t));
        }
        Ok(series)
    }

    /// `bench_<model>_<backend>.txt`
    pub fn file_name(target: &BenchmarkTarget) -> String {
        format!("bench_{}_{}.txt", target.model, target.backend)
    }

    /// Write the rendered table into `dir`, replacing any previous file.
    pub fn write_to(&self, dir: &Path, target: &BenchmarkTarget) -> Result<PathBuf, BenchError> {
        let path = dir.join(Self::file_name(target));
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}

/// `count,time` row.
pub fn format_row(agents: u64, exec_time: f64) -> String {
    format!("{},{}", agents, format_time(exec_time))
}

/// Shortest round-trip form, always with a decimal point (`2.0`), and exponents
/// written with a sign and at least two digits (`5e-05`, `1e+16`).
pub fn format_time(t: f64) -> String {
    let repr = format!("{:?}", t);
    match repr.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}
