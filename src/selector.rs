//! Runtime selection of the fastest backend.
//!
//! `BackendSelector` compiles one representative formula on every backend, times a
//! batch of evaluations and picks the quickest. [`fastest_backend`] runs the default
//! selection once per process and caches the answer.

use std::cell::Cell;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::{
    backends::{Backend, BackendChoice},
    convert::parse,
    errors::FormulaError,
    variables::VariableTable,
};

static FASTEST: OnceLock<BackendChoice> = OnceLock::new();

/// Returns the fastest backend on this host.
///
/// The first call blocks while every backend is measured with
/// `SelectorConfig::default()`; later calls return the cached choice.
pub fn fastest_backend() -> BackendChoice {
    *FASTEST.get_or_init(|| BackendSelector::new(SelectorConfig::default()).select())
}

/// Workload used to compare backends.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// Formula over the variables `x`, `y` and `z`
    pub expression: String,
    /// Evaluations per backend
    pub iterations: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            expression:
                "x = sin(y) * cos(z) + sqrt(y^2 + z^2) / (1 + exp(-y)) - if(y > z, y, z) * 0.5"
                    .to_string(),
            iterations: 100_000,
        }
    }
}

/// Outcome of timing one backend.
#[derive(Debug)]
pub struct Measurement {
    pub backend: BackendChoice,
    /// Wall-clock time of the evaluation batch, or why the backend was excluded
    pub duration: Result<Duration, FormulaError>,
}

/// Measures every backend against one workload.
#[derive(Debug, Clone, Default)]
pub struct BackendSelector {
    config: SelectorConfig,
}

impl BackendSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Times every concrete backend, in `BackendChoice::ALL` order.
    pub fn measure(&self) -> Vec<Measurement> {
        BackendChoice::ALL
            .into_iter()
            .map(|backend| {
                let duration = self.time(backend);
                match &duration {
                    Ok(elapsed) => log::debug!("{backend} backend took {elapsed:?}"),
                    Err(error) => log::warn!("excluding {backend} backend: {error}"),
                }
                Measurement { backend, duration }
            })
            .collect()
    }

    /// Picks the backend with the lowest measured duration.
    ///
    /// Falls back to `Interpreting` if no backend could be measured.
    pub fn select(&self) -> BackendChoice {
        let choice = self
            .measure()
            .into_iter()
            .filter_map(|m| m.duration.ok().map(|duration| (m.backend, duration)))
            .min_by_key(|&(_, duration)| duration)
            .map_or(BackendChoice::Interpreting, |(backend, _)| backend);
        log::debug!("selected {choice} backend");
        choice
    }

    fn time(&self, choice: BackendChoice) -> Result<Duration, FormulaError> {
        let backend = Backend::new(choice).map_err(FormulaError::Engine)?;
        let tree = parse(&self.config.expression)?;

        let x = Cell::new(0.0_f64);
        let y = Cell::new(1.5_f64);
        let z = Cell::new(0.5_f64);
        let mut variables = VariableTable::new();
        variables.bind("x", x.as_ptr());
        variables.bind("y", y.as_ptr());
        variables.bind("z", z.as_ptr());

        // The cells outlive `unit`, which is dropped at the end of this scope
        let unit = backend.compile(&tree, &variables)?;
        backend.evaluate(&unit)?;

        let start = Instant::now();
        for i in 0..self.config.iterations {
            y.set(f64::from(i % 100) * 0.01);
            backend.evaluate(&unit)?;
        }
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompileError;

    fn quick(expression: &str) -> BackendSelector {
        BackendSelector::new(SelectorConfig {
            expression: expression.to_string(),
            iterations: 1_000,
        })
    }

    #[test]
    fn test_measures_every_backend() {
        let measurements = BackendSelector::new(SelectorConfig {
            iterations: 1_000,
            ..SelectorConfig::default()
        })
        .measure();
        assert_eq!(measurements.len(), BackendChoice::ALL.len());
        for (measurement, backend) in measurements.iter().zip(BackendChoice::ALL) {
            assert_eq!(measurement.backend, backend);
            assert!(measurement.duration.is_ok());
        }
    }

    #[test]
    fn test_select_returns_concrete_backend() {
        let choice = quick("x = y * z + 1").select();
        assert!(BackendChoice::ALL.contains(&choice));
    }

    #[test]
    fn test_failing_workload_excludes_backends() {
        let selector = quick("cbrt(y)");
        for measurement in selector.measure() {
            assert!(matches!(
                measurement.duration,
                Err(FormulaError::Compile(CompileError::UnknownFunction(_)))
            ));
        }
        assert_eq!(selector.select(), BackendChoice::Interpreting);
    }

    #[test]
    fn test_fastest_backend_is_cached() {
        let first = fastest_backend();
        assert_eq!(fastest_backend(), first);
        assert_ne!(first, BackendChoice::Default);
    }
}
