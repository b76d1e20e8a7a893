//! Execution backends.
//!
//! A `Backend` turns a `SyntaxTree` plus a `VariableTable` into a `CompiledUnit`, and
//! evaluates that unit. There are two variants:
//!
//! - `Interpreting`: resolves the tree once and walks it on every evaluation
//! - `Compiling`: generates, optimizes and finalizes a native routine
//!
//! Both variants implement identical semantics; the only observable difference is
//! speed. A unit may only be evaluated by the kind of backend that produced it.

use std::fmt;
use std::str::FromStr;

use crate::{
    builder::{host_isa, NativeRoutine},
    errors::{BuilderError, CompileError, FormulaError},
    expr::SyntaxTree,
    variables::VariableTable,
};

pub mod interpreter;
pub mod jit;

pub use interpreter::{InterpretedUnit, InterpretingBackend};
pub use jit::CompilingBackend;

/// Which backend a `Formula` should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendChoice {
    /// The compiling backend if the host engine is available, else interpreting
    #[default]
    Default,
    Interpreting,
    Compiling,
}

impl BackendChoice {
    /// The concrete backends, in the order the selector measures them.
    pub const ALL: [BackendChoice; 2] = [BackendChoice::Interpreting, BackendChoice::Compiling];

    /// Resolves `Default` to a concrete backend. Concrete choices are returned as is.
    pub fn resolve(self) -> BackendChoice {
        match self {
            BackendChoice::Default if host_isa().is_ok() => BackendChoice::Compiling,
            BackendChoice::Default => BackendChoice::Interpreting,
            concrete => concrete,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendChoice::Default => "default",
            BackendChoice::Interpreting => "interpreting",
            BackendChoice::Compiling => "compiling",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(BackendChoice::Default),
            "interpreting" | "interpreter" => Ok(BackendChoice::Interpreting),
            "compiling" | "jit" => Ok(BackendChoice::Compiling),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// The artifact of compiling a tree with one backend.
#[derive(Debug)]
pub enum CompiledUnit {
    Interpreted(InterpretedUnit),
    Native(NativeRoutine),
}

impl CompiledUnit {
    /// The backend kind that produced this unit.
    pub fn backend(&self) -> BackendChoice {
        match self {
            CompiledUnit::Interpreted(_) => BackendChoice::Interpreting,
            CompiledUnit::Native(_) => BackendChoice::Compiling,
        }
    }

    /// Optimized CLIF of a native unit.
    pub fn ir(&self) -> Option<&str> {
        match self {
            CompiledUnit::Interpreted(_) => None,
            CompiledUnit::Native(routine) => Some(routine.ir()),
        }
    }
}

/// One execution backend.
#[derive(Debug, Clone)]
pub enum Backend {
    Interpreting(InterpretingBackend),
    Compiling(CompilingBackend),
}

impl Backend {
    /// Creates the backend for `choice`.
    ///
    /// # Errors
    /// Returns a `BuilderError` if `Compiling` is requested and the host engine
    /// cannot be initialized. `Default` never fails.
    pub fn new(choice: BackendChoice) -> Result<Self, BuilderError> {
        let backend = match choice.resolve() {
            BackendChoice::Compiling => Backend::Compiling(CompilingBackend::new()?),
            _ => Backend::Interpreting(InterpretingBackend::new()),
        };
        log::debug!("created {} backend", backend.choice());
        Ok(backend)
    }

    /// The concrete variant of this backend.
    pub fn choice(&self) -> BackendChoice {
        match self {
            Backend::Interpreting(_) => BackendChoice::Interpreting,
            Backend::Compiling(_) => BackendChoice::Compiling,
        }
    }

    pub fn compile(
        &self,
        tree: &SyntaxTree,
        variables: &VariableTable,
    ) -> Result<CompiledUnit, CompileError> {
        match self {
            Backend::Interpreting(backend) => {
                backend.compile(tree, variables).map(CompiledUnit::Interpreted)
            }
            Backend::Compiling(backend) => backend.compile(tree, variables).map(CompiledUnit::Native),
        }
    }

    /// Evaluates a unit produced by this backend.
    ///
    /// # Errors
    /// Returns `FormulaError::BackendMismatch` if the unit came from the other variant.
    pub fn evaluate(&self, unit: &CompiledUnit) -> Result<f64, FormulaError> {
        match (self, unit) {
            (Backend::Interpreting(backend), CompiledUnit::Interpreted(unit)) => {
                Ok(backend.evaluate(unit))
            }
            (Backend::Compiling(backend), CompiledUnit::Native(routine)) => {
                Ok(backend.evaluate(routine))
            }
            _ => Err(FormulaError::BackendMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::parse;

    #[test]
    fn test_choice_names() {
        for choice in [
            BackendChoice::Default,
            BackendChoice::Interpreting,
            BackendChoice::Compiling,
        ] {
            assert_eq!(choice.to_string().parse::<BackendChoice>(), Ok(choice));
        }
        assert_eq!("JIT".parse::<BackendChoice>(), Ok(BackendChoice::Compiling));
        assert!("gpu".parse::<BackendChoice>().is_err());
    }

    #[test]
    fn test_default_resolves_to_concrete() {
        let resolved = BackendChoice::Default.resolve();
        assert!(BackendChoice::ALL.contains(&resolved));
        assert_eq!(Backend::new(BackendChoice::Default).unwrap().choice(), resolved);
        assert_eq!(
            BackendChoice::Interpreting.resolve(),
            BackendChoice::Interpreting
        );
    }

    #[test]
    fn test_backends_agree() {
        let tree = parse("sqrt(16) + 2 ^ 3 - (1 < 2)").unwrap();
        let variables = VariableTable::new();
        for choice in BackendChoice::ALL {
            let backend = Backend::new(choice).unwrap();
            let unit = backend.compile(&tree, &variables).unwrap();
            assert_eq!(unit.backend(), choice);
            assert_eq!(backend.evaluate(&unit).unwrap(), 11.0);
        }
    }

    #[test]
    fn test_mismatched_unit_is_rejected() {
        let tree = parse("1 + 1").unwrap();
        let variables = VariableTable::new();
        let interpreting = Backend::new(BackendChoice::Interpreting).unwrap();
        let compiling = Backend::new(BackendChoice::Compiling).unwrap();

        let unit = interpreting.compile(&tree, &variables).unwrap();
        assert!(unit.ir().is_none());
        assert!(matches!(
            compiling.evaluate(&unit),
            Err(FormulaError::BackendMismatch)
        ));

        let unit = compiling.compile(&tree, &variables).unwrap();
        assert!(unit.ir().is_some());
        assert!(matches!(
            interpreting.evaluate(&unit),
            Err(FormulaError::BackendMismatch)
        ));
    }
}
