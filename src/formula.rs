//! The `Formula` façade.
//!
//! A `Formula` owns one backend, the variable bindings, the current expression and its
//! compiled unit. Nothing it does panics or returns `Result`: failures are reported
//! through a `bool` (or a NaN result) and a readable message in [`Formula::error_string`].
//!
//! # Lifecycle
//! - `set_expression` parses and compiles eagerly. A syntax error leaves the previous
//!   expression and unit in place. A compile error is kept and reported by the next
//!   `evaluate`.
//! - `set_variable` with a new address invalidates the unit; it is rebuilt by the
//!   next `evaluate`. Rebinding the same address keeps the unit.
//! - `evaluate` runs the unit against the current values of the bound variables.

use std::fmt;

use crate::{
    backends::{Backend, BackendChoice, CompiledUnit},
    convert::parse,
    errors::FormulaError,
    expr::SyntaxTree,
    variables::{Binding, VariableTable},
};

#[derive(Debug)]
enum UnitState {
    /// No expression has been set
    Empty,
    Ready(CompiledUnit),
    /// The expression is valid but could not be compiled
    Failed(FormulaError),
    /// A binding changed since the unit was built
    Stale,
}

/// A formula bound to externally owned variables.
///
/// # Examples
///
/// ```rust
/// use std::cell::Cell;
/// use formula_jit::{BackendChoice, Formula};
///
/// let x = Cell::new(0.0_f64);
/// let y = Cell::new(2.0_f64);
///
/// let mut formula = Formula::new(BackendChoice::Default).unwrap();
/// // SAFETY: `x` and `y` outlive `formula`.
/// unsafe {
///     formula.set_variable("x", x.as_ptr());
///     formula.set_variable("y", y.as_ptr());
/// }
/// assert!(formula.set_expression("x = y * 3"));
/// assert_eq!(formula.evaluate(), 6.0);
/// assert_eq!(x.get(), 6.0);
/// ```
pub struct Formula {
    backend: Backend,
    variables: VariableTable,
    expression: String,
    tree: Option<SyntaxTree>,
    unit: UnitState,
    error: String,
}

impl Formula {
    /// Creates a formula on the requested backend.
    ///
    /// Returns `None` if the backend cannot be created, which only happens when
    /// `Compiling` is requested on a host the native engine does not support.
    pub fn new(choice: BackendChoice) -> Option<Self> {
        Self::try_new(choice)
            .map_err(|e| log::warn!("cannot create {choice} formula: {e}"))
            .ok()
    }

    /// Creates a formula on the requested backend.
    ///
    /// # Errors
    /// Returns `FormulaError::Engine` if the native engine cannot be initialized.
    pub fn try_new(choice: BackendChoice) -> Result<Self, FormulaError> {
        let backend = Backend::new(choice).map_err(FormulaError::Engine)?;
        Ok(Self {
            backend,
            variables: VariableTable::new(),
            expression: String::new(),
            tree: None,
            unit: UnitState::Empty,
            error: String::new(),
        })
    }

    /// Parses `text` and compiles it for the active backend.
    ///
    /// Returns `false` only for a syntax error, in which case the previous expression
    /// stays active. Compile errors are reported by the next [`Formula::evaluate`].
    pub fn set_expression(&mut self, text: &str) -> bool {
        let tree = match parse(text) {
            Ok(tree) => tree,
            Err(error) => {
                log::debug!("rejected expression `{text}`: {error}");
                self.error = error.to_string();
                return false;
            }
        };
        log::debug!("parsed `{text}` as {tree}");

        self.expression = text.to_string();
        self.tree = Some(tree);
        self.rebuild();
        self.error.clear();
        true
    }

    /// The text of the active expression, empty if none was set.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Binds `name` to an externally owned `f64`.
    ///
    /// Returns `false` for an empty name, the constant names `pi` and `e`, or a null
    /// address.
    ///
    /// # Safety
    /// `address` must point to a valid, aligned `f64` that is not accessed through a
    /// conflicting reference while `evaluate` runs, and it must stay valid until the
    /// name is rebound or the formula is dropped. Evaluation reads and writes through
    /// it directly.
    pub unsafe fn set_variable(&mut self, name: &str, address: *mut f64) -> bool {
        match self.variables.bind(name, address) {
            None => {
                self.error = format!("cannot bind variable `{name}`");
                false
            }
            Some(Binding::Unchanged) => true,
            Some(Binding::Added | Binding::Replaced) => {
                if self.tree.is_some() {
                    self.unit = UnitState::Stale;
                }
                true
            }
        }
    }

    /// Evaluates the active expression.
    ///
    /// Returns NaN and sets the error string if there is no expression or it could not
    /// be compiled. NaN can also be a genuine result, check `error_string` to tell
    /// the two apart.
    pub fn evaluate(&mut self) -> f64 {
        if matches!(self.unit, UnitState::Stale) {
            self.rebuild();
        }

        let result = match &self.unit {
            UnitState::Ready(unit) => self.backend.evaluate(unit),
            UnitState::Failed(error) => {
                self.error = error.to_string();
                return f64::NAN;
            }
            UnitState::Empty | UnitState::Stale => Err(FormulaError::NoExpression),
        };

        match result {
            Ok(value) => {
                self.error.clear();
                value
            }
            Err(error) => {
                self.error = error.to_string();
                f64::NAN
            }
        }
    }

    /// Message of the last failure, empty after a successful operation.
    pub fn error_string(&self) -> &str {
        &self.error
    }

    /// The concrete backend this formula runs on.
    pub fn backend(&self) -> BackendChoice {
        self.backend.choice()
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// Optimized CLIF of the current unit.
    ///
    /// `None` on the interpreting backend, and while there is no up to date unit.
    pub fn compiled_ir(&self) -> Option<&str> {
        match &self.unit {
            UnitState::Ready(unit) => unit.ir(),
            _ => None,
        }
    }

    fn rebuild(&mut self) {
        // The old unit must be gone before a new one points at the same storage
        self.unit = UnitState::Empty;
        let Some(tree) = &self.tree else {
            return;
        };
        self.unit = match self.backend.compile(tree, &self.variables) {
            Ok(unit) => UnitState::Ready(unit),
            Err(error) => {
                log::debug!("cannot compile `{tree}`: {error}");
                UnitState::Failed(error.into())
            }
        };
    }
}

/// Creates a formula on the requested backend.
///
/// Returns `None` if the backend cannot be created.
pub fn create_formula(choice: BackendChoice) -> Option<Formula> {
    Formula::new(choice)
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("expression", &self.expression)
            .field("backend", &self.backend.choice())
            .field("variables", &self.variables.names())
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.expression, self.backend.choice())
    }
}
