//! JIT-compiled evaluator for small algebraic formulas over external variables.
//!
//! A [`Formula`] binds variable names to `f64` storage owned by the caller, parses an
//! expression once and then evaluates it as often as needed. Assignments inside the
//! expression write straight into the caller's storage. Parsing builds on the
//! [evalexpr](https://github.com/ISibboI/evalexpr) crate; the compiling backend uses
//! [Cranelift](https://github.com/bytecodealliance/wasmtime/tree/main/cranelift) to turn
//! each formula into a native routine.
//!
//! # Features
//!
//! - Two interchangeable backends: tree interpretation and native compilation
//! - Arithmetic, comparisons, `^`, assignment, `if`, `sign` and 19 math functions
//! - Runtime selection of the fastest backend with [`fastest_backend`]
//! - No panics across the public surface: failures go to [`Formula::error_string`]
//!
//! `^` is left-associative, as evalexpr parses it: `2^3^2` is `(2^3)^2 = 64`.
//! Write `2^(3^2)` for the other grouping.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use formula_jit::{create_formula, BackendChoice};
//!
//! let x = Cell::new(0.0_f64);
//! let y = Cell::new(2.0_f64);
//! let z = Cell::new(3.0_f64);
//!
//! let mut formula = create_formula(BackendChoice::Default).unwrap();
//! // SAFETY: the cells outlive `formula`.
//! unsafe {
//!     formula.set_variable("x", x.as_ptr());
//!     formula.set_variable("y", y.as_ptr());
//!     formula.set_variable("z", z.as_ptr());
//! }
//!
//! assert!(formula.set_expression("x = y * z"));
//! assert_eq!(formula.evaluate(), 6.0);
//! assert_eq!(x.get(), 6.0);
//!
//! // Values are read at evaluation time
//! z.set(0.5);
//! assert_eq!(formula.evaluate(), 1.0);
//! ```

pub use backends::{Backend, BackendChoice, CompiledUnit};
pub use errors::FormulaError;
pub use formula::{create_formula, Formula};
pub use selector::{fastest_backend, BackendSelector, Measurement, SelectorConfig};

pub mod prelude {
    pub use crate::backends::{Backend, BackendChoice, CompiledUnit};
    pub use crate::builder::get_clif_ir;
    pub use crate::convert::parse;
    pub use crate::expr::{BinaryOperator, Node, SyntaxTree};
    pub use crate::formula::{create_formula, Formula};
    pub use crate::selector::fastest_backend;
    pub use crate::variables::VariableTable;
}

/// Interpreting and compiling execution backends
pub mod backends;
/// Native code generation engine using Cranelift
pub mod builder;
/// Translation of syntax trees into Cranelift IR
mod codegen;
/// Conversion from parsed expressions to the syntax tree
pub mod convert;
/// Error types for the various failure modes
pub mod errors;
/// Syntax tree representation
pub mod expr;
/// The `Formula` façade
pub mod formula;
/// The closed set of math functions and their native routines
pub mod operators;
/// Optimizer pipeline applied to every compiled routine
pub mod opt;
/// Backend benchmarking and selection
pub mod selector;
/// Variable slot cache of compiled routines
pub mod slots;
/// Native entry-point type
pub mod types;
/// Variable bindings
pub mod variables;
