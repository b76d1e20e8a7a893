//! Error types for the formula-jit crate.
//!
//! This module defines the error types for every stage a formula passes through:
//!
//! - `ConvertError`: The parsed operator tree contains something outside the formula grammar
//! - `BuilderError`: Errors raised by Cranelift while building or finalizing native code
//! - `CompileError`: A syntactically valid formula that cannot be turned into a routine
//! - `FormulaError`: High-level errors surfaced through the `Formula` façade
//!
//! The public façade never hands these out directly; it renders them into
//! `Formula::error_string`. Rust callers that prefer `Result` can use `Formula::try_new`.

use cranelift_codegen::CodegenError;
use cranelift_module::ModuleError;
use evalexpr::{DefaultNumericTypes, EvalexprError};
use thiserror::Error;

/// Errors that can occur while converting the evalexpr operator tree into a `SyntaxTree`.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Error when encountering an operator that the formula grammar does not contain
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// Error when a constant is not a number (strings, booleans, tuples)
    #[error("Expected numeric constant: {0}")]
    ConstOperator(String),
    /// Error when a root node or argument list has an unexpected shape
    #[error("Malformed expression: {0}")]
    Malformed(String),
}

/// Errors that can occur during JIT compilation of a formula.
///
/// These represent failures of the native code generation engine itself rather than
/// problems with the formula the user wrote.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// Error when the target machine architecture is not supported
    #[error("host machine is not supported: {0}")]
    HostMachineNotSupported(String),
    /// Error when a Cranelift setting is rejected
    #[error("settings error: {0}")]
    SettingsError(String),
    /// Error during Cranelift code generation
    #[error("codegen error: {0}")]
    CodegenError(CodegenError),
    /// Error in the Cranelift JIT module
    #[error("module error: {0}")]
    ModuleError(ModuleError),
    /// Error when defining the JIT function
    #[error("function error: {0}")]
    FunctionError(String),
    /// Error when declaring the JIT function or one of its imports
    #[error("declaration error: {0}")]
    DeclarationError(String),
    /// The generated routine failed structural verification
    #[error("verifier error: {0}")]
    VerifierError(String),
}

/// Errors that can occur when lowering a syntax tree for a backend.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The left side of `=` is not a variable reference
    #[error("left side of assignment must be a variable")]
    AssignToNonVariable,
    /// The left side of `=` names a built-in constant
    #[error("cannot assign to constant: {0}")]
    AssignToConstant(String),
    /// The formula calls a function outside the supported set
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    /// A known function was called with the wrong number of arguments
    #[error("function {function} expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },
    /// The formula references a variable with no bound address
    #[error("variable not bound: {0}")]
    UnboundVariable(String),
    /// The native engine failed while building the routine
    #[error("failed to build native routine: {0}")]
    Builder(#[from] BuilderError),
}

/// High-level errors that can occur when working with a `Formula`.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Error when parsing the expression string with evalexpr
    #[error("syntax error: {0}")]
    Syntax(#[from] EvalexprError<DefaultNumericTypes>),
    /// Error when the parsed expression is outside the formula grammar
    #[error("syntax error: {0}")]
    Convert(#[from] ConvertError),
    /// Error when the syntax tree cannot be compiled for the active backend
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// Error when the native engine could not be initialized
    #[error("engine error: {0}")]
    Engine(BuilderError),
    /// Error when evaluating before any expression was set
    #[error("no expression has been set")]
    NoExpression,
    /// Error when a compiled unit is handed to a backend of another kind
    #[error("compiled unit was produced by a different backend")]
    BackendMismatch,
}
