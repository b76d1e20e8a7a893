//! Compiling backend: formulas become native routines through Cranelift.

use std::sync::Arc;

use cranelift_codegen::isa::TargetIsa;

use crate::{
    builder::{build_routine, host_isa, NativeRoutine},
    errors::{BuilderError, CompileError},
    expr::SyntaxTree,
    variables::VariableTable,
};

/// Backend that compiles every formula into a native routine.
///
/// All compiling backends share the process-wide host ISA; each compiled routine owns
/// its own module and executable memory.
#[derive(Clone)]
pub struct CompilingBackend {
    isa: Arc<dyn TargetIsa>,
}

impl CompilingBackend {
    /// Creates the backend, initializing the host engine on first use.
    ///
    /// # Errors
    /// Returns `BuilderError::HostMachineNotSupported` if Cranelift cannot target the host.
    pub fn new() -> Result<Self, BuilderError> {
        Ok(Self { isa: host_isa()? })
    }

    pub fn compile(
        &self,
        tree: &SyntaxTree,
        variables: &VariableTable,
    ) -> Result<NativeRoutine, CompileError> {
        build_routine(self.isa.clone(), tree, variables)
    }

    pub fn evaluate(&self, routine: &NativeRoutine) -> f64 {
        routine.call()
    }
}

impl std::fmt::Debug for CompilingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilingBackend")
            .field("isa", &self.isa.name())
            .field("triple", &self.isa.triple().to_string())
            .finish()
    }
}
