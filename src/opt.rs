//! Optimizer pipeline for freshly generated routines.
//!
//! Pass pipeline
//! -------------
//!  1. **simplify_cfg**         – compute the CFG and dominator tree, drop unreachable blocks.
//!  2. **remove_constant_phis** – remove block parameters that always carry the same value.
//!  3. **egraph**               – instruction combining, value numbering, constant
//!                                propagation and redundant load elimination in one
//!                                e-graph rewrite. Elaboration only re-emits values
//!                                that are used, so dead pure instructions go too.
//!  4. **cleanup_cfg**          – recompute the CFG and drop anything the rewrites orphaned.
//!  5. **verify**               – structural verification; a failure is a generator bug.
//!
//! The pipeline runs exactly once per routine, after the body is closed with its
//! return and before the routine is defined in the module.

use cranelift_codegen::control::ControlPlane;
use cranelift_codegen::isa::TargetIsa;
use cranelift_codegen::Context;

use crate::errors::BuilderError;

/// One transformation of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    SimplifyCfg,
    RemoveConstantPhis,
    Egraph,
    CleanupCfg,
    Verify,
}

impl Pass {
    pub fn name(self) -> &'static str {
        match self {
            Pass::SimplifyCfg => "simplify_cfg",
            Pass::RemoveConstantPhis => "remove_constant_phis",
            Pass::Egraph => "egraph",
            Pass::CleanupCfg => "cleanup_cfg",
            Pass::Verify => "verify",
        }
    }

    fn apply(self, ctx: &mut Context, isa: &dyn TargetIsa) -> Result<(), BuilderError> {
        match self {
            Pass::SimplifyCfg | Pass::CleanupCfg => {
                ctx.compute_cfg();
                ctx.compute_domtree();
                ctx.eliminate_unreachable_code(isa)
                    .map_err(BuilderError::CodegenError)
            }
            Pass::RemoveConstantPhis => ctx
                .remove_constant_phis(isa)
                .map_err(BuilderError::CodegenError),
            Pass::Egraph => ctx
                .egraph_pass(isa, &mut ControlPlane::default())
                .map_err(BuilderError::CodegenError),
            Pass::Verify => ctx.verify(isa).map_err(|errors| {
                let message = errors.to_string();
                log::error!("generated routine failed verification:\n{message}");
                debug_assert!(false, "generated routine failed verification: {message}");
                BuilderError::VerifierError(message)
            }),
        }
    }
}

/// Ordered sequence of passes, applied once per routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerPipeline {
    passes: Vec<Pass>,
}

impl OptimizerPipeline {
    /// The fixed pipeline every compiled routine goes through.
    pub fn standard() -> Self {
        Self {
            passes: vec![
                Pass::SimplifyCfg,
                Pass::RemoveConstantPhis,
                Pass::Egraph,
                Pass::CleanupCfg,
                Pass::Verify,
            ],
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Runs every pass in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the `BuilderError` of the failing pass; a verifier failure is
    /// `BuilderError::VerifierError` and additionally panics in debug builds.
    pub fn run(&self, ctx: &mut Context, isa: &dyn TargetIsa) -> Result<(), BuilderError> {
        for pass in &self.passes {
            log::trace!("running pass {}", pass.name());
            pass.apply(ctx, isa)?;
        }
        Ok(())
    }
}
