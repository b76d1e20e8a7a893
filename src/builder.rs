//! This module provides the native code generation engine built on Cranelift.
//!
//! The main entry points are:
//! - `host_isa()` - Returns the process-wide target ISA, creating it on first use
//! - `build_routine()` - Compiles a syntax tree into a finalized `NativeRoutine`
//! - `get_clif_ir()` - Returns the optimized CLIF text of a formula, for inspection
//!
//! # Engine lifetime
//! The target ISA is the only process-wide engine state. It is constructed lazily,
//! exactly once, the first time a compiling backend is created, and lives until the
//! process exits. Every compiled routine gets its own `JITModule` on top of that ISA;
//! the module (and its executable memory) is released when the routine is dropped.

use std::sync::{Arc, OnceLock};

use cranelift::prelude::*;
use cranelift_codegen::Context;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::Module;
use isa::TargetIsa;

use crate::{
    codegen::CodeGenerator,
    errors::{BuilderError, CompileError, FormulaError},
    expr::SyntaxTree,
    opt::OptimizerPipeline,
    operators,
    slots::{SlotRegistry, VariableSlotCache},
    types::NativeEntry,
    variables::VariableTable,
};

static HOST_ISA: OnceLock<Result<Arc<dyn TargetIsa>, String>> = OnceLock::new();

/// Returns the target ISA for the host machine.
///
/// The ISA is created on the first call and shared by every compiling backend in the
/// process. If the host is not supported, every call reports the same error.
///
/// # Errors
/// Returns `BuilderError::HostMachineNotSupported` if Cranelift cannot target the host.
pub fn host_isa() -> Result<Arc<dyn TargetIsa>, BuilderError> {
    HOST_ISA
        .get_or_init(|| create_isa().map_err(|e| e.to_string()))
        .clone()
        .map_err(BuilderError::HostMachineNotSupported)
}

/// Creates an Instruction Set Architecture (ISA) target for code generation.
///
/// This function detects the host machine architecture and configures appropriate
/// compilation flags:
/// - Optimization for speed
/// - IR verification in debug builds only
/// - Libcall placement by architecture
/// - Non-PIC code, which is the only mode `JITModule` accepts
pub(crate) fn create_isa() -> Result<Arc<dyn TargetIsa>, BuilderError> {
    let mut flag_builder = settings::builder();

    let target_triple = target_lexicon::Triple::host();
    let is_x86 = matches!(
        target_triple.architecture,
        target_lexicon::Architecture::X86_64
    );

    let verifier = if cfg!(debug_assertions) { "true" } else { "false" };
    let colocated = if is_x86 { "true" } else { "false" };
    let settings = [
        ("opt_level", "speed"),
        ("enable_verifier", verifier),
        ("use_colocated_libcalls", colocated),
        ("is_pic", "false"),
    ];
    for (name, value) in settings {
        flag_builder
            .set(name, value)
            .map_err(|e| BuilderError::SettingsError(format!("{name}={value}: {e}")))?;
    }

    let isa_builder = cranelift_native::builder()
        .map_err(|msg| BuilderError::HostMachineNotSupported(msg.to_string()))?;

    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(BuilderError::CodegenError)
}

/// Creates a JIT module and a function context for one nullary routine.
///
/// The module links the math routines under their C names and resolves imported data
/// symbols through `registry`, which the slot cache fills during code generation.
pub(crate) fn create_module_and_context(
    isa: Arc<dyn TargetIsa>,
    registry: &SlotRegistry,
) -> (JITModule, Context) {
    let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
    operators::register_symbols(&mut builder);

    let resolver = registry.clone();
    builder.symbol_lookup_fn(Box::new(move |name: &str| resolver.lookup(name)));

    let module = JITModule::new(builder);
    let mut ctx = module.make_context();

    // Signature: extern "C" fn() -> f64
    let mut sig = module.make_signature();
    sig.returns.push(AbiParam::new(types::F64));
    ctx.func.signature = sig;

    (module, ctx)
}

/// A finalized native routine together with the module that owns its code.
pub struct NativeRoutine {
    module: Option<JITModule>,
    entry: NativeEntry,
    slots: VariableSlotCache,
    ir: String,
}

impl NativeRoutine {
    /// Invokes the routine.
    ///
    /// Every address the routine was generated against must still be valid (see the
    /// safety contract of `VariableTable`).
    pub fn call(&self) -> f64 {
        (self.entry)()
    }

    pub fn slots(&self) -> &VariableSlotCache {
        &self.slots
    }

    /// Optimized CLIF the routine was compiled from.
    pub fn ir(&self) -> &str {
        &self.ir
    }
}

impl Drop for NativeRoutine {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: `entry` points into this module and is dropped with `self`;
            // no other copy of it is handed out.
            unsafe { module.free_memory() };
        }
    }
}

impl std::fmt::Debug for NativeRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRoutine")
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

/// Compiles a syntax tree into a native routine.
///
/// This function:
/// 1. Creates a fresh module, context and slot cache
/// 2. Generates the routine body from the tree
/// 3. Runs the optimizer pipeline, ending in verification
/// 4. Defines and finalizes the routine and extracts its entry point
///
/// On any failure the partially built module is released and nothing is returned.
pub fn build_routine(
    isa: Arc<dyn TargetIsa>,
    tree: &SyntaxTree,
    variables: &VariableTable,
) -> Result<NativeRoutine, CompileError> {
    let registry = SlotRegistry::default();
    let (mut module, mut ctx) = create_module_and_context(isa.clone(), &registry);
    let mut slots = VariableSlotCache::new(registry);

    let result = build_function_body(&mut ctx, tree, variables, &mut module, &mut slots)
        .and_then(|()| {
            OptimizerPipeline::standard().run(&mut ctx, isa.as_ref())?;
            Ok(ctx.func.display().to_string())
        })
        .and_then(|ir| {
            let entry = compile_and_finalize(&mut module, &mut ctx)?;
            Ok((entry, ir))
        });

    match result {
        Ok((entry, ir)) => {
            log::debug!("compiled `{tree}` with {} variable slot(s)", slots.len());
            log::trace!("optimized routine for `{tree}`:\n{ir}");
            Ok(NativeRoutine {
                module: Some(module),
                entry,
                slots,
                ir,
            })
        }
        Err(error) => {
            module.clear_context(&mut ctx);
            // SAFETY: no function pointer from this module escaped.
            unsafe { module.free_memory() };
            Err(error)
        }
    }
}

/// Builds the function body by generating Cranelift IR from the syntax tree.
///
/// The routine has a single block: every construct of the grammar, including `if`
/// and `sign`, is lowered without branches.
fn build_function_body(
    ctx: &mut Context,
    tree: &SyntaxTree,
    variables: &VariableTable,
    module: &mut JITModule,
    slots: &mut VariableSlotCache,
) -> Result<(), CompileError> {
    let mut builder_ctx = FunctionBuilderContext::new();
    let mut func_builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

    let entry_block = func_builder.create_block();
    func_builder.switch_to_block(entry_block);
    func_builder.seal_block(entry_block);

    let result = {
        let mut generator = CodeGenerator::new(&mut func_builder, module, variables, slots);
        generator.generate(tree.root())?
    };
    func_builder.ins().return_(&[result]);
    func_builder.finalize();

    Ok(())
}

/// Compiles and finalizes the routine, returning its entry point.
///
/// # Errors
/// Returns a BuilderError if:
/// - Function declaration fails
/// - Function definition fails
/// - Module finalization fails
fn compile_and_finalize(
    module: &mut JITModule,
    ctx: &mut Context,
) -> Result<NativeEntry, BuilderError> {
    let func_id = module
        .declare_anonymous_function(&ctx.func.signature)
        .map_err(|msg| BuilderError::DeclarationError(msg.to_string()))?;

    module
        .define_function(func_id, ctx)
        .map_err(|msg| BuilderError::FunctionError(msg.to_string()))?;

    module.clear_context(ctx);
    module
        .finalize_definitions()
        .map_err(BuilderError::ModuleError)?;

    // SAFETY: This transmute is safe because:
    // - The function was compiled with the signature extern "C" fn() -> f64
    // - The module is owned by the NativeRoutine that also owns this pointer
    let func = unsafe {
        std::mem::transmute::<*const u8, NativeEntry>(module.get_finalized_function(func_id))
    };
    Ok(func)
}

/// Compiles a formula purely to return the optimized CLIF IR of its routine.
///
/// # Errors
/// Returns a `FormulaError` if parsing, the engine or compilation fails.
pub fn get_clif_ir(text: &str, variables: &VariableTable) -> Result<String, FormulaError> {
    let tree = crate::convert::parse(text)?;
    let isa = host_isa().map_err(FormulaError::Engine)?;
    let routine = build_routine(isa, &tree, variables)?;
    Ok(routine.ir().to_string())
}
