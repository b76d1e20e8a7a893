//! Functions for linking and calling single-argument math routines in JIT-compiled code.

use cranelift::prelude::FunctionBuilder;
use cranelift_codegen::ir::types::F64;
use cranelift_codegen::ir::{AbiParam, FuncRef, InstBuilder, Value};
use cranelift_module::{Linkage, Module};

use super::MathFunction;
use crate::errors::BuilderError;

/// Declares the routine for `function` and imports it into the function being built.
///
/// The routine is declared with signature `f64 -> f64` under its C name; the JIT
/// resolves that name to the routine registered by `register_symbols`.
pub(crate) fn link_unary(
    builder: &mut FunctionBuilder,
    module: &mut dyn Module,
    function: MathFunction,
) -> Result<FuncRef, BuilderError> {
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(F64));
    sig.returns.push(AbiParam::new(F64));

    let func_id = module
        .declare_function(function.symbol(), Linkage::Import, &sig)
        .map_err(|e| BuilderError::DeclarationError(e.to_string()))?;

    Ok(module.declare_func_in_func(func_id, builder.func))
}

/// Emits a call to a previously linked single-argument routine.
pub(crate) fn call_unary(builder: &mut FunctionBuilder, func: FuncRef, arg: Value) -> Value {
    let call = builder.ins().call(func, &[arg]);
    builder.inst_results(call)[0]
}
