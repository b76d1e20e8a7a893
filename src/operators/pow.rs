//! Functions for linking and calling the power function in JIT-compiled code.
//!
//! `^` is never inlined: it is always lowered to a call of `pow(base, exponent)`,
//! which handles fractional, negative and zero exponents.

use cranelift::prelude::FunctionBuilder;
use cranelift_codegen::ir::types::F64;
use cranelift_codegen::ir::{AbiParam, FuncRef, InstBuilder, Value};
use cranelift_module::{Linkage, Module};

use crate::errors::BuilderError;

/// Name the power routine is linked under.
pub(crate) const POW_SYMBOL: &str = "pow";

pub(crate) extern "C" fn native_pow(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

/// Declares `pow` in the module and imports it into the function being built.
///
/// # Returns
/// * `Ok(FuncRef)` - The function reference to pass to [`call_pow`]
/// * `Err(BuilderError)` - If the declaration fails
pub(crate) fn link_pow(
    builder: &mut FunctionBuilder,
    module: &mut dyn Module,
) -> Result<FuncRef, BuilderError> {
    // Create signature for pow(f64, f64) -> f64
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(F64)); // base
    sig.params.push(AbiParam::new(F64)); // exponent
    sig.returns.push(AbiParam::new(F64)); // result

    let func_id = module
        .declare_function(POW_SYMBOL, Linkage::Import, &sig)
        .map_err(|e| BuilderError::DeclarationError(e.to_string()))?;

    Ok(module.declare_func_in_func(func_id, builder.func))
}

/// Emits a call to a previously linked `pow`.
pub(crate) fn call_pow(
    builder: &mut FunctionBuilder,
    func: FuncRef,
    base: Value,
    exponent: Value,
) -> Value {
    let call = builder.ins().call(func, &[base, exponent]);
    builder.inst_results(call)[0]
}
