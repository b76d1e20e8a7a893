/// Entry point of a compiled formula routine.
///
/// The routine takes no arguments: every variable it reads or writes is addressed
/// through the storage cells baked into it at compile time. It returns the value of
/// the formula's root expression.
pub type NativeEntry = extern "C" fn() -> f64;
