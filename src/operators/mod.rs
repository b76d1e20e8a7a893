//! The closed set of functions a formula may call.
//!
//! Every function is backed by an `extern "C"` routine. The compiling backend links
//! these routines into generated code under their C math library names, and the
//! interpreting backend calls the very same routines, so both backends agree bit for
//! bit on every function result.
//!
//! `if` and `sign` are not routines: they are lowered inline by each backend.

use cranelift_jit::JITBuilder;

pub(crate) mod pow;
pub(crate) mod unary;

/// Single-argument math routines available to formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Log2,
    /// Base-10 logarithm, spelled `log` or `log10` in formulas
    Log10,
    /// Natural logarithm, spelled `ln` in formulas
    Log,
    Exp,
    Sqrt,
    /// Absolute value, spelled `abs` or `fabs` in formulas
    Fabs,
    /// Round to nearest, ties to even
    Rint,
}

impl MathFunction {
    pub const ALL: [MathFunction; 19] = [
        MathFunction::Sin,
        MathFunction::Cos,
        MathFunction::Tan,
        MathFunction::Asin,
        MathFunction::Acos,
        MathFunction::Atan,
        MathFunction::Sinh,
        MathFunction::Cosh,
        MathFunction::Tanh,
        MathFunction::Asinh,
        MathFunction::Acosh,
        MathFunction::Atanh,
        MathFunction::Log2,
        MathFunction::Log10,
        MathFunction::Log,
        MathFunction::Exp,
        MathFunction::Sqrt,
        MathFunction::Fabs,
        MathFunction::Rint,
    ];

    /// Resolves the name used in a formula.
    ///
    /// The spelling `log` means base 10 and `ln` means natural logarithm; `abs` is
    /// accepted for `fabs`. After that rewrite the name must be one of the C math
    /// library names in [`MathFunction::symbol`].
    pub fn resolve(name: &str) -> Option<Self> {
        let symbol = match name {
            "log" => "log10",
            "ln" => return Some(MathFunction::Log),
            "abs" => "fabs",
            other => other,
        };
        Self::ALL.into_iter().find(|function| function.symbol() == symbol)
    }

    /// The C math library name the routine is linked under.
    pub fn symbol(self) -> &'static str {
        match self {
            MathFunction::Sin => "sin",
            MathFunction::Cos => "cos",
            MathFunction::Tan => "tan",
            MathFunction::Asin => "asin",
            MathFunction::Acos => "acos",
            MathFunction::Atan => "atan",
            MathFunction::Sinh => "sinh",
            MathFunction::Cosh => "cosh",
            MathFunction::Tanh => "tanh",
            MathFunction::Asinh => "asinh",
            MathFunction::Acosh => "acosh",
            MathFunction::Atanh => "atanh",
            MathFunction::Log2 => "log2",
            MathFunction::Log10 => "log10",
            MathFunction::Log => "log",
            MathFunction::Exp => "exp",
            MathFunction::Sqrt => "sqrt",
            MathFunction::Fabs => "fabs",
            MathFunction::Rint => "rint",
        }
    }

    /// The native routine implementing this function.
    pub fn routine(self) -> extern "C" fn(f64) -> f64 {
        match self {
            MathFunction::Sin => native_sin,
            MathFunction::Cos => native_cos,
            MathFunction::Tan => native_tan,
            MathFunction::Asin => native_asin,
            MathFunction::Acos => native_acos,
            MathFunction::Atan => native_atan,
            MathFunction::Sinh => native_sinh,
            MathFunction::Cosh => native_cosh,
            MathFunction::Tanh => native_tanh,
            MathFunction::Asinh => native_asinh,
            MathFunction::Acosh => native_acosh,
            MathFunction::Atanh => native_atanh,
            MathFunction::Log2 => native_log2,
            MathFunction::Log10 => native_log10,
            MathFunction::Log => native_log,
            MathFunction::Exp => native_exp,
            MathFunction::Sqrt => native_sqrt,
            MathFunction::Fabs => native_fabs,
            MathFunction::Rint => native_rint,
        }
    }

    /// Calls the native routine directly.
    pub fn apply(self, x: f64) -> f64 {
        (self.routine())(x)
    }
}

extern "C" fn native_sin(x: f64) -> f64 {
    x.sin()
}
extern "C" fn native_cos(x: f64) -> f64 {
    x.cos()
}
extern "C" fn native_tan(x: f64) -> f64 {
    x.tan()
}
extern "C" fn native_asin(x: f64) -> f64 {
    x.asin()
}
extern "C" fn native_acos(x: f64) -> f64 {
    x.acos()
}
extern "C" fn native_atan(x: f64) -> f64 {
    x.atan()
}
extern "C" fn native_sinh(x: f64) -> f64 {
    x.sinh()
}
extern "C" fn native_cosh(x: f64) -> f64 {
    x.cosh()
}
extern "C" fn native_tanh(x: f64) -> f64 {
    x.tanh()
}
extern "C" fn native_asinh(x: f64) -> f64 {
    x.asinh()
}
extern "C" fn native_acosh(x: f64) -> f64 {
    x.acosh()
}
extern "C" fn native_atanh(x: f64) -> f64 {
    x.atanh()
}
extern "C" fn native_log2(x: f64) -> f64 {
    x.log2()
}
extern "C" fn native_log10(x: f64) -> f64 {
    x.log10()
}
extern "C" fn native_log(x: f64) -> f64 {
    x.ln()
}
extern "C" fn native_exp(x: f64) -> f64 {
    x.exp()
}
extern "C" fn native_sqrt(x: f64) -> f64 {
    x.sqrt()
}
extern "C" fn native_fabs(x: f64) -> f64 {
    x.abs()
}
extern "C" fn native_rint(x: f64) -> f64 {
    x.round_ties_even()
}

/// Registers every math routine (and `pow`) with a JIT builder under its C name.
pub(crate) fn register_symbols(builder: &mut JITBuilder) {
    for function in MathFunction::ALL {
        builder.symbol(function.symbol(), function.routine() as *const u8);
    }
    builder.symbol(pow::POW_SYMBOL, pow::native_pow as *const u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(MathFunction::resolve("log"), Some(MathFunction::Log10));
        assert_eq!(MathFunction::resolve("log10"), Some(MathFunction::Log10));
        assert_eq!(MathFunction::resolve("ln"), Some(MathFunction::Log));
        assert_eq!(MathFunction::resolve("abs"), Some(MathFunction::Fabs));
        assert_eq!(MathFunction::resolve("fabs"), Some(MathFunction::Fabs));
    }

    #[test]
    fn test_every_symbol_resolves() {
        for function in MathFunction::ALL {
            // `log` is taken by the base-10 alias, natural log is only reachable as `ln`
            if function == MathFunction::Log {
                continue;
            }
            assert_eq!(MathFunction::resolve(function.symbol()), Some(function));
        }
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(MathFunction::resolve("cbrt"), None);
        assert_eq!(MathFunction::resolve("if"), None);
        assert_eq!(MathFunction::resolve("sign"), None);
        assert_eq!(MathFunction::resolve(""), None);
    }

    #[test]
    fn test_values() {
        assert!((MathFunction::Log10.apply(4.0) - 0.602059991).abs() < 1e-6);
        assert!((MathFunction::Log.apply(10.0) - 2.30258509).abs() < 1e-6);
        assert_eq!(MathFunction::Log2.apply(256.0), 8.0);
        assert_eq!(MathFunction::Rint.apply(1.5), 2.0);
        assert_eq!(MathFunction::Rint.apply(2.5), 2.0);
        assert_eq!(MathFunction::Fabs.apply(-3.0), 3.0);
        assert!(MathFunction::Asin.apply(2.0).is_nan());
    }
}
