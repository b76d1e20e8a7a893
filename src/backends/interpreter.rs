//! Tree-walking backend.
//!
//! Compilation resolves a syntax tree once into an `Op` tree: variable names become
//! addresses, function names become `MathFunction`s and every structural check the
//! code generator performs is applied here too. Evaluation then walks the `Op` tree
//! without any lookups. Math functions call the same native routines the compiled
//! code links against.

use crate::{
    codegen::expect_args,
    errors::CompileError,
    expr::{constant, BinaryOperator, Node, SyntaxTree},
    operators::MathFunction,
    variables::VariableTable,
};

/// A resolved operation.
#[derive(Debug, Clone)]
enum Op {
    Const(f64),
    Load(*mut f64),
    Store(*mut f64, Box<Op>),
    Neg(Box<Op>),
    Binary(BinaryOperator, Box<Op>, Box<Op>),
    Call(MathFunction, Box<Op>),
    If(Box<Op>, Box<Op>, Box<Op>),
    Sign(Box<Op>),
}

/// A syntax tree resolved against one set of variable bindings.
#[derive(Debug, Clone)]
pub struct InterpretedUnit {
    root: Op,
}

/// Backend that evaluates formulas by walking their tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpretingBackend;

impl InterpretingBackend {
    pub fn new() -> Self {
        Self
    }

    /// Resolves `tree` against `variables`.
    ///
    /// # Errors
    /// Fails with the same `CompileError` the compiling backend would report.
    pub fn compile(
        &self,
        tree: &SyntaxTree,
        variables: &VariableTable,
    ) -> Result<InterpretedUnit, CompileError> {
        let root = lower(tree.root(), variables)?;
        log::debug!("resolved `{tree}` for interpretation");
        Ok(InterpretedUnit { root })
    }

    /// Evaluates a unit against the current values of its variables.
    ///
    /// Every address the unit was resolved against must still be valid (see the
    /// safety contract of `VariableTable`).
    pub fn evaluate(&self, unit: &InterpretedUnit) -> f64 {
        eval(&unit.root)
    }
}

fn lower(node: &Node, variables: &VariableTable) -> Result<Op, CompileError> {
    let boxed = |node: &Node| lower(node, variables).map(Box::new);
    match node {
        Node::Number(value) => Ok(Op::Const(*value)),
        Node::Variable(name) => match constant(name) {
            Some(value) => Ok(Op::Const(value)),
            None => Ok(Op::Load(address(name, variables)?)),
        },
        Node::UnaryMinus(child) => Ok(Op::Neg(boxed(child)?)),
        Node::Binary(BinaryOperator::Assign, left, right) => {
            let Node::Variable(name) = left.as_ref() else {
                return Err(CompileError::AssignToNonVariable);
            };
            if constant(name).is_some() {
                return Err(CompileError::AssignToConstant(name.clone()));
            }
            let value = boxed(right)?;
            Ok(Op::Store(address(name, variables)?, value))
        }
        Node::Binary(op, left, right) => Ok(Op::Binary(*op, boxed(left)?, boxed(right)?)),
        Node::Call(name, args) => match name.as_str() {
            "if" => {
                let [cond, then_value, else_value] = expect_args::<3>(name, args)?;
                Ok(Op::If(boxed(cond)?, boxed(then_value)?, boxed(else_value)?))
            }
            "sign" => {
                let [arg] = expect_args::<1>(name, args)?;
                Ok(Op::Sign(boxed(arg)?))
            }
            _ => {
                let function = MathFunction::resolve(name)
                    .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
                let [arg] = expect_args::<1>(name, args)?;
                Ok(Op::Call(function, boxed(arg)?))
            }
        },
    }
}

fn address(name: &str, variables: &VariableTable) -> Result<*mut f64, CompileError> {
    variables
        .address(name)
        .ok_or_else(|| CompileError::UnboundVariable(name.to_string()))
}

fn eval(op: &Op) -> f64 {
    match op {
        Op::Const(value) => *value,
        // SAFETY: bound addresses are valid while the unit can be evaluated.
        Op::Load(address) => unsafe { address.read() },
        Op::Store(address, value) => {
            let value = eval(value);
            // SAFETY: as above.
            unsafe { address.write(value) };
            value
        }
        Op::Neg(child) => -1.0 * eval(child),
        Op::Binary(op, left, right) => {
            let left = eval(left);
            op.apply(left, eval(right))
        }
        Op::Call(function, arg) => function.apply(eval(arg)),
        Op::If(cond, then_value, else_value) => {
            // Both branches run, like the branch-free compiled form
            let cond = eval(cond);
            let then_value = eval(then_value);
            let else_value = eval(else_value);
            if cond == 1.0 {
                then_value
            } else {
                else_value
            }
        }
        Op::Sign(arg) => {
            let value = eval(arg);
            if value > 0.0 {
                1.0
            } else if value < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::parse;
    use std::cell::Cell;

    fn run(text: &str, variables: &VariableTable) -> f64 {
        let backend = InterpretingBackend::new();
        let unit = backend.compile(&parse(text).unwrap(), variables).unwrap();
        backend.evaluate(&unit)
    }

    #[test]
    fn test_arithmetic_and_constants() {
        let variables = VariableTable::new();
        assert_eq!(run("1 + 2 * 3", &variables), 7.0);
        assert_eq!(run("-(2 - 5)", &variables), 3.0);
        assert!((run("sin(pi / 2)", &variables) - 1.0).abs() < 1e-12);
        assert!((run("ln(e)", &variables) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_assignment_writes_through() {
        let x = Cell::new(0.0_f64);
        let y = Cell::new(2.0_f64);
        let mut variables = VariableTable::new();
        variables.bind("x", x.as_ptr());
        variables.bind("y", y.as_ptr());

        assert_eq!(run("x = y ^ 3", &variables), 8.0);
        assert_eq!(x.get(), 8.0);
    }

    #[test]
    fn test_if_evaluates_both_branches() {
        let x = Cell::new(0.0_f64);
        let mut variables = VariableTable::new();
        variables.bind("x", x.as_ptr());

        assert_eq!(run("if(1, x = 4, x = 9)", &variables), 4.0);
        assert_eq!(x.get(), 9.0);
    }

    #[test]
    fn test_sign_and_nan() {
        let variables = VariableTable::new();
        assert_eq!(run("sign(-0.0)", &variables), 0.0);
        assert_eq!(run("sign(2)", &variables), 1.0);
        assert_eq!(run("sign(asin(2))", &variables), 0.0);
        assert_eq!(run("asin(2) != asin(2)", &variables), 1.0);
    }

    #[test]
    fn test_compile_errors() {
        let backend = InterpretingBackend::new();
        let variables = VariableTable::new();
        let compile = |text: &str| backend.compile(&parse(text).unwrap(), &variables);

        assert!(matches!(
            compile("e = 1"),
            Err(CompileError::AssignToConstant(_))
        ));
        assert!(matches!(
            compile("foo(1)"),
            Err(CompileError::UnknownFunction(_))
        ));
        assert!(matches!(
            compile("sqrt(1, 2)"),
            Err(CompileError::ArgumentCount { expected: 1, got: 2, .. })
        ));
        assert!(matches!(
            compile("w * 2"),
            Err(CompileError::UnboundVariable(_))
        ));

        let tree = SyntaxTree::new(Node::Binary(
            BinaryOperator::Assign,
            Box::new(Node::Number(3.0)),
            Box::new(Node::Number(4.0)),
        ));
        assert!(matches!(
            backend.compile(&tree, &variables),
            Err(CompileError::AssignToNonVariable)
        ));
    }
}
