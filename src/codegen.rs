//! Translation of syntax trees into Cranelift IR.
//!
//! `CodeGenerator` walks a tree depth first and produces one IR value per node. The
//! rules mirror `BinaryOperator::apply` and the interpreting backend exactly:
//!
//! - numbers become `f64const`, `pi`/`e` become their literal values
//! - variables load from their slot cell, assignments store into it
//! - unary minus multiplies by `-1.0`
//! - comparisons produce `1.0` or `0.0` through `select`
//! - `^` and every math function become calls to the linked native routines
//! - `if` and `sign` are lowered inline with `fcmp` and `select`

use std::collections::HashMap;

use cranelift::prelude::*;
use cranelift_codegen::ir::{immediates::Offset32, FuncRef};
use cranelift_module::Module;

use crate::{
    errors::{BuilderError, CompileError},
    expr::{constant, BinaryOperator, Node},
    operators::{pow, unary, MathFunction},
    slots::VariableSlotCache,
    variables::VariableTable,
};

/// Generates the body of one routine.
pub(crate) struct CodeGenerator<'a, 'b> {
    builder: &'a mut FunctionBuilder<'b>,
    module: &'a mut dyn Module,
    variables: &'a VariableTable,
    slots: &'a mut VariableSlotCache,
    imports: HashMap<&'static str, FuncRef>,
}

impl<'a, 'b> CodeGenerator<'a, 'b> {
    pub(crate) fn new(
        builder: &'a mut FunctionBuilder<'b>,
        module: &'a mut dyn Module,
        variables: &'a VariableTable,
        slots: &'a mut VariableSlotCache,
    ) -> Self {
        Self {
            builder,
            module,
            variables,
            slots,
            imports: HashMap::new(),
        }
    }

    /// Generates the value of `node`.
    ///
    /// # Errors
    /// Any `CompileError` aborts generation; the caller discards the routine.
    pub(crate) fn generate(&mut self, node: &Node) -> Result<Value, CompileError> {
        match node {
            Node::Number(value) => Ok(self.builder.ins().f64const(*value)),

            Node::Variable(name) => {
                if let Some(value) = constant(name) {
                    return Ok(self.builder.ins().f64const(value));
                }
                let pointer = self.cell(name)?;
                Ok(self.builder.ins().load(
                    types::F64,
                    MemFlags::trusted(),
                    pointer,
                    Offset32::new(0),
                ))
            }

            Node::UnaryMinus(child) => {
                let value = self.generate(child)?;
                let minus_one = self.builder.ins().f64const(-1.0);
                Ok(self.builder.ins().fmul(minus_one, value))
            }

            Node::Binary(BinaryOperator::Assign, left, right) => {
                // The left side is a destination, it is never loaded
                let Node::Variable(name) = left.as_ref() else {
                    return Err(CompileError::AssignToNonVariable);
                };
                if constant(name).is_some() {
                    return Err(CompileError::AssignToConstant(name.clone()));
                }
                let value = self.generate(right)?;
                let pointer = self.cell(name)?;
                self.builder
                    .ins()
                    .store(MemFlags::trusted(), value, pointer, Offset32::new(0));
                Ok(value)
            }

            Node::Binary(op, left, right) => {
                let left = self.generate(left)?;
                let right = self.generate(right)?;
                self.binary(*op, left, right)
            }

            Node::Call(name, args) => self.call(name, args),
        }
    }

    /// Pointer to the slot cell of a bound variable.
    fn cell(&mut self, name: &str) -> Result<Value, CompileError> {
        let address = self
            .variables
            .address(name)
            .ok_or_else(|| CompileError::UnboundVariable(name.to_string()))?;
        Ok(self.slots.cell_for(address, self.builder, self.module)?)
    }

    fn binary(
        &mut self,
        op: BinaryOperator,
        left: Value,
        right: Value,
    ) -> Result<Value, CompileError> {
        let value = match op {
            BinaryOperator::Add => self.builder.ins().fadd(left, right),
            BinaryOperator::Sub => self.builder.ins().fsub(left, right),
            BinaryOperator::Mul => self.builder.ins().fmul(left, right),
            BinaryOperator::Div => self.builder.ins().fdiv(left, right),
            BinaryOperator::Pow => {
                let func = self.import_pow()?;
                pow::call_pow(self.builder, func, left, right)
            }
            BinaryOperator::Lt => self.compare(FloatCC::LessThan, left, right),
            BinaryOperator::Gt => self.compare(FloatCC::GreaterThan, left, right),
            BinaryOperator::Le => self.compare(FloatCC::LessThanOrEqual, left, right),
            BinaryOperator::Ge => self.compare(FloatCC::GreaterThanOrEqual, left, right),
            BinaryOperator::Eq => self.compare(FloatCC::Equal, left, right),
            // `NotEqual` is the unordered variant, so NaN != NaN holds
            BinaryOperator::Ne => self.compare(FloatCC::NotEqual, left, right),
            BinaryOperator::Assign => return Err(CompileError::AssignToNonVariable),
        };
        Ok(value)
    }

    /// Emits a comparison and converts the flag to `1.0` / `0.0`.
    fn compare(&mut self, cc: FloatCC, left: Value, right: Value) -> Value {
        let flag = self.builder.ins().fcmp(cc, left, right);
        let one = self.builder.ins().f64const(1.0);
        let zero = self.builder.ins().f64const(0.0);
        self.builder.ins().select(flag, one, zero)
    }

    fn call(&mut self, name: &str, args: &[Node]) -> Result<Value, CompileError> {
        match name {
            "if" => {
                let [cond, then_value, else_value] = expect_args::<3>(name, args)?;
                let cond = self.generate(cond)?;
                let then_value = self.generate(then_value)?;
                let else_value = self.generate(else_value)?;

                // Only the canonical `1.0` counts as true
                let one = self.builder.ins().f64const(1.0);
                let is_true = self.builder.ins().fcmp(FloatCC::Equal, cond, one);
                Ok(self.builder.ins().select(is_true, then_value, else_value))
            }
            "sign" => {
                let [arg] = expect_args::<1>(name, args)?;
                let value = self.generate(arg)?;

                let zero = self.builder.ins().f64const(0.0);
                let one = self.builder.ins().f64const(1.0);
                let minus_one = self.builder.ins().f64const(-1.0);
                let positive = self.builder.ins().fcmp(FloatCC::GreaterThan, value, zero);
                let negative = self.builder.ins().fcmp(FloatCC::LessThan, value, zero);
                let not_positive = self.builder.ins().select(negative, minus_one, zero);
                Ok(self.builder.ins().select(positive, one, not_positive))
            }
            _ => {
                let function = MathFunction::resolve(name)
                    .ok_or_else(|| CompileError::UnknownFunction(name.to_string()))?;
                let [arg] = expect_args::<1>(name, args)?;
                let value = self.generate(arg)?;
                let func = self.import(function)?;
                Ok(unary::call_unary(self.builder, func, value))
            }
        }
    }

    fn import(&mut self, function: MathFunction) -> Result<FuncRef, BuilderError> {
        if let Some(func) = self.imports.get(function.symbol()) {
            return Ok(*func);
        }
        let func = unary::link_unary(self.builder, self.module, function)?;
        self.imports.insert(function.symbol(), func);
        Ok(func)
    }

    fn import_pow(&mut self) -> Result<FuncRef, BuilderError> {
        if let Some(func) = self.imports.get(pow::POW_SYMBOL) {
            return Ok(*func);
        }
        let func = pow::link_pow(self.builder, self.module)?;
        self.imports.insert(pow::POW_SYMBOL, func);
        Ok(func)
    }
}

/// Checks the argument count of a call and splits the arguments.
pub(crate) fn expect_args<'n, const N: usize>(
    function: &str,
    args: &'n [Node],
) -> Result<&'n [Node; N], CompileError> {
    args.try_into().map_err(|_| CompileError::ArgumentCount {
        function: function.to_string(),
        expected: N,
        got: args.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_routine, host_isa};
    use crate::convert::parse;
    use crate::expr::SyntaxTree;

    fn run(text: &str) -> f64 {
        let tree = parse(text).unwrap();
        build_routine(host_isa().unwrap(), &tree, &VariableTable::new())
            .unwrap()
            .call()
    }

    fn ir(text: &str, variables: &VariableTable) -> String {
        let tree = parse(text).unwrap();
        build_routine(host_isa().unwrap(), &tree, variables)
            .unwrap()
            .ir()
            .to_string()
    }

    #[test]
    fn test_structural_assignment_check() {
        let tree = SyntaxTree::new(Node::Binary(
            BinaryOperator::Assign,
            Box::new(Node::Number(3.0)),
            Box::new(Node::Number(4.0)),
        ));
        let result = build_routine(host_isa().unwrap(), &tree, &VariableTable::new());
        assert!(matches!(result, Err(CompileError::AssignToNonVariable)));
    }

    #[test]
    fn test_sign() {
        assert_eq!(run("sign(3.0)"), 1.0);
        assert_eq!(run("sign(-13.0)"), -1.0);
        assert_eq!(run("sign(0.0)"), 0.0);
    }

    #[test]
    fn test_if_requires_canonical_true() {
        assert_eq!(run("if(1.0, 3.5, 1.2)"), 3.5);
        assert_eq!(run("if(2.0, 3.5, 1.2)"), 1.2);
        assert_eq!(run("if(0.0, 3.5, 1.2)"), 1.2);
    }

    #[test]
    fn test_argument_counts() {
        let tree = parse("sin(1, 2)").unwrap();
        let result = build_routine(host_isa().unwrap(), &tree, &VariableTable::new());
        assert!(matches!(
            result,
            Err(CompileError::ArgumentCount {
                expected: 1,
                got: 2,
                ..
            })
        ));

        let tree = parse("sign()").unwrap();
        let result = build_routine(host_isa().unwrap(), &tree, &VariableTable::new());
        assert!(matches!(
            result,
            Err(CompileError::ArgumentCount { got: 0, .. })
        ));
    }

    #[test]
    fn test_assignment_emits_store_without_load() {
        let x = std::cell::Cell::new(0.0_f64);
        let mut variables = VariableTable::new();
        variables.bind("x", x.as_ptr());

        let ir = ir("x = 2.5", &variables);
        assert!(ir.contains("store"));
        assert!(!ir.contains("load"));
    }

    #[test]
    fn test_math_calls_are_linked() {
        let ir = ir("sin(0.5) + sin(0.25) + ln(2)", &VariableTable::new());
        assert!(ir.contains("call"));
        assert!((run("sin(0.5) + sin(0.25) + ln(2)")
            - (0.5_f64.sin() + 0.25_f64.sin() + 2.0_f64.ln()))
        .abs()
            < 1e-12);
    }
}
