//! Syntax tree module for representing parsed formulas.
//!
//! This module defines the node types every backend consumes:
//!
//! - `Node`: An enum representing the five kinds of formula nodes
//! - `BinaryOperator`: The closed set of binary operators in the grammar
//! - `SyntaxTree`: The root of one parsed formula
//!
//! Nodes own their children exclusively through `Box`/`Vec`, so a tree can never
//! contain a cycle. A tree is immutable once built: `Formula` replaces it wholesale when
//! a new expression is set.
//!
//! # Expression Tree Structure
//! - Leaf nodes: `Number` and `Variable`
//! - Unary operations: `UnaryMinus`
//! - Binary operations: `Binary` with arithmetic, comparison, power or assignment
//! - Function calls: `Call` with a name and an argument list
//!
//! The two named constants `pi` and `e` are parsed as `Variable` nodes and resolved
//! by [`constant`] when a backend lowers the tree.

use itertools::Itertools;

/// Binary operators of the formula grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// Assignment `=`, the left side must be a variable
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    /// Exponentiation `^`, lowered to `pow`
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinaryOperator {
    /// Returns the source text of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Assign => "=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Pow => "^",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
        }
    }

    /// True for the six comparison operators, whose result is `1.0` or `0.0`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::Le
                | BinaryOperator::Ge
                | BinaryOperator::Eq
                | BinaryOperator::Ne
        )
    }

    /// Applies a non-assignment operator to two values.
    ///
    /// This is the reference semantics shared by the interpreter; the code generator
    /// emits the same operations as IR. Comparisons follow ordinary floating point
    /// rules, so any comparison involving NaN is false except `!=`.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOperator::Add => left + right,
            BinaryOperator::Sub => left - right,
            BinaryOperator::Mul => left * right,
            BinaryOperator::Div => left / right,
            BinaryOperator::Pow => left.powf(right),
            BinaryOperator::Lt => bool_to_f64(left < right),
            BinaryOperator::Gt => bool_to_f64(left > right),
            BinaryOperator::Le => bool_to_f64(left <= right),
            BinaryOperator::Ge => bool_to_f64(left >= right),
            BinaryOperator::Eq => bool_to_f64(left == right),
            BinaryOperator::Ne => bool_to_f64(left != right),
            // Assignment is a store, not an arithmetic operation
            BinaryOperator::Assign => right,
        }
    }
}

/// Canonical boolean encoding used by comparisons and tested by `if`.
pub fn bool_to_f64(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Resolves the named constants `pi` and `e`.
///
/// Any other name is a variable and must be bound through the `VariableTable`.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

/// A node of a parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A numeric literal
    Number(f64),
    /// A bare identifier: a bound variable or one of the constants `pi`, `e`
    Variable(String),
    /// Negation of the child expression
    UnaryMinus(Box<Node>),
    /// A binary operation, including assignment
    Binary(BinaryOperator, Box<Node>, Box<Node>),
    /// A call to a function of the closed function set
    Call(String, Vec<Node>),
}

impl Node {
    /// Visits every variable name referenced by this node, in depth-first order.
    pub fn for_each_variable<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a str),
    {
        match self {
            Node::Number(_) => {}
            Node::Variable(name) => visit(name),
            Node::UnaryMinus(child) => child.for_each_variable(visit),
            Node::Binary(_, left, right) => {
                left.for_each_variable(visit);
                right.for_each_variable(visit);
            }
            Node::Call(_, args) => {
                for arg in args {
                    arg.for_each_variable(visit);
                }
            }
        }
    }
}

/// One parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    root: Node,
}

impl SyntaxTree {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Names of the variables the formula references, sorted and without duplicates.
    /// The constants `pi` and `e` are not included.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.root.for_each_variable(&mut |name| {
            if constant(name).is_none() {
                names.push(name);
            }
        });
        names.into_iter().sorted().dedup().collect()
    }
}

/// Formats nodes in fully parenthesized infix notation.
impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Number(value) => write!(f, "{value}"),
            Node::Variable(name) => write!(f, "{name}"),
            Node::UnaryMinus(child) => write!(f, "-({child})"),
            Node::Binary(op, left, right) => write!(f, "({left} {} {right})", op.symbol()),
            Node::Call(name, args) => write!(f, "{name}({})", args.iter().join(", ")),
        }
    }
}

impl std::fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Node> {
        Box::new(Node::Variable(name.to_string()))
    }

    fn num(value: f64) -> Box<Node> {
        Box::new(Node::Number(value))
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Node::Number(5.0)), "5");
        assert_eq!(format!("{}", *var("x")), "x");

        let sum = Node::Binary(BinaryOperator::Add, var("x"), var("y"));
        assert_eq!(format!("{sum}"), "(x + y)");

        let assign = Node::Binary(
            BinaryOperator::Assign,
            var("x"),
            Box::new(Node::Binary(BinaryOperator::Pow, var("y"), num(2.0))),
        );
        assert_eq!(format!("{assign}"), "(x = (y ^ 2))");

        let call = Node::Call("if".to_string(), vec![*var("c"), *num(1.0), *num(0.5)]);
        assert_eq!(format!("{call}"), "if(c, 1, 0.5)");

        assert_eq!(format!("{}", Node::UnaryMinus(var("z"))), "-(z)");
    }

    #[test]
    fn test_comparisons_are_canonical() {
        assert_eq!(BinaryOperator::Lt.apply(1.0, 2.0), 1.0);
        assert_eq!(BinaryOperator::Gt.apply(1.0, 2.0), 0.0);
        assert_eq!(BinaryOperator::Le.apply(1.0, 1.0), 1.0);
        assert_eq!(BinaryOperator::Ge.apply(1.0, 2.0), 0.0);
        assert_eq!(BinaryOperator::Eq.apply(2.0, 2.0), 1.0);
        assert_eq!(BinaryOperator::Ne.apply(2.0, 2.0), 0.0);
    }

    #[test]
    fn test_nan_comparisons() {
        let nan = f64::NAN;
        assert_eq!(BinaryOperator::Lt.apply(nan, 1.0), 0.0);
        assert_eq!(BinaryOperator::Ge.apply(nan, nan), 0.0);
        assert_eq!(BinaryOperator::Eq.apply(nan, nan), 0.0);
        assert_eq!(BinaryOperator::Ne.apply(nan, nan), 1.0);
    }

    #[test]
    fn test_power() {
        assert_eq!(BinaryOperator::Pow.apply(100.0, 0.0), 1.0);
        assert!((BinaryOperator::Pow.apply(100.0, 0.5) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_variables_skip_constants() {
        let tree = SyntaxTree::new(Node::Binary(
            BinaryOperator::Assign,
            var("x"),
            Box::new(Node::Binary(
                BinaryOperator::Mul,
                Box::new(Node::Binary(BinaryOperator::Mul, var("pi"), var("y"))),
                Box::new(Node::Call("sin".to_string(), vec![*var("x"), *var("e")])),
            )),
        ));
        assert_eq!(tree.variables(), vec!["x", "y"]);
    }

    #[test]
    fn test_constants() {
        assert_eq!(constant("pi"), Some(std::f64::consts::PI));
        assert_eq!(constant("e"), Some(std::f64::consts::E));
        assert_eq!(constant("x"), None);
    }
}
