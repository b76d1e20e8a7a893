//! Conversion module for transforming evalexpr operator trees into a `SyntaxTree`.
//!
//! The formula grammar is parsed by the [evalexpr](https://github.com/ISibboI/evalexpr)
//! crate. This module maps the subset of its operator tree that the grammar allows
//! (arithmetic, comparisons, `^`, `=`, unary minus, calls, numbers and identifiers)
//! onto our own [`Node`] type. Everything else evalexpr understands (boolean logic,
//! strings, `;` chains, compound assignment) is rejected as a syntax error.
//!
//! The main entry point is [`parse`].

use evalexpr::{build_operator_tree, Node as EvalexprNode, Operator};

use crate::{
    errors::{ConvertError, FormulaError},
    expr::{BinaryOperator, Node, SyntaxTree},
};

/// Parses formula text into a `SyntaxTree`.
///
/// # Errors
/// Returns `FormulaError::Syntax` if evalexpr rejects the text and
/// `FormulaError::Convert` if it parses but is outside the formula grammar.
pub fn parse(text: &str) -> Result<SyntaxTree, FormulaError> {
    let node: EvalexprNode = build_operator_tree(text)?;
    let root = build_ast(&node)?;
    Ok(SyntaxTree::new(root))
}

/// Converts an evalexpr node into our internal node representation.
///
/// # Examples of supported operations:
/// * Arithmetic: +, -, *, /, ^
/// * Comparisons: <, >, <=, >=, ==, !=
/// * Assignment: x = ...
/// * Function calls: sin(x), if(c, a, b)
/// * Constants: integer and floating point literals
pub fn build_ast(node: &EvalexprNode) -> Result<Node, ConvertError> {
    match node.operator() {
        // Root node - parentheses and the top level produce one of these
        Operator::RootNode => match node.children() {
            [child] => build_ast(child),
            children => Err(ConvertError::Malformed(format!(
                "Expected single child for root node, got {}",
                children.len()
            ))),
        },
        Operator::Add => fold_binary(BinaryOperator::Add, node),
        Operator::Mul => fold_binary(BinaryOperator::Mul, node),
        Operator::Sub => binary(BinaryOperator::Sub, node),
        Operator::Div => binary(BinaryOperator::Div, node),
        Operator::Exp => binary(BinaryOperator::Pow, node),
        Operator::Lt => binary(BinaryOperator::Lt, node),
        Operator::Gt => binary(BinaryOperator::Gt, node),
        Operator::Leq => binary(BinaryOperator::Le, node),
        Operator::Geq => binary(BinaryOperator::Ge, node),
        Operator::Eq => binary(BinaryOperator::Eq, node),
        Operator::Neq => binary(BinaryOperator::Ne, node),
        Operator::Assign => binary(BinaryOperator::Assign, node),
        Operator::Neg => match node.children() {
            [child] => Ok(Node::UnaryMinus(Box::new(build_ast(child)?))),
            children => Err(ConvertError::Malformed(format!(
                "Expected single operand for negation, got {}",
                children.len()
            ))),
        },
        // Constant value - must be numeric
        Operator::Const { value } => match value {
            evalexpr::Value::Float(f) => Ok(Node::Number(*f)),
            evalexpr::Value::Int(i) => Ok(Node::Number(*i as f64)),
            _ => Err(ConvertError::ConstOperator(format!("{value:?}"))),
        },
        Operator::VariableIdentifierRead { identifier }
        | Operator::VariableIdentifierWrite { identifier } => {
            Ok(Node::Variable(identifier.to_string()))
        }
        // Function call - the name is checked later by the backend
        Operator::FunctionIdentifier { identifier } => {
            let mut args = Vec::new();
            for child in node.children() {
                collect_arguments(child, &mut args)?;
            }
            Ok(Node::Call(identifier.to_string(), args))
        }
        other => Err(ConvertError::UnsupportedOperator(format!("{other:?}"))),
    }
}

/// Builds a binary node from a node with exactly two children.
fn binary(op: BinaryOperator, node: &EvalexprNode) -> Result<Node, ConvertError> {
    match node.children() {
        [left, right] => Ok(Node::Binary(
            op,
            Box::new(build_ast(left)?),
            Box::new(build_ast(right)?),
        )),
        children => Err(ConvertError::Malformed(format!(
            "Expected two operands for {}, got {}",
            op.symbol(),
            children.len()
        ))),
    }
}

/// Folds a node with two or more children into left-associated binary nodes.
fn fold_binary(op: BinaryOperator, node: &EvalexprNode) -> Result<Node, ConvertError> {
    let children = node.children();
    if children.len() < 2 {
        return Err(ConvertError::Malformed(format!(
            "Expected at least two operands for {}, got {}",
            op.symbol(),
            children.len()
        )));
    }
    children
        .iter()
        .skip(1)
        .try_fold(build_ast(&children[0])?, |acc, child| {
            Ok(Node::Binary(op, Box::new(acc), Box::new(build_ast(child)?)))
        })
}

/// Flattens the argument list of a call.
///
/// evalexpr represents `f(a, b)` as a function identifier whose operand is a
/// parenthesized tuple; `f()` has an empty root node as operand.
fn collect_arguments(node: &EvalexprNode, args: &mut Vec<Node>) -> Result<(), ConvertError> {
    match node.operator() {
        Operator::RootNode if node.children().is_empty() => Ok(()),
        Operator::RootNode if node.children().len() == 1 => {
            collect_arguments(&node.children()[0], args)
        }
        Operator::Tuple => {
            for child in node.children() {
                collect_arguments(child, args)?;
            }
            Ok(())
        }
        _ => {
            args.push(build_ast(node)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Node> {
        Box::new(Node::Variable(name.to_string()))
    }

    #[test]
    fn test_parse_arithmetic() {
        let tree = parse("x + y * 2").unwrap();
        assert_eq!(
            *tree.root(),
            Node::Binary(
                BinaryOperator::Add,
                var("x"),
                Box::new(Node::Binary(
                    BinaryOperator::Mul,
                    var("y"),
                    Box::new(Node::Number(2.0))
                )),
            )
        );
    }

    #[test]
    fn test_parse_assignment() {
        let tree = parse("x = y * z").unwrap();
        match tree.root() {
            Node::Binary(BinaryOperator::Assign, left, _) => {
                assert_eq!(**left, Node::Variable("x".to_string()))
            }
            other => panic!("expected assignment, got {other}"),
        }
    }

    #[test]
    fn test_parse_calls() {
        let tree = parse("if(y == 2.0, 3.5, 1.2)").unwrap();
        match tree.root() {
            Node::Call(name, args) => {
                assert_eq!(name, "if");
                assert_eq!(args.len(), 3);
                assert_eq!(args[1], Node::Number(3.5));
            }
            other => panic!("expected call, got {other}"),
        }

        let tree = parse("sin(pi/2)").unwrap();
        match tree.root() {
            Node::Call(name, args) => {
                assert_eq!(name, "sin");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {other}"),
        }
    }

    #[test]
    fn test_parse_negation_and_power() {
        let tree = parse("-3.5 * 2").unwrap();
        assert!(tree.variables().is_empty());

        let tree = parse("(3 + 2)^2").unwrap();
        assert!(matches!(
            tree.root(),
            Node::Binary(BinaryOperator::Pow, _, _)
        ));
    }

    #[test]
    fn test_parse_comparisons() {
        for (text, op) in [
            ("1.0 < 2.0", BinaryOperator::Lt),
            ("1.0 > 2.0", BinaryOperator::Gt),
            ("1.0 <= 2.0", BinaryOperator::Le),
            ("1.0 >= 2.0", BinaryOperator::Ge),
            ("x == y", BinaryOperator::Eq),
            ("x != y", BinaryOperator::Ne),
        ] {
            let tree = parse(text).unwrap();
            assert!(
                matches!(tree.root(), Node::Binary(found, _, _) if *found == op),
                "{text}"
            );
        }
    }

    #[test]
    fn test_reject_outside_grammar() {
        assert!(matches!(
            parse("\"text\""),
            Err(FormulaError::Convert(ConvertError::ConstOperator(_)))
        ));
        assert!(matches!(
            parse("x && y"),
            Err(FormulaError::Convert(ConvertError::UnsupportedOperator(_)))
        ));
        assert!(matches!(parse("(x + y"), Err(FormulaError::Syntax(_))));
    }
}
