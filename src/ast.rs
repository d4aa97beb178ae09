// Abstract Syntax Tree definitions
//
// Calls are a tagged variant: a native operator carries its handle directly,
// while a named call keeps only the name and is resolved when evaluated, so a
// formula may call a user function registered after it was parsed.

use serde::{Deserialize, Serialize};

use crate::functions::{self, Builtin};
use crate::operators;
use crate::value::Value;

/// AST Node types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    /// Where an operand was expected but none could be parsed.
    /// Evaluates to `undefined`; its presence makes the formula invalid.
    Empty,

    /// Number literal
    Number(f64),

    /// Bare word: identifier, dotted path, keyword or constant reference.
    Identifier(String),

    /// Literal passthrough (string literals). Evaluates to the held value and
    /// is never re-read as an identifier.
    Literal(Value),

    /// Native operator or built-in function over eagerly evaluated arguments.
    Native { op: NativeOp, args: Vec<AstNode> },

    /// Call resolved by name at evaluation time: a collection special form
    /// or a user-defined function.
    Call { name: String, args: Vec<AstNode> },
}

/// Handle of a native operation: a pure function from argument values to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeOp {
    Operator(Operator),
    Function(Builtin),
}

impl NativeOp {
    /// Apply to already evaluated arguments.
    pub fn apply(self, args: &[Value]) -> Value {
        match self {
            NativeOp::Operator(op) => operators::apply(op, args),
            NativeOp::Function(builtin) => functions::call(builtin, args),
        }
    }
}

/// Native operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    // Arithmetic
    Multiply,
    Divide,
    Add,
    Subtract,

    // Comparison
    Greater,
    Less,
    Equal,
    GreaterOrEqual,
    LessOrEqual,

    // Logical
    Or,
    And,
    Not,

    /// `cond ? a : b`
    Select,

    /// Unary minus
    Negate,

    /// `a[b]`
    Index,
}

impl Operator {
    /// Operator for an infix symbol.
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        Some(match symbol {
            "*" => Operator::Multiply,
            "/" => Operator::Divide,
            "+" => Operator::Add,
            "-" => Operator::Subtract,
            ">" => Operator::Greater,
            "<" => Operator::Less,
            "==" => Operator::Equal,
            ">=" => Operator::GreaterOrEqual,
            "<=" => Operator::LessOrEqual,
            "||" => Operator::Or,
            "&&" => Operator::And,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Equal => "==",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Or => "||",
            Operator::And => "&&",
            Operator::Not => "!",
            Operator::Select => "?",
            Operator::Negate => "-",
            Operator::Index => "[",
        }
    }

    /// Number of arguments the operator consumes.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not | Operator::Negate => 1,
            Operator::Select => 3,
            _ => 2,
        }
    }
}

/// Built-in pseudo-functions with bespoke evaluation rules over collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    /// `each(collection, mapper)`: sum of the mapper over every element.
    Each,
    /// `map(collection, mapper)`: list of the mapper over every element.
    Map,
    /// `slice(collection, start, end)`
    Slice,
}

impl SpecialForm {
    pub fn from_name(name: &str) -> Option<SpecialForm> {
        match name {
            "each" => Some(SpecialForm::Each),
            "map" => Some(SpecialForm::Map),
            "slice" => Some(SpecialForm::Slice),
            _ => None,
        }
    }

    /// Fewest arguments for the form to apply. With fewer, the call falls
    /// back to ordinary user-function lookup.
    pub fn min_args(self) -> usize {
        match self {
            SpecialForm::Each | SpecialForm::Map => 2,
            SpecialForm::Slice => 3,
        }
    }
}

impl AstNode {
    /// Create a number literal node
    pub fn number(n: f64) -> Self {
        AstNode::Number(n)
    }

    /// Create an identifier node
    pub fn identifier(name: impl Into<String>) -> Self {
        AstNode::Identifier(name.into())
    }

    /// Create a string literal node
    pub fn string(s: impl Into<String>) -> Self {
        AstNode::Literal(Value::from(s.into()))
    }

    /// Create an operator node
    pub fn operator(op: Operator, args: Vec<AstNode>) -> Self {
        AstNode::Native {
            op: NativeOp::Operator(op),
            args,
        }
    }

    /// Create a binary operator node
    pub fn binary(op: Operator, lhs: AstNode, rhs: AstNode) -> Self {
        AstNode::operator(op, vec![lhs, rhs])
    }

    /// Create a built-in function call node
    pub fn builtin(builtin: Builtin, args: Vec<AstNode>) -> Self {
        AstNode::Native {
            op: NativeOp::Function(builtin),
            args,
        }
    }

    /// Create a late-bound call node
    pub fn call(name: impl Into<String>, args: Vec<AstNode>) -> Self {
        AstNode::Call {
            name: name.into(),
            args,
        }
    }

    /// The identifier name, if this is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            AstNode::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ast_node_creation() {
        assert!(matches!(AstNode::number(42.0), AstNode::Number(_)));
        assert!(matches!(AstNode::identifier("Level"), AstNode::Identifier(_)));
        assert_eq!(
            AstNode::string("hello"),
            AstNode::Literal(Value::string("hello"))
        );
        assert_eq!(AstNode::identifier("x").as_identifier(), Some("x"));
        assert_eq!(AstNode::number(1.0).as_identifier(), None);
    }

    #[test]
    fn test_operator_symbols() {
        for symbol in ["*", "/", "+", "-", ">", "<", "==", ">=", "<=", "||", "&&"] {
            let op = Operator::from_symbol(symbol).unwrap();
            assert_eq!(op.symbol(), symbol);
            assert_eq!(op.arity(), 2);
        }
        assert_eq!(Operator::from_symbol("!"), None);
        assert_eq!(Operator::Select.arity(), 3);
        assert_eq!(Operator::Negate.arity(), 1);
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(SpecialForm::from_name("each"), Some(SpecialForm::Each));
        assert_eq!(SpecialForm::from_name("slice").map(SpecialForm::min_args), Some(3));
        assert_eq!(SpecialForm::from_name("max"), None);
    }

    #[test]
    fn test_native_apply() {
        let op = NativeOp::Operator(Operator::Multiply);
        assert_eq!(op.apply(&[Value::from(6), Value::from(7)]), Value::from(42));
    }
}
