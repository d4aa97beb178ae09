// Formula parser
//
// Recursive descent over the token stream, one function per precedence
// level. The parser never fails: it stops at the first construct it cannot
// use and records that the formula is not valid.

use thiserror::Error;
use tracing::debug;

use crate::ast::{AstNode, Operator};
use crate::functions::Builtin;
use crate::tokenizer::{is_string_literal, is_symbol, unquote, Token, Tokens};
use crate::value::parse_number;

/// Parser errors, reported by the strict [`parse`] entry point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Unexpected trailing tokens: {0}")]
    TrailingTokens(String),

    #[error("Incomplete formula: {0}")]
    Incomplete(String),
}

const COMPARISON: &[&str] = &[">", "<", ">=", "<=", "=="];
const LOGICAL: &[&str] = &["||", "&&"];
const ADDITIVE: &[&str] = &["+", "-"];
const MULTIPLICATIVE: &[&str] = &["*", "/"];

/// Deepest nesting of groups, call arguments and index keys.
pub const MAX_NESTING: usize = 128;

/// What the next token starts.
enum Lookahead {
    End,
    Group,
    Negate,
    Not,
    Call,
    Symbol,
    Atom,
}

/// Parser for formulas
#[derive(Debug, Clone)]
pub struct Parser {
    tokens: Tokens,
    /// First missing operand or closer, if any.
    problem: Option<String>,
    depth: usize,
}

impl Parser {
    pub fn new(formula: &str) -> Self {
        Parser {
            tokens: Tokens::new(formula),
            problem: None,
            depth: 0,
        }
    }

    /// Parse one expression from the front of the token stream.
    pub fn parse(&mut self) -> AstNode {
        let root = self.expression();
        if !self.tokens.is_empty() {
            debug!(
                remaining = %self.tokens.to_source(),
                "parser stopped before the end of the formula"
            );
        }
        root
    }

    /// Whether every token was consumed and nothing was missing.
    pub fn is_valid(&self) -> bool {
        self.tokens.is_empty() && self.problem.is_none()
    }

    /// Tokens the parser did not consume, in source form.
    pub fn remaining(&self) -> Vec<String> {
        self.tokens.remaining()
    }

    /// The first missing operand or closer, if any.
    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    /// One nested expression, or a gap once nesting passes [`MAX_NESTING`].
    fn expression(&mut self) -> AstNode {
        if self.depth >= MAX_NESTING {
            self.record(format!("nesting deeper than {} levels", MAX_NESTING));
            return AstNode::Empty;
        }
        self.depth += 1;
        let node = self.ternary();
        self.depth -= 1;
        node
    }

    /// `cond ? a : b`, branches parsed at the logical level. Not chaining.
    fn ternary(&mut self) -> AstNode {
        let condition = self.logical();
        if !self.tokens.next_is("?") {
            return condition;
        }
        self.tokens.get_raw();

        let when_true = self.logical();
        if !self.expect(":") {
            return condition;
        }
        let when_false = self.logical();

        AstNode::operator(Operator::Select, vec![condition, when_true, when_false])
    }

    fn logical(&mut self) -> AstNode {
        self.binary_level(LOGICAL, Self::comparison)
    }

    fn comparison(&mut self) -> AstNode {
        self.binary_level(COMPARISON, Self::additive)
    }

    fn additive(&mut self) -> AstNode {
        self.binary_level(ADDITIVE, Self::multiplicative)
    }

    fn multiplicative(&mut self) -> AstNode {
        self.binary_level(MULTIPLICATIVE, Self::primary)
    }

    /// Left-associative chain of `operand (symbol operand)*`.
    fn binary_level(&mut self, symbols: &[&str], operand: fn(&mut Self) -> AstNode) -> AstNode {
        let mut left = operand(self);
        while let Some(op) = self
            .tokens
            .peek(0)
            .filter(|t| symbols.contains(t))
            .and_then(Operator::from_symbol)
        {
            self.tokens.get_raw();
            let right = operand(self);
            left = AstNode::binary(op, left, right);
        }
        left
    }

    /// A value with any number of `[index]` suffixes.
    fn primary(&mut self) -> AstNode {
        let node = match self.lookahead() {
            Lookahead::Group => self.group(),
            Lookahead::Negate => self.unary(Operator::Negate),
            Lookahead::Not => self.unary(Operator::Not),
            Lookahead::Call => self.call(),
            Lookahead::End | Lookahead::Symbol | Lookahead::Atom => self.atom(),
        };
        self.suffixes(node)
    }

    /// `-x` / `!x`. The operand is a group, a call (with its own suffixes)
    /// or a single atom.
    fn unary(&mut self, op: Operator) -> AstNode {
        self.tokens.get_raw();
        let operand = match self.lookahead() {
            Lookahead::Group => self.group(),
            Lookahead::Call => {
                let call = self.call();
                self.suffixes(call)
            }
            _ => self.atom(),
        };
        AstNode::operator(op, vec![operand])
    }

    fn group(&mut self) -> AstNode {
        self.tokens.get_raw();
        let inner = self.expression();
        self.expect(")");
        inner
    }

    /// `name(arg, ...)`. Reserved names bind to built-ins now; every other
    /// name is looked up when evaluated.
    fn call(&mut self) -> AstNode {
        let name = self.tokens.get_raw().unwrap_or_default();
        self.tokens.get_raw();

        let mut args = Vec::new();
        if !self.tokens.next_is(")") {
            args.push(self.expression());
            while self.tokens.next_is(",") {
                self.tokens.get_raw();
                args.push(self.expression());
            }
        }
        self.expect(")");

        match Builtin::from_name(&name) {
            Some(builtin) => AstNode::builtin(builtin, args),
            None => AstNode::call(name, args),
        }
    }

    /// Number, string literal or identifier. Anything else leaves a gap.
    fn atom(&mut self) -> AstNode {
        if self.tokens.peek(0).map_or(true, is_symbol) {
            return self.missing_operand();
        }
        match self.tokens.get() {
            Some(Token::Number(n)) => AstNode::Number(n),
            Some(Token::Text(text)) if is_string_literal(&text) => AstNode::string(unquote(&text)),
            Some(Token::Text(text)) => AstNode::Identifier(text),
            None => self.missing_operand(),
        }
    }

    fn suffixes(&mut self, mut node: AstNode) -> AstNode {
        while self.tokens.next_is("[") {
            self.tokens.get_raw();
            let key = self.expression();
            self.expect("]");
            node = AstNode::binary(Operator::Index, node, key);
        }
        node
    }

    fn lookahead(&self) -> Lookahead {
        let Some(token) = self.tokens.peek(0) else {
            return Lookahead::End;
        };
        match token {
            "(" => Lookahead::Group,
            "-" => Lookahead::Negate,
            "!" => Lookahead::Not,
            t if is_symbol(t) => Lookahead::Symbol,
            t if starts_call(t) && self.tokens.peek(1) == Some("(") => Lookahead::Call,
            _ => Lookahead::Atom,
        }
    }

    /// Consume `symbol`, or record it as missing without consuming.
    fn expect(&mut self, symbol: &str) -> bool {
        if self.tokens.next_is(symbol) {
            self.tokens.get_raw();
            true
        } else {
            self.record(format!(
                "expected '{}', found {}",
                symbol,
                describe(self.tokens.peek(0))
            ));
            false
        }
    }

    fn missing_operand(&mut self) -> AstNode {
        self.record(format!(
            "expected an operand, found {}",
            describe(self.tokens.peek(0))
        ));
        AstNode::Empty
    }

    fn record(&mut self, problem: String) {
        debug!(%problem, "formula is incomplete");
        if self.problem.is_none() {
            self.problem = Some(problem);
        }
    }
}

/// A word that may name a callable: not a literal, not a number, and
/// containing at least one word character.
fn starts_call(token: &str) -> bool {
    !is_string_literal(token)
        && parse_number(token).is_none()
        && token.chars().any(|c| c.is_alphanumeric() || c == '_')
}

fn describe(token: Option<&str>) -> String {
    match token {
        Some(t) => format!("'{}'", t),
        None => "end of formula".to_string(),
    }
}

/// Parse a formula, requiring it to be complete.
///
/// Use [`Parser`] directly (or [`crate::Formula`]) to keep the partial tree
/// of an invalid formula instead.
pub fn parse(formula: &str) -> Result<AstNode, ParserError> {
    let mut parser = Parser::new(formula);
    let ast = parser.parse();
    if let Some(problem) = parser.problem.take() {
        return Err(ParserError::Incomplete(problem));
    }
    if !parser.tokens.is_empty() {
        return Err(ParserError::TrailingTokens(parser.tokens.to_source()));
    }
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NativeOp;
    use crate::value::Value;

    fn num(n: f64) -> AstNode {
        AstNode::Number(n)
    }

    fn ident(name: &str) -> AstNode {
        AstNode::identifier(name)
    }

    #[test]
    fn test_parse_precedence() {
        // 2 + 3 * 4 should parse as 2 + (3 * 4)
        assert_eq!(
            parse("2 + 3 * 4").unwrap(),
            AstNode::binary(
                Operator::Add,
                num(2.0),
                AstNode::binary(Operator::Multiply, num(3.0), num(4.0))
            )
        );
    }

    #[test]
    fn test_parse_parentheses() {
        assert_eq!(
            parse("(2 + 3) * 4").unwrap(),
            AstNode::binary(
                Operator::Multiply,
                AstNode::binary(Operator::Add, num(2.0), num(3.0)),
                num(4.0)
            )
        );
    }

    #[test]
    fn test_parse_left_associative() {
        assert_eq!(
            parse("8 - 2 - 1").unwrap(),
            AstNode::binary(
                Operator::Subtract,
                AstNode::binary(Operator::Subtract, num(8.0), num(2.0)),
                num(1.0)
            )
        );
    }

    #[test]
    fn test_parse_levels() {
        // a + 1 > b || c && d  =>  ((a + 1) > b || c) && d
        let ast = parse("a + 1 > b || c && d").unwrap();
        let expected = AstNode::binary(
            Operator::And,
            AstNode::binary(
                Operator::Or,
                AstNode::binary(
                    Operator::Greater,
                    AstNode::binary(Operator::Add, ident("a"), num(1.0)),
                    ident("b"),
                ),
                ident("c"),
            ),
            ident("d"),
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_parse_ternary() {
        assert_eq!(
            parse("cond ? 1 : x + 2").unwrap(),
            AstNode::operator(
                Operator::Select,
                vec![
                    ident("cond"),
                    num(1.0),
                    AstNode::binary(Operator::Add, ident("x"), num(2.0))
                ]
            )
        );
    }

    #[test]
    fn test_ternary_does_not_chain() {
        let mut parser = Parser::new("a ? 1 : b ? 2 : 3");
        parser.parse();
        assert!(!parser.is_valid());
        assert_eq!(parser.remaining(), vec!["?", "2", ":", "3"]);
    }

    #[test]
    fn test_missing_colon_is_invalid() {
        let mut parser = Parser::new("a ? 1");
        assert_eq!(parser.parse(), ident("a"));
        assert!(!parser.is_valid());
        assert!(matches!(parse("a ? 1"), Err(ParserError::Incomplete(_))));
    }

    #[test]
    fn test_parse_string_literal() {
        assert_eq!(parse(r"'it\'s ok'").unwrap(), AstNode::string("it's ok"));
        assert_eq!(parse("'a + b'").unwrap(), AstNode::string("a + b"));
        assert_eq!(
            parse("'5'").unwrap(),
            AstNode::Literal(Value::string("5"))
        );
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(parse("Base Strength").unwrap(), ident("Base Strength"));
        assert_eq!(parse("Fortress.Wood").unwrap(), ident("Fortress.Wood"));
        assert_eq!(parse("@MaxLevel").unwrap(), ident("@MaxLevel"));
    }

    #[test]
    fn test_parse_builtin_call() {
        let ast = parse("max(1, 5, 3)").unwrap();
        assert_eq!(
            ast,
            AstNode::builtin(Builtin::Max, vec![num(1.0), num(5.0), num(3.0)])
        );
        assert!(matches!(
            ast,
            AstNode::Native {
                op: NativeOp::Function(Builtin::Max),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_named_call() {
        assert_eq!(
            parse("each(Items, item.Value * 2)").unwrap(),
            AstNode::call(
                "each",
                vec![
                    ident("Items"),
                    AstNode::binary(Operator::Multiply, ident("item.Value"), num(2.0))
                ]
            )
        );
        assert_eq!(parse("double(x)").unwrap(), AstNode::call("double", vec![ident("x")]));
    }

    #[test]
    fn test_parse_empty_call() {
        assert_eq!(parse("now()").unwrap(), AstNode::call("now", vec![]));
    }

    #[test]
    fn test_number_is_not_callable() {
        let mut parser = Parser::new("2(3)");
        assert_eq!(parser.parse(), num(2.0));
        assert!(!parser.is_valid());
        assert_eq!(parser.remaining(), vec!["(", "3", ")"]);
    }

    #[test]
    fn test_builtin_name_without_parens_is_identifier() {
        assert_eq!(parse("max").unwrap(), ident("max"));
    }

    #[test]
    fn test_parse_index_chain() {
        assert_eq!(
            parse("a[0][b + 1]").unwrap(),
            AstNode::binary(
                Operator::Index,
                AstNode::binary(Operator::Index, ident("a"), num(0.0)),
                AstNode::binary(Operator::Add, ident("b"), num(1.0))
            )
        );
        assert_eq!(
            parse("(a)[1]").unwrap(),
            AstNode::binary(Operator::Index, ident("a"), num(1.0))
        );
        assert_eq!(
            parse("f(x)[0]").unwrap(),
            AstNode::binary(Operator::Index, AstNode::call("f", vec![ident("x")]), num(0.0))
        );
    }

    #[test]
    fn test_parse_unary() {
        assert_eq!(
            parse("-x * 2").unwrap(),
            AstNode::binary(
                Operator::Multiply,
                AstNode::operator(Operator::Negate, vec![ident("x")]),
                num(2.0)
            )
        );
        assert_eq!(
            parse("!(a && b)").unwrap(),
            AstNode::operator(
                Operator::Not,
                vec![AstNode::binary(Operator::And, ident("a"), ident("b"))]
            )
        );
        // Suffixes after a unary atom index the unary result
        assert_eq!(
            parse("-a[0]").unwrap(),
            AstNode::binary(
                Operator::Index,
                AstNode::operator(Operator::Negate, vec![ident("a")]),
                num(0.0)
            )
        );
        // A call keeps its own suffixes
        assert_eq!(
            parse("-f(x)[0]").unwrap(),
            AstNode::operator(
                Operator::Negate,
                vec![AstNode::binary(
                    Operator::Index,
                    AstNode::call("f", vec![ident("x")]),
                    num(0.0)
                )]
            )
        );
    }

    #[test]
    fn test_double_unary_is_invalid() {
        let mut parser = Parser::new("!!x");
        assert_eq!(
            parser.parse(),
            AstNode::operator(Operator::Not, vec![AstNode::Empty])
        );
        assert!(!parser.is_valid());
    }

    #[test]
    fn test_missing_operand() {
        let mut parser = Parser::new("1 +");
        assert_eq!(
            parser.parse(),
            AstNode::binary(Operator::Add, num(1.0), AstNode::Empty)
        );
        assert!(parser.remaining().is_empty());
        assert!(!parser.is_valid());
        assert_eq!(parser.problem(), Some("expected an operand, found end of formula"));
    }

    #[test]
    fn test_missing_closer() {
        let mut parser = Parser::new("(1 + 2");
        parser.parse();
        assert!(!parser.is_valid());
        assert_eq!(
            parse("max(1, 2"),
            Err(ParserError::Incomplete("expected ')', found end of formula".to_string()))
        );
        assert!(matches!(parse("a[0"), Err(ParserError::Incomplete(_))));
    }

    #[test]
    fn test_trailing_tokens() {
        assert_eq!(
            parse("1 )"),
            Err(ParserError::TrailingTokens(")".to_string()))
        );
        let mut parser = Parser::new("a ) b");
        assert_eq!(parser.parse(), ident("a"));
        assert_eq!(parser.remaining(), vec![")", "b"]);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&nested(100)), Ok(AstNode::number(1.0)));

        let formula = nested(2000);
        assert_eq!(
            parse(&formula),
            Err(ParserError::Incomplete(format!("nesting deeper than {} levels", MAX_NESTING)))
        );
        let mut parser = Parser::new(&formula);
        parser.parse();
        assert!(!parser.is_valid());
    }

    #[test]
    fn test_empty_formula() {
        let mut parser = Parser::new("   ");
        assert_eq!(parser.parse(), AstNode::Empty);
        assert!(!parser.is_valid());
    }
}
