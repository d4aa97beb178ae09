// formulang - Embeddable formula language for row-oriented data
// Copyright (c) 2025 formulang contributors
// Licensed under the MIT License

//! # formulang
//!
//! A small expression language for user-authored formulas evaluated against
//! host records ("subjects"), such as one row of a table.
//!
//! ```
//! use formulang::{value, Environment, Formula, Host, Value};
//!
//! let env = Environment::builder().value("Bonus", 5).build();
//! let host = Host::new();
//! let formula = Formula::new("Level * 2 + Bonus");
//! assert!(formula.is_valid());
//!
//! let subject = value!({"Level": 10});
//! assert_eq!(formula.evaluate(&subject, &env, &host).unwrap(), Value::from(25));
//! ```
//!
//! ## Architecture
//!
//! - `tokenizer` - Splits formulas into tokens
//! - `parser` - Precedence parser (tokens to AST, with a validity flag)
//! - `ast` - Abstract Syntax Tree definitions
//! - `evaluator` - Tree-walking evaluator
//! - `resolver` - Ordered identifier-resolution strategies
//! - `operators` - Native operator semantics
//! - `functions` - Built-in function implementations
//! - `datetime` - Date, time and duration formatting
//! - `environment` - Variables and user functions
//! - `host` - Named constants and keyword tiers
//! - `scope` - Per-call local bindings
//! - `value` - Dynamic value type
//! - `config` - Evaluation settings

pub mod ast;
pub mod config;
pub mod datetime;
pub mod environment;
pub mod evaluator;
pub mod functions;
pub mod host;
pub mod operators;
pub mod parser;
pub mod resolver;
pub mod scope;
pub mod tokenizer;
pub mod value;

pub use ast::{AstNode, NativeOp, Operator, SpecialForm};
pub use config::EvalConfig;
pub use environment::{
    Definitions, Environment, EnvironmentBuilder, EnvironmentError, Function, Variable,
};
pub use evaluator::{Evaluator, EvaluatorError};
pub use functions::Builtin;
pub use host::{Accessor, Host, Tier};
pub use parser::{parse, Parser, ParserError};
pub use resolver::{Resolve, ResolverChain};
pub use scope::Scope;
pub use tokenizer::tokenize;
pub use value::Value;

/// A parsed formula.
///
/// Parsing never fails: a formula the parser could not consume completely
/// is kept with its partial tree and reports `is_valid() == false`. Hosts
/// should reject or flag such formulas. Use [`Formula::parse`] to turn
/// invalidity into an error instead.
#[derive(Debug, Clone)]
pub struct Formula {
    source: String,
    ast: AstNode,
    valid: bool,
    remaining: Vec<String>,
}

impl Formula {
    pub fn new(source: &str) -> Self {
        let mut parser = Parser::new(source);
        let ast = parser.parse();
        Formula {
            source: source.to_string(),
            ast,
            valid: parser.is_valid(),
            remaining: parser.remaining(),
        }
    }

    /// Parse, requiring the formula to be complete.
    pub fn parse(source: &str) -> Result<Self, ParserError> {
        let ast = parser::parse(source)?;
        Ok(Formula {
            source: source.to_string(),
            ast,
            valid: true,
            remaining: Vec::new(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &AstNode {
        &self.ast
    }

    /// Whether the whole formula was consumed by the parser.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Tokens left over after parsing stopped.
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    /// Evaluate against one subject with default settings and no scope.
    pub fn evaluate(
        &self,
        subject: &Value,
        environment: &Environment,
        host: &Host,
    ) -> Result<Value, EvaluatorError> {
        Evaluator::new(environment, host).evaluate(&self.ast, subject, None)
    }

    /// Evaluate with an existing evaluator, optionally inside a scope.
    pub fn evaluate_with(
        &self,
        evaluator: &mut Evaluator<'_>,
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        evaluator.evaluate(&self.ast, subject, scope)
    }
}

/// Parse and evaluate `formula` against `subject` with an empty environment
/// and no host tables.
pub fn evaluate(formula: &str, subject: &Value) -> Result<Value, EvaluatorError> {
    Formula::new(formula).evaluate(subject, &Environment::new(), &Host::new())
}
