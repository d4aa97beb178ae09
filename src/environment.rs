// Environment: the host's registry of variables and user functions
//
// An Environment is built once per batch of evaluations and never changes
// afterwards, so any number of evaluations (on any number of threads) can
// read it at the same time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::ast::AstNode;
use crate::host::{Accessor, Host, Tier};
use crate::parser::{self, ParserError};
use crate::value::Value;

/// Environment errors
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Invalid formula for '{name}': {source}")]
    InvalidFormula {
        name: String,
        #[source]
        source: ParserError,
    },

    #[error("Invalid definitions document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

/// A named variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Precomputed value.
    Value(Value),
    /// Formula evaluated against the current subject, without a scope, on
    /// every access.
    Deferred(AstNode),
}

/// A user-defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Formal parameter names, bound positionally.
    pub params: Vec<String>,
    pub body: AstNode,
}

/// Immutable snapshot of variables and functions.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: IndexMap<String, Variable>,
    functions: IndexMap<String, Function>,
}

impl Environment {
    /// An environment with no variables and no functions.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    pub fn functions(&self) -> &IndexMap<String, Function> {
        &self.functions
    }
}

/// Builder for [`Environment`].
#[derive(Debug, Clone, Default)]
pub struct EnvironmentBuilder {
    env: Environment,
}

impl EnvironmentBuilder {
    /// Bind a precomputed value.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.env
            .variables
            .insert(name.into(), Variable::Value(value.into()));
        self
    }

    /// Bind an already parsed deferred formula.
    #[must_use]
    pub fn deferred(mut self, name: impl Into<String>, ast: AstNode) -> Self {
        self.env
            .variables
            .insert(name.into(), Variable::Deferred(ast));
        self
    }

    /// Parse `formula` and bind it as a deferred variable.
    pub fn formula(self, name: impl Into<String>, formula: &str) -> Result<Self, EnvironmentError> {
        let name = name.into();
        let ast = compile(&name, formula)?;
        Ok(self.deferred(name, ast))
    }

    /// Register an already parsed user function.
    #[must_use]
    pub fn function<P, S>(mut self, name: impl Into<String>, params: P, body: AstNode) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let params = params.into_iter().map(Into::into).collect();
        self.env
            .functions
            .insert(name.into(), Function { params, body });
        self
    }

    /// Parse `formula` and register it as a user function.
    pub fn function_formula<P, S>(
        self,
        name: impl Into<String>,
        params: P,
        formula: &str,
    ) -> Result<Self, EnvironmentError>
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let body = compile(&name, formula)?;
        Ok(self.function(name, params, body))
    }

    pub fn build(self) -> Environment {
        self.env
    }
}

fn compile(name: &str, formula: &str) -> Result<AstNode, EnvironmentError> {
    parser::parse(formula).map_err(|source| EnvironmentError::InvalidFormula {
        name: name.to_string(),
        source,
    })
}

/// A variable in a definitions document: a plain value, or `{"expr": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableDefinition {
    Formula(FormulaDefinition),
    Value(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaDefinition {
    pub expr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    #[serde(default)]
    pub args: Vec<String>,
    pub expr: String,
}

/// Keyword aliases per tier: name → dotted path on the subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordDefinitions {
    pub public: IndexMap<String, String>,
    pub protected: IndexMap<String, String>,
    pub private: IndexMap<String, String>,
}

impl KeywordDefinitions {
    fn tier(&self, tier: Tier) -> &IndexMap<String, String> {
        match tier {
            Tier::Public => &self.public,
            Tier::Protected => &self.protected,
            Tier::Private => &self.private,
        }
    }
}

/// Serializable description of an environment and host tables.
///
/// ```json
/// {
///   "variables": { "Bonus": 5, "Total": { "expr": "Level * 2 + Bonus" } },
///   "functions": { "double": { "args": ["x"], "expr": "x * 2" } },
///   "constants": { "MaxLevel": 800 },
///   "keywords": { "public": { "Guild": "Group.Name" } }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Definitions {
    pub variables: IndexMap<String, VariableDefinition>,
    pub functions: IndexMap<String, FunctionDefinition>,
    pub constants: IndexMap<String, Value>,
    pub keywords: KeywordDefinitions,
}

impl Definitions {
    pub fn from_json_str(s: &str) -> Result<Self, EnvironmentError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parse every formula and build the environment and host tables.
    pub fn compile(&self) -> Result<(Environment, Host), EnvironmentError> {
        let mut builder = Environment::builder();
        for (name, definition) in &self.variables {
            builder = match definition {
                VariableDefinition::Value(value) => builder.value(name, value.clone()),
                VariableDefinition::Formula(formula) => builder.formula(name, &formula.expr)?,
            };
        }
        for (name, definition) in &self.functions {
            builder = builder.function_formula(name, &definition.args, &definition.expr)?;
        }
        let environment = builder.build();

        let mut host = Host::new();
        for (name, value) in &self.constants {
            host.define_constant(name, value.clone());
        }
        for tier in Tier::ALL {
            for (name, path) in self.keywords.tier(tier) {
                host.define_keyword(tier, name, Accessor::Path(path.clone()));
            }
        }

        info!(
            variables = environment.variables().len(),
            functions = environment.functions().len(),
            constants = host.constants().len(),
            "compiled formula definitions"
        );
        Ok((environment, host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator;

    #[test]
    fn test_builder() {
        let env = Environment::builder()
            .value("Bonus", 5)
            .formula("Total", "Level * 2")
            .unwrap()
            .function_formula("double", ["x"], "x * 2")
            .unwrap()
            .build();

        assert_eq!(env.variable("Bonus"), Some(&Variable::Value(Value::from(5))));
        assert_eq!(
            env.variable("Total"),
            Some(&Variable::Deferred(AstNode::binary(
                Operator::Multiply,
                AstNode::identifier("Level"),
                AstNode::number(2.0)
            )))
        );
        let double = env.function("double").unwrap();
        assert_eq!(double.params, vec!["x".to_string()]);
        assert!(env.function("triple").is_none());
    }

    #[test]
    fn test_invalid_formula_is_rejected() {
        let err = Environment::builder().formula("Broken", "(1 + 2").unwrap_err();
        match err {
            EnvironmentError::InvalidFormula { name, .. } => assert_eq!(name, "Broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_definitions_document() {
        let defs = Definitions::from_json_str(
            r#"{
                "variables": {
                    "Bonus": 5,
                    "Total": { "expr": "Level * 2 + Bonus" },
                    "Meta": { "expr": "x", "note": "plain object" }
                },
                "functions": { "double": { "args": ["x"], "expr": "x * 2" } },
                "constants": { "MaxLevel": 800 },
                "keywords": { "public": { "Guild": "Group.Name" } }
            }"#,
        )
        .unwrap();

        let (env, host) = defs.compile().unwrap();
        assert!(matches!(env.variable("Bonus"), Some(Variable::Value(_))));
        assert!(matches!(env.variable("Total"), Some(Variable::Deferred(_))));
        assert!(matches!(env.variable("Meta"), Some(Variable::Value(Value::Object(_)))));
        assert_eq!(env.function("double").unwrap().params, vec!["x".to_string()]);
        assert_eq!(host.constant("MaxLevel"), Some(&Value::from(800)));
        assert!(host.keyword(Tier::Public, "Guild").is_some());
        assert!(host.keyword(Tier::Private, "Guild").is_none());
    }

    #[test]
    fn test_definitions_reject_bad_formula() {
        let defs = Definitions::from_json_str(
            r#"{ "functions": { "f": { "args": ["x"], "expr": "x *" } } }"#,
        )
        .unwrap();
        assert!(matches!(
            defs.compile(),
            Err(EnvironmentError::InvalidFormula { .. })
        ));
    }

    #[test]
    fn test_definitions_reject_bad_json() {
        assert!(matches!(
            Definitions::from_json_str("{"),
            Err(EnvironmentError::InvalidDocument(_))
        ));
    }
}
