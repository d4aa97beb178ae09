// Formula evaluator
//
// Walks the AST against a subject, the host's environment and host tables,
// and at most one flat scope. Data-shape problems never fail an evaluation;
// they degrade to `undefined` or `NaN`. The only error is a tripped
// call-depth limit.

use thiserror::Error;
use tracing::debug;

use crate::ast::{AstNode, SpecialForm};
use crate::config::EvalConfig;
use crate::environment::{Environment, Function};
use crate::host::Host;
use crate::operators;
use crate::resolver::{Lookup, Resolved, ResolverChain};
use crate::scope::Scope;
use crate::value::Value;

/// Evaluator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("Call depth limit ({limit}) exceeded")]
    CallDepthExceeded { limit: usize },
}

/// Evaluator for formula ASTs
///
/// Borrows the environment and host for its lifetime. Create one per
/// thread; the environment and host themselves can be shared.
pub struct Evaluator<'env> {
    environment: &'env Environment,
    host: &'env Host,
    resolvers: ResolverChain,
    config: EvalConfig,
    call_depth: usize,
}

impl<'env> Evaluator<'env> {
    pub fn new(environment: &'env Environment, host: &'env Host) -> Self {
        let config = EvalConfig::default();
        Evaluator {
            environment,
            host,
            resolvers: ResolverChain::standard(config.constant_prefix),
            config,
            call_depth: 0,
        }
    }

    /// Apply settings. Rebuilds the standard resolver chain for the
    /// configured constant prefix.
    #[must_use]
    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.resolvers = ResolverChain::standard(config.constant_prefix);
        self.config = config;
        self
    }

    /// Replace the identifier resolver chain.
    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverChain) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate `node` against `subject`, optionally inside `scope`.
    pub fn evaluate(
        &mut self,
        node: &AstNode,
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        self.eval(node, subject, scope)
    }

    fn eval(
        &mut self,
        node: &AstNode,
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        match node {
            AstNode::Empty => Ok(Value::Undefined),
            AstNode::Number(n) => Ok(Value::Number(*n)),
            AstNode::Literal(value) => Ok(value.clone()),
            AstNode::Identifier(name) => self.identifier(name, subject, scope),
            AstNode::Native { op, args } => {
                // Every argument is evaluated, including both branches of
                // `?:` and both sides of `||`/`&&`.
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, subject, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(op.apply(&values))
            }
            AstNode::Call { name, args } => self.call(name, args, subject, scope),
        }
    }

    fn identifier(
        &mut self,
        name: &str,
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        let lookup = Lookup {
            name,
            subject,
            scope,
            environment: self.environment,
            host: self.host,
        };
        match self.resolvers.resolve(&lookup) {
            Resolved::Value(value) => Ok(value),
            // Deferred variables see the subject but never the caller's scope
            Resolved::Deferred(ast) => self.descend(|ev| ev.eval(ast, subject, None)),
        }
    }

    fn call(
        &mut self,
        name: &str,
        args: &[AstNode],
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        if let Some(form) = SpecialForm::from_name(name).filter(|f| args.len() >= f.min_args()) {
            return match form {
                SpecialForm::Each => self.each(args, subject, scope),
                SpecialForm::Map => self.map(args, subject, scope),
                SpecialForm::Slice => self.slice(args, subject, scope),
            };
        }

        let environment = self.environment;
        let Some(function) = environment.function(name) else {
            debug!(function = name, "call to unregistered function");
            return Ok(Value::Undefined);
        };

        // Arguments are evaluated in the caller's context, one per parameter
        let mut bindings = Scope::new();
        for (i, param) in function.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(arg) => self.eval(arg, subject, scope)?,
                None => Value::Undefined,
            };
            bindings.define(param.as_str(), value);
        }
        self.invoke(function, &bindings, subject)
    }

    fn invoke(
        &mut self,
        function: &Function,
        bindings: &Scope,
        subject: &Value,
    ) -> Result<Value, EvaluatorError> {
        self.descend(|ev| ev.eval(&function.body, subject, Some(bindings)))
    }

    /// `each(collection, mapper)`: `+` over the mapped elements, from `0`.
    fn each(
        &mut self,
        args: &[AstNode],
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        let Some(mapped) = self.map_elements(args, subject, scope)? else {
            return Ok(Value::Undefined);
        };
        Ok(mapped
            .iter()
            .fold(Value::Number(0.0), |acc, v| operators::add(&acc, v)))
    }

    /// `map(collection, mapper)`: the mapped elements as a list.
    fn map(
        &mut self,
        args: &[AstNode],
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        Ok(self
            .map_elements(args, subject, scope)?
            .map(Value::array)
            .unwrap_or_default())
    }

    /// Apply the mapper of `each`/`map` to every element of the collection.
    ///
    /// A mapper naming a user function binds every parameter to the element.
    /// Any other identifier is a path whose leading segment names the
    /// element. `None` when the mapper is not an identifier at all.
    fn map_elements(
        &mut self,
        args: &[AstNode],
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Option<Vec<Value>>, EvaluatorError> {
        let Some(mapper) = args[1].as_identifier() else {
            debug!(mapper = ?args[1], "collection mapper is not a name");
            return Ok(None);
        };
        let elements = self.eval(&args[0], subject, scope)?.values();

        let environment = self.environment;
        let mut mapped = Vec::with_capacity(elements.len());
        if let Some(function) = environment.function(mapper) {
            for element in elements {
                let bindings: Scope = function
                    .params
                    .iter()
                    .map(|param| (param.as_str(), element.clone()))
                    .collect();
                mapped.push(self.invoke(function, &bindings, subject)?);
            }
        } else {
            let binding = mapper.split('.').next().unwrap_or(mapper);
            for element in elements {
                let bindings = Scope::single(binding, element);
                mapped.push(self.eval(&args[1], subject, Some(&bindings))?);
            }
        }
        Ok(Some(mapped))
    }

    /// `slice(collection, start, end)` with end exclusive. Negative bounds
    /// count from the end; `NaN` reads as `0`.
    fn slice(
        &mut self,
        args: &[AstNode],
        subject: &Value,
        scope: Option<&Scope>,
    ) -> Result<Value, EvaluatorError> {
        let elements = self.eval(&args[0], subject, scope)?.values();
        let start = self.eval(&args[1], subject, scope)?.to_number();
        let end = self.eval(&args[2], subject, scope)?.to_number();

        let len = elements.len();
        let start = relative_index(start, len);
        let end = relative_index(end, len);
        if start >= end {
            return Ok(Value::array(Vec::new()));
        }
        Ok(Value::array(elements[start..end].to_vec()))
    }

    /// Run `f` one call level deeper, failing if that passes the limit.
    fn descend<F>(&mut self, f: F) -> Result<Value, EvaluatorError>
    where
        F: FnOnce(&mut Self) -> Result<Value, EvaluatorError>,
    {
        if let Some(limit) = self.config.max_call_depth {
            if self.call_depth >= limit {
                debug!(limit, "call depth limit reached");
                return Err(EvaluatorError::CallDepthExceeded { limit });
            }
        }
        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }
}

/// Clamp a slice bound into `0..=len`.
fn relative_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}
