//! Identifier resolution.
//!
//! A bare word in a formula is resolved by trying a fixed sequence of
//! strategies; the first one that answers wins. The standard chain is:
//!
//! 1. `this`, `undefined`, `null`
//! 2. scope bindings (exact name, or leading segment plus path)
//! 3. environment variables
//! 4. prefixed named constants (`@MaxLevel`)
//! 5. public, protected, then private host keywords
//! 6. a dotted attribute path on the subject

use std::fmt;

use crate::ast::AstNode;
use crate::config::DEFAULT_CONSTANT_PREFIX;
use crate::environment::{Environment, Variable};
use crate::host::{Host, Tier};
use crate::scope::Scope;
use crate::value::Value;

/// Everything a strategy may consult for one identifier.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub name: &'a str,
    pub subject: &'a Value,
    pub scope: Option<&'a Scope>,
    pub environment: &'a Environment,
    pub host: &'a Host,
}

/// The answer of a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    Value(Value),
    /// A formula the evaluator still has to run (a deferred variable).
    Deferred(&'a AstNode),
}

/// One identifier-resolution strategy.
pub trait Resolve: Send + Sync + fmt::Debug {
    /// `None` passes the identifier on to the next strategy.
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>>;
}

/// `this` (the scope as an object), `undefined` and `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordLiterals;

impl Resolve for KeywordLiterals {
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>> {
        let value = match lookup.name {
            "this" => lookup.scope.map(Scope::to_value).unwrap_or_default(),
            "undefined" => Value::Undefined,
            "null" => Value::Null,
            _ => return None,
        };
        Some(Resolved::Value(value))
    }
}

/// Bindings of the current call or iteration. A bound name shadows every
/// later strategy, whatever its value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeBindings;

impl Resolve for ScopeBindings {
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>> {
        lookup.scope?.lookup(lookup.name).map(Resolved::Value)
    }
}

/// Environment variables. A variable holding `null` reads as `undefined`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVariables;

impl Resolve for EnvironmentVariables {
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>> {
        Some(match lookup.environment.variable(lookup.name)? {
            Variable::Value(value) if value.is_nullish() => Resolved::Value(Value::Undefined),
            Variable::Value(value) => Resolved::Value(value.clone()),
            Variable::Deferred(ast) => Resolved::Deferred(ast),
        })
    }
}

/// `<prefix>Name` reads a host constant. A missing constant is `undefined`;
/// a prefixed name never reaches the keyword tiers or the subject.
#[derive(Debug, Clone, Copy)]
pub struct NamedConstants {
    pub prefix: char,
}

impl Default for NamedConstants {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CONSTANT_PREFIX,
        }
    }
}

impl Resolve for NamedConstants {
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>> {
        let name = lookup.name.strip_prefix(self.prefix)?;
        Some(Resolved::Value(
            lookup.host.constant(name).cloned().unwrap_or_default(),
        ))
    }
}

/// One tier of host keywords. Skipped when there is no subject.
#[derive(Debug, Clone, Copy)]
pub struct KeywordTier(pub Tier);

impl Resolve for KeywordTier {
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>> {
        if lookup.subject.is_nullish() {
            return None;
        }
        let accessor = lookup.host.keyword(self.0, lookup.name)?;
        Some(Resolved::Value(accessor.access(lookup.subject)))
    }
}

/// Dotted attribute path on the subject. Always answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectPath;

impl Resolve for SubjectPath {
    fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Option<Resolved<'a>> {
        Some(Resolved::Value(lookup.subject.get_path(lookup.name)))
    }
}

/// Ordered list of strategies.
#[derive(Debug)]
pub struct ResolverChain {
    strategies: Vec<Box<dyn Resolve>>,
}

impl ResolverChain {
    /// A chain with no strategies; every identifier resolves to `undefined`.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// The standard resolution order with the given constant prefix.
    pub fn standard(constant_prefix: char) -> Self {
        Self::empty()
            .with(KeywordLiterals)
            .with(ScopeBindings)
            .with(EnvironmentVariables)
            .with(NamedConstants {
                prefix: constant_prefix,
            })
            .with(KeywordTier(Tier::Public))
            .with(KeywordTier(Tier::Protected))
            .with(KeywordTier(Tier::Private))
            .with(SubjectPath)
    }

    /// Append a strategy after the existing ones.
    #[must_use]
    pub fn with(mut self, strategy: impl Resolve + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn resolve<'a>(&self, lookup: &Lookup<'a>) -> Resolved<'a> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.resolve(lookup))
            .unwrap_or(Resolved::Value(Value::Undefined))
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::standard(DEFAULT_CONSTANT_PREFIX)
    }
}
