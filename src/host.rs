//! Host-supplied lookup tables: named constants and the three keyword tiers.
//!
//! A keyword maps a symbolic name (`Level`, `Guild`) to an accessor over the
//! subject. Tiers are consulted in order `Public`, `Protected`, `Private`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Keyword table tier, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Protected,
    Private,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Public, Tier::Protected, Tier::Private];

    fn slot(self) -> usize {
        match self {
            Tier::Public => 0,
            Tier::Protected => 1,
            Tier::Private => 2,
        }
    }
}

/// Host closure computing a keyword from the subject.
pub type AccessorFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// How a keyword reads the subject.
#[derive(Clone)]
pub enum Accessor {
    /// Dotted attribute path on the subject.
    Path(String),
    Function(AccessorFn),
}

impl Accessor {
    pub fn access(&self, subject: &Value) -> Value {
        match self {
            Accessor::Path(path) => subject.get_path(path),
            Accessor::Function(f) => f(subject),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Accessor::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Name → accessor table for one tier.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    entries: IndexMap<String, Accessor>,
}

impl KeywordTable {
    pub fn get(&self, name: &str) -> Option<&Accessor> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, accessor: Accessor) {
        self.entries.insert(name.into(), accessor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only host tables shared by every evaluation.
#[derive(Debug, Clone, Default)]
pub struct Host {
    constants: IndexMap<String, Value>,
    tiers: [KeywordTable; 3],
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named constant, referenced in formulas with the constant prefix.
    #[must_use]
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.define_constant(name, value);
        self
    }

    /// Add a keyword computed by a closure over the subject.
    #[must_use]
    pub fn with_keyword<F>(mut self, tier: Tier, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.define_keyword(tier, name, Accessor::Function(Arc::new(f)));
        self
    }

    /// Add a keyword that aliases a dotted path on the subject.
    #[must_use]
    pub fn with_alias(
        mut self,
        tier: Tier,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.define_keyword(tier, name, Accessor::Path(path.into()));
        self
    }

    pub fn define_constant(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.constants.insert(name.into(), value.into());
    }

    pub fn define_keyword(&mut self, tier: Tier, name: impl Into<String>, accessor: Accessor) {
        self.tiers[tier.slot()].insert(name, accessor);
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn constants(&self) -> &IndexMap<String, Value> {
        &self.constants
    }

    pub fn keywords(&self, tier: Tier) -> &KeywordTable {
        &self.tiers[tier.slot()]
    }

    pub fn keyword(&self, tier: Tier, name: &str) -> Option<&Accessor> {
        self.keywords(tier).get(name)
    }
}
