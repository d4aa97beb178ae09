//! Evaluation settings.
//!
//! Settings can come from a serialized document or from environment variables.

use serde::{Deserialize, Serialize};

/// Default prefix marking a named-constant reference (`@MaxLevel`).
pub const DEFAULT_CONSTANT_PREFIX: char = '@';

/// Settings for one [`Evaluator`](crate::Evaluator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalConfig {
    /// Maximum nesting of user-function calls and deferred-variable
    /// evaluations. `None` leaves recursion unguarded.
    pub max_call_depth: Option<usize>,
    /// First character of a named-constant reference.
    pub constant_prefix: char,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_call_depth: None,
            constant_prefix: DEFAULT_CONSTANT_PREFIX,
        }
    }
}

impl EvalConfig {
    /// Load settings from `FORMULANG_MAX_CALL_DEPTH` and
    /// `FORMULANG_CONSTANT_PREFIX`, keeping defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("FORMULANG_MAX_CALL_DEPTH") {
            config.max_call_depth = parse_depth(&v);
        }
        if let Ok(v) = std::env::var("FORMULANG_CONSTANT_PREFIX") {
            if let Some(c) = v.trim().chars().next() {
                config.constant_prefix = c;
            }
        }

        config
    }

    /// Limit nested calls to `depth`.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_constant_prefix(mut self, prefix: char) -> Self {
        self.constant_prefix = prefix;
        self
    }
}

/// `"0"`, `"none"` and `"off"` disable the limit.
fn parse_depth(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off") {
        return None;
    }
    raw.parse::<usize>().ok().filter(|depth| *depth > 0)
}
