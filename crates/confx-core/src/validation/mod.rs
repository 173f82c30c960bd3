//! Validation engine contract
//!
//! The repository builds a rule set per item and hands it, together with the
//! raw input, to a `ValidationEngine`. Engines report failures as plain
//! messages keyed by field name; turning field names into item labels is the
//! repository's job.

pub mod rules;

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::value::Map;

pub use rules::RuleValidator;

/// Ordered `(field, rules)` pairs
pub type RuleSet = Vec<(String, Vec<String>)>;

/// Result of a validation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    /// Messages per failing field
    pub errors: BTreeMap<String, Vec<String>>,
    /// Input restricted to fields that have rules and were supplied
    pub validated: Map,
}

impl ValidationOutcome {
    pub fn fails(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn passes(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Rule-based field validation
pub trait ValidationEngine: Send + Sync {
    /// Check `values` against `rules`
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` when a rule descriptor is not understood.
    /// Failing fields are not an error; they are reported in the outcome.
    fn validate(&self, values: &Map, rules: &RuleSet) -> Result<ValidationOutcome>;
}
