use std::sync::Arc;

use crate::errors::Result;
use crate::validation::{RuleSet, ValidationEngine, ValidationOutcome};
use crate::value::Map;

/// Separator the validation engine would read as nesting
const PATH_SEPARATOR: &str = ".";
/// Stand-in for `.` inside item ids handed to the engine
const ESCAPED_SEPARATOR: &str = "->";

/// Item id as a flat validation field name
pub fn escape_field(id: &str) -> String {
    id.replace(PATH_SEPARATOR, ESCAPED_SEPARATOR)
}

/// Validation field name back to the item id
pub fn unescape_field(field: &str) -> String {
    field.replace(ESCAPED_SEPARATOR, PATH_SEPARATOR)
}

/// Input and rules for the repository's items, bound to an engine
///
/// Built by `PersistentRepository::make_validator`. Field names are the
/// escaped item ids, so `mail.host` is validated as the flat field
/// `mail->host` instead of a nested `mail` input.
pub struct ItemValidator {
    engine: Arc<dyn ValidationEngine>,
    values: Map,
    rules: RuleSet,
}

impl ItemValidator {
    pub fn new(engine: Arc<dyn ValidationEngine>, values: Map, rules: RuleSet) -> Self {
        Self {
            engine,
            values,
            rules,
        }
    }

    pub fn values(&self) -> &Map {
        &self.values
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// # Errors
    ///
    /// Returns `InvalidRule` if an item declares a rule the engine does not
    /// understand.
    pub fn run(&self) -> Result<ValidationOutcome> {
        self.engine.validate(&self.values, &self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        assert_eq!(escape_field("test.name"), "test->name");
        assert_eq!(unescape_field("test->name"), "test.name");
        assert_eq!(escape_field("plain"), "plain");
    }
}
