//! Built-in rule validator
//!
//! Supported rules: `sometimes`, `required`, `nullable`, `filled`, `string`,
//! `integer`, `numeric`, `boolean`, `array`, `email`, `json`, `min:n`,
//! `max:n`, `between:a,b`, `in:a,b,..`, `not_in:a,b,..`.
//!
//! Absent or empty values only go through the presence rules (`required`,
//! `filled`); type and size rules are skipped for them. Field names are
//! looked up literally first and then as dotted paths into nested input.

use std::collections::BTreeMap;

use super::{RuleSet, ValidationEngine, ValidationOutcome};
use crate::errors::{ConfigError, Result};
use crate::memory_config::MemoryConfig;
use crate::repository::ConfigRepository;
use crate::value::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Sometimes,
    Required,
    Nullable,
    Filled,
    String,
    Integer,
    Numeric,
    Boolean,
    Array,
    Email,
    Json,
    Min(f64),
    Max(f64),
    Between(f64, f64),
    In(Vec<String>),
    NotIn(Vec<String>),
}

impl Rule {
    fn parse(descriptor: &str) -> Result<Rule> {
        let invalid = || ConfigError::InvalidRule {
            rule: descriptor.to_string(),
        };
        let (name, params) = match descriptor.split_once(':') {
            Some((name, params)) => (name.trim(), Some(params)),
            None => (descriptor.trim(), None),
        };
        let list = |params: Option<&str>| -> Vec<String> {
            params
                .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default()
        };
        let number = |text: &str| text.trim().parse::<f64>().map_err(|_| invalid());

        let rule = match name {
            "sometimes" => Rule::Sometimes,
            "required" => Rule::Required,
            "nullable" => Rule::Nullable,
            "filled" => Rule::Filled,
            "string" => Rule::String,
            "integer" | "int" => Rule::Integer,
            "numeric" => Rule::Numeric,
            "boolean" | "bool" => Rule::Boolean,
            "array" => Rule::Array,
            "email" => Rule::Email,
            "json" => Rule::Json,
            "min" => Rule::Min(number(params.ok_or_else(invalid)?)?),
            "max" => Rule::Max(number(params.ok_or_else(invalid)?)?),
            "between" => {
                let bounds = list(params);
                match bounds.as_slice() {
                    [low, high] => Rule::Between(number(low.as_str())?, number(high.as_str())?),
                    _ => return Err(invalid()),
                }
            }
            "in" => Rule::In(list(params)),
            "not_in" => Rule::NotIn(list(params)),
            _ => return Err(invalid()),
        };
        Ok(rule)
    }

    fn is_presence(&self) -> bool {
        matches!(self, Rule::Required | Rule::Filled)
    }
}

/// Value size the way the size rules see it
enum Size {
    Number(f64),
    Chars(f64),
    Items(f64),
}

impl Size {
    fn of(value: &Value, numeric: bool) -> Option<Size> {
        match value {
            Value::Int(i) => Some(Size::Number(*i as f64)),
            Value::Float(f) => Some(Size::Number(*f)),
            Value::String(s) if numeric => s.trim().parse::<f64>().ok().map(Size::Number),
            Value::String(s) => Some(Size::Chars(s.chars().count() as f64)),
            Value::List(items) => Some(Size::Items(items.len() as f64)),
            Value::Map(map) => Some(Size::Items(map.len() as f64)),
            Value::Null | Value::Bool(_) => None,
        }
    }

    fn amount(&self) -> f64 {
        match self {
            Size::Number(n) | Size::Chars(n) | Size::Items(n) => *n,
        }
    }
}

/// Default `ValidationEngine`
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    pub fn new() -> Self {
        Self
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::List(items)) => items.is_empty(),
        Some(Value::Map(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Int(_) => true,
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Int(_) | Value::Float(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Int(i) => *i == 0 || *i == 1,
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

fn is_email(value: &Value) -> bool {
    let Some(text) = value.as_str() else {
        return false;
    };
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn size_message(field: &str, size: &Size, phrase: &str, bound: &str) -> String {
    match size {
        Size::Number(_) => format!("The {field} must {phrase} {bound}."),
        Size::Chars(_) => format!("The {field} must {phrase} {bound} characters."),
        Size::Items(_) => format!("The {field} must {phrase} {bound} items."),
    }
}

/// Check one rule against a present, non-empty value
fn check(rule: &Rule, field: &str, value: &Value, numeric: bool) -> Option<String> {
    match rule {
        Rule::Sometimes | Rule::Nullable | Rule::Required | Rule::Filled => None,
        Rule::String => {
            (value.as_str().is_none()).then(|| format!("The {field} must be a string."))
        }
        Rule::Integer => (!is_integer(value)).then(|| format!("The {field} must be an integer.")),
        Rule::Numeric => (!is_numeric(value)).then(|| format!("The {field} must be a number.")),
        Rule::Boolean => {
            (!is_boolean(value)).then(|| format!("The {field} field must be true or false."))
        }
        Rule::Array => (!matches!(value, Value::List(_) | Value::Map(_)))
            .then(|| format!("The {field} must be an array.")),
        Rule::Email => {
            (!is_email(value)).then(|| format!("The {field} must be a valid email address."))
        }
        Rule::Json => {
            let valid = value
                .as_str()
                .map(|text| serde_json::from_str::<serde_json::Value>(text).is_ok())
                .unwrap_or(false);
            (!valid).then(|| format!("The {field} must be a valid JSON string."))
        }
        Rule::Min(min) => Size::of(value, numeric).and_then(|size| {
            (size.amount() < *min)
                .then(|| size_message(field, &size, "be at least", &format_number(*min)))
        }),
        Rule::Max(max) => Size::of(value, numeric).and_then(|size| {
            (size.amount() > *max).then(|| {
                size_message(field, &size, "not be greater than", &format_number(*max))
            })
        }),
        Rule::Between(low, high) => Size::of(value, numeric).and_then(|size| {
            let amount = size.amount();
            (amount < *low || amount > *high).then(|| {
                let bound = format!("{} and {}", format_number(*low), format_number(*high));
                size_message(field, &size, "be between", &bound)
            })
        }),
        Rule::In(allowed) => (!allowed.contains(&value.to_plain_string()))
            .then(|| format!("The selected {field} is invalid.")),
        Rule::NotIn(denied) => denied
            .contains(&value.to_plain_string())
            .then(|| format!("The selected {field} is invalid.")),
    }
}

impl ValidationEngine for RuleValidator {
    fn validate(&self, values: &Map, rules: &RuleSet) -> Result<ValidationOutcome> {
        let input = MemoryConfig::from_map(values.clone());
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut validated = Map::new();

        for (field, descriptors) in rules {
            let parsed = descriptors
                .iter()
                .map(|d| Rule::parse(d))
                .collect::<Result<Vec<Rule>>>()?;

            let value = input.get(field);
            if value.is_none() && parsed.contains(&Rule::Sometimes) {
                continue;
            }
            if matches!(value, Some(Value::Null))
                && parsed.contains(&Rule::Nullable)
                && !parsed.contains(&Rule::Required)
            {
                validated.insert(field.clone(), Value::Null);
                continue;
            }

            let numeric = parsed
                .iter()
                .any(|r| matches!(r, Rule::Integer | Rule::Numeric));
            let empty = is_empty(value.as_ref());
            let mut messages = Vec::new();

            for rule in &parsed {
                let message = match (rule, &value) {
                    (Rule::Required, _) if empty => {
                        Some(format!("The {field} field is required."))
                    }
                    (Rule::Filled, Some(_)) if empty => {
                        Some(format!("The {field} field must have a value."))
                    }
                    (rule, Some(v)) if !empty && !rule.is_presence() => {
                        check(rule, field, v, numeric)
                    }
                    _ => None,
                };
                if let Some(message) = message {
                    messages.push(message);
                    // a failed presence rule makes the type rules meaningless
                    if rule.is_presence() {
                        break;
                    }
                }
            }

            if !messages.is_empty() {
                errors.insert(field.clone(), messages);
            } else if let Some(value) = value {
                validated.insert(field.clone(), value);
            }
        }

        Ok(ValidationOutcome { errors, validated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::map;

    fn rules(pairs: &[(&str, &[&str])]) -> RuleSet {
        pairs
            .iter()
            .map(|(field, rules)| {
                (
                    field.to_string(),
                    rules.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    fn input(pairs: Vec<(&str, Value)>) -> Map {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_required_message_uses_raw_field() {
        let outcome = RuleValidator
            .validate(
                &input(vec![("test->name", Value::from(""))]),
                &rules(&[("test->name", &["sometimes", "required"])]),
            )
            .unwrap();
        assert!(outcome.fails());
        assert_eq!(
            outcome.errors["test->name"],
            vec!["The test->name field is required.".to_string()]
        );
    }

    #[test]
    fn test_sometimes_skips_absent_fields() {
        let outcome = RuleValidator
            .validate(
                &Map::new(),
                &rules(&[("a", &["sometimes", "required"]), ("b", &["required"])]),
            )
            .unwrap();
        assert!(!outcome.errors.contains_key("a"));
        assert!(outcome.errors.contains_key("b"));
    }

    #[test]
    fn test_validated_contains_only_ruled_present_fields() {
        let outcome = RuleValidator
            .validate(
                &input(vec![
                    ("port", Value::from("25")),
                    ("extra", Value::from("ignored")),
                ]),
                &rules(&[("port", &["required", "integer"]), ("host", &["sometimes", "string"])]),
            )
            .unwrap();
        assert!(outcome.passes());
        assert_eq!(outcome.validated, input(vec![("port", Value::from("25"))]));
    }

    #[test]
    fn test_type_rules() {
        let cases: Vec<(&str, Value, bool)> = vec![
            ("string", Value::Int(1), false),
            ("integer", Value::from("12"), true),
            ("integer", Value::Float(1.5), false),
            ("numeric", Value::from("1.5"), true),
            ("boolean", Value::Int(2), false),
            ("boolean", Value::from("true"), true),
            ("array", Value::List(vec![Value::Int(1)]), true),
            ("email", Value::from("admin@example.com"), true),
            ("email", Value::from("admin@localhost"), false),
            ("json", Value::from(r#"{"a":1}"#), true),
            ("json", Value::from("{a"), false),
        ];
        for (rule, value, passes) in cases {
            let outcome = RuleValidator
                .validate(&input(vec![("f", value.clone())]), &rules(&[("f", &[rule])]))
                .unwrap();
            assert_eq!(outcome.passes(), passes, "rule {} on {:?}", rule, value);
        }
    }

    #[test]
    fn test_size_rules_follow_value_kind() {
        let outcome = RuleValidator
            .validate(
                &input(vec![
                    ("name", Value::from("ab")),
                    ("port", Value::from("70000")),
                    ("tags", Value::List(vec![])),
                    ("retries", Value::Int(4)),
                ]),
                &rules(&[
                    ("name", &["min:3"]),
                    ("port", &["integer", "max:65535"]),
                    ("retries", &["between:1,3"]),
                ]),
            )
            .unwrap();
        assert_eq!(
            outcome.errors["name"],
            vec!["The name must be at least 3 characters.".to_string()]
        );
        assert_eq!(
            outcome.errors["port"],
            vec!["The port must not be greater than 65535.".to_string()]
        );
        assert_eq!(
            outcome.errors["retries"],
            vec!["The retries must be between 1 and 3.".to_string()]
        );
    }

    #[test]
    fn test_in_and_not_in() {
        let outcome = RuleValidator
            .validate(
                &input(vec![("driver", Value::from("smtp")), ("env", Value::from("prod"))]),
                &rules(&[("driver", &["in:smtp,sendmail"]), ("env", &["not_in:prod"])]),
            )
            .unwrap();
        assert!(!outcome.errors.contains_key("driver"));
        assert_eq!(
            outcome.errors["env"],
            vec!["The selected env is invalid.".to_string()]
        );
    }

    #[test]
    fn test_nullable_accepts_null() {
        let outcome = RuleValidator
            .validate(
                &input(vec![("f", Value::Null)]),
                &rules(&[("f", &["nullable", "integer"])]),
            )
            .unwrap();
        assert!(outcome.passes());
        assert_eq!(outcome.validated["f"], Value::Null);
    }

    #[test]
    fn test_dotted_field_reads_nested_input() {
        let outcome = RuleValidator
            .validate(
                &input(vec![("mail", map([("port", Value::from("x"))]))]),
                &rules(&[("mail.port", &["integer"])]),
            )
            .unwrap();
        assert_eq!(
            outcome.errors["mail.port"],
            vec!["The mail.port must be an integer.".to_string()]
        );
    }

    #[test]
    fn test_unknown_rule_is_an_error() {
        let err = RuleValidator
            .validate(&Map::new(), &rules(&[("f", &["uuid"])]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidRule {
                rule: "uuid".to_string()
            }
        );
        assert!(RuleValidator
            .validate(&Map::new(), &rules(&[("f", &["between:1"])]))
            .is_err());
    }
}
