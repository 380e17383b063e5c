// Validation problem types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use yamlscope_yaml::ProblemSeverity;

/// Structured validation problem kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProblemKind {
    /// Node kind not among the allowed `type`s
    TypeMismatch { expected: Vec<String> },

    /// Value not in `enum`
    EnumMismatch { allowed: Vec<Value> },

    /// Value differs from `const`
    ConstMismatch { expected: Value },

    /// Missing `required` property
    MissingProperty { property: String },

    /// Property rejected by a `false` schema or `additionalProperties: false`
    PropertyNotAllowed { property: String },

    TooManyProperties { limit: usize },

    TooFewProperties { limit: usize },

    /// Property dependency not satisfied
    MissingDependency { property: String, required_by: String },

    /// More items than a tuple `items` allows with `additionalItems: false`
    TooManyTupleItems { limit: usize },

    /// No item matches `contains`
    MissingContainedItem,

    TooFewItems { limit: usize },

    TooManyItems { limit: usize },

    DuplicateItems,

    StringTooShort { limit: usize },

    StringTooLong { limit: usize },

    PatternMismatch { pattern: String },

    NotMultipleOf { divisor: f64 },

    BelowExclusiveMinimum { limit: f64 },

    AboveExclusiveMaximum { limit: f64 },

    BelowMinimum { limit: f64 },

    AboveMaximum { limit: f64 },

    /// Value matches a `not` schema (or a `false` schema)
    MatchesNot,

    /// More than one `oneOf` alternative matches
    MultipleOneOfMatches,

    /// `deprecationMessage` of a matched schema
    Deprecated { message: String },
}

impl ProblemKind {
    /// Get the diagnostic code for this problem kind
    pub fn code(&self) -> &'static str {
        match self {
            ProblemKind::TypeMismatch { .. } => "type",
            ProblemKind::EnumMismatch { .. } | ProblemKind::ConstMismatch { .. } => "enum",
            ProblemKind::MissingProperty { .. } => "required",
            ProblemKind::PropertyNotAllowed { .. } => "additionalProperties",
            ProblemKind::TooManyProperties { .. } | ProblemKind::TooFewProperties { .. } => {
                "propertyCount"
            }
            ProblemKind::MissingDependency { .. } => "dependencies",
            ProblemKind::TooManyTupleItems { .. } => "additionalItems",
            ProblemKind::MissingContainedItem => "contains",
            ProblemKind::TooFewItems { .. } | ProblemKind::TooManyItems { .. } => "itemCount",
            ProblemKind::DuplicateItems => "uniqueItems",
            ProblemKind::StringTooShort { .. } | ProblemKind::StringTooLong { .. } => "length",
            ProblemKind::PatternMismatch { .. } => "pattern",
            ProblemKind::NotMultipleOf { .. } => "multipleOf",
            ProblemKind::BelowExclusiveMinimum { .. }
            | ProblemKind::AboveExclusiveMaximum { .. }
            | ProblemKind::BelowMinimum { .. }
            | ProblemKind::AboveMaximum { .. } => "range",
            ProblemKind::MatchesNot => "not",
            ProblemKind::MultipleOneOfMatches => "oneOf",
            ProblemKind::Deprecated { .. } => "deprecated",
        }
    }

    /// Format the default human-readable message for this problem kind
    pub fn message(&self) -> String {
        match self {
            ProblemKind::TypeMismatch { expected } => match expected.as_slice() {
                [single] => format!("Incorrect type. Expected \"{single}\"."),
                many => format!("Incorrect type. Expected one of {}.", many.join(", ")),
            },
            ProblemKind::EnumMismatch { allowed } => format!(
                "Value is not accepted. Valid values: {}.",
                allowed.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
            ),
            ProblemKind::ConstMismatch { expected } => format!("Value must be {expected}."),
            ProblemKind::MissingProperty { property } => format!("Missing property \"{property}\"."),
            ProblemKind::PropertyNotAllowed { property } => {
                format!("Property {property} is not allowed.")
            }
            ProblemKind::TooManyProperties { limit } => {
                format!("Object has more properties than limit of {limit}.")
            }
            ProblemKind::TooFewProperties { limit } => {
                format!("Object has fewer properties than the required number of {limit}")
            }
            ProblemKind::MissingDependency {
                property,
                required_by,
            } => format!("Object is missing property {property} required by property {required_by}."),
            ProblemKind::TooManyTupleItems { limit } => format!(
                "Array has too many items according to schema. Expected {limit} or fewer."
            ),
            ProblemKind::MissingContainedItem => "Array does not contain required item.".to_string(),
            ProblemKind::TooFewItems { limit } => {
                format!("Array has too few items. Expected {limit} or more.")
            }
            ProblemKind::TooManyItems { limit } => {
                format!("Array has too many items. Expected {limit} or fewer.")
            }
            ProblemKind::DuplicateItems => "Array has duplicate items.".to_string(),
            ProblemKind::StringTooShort { limit } => {
                format!("String is shorter than the minimum length of {limit}.")
            }
            ProblemKind::StringTooLong { limit } => {
                format!("String is longer than the maximum length of {limit}.")
            }
            ProblemKind::PatternMismatch { pattern } => {
                format!("String does not match the pattern of \"{pattern}\".")
            }
            ProblemKind::NotMultipleOf { divisor } => {
                format!("Value is not divisible by {}.", format_number(*divisor))
            }
            ProblemKind::BelowExclusiveMinimum { limit } => format!(
                "Value is below the exclusive minimum of {}.",
                format_number(*limit)
            ),
            ProblemKind::AboveExclusiveMaximum { limit } => format!(
                "Value is above the exclusive maximum of {}.",
                format_number(*limit)
            ),
            ProblemKind::BelowMinimum { limit } => {
                format!("Value is below the minimum of {}.", format_number(*limit))
            }
            ProblemKind::AboveMaximum { limit } => {
                format!("Value is above the maximum of {}.", format_number(*limit))
            }
            ProblemKind::MatchesNot => "Matches a schema that is not allowed.".to_string(),
            ProblemKind::MultipleOneOfMatches => {
                "Matches multiple schemas when only one must validate.".to_string()
            }
            ProblemKind::Deprecated { message } => message.clone(),
        }
    }

    pub fn severity(&self) -> ProblemSeverity {
        match self {
            ProblemKind::Deprecated { .. } => ProblemSeverity::Warning,
            _ => ProblemSeverity::Error,
        }
    }
}

/// A schema violation anchored at a byte range of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationProblem {
    pub offset: usize,
    pub length: usize,
    pub kind: ProblemKind,
    /// Default message of `kind`, or the schema's `errorMessage`.
    pub message: String,
    pub severity: ProblemSeverity,
}

impl ValidationProblem {
    pub fn new(offset: usize, length: usize, kind: ProblemKind) -> Self {
        Self {
            offset,
            length,
            message: kind.message(),
            severity: kind.severity(),
            kind,
        }
    }

    pub fn with_message(mut self, message: Option<&str>) -> Self {
        if let Some(message) = message {
            self.message = message.to_string();
        }
        self
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.length
    }
}

/// Integral numbers print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_messages() {
        let single = ProblemKind::TypeMismatch {
            expected: vec!["number".into()],
        };
        assert_eq!(single.message(), "Incorrect type. Expected \"number\".");
        let many = ProblemKind::TypeMismatch {
            expected: vec!["string".into(), "null".into()],
        };
        assert_eq!(many.message(), "Incorrect type. Expected one of string, null.");
    }

    #[test]
    fn test_enum_message_uses_json_text() {
        let kind = ProblemKind::EnumMismatch {
            allowed: vec![json!("v1"), json!(2), json!(null)],
        };
        assert_eq!(kind.message(), "Value is not accepted. Valid values: \"v1\", 2, null.");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(
            ProblemKind::BelowMinimum { limit: 3.0 }.message(),
            "Value is below the minimum of 3."
        );
    }

    #[test]
    fn test_error_message_override() {
        let problem = ValidationProblem::new(0, 1, ProblemKind::MatchesNot).with_message(Some("nope"));
        assert_eq!(problem.message, "nope");
        assert_eq!(problem.severity, ProblemSeverity::Error);
        let deprecated = ValidationProblem::new(0, 1, ProblemKind::Deprecated { message: "old".into() });
        assert_eq!(deprecated.severity, ProblemSeverity::Warning);
    }
}
