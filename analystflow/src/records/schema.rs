//! Schema validation for extraction responses.
//!
//! Extraction calls return text that should contain one JSON object. The
//! validator pulls that object out of fenced or bare responses and
//! deserializes it into the stage's record container. Any mismatch (missing
//! field, extra field, wrong type, no JSON at all) becomes
//! [`StageError::SchemaViolation`].

use super::StageRecord;
use crate::errors::StageError;
use regex::Regex;
use std::marker::PhantomData;
use std::sync::OnceLock;

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").ok())
        .as_ref()
}

/// Extracts the JSON object embedded in a model response.
///
/// Fenced code blocks win; otherwise the span from the first `{` to the last
/// `}` is returned.
#[must_use]
pub fn extract_json(raw: &str) -> Option<&str> {
    if let Some(body) = fence_pattern()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| body.starts_with('{'))
    {
        return Some(body);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Validates raw stage output against the record container `T`.
#[derive(Debug)]
pub struct SchemaValidator<T> {
    stage: String,
    _marker: PhantomData<T>,
}

impl<T: StageRecord> SchemaValidator<T> {
    /// Creates a validator that attributes violations to `stage`.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            _marker: PhantomData,
        }
    }

    /// Validates a model response, extracting its JSON object first.
    pub fn parse_response(&self, raw: &str) -> Result<T, StageError> {
        let body = extract_json(raw).ok_or_else(|| {
            StageError::schema_violation(&self.stage, "response contained no JSON object")
        })?;
        serde_json::from_str(body).map_err(|e| self.violation(&e))
    }

    /// Validates an already parsed JSON value.
    pub fn parse_value(&self, value: serde_json::Value) -> Result<T, StageError> {
        serde_json::from_value(value).map_err(|e| self.violation(&e))
    }

    /// Returns the extraction schema hint for `T`.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        T::SCHEMA_HINT
    }

    fn violation(&self, err: &serde_json::Error) -> StageError {
        StageError::schema_violation(
            &self.stage,
            format!("{} does not match {}: {err}", T::KEY.title(), T::SCHEMA_HINT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::records::{ActorsOutput, DataObjectsOutput, UserRequirementsOutput};

    #[test]
    fn test_extract_fenced_json() {
        let raw = "Here you go:\n```json\n{\"data_objects\": []}\n```\nDone.";
        assert_eq!(extract_json(raw), Some("{\"data_objects\": []}"));
    }

    #[test]
    fn test_extract_bare_json() {
        let raw = "Result: {\"a\": {\"b\": 1}} trailing";
        assert_eq!(extract_json(raw), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_valid_response_parses() {
        let validator = SchemaValidator::<DataObjectsOutput>::new("do_agent");
        let parsed = validator
            .parse_response(r#"{"data_objects": [{"id": "DO-1", "name": "Cart", "description": "Items"}]}"#)
            .unwrap();
        assert_eq!(parsed.data_objects.len(), 1);
    }

    #[test]
    fn test_missing_field_is_violation() {
        let validator = SchemaValidator::<DataObjectsOutput>::new("do_agent");
        let err = validator
            .parse_response(r#"{"data_objects": [{"id": "DO-1", "name": "Cart"}]}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(err.stage(), "do_agent");
        assert!(err.detail().contains("description"));
    }

    #[test]
    fn test_extra_field_is_violation() {
        let validator = SchemaValidator::<UserRequirementsOutput>::new("ur_agent");
        let err = validator
            .parse_value(serde_json::json!({"requirements": [], "confidence": 0.9}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert!(err.detail().contains("confidence"));
    }

    #[test]
    fn test_optional_summaries_may_be_absent() {
        let validator = SchemaValidator::<ActorsOutput>::new("ac_agent");
        let parsed = validator.parse_value(serde_json::json!({"actors": []})).unwrap();
        assert!(parsed.actor_hierarchy.is_none());
        assert!(parsed.stakeholder_summary.is_none());
    }

    #[test]
    fn test_no_json_is_violation() {
        let validator = SchemaValidator::<ActorsOutput>::new("ac_agent");
        let err = validator.parse_response("I could not find any actors.").unwrap_err();
        assert!(err.detail().contains("no JSON object"));
        assert!(validator.hint().contains("interaction_type"));
    }
}
