//! Stage inputs with strictness enforcement.

use super::{RunState, SourceDocument};
use crate::errors::{MissingDependencyError, UndeclaredDependencyError};
use crate::records::{InputKey, StageKey, StageRecord, StageValue};
use std::collections::HashMap;
use std::fmt::Write;

/// An immutable view of the inputs a stage declared.
///
/// Accessing anything that was not declared raises
/// `UndeclaredDependencyError`, so a stage cannot quietly read a sibling's
/// output it does not depend on.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    /// The name of the current stage (for error messages).
    stage_name: String,
    /// The declared inputs, in declaration order.
    declared: Vec<InputKey>,
    /// The document, when declared.
    document: Option<SourceDocument>,
    /// Upstream stage outputs, when declared.
    values: HashMap<StageKey, StageValue>,
}

impl StageInputs {
    /// Creates empty inputs for a stage declaring `declared`.
    #[must_use]
    pub fn new(stage_name: impl Into<String>, declared: Vec<InputKey>) -> Self {
        Self {
            stage_name: stage_name.into(),
            declared,
            document: None,
            values: HashMap::new(),
        }
    }

    /// Sets the document input.
    #[must_use]
    pub fn with_document(mut self, document: SourceDocument) -> Self {
        self.document = Some(document);
        self
    }

    /// Sets one upstream stage value.
    #[must_use]
    pub fn with_value(mut self, value: StageValue) -> Self {
        self.values.insert(value.key(), value);
        self
    }

    /// Snapshots every declared input from the run state.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependencyError` if a declared input is absent.
    pub fn collect(
        stage_name: &str,
        declared: &[InputKey],
        state: &RunState,
    ) -> Result<Self, MissingDependencyError> {
        let mut inputs = Self::new(stage_name, declared.to_vec());

        for input in declared {
            match input {
                InputKey::Document => {
                    let document = state
                        .document()
                        .ok_or_else(|| MissingDependencyError::new(stage_name, input.as_str()))?;
                    inputs.document = Some(document);
                }
                InputKey::Stage(key) => {
                    let value = state
                        .get(*key)
                        .ok_or_else(|| MissingDependencyError::new(stage_name, key.as_str()))?;
                    inputs.values.insert(*key, value);
                }
            }
        }

        Ok(inputs)
    }

    /// Checks that every declared input carries a value.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependencyError` for the first declared input without one.
    pub fn ensure_complete(&self) -> Result<(), MissingDependencyError> {
        let missing = self.declared.iter().find(|input| match input {
            InputKey::Document => self.document.is_none(),
            InputKey::Stage(key) => !self.values.contains_key(key),
        });
        match missing {
            Some(input) => Err(MissingDependencyError::new(&self.stage_name, input.as_str())),
            None => Ok(()),
        }
    }

    /// Returns the document.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` if the document was not declared.
    pub fn document(&self) -> Result<Option<&SourceDocument>, UndeclaredDependencyError> {
        self.check_declared(InputKey::Document)?;
        Ok(self.document.as_ref())
    }

    /// Returns the upstream container `T`.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` if `T::KEY` was not declared.
    pub fn get<T: StageRecord>(&self) -> Result<Option<&T>, UndeclaredDependencyError> {
        self.check_declared(InputKey::Stage(T::KEY))?;
        Ok(self.values.get(&T::KEY).and_then(T::from_value))
    }

    /// Returns the raw upstream value for a key.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` if the key was not declared.
    pub fn get_value(&self, key: StageKey) -> Result<Option<&StageValue>, UndeclaredDependencyError> {
        self.check_declared(InputKey::Stage(key))?;
        Ok(self.values.get(&key))
    }

    /// Returns the declared inputs.
    #[must_use]
    pub fn declared(&self) -> &[InputKey] {
        &self.declared
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Renders one declared input as a prompt section body.
    #[must_use]
    pub fn render_input(&self, input: InputKey) -> Option<String> {
        match input {
            InputKey::Document => self.document.as_ref().map(|doc| doc.text.clone()),
            InputKey::Stage(key) => self.values.get(&key).map(|value| {
                let json = serde_json::to_string_pretty(&value.to_json()).unwrap_or_default();
                format!("```json\n{json}\n```")
            }),
        }
    }

    /// Renders every declared input into one prompt context.
    ///
    /// Sections follow declaration order, each under a `## <input>` heading.
    #[must_use]
    pub fn render_context(&self) -> String {
        let mut out = String::new();
        for input in &self.declared {
            let Some(body) = self.render_input(*input) else {
                continue;
            };
            let title = match input {
                InputKey::Document => "Document",
                InputKey::Stage(key) => key.title(),
            };
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "## {title}\n\n{body}");
        }
        out
    }

    /// Fills `{document}`, `{<stage key>}` and `{context}` placeholders.
    ///
    /// Placeholders for undeclared inputs are left untouched.
    #[must_use]
    pub fn render_template(&self, template: &str) -> String {
        let mut rendered = template.replace("{context}", &self.render_context());
        for input in &self.declared {
            let placeholder = format!("{{{}}}", input.as_str());
            if rendered.contains(&placeholder) {
                let body = self.render_input(*input).unwrap_or_default();
                rendered = rendered.replace(&placeholder, &body);
            }
        }
        rendered
    }

    fn check_declared(&self, input: InputKey) -> Result<(), UndeclaredDependencyError> {
        if self.declared.contains(&input) {
            Ok(())
        } else {
            Err(UndeclaredDependencyError::new(&self.stage_name, input.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ActorsOutput, UserRequirementsOutput};
    use crate::testing::fixtures;

    fn seeded_state() -> RunState {
        let state = RunState::new();
        state.set_document(SourceDocument::new("brief.md", "The shop sells books."));
        state.set(fixtures::requirements_value()).unwrap();
        state
    }

    #[test]
    fn test_collect_declared_inputs() {
        let state = seeded_state();
        let inputs = StageInputs::collect(
            "ac_agent",
            &[InputKey::Stage(StageKey::Requirements)],
            &state,
        )
        .unwrap();

        assert!(inputs.get::<UserRequirementsOutput>().unwrap().is_some());
        assert_eq!(inputs.stage_name(), "ac_agent");
    }

    #[test]
    fn test_collect_missing_input_fails() {
        let state = seeded_state();
        let err = StageInputs::collect(
            "uc_agent",
            &[InputKey::Stage(StageKey::Requirements), InputKey::Stage(StageKey::Actors)],
            &state,
        )
        .unwrap_err();

        assert_eq!(err.stage, "uc_agent");
        assert_eq!(err.input, "actors");
    }

    #[test]
    fn test_undeclared_access_is_rejected() {
        let state = seeded_state();
        let inputs = StageInputs::collect(
            "ac_agent",
            &[InputKey::Stage(StageKey::Requirements)],
            &state,
        )
        .unwrap();

        let err = inputs.document().unwrap_err();
        assert_eq!(err.key, "document");
        assert!(inputs.get::<ActorsOutput>().is_err());
    }

    #[test]
    fn test_render_context_follows_declaration_order() {
        let inputs = StageInputs::new(
            "uc_agent",
            vec![InputKey::Document, InputKey::Stage(StageKey::Requirements)],
        )
        .with_value(fixtures::requirements_value())
        .with_document(SourceDocument::new("brief.md", "Body text"));

        let context = inputs.render_context();
        let doc_pos = context.find("## Document").unwrap();
        let req_pos = context.find("## Requirements").unwrap();
        assert!(doc_pos < req_pos);
        assert!(context.contains("Body text"));
        assert!(context.contains("```json"));
    }

    #[test]
    fn test_render_template_placeholders() {
        let inputs = StageInputs::new("ur_agent", vec![InputKey::Document])
            .with_document(SourceDocument::new("brief.md", "Body text"));

        let rendered = inputs.render_template("Analyse:\n{document}\n(ignore {actors})");
        assert_eq!(rendered, "Analyse:\nBody text\n(ignore {actors})");
    }
}
