//! Default prompt templates for the four analysis agents.
//!
//! Analysis templates use the placeholders understood by
//! [`StageInputs::render_template`](crate::context::StageInputs::render_template).

use crate::records::StageKey;

/// System instruction shared by every analysis call.
pub const ANALYSIS_SYSTEM: &str = "You are a professional business analyst. \
Work only from the material provided and be thorough.";

/// Returns the analysis prompt template for a stage.
#[must_use]
pub const fn analysis_template(key: StageKey) -> &'static str {
    match key {
        StageKey::Requirements => {
            "Extract structured user requirements from the business document below.\n\n\
             Identify every functional and non-functional requirement, where it came from \
             and which user stories it covers.\n\n{document}"
        }
        StageKey::Actors => {
            "Identify all actors and stakeholders from the user requirements below.\n\n\
             Describe each actor's role, responsibilities, permissions and interactions, \
             then summarise the actor hierarchy and the stakeholders.\n\n\
             User Requirements:\n{requirements}"
        }
        StageKey::DataObjects => {
            "Identify the business data objects implied by the user requirements below.\n\n\
             Describe what each object represents.\n\n\
             User Requirements:\n{requirements}"
        }
        StageKey::UseCases => {
            "Create use cases that integrate all of the analysis below.\n\n\
             Define each use case with its actors, main flow, preconditions and postconditions.\n\n\
             User Requirements:\n{requirements}\n\n\
             Actors Analysis:\n{actors}\n\n\
             Data Objects Analysis:\n{data_objects}"
        }
    }
}

/// Returns the extraction system instruction for a stage.
#[must_use]
pub fn extraction_system(key: StageKey, schema_hint: &str) -> String {
    format!(
        "Extract and structure the {} analysis from the user's content. \
         Respond only with one JSON object of this exact shape, with no extra fields:\n{schema_hint}",
        key.title().to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_reference_declared_inputs() {
        assert!(analysis_template(StageKey::Requirements).contains("{document}"));
        assert!(analysis_template(StageKey::Actors).contains("{requirements}"));
        let use_cases = analysis_template(StageKey::UseCases);
        for placeholder in ["{requirements}", "{actors}", "{data_objects}"] {
            assert!(use_cases.contains(placeholder), "missing {placeholder}");
        }
    }

    #[test]
    fn test_extraction_system_embeds_hint() {
        let system = extraction_system(StageKey::DataObjects, "{\"data_objects\": []}");
        assert!(system.contains("data objects analysis"));
        assert!(system.ends_with("{\"data_objects\": []}"));
    }
}
