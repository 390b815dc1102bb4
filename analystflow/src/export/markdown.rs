//! Markdown rendering of stage outputs.
//!
//! Layout: one H1 title, one H2 per stage in declaration order, one H3 per
//! record, bullets for scalar fields and nested bullets for list fields.

use crate::records::{
    Actor, ActorsOutput, DataObjectsOutput, StageKey, StageValue, UseCasesOutput,
    UserRequirementsOutput,
};
use crate::utils::{display_stamp, Timestamp};
use regex::Regex;
use std::fmt::Write;

const NONE_MARKER: &str = "_(none)_";

/// Returns the H1 title used for a single-stage report.
#[must_use]
pub const fn document_title(key: StageKey) -> &'static str {
    match key {
        StageKey::Requirements => "USER_REQUIREMENTS_OUTPUT",
        StageKey::Actors => "ACTOR_OUTPUT",
        StageKey::DataObjects => "DATA_OBJECT_OUTPUT",
        StageKey::UseCases => "USE_CASE_OUTPUT",
    }
}

/// Title of the combined report.
pub const COMBINED_TITLE: &str = "BUSINESS_ANALYSIS_OUTPUT";

/// Renders a full report over `values`.
///
/// Sections always follow stage declaration order, whatever order the
/// values are given in.
#[must_use]
pub fn render_report(values: &[StageValue], title: &str, generated_at: &Timestamp) -> String {
    let mut ordered: Vec<&StageValue> = values.iter().collect();
    ordered.sort_by_key(|value| value.key());

    let mut out = format!(
        "# {}\n\nGenerated on: {}\n\n",
        inline(title),
        display_stamp(generated_at)
    );
    for value in ordered {
        out.push_str(&render_stage(value));
    }
    out
}

/// Renders one stage's H2 section.
#[must_use]
pub fn render_stage(value: &StageValue) -> String {
    let mut out = format!("## {}\n\n", value.key().title());
    if value.is_empty() {
        out.push_str("_No records._\n\n");
    }

    match value {
        StageValue::Requirements(output) => render_requirements(&mut out, output),
        StageValue::Actors(output) => render_actors(&mut out, output),
        StageValue::DataObjects(output) => render_data_objects(&mut out, output),
        StageValue::UseCases(output) => render_use_cases(&mut out, output),
    }
    out
}

fn render_requirements(out: &mut String, output: &UserRequirementsOutput) {
    for req in &output.requirements {
        heading(out, &req.name);
        field(out, "ID", &req.id);
        field(out, "Source", &req.source);
        field(out, "Type", &req.requirement_type);
        field(out, "Detail", &req.detail);
        field(out, "Covered USR", &req.covered_usr);
        out.push('\n');
    }
}

fn render_actors(out: &mut String, output: &ActorsOutput) {
    for actor in &output.actors {
        render_actor(out, actor);
    }
    if let Some(hierarchy) = &output.actor_hierarchy {
        let _ = write!(out, "**Actor Hierarchy**\n\n{}\n\n", hierarchy.trim());
    }
    if let Some(summary) = &output.stakeholder_summary {
        let _ = write!(out, "**Stakeholder Summary**\n\n{}\n\n", summary.trim());
    }
}

fn render_actor(out: &mut String, actor: &Actor) {
    heading(out, &actor.name);
    field(out, "ID", &actor.id);
    field(out, "Role", &actor.role);
    list(out, "Responsibilities", &actor.responsibilities);
    list(out, "Permissions", &actor.permissions);

    if actor.interactions.is_empty() {
        field(out, "Interactions", NONE_MARKER);
    } else {
        out.push_str("- **Interactions**:\n");
        for interaction in &actor.interactions {
            let _ = writeln!(out, "  - **Target**: {}", inline(&interaction.target));
            let _ = writeln!(out, "    - **Type**: {}", inline(&interaction.interaction_type));
            let _ = writeln!(out, "    - **Description**: {}", inline(&interaction.description));
        }
    }
    out.push('\n');
}

fn render_data_objects(out: &mut String, output: &DataObjectsOutput) {
    for object in &output.data_objects {
        heading(out, &object.name);
        field(out, "ID", &object.id);
        field(out, "Description", &object.description);
        out.push('\n');
    }
}

fn render_use_cases(out: &mut String, output: &UseCasesOutput) {
    for use_case in &output.use_cases {
        heading(out, &use_case.name);
        field(out, "ID", &use_case.id);
        list(out, "Actors", &use_case.actors);
        field(out, "Description", &use_case.description);
        list(out, "Preconditions", &use_case.preconditions);
        list(out, "Postconditions", &use_case.postconditions);
        out.push('\n');
    }
}

fn heading(out: &mut String, name: &str) {
    let name = inline(name);
    // A trailing `#` run after whitespace would be read back as a closing sequence.
    let stem = name.trim_end_matches('#');
    if stem.len() < name.len() && (stem.is_empty() || stem.ends_with([' ', '\t'])) {
        let _ = write!(out, "### {name} #\n\n");
    } else {
        let _ = write!(out, "### {name}\n\n");
    }
}

fn field(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "- **{label}**: {}", inline(value));
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        field(out, label, NONE_MARKER);
        return;
    }
    let _ = writeln!(out, "- **{label}**:");
    for item in items {
        let _ = writeln!(out, "  - {}", inline(item));
    }
}

/// Replaces line breaks with spaces so a value stays on its line.
///
/// Other whitespace is kept as is, apart from trimming both ends.
fn inline(value: &str) -> String {
    value
        .trim()
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the text of every heading of exactly `level` (1 to 6).
///
/// Headings inside fenced code blocks are ignored. A closing `#` run is
/// stripped only when whitespace precedes it, so `C#` stays intact.
#[must_use]
pub fn parse_headings(markdown: &str, level: usize) -> Vec<String> {
    if !(1..=6).contains(&level) {
        return Vec::new();
    }
    let Ok(pattern) = Regex::new(&format!(r"^#{{{level}}}[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$")) else {
        return Vec::new();
    };

    let mut in_fence = false;
    markdown
        .lines()
        .filter(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return false;
            }
            !in_fence
        })
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{StageRecord, UserRequirement};
    use crate::testing::fixtures;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_render_requirements_section() {
        let text = render_stage(&fixtures::requirements_value());

        assert!(text.starts_with("## Requirements\n\n### Borrow books\n\n"));
        assert!(text.contains("- **ID**: UR-1\n"));
        assert!(text.contains("- **Type**: functional\n"));
        assert!(text.contains("- **Covered USR**: US-2\n"));
    }

    #[test]
    fn test_requirement_headings_survive_rendering() {
        let output = UserRequirementsOutput {
            requirements: (1..=5)
                .map(|n| UserRequirement {
                    id: format!("UR-{n}"),
                    name: format!("Requirement number {n}"),
                    source: "doc".to_string(),
                    requirement_type: "functional".to_string(),
                    detail: "detail\nspanning lines".to_string(),
                    covered_usr: String::new(),
                })
                .collect(),
        };
        let names: Vec<String> = output.requirements.iter().map(|r| r.name.clone()).collect();

        let text = render_report(&[output.into_value()], "REPORT", &at());

        assert_eq!(parse_headings(&text, 3), names);
        assert!(text.contains("- **Detail**: detail spanning lines\n"));
    }

    #[test]
    fn test_render_actor_lists_and_summaries() {
        let text = render_stage(&fixtures::actors_value());

        assert!(text.contains("- **Responsibilities**:\n  - Return books on time\n"));
        assert!(text.contains(
            "- **Interactions**:\n  - **Target**: Librarian\n    - **Type**: requests\n"
        ));
        assert!(text.contains("- **Interactions**: _(none)_\n"));
        assert!(text.contains("**Actor Hierarchy**\n\nLibrarians supervise member loans.\n"));
        assert!(!text.contains("Stakeholder Summary"));
        assert_eq!(parse_headings(&text, 3), vec!["Member", "Librarian"]);
    }

    #[test]
    fn test_sections_follow_declaration_order() {
        let values = vec![
            fixtures::use_cases_value(),
            fixtures::data_objects_value(),
            fixtures::actors_value(),
            fixtures::requirements_value(),
        ];

        let text = render_report(&values, COMBINED_TITLE, &at());

        assert!(text.starts_with(
            "# BUSINESS_ANALYSIS_OUTPUT\n\nGenerated on: 2024-05-01 09:30:00\n\n## Requirements"
        ));
        assert_eq!(
            parse_headings(&text, 2),
            vec!["Requirements", "Actors", "Data Objects", "Use Cases"]
        );
    }

    #[test]
    fn test_empty_stage_section() {
        let text = render_stage(&StageValue::empty(StageKey::DataObjects));
        assert_eq!(text, "## Data Objects\n\n_No records._\n\n");
    }

    #[test]
    fn test_parse_headings_levels_and_fences() {
        let md = "# Title\n## A\n### a1 ###\n```\n## not a heading\n```\n## B\n####### seven\n";
        assert_eq!(parse_headings(md, 1), vec!["Title"]);
        assert_eq!(parse_headings(md, 2), vec!["A", "B"]);
        assert_eq!(parse_headings(md, 3), vec!["a1"]);
        assert!(parse_headings(md, 7).is_empty());
    }

    #[test]
    fn test_hash_in_name_is_not_a_closing_sequence() {
        let md = "### Support C#\n### Issue #42 fix\n### Tagged #\n### Closed ##   \n";
        assert_eq!(
            parse_headings(md, 3),
            vec!["Support C#", "Issue #42 fix", "Tagged", "Closed"]
        );
    }

    #[test]
    fn test_heading_names_round_trip_exactly() {
        let names = [
            "Support C#",
            "Export  to   PDF",
            "Issue #42 fix",
            "Priority ##",
            "F# interop",
        ];
        let output = DataObjectsOutput {
            data_objects: names
                .iter()
                .enumerate()
                .map(|(n, name)| crate::records::DataObject {
                    id: format!("DO-{n}"),
                    name: (*name).to_string(),
                    description: String::new(),
                })
                .collect(),
        };

        let text = render_report(&[output.into_value()], "REPORT", &at());

        assert!(text.contains("### Priority ## #\n"));
        assert_eq!(parse_headings(&text, 3), names);
    }
}
