//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications and run options
//! - Pipeline builder with validation
//! - The concurrent DAG execution engine
//! - The standard business-analysis graph

mod builder;
mod dag;
mod report;
mod spec;
mod standard;

mod integration_tests;

pub use builder::PipelineBuilder;
pub use dag::StageGraph;
pub use report::{RunReport, StageReport};
pub use spec::{RunOptions, SkipPolicy, StageSpec};
pub use standard::{
    business_analysis_graph, stage_inputs, stage_name, standard_graph_with, ACTORS_STAGE,
    DATA_OBJECTS_STAGE, PIPELINE_NAME, REQUIREMENTS_STAGE, USE_CASES_STAGE,
};
