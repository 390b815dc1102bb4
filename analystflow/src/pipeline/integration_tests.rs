//! Integration tests for stage graph execution.

#[cfg(test)]
mod tests {
    use crate::context::{PipelineContext, RunIdentity, RunState};
    use crate::core::StageStatus;
    use crate::errors::{ErrorKind, StageError};
    use crate::pipeline::{
        stage_name, standard_graph_with, RunOptions, SkipPolicy, StageGraph, ACTORS_STAGE,
        DATA_OBJECTS_STAGE, REQUIREMENTS_STAGE, USE_CASES_STAGE,
    };
    use crate::records::{ActorsOutput, StageKey, StageRecord, StageValue, UserRequirementsOutput};
    use crate::stages::{AgentProfile, AnalysisStage, Stage};
    use crate::testing::{
        assert_output_error_kind, assert_stage_status, fixtures, ScriptedLlm, StubStage,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    type Stubs = [Arc<StubStage>; 4];

    fn fixture_stubs() -> Stubs {
        [
            Arc::new(StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())),
            Arc::new(StubStage::returning(ACTORS_STAGE, fixtures::actors_value())),
            Arc::new(StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ]
    }

    fn slot(key: StageKey) -> usize {
        StageKey::ALL.iter().position(|k| *k == key).unwrap()
    }

    fn graph_of(stubs: &Stubs) -> StageGraph {
        standard_graph_with(|key| {
            let stage: Arc<dyn Stage> = stubs[slot(key)].clone();
            stage
        })
        .unwrap()
    }

    fn calls(stubs: &Stubs) -> Vec<usize> {
        stubs.iter().map(|stub| stub.call_count()).collect()
    }

    #[tokio::test]
    async fn test_full_run_from_document() {
        let stubs = fixture_stubs();
        let graph = graph_of(&stubs);
        let (ctx, sink) = fixtures::recording_context(fixtures::state_with_document());

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        assert!(report.is_complete(), "{}", report.summary());
        assert_eq!(calls(&stubs), vec![1, 1, 1, 1]);
        assert_eq!(
            ctx.run_state().export(),
            vec![
                fixtures::requirements_value(),
                fixtures::actors_value(),
                fixtures::data_objects_value(),
                fixtures::use_cases_value(),
            ]
        );
        assert_eq!(
            sink.stage_timeline(USE_CASES_STAGE),
            vec!["stage.started", "stage.completed"]
        );
        assert_eq!(sink.events_of_type("run.").len(), 2);
    }

    #[tokio::test]
    async fn test_existing_output_is_never_recomputed() {
        let stubs = fixture_stubs();
        let graph = graph_of(&stubs);
        let state = fixtures::state_with_document();
        let seeded = fixtures::requirements();
        state.set_typed(seeded.clone()).unwrap();
        let (ctx, sink) = fixtures::recording_context(state);

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        assert_stage_status(&report, REQUIREMENTS_STAGE, StageStatus::Skip);
        assert_eq!(stubs[0].call_count(), 0);
        assert_eq!(ctx.run_state().get_typed::<UserRequirementsOutput>(), Some(seeded));
        assert_eq!(sink.stage_timeline(REQUIREMENTS_STAGE), vec!["stage.skipped"]);

        let again = graph.run(&ctx, &RunOptions::new()).await.unwrap();
        assert_eq!(again.skipped().len(), 4);
        assert_eq!(calls(&stubs), vec![0, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_empty_output_is_recomputed() {
        let stubs = fixture_stubs();
        let graph = graph_of(&stubs);
        let state = fixtures::state_with_document();
        state.set(StageValue::empty(StageKey::Requirements)).unwrap();
        let (ctx, _sink) = fixtures::recording_context(state);

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        assert_stage_status(&report, REQUIREMENTS_STAGE, StageStatus::Ok);
        assert_eq!(stubs[0].call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_sibling_keeps_surviving_output() {
        let stubs: Stubs = [
            Arc::new(StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())),
            Arc::new(StubStage::failing(
                ACTORS_STAGE,
                StageError::execution(ACTORS_STAGE, "quota exceeded"),
            )),
            Arc::new(
                StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())
                    .with_delay(Duration::from_millis(30)),
            ),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ];
        let graph = graph_of(&stubs);
        let (ctx, sink) = fixtures::recording_context(fixtures::state_with_document());

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        assert!(!report.is_complete());
        assert_stage_status(&report, ACTORS_STAGE, StageStatus::Fail);
        assert_stage_status(&report, DATA_OBJECTS_STAGE, StageStatus::Ok);
        assert_stage_status(&report, USE_CASES_STAGE, StageStatus::Blocked);

        let state = ctx.run_state();
        assert!(state.contains(StageKey::DataObjects));
        assert!(!state.contains(StageKey::Actors));
        assert!(!state.contains(StageKey::UseCases));
        assert_eq!(stubs[3].call_count(), 0);

        let blocked = report.stage(USE_CASES_STAGE).unwrap();
        assert_eq!(blocked.output.waiting_on, vec!["actors".to_string()]);
        assert_eq!(sink.stage_timeline(USE_CASES_STAGE), vec!["stage.blocked"]);
        assert_eq!(sink.events_of_type("stage.failed").len(), 1);
    }

    #[tokio::test]
    async fn test_join_waits_for_both_siblings() {
        let stubs: Stubs = [
            Arc::new(StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())),
            Arc::new(
                StubStage::returning(ACTORS_STAGE, fixtures::actors_value())
                    .with_delay(Duration::from_millis(40)),
            ),
            Arc::new(StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ];
        let graph = graph_of(&stubs);
        let state = fixtures::state_with_document();
        state.set(fixtures::requirements_value()).unwrap();
        let (ctx, sink) = fixtures::recording_context(state);

        graph.run(&ctx, &RunOptions::new()).await.unwrap();

        assert_eq!(
            stubs[3].seen_inputs(),
            vec![vec![StageKey::Requirements, StageKey::Actors, StageKey::DataObjects]]
        );

        let order: Vec<(String, &str)> = sink
            .events()
            .iter()
            .filter_map(|e| e.stage().map(|s| (s.to_string(), e.event_type())))
            .collect();
        let position = |stage: &str, kind: &str| {
            order
                .iter()
                .position(|(s, k)| s == stage && *k == kind)
                .unwrap()
        };
        assert!(position(ACTORS_STAGE, "stage.completed") < position(USE_CASES_STAGE, "stage.started"));
        assert!(
            position(DATA_OBJECTS_STAGE, "stage.completed") < position(USE_CASES_STAGE, "stage.started")
        );
    }

    #[tokio::test]
    async fn test_cancellation_leaves_state_untouched() {
        let stubs: Stubs = [
            Arc::new(StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())),
            Arc::new(
                StubStage::returning(ACTORS_STAGE, fixtures::actors_value())
                    .with_delay(Duration::from_secs(5)),
            ),
            Arc::new(
                StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())
                    .with_delay(Duration::from_secs(5)),
            ),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ];
        let graph = graph_of(&stubs);
        let (ctx, sink) = fixtures::recording_context(fixtures::state_with_document());

        let token = Arc::clone(ctx.cancellation());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel("user abort");
        });

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        assert_stage_status(&report, REQUIREMENTS_STAGE, StageStatus::Ok);
        assert_stage_status(&report, ACTORS_STAGE, StageStatus::Cancel);
        assert_stage_status(&report, DATA_OBJECTS_STAGE, StageStatus::Cancel);
        assert_stage_status(&report, USE_CASES_STAGE, StageStatus::Cancel);
        assert_eq!(ctx.run_state().len(), 1);
        assert_eq!(
            report.stage(ACTORS_STAGE).unwrap().output.cancel_reason.as_deref(),
            Some("user abort")
        );
        assert_eq!(sink.events_of_type("stage.cancelled").len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_an_execution_error() {
        let stubs: Stubs = [
            Arc::new(
                StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())
                    .with_delay(Duration::from_secs(5)),
            ),
            Arc::new(StubStage::returning(ACTORS_STAGE, fixtures::actors_value())),
            Arc::new(StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ];
        let graph = graph_of(&stubs);
        let ctx = Arc::new(
            PipelineContext::new(RunIdentity::new(), fixtures::state_with_document())
                .with_stage_timeout(Duration::from_millis(20)),
        );

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        let ur = &report.stage(REQUIREMENTS_STAGE).unwrap().output;
        assert_output_error_kind(ur, ErrorKind::ExecutionError);
        assert_eq!(report.blocked().len(), 3);
        assert!(ctx.run_state().is_empty());
    }

    #[tokio::test]
    async fn test_forced_rerun_replaces_one_output() {
        let replacement = ActorsOutput {
            actors: fixtures::actors().actors[..1].to_vec(),
            ..ActorsOutput::default()
        };
        let stubs: Stubs = [
            Arc::new(StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())),
            Arc::new(StubStage::returning(ACTORS_STAGE, replacement.clone().into_value())),
            Arc::new(StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ];
        let graph = graph_of(&stubs);
        let (ctx, _sink) = fixtures::recording_context(fixtures::complete_state());

        let report = graph
            .run(&ctx, &RunOptions::new().force(StageKey::Actors))
            .await
            .unwrap();

        assert_eq!(report.completed(), [ACTORS_STAGE]);
        assert_eq!(calls(&stubs), vec![0, 1, 0, 0]);
        assert_eq!(ctx.run_state().get_typed::<ActorsOutput>(), Some(replacement));
    }

    #[tokio::test]
    async fn test_always_rerun_policy_executes_every_stage() {
        let stubs = fixture_stubs();
        let graph = graph_of(&stubs);
        let (ctx, _sink) = fixtures::recording_context(fixtures::complete_state());

        let options = RunOptions::new().with_skip_policy(SkipPolicy::AlwaysRerun);
        let report = graph.run(&ctx, &options).await.unwrap();

        assert_eq!(report.completed().len(), 4);
        assert_eq!(calls(&stubs), vec![1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_wrong_output_key_is_a_schema_violation() {
        let mut stubs = fixture_stubs();
        stubs[1] = Arc::new(StubStage::returning(ACTORS_STAGE, fixtures::requirements_value()));
        let graph = graph_of(&stubs);
        let (ctx, _sink) = fixtures::recording_context(fixtures::state_with_document());

        let report = graph.run(&ctx, &RunOptions::new()).await.unwrap();

        let ac = &report.stage(ACTORS_STAGE).unwrap().output;
        assert_output_error_kind(ac, ErrorKind::SchemaViolation);
        assert!(!ctx.run_state().contains(StageKey::Actors));
    }

    #[tokio::test]
    async fn test_missing_document_is_fatal() {
        let stubs = fixture_stubs();
        let graph = graph_of(&stubs);
        let (ctx, _sink) = fixtures::recording_context(Arc::new(RunState::new()));

        let err = graph.run(&ctx, &RunOptions::new()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingDependency);
        assert_eq!(calls(&stubs), vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_one_execution_per_stage() {
        let stubs: Stubs = [
            Arc::new(
                StubStage::returning(REQUIREMENTS_STAGE, fixtures::requirements_value())
                    .with_delay(Duration::from_millis(20)),
            ),
            Arc::new(StubStage::returning(ACTORS_STAGE, fixtures::actors_value())),
            Arc::new(StubStage::returning(DATA_OBJECTS_STAGE, fixtures::data_objects_value())),
            Arc::new(StubStage::returning(USE_CASES_STAGE, fixtures::use_cases_value())),
        ];
        let graph = graph_of(&stubs);
        let state = fixtures::state_with_document();
        let first = Arc::new(PipelineContext::new(RunIdentity::new(), Arc::clone(&state)));
        let second = Arc::new(PipelineContext::new(RunIdentity::new(), Arc::clone(&state)));

        let options = RunOptions::new();
        let (a, b) = tokio::join!(graph.run(&first, &options), graph.run(&second, &options));

        assert!(a.unwrap().is_complete());
        assert!(b.unwrap().is_complete());
        assert_eq!(calls(&stubs), vec![1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_run_stage_with_analysis_agent() {
        let requirements_json = serde_json::to_string(&fixtures::requirements()).unwrap();
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("The document describes a lending library.")
                .reply(format!("```json\n{requirements_json}\n```")),
        );
        let profile =
            AgentProfile::for_record::<UserRequirementsOutput>(REQUIREMENTS_STAGE, "gpt-4o");
        let graph = standard_graph_with(|key| -> Arc<dyn Stage> {
            if key == StageKey::Requirements {
                Arc::new(AnalysisStage::<UserRequirementsOutput>::new(
                    profile.clone(),
                    llm.clone(),
                ))
            } else {
                Arc::new(StubStage::empty(stage_name(key), key))
            }
        })
        .unwrap();
        let (ctx, _sink) = fixtures::recording_context(fixtures::state_with_document());

        let output = graph.run_stage(REQUIREMENTS_STAGE, &ctx, false).await.unwrap();

        assert_eq!(output.status, StageStatus::Ok);
        assert_eq!(
            ctx.run_state().get_typed::<UserRequirementsOutput>(),
            Some(fixtures::requirements())
        );
        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].user.contains(fixtures::SAMPLE_DOCUMENT));
        assert!(requests[1].json_output);
        assert_eq!(llm.remaining(), 0);
    }
}
