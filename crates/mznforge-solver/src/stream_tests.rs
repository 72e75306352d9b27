//! Tests for solution streams.

use mznforge_core::{Assignment, IndexSet, Value};
use mznforge_test::{knapsack, FakeSolver};

use super::*;
use crate::event::CountingEventListener;

fn payload(model: &str) -> Payload {
    Payload::new("model", model, Assignment::new()).unwrap()
}

fn start(solver: &FakeSolver, payload: Payload, timeout: Option<Duration>) -> SolutionStream {
    let config = solver.config().with_grace_period(Duration::from_millis(100));
    SolutionStream::start(payload, &config, timeout).unwrap()
}

#[test]
fn test_outcome_without_process() {
    let outcome = RunOutcome::cancelled();
    assert_eq!(outcome.status, RunStatus::Unknown(UnknownCause::Cancelled));
    assert_eq!(outcome.solution_count, 0);
    assert_eq!(outcome.exit_code, None);

    let outcome = RunOutcome::aborted("worker gone");
    assert!(matches!(
        outcome.status,
        RunStatus::Error { error: ProcessError::Aborted(_), .. }
    ));
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[tokio::test]
    async fn test_knapsack_optimum() {
        let solver = knapsack::fake_solver();
        let payload = Payload::new("knapsack", knapsack::MODEL, knapsack::data()).unwrap();
        let solutions = start(&solver, payload, None).collect_all().await;

        assert_eq!(solutions.status(), &RunStatus::Optimal);
        assert!(solutions.is_complete());
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[0].index, 0);
        assert_eq!(solutions[1].index, 1);

        let best = solutions.last().unwrap();
        assert_eq!(best.get("x").and_then(Value::as_int_set), Some(knapsack::optimum()));
        assert_eq!(best.solve_time, Some(Duration::from_millis(20)));
        assert_eq!(solutions.outcome().solution_count, 2);
        assert_eq!(solutions.outcome().exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_solutions_arrive_one_at_a_time() {
        let solver = knapsack::fake_solver();
        let mut stream = start(&solver, payload("solve satisfy;"), None);

        let first = stream.next_solution().await.unwrap();
        assert_eq!(first.get("x").and_then(Value::as_int_set), Some([1].into()));
        assert!(!stream.is_finished());

        assert!(stream.next_solution().await.is_some());
        assert!(stream.next_solution().await.is_none());
        assert_eq!(stream.outcome().unwrap().status, RunStatus::Optimal);
        assert!(stream.next_solution().await.is_none());
    }

    #[tokio::test]
    async fn test_unsatisfiable() {
        let solver = FakeSolver::printing("=====UNSATISFIABLE=====");
        let solutions = start(&solver, payload("solve satisfy;"), None).collect_all().await;
        assert!(solutions.is_empty());
        assert_eq!(solutions.status(), &RunStatus::Unsatisfiable);
    }

    #[tokio::test]
    async fn test_timeout_keeps_earlier_solutions() {
        let solver = FakeSolver::printing_then_sleeping("x = 1;\n----------", 30);
        let solutions = start(&solver, payload("solve satisfy;"), Some(Duration::from_millis(300)))
            .collect_all()
            .await;

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("x"), Some(&Value::Int(1)));
        assert_eq!(solutions.status(), &RunStatus::Unknown(UnknownCause::Timeout));
        assert_eq!(solutions.outcome().exit_code, None);
    }

    #[tokio::test]
    async fn test_timeout_after_output_closes() {
        let solver = FakeSolver::closing_output_then_sleeping("x = 1;\n----------", 30);
        let started = std::time::Instant::now();
        let solutions = start(&solver, payload("solve satisfy;"), Some(Duration::from_millis(300)))
            .collect_all()
            .await;

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("x"), Some(&Value::Int(1)));
        assert_eq!(solutions.status(), &RunStatus::Unknown(UnknownCause::Timeout));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_completed_run_is_not_overridden_by_timeout() {
        let solver = FakeSolver::printing("x = 1;\n----------\n==========");
        let solutions = start(&solver, payload("solve satisfy;"), Some(Duration::from_secs(30)))
            .collect_all()
            .await;
        assert_eq!(solutions.status(), &RunStatus::Optimal);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let solver = FakeSolver::printing_then_sleeping("x = 1;\n----------", 30);
        let mut stream = start(&solver, payload("solve satisfy;"), None);

        assert!(stream.next_solution().await.is_some());
        stream.cancel();
        assert!(stream.next_solution().await.is_none());

        let outcome = stream.outcome().unwrap();
        assert_eq!(outcome.status, RunStatus::Unknown(UnknownCause::Cancelled));
        assert_eq!(outcome.solution_count, 1);
    }

    #[tokio::test]
    async fn test_solver_failure_reports_stderr() {
        let solver = FakeSolver::failing("MiniZinc: type error: undefined identifier", 1);
        let outcome = start(&solver, payload("solve satisfy;"), None).finish().await;
        match outcome.status {
            RunStatus::Error { error, stderr } => {
                assert_eq!(error, ProcessError::NonZeroExit { code: Some(1) });
                assert!(stderr.contains("undefined identifier"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_status_stops_the_stream() {
        let solver = FakeSolver::printing("x = 1;\n----------\n=====BROKEN=====\nx = 2;\n----------");
        let solutions = start(&solver, payload("solve satisfy;"), None).collect_all().await;

        assert_eq!(solutions.len(), 1);
        assert!(matches!(
            solutions.status(),
            RunStatus::Error { error: ProcessError::MalformedStatus(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_undecodable_block_is_kept() {
        let solver = FakeSolver::printing("x = ;\n----------\nx = 2;\n----------\n==========");
        let solutions = start(&solver, payload("solve satisfy;"), None).collect_all().await;

        assert_eq!(solutions.len(), 2);
        assert!(!solutions[0].is_ok());
        assert_eq!(solutions[0].raw.trim(), "x = ;");
        assert_eq!(solutions[1].get("x"), Some(&Value::Int(2)));
        assert_eq!(solutions.status(), &RunStatus::Optimal);
    }

    #[tokio::test]
    async fn test_enum_domains_from_data() {
        let solver = FakeSolver::printing("x = array1d(Color, [1, 2]);\n----------");
        let mut data = Assignment::new();
        data.insert(
            "Color".into(),
            Value::EnumSet(vec!["Red".into(), "Green".into()]),
        );
        let payload = Payload::new("colors", "solve satisfy;", data).unwrap();
        let solutions = start(&solver, payload, None).collect_all().await;

        let x = solutions[0].get("x").and_then(Value::as_array).unwrap();
        assert!(matches!(&x.index_sets()[0], IndexSet::Enum { name, .. } if name == "Color"));
        assert_eq!(solutions.status(), &RunStatus::Satisfied);
    }

    #[tokio::test]
    async fn test_enum_domains_from_model() {
        let solver = FakeSolver::printing("x = array1d(Color, [1, 2]);\n----------");
        let model = "enum Color = {Red, Green};\narray[Color] of var int: x;\nsolve satisfy;";
        let solutions = start(&solver, payload(model), None).collect_all().await;

        let x = solutions[0].get("x").and_then(Value::as_array).unwrap();
        assert_eq!(
            x.index_sets(),
            &[IndexSet::enumerated("Color", vec!["Red".into(), "Green".into()])]
        );
    }

    #[tokio::test]
    async fn test_events_follow_the_run() {
        let counter = Arc::new(CountingEventListener::new());
        let mut events = InvocationEventSupport::new();
        events.add_listener(counter.clone());

        let solver = knapsack::fake_solver();
        let invocation = Invocation::start(payload("solve satisfy;"), &solver.config(), None).unwrap();
        let stream = SolutionStream::with_events(invocation, Arc::new(events));
        assert_eq!(counter.started_count(), 1);
        assert_eq!(counter.live_count(), 1);

        stream.finish().await;
        assert_eq!(counter.solution_count(), 2);
        assert_eq!(counter.finished_count(), 1);
        assert_eq!(counter.live_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_streams_are_isolated() {
        let solver = FakeSolver::echoing_model();
        let first = start(&solver, payload("id = 1;"), None);
        let second = start(&solver, payload("id = 2;"), None);

        let (first, second) = tokio::join!(first.collect_all(), second.collect_all());
        assert_eq!(first[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(second[0].get("id"), Some(&Value::Int(2)));
        assert_ne!(first[0].get("dir"), second[0].get("dir"));

        let dir = first[0].get("dir").and_then(Value::as_str).unwrap();
        assert!(!std::path::Path::new(dir).exists());
    }
}
