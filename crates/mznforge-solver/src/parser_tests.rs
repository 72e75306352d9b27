//! Tests for the solution stream parser.

use std::collections::BTreeSet;

use super::*;

fn run(output: &str) -> (Vec<SolutionRecord>, RunStatus, Statistics) {
    let mut records = parse(output.lines());
    let collected: Vec<_> = records.by_ref().collect();
    let (status, statistics) = records.finish();
    (collected, status, statistics)
}

#[test]
fn test_blocks_are_yielded_in_order() {
    let (records, status, _) = run("a = 1;\n----------\na = 2;\n----------\na = 3;\n----------\n==========\n");
    let values: Vec<_> = records.iter().map(|r| r.get("a").cloned()).collect();
    assert_eq!(
        values,
        vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3))]
    );
    assert_eq!(
        records.iter().map(|r| r.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(status, RunStatus::Optimal);
    assert!(status.is_complete());
}

#[test]
fn test_knapsack_output() {
    let output = "x = {1};\n_objective = 10;\n% time elapsed: 0.01 s\n----------\n\
                  x = {3, 5};\n_objective = 17;\n% time elapsed: 0.02 s\n----------\n==========\n";
    let (records, status, _) = run(output);
    let last = records.last().unwrap();
    assert_eq!(
        last.get("x").and_then(Value::as_int_set),
        Some(BTreeSet::from([3, 5]))
    );
    assert_eq!(last.objective(), Some(&Value::Int(17)));
    assert_eq!(last.solve_time, Some(Duration::from_millis(20)));
    assert_eq!(last.raw, "x = {3, 5};\n_objective = 17;");
    assert_eq!(status, RunStatus::Optimal);
}

#[test]
fn test_status_tokens() {
    let cases = [
        (UNSATISFIABLE, RunStatus::Unsatisfiable),
        (UNBOUNDED, RunStatus::Unbounded),
        (UNSAT_OR_UNBOUNDED, RunStatus::UnsatOrUnbounded),
        (UNKNOWN, RunStatus::Unknown(UnknownCause::Reported)),
    ];
    for (token, expected) in cases {
        let (records, status, _) = run(token);
        assert!(records.is_empty());
        assert_eq!(status, expected, "token {token}");
    }
}

#[test]
fn test_error_token_carries_solver_error() {
    let mut parser = SolutionParser::new();
    assert!(parser.feed(ERROR).is_none());
    let status = parser.finish(Some(1), "flattening failed");
    assert_eq!(
        status,
        RunStatus::Error {
            error: ProcessError::Solver,
            stderr: "flattening failed".to_string(),
        }
    );
}

#[test]
fn test_solutions_without_token_are_satisfied() {
    let (records, status, _) = run("x = 1;\n----------\n");
    assert_eq!(records.len(), 1);
    assert_eq!(status, RunStatus::Satisfied);
    assert!(!status.is_complete());
}

#[test]
fn test_no_output_and_failed_exit() {
    let mut parser = SolutionParser::new();
    assert_eq!(
        parser.finish(Some(2), "boom"),
        RunStatus::Error {
            error: ProcessError::NonZeroExit { code: Some(2) },
            stderr: "boom".to_string(),
        }
    );
    let mut parser = SolutionParser::new();
    assert_eq!(
        parser.finish(Some(0), ""),
        RunStatus::Unknown(UnknownCause::Reported)
    );
}

#[test]
fn test_token_wins_over_exit_code() {
    let mut parser = SolutionParser::new();
    parser.feed(UNSATISFIABLE);
    assert_eq!(parser.finish(Some(1), "warning"), RunStatus::Unsatisfiable);
}

#[test]
fn test_malformed_status_is_fatal() {
    let mut records = parse(["x = 1;", "----------", "=====WEIRD=====", "x = 2;", "----------"]);
    assert!(records.next().is_some());
    assert!(records.next().is_none());
    assert!(records.parser().is_failed());
    let (status, _) = records.finish();
    assert_eq!(
        status,
        RunStatus::Error {
            error: ProcessError::MalformedStatus("=====WEIRD=====".to_string()),
            stderr: String::new(),
        }
    );
}

#[test]
fn test_decode_error_stays_in_its_record() {
    let (records, status, _) = run("x = [1, 2.5];\n----------\nx = 2;\n----------\n==========\n");
    assert_eq!(records.len(), 2);
    assert!(matches!(
        records[0].assignment,
        Err(MalformedDataError::TypeMismatch(_))
    ));
    assert!(records[0].get("x").is_none());
    assert_eq!(records[1].get("x"), Some(&Value::Int(2)));
    assert_eq!(status, RunStatus::Optimal);
}

#[test]
fn test_statistics() {
    let output = "%%%mzn-stat: nodes=10\nx = 1;\n----------\n==========\n\
                  %%%mzn-stat: failures=4\n%%%mzn-stat: method=\"satisfy\"\n%%%mzn-stat-end\n";
    let (records, _, statistics) = run(output);
    assert_eq!(records[0].statistics.get("nodes").map(String::as_str), Some("10"));
    assert_eq!(statistics.get("failures").map(String::as_str), Some("4"));
    assert_eq!(statistics.get("method").map(String::as_str), Some("satisfy"));
    assert_eq!(statistics.len(), 2);
}

#[test]
fn test_state_transitions() {
    let mut parser = SolutionParser::new();
    assert_eq!(parser.state(), ParserState::Accumulating);
    parser.feed("x = 1;");
    assert_eq!(parser.state(), ParserState::Accumulating);
    assert!(parser.feed("----------").is_some());
    assert_eq!(parser.state(), ParserState::BlockComplete);
    parser.feed("==========");
    assert_eq!(parser.state(), ParserState::Terminal);
    assert!(parser.feed("x = 2;").is_none());
    assert!(parser.feed("----------").is_none());
    assert_eq!(parser.solution_count(), 1);
}

#[test]
fn test_comments_blank_lines_and_crlf() {
    let (records, status, _) = run("% solver banner\r\n\r\nx = 4;\r\n----------\r\n==========\r\n");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("x"), Some(&Value::Int(4)));
    assert_eq!(status, RunStatus::Optimal);
}

#[test]
fn test_trailing_partial_block_is_discarded() {
    let (records, status, _) = run("x = 1;\n----------\nx = 2;\n");
    assert_eq!(records.len(), 1);
    assert_eq!(status, RunStatus::Satisfied);
}

#[test]
fn test_custom_decoder_for_enums() {
    let decoder = Decoder::new()
        .with_enum("Day", ["Mon", "Tue"])
        .strict_enums(true);
    let records = parse(["d = Tue;", "----------", "d = Sun;", "----------"])
        .with_parser(SolutionParser::with_decoder(decoder));
    let records: Vec<_> = records.collect();
    assert_eq!(records[0].get("d"), Some(&Value::Enum("Tue".into())));
    assert!(!records[1].is_ok());
}

#[test]
fn test_status_labels() {
    assert_eq!(RunStatus::Unknown(UnknownCause::Timeout).label(), "timeout");
    assert_eq!(RunStatus::UnsatOrUnbounded.label(), "unsat_or_unbounded");
}
