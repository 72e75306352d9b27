//! Tests for solver configuration.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        executable = "/opt/minizinc/bin/minizinc"
        solver = "cp-sat"
        include = ["lib", "/usr/share/mzn"]
        keep = true
        concurrency = 3

        [options]
        num_solutions = 5
        parallel = 4
        seed = 42
        statistics = true
    "#;

    let config = SolverConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.executable, PathBuf::from("/opt/minizinc/bin/minizinc"));
    assert_eq!(config.solver, SolverKind::OrTools);
    assert_eq!(config.include.len(), 2);
    assert!(config.keep);
    assert_eq!(config.concurrency, 3);
    assert_eq!(config.options.num_solutions, Some(5));
    assert!(config.options.output_time);
    assert_eq!(config.inline_data_threshold, DEFAULT_INLINE_DATA_THRESHOLD);
    assert_eq!(config.grace_period(), Duration::from_millis(500));
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        solver: chuffed
        grace_period_ms: 200
        options:
          free_search: true
          output_time: false
    "#;

    let config = SolverConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.solver, SolverKind::Chuffed);
    assert_eq!(config.grace_period_ms, 200);
    assert!(config.options.free_search);
    assert!(!config.options.output_time);
}

#[test]
fn test_empty_toml_matches_default() {
    let config = SolverConfig::from_toml_str("").unwrap();
    let default = SolverConfig::default();
    assert_eq!(config.executable, default.executable);
    assert_eq!(config.options, default.options);
    assert_eq!(config.concurrency, default.concurrency);
}

#[test]
fn test_unknown_solver_is_rejected() {
    assert!(SolverConfig::from_toml_str(r#"solver = "minisat""#).is_err());
    assert!(matches!(
        "minisat".parse::<SolverKind>(),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_solver_ids_round_trip() {
    for kind in SolverKind::ALL {
        assert_eq!(kind.id().parse::<SolverKind>().unwrap(), kind);
        assert_eq!(kind.to_string(), kind.id());
    }
}

#[test]
fn test_load_missing_file() {
    let config = SolverConfig::load("/nonexistent/mznforge.toml");
    assert!(matches!(config, Err(ConfigError::Io(_))));
}

#[test]
fn test_builder() {
    let config = SolverConfig::new()
        .with_solver(SolverKind::Gecode)
        .with_num_solutions(3)
        .with_free_search(true)
        .with_parallel(2)
        .with_seed(7)
        .with_time_limit(Duration::from_secs(2))
        .with_concurrency(4);

    assert_eq!(config.time_limit(), Some(Duration::from_millis(2000)));
    assert_eq!(
        config.backend_args().unwrap(),
        vec!["-n", "3", "-f", "-p", "2", "-r", "7"]
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_all_solutions_wins_over_count() {
    let config = SolverConfig::new()
        .with_all_solutions(true)
        .with_num_solutions(3);
    assert_eq!(config.backend_args().unwrap(), vec!["-a"]);
}

#[test]
fn test_flags_follow_the_backend() {
    let options = SolveOptions {
        parallel: Some(2),
        seed: Some(7),
        ..SolveOptions::default()
    };
    assert_eq!(
        SolverKind::Gecode.args(&options).unwrap(),
        vec!["-p", "2", "-r", "7"]
    );
    assert_eq!(
        SolverKind::Gurobi.args(&options).unwrap(),
        vec!["-p", "2", "--random-seed", "7"]
    );
    assert_eq!(SolverKind::Cplex.flags().seed, "--random-seed");
    assert_eq!(SolverKind::Chuffed.flags(), Flags::STANDARD);
}

#[test]
fn test_unsupported_capabilities() {
    let config = SolverConfig::new()
        .with_solver(SolverKind::Chuffed)
        .with_parallel(4);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Unsupported {
            solver: SolverKind::Chuffed,
            ..
        })
    ));

    let config = SolverConfig::new()
        .with_solver(SolverKind::CoinBc)
        .with_free_search(true);
    assert!(config.backend_args().is_err());

    let config = SolverConfig::new()
        .with_solver(SolverKind::Highs)
        .with_seed(1);
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_values() {
    assert!(matches!(
        SolverConfig::new().with_concurrency(0).validate(),
        Err(ConfigError::Invalid(_))
    ));
    assert!(SolverConfig::new().with_num_solutions(0).validate().is_err());
    assert!(SolverConfig::new().with_executable("").validate().is_err());
}
