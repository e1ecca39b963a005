use ivy::interpreter::{parse_and_run, RunOutcome};

/// Runs a program and returns its printed lines, failing the test on any
/// parse or runtime condition.
pub fn run_lines(source: &str) -> Vec<String> {
    let outcome = parse_and_run(source);
    assert!(
        outcome.is_clean(),
        "program reported errors:\n  parse: {:?}\n  runtime: {:?}\n  source: {}",
        outcome.parse_errors,
        outcome.runtime_errors,
        source
    );
    outcome.output.lines().map(str::to_string).collect()
}

/// Runs a program that is expected to report conditions, returning the full
/// outcome for inspection.
pub fn run_outcome(source: &str) -> RunOutcome {
    parse_and_run(source)
}
