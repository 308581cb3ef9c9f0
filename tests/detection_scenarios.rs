//! End-to-end detection over the built-in rules document

use std::io::Write;

use pretty_assertions::assert_eq;

use reqconflict::config::{parse_rules_yaml, BUILTIN_RULES};
use reqconflict::model::{load_model_file, read_model};
use reqconflict::report::{write_report, ReportFormat};
use reqconflict::{detect, ConfigLoader, ConflictKind, DetectionError, Detector, EntityPool, Req, RuleSet};

fn rules() -> RuleSet {
    ConfigLoader::builtin().load_rule_set().unwrap()
}

fn model(text: &str) -> Vec<Req> {
    let mut pool = EntityPool::new();
    read_model(text, &mut pool).unwrap()
}

/// (kind, reqids) for every detected conflict
fn conflicts(text: &str) -> Vec<(ConflictKind, Vec<u32>)> {
    let rules = rules();
    let reqs = model(text);
    detect(&rules, &reqs)
        .unwrap()
        .iter()
        .map(|c| (c.kind, c.reqids()))
        .collect()
}

// ============================================================================
// Direct conflicts
// ============================================================================

#[test]
fn test_operation_inconsistency() {
    let found = conflicts(
        "(1) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)\n\
         (2) , (0) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)\n",
    );
    assert_eq!(found, vec![(ConflictKind::OperationInconsistency, vec![1, 2])]);
}

#[test]
fn test_restriction_inconsistency() {
    let found = conflicts(
        "(1) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)\n\
         (2) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (by day)\n",
    );
    assert_eq!(found, vec![(ConflictKind::RestrictionInconsistency, vec![1, 2])]);
}

#[test]
fn test_event_inconsistency() {
    // the alarm is triggered by an action the other requirement forbids
    let found = conflicts(
        "(1) , (0) , ({(*system*) , (open) , (door) , (*void*) , (*void*)}) , (alarm) , (ring) , (*void*) , (*void*) , (*void*)\n\
         (2) , (0) , (*always*) , (*system*) , (NOT open) , (door) , (*void*) , (*void*)\n",
    );
    assert_eq!(found, vec![(ConflictKind::EventInconsistency, vec![1, 2])]);
}

#[test]
fn test_group_siblings_are_exempt() {
    let found = conflicts(
        "(1) , (4) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)\n\
         (2) , (4) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)\n",
    );
    assert!(found.is_empty(), "siblings reported: {:?}", found);

    // group 0 means standalone, never exempt
    let found = conflicts(
        "(1) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)\n\
         (2) , (0) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)\n",
    );
    assert_eq!(found.len(), 1);
}

// ============================================================================
// Directional rules
// ============================================================================

#[test]
fn test_operation_inclusion_reports_including_side_first() {
    let general = "(1) , (0) , (*always*) , (clerk) , (file) , (report) , (*void*) , (*void*)";
    let specific = "(1) , (0) , (*always*) , ([senior]clerk) , (file) , (report) , (*void*) , (*void*)";

    let found = conflicts(&format!("{}\n{}\n", general, specific));
    assert_eq!(found, vec![(ConflictKind::OperationInclusion, vec![1, 2])]);

    let found = conflicts(&format!("{}\n{}\n", specific, general));
    assert_eq!(found, vec![(ConflictKind::OperationInclusion, vec![2, 1])]);
}

#[test]
fn test_duplicates_reported_once() {
    let line = "(1) , (0) , (*always*) , (clerk) , (file) , (report) , (*void*) , (*void*)";
    let found = conflicts(&format!("{}\n{}\n", line, line));
    assert_eq!(found, vec![(ConflictKind::OperationInclusion, vec![1, 2])]);
}

#[test]
fn test_event_inclusion() {
    // unconditional requirement covers the conditional one
    let found = conflicts(
        "(1) , (0) , (*always*) , (*system*) , (log) , (access) , (*void*) , (*void*)\n\
         (2) , (0) , ({(user) , (login) , (*void*) , (*void*) , (*void*)}) , (*system*) , (log) , (access) , (*void*) , (*void*)\n",
    );
    assert_eq!(found, vec![(ConflictKind::EventInclusion, vec![1, 2])]);
}

// ============================================================================
// Interlocks
// ============================================================================

#[test]
fn test_input_output_interlock() {
    let rules = rules();
    let reqs = model(
        "(1) , (0) , (*always*) , (*system*) , (generate) , (data) , (report) , (*void*)\n\
         (2) , (0) , (*always*) , (*system*) , (import) , (report) , (data) , (*void*)\n",
    );

    let outcome = Detector::new(&rules).scan(&reqs).unwrap();
    assert!(outcome.conflicts.is_empty());
    assert!(outcome.input_output.has_edge(0, 1));
    assert!(outcome.input_output.has_edge(1, 0));
    assert_eq!(outcome.operation_event.edge_count(), 0);

    let found: Vec<_> = outcome
        .finish(&reqs)
        .iter()
        .map(|c| (c.kind, c.reqids()))
        .collect();
    assert_eq!(found, vec![(ConflictKind::InputOutputInterlock, vec![1, 2])]);
}

#[test]
fn test_one_way_feed_is_not_an_interlock() {
    let rules = rules();
    let reqs = model(
        "(1) , (0) , (*always*) , (*system*) , (generate) , (data) , (report) , (*void*)\n\
         (2) , (0) , (*always*) , (*system*) , (archive) , (report) , (*void*) , (*void*)\n",
    );

    let outcome = Detector::new(&rules).scan(&reqs).unwrap();
    assert!(outcome.input_output.has_edge(0, 1));
    assert!(!outcome.input_output.has_edge(1, 0));
    assert!(outcome.finish(&reqs).is_empty());
}

#[test]
fn test_input_output_interlock_with_separate_triggers() {
    let rules = rules();
    let reqs = model(
        "(1) , (0) , ({(user) , (login) , (*void*) , (*void*) , (*void*)}) , (*system*) , (generate) , (data) , (report) , (*void*)\n\
         (2) , (0) , ({(admin) , (logout) , (*void*) , (*void*) , (*void*)}) , (*system*) , (import) , (report) , (data) , (*void*)\n",
    );

    let outcome = Detector::new(&rules).scan(&reqs).unwrap();
    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.input_output.edges().collect::<Vec<_>>(),
        vec![(0, 1), (1, 0)]
    );

    let found: Vec<_> = outcome
        .finish(&reqs)
        .iter()
        .map(|c| (c.kind, c.reqids()))
        .collect();
    assert_eq!(found, vec![(ConflictKind::InputOutputInterlock, vec![1, 2])]);
}

#[test]
fn test_event_inconsistency_suppresses_input_output_edge() {
    // the second requirement forbids the action that triggers the first
    let rules = rules();
    let reqs = model(
        "(1) , (0) , ({(*system*) , (publish) , (report) , (*void*) , (*void*)}) , (*system*) , (generate) , (data) , (report) , (*void*)\n\
         (2) , (0) , (*always*) , (*system*) , (NOT publish) , (report) , (data) , (*void*)\n",
    );

    let outcome = Detector::new(&rules).scan(&reqs).unwrap();
    assert_eq!(outcome.input_output.edge_count(), 0);

    let found: Vec<_> = outcome
        .finish(&reqs)
        .iter()
        .map(|c| (c.kind, c.reqids()))
        .collect();
    assert_eq!(found, vec![(ConflictKind::EventInconsistency, vec![1, 2])]);
}

#[test]
fn test_three_way_input_output_interlock() {
    let found = conflicts(
        "(1) , (0) , (*always*) , (*system*) , (parse) , (source) , (tokens) , (*void*)\n\
         (2) , (0) , (*always*) , (*system*) , (compile) , (tokens) , (binary) , (*void*)\n\
         (3) , (0) , (*always*) , (*system*) , (decompile) , (binary) , (source) , (*void*)\n",
    );
    assert_eq!(found, vec![(ConflictKind::InputOutputInterlock, vec![1, 2, 3])]);
}

#[test]
fn test_operation_event_interlock() {
    // each requirement's action triggers the other
    let found = conflicts(
        "(1) , (0) , ({(*system*) , (close) , (valve) , (*void*) , (*void*)}) , (*system*) , (open) , (valve) , (*void*) , (*void*)\n\
         (2) , (0) , ({(*system*) , (open) , (valve) , (*void*) , (*void*)}) , (*system*) , (close) , (valve) , (*void*) , (*void*)\n",
    );
    assert_eq!(found, vec![(ConflictKind::OperationEventInterlock, vec![1, 2])]);
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn test_type_mismatch_in_rules_document() {
    let broken = BUILTIN_RULES.replace("1 agent equal 2 agent", "1 agent equal 2 restriction");
    let err = RuleSet::from_config(&parse_rules_yaml(&broken).unwrap()).unwrap_err();
    match err.root_cause() {
        DetectionError::TypeMismatch {
            field1,
            type1,
            field2,
            type2,
        } => {
            assert_eq!(
                (field1.as_str(), type1.as_str(), field2.as_str(), type2.as_str()),
                ("agent", "entity", "restriction", "string-set")
            );
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_no_requirements() {
    assert!(conflicts("").is_empty());
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_model_file_to_text_report() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "(10) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)"
    )
    .unwrap();
    writeln!(file).unwrap();
    writeln!(
        file,
        "(20) , (0) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)"
    )
    .unwrap();

    let rules = rules();
    let mut pool = EntityPool::new();
    let reqs = load_model_file(file.path(), &mut pool).unwrap();
    let conflicts = detect(&rules, &reqs).unwrap();

    let mut out = Vec::new();
    write_report(&mut out, &conflicts, ReportFormat::Text).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "operation inconsistency\n\
         (1) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)\n\
         (2) , (0) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)\n\
         \n"
    );
}
