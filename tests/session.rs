//! Integration tests for incremental analysis sessions.

mod helpers;

use analyzer::analysis;
use analyzer::parse::{self, Step, StepKind};
use analyzer::scope::catalog::StaticPromptCatalog;
use analyzer::session::AnalysisSession;
use helpers::*;

fn research_session() -> AnalysisSession {
    AnalysisSession::from_json(include_str!("fixtures/research_workflow.json"))
        .expect("Should open session")
}

/// The session's incremental report must match a from-scratch analysis.
fn assert_consistent(session: &AnalysisSession) {
    let request = parse::parse(include_str!("fixtures/research_workflow.json")).unwrap();
    let catalog = StaticPromptCatalog::new(request.prompts);
    let full = analysis::analyze(
        session.steps(),
        &request.input_parameters,
        &catalog,
        &request.options,
    );
    assert_eq!(session.report(), full);
}

#[test]
fn new_session_matches_one_shot_analysis() {
    let session = research_session();
    assert_eq!(session.generation(), 1);
    assert!(session.is_current(1));
    assert_consistent(&session);
}

#[test]
fn content_edit_rechecks_one_step() {
    let mut session = research_session();
    let mut step = session.steps()[9].clone();
    if let StepKind::Output(c) = &mut step.kind {
        c.filename = Some("{{input.nope}}.csv".into());
    }

    let update = session.edit_step(step).unwrap();
    assert!(!update.structural);
    assert_eq!(update.generation, 2);
    assert_eq!(update.order, 10);
    assert_eq!(update.findings.len(), 1);
    assert_eq!(update.findings[0].field.as_deref(), Some("filename"));

    assert!(!session.is_current(1));
    assert!(session.is_current(update.generation));
    assert_consistent(&session);
}

#[test]
fn renaming_a_variable_is_structural() {
    let mut session = research_session();
    let step = Step::new(2, "total", set(&[("sum", "0")]));

    let update = session.edit_step(step).unwrap();
    assert!(update.structural);
    assert!(update.findings.is_empty());

    // Step 5 now holds the first definition of vars.total.
    let report = session.report();
    let at_five: Vec<&str> = report.findings_at(5).map(|f| f.code.as_str()).collect();
    assert_eq!(at_five, vec!["OutOfScope"]);
    assert_eq!(report.findings_at(6).count(), 0);
    assert_consistent(&session);
}

#[test]
fn retyping_a_step_reflows_depths() {
    let mut session = research_session();
    let update = session
        .edit_step(Step::new(7, "stop", output("stopping")))
        .unwrap();
    assert!(update.structural);
    assert!(session.report().is_saveable());

    let update = session
        .edit_step(Step::new(8, "end_check", StepKind::Continue))
        .unwrap();
    assert!(update.structural);
    // The If at 6 is left open, so the EndForeach at 9 cannot close.
    let report = session.report();
    assert_eq!(
        error_codes(&report),
        vec!["UnterminatedBlock", "UnterminatedBlock", "MismatchedCloser"]
    );
    assert_eq!(report.errors[1].step_order, 6);
    assert_eq!(report.errors[2].step_order, 9);
    assert_consistent(&session);
}

#[test]
fn changing_the_prompt_ref_is_structural() {
    let mut session = research_session();
    let mut step = session.steps()[0].clone();
    if let StepKind::Prompt(c) = &mut step.kind {
        c.prompt_ref = None;
    }
    let update = session.edit_step(step).unwrap();
    assert!(update.structural);

    // outline.sections is no longer known, but outline is now best-effort.
    assert!(session.report().findings.is_empty());
    assert_consistent(&session);
}

#[test]
fn unknown_step_leaves_generation_alone() {
    let mut session = research_session();
    let err = session
        .edit_step(Step::new(42, "ghost", StepKind::Break))
        .unwrap_err();
    assert_eq!(err.code(), "P004");
    assert_eq!(session.generation(), 1);
}

#[test]
fn replace_steps_bumps_generation() {
    let mut session = research_session();
    let steps = workflow(vec![if_("{{input.topic}}"), output("{{vars.total}}")]);

    let generation = session.replace_steps(steps);
    assert_eq!(generation, 2);

    let report = session.report();
    assert_eq!(error_codes(&report), vec!["UnterminatedBlock"]);
    assert_eq!(finding_codes(&report), vec!["UnknownName"]);
    assert_consistent(&session);
}

#[test]
fn input_parameters_feed_every_step() {
    let mut session = research_session();
    let generation = session.set_input_parameters(vec!["topic".into()]);
    assert_eq!(generation, 2);

    let report = session.report();
    assert!(report
        .findings
        .iter()
        .all(|f| f.reference.as_deref() == Some("input.count")));
    assert_eq!(report.findings.len(), 1);
}
