//! Integration tests for block nesting, display depth and step naming.

mod helpers;

use analyzer::config::AnalyzerConfig;
use analyzer::parse::{self, BlockKind, Step, StepKind};
use analyzer::validate::{self, nesting};
use helpers::*;

fn validate(steps: &[Step]) -> validate::NestingReport {
    validate::validate_structure(steps, &AnalyzerConfig::default())
}

#[test]
fn if_around_prompt_nests_one_level() {
    let steps = workflow(vec![if_("{{input.x}}"), prompt(&[]), StepKind::EndIf]);
    let report = validate(&steps);

    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.depths.get(&1), Some(&0));
    assert_eq!(report.depths.get(&2), Some(&1));
    assert_eq!(report.depths.get(&3), Some(&0));
}

#[test]
fn lone_endif_is_one_unmatched_closer() {
    let steps = workflow(vec![StepKind::EndIf]);
    let report = validate(&steps);

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code.as_str(), "UnmatchedCloser");
    assert_eq!(report.errors[0].step_order, 1);
    assert_eq!(report.depths.get(&1), Some(&0));
}

#[test]
fn branches_render_at_their_if_depth() {
    let steps = workflow(vec![
        foreach("{{input.rows}}", "row"),
        if_("{{vars.row}}"),
        output("yes"),
        StepKind::Elif(cond("{{vars.row}}", "maybe")),
        output("maybe"),
        StepKind::Else,
        output("no"),
        StepKind::EndIf,
        StepKind::EndForeach,
    ]);
    let report = validate(&steps);

    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    let depths: Vec<usize> = report.depths.values().copied().collect();
    assert_eq!(depths, vec![0, 1, 2, 1, 2, 1, 2, 1, 0]);
}

#[test]
fn opener_and_closer_share_a_depth() {
    let steps = workflow(vec![
        loop_("{{vars.n}}"),
        if_("{{vars.n}}"),
        foreach("dataset:7", "row"),
        set(&[("x", "1")]),
        StepKind::EndForeach,
        StepKind::EndIf,
        StepKind::EndLoop,
    ]);
    let report = validate(&steps);

    assert!(report.errors.is_empty());
    for block in &report.blocks {
        let closer = block.closer.expect("every block is closed");
        assert_eq!(report.depths[&block.opener], report.depths[&closer]);
    }
    assert_eq!(report.blocks.len(), 3);
}

#[test]
fn mismatched_closer_does_not_pop() {
    let steps = workflow(vec![
        if_("a"),
        loop_("b"),
        StepKind::EndIf,
        StepKind::EndLoop,
    ]);
    let report = validate(&steps);

    let codes: Vec<&str> = report.errors.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes, vec!["UnterminatedBlock", "MismatchedCloser"]);
    assert_eq!(report.errors[0].step_order, 1);
    assert_eq!(report.errors[1].step_order, 3);
    assert_eq!(report.depths[&3], 1);
    assert_eq!(report.depths[&4], 1);
}

#[test]
fn break_needs_an_enclosing_loop() {
    let inside = workflow(vec![
        foreach("{{input.rows}}", "row"),
        if_("{{vars.row}}"),
        StepKind::Break,
        StepKind::EndIf,
        StepKind::EndForeach,
    ]);
    assert!(validate(&inside).errors.is_empty());

    let outside = workflow(vec![if_("a"), StepKind::Continue, StepKind::EndIf]);
    let report = validate(&outside);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code.as_str(), "IllegalBreakContinue");
    assert_eq!(report.errors[0].step_order, 2);
}

#[test]
fn else_outside_if_is_illegal() {
    let steps = workflow(vec![loop_("a"), StepKind::Else, StepKind::EndLoop]);
    let report = validate(&steps);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code.as_str(), "IllegalElse");
}

#[test]
fn every_problem_in_one_pass() {
    let json = include_str!("fixtures/broken_nesting.json");
    let request = parse::parse(json).unwrap();
    let report = validate(&request.steps);

    let found: Vec<(&str, u32)> = report
        .errors
        .iter()
        .map(|e| (e.code.as_str(), e.step_order))
        .collect();
    assert_eq!(
        found,
        vec![
            ("ReservedStepName", 1),
            ("UnmatchedCloser", 1),
            ("UnterminatedBlock", 2),
            ("IllegalElse", 4),
            ("UnmatchedCloser", 5),
            ("InvalidStepName", 6),
            ("IllegalBreakContinue", 6),
        ]
    );
    let depths: Vec<usize> = report.depths.values().copied().collect();
    assert_eq!(depths, vec![0, 0, 0, 0, 0, 1]);
}

#[test]
fn duplicate_names_are_one_error() {
    let steps = vec![
        Step::new(1, "step1", prompt(&[])),
        Step::new(2, "step1", set(&[("x", "1")])),
    ];
    let report = validate(&steps);

    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.code.as_str(), "DuplicateStepName");
    assert_eq!(error.related_orders, vec![1, 2]);
}

#[test]
fn gap_in_orders_is_terminal() {
    let steps = vec![
        Step::new(1, "a", if_("x")),
        Step::new(3, "b", StepKind::EndIf),
    ];
    let report = nesting::validate_nesting(&steps);

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code.as_str(), "NonDenseOrder");
    assert_eq!(report.errors[0].step_order, 3);
    assert!(report.depths.values().all(|&d| d == 0));
}

#[test]
fn validation_is_idempotent() {
    let json = include_str!("fixtures/broken_nesting.json");
    let request = parse::parse(json).unwrap();
    assert_eq!(validate(&request.steps), validate(&request.steps));
}

#[test]
fn swapped_orders_are_out_of_sequence() {
    let steps = vec![
        Step::new(2, "a", output("x")),
        Step::new(1, "b", output("y")),
    ];
    let report = nesting::validate_nesting(&steps);

    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.code.as_str(), "NonDenseOrder");
    assert_eq!(error.step_order, 2);
    assert!(error.message.contains("out of sequence"), "unexpected message: {}", error.message);
}

// =============================================================================
// Exhaustive sequences
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Open(BlockKind),
    Close(BlockKind),
    Plain,
}

const KINDS: [BlockKind; 3] = [BlockKind::If, BlockKind::Loop, BlockKind::Foreach];

/// Every well-nested token sequence of exactly `len` steps.
fn well_nested(len: usize) -> Vec<Vec<Token>> {
    if len == 0 {
        return vec![vec![]];
    }
    let mut out = Vec::new();
    for rest in well_nested(len - 1) {
        let mut seq = vec![Token::Plain];
        seq.extend(rest);
        out.push(seq);
    }
    if len >= 2 {
        for kind in KINDS {
            for inner_len in 0..=len - 2 {
                let rests = well_nested(len - 2 - inner_len);
                for inner in well_nested(inner_len) {
                    for rest in &rests {
                        let mut seq = vec![Token::Open(kind)];
                        seq.extend(inner.iter().copied());
                        seq.push(Token::Close(kind));
                        seq.extend(rest.iter().copied());
                        out.push(seq);
                    }
                }
            }
        }
    }
    out
}

fn steps_for(tokens: &[Token]) -> Vec<Step> {
    workflow(
        tokens
            .iter()
            .map(|token| match token {
                Token::Open(BlockKind::If) => if_("{{input.x}}"),
                Token::Open(BlockKind::Loop) => loop_("{{input.x}}"),
                Token::Open(BlockKind::Foreach) => foreach("{{input.rows}}", "row"),
                Token::Close(BlockKind::If) => StepKind::EndIf,
                Token::Close(BlockKind::Loop) => StepKind::EndLoop,
                Token::Close(BlockKind::Foreach) => StepKind::EndForeach,
                Token::Plain => prompt(&[]),
            })
            .collect(),
    )
}

#[test]
fn every_well_nested_sequence_is_clean() {
    let mut checked = 0;
    for len in 0..=6 {
        for tokens in well_nested(len) {
            let steps = steps_for(&tokens);
            let report = validate(&steps);
            assert!(report.errors.is_empty(), "{:?}: {:?}", tokens, report.errors);
            assert_eq!(report.depths.len(), steps.len());

            let openers = tokens.iter().filter(|t| matches!(t, Token::Open(_))).count();
            assert_eq!(report.blocks.len(), openers, "{:?}", tokens);
            for block in &report.blocks {
                let closer = block.closer.expect("every block closes");
                assert_eq!(
                    report.depths[&block.opener], report.depths[&closer],
                    "{:?}: block at {} closed at {}",
                    tokens, block.opener, closer
                );
            }
            checked += 1;
        }
    }
    assert_eq!(checked, 1 + 1 + 4 + 10 + 37 + 121 + 451);
}

#[test]
fn one_stray_closer_is_one_error() {
    for len in 0..=5 {
        for tokens in well_nested(len) {
            // Closer index for each opener index.
            let mut partner = vec![None; tokens.len()];
            let mut open: Vec<usize> = Vec::new();
            for (i, token) in tokens.iter().enumerate() {
                match token {
                    Token::Open(_) => open.push(i),
                    Token::Close(_) => partner[open.pop().expect("balanced")] = Some(i),
                    Token::Plain => {}
                }
            }

            for at in 0..=tokens.len() {
                let stack: Vec<(BlockKind, usize)> = tokens[..at]
                    .iter()
                    .enumerate()
                    .filter_map(|(i, t)| match t {
                        Token::Open(kind) if partner[i].is_some_and(|c| c >= at) => Some((*kind, i)),
                        _ => None,
                    })
                    .collect();

                for kind in KINDS {
                    let mut with_stray = tokens.clone();
                    with_stray.insert(at, Token::Close(kind));
                    let report = validate(&steps_for(&with_stray));

                    // A stray closer that fits the innermost block closes it
                    // early, and that block's own closer becomes the stray one.
                    let (expected_order, remaining) = match stack.last() {
                        Some(&(top, opener)) if top == kind => {
                            let closer = partner[opener].expect("balanced");
                            (closer as u32 + 2, &stack[..stack.len() - 1])
                        }
                        _ => (at as u32 + 1, &stack[..]),
                    };
                    let expected_code = if remaining.iter().any(|&(k, _)| k == kind) {
                        "MismatchedCloser"
                    } else {
                        "UnmatchedCloser"
                    };

                    assert_eq!(report.errors.len(), 1, "{:?}: {:?}", with_stray, report.errors);
                    assert_eq!(report.errors[0].code.as_str(), expected_code, "{:?}", with_stray);
                    assert_eq!(report.errors[0].step_order, expected_order, "{:?}", with_stray);
                    assert_eq!(report.depths.len(), with_stray.len());
                }
            }
        }
    }
}
