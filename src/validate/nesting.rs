//! Control-flow nesting validation and per-step display depth.
//!
//! One left-to-right pass over the step list with an explicit stack of open
//! blocks. Every problem is recorded and the pass always runs to the end.

use std::collections::BTreeMap;

use crate::error::{StructuralError, StructuralErrorKind};
use crate::parse::types::{BlockKind, Step, StepType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestingReport {
    /// Display depth per step order.
    pub depths: BTreeMap<u32, usize>,
    pub errors: Vec<StructuralError>,
    /// Every opener seen, with its matching closer when there is one.
    pub blocks: Vec<BlockSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub opener: u32,
    pub closer: Option<u32>,
}

#[derive(Debug)]
struct Frame {
    kind: BlockKind,
    opener: u32,
    else_seen: bool,
}

/// Orders must run 1..N in list order. The list is never reordered here; a
/// permutation of 1..N is reported as out of sequence rather than as a gap.
pub fn check_dense_order(steps: &[Step]) -> Option<StructuralError> {
    let (step, expected) = steps
        .iter()
        .zip(1u32..)
        .find(|(step, expected)| step.order != *expected)?;

    let mut orders: Vec<u32> = steps.iter().map(|s| s.order).collect();
    orders.sort_unstable();
    let permuted = orders.iter().copied().eq(1..=steps.len() as u32);

    let message = if permuted {
        format!(
            "Step orders are out of sequence; position {} has order {}",
            expected, step.order
        )
    } else {
        format!(
            "Step orders must run 1..{} without gaps or repeats; position {} has order {}",
            steps.len(),
            expected,
            step.order
        )
    };
    Some(StructuralError::new(
        StructuralErrorKind::NonDenseOrder,
        step.order,
        message,
    ))
}

/// Validate control-flow nesting and compute display depths.
pub fn validate_nesting(steps: &[Step]) -> NestingReport {
    let mut report = NestingReport::default();

    if let Some(error) = check_dense_order(steps) {
        report.errors.push(error);
        for step in steps {
            report.depths.insert(step.order, 0);
        }
        return report;
    }

    let mut stack: Vec<Frame> = Vec::new();

    for step in steps {
        let order = step.order;
        let step_type = step.step_type();

        let depth = if let Some(kind) = step_type.opens() {
            let depth = stack.len();
            stack.push(Frame {
                kind,
                opener: order,
                else_seen: false,
            });
            depth
        } else if let Some(kind) = step_type.closes() {
            close_block(kind, order, &mut stack, &mut report)
        } else {
            match step_type {
                StepType::Elif | StepType::Else => {
                    check_branch(step_type, order, &mut stack, &mut report.errors);
                    stack.len().saturating_sub(1)
                }
                StepType::Break | StepType::Continue => {
                    if !stack.iter().any(|f| f.kind.is_loop()) {
                        report.errors.push(StructuralError::new(
                            StructuralErrorKind::IllegalBreakContinue,
                            order,
                            format!("{} is only allowed inside a Loop or Foreach block", step_type),
                        ));
                    }
                    stack.len()
                }
                _ => stack.len(),
            }
        };

        report.depths.insert(order, depth);
    }

    for frame in stack {
        report.errors.push(StructuralError::new(
            StructuralErrorKind::UnterminatedBlock,
            frame.opener,
            format!(
                "{} block opened at step {} is never closed by {}",
                frame.kind,
                frame.opener,
                frame.kind.closer()
            ),
        ));
        report.blocks.push(BlockSpan {
            kind: frame.kind,
            opener: frame.opener,
            closer: None,
        });
    }

    report.blocks.sort_by_key(|b| b.opener);
    report
}

/// Pop the innermost block iff it is the kind this closer ends.
/// Returns the closer's display depth.
fn close_block(
    kind: BlockKind,
    order: u32,
    stack: &mut Vec<Frame>,
    report: &mut NestingReport,
) -> usize {
    let closer = kind.closer();
    match stack.last() {
        Some(top) if top.kind == kind => {
            let opener = top.opener;
            stack.pop();
            report.blocks.push(BlockSpan {
                kind,
                opener,
                closer: Some(order),
            });
            return stack.len();
        }
        Some(top) if stack.iter().any(|f| f.kind == kind) => {
            report.errors.push(StructuralError::new(
                StructuralErrorKind::MismatchedCloser,
                order,
                format!(
                    "{} cannot close the {} block opened at step {}",
                    closer, top.kind, top.opener
                ),
            ));
        }
        _ => {
            report.errors.push(StructuralError::new(
                StructuralErrorKind::UnmatchedCloser,
                order,
                format!("{} has no open {} block to close", closer, kind),
            ));
        }
    }
    stack.len().saturating_sub(1)
}

fn check_branch(
    step_type: StepType,
    order: u32,
    stack: &mut [Frame],
    errors: &mut Vec<StructuralError>,
) {
    let message = match stack.last_mut() {
        Some(top) if top.kind == BlockKind::If => {
            if top.else_seen {
                format!(
                    "{} cannot follow the Else of the If block opened at step {}",
                    step_type, top.opener
                )
            } else {
                if step_type == StepType::Else {
                    top.else_seen = true;
                }
                return;
            }
        }
        Some(top) => format!(
            "{} must be directly inside an If block, but the innermost open block is the {} at step {}",
            step_type, top.kind, top.opener
        ),
        None => format!("{} must be directly inside an If block", step_type),
    };
    errors.push(StructuralError::new(StructuralErrorKind::IllegalElse, order, message));
}
