//! Trigger walk
//!
//! Execution follows `next` links in a flat loop. Loop bodies link back to
//! their loop node, so iterating re-enters the loop node instead of
//! recursing, and the native stack stays flat however many iterations or
//! items run.

use super::{ItemId, ItemKind, TriggerGraph};
use crate::context::TriggerContext;
use crate::error::Result;
use crate::syntax::{Flow, Statement};
use trellis_core::Ticks;

/// How a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The end of the chain was reached
    Finished,
    /// A standalone condition failed
    Stopped,
    /// A delay suspended the walk; continue at `resume` after `ticks`
    Suspended { resume: Option<ItemId>, ticks: Ticks },
}

/// Walk from `start` until the chain ends, a condition fails or a delay
/// suspends execution
pub fn walk(graph: &TriggerGraph, start: Option<ItemId>, ctx: &mut TriggerContext) -> Result<WalkOutcome> {
    let mut current = start;
    while let Some(id) = current {
        ctx.set_current_item(Some(id));
        let node = graph.node(id);
        current = match &node.kind {
            ItemKind::Statement(Statement::Condition(condition)) => {
                if !condition.check(ctx)? {
                    return Ok(WalkOutcome::Stopped);
                }
                node.next
            }
            ItemKind::Statement(Statement::Effect(effect)) => match effect.walk(ctx)? {
                Flow::Continue => node.next,
                Flow::Suspend(ticks) => {
                    return Ok(WalkOutcome::Suspended {
                        resume: node.next,
                        ticks,
                    })
                }
            },
            ItemKind::Conditional { branches } => {
                let mut chosen = None;
                for branch in branches {
                    let passes = match &branch.condition {
                        Some(condition) => condition.check(ctx)?,
                        None => true,
                    };
                    if passes {
                        chosen = Some(branch);
                        break;
                    }
                }
                chosen.and_then(|branch| branch.items.first().copied()).or(node.next)
            }
            ItemKind::Loop { expr, body } => {
                if !ctx.has_loop(id) {
                    let values = expr.iterate(ctx)?;
                    ctx.start_loop(id, values);
                }
                if ctx.advance_loop(id) {
                    body.first().copied().or(Some(id))
                } else {
                    ctx.end_loop(id);
                    node.next
                }
            }
            ItemKind::While { condition, body } => {
                if condition.check(ctx)? {
                    body.first().copied().or(Some(id))
                } else {
                    node.next
                }
            }
        };
    }
    ctx.set_current_item(None);
    Ok(WalkOutcome::Finished)
}
