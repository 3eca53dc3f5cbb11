//! Outgoing routes of compiled nodes.
//!
//! Each node compiles to exactly one [`Route`]. After a node continues
//! normally, the runtime asks its route for the next node; `None` ends the
//! run.

use crate::engine::vertex::VertexId;
use crate::state::ExecutionState;

use super::condition::{evaluate, Condition};

/// A guarded edge within a [`Route::Conditional`] router
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalEdge {
    /// Target node; `None` for an edge into END
    pub target: Option<VertexId>,
    /// Guard; `None` marks the default edge
    pub condition: Option<Condition>,
    pub priority: i32,
}

/// How execution leaves a node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Route {
    /// No outgoing connection: the run ends here
    #[default]
    End,

    /// Single unconditional connection
    Direct(VertexId),

    /// Condition node: follow `yes` when `conditionResult` is true, else `no`.
    /// A missing branch ends the run.
    Branch {
        yes: Option<VertexId>,
        no: Option<VertexId>,
    },

    /// Guarded edges in ascending priority; the first match wins, the
    /// unconditional edge is the fallback, no match ends the run.
    Conditional(Vec<ConditionalEdge>),
}

impl Route {
    /// Build a conditional router, sorting edges by priority (stable).
    pub fn conditional(mut edges: Vec<ConditionalEdge>) -> Self {
        edges.sort_by_key(|edge| edge.priority);
        Route::Conditional(edges)
    }

    /// Pick the next node for a state. `None` terminates.
    pub fn next(&self, state: &ExecutionState) -> Option<VertexId> {
        match self {
            Route::End => None,
            Route::Direct(target) => Some(target.clone()),
            Route::Branch { yes, no } => {
                if state.condition_result.unwrap_or(false) {
                    yes.clone()
                } else {
                    no.clone()
                }
            }
            Route::Conditional(edges) => {
                let matched = edges.iter().find(|edge| {
                    edge.condition
                        .as_ref()
                        .is_some_and(|condition| evaluate(state, condition))
                });
                let fallback = || edges.iter().find(|edge| edge.condition.is_none());
                matched.or_else(fallback).and_then(|edge| edge.target.clone())
            }
        }
    }

    /// Whether following this route consumes `conditionResult`
    pub fn consumes_condition_result(&self) -> bool {
        matches!(self, Route::Branch { .. })
    }

    /// Every `(target, label)` pair this route can take; `None` target is END.
    pub fn edges(&self) -> Vec<(Option<VertexId>, Option<String>)> {
        match self {
            Route::End => Vec::new(),
            Route::Direct(target) => vec![(Some(target.clone()), None)],
            Route::Branch { yes, no } => vec![
                (yes.clone(), Some("yes".to_string())),
                (no.clone(), Some("no".to_string())),
            ],
            Route::Conditional(edges) => edges
                .iter()
                .map(|edge| {
                    let label = edge
                        .condition
                        .as_ref()
                        .map(Condition::label)
                        .unwrap_or_else(|| "default".to_string());
                    (edge.target.clone(), Some(label))
                })
                .collect(),
        }
    }
}
