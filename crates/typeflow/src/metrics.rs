//! Snapshot metrics for the typegraph and its query caches.
//!
//! The metric types capture no graph objects, only counts and ids, so a
//! snapshot can outlive the program it was taken from.

use crate::{NodeId, Program, VariableId};

/// Edge and condition counts for one CFG node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetrics {
    pub incoming_edge_count: usize,
    pub outgoing_edge_count: usize,
    pub has_condition: bool,
}

/// Binding shape of one variable: how many bindings it carries and the
/// nodes its origins were recorded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMetrics {
    pub variable: VariableId,
    pub binding_count: usize,
    pub node_ids: Vec<NodeId>,
}

/// One top-level solver query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMetrics {
    /// Node the query was asked at.
    pub start: NodeId,
    /// Node the search resolved at, where the last goals were consumed;
    /// `None` when no solution exists.
    pub end: Option<NodeId>,
    pub initial_goal_count: usize,
    /// The goals conflicted outright, no search happened.
    pub shortcircuited: bool,
    pub from_cache: bool,
}

/// Hit/miss counters for one memo table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub total_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn snapshot(&self, total_size: usize) -> CacheMetrics {
        CacheMetrics {
            total_size,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Everything a solver can report: its queries plus the state of its memo
/// tables (solved states, any-path cache, backward cache, in that order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverMetrics {
    pub query_metrics: Vec<QueryMetrics>,
    pub cache_metrics: Vec<CacheMetrics>,
}

/// Whole-program snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub binding_count: usize,
    pub cfg_node_metrics: Vec<NodeMetrics>,
    pub variable_metrics: Vec<VariableMetrics>,
}

impl Program {
    pub fn calculate_metrics(&self) -> Metrics {
        let cfg_node_metrics = self
            .nodes()
            .map(|node| NodeMetrics {
                incoming_edge_count: node.incoming().len(),
                outgoing_edge_count: node.outgoing().len(),
                has_condition: node.condition().is_some(),
            })
            .collect();
        let variable_metrics = self
            .variables()
            .map(|variable| {
                let node_ids = variable
                    .bindings()
                    .iter()
                    .flat_map(|&b| self.binding(b).origins())
                    .map(|origin| origin.node())
                    .collect();
                VariableMetrics {
                    variable: variable.id(),
                    binding_count: variable.bindings().len(),
                    node_ids,
                }
            })
            .collect();
        Metrics {
            binding_count: self.binding_count(),
            cfg_node_metrics,
            variable_metrics,
        }
    }
}
