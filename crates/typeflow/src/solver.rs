// ==============================================================================
// Visibility and combination solving
// ==============================================================================
//
// A query asks: can this set of bindings (the goals) all be in force at one
// CFG node on a single execution path? The solver walks backward from the
// query node. Goals justified at the current node are traded for their
// source bindings; the rest pull the search further upstream through the
// path finder. A goal set naming two bindings of one variable is
// contradictory (a variable holds one value per path), and nodes where a
// goal's sibling bindings are assigned are barriers, because passing them
// would overwrite the goal on the way down.
//
// States (node + sorted goal set) are memoized. A state is entered into the
// table as solved *before* its subgoals are explored: re-reaching it along
// a cycle means the answer is whatever it resolves to at the outer frame,
// so the inner hit reads true tentatively and the outer frame writes the
// final verdict. That keeps arbitrary CFG cycles terminating without
// poisoning other entries.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::metrics::{CacheMetrics, QueryMetrics, SolverMetrics};
use crate::pathfinder::PathFinder;
use crate::{BindingId, DataId, NodeId, Program, VariableId};

type GoalSet = BTreeSet<BindingId>;

/// A solving obligation: `goals` should all hold at `pos`. Goals are kept
/// sorted so equal obligations collide in the memo table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct State {
    pos: NodeId,
    goals: Box<[BindingId]>,
}

impl State {
    fn new(pos: NodeId, goals: impl IntoIterator<Item = BindingId>) -> Self {
        let mut sorted: Vec<BindingId> = goals.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        State {
            pos,
            goals: sorted.into_boxed_slice(),
        }
    }
}

/// One way to account for the goals at the current node: `consumed` were
/// justified right here (their sources joined the search), `remaining`
/// still need an upstream origin.
struct Expansion {
    consumed: GoalSet,
    remaining: GoalSet,
}

/// Enumerate every way to trade goals for their sources at `pos`.
///
/// Each goal with an origin at `pos` branches: once per such origin
/// (consuming the goal and queueing the origin's sources) and once keeping
/// the goal for upstream exploration. `seen` carries the already-consumed
/// bindings down each branch so self-referential origins cannot reinstate
/// a goal they were traded for.
fn expand_goals(
    program: &Program,
    pos: NodeId,
    pending: &GoalSet,
    kept: &GoalSet,
    seen: &GoalSet,
    consumed: &GoalSet,
    out: &mut Vec<Expansion>,
) {
    let Some(&goal) = pending.iter().next() else {
        out.push(Expansion {
            consumed: consumed.clone(),
            remaining: kept.clone(),
        });
        return;
    };
    let mut rest = pending.clone();
    rest.remove(&goal);

    let mut seen_here = seen.clone();
    seen_here.insert(goal);
    for origin in program.binding(goal).origins() {
        if origin.node() != pos {
            continue;
        }
        let mut next_pending = rest.clone();
        for &source in origin.sources() {
            if !seen_here.contains(&source) && !kept.contains(&source) {
                next_pending.insert(source);
            }
        }
        let mut next_consumed = consumed.clone();
        next_consumed.insert(goal);
        expand_goals(
            program,
            pos,
            &next_pending,
            kept,
            &seen_here,
            &next_consumed,
            out,
        );
    }

    // The goal may also stay open: another origin upstream can justify it.
    let mut next_kept = kept.clone();
    next_kept.insert(goal);
    expand_goals(program, pos, &rest, &next_kept, seen, consumed, out);
}

/// Query engine over one [`Program`].
///
/// Holds the state memo table and a [`PathFinder`] with its own caches;
/// both persist across queries, which is what makes repeated inference
/// queries cheap. Build a fresh solver after mutating the program.
pub struct Solver<'p> {
    program: &'p Program,
    strict: bool,
    finder: PathFinder,
    /// Memo table: a solved state maps to the node its search resolved
    /// at, an unsolvable one to `None`.
    solved_states: FxHashMap<State, Option<NodeId>>,
    state_stats: CacheMetrics,
    queries: Vec<QueryMetrics>,
}

impl<'p> Solver<'p> {
    /// A strict solver: bindings are visible only where control flow can
    /// actually carry them (entrypoint-constrained when one is set).
    pub fn new(program: &'p Program) -> Self {
        Self::with_strictness(program, true)
    }

    /// A lenient solver: answers whether a combination could ever apply,
    /// waiving reverse reachability and the entrypoint requirement while
    /// still rejecting contradictory bindings.
    pub fn new_lenient(program: &'p Program) -> Self {
        Self::with_strictness(program, false)
    }

    fn with_strictness(program: &'p Program, strict: bool) -> Self {
        Self {
            program,
            strict,
            finder: PathFinder::new(),
            solved_states: FxHashMap::default(),
            state_stats: CacheMetrics::default(),
            queries: Vec::new(),
        }
    }

    /// Whether some single execution path gives `pos` all of `goals` at
    /// once.
    pub fn solve(&mut self, goals: &[BindingId], pos: NodeId) -> bool {
        let state = State::new(pos, goals.iter().copied());
        let from_cache = self.solved_states.contains_key(&state);
        let shortcircuited = Self::goals_conflict(self.program, state.goals.iter().copied());
        let end = self.recall_or_find(state);
        let verdict = end.is_some();
        self.queries.push(QueryMetrics {
            start: pos,
            end,
            initial_goal_count: goals.len(),
            shortcircuited,
            from_cache,
        });
        trace!(?pos, goals = goals.len(), verdict, "solve");
        verdict
    }

    /// Whether `binding` can hold at `pos`.
    pub fn is_visible(&mut self, binding: BindingId, pos: NodeId) -> bool {
        self.solve(&[binding], pos)
    }

    /// `solve`, phrased from the node's point of view.
    pub fn has_combination(&mut self, pos: NodeId, goals: &[BindingId]) -> bool {
        self.solve(goals, pos)
    }

    /// Cheap necessary condition for `solve`: no two goals contradict and
    /// every goal has some origin backward-reachable from `pos`, ignoring
    /// shadowing and condition gates. A `false` here is definitive; a
    /// `true` still needs the full solve.
    pub fn can_have_combination(&mut self, pos: NodeId, goals: &[BindingId]) -> bool {
        if Self::goals_conflict(self.program, goals.iter().copied()) {
            return false;
        }
        let program = self.program;
        goals.iter().all(|&goal| {
            program
                .binding(goal)
                .origins()
                .iter()
                .any(|origin| self.finder.find_any_path(program, pos, origin.node(), &[]))
        })
    }

    /// The bindings of `variable` visible at `pos`, in insertion order.
    pub fn filter(&mut self, variable: VariableId, pos: NodeId) -> Vec<BindingId> {
        let bindings = self.program.variable(variable).bindings().to_vec();
        bindings
            .into_iter()
            .filter(|&binding| self.is_visible(binding, pos))
            .collect()
    }

    /// The data tokens of the bindings of `variable` visible at `pos`.
    pub fn filtered_data(&mut self, variable: VariableId, pos: NodeId) -> Vec<DataId> {
        self.filter(variable, pos)
            .into_iter()
            .map(|binding| self.program.binding(binding).data())
            .collect()
    }

    pub fn calculate_metrics(&self) -> SolverMetrics {
        let mut cache_metrics = vec![self.state_stats.snapshot(self.solved_states.len())];
        cache_metrics.extend(self.finder.cache_metrics());
        SolverMetrics {
            query_metrics: self.queries.clone(),
            cache_metrics,
        }
    }

    fn recall_or_find(&mut self, state: State) -> Option<NodeId> {
        if let Some(&end) = self.solved_states.get(&state) {
            self.state_stats.record_hit();
            return end;
        }
        self.state_stats.record_miss();
        // Tentatively mark the in-flight state solved at its own position.
        // A state reachable from itself holds exactly when it held at the
        // frame that first entered it, and that outer frame writes the
        // real verdict below.
        self.solved_states.insert(state.clone(), Some(state.pos));
        let end = self.find_solution(&state);
        self.solved_states.insert(state, end);
        end
    }

    /// Search for a solution of `state`, returning the node the goal
    /// chain bottomed out at, or `None` when there is no consistent path.
    fn find_solution(&mut self, state: &State) -> Option<NodeId> {
        let program = self.program;
        if Self::goals_conflict(program, state.goals.iter().copied()) {
            return None;
        }

        let pending: GoalSet = state.goals.iter().copied().collect();
        let empty = GoalSet::new();
        let mut expansions = Vec::new();
        expand_goals(
            program,
            state.pos,
            &pending,
            &empty,
            &empty,
            &empty,
            &mut expansions,
        );

        for expansion in &expansions {
            let all = expansion
                .consumed
                .iter()
                .chain(expansion.remaining.iter())
                .copied();
            if Self::goals_conflict(program, all) {
                continue;
            }
            if expansion.remaining.is_empty() {
                if self.entrypoint_reachable(state.pos) {
                    return Some(state.pos);
                }
                continue;
            }

            // Nodes assigning a sibling binding of any open goal would
            // overwrite that goal on the way down; treat them as walls.
            let blocked = self.assignment_nodes(&expansion.remaining);
            for &goal in &expansion.remaining {
                for origin in program.binding(goal).origins() {
                    let target = origin.node();
                    if target == state.pos {
                        continue;
                    }
                    let query =
                        self.finder
                            .find_node_backwards(program, state.pos, target, &blocked);
                    let next_goals: GoalSet = if query.path_exists {
                        let mut goals = expansion.remaining.clone();
                        for &gate in &query.path {
                            if let Some(condition) = program.node(gate).condition() {
                                goals.insert(condition);
                            }
                        }
                        goals
                    } else if !self.strict {
                        // Could the goals ever apply? Explore the origin
                        // even though control flow cannot reach it from
                        // here.
                        expansion.remaining.clone()
                    } else {
                        continue;
                    };
                    if let Some(end) = self.recall_or_find(State::new(target, next_goals)) {
                        return Some(end);
                    }
                }
            }
        }
        None
    }

    /// Every node at which a binding of an open goal's variable *other
    /// than the goal itself* is assigned.
    fn assignment_nodes(&self, goals: &GoalSet) -> Vec<NodeId> {
        let program = self.program;
        let mut nodes = BTreeSet::new();
        for &goal in goals {
            let variable = program.binding(goal).variable();
            for &other in program.variable(variable).bindings() {
                if other == goal {
                    continue;
                }
                for origin in program.binding(other).origins() {
                    nodes.insert(origin.node());
                }
            }
        }
        nodes.into_iter().collect()
    }

    fn entrypoint_reachable(&mut self, pos: NodeId) -> bool {
        if !self.strict {
            return true;
        }
        match self.program.entrypoint() {
            None => true,
            Some(entry) => self.finder.find_any_path(self.program, pos, entry, &[]),
        }
    }

    fn goals_conflict(program: &Program, goals: impl IntoIterator<Item = BindingId>) -> bool {
        let mut chosen: FxHashMap<VariableId, BindingId> = FxHashMap::default();
        for goal in goals {
            let variable = program.binding(goal).variable();
            match chosen.get(&variable) {
                Some(&other) if other != goal => return true,
                _ => {
                    chosen.insert(variable, goal);
                }
            }
        }
        false
    }
}

impl std::fmt::Debug for Solver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("strict", &self.strict)
            .field("solved_states", &self.solved_states.len())
            .finish()
    }
}
