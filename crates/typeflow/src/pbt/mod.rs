//! Property tests over randomly generated graphs and binding histories.

use std::rc::Rc;

use proptest::prelude::{
    any, prop, prop_assert, prop_assert_eq, proptest, ProptestConfig, Strategy,
};
use proptest::sample::Index;

use crate::{BindingId, DataHandle, NodeId, PathFinder, Program, Solver, VariableId};

const VARIABLE_POOL: usize = 3;
const DATA_POOL: usize = 4;

/// Blueprint for one program: node count, arbitrary edges (cycles and
/// self-loops included), and a binding history whose sources only ever
/// point at earlier entries.
#[derive(Debug, Clone)]
struct ProgramPlan {
    node_count: usize,
    edges: Vec<(Index, Index)>,
    bindings: Vec<(Index, Index, Index, Vec<Index>)>,
}

fn arb_program() -> impl Strategy<Value = ProgramPlan> {
    (2usize..9)
        .prop_flat_map(|node_count| {
            (
                prop::collection::vec((any::<Index>(), any::<Index>()), 0..node_count * 2),
                prop::collection::vec(
                    (
                        any::<Index>(),
                        any::<Index>(),
                        any::<Index>(),
                        prop::collection::vec(any::<Index>(), 0..3),
                    ),
                    0..10,
                ),
            )
                .prop_map(move |(edges, bindings)| ProgramPlan {
                    node_count,
                    edges,
                    bindings,
                })
        })
        .no_shrink()
}

struct Built {
    program: Program,
    nodes: Vec<NodeId>,
    variables: Vec<VariableId>,
    handles: Vec<DataHandle>,
    bindings: Vec<BindingId>,
}

fn build(plan: &ProgramPlan) -> Built {
    let mut program = Program::new();
    let nodes: Vec<NodeId> = (0..plan.node_count)
        .map(|i| program.new_node(&format!("n{i}")))
        .collect();
    for (from, to) in &plan.edges {
        program.connect(nodes[from.index(nodes.len())], nodes[to.index(nodes.len())]);
    }
    let variables: Vec<VariableId> = (0..VARIABLE_POOL).map(|_| program.new_variable()).collect();
    let handles: Vec<DataHandle> = (0..DATA_POOL)
        .map(|i| Rc::new(i.to_string()) as DataHandle)
        .collect();
    let bindings = replay(&mut program, plan, &nodes, &variables, &handles);
    Built {
        program,
        nodes,
        variables,
        handles,
        bindings,
    }
}

/// Run the binding history against `program`, resolving each source index
/// against the bindings created so far.
fn replay(
    program: &mut Program,
    plan: &ProgramPlan,
    nodes: &[NodeId],
    variables: &[VariableId],
    handles: &[DataHandle],
) -> Vec<BindingId> {
    let mut created = Vec::new();
    for (variable, data, node, sources) in &plan.bindings {
        let sources: Vec<BindingId> = if created.is_empty() {
            Vec::new()
        } else {
            sources
                .iter()
                .map(|ix| created[ix.index(created.len())])
                .collect()
        };
        let id = program.add_binding(
            variables[variable.index(variables.len())],
            &handles[data.index(handles.len())],
            nodes[node.index(nodes.len())],
            &sources,
        );
        created.push(id);
    }
    created
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn filtered_data_is_a_subset_of_data(plan in arb_program(), node in any::<Index>()) {
        let built = build(&plan);
        let node = built.nodes[node.index(built.nodes.len())];
        for &variable in &built.variables {
            let all = built.program.variable_data(variable);
            let strict = built.program.filtered_data(variable, node, true);
            let lenient = built.program.filtered_data(variable, node, false);
            for data in &strict {
                prop_assert!(all.contains(data));
                // Dropping the reachability requirement can only widen the
                // answer.
                prop_assert!(lenient.contains(data));
            }
            for data in &lenient {
                prop_assert!(all.contains(data));
            }
        }
    }

    #[test]
    fn any_path_agrees_with_shortest_path(plan in arb_program()) {
        let built = build(&plan);
        let mut finder = PathFinder::new();
        for &start in &built.nodes {
            for &finish in &built.nodes {
                let reachable = finder.find_any_path(&built.program, start, finish, &[]);
                let shortest = finder.find_shortest_path(&built.program, start, finish, &[]);
                prop_assert_eq!(reachable, shortest.is_some());
                if let Some(path) = shortest {
                    prop_assert_eq!(path.first(), Some(&start));
                    prop_assert_eq!(path.last(), Some(&finish));
                }
            }
        }
    }

    #[test]
    fn queries_are_deterministic(plan in arb_program(), node in any::<Index>()) {
        let built = build(&plan);
        let node = built.nodes[node.index(built.nodes.len())];
        let mut first = Solver::new(&built.program);
        let mut second = Solver::new(&built.program);
        for &variable in &built.variables {
            prop_assert_eq!(
                first.filtered_data(variable, node),
                second.filtered_data(variable, node)
            );
        }
        if !built.bindings.is_empty() {
            let verdict = first.solve(&built.bindings, node);
            prop_assert_eq!(verdict, second.solve(&built.bindings, node));
            // And stable across repeats on a warm solver.
            prop_assert_eq!(verdict, first.solve(&built.bindings, node));
        }
    }

    #[test]
    fn visibility_is_stable_under_unrelated_growth(plan in arb_program(), node in any::<Index>()) {
        let Built {
            mut program,
            nodes,
            variables,
            bindings,
            ..
        } = build(&plan);
        let node = nodes[node.index(nodes.len())];
        let filtered_before: Vec<_> = variables
            .iter()
            .map(|&v| program.filtered_data(v, node, true))
            .collect();
        let visible_before: Vec<bool> = bindings
            .iter()
            .map(|&b| program.is_visible(b, node))
            .collect();
        let combined_before = program.has_combination(node, &bindings);

        // Grow every variable on an island node no path touches. None of
        // the recorded answers may move: the island is on no backward
        // path, so it neither justifies nor shadows anything at `node`.
        let island = program.new_node("island");
        let fresh: DataHandle = Rc::new("fresh".to_string());
        for &variable in &variables {
            program.add_binding(variable, &fresh, island, &[]);
        }

        let filtered_after: Vec<_> = variables
            .iter()
            .map(|&v| program.filtered_data(v, node, true))
            .collect();
        prop_assert_eq!(filtered_before, filtered_after);
        for (i, &b) in bindings.iter().enumerate() {
            prop_assert_eq!(visible_before[i], program.is_visible(b, node));
        }
        prop_assert_eq!(combined_before, program.has_combination(node, &bindings));
    }

    #[test]
    fn replayed_binding_history_is_idempotent(plan in arb_program()) {
        let Built {
            mut program,
            nodes,
            variables,
            handles,
            bindings,
        } = build(&plan);
        let count_before = program.binding_count();
        let origin_counts: Vec<usize> = bindings
            .iter()
            .map(|&b| program.binding(b).origins().len())
            .collect();
        let replayed = replay(&mut program, &plan, &nodes, &variables, &handles);
        prop_assert_eq!(&bindings, &replayed);
        prop_assert_eq!(program.binding_count(), count_before);
        // Origins accumulate, one per replayed call.
        for (i, &b) in bindings.iter().enumerate() {
            let grew = program.binding(b).origins().len() - origin_counts[i];
            prop_assert_eq!(grew, bindings.iter().filter(|&&other| other == b).count());
        }
    }
}
