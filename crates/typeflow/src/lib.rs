mod binding;
pub mod metrics;
mod node;
mod pathfinder;
mod registry;
mod solver;


#[cfg(test)]
mod pbt;

pub use binding::{Binding, Origin, SourceSet, Variable};
pub use node::CfgNode;
pub use pathfinder::{PathFinder, QueryResult};
pub use registry::{DataHandle, DataRegistry};
pub use solver::Solver;

macro_rules! graph_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            derive_more::Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
        )]
        #[debug("{}({_0})", stringify!($name))]
        pub struct $name(u32);

        impl From<u32> for $name {
            #[inline]
            fn from(value: u32) -> Self {
                $name(value)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(value: usize) -> Self {
                $name(value as u32)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(value: $name) -> Self {
                value.0 as usize
            }
        }
    };
}

graph_id!(
    /// Identity of a control-flow node within its [`Program`].
    /// Assigned monotonically in creation order.
    NodeId
);
graph_id!(
    /// Identity of a [`Variable`] within its [`Program`].
    VariableId
);
graph_id!(
    /// Identity of a [`Binding`] within its [`Program`].
    BindingId
);
graph_id!(
    /// Canonical token for an opaque client data handle, produced by the
    /// program's [`DataRegistry`]. Token equality is handle identity.
    DataId
);

/// Owner of one complete typegraph: the control-flow nodes, the variables
/// with their bindings, and the registry of client data handles. All
/// entities live in program-owned slots addressed by integer ids; dropping
/// the program tears everything down in bulk.
///
/// A program is single-threaded: build the graph, then query it through a
/// [`Solver`] (or the uncached convenience wrappers below). Mutating the
/// graph invalidates any solver or [`PathFinder`] built before the
/// mutation.
pub struct Program {
    registry: DataRegistry,
    nodes: Vec<CfgNode>,
    variables: Vec<Variable>,
    bindings: Vec<Binding>,
    entrypoint: Option<NodeId>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            registry: DataRegistry::new(),
            nodes: Vec::new(),
            variables: Vec::new(),
            bindings: Vec::new(),
            entrypoint: None,
        }
    }

    /// Canonical token for a client handle, interning it on first sight.
    /// Two calls with the same allocation yield the same token; equal but
    /// distinct allocations yield distinct tokens.
    pub fn as_data(&mut self, handle: &DataHandle) -> DataId {
        self.registry.intern(handle)
    }

    /// The handle behind a token. Hosts may downcast it; this crate never
    /// inspects it.
    pub fn data(&self, id: DataId) -> &DataHandle {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &DataRegistry {
        &self.registry
    }

    pub fn node(&self, id: NodeId) -> &CfgNode {
        &self.nodes[usize::from(id)]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CfgNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[usize::from(id)]
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[usize::from(id)]
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// A fresh strict solver over the current graph. The solver carries the
    /// memo caches, so hosts that issue many queries should keep it alive
    /// between them and discard it when the graph changes.
    pub fn solver(&self) -> Solver<'_> {
        Solver::new(self)
    }

    // --------------------------------------------------------------------
    // Uncached query conveniences. Each builds a throwaway solver; fine
    // for one-off queries, wasteful in a loop.
    // --------------------------------------------------------------------

    /// Whether `binding` can hold at `node` on some consistent path.
    pub fn is_visible(&self, binding: BindingId, node: NodeId) -> bool {
        self.solver().is_visible(binding, node)
    }

    /// Whether all of `bindings` can hold at `node` simultaneously.
    pub fn has_combination(&self, node: NodeId, bindings: &[BindingId]) -> bool {
        self.solver().solve(bindings, node)
    }

    /// The bindings of `variable` visible at `node`. With `strict` off the
    /// reachability requirement is waived: a binding counts if its origin
    /// chain is self-consistent anywhere upstream.
    pub fn filter(&self, variable: VariableId, node: NodeId, strict: bool) -> Vec<BindingId> {
        self.make_solver(strict).filter(variable, node)
    }

    /// Data tokens of the bindings of `variable` visible at `node`.
    pub fn filtered_data(&self, variable: VariableId, node: NodeId, strict: bool) -> Vec<DataId> {
        self.make_solver(strict).filtered_data(variable, node)
    }

    fn make_solver(&self, strict: bool) -> Solver<'_> {
        if strict {
            Solver::new(self)
        } else {
            Solver::new_lenient(self)
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("nodes", &self.nodes.len())
            .field("variables", &self.variables.len())
            .field("bindings", &self.bindings.len())
            .field("entrypoint", &self.entrypoint)
            .finish()
    }
}
