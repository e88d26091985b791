use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{BindingId, DataHandle, DataId, NodeId, Program, VariableId};

/// The upstream bindings an origin depends on. Order is the order the
/// caller supplied, with duplicates dropped.
pub type SourceSet = SmallVec<[BindingId; 4]>;

/// One justification for a binding: at `node`, the binding holds provided
/// every source binding holds there too. An empty source set is an axiom.
#[derive(Debug, Clone)]
pub struct Origin {
    node: NodeId,
    sources: SourceSet,
}

impl Origin {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn sources(&self) -> &[BindingId] {
        &self.sources
    }

    pub fn is_axiom(&self) -> bool {
        self.sources.is_empty()
    }
}

/// A (variable, data) pair together with every justification recorded for
/// it. Origins accumulate in insertion order and are never removed.
#[derive(Debug, Clone)]
pub struct Binding {
    id: BindingId,
    variable: VariableId,
    data: DataId,
    origins: Vec<Origin>,
}

impl Binding {
    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn variable(&self) -> VariableId {
        self.variable
    }

    pub fn data(&self) -> DataId {
        self.data
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }
}

/// A program variable: an insertion-ordered set of bindings, at most one
/// per data token.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    bindings: Vec<BindingId>,
    by_data: FxHashMap<DataId, BindingId>,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn bindings(&self) -> &[BindingId] {
        &self.bindings
    }

    pub fn binding_for(&self, data: DataId) -> Option<BindingId> {
        self.by_data.get(&data).copied()
    }
}

impl Program {
    pub fn new_variable(&mut self) -> VariableId {
        let id = VariableId::from(self.variables.len());
        self.variables.push(Variable {
            id,
            bindings: Vec::new(),
            by_data: FxHashMap::default(),
        });
        id
    }

    /// Record that `variable` may hold `data` at `node`, justified by
    /// `sources` holding there. Returns the binding for (variable, data),
    /// creating it on first sight and otherwise appending one more origin
    /// to the existing one: calling this twice with the same arguments
    /// yields a single binding carrying both origins.
    ///
    /// Sources must be bindings previously created in this program.
    pub fn add_binding(
        &mut self,
        variable: VariableId,
        data: &DataHandle,
        node: NodeId,
        sources: &[BindingId],
    ) -> BindingId {
        assert!(
            usize::from(node) < self.nodes.len(),
            "origin node {node:?} does not belong to this program"
        );
        let mut source_set = SourceSet::new();
        for &source in sources {
            assert!(
                usize::from(source) < self.bindings.len(),
                "source {source:?} does not reference an existing binding"
            );
            if !source_set.contains(&source) {
                source_set.push(source);
            }
        }

        let data = self.registry.intern(data);
        let binding = match self.variables[usize::from(variable)].by_data.get(&data) {
            Some(&existing) => existing,
            None => {
                let id = BindingId::from(self.bindings.len());
                self.bindings.push(Binding {
                    id,
                    variable,
                    data,
                    origins: Vec::new(),
                });
                let var = &mut self.variables[usize::from(variable)];
                var.bindings.push(id);
                var.by_data.insert(data, id);
                id
            }
        };
        self.bindings[usize::from(binding)].origins.push(Origin {
            node,
            sources: source_set,
        });
        binding
    }

    /// Copy `binding`'s value into `target` at `node`. The new origin is
    /// sourced on the copied binding (plus `additional_sources`), so the
    /// copy is only visible where the original can hold.
    pub fn paste_binding(
        &mut self,
        target: VariableId,
        binding: BindingId,
        node: NodeId,
        additional_sources: &[BindingId],
    ) -> BindingId {
        let mut sources = Vec::with_capacity(additional_sources.len() + 1);
        sources.push(binding);
        sources.extend_from_slice(additional_sources);
        let data = Rc::clone(self.data(self.binding(binding).data()));
        self.add_binding(target, &data, node, &sources)
    }

    /// Copy every binding of `source` into `target` at `node`, each one
    /// sourced on its original.
    pub fn paste_variable(
        &mut self,
        target: VariableId,
        source: VariableId,
        node: NodeId,
        additional_sources: &[BindingId],
    ) {
        for binding in self.variable(source).bindings().to_vec() {
            self.paste_binding(target, binding, node, additional_sources);
        }
    }

    /// All bindings of `variable`, in insertion order.
    pub fn bindings(&self, variable: VariableId) -> &[BindingId] {
        self.variable(variable).bindings()
    }

    /// The data tokens of every binding of `variable`, regardless of where
    /// (or whether) the bindings are visible.
    pub fn variable_data(&self, variable: VariableId) -> Vec<DataId> {
        self.variable(variable)
            .bindings()
            .iter()
            .map(|&b| self.binding(b).data())
            .collect()
    }
}
