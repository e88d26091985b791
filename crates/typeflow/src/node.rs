use smol_str::SmolStr;

use crate::{BindingId, NodeId, Program};

/// One node of the control-flow graph.
///
/// Edges are simple (connecting the same pair twice is a no-op) and
/// self-loops are allowed. Incoming and outgoing lists are kept symmetric
/// and preserve connection order. A node may carry a condition binding:
/// backward traversals entering the node must be able to discharge it.
#[derive(Debug, Clone)]
pub struct CfgNode {
    id: NodeId,
    name: SmolStr,
    outgoing: Vec<NodeId>,
    incoming: Vec<NodeId>,
    condition: Option<BindingId>,
}

impl CfgNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outgoing(&self) -> &[NodeId] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[NodeId] {
        &self.incoming
    }

    pub fn condition(&self) -> Option<BindingId> {
        self.condition
    }
}

impl Program {
    /// Create an unconditioned node.
    pub fn new_node(&mut self, name: &str) -> NodeId {
        self.alloc_node(name, None)
    }

    /// Create a node guarded by `condition`: backward searches may only
    /// pass through it where the condition binding can hold.
    pub fn new_node_with_condition(&mut self, name: &str, condition: BindingId) -> NodeId {
        assert!(
            usize::from(condition) < self.binding_count(),
            "condition {condition:?} does not belong to this program"
        );
        self.alloc_node(name, Some(condition))
    }

    fn alloc_node(&mut self, name: &str, condition: Option<BindingId>) -> NodeId {
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(CfgNode {
            id,
            name: SmolStr::new(name),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            condition,
        });
        id
    }

    /// Add the edge `from -> to`. Duplicate edges are ignored.
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        assert!(
            usize::from(from) < self.nodes.len() && usize::from(to) < self.nodes.len(),
            "edge {from:?} -> {to:?} references a node outside this program"
        );
        if self.nodes[usize::from(from)].outgoing.contains(&to) {
            return;
        }
        self.nodes[usize::from(from)].outgoing.push(to);
        self.nodes[usize::from(to)].incoming.push(from);
    }

    /// Create a new node and connect `from` to it.
    pub fn connect_new(&mut self, from: NodeId, name: &str) -> NodeId {
        let to = self.new_node(name);
        self.connect(from, to);
        to
    }

    /// Create a new conditioned node and connect `from` to it.
    pub fn connect_new_with_condition(
        &mut self,
        from: NodeId,
        name: &str,
        condition: BindingId,
    ) -> NodeId {
        let to = self.new_node_with_condition(name, condition);
        self.connect(from, to);
        to
    }

    /// Designate the root node of the graph. When set, a binding is only
    /// visible at a point the entrypoint can reach.
    pub fn set_entrypoint(&mut self, node: NodeId) {
        assert!(
            usize::from(node) < self.nodes.len(),
            "entrypoint {node:?} does not belong to this program"
        );
        self.entrypoint = Some(node);
    }

    pub fn entrypoint(&self) -> Option<NodeId> {
        self.entrypoint
    }
}
