//! Graph Evaluation
//!
//! [`Graph`] classifies nodes, propagates dirtiness and runs the sweep that
//! settles every dirty node back to clean.
//!
//! # Algorithm
//!
//! A sweep runs in two passes:
//!
//! 1. Downstream: starting from every terminal node that is dirty, evaluate
//!    dirty ancestors first, then the node itself.
//! 2. Upstream: starting from every original node that is dirty, evaluate
//!    dirty descendants first, then the node itself.
//!
//! Each descent is a post-order walk over an explicit stack. A node is marked
//! clean by the graph right after its evaluate hook returns, so the dirty
//! flag is what keeps a node from being evaluated twice in one pass.
//!
//! Every node pushed onto the stack is stamped with the pass's visited id.
//! Reaching an input that still carries that stamp and is still dirty means
//! the input is on the active path, which can only happen in a cycle.
//!
//! The graph does not own nodes. It reaches them through [`NodeAccess`],
//! which is implemented by the arena that does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use super::node::{Classification, GraphDirection, NodeId, NodeState, SceneNode};
use crate::error::GraphError;

/// Access to node storage used by the graph.
pub trait NodeAccess {
    /// Get the graph bookkeeping of a node.
    fn scene_node(&self, id: NodeId) -> Option<&SceneNode>;

    /// Get the graph bookkeeping of a node mutably.
    fn scene_node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode>;

    /// Recompute the node's derived state for `direction`.
    ///
    /// Called only after every dirty input of the node has been evaluated.
    /// The graph clears the node's dirty flag when this returns.
    fn do_evaluate(&mut self, id: NodeId, direction: GraphDirection);
}

/// Identifier returned when registering an evaluated listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluateResult {
    /// Number of distinct nodes evaluated in either direction.
    pub node_count: usize,

    /// Wall time spent in the sweep.
    pub elapsed: Duration,
}

/// Payload handed to evaluated listeners.
#[derive(Debug)]
pub struct EvaluatedArgs<'a> {
    pub nodes: &'a IndexSet<NodeId>,
    pub result: EvaluateResult,
}

type EvaluatedListener = Box<dyn FnMut(&EvaluatedArgs<'_>)>;

/// A stack frame of the post-order descent.
struct Frame {
    id: NodeId,
    inputs: SmallVec<[NodeId; 8]>,
    next: usize,
}

impl Frame {
    fn new(id: NodeId, node: &SceneNode, direction: GraphDirection) -> Self {
        Self {
            id,
            inputs: node.inputs(direction).iter().copied().collect(),
            next: 0,
        }
    }
}

/// The dependency graph: classification sets, traversal ids and the sweep.
pub struct Graph {
    /// Nodes with no ancestors.
    original: IndexSet<NodeId>,

    /// Nodes with both ancestors and descendants.
    intermediate: IndexSet<NodeId>,

    /// Nodes with ancestors but no descendants.
    terminal: IndexSet<NodeId>,

    /// Counter handed out by `assign_visited_id`.
    next_id: u32,

    /// Nodes touched by the most recent sweep.
    evaluated: IndexSet<NodeId>,

    listeners: IndexMap<ListenerId, EvaluatedListener>,

    /// Sweeps longer than this are reported at warn level.
    slow_sweep: Duration,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            original: IndexSet::new(),
            intermediate: IndexSet::new(),
            terminal: IndexSet::new(),
            next_id: 1,
            evaluated: IndexSet::new(),
            listeners: IndexMap::new(),
            slow_sweep: Duration::from_millis(100),
        }
    }

    /// Set the threshold above which a sweep is logged as slow.
    pub fn set_slow_sweep_threshold(&mut self, threshold: Duration) {
        self.slow_sweep = threshold;
    }

    pub fn original_nodes(&self) -> &IndexSet<NodeId> {
        &self.original
    }

    pub fn intermediate_nodes(&self) -> &IndexSet<NodeId> {
        &self.intermediate
    }

    pub fn terminal_nodes(&self) -> &IndexSet<NodeId> {
        &self.terminal
    }

    /// Nodes evaluated by the most recent sweep.
    pub fn evaluated_nodes(&self) -> &IndexSet<NodeId> {
        &self.evaluated
    }

    /// Get the total number of classified nodes.
    pub fn node_count(&self) -> usize {
        self.original.len() + self.intermediate.len() + self.terminal.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.classification(id).is_some()
    }

    /// Which set the node currently belongs to, if any.
    pub fn classification(&self, id: NodeId) -> Option<Classification> {
        if self.original.contains(&id) {
            Some(Classification::Original)
        } else if self.intermediate.contains(&id) {
            Some(Classification::Intermediate)
        } else if self.terminal.contains(&id) {
            Some(Classification::Terminal)
        } else {
            None
        }
    }

    fn all_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.original
            .iter()
            .chain(self.intermediate.iter())
            .chain(self.terminal.iter())
            .copied()
    }

    /// Move a node into the set matching its current edges.
    pub fn classify<N: NodeAccess>(&mut self, nodes: &N, id: NodeId) {
        let Some(node) = nodes.scene_node(id) else {
            return;
        };

        self.original.shift_remove(&id);
        self.intermediate.shift_remove(&id);
        self.terminal.shift_remove(&id);

        match node.classification() {
            Classification::Original => self.original.insert(id),
            Classification::Intermediate => self.intermediate.insert(id),
            Classification::Terminal => self.terminal.insert(id),
        };
    }

    /// Register a node with the graph and mark it dirty.
    pub fn add_node<N: NodeAccess>(&mut self, nodes: &mut N, id: NodeId) {
        self.classify(nodes, id);

        if let Some(node) = nodes.scene_node_mut(id) {
            node.set_attached(true);
            node.set_visited_id(0);
        }

        self.dirty(nodes, id);
    }

    /// Unregister a node. Its edges are left untouched.
    pub fn remove_node<N: NodeAccess>(&mut self, nodes: &mut N, id: NodeId) {
        self.original.shift_remove(&id);
        self.intermediate.shift_remove(&id);
        self.terminal.shift_remove(&id);
        self.evaluated.shift_remove(&id);

        if let Some(node) = nodes.scene_node_mut(id) {
            node.set_attached(false);
        }
    }

    /// Detach every node and clear all graph state.
    pub fn reset<N: NodeAccess>(&mut self, nodes: &mut N) {
        let ids: Vec<NodeId> = self.all_nodes().collect();
        for id in ids {
            if let Some(node) = nodes.scene_node_mut(id) {
                node.set_attached(false);
            }
        }

        self.original.clear();
        self.intermediate.clear();
        self.terminal.clear();
        self.evaluated.clear();
        self.next_id = 1;
    }

    /// Add an edge: `descendant` depends on `ancestor`.
    ///
    /// Both ends are reclassified. Returns false if the edge already existed
    /// or either node is missing.
    pub fn add_edge<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> bool {
        if nodes.scene_node(ancestor).is_none() || nodes.scene_node(descendant).is_none() {
            return false;
        }

        let mut added = false;
        if let Some(node) = nodes.scene_node_mut(ancestor) {
            added |= node.add_descendant(descendant);
        }
        if let Some(node) = nodes.scene_node_mut(descendant) {
            added |= node.add_ancestor(ancestor);
        }

        self.reclassify_attached(nodes, ancestor);
        self.reclassify_attached(nodes, descendant);
        added
    }

    /// Remove an edge. Both ends are reclassified.
    pub fn remove_edge<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> bool {
        let mut removed = false;
        if let Some(node) = nodes.scene_node_mut(ancestor) {
            removed |= node.remove_descendant(descendant);
        }
        if let Some(node) = nodes.scene_node_mut(descendant) {
            removed |= node.remove_ancestor(ancestor);
        }

        self.reclassify_attached(nodes, ancestor);
        self.reclassify_attached(nodes, descendant);
        removed
    }

    fn reclassify_attached<N: NodeAccess>(&mut self, nodes: &N, id: NodeId) {
        if nodes.scene_node(id).is_some_and(SceneNode::is_attached) {
            self.classify(nodes, id);
        }
    }

    /// Advance the visited counter and return it.
    ///
    /// When the counter wraps to zero, every node's visited id is reset first
    /// so that stale stamps cannot collide with new ones.
    pub fn assign_visited_id<N: NodeAccess>(&mut self, nodes: &mut N) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == 0 {
            self.reset_visited_ids(nodes);
        }
        self.next_id
    }

    /// The current value of the visited counter.
    pub fn visited_counter(&self) -> u32 {
        self.next_id
    }

    /// Reset the visited id of every classified node to zero.
    pub fn reset_visited_ids<N: NodeAccess>(&mut self, nodes: &mut N) {
        debug!(nodes = self.node_count(), "resetting visited ids");
        let ids: Vec<NodeId> = self.all_nodes().collect();
        for id in ids {
            if let Some(node) = nodes.scene_node_mut(id) {
                node.set_visited_id(0);
            }
        }
    }

    /// A visited id usable as a pass stamp. Never zero, since zero is the
    /// value every node is reset to.
    fn assign_pass_id<N: NodeAccess>(&mut self, nodes: &mut N) -> u32 {
        match self.assign_visited_id(nodes) {
            0 => self.assign_visited_id(nodes),
            id => id,
        }
    }

    /// Mark a node dirty in both directions and propagate.
    ///
    /// Returns the number of nodes newly marked across both directions.
    pub fn dirty<N: NodeAccess>(&mut self, nodes: &mut N, id: NodeId) -> u32 {
        GraphDirection::ALL
            .iter()
            .map(|&direction| self.dirty_node(nodes, id, direction))
            .sum()
    }

    /// Mark a node and everything reachable from it in `direction` dirty.
    ///
    /// See [`mark_dirty`].
    pub fn dirty_node<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        id: NodeId,
        direction: GraphDirection,
    ) -> u32 {
        mark_dirty(nodes, id, direction)
    }

    /// Whether `to` can be reached from `from` by following edges in
    /// `direction` (descendants for downstream, ancestors for upstream).
    pub fn is_reachable<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        from: NodeId,
        to: NodeId,
        direction: GraphDirection,
    ) -> bool {
        let stamp = self.assign_pass_id(nodes);
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let Some(node) = nodes.scene_node_mut(current) else {
                continue;
            };
            if node.visited_id() == stamp {
                continue;
            }
            node.set_visited_id(stamp);

            let next = match direction {
                GraphDirection::Downstream => node.descendants(),
                GraphDirection::Upstream => node.ancestors(),
            };
            stack.extend(next.iter().copied());
        }

        false
    }

    /// Register a listener called after every non-silent sweep.
    pub fn on_evaluated(&mut self, listener: impl FnMut(&EvaluatedArgs<'_>) + 'static) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Unregister an evaluated listener.
    pub fn remove_evaluated_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    /// Settle every dirty node.
    ///
    /// Listeners are notified unless `silent` is set. On a cycle the sweep
    /// stops and the nodes evaluated so far stay clean.
    pub fn evaluate_graph<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        silent: bool,
    ) -> Result<EvaluateResult, GraphError> {
        let _span = tracing::debug_span!("evaluate_graph", silent).entered();
        let start = Instant::now();

        self.evaluated.clear();

        // Isolated nodes are classified original but still need a downstream pass
        let downstream_roots: Vec<NodeId> = self
            .terminal
            .iter()
            .chain(self.original.iter().filter(|id| {
                nodes
                    .scene_node(**id)
                    .is_some_and(|n| n.descendants().is_empty())
            }))
            .copied()
            .collect();
        self.evaluate_pass(nodes, &downstream_roots, GraphDirection::Downstream)?;

        let upstream_roots: Vec<NodeId> = self.original.iter().copied().collect();
        self.evaluate_pass(nodes, &upstream_roots, GraphDirection::Upstream)?;

        let result = EvaluateResult {
            node_count: self.evaluated.len(),
            elapsed: start.elapsed(),
        };

        if result.elapsed > self.slow_sweep {
            warn!(
                nodes = result.node_count,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "slow graph evaluation"
            );
        } else {
            debug!(nodes = result.node_count, "graph evaluated");
        }

        if !silent {
            let args = EvaluatedArgs {
                nodes: &self.evaluated,
                result,
            };
            for listener in self.listeners.values_mut() {
                listener(&args);
            }
        }

        Ok(result)
    }

    fn evaluate_pass<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        roots: &[NodeId],
        direction: GraphDirection,
    ) -> Result<(), GraphError> {
        let pass = self.assign_pass_id(nodes);

        for &root in roots {
            if nodes.scene_node(root).is_some_and(|n| n.is_dirty(direction)) {
                self.evaluate(nodes, root, direction, pass)?;
            }
        }

        Ok(())
    }

    /// Evaluate `root` in `direction`, dirty inputs first.
    fn evaluate<N: NodeAccess>(
        &mut self,
        nodes: &mut N,
        root: NodeId,
        direction: GraphDirection,
        pass: u32,
    ) -> Result<(), GraphError> {
        let mut stack: Vec<Frame> = Vec::new();

        if let Some(node) = nodes.scene_node_mut(root) {
            node.set_visited_id(pass);
            stack.push(Frame::new(root, node, direction));
        }

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };

            match frame.inputs.get(frame.next).copied() {
                Some(input) => {
                    frame.next += 1;

                    let Some(node) = nodes.scene_node_mut(input) else {
                        continue;
                    };
                    if !node.is_dirty(direction) {
                        continue;
                    }
                    if node.visited_id() == pass {
                        error!(?input, ?direction, "cycle in dependency graph");
                        return Err(GraphError::CycleDetected {
                            node: input,
                            direction,
                        });
                    }

                    node.set_visited_id(pass);
                    stack.push(Frame::new(input, node, direction));
                }
                None => {
                    let id = frame.id;
                    stack.pop();

                    trace!(?id, ?direction, "evaluating node");
                    nodes.do_evaluate(id, direction);
                    if let Some(node) = nodes.scene_node_mut(id) {
                        node.set_state(direction, NodeState::Clean);
                    }
                    self.evaluated.insert(id);
                }
            }
        }

        Ok(())
    }
}

/// Mark a node and everything reachable from it in `direction` dirty.
///
/// Downstream follows descendants, upstream follows ancestors. A node is
/// flagged when it is pushed and only clean nodes are pushed, so each node is
/// queued at most once and the walk terminates even on a corrupted graph.
/// Returns the number of nodes newly marked.
///
/// A detached node only has its own flag set, and the count is zero.
pub(crate) fn mark_dirty<N: NodeAccess>(
    nodes: &mut N,
    id: NodeId,
    direction: GraphDirection,
) -> u32 {
    let Some(node) = nodes.scene_node_mut(id) else {
        return 0;
    };

    if !node.is_attached() {
        node.set_state(direction, NodeState::Dirty);
        return 0;
    }

    let mut count = 0;
    if !node.is_dirty(direction) {
        node.set_state(direction, NodeState::Dirty);
        count += 1;
    }

    let mut stack: Vec<NodeId> = vec![id];
    while let Some(current) = stack.pop() {
        let Some(node) = nodes.scene_node(current) else {
            continue;
        };

        // Propagate against the evaluation order: descendants downstream
        let next: SmallVec<[NodeId; 8]> = match direction {
            GraphDirection::Downstream => node.descendants().iter().copied().collect(),
            GraphDirection::Upstream => node.ancestors().iter().copied().collect(),
        };
        for other in next {
            if let Some(node) = nodes.scene_node_mut(other) {
                if !node.is_dirty(direction) {
                    node.set_state(direction, NodeState::Dirty);
                    count += 1;
                    stack.push(other);
                }
            }
        }
    }

    count
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Minimal node storage that records evaluation order.
    #[derive(Default)]
    struct MockStore {
        nodes: SlotMap<NodeId, SceneNode>,
        log: Vec<(NodeId, GraphDirection)>,
    }

    impl MockStore {
        fn insert(&mut self, name: &str) -> NodeId {
            self.nodes.insert(SceneNode::new(name))
        }

        fn position(&self, id: NodeId, direction: GraphDirection) -> Option<usize> {
            self.log.iter().position(|entry| *entry == (id, direction))
        }
    }

    impl NodeAccess for MockStore {
        fn scene_node(&self, id: NodeId) -> Option<&SceneNode> {
            self.nodes.get(id)
        }

        fn scene_node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
            self.nodes.get_mut(id)
        }

        fn do_evaluate(&mut self, id: NodeId, direction: GraphDirection) {
            self.log.push((id, direction));
        }
    }

    /// Build a -> b -> c, added to the graph in order.
    fn chain() -> (Graph, MockStore, [NodeId; 3]) {
        let mut graph = Graph::new();
        let mut store = MockStore::default();
        let a = store.insert("a");
        let b = store.insert("b");
        let c = store.insert("c");
        for id in [a, b, c] {
            graph.add_node(&mut store, id);
        }
        graph.add_edge(&mut store, a, b);
        graph.add_edge(&mut store, b, c);
        (graph, store, [a, b, c])
    }

    #[test]
    fn add_node_classifies_once() {
        let (graph, _store, [a, b, c]) = chain();

        assert_eq!(graph.classification(a), Some(Classification::Original));
        assert_eq!(graph.classification(b), Some(Classification::Intermediate));
        assert_eq!(graph.classification(c), Some(Classification::Terminal));
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn remove_node_keeps_edges() {
        let (mut graph, mut store, [a, b, _c]) = chain();

        graph.remove_node(&mut store, b);

        assert!(!graph.contains(b));
        assert!(!store.nodes[b].is_attached());
        assert!(store.nodes[b].ancestors().contains(&a));
    }

    #[test]
    fn remove_edge_reclassifies() {
        let (mut graph, mut store, [a, b, c]) = chain();

        graph.remove_edge(&mut store, b, c);

        assert_eq!(graph.classification(b), Some(Classification::Terminal));
        assert_eq!(graph.classification(c), Some(Classification::Original));
        assert!(store.nodes[a].descendants().contains(&b));
    }

    #[test]
    fn evaluation_order_respects_dependencies() {
        let (mut graph, mut store, [a, b, c]) = chain();

        let result = graph.evaluate_graph(&mut store, true).unwrap();
        assert_eq!(result.node_count, 3);

        let down = |s: &MockStore, id| s.position(id, GraphDirection::Downstream).unwrap();
        let up = |s: &MockStore, id| s.position(id, GraphDirection::Upstream).unwrap();

        assert!(down(&store, a) < down(&store, b));
        assert!(down(&store, b) < down(&store, c));
        assert!(up(&store, c) < up(&store, b));
        assert!(up(&store, b) < up(&store, a));
    }

    #[test]
    fn shared_ancestor_is_evaluated_once() {
        // a -> b, a -> c, b -> d, c -> d
        let mut graph = Graph::new();
        let mut store = MockStore::default();
        let [a, b, c, d] = ["a", "b", "c", "d"].map(|n| store.insert(n));
        for id in [a, b, c, d] {
            graph.add_node(&mut store, id);
        }
        graph.add_edge(&mut store, a, b);
        graph.add_edge(&mut store, a, c);
        graph.add_edge(&mut store, b, d);
        graph.add_edge(&mut store, c, d);

        graph.evaluate_graph(&mut store, true).unwrap();

        for id in [a, b, c, d] {
            for direction in GraphDirection::ALL {
                let hits = store.log.iter().filter(|e| **e == (id, direction)).count();
                assert_eq!(hits, 1);
            }
        }
    }

    #[test]
    fn second_sweep_is_empty() {
        let (mut graph, mut store, _) = chain();

        graph.evaluate_graph(&mut store, true).unwrap();
        let result = graph.evaluate_graph(&mut store, true).unwrap();

        assert_eq!(result.node_count, 0);
        assert!(graph.evaluated_nodes().is_empty());
    }

    #[test]
    fn dirty_counts_only_new_marks() {
        let (mut graph, mut store, [a, b, c]) = chain();
        graph.evaluate_graph(&mut store, true).unwrap();

        // a, b, c downstream plus a upstream
        assert_eq!(graph.dirty(&mut store, a), 4);
        assert_eq!(graph.dirty(&mut store, a), 0);

        assert!(store.nodes[c].is_dirty(GraphDirection::Downstream));
        assert!(!store.nodes[b].is_dirty(GraphDirection::Upstream));
    }

    #[test]
    fn dirty_marks_each_node_of_a_fan_out_once() {
        let mut graph = Graph::new();
        let mut store = MockStore::default();
        let hub = store.insert("hub");
        graph.add_node(&mut store, hub);
        let leaves: Vec<NodeId> = (0..500).map(|i| store.insert(&format!("leaf{i}"))).collect();
        for &leaf in &leaves {
            graph.add_node(&mut store, leaf);
            graph.add_edge(&mut store, hub, leaf);
        }
        graph.evaluate_graph(&mut store, true).unwrap();

        assert_eq!(
            graph.dirty_node(&mut store, hub, GraphDirection::Downstream),
            leaves.len() as u32 + 1
        );
        assert!(leaves
            .iter()
            .all(|&leaf| store.nodes[leaf].is_dirty(GraphDirection::Downstream)));

        // Each leaf points back at the same hub upstream
        graph.evaluate_graph(&mut store, true).unwrap();
        for &leaf in &leaves[..2] {
            graph.dirty_node(&mut store, leaf, GraphDirection::Upstream);
        }
        assert!(store.nodes[hub].is_dirty(GraphDirection::Upstream));
        assert!(!store.nodes[leaves[2]].is_dirty(GraphDirection::Upstream));
    }

    #[test]
    fn dirty_on_detached_node_sets_own_flags() {
        let mut graph = Graph::new();
        let mut store = MockStore::default();
        let a = store.insert("a");
        let b = store.insert("b");
        graph.add_edge(&mut store, a, b);
        store.nodes[a].set_state(GraphDirection::Downstream, NodeState::Clean);
        store.nodes[b].set_state(GraphDirection::Downstream, NodeState::Clean);

        assert_eq!(graph.dirty_node(&mut store, a, GraphDirection::Downstream), 0);
        assert!(store.nodes[a].is_dirty(GraphDirection::Downstream));
        assert!(!store.nodes[b].is_dirty(GraphDirection::Downstream));
    }

    #[test]
    fn cycle_is_reported() {
        let (mut graph, mut store, [a, _b, c]) = chain();
        graph.add_edge(&mut store, c, a);
        // The cycle leaves no original or terminal nodes, so give it an entry point
        let tail = store.insert("tail");
        graph.add_node(&mut store, tail);
        graph.add_edge(&mut store, c, tail);

        let err = graph.evaluate_graph(&mut store, true).unwrap_err();
        assert!(matches!(
            err,
            GraphError::CycleDetected {
                direction: GraphDirection::Downstream,
                ..
            }
        ));
    }

    #[test]
    fn visited_ids_reset_on_wrap() {
        let (mut graph, mut store, ids) = chain();
        for id in ids {
            store.nodes[id].set_visited_id(7);
        }
        graph.next_id = u32::MAX;

        assert_eq!(graph.assign_visited_id(&mut store), 0);
        for id in ids {
            assert_eq!(store.nodes[id].visited_id(), 0);
        }
        assert_eq!(graph.assign_visited_id(&mut store), 1);
    }

    #[test]
    fn sweep_survives_counter_wrap() {
        let (mut graph, mut store, _) = chain();
        graph.next_id = u32::MAX - 1;

        let result = graph.evaluate_graph(&mut store, true).unwrap();
        assert_eq!(result.node_count, 3);
    }

    #[test]
    fn reachability_follows_direction() {
        let (mut graph, mut store, [a, _b, c]) = chain();

        assert!(graph.is_reachable(&mut store, a, c, GraphDirection::Downstream));
        assert!(!graph.is_reachable(&mut store, c, a, GraphDirection::Downstream));
        assert!(graph.is_reachable(&mut store, c, a, GraphDirection::Upstream));
    }

    #[test]
    fn listeners_skip_silent_sweeps() {
        let (mut graph, mut store, [a, _, _]) = chain();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let listener = graph.on_evaluated(move |args| sink.borrow_mut().push(args.result.node_count));

        graph.evaluate_graph(&mut store, true).unwrap();
        assert!(seen.borrow().is_empty());

        graph.dirty(&mut store, a);
        graph.evaluate_graph(&mut store, false).unwrap();
        assert_eq!(*seen.borrow(), vec![3]);

        assert!(graph.remove_evaluated_listener(listener));
        graph.dirty(&mut store, a);
        graph.evaluate_graph(&mut store, false).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn reset_detaches_everything() {
        let (mut graph, mut store, ids) = chain();

        graph.reset(&mut store);

        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.visited_counter(), 1);
        for id in ids {
            assert!(!store.nodes[id].is_attached());
        }
    }
}
