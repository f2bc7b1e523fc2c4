//! Immutable tree nodes with canonical structural hashing and the traversal
//! protocols used to enumerate subsplits.
//!
//! # Overview
//! A [`Node`] is either a leaf holding a 32-bit taxon id or an internal node
//! owning an ordered sequence of shared children. Children are sorted into a
//! canonical order at construction, so two topologies with the same shape
//! compare equal and hash identically no matter which order their clades were
//! supplied in.
//!
//! The traversal protocols are the algorithmic centerpiece: the ordinary
//! pre/post/level orders, the "triple" traversals producing
//! (parent, sister, node) views of every internal edge, and
//! [`Node::pcss_pre_order`], which for every edge of the unrooted tree emits
//! the adjacent subsplit pair visible from a virtual root placed on that
//! edge, without ever re-rooting the tree.
//!
//! Nodes are immutable after construction except for the one-time index
//! assignment done by [`Node::reindex`].

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;

/// Shared handle to a node. Subtrees may be referenced by several parents or
/// trees; once attached as a child a subtree is never mutated in place.
pub type NodePtr = Arc<Node>;

/// Maps structural tags to the indices assigned by [`Node::reindex`].
pub type TagIndexMap = HashMap<u64, usize>;

/// Index value of nodes that have not been through [`Node::reindex`] yet.
const UNSET_INDEX: usize = usize::MAX;

/// A node of a rooted topology: a leaf with a taxon id, or an internal node
/// with an ordered, canonically sorted sequence of shared children.
///
/// Every node carries a `tag` packing (max leaf id spanned, leaf count) used
/// as a compact identity key, and a structural `hash` fixed at construction.
/// Equality is hash-gated structural equality, and the `Hash` impl writes the
/// precomputed structural hash, so nodes work as keys in hashed containers.
#[derive(Debug)]
pub struct Node {
    children: Vec<NodePtr>,
    /// Packed (max leaf id, leaf count) identity key.
    tag: u64,
    /// Canonical structural hash, fixed at construction.
    hash: u64,
    /// Assigned once by `reindex`; relaxed atomics give the
    /// single-writer-then-many-readers contract without locks.
    index: AtomicUsize,
}

/// One subsplit-pair record emitted by [`Node::pcss_pre_order`].
///
/// `{s0 | s1}` is the parent/child subsplit relative to the virtual root and
/// `{t0 | t1}` the sibling pair below it. Each flag says whether the clade of
/// the corresponding subtree points root-ward from the virtual root, i.e.
/// whether the subsplit side is the complement of that subtree's leaf set.
#[derive(Clone, Copy)]
pub struct PcssVisit<'a> {
    pub s0: &'a Node,
    pub s0_is_rootward: bool,
    pub s1: &'a Node,
    pub s1_is_rootward: bool,
    pub t0: &'a Node,
    pub t0_is_rootward: bool,
    pub t1: &'a Node,
    pub t1_is_rootward: bool,
}

impl<'a> PcssVisit<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        s0: &'a Node,
        s0_is_rootward: bool,
        s1: &'a Node,
        s1_is_rootward: bool,
        t0: &'a Node,
        t0_is_rootward: bool,
        t1: &'a Node,
        t1_is_rootward: bool,
    ) -> Self {
        PcssVisit {
            s0,
            s0_is_rootward,
            s1,
            s1_is_rootward,
            t0,
            t0_is_rootward,
            t1,
            t1_is_rootward,
        }
    }
}

impl Node {
    /// Builds a leaf node for the given taxon id.
    pub fn leaf(id: u32) -> NodePtr {
        Arc::new(Node {
            children: Vec::new(),
            tag: pack_ints(id, 1),
            hash: u64::from(hash_leaf_id(id)),
            index: AtomicUsize::new(id as usize),
        })
    }

    /// Builds an internal node over `children`, sorted into canonical order.
    ///
    /// # Panics
    /// Panics on an empty child list, or when two children span the same max
    /// leaf id (sibling subtrees must have disjoint leaf sets, so a tie means
    /// a repeated taxon in the input).
    pub fn join(children: Vec<NodePtr>) -> NodePtr {
        Self::join_with_index(children, UNSET_INDEX)
    }

    /// Convenience for the common two-child join.
    pub fn join_pair(left: NodePtr, right: NodePtr) -> NodePtr {
        Self::join(vec![left, right])
    }

    /// Like [`Node::join`] but seeds the node with a known index, for
    /// transforms that rebuild part of an already indexed topology.
    pub fn join_with_index(mut children: Vec<NodePtr>, index: usize) -> NodePtr {
        assert!(
            !children.is_empty(),
            "internal node constructed with no children"
        );
        // Canonical child order is by max leaf id; this is what makes the
        // structural hash independent of construction order.
        children.sort_by(|lhs, rhs| {
            if lhs.max_leaf_id() == rhs.max_leaf_id() {
                panic!(
                    "max leaf id tie between {} and {}: is a taxon repeated?",
                    lhs.newick(None, None),
                    rhs.newick(None, None)
                );
            }
            lhs.max_leaf_id().cmp(&rhs.max_leaf_id())
        });
        let max_leaf_id = children[children.len() - 1].max_leaf_id();
        let mut leaf_count = 0u32;
        let mut hash = 0u64;
        for child in &children {
            leaf_count += child.leaf_count();
            hash ^= child.hash_value();
        }
        // XOR alone is commutative across levels, so identical tips arranged
        // as different clades would collide; rotating after each combination
        // breaks that symmetry.
        let hash = hash.rotate_left(1);
        Arc::new(Node {
            children,
            tag: pack_ints(max_leaf_id, leaf_count),
            hash,
            index: AtomicUsize::new(index),
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[NodePtr] {
        &self.children
    }

    /// Packed (max leaf id, leaf count) identity key.
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Canonical structural hash.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    /// Index assigned by [`Node::reindex`]; meaningless before that.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Largest taxon id spanned by this subtree.
    pub fn max_leaf_id(&self) -> u32 {
        (self.tag >> 32) as u32
    }

    /// Number of leaves in this subtree.
    pub fn leaf_count(&self) -> u32 {
        self.tag as u32
    }

    /// `"<max leaf id>_<leaf count>"`, the default Newick label.
    pub fn tag_string(&self) -> String {
        format!("{}_{}", self.max_leaf_id(), self.leaf_count())
    }

    /// Applies `f` to every node, parents before children.
    pub fn pre_order<F: FnMut(&Node)>(&self, f: &mut F) {
        f(self);
        for child in &self.children {
            child.pre_order(f);
        }
    }

    /// Applies `f` to every node, children before parents.
    pub fn post_order<F: FnMut(&Node)>(&self, f: &mut F) {
        for child in &self.children {
            child.post_order(f);
        }
        f(self);
    }

    /// Applies `f` to every node in breadth-first order. Iterative, so deep
    /// trees do not grow the call stack here.
    pub fn level_order<F: FnMut(&Node)>(&self, f: &mut F) {
        let mut to_visit: VecDeque<&Node> = VecDeque::from([self]);
        while let Some(node) = to_visit.pop_front() {
            f(node);
            for child in &node.children {
                to_visit.push_back(child);
            }
        }
    }

    /// Preorder over the strictly binary part of the tree, invoking
    /// `f(parent, sister, node)` for each child of each internal node, then
    /// recursing into that child. Leaves terminate the recursion.
    ///
    /// # Panics
    /// Panics if an internal node below does not have exactly two children.
    pub fn triple_pre_order_internal<F: FnMut(&Node, &Node, &Node)>(&self, f: &mut F) {
        if self.is_leaf() {
            return;
        }
        assert_eq!(
            self.children.len(),
            2,
            "triple traversal requires strictly binary internal nodes, found {} children",
            self.children.len()
        );
        f(self, &self.children[1], &self.children[0]);
        self.children[0].triple_pre_order_internal(f);
        f(self, &self.children[0], &self.children[1]);
        self.children[1].triple_pre_order_internal(f);
    }

    /// Traversal for rooted pairs in an unrooted tree held in its
    /// conventional trifurcating-root representation.
    ///
    /// `f_root` is applied to the three cyclic rotations of the root's
    /// children: (c0,c1,c2), (c1,c2,c0), (c2,c0,c1). Callers whose `f_root`
    /// is symmetric in its last two arguments therefore see every distinct
    /// choice of "outgroup" exactly once. `f_internal` is then dispatched
    /// through [`Node::triple_pre_order_internal`] in each child.
    ///
    /// # Panics
    /// Panics unless this node has exactly three children.
    pub fn triple_pre_order<FR, FI>(&self, f_root: &mut FR, f_internal: &mut FI)
    where
        FR: FnMut(&Node, &Node, &Node),
        FI: FnMut(&Node, &Node, &Node),
    {
        assert_eq!(
            self.children.len(),
            3,
            "triple traversal must start at a trifurcating root, found {} children",
            self.children.len()
        );
        f_root(&self.children[0], &self.children[1], &self.children[2]);
        f_root(&self.children[1], &self.children[2], &self.children[0]);
        f_root(&self.children[2], &self.children[0], &self.children[1]);
        for child in &self.children {
            child.triple_pre_order_internal(f_internal);
        }
    }

    /// Enumerates the PCSS records of the unrooted tree: for every edge,
    /// one record per virtual-root perspective adjacent to it. See
    /// [`PcssVisit`] for the record shape.
    ///
    /// The schedule is fixed: at the trifurcating root each cyclic rotation
    /// (node0, node1, node2) contributes a record for the virtual root on
    /// node2's edge pointing up, plus five more when node2 is internal
    /// (virtual root inside node1, inside node0, on node2's edge pointing
    /// down, inside each of node2's children). Each internal triple
    /// (parent, sister, node) contributes the analogous one or six records.
    /// The total is linear in the number of edges.
    ///
    /// # Panics
    /// Panics unless this node has exactly three children and all other
    /// internal nodes have exactly two.
    pub fn pcss_pre_order<F: FnMut(PcssVisit)>(&self, f: &mut F) {
        assert_eq!(
            self.children.len(),
            3,
            "PCSS traversal must start at a trifurcating root, found {} children",
            self.children.len()
        );
        for (i0, i1, i2) in [(0, 1, 2), (1, 2, 0), (2, 0, 1)] {
            Self::pcss_root_visit(&self.children[i0], &self.children[i1], &self.children[i2], f);
        }
        for child in &self.children {
            child.triple_pre_order_internal(&mut |parent, sister, node| {
                Self::pcss_internal_visit(parent, sister, node, f);
            });
        }
    }

    /// Records for one rotation (node0, node1, node2) at the trifurcating
    /// root.
    fn pcss_root_visit<F: FnMut(PcssVisit)>(node0: &Node, node1: &Node, node2: &Node, f: &mut F) {
        // Virtual root on node2's edge, with subsplit pointing up.
        f(PcssVisit::new(
            node2, false, node2, true, node0, false, node1, false,
        ));
        if !node2.is_leaf() {
            assert_eq!(
                node2.children.len(),
                2,
                "non-root internal node with {} children",
                node2.children.len()
            );
            let child0 = &*node2.children[0];
            let child1 = &*node2.children[1];
            // Virtual root in node1.
            f(PcssVisit::new(
                node0, false, node2, false, child0, false, child1, false,
            ));
            // Virtual root in node0.
            f(PcssVisit::new(
                node1, false, node2, false, child0, false, child1, false,
            ));
            // Virtual root on node2's edge, with subsplit pointing down.
            f(PcssVisit::new(
                node2, true, node2, false, child0, false, child1, false,
            ));
            // Virtual root in child0.
            f(PcssVisit::new(
                child1, false, node2, true, node0, false, node1, false,
            ));
            // Virtual root in child1.
            f(PcssVisit::new(
                child0, false, node2, true, node0, false, node1, false,
            ));
        }
    }

    /// Records for one internal (parent, sister, node) triple.
    fn pcss_internal_visit<F: FnMut(PcssVisit)>(
        parent: &Node,
        sister: &Node,
        node: &Node,
        f: &mut F,
    ) {
        // Virtual root on node's edge, with subsplit pointing up.
        f(PcssVisit::new(
            node, false, node, true, parent, true, sister, false,
        ));
        if !node.is_leaf() {
            assert_eq!(
                node.children.len(),
                2,
                "non-root internal node with {} children",
                node.children.len()
            );
            let child0 = &*node.children[0];
            let child1 = &*node.children[1];
            // Virtual root up the tree.
            f(PcssVisit::new(
                sister, false, node, false, child0, false, child1, false,
            ));
            // Virtual root in sister.
            f(PcssVisit::new(
                parent, true, node, false, child0, false, child1, false,
            ));
            // Virtual root on node's edge, with subsplit pointing down.
            f(PcssVisit::new(
                node, true, node, false, child0, false, child1, false,
            ));
            // Virtual root in child0.
            f(PcssVisit::new(
                child1, false, node, true, sister, false, parent, true,
            ));
            // Virtual root in child1.
            f(PcssVisit::new(
                child0, false, node, true, sister, false, parent, true,
            ));
        }
    }

    /// Assigns canonical indices: each leaf gets its taxon id, and internal
    /// nodes get `1 + max leaf id` onwards in postorder, so the conventional
    /// root receives the largest index. Returns the tag-to-index map.
    ///
    /// This is the sole mutation after construction and requires exclusive
    /// access to the subtree; once it has run, any number of threads may
    /// traverse concurrently.
    ///
    /// # Panics
    /// Panics on a tag collision, which indicates a malformed or
    /// duplicate-leaf topology.
    pub fn reindex(&self) -> TagIndexMap {
        let mut tag_index_map = TagIndexMap::new();
        let mut next_index = 1 + self.max_leaf_id() as usize;
        self.post_order(&mut |node| {
            let index = if node.is_leaf() {
                node.max_leaf_id() as usize
            } else {
                let assigned = next_index;
                next_index += 1;
                assigned
            };
            node.index.store(index, Ordering::Relaxed);
            let previous = tag_index_map.insert(node.tag, index);
            assert!(
                previous.is_none(),
                "tag collision during reindex at {}: malformed or duplicate-leaf topology",
                node.tag_string()
            );
        });
        tag_index_map
    }

    /// Emits a Newick string for this subtree, terminated with `;`.
    ///
    /// Leaves print their label from `node_labels` when supplied, otherwise
    /// their tag string. Internal nodes print their tag string only when no
    /// label map is given (without labels the discrete structure is the
    /// point, so tags identify the clades). With `branch_lengths`, every
    /// node's text is suffixed with `:<length>` looked up by node index.
    ///
    /// # Panics
    /// Panics if a supplied label map is missing a leaf tag, or if a
    /// supplied branch-length slice does not cover some node index.
    pub fn newick(
        &self,
        branch_lengths: Option<&[f64]>,
        node_labels: Option<&HashMap<u64, String>>,
    ) -> String {
        let mut text = self.newick_aux(branch_lengths, node_labels);
        text.push(';');
        text
    }

    fn newick_aux(
        &self,
        branch_lengths: Option<&[f64]>,
        node_labels: Option<&HashMap<u64, String>>,
    ) -> String {
        let mut text = String::new();
        if self.is_leaf() {
            match node_labels {
                Some(labels) => text.push_str(
                    labels
                        .get(&self.tag)
                        .unwrap_or_else(|| panic!("no label supplied for leaf {}", self.tag_string())),
                ),
                None => text.push_str(&self.tag_string()),
            }
        } else {
            text.push('(');
            text.push_str(
                &self
                    .children
                    .iter()
                    .map(|child| child.newick_aux(branch_lengths, node_labels))
                    .join(","),
            );
            text.push(')');
            if node_labels.is_none() {
                text.push_str(&self.tag_string());
            }
        }
        if let Some(lengths) = branch_lengths {
            assert!(
                self.index() < lengths.len(),
                "branch length vector of length {} does not cover node index {}",
                lengths.len(),
                self.index()
            );
            text.push_str(&format!(":{}", lengths[self.index()]));
        }
        text
    }

    /// A fixed battery of small hand-built topologies, each reindexed.
    /// Used as fixtures across the crate's tests.
    pub fn example_topologies() -> Vec<NodePtr> {
        let topologies = vec![
            // (0,1,(2,3))
            Node::join(vec![
                Node::leaf(0),
                Node::leaf(1),
                Node::join_pair(Node::leaf(2), Node::leaf(3)),
            ]),
            // (0,1,(2,3)) again, built in a different child order
            Node::join(vec![
                Node::leaf(1),
                Node::leaf(0),
                Node::join_pair(Node::leaf(3), Node::leaf(2)),
            ]),
            // (0,2,(1,3))
            Node::join(vec![
                Node::leaf(0),
                Node::leaf(2),
                Node::join_pair(Node::leaf(1), Node::leaf(3)),
            ]),
            // (0,(1,(2,3)))
            Node::join(vec![
                Node::leaf(0),
                Node::join_pair(
                    Node::leaf(1),
                    Node::join_pair(Node::leaf(2), Node::leaf(3)),
                ),
            ]),
        ];
        for topology in &topologies {
            topology.reindex();
        }
        topologies
    }
}

impl PartialEq for Node {
    /// Hash-gated structural equality: the hash check is a fast reject, then
    /// child counts and children are compared recursively.
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        if self.children.len() != other.children.len() {
            return false;
        }
        self.children
            .iter()
            .zip(&other.children)
            .all(|(a, b)| a == b)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Packs two 32-bit values into a tag, first value in the high bits.
fn pack_ints(a: u32, b: u32) -> u64 {
    (u64::from(a) << 32) | u64::from(b)
}

/// Integer mix applied to leaf ids before hashes are combined up the tree.
/// The exact constants are load-bearing: structural hashes are expected to
/// be stable across implementations.
fn hash_leaf_id(x: u32) -> u32 {
    let x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    let x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    (x >> 16) ^ x
}
