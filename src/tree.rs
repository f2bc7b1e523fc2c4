//! Trees: a shared topology decorated with branch lengths.
//!
//! A [`Tree`] pairs a [`Node`] topology with a branch-length vector indexed
//! by node index (length = root index + 1). Construction reuses the
//! topology's one-time [`Node::reindex`] pass; after that the tree is
//! read-only.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::node::{Node, NodePtr};

/// An immutable topology plus one branch length per node, looked up by the
/// node's canonical index.
#[derive(Debug, Clone)]
pub struct Tree {
    topology: NodePtr,
    branch_lengths: Vec<f64>,
}

impl Tree {
    /// Pairs an already indexed topology with an index-keyed branch-length
    /// vector.
    ///
    /// # Panics
    /// Panics unless the vector has exactly `root index + 1` entries.
    pub fn new(topology: NodePtr, branch_lengths: Vec<f64>) -> Tree {
        assert_eq!(
            topology.index() + 1,
            branch_lengths.len(),
            "branch length vector of length {} does not match root index {}",
            branch_lengths.len(),
            topology.index()
        );
        Tree {
            topology,
            branch_lengths,
        }
    }

    /// Builds a tree from a tag-keyed branch-length map, reindexing the
    /// topology. Tags absent from the map get length 0.
    pub fn with_tag_branch_lengths(
        topology: NodePtr,
        tag_branch_lengths: &HashMap<u64, f64>,
    ) -> Tree {
        let tag_index_map = topology.reindex();
        let mut branch_lengths = vec![0.0; topology.index() + 1];
        for (tag, index) in tag_index_map {
            if let Some(&length) = tag_branch_lengths.get(&tag) {
                branch_lengths[index] = length;
            }
        }
        Tree {
            topology,
            branch_lengths,
        }
    }

    pub fn topology(&self) -> &NodePtr {
        &self.topology
    }

    pub fn branch_lengths(&self) -> &[f64] {
        &self.branch_lengths
    }

    pub fn root_index(&self) -> usize {
        self.topology.index()
    }

    /// Branch length of the edge above `node`, which must belong to this
    /// tree's indexing.
    pub fn branch_length(&self, node: &Node) -> Result<f64> {
        self.branch_lengths
            .get(node.index())
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index: node.index(),
                len: self.branch_lengths.len(),
            })
    }

    /// Newick text with branch lengths, and node labels when supplied.
    pub fn newick(&self, node_labels: Option<&HashMap<u64, String>>) -> String {
        self.topology.newick(Some(&self.branch_lengths), node_labels)
    }

    /// Converts a trifurcating root into a bifurcation: given
    /// `(s0:b0,s1:b1,s2:b2):b3`, produces `(s0:b0,(s1:b1,s2:b2):0):0`.
    /// Builds new nodes rather than mutating shared ones; both the original
    /// root edge and the new internal edge get length 0, every other length
    /// is preserved (untouched nodes keep their indices).
    ///
    /// # Panics
    /// Panics unless the root has exactly three children.
    pub fn detrifurcate(&self) -> Tree {
        let children = self.topology.children();
        assert_eq!(
            children.len(),
            3,
            "detrifurcate requires a trifurcating root, found {} children",
            children.len()
        );
        let mut branch_lengths = self.branch_lengths.clone();
        let root_index = self.root_index();
        let inner = Node::join_with_index(vec![children[1].clone(), children[2].clone()], root_index);
        branch_lengths[root_index] = 0.0;
        let topology = Node::join_with_index(vec![children[0].clone(), inner], root_index + 1);
        branch_lengths.push(0.0);
        Tree::new(topology, branch_lengths)
    }

    /// Reindexes `topology` and assigns every edge length 1.
    pub fn unit_branch_length_tree_of(topology: NodePtr) -> Tree {
        topology.reindex();
        let mut branch_lengths = vec![0.0; topology.index() + 1];
        topology.pre_order(&mut |node| branch_lengths[node.index()] = 1.0);
        Tree::new(topology, branch_lengths)
    }

    /// One unit-branch-length tree per example topology.
    pub fn example_trees() -> Vec<Tree> {
        Node::example_topologies()
            .into_iter()
            .map(Tree::unit_branch_length_tree_of)
            .collect()
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.topology == other.topology && self.branch_lengths == other.branch_lengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects (tag, branch length) for every node of a tree.
    fn lengths_by_tag(tree: &Tree) -> HashMap<u64, f64> {
        let mut lengths = HashMap::new();
        tree.topology().pre_order(&mut |node| {
            lengths.insert(node.tag(), tree.branch_length(node).unwrap());
        });
        lengths
    }

    fn node_count(tree: &Tree) -> usize {
        let mut count = 0;
        tree.topology().pre_order(&mut |_| count += 1);
        count
    }

    #[test]
    fn unit_branch_length_newick() {
        let trees = Tree::example_trees();
        assert_eq!(trees.len(), 4);
        assert_eq!(
            trees[0].newick(None),
            "(0_1:1,1_1:1,(2_1:1,3_1:1)3_2:1)3_4:1;"
        );
    }

    #[test]
    fn equal_topologies_give_equal_trees() {
        let trees = Tree::example_trees();
        // The first two examples are the same topology built in different
        // child orders.
        assert_eq!(trees[0], trees[1]);
        assert_ne!(trees[0], trees[2]);
    }

    #[test]
    fn tag_keyed_branch_lengths_default_to_zero() {
        let topology = Node::join(vec![
            Node::leaf(0),
            Node::leaf(1),
            Node::join_pair(Node::leaf(2), Node::leaf(3)),
        ]);
        let cherry_tag = Node::join_pair(Node::leaf(2), Node::leaf(3)).tag();
        let mut tag_lengths = HashMap::new();
        tag_lengths.insert(Node::leaf(0).tag(), 0.25);
        tag_lengths.insert(cherry_tag, 1.5);
        let tree = Tree::with_tag_branch_lengths(topology, &tag_lengths);

        let lengths = lengths_by_tag(&tree);
        assert_eq!(lengths[&Node::leaf(0).tag()], 0.25);
        assert_eq!(lengths[&cherry_tag], 1.5);
        assert_eq!(lengths[&Node::leaf(1).tag()], 0.0);
        assert_eq!(lengths[&tree.topology().tag()], 0.0);
    }

    #[test]
    fn branch_length_is_bounds_checked() {
        let trees = Tree::example_trees();
        let small = &trees[0];
        // A node indexed for a larger topology is out of range here.
        let big = Node::join(vec![
            Node::leaf(0),
            Node::leaf(1),
            Node::join_pair(
                Node::leaf(2),
                Node::join_pair(Node::leaf(3), Node::leaf(4)),
            ),
        ]);
        big.reindex();
        assert_eq!(
            small.branch_length(&big),
            Err(Error::IndexOutOfRange {
                index: big.index(),
                len: small.branch_lengths().len()
            })
        );
    }

    #[test]
    fn detrifurcate_restructures_only_the_root() {
        let trees = Tree::example_trees();
        let tree = &trees[0]; // (0,1,(2,3)) with unit lengths
        let bifurcated = tree.detrifurcate();

        assert_eq!(node_count(&bifurcated), node_count(tree) + 1);
        assert_eq!(bifurcated.topology().children().len(), 2);
        assert_eq!(bifurcated.root_index(), tree.root_index() + 1);

        let lengths = lengths_by_tag(&bifurcated);
        // New root and new internal edge zeroed...
        let root_tag = bifurcated.topology().tag();
        let inner_tag = bifurcated.topology().children()[1].tag();
        assert_eq!(lengths[&root_tag], 0.0);
        assert_eq!(lengths[&inner_tag], 0.0);
        // ...every other edge keeps its length, matched by tag.
        for (tag, length) in lengths_by_tag(tree) {
            if tag != root_tag {
                assert_eq!(lengths[&tag], length, "length changed for tag {tag:#x}");
            }
        }
        // The original tree is untouched.
        assert_eq!(node_count(tree), 6);
        assert_eq!(tree.branch_length(tree.topology()).unwrap(), 1.0);
    }

    #[test]
    #[should_panic(expected = "trifurcating root")]
    fn detrifurcate_requires_trifurcation() {
        let topology = Node::join_pair(
            Node::leaf(0),
            Node::join_pair(Node::leaf(1), Node::leaf(2)),
        );
        Tree::unit_branch_length_tree_of(topology).detrifurcate();
    }

    #[test]
    #[should_panic(expected = "does not match root index")]
    fn branch_length_vector_must_cover_topology() {
        let topology = Node::join_pair(Node::leaf(0), Node::leaf(1));
        topology.reindex();
        Tree::new(topology, vec![1.0]);
    }
}
